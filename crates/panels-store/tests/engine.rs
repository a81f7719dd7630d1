use panels_kernel::{
    ConditionConfig, Context, ContextMap, DisplayStorage, Engine, EngineConfig, InvalidationLog,
    MaxAge, PanelsError, RenderOutcome, StaticContext, toy,
};
use panels_store::MemoryStore;
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn engine() -> Engine<MemoryStore, InvalidationLog> {
    engine_with(EngineConfig::default())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine_with(config: EngineConfig) -> Engine<MemoryStore, InvalidationLog> {
    init_tracing();
    Engine::new(MemoryStore::new(), toy::plugin_host(), InvalidationLog::new(), config)
}

fn node(bundle: &str) -> ContextMap {
    let mut contexts = ContextMap::new();
    contexts.insert(
        "node".to_string(),
        Context::new("entity:node", json!({ "id": 1, "type": bundle })),
    );
    contexts
}

/// `front` with an article-only variant at weight 0 and a fallback at weight 10.
fn seed(engine: &mut Engine<MemoryStore, InvalidationLog>) {
    let mut display = engine
        .create_display("mini_panel", "front", "Front")
        .expect("valid display");
    display
        .set_parameter("node", "entity:node", "Node")
        .expect("valid parameter");
    engine.save_display(&display).expect("save display");

    let mut article = engine
        .create_variant("front-article", "Article", toy::BLOCK_DISPLAY, &display)
        .expect("valid variant");
    article
        .set_variant_settings(json!({ "page_title": "Article" }), engine.host())
        .expect("settings accepted");
    article.add_selection_condition(
        ConditionConfig::new(toy::NODE_TYPE).with_settings(json!({ "bundles": ["article"] })),
        engine.host(),
    );
    engine.save_variant(&article).expect("save variant");

    let mut fallback = engine
        .create_variant("front-fallback", "Fallback", toy::HTTP_STATUS, &display)
        .expect("valid variant");
    fallback.set_weight(Some(10));
    engine.save_variant(&fallback).expect("save variant");
}

fn rendered_variant(outcome: &RenderOutcome) -> Option<&str> {
    match outcome {
        RenderOutcome::Rendered { variant_id, .. } => Some(variant_id),
        _ => None,
    }
}

#[test]
fn renders_first_accessible_variant() {
    let mut engine = engine();
    seed(&mut engine);

    let outcome = engine.render_display("front", node("article")).expect("render");
    assert_eq!(rendered_variant(&outcome), Some("front-article"));
    let output = outcome.rendered().expect("rendered");
    assert!(output.cache.tags.contains("config:mini_panel.front"));
    assert_eq!(output.tree.properties["contexts"], json!(["node"]));

    let outcome = engine.render_display("front", node("page")).expect("render");
    assert_eq!(rendered_variant(&outcome), Some("front-fallback"));
}

#[test]
fn unset_parameter_faults_selection_but_not_resolution() {
    let mut engine = engine();
    seed(&mut engine);

    let outcome = engine.render_display("front", ContextMap::new()).expect("render");
    assert_eq!(rendered_variant(&outcome), Some("front-fallback"));
}

#[test]
fn no_variants_and_none_accessible_are_distinct() {
    let mut engine = engine();
    let display = engine
        .create_display("page", "empty", "Empty")
        .expect("valid display");
    engine.save_display(&display).expect("save");
    assert_eq!(
        engine.render_display("empty", ContextMap::new()).expect("render"),
        RenderOutcome::NoVariants
    );

    let mut variant = engine
        .create_variant("empty-never", "Never", toy::HTTP_STATUS, &display)
        .expect("valid variant");
    variant.add_selection_condition(ConditionConfig::new(toy::ALWAYS_FALSE), engine.host());
    engine.save_variant(&variant).expect("save");
    assert_eq!(
        engine.render_display("empty", ContextMap::new()).expect("render"),
        RenderOutcome::NoneAccessible
    );
}

#[test]
fn disabled_display_does_not_resolve() {
    let mut engine = engine();
    seed(&mut engine);
    let mut display = engine.load_display("front").expect("stored");
    display.disable();
    engine.save_display(&display).expect("save");

    assert_eq!(
        engine.render_display("front", node("article")).expect("render"),
        RenderOutcome::Disabled
    );
}

#[test]
fn missing_display_is_not_found() {
    let engine = engine();
    assert!(matches!(
        engine.render_display("nowhere", ContextMap::new()),
        Err(PanelsError::DisplayNotFound(_))
    ));
}

#[test]
fn configured_max_age_bounds_render_cache() {
    let config = EngineConfig::from_toml_str("[cache]\nmax_age = { seconds = 30 }\n")
        .expect("config parses");
    let mut engine = engine_with(config);
    seed(&mut engine);

    let outcome = engine.render_display("front", node("article")).expect("render");
    assert_eq!(outcome.rendered().expect("rendered").cache.max_age, MaxAge::Seconds(30));
}

#[test]
fn writes_invalidate_display_tags() {
    let mut engine = engine();
    seed(&mut engine);
    assert!(engine.invalidator().is_invalidated("config:mini_panel.front"));
    assert_eq!(engine.invalidator().batches().len(), 3);

    engine.invalidator_mut().clear();
    assert!(engine.delete_variant("front-fallback").expect("delete"));
    assert_eq!(engine.invalidator().batches().len(), 1);
    assert!(!engine.delete_variant("front-fallback").expect("already gone"));
    assert_eq!(engine.invalidator().batches().len(), 1);

    engine.invalidator_mut().clear();
    assert!(engine.delete_display("front").expect("delete"));
    assert!(engine.invalidator().is_invalidated("config:mini_panel.front"));
}

#[test]
fn deleting_display_keeps_variants_but_orphans_them() {
    let mut engine = engine();
    seed(&mut engine);
    engine.delete_display("front").expect("delete");

    assert!(engine.storage().load_variant("front-article").expect("infallible").is_some());
    assert!(matches!(
        engine.load_variant("front-article"),
        Err(PanelsError::DisplayMissing { .. })
    ));
}

#[test]
fn variant_without_owner_is_a_configuration_error() {
    let mut engine = engine();
    seed(&mut engine);
    let mut record = engine
        .storage()
        .load_variant("front-fallback")
        .expect("infallible")
        .expect("stored");
    record.display_entity_id = None;
    engine.storage_mut().save_variant(record).expect("infallible");

    assert!(matches!(
        engine.load_variant("front-fallback"),
        Err(PanelsError::VariantUnbound(_))
    ));
    assert!(matches!(
        engine.load_variant("front-nothing"),
        Err(PanelsError::VariantRecordNotFound(_))
    ));
}

#[test]
fn variant_access_evaluates_both_gates() {
    let mut engine = engine();
    seed(&mut engine);

    assert!(engine.variant_access("front-article", node("article")).expect("access").granted());
    let verdict = engine.variant_access("front-article", node("page")).expect("access");
    assert!(verdict.display.passed);
    assert!(!verdict.granted());
}

#[test]
fn static_context_pins_selection_input() {
    let mut engine = engine();
    seed(&mut engine);
    let (mut variant, _display) = engine.load_variant("front-article").expect("stored");
    variant.set_static_context(StaticContext::new(
        "node",
        "Pinned article",
        "entity:node",
        json!({ "type": "article" }),
    ));
    engine.save_variant(&variant).expect("save");

    let outcome = engine.render_display("front", node("page")).expect("render");
    assert_eq!(rendered_variant(&outcome), Some("front-article"));
}

#[test]
fn registry_removal_deletes_and_invalidates() {
    let mut engine = engine();
    seed(&mut engine);
    let display = engine.load_display("front").expect("stored");
    let mut registry = engine.load_variants(&display).expect("variants");
    assert_eq!(registry.ids(), vec!["front-article", "front-fallback"]);

    engine.invalidator_mut().clear();
    let removed = engine
        .remove_variant(&mut registry, "front-article")
        .expect("known variant");
    assert_eq!(removed.id(), "front-article");
    assert!(engine.invalidator().is_invalidated("config:mini_panel.front"));
    assert_eq!(engine.invalidator().batches().len(), 1);
    assert!(engine.storage().load_variant("front-article").expect("infallible").is_none());
    assert!(matches!(
        registry.get("front-article"),
        Err(PanelsError::VariantNotFound { .. })
    ));

    engine.invalidator_mut().clear();
    assert!(matches!(
        engine.remove_variant(&mut registry, "front-article"),
        Err(PanelsError::VariantNotFound { .. })
    ));
    assert!(engine.invalidator().batches().is_empty());
}

#[test]
fn reused_id_ignores_variants_of_the_deleted_display_type() {
    let mut engine = engine();
    let page = engine.create_display("page", "front", "Front").expect("valid display");
    engine.save_display(&page).expect("save page");
    let stale = engine
        .create_variant("front-a", "Old", toy::HTTP_STATUS, &page)
        .expect("valid variant");
    engine.save_variant(&stale).expect("save variant");
    engine.delete_display("front").expect("delete page");

    let panel = engine
        .create_display("mini_panel", "front", "Front")
        .expect("valid display");
    engine.save_display(&panel).expect("id is free again");
    assert_eq!(
        engine.render_display("front", ContextMap::new()).expect("render"),
        RenderOutcome::NoVariants
    );

    let fresh = engine
        .create_variant("front-b", "New", toy::HTTP_STATUS, &panel)
        .expect("valid variant");
    engine.save_variant(&fresh).expect("save variant");
    let outcome = engine.render_display("front", ContextMap::new()).expect("render");
    assert_eq!(rendered_variant(&outcome), Some("front-b"));
    assert!(engine.storage().load_variant("front-a").expect("infallible").is_some());
}

#[test]
fn display_id_is_unique_across_entity_types() {
    let mut engine = engine();
    seed(&mut engine);
    let page = engine.create_display("page", "front", "Front").expect("valid display");
    assert!(matches!(
        engine.save_display(&page),
        Err(PanelsError::DisplayIdConflict { .. })
    ));
    assert_eq!(engine.load_display("front").expect("stored").entity_type(), "mini_panel");
}
