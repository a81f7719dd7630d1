use panels_kernel::PanelsError;

#[derive(Debug, thiserror::Error)]
pub enum MiniPanelError {
    #[error(transparent)]
    Panels(#[from] PanelsError),

    #[error("display `{id}` is a `{entity_type}` display, not a mini panel")]
    NotAMiniPanel { id: String, entity_type: String },

    #[error("unknown mini panel block `{0}`")]
    UnknownBlock(String),
}
