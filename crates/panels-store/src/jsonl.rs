//! JSONL records: one serialized record per line.
//!
//! Blank lines and `#` comment lines are skipped on read. Writes go to a
//! sibling temp file that replaces the target only once fully synced.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Errors from JSONL operations.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("{path}: I/O error: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: parse error: {message}")]
    Parse { line: usize, message: String },

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("{0}: not valid UTF-8")]
    NotUtf8(String),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> JsonlError + '_ {
    move |source| JsonlError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Read records from a JSONL reader.
pub fn read_records<T: DeserializeOwned>(reader: impl BufRead) -> Result<Vec<T>, JsonlError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error(Path::new("<reader>")))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|e| JsonlError::Parse {
            line: index + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Write records to a JSONL writer.
pub fn write_records<T: Serialize>(writer: &mut impl Write, records: &[T]) -> Result<(), JsonlError> {
    for record in records {
        let line = serde_json::to_string(record).map_err(|e| JsonlError::Serialize(e.to_string()))?;
        writeln!(writer, "{line}").map_err(io_error(Path::new("<writer>")))?;
    }
    Ok(())
}

pub fn read_records_from_path<T: DeserializeOwned>(
    path: impl AsRef<Path>,
) -> Result<Vec<T>, JsonlError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(io_error(path))?;
    let text = std::str::from_utf8(&bytes)
        .map_err(|_| JsonlError::NotUtf8(path.display().to_string()))?;
    read_records(text.as_bytes())
}

/// Replace `path` with `records`, creating parent directories as needed.
pub fn write_records_to_path<T: Serialize>(
    path: impl AsRef<Path>,
    records: &[T],
) -> Result<(), JsonlError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let tmp_path = tmp_write_path(path);
    if let Err(error) = write_synced(&tmp_path, records) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    if let Err(source) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_error(path)(source));
    }
    Ok(())
}

fn write_synced<T: Serialize>(path: &Path, records: &[T]) -> Result<(), JsonlError> {
    let mut writer = BufWriter::new(File::create(path).map_err(io_error(path))?);
    write_records(&mut writer, records)?;
    let file = writer
        .into_inner()
        .map_err(|e| io_error(path)(e.into_error()))?;
    file.sync_all().map_err(io_error(path))
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}", uuid::Uuid::new_v4().simple()));
    PathBuf::from(tmp)
}
