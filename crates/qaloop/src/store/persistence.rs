//! JSON persistence helpers.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{QaError, Result};

/// Save a value as pretty-printed JSON, creating parent directories.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                QaError::Persistence(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let file = File::create(path).map_err(|e| {
        QaError::Persistence(format!("Failed to create file '{}': {}", path.display(), e))
    })?;

    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value).map_err(|e| {
        QaError::Persistence(format!("Failed to serialize '{}': {}", path.display(), e))
    })?;

    Ok(())
}

/// Load a value from a JSON file.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();

    let file = File::open(path).map_err(|e| {
        QaError::Persistence(format!("Failed to open file '{}': {}", path.display(), e))
    })?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| {
        QaError::Persistence(format!("Failed to parse '{}': {}", path.display(), e))
    })
}

/// JSON files directly inside a directory, sorted by path.
///
/// A missing directory yields an empty list.
pub fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| {
            QaError::Persistence(format!(
                "Failed to read directory '{}': {}",
                dir.display(),
                e
            ))
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();

    entries.sort();
    Ok(entries)
}

/// Subdirectories of a directory, sorted by path.
pub fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| {
            QaError::Persistence(format!(
                "Failed to read directory '{}': {}",
                dir.display(),
                e
            ))
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();

    entries.sort();
    Ok(entries)
}
