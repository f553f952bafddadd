//! The result manifest the indexer leaves behind.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

/// Where the indexer writes the manifest for `owner_id` / `event_name`.
///
/// Both values must already have passed
/// [`is_safe_path_component`](crate::config::is_safe_path_component).
pub fn manifest_path(dir: &Path, owner_id: &str, event_name: &str) -> PathBuf {
    dir.join(format!("index_manifest_{owner_id}_{event_name}.json"))
}

/// Outcome of looking for the manifest.
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    Found(Value),
    Missing,
    Unreadable(String),
}

impl Manifest {
    pub fn is_found(&self) -> bool {
        matches!(self, Manifest::Found(_))
    }

    /// JSON sent in the callback. Placeholders stand in for a missing or
    /// broken file so the coordinator always records something.
    pub fn into_value(self) -> Value {
        match self {
            Manifest::Found(value) => value,
            Manifest::Missing => json!({"status": "manifest not found"}),
            Manifest::Unreadable(error) => json!({"status": "manifest unreadable", "error": error}),
        }
    }
}

pub async fn read_manifest(path: &Path) -> Manifest {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Manifest not found");
            return Manifest::Missing;
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read manifest");
            return Manifest::Unreadable(e.to_string());
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Manifest::Found(value),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Manifest is not valid JSON");
            Manifest::Unreadable(e.to_string())
        }
    }
}
