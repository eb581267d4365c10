//! On-disk session files.

use super::dto::SessionDocument;
use super::mapper::{from_document, to_document};
use crate::config::FragmentConfig;
use crate::context::ContextHistory;
use crate::error::{FragmentError, Result};
use crate::services::ContextServices;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Reads and writes session files.
#[derive(Debug, Clone, Copy)]
pub struct SessionStore {
    compression_level: i32,
}

impl SessionStore {
    pub fn new(config: &FragmentConfig) -> Self {
        Self {
            compression_level: config.storage.compression_level,
        }
    }

    /// Persists a history to `path`, replacing any previous file atomically.
    pub fn save(&self, path: &Path, history: &ContextHistory, services: &ContextServices) -> Result<()> {
        let doc = to_document(history, services)?;
        self.write_document(path, &doc)?;
        info!(
            path = %path.display(),
            contexts = doc.contexts.len(),
            fragments = doc.fragments.len(),
            "Saved session"
        );
        Ok(())
    }

    /// Loads a history, registering its snapshots and ids with `services`.
    pub fn load(&self, path: &Path, services: &ContextServices) -> Result<ContextHistory> {
        let doc = self.read_document(path)?;
        let history = from_document(&doc, services)?;
        info!(path = %path.display(), contexts = history.len(), "Loaded session");
        Ok(history)
    }

    /// Writes a document using temp file + fsync + rename.
    ///
    /// The temp file is uniquely named in the target directory and removed
    /// if any step fails.
    pub fn write_document(&self, path: &Path, doc: &SessionDocument) -> Result<()> {
        let json = serde_json::to_vec(doc).map_err(|e| FragmentError::Serialization(e.to_string()))?;
        let compressed = zstd::encode_all(json.as_slice(), self.compression_level)
            .map_err(|e| FragmentError::Compression(e.to_string()))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&compressed)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        #[cfg(unix)]
        {
            if let Ok(dir_file) = File::open(dir) {
                let _ = dir_file.sync_all();
            }
        }

        debug!(path = %path.display(), bytes = compressed.len(), "Wrote session document");
        Ok(())
    }

    /// Reads a document without resolving it.
    pub fn read_document(&self, path: &Path) -> Result<SessionDocument> {
        let compressed = fs::read(path).map_err(|source| FragmentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let json = zstd::decode_all(compressed.as_slice()).map_err(|e| FragmentError::Compression(e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| FragmentError::Deserialization(e.to_string()))
    }
}
