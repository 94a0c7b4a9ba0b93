//! In-memory ZIP assembly for batch and listing-pack responses

use crate::error::{CanvasError, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

/// Builds a ZIP archive in memory
pub struct ArchiveBuilder {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    names: HashSet<String>,
}

impl ArchiveBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            names: HashSet::new(),
        }
    }

    /// Add a file, deflate-compressed
    ///
    /// # Errors
    /// - Duplicate entry name
    /// - ZIP writer failure
    pub fn add_file(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        if !self.names.insert(name.to_string()) {
            return Err(CanvasError::processing(format!(
                "Duplicate archive entry '{name}'"
            )));
        }

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip.start_file(name, options)?;
        self.zip.write_all(bytes)?;
        Ok(())
    }

    /// Add a pretty-printed JSON document
    ///
    /// # Errors
    /// - Serialization failure
    /// - Any error from [`Self::add_file`]
    pub fn add_json<T: Serialize>(&mut self, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| CanvasError::internal(format!("Failed to serialize {name}: {e}")))?;
        self.add_file(name, &json)
    }

    /// Number of entries written so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Finish the archive and return its bytes
    ///
    /// # Errors
    /// - ZIP writer failure
    pub fn finish(self) -> Result<Vec<u8>> {
        let cursor = self.zip.finish()?;
        Ok(cursor.into_inner())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}
