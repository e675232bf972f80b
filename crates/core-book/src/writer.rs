//! Writing selections to disk.
//!
//! The store only depends on the [`StoreWriter`] contract; the bundled
//! implementation serializes merged observables into a single TOML document,
//! one table per entry keyed by the entry's full name.

use std::path::PathBuf;

use tracing::info;

use crate::selection::Selection;
use crate::BookError;

/// Sink for selections of booked entries.
pub trait StoreWriter {
    fn write_selection(&mut self, selection: &Selection) -> Result<(), BookError>;
}

/// Writes one TOML document per call, replacing the file.
pub struct TomlStoreWriter {
    path: PathBuf,
}

impl TomlStoreWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl StoreWriter for TomlStoreWriter {
    fn write_selection(&mut self, selection: &Selection) -> Result<(), BookError> {
        let mut root = toml::Table::new();
        let mut written = 0usize;
        for weak in selection {
            // Entries removed since the selection was made are skipped.
            let Some(entry) = weak.upgrade() else { continue };
            let key = entry.key();
            let mut table = toml::Table::new();
            table.insert(
                "type".to_string(),
                toml::Value::String(key.type_name.to_string()),
            );
            table.insert("object".to_string(), entry.merged_toml()?);
            root.insert(key.full_name(), toml::Value::Table(table));
            written += 1;
        }
        let text = toml::to_string_pretty(&root)
            .map_err(|e| BookError::Serialize(e.to_string()))?;
        std::fs::write(&self.path, text)?;
        info!(
            target: "book.writer",
            file = %self.path.display(),
            entries = written,
            "selection_written"
        );
        Ok(())
    }
}
