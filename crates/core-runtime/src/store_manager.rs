//! Book-store ownership and shutdown write-out.

use core_book::{BookStore, LayoutKind, TomlStoreWriter};
use core_config::{ConfigError, Configuration};
use core_plugin::{Component, ComponentBase};
use tracing::{info, warn};

/// Component owning the application's [`BookStore`].
///
/// Bound to the `[bookstore]` section. `OutputFile` governs the shutdown
/// artifact (empty disables it); `DefaultMemoryLayout` and `StoreByDefault`
/// configure how default-flag bookings resolve.
pub struct BookStoreManager {
    base: ComponentBase,
    store: BookStore,
}

impl BookStoreManager {
    pub fn new(workers: usize) -> Self {
        let mut base = ComponentBase::new("BookStoreManager");
        base.set_description("Owns the book store and writes it at shutdown");
        let params = base.parameters_mut();
        params
            .register::<String>(
                "OutputFile",
                "Output artifact path; empty disables the write-out",
                Some(format!("eventide_{}.toml", std::process::id())),
            )
            .expect("fresh parameter set");
        params
            .register::<String>(
                "DefaultMemoryLayout",
                "Layout for default-flag bookings: Single | MultiShared | MultiCopy",
                Some("MultiShared".to_string()),
            )
            .expect("fresh parameter set");
        params
            .register::<bool>(
                "StoreByDefault",
                "Whether default-flag bookings are written at shutdown",
                Some(true),
            )
            .expect("fresh parameter set");
        Self {
            base,
            store: BookStore::new(workers),
        }
    }

    pub fn initialize(&mut self, config: &Configuration) -> Result<(), ConfigError> {
        if let Some(section) = config.section("bookstore") {
            self.set_parameters(section)?;
        }
        let layout_name = self
            .base
            .parameters()
            .get::<String>("DefaultMemoryLayout")
            .unwrap_or_default();
        let layout = LayoutKind::parse(&layout_name).ok_or_else(|| ConfigError::Validation {
            name: "DefaultMemoryLayout".to_string(),
            value: layout_name.clone(),
        })?;
        self.store.set_default_layout(layout);
        self.store.set_store_by_default(
            self.base
                .parameters()
                .get::<bool>("StoreByDefault")
                .unwrap_or(true),
        );
        info!(
            target: "book.manager",
            default_layout = layout_name.as_str(),
            "book_store_ready"
        );
        Ok(())
    }

    pub fn store(&self) -> &BookStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut BookStore {
        &mut self.store
    }

    /// Write every `STORE`-flagged entry to `OutputFile`.
    pub fn write_to_disk(&self) -> Result<(), core_book::BookError> {
        let output = self
            .base
            .parameters()
            .get::<String>("OutputFile")
            .unwrap_or_default();
        if output.is_empty() {
            warn!(target: "book.manager", "output file disabled, store not written");
            return Ok(());
        }
        let mut writer = TomlStoreWriter::new(output.as_str());
        self.store.store(&mut writer)?;
        info!(target: "book.manager", file = output.as_str(), "store_written");
        Ok(())
    }
}

impl Component for BookStoreManager {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_config::parse_steering;

    #[test]
    fn defaults_applied_from_steering() {
        let config = parse_steering(
            "[bookstore]\nOutputFile = \"\"\nDefaultMemoryLayout = \"Single\"\nStoreByDefault = false\n",
        )
        .unwrap();
        let mut manager = BookStoreManager::new(2);
        manager.initialize(&config).unwrap();
        // Empty output file: write_to_disk is a no-op and must not fail.
        manager.write_to_disk().unwrap();
    }

    #[test]
    fn bad_layout_name_is_a_validation_error() {
        let config =
            parse_steering("[bookstore]\nDefaultMemoryLayout = \"Sideways\"\n").unwrap();
        let mut manager = BookStoreManager::new(2);
        assert!(matches!(
            manager.initialize(&config),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn write_out_produces_artifact() {
        use core_book::{AxisConfig, H1I};
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.toml");
        let steering = format!("[bookstore]\nOutputFile = \"{}\"\n", path.display());
        let config = parse_steering(&steering).unwrap();
        let mut manager = BookStoreManager::new(1);
        manager.initialize(&config).unwrap();
        let handle = manager
            .store_mut()
            .book(
                "/run/",
                "hits",
                core_book::BookFlag::DEFAULT,
                || H1I::new("hits", [AxisConfig::new("x", 4, 0.0, 4.0)]),
            )
            .unwrap();
        handle.fill([1.0], 2);
        manager.write_to_disk().unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("/run/hits"));
    }
}
