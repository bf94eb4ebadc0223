//! Per-run output context
//!
//! The [`ItemContext`] owns the run's [`Registry`] and its item files. Dumpers
//! get ids, resolve references and write items only through it, so the
//! registry sees every emitted record exactly once.

use crate::error::{DumpError, Result};
use crate::item::Item;
use crate::registry::{ItemId, NaturalKey, Registry, RegistryError, RegistrySummary, TypeKey};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ITEMS_HEADER: &str = "<?xml version=\"1.0\"?>\n<items>\n";
pub const ITEMS_FOOTER: &str = "\n</items>\n";

pub struct ItemContext {
    registry: Registry,
    output_dir: PathBuf,
    outputs: BTreeMap<String, BufWriter<File>>,
    current: Option<String>,
}

impl ItemContext {
    pub fn new(registry: Registry, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            output_dir: output_dir.into(),
            outputs: BTreeMap::new(),
            current: None,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn define_id(&mut self, type_key: TypeKey, key: Option<NaturalKey>) -> std::result::Result<ItemId, RegistryError> {
        self.registry.define_id(type_key, key)
    }

    pub fn reference_id(&mut self, type_key: TypeKey, key: NaturalKey) -> std::result::Result<ItemId, RegistryError> {
        self.registry.reference_id(type_key, key)
    }

    pub fn register_alias(&mut self, dropped: ItemId, survivor: ItemId) -> bool {
        self.registry.register_alias(dropped, survivor)
    }

    /// Diagnostic side channel for dumpers
    pub fn log(&self, message: &str) {
        info!(target: "mgi_dump::dumper", "{}", message);
    }

    /// Make `name` the current output file, creating it on first use.
    ///
    /// A file is opened once per run; later calls with the same name switch
    /// back to it and keep appending.
    pub fn open_output(&mut self, name: &str) -> Result<()> {
        if !self.outputs.contains_key(name) {
            fs::create_dir_all(&self.output_dir)?;
            let path = self.output_dir.join(name);
            let mut writer = BufWriter::new(File::create(&path)?);
            writer.write_all(ITEMS_HEADER.as_bytes())?;
            info!(path = %path.display(), "Opened item file");
            self.outputs.insert(name.to_string(), writer);
        }
        self.current = Some(name.to_string());
        Ok(())
    }

    /// Render `item` into the current output file and record its id as
    /// written. Returns the id as recorded (after aliasing).
    ///
    /// The id counts as written only once the bytes are handed to the file.
    pub fn write_item(&mut self, item: &Item) -> Result<ItemId> {
        let id = self.registry.peek(item.id);
        if self.registry.is_strict() && self.registry.is_written(id) {
            return Err(RegistryError::DuplicateId { id }.into());
        }

        let name = self
            .current
            .as_deref()
            .ok_or_else(|| DumpError::config("no item file is open"))?;
        let writer = self
            .outputs
            .get_mut(name)
            .ok_or_else(|| DumpError::config(format!("item file {} is closed", name)))?;

        writer.write_all(item.render().as_bytes())?;
        Ok(self.registry.record_written(item.id)?)
    }

    /// Terminate and close every open item file
    pub fn close_outputs(&mut self) -> Result<()> {
        for (name, mut writer) in std::mem::take(&mut self.outputs) {
            writer.write_all(ITEMS_FOOTER.as_bytes())?;
            writer.flush()?;
            debug!(file = %name, "Closed item file");
        }
        self.current = None;
        Ok(())
    }

    /// Close the outputs and hand back the end-of-run accounting
    pub fn finish(mut self) -> Result<RegistrySummary> {
        self.close_outputs()?;
        let summary = self.registry.summary();
        info!(
            written = summary.written,
            aliases = summary.aliases,
            aliases_applied = summary.aliases_applied,
            "Run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_outputs_are_framed_and_reused() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ItemContext::new(Registry::default(), dir.path().join("out"));

        ctx.open_output("Marker.xml").unwrap();
        let id = ctx.define_id(TypeKey::MARKER, Some(1)).unwrap();
        ctx.write_item(&Item::new("Marker", id).attribute("symbol", "a")).unwrap();

        ctx.open_output("Other.xml").unwrap();
        ctx.open_output("Marker.xml").unwrap();
        let id = ctx.define_id(TypeKey::MARKER, Some(2)).unwrap();
        ctx.write_item(&Item::new("Marker", id)).unwrap();
        ctx.close_outputs().unwrap();

        let content = fs::read_to_string(dir.path().join("out/Marker.xml")).unwrap();
        assert!(content.starts_with(ITEMS_HEADER));
        assert!(content.ends_with(ITEMS_FOOTER));
        assert_eq!(content.matches("<item ").count(), 2);

        let other = fs::read_to_string(dir.path().join("out/Other.xml")).unwrap();
        assert_eq!(other, format!("{}{}", ITEMS_HEADER, ITEMS_FOOTER));
    }

    #[test]
    fn test_write_without_output_fails() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ItemContext::new(Registry::default(), dir.path());
        let id = ctx.define_id(TypeKey::MARKER, Some(1)).unwrap();
        assert!(matches!(
            ctx.write_item(&Item::new("Marker", id)),
            Err(DumpError::Config(_))
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_write_is_not_recorded() {
        // every write to /dev/full fails with ENOSPC
        let mut ctx = ItemContext::new(Registry::default(), "/dev");
        ctx.open_output("full").unwrap();
        let id = ctx.define_id(TypeKey::MARKER, Some(1)).unwrap();
        let item = Item::new("Marker", id).attribute("description", "x".repeat(64 * 1024));

        assert!(matches!(ctx.write_item(&item), Err(DumpError::Io(_))));
        assert!(!ctx.registry().is_written(id));
        assert!(ctx.reference_id(TypeKey::MARKER, 1).is_err());
    }

    #[test]
    fn test_written_id_is_not_written_twice() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ItemContext::new(Registry::default(), dir.path());
        ctx.open_output("Marker.xml").unwrap();
        let id = ctx.define_id(TypeKey::MARKER, Some(1)).unwrap();
        let item = Item::new("Marker", id);
        ctx.write_item(&item).unwrap();

        let err = ctx.write_item(&item).unwrap_err();
        assert!(matches!(err, DumpError::Registry(RegistryError::DuplicateId { .. })));

        let summary = ctx.finish().unwrap();
        assert_eq!(summary.written, 1);
        let content = fs::read_to_string(dir.path().join("Marker.xml")).unwrap();
        assert_eq!(content.matches("<item ").count(), 1);
    }
}
