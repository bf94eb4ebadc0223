//! Dumper driver
//!
//! A [`Dumper`] turns source rows of one entity type into [`Item`]s.
//! [`run_dumper`] feeds it rows, writes what comes back and keeps count.
//!
//! Per-record outcomes of [`Dumper::process_record`]:
//!
//! - `Ok(Some(item))`: write the item
//! - `Ok(None)`: the dumper filtered the row
//! - `Err(DanglingReference)`: something the row needs was never written
//!   (for example a withdrawn marker); drop this one row and carry on
//! - `Err(DuplicateId)`: a bug in the dumper; abort it

use crate::context::ItemContext;
use crate::error::Result;
use crate::item::Item;
use crate::registry::RegistryError;
use serde::Serialize;
use tracing::{debug, info};

/// Progress is logged every this many written items
pub const PROGRESS_EVERY: usize = 1000;

pub trait Dumper {
    /// One source row
    type Record;

    /// Class name, also the default file stem
    fn name(&self) -> &str;

    fn file_name(&self) -> String {
        format!("{}.xml", self.name())
    }

    /// Runs before the first record; returning false cancels the dump
    fn pre_dump(&mut self, _ctx: &mut ItemContext) -> Result<bool> {
        Ok(true)
    }

    fn process_record(
        &mut self,
        ctx: &mut ItemContext,
        record: Self::Record,
    ) -> std::result::Result<Option<Item>, RegistryError>;

    fn post_dump(&mut self, _ctx: &mut ItemContext) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DumpStats {
    pub dumper: String,
    pub seen: usize,
    pub written: usize,
    pub filtered: usize,
    pub skipped_dangling: usize,
    pub cancelled: bool,
}

/// Drive one dumper over `records`, writing into its own item file
pub fn run_dumper<D, I>(ctx: &mut ItemContext, dumper: &mut D, records: I) -> Result<DumpStats>
where
    D: Dumper,
    I: IntoIterator<Item = D::Record>,
{
    let mut stats = DumpStats {
        dumper: dumper.name().to_string(),
        ..DumpStats::default()
    };
    info!(dumper = %stats.dumper, "Starting dump");

    ctx.open_output(&dumper.file_name())?;
    if !dumper.pre_dump(ctx)? {
        info!(dumper = %stats.dumper, "Dump cancelled by pre-dump step");
        stats.cancelled = true;
        return Ok(stats);
    }

    for record in records {
        stats.seen += 1;
        match dumper.process_record(ctx, record) {
            Ok(Some(item)) => {
                ctx.write_item(&item)?;
                stats.written += 1;
                if stats.written % PROGRESS_EVERY == 0 {
                    info!(dumper = %stats.dumper, written = stats.written, "Dump progress");
                }
            },
            Ok(None) => stats.filtered += 1,
            Err(e) if e.is_skippable() => {
                debug!(dumper = %stats.dumper, record = stats.seen, error = %e, "Skipping record");
                stats.skipped_dangling += 1;
            },
            Err(e) => return Err(e.into()),
        }
    }

    dumper.post_dump(ctx)?;
    info!(
        dumper = %stats.dumper,
        seen = stats.seen,
        written = stats.written,
        filtered = stats.filtered,
        skipped_dangling = stats.skipped_dangling,
        "Finished dump"
    );
    Ok(stats)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::registry::{Registry, TypeKey};
    use tempfile::TempDir;

    struct Cancelling;

    impl Dumper for Cancelling {
        type Record = i64;

        fn name(&self) -> &str {
            "Cancelled"
        }

        fn pre_dump(&mut self, _ctx: &mut ItemContext) -> Result<bool> {
            Ok(false)
        }

        fn process_record(
            &mut self,
            _ctx: &mut ItemContext,
            _record: i64,
        ) -> std::result::Result<Option<Item>, RegistryError> {
            unreachable!("cancelled dumps see no records")
        }
    }

    /// Writes a marker per even key and defines the same key twice on 99
    struct EvenMarkers;

    impl Dumper for EvenMarkers {
        type Record = i64;

        fn name(&self) -> &str {
            "Marker"
        }

        fn process_record(
            &mut self,
            ctx: &mut ItemContext,
            key: i64,
        ) -> std::result::Result<Option<Item>, RegistryError> {
            if key % 2 != 0 && key != 99 {
                return Ok(None);
            }
            let key = if key == 99 { 2 } else { key };
            let id = ctx.define_id(TypeKey::MARKER, Some(key))?;
            Ok(Some(Item::new("Marker", id)))
        }
    }

    #[test]
    fn test_cancelled_dump() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ItemContext::new(Registry::default(), dir.path());
        let stats = run_dumper(&mut ctx, &mut Cancelling, vec![1, 2]).unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.seen, 0);
    }

    #[test]
    fn test_filtered_and_fatal_records() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ItemContext::new(Registry::default(), dir.path());
        let stats = run_dumper(&mut ctx, &mut EvenMarkers, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(stats.written, 2);
        assert_eq!(stats.filtered, 2);
        assert_eq!(stats.dumper, "Marker");

        let err = run_dumper(&mut ctx, &mut EvenMarkers, vec![99]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::DumpError::Registry(RegistryError::DuplicateId { .. })
        ));
    }
}
