//! Reconciliation engine for syncing Clockify time entries into BambooHR.
//!
//! This crate contains the pure logic, with no I/O:
//! - Normalization: duration parsing, timezone conversion, minute rounding
//! - Mapping: source project/task names to destination ids
//! - Export: merging adjacent entries and flagging overlaps
//! - Sync: planning creates with duplicate suppression

pub mod convert;
pub mod destination;
pub mod entry;
pub mod export;
pub mod mapping;
pub mod normalize;
pub mod sync;
pub mod types;

pub use convert::{
    Conversion, ConvertedEntry, NameLookup, UnmappedEntry, UnmappedReason, convert_entry,
    fill_unmapped, unmapped_keys,
};
pub use destination::{
    Catalogue, CatalogueError, DestinationProject, DestinationTask, parse_timesheet_data,
};
pub use entry::{NormalizedEntry, RawTimeEntry, TimeInterval};
pub use export::{
    ExportDocument, ExportResult, Overlap, build_export, detect_overlaps, merge_adjacent,
    sort_entries,
};
pub use mapping::{
    MappingEntry, MappingKey, MappingOutcome, MappingTable, SkipUnmapped, UnmappedResolver,
};
pub use normalize::{LocalInterval, TimezoneError, local_day_bounds, resolve_timezone};
pub use sync::{
    DedupKey, EntryReport, EntryWriter, ExistingEntry, PushEntry, SkipReason, SyncMode,
    SyncOutcome, SyncPlanner, SyncResult,
};
pub use types::{
    DestProjectId, DestTaskId, EntryId, MappingAction, SourceProjectId, SourceTaskId,
    ValidationError,
};
