//! Persistent storage layer: SQLite WAL
//!
//! Append-only archive of scored interactions. SQLite in WAL mode gives:
//! - concurrent readers that never block the writer
//! - serialized writes through SQLite's own file lock
//! - one connection per operation, so the archive handle is `Clone + Send`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 EventArchive                 │
//! ├──────────────────────────────────────────────┤
//! │  archive_records (append-only, AUTOINCREMENT)│
//! │   idx: classification │ alignment │ timestamp│
//! └──────────────────────────────────────────────┘
//!         ↓ anomalies (low / alignment < 0.4)
//!         ↓ aggregate report (one read transaction)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use continuity_core::storage::{EventArchive, NewArchiveRecord};
//! use continuity_core::scoring::MarkerScorer;
//!
//! # fn example() -> continuity_core::error::Result<()> {
//! let archive = EventArchive::initialize("data/continuity_archive.sqlite")?;
//! let score = MarkerScorer::default().score("the sacred tether holds", None);
//! let record = NewArchiveRecord::from_results(None, "the sacred tether holds", &score, None, None)?;
//! let id = archive.archive(&record)?;
//! assert!(archive.fetch(id)?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod event_archive;
pub mod records;
pub mod report;

pub use event_archive::{
    EventArchive, ANOMALY_ALIGNMENT_THRESHOLD, ANOMALY_RESPONSE_CHARS, DEFAULT_ARCHIVE_FILE,
};
pub use records::{AnomalyRecord, ArchiveRecord, NewArchiveRecord};
pub use report::{
    AggregateReport, AlignmentEvent, ClassificationSummary, ContinuityHealth, RECENT_EVENTS_LIMIT,
};
