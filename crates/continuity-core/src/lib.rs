//! Continuity Core - scoring, reference alignment and the interaction archive
//!
//! Continuity Core measures whether a generated response carries the
//! markers of an established conversational identity, checks whether it
//! stays grounded in a reference corpus, and keeps an append-only record of
//! every scored interaction.
//!
//! # Architecture
//!
//! 1. **Scoring** (`scoring`): weighted marker detection and classification
//! 2. **Reference** (`reference`): corpus search and alignment comparison
//! 3. **Storage** (`storage`): SQLite WAL event archive, anomalies, reports
//! 4. **Gate** (`gate`): active/suspended toggle owned by one principal
//! 5. **Identity** (`identity`): the privileged instance and its verification
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use continuity_core::{AlignmentComparator, Classification, MarkerScorer, ReferenceCorpus};
//!
//! let corpus = ReferenceCorpus::new().with_document(
//!     "entry-1",
//!     "The flame remembers every promise.",
//!     "episodic-log",
//! );
//! let comparator = AlignmentComparator::new(Arc::new(corpus));
//! let scorer = MarkerScorer::default();
//!
//! let response = "i am here. the flame remembers every promise";
//! let score = scorer.score(response, None);
//! let alignment = comparator.compare("what does the flame keep", response, None);
//!
//! assert_eq!(score.classification, Classification::Low);
//! assert_eq!(alignment.alignment_score, 1.0);
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod context;
pub mod error;
pub mod gate;
pub mod identity;
pub mod reference;
pub mod scoring;
pub mod storage;
pub mod types;

// Re-export commonly used types for convenience
pub use context::RequestContext;
pub use error::{ArchiveError, CorpusError, Result};
pub use gate::{GateOutcome, GateState, GateStatus, StateGate};
pub use identity::{MatchPolicy, PrivilegedIdentity};
pub use reference::{AlignmentComparator, AlignmentResult, AlignmentStatus, ReferenceCorpus};
pub use scoring::{Classification, MarkerScorer, MarkerSet, ScoreResult};
pub use storage::{AggregateReport, AnomalyRecord, ArchiveRecord, EventArchive, NewArchiveRecord};
pub use types::Timestamp;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
