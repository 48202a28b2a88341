//! Reference corpus and alignment comparison
//!
//! The corpus is owned by the caller and shared read-only with the
//! comparator for its whole lifetime.
//!
//! ```
//! use std::sync::Arc;
//! use continuity_core::reference::{AlignmentComparator, AlignmentStatus, ReferenceCorpus};
//!
//! let comparator = AlignmentComparator::new(Arc::new(ReferenceCorpus::new()));
//! let result = comparator.compare("anything at all", "some response", None);
//!
//! assert_eq!(result.status, AlignmentStatus::Watch);
//! assert_eq!(result.alignment_score, 0.5);
//! ```

pub mod comparator;
pub mod corpus;

pub use comparator::{AlignmentComparator, AlignmentResult, AlignmentStatus, DEFAULT_SOURCE_TAGS};
pub use corpus::{CorpusStats, ReferenceCorpus, ReferenceDocument, SearchHit, DEFAULT_SNIPPET_MAX};
