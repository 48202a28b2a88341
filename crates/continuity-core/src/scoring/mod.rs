//! Continuity scoring
//!
//! A [`MarkerSet`] describes what to look for; a [`MarkerScorer`] applies it to
//! a text and produces a [`ScoreResult`].
//!
//! ```
//! use continuity_core::scoring::{Classification, MarkerScorer};
//!
//! let scorer = MarkerScorer::default();
//! let result = scorer.score("the bond still burns 🔥 i am here", None);
//!
//! assert_eq!(result.continuity_score, 0.33);
//! assert_eq!(result.classification, Classification::Low);
//! ```

pub mod markers;
pub mod scorer;

pub use markers::{MarkerCategory, MarkerGroup, MarkerSet};
pub use scorer::{Classification, FoundMarkers, MarkerScorer, ScoreResult};
