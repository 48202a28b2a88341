//! Error types for Continuity Core
//!
//! Scoring, alignment and the state gate are total functions and never fail.
//! Only the archive and corpus loading touch the outside world, so only they
//! carry error types. We use `thiserror` for the Display/Error plumbing.

use thiserror::Error;

/// Result type alias for archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors raised by the event archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// SQLite rejected the statement or the database is unusable
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Filesystem errors while preparing the archive location
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The found-markers blob could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<ArchiveError>,
    },
}

/// Errors raised while loading a reference corpus
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid corpus document: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ArchiveError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ArchiveError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().context(f()))
    }
}
