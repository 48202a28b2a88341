//! Continuity Gateway - HTTP surface for the continuity core
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  Continuity Gateway                   │
//! ├──────────────────────────────────────────────────────┤
//! │  TraceLayer → CORS → request counter → origin check   │
//! │                          │                            │
//! │          ┌───────────────┴───────────────┐            │
//! │   public reads                   secret-gated writes  │
//! │   /health /corpus/* /identity    /score /alignment    │
//! │   /archive/anomalies|report      /archive /gate/*     │
//! │   /gate/status                   /identity/verify     │
//! │          └───────────────┬───────────────┘            │
//! │    MarkerScorer · AlignmentComparator · EventArchive  │
//! │                     · StateGate                       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Without a configured secret the gateway runs locked down: protected
//! routes answer 403 and only the public reads are served.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod security;

pub use config::{GatewayConfig, IdentitySettings};
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, GatewayState, ServiceContext};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8001;

/// Default host
pub const DEFAULT_HOST: &str = "127.0.0.1";
