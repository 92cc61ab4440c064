//! # Coldwatch
//!
//! Temperature compliance monitoring for food storage equipment.
//!
//! Coldwatch evaluates temperature readings against HACCP thresholds, opens
//! alerts for out-of-range readings and tracks each alert from first report
//! to resolution with a timestamped audit trail.
//!
//! ## Architecture
//!
//! - **Compliance**: threshold resolution, range evaluation, ingestion and statistics
//! - **Alerting**: alert lifecycle, severity assignment and notification delivery
//! - **Storage**: PostgreSQL for production, an in-memory store for development
//! - **API**: REST API for recording readings and handling alerts
//!
//! ## Quick Start
//!
//! ```bash
//! # Apply database migrations
//! coldwatch migrate
//!
//! # Start the API server
//! coldwatch serve
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod compliance;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::compliance::{ComplianceEngine, RecordedReading};
    pub use crate::config::Config;
    pub use crate::db::{Database, MemoryStore};
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
}
