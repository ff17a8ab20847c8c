//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → Log aggregation (stdout, background log file)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Expected outcomes (sentinel mismatch, over-cap rejection) never log
//!   above debug; they are admission control working as intended
//! - Metrics are cheap (atomic increments) and safe to call before the
//!   exporter is installed

pub mod logging;
pub mod metrics;
