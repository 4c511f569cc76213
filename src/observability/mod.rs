//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Pipeline failures never become response failures, so logs and metrics
//!   are the only place errors are visible
//! - Metrics are cheap (atomic increments); recording with no exporter
//!   installed is a no-op, which keeps tests quiet

pub mod logging;
pub mod metrics;
