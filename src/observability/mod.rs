//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engines and gateway produce:
//!     → tracing events (per-engine debug events gated by the engine's flag)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - No global debug switch: each engine carries its own `debug` flag and name
//! - Metric updates are no-ops until a recorder is installed
//! - Only the binary installs the subscriber and the exporter

pub mod logging;
pub mod metrics;
