//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → audit.rs   (security violations, via AuditSink)
//!     → perf.rs    (operation timings, via PerformanceCollector)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → External audit store (AuditSink implementors)
//! ```

pub mod audit;
pub mod logging;
pub mod metrics;
pub mod perf;

pub use audit::{AuditContext, AuditSink, SecurityEventType, TracingAuditSink};
pub use perf::{MetricsCollector, OperationTimer, PerformanceCollector};
