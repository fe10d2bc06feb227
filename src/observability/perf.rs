//! Operation timing.
//!
//! Aggregation happens elsewhere; the engine only opens an operation and
//! closes it with an outcome.

use std::time::Instant;

use crate::observability::metrics;

/// An in-flight operation. Consumed by exactly one outcome call.
pub trait OperationTimer: Send {
    fn success(self: Box<Self>);
    fn error(self: Box<Self>, reason: &str);
}

/// Opens timed operations.
pub trait PerformanceCollector: Send + Sync {
    fn start_operation(&self, name: &'static str, context: &str) -> Box<dyn OperationTimer>;
}

/// Records operation durations into the metrics histogram.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

struct MetricsTimer {
    name: &'static str,
    context: String,
    started: Instant,
}

impl OperationTimer for MetricsTimer {
    fn success(self: Box<Self>) {
        metrics::record_operation(self.name, "success", self.started.elapsed());
    }

    fn error(self: Box<Self>, reason: &str) {
        tracing::debug!(operation = self.name, context = %self.context, reason, "Operation failed");
        metrics::record_operation(self.name, "error", self.started.elapsed());
    }
}

impl PerformanceCollector for MetricsCollector {
    fn start_operation(&self, name: &'static str, context: &str) -> Box<dyn OperationTimer> {
        Box::new(MetricsTimer {
            name,
            context: context.to_string(),
            started: Instant::now(),
        })
    }
}
