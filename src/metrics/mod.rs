//! Operation tracking and performance reporting.

pub mod collector;
pub mod types;

#[cfg(test)]
mod tests;

pub use collector::MetricsCollector;
pub use types::{
    MetricsThresholds, OperationContext, OperationError, OperationResult, PerformanceMetrics,
    PerformanceReport, ProviderCounters, ResourceSnapshot,
};
