pub mod classifier;
pub mod retry;
pub mod types;

#[cfg(test)]
mod tests;

pub use classifier::{ClassifyFn, ErrorClassifier, classify_generic, classify_http_status};
pub use retry::{AttemptError, RetryInvoker, RetryStatistics};
pub use types::*;
