//! Pipeline error types
//!
//! Errors surfaced by the pipeline's admin-facing operations. Hot-path
//! failures never travel as errors: decode failures are logged and
//! dropped (or promoted to fatal in strict mode) and output failures are
//! retried inside the batcher.

use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Action index outside the configured chain
    #[error("unknown action index {0}")]
    UnknownAction(usize),

    /// Action has no `metric_name` configured
    #[error("action {0} has no metric_name configured")]
    MetricNotConfigured(usize),

    /// Sample requested while no worker is processing events
    #[error("there are no active processors")]
    NoActiveProcessors,

    /// Another sample request is already parked
    #[error("a sample request is already in progress")]
    SampleBusy,

    /// No worker produced a snapshot within the time bound
    #[error("timed out waiting for an event to pass the action")]
    SampleTimeout,
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::UnknownAction(5);
        assert!(err.to_string().contains('5'));

        let err = PipelineError::MetricNotConfigured(2);
        assert!(err.to_string().contains("metric_name"));

        let err = PipelineError::SampleTimeout;
        assert!(err.to_string().contains("timed out"));
    }
}
