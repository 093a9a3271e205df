//! Coordinator error types.

/// Errors returned by the [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The coordinator must be started from within a Tokio runtime.
    #[error("no Tokio runtime available")]
    NoRuntime,

    /// The coordinator has been shut down and accepts no more events.
    #[error("coordinator is shut down")]
    ShutDown,
}
