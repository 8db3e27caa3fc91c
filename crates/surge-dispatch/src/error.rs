//! Dispatch error types.

use thiserror::Error;

/// Errors produced by the dispatch engine.
///
/// None of these are expected under correct use. They signal a broken
/// caller contract or a task that died, and are propagated to the top
/// level rather than handled in place.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dequeue called on an empty admission queue")]
    EmptyQueue,

    #[error("producer interval must be non-zero")]
    ZeroInterval,

    #[error("{task} task failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl DispatchError {
    pub(crate) fn task(task: impl Into<String>, source: tokio::task::JoinError) -> Self {
        Self::TaskFailed {
            task: task.into(),
            source,
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
