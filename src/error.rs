use thiserror::Error;

use crate::inference::InferenceError;
use crate::state_machine::State;

/// Failure signal raised by a collaborator (loader, task body, recovery step).
///
/// The executor never lets these escape: each one is turned into a state
/// transition at the boundary that produced it.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid goal: {0}")]
    InvalidGoal(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Inference backend error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Blocking task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Collaborator panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

/// Misuse of an [`ActionExecutor`](crate::executor::ActionExecutor).
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Executor is in terminal state {state}; call reset() before executing a new goal")]
    NotReset { state: State },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_reset_display() {
        let err = ExecutorError::NotReset {
            state: State::Failed,
        };
        assert_eq!(
            err.to_string(),
            "Executor is in terminal state FAILED; call reset() before executing a new goal"
        );
    }

    #[test]
    fn inference_error_converts() {
        let err: ActionError = InferenceError::ApiError {
            status: 503,
            message: "warming up".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Inference backend error: API error (status 503): warming up"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ActionError>();
        assert_send_sync::<ExecutorError>();
    }
}
