use thiserror::Error;

/// Error taxonomy of the quiz engine.
///
/// `SubmissionRejected`, `NetworkFailure` and `ValidationUnavailable` are
/// recoverable by a user-driven action (reload / retry / keep basic score).
/// The engine itself never retries a failed collaborator call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Quiz payload (or grading-result shape) cannot be decoded. Fatal for
    /// that quiz, aborts the load.
    #[error("malformed question payload: {0}")]
    MalformedQuestion(String),

    /// Question, blank or jump index outside the valid range. Should never
    /// happen from a well-behaved UI.
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// An answer setter was applied to a question of a different type.
    #[error("answer shape does not match question type at index {index}")]
    AnswerMismatch { index: usize },

    /// An event arrived in a state with no matching transition.
    #[error("event '{event}' is not valid while the session is {state}")]
    InvalidTransition {
        event: &'static str,
        state: &'static str,
    },

    /// The grading service does not know the quiz, question or attempt id.
    /// The client state is stale; reload the quiz before retrying.
    #[error("submission rejected by grading service: {0}")]
    SubmissionRejected(String),

    /// Transport-level failure talking to a collaborator.
    #[error("collaborator unreachable: {0}")]
    NetworkFailure(String),

    /// Revalidation was requested but no detailed breakdown exists for the
    /// attempt. The basic score already held remains authoritative.
    #[error("no detailed validation is available for this attempt")]
    ValidationUnavailable,
}

impl EngineError {
    /// True for errors the user can recover from without restarting the
    /// session (reload quiz, retry submit, fall back to the basic score).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::SubmissionRejected(_)
                | EngineError::NetworkFailure(_)
                | EngineError::ValidationUnavailable
        )
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::NetworkFailure(err.to_string())
    }
}
