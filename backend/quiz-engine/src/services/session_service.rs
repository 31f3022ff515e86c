use std::sync::Arc;

use crate::error::EngineError;
use crate::metrics::{
    record_session_abandoned, record_session_completed, record_session_started,
    QUIZ_SESSIONS_ACTIVE, QUIZ_SESSIONS_TOTAL,
};
use crate::models::{AnswerSheet, Attempt, Question, Quiz, ValidationResult};
use crate::services::grading_service::{GradingCoordinator, GradingService};
use crate::services::quiz_repository::QuizRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    InProgress,
    Submitting,
    Reviewing,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::InProgress => "in_progress",
            SessionState::Submitting => "submitting",
            SessionState::Reviewing => "reviewing",
        }
    }
}

/// Drives one user through a quiz: navigation, answer collection, submission
/// and review. Exactly one attempt is active per session; completing or
/// abandoning it clears the slot before a new one may start.
///
/// Methods take `&mut self`, so one event runs to completion (including its
/// awaited collaborator call) before the next is accepted. A driver that
/// spawns the fetch instead uses the `apply_*` pair with the epoch captured
/// before the call: results that arrive after `close` carry a stale epoch
/// and are discarded instead of resurrecting the session.
pub struct QuizSession {
    repository: Arc<dyn QuizRepository>,
    grading: GradingCoordinator,
    state: SessionState,
    quiz: Option<Quiz>,
    sheet: Option<AnswerSheet>,
    index: usize,
    attempt: Option<Attempt>,
    epoch: u64,
}

impl QuizSession {
    pub fn new(repository: Arc<dyn QuizRepository>, grading: Arc<dyn GradingService>) -> Self {
        Self {
            repository,
            grading: GradingCoordinator::new(grading),
            state: SessionState::Idle,
            quiz: None,
            sheet: None,
            index: 0,
            attempt: None,
            epoch: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Bumped on every `close`/successful `start`; collaborator completions
    /// are only applied when their captured epoch still matches.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref()
    }

    pub fn attempt(&self) -> Option<&Attempt> {
        self.attempt.as_ref()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.quiz.as_ref().and_then(|q| q.questions.get(self.index))
    }

    /// The progress indicator pair: (1-based current question, total).
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.quiz.as_ref().map(|q| (self.index + 1, q.len()))
    }

    pub fn is_answered(&self, index: usize) -> bool {
        self.sheet.as_ref().is_some_and(|s| s.is_answered(index))
    }

    pub fn answered_count(&self) -> usize {
        self.sheet.as_ref().map_or(0, AnswerSheet::answered_count)
    }

    // --- lifecycle -------------------------------------------------------

    /// Idle -> Loading -> InProgress (or back to Idle on a load failure).
    pub async fn start(&mut self, quiz_id: i64) -> Result<(), EngineError> {
        if self.state != SessionState::Idle {
            return Err(EngineError::InvalidTransition {
                event: "start",
                state: self.state.name(),
            });
        }

        self.state = SessionState::Loading;
        tracing::info!("Session loading quiz {}", quiz_id);

        let epoch = self.epoch;
        let result = self.repository.get_quiz(quiz_id).await;
        self.apply_loaded(epoch, result)
    }

    /// Apply a quiz-load completion. Stale completions (the session was
    /// closed while the fetch was in flight) are discarded silently.
    pub fn apply_loaded(
        &mut self,
        epoch: u64,
        result: Result<Quiz, EngineError>,
    ) -> Result<(), EngineError> {
        if epoch != self.epoch || self.state != SessionState::Loading {
            tracing::warn!(
                "Discarding quiz load for a stale session (epoch {} vs {}, state {})",
                epoch,
                self.epoch,
                self.state.name()
            );
            return Ok(());
        }

        match result {
            Ok(quiz) => {
                tracing::info!("Session started on quiz {} ('{}')", quiz.id, quiz.title);
                self.sheet = Some(AnswerSheet::for_quiz(&quiz));
                self.quiz = Some(quiz);
                self.index = 0;
                self.attempt = None;
                self.state = SessionState::InProgress;
                record_session_started();
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Quiz load failed: {}", e);
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Any state -> Idle. Discards the in-progress draft; nothing was
    /// persisted because nothing was submitted.
    pub fn close(&mut self) {
        if matches!(
            self.state,
            SessionState::InProgress | SessionState::Submitting
        ) {
            record_session_abandoned();
        }
        tracing::info!("Session closed from state {}", self.state.name());
        self.state = SessionState::Idle;
        self.quiz = None;
        self.sheet = None;
        self.attempt = None;
        self.index = 0;
        self.epoch += 1;
    }

    // --- navigation ------------------------------------------------------

    /// Advance to the next question. A no-op at the last question and
    /// outside `InProgress` (defensive against duplicate rapid input).
    pub fn next(&mut self) {
        if self.state != SessionState::InProgress {
            tracing::debug!("Ignoring next in state {}", self.state.name());
            return;
        }
        let len = self.quiz.as_ref().map_or(0, Quiz::len);
        if self.index + 1 < len {
            self.index += 1;
        }
    }

    /// Step back one question. A no-op at the first question.
    pub fn prev(&mut self) {
        if self.state != SessionState::InProgress {
            tracing::debug!("Ignoring prev in state {}", self.state.name());
            return;
        }
        if self.index > 0 {
            self.index -= 1;
        }
    }

    /// Jump straight to a question index (the question-list sidebar).
    pub fn jump(&mut self, index: usize) -> Result<(), EngineError> {
        if self.state != SessionState::InProgress {
            tracing::debug!("Ignoring jump in state {}", self.state.name());
            return Ok(());
        }
        let len = self.quiz.as_ref().map_or(0, Quiz::len);
        if index >= len {
            return Err(EngineError::IndexOutOfRange { index, len });
        }
        self.index = index;
        Ok(())
    }

    // --- answer collection ----------------------------------------------

    pub fn set_choice(&mut self, index: usize, option_index: usize) -> Result<(), EngineError> {
        self.sheet_mut("set_choice")?.set_choice(index, option_index)
    }

    pub fn set_text(&mut self, index: usize, text: &str) -> Result<(), EngineError> {
        self.sheet_mut("set_text")?.set_text(index, text)
    }

    pub fn set_blank(
        &mut self,
        index: usize,
        blank_index: usize,
        text: &str,
    ) -> Result<(), EngineError> {
        self.sheet_mut("set_blank")?.set_blank(index, blank_index, text)
    }

    fn sheet_mut(&mut self, event: &'static str) -> Result<&mut AnswerSheet, EngineError> {
        if self.state != SessionState::InProgress {
            return Err(EngineError::InvalidTransition {
                event,
                state: self.state.name(),
            });
        }
        self.sheet.as_mut().ok_or(EngineError::InvalidTransition {
            event,
            state: "in_progress without a loaded quiz",
        })
    }

    // --- submission ------------------------------------------------------

    /// InProgress (on the last question) -> Submitting -> Reviewing, or back
    /// to InProgress when grading fails so the user can re-submit.
    pub async fn submit(&mut self) -> Result<(), EngineError> {
        if self.state != SessionState::InProgress {
            return Err(EngineError::InvalidTransition {
                event: "submit",
                state: self.state.name(),
            });
        }
        let (quiz, sheet) = match (&self.quiz, &self.sheet) {
            (Some(quiz), Some(sheet)) => (quiz, sheet),
            _ => {
                return Err(EngineError::InvalidTransition {
                    event: "submit",
                    state: "in_progress without a loaded quiz",
                })
            }
        };
        if self.index + 1 != quiz.len() {
            return Err(EngineError::InvalidTransition {
                event: "submit",
                state: "in_progress before the final question",
            });
        }

        self.state = SessionState::Submitting;
        tracing::info!(
            "Submitting quiz {} ({} of {} questions answered)",
            quiz.id,
            sheet.answered_count(),
            quiz.len()
        );

        let epoch = self.epoch;
        let result = self.grading.submit(quiz, sheet).await;
        self.apply_graded(epoch, result)
    }

    /// Apply a grading completion. A result arriving for a closed session is
    /// discarded; a failure restores `InProgress` at the prior index so the
    /// same submit can be retried by the user.
    pub fn apply_graded(
        &mut self,
        epoch: u64,
        result: Result<Attempt, EngineError>,
    ) -> Result<(), EngineError> {
        if epoch != self.epoch || self.state != SessionState::Submitting {
            tracing::warn!(
                "Discarding grading result for a stale session (epoch {} vs {}, state {})",
                epoch,
                self.epoch,
                self.state.name()
            );
            return Ok(());
        }

        match result {
            Ok(attempt) => {
                tracing::info!("Attempt {} stored with score {}", attempt.id, attempt.score);
                self.attempt = Some(attempt);
                self.state = SessionState::Reviewing;
                record_session_completed();
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Grading failed, returning to in_progress: {}", e);
                self.state = SessionState::InProgress;
                Err(e)
            }
        }
    }

    // --- review ----------------------------------------------------------

    /// Request AI re-grading of the stored attempt. May be called repeatedly;
    /// each success replaces the attached breakdown. On
    /// `ValidationUnavailable` the basic score already held stays in place.
    pub async fn revalidate(&mut self) -> Result<(), EngineError> {
        if self.state != SessionState::Reviewing {
            return Err(EngineError::InvalidTransition {
                event: "revalidate",
                state: self.state.name(),
            });
        }
        let attempt = match &self.attempt {
            Some(attempt) => attempt,
            None => {
                return Err(EngineError::InvalidTransition {
                    event: "revalidate",
                    state: "reviewing without an attempt",
                })
            }
        };

        let epoch = self.epoch;
        let result = self.grading.revalidate(attempt).await;
        self.apply_revalidated(epoch, result)
    }

    /// Apply a revalidation completion; stale completions are discarded.
    pub fn apply_revalidated(
        &mut self,
        epoch: u64,
        result: Result<ValidationResult, EngineError>,
    ) -> Result<(), EngineError> {
        if epoch != self.epoch || self.state != SessionState::Reviewing {
            tracing::warn!(
                "Discarding revalidation for a stale session (epoch {} vs {})",
                epoch,
                self.epoch
            );
            return Ok(());
        }

        match (result, &mut self.attempt) {
            (Ok(validation), Some(attempt)) => {
                attempt.attach_validation(validation);
                tracing::info!("Attempt {} score is now {}", attempt.id, attempt.score);
                Ok(())
            }
            (Ok(_), None) => Ok(()),
            (Err(e), _) => {
                tracing::warn!("Revalidation failed: {}", e);
                Err(e)
            }
        }
    }

    /// Reviewing -> InProgress on the same quiz with a fresh answer sheet.
    pub fn retake(&mut self) -> Result<(), EngineError> {
        if self.state != SessionState::Reviewing {
            return Err(EngineError::InvalidTransition {
                event: "retake",
                state: self.state.name(),
            });
        }
        if let Some(sheet) = &mut self.sheet {
            sheet.reset();
        }
        self.index = 0;
        self.attempt = None;
        self.state = SessionState::InProgress;
        QUIZ_SESSIONS_TOTAL.with_label_values(&["retaken"]).inc();
        QUIZ_SESSIONS_ACTIVE.inc();
        tracing::info!("Session retaking quiz");
        Ok(())
    }
}
