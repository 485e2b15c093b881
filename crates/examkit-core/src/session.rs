//! Session controller: the state machine that ties resolution, answering,
//! the clock, scoring, and attempt persistence together.
//!
//! One `ExamSession` owns one attempt from `Ready` through `Completed`. All
//! operations run as discrete `&mut self` steps, so the only submission race
//! — operator submit vs. clock expiry — is resolved by a synchronous state
//! check with no suspension point between check and flip.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::answers::AnswerStore;
use crate::clock::ExamClock;
use crate::error::EngineError;
use crate::model::{Answer, AnswerValue, Attempt, Question, Test};
use crate::resolver::resolve_question_set;
use crate::scoring::{grade, GradeSummary};
use crate::traits::{AttemptPatch, AttemptRepository, QuestionBankProvider};

/// Longest delay between persistence retries.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Tuning knobs for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Retries after the first failed completion write.
    pub max_persist_retries: u32,
    /// Delay before the first retry; doubled per retry, capped at 30s.
    pub retry_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_persist_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// What caused a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    /// The operator's explicit submit action.
    Operator,
    /// The clock's one-shot expiry signal.
    TimeExpired,
}

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Ready,
    InProgress,
    Submitting,
    Completed,
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Ready => "ready",
            SessionPhase::InProgress => "in_progress",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Completed => "completed",
        }
    }
}

/// The graded result of a submitted attempt.
#[derive(Debug, Clone)]
pub struct ExamOutcome {
    pub attempt_id: Uuid,
    pub grade: GradeSummary,
    pub passed: bool,
    pub completed_at: DateTime<Utc>,
    pub duration_used_seconds: u64,
    /// The answer snapshot frozen at the `Submitting` transition — the one
    /// and only input grading saw.
    pub answers: Vec<Answer>,
}

/// Internal state. The attempt record and the computed outcome live inside
/// the variants that own them, so a `Completed` session always has both.
enum State {
    Ready,
    InProgress { attempt: Attempt },
    Submitting { attempt: Attempt, outcome: ExamOutcome },
    Completed { attempt: Attempt, outcome: ExamOutcome },
}

impl std::fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Ready => "Ready",
            State::InProgress { .. } => "InProgress",
            State::Submitting { .. } => "Submitting",
            State::Completed { .. } => "Completed",
        };
        f.debug_struct("ExamSession")
            .field("user_id", &self.user_id)
            .field("questions", &self.questions.len())
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

/// One live examination attempt.
pub struct ExamSession {
    test: Test,
    user_id: String,
    questions: Vec<Question>,
    answers: AnswerStore,
    clock: ExamClock,
    state: State,
    repo: Arc<dyn AttemptRepository>,
    config: SessionConfig,
}

impl ExamSession {
    /// Load a session into `Ready`: resolve the question set and check that
    /// no completed attempt exists for this (user, test) pair.
    ///
    /// Refusals surface as typed errors: [`EngineError::BankNotFound`] /
    /// [`EngineError::EmptyQuestionSet`] when resolution fails,
    /// [`EngineError::AlreadyCompleted`] when the pair is already done.
    pub async fn load(
        test: Test,
        user_id: impl Into<String>,
        bank: &dyn QuestionBankProvider,
        repo: Arc<dyn AttemptRepository>,
        config: SessionConfig,
    ) -> Result<Self, EngineError> {
        let mut rng = StdRng::from_entropy();
        Self::load_with_rng(test, user_id, bank, repo, config, &mut rng).await
    }

    /// `load` with an injected RNG for deterministic shuffles.
    pub async fn load_with_rng(
        test: Test,
        user_id: impl Into<String>,
        bank: &dyn QuestionBankProvider,
        repo: Arc<dyn AttemptRepository>,
        config: SessionConfig,
        rng: &mut impl Rng,
    ) -> Result<Self, EngineError> {
        let user_id = user_id.into();

        let questions = resolve_question_set(&test, bank, rng).await?;

        let existing = repo
            .find_completed_attempt(&user_id, &test.id)
            .await
            .map_err(|source| EngineError::Persistence { attempts: 1, source })?;
        if existing.is_some() {
            tracing::info!(
                "refusing session: user '{user_id}' already completed test '{}'",
                test.id
            );
            return Err(EngineError::AlreadyCompleted {
                user_id,
                test_id: test.id,
            });
        }

        let answers = AnswerStore::seed(&questions);
        let clock = ExamClock::new(test.duration_seconds);
        tracing::info!(
            "session ready: test '{}', {} question(s), {}s on the clock",
            test.id,
            questions.len(),
            test.duration_seconds
        );

        Ok(Self {
            test,
            user_id,
            questions,
            answers,
            clock,
            state: State::Ready,
            repo,
            config,
        })
    }

    /// `Ready → InProgress`: persist the attempt record and start the clock.
    pub async fn begin(&mut self) -> Result<(), EngineError> {
        if !matches!(self.state, State::Ready) {
            return Err(self.invalid("begin"));
        }

        let attempt = self
            .repo
            .create_attempt(&self.user_id, &self.test.id)
            .await
            .map_err(|source| EngineError::Persistence {
                attempts: 1,
                source,
            })?;
        tracing::info!(
            "attempt {} in progress: user '{}', test '{}'",
            attempt.id,
            self.user_id,
            self.test.id
        );

        self.state = State::InProgress { attempt };
        self.clock.start();
        Ok(())
    }

    /// Submit the attempt, from the operator or from the expiry signal.
    ///
    /// Idempotent under racing triggers: the first call flips the state to
    /// `Submitting` before any await, so a second trigger finds `Submitting`
    /// or `Completed` and does not grade or write again. A call that finds a
    /// previous write failure (still `Submitting`) retries only the write —
    /// the cached outcome is never recomputed or discarded.
    pub async fn submit(&mut self, trigger: SubmitTrigger) -> Result<ExamOutcome, EngineError> {
        match std::mem::replace(&mut self.state, State::Ready) {
            State::Ready => Err(self.invalid("submit")),
            State::Completed { attempt, outcome } => {
                tracing::debug!("submit ({trigger:?}) after completion is a no-op");
                let result = outcome.clone();
                self.state = State::Completed { attempt, outcome };
                Ok(result)
            }
            State::Submitting { attempt, outcome } => {
                tracing::info!("retrying completion write for attempt {}", attempt.id);
                self.state = State::Submitting { attempt, outcome };
                self.persist_completion().await
            }
            State::InProgress { attempt } => {
                // Submission-in-flight guard: snapshot, grade, and flip to
                // Submitting happen synchronously before the first await.
                let answers = self.answers.snapshot();
                let summary = grade(&self.questions, &answers);
                let outcome = ExamOutcome {
                    attempt_id: attempt.id,
                    passed: summary.passed(self.test.passing_score),
                    completed_at: Utc::now(),
                    duration_used_seconds: self.clock.elapsed_seconds(),
                    answers,
                    grade: summary,
                };
                tracing::info!(
                    "submitting attempt {} ({trigger:?}): score {}, {}s used",
                    attempt.id,
                    outcome.grade.score,
                    outcome.duration_used_seconds
                );
                self.state = State::Submitting { attempt, outcome };
                self.persist_completion().await
            }
        }
    }

    /// Write the completion patch with retry and backoff, then move to
    /// `Completed`. On exhausted retries the session stays `Submitting` with
    /// the outcome cached for a later retry.
    async fn persist_completion(&mut self) -> Result<ExamOutcome, EngineError> {
        let (attempt_id, patch, outcome) = match &self.state {
            State::Submitting { attempt, outcome } => (
                attempt.id,
                AttemptPatch::completion(
                    outcome.answers.clone(),
                    outcome.grade.score,
                    outcome.completed_at,
                    outcome.duration_used_seconds,
                ),
                outcome.clone(),
            ),
            _ => return Err(self.invalid("persist_completion")),
        };

        let mut delay = self.config.retry_delay;
        let mut last_error = None;
        for retry in 0..=self.config.max_persist_retries {
            if retry > 0 {
                tracing::warn!(
                    "completion write for attempt {attempt_id} failed, retry {retry} in {delay:?}"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }
            match self.repo.update_attempt(&attempt_id, &patch).await {
                Ok(()) => {
                    self.clock.stop();
                    self.state = match std::mem::replace(&mut self.state, State::Ready) {
                        State::Submitting { attempt, outcome } => {
                            State::Completed { attempt, outcome }
                        }
                        other => other,
                    };
                    tracing::info!(
                        "attempt {attempt_id} completed: score {}, passed: {}",
                        outcome.grade.score,
                        outcome.passed
                    );
                    return Ok(outcome);
                }
                Err(e) => last_error = Some(e),
            }
        }

        let attempts = self.config.max_persist_retries + 1;
        tracing::error!(
            "completion write for attempt {attempt_id} failed after {attempts} attempt(s); \
             score {} is retained, submit again to retry",
            outcome.grade.score
        );
        Err(EngineError::Persistence {
            attempts,
            source: last_error
                .unwrap_or_else(|| anyhow::anyhow!("attempt write failed with no error detail")),
        })
    }

    /// Persist the current answer snapshot mid-session. Callers pick the
    /// cadence; the completion patch always carries the final snapshot, so
    /// skipping this never loses the submitted answers.
    pub async fn sync(&mut self) -> Result<(), EngineError> {
        let attempt_id = match &self.state {
            State::InProgress { attempt } => attempt.id,
            _ => return Err(self.invalid("sync")),
        };
        let patch = AttemptPatch::progress(self.answers.snapshot());
        self.repo
            .update_attempt(&attempt_id, &patch)
            .await
            .map_err(|source| EngineError::Persistence {
                attempts: 1,
                source,
            })
    }

    // -- in-progress operations -------------------------------------------

    /// Store an answer. `InProgress` only.
    pub fn set_answer(
        &mut self,
        question_id: &str,
        value: AnswerValue,
    ) -> Result<(), EngineError> {
        self.ensure_in_progress("set_answer")?;
        self.answers.set_answer(question_id, value)
    }

    /// Blank an answer. `InProgress` only.
    pub fn clear_answer(&mut self, question_id: &str) -> Result<(), EngineError> {
        self.ensure_in_progress("clear_answer")?;
        self.answers.clear_answer(question_id)
    }

    /// Flip a question's review flag. `InProgress` only.
    pub fn toggle_flag(&mut self, question_id: &str) -> Result<bool, EngineError> {
        self.ensure_in_progress("toggle_flag")?;
        self.answers.toggle_flag(question_id)
    }

    /// Accumulate time spent on a question. `InProgress` only.
    pub fn add_time(&mut self, question_id: &str, seconds: u64) -> Result<(), EngineError> {
        self.ensure_in_progress("add_time")?;
        self.answers.add_time(question_id, seconds);
        Ok(())
    }

    /// Suspend the countdown. `InProgress` only.
    pub fn pause(&self) -> Result<(), EngineError> {
        self.ensure_in_progress("pause")?;
        self.clock.pause();
        Ok(())
    }

    /// Resume a paused countdown. `InProgress` only.
    pub fn resume(&self) -> Result<(), EngineError> {
        self.ensure_in_progress("resume")?;
        self.clock.resume();
        Ok(())
    }

    // -- read surface for the presentation layer --------------------------

    pub fn phase(&self) -> SessionPhase {
        match &self.state {
            State::Ready => SessionPhase::Ready,
            State::InProgress { .. } => SessionPhase::InProgress,
            State::Submitting { .. } => SessionPhase::Submitting,
            State::Completed { .. } => SessionPhase::Completed,
        }
    }

    pub fn test(&self) -> &Test {
        &self.test
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The resolved question list, in presentation order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.clock.remaining_seconds()
    }

    /// The attempt record, once `begin` has created it.
    pub fn attempt(&self) -> Option<&Attempt> {
        match &self.state {
            State::Ready => None,
            State::InProgress { attempt }
            | State::Submitting { attempt, .. }
            | State::Completed { attempt, .. } => Some(attempt),
        }
    }

    /// The computed outcome, once a submission has been triggered.
    pub fn outcome(&self) -> Option<&ExamOutcome> {
        match &self.state {
            State::Submitting { outcome, .. } | State::Completed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    /// Take the one-shot expiry receiver (available after `begin`). The
    /// holder awaits it and calls `submit(SubmitTrigger::TimeExpired)`; this
    /// signal is the only time-based submission trigger.
    pub fn take_expiry(&mut self) -> Option<tokio::sync::oneshot::Receiver<()>> {
        self.clock.take_expiry()
    }

    fn ensure_in_progress(&self, operation: &'static str) -> Result<(), EngineError> {
        match self.state {
            State::InProgress { .. } => Ok(()),
            _ => Err(EngineError::InvalidTransition {
                operation,
                state: self.phase().name(),
            }),
        }
    }

    fn invalid(&self, operation: &'static str) -> EngineError {
        EngineError::InvalidTransition {
            operation,
            state: self.phase().name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_persist_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn phase_names() {
        assert_eq!(SessionPhase::Ready.name(), "ready");
        assert_eq!(SessionPhase::InProgress.name(), "in_progress");
        assert_eq!(SessionPhase::Submitting.name(), "submitting");
        assert_eq!(SessionPhase::Completed.name(), "completed");
    }
}
