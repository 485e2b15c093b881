//! Collaborator trait definitions for question banks and attempt storage.
//!
//! These async traits are implemented by the `examkit-store` crate (and by
//! whatever real document store a deployment sits on). They return
//! `anyhow::Result` so implementations keep their own error types; the
//! session maps failures into `EngineError` at its boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Answer, Attempt, AttemptStatus, Question, QuestionBank};

// ---------------------------------------------------------------------------
// Question bank provider
// ---------------------------------------------------------------------------

/// Read-only access to question banks and the questions they list.
#[async_trait]
pub trait QuestionBankProvider: Send + Sync {
    /// Fetch a bank by id. `Ok(None)` means the bank does not exist.
    async fn get_bank(&self, bank_id: &str) -> anyhow::Result<Option<QuestionBank>>;

    /// Fetch a question by id. `Ok(None)` means the id no longer resolves;
    /// the resolver skips such ids rather than failing.
    async fn get_question(&self, question_id: &str) -> anyhow::Result<Option<Question>>;
}

// ---------------------------------------------------------------------------
// Attempt repository
// ---------------------------------------------------------------------------

/// Durable storage for attempt records, keyed by (user, test).
///
/// Implementations must offer conditional creation — `create_attempt` must
/// not insert a second record while one already exists for the pair — and
/// idempotent patch application: re-applying the same completed-state patch
/// is a no-op.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Find the completed attempt for this (user, test) pair, if any.
    async fn find_completed_attempt(
        &self,
        user_id: &str,
        test_id: &str,
    ) -> anyhow::Result<Option<Attempt>>;

    /// Create (or resume) the single attempt record for this pair with
    /// `status = in_progress`. Fails if a completed attempt exists.
    async fn create_attempt(&self, user_id: &str, test_id: &str) -> anyhow::Result<Attempt>;

    /// Apply a patch to an existing attempt record in place.
    async fn update_attempt(&self, attempt_id: &Uuid, patch: &AttemptPatch) -> anyhow::Result<()>;
}

/// A partial update to an attempt record. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptPatch {
    #[serde(default)]
    pub status: Option<AttemptStatus>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub answers: Option<Vec<Answer>>,
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub duration_used_seconds: Option<u64>,
}

impl AttemptPatch {
    /// A mid-session patch carrying only the current answer snapshot.
    pub fn progress(answers: Vec<Answer>) -> Self {
        Self {
            answers: Some(answers),
            ..Self::default()
        }
    }

    /// The one-and-only completion patch for an attempt.
    pub fn completion(
        answers: Vec<Answer>,
        score: u8,
        completed_at: DateTime<Utc>,
        duration_used_seconds: u64,
    ) -> Self {
        Self {
            status: Some(AttemptStatus::Completed),
            completed_at: Some(completed_at),
            answers: Some(answers),
            score: Some(score),
            duration_used_seconds: Some(duration_used_seconds),
        }
    }

    /// Whether this patch marks the attempt completed.
    pub fn is_completion(&self) -> bool {
        self.status == Some(AttemptStatus::Completed)
    }

    /// Apply this patch to a record in place, honoring the idempotence rule:
    /// re-applying a completion patch to an already-completed attempt leaves
    /// it untouched. Returns `false` when skipped for that reason.
    pub fn apply_to(&self, attempt: &mut Attempt) -> bool {
        if attempt.status == AttemptStatus::Completed && self.is_completion() {
            return false;
        }
        if let Some(status) = self.status {
            attempt.status = status;
        }
        if let Some(completed_at) = self.completed_at {
            attempt.completed_at = Some(completed_at);
        }
        if let Some(answers) = &self.answers {
            attempt.answers = answers.clone();
        }
        if let Some(score) = self.score {
            attempt.score = Some(score);
        }
        if let Some(duration) = self.duration_used_seconds {
            attempt.duration_used_seconds = Some(duration);
        }
        true
    }
}
