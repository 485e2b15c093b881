//! In-memory bank and attempt store.
//!
//! Backs single-process deployments and the engine's tests without a real
//! document store. The attempt store can inject write failures to exercise
//! the session's retry path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use examkit_core::model::{Attempt, AttemptStatus, Question, QuestionBank};
use examkit_core::traits::{AttemptPatch, AttemptRepository, QuestionBankProvider};

/// A `HashMap`-backed question bank provider.
#[derive(Debug, Default)]
pub struct MemoryBank {
    banks: HashMap<String, QuestionBank>,
    questions: HashMap<String, Question>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider holding one bank and its questions.
    pub fn with_bank(bank: QuestionBank, questions: Vec<Question>) -> Self {
        let mut provider = Self::new();
        provider.insert_bank(bank);
        for question in questions {
            provider.insert_question(question);
        }
        provider
    }

    pub fn insert_bank(&mut self, bank: QuestionBank) {
        self.banks.insert(bank.id.clone(), bank);
    }

    pub fn insert_question(&mut self, question: Question) {
        self.questions.insert(question.id.clone(), question);
    }
}

#[async_trait]
impl QuestionBankProvider for MemoryBank {
    async fn get_bank(&self, bank_id: &str) -> anyhow::Result<Option<QuestionBank>> {
        Ok(self.banks.get(bank_id).cloned())
    }

    async fn get_question(&self, question_id: &str) -> anyhow::Result<Option<Question>> {
        Ok(self.questions.get(question_id).cloned())
    }
}

/// An in-memory attempt repository keyed by (user, test).
///
/// Supports conditional creation (one record per pair, never a duplicate) and
/// idempotent completion patches. Instrumented with a write counter and
/// injectable update failures for retry tests.
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    attempts: Mutex<HashMap<(String, String), Attempt>>,
    update_calls: AtomicU32,
    failing_updates: AtomicU32,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `update_attempt` calls made, failed or not.
    pub fn update_calls(&self) -> u32 {
        self.update_calls.load(Ordering::Relaxed)
    }

    /// Make the next `count` updates fail.
    pub fn fail_next_updates(&self, count: u32) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    /// All stored attempts, in no particular order.
    pub fn all(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl AttemptRepository for MemoryAttemptStore {
    async fn find_completed_attempt(
        &self,
        user_id: &str,
        test_id: &str,
    ) -> anyhow::Result<Option<Attempt>> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), test_id.to_string()))
            .filter(|a| a.status == AttemptStatus::Completed)
            .cloned())
    }

    async fn create_attempt(&self, user_id: &str, test_id: &str) -> anyhow::Result<Attempt> {
        let key = (user_id.to_string(), test_id.to_string());
        let mut attempts = self.attempts.lock().unwrap();

        if let Some(existing) = attempts.get(&key) {
            match existing.status {
                AttemptStatus::Completed => {
                    anyhow::bail!(
                        "user '{user_id}' already has a completed attempt for test '{test_id}'"
                    );
                }
                // One record per pair: hand the in-progress attempt back
                // instead of inserting a second one.
                AttemptStatus::InProgress => {
                    tracing::info!(
                        "resuming in-progress attempt {} for user '{user_id}'",
                        existing.id
                    );
                    return Ok(existing.clone());
                }
            }
        }

        let attempt = Attempt {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            test_id: test_id.to_string(),
            status: AttemptStatus::InProgress,
            started_at: Utc::now(),
            completed_at: None,
            answers: vec![],
            score: None,
            duration_used_seconds: None,
        };
        attempts.insert(key, attempt.clone());
        Ok(attempt)
    }

    async fn update_attempt(&self, attempt_id: &Uuid, patch: &AttemptPatch) -> anyhow::Result<()> {
        self.update_calls.fetch_add(1, Ordering::Relaxed);

        let failing = self.failing_updates.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_updates.store(failing - 1, Ordering::SeqCst);
            anyhow::bail!("injected update failure ({failing} left)");
        }

        let mut attempts = self.attempts.lock().unwrap();
        let attempt = attempts
            .values_mut()
            .find(|a| a.id == *attempt_id)
            .ok_or_else(|| anyhow::anyhow!("attempt {attempt_id} not found"))?;

        if !patch.apply_to(attempt) {
            tracing::debug!("attempt {attempt_id} already completed, patch skipped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examkit_core::model::Answer;

    #[tokio::test]
    async fn create_is_conditional_per_pair() {
        let store = MemoryAttemptStore::new();
        let first = store.create_attempt("user-a", "test-1").await.unwrap();
        let second = store.create_attempt("user-a", "test-1").await.unwrap();
        assert_eq!(first.id, second.id, "in-progress attempt is resumed, not duplicated");
        assert_eq!(store.all().len(), 1);

        // a different pair gets its own record
        store.create_attempt("user-b", "test-1").await.unwrap();
        assert_eq!(store.all().len(), 2);
    }

    #[tokio::test]
    async fn create_refuses_after_completion() {
        let store = MemoryAttemptStore::new();
        let attempt = store.create_attempt("user-a", "test-1").await.unwrap();
        store
            .update_attempt(&attempt.id, &AttemptPatch::completion(vec![], 80, Utc::now(), 50))
            .await
            .unwrap();

        assert!(store.create_attempt("user-a", "test-1").await.is_err());
        let found = store
            .find_completed_attempt("user-a", "test-1")
            .await
            .unwrap()
            .expect("completed attempt is findable");
        assert_eq!(found.score, Some(80));
    }

    #[tokio::test]
    async fn completion_patch_is_idempotent() {
        let store = MemoryAttemptStore::new();
        let attempt = store.create_attempt("user-a", "test-1").await.unwrap();

        let patch = AttemptPatch::completion(vec![Answer::unanswered("q-1")], 60, Utc::now(), 90);
        store.update_attempt(&attempt.id, &patch).await.unwrap();
        store.update_attempt(&attempt.id, &patch).await.unwrap();

        let stored = &store.all()[0];
        assert_eq!(stored.score, Some(60));
        assert_eq!(stored.duration_used_seconds, Some(90));

        // a conflicting second completion is ignored, not applied
        let conflicting = AttemptPatch::completion(vec![], 99, Utc::now(), 1);
        store.update_attempt(&attempt.id, &conflicting).await.unwrap();
        assert_eq!(store.all()[0].score, Some(60));
    }

    #[tokio::test]
    async fn injected_failures_then_recovery() {
        let store = MemoryAttemptStore::new();
        let attempt = store.create_attempt("user-a", "test-1").await.unwrap();
        store.fail_next_updates(2);

        let patch = AttemptPatch::progress(vec![]);
        assert!(store.update_attempt(&attempt.id, &patch).await.is_err());
        assert!(store.update_attempt(&attempt.id, &patch).await.is_err());
        assert!(store.update_attempt(&attempt.id, &patch).await.is_ok());
        assert_eq!(store.update_calls(), 3);
    }

    #[tokio::test]
    async fn unknown_attempt_id_fails() {
        let store = MemoryAttemptStore::new();
        store.create_attempt("user-a", "test-1").await.unwrap();
        let err = store
            .update_attempt(&Uuid::new_v4(), &AttemptPatch::progress(vec![]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
