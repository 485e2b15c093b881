//! JSON-file attempt store.
//!
//! One pretty-printed JSON file per (user, test) pair under a base directory.
//! Same repository semantics as the in-memory store; suitable for the CLI and
//! small single-host deployments.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use examkit_core::model::{Attempt, AttemptStatus};
use examkit_core::traits::{AttemptPatch, AttemptRepository};

/// Attempt repository persisting each record as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonAttemptStore {
    base_dir: PathBuf,
}

impl JsonAttemptStore {
    /// Store attempts under `base_dir` (created on first write).
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn record_path(&self, user_id: &str, test_id: &str) -> PathBuf {
        // Keep ids filesystem-safe without restricting the id alphabet.
        let sanitize = |s: &str| -> String {
            s.chars()
                .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
                .collect()
        };
        self.base_dir
            .join(format!("{}__{}.json", sanitize(user_id), sanitize(test_id)))
    }

    fn read_record(&self, path: &Path) -> Result<Option<Attempt>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read attempt from {}", path.display()))?;
        let attempt = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse attempt JSON: {}", path.display()))?;
        Ok(Some(attempt))
    }

    fn write_record(&self, path: &Path, attempt: &Attempt) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(attempt).context("failed to serialize attempt")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write attempt to {}", path.display()))?;
        Ok(())
    }

    /// Load every attempt stored under the base directory.
    pub fn load_all(&self) -> Result<Vec<Attempt>> {
        let mut attempts = Vec::new();
        if !self.base_dir.exists() {
            return Ok(attempts);
        }
        for entry in std::fs::read_dir(&self.base_dir)
            .with_context(|| format!("failed to list {}", self.base_dir.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match self.read_record(&path) {
                    Ok(Some(attempt)) => attempts.push(attempt),
                    Ok(None) => {}
                    Err(e) => tracing::warn!("skipping unreadable attempt file: {e:#}"),
                }
            }
        }
        attempts.sort_by_key(|a| a.started_at);
        Ok(attempts)
    }
}

#[async_trait]
impl AttemptRepository for JsonAttemptStore {
    async fn find_completed_attempt(
        &self,
        user_id: &str,
        test_id: &str,
    ) -> anyhow::Result<Option<Attempt>> {
        let path = self.record_path(user_id, test_id);
        Ok(self
            .read_record(&path)?
            .filter(|a| a.status == AttemptStatus::Completed))
    }

    async fn create_attempt(&self, user_id: &str, test_id: &str) -> anyhow::Result<Attempt> {
        let path = self.record_path(user_id, test_id);

        if let Some(existing) = self.read_record(&path)? {
            match existing.status {
                AttemptStatus::Completed => anyhow::bail!(
                    "user '{user_id}' already has a completed attempt for test '{test_id}'"
                ),
                AttemptStatus::InProgress => {
                    tracing::info!(
                        "resuming in-progress attempt {} from {}",
                        existing.id,
                        path.display()
                    );
                    return Ok(existing);
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
        self.write_record(&path, &attempt)?;
        Ok(attempt)
    }

    async fn update_attempt(&self, attempt_id: &Uuid, patch: &AttemptPatch) -> anyhow::Result<()> {
        // Records are keyed by (user, test) on disk; find the file holding
        // this attempt id.
        for mut attempt in self.load_all()? {
            if attempt.id == *attempt_id {
                if patch.apply_to(&mut attempt) {
                    let path = self.record_path(&attempt.user_id, &attempt.test_id);
                    self.write_record(&path, &attempt)?;
                } else {
                    tracing::debug!("attempt {attempt_id} already completed, patch skipped");
                }
                return Ok(());
            }
        }
        anyhow::bail!("attempt {attempt_id} not found")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examkit_core::model::Answer;

    fn store() -> (tempfile::TempDir, JsonAttemptStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonAttemptStore::new(dir.path().join("attempts"));
        (dir, store)
    }

    #[tokio::test]
    async fn create_then_complete_roundtrips_through_disk() {
        let (_dir, store) = store();
        let attempt = store.create_attempt("user-a", "test-1").await.unwrap();

        let patch = AttemptPatch::completion(vec![Answer::unanswered("q-1")], 75, Utc::now(), 40);
        store.update_attempt(&attempt.id, &patch).await.unwrap();

        let found = store
            .find_completed_attempt("user-a", "test-1")
            .await
            .unwrap()
            .expect("stored on disk");
        assert_eq!(found.id, attempt.id);
        assert_eq!(found.score, Some(75));
        assert_eq!(found.answers.len(), 1);
    }

    #[tokio::test]
    async fn in_progress_attempt_is_resumed() {
        let (_dir, store) = store();
        let first = store.create_attempt("user-a", "test-1").await.unwrap();
        let second = store.create_attempt("user-a", "test-1").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn completed_attempt_blocks_creation() {
        let (_dir, store) = store();
        let attempt = store.create_attempt("user-a", "test-1").await.unwrap();
        store
            .update_attempt(&attempt.id, &AttemptPatch::completion(vec![], 80, Utc::now(), 10))
            .await
            .unwrap();
        assert!(store.create_attempt("user-a", "test-1").await.is_err());
    }

    #[tokio::test]
    async fn completion_patch_is_idempotent_on_disk() {
        let (_dir, store) = store();
        let attempt = store.create_attempt("user-a", "test-1").await.unwrap();

        let patch = AttemptPatch::completion(vec![], 60, Utc::now(), 90);
        store.update_attempt(&attempt.id, &patch).await.unwrap();
        store.update_attempt(&attempt.id, &patch).await.unwrap();

        let conflicting = AttemptPatch::completion(vec![], 10, Utc::now(), 5);
        store.update_attempt(&attempt.id, &conflicting).await.unwrap();

        let found = store
            .find_completed_attempt("user-a", "test-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.score, Some(60));
    }

    #[tokio::test]
    async fn load_all_lists_every_pair() {
        let (_dir, store) = store();
        store.create_attempt("user-a", "test-1").await.unwrap();
        store.create_attempt("user-b", "test-1").await.unwrap();
        store.create_attempt("user-a", "test-2").await.unwrap();
        assert_eq!(store.load_all().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn missing_directory_reads_as_empty() {
        let (_dir, store) = store();
        assert!(store.load_all().unwrap().is_empty());
        assert!(store
            .find_completed_attempt("user-a", "test-1")
            .await
            .unwrap()
            .is_none());
    }
}
