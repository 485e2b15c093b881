//! Question set resolution.
//!
//! Expands a test's question-bank reference into the ordered list of concrete
//! questions one attempt will see, optionally shuffled.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::EngineError;
use crate::model::{Question, Test};
use crate::traits::QuestionBankProvider;

/// Resolve the concrete question list for one attempt of `test`.
///
/// Bank ids that do not resolve fail with [`EngineError::BankNotFound`];
/// individual question ids that no longer resolve are skipped with a warning.
/// An empty result after filtering fails with
/// [`EngineError::EmptyQuestionSet`]. When `test.shuffle_questions` is set
/// the order is a uniformly random permutation (`SliceRandom::shuffle` is a
/// Fisher–Yates pass) — never a comparator-based random sort, whose output
/// distribution is biased.
pub async fn resolve_question_set(
    test: &Test,
    provider: &dyn QuestionBankProvider,
    rng: &mut impl Rng,
) -> Result<Vec<Question>, EngineError> {
    let bank = provider
        .get_bank(&test.question_bank_id)
        .await
        .map_err(|e| {
            tracing::error!("bank lookup failed for '{}': {e:#}", test.question_bank_id);
            EngineError::BankNotFound(test.question_bank_id.clone())
        })?
        .ok_or_else(|| EngineError::BankNotFound(test.question_bank_id.clone()))?;

    let mut questions = Vec::with_capacity(bank.question_ids.len());
    for question_id in &bank.question_ids {
        match provider.get_question(question_id).await {
            Ok(Some(question)) => questions.push(question),
            Ok(None) => {
                tracing::warn!(
                    "question '{question_id}' listed in bank '{}' no longer resolves, skipping",
                    bank.id
                );
            }
            Err(e) => {
                tracing::warn!(
                    "question '{question_id}' in bank '{}' failed to load, skipping: {e:#}",
                    bank.id
                );
            }
        }
    }

    if questions.is_empty() {
        return Err(EngineError::EmptyQuestionSet(bank.id));
    }

    if test.shuffle_questions {
        questions.shuffle(rng);
    }

    Ok(questions)
}
