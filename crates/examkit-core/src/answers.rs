//! In-memory per-question answer state for the active attempt.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::model::{Answer, AnswerValue, Question, QuestionType};

/// Holds one [`Answer`] per resolved question, in question order.
///
/// Seeded once from the resolved question list; no operation removes a
/// question afterwards. All mutation is in-memory; persisting snapshots is
/// the session controller's responsibility.
#[derive(Debug, Clone)]
pub struct AnswerStore {
    /// Question ids in presentation order.
    order: Vec<String>,
    answers: HashMap<String, Answer>,
    /// Expected answer tag per question, for set_answer validation.
    types: HashMap<String, QuestionType>,
}

impl AnswerStore {
    /// Seed the store from the resolved question list, every question
    /// unanswered and unflagged.
    pub fn seed(questions: &[Question]) -> Self {
        let order: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
        let answers = questions
            .iter()
            .map(|q| (q.id.clone(), Answer::unanswered(&q.id)))
            .collect();
        let types = questions
            .iter()
            .map(|q| (q.id.clone(), q.question_type))
            .collect();
        Self {
            order,
            answers,
            types,
        }
    }

    /// Replace the stored value for a question.
    ///
    /// The value's tag must match the question's type; a mismatch is a
    /// programmer error in the calling layer and fails loudly with
    /// [`EngineError::TypeMismatch`] rather than coercing.
    pub fn set_answer(
        &mut self,
        question_id: &str,
        value: AnswerValue,
    ) -> Result<(), EngineError> {
        let expected = *self
            .types
            .get(question_id)
            .ok_or_else(|| EngineError::UnknownQuestion(question_id.to_string()))?;
        if !value.matches(expected) {
            return Err(EngineError::TypeMismatch {
                question_id: question_id.to_string(),
                expected,
                given: value.kind(),
            });
        }
        let answer = self
            .answers
            .get_mut(question_id)
            .ok_or_else(|| EngineError::UnknownQuestion(question_id.to_string()))?;
        answer.value = Some(value);
        Ok(())
    }

    /// Reset a question to unanswered.
    pub fn clear_answer(&mut self, question_id: &str) -> Result<(), EngineError> {
        self.answers
            .get_mut(question_id)
            .ok_or_else(|| EngineError::UnknownQuestion(question_id.to_string()))?
            .value = None;
        Ok(())
    }

    /// Flip the review flag, returning the new state.
    pub fn toggle_flag(&mut self, question_id: &str) -> Result<bool, EngineError> {
        let answer = self
            .answers
            .get_mut(question_id)
            .ok_or_else(|| EngineError::UnknownQuestion(question_id.to_string()))?;
        answer.flagged = !answer.flagged;
        Ok(answer.flagged)
    }

    /// Accumulate time spent on a question. Unknown ids are ignored — time
    /// accounting is best-effort telemetry, not a correctness input.
    pub fn add_time(&mut self, question_id: &str, seconds: u64) {
        if let Some(answer) = self.answers.get_mut(question_id) {
            answer.time_spent_seconds += seconds;
        }
    }

    /// The answer for a question, if seeded.
    pub fn get(&self, question_id: &str) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    /// Current answers in question order, for persistence or scoring.
    pub fn snapshot(&self) -> Vec<Answer> {
        self.order
            .iter()
            .filter_map(|id| self.answers.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|a| a.value.is_some()).count()
    }

    pub fn flagged_count(&self) -> usize {
        self.answers.values().filter(|a| a.flagged).count()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::model::Difficulty;

    fn question(id: &str, question_type: QuestionType) -> Question {
        Question {
            id: id.into(),
            prompt: id.into(),
            question_type,
            options: match question_type {
                QuestionType::SingleChoice | QuestionType::MultiChoice => {
                    vec!["a".into(), "b".into(), "c".into(), "d".into()]
                }
                _ => vec![],
            },
            correct_answer: match question_type {
                QuestionType::SingleChoice => AnswerValue::SingleChoice(0),
                QuestionType::MultiChoice => AnswerValue::MultiChoice(BTreeSet::from([0])),
                QuestionType::Boolean => AnswerValue::Boolean(true),
                QuestionType::Numeric => AnswerValue::Numeric(0.0),
            },
            explanation: String::new(),
            category: None,
            difficulty: Difficulty::default(),
        }
    }

    fn store() -> AnswerStore {
        AnswerStore::seed(&[
            question("q-1", QuestionType::SingleChoice),
            question("q-2", QuestionType::Numeric),
        ])
    }

    #[test]
    fn seeds_unanswered_in_order() {
        let store = store();
        assert_eq!(store.len(), 2);
        assert_eq!(store.answered_count(), 0);
        let snapshot = store.snapshot();
        assert_eq!(snapshot[0].question_id, "q-1");
        assert_eq!(snapshot[1].question_id, "q-2");
        assert!(snapshot.iter().all(|a| a.value.is_none() && !a.flagged));
    }

    #[test]
    fn set_and_clear_answer() {
        let mut store = store();
        store
            .set_answer("q-1", AnswerValue::SingleChoice(2))
            .unwrap();
        assert_eq!(store.answered_count(), 1);
        assert_eq!(
            store.get("q-1").unwrap().value,
            Some(AnswerValue::SingleChoice(2))
        );

        store.clear_answer("q-1").unwrap();
        assert_eq!(store.answered_count(), 0);
    }

    #[test]
    fn rejects_mismatched_tag() {
        let mut store = store();
        let err = store
            .set_answer("q-1", AnswerValue::Boolean(true))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::TypeMismatch {
                expected: QuestionType::SingleChoice,
                given: QuestionType::Boolean,
                ..
            }
        ));
        // the stored answer is untouched
        assert!(store.get("q-1").unwrap().value.is_none());
    }

    #[test]
    fn rejects_unknown_question() {
        let mut store = store();
        let err = store
            .set_answer("q-404", AnswerValue::Numeric(1.0))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownQuestion(id) if id == "q-404"));
    }

    #[test]
    fn toggle_flag_flips_and_reports() {
        let mut store = store();
        assert!(store.toggle_flag("q-2").unwrap());
        assert_eq!(store.flagged_count(), 1);
        assert!(!store.toggle_flag("q-2").unwrap());
        assert_eq!(store.flagged_count(), 0);
    }

    #[test]
    fn add_time_accumulates() {
        let mut store = store();
        store.add_time("q-1", 5);
        store.add_time("q-1", 7);
        store.add_time("q-404", 100); // ignored
        assert_eq!(store.get("q-1").unwrap().time_spent_seconds, 12);
    }
}
