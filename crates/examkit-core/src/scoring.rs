//! Answer grading.
//!
//! Pure functions from (questions, answers) to a grade summary — no storage,
//! no clock, so grading is deterministic and unit-testable in isolation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Answer, AnswerValue, Question};

/// Absolute tolerance for numeric answer comparison.
pub const NUMERIC_TOLERANCE: f64 = 1e-3;

/// Category key for questions without one.
const UNCATEGORIZED: &str = "uncategorized";

/// Outcome of grading one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: String,
    /// Whether any answer was stored.
    pub answered: bool,
    pub correct: bool,
}

/// Correct/total tally for one question category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub correct: usize,
    pub total: usize,
}

/// The full result of grading an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSummary {
    /// Rounded percentage, 0–100.
    pub score: u8,
    pub correct_count: usize,
    pub total_questions: usize,
    /// Per-question outcomes, in question order.
    pub per_question: Vec<QuestionResult>,
    /// Correct/total per category, for the analytics collaborator.
    pub per_category: BTreeMap<String, CategoryBreakdown>,
}

impl GradeSummary {
    /// Whether this grade meets the given passing threshold.
    pub fn passed(&self, passing_score: u8) -> bool {
        self.score >= passing_score
    }
}

/// Whether `value` is a correct answer to `question`.
///
/// A value whose tag does not match the question type scores incorrect; the
/// answer store already rejects such writes, this is the grading-side guard.
pub fn is_correct(question: &Question, value: &AnswerValue) -> bool {
    match (&question.correct_answer, value) {
        (AnswerValue::SingleChoice(correct), AnswerValue::SingleChoice(given)) => correct == given,
        // Set equality: equal cardinality and every correct index present.
        (AnswerValue::MultiChoice(correct), AnswerValue::MultiChoice(given)) => correct == given,
        (AnswerValue::Boolean(correct), AnswerValue::Boolean(given)) => correct == given,
        (AnswerValue::Numeric(correct), AnswerValue::Numeric(given)) => {
            (given - correct).abs() < NUMERIC_TOLERANCE
        }
        _ => false,
    }
}

/// Grade an attempt.
///
/// `answers` is matched to `questions` by question id; an unanswered question
/// (or one with no stored answer at all) counts as incorrect and stays in the
/// denominator. `score = round(100 × correct / total)`.
pub fn grade(questions: &[Question], answers: &[Answer]) -> GradeSummary {
    let mut per_question = Vec::with_capacity(questions.len());
    let mut per_category: BTreeMap<String, CategoryBreakdown> = BTreeMap::new();
    let mut correct_count = 0usize;

    for question in questions {
        let stored = answers
            .iter()
            .find(|a| a.question_id == question.id)
            .and_then(|a| a.value.as_ref());
        let answered = stored.is_some();
        let correct = stored.is_some_and(|value| is_correct(question, value));
        if correct {
            correct_count += 1;
        }

        let category = question
            .category
            .as_deref()
            .unwrap_or(UNCATEGORIZED)
            .to_string();
        let tally = per_category.entry(category).or_default();
        tally.total += 1;
        if correct {
            tally.correct += 1;
        }

        per_question.push(QuestionResult {
            question_id: question.id.clone(),
            answered,
            correct,
        });
    }

    let total_questions = questions.len();
    let score = if total_questions == 0 {
        0
    } else {
        (100.0 * correct_count as f64 / total_questions as f64).round() as u8
    };

    GradeSummary {
        score,
        correct_count,
        total_questions,
        per_question,
        per_category,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::model::{Difficulty, QuestionType};

    fn question(id: &str, correct: AnswerValue, category: Option<&str>) -> Question {
        Question {
            id: id.into(),
            prompt: id.into(),
            question_type: correct.kind(),
            options: match correct.kind() {
                QuestionType::SingleChoice | QuestionType::MultiChoice => {
                    vec!["a".into(), "b".into(), "c".into(), "d".into()]
                }
                _ => vec![],
            },
            correct_answer: correct,
            explanation: String::new(),
            category: category.map(String::from),
            difficulty: Difficulty::default(),
        }
    }

    fn answered(id: &str, value: AnswerValue) -> Answer {
        Answer {
            question_id: id.into(),
            value: Some(value),
            flagged: false,
            time_spent_seconds: 0,
        }
    }

    #[test]
    fn single_choice_by_index() {
        let q = question("q", AnswerValue::SingleChoice(1), None);
        assert!(is_correct(&q, &AnswerValue::SingleChoice(1)));
        assert!(!is_correct(&q, &AnswerValue::SingleChoice(0)));
    }

    #[test]
    fn multi_choice_set_equality() {
        let q = question(
            "q",
            AnswerValue::MultiChoice(BTreeSet::from([0, 2])),
            None,
        );
        assert!(is_correct(&q, &AnswerValue::MultiChoice(BTreeSet::from([0, 2]))));
        // superset: cardinality mismatch
        assert!(!is_correct(
            &q,
            &AnswerValue::MultiChoice(BTreeSet::from([0, 2, 3]))
        ));
        // subset
        assert!(!is_correct(&q, &AnswerValue::MultiChoice(BTreeSet::from([0]))));
    }

    #[test]
    fn boolean_exact() {
        let q = question("q", AnswerValue::Boolean(false), None);
        assert!(is_correct(&q, &AnswerValue::Boolean(false)));
        assert!(!is_correct(&q, &AnswerValue::Boolean(true)));
    }

    #[test]
    fn numeric_within_tolerance() {
        let q = question("q", AnswerValue::Numeric(42.0), None);
        let close: f64 = "42.0009".parse().unwrap();
        let off: f64 = "42.01".parse().unwrap();
        assert!(is_correct(&q, &AnswerValue::Numeric(close)));
        assert!(!is_correct(&q, &AnswerValue::Numeric(off)));
    }

    #[test]
    fn mismatched_tag_scores_incorrect() {
        let q = question("q", AnswerValue::Boolean(true), None);
        assert!(!is_correct(&q, &AnswerValue::Numeric(1.0)));
    }

    #[test]
    fn unanswered_stays_in_denominator() {
        let questions = vec![
            question("q-1", AnswerValue::Boolean(true), None),
            question("q-2", AnswerValue::Boolean(true), None),
        ];
        let answers = vec![
            answered("q-1", AnswerValue::Boolean(true)),
            Answer::unanswered("q-2"),
        ];
        let summary = grade(&questions, &answers);
        assert_eq!(summary.total_questions, 2);
        assert_eq!(summary.correct_count, 1);
        assert_eq!(summary.score, 50);
        assert!(!summary.per_question[1].answered);
        assert!(!summary.per_question[1].correct);
    }

    #[test]
    fn grading_is_deterministic() {
        let questions = vec![
            question("q-1", AnswerValue::SingleChoice(0), Some("logic")),
            question("q-2", AnswerValue::Numeric(3.5), Some("math")),
        ];
        let answers = vec![
            answered("q-1", AnswerValue::SingleChoice(0)),
            answered("q-2", AnswerValue::Numeric(3.0)),
        ];
        assert_eq!(grade(&questions, &answers), grade(&questions, &answers));
    }

    #[test]
    fn score_rounds_to_nearest() {
        // 2 of 3 correct = 66.67 → 67
        let questions = vec![
            question("q-1", AnswerValue::Boolean(true), None),
            question("q-2", AnswerValue::Boolean(true), None),
            question("q-3", AnswerValue::Boolean(true), None),
        ];
        let answers = vec![
            answered("q-1", AnswerValue::Boolean(true)),
            answered("q-2", AnswerValue::Boolean(true)),
            answered("q-3", AnswerValue::Boolean(false)),
        ];
        assert_eq!(grade(&questions, &answers).score, 67);
    }

    #[test]
    fn per_category_tallies() {
        let questions = vec![
            question("q-1", AnswerValue::Boolean(true), Some("logic")),
            question("q-2", AnswerValue::Boolean(true), Some("logic")),
            question("q-3", AnswerValue::Boolean(true), None),
        ];
        let answers = vec![
            answered("q-1", AnswerValue::Boolean(true)),
            answered("q-2", AnswerValue::Boolean(false)),
            answered("q-3", AnswerValue::Boolean(true)),
        ];
        let summary = grade(&questions, &answers);
        assert_eq!(
            summary.per_category["logic"],
            CategoryBreakdown {
                correct: 1,
                total: 2
            }
        );
        assert_eq!(
            summary.per_category["uncategorized"],
            CategoryBreakdown {
                correct: 1,
                total: 1
            }
        );
    }

    #[test]
    fn passed_at_threshold() {
        let questions = vec![question("q-1", AnswerValue::Boolean(true), None)];
        let answers = vec![answered("q-1", AnswerValue::Boolean(true))];
        let summary = grade(&questions, &answers);
        assert!(summary.passed(100));
        assert!(summary.passed(70));
    }
}
