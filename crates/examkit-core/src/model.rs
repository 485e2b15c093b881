//! Core data model types for examkit.
//!
//! These are the fundamental types that the entire examkit system uses to
//! represent questions, tests, answers, and attempt records.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of answer a question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultiChoice,
    Boolean,
    Numeric,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::SingleChoice => write!(f, "single_choice"),
            QuestionType::MultiChoice => write!(f, "multi_choice"),
            QuestionType::Boolean => write!(f, "boolean"),
            QuestionType::Numeric => write!(f, "numeric"),
        }
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single_choice" | "single" => Ok(QuestionType::SingleChoice),
            "multi_choice" | "multi" => Ok(QuestionType::MultiChoice),
            "boolean" | "bool" => Ok(QuestionType::Boolean),
            "numeric" | "number" => Ok(QuestionType::Numeric),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// Question difficulty bands used by the authoring and analytics collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Medium
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// An answer payload, tagged by the question type it belongs to.
///
/// Replaces dynamically-typed answer storage with an explicit sum type so the
/// scoring rules can be matched exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    /// Index into the question's options.
    SingleChoice(usize),
    /// Set of indices into the question's options.
    MultiChoice(BTreeSet<usize>),
    Boolean(bool),
    Numeric(f64),
}

impl AnswerValue {
    /// The question type this value is shaped for.
    pub fn kind(&self) -> QuestionType {
        match self {
            AnswerValue::SingleChoice(_) => QuestionType::SingleChoice,
            AnswerValue::MultiChoice(_) => QuestionType::MultiChoice,
            AnswerValue::Boolean(_) => QuestionType::Boolean,
            AnswerValue::Numeric(_) => QuestionType::Numeric,
        }
    }

    /// Whether this value's tag matches the given question type.
    pub fn matches(&self, question_type: QuestionType) -> bool {
        self.kind() == question_type
    }
}

/// A single question. Owned by the question-bank collaborator; the engine
/// treats it as read-only input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier for this question.
    pub id: String,
    /// The question text shown to the operator.
    pub prompt: String,
    /// What kind of answer this question expects.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Ordered option texts. Present only for choice types; four options are
    /// recommended but any two or more are accepted.
    #[serde(default)]
    pub options: Vec<String>,
    /// The correct answer, shaped per `question_type`.
    pub correct_answer: AnswerValue,
    /// Shown to the operator after completion.
    #[serde(default)]
    pub explanation: String,
    /// Category for per-category result breakdowns.
    #[serde(default)]
    pub category: Option<String>,
    /// Difficulty band.
    #[serde(default)]
    pub difficulty: Difficulty,
}

/// A named, reusable collection of questions referenced by tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBank {
    /// Unique identifier for this bank.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Ordered question ids in this bank.
    #[serde(default)]
    pub question_ids: Vec<String>,
}

/// A test definition. Immutable for the lifetime of an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    /// Unique identifier for this test.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Total time allowed for one attempt.
    pub duration_seconds: u64,
    /// The question bank this test draws from.
    pub question_bank_id: String,
    /// Whether to shuffle the resolved question order per attempt.
    #[serde(default)]
    pub shuffle_questions: bool,
    /// Minimum score (0–100) required to pass.
    #[serde(default = "default_passing_score")]
    pub passing_score: u8,
}

fn default_passing_score() -> u8 {
    70
}

/// Per-question answer state. One per resolved question, owned exclusively by
/// the active session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// The question this answer belongs to.
    pub question_id: String,
    /// The operator's answer, `None` when unanswered.
    #[serde(default)]
    pub value: Option<AnswerValue>,
    /// Whether the operator flagged this question for review.
    #[serde(default)]
    pub flagged: bool,
    /// Accumulated time the operator spent on this question.
    #[serde(default)]
    pub time_spent_seconds: u64,
}

impl Answer {
    /// A fresh unanswered, unflagged answer for the given question.
    pub fn unanswered(question_id: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            value: None,
            flagged: false,
            time_spent_seconds: 0,
        }
    }
}

/// Lifecycle status of an attempt record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::InProgress => write!(f, "in_progress"),
            AttemptStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One user's durable record of taking one test.
///
/// Created exactly once when a session starts, mutated in place as answers
/// change and again on submission, immutable once `status` is `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// Unique identifier for this attempt.
    pub id: Uuid,
    /// The user taking the test.
    pub user_id: String,
    /// The test being taken.
    pub test_id: String,
    /// Lifecycle status.
    pub status: AttemptStatus,
    /// When the session entered InProgress.
    pub started_at: DateTime<Utc>,
    /// When the attempt completed, if it has.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Per-question answers, in question order.
    #[serde(default)]
    pub answers: Vec<Answer>,
    /// Final score 0–100, present once completed.
    #[serde(default)]
    pub score: Option<u8>,
    /// Wall-clock seconds the attempt consumed, present once completed.
    #[serde(default)]
    pub duration_used_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_type_display_and_parse() {
        assert_eq!(QuestionType::SingleChoice.to_string(), "single_choice");
        assert_eq!(QuestionType::Numeric.to_string(), "numeric");
        assert_eq!(
            "single_choice".parse::<QuestionType>().unwrap(),
            QuestionType::SingleChoice
        );
        assert_eq!(
            "multi".parse::<QuestionType>().unwrap(),
            QuestionType::MultiChoice
        );
        assert_eq!("bool".parse::<QuestionType>().unwrap(), QuestionType::Boolean);
        assert!("essay".parse::<QuestionType>().is_err());
    }

    #[test]
    fn answer_value_kind_matches_tag() {
        assert_eq!(
            AnswerValue::SingleChoice(2).kind(),
            QuestionType::SingleChoice
        );
        assert_eq!(
            AnswerValue::MultiChoice(BTreeSet::from([0, 2])).kind(),
            QuestionType::MultiChoice
        );
        assert!(AnswerValue::Boolean(true).matches(QuestionType::Boolean));
        assert!(!AnswerValue::Numeric(1.0).matches(QuestionType::Boolean));
    }

    #[test]
    fn question_serde_roundtrip() {
        let question = Question {
            id: "q-1".into(),
            prompt: "2 + 2 = ?".into(),
            question_type: QuestionType::SingleChoice,
            options: vec!["3".into(), "4".into(), "5".into(), "22".into()],
            correct_answer: AnswerValue::SingleChoice(1),
            explanation: String::new(),
            category: Some("arithmetic".into()),
            difficulty: Difficulty::Easy,
        };
        let json = serde_json::to_string(&question).unwrap();
        assert!(json.contains("\"type\":\"single_choice\""));
        let back: Question = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "q-1");
        assert_eq!(back.correct_answer, AnswerValue::SingleChoice(1));
    }

    #[test]
    fn test_defaults() {
        let json = r#"{
            "id": "t-1",
            "name": "Basics",
            "duration_seconds": 600,
            "question_bank_id": "b-1"
        }"#;
        let test: Test = serde_json::from_str(json).unwrap();
        assert!(!test.shuffle_questions);
        assert_eq!(test.passing_score, 70);
    }

    #[test]
    fn attempt_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AttemptStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&AttemptStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
