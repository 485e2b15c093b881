//! TOML exam-definition parser.
//!
//! Loads a test plus its question bank from a single TOML file and validates
//! the result. Author-side mistakes come back as warnings rather than hard
//! failures, matching what the `validate` command prints.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use examkit_core::model::{
    AnswerValue, Difficulty, Question, QuestionBank, QuestionType, Test,
};

use crate::memory::MemoryBank;

/// A parsed exam file: the test, its bank, and the bank's questions.
#[derive(Debug, Clone)]
pub struct ExamDefinition {
    pub test: Test,
    pub bank: QuestionBank,
    pub questions: Vec<Question>,
}

impl ExamDefinition {
    /// A ready-to-use provider holding this exam's bank and questions.
    pub fn provider(&self) -> MemoryBank {
        MemoryBank::with_bank(self.bank.clone(), self.questions.clone())
    }
}

/// A single author-side problem found by `validate_exam`.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The offending question, when the problem is question-scoped.
    pub question_id: Option<String>,
    pub message: String,
}

// -- intermediate TOML structures -------------------------------------------

#[derive(Debug, Deserialize)]
struct TomlExamFile {
    test: TomlTestHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlTestHeader {
    id: String,
    name: String,
    duration_seconds: u64,
    #[serde(default)]
    question_bank_id: Option<String>,
    #[serde(default)]
    shuffle_questions: bool,
    #[serde(default = "default_passing_score")]
    passing_score: u8,
}

fn default_passing_score() -> u8 {
    70
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    prompt: String,
    #[serde(rename = "type")]
    question_type: String,
    #[serde(default)]
    options: Vec<String>,
    correct: TomlAnswer,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
}

/// The `correct` field accepts whichever TOML shape the question type needs.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TomlAnswer {
    Flag(bool),
    Index(usize),
    Indices(Vec<usize>),
    Number(f64),
}

fn convert_answer(
    question_id: &str,
    question_type: QuestionType,
    raw: TomlAnswer,
) -> Result<AnswerValue> {
    let value = match (question_type, raw) {
        (QuestionType::SingleChoice, TomlAnswer::Index(i)) => AnswerValue::SingleChoice(i),
        (QuestionType::MultiChoice, TomlAnswer::Indices(indices)) => {
            AnswerValue::MultiChoice(indices.into_iter().collect::<BTreeSet<_>>())
        }
        (QuestionType::Boolean, TomlAnswer::Flag(b)) => AnswerValue::Boolean(b),
        (QuestionType::Numeric, TomlAnswer::Number(n)) => AnswerValue::Numeric(n),
        // a whole number is a fine numeric answer too
        (QuestionType::Numeric, TomlAnswer::Index(i)) => AnswerValue::Numeric(i as f64),
        (expected, _) => anyhow::bail!(
            "question '{question_id}': 'correct' does not match type {expected}"
        ),
    };
    Ok(value)
}

// -- parsing ----------------------------------------------------------------

/// Parse a TOML exam file.
pub fn parse_exam(path: &Path) -> Result<ExamDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read exam file: {}", path.display()))?;
    parse_exam_str(&content, path)
}

/// Parse a TOML string into an `ExamDefinition` (useful for testing).
pub fn parse_exam_str(content: &str, source_path: &Path) -> Result<ExamDefinition> {
    let parsed: TomlExamFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let bank_id = parsed
        .test
        .question_bank_id
        .clone()
        .unwrap_or_else(|| format!("{}-bank", parsed.test.id));

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            let question_type: QuestionType = q
                .question_type
                .parse()
                .map_err(|e: String| anyhow::anyhow!("question '{}': {e}", q.id))?;
            let difficulty = q
                .difficulty
                .map(|d| {
                    d.parse::<Difficulty>()
                        .map_err(|e| anyhow::anyhow!("question '{}': {e}", q.id))
                })
                .transpose()?
                .unwrap_or_default();
            let correct_answer = convert_answer(&q.id, question_type, q.correct)?;
            Ok(Question {
                id: q.id,
                prompt: q.prompt,
                question_type,
                options: q.options,
                correct_answer,
                explanation: q.explanation,
                category: q.category,
                difficulty,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let bank = QuestionBank {
        id: bank_id.clone(),
        name: parsed.test.name.clone(),
        question_ids: questions.iter().map(|q| q.id.clone()).collect(),
    };

    let test = Test {
        id: parsed.test.id,
        name: parsed.test.name,
        duration_seconds: parsed.test.duration_seconds,
        question_bank_id: bank_id,
        shuffle_questions: parsed.test.shuffle_questions,
        passing_score: parsed.test.passing_score,
    };

    Ok(ExamDefinition {
        test,
        bank,
        questions,
    })
}

// -- validation -------------------------------------------------------------

/// Check an exam definition for author-side mistakes.
pub fn validate_exam(exam: &ExamDefinition) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let warn_test = |message: String| ValidationWarning {
        question_id: None,
        message,
    };

    if exam.test.duration_seconds == 0 {
        warnings.push(warn_test("duration_seconds is zero".into()));
    }
    if exam.test.passing_score > 100 {
        warnings.push(warn_test(format!(
            "passing_score {} exceeds 100",
            exam.test.passing_score
        )));
    }
    if exam.questions.is_empty() {
        warnings.push(warn_test("exam has no questions".into()));
    }

    let mut seen_ids = HashSet::new();
    for question in &exam.questions {
        let warn = |message: String| ValidationWarning {
            question_id: Some(question.id.clone()),
            message,
        };

        if !seen_ids.insert(question.id.as_str()) {
            warnings.push(warn("duplicate question id".into()));
        }

        match question.question_type {
            QuestionType::SingleChoice | QuestionType::MultiChoice => {
                if question.options.len() < 2 {
                    warnings.push(warn(format!(
                        "choice question has {} option(s), at least 2 required",
                        question.options.len()
                    )));
                }
                match &question.correct_answer {
                    AnswerValue::SingleChoice(index) => {
                        if *index >= question.options.len() {
                            warnings.push(warn(format!(
                                "correct index {index} is out of range for {} option(s)",
                                question.options.len()
                            )));
                        }
                    }
                    AnswerValue::MultiChoice(indices) => {
                        if indices.is_empty() {
                            warnings.push(warn("multi-choice correct set is empty".into()));
                        }
                        for index in indices {
                            if *index >= question.options.len() {
                                warnings.push(warn(format!(
                                    "correct index {index} is out of range for {} option(s)",
                                    question.options.len()
                                )));
                            }
                        }
                    }
                    _ => {}
                }
            }
            QuestionType::Boolean | QuestionType::Numeric => {
                if !question.options.is_empty() {
                    warnings.push(warn(format!(
                        "{} question should not carry options",
                        question.question_type
                    )));
                }
            }
        }
    }

    warnings
}
