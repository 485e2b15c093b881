//! The `examkit run` command: drives one full assessment session on the
//! terminal, racing operator input against the exam clock.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncBufReadExt, BufReader};

use examkit_core::error::EngineError;
use examkit_core::model::{AnswerValue, Question, QuestionType};
use examkit_core::session::{ExamOutcome, ExamSession, SessionConfig, SubmitTrigger};
use examkit_store::JsonAttemptStore;

pub async fn execute(
    exam_path: PathBuf,
    user: String,
    store_dir: PathBuf,
    seed: Option<u64>,
) -> Result<()> {
    let exam = examkit_store::parse_exam(&exam_path)?;
    let warnings = examkit_store::validate_exam(&exam);
    if !warnings.is_empty() {
        anyhow::bail!(
            "exam definition has {} warning(s); run `examkit validate --exam {}` first",
            warnings.len(),
            exam_path.display()
        );
    }

    let provider = exam.provider();
    let repo = Arc::new(JsonAttemptStore::new(store_dir));
    let config = SessionConfig::default();

    let mut session = match seed {
        Some(seed) => {
            let mut rng = StdRng::seed_from_u64(seed);
            ExamSession::load_with_rng(exam.test.clone(), &user, &provider, repo, config, &mut rng)
                .await?
        }
        None => ExamSession::load(exam.test.clone(), &user, &provider, repo, config).await?,
    };

    session.begin().await?;
    let mut expiry = session
        .take_expiry()
        .context("clock expiry signal missing")?;

    println!(
        "{}: {} question(s), {} seconds, pass mark {}.",
        exam.test.name,
        session.questions().len(),
        exam.test.duration_seconds,
        exam.test.passing_score
    );
    println!("Type 'help' for commands.");

    let mut current = 0usize;
    let mut question_shown_at = Instant::now();
    print_question(&session, current);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let outcome = loop {
        tokio::select! {
            _ = &mut expiry => {
                println!("\nTime is up. Submitting your answers.");
                break submit_or_report(&mut session, SubmitTrigger::TimeExpired).await?;
            }
            line = lines.next_line() => {
                // charge the elapsed seconds to the question on screen
                let spent = question_shown_at.elapsed().as_secs();
                question_shown_at = Instant::now();
                let question_id = session.questions()[current].id.clone();
                let _ = session.add_time(&question_id, spent);

                let Some(line) = line? else {
                    println!("Input closed. Submitting your answers.");
                    break submit_or_report(&mut session, SubmitTrigger::Operator).await?;
                };
                match apply_command(&mut session, &mut current, line.trim()).await? {
                    Action::Continue => {}
                    Action::Redisplay => print_question(&session, current),
                    Action::Submit => {
                        break submit_or_report(&mut session, SubmitTrigger::Operator).await?;
                    }
                }
            }
        }
    };

    print_summary(&session, &outcome);
    Ok(())
}

/// Submit, and if the durable write ultimately fails make sure the operator
/// still sees the computed score before the error propagates.
async fn submit_or_report(
    session: &mut ExamSession,
    trigger: SubmitTrigger,
) -> Result<ExamOutcome> {
    match session.submit(trigger).await {
        Ok(outcome) => Ok(outcome),
        Err(e @ EngineError::Persistence { .. }) => {
            if let Some(outcome) = session.outcome() {
                eprintln!(
                    "Your score of {} was computed but could not be saved. \
                     Run the command again to retry the write.",
                    outcome.grade.score
                );
            }
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

enum Action {
    Continue,
    Redisplay,
    Submit,
}

async fn apply_command(
    session: &mut ExamSession,
    current: &mut usize,
    input: &str,
) -> Result<Action> {
    let total = session.questions().len();
    let mut parts = input.split_whitespace();
    let command = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.collect();

    match command {
        "" => Ok(Action::Continue),
        "help" | "h" => {
            print_help();
            Ok(Action::Continue)
        }
        "answer" | "a" => {
            let question = session.questions()[*current].clone();
            match parse_answer(&question, &args) {
                Ok(value) => {
                    session.set_answer(&question.id, value)?;
                    // best-effort cadence; the final submission always
                    // carries the full snapshot
                    if let Err(e) = session.sync().await {
                        tracing::warn!("mid-session sync failed: {e:#}");
                    }
                    println!("Recorded.");
                    Ok(Action::Continue)
                }
                Err(message) => {
                    println!("{message}");
                    Ok(Action::Continue)
                }
            }
        }
        "clear" => {
            let question_id = session.questions()[*current].id.clone();
            session.clear_answer(&question_id)?;
            println!("Cleared.");
            Ok(Action::Continue)
        }
        "flag" | "f" => {
            let question_id = session.questions()[*current].id.clone();
            let flagged = session.toggle_flag(&question_id)?;
            println!("{}", if flagged { "Flagged." } else { "Unflagged." });
            Ok(Action::Continue)
        }
        "next" | "n" => {
            *current = (*current + 1).min(total - 1);
            Ok(Action::Redisplay)
        }
        "prev" | "p" => {
            *current = current.saturating_sub(1);
            Ok(Action::Redisplay)
        }
        "goto" | "g" => match args.first().and_then(|a| a.parse::<usize>().ok()) {
            Some(n) if (1..=total).contains(&n) => {
                *current = n - 1;
                Ok(Action::Redisplay)
            }
            _ => {
                println!("Usage: goto <1..{total}>");
                Ok(Action::Continue)
            }
        },
        "status" | "s" => {
            println!(
                "{}/{} answered, {} flagged, {}s remaining.",
                session.answers().answered_count(),
                total,
                session.answers().flagged_count(),
                session.remaining_seconds()
            );
            Ok(Action::Continue)
        }
        "submit" => Ok(Action::Submit),
        other => {
            println!("Unknown command '{other}'. Type 'help'.");
            Ok(Action::Continue)
        }
    }
}

/// Parse operator input into a typed answer. Option numbers are 1-based on
/// the terminal.
fn parse_answer(question: &Question, args: &[&str]) -> Result<AnswerValue, String> {
    match question.question_type {
        QuestionType::SingleChoice => {
            let [arg] = args else {
                return Err("Usage: answer <option number>".into());
            };
            let n: usize = arg
                .parse()
                .map_err(|_| format!("'{arg}' is not an option number"))?;
            if !(1..=question.options.len()).contains(&n) {
                return Err(format!("pick an option between 1 and {}", question.options.len()));
            }
            Ok(AnswerValue::SingleChoice(n - 1))
        }
        QuestionType::MultiChoice => {
            if args.is_empty() {
                return Err("Usage: answer <option numbers...>".into());
            }
            let mut indices = BTreeSet::new();
            for arg in args {
                for piece in arg.split(',').filter(|p| !p.is_empty()) {
                    let n: usize = piece
                        .parse()
                        .map_err(|_| format!("'{piece}' is not an option number"))?;
                    if !(1..=question.options.len()).contains(&n) {
                        return Err(format!(
                            "pick options between 1 and {}",
                            question.options.len()
                        ));
                    }
                    indices.insert(n - 1);
                }
            }
            Ok(AnswerValue::MultiChoice(indices))
        }
        QuestionType::Boolean => match args.first().map(|a| a.to_lowercase()) {
            Some(ref s) if ["true", "t", "yes", "y"].contains(&s.as_str()) => {
                Ok(AnswerValue::Boolean(true))
            }
            Some(ref s) if ["false", "f", "no"].contains(&s.as_str()) => {
                Ok(AnswerValue::Boolean(false))
            }
            _ => Err("Usage: answer <true|false>".into()),
        },
        QuestionType::Numeric => {
            let [arg] = args else {
                return Err("Usage: answer <number>".into());
            };
            let n: f64 = arg.parse().map_err(|_| format!("'{arg}' is not a number"))?;
            Ok(AnswerValue::Numeric(n))
        }
    }
}

fn print_question(session: &ExamSession, index: usize) {
    let question = &session.questions()[index];
    let answer = session.answers().get(&question.id);
    let flagged = answer.is_some_and(|a| a.flagged);

    println!(
        "\n[{}/{}] {}{}",
        index + 1,
        session.questions().len(),
        question.prompt,
        if flagged { "  [flagged]" } else { "" }
    );

    let selected = answer.and_then(|a| a.value.as_ref());
    for (i, option) in question.options.iter().enumerate() {
        let marker = match selected {
            Some(AnswerValue::SingleChoice(sel)) if *sel == i => "*",
            Some(AnswerValue::MultiChoice(set)) if set.contains(&i) => "*",
            _ => " ",
        };
        println!("  {marker} {}. {option}", i + 1);
    }
    match question.question_type {
        QuestionType::Boolean => match selected {
            Some(AnswerValue::Boolean(b)) => println!("  answered: {b}"),
            _ => println!("  (answer true or false)"),
        },
        QuestionType::Numeric => match selected {
            Some(AnswerValue::Numeric(n)) => println!("  answered: {n}"),
            _ => println!("  (numeric answer)"),
        },
        _ => {}
    }
    println!("  {}s remaining", session.remaining_seconds());
}

fn print_summary(session: &ExamSession, outcome: &ExamOutcome) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "Question", "Answered", "Result"]);

    for (i, result) in outcome.grade.per_question.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&result.question_id),
            Cell::new(if result.answered { "yes" } else { "no" }),
            Cell::new(if result.correct { "correct" } else { "incorrect" }),
        ]);
    }
    println!("{table}");

    println!(
        "Score: {} ({}/{} correct): {} (pass mark {})",
        outcome.grade.score,
        outcome.grade.correct_count,
        outcome.grade.total_questions,
        if outcome.passed { "PASSED" } else { "FAILED" },
        session.test().passing_score
    );
    for (category, tally) in &outcome.grade.per_category {
        println!("  {category}: {}/{}", tally.correct, tally.total);
    }
    println!(
        "Used {}s of {}s.",
        outcome.duration_used_seconds,
        session.test().duration_seconds
    );
}

fn print_help() {
    println!("Commands:");
    println!("  answer <...>   record an answer (option number(s), true/false, or a number)");
    println!("  clear          blank the current answer");
    println!("  flag           toggle the review flag");
    println!("  next / prev    move between questions");
    println!("  goto <n>       jump to question n");
    println!("  status         answered/flagged counts and time left");
    println!("  submit         finish and grade the attempt");
}
