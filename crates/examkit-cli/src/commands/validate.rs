//! The `examkit validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(exam_path: PathBuf) -> Result<()> {
    let exam = examkit_store::parse_exam(&exam_path)?;
    println!(
        "Exam: {} ({} questions, {}s, pass mark {})",
        exam.test.name,
        exam.questions.len(),
        exam.test.duration_seconds,
        exam.test.passing_score
    );

    let warnings = examkit_store::validate_exam(&exam);
    for w in &warnings {
        let prefix = w
            .question_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("All checks passed.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
