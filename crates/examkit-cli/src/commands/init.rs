//! The `examkit init` command.

use anyhow::Result;

const STARTER_EXAM: &str = r#"[test]
id = "aptitude-starter"
name = "Starter Aptitude Test"
duration_seconds = 300
shuffle_questions = false
passing_score = 70

[[questions]]
id = "q-add"
prompt = "What is 17 + 25?"
type = "single_choice"
options = ["32", "42", "52", "41"]
correct = 1
category = "arithmetic"
difficulty = "easy"
explanation = "17 + 25 = 42."

[[questions]]
id = "q-primes"
prompt = "Which of these numbers are prime?"
type = "multi_choice"
options = ["2", "4", "7", "9"]
correct = [0, 2]
category = "number-theory"
difficulty = "medium"
explanation = "2 and 7 are prime; 4 and 9 are composite."

[[questions]]
id = "q-odd-sum"
prompt = "The sum of two odd numbers is always even."
type = "boolean"
correct = true
category = "logic"
difficulty = "easy"

[[questions]]
id = "q-root"
prompt = "What is the square root of 2, to three decimal places?"
type = "numeric"
correct = 1.414
category = "arithmetic"
difficulty = "hard"
"#;

pub fn execute() -> Result<()> {
    let path = std::path::Path::new("exam.toml");
    if path.exists() {
        anyhow::bail!("exam.toml already exists, refusing to overwrite");
    }
    std::fs::write(path, STARTER_EXAM)?;
    println!("Created exam.toml");
    println!("Try: examkit validate --exam exam.toml");
    println!("     examkit run --exam exam.toml --user you");
    Ok(())
}
