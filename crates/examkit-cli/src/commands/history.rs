//! The `examkit history` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Table};

use examkit_core::model::AttemptStatus;
use examkit_store::JsonAttemptStore;

pub fn execute(store_dir: PathBuf, user: Option<String>) -> Result<()> {
    let store = JsonAttemptStore::new(store_dir);
    let mut attempts = store.load_all()?;
    if let Some(user) = &user {
        attempts.retain(|a| &a.user_id == user);
    }

    if attempts.is_empty() {
        println!("No attempts recorded.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "User", "Test", "Status", "Score", "Started", "Used",
    ]);

    for attempt in &attempts {
        let score = attempt
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into());
        let used = attempt
            .duration_used_seconds
            .map(|d| format!("{d}s"))
            .unwrap_or_else(|| "-".into());
        let status = match attempt.status {
            AttemptStatus::InProgress => "in progress",
            AttemptStatus::Completed => "completed",
        };
        table.add_row(vec![
            Cell::new(&attempt.user_id),
            Cell::new(&attempt.test_id),
            Cell::new(status),
            Cell::new(score),
            Cell::new(attempt.started_at.format("%Y-%m-%d %H:%M").to_string()),
            Cell::new(used),
        ]);
    }

    println!("{table}");
    println!("{} attempt(s).", attempts.len());
    Ok(())
}
