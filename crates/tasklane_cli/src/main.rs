//! CLI inspection entry point.
//!
//! # Responsibility
//! - Verify `tasklane_core` linkage with a deterministic smoke output.
//! - Print the persisted board per list for quick local sanity checks.
//! - Never write board state: the blob is decoded directly, so lifecycle
//!   rules (weekly reset, monthly prune) are not applied.
//!
//! Usage: `tasklane_cli [DB_PATH]`. Without an argument, `TASKLANE_DB_PATH`
//! is used; without either, only the smoke lines are printed.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tasklane_core::{
    BlobStore, BoardDecode, BoardState, ListType, SqliteBlobStore, Task, DEFAULT_STORAGE_KEY,
};

fn main() -> ExitCode {
    println!("tasklane_core ping={}", tasklane_core::ping());
    println!("tasklane_core version={}", tasklane_core::core_version());

    let Some(db_path) = resolve_db_path() else {
        return ExitCode::SUCCESS;
    };

    let decoded = match load_board(&db_path) {
        Ok(Some(decoded)) => decoded,
        Ok(None) => {
            println!("board db={} empty", db_path.display());
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    for warning in &decoded.warnings {
        eprintln!("warning: {warning}");
    }
    let board = decoded.state;
    println!(
        "board db={} todos={} last_weekly_reset={}",
        db_path.display(),
        board.todos.len(),
        board.last_weekly_reset
    );

    for list_type in ListType::ALL {
        let mut tasks = board
            .todos
            .iter()
            .filter(|task| task.list_type == list_type)
            .cloned()
            .collect::<Vec<_>>();
        tasks.sort_by(|left, right| {
            group_key(left)
                .cmp(&group_key(right))
                .then(left.position.total_cmp(&right.position))
        });

        println!("[{list_type}] {}", tasks.len());
        for task in &tasks {
            println!("  {}", describe(task));
        }
    }

    ExitCode::SUCCESS
}

/// Reads and decodes the board blob without running any store lifecycle.
fn load_board(db_path: &Path) -> Result<Option<BoardDecode>, String> {
    let blobs = SqliteBlobStore::open(db_path)
        .map_err(|err| format!("failed to open `{}`: {err}", db_path.display()))?;
    let raw = blobs
        .get(DEFAULT_STORAGE_KEY)
        .map_err(|err| format!("failed to read board: {err}"))?;
    Ok(raw.map(|raw| BoardState::decode(&raw, 0)))
}

fn resolve_db_path() -> Option<PathBuf> {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TASKLANE_DB_PATH").ok())
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}

fn group_key(task: &Task) -> (Option<u8>, Option<&str>) {
    (task.weekday, task.date.as_deref())
}

fn describe(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    let group = match (task.weekday, task.date.as_deref()) {
        (Some(weekday), _) => format!(" weekday={weekday}"),
        (None, Some(date)) => format!(" date={date}"),
        (None, None) => String::new(),
    };
    format!(
        "[{mark}] {:>10.1} {}{} ({})",
        task.position, task.title, group, task.id
    )
}
