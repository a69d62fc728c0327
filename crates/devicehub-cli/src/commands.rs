use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use devicehub_db::{Dialect, MigrationRunner, SqliteHandle, column_status, render_plan};
use tracing::{info, warn};

/// Apply the device column migrations. Per-column failures are reported on
/// stdout and never change the exit status.
pub fn migrate(db_path: &Path) -> Result<()> {
    let stdout = std::io::stdout();
    migrate_to(db_path, &mut stdout.lock())
}

/// Only a database that cannot be opened is an error; a closed `out` is logged.
fn migrate_to<W: Write>(db_path: &Path, out: &mut W) -> Result<()> {
    let handle = SqliteHandle::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    match MigrationRunner::default().run(&handle, out) {
        Ok(outcomes) => {
            let applied = outcomes.iter().filter(|o| o.is_applied()).count();
            info!("{applied} of {} columns added", outcomes.len());
        }
        Err(e) => warn!("migration status was not fully written: {e}"),
    }
    if let Err(e) = out.flush() {
        warn!("failed to flush migration status: {e}");
    }
    Ok(())
}

pub fn plan(dialect: Dialect) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for sql in render_plan(dialect) {
        writeln!(out, "{sql};")?;
    }
    Ok(())
}

pub fn status(db_path: &Path) -> Result<()> {
    let handle = SqliteHandle::open_read_only(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for s in column_status(&handle).context("failed to read devices schema")? {
        let state = if s.present { "present" } else { "missing" };
        writeln!(out, "{:<16} {state}", s.column)?;
    }
    Ok(())
}
