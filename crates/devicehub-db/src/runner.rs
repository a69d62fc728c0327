use std::fmt;
use std::io::Write;

use devicehub_common::Result;
use tracing::{info, warn};

use crate::handle::SchemaHandle;
use crate::migrations::{ColumnMigration, DEVICE_COLUMN_MIGRATIONS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementResult {
    Applied,
    /// Driver message for the rejected statement.
    Failed(String),
}

/// What happened to a single column migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementOutcome {
    pub column: &'static str,
    pub result: StatementResult,
}

impl StatementOutcome {
    pub fn is_applied(&self) -> bool {
        self.result == StatementResult::Applied
    }
}

impl fmt::Display for StatementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            StatementResult::Applied => write!(f, "Column {} added", self.column),
            StatementResult::Failed(msg) => write!(f, "{}: {msg}", self.column),
        }
    }
}

/// Applies a fixed list of column migrations, one statement at a time.
///
/// A rejected statement is reported and skipped; it never stops the ones after it.
pub struct MigrationRunner {
    migrations: &'static [ColumnMigration],
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new(DEVICE_COLUMN_MIGRATIONS)
    }
}

impl MigrationRunner {
    pub fn new(migrations: &'static [ColumnMigration]) -> Self {
        Self { migrations }
    }

    /// Run every migration against `handle`, writing one status line per
    /// statement to `out`.
    ///
    /// Every statement is attempted even if `out` stops accepting lines; the
    /// first write failure is returned once all statements have run.
    pub fn run<W: Write>(
        &self,
        handle: &dyn SchemaHandle,
        out: &mut W,
    ) -> Result<Vec<StatementOutcome>> {
        let dialect = handle.dialect();
        let mut outcomes = Vec::with_capacity(self.migrations.len());
        let mut write_err: Option<std::io::Error> = None;

        for migration in self.migrations {
            let sql = migration.to_sql(dialect);
            let result = match handle.execute(&sql) {
                Ok(()) => {
                    info!(column = migration.column, "column added");
                    StatementResult::Applied
                }
                Err(e) => {
                    warn!(column = migration.column, error = %e, "column migration failed");
                    StatementResult::Failed(e.to_string())
                }
            };

            let outcome = StatementOutcome {
                column: migration.column,
                result,
            };
            if write_err.is_none() {
                if let Err(e) = writeln!(out, "{outcome}") {
                    warn!(error = %e, "status output closed, continuing without it");
                    write_err = Some(e);
                }
            }
            outcomes.push(outcome);
        }

        match write_err {
            Some(e) => Err(e.into()),
            None => Ok(outcomes),
        }
    }
}

/// Presence of one migration column in its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnStatus {
    pub column: &'static str,
    pub present: bool,
}

/// Check which device columns already exist, without changing anything.
pub fn column_status(handle: &dyn SchemaHandle) -> Result<Vec<ColumnStatus>> {
    DEVICE_COLUMN_MIGRATIONS
        .iter()
        .map(|m| {
            Ok(ColumnStatus {
                column: m.column,
                present: handle.column_exists(m.table, m.column)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;

    use devicehub_common::Error;

    use super::*;
    use crate::migrations::Dialect;

    /// Records every statement and rejects those mentioning a listed column.
    struct RecordingHandle {
        dialect: Dialect,
        reject: HashSet<&'static str>,
        executed: RefCell<Vec<String>>,
    }

    impl RecordingHandle {
        fn new(dialect: Dialect, reject: &[&'static str]) -> Self {
            Self {
                dialect,
                reject: reject.iter().copied().collect(),
                executed: RefCell::new(Vec::new()),
            }
        }
    }

    impl SchemaHandle for RecordingHandle {
        fn dialect(&self) -> Dialect {
            self.dialect
        }

        fn execute(&self, sql: &str) -> Result<()> {
            self.executed.borrow_mut().push(sql.to_string());
            let column = sql.split_whitespace().nth(5).unwrap_or_default();
            if self.reject.contains(column) {
                return Err(Error::Statement(format!(
                    "SQLSTATE[42S21]: Column already exists: 1060 Duplicate column name '{column}'"
                )));
            }
            Ok(())
        }

        fn column_exists(&self, _table: &str, column: &str) -> Result<bool> {
            Ok(self.reject.contains(column))
        }
    }

    /// Accepts `lines_left` lines, then fails like a closed pipe.
    struct ClosingPipe {
        lines_left: usize,
        written: Vec<u8>,
    }

    impl Write for ClosingPipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.lines_left == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"));
            }
            self.written.extend_from_slice(buf);
            if buf.contains(&b'\n') {
                self.lines_left -= 1;
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn outcome_lines_match_report_format() {
        let ok = StatementOutcome {
            column: "actuators",
            result: StatementResult::Applied,
        };
        assert_eq!(ok.to_string(), "Column actuators added");

        let failed = StatementOutcome {
            column: "thresholds",
            result: StatementResult::Failed("no such table: devices".into()),
        };
        assert_eq!(failed.to_string(), "thresholds: no such table: devices");
    }

    #[test]
    fn executes_mysql_statements_in_order() {
        let handle = RecordingHandle::new(Dialect::MySql, &[]);
        let mut out = Vec::new();
        let outcomes = MigrationRunner::default().run(&handle, &mut out).unwrap();

        assert_eq!(
            *handle.executed.borrow(),
            [
                "ALTER TABLE devices ADD COLUMN actuators JSON AFTER hardware_config",
                "ALTER TABLE devices ADD COLUMN actuator_states JSON AFTER actuators",
                "ALTER TABLE devices ADD COLUMN thresholds JSON AFTER actuator_states",
            ]
        );
        assert!(outcomes.iter().all(StatementOutcome::is_applied));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Column actuators added\nColumn actuator_states added\nColumn thresholds added\n"
        );
    }

    #[test]
    fn earlier_failure_does_not_block_later_statements() {
        let handle = RecordingHandle::new(Dialect::MySql, &["actuators"]);
        let mut out = Vec::new();
        let outcomes = MigrationRunner::default().run(&handle, &mut out).unwrap();

        assert_eq!(handle.executed.borrow().len(), 3);
        assert!(!outcomes[0].is_applied());
        assert!(outcomes[1].is_applied());
        assert!(outcomes[2].is_applied());

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "actuators: SQLSTATE[42S21]: Column already exists: 1060 Duplicate column name 'actuators'"
        );
        assert_eq!(lines[1], "Column actuator_states added");
        assert_eq!(lines[2], "Column thresholds added");
    }

    #[test]
    fn middle_failure_keeps_order() {
        let handle = RecordingHandle::new(Dialect::Sqlite, &["actuator_states"]);
        let mut out = Vec::new();
        let outcomes = MigrationRunner::default().run(&handle, &mut out).unwrap();

        let columns: Vec<_> = outcomes.iter().map(|o| o.column).collect();
        assert_eq!(columns, ["actuators", "actuator_states", "thresholds"]);
        assert_eq!(
            outcomes.iter().map(StatementOutcome::is_applied).collect::<Vec<_>>(),
            [true, false, true]
        );
    }

    #[test]
    fn closed_output_still_runs_every_statement() {
        let handle = RecordingHandle::new(Dialect::Sqlite, &[]);
        let mut pipe = ClosingPipe {
            lines_left: 1,
            written: Vec::new(),
        };
        let err = MigrationRunner::default()
            .run(&handle, &mut pipe)
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(
            *handle.executed.borrow(),
            [
                "ALTER TABLE devices ADD COLUMN actuators JSON",
                "ALTER TABLE devices ADD COLUMN actuator_states JSON",
                "ALTER TABLE devices ADD COLUMN thresholds JSON",
            ]
        );
        assert_eq!(String::from_utf8(pipe.written).unwrap(), "Column actuators added\n");
    }

    #[test]
    fn column_status_reports_each_device_column() {
        let handle = RecordingHandle::new(Dialect::Sqlite, &["thresholds"]);
        let status = column_status(&handle).unwrap();
        assert_eq!(
            status,
            [
                ColumnStatus { column: "actuators", present: false },
                ColumnStatus { column: "actuator_states", present: false },
                ColumnStatus { column: "thresholds", present: true },
            ]
        );
        assert!(handle.executed.borrow().is_empty());
    }
}
