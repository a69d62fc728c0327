use std::fmt;
use std::str::FromStr;

use devicehub_common::Error;

/// One additive, nullable column change.
///
/// Migrations are never reverted and never tracked; re-applying one relies on
/// the database rejecting the duplicate column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMigration {
    pub table: &'static str,
    pub column: &'static str,
    pub column_type: &'static str,
    /// Column the new one is placed after, where the dialect supports it.
    pub after: &'static str,
}

/// JSON columns appended to `devices`, in application order.
pub const DEVICE_COLUMN_MIGRATIONS: &[ColumnMigration] = &[
    ColumnMigration {
        table: "devices",
        column: "actuators",
        column_type: "JSON",
        after: "hardware_config",
    },
    ColumnMigration {
        table: "devices",
        column: "actuator_states",
        column_type: "JSON",
        after: "actuators",
    },
    ColumnMigration {
        table: "devices",
        column: "thresholds",
        column_type: "JSON",
        after: "actuator_states",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(Error::Config(format!("unknown SQL dialect: {other}"))),
        }
    }
}

impl ColumnMigration {
    /// Render the `ALTER TABLE` statement for `dialect`.
    ///
    /// SQLite has no positional clause; columns are appended, so applying the
    /// list in order still yields the documented layout when `after` is the
    /// table's last column.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        match dialect {
            Dialect::MySql => format!(
                "ALTER TABLE {} ADD COLUMN {} {} AFTER {}",
                self.table, self.column, self.column_type, self.after
            ),
            Dialect::Sqlite => format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                self.table, self.column, self.column_type
            ),
        }
    }
}

/// All device column statements for `dialect`, in application order.
pub fn render_plan(dialect: Dialect) -> Vec<String> {
    DEVICE_COLUMN_MIGRATIONS
        .iter()
        .map(|m| m.to_sql(dialect))
        .collect()
}
