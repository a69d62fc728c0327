pub mod handle;
pub mod migrations;
pub mod runner;

pub use handle::{SchemaHandle, SqliteHandle};
pub use migrations::{ColumnMigration, DEVICE_COLUMN_MIGRATIONS, Dialect, render_plan};
pub use runner::{ColumnStatus, MigrationRunner, StatementOutcome, StatementResult, column_status};
