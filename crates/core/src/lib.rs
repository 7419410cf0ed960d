mod adapter;
mod cancel;
mod connector;
mod dialect;
mod diff;
mod error;
mod ordering;
mod plan;
mod schema;
mod script;
mod value;

pub use adapter::{Connection, ConnectionConfig, PreparedStatement, ResultSet, Row};
pub use cancel::CancelToken;
pub use connector::Connector;
pub use dialect::SqlDialect;
pub use diff::{
    ColumnChanges, ColumnTypeChange, Flavour, MYSQL_FLAVOUR, MigrationPair, MysqlFlavour,
    POSTGRES_FLAVOUR, PostgresFlavour, SQLITE_FLAVOUR, SqliteFlavour, TableDiffSummary,
    all_changes, compare, flavour_for_provider,
};
pub use error::{
    DiffError, DriverError, Error, MigrationError, Result, ScanError, SchemaError, SqlGenError,
    ValidationError,
};
pub use ordering::sort_changes;
pub use plan::{Change, ChangeKind, ColumnMetadata, DiffPlan, TableChange};
pub use schema::{
    Column, DatabaseSchema, DefaultValue, ForeignKey, ForeignKeyAction, Index, MIGRATIONS_TABLE,
    PrimaryKey, Table,
};
pub use script::{ROLLBACK_UNAVAILABLE, SqlScript, SqlStatement};
pub use value::{Value, redact_args};
