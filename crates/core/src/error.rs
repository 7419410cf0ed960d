use thiserror::Error;

/// Malformed canonical schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("duplicate column `{column}` on table `{table}`")]
    DuplicateColumn { table: String, column: String },
    #[error("duplicate table `{table}`")]
    DuplicateTable { table: String },
    #[error("primary key of table `{table}` references unknown column `{column}`")]
    UnknownPrimaryKeyColumn { table: String, column: String },
    #[error("index `{index}` on table `{table}` references unknown column `{column}`")]
    UnknownIndexColumn {
        table: String,
        index: String,
        column: String,
    },
    #[error("foreign key `{foreign_key}` on table `{table}` references unknown column `{column}`")]
    UnknownForeignKeyColumn {
        table: String,
        foreign_key: String,
        column: String,
    },
    #[error("foreign key `{foreign_key}` on table `{table}` references missing table `{referenced_table}`")]
    UnknownReferencedTable {
        table: String,
        foreign_key: String,
        referenced_table: String,
    },
    #[error(
        "foreign key `{foreign_key}` on table `{table}` has {column_count} columns but references {referenced_count}"
    )]
    ForeignKeyArityMismatch {
        table: String,
        foreign_key: String,
        column_count: usize,
        referenced_count: usize,
    },
}

/// Unsupported dialect selection for diffing.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("provider `{provider}` has no diff flavour; supported providers are postgres, mysql, sqlite")]
    UnsupportedProvider { provider: String },
}

/// Feature not expressible on the selected dialect.
#[derive(Debug, Error)]
pub enum SqlGenError {
    #[error("dialect `{dialect}` does not support {feature}")]
    UnsupportedFeature { dialect: String, feature: String },
    #[error("cannot render `{change}` for `{target}` on dialect `{dialect}`")]
    UnsupportedChange {
        dialect: String,
        change: String,
        target: String,
    },
}

/// A driver failure, carrying the offending SQL and a redacted argument
/// summary (values never appear in user-visible output).
#[derive(Debug, Error)]
#[error("driver error executing `{sql}` ({redacted_args}): {message}")]
pub struct DriverError {
    pub sql: String,
    pub redacted_args: String,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl DriverError {
    pub fn new(sql: impl Into<String>, redacted_args: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            redacted_args: redacted_args.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(sql: impl Into<String>, redacted_args: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            sql: sql.into(),
            redacted_args: redacted_args.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

/// Row materialization failure.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("column `{column}` holds {found} but the destination field is {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },
    #[error("cannot parse `{raw}` in column `{column}` as a datetime")]
    UnparseableDateTime { column: String, raw: String },
    #[error("row is missing column `{column}`")]
    MissingColumn { column: String },
    #[error("no model descriptor registered for table `{table}`")]
    UnknownModel { table: String },
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration `{name}` was already applied")]
    DuplicateName { name: String },
    #[error("checksum mismatch for migration `{name}`: ledger has {recorded}, script hashes to {computed}")]
    ChecksumMismatch {
        name: String,
        recorded: String,
        computed: String,
    },
    #[error("invalid migration name `{name}`; names must match [a-zA-Z0-9_]+")]
    InvalidName { name: String },
    #[error("batch stopped after {applied_count} migrations at `{failed_migration}`")]
    BatchFailed {
        applied_count: usize,
        failed_migration: String,
        #[source]
        cause: Box<Error>,
    },
    #[error("shadow database unavailable: {reason}; fall back to introspecting the live database")]
    ShadowDbUnavailable { reason: String },
    #[error("migration directory entry `{path}` is not readable: {reason}")]
    UnreadableDirectory { path: String, reason: String },
}

/// Relation metadata inconsistency or a write against an unknown relation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("model `{model}` has no relation named `{relation}`")]
    UnknownRelation { model: String, relation: String },
    #[error("relation `{relation}` on model `{model}` is missing {field}")]
    IncompleteRelation {
        model: String,
        relation: String,
        field: String,
    },
    #[error("field `{field}` on model `{model}` uses attribute `{attribute}` incorrectly: {reason}")]
    InvalidAttribute {
        model: String,
        field: String,
        attribute: String,
        reason: String,
    },
    #[error("relation `{relation}` on model `{model}` points at unknown model `{target}`")]
    UnknownRelationTarget {
        model: String,
        relation: String,
        target: String,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("diff error: {0}")]
    Diff(#[from] DiffError),
    #[error("sql generation error: {0}")]
    SqlGen(#[from] SqlGenError),
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
