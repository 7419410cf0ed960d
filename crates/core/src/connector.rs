use crate::{
    CancelToken, ConnectionConfig, Connection, DatabaseSchema, DiffPlan, DriverError, Error,
    Flavour, SqlDialect, SqlScript, SqlGenError,
};

/// One SQL backend wired end to end: diff policy, DDL rendering with
/// rollback, live-catalog introspection, and connection establishment.
/// Implemented once per dialect crate.
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    fn dialect(&self) -> SqlDialect;

    /// Diff policy used when this backend is the migration target.
    fn flavour(&self) -> &'static dyn Flavour;

    /// Renders the plan into forward DDL. `target` is the schema the
    /// plan migrates *to*; renderers read table shapes from it instead
    /// of re-deriving them from changes.
    fn render_migration(&self, plan: &DiffPlan, target: &DatabaseSchema) -> Result<SqlScript, SqlGenError>;

    /// Renders the inverse script, walking the plan backwards.
    /// `previous` is the schema the plan migrated *from*; it supplies
    /// the shapes of dropped objects. Inverses that cannot be
    /// reconstructed emit the rollback-unavailable sentinel and
    /// continue.
    fn render_rollback(&self, plan: &DiffPlan, previous: &DatabaseSchema) -> Result<SqlScript, SqlGenError>;

    /// Reads the live catalog into the canonical schema (the migration
    /// ledger and dialect system tables are excluded).
    fn describe_schema(&self, connection: &dyn Connection, ctx: &CancelToken) -> Result<DatabaseSchema, Error>;

    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>, DriverError>;
}
