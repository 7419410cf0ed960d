use modelql_core::{
    CancelToken, Connection, ConnectionConfig, Connector, DatabaseSchema, DiffPlan, DriverError,
    Error, Flavour, SQLITE_FLAVOUR, SqlDialect, SqlGenError, SqlScript,
};

mod adapter;
mod describe;
mod generator;
mod rollback;

/// SQLite end of the toolkit. ALTER support is narrow, so table-scoped
/// alterations render as a create-copy-drop-rename rebuild.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteConnector;

const CONNECTOR_NAME: &str = "sqlite";

impl Connector for SqliteConnector {
    fn name(&self) -> &str {
        CONNECTOR_NAME
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn flavour(&self) -> &'static dyn Flavour {
        &SQLITE_FLAVOUR
    }

    fn render_migration(
        &self,
        plan: &DiffPlan,
        target: &DatabaseSchema,
    ) -> Result<SqlScript, SqlGenError> {
        generator::render_migration(plan, target)
    }

    fn render_rollback(
        &self,
        plan: &DiffPlan,
        previous: &DatabaseSchema,
    ) -> Result<SqlScript, SqlGenError> {
        rollback::render_rollback(plan, previous)
    }

    fn describe_schema(
        &self,
        connection: &dyn Connection,
        ctx: &CancelToken,
    ) -> Result<DatabaseSchema, Error> {
        describe::describe_schema(connection, ctx)
    }

    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>, DriverError> {
        adapter::connect(config)
    }
}
