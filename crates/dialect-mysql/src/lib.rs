use modelql_core::{
    CancelToken, Connection, ConnectionConfig, Connector, DatabaseSchema, DiffPlan, DriverError,
    Error, Flavour, MYSQL_FLAVOUR, SqlDialect, SqlGenError, SqlScript,
};

mod adapter;
mod describe;
mod export_queries;
mod generator;
mod rollback;

/// MySQL end of the toolkit: DDL rendering with rollback, live
/// introspection, and a sync driver adapter over `mysql`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlConnector;

const CONNECTOR_NAME: &str = "mysql";

impl Connector for MysqlConnector {
    fn name(&self) -> &str {
        CONNECTOR_NAME
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Mysql
    }

    fn flavour(&self) -> &'static dyn Flavour {
        &MYSQL_FLAVOUR
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
