use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use modelql_core::{
    CancelToken, Connection, ConnectionConfig, Connector, DatabaseSchema, MigrationError, Result,
    SqlDialect,
};

use crate::executor::{MigrationExecutor, MigrationScript};

/// An ephemeral replica used solely to compute a trusted "previous"
/// schema: every known forward migration replays into it, the result
/// is introspected, and the database is dropped again.
///
/// Creation or replay failure is not fatal to the caller; the
/// returned error says to fall back to introspecting the live
/// database.
pub struct ShadowDatabase<'a> {
    connector: &'a dyn Connector,
    connection: Box<dyn Connection>,
    cleanup: Cleanup,
}

enum Cleanup {
    /// Drop the scratch database through the admin connection.
    DropDatabase {
        admin: Box<dyn Connection>,
        name: String,
    },
    /// Delete the scratch SQLite file.
    DeleteFile(std::path::PathBuf),
    /// Caller-supplied shadow database; leave it alone.
    None,
}

impl<'a> ShadowDatabase<'a> {
    /// Creates the shadow environment. With `shadow_config` the caller
    /// owns the database and only the connection is established;
    /// otherwise a uniquely named scratch database (or temp file for
    /// SQLite) is created next to the primary.
    pub fn create(
        connector: &'a dyn Connector,
        primary: &ConnectionConfig,
        shadow_config: Option<&ConnectionConfig>,
    ) -> Result<Self> {
        if let Some(config) = shadow_config {
            let connection = connector
                .connect(config)
                .map_err(|error| unavailable(format!("connect to shadow database: {error}")))?;
            return Ok(Self {
                connector,
                connection,
                cleanup: Cleanup::None,
            });
        }

        match connector.dialect() {
            SqlDialect::Sqlite => Self::create_sqlite(connector, primary),
            _ => Self::create_scratch_database(connector, primary),
        }
    }

    fn create_sqlite(connector: &'a dyn Connector, primary: &ConnectionConfig) -> Result<Self> {
        let file = std::env::temp_dir().join(format!("{}.db", scratch_name(primary)));
        let config = ConnectionConfig {
            database: file.display().to_string(),
            ..primary.clone()
        };
        let connection = connector
            .connect(&config)
            .map_err(|error| unavailable(format!("open shadow database file: {error}")))?;

        Ok(Self {
            connector,
            connection,
            cleanup: Cleanup::DeleteFile(file),
        })
    }

    fn create_scratch_database(
        connector: &'a dyn Connector,
        primary: &ConnectionConfig,
    ) -> Result<Self> {
        let name = scratch_name(primary);
        let admin = connector
            .connect(primary)
            .map_err(|error| unavailable(format!("connect for shadow creation: {error}")))?;

        let create_sql = format!(
            "CREATE DATABASE {}",
            connector.dialect().quote_ident(&name)
        );
        admin
            .execute(&create_sql, &[], &CancelToken::new())
            .map_err(|error| unavailable(format!("create shadow database: {error}")))?;

        let config = ConnectionConfig {
            database: name.clone(),
            ..primary.clone()
        };
        let connection = match connector.connect(&config) {
            Ok(connection) => connection,
            Err(error) => {
                let drop_sql = format!(
                    "DROP DATABASE {}",
                    connector.dialect().quote_ident(&name)
                );
                let _ = admin.execute(&drop_sql, &[], &CancelToken::new());
                return Err(unavailable(format!("connect to shadow database: {error}")));
            }
        };

        Ok(Self {
            connector,
            connection,
            cleanup: Cleanup::DropDatabase { admin, name },
        })
    }

    /// Replays the forward migrations in order and introspects the
    /// resulting schema.
    pub fn schema_from_migrations(
        &self,
        migrations: &[MigrationScript],
        ctx: &CancelToken,
    ) -> Result<DatabaseSchema> {
        debug!(count = migrations.len(), "replaying migrations into shadow database");
        let executor = MigrationExecutor::new(self.connection.as_ref(), self.connector.dialect());
        executor
            .ensure_ledger(ctx)
            .map_err(|error| unavailable(format!("bootstrap shadow ledger: {error}")))?;
        executor
            .apply_all(migrations, ctx)
            .map_err(|error| unavailable(format!("replay migrations: {error}")))?;

        self.connector
            .describe_schema(self.connection.as_ref(), ctx)
            .map_err(|error| unavailable(format!("introspect shadow database: {error}")))
    }

    /// Releases the scratch database. Failures are logged, not
    /// propagated; the shadow is best-effort state.
    pub fn close(self) {
        match self.cleanup {
            Cleanup::DropDatabase { admin, name } => {
                drop(self.connection);
                let drop_sql = format!(
                    "DROP DATABASE {}",
                    self.connector.dialect().quote_ident(&name)
                );
                if let Err(error) = admin.execute(&drop_sql, &[], &CancelToken::new()) {
                    warn!(%name, %error, "failed to drop shadow database");
                }
            }
            Cleanup::DeleteFile(path) => {
                drop(self.connection);
                if let Err(error) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), %error, "failed to delete shadow database file");
                }
            }
            Cleanup::None => {}
        }
    }
}

fn unavailable(reason: String) -> modelql_core::Error {
    MigrationError::ShadowDbUnavailable { reason }.into()
}

/// Unique-enough scratch name derived from the primary database and
/// the process id, stable within one run.
fn scratch_name(primary: &ConnectionConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(primary.database.as_bytes());
    hasher.update(std::process::id().to_le_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("modelql_shadow_{}", &digest[..12])
}
