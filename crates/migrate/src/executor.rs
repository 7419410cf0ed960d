use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use modelql_core::{
    CancelToken, Connection, Error, MIGRATIONS_TABLE, MigrationError, Result, SqlDialect, Value,
};

/// One migration script, named per its directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    pub name: String,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMigration {
    pub migration_name: String,
    pub applied_at: DateTime<Utc>,
    pub checksum: String,
}

/// Applies migration scripts transactionally and keeps the
/// `_prisma_migrations` ledger current. Safe to share across threads;
/// all state lives in the database.
pub struct MigrationExecutor<'a> {
    connection: &'a dyn Connection,
    dialect: SqlDialect,
}

impl<'a> MigrationExecutor<'a> {
    #[must_use]
    pub fn new(connection: &'a dyn Connection, dialect: SqlDialect) -> Self {
        Self {
            connection,
            dialect,
        }
    }

    /// Creates the ledger table when missing.
    pub fn ensure_ledger(&self, ctx: &CancelToken) -> Result<()> {
        ctx.check()?;
        let table = self.dialect.quote_ident(MIGRATIONS_TABLE);
        let sql = match self.dialect {
            SqlDialect::Postgres => format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 \"migration_name\" TEXT PRIMARY KEY, \
                 \"applied_at\" TIMESTAMPTZ NOT NULL, \
                 \"checksum\" TEXT NOT NULL)"
            ),
            SqlDialect::Mysql => format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 `migration_name` VARCHAR(191) PRIMARY KEY, \
                 `applied_at` DATETIME(3) NOT NULL, \
                 `checksum` VARCHAR(64) NOT NULL)"
            ),
            _ => format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 \"migration_name\" TEXT PRIMARY KEY, \
                 \"applied_at\" DATETIME NOT NULL, \
                 \"checksum\" TEXT NOT NULL)"
            ),
        };
        self.connection.execute(&sql, &[], ctx)?;
        Ok(())
    }

    pub fn applied_migrations(&self, ctx: &CancelToken) -> Result<Vec<AppliedMigration>> {
        ctx.check()?;
        let sql = format!(
            "SELECT {}, {}, {} FROM {} ORDER BY {}",
            self.dialect.quote_ident("migration_name"),
            self.dialect.quote_ident("applied_at"),
            self.dialect.quote_ident("checksum"),
            self.dialect.quote_ident(MIGRATIONS_TABLE),
            self.dialect.quote_ident("migration_name"),
        );
        let result = self.connection.query(&sql, &[], ctx)?;

        let mut applied = Vec::with_capacity(result.len());
        for row in result.iter() {
            let name = row
                .get("migration_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let applied_at = match row.get("applied_at") {
                Some(Value::DateTime(at)) => *at,
                Some(Value::Text(raw)) => raw.parse().unwrap_or_else(|_| Utc::now()),
                _ => Utc::now(),
            };
            let checksum = row
                .get("checksum")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            applied.push(AppliedMigration {
                migration_name: name,
                applied_at,
                checksum,
            });
        }

        Ok(applied)
    }

    /// Runs one forward script inside a transaction and records it.
    /// Duplicate names are rejected before anything executes.
    pub fn execute_migration(&self, sql: &str, name: &str, ctx: &CancelToken) -> Result<()> {
        validate_name(name)?;
        let already_applied = self
            .applied_migrations(ctx)?
            .iter()
            .any(|migration| migration.migration_name == name);
        if already_applied {
            return Err(MigrationError::DuplicateName {
                name: name.to_string(),
            }
            .into());
        }

        debug!(name, "applying migration");
        self.run_in_transaction(ctx, |ctx| {
            for statement in split_statements(sql) {
                self.connection.execute(statement, &[], ctx)?;
            }

            let insert = format!(
                "INSERT INTO {} ({}, {}, {}) VALUES ({}, {}, {})",
                self.dialect.quote_ident(MIGRATIONS_TABLE),
                self.dialect.quote_ident("migration_name"),
                self.dialect.quote_ident("applied_at"),
                self.dialect.quote_ident("checksum"),
                self.dialect.placeholder(1),
                self.dialect.placeholder(2),
                self.dialect.placeholder(3),
            );
            self.connection.execute(
                &insert,
                &[
                    Value::text(name),
                    Value::DateTime(Utc::now()),
                    Value::text(checksum(sql)),
                ],
                ctx,
            )?;
            Ok(())
        })?;

        info!(name, "migration applied");
        Ok(())
    }

    /// Runs the supplied rollback script transactionally and deletes
    /// the ledger row.
    pub fn rollback_migration(&self, rollback_sql: &str, name: &str, ctx: &CancelToken) -> Result<()> {
        validate_name(name)?;

        debug!(name, "rolling back migration");
        self.run_in_transaction(ctx, |ctx| {
            for statement in split_statements(rollback_sql) {
                self.connection.execute(statement, &[], ctx)?;
            }

            let delete = format!(
                "DELETE FROM {} WHERE {} = {}",
                self.dialect.quote_ident(MIGRATIONS_TABLE),
                self.dialect.quote_ident("migration_name"),
                self.dialect.placeholder(1),
            );
            self.connection
                .execute(&delete, &[Value::text(name)], ctx)?;
            Ok(())
        })?;

        info!(name, "migration rolled back");
        Ok(())
    }

    /// Applies a batch in order, stopping at the first failure and
    /// reporting how far it got.
    pub fn apply_all(&self, migrations: &[MigrationScript], ctx: &CancelToken) -> Result<usize> {
        let mut applied_count = 0;

        for migration in migrations {
            if let Err(cause) = self.execute_migration(&migration.sql, &migration.name, ctx) {
                return Err(MigrationError::BatchFailed {
                    applied_count,
                    failed_migration: migration.name.clone(),
                    cause: Box::new(cause),
                }
                .into());
            }
            applied_count += 1;
        }

        Ok(applied_count)
    }

    /// Compares a script against the recorded checksum of its applied
    /// ledger row.
    pub fn verify_checksum(&self, sql: &str, name: &str, ctx: &CancelToken) -> Result<()> {
        let computed = checksum(sql);
        let applied = self.applied_migrations(ctx)?;
        let Some(row) = applied
            .iter()
            .find(|migration| migration.migration_name == name)
        else {
            return Ok(());
        };

        if row.checksum != computed {
            return Err(MigrationError::ChecksumMismatch {
                name: name.to_string(),
                recorded: row.checksum.clone(),
                computed,
            }
            .into());
        }
        Ok(())
    }

    fn run_in_transaction<F>(&self, ctx: &CancelToken, body: F) -> Result<()>
    where
        F: FnOnce(&CancelToken) -> Result<()>,
    {
        ctx.check()?;
        self.connection.begin()?;
        match body(ctx) {
            Ok(()) => {
                self.connection.commit()?;
                Ok(())
            }
            Err(error) => {
                let _ = self.connection.rollback();
                Err(error)
            }
        }
    }
}

/// Lowercase hex SHA-256 of the script text, the ledger's checksum
/// format.
#[must_use]
pub fn checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn validate_name(name: &str) -> std::result::Result<(), Error> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid {
        return Err(MigrationError::InvalidName {
            name: name.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Splits a script on statement-terminating semicolons, dropping
/// comment-only and empty fragments. Semicolons inside single-quoted
/// strings do not terminate.
pub(crate) fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut in_string = false;

    for (index, ch) in sql.char_indices() {
        match ch {
            '\'' => in_string = !in_string,
            ';' if !in_string => {
                let fragment = sql[start..index].trim();
                if is_executable(fragment) {
                    statements.push(fragment);
                }
                start = index + 1;
            }
            _ => {}
        }
    }

    let tail = sql[start..].trim();
    if is_executable(tail) {
        statements.push(tail);
    }

    statements
}

fn is_executable(fragment: &str) -> bool {
    fragment
        .lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with("--"))
}
