use std::fmt::Write as _;

/// Rendered migration script: ordered statements plus per-statement
/// warnings surfaced as SQL comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlScript {
    pub statements: Vec<SqlStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    pub sql: String,
    /// Statements marked non-transactional run outside the migration
    /// transaction (e.g. `CREATE INDEX CONCURRENTLY`).
    pub transactional: bool,
    pub warnings: Vec<String>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            transactional: true,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn non_transactional(mut self) -> Self {
        self.transactional = false;
        self
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Sentinel written in place of a rollback that cannot be generated.
pub const ROLLBACK_UNAVAILABLE: &str = "-- rollback unavailable";

impl SqlScript {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn push(&mut self, statement: SqlStatement) {
        self.statements.push(statement);
    }

    /// Renders the script as the text of a `migration.sql` /
    /// `rollback.sql` file: warnings as a leading comment block, one
    /// statement per line, `;`-terminated.
    #[must_use]
    pub fn render(&self) -> String {
        let mut rendered = String::new();
        for statement in &self.statements {
            for warning in &statement.warnings {
                writeln!(rendered, "-- warning: {warning}").expect("writing to String should not fail");
            }
            rendered.push_str(&statement.sql);
            if !statement.sql.ends_with(';') && !statement.sql.starts_with("--") {
                rendered.push(';');
            }
            rendered.push('\n');
        }
        rendered
    }
}
