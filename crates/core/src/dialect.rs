use std::fmt;

/// Target dialect tag shared by the DML generators, the migration
/// executor, and the dialect connector crates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    Postgres,
    Mysql,
    Sqlite,
    Mssql,
    Mongodb,
}

impl SqlDialect {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Mssql => "mssql",
            Self::Mongodb => "mongodb",
        }
    }

    /// Identifier quoting: `"x"` (postgres, sqlite), `` `x` `` (mysql),
    /// `[x]` (mssql). MongoDB identifiers are never quoted.
    #[must_use]
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Self::Postgres | Self::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::Mysql => format!("`{}`", ident.replace('`', "``")),
            Self::Mssql => format!("[{}]", ident.replace(']', "]]")),
            Self::Mongodb => ident.to_string(),
        }
    }

    /// Placeholder for the 1-based argument `index`: `$1` (postgres),
    /// `@p1` (mssql), `?` otherwise.
    #[must_use]
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            Self::Mssql => format!("@p{index}"),
            Self::Mysql | Self::Sqlite => "?".to_string(),
            Self::Mongodb => String::new(),
        }
    }

    /// Whether `INSERT ... RETURNING *` (or `OUTPUT INSERTED.*`) hands
    /// the inserted row back; otherwise the executor re-selects by
    /// last-insert-id.
    #[must_use]
    pub fn supports_returning(&self) -> bool {
        matches!(self, Self::Postgres | Self::Mssql)
    }

    /// MySQL cannot express OFFSET without LIMIT; the generator inserts
    /// the documented sentinel.
    #[must_use]
    pub fn requires_limit_with_offset(&self) -> bool {
        matches!(self, Self::Mysql)
    }

    /// SQLite stores booleans as INTEGER 0/1; the scanner converts.
    #[must_use]
    pub fn stores_booleans_as_integers(&self) -> bool {
        matches!(self, Self::Sqlite)
    }

    /// SQLite stores datetimes as TEXT; the scanner parses through the
    /// format cascade.
    #[must_use]
    pub fn stores_datetimes_as_text(&self) -> bool {
        matches!(self, Self::Sqlite)
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
