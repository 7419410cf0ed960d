use std::collections::BTreeSet;

use crate::SchemaError;

/// The migration ledger table. Reserved: it never participates in diffs.
pub const MIGRATIONS_TABLE: &str = "_prisma_migrations";

/// Canonical description of a database, the single representation the
/// diff engine operates on. Produced both by live introspection and by
/// the data-model converter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseSchema {
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|index| index.name == name)
    }

    /// Column names of the primary key, in key order.
    #[must_use]
    pub fn primary_key_columns(&self) -> &[String] {
        self.primary_key
            .as_ref()
            .map(|pk| pk.columns.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// Dialect type string, e.g. `TEXT`, `INTEGER`, `varchar(191)`.
    pub tpe: String,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    pub auto_increment: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, tpe: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tpe: tpe.into(),
            nullable: false,
            default: None,
            auto_increment: false,
        }
    }

    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    #[must_use]
    pub fn default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A literal rendered into DDL as-is (quoting already applied for
    /// strings during introspection / conversion).
    Literal(String),
    /// A database function call such as `now()` or `CURRENT_TIMESTAMP`.
    Function { name: String, args: Vec<String> },
}

impl DefaultValue {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self::Function {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl Index {
    /// Structural signature used to pair indexes across schemas:
    /// ordered column list plus uniqueness, independent of the name.
    #[must_use]
    pub fn signature(&self) -> (Vec<String>, bool) {
        (self.columns.clone(), self.unique)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
}

impl ForeignKey {
    /// Structural signature used to pair foreign keys across schemas.
    #[must_use]
    pub fn signature(&self) -> (Vec<String>, String, Vec<String>, ForeignKeyAction, ForeignKeyAction) {
        (
            self.columns.clone(),
            self.referenced_table.clone(),
            self.referenced_columns.clone(),
            self.on_delete,
            self.on_update,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ForeignKeyAction {
    Cascade,
    Restrict,
    NoAction,
    SetNull,
    SetDefault,
}

impl ForeignKeyAction {
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

impl DatabaseSchema {
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// Checks the structural invariants: unique table and column names,
    /// primary key and index columns existing on their table, foreign
    /// keys referencing existing tables with matching column arity.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut table_names = BTreeSet::new();
        for table in &self.tables {
            if !table_names.insert(table.name.as_str()) {
                return Err(SchemaError::DuplicateTable {
                    table: table.name.clone(),
                });
            }
        }

        for table in &self.tables {
            let mut column_names = BTreeSet::new();
            for column in &table.columns {
                if !column_names.insert(column.name.as_str()) {
                    return Err(SchemaError::DuplicateColumn {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
            }

            if let Some(primary_key) = &table.primary_key {
                for column in &primary_key.columns {
                    if !column_names.contains(column.as_str()) {
                        return Err(SchemaError::UnknownPrimaryKeyColumn {
                            table: table.name.clone(),
                            column: column.clone(),
                        });
                    }
                }
            }

            for index in &table.indexes {
                for column in &index.columns {
                    if !column_names.contains(column.as_str()) {
                        return Err(SchemaError::UnknownIndexColumn {
                            table: table.name.clone(),
                            index: index.name.clone(),
                            column: column.clone(),
                        });
                    }
                }
            }

            for foreign_key in &table.foreign_keys {
                for column in &foreign_key.columns {
                    if !column_names.contains(column.as_str()) {
                        return Err(SchemaError::UnknownForeignKeyColumn {
                            table: table.name.clone(),
                            foreign_key: foreign_key.name.clone(),
                            column: column.clone(),
                        });
                    }
                }

                let Some(referenced) = self.table(&foreign_key.referenced_table) else {
                    return Err(SchemaError::UnknownReferencedTable {
                        table: table.name.clone(),
                        foreign_key: foreign_key.name.clone(),
                        referenced_table: foreign_key.referenced_table.clone(),
                    });
                };

                if foreign_key.columns.len() != foreign_key.referenced_columns.len() {
                    return Err(SchemaError::ForeignKeyArityMismatch {
                        table: table.name.clone(),
                        foreign_key: foreign_key.name.clone(),
                        column_count: foreign_key.columns.len(),
                        referenced_count: foreign_key.referenced_columns.len(),
                    });
                }

                for column in &foreign_key.referenced_columns {
                    if referenced.column(column).is_none() {
                        return Err(SchemaError::UnknownForeignKeyColumn {
                            table: foreign_key.referenced_table.clone(),
                            foreign_key: foreign_key.name.clone(),
                            column: column.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
