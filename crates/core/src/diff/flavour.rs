use std::fmt::Debug;

use crate::{Column, DiffError, ForeignKey, Index};

/// Per-dialect policy injected into the diff engine, so dialect
/// conditionals never leak into the comparison itself.
///
/// Implementations are stateless; `flavour_for_provider` is the only
/// fallible step of diffing.
pub trait Flavour: Send + Sync + Debug {
    fn provider(&self) -> &'static str;

    /// Structural index equality. The default pairs on ordered column
    /// list plus uniqueness; names are compared by the rename pass.
    fn indexes_match(&self, previous: &Index, next: &Index) -> bool {
        previous.signature() == next.signature()
    }

    /// Structural foreign key equality over (columns, referenced table,
    /// referenced columns, on_delete, on_update).
    fn foreign_keys_match(&self, previous: &ForeignKey, next: &ForeignKey) -> bool {
        previous.signature() == next.signature()
    }

    /// `None` when the two column types are equivalent on this dialect,
    /// otherwise the cast class of the change.
    fn column_type_change(&self, previous: &Column, next: &Column) -> Option<ColumnTypeChange>;

    /// Whether the accumulated alterations on one table must be
    /// expressed as a full table redefinition instead of ALTER
    /// statements.
    fn should_redefine_table(&self, summary: &TableDiffSummary) -> bool {
        let _ = summary;
        false
    }

    fn can_rename_index(&self) -> bool;

    fn can_rename_foreign_key(&self) -> bool;

    /// Dialects that fold table identifiers to lowercase pair tables
    /// case-insensitively.
    fn lower_cases_table_names(&self) -> bool {
        false
    }

    /// Dialect system tables excluded from diffing, in addition to the
    /// always-reserved migration ledger.
    fn table_should_be_ignored(&self, table_name: &str) -> bool {
        let _ = table_name;
        false
    }
}

/// Cast class of a column type change, deciding safety annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnTypeChange {
    /// Every existing value survives the cast.
    SafeCast,
    /// The cast can truncate or reinterpret values.
    RiskyCast,
    /// The dialect cannot cast between the two types in place.
    NotCastable,
}

/// What changed on a paired table, summarized for
/// [`Flavour::should_redefine_table`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TableDiffSummary {
    pub dropped_columns: usize,
    pub type_changed_columns: usize,
    pub tightened_columns: usize,
    pub autoincrement_changed_columns: usize,
    pub primary_key_changed: bool,
    pub created_foreign_keys: usize,
    pub dropped_foreign_keys: usize,
}

impl TableDiffSummary {
    #[must_use]
    pub fn requires_alter(&self) -> bool {
        self.dropped_columns > 0
            || self.type_changed_columns > 0
            || self.tightened_columns > 0
            || self.autoincrement_changed_columns > 0
            || self.primary_key_changed
            || self.created_foreign_keys > 0
            || self.dropped_foreign_keys > 0
    }
}

pub fn flavour_for_provider(provider: &str) -> Result<&'static dyn Flavour, DiffError> {
    match provider {
        "postgres" | "postgresql" => Ok(&POSTGRES_FLAVOUR),
        "mysql" => Ok(&MYSQL_FLAVOUR),
        "sqlite" => Ok(&SQLITE_FLAVOUR),
        other => Err(DiffError::UnsupportedProvider {
            provider: other.to_string(),
        }),
    }
}

pub static POSTGRES_FLAVOUR: PostgresFlavour = PostgresFlavour;
pub static MYSQL_FLAVOUR: MysqlFlavour = MysqlFlavour;
pub static SQLITE_FLAVOUR: SqliteFlavour = SqliteFlavour;

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresFlavour;

impl Flavour for PostgresFlavour {
    fn provider(&self) -> &'static str {
        "postgres"
    }

    fn column_type_change(&self, previous: &Column, next: &Column) -> Option<ColumnTypeChange> {
        let previous_type = normalize_postgres_type(&previous.tpe);
        let next_type = normalize_postgres_type(&next.tpe);
        if previous_type == next_type {
            return None;
        }

        Some(match (previous_type.as_str(), next_type.as_str()) {
            ("int2", "int4" | "int8") | ("int4", "int8") => ColumnTypeChange::SafeCast,
            ("int8", "int4" | "int2") | ("int4", "int2") => ColumnTypeChange::RiskyCast,
            ("float4", "float8") => ColumnTypeChange::SafeCast,
            ("float8", "float4") => ColumnTypeChange::RiskyCast,
            (_, "text") => ColumnTypeChange::SafeCast,
            ("text", _) => ColumnTypeChange::RiskyCast,
            _ => ColumnTypeChange::NotCastable,
        })
    }

    fn can_rename_index(&self) -> bool {
        true
    }

    fn can_rename_foreign_key(&self) -> bool {
        true
    }

    fn table_should_be_ignored(&self, table_name: &str) -> bool {
        table_name.starts_with("pg_") || table_name == "spatial_ref_sys"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlFlavour;

impl Flavour for MysqlFlavour {
    fn provider(&self) -> &'static str {
        "mysql"
    }

    fn column_type_change(&self, previous: &Column, next: &Column) -> Option<ColumnTypeChange> {
        let previous_type = normalize_mysql_type(&previous.tpe);
        let next_type = normalize_mysql_type(&next.tpe);
        if previous_type == next_type {
            return None;
        }

        Some(match (previous_type.as_str(), next_type.as_str()) {
            ("tinyint", "smallint" | "int" | "bigint")
            | ("smallint", "int" | "bigint")
            | ("int", "bigint") => ColumnTypeChange::SafeCast,
            ("bigint", "int" | "smallint" | "tinyint")
            | ("int", "smallint" | "tinyint")
            | ("smallint", "tinyint") => ColumnTypeChange::RiskyCast,
            (_, "text" | "longtext") => ColumnTypeChange::SafeCast,
            ("text" | "longtext", _) => ColumnTypeChange::RiskyCast,
            _ => ColumnTypeChange::NotCastable,
        })
    }

    fn can_rename_index(&self) -> bool {
        // RENAME INDEX requires MySQL 8.0, the oldest version we target.
        true
    }

    fn can_rename_foreign_key(&self) -> bool {
        false
    }

    fn lower_cases_table_names(&self) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteFlavour;

impl Flavour for SqliteFlavour {
    fn provider(&self) -> &'static str {
        "sqlite"
    }

    fn column_type_change(&self, previous: &Column, next: &Column) -> Option<ColumnTypeChange> {
        let previous_type = normalize_sqlite_type(&previous.tpe);
        let next_type = normalize_sqlite_type(&next.tpe);
        if previous_type == next_type {
            return None;
        }

        // SQLite has no in-place column casts at all; every type change
        // goes through a table rebuild.
        Some(ColumnTypeChange::NotCastable)
    }

    fn should_redefine_table(&self, summary: &TableDiffSummary) -> bool {
        summary.requires_alter()
    }

    fn can_rename_index(&self) -> bool {
        false
    }

    fn can_rename_foreign_key(&self) -> bool {
        false
    }

    fn table_should_be_ignored(&self, table_name: &str) -> bool {
        table_name.starts_with("sqlite_")
    }
}

fn normalize_postgres_type(raw: &str) -> String {
    let lowered = base_type_name(raw);
    match lowered.as_str() {
        "smallint" | "smallserial" | "serial2" => "int2".to_string(),
        "integer" | "int" | "serial" | "serial4" => "int4".to_string(),
        "bigint" | "bigserial" | "serial8" => "int8".to_string(),
        "real" => "float4".to_string(),
        "double precision" => "float8".to_string(),
        "character varying" | "varchar" => "varchar".to_string(),
        "character" | "char" => "char".to_string(),
        "boolean" => "bool".to_string(),
        "timestamp without time zone" => "timestamp".to_string(),
        "timestamp with time zone" => "timestamptz".to_string(),
        other => other.to_string(),
    }
}

fn normalize_mysql_type(raw: &str) -> String {
    let lowered = base_type_name(raw);
    match lowered.as_str() {
        "integer" => "int".to_string(),
        "boolean" | "bool" => "tinyint".to_string(),
        other => other.to_string(),
    }
}

fn normalize_sqlite_type(raw: &str) -> String {
    let lowered = base_type_name(raw);
    match lowered.as_str() {
        "int" | "bigint" | "smallint" | "tinyint" | "boolean" | "bool" => "integer".to_string(),
        "varchar" | "char" | "clob" => "text".to_string(),
        "double" | "float" => "real".to_string(),
        other => other.to_string(),
    }
}

/// Lowercases and strips a trailing length/precision suffix:
/// `VARCHAR(191)` → `varchar`.
fn base_type_name(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    match lowered.find('(') {
        Some(index) => lowered[..index].trim_end().to_string(),
        None => lowered,
    }
}
