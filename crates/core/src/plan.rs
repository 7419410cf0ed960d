use crate::DefaultValue;

/// Ordered, safety-annotated list of schema changes plus their
/// table-level summaries. Output of the diff engine, input to the
/// dialect DDL renderers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffPlan {
    pub tables_to_create: Vec<TableChange>,
    pub tables_to_alter: Vec<TableChange>,
    pub tables_to_drop: Vec<TableChange>,
    /// Flat, executable form: topologically sorted, one DDL statement
    /// per entry.
    pub changes: Vec<Change>,
}

impl DiffPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Changes that can drop data or fail on existing rows.
    pub fn unsafe_changes(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|change| !change.is_safe)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChange {
    pub table: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub kind: ChangeKind,
    pub table: String,
    pub column: Option<String>,
    pub index: Option<String>,
    pub description: String,
    /// `true` iff the change cannot drop data and cannot fail on
    /// existing contents.
    pub is_safe: bool,
    pub warnings: Vec<String>,
    pub column_metadata: Option<ColumnMetadata>,
    pub old_name: Option<String>,
    pub new_name: Option<String>,
}

impl Change {
    #[must_use]
    pub fn new(kind: ChangeKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            column: None,
            index: None,
            description: String::new(),
            is_safe: true,
            warnings: Vec::new(),
            column_metadata: None,
            old_name: None,
            new_name: None,
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    #[must_use]
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    #[must_use]
    pub fn unsafe_with(mut self, warning: impl Into<String>) -> Self {
        self.is_safe = false;
        self.warnings.push(warning.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: ColumnMetadata) -> Self {
        self.column_metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn renamed(mut self, old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        self.old_name = Some(old_name.into());
        self.new_name = Some(new_name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    CreateTable,
    DropTable,
    RedefineTable,
    AddColumn,
    DropColumn,
    AlterColumn,
    CreateIndex,
    DropIndex,
    RenameIndex,
    CreateForeignKey,
    DropForeignKey,
    RenameForeignKey,
}

impl ChangeKind {
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::CreateTable => "CreateTable",
            Self::DropTable => "DropTable",
            Self::RedefineTable => "RedefineTable",
            Self::AddColumn => "AddColumn",
            Self::DropColumn => "DropColumn",
            Self::AlterColumn => "AlterColumn",
            Self::CreateIndex => "CreateIndex",
            Self::DropIndex => "DropIndex",
            Self::RenameIndex => "RenameIndex",
            Self::CreateForeignKey => "CreateForeignKey",
            Self::DropForeignKey => "DropForeignKey",
            Self::RenameForeignKey => "RenameForeignKey",
        }
    }
}

/// Column shape carried on Add/Alter/Drop column changes so renderers
/// and rollback generation never have to re-derive it from a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    pub tpe: String,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    pub auto_increment: bool,
    /// Populated on AlterColumn only.
    pub old_tpe: Option<String>,
    pub old_nullable: Option<bool>,
}

impl ColumnMetadata {
    #[must_use]
    pub fn new(tpe: impl Into<String>, nullable: bool) -> Self {
        Self {
            tpe: tpe.into(),
            nullable,
            default: None,
            auto_increment: false,
            old_tpe: None,
            old_nullable: None,
        }
    }
}
