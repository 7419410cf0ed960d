use std::fmt::Write as _;

use modelql_core::{
    Change, ChangeKind, Column, ColumnMetadata, DatabaseSchema, DefaultValue, DiffPlan,
    ForeignKey, Index, SqlGenError, SqlScript, SqlStatement, Table,
};

const DIALECT_NAME: &str = "mysql";

pub(crate) fn render_migration(
    plan: &DiffPlan,
    target: &DatabaseSchema,
) -> Result<SqlScript, SqlGenError> {
    let mut script = SqlScript::default();

    for change in &plan.changes {
        let statement = emit_change(change, target)?;
        script.push(statement.with_warnings(change.warnings.clone()));
    }

    Ok(script)
}

fn emit_change(change: &Change, target: &DatabaseSchema) -> Result<SqlStatement, SqlGenError> {
    let sql = match change.kind {
        ChangeKind::CreateTable => {
            let table = target_table(target, change)?;
            render_create_table(table)
        }
        ChangeKind::DropTable => format!("DROP TABLE {}", quote(&change.table)),
        ChangeKind::AddColumn => {
            let metadata = column_metadata(change)?;
            format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote(&change.table),
                render_column_from_metadata(change, metadata)
            )
        }
        ChangeKind::DropColumn => format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote(&change.table),
            quote(change_column(change)?)
        ),
        ChangeKind::AlterColumn => match &change.column {
            // MODIFY re-states the whole definition; one statement
            // covers every facet of the change.
            Some(_) => {
                let metadata = column_metadata(change)?;
                format!(
                    "ALTER TABLE {} MODIFY {}",
                    quote(&change.table),
                    render_column_from_metadata(change, metadata)
                )
            }
            None => {
                let table = target_table(target, change)?;
                let mut sql = format!("ALTER TABLE {} DROP PRIMARY KEY", quote(&change.table));
                if let Some(primary_key) = &table.primary_key {
                    write!(sql, ", ADD PRIMARY KEY ({})", quote_list(&primary_key.columns))
                        .expect("writing to String should not fail");
                }
                sql
            }
        },
        ChangeKind::CreateIndex => {
            let table = target_table(target, change)?;
            let index = find_index(table, change)?;
            render_create_index(&change.table, index)
        }
        ChangeKind::DropIndex => format!(
            "DROP INDEX {} ON {}",
            quote(change_index(change)?),
            quote(&change.table)
        ),
        ChangeKind::RenameIndex => format!(
            "ALTER TABLE {} RENAME INDEX {} TO {}",
            quote(&change.table),
            quote(old_name(change)?),
            quote(new_name(change)?)
        ),
        ChangeKind::CreateForeignKey => {
            let table = target_table(target, change)?;
            let foreign_key = find_foreign_key(table, change)?;
            format!(
                "ALTER TABLE {} ADD CONSTRAINT {} {}",
                quote(&change.table),
                quote(&foreign_key.name),
                render_foreign_key_clause(foreign_key)
            )
        }
        ChangeKind::DropForeignKey => format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            quote(&change.table),
            quote(change_index(change)?)
        ),
        ChangeKind::RenameForeignKey => {
            return Err(unsupported(change, "mysql cannot rename foreign keys"));
        }
        ChangeKind::RedefineTable => {
            return Err(unsupported(change, "mysql alters tables in place"));
        }
    };

    Ok(SqlStatement::new(sql))
}

pub(crate) fn render_create_table(table: &Table) -> String {
    let mut elements = Vec::new();

    for column in &table.columns {
        let inline_unique = table
            .indexes
            .iter()
            .any(|index| index.unique && index.columns.len() == 1 && index.columns[0] == column.name);
        elements.push(render_column(column, inline_unique));
    }

    if let Some(primary_key) = &table.primary_key {
        elements.push(format!("PRIMARY KEY ({})", quote_list(&primary_key.columns)));
    }

    for index in table
        .indexes
        .iter()
        .filter(|index| index.unique && index.columns.len() > 1)
    {
        elements.push(format!(
            "UNIQUE INDEX {} ({})",
            quote(&index.name),
            quote_list(&index.columns)
        ));
    }

    for foreign_key in &table.foreign_keys {
        elements.push(format!(
            "CONSTRAINT {} {}",
            quote(&foreign_key.name),
            render_foreign_key_clause(foreign_key)
        ));
    }

    format!("CREATE TABLE {} ({})", quote(&table.name), elements.join(", "))
}

fn render_column(column: &Column, inline_unique: bool) -> String {
    let mut sql = format!("{} {}", quote(&column.name), column.tpe);

    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if column.auto_increment {
        sql.push_str(" AUTO_INCREMENT");
    }
    if inline_unique {
        sql.push_str(" UNIQUE");
    }
    if let Some(default) = &column.default {
        write!(sql, " DEFAULT {}", render_default(default)).expect("writing to String should not fail");
    }

    sql
}

pub(crate) fn render_default(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Literal(literal) => literal.clone(),
        DefaultValue::Function { name, args } => format!("{name}({})", args.join(", ")),
    }
}

pub(crate) fn render_create_index(table: &str, index: &Index) -> String {
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        quote(&index.name),
        quote(table),
        quote_list(&index.columns)
    )
}

pub(crate) fn render_foreign_key_clause(foreign_key: &ForeignKey) -> String {
    format!(
        "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
        quote_list(&foreign_key.columns),
        quote(&foreign_key.referenced_table),
        quote_list(&foreign_key.referenced_columns),
        foreign_key.on_delete.as_sql(),
        foreign_key.on_update.as_sql(),
    )
}

pub(crate) fn render_column_from_metadata(change: &Change, metadata: &ColumnMetadata) -> String {
    let column = Column {
        name: change.column.clone().unwrap_or_default(),
        tpe: metadata.tpe.clone(),
        nullable: metadata.nullable,
        default: metadata.default.clone(),
        auto_increment: metadata.auto_increment,
    };
    render_column(&column, false)
}

pub(crate) fn quote(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

pub(crate) fn quote_list(idents: &[String]) -> String {
    idents
        .iter()
        .map(|ident| quote(ident))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn target_table<'a>(
    schema: &'a DatabaseSchema,
    change: &Change,
) -> Result<&'a Table, SqlGenError> {
    schema
        .table(&change.table)
        .ok_or_else(|| unsupported(change, "table missing from the target schema"))
}

pub(crate) fn find_index<'a>(table: &'a Table, change: &Change) -> Result<&'a Index, SqlGenError> {
    let name = change_index(change)?;
    table
        .index(name)
        .ok_or_else(|| unsupported(change, "index missing from the target schema"))
}

pub(crate) fn find_foreign_key<'a>(
    table: &'a Table,
    change: &Change,
) -> Result<&'a ForeignKey, SqlGenError> {
    let name = change_index(change)?;
    table
        .foreign_keys
        .iter()
        .find(|foreign_key| foreign_key.name == name)
        .ok_or_else(|| unsupported(change, "foreign key missing from the target schema"))
}

pub(crate) fn column_metadata(change: &Change) -> Result<&ColumnMetadata, SqlGenError> {
    change
        .column_metadata
        .as_ref()
        .ok_or_else(|| unsupported(change, "change carries no column metadata"))
}

pub(crate) fn change_column(change: &Change) -> Result<&str, SqlGenError> {
    change
        .column
        .as_deref()
        .ok_or_else(|| unsupported(change, "change names no column"))
}

pub(crate) fn change_index(change: &Change) -> Result<&str, SqlGenError> {
    change
        .index
        .as_deref()
        .ok_or_else(|| unsupported(change, "change names no index or constraint"))
}

pub(crate) fn old_name(change: &Change) -> Result<&str, SqlGenError> {
    change
        .old_name
        .as_deref()
        .ok_or_else(|| unsupported(change, "rename carries no old name"))
}

pub(crate) fn new_name(change: &Change) -> Result<&str, SqlGenError> {
    change
        .new_name
        .as_deref()
        .ok_or_else(|| unsupported(change, "rename carries no new name"))
}

pub(crate) fn unsupported(change: &Change, target: &str) -> SqlGenError {
    SqlGenError::UnsupportedChange {
        dialect: DIALECT_NAME.to_string(),
        change: change.kind.tag().to_string(),
        target: format!("{} ({target})", change.table),
    }
}
