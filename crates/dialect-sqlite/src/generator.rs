use std::fmt::Write as _;

use modelql_core::{
    Change, ChangeKind, Column, ColumnMetadata, DatabaseSchema, DefaultValue, DiffPlan,
    ForeignKey, Index, SqlGenError, SqlScript, SqlStatement, Table,
};

const DIALECT_NAME: &str = "sqlite";
const REBUILD_TABLE_PREFIX: &str = "_modelql_new_";

pub(crate) fn render_migration(
    plan: &DiffPlan,
    target: &DatabaseSchema,
) -> Result<SqlScript, SqlGenError> {
    let mut script = SqlScript::default();

    for change in &plan.changes {
        match change.kind {
            ChangeKind::RedefineTable => {
                let statements = render_rebuild(change, plan, target)?;
                let mut statements = statements.into_iter();
                if let Some(first) = statements.next() {
                    script.push(first.with_warnings(change.warnings.clone()));
                }
                for statement in statements {
                    script.push(statement);
                }
            }
            ChangeKind::CreateTable => {
                // Named unique indexes cannot ride inline: an inline
                // UNIQUE becomes an anonymous autoindex and would not
                // survive an introspection round-trip.
                let table = target_table(target, change)?;
                script.push(
                    SqlStatement::new(render_create_table(table, &table.name))
                        .with_warnings(change.warnings.clone()),
                );
                for index in table.indexes.iter().filter(|index| index.unique) {
                    script.push(SqlStatement::new(render_create_index(&table.name, index)));
                }
            }
            _ => {
                let statement = emit_simple_change(change, target)?;
                script.push(statement.with_warnings(change.warnings.clone()));
            }
        }
    }

    Ok(script)
}

fn emit_simple_change(change: &Change, target: &DatabaseSchema) -> Result<SqlStatement, SqlGenError> {
    let sql = match change.kind {
        ChangeKind::DropTable => format!("DROP TABLE {}", quote(&change.table)),
        ChangeKind::AddColumn => {
            let metadata = column_metadata(change)?;
            format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote(&change.table),
                render_column_from_metadata(change, metadata)
            )
        }
        ChangeKind::CreateIndex => {
            let table = target_table(target, change)?;
            let index = find_index(table, change)?;
            render_create_index(&change.table, index)
        }
        ChangeKind::DropIndex => format!("DROP INDEX {}", quote(change_index(change)?)),
        ChangeKind::DropColumn
        | ChangeKind::AlterColumn
        | ChangeKind::CreateForeignKey
        | ChangeKind::DropForeignKey => {
            return Err(unsupported(
                change,
                "table-scoped alterations must arrive as RedefineTable on sqlite",
            ));
        }
        ChangeKind::RenameIndex | ChangeKind::RenameForeignKey => {
            return Err(unsupported(change, "sqlite cannot rename constraints in place"));
        }
        ChangeKind::CreateTable | ChangeKind::RedefineTable => {
            unreachable!("rendered with their companion statements by render_migration");
        }
    };

    Ok(SqlStatement::new(sql))
}

/// The classic four-step rebuild: create the new shape under a scratch
/// name, copy the surviving rows, drop the old table, rename. Indexes
/// die with the old table, so the target's indexes are re-created
/// afterwards (except those the plan creates separately anyway).
fn render_rebuild(
    change: &Change,
    plan: &DiffPlan,
    target: &DatabaseSchema,
) -> Result<Vec<SqlStatement>, SqlGenError> {
    let table = target_table(target, change)?;
    let rebuild_name = format!("{REBUILD_TABLE_PREFIX}{}", table.name);

    // Columns introduced by separate AddColumn changes in this plan do
    // not exist in the old table; keep them out of the rebuilt shape
    // and the copy list.
    let added_columns = plan
        .changes
        .iter()
        .filter(|other| other.kind == ChangeKind::AddColumn && other.table == change.table)
        .filter_map(|other| other.column.clone())
        .collect::<Vec<_>>();

    let mut rebuilt = table.clone();
    rebuilt
        .columns
        .retain(|column| !added_columns.contains(&column.name));

    let copy_list = rebuilt
        .columns
        .iter()
        .map(|column| quote(&column.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut statements = vec![
        SqlStatement::new(render_create_table(&rebuilt, &rebuild_name)),
        SqlStatement::new(format!(
            "INSERT INTO {} ({copy_list}) SELECT {copy_list} FROM {}",
            quote(&rebuild_name),
            quote(&table.name)
        )),
        SqlStatement::new(format!("DROP TABLE {}", quote(&table.name))),
        SqlStatement::new(format!(
            "ALTER TABLE {} RENAME TO {}",
            quote(&rebuild_name),
            quote(&table.name)
        )),
    ];

    // Indexes die with the dropped table; re-create the target's,
    // minus the ones this plan creates anyway.
    let separately_created = plan
        .changes
        .iter()
        .filter(|other| other.kind == ChangeKind::CreateIndex && other.table == change.table)
        .filter_map(|other| other.index.as_deref())
        .collect::<Vec<_>>();
    for index in table
        .indexes
        .iter()
        .filter(|index| !separately_created.contains(&index.name.as_str()))
    {
        statements.push(SqlStatement::new(render_create_index(&table.name, index)));
    }

    Ok(statements)
}

pub(crate) fn render_create_table(table: &Table, table_name: &str) -> String {
    let single_pk = table
        .primary_key_columns()
        .first()
        .filter(|_| table.primary_key_columns().len() == 1)
        .cloned();

    let mut elements = Vec::new();
    for column in &table.columns {
        let inline_pk = single_pk.as_deref() == Some(column.name.as_str());
        elements.push(render_column(column, inline_pk));
    }

    if single_pk.is_none()
        && let Some(primary_key) = &table.primary_key
    {
        elements.push(format!("PRIMARY KEY ({})", quote_list(&primary_key.columns)));
    }

    for foreign_key in &table.foreign_keys {
        elements.push(format!(
            "CONSTRAINT {} {}",
            quote(&foreign_key.name),
            render_foreign_key_clause(foreign_key)
        ));
    }

    format!("CREATE TABLE {} ({})", quote(table_name), elements.join(", "))
}

fn render_column(column: &Column, inline_pk: bool) -> String {
    let mut sql = format!("{} {}", quote(&column.name), column.tpe);

    if inline_pk {
        sql.push_str(" PRIMARY KEY");
        if column.auto_increment {
            sql.push_str(" AUTOINCREMENT");
        }
    } else if !column.nullable {
        sql.push_str(" NOT NULL");
    }

    if let Some(default) = &column.default {
        write!(sql, " DEFAULT {}", render_default(default)).expect("writing to String should not fail");
    }

    sql
}

pub(crate) fn render_default(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Literal(literal) => literal.clone(),
        DefaultValue::Function { name, args } => {
            if name.eq_ignore_ascii_case("now") || name.eq_ignore_ascii_case("current_timestamp") {
                "CURRENT_TIMESTAMP".to_string()
            } else {
                format!("{name}({})", args.join(", "))
            }
        }
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
    format!("\"{}\"", ident.replace('"', "\"\""))
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

pub(crate) fn change_index(change: &Change) -> Result<&str, SqlGenError> {
    change
        .index
        .as_deref()
        .ok_or_else(|| unsupported(change, "change names no index"))
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

pub(crate) fn unsupported(change: &Change, target: &str) -> SqlGenError {
    SqlGenError::UnsupportedChange {
        dialect: DIALECT_NAME.to_string(),
        change: change.kind.tag().to_string(),
        target: format!("{} ({target})", change.table),
    }
}
