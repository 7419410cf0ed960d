use modelql_core::{
    Change, ChangeKind, DatabaseSchema, DiffPlan, ROLLBACK_UNAVAILABLE, SqlGenError, SqlScript,
    SqlStatement,
};

use crate::generator::{
    change_column, change_index, column_metadata, new_name, old_name, quote, render_column_from_metadata,
    render_create_index, render_create_table, render_foreign_key_clause,
};

/// Walks the plan backwards and emits each change's inverse. Inverses
/// that need a shape the snapshot no longer holds degrade to the
/// rollback-unavailable sentinel instead of failing the whole script.
pub(crate) fn render_rollback(
    plan: &DiffPlan,
    previous: &DatabaseSchema,
) -> Result<SqlScript, SqlGenError> {
    let mut script = SqlScript::default();

    for change in plan.changes.iter().rev() {
        script.push(emit_inverse(change, previous)?);
    }

    Ok(script)
}

fn emit_inverse(change: &Change, previous: &DatabaseSchema) -> Result<SqlStatement, SqlGenError> {
    let sql = match change.kind {
        ChangeKind::CreateTable => format!("DROP TABLE {}", quote(&change.table)),
        ChangeKind::DropTable => match previous.table(&change.table) {
            Some(table) => render_create_table(table),
            None => ROLLBACK_UNAVAILABLE.to_string(),
        },
        ChangeKind::AddColumn => format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote(&change.table),
            quote(change_column(change)?)
        ),
        ChangeKind::DropColumn => {
            // The forward change carries the dropped column's shape.
            match &change.column_metadata {
                Some(metadata) => format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    quote(&change.table),
                    render_column_from_metadata(change, metadata)
                ),
                None => ROLLBACK_UNAVAILABLE.to_string(),
            }
        }
        ChangeKind::AlterColumn => match (&change.column, &change.column_metadata) {
            (Some(_), Some(_)) => render_inverse_alter(change)?,
            _ => match previous.table(&change.table).and_then(|table| table.primary_key.as_ref()) {
                Some(primary_key) => {
                    let columns = primary_key
                        .columns
                        .iter()
                        .map(|column| quote(column))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!(
                        "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}, ADD PRIMARY KEY ({columns})",
                        quote(&change.table),
                        quote(&format!("{}_pkey", change.table)),
                    )
                }
                None => ROLLBACK_UNAVAILABLE.to_string(),
            },
        },
        ChangeKind::CreateIndex => format!("DROP INDEX {}", quote(change_index(change)?)),
        ChangeKind::DropIndex => {
            let name = change_index(change)?;
            match previous
                .table(&change.table)
                .and_then(|table| table.index(name))
            {
                Some(index) => render_create_index(&change.table, index),
                None => ROLLBACK_UNAVAILABLE.to_string(),
            }
        }
        ChangeKind::RenameIndex => format!(
            "ALTER INDEX {} RENAME TO {}",
            quote(new_name(change)?),
            quote(old_name(change)?)
        ),
        ChangeKind::CreateForeignKey => format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            quote(&change.table),
            quote(change_index(change)?)
        ),
        ChangeKind::DropForeignKey => {
            let name = change_index(change)?;
            match previous.table(&change.table).and_then(|table| {
                table
                    .foreign_keys
                    .iter()
                    .find(|foreign_key| foreign_key.name == name)
            }) {
                Some(foreign_key) => format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} {}",
                    quote(&change.table),
                    quote(&foreign_key.name),
                    render_foreign_key_clause(foreign_key)
                ),
                None => ROLLBACK_UNAVAILABLE.to_string(),
            }
        }
        ChangeKind::RenameForeignKey => format!(
            "ALTER TABLE {} RENAME CONSTRAINT {} TO {}",
            quote(&change.table),
            quote(new_name(change)?),
            quote(old_name(change)?)
        ),
        ChangeKind::RedefineTable => ROLLBACK_UNAVAILABLE.to_string(),
    };

    Ok(SqlStatement::new(sql))
}

/// The inverse alteration swaps the old and new column shapes carried
/// on the forward change.
fn render_inverse_alter(change: &Change) -> Result<String, SqlGenError> {
    let metadata = column_metadata(change)?;
    let column = quote(change_column(change)?);
    let mut actions = Vec::new();

    if let Some(old_tpe) = &metadata.old_tpe
        && old_tpe != &metadata.tpe
    {
        actions.push(format!("ALTER COLUMN {column} SET DATA TYPE {old_tpe}"));
    }
    if let Some(old_nullable) = metadata.old_nullable
        && old_nullable != metadata.nullable
    {
        if old_nullable {
            actions.push(format!("ALTER COLUMN {column} DROP NOT NULL"));
        } else {
            actions.push(format!("ALTER COLUMN {column} SET NOT NULL"));
        }
    }

    if actions.is_empty() {
        return Ok(ROLLBACK_UNAVAILABLE.to_string());
    }

    Ok(format!(
        "ALTER TABLE {} {}",
        quote(&change.table),
        actions.join(", ")
    ))
}
