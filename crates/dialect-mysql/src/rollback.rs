use std::fmt::Write as _;

use modelql_core::{
    Change, ChangeKind, DatabaseSchema, DiffPlan, ROLLBACK_UNAVAILABLE, SqlGenError, SqlScript,
    SqlStatement,
};

use crate::generator::{
    change_column, change_index, new_name, old_name, quote, quote_list, render_column_from_metadata,
    render_create_index, render_create_table, render_foreign_key_clause, unsupported,
};

/// The reversed inverse of each forward change. Shapes the snapshot no
/// longer holds degrade to the rollback-unavailable sentinel.
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
        ChangeKind::DropColumn => match &change.column_metadata {
            Some(metadata) => format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote(&change.table),
                render_column_from_metadata(change, metadata)
            ),
            None => ROLLBACK_UNAVAILABLE.to_string(),
        },
        ChangeKind::AlterColumn => match &change.column {
            Some(column) => {
                // MODIFY back to the previous shape, read from the
                // snapshot rather than from partial old-metadata.
                match previous
                    .table(&change.table)
                    .and_then(|table| table.column(column))
                {
                    Some(previous_column) => {
                        let mut restored = change.clone();
                        restored.column_metadata = Some(modelql_core::ColumnMetadata {
                            tpe: previous_column.tpe.clone(),
                            nullable: previous_column.nullable,
                            default: previous_column.default.clone(),
                            auto_increment: previous_column.auto_increment,
                            old_tpe: None,
                            old_nullable: None,
                        });
                        let metadata = restored
                            .column_metadata
                            .as_ref()
                            .expect("metadata was just attached");
                        format!(
                            "ALTER TABLE {} MODIFY {}",
                            quote(&change.table),
                            render_column_from_metadata(&restored, metadata)
                        )
                    }
                    None => ROLLBACK_UNAVAILABLE.to_string(),
                }
            }
            None => match previous
                .table(&change.table)
                .and_then(|table| table.primary_key.as_ref())
            {
                Some(primary_key) => {
                    let mut sql =
                        format!("ALTER TABLE {} DROP PRIMARY KEY", quote(&change.table));
                    write!(sql, ", ADD PRIMARY KEY ({})", quote_list(&primary_key.columns))
                        .expect("writing to String should not fail");
                    sql
                }
                None => ROLLBACK_UNAVAILABLE.to_string(),
            },
        },
        ChangeKind::CreateIndex => format!(
            "DROP INDEX {} ON {}",
            quote(change_index(change)?),
            quote(&change.table)
        ),
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
            "ALTER TABLE {} RENAME INDEX {} TO {}",
            quote(&change.table),
            quote(new_name(change)?),
            quote(old_name(change)?)
        ),
        ChangeKind::CreateForeignKey => format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
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
        ChangeKind::RenameForeignKey => {
            return Err(unsupported(change, "mysql cannot rename foreign keys"));
        }
        ChangeKind::RedefineTable => ROLLBACK_UNAVAILABLE.to_string(),
    };

    Ok(SqlStatement::new(sql))
}
