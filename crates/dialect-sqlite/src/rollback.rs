use modelql_core::{
    Change, ChangeKind, DatabaseSchema, DiffPlan, ROLLBACK_UNAVAILABLE, SqlGenError, SqlScript,
    SqlStatement,
};

use crate::generator::{
    change_column, change_index, quote, render_create_index, render_create_table,
};

/// The reversed inverse of each forward change. A rebuild inverts into
/// a rebuild back to the previous shape when the snapshot still holds
/// it; otherwise the sentinel marks the gap.
pub(crate) fn render_rollback(
    plan: &DiffPlan,
    previous: &DatabaseSchema,
) -> Result<SqlScript, SqlGenError> {
    let mut script = SqlScript::default();

    for change in plan.changes.iter().rev() {
        for statement in emit_inverse(change, previous)? {
            script.push(statement);
        }
    }

    Ok(script)
}

fn emit_inverse(
    change: &Change,
    previous: &DatabaseSchema,
) -> Result<Vec<SqlStatement>, SqlGenError> {
    let statements = match change.kind {
        ChangeKind::CreateTable => {
            vec![SqlStatement::new(format!("DROP TABLE {}", quote(&change.table)))]
        }
        ChangeKind::DropTable => match previous.table(&change.table) {
            Some(table) => {
                let mut statements =
                    vec![SqlStatement::new(render_create_table(table, &table.name))];
                for index in &table.indexes {
                    statements.push(SqlStatement::new(render_create_index(&table.name, index)));
                }
                statements
            }
            None => vec![SqlStatement::new(ROLLBACK_UNAVAILABLE)],
        },
        ChangeKind::AddColumn => vec![SqlStatement::new(format!(
            // Dropping a column needs a rebuild going forward, but the
            // rollback direction can rely on modern sqlite's
            // DROP COLUMN for columns added by this very migration.
            "ALTER TABLE {} DROP COLUMN {}",
            quote(&change.table),
            quote(change_column(change)?)
        ))],
        ChangeKind::RedefineTable => match previous.table(&change.table) {
            Some(table) => {
                let rebuild_name = format!("_modelql_new_{}", table.name);
                let copy_list = table
                    .columns
                    .iter()
                    .map(|column| quote(&column.name))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut statements = vec![
                    SqlStatement::new(render_create_table(table, &rebuild_name)),
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
                for index in &table.indexes {
                    statements.push(SqlStatement::new(render_create_index(&table.name, index)));
                }
                statements
            }
            None => vec![SqlStatement::new(ROLLBACK_UNAVAILABLE)],
        },
        ChangeKind::CreateIndex => vec![SqlStatement::new(format!(
            "DROP INDEX {}",
            quote(change_index(change)?)
        ))],
        ChangeKind::DropIndex => {
            let name = change_index(change)?;
            match previous
                .table(&change.table)
                .and_then(|table| table.index(name))
            {
                Some(index) => vec![SqlStatement::new(render_create_index(&change.table, index))],
                None => vec![SqlStatement::new(ROLLBACK_UNAVAILABLE)],
            }
        }
        ChangeKind::DropColumn
        | ChangeKind::AlterColumn
        | ChangeKind::CreateForeignKey
        | ChangeKind::DropForeignKey
        | ChangeKind::RenameIndex
        | ChangeKind::RenameForeignKey => vec![SqlStatement::new(ROLLBACK_UNAVAILABLE)],
    };

    Ok(statements)
}
