use std::collections::{BTreeMap, BTreeSet};

use crate::{Change, ChangeKind, DatabaseSchema};

/// Orders a change list so every statement's prerequisites precede it:
/// a created table exists before anything touches or references it,
/// index/foreign-key drops land before their table drop, and a dropped
/// unique index never lingers past an alteration that could collide
/// with it. Kahn's algorithm; the ready set is a `BTreeSet` keyed by
/// `(kind_rank, table, secondary)` so identical inputs produce
/// identical plans on every host.
#[must_use]
pub fn sort_changes(
    changes: Vec<Change>,
    previous: &DatabaseSchema,
    next: &DatabaseSchema,
) -> Vec<Change> {
    let dependencies = build_dependencies(&changes, previous, next);

    let mut reverse_edges = vec![BTreeSet::<usize>::new(); changes.len()];
    let mut remaining = vec![0usize; changes.len()];
    for (index, deps) in dependencies.iter().enumerate() {
        remaining[index] = deps.len();
        for dependency in deps {
            reverse_edges[*dependency].insert(index);
        }
    }

    let mut ready = BTreeSet::<(SortKey, usize)>::new();
    for (index, count) in remaining.iter().enumerate() {
        if *count == 0 {
            ready.insert((sort_key(&changes[index]), index));
        }
    }

    let mut ordered_indexes = Vec::with_capacity(changes.len());
    let mut visited = vec![false; changes.len()];
    while let Some((_, index)) = ready.pop_first() {
        if visited[index] {
            continue;
        }
        visited[index] = true;
        ordered_indexes.push(index);

        for dependent in &reverse_edges[index] {
            if remaining[*dependent] == 0 {
                continue;
            }
            remaining[*dependent] -= 1;
            if remaining[*dependent] == 0 {
                ready.insert((sort_key(&changes[*dependent]), *dependent));
            }
        }
    }

    // A dependency cycle cannot be executed in any order; append the
    // unresolved tail deterministically rather than dropping it.
    if ordered_indexes.len() != changes.len() {
        let mut unresolved = (0..changes.len())
            .filter(|index| !visited[*index])
            .collect::<Vec<_>>();
        unresolved.sort_by_key(|index| (sort_key(&changes[*index]), *index));
        ordered_indexes.extend(unresolved);
    }

    let mut by_index = changes.into_iter().map(Some).collect::<Vec<_>>();
    ordered_indexes
        .into_iter()
        .map(|index| by_index[index].take().expect("each index is emitted once"))
        .collect()
}

type SortKey = (u8, String, String);

fn sort_key(change: &Change) -> SortKey {
    (
        kind_rank(change.kind),
        change.table.clone(),
        secondary_name(change),
    )
}

fn kind_rank(kind: ChangeKind) -> u8 {
    match kind {
        ChangeKind::DropForeignKey => 1,
        ChangeKind::DropIndex => 2,
        ChangeKind::DropTable => 3,
        ChangeKind::CreateTable => 4,
        ChangeKind::RedefineTable => 5,
        ChangeKind::AlterColumn => 6,
        ChangeKind::DropColumn => 7,
        ChangeKind::AddColumn => 8,
        ChangeKind::CreateForeignKey => 9,
        ChangeKind::CreateIndex => 10,
        ChangeKind::RenameIndex => 11,
        ChangeKind::RenameForeignKey => 12,
    }
}

fn secondary_name(change: &Change) -> String {
    change
        .column
        .clone()
        .or_else(|| change.index.clone())
        .unwrap_or_else(|| change.description.clone())
}

fn build_dependencies(
    changes: &[Change],
    previous: &DatabaseSchema,
    next: &DatabaseSchema,
) -> Vec<BTreeSet<usize>> {
    let mut dependencies = vec![BTreeSet::<usize>::new(); changes.len()];

    let mut create_table_by_name = BTreeMap::new();
    let mut drop_table_by_name = BTreeMap::new();
    for (index, change) in changes.iter().enumerate() {
        match change.kind {
            ChangeKind::CreateTable => {
                create_table_by_name.insert(change.table.as_str(), index);
            }
            ChangeKind::DropTable => {
                drop_table_by_name.insert(change.table.as_str(), index);
            }
            _ => {}
        }
    }

    for (index, change) in changes.iter().enumerate() {
        match change.kind {
            ChangeKind::CreateTable => {
                // A created table waits for every created table it
                // references through a foreign key.
                for referenced in referenced_tables(next, &change.table) {
                    if referenced == change.table {
                        continue;
                    }
                    if let Some(dependency) = create_table_by_name.get(referenced.as_str()) {
                        dependencies[index].insert(*dependency);
                    }
                }
            }
            ChangeKind::CreateForeignKey => {
                if let Some(referenced) = foreign_key_referenced_table(next, change)
                    && let Some(dependency) = create_table_by_name.get(referenced.as_str())
                {
                    dependencies[index].insert(*dependency);
                }
            }
            ChangeKind::DropTable => {
                // Index and foreign key drops precede their table drop;
                // so does dropping any table that still references it.
                for (other_index, other) in changes.iter().enumerate() {
                    match other.kind {
                        ChangeKind::DropIndex | ChangeKind::DropForeignKey
                            if other.table == change.table =>
                        {
                            dependencies[index].insert(other_index);
                        }
                        ChangeKind::DropForeignKey => {
                            if let Some(referenced) = foreign_key_referenced_table(previous, other)
                                && referenced == change.table
                            {
                                dependencies[index].insert(other_index);
                            }
                        }
                        _ => {}
                    }
                }

                for referencing in referencing_tables(previous, &change.table) {
                    if referencing == change.table {
                        continue;
                    }
                    if let Some(dependency) = drop_table_by_name.get(referencing.as_str()) {
                        dependencies[index].insert(*dependency);
                    }
                }
            }
            ChangeKind::AlterColumn | ChangeKind::RedefineTable => {
                // A dropped unique index must be gone before the table
                // is altered into a shape that could conflict with it.
                for (other_index, other) in changes.iter().enumerate() {
                    if other.kind == ChangeKind::DropIndex
                        && other.table == change.table
                        && dropped_index_was_unique(previous, other)
                    {
                        dependencies[index].insert(other_index);
                    }
                }
            }
            _ => {}
        }

        // Everything on a created table comes after the creation.
        if change.kind != ChangeKind::CreateTable
            && let Some(dependency) = create_table_by_name.get(change.table.as_str())
        {
            dependencies[index].insert(*dependency);
        }
    }

    dependencies
}

fn referenced_tables(schema: &DatabaseSchema, table: &str) -> Vec<String> {
    schema
        .table(table)
        .map(|table| {
            table
                .foreign_keys
                .iter()
                .map(|foreign_key| foreign_key.referenced_table.clone())
                .collect()
        })
        .unwrap_or_default()
}

fn referencing_tables(schema: &DatabaseSchema, referenced: &str) -> Vec<String> {
    schema
        .tables
        .iter()
        .filter(|table| {
            table
                .foreign_keys
                .iter()
                .any(|foreign_key| foreign_key.referenced_table == referenced)
        })
        .map(|table| table.name.clone())
        .collect()
}

/// Foreign-key changes record the constraint name in `index`; resolve
/// the referenced table from the schema the constraint lives in.
fn foreign_key_referenced_table(schema: &DatabaseSchema, change: &Change) -> Option<String> {
    let name = change.index.as_deref()?;
    let table = schema.table(&change.table)?;
    table
        .foreign_keys
        .iter()
        .find(|foreign_key| foreign_key.name == name)
        .map(|foreign_key| foreign_key.referenced_table.clone())
}

fn dropped_index_was_unique(previous: &DatabaseSchema, change: &Change) -> bool {
    let Some(name) = change.index.as_deref() else {
        return false;
    };
    previous
        .table(&change.table)
        .and_then(|table| table.index(name))
        .is_some_and(|index| index.unique)
}
