mod columns;
mod flavour;

pub use columns::{ColumnChanges, all_changes};
pub use flavour::{
    ColumnTypeChange, Flavour, MYSQL_FLAVOUR, MysqlFlavour, POSTGRES_FLAVOUR, PostgresFlavour,
    SQLITE_FLAVOUR, SqliteFlavour, TableDiffSummary, flavour_for_provider,
};

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    Change, ChangeKind, Column, ColumnMetadata, DatabaseSchema, DiffPlan, ForeignKey, Index,
    MIGRATIONS_TABLE, Table, TableChange, ordering::sort_changes,
};

/// A previous/next pairing of one named entity. Either side may be
/// absent; both present means the entity survived and gets diffed
/// recursively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationPair<T> {
    pub previous: Option<T>,
    pub next: Option<T>,
}

impl<T> MigrationPair<T> {
    #[must_use]
    pub fn created(next: T) -> Self {
        Self {
            previous: None,
            next: Some(next),
        }
    }

    #[must_use]
    pub fn dropped(previous: T) -> Self {
        Self {
            previous: Some(previous),
            next: None,
        }
    }
}

/// Per-call pairing structure: every table of both schemas keyed by its
/// (flavour-normalized) name, with indices into the schemas as IDs.
struct DifferDatabase<'a> {
    previous: &'a DatabaseSchema,
    next: &'a DatabaseSchema,
    tables: BTreeMap<String, MigrationPair<usize>>,
}

impl<'a> DifferDatabase<'a> {
    fn new(previous: &'a DatabaseSchema, next: &'a DatabaseSchema, flavour: &dyn Flavour) -> Self {
        let mut tables = BTreeMap::<String, MigrationPair<usize>>::new();

        for (index, table) in previous.tables.iter().enumerate() {
            if table_is_ignored(&table.name, flavour) {
                continue;
            }
            tables.insert(table_key(&table.name, flavour), MigrationPair::dropped(index));
        }

        for (index, table) in next.tables.iter().enumerate() {
            if table_is_ignored(&table.name, flavour) {
                continue;
            }
            tables
                .entry(table_key(&table.name, flavour))
                .and_modify(|pair| pair.next = Some(index))
                .or_insert_with(|| MigrationPair::created(index));
        }

        Self {
            previous,
            next,
            tables,
        }
    }

    fn table_pairs(&self) -> impl Iterator<Item = MigrationPair<&'a Table>> + '_ {
        self.tables.values().map(|pair| MigrationPair {
            previous: pair.previous.map(|index| &self.previous.tables[index]),
            next: pair.next.map(|index| &self.next.tables[index]),
        })
    }
}

fn table_key(name: &str, flavour: &dyn Flavour) -> String {
    if flavour.lower_cases_table_names() {
        name.to_ascii_lowercase()
    } else {
        name.to_string()
    }
}

fn table_is_ignored(name: &str, flavour: &dyn Flavour) -> bool {
    name == MIGRATIONS_TABLE || flavour.table_should_be_ignored(name)
}

/// Computes the ordered, safety-classified plan turning `previous` into
/// `next`. Pure and deterministic; it never fails, since unsupported providers
/// are rejected when the flavour is constructed.
pub fn compare(previous: &DatabaseSchema, next: &DatabaseSchema, flavour: &dyn Flavour) -> DiffPlan {
    let database = DifferDatabase::new(previous, next, flavour);
    let mut plan = DiffPlan::default();
    let mut changes = Vec::new();

    for pair in database.table_pairs() {
        match (pair.previous, pair.next) {
            (None, Some(created)) => {
                plan.tables_to_create.push(TableChange {
                    table: created.name.clone(),
                    description: format!("create table `{}`", created.name),
                });
                push_create_table_changes(created, &mut changes);
            }
            (Some(dropped), None) => {
                plan.tables_to_drop.push(TableChange {
                    table: dropped.name.clone(),
                    description: format!("drop table `{}`", dropped.name),
                });
                push_drop_table_changes(dropped, &mut changes);
            }
            (Some(previous_table), Some(next_table)) => {
                let table_changes = diff_table_pair(previous_table, next_table, flavour);
                if !table_changes.is_empty() {
                    plan.tables_to_alter.push(TableChange {
                        table: next_table.name.clone(),
                        description: format!(
                            "{} change(s) on table `{}`",
                            table_changes.len(),
                            next_table.name
                        ),
                    });
                }
                changes.extend(table_changes);
            }
            (None, None) => {}
        }
    }

    plan.changes = sort_changes(changes, previous, next);
    debug!(
        changes = plan.changes.len(),
        creates = plan.tables_to_create.len(),
        drops = plan.tables_to_drop.len(),
        alters = plan.tables_to_alter.len(),
        provider = flavour.provider(),
        "computed diff plan"
    );
    plan
}

fn push_create_table_changes(table: &Table, changes: &mut Vec<Change>) {
    changes.push(
        Change::new(ChangeKind::CreateTable, &table.name)
            .describe(format!("Create table `{}`", table.name)),
    );

    // Unique indexes are rendered inline as table constraints; the
    // non-unique ones need their own statements.
    for index in table.indexes.iter().filter(|index| !index.unique) {
        changes.push(
            Change::new(ChangeKind::CreateIndex, &table.name)
                .index(&index.name)
                .describe(format!(
                    "Create index `{}` on `{}`",
                    index.name, table.name
                )),
        );
    }
}

fn push_drop_table_changes(table: &Table, changes: &mut Vec<Change>) {
    // Foreign keys pointing here from surviving tables surface as
    // DropForeignKey out of those tables' own pair diffs; the ordering
    // pass places them ahead of this drop. The dropped table's own
    // constraints die with it.
    changes.push(
        Change::new(ChangeKind::DropTable, &table.name)
            .describe(format!("Drop table `{}`", table.name))
            .unsafe_with(format!(
                "dropping table `{}` deletes all of its rows",
                table.name
            )),
    );
}

fn diff_table_pair(previous: &Table, next: &Table, flavour: &dyn Flavour) -> Vec<Change> {
    let mut changes = Vec::new();
    let mut summary = TableDiffSummary::default();

    diff_columns(previous, next, flavour, &mut summary, &mut changes);
    diff_primary_key(previous, next, &mut summary, &mut changes);
    diff_indexes(previous, next, flavour, &mut changes);
    diff_foreign_keys(previous, next, flavour, &mut summary, &mut changes);

    if flavour.should_redefine_table(&summary) {
        changes = collapse_into_redefine(next, changes);
    }

    changes
}

fn diff_columns(
    previous: &Table,
    next: &Table,
    flavour: &dyn Flavour,
    summary: &mut TableDiffSummary,
    changes: &mut Vec<Change>,
) {
    let previous_by_name = map_columns(previous);
    let next_by_name = map_columns(next);

    for (name, next_column) in &next_by_name {
        match previous_by_name.get(name) {
            None => changes.push(add_column_change(next, next_column)),
            Some(previous_column) => {
                let column_changes = all_changes(previous_column, next_column, flavour);
                if !column_changes.differs_in_something() {
                    continue;
                }

                if column_changes.type_changed() {
                    summary.type_changed_columns += 1;
                }
                if column_changes.nullable_changed && !next_column.nullable {
                    summary.tightened_columns += 1;
                }
                if column_changes.auto_increment_changed {
                    summary.autoincrement_changed_columns += 1;
                }

                changes.push(alter_column_change(
                    next,
                    previous_column,
                    next_column,
                    column_changes,
                ));
            }
        }
    }

    for (name, previous_column) in &previous_by_name {
        if next_by_name.contains_key(name) {
            continue;
        }
        summary.dropped_columns += 1;
        changes.push(
            Change::new(ChangeKind::DropColumn, &next.name)
                .column(&previous_column.name)
                .describe(format!(
                    "Drop column `{}` on `{}`",
                    previous_column.name, next.name
                ))
                .unsafe_with(format!(
                    "dropping column `{}` on `{}` loses its data",
                    previous_column.name, next.name
                ))
                .metadata(column_metadata(previous_column, None)),
        );
    }
}

fn add_column_change(table: &Table, column: &Column) -> Change {
    let change = Change::new(ChangeKind::AddColumn, &table.name)
        .column(&column.name)
        .describe(format!("Add column `{}` to `{}`", column.name, table.name))
        .metadata(column_metadata(column, None));

    if column.nullable || column.default.is_some() {
        change
    } else {
        change.unsafe_with(format!(
            "adding required column `{}` without a default fails if `{}` has rows",
            column.name, table.name
        ))
    }
}

fn alter_column_change(
    table: &Table,
    previous: &Column,
    next: &Column,
    column_changes: ColumnChanges,
) -> Change {
    let mut change = Change::new(ChangeKind::AlterColumn, &table.name)
        .column(&next.name)
        .describe(format!("Alter column `{}` on `{}`", next.name, table.name))
        .metadata(column_metadata(next, Some(previous)));

    change.is_safe = !column_changes.type_changed() && next.nullable;

    if column_changes.type_changed() {
        change.warnings.push(format!(
            "changing the type of `{}` from `{}` to `{}` may fail or lose data",
            next.name, previous.tpe, next.tpe
        ));
    }
    if column_changes.nullable_changed && !next.nullable {
        change.warnings.push(format!(
            "making `{}` required fails if existing rows hold NULL",
            next.name
        ));
    }
    if !change.is_safe && change.warnings.is_empty() {
        change.warnings.push(format!(
            "`{}` is a required column; altering it may fail on existing rows",
            next.name
        ));
    }

    change
}

fn diff_primary_key(
    previous: &Table,
    next: &Table,
    summary: &mut TableDiffSummary,
    changes: &mut Vec<Change>,
) {
    if previous.primary_key_columns() == next.primary_key_columns() {
        return;
    }

    summary.primary_key_changed = true;
    changes.push(
        Change::new(ChangeKind::AlterColumn, &next.name)
            .describe(format!("Change the primary key of `{}`", next.name))
            .unsafe_with(format!(
                "changing the primary key of `{}` fails if existing rows violate the new key",
                next.name
            )),
    );
}

fn diff_indexes(previous: &Table, next: &Table, flavour: &dyn Flavour, changes: &mut Vec<Change>) {
    let (paired, dropped, created) =
        pair_by(&previous.indexes, &next.indexes, |a, b| flavour.indexes_match(a, b));

    for index in dropped {
        changes.push(
            Change::new(ChangeKind::DropIndex, &next.name)
                .index(&index.name)
                .describe(format!("Drop index `{}` on `{}`", index.name, next.name)),
        );
    }

    for index in created {
        let change = Change::new(ChangeKind::CreateIndex, &next.name)
            .index(&index.name)
            .describe(format!("Create index `{}` on `{}`", index.name, next.name));
        changes.push(if index.unique {
            change.unsafe_with(format!(
                "creating unique index `{}` fails if `{}` holds duplicate values",
                index.name, next.name
            ))
        } else {
            change
        });
    }

    // Structurally paired under differing names: a rename when the
    // dialect supports one, drop + create otherwise.
    for (previous_index, next_index) in paired {
        if previous_index.name == next_index.name {
            continue;
        }
        if flavour.can_rename_index() {
            changes.push(
                Change::new(ChangeKind::RenameIndex, &next.name)
                    .index(&next_index.name)
                    .describe(format!(
                        "Rename index `{}` to `{}` on `{}`",
                        previous_index.name, next_index.name, next.name
                    ))
                    .renamed(&previous_index.name, &next_index.name),
            );
        } else {
            changes.push(
                Change::new(ChangeKind::DropIndex, &next.name)
                    .index(&previous_index.name)
                    .describe(format!(
                        "Drop index `{}` on `{}`",
                        previous_index.name, next.name
                    )),
            );
            let create = Change::new(ChangeKind::CreateIndex, &next.name)
                .index(&next_index.name)
                .describe(format!(
                    "Create index `{}` on `{}`",
                    next_index.name, next.name
                ));
            changes.push(if next_index.unique {
                create.unsafe_with(format!(
                    "creating unique index `{}` fails if `{}` holds duplicate values",
                    next_index.name, next.name
                ))
            } else {
                create
            });
        }
    }
}

fn diff_foreign_keys(
    previous: &Table,
    next: &Table,
    flavour: &dyn Flavour,
    summary: &mut TableDiffSummary,
    changes: &mut Vec<Change>,
) {
    let (paired, dropped, created) = pair_by(&previous.foreign_keys, &next.foreign_keys, |a, b| {
        flavour.foreign_keys_match(a, b)
    });

    for (previous_fk, next_fk) in paired {
        if previous_fk.name == next_fk.name {
            continue;
        }
        if flavour.can_rename_foreign_key() {
            changes.push(
                Change::new(ChangeKind::RenameForeignKey, &next.name)
                    .index(&next_fk.name)
                    .describe(format!(
                        "Rename foreign key `{}` to `{}` on `{}`",
                        previous_fk.name, next_fk.name, next.name
                    ))
                    .renamed(&previous_fk.name, &next_fk.name),
            );
        } else {
            summary.dropped_foreign_keys += 1;
            summary.created_foreign_keys += 1;
            changes.push(drop_foreign_key_change(next, previous_fk));
            changes.push(create_foreign_key_change(next, next_fk));
        }
    }

    for foreign_key in dropped {
        summary.dropped_foreign_keys += 1;
        changes.push(drop_foreign_key_change(next, foreign_key));
    }

    for foreign_key in created {
        summary.created_foreign_keys += 1;
        changes.push(create_foreign_key_change(next, foreign_key));
    }
}

fn drop_foreign_key_change(table: &Table, foreign_key: &ForeignKey) -> Change {
    Change::new(ChangeKind::DropForeignKey, &table.name)
        .index(&foreign_key.name)
        .describe(format!(
            "Drop foreign key `{}` on `{}`",
            foreign_key.name, table.name
        ))
}

fn create_foreign_key_change(table: &Table, foreign_key: &ForeignKey) -> Change {
    Change::new(ChangeKind::CreateForeignKey, &table.name)
        .index(&foreign_key.name)
        .describe(format!(
            "Create foreign key `{}` on `{}` referencing `{}`",
            foreign_key.name, table.name, foreign_key.referenced_table
        ))
        .unsafe_with(format!(
            "adding foreign key `{}` fails if `{}` holds rows without a match in `{}`",
            foreign_key.name, table.name, foreign_key.referenced_table
        ))
}

/// Pairs entities of both sides with `matches`. Same-name pairs go
/// first so a rename never steals an exact match; the remainder is
/// paired only when the structural match is one-to-one unambiguous
/// (exactly one leftover candidate on each side). Ambiguous leftovers
/// stay unmatched and surface as drop + create. Returns
/// (paired, previous-only, next-only).
fn pair_by<'a, T, F>(
    previous: &'a [T],
    next: &'a [T],
    matches: F,
) -> (Vec<(&'a T, &'a T)>, Vec<&'a T>, Vec<&'a T>)
where
    F: Fn(&T, &T) -> bool,
    T: Named,
{
    let mut paired = Vec::new();
    let mut matched_previous = vec![false; previous.len()];
    let mut matched_next = vec![false; next.len()];

    for (previous_index, previous_entity) in previous.iter().enumerate() {
        let same_name = next.iter().position(|next_entity| {
            next_entity.entity_name() == previous_entity.entity_name()
                && matches(previous_entity, next_entity)
        });
        if let Some(next_index) = same_name
            && !matched_next[next_index]
        {
            matched_previous[previous_index] = true;
            matched_next[next_index] = true;
            paired.push((previous_entity, &next[next_index]));
        }
    }

    for (previous_index, previous_entity) in previous.iter().enumerate() {
        if matched_previous[previous_index] {
            continue;
        }

        let candidates = next
            .iter()
            .enumerate()
            .filter(|&(index, next_entity)| {
                !matched_next[index] && matches(previous_entity, next_entity)
            })
            .map(|(index, _)| index)
            .collect::<Vec<_>>();
        let &[next_index] = candidates.as_slice() else {
            continue;
        };

        let reverse_candidates = previous
            .iter()
            .enumerate()
            .filter(|&(index, other_previous)| {
                !matched_previous[index] && matches(other_previous, &next[next_index])
            })
            .count();
        if reverse_candidates != 1 {
            continue;
        }

        matched_previous[previous_index] = true;
        matched_next[next_index] = true;
        paired.push((previous_entity, &next[next_index]));
    }

    let dropped = previous
        .iter()
        .enumerate()
        .filter(|(index, _)| !matched_previous[*index])
        .map(|(_, entity)| entity)
        .collect();
    let created = next
        .iter()
        .enumerate()
        .filter(|(index, _)| !matched_next[*index])
        .map(|(_, entity)| entity)
        .collect();

    (paired, dropped, created)
}

trait Named {
    fn entity_name(&self) -> &str;
}

impl Named for Index {
    fn entity_name(&self) -> &str {
        &self.name
    }
}

impl Named for ForeignKey {
    fn entity_name(&self) -> &str {
        &self.name
    }
}

/// SQLite path: ALTER support is too narrow, so the table-scoped
/// alterations collapse into one create-copy-drop-rename redefinition.
/// Plain column additions and index changes stay standalone; SQLite
/// can express those directly.
fn collapse_into_redefine(table: &Table, changes: Vec<Change>) -> Vec<Change> {
    let (collapsed, mut kept): (Vec<_>, Vec<_>) = changes.into_iter().partition(|change| {
        matches!(
            change.kind,
            ChangeKind::DropColumn
                | ChangeKind::AlterColumn
                | ChangeKind::CreateForeignKey
                | ChangeKind::DropForeignKey
        )
    });

    if collapsed.is_empty() {
        return kept;
    }

    let mut redefine = Change::new(ChangeKind::RedefineTable, &table.name).describe(format!(
        "Redefine table `{}` (create new, copy rows, drop old, rename)",
        table.name
    ));
    redefine.is_safe = collapsed.iter().all(|change| change.is_safe);
    for change in &collapsed {
        redefine.warnings.extend(change.warnings.iter().cloned());
    }

    kept.insert(0, redefine);
    kept
}

fn map_columns(table: &Table) -> BTreeMap<&str, &Column> {
    table
        .columns
        .iter()
        .map(|column| (column.name.as_str(), column))
        .collect()
}

fn column_metadata(column: &Column, previous: Option<&Column>) -> ColumnMetadata {
    ColumnMetadata {
        tpe: column.tpe.clone(),
        nullable: column.nullable,
        default: column.default.clone(),
        auto_increment: column.auto_increment,
        old_tpe: previous.map(|previous| previous.tpe.clone()),
        old_nullable: previous.map(|previous| previous.nullable),
    }
}
