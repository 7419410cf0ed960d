use std::collections::BTreeMap;
use std::collections::BTreeSet;

use modelql_core::{Error, ValidationError};
use modelql_datamodel::RelationField;

use crate::descriptor::ModelRegistry;
use crate::request::Include;
use crate::sql::{Join, JoinKind};

/// Include tree resolved against relation metadata: the joins to emit
/// plus the shape the scanner rebuilds.
#[derive(Debug, Clone, Default)]
pub struct JoinPlan {
    pub joins: Vec<Join>,
    pub includes: Vec<IncludeNode>,
}

impl JoinPlan {
    /// Any one-to-many (or many-to-many) include forces the grouped
    /// scan; flat rows no longer map 1:1 to results.
    #[must_use]
    pub fn has_to_many(&self) -> bool {
        fn any_list(nodes: &[IncludeNode]) -> bool {
            nodes
                .iter()
                .any(|node| node.relation.is_list || any_list(&node.children))
        }
        any_list(&self.includes)
    }
}

#[derive(Debug, Clone)]
pub struct IncludeNode {
    /// Relation field name on the parent model.
    pub name: String,
    /// Join alias; equals the include path joined with `_`.
    pub alias: String,
    pub relation: RelationField,
    /// Primary key column of the related model, for child grouping.
    pub related_primary_key: String,
    pub children: Vec<IncludeNode>,
}

/// Plans LEFT JOINs for an include map. Aliases are deduplicated and
/// parents always precede their children, which is all the join order
/// the drivers care about.
pub fn plan_joins(
    registry: &ModelRegistry,
    root_table: &str,
    include: &BTreeMap<String, Include>,
) -> Result<JoinPlan, Error> {
    let mut plan = JoinPlan::default();
    let mut seen_aliases = BTreeSet::new();
    plan.includes = plan_level(
        registry,
        root_table,
        root_table,
        "",
        include,
        &mut plan.joins,
        &mut seen_aliases,
    )?;
    Ok(plan)
}

fn plan_level(
    registry: &ModelRegistry,
    parent_table: &str,
    parent_ref: &str,
    parent_path: &str,
    include: &BTreeMap<String, Include>,
    joins: &mut Vec<Join>,
    seen_aliases: &mut BTreeSet<String>,
) -> Result<Vec<IncludeNode>, Error> {
    let mut nodes = Vec::new();

    for (name, declaration) in include {
        if !declaration.is_enabled() {
            continue;
        }

        let relation = registry
            .relation(parent_table, name)
            .ok_or_else(|| ValidationError::UnknownRelation {
                model: parent_table.to_string(),
                relation: name.clone(),
            })?
            .clone();

        let alias = if parent_path.is_empty() {
            name.clone()
        } else {
            format!("{parent_path}_{name}")
        };
        if !seen_aliases.insert(alias.clone()) {
            continue;
        }

        let related = registry.descriptor(&relation.related_table)?;
        let related_columns = related
            .fields
            .iter()
            .map(|field| field.column.clone())
            .collect::<Vec<_>>();
        let related_primary_key = related.primary_key.clone();

        if relation.is_many_to_many {
            let junction_table = relation.junction_table.clone().ok_or_else(|| {
                ValidationError::IncompleteRelation {
                    model: parent_table.to_string(),
                    relation: name.clone(),
                    field: "junction_table".to_string(),
                }
            })?;
            let fk_to_self = relation.junction_fk_to_self.clone().ok_or_else(|| {
                ValidationError::IncompleteRelation {
                    model: parent_table.to_string(),
                    relation: name.clone(),
                    field: "junction_fk_to_self".to_string(),
                }
            })?;
            let fk_to_other = relation.junction_fk_to_other.clone().ok_or_else(|| {
                ValidationError::IncompleteRelation {
                    model: parent_table.to_string(),
                    relation: name.clone(),
                    field: "junction_fk_to_other".to_string(),
                }
            })?;

            let junction_alias = format!("{alias}_junction");
            joins.push(Join {
                kind: JoinKind::Left,
                table: junction_table,
                alias: junction_alias.clone(),
                on_left: format!("{junction_alias}.{fk_to_self}"),
                on_right: format!("{parent_ref}.{}", relation.local_key),
                columns: Vec::new(),
            });
            joins.push(Join {
                kind: JoinKind::Left,
                table: relation.related_table.clone(),
                alias: alias.clone(),
                on_left: format!("{alias}.{related_primary_key}"),
                on_right: format!("{junction_alias}.{fk_to_other}"),
                columns: related_columns,
            });
        } else {
            // The key column sits on the parent for an owning to-one
            // relation, on the related table for one-to-many and for
            // the inverse side of a one-to-one.
            let fk_on_parent = !relation.is_list
                && registry
                    .descriptor(parent_table)?
                    .field(&relation.foreign_key)
                    .is_some();
            let (on_left, on_right) = if fk_on_parent {
                (
                    format!("{parent_ref}.{}", relation.foreign_key),
                    format!("{alias}.{}", relation.local_key),
                )
            } else {
                (
                    format!("{alias}.{}", relation.foreign_key),
                    format!("{parent_ref}.{}", relation.local_key),
                )
            };
            joins.push(Join {
                kind: JoinKind::Left,
                table: relation.related_table.clone(),
                alias: alias.clone(),
                on_left,
                on_right,
                columns: related_columns,
            });
        }

        let children = match declaration.nested() {
            Some(nested) => plan_level(
                registry,
                &relation.related_table,
                &alias,
                &alias,
                nested,
                joins,
                seen_aliases,
            )?,
            None => Vec::new(),
        };

        nodes.push(IncludeNode {
            name: name.clone(),
            alias,
            relation,
            related_primary_key,
            children,
        });
    }

    Ok(nodes)
}
