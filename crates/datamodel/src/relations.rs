use modelql_core::ValidationError;

use crate::ast::{Ast, Expression, Field, FieldArity, Model};

/// Relation graph of one model, the executor's map from include names
/// to join shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRelations {
    pub model: String,
    pub table: String,
    pub relations: Vec<RelationField>,
}

impl ModelRelations {
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationField> {
        self.relations.iter().find(|relation| relation.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationField {
    pub name: String,
    pub related_table: String,
    /// Column holding the key: on this table for many-to-one, on the
    /// related table for one-to-many. Empty only for many-to-many.
    pub foreign_key: String,
    /// Key column the foreign key points at.
    pub local_key: String,
    pub is_list: bool,
    pub is_many_to_many: bool,
    pub junction_table: Option<String>,
    pub junction_fk_to_self: Option<String>,
    pub junction_fk_to_other: Option<String>,
}

/// Derives the per-model relation metadata the query executor plans
/// joins from. Inconsistent declarations fail here rather than at
/// query time.
pub fn extract_relations(ast: &Ast) -> Result<Vec<ModelRelations>, ValidationError> {
    let mut all = Vec::new();

    for model in ast.models() {
        let mut relations = Vec::new();

        for field in &model.fields {
            let Some(target) = ast.model(&field.tpe) else {
                continue;
            };

            let relation = match field.arity {
                FieldArity::Required | FieldArity::Optional => {
                    many_to_one(model, field, target)?
                }
                FieldArity::List => {
                    let back_is_list = target
                        .fields
                        .iter()
                        .any(|back| back.tpe == model.name && back.arity == FieldArity::List);
                    if back_is_list {
                        many_to_many(model, field, target)?
                    } else {
                        one_to_many(model, field, target)?
                    }
                }
            };

            relations.push(relation);
        }

        all.push(ModelRelations {
            model: model.name.clone(),
            table: model.name.clone(),
            relations,
        });
    }

    Ok(all)
}

fn many_to_one(
    model: &Model,
    field: &Field,
    target: &Model,
) -> Result<RelationField, ValidationError> {
    // Owning side: the key column lives here. The inverse side of a
    // one-to-one borrows the key from the owning field on the target,
    // like a single-element one-to-many.
    let (foreign_key, local_key) = if field.attribute("relation").is_some_and(|attribute| {
        attribute.argument("fields").is_some()
    }) {
        owning_side_arguments(model, field)?
    } else {
        let back = target
            .fields
            .iter()
            .find(|back| back.tpe == model.name && back.arity != FieldArity::List)
            .ok_or_else(|| ValidationError::IncompleteRelation {
                model: model.name.clone(),
                relation: field.name.clone(),
                field: format!("a back-relation field on `{}`", target.name),
            })?;
        owning_side_arguments(target, back)?
    };

    Ok(RelationField {
        name: field.name.clone(),
        related_table: target.name.clone(),
        foreign_key,
        local_key,
        is_list: false,
        is_many_to_many: false,
        junction_table: None,
        junction_fk_to_self: None,
        junction_fk_to_other: None,
    })
}

fn one_to_many(
    model: &Model,
    field: &Field,
    target: &Model,
) -> Result<RelationField, ValidationError> {
    // The key lives on the other side; find the back-relation field
    // pointing at this model and read its fields/references.
    let back = target
        .fields
        .iter()
        .find(|back| back.tpe == model.name && back.arity != FieldArity::List)
        .ok_or_else(|| ValidationError::IncompleteRelation {
            model: model.name.clone(),
            relation: field.name.clone(),
            field: format!("a back-relation field on `{}`", target.name),
        })?;
    let (foreign_key, local_key) = owning_side_arguments(target, back)?;

    Ok(RelationField {
        name: field.name.clone(),
        related_table: target.name.clone(),
        foreign_key,
        local_key,
        is_list: true,
        is_many_to_many: false,
        junction_table: None,
        junction_fk_to_self: None,
        junction_fk_to_other: None,
    })
}

fn many_to_many(
    model: &Model,
    field: &Field,
    target: &Model,
) -> Result<RelationField, ValidationError> {
    let (first, second) = if model.name <= target.name {
        (&model.name, &target.name)
    } else {
        (&target.name, &model.name)
    };
    let self_is_first = &model.name == first;

    Ok(RelationField {
        name: field.name.clone(),
        related_table: target.name.clone(),
        foreign_key: String::new(),
        local_key: primary_key_column(model, field)?,
        is_list: true,
        is_many_to_many: true,
        junction_table: Some(format!("_{first}To{second}")),
        junction_fk_to_self: Some(if self_is_first { "A" } else { "B" }.to_string()),
        junction_fk_to_other: Some(if self_is_first { "B" } else { "A" }.to_string()),
    })
}

fn owning_side_arguments(
    model: &Model,
    field: &Field,
) -> Result<(String, String), ValidationError> {
    let attribute =
        field
            .attribute("relation")
            .ok_or_else(|| ValidationError::IncompleteRelation {
                model: model.name.clone(),
                relation: field.name.clone(),
                field: "@relation(fields:, references:)".to_string(),
            })?;

    let fields = attribute
        .argument("fields")
        .and_then(Expression::as_name_list)
        .and_then(|names| names.first().cloned())
        .ok_or_else(|| ValidationError::IncompleteRelation {
            model: model.name.clone(),
            relation: field.name.clone(),
            field: "fields".to_string(),
        })?;
    let references = attribute
        .argument("references")
        .and_then(Expression::as_name_list)
        .and_then(|names| names.first().cloned())
        .ok_or_else(|| ValidationError::IncompleteRelation {
            model: model.name.clone(),
            relation: field.name.clone(),
            field: "references".to_string(),
        })?;

    Ok((fields, references))
}

fn primary_key_column(model: &Model, field: &Field) -> Result<String, ValidationError> {
    model
        .fields
        .iter()
        .find(|candidate| candidate.has_attribute("id"))
        .map(|candidate| candidate.name.clone())
        .ok_or_else(|| ValidationError::IncompleteRelation {
            model: model.name.clone(),
            relation: field.name.clone(),
            field: "an @id field".to_string(),
        })
}

/// `user_profile` → `UserProfile`. Splits on underscores and
/// capitalizes each part; used wherever a model name is derived from a
/// snake_case table name.
#[must_use]
pub fn pascal_case(raw: &str) -> String {
    raw.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::pascal_case;

    #[test]
    fn pascal_case_splits_on_underscores() {
        assert_eq!(pascal_case("user_profile"), "UserProfile");
        assert_eq!(pascal_case("user"), "User");
        assert_eq!(pascal_case("user__note"), "UserNote");
        assert_eq!(pascal_case("_prisma_migrations"), "PrismaMigrations");
    }
}
