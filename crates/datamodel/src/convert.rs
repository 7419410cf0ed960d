use std::collections::BTreeSet;

use modelql_core::{
    Column, DatabaseSchema, DefaultValue, ForeignKey, ForeignKeyAction, Index, PrimaryKey,
    SqlDialect, Table, ValidationError,
};
use tracing::debug;

use crate::ast::{Ast, Expression, Field, FieldArity, Model};

/// Maps the parsed data model onto the canonical schema for one
/// provider: scalar fields become columns, `@id`/`@@id` the primary
/// key, `@unique`/`@@unique`/`@@index` indexes, `@relation` foreign
/// keys, and list-on-both-sides relations an implicit junction table.
pub fn convert(ast: &Ast, dialect: SqlDialect) -> Result<DatabaseSchema, ValidationError> {
    let enum_names = ast.enums().map(|e| e.name.clone()).collect::<BTreeSet<_>>();
    let model_names = ast.models().map(|m| m.name.clone()).collect::<BTreeSet<_>>();

    let mut schema = DatabaseSchema::default();

    for model in ast.models() {
        schema
            .tables
            .push(convert_model(ast, model, dialect, &enum_names, &model_names)?);
    }

    let junctions = implicit_junction_tables(ast, dialect, &model_names)?;
    schema.tables.extend(junctions);

    debug!(tables = schema.tables.len(), dialect = %dialect, "converted data model");
    Ok(schema)
}

fn convert_model(
    ast: &Ast,
    model: &Model,
    dialect: SqlDialect,
    enum_names: &BTreeSet<String>,
    model_names: &BTreeSet<String>,
) -> Result<Table, ValidationError> {
    let mut table = Table::named(table_name(model));

    for field in &model.fields {
        if model_names.contains(&field.tpe) {
            if let Some(foreign_key) = relation_foreign_key(ast, model, field)? {
                // The FK columns themselves are declared as scalar
                // fields and converted in their own pass.
                table.foreign_keys.push(foreign_key);
            }
            continue;
        }

        let column = scalar_column(model, field, dialect, enum_names)?;

        if field.has_attribute("id") {
            table.primary_key = Some(PrimaryKey {
                columns: vec![column.name.clone()],
            });
        }
        if field.has_attribute("unique") {
            table.indexes.push(Index {
                name: format!("{}_{}_key", table.name, column.name),
                columns: vec![column.name.clone()],
                unique: true,
            });
        }

        table.columns.push(column);
    }

    for attribute in &model.block_attributes {
        match attribute.name.as_str() {
            "id" => {
                let columns = name_list_argument(model, attribute.default_argument(), "@@id")?;
                table.primary_key = Some(PrimaryKey { columns });
            }
            "unique" => {
                let columns = name_list_argument(model, attribute.default_argument(), "@@unique")?;
                table.indexes.push(Index {
                    name: format!("{}_{}_key", table.name, columns.join("_")),
                    columns,
                    unique: true,
                });
            }
            "index" => {
                let columns = name_list_argument(model, attribute.default_argument(), "@@index")?;
                table.indexes.push(Index {
                    name: format!("{}_{}_idx", table.name, columns.join("_")),
                    columns,
                    unique: false,
                });
            }
            _ => {}
        }
    }

    Ok(table)
}

fn table_name(model: &Model) -> String {
    model
        .block_attributes
        .iter()
        .find(|attribute| attribute.name == "map")
        .and_then(|attribute| attribute.default_argument())
        .and_then(|value| value.as_string())
        .map(str::to_string)
        .unwrap_or_else(|| model.name.clone())
}

fn scalar_column(
    model: &Model,
    field: &Field,
    dialect: SqlDialect,
    enum_names: &BTreeSet<String>,
) -> Result<Column, ValidationError> {
    if field.arity == FieldArity::List {
        return Err(ValidationError::InvalidAttribute {
            model: model.name.clone(),
            field: field.name.clone(),
            attribute: "type".to_string(),
            reason: "scalar lists are not supported on relational connectors".to_string(),
        });
    }

    let is_enum = enum_names.contains(&field.tpe);
    let tpe = if is_enum {
        "TEXT".to_string()
    } else {
        scalar_type(model, field, dialect)?
    };

    let mut column = Column::new(&field.name, tpe).nullable(field.arity == FieldArity::Optional);

    if let Some(attribute) = field.attribute("default") {
        let Some(argument) = attribute.default_argument() else {
            return Err(ValidationError::InvalidAttribute {
                model: model.name.clone(),
                field: field.name.clone(),
                attribute: "default".to_string(),
                reason: "missing argument".to_string(),
            });
        };
        match default_value(argument) {
            ConvertedDefault::Value(default) => column.default = Some(default),
            ConvertedDefault::AutoIncrement => column.auto_increment = true,
            ConvertedDefault::ClientSide => {}
            ConvertedDefault::Unsupported => {
                return Err(ValidationError::InvalidAttribute {
                    model: model.name.clone(),
                    field: field.name.clone(),
                    attribute: "default".to_string(),
                    reason: "unsupported default expression".to_string(),
                });
            }
        }
    }

    Ok(column)
}

enum ConvertedDefault {
    Value(DefaultValue),
    AutoIncrement,
    /// Generated by the client at write time, never a database default.
    ClientSide,
    Unsupported,
}

fn default_value(expression: &Expression) -> ConvertedDefault {
    match expression {
        Expression::StringLiteral(value) => {
            ConvertedDefault::Value(DefaultValue::literal(format!("'{value}'")))
        }
        Expression::NumericLiteral(value) => {
            ConvertedDefault::Value(DefaultValue::literal(value.clone()))
        }
        Expression::Constant(value) => ConvertedDefault::Value(DefaultValue::literal(value.clone())),
        Expression::Function { name, arguments } => match name.as_str() {
            "autoincrement" => ConvertedDefault::AutoIncrement,
            "cuid" | "nanoid" | "ulid" => ConvertedDefault::ClientSide,
            "dbgenerated" => match arguments.first().and_then(Expression::as_string) {
                Some(raw) => ConvertedDefault::Value(DefaultValue::literal(raw)),
                None => ConvertedDefault::Unsupported,
            },
            other => ConvertedDefault::Value(DefaultValue::function(other)),
        },
        Expression::Array(_) | Expression::Path(_) => ConvertedDefault::Unsupported,
    }
}

fn scalar_type(model: &Model, field: &Field, dialect: SqlDialect) -> Result<String, ValidationError> {
    let tpe = match field.tpe.as_str() {
        "Int" => match dialect {
            SqlDialect::Mysql => "INT",
            _ => "INTEGER",
        },
        "BigInt" => "BIGINT",
        "Float" => match dialect {
            SqlDialect::Mysql => "DOUBLE",
            SqlDialect::Sqlite => "REAL",
            _ => "DOUBLE PRECISION",
        },
        "Decimal" => "DECIMAL(65,30)",
        "String" => match dialect {
            SqlDialect::Mysql => "VARCHAR(191)",
            _ => "TEXT",
        },
        "Boolean" => "BOOLEAN",
        "DateTime" => match dialect {
            SqlDialect::Postgres => "TIMESTAMP(3)",
            SqlDialect::Mysql => "DATETIME(3)",
            _ => "DATETIME",
        },
        "Json" => match dialect {
            SqlDialect::Postgres => "JSONB",
            _ => "JSON",
        },
        "Bytes" => match dialect {
            SqlDialect::Postgres => "BYTEA",
            SqlDialect::Mysql => "LONGBLOB",
            _ => "BLOB",
        },
        other => {
            return Err(ValidationError::InvalidAttribute {
                model: model.name.clone(),
                field: field.name.clone(),
                attribute: "type".to_string(),
                reason: format!("unknown type `{other}`"),
            });
        }
    };

    Ok(tpe.to_string())
}

/// Builds the owning-side foreign key of a relation field, when this is
/// the owning side (`fields`/`references` present). Inverse sides and
/// implicit many-to-many list sides contribute no constraint here.
fn relation_foreign_key(
    ast: &Ast,
    model: &Model,
    field: &Field,
) -> Result<Option<ForeignKey>, ValidationError> {
    let Some(attribute) = field.attribute("relation") else {
        return Ok(None);
    };
    let Some(fields) = attribute.argument("fields").and_then(Expression::as_name_list) else {
        return Ok(None);
    };
    let Some(references) = attribute
        .argument("references")
        .and_then(Expression::as_name_list)
    else {
        return Err(ValidationError::IncompleteRelation {
            model: model.name.clone(),
            relation: field.name.clone(),
            field: "references".to_string(),
        });
    };

    let Some(target) = ast.model(&field.tpe) else {
        return Err(ValidationError::UnknownRelationTarget {
            model: model.name.clone(),
            relation: field.name.clone(),
            target: field.tpe.clone(),
        });
    };

    let on_delete = referential_action(attribute.argument("onDelete")).unwrap_or(
        if field.arity == FieldArity::Optional {
            ForeignKeyAction::SetNull
        } else {
            ForeignKeyAction::Restrict
        },
    );
    let on_update =
        referential_action(attribute.argument("onUpdate")).unwrap_or(ForeignKeyAction::Cascade);

    Ok(Some(ForeignKey {
        name: format!("{}_{}_fkey", table_name(model), fields.join("_")),
        columns: fields,
        referenced_table: table_name(target),
        referenced_columns: references,
        on_delete,
        on_update,
    }))
}

fn referential_action(expression: Option<&Expression>) -> Option<ForeignKeyAction> {
    match expression?.as_constant()? {
        "Cascade" => Some(ForeignKeyAction::Cascade),
        "Restrict" => Some(ForeignKeyAction::Restrict),
        "NoAction" => Some(ForeignKeyAction::NoAction),
        "SetNull" => Some(ForeignKeyAction::SetNull),
        "SetDefault" => Some(ForeignKeyAction::SetDefault),
        _ => None,
    }
}

/// A relation that is a list on both sides has no owning column; it
/// materializes as a `_AToB` junction table with two cascading foreign
/// keys, a unique pair index, and an index on the far side.
fn implicit_junction_tables(
    ast: &Ast,
    dialect: SqlDialect,
    model_names: &BTreeSet<String>,
) -> Result<Vec<Table>, ValidationError> {
    let mut seen = BTreeSet::new();
    let mut tables = Vec::new();

    for model in ast.models() {
        for field in &model.fields {
            if field.arity != FieldArity::List || !model_names.contains(&field.tpe) {
                continue;
            }
            let Some(target) = ast.model(&field.tpe) else {
                continue;
            };
            let back_is_list = target.fields.iter().any(|back| {
                back.tpe == model.name && back.arity == FieldArity::List
            });
            if !back_is_list {
                continue;
            }

            let (first, second) = if model.name <= target.name {
                (model, target)
            } else {
                (target, model)
            };
            let junction_name = format!("_{}To{}", first.name, second.name);
            if !seen.insert(junction_name.clone()) {
                continue;
            }

            let first_key_type = primary_key_type(ast, first, dialect)?;
            let second_key_type = primary_key_type(ast, second, dialect)?;

            tables.push(Table {
                name: junction_name.clone(),
                columns: vec![
                    Column::new("A", first_key_type),
                    Column::new("B", second_key_type),
                ],
                primary_key: None,
                indexes: vec![
                    Index {
                        name: format!("{junction_name}_AB_unique"),
                        columns: vec!["A".to_string(), "B".to_string()],
                        unique: true,
                    },
                    Index {
                        name: format!("{junction_name}_B_index"),
                        columns: vec!["B".to_string()],
                        unique: false,
                    },
                ],
                foreign_keys: vec![
                    ForeignKey {
                        name: format!("{junction_name}_A_fkey"),
                        columns: vec!["A".to_string()],
                        referenced_table: table_name(first),
                        referenced_columns: vec![primary_key_column(first, &first.name)?],
                        on_delete: ForeignKeyAction::Cascade,
                        on_update: ForeignKeyAction::Cascade,
                    },
                    ForeignKey {
                        name: format!("{junction_name}_B_fkey"),
                        columns: vec!["B".to_string()],
                        referenced_table: table_name(second),
                        referenced_columns: vec![primary_key_column(second, &second.name)?],
                        on_delete: ForeignKeyAction::Cascade,
                        on_update: ForeignKeyAction::Cascade,
                    },
                ],
            });
        }
    }

    Ok(tables)
}

fn primary_key_column(model: &Model, model_name: &str) -> Result<String, ValidationError> {
    model
        .fields
        .iter()
        .find(|field| field.has_attribute("id"))
        .map(|field| field.name.clone())
        .ok_or_else(|| ValidationError::IncompleteRelation {
            model: model_name.to_string(),
            relation: "implicit many-to-many".to_string(),
            field: "an @id field".to_string(),
        })
}

fn primary_key_type(
    ast: &Ast,
    model: &Model,
    dialect: SqlDialect,
) -> Result<String, ValidationError> {
    let enum_names = ast.enums().map(|e| e.name.clone()).collect::<BTreeSet<_>>();
    let id_field = model
        .fields
        .iter()
        .find(|field| field.has_attribute("id"))
        .ok_or_else(|| ValidationError::IncompleteRelation {
            model: model.name.clone(),
            relation: "implicit many-to-many".to_string(),
            field: "an @id field".to_string(),
        })?;

    if enum_names.contains(&id_field.tpe) {
        return Ok("TEXT".to_string());
    }
    scalar_type(model, id_field, dialect)
}

fn name_list_argument(
    model: &Model,
    expression: Option<&Expression>,
    attribute: &str,
) -> Result<Vec<String>, ValidationError> {
    expression
        .and_then(Expression::as_name_list)
        .filter(|names| !names.is_empty())
        .ok_or_else(|| ValidationError::InvalidAttribute {
            model: model.name.clone(),
            field: String::new(),
            attribute: attribute.to_string(),
            reason: "expected a non-empty field list".to_string(),
        })
}
