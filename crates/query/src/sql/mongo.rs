use serde_json::{Map, Value as Json, json};

use modelql_core::SqlGenError;

use crate::request::{CompareOp, Condition, ConditionValue, LogicalOp, QueryRequest, SortDir, WhereNode};

/// MongoDB requests render to command descriptors, never to SQL and
/// never to an executed operation; a driver layer outside this system
/// runs them.
#[derive(Debug, Clone, PartialEq)]
pub enum MongoCommand {
    Find {
        collection: String,
        filter: Json,
        projection: Option<Json>,
        sort: Option<Json>,
        limit: Option<u64>,
        skip: Option<u64>,
    },
    InsertOne {
        collection: String,
        document: Json,
    },
    UpdateOne {
        collection: String,
        filter: Json,
        update: Json,
        upsert: bool,
    },
    DeleteMany {
        collection: String,
        filter: Json,
    },
}

pub fn mongo_find(request: &QueryRequest) -> Result<MongoCommand, SqlGenError> {
    let filter = match &request.filter {
        Some(node) => filter_document(node)?,
        None => json!({}),
    };

    let projection = request.select.as_ref().map(|columns| {
        let mut doc = Map::new();
        for column in columns {
            doc.insert(column.clone(), json!(1));
        }
        Json::Object(doc)
    });

    let sort = request.order_by.as_ref().map(|order| {
        let mut doc = Map::new();
        for entry in order {
            doc.insert(
                entry.field.clone(),
                json!(match entry.dir {
                    SortDir::Asc => 1,
                    SortDir::Desc => -1,
                }),
            );
        }
        Json::Object(doc)
    });

    Ok(MongoCommand::Find {
        collection: request.table.clone(),
        filter,
        projection,
        sort,
        limit: request.limit,
        skip: request.offset,
    })
}

pub fn mongo_insert(collection: &str, document: Json) -> MongoCommand {
    MongoCommand::InsertOne {
        collection: collection.to_string(),
        document,
    }
}

pub fn mongo_upsert(collection: &str, filter_node: &WhereNode, set: Json) -> Result<MongoCommand, SqlGenError> {
    Ok(MongoCommand::UpdateOne {
        collection: collection.to_string(),
        filter: filter_document(filter_node)?,
        update: json!({ "$set": set }),
        upsert: true,
    })
}

pub fn mongo_delete(collection: &str, filter_node: &WhereNode) -> Result<MongoCommand, SqlGenError> {
    Ok(MongoCommand::DeleteMany {
        collection: collection.to_string(),
        filter: filter_document(filter_node)?,
    })
}

fn filter_document(node: &WhereNode) -> Result<Json, SqlGenError> {
    let mut clauses = Vec::new();

    for condition in &node.conditions {
        clauses.push(condition_document(condition)?);
    }
    for group in &node.groups {
        if !group.is_empty() {
            clauses.push(filter_document(group)?);
        }
    }

    let combined = match clauses.len() {
        0 => json!({}),
        1 => clauses.into_iter().next().expect("one clause"),
        _ => match node.op {
            LogicalOp::And => json!({ "$and": clauses }),
            LogicalOp::Or => json!({ "$or": clauses }),
        },
    };

    Ok(if node.is_not {
        json!({ "$nor": [combined] })
    } else {
        combined
    })
}

fn condition_document(condition: &Condition) -> Result<Json, SqlGenError> {
    let field = condition.field.clone();

    let doc = match condition.op {
        CompareOp::Eq => json!({ field: literal(condition)? }),
        CompareOp::NotEq => json!({ field: { "$ne": literal(condition)? } }),
        CompareOp::Gt => json!({ field: { "$gt": literal(condition)? } }),
        CompareOp::Lt => json!({ field: { "$lt": literal(condition)? } }),
        CompareOp::Gte => json!({ field: { "$gte": literal(condition)? } }),
        CompareOp::Lte => json!({ field: { "$lte": literal(condition)? } }),
        CompareOp::In => json!({ field: { "$in": list(condition)? } }),
        CompareOp::NotIn => json!({ field: { "$nin": list(condition)? } }),
        CompareOp::Like => {
            let Some(pattern) = literal(condition)?.as_str().map(like_to_regex) else {
                return Err(unsupported(condition));
            };
            json!({ field: { "$regex": pattern } })
        }
        CompareOp::IsNull => json!({ field: Json::Null }),
        CompareOp::IsNotNull => json!({ field: { "$ne": Json::Null } }),
        CompareOp::Exists => json!({ field: { "$exists": true } }),
        CompareOp::NotExists => json!({ field: { "$exists": false } }),
    };

    Ok(doc)
}

fn literal(condition: &Condition) -> Result<Json, SqlGenError> {
    match &condition.value {
        ConditionValue::Literal(value) => Ok(value.clone()),
        _ => Err(unsupported(condition)),
    }
}

fn list(condition: &Condition) -> Result<Json, SqlGenError> {
    match &condition.value {
        ConditionValue::IntList(values) => Ok(json!(values)),
        ConditionValue::FloatList(values) => Ok(json!(values)),
        ConditionValue::StringList(values) => Ok(json!(values)),
        ConditionValue::Literal(Json::Array(values)) => Ok(json!(values)),
        _ => Err(unsupported(condition)),
    }
}

/// SQL `%`/`_` wildcards to an anchored regex.
fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            ch if ".^$*+?()[]{}|\\".contains(ch) => {
                regex.push('\\');
                regex.push(ch);
            }
            ch => regex.push(ch),
        }
    }
    regex.push('$');
    regex
}

fn unsupported(condition: &Condition) -> SqlGenError {
    SqlGenError::UnsupportedFeature {
        dialect: "mongodb".to_string(),
        feature: format!(
            "operator {:?} with value {:?} on `{}`",
            condition.op, condition.value, condition.field
        ),
    }
}
