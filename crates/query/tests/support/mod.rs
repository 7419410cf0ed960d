#![allow(dead_code)]

mod fake_connection;

pub use fake_connection::FakeConnection;

use modelql_core::Value;
use modelql_query::{
    FieldDescriptor, FieldKind, ModelDescriptor, ModelRegistry,
};
use modelql_datamodel::{ModelRelations, RelationField};

pub fn field(name: &str, kind: FieldKind, nullable: bool) -> FieldDescriptor {
    FieldDescriptor {
        name: name.to_string(),
        column: name.to_string(),
        kind,
        nullable,
    }
}

fn to_many(name: &str, related: &str, foreign_key: &str) -> RelationField {
    RelationField {
        name: name.to_string(),
        related_table: related.to_string(),
        foreign_key: foreign_key.to_string(),
        local_key: "id".to_string(),
        is_list: true,
        is_many_to_many: false,
        junction_table: None,
        junction_fk_to_self: None,
        junction_fk_to_other: None,
    }
}

fn to_one(name: &str, related: &str, foreign_key: &str, local_key: &str) -> RelationField {
    RelationField {
        name: name.to_string(),
        related_table: related.to_string(),
        foreign_key: foreign_key.to_string(),
        local_key: local_key.to_string(),
        is_list: false,
        is_many_to_many: false,
        junction_table: None,
        junction_fk_to_self: None,
        junction_fk_to_other: None,
    }
}

fn many_to_many(name: &str, related: &str, junction: &str, to_self: &str, to_other: &str) -> RelationField {
    RelationField {
        name: name.to_string(),
        related_table: related.to_string(),
        foreign_key: String::new(),
        local_key: "id".to_string(),
        is_list: true,
        is_many_to_many: true,
        junction_table: Some(junction.to_string()),
        junction_fk_to_self: Some(to_self.to_string()),
        junction_fk_to_other: Some(to_other.to_string()),
    }
}

/// User / Post / Profile / Tag fixture: one-to-many posts, one-to-one
/// profile (key on Profile), many-to-many tags through `_TagToUser`.
pub fn blog_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();

    registry.register(
        ModelDescriptor {
            model: "User".to_string(),
            table: "User".to_string(),
            fields: vec![
                field("id", FieldKind::Int, false),
                field("email", FieldKind::String, false),
                field("active", FieldKind::Bool, false),
                field("createdAt", FieldKind::DateTime, true),
            ],
            primary_key: "id".to_string(),
        },
        ModelRelations {
            model: "User".to_string(),
            table: "User".to_string(),
            relations: vec![
                to_many("posts", "Post", "authorId"),
                to_one("profile", "Profile", "userId", "id"),
                many_to_many("tags", "Tag", "_TagToUser", "B", "A"),
            ],
        },
    );

    registry.register(
        ModelDescriptor {
            model: "Post".to_string(),
            table: "Post".to_string(),
            fields: vec![
                field("id", FieldKind::Int, false),
                field("title", FieldKind::String, false),
                field("authorId", FieldKind::Int, false),
            ],
            primary_key: "id".to_string(),
        },
        ModelRelations {
            model: "Post".to_string(),
            table: "Post".to_string(),
            relations: vec![to_one("author", "User", "authorId", "id")],
        },
    );

    registry.register(
        ModelDescriptor {
            model: "Profile".to_string(),
            table: "Profile".to_string(),
            fields: vec![
                field("id", FieldKind::Int, false),
                field("bio", FieldKind::String, true),
                field("userId", FieldKind::Int, false),
            ],
            primary_key: "id".to_string(),
        },
        ModelRelations {
            model: "Profile".to_string(),
            table: "Profile".to_string(),
            relations: vec![to_one("user", "User", "userId", "id")],
        },
    );

    registry.register(
        ModelDescriptor {
            model: "Tag".to_string(),
            table: "Tag".to_string(),
            fields: vec![
                field("id", FieldKind::Int, false),
                field("label", FieldKind::String, false),
            ],
            primary_key: "id".to_string(),
        },
        ModelRelations {
            model: "Tag".to_string(),
            table: "Tag".to_string(),
            relations: vec![many_to_many("users", "User", "_TagToUser", "A", "B")],
        },
    );

    registry
}

pub fn int(value: i64) -> Value {
    Value::Int(value)
}

pub fn text(value: &str) -> Value {
    Value::text(value)
}
