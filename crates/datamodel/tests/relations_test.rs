use modelql_datamodel::{
    Argument, Ast, Attribute, Expression, Field, FieldArity, Model, Top, extract_relations,
};

fn attribute(name: &str, arguments: Vec<Argument>) -> Attribute {
    Attribute {
        name: name.to_string(),
        arguments,
    }
}

fn field(name: &str, tpe: &str, arity: FieldArity, attributes: Vec<Attribute>) -> Field {
    Field {
        name: name.to_string(),
        tpe: tpe.to_string(),
        arity,
        attributes,
    }
}

fn id_field() -> Field {
    field(
        "id",
        "Int",
        FieldArity::Required,
        vec![attribute("id", Vec::new())],
    )
}

fn relation_attribute(fk: &str, reference: &str) -> Attribute {
    attribute(
        "relation",
        vec![
            Argument::named(
                "fields",
                Expression::Array(vec![Expression::Constant(fk.to_string())]),
            ),
            Argument::named(
                "references",
                Expression::Array(vec![Expression::Constant(reference.to_string())]),
            ),
        ],
    )
}

fn blog_ast() -> Ast {
    Ast {
        tops: vec![
            Top::Model(Model {
                name: "User".to_string(),
                fields: vec![
                    id_field(),
                    field("posts", "Post", FieldArity::List, Vec::new()),
                    field("tags", "Tag", FieldArity::List, Vec::new()),
                ],
                block_attributes: Vec::new(),
            }),
            Top::Model(Model {
                name: "Post".to_string(),
                fields: vec![
                    id_field(),
                    field("authorId", "Int", FieldArity::Required, Vec::new()),
                    field(
                        "author",
                        "User",
                        FieldArity::Required,
                        vec![relation_attribute("authorId", "id")],
                    ),
                ],
                block_attributes: Vec::new(),
            }),
            Top::Model(Model {
                name: "Tag".to_string(),
                fields: vec![
                    id_field(),
                    field("users", "User", FieldArity::List, Vec::new()),
                ],
                block_attributes: Vec::new(),
            }),
        ],
    }
}

#[test]
fn many_to_one_reads_the_owning_side_arguments() {
    let relations = extract_relations(&blog_ast()).expect("extraction succeeds");
    let post = relations
        .iter()
        .find(|model| model.model == "Post")
        .expect("Post relations");

    let author = post.relation("author").expect("author relation");
    assert!(!author.is_list);
    assert!(!author.is_many_to_many);
    assert_eq!(author.related_table, "User");
    assert_eq!(author.foreign_key, "authorId");
    assert_eq!(author.local_key, "id");
}

#[test]
fn one_to_many_borrows_the_key_from_the_back_relation() {
    let relations = extract_relations(&blog_ast()).expect("extraction succeeds");
    let user = relations
        .iter()
        .find(|model| model.model == "User")
        .expect("User relations");

    let posts = user.relation("posts").expect("posts relation");
    assert!(posts.is_list);
    assert!(!posts.is_many_to_many);
    assert_eq!(posts.related_table, "Post");
    assert_eq!(posts.foreign_key, "authorId");
    assert_eq!(posts.local_key, "id");
}

#[test]
fn list_on_both_sides_is_many_to_many_with_junction_metadata() {
    let relations = extract_relations(&blog_ast()).expect("extraction succeeds");
    let user = relations
        .iter()
        .find(|model| model.model == "User")
        .expect("User relations");

    let tags = user.relation("tags").expect("tags relation");
    assert!(tags.is_list);
    assert!(tags.is_many_to_many);
    assert!(tags.foreign_key.is_empty());
    assert_eq!(tags.local_key, "id");
    assert_eq!(tags.junction_table.as_deref(), Some("_TagToUser"));
    assert_eq!(tags.junction_fk_to_self.as_deref(), Some("B"));
    assert_eq!(tags.junction_fk_to_other.as_deref(), Some("A"));
}

#[test]
fn one_to_many_without_a_back_relation_is_rejected() {
    let ast = Ast {
        tops: vec![
            Top::Model(Model {
                name: "User".to_string(),
                fields: vec![
                    id_field(),
                    field("posts", "Post", FieldArity::List, Vec::new()),
                ],
                block_attributes: Vec::new(),
            }),
            Top::Model(Model {
                name: "Post".to_string(),
                fields: vec![id_field()],
                block_attributes: Vec::new(),
            }),
        ],
    };

    extract_relations(&ast).expect_err("missing back-relation must fail");
}
