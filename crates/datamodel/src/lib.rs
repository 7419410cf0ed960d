mod ast;
mod convert;
mod relations;

pub use ast::{
    Argument, Ast, Attribute, CompositeType, DataSource, EnumDef, Expression, Field, FieldArity,
    Generator, Model, Top,
};
pub use convert::convert;
pub use relations::{ModelRelations, RelationField, extract_relations, pascal_case};
