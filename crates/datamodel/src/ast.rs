//! Parsed data-model AST, as handed over by the external DML parser.
//! This crate consumes the shapes; producing them is the parser's job.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ast {
    pub tops: Vec<Top>,
}

impl Ast {
    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.tops.iter().filter_map(|top| match top {
            Top::Model(model) => Some(model),
            _ => None,
        })
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumDef> {
        self.tops.iter().filter_map(|top| match top {
            Top::Enum(enum_def) => Some(enum_def),
            _ => None,
        })
    }

    #[must_use]
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models().find(|model| model.name == name)
    }

    /// Provider string of the first datasource block, if any.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        self.tops.iter().find_map(|top| match top {
            Top::DataSource(datasource) => Some(datasource.provider.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Top {
    Model(Model),
    Enum(EnumDef),
    CompositeType(CompositeType),
    DataSource(DataSource),
    Generator(Generator),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub fields: Vec<Field>,
    pub block_attributes: Vec<Attribute>,
}

impl Model {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    /// Type name as written: a scalar (`Int`, `String`, ...), an enum,
    /// or another model (a relation field).
    pub tpe: String,
    pub arity: FieldArity,
    pub attributes: Vec<Attribute>,
}

impl Field {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldArity {
    Required,
    Optional,
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeType {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSource {
    pub name: String,
    pub provider: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    pub name: String,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub arguments: Vec<Argument>,
}

impl Attribute {
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&Expression> {
        self.arguments
            .iter()
            .find(|argument| argument.name.as_deref() == Some(name))
            .map(|argument| &argument.value)
    }

    /// The unnamed (positional) argument, conventionally first.
    #[must_use]
    pub fn default_argument(&self) -> Option<&Expression> {
        self.arguments
            .iter()
            .find(|argument| argument.name.is_none())
            .map(|argument| &argument.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expression,
}

impl Argument {
    #[must_use]
    pub fn unnamed(value: Expression) -> Self {
        Self { name: None, value }
    }

    pub fn named(name: impl Into<String>, value: Expression) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    StringLiteral(String),
    NumericLiteral(String),
    /// Bare identifiers, including the boolean constants.
    Constant(String),
    Array(Vec<Expression>),
    Function { name: String, arguments: Vec<Expression> },
    /// Dotted identifier path such as `db.VarChar`.
    Path(Vec<String>),
}

impl Expression {
    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::StringLiteral(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_constant(&self) -> Option<&str> {
        match self {
            Self::Constant(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Expression]> {
        match self {
            Self::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Flattens an array of constants/strings into their names, the
    /// shape `fields: [a, b]` arguments arrive in.
    #[must_use]
    pub fn as_name_list(&self) -> Option<Vec<String>> {
        let items = match self {
            Self::Array(values) => values.as_slice(),
            single => std::slice::from_ref(single),
        };
        items
            .iter()
            .map(|item| match item {
                Self::Constant(name) => Some(name.clone()),
                Self::StringLiteral(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}
