//! Type-schema description parser.
//!
//! Accepts the SDL subset used to describe a project's model types:
//!
//! ```graphql
//! type User @model {
//!   id: ID! @isUnique
//!   name: String!
//!   tags: [String!]
//!   role: Role
//!   posts: [Post!]! @relation(name: "UserPosts")
//! }
//!
//! enum Role { ADMIN USER }
//! ```
//!
//! Directives and their arguments are accepted and ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use super::SchemaError;

/// Tokenizer: comments, string literals, names, punctuation, then any other
/// single character so that stray input surfaces as a syntax error.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(concat!(
        r"#[^\n]*|",                  // comment to end of line
        r#""(?:[^"\\]|\\.)*"|"#,      // string literal (directive arguments)
        r"[A-Za-z_][A-Za-z0-9_]*|",   // name
        r"[{}()\[\]:!@=,]|",          // punctuation
        r"\S",                        // anything else
    )) {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid token regex: {err}"),
    }
});

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Id,
    String,
    Int,
    Float,
    Boolean,
    DateTime,
    Json,
}

impl Scalar {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ID" => Self::Id,
            "String" => Self::String,
            "Int" => Self::Int,
            "Float" => Self::Float,
            "Boolean" => Self::Boolean,
            "DateTime" => Self::DateTime,
            "Json" => Self::Json,
            _ => return None,
        })
    }
}

/// The resolved named type of a field, with list and non-null wrappers removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Scalar(Scalar),
    /// An enum, with its values in declaration order.
    Enum(Vec<String>),
    /// Another object type.
    Object(String),
}

/// How a field's values travel in an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Set on `nodes` records.
    Scalar,
    /// Set on `lists` records.
    ScalarList,
    /// Set on `relations` records.
    Relation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    /// Outer `!`.
    pub required: bool,
    pub list: bool,
    /// `!` on the element type of a list, as in `[String!]`.
    pub item_required: bool,
}

impl FieldDef {
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match (&self.ty, self.list) {
            (FieldType::Object(_), _) => FieldKind::Relation,
            (_, true) => FieldKind::ScalarList,
            (_, false) => FieldKind::Scalar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectType {
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDef>,
}

impl ObjectType {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields_of(&self, kind: FieldKind) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(move |f| f.kind() == kind)
    }
}

/// A parsed and resolved type-schema description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSchema {
    types: BTreeMap<String, ObjectType>,
}

impl TypeSchema {
    /// Parse a type-schema description.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] on syntax errors, duplicate names, references
    /// to undeclared types, or when no object type is declared.
    pub fn parse(source: &str) -> Result<Self, SchemaError> {
        let tokens = tokenize(source);
        let defs = Parser { tokens, pos: 0 }.definitions()?;
        resolve(defs)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ObjectType> {
        self.types.get(name)
    }

    /// Object types ordered by name.
    pub fn types(&self) -> impl Iterator<Item = &ObjectType> {
        self.types.values()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token<'a> {
    text: &'a str,
    line: usize,
}

fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut last = 0;
    for m in TOKEN_RE.find_iter(source) {
        line += source[last..m.start()].matches('\n').count();
        last = m.start();
        if !m.as_str().starts_with('#') {
            tokens.push(Token {
                text: m.as_str(),
                line,
            });
        }
    }
    tokens
}

/// A field type as written, before names are resolved.
struct TypeRef {
    name: String,
    required: bool,
    list: bool,
    item_required: bool,
    line: usize,
}

struct RawField {
    name: String,
    ty: TypeRef,
}

enum Definition {
    Object {
        name: String,
        line: usize,
        fields: Vec<RawField>,
    },
    Enum {
        name: String,
        line: usize,
        values: Vec<String>,
    },
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn next(&mut self) -> Result<Token<'a>, SchemaError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| SchemaError::syntax(self.line(), "unexpected end of input"))?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.peek().is_some_and(|t| t.text == text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> Result<(), SchemaError> {
        let token = self.next()?;
        if token.text == text {
            Ok(())
        } else {
            Err(SchemaError::syntax(
                token.line,
                format!("expected '{text}', found '{}'", token.text),
            ))
        }
    }

    fn name(&mut self) -> Result<Token<'a>, SchemaError> {
        let token = self.next()?;
        if is_name(token.text) {
            Ok(token)
        } else {
            Err(SchemaError::syntax(
                token.line,
                format!("expected a name, found '{}'", token.text),
            ))
        }
    }

    fn definitions(mut self) -> Result<Vec<Definition>, SchemaError> {
        let mut defs = Vec::new();
        while let Some(token) = self.peek() {
            let keyword = token.clone();
            match keyword.text {
                "type" => {
                    self.pos += 1;
                    defs.push(self.object_type()?);
                }
                "enum" => {
                    self.pos += 1;
                    defs.push(self.enum_type()?);
                }
                other => {
                    return Err(SchemaError::syntax(
                        keyword.line,
                        format!("expected 'type' or 'enum', found '{other}'"),
                    ));
                }
            }
        }
        Ok(defs)
    }

    fn object_type(&mut self) -> Result<Definition, SchemaError> {
        let name = self.name()?;
        self.directives()?;
        self.expect("{")?;
        let mut fields = Vec::new();
        while !self.eat("}") {
            let field = self.name()?;
            self.expect(":")?;
            let ty = self.type_ref()?;
            self.directives()?;
            fields.push(RawField {
                name: field.text.to_owned(),
                ty,
            });
        }
        Ok(Definition::Object {
            name: name.text.to_owned(),
            line: name.line,
            fields,
        })
    }

    fn enum_type(&mut self) -> Result<Definition, SchemaError> {
        let name = self.name()?;
        self.directives()?;
        self.expect("{")?;
        let mut values = Vec::new();
        while !self.eat("}") {
            let value = self.name()?;
            self.directives()?;
            values.push(value.text.to_owned());
        }
        if values.is_empty() {
            return Err(SchemaError::syntax(
                name.line,
                format!("enum '{}' has no values", name.text),
            ));
        }
        Ok(Definition::Enum {
            name: name.text.to_owned(),
            line: name.line,
            values,
        })
    }

    fn type_ref(&mut self) -> Result<TypeRef, SchemaError> {
        if self.eat("[") {
            let inner = self.type_ref()?;
            if inner.list {
                return Err(SchemaError::syntax(inner.line, "nested list types are not supported"));
            }
            self.expect("]")?;
            Ok(TypeRef {
                name: inner.name,
                required: self.eat("!"),
                list: true,
                item_required: inner.required,
                line: inner.line,
            })
        } else {
            let name = self.name()?;
            Ok(TypeRef {
                name: name.text.to_owned(),
                required: self.eat("!"),
                list: false,
                item_required: false,
                line: name.line,
            })
        }
    }

    /// Skip `@name` and `@name(...)` directives.
    fn directives(&mut self) -> Result<(), SchemaError> {
        while self.eat("@") {
            self.name()?;
            if self.eat("(") {
                let mut depth = 1_usize;
                while depth > 0 {
                    match self.next()?.text {
                        "(" => depth += 1,
                        ")" => depth -= 1,
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_name(text: &str) -> bool {
    text.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}

fn resolve(defs: Vec<Definition>) -> Result<TypeSchema, SchemaError> {
    let mut enums: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut objects: BTreeMap<String, Vec<RawField>> = BTreeMap::new();

    for def in defs {
        let (name, line) = match &def {
            Definition::Object { name, line, .. } | Definition::Enum { name, line, .. } => {
                (name.clone(), *line)
            }
        };
        if Scalar::from_name(&name).is_some()
            || enums.contains_key(&name)
            || objects.contains_key(&name)
        {
            return Err(SchemaError::DuplicateType { name, line });
        }
        match def {
            Definition::Object { fields, .. } => {
                objects.insert(name, fields);
            }
            Definition::Enum { values, .. } => {
                enums.insert(name, values);
            }
        }
    }

    if objects.is_empty() {
        return Err(SchemaError::NoTypes);
    }

    let mut types = BTreeMap::new();
    for (type_name, raw_fields) in &objects {
        let mut seen = BTreeSet::new();
        let mut fields = Vec::with_capacity(raw_fields.len());
        for raw in raw_fields {
            if !seen.insert(raw.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    type_name: type_name.clone(),
                    field: raw.name.clone(),
                    line: raw.ty.line,
                });
            }
            let ty = if let Some(scalar) = Scalar::from_name(&raw.ty.name) {
                FieldType::Scalar(scalar)
            } else if let Some(values) = enums.get(&raw.ty.name) {
                FieldType::Enum(values.clone())
            } else if objects.contains_key(&raw.ty.name) {
                FieldType::Object(raw.ty.name.clone())
            } else {
                return Err(SchemaError::UnknownType {
                    type_name: type_name.clone(),
                    field: raw.name.clone(),
                    referenced: raw.ty.name.clone(),
                    line: raw.ty.line,
                });
            };
            fields.push(FieldDef {
                name: raw.name.clone(),
                ty,
                required: raw.ty.required,
                list: raw.ty.list,
                item_required: raw.ty.item_required,
            });
        }
        types.insert(
            type_name.clone(),
            ObjectType {
                name: type_name.clone(),
                fields,
            },
        );
    }

    Ok(TypeSchema { types })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const TYPES: &str = r#"
        # Blog model
        type User @model {
          id: ID! @isUnique
          name: String!
          age: Int
          tags: [String!]
          role: Role
          posts: [Post!]! @relation(name: "UserPosts")
        }

        type Post @model {
          id: ID! @isUnique
          title: String! @defaultValue(value: "untitled (draft)")
          author: User @relation(name: "UserPosts")
        }

        enum Role {
          ADMIN
          USER
        }
    "#;

    #[test]
    fn test_parse_fields_and_kinds() {
        let schema = TypeSchema::parse(TYPES).unwrap();
        let user = schema.get("User").unwrap();

        let name = user.field("name").unwrap();
        assert_eq!(name.ty, FieldType::Scalar(Scalar::String));
        assert!(name.required);
        assert_eq!(name.kind(), FieldKind::Scalar);

        let tags = user.field("tags").unwrap();
        assert!(tags.list);
        assert!(!tags.required);
        assert!(tags.item_required);
        assert!(!name.item_required);
        assert_eq!(tags.kind(), FieldKind::ScalarList);

        let role = user.field("role").unwrap();
        assert_eq!(
            role.ty,
            FieldType::Enum(vec!["ADMIN".to_owned(), "USER".to_owned()])
        );
        assert_eq!(role.kind(), FieldKind::Scalar);

        let posts = user.field("posts").unwrap();
        assert_eq!(posts.ty, FieldType::Object("Post".to_owned()));
        assert_eq!(posts.kind(), FieldKind::Relation);

        let relation_names: Vec<&str> = user
            .fields_of(FieldKind::Relation)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(relation_names, ["posts"]);
    }

    #[test]
    fn test_types_are_ordered_by_name() {
        let schema = TypeSchema::parse(TYPES).unwrap();
        let names: Vec<&str> = schema.types().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Post", "User"]);
    }

    #[test]
    fn test_directive_string_args_may_contain_parens_and_hashes() {
        let schema = TypeSchema::parse(
            r#"type A { id: ID! @default(value: "x) # not a comment") name: String }"#,
        )
        .unwrap();
        assert!(schema.get("A").unwrap().field("name").is_some());
    }

    #[test]
    fn test_unknown_type_reference() {
        let err = TypeSchema::parse("type A {\n  id: ID!\n  b: Bee\n}").unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownType {
                type_name: "A".to_owned(),
                field: "b".to_owned(),
                referenced: "Bee".to_owned(),
                line: 3,
            }
        );
    }

    #[test]
    fn test_duplicate_type_and_field() {
        let err = TypeSchema::parse("type A { id: ID }\nenum A { X }").unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateType { line: 2, .. }), "got: {err:?}");

        let err = TypeSchema::parse("type A { id: ID id: String }").unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { .. }), "got: {err:?}");
    }

    #[test]
    fn test_syntax_errors_report_line() {
        let err = TypeSchema::parse("type A {\n  id ID\n}").unwrap_err();
        assert!(
            matches!(err, SchemaError::Syntax { line: 2, .. }),
            "got: {err:?}"
        );

        let err = TypeSchema::parse("interface Node { id: ID! }").unwrap_err();
        assert!(err.to_string().contains("expected 'type' or 'enum'"), "got: {err}");

        let err = TypeSchema::parse("type A { id: ID!").unwrap_err();
        assert!(err.to_string().contains("unexpected end of input"), "got: {err}");
    }

    #[test]
    fn test_no_object_types() {
        assert_eq!(TypeSchema::parse("enum Role { A }").unwrap_err(), SchemaError::NoTypes);
        assert_eq!(TypeSchema::parse("  # nothing\n").unwrap_err(), SchemaError::NoTypes);
    }
}
