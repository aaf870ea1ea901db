//! Import document validation.
//!
//! Every check is a JSON Schema generated from the [`TypeSchema`] and
//! compiled once per run:
//!
//! - one envelope schema for `{ "valueType", "values" }`
//! - per type, a `nodes` record schema, a `lists` record schema (when the
//!   type has scalar list fields) and a `relations` side schema (when it has
//!   relation fields)
//!
//! Record schemas are split into a shape check (required and allowed keys)
//! and one small schema per field, so each violation points at the value
//! that caused it.

use std::collections::BTreeMap;
use std::fmt;

use jsonschema::Validator;
use serde_json::{Map, Value, json};

use super::SchemaError;
use super::types::{FieldKind, FieldType, ObjectType, Scalar, TypeSchema};
use crate::error::{SchemaViolations, Violation};
use crate::files::Category;

const TYPE_NAME_KEY: &str = "_typeName";
const ID_KEY: &str = "id";
const FIELD_NAME_KEY: &str = "fieldName";

/// Validates parsed import documents against a type schema.
pub struct ImportValidator {
    envelope: Validator,
    pair: Validator,
    types: BTreeMap<String, CompiledType>,
}

struct CompiledType {
    node: RecordSchema,
    list: Option<RecordSchema>,
    relation: Option<RelationSide>,
}

struct RecordSchema {
    shape: Validator,
    fields: BTreeMap<String, Validator>,
}

struct RelationSide {
    shape: Validator,
    /// Relation field name -> type it points at.
    targets: BTreeMap<String, String>,
}

/// One side of a relation pair that passed its shape check.
struct ResolvedSide<'a> {
    type_name: &'a str,
    field: &'a str,
    target: &'a str,
}

impl fmt::Debug for ImportValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportValidator")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ImportValidator {
    /// Parse `types` and compile the record schemas for every declared type.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the description is invalid.
    pub fn new(types: &str) -> Result<Self, SchemaError> {
        Self::from_schema(&TypeSchema::parse(types)?)
    }

    /// Compile the record schemas for an already parsed type schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Compile`] if a generated schema is rejected.
    pub fn from_schema(schema: &TypeSchema) -> Result<Self, SchemaError> {
        let envelope = compile(
            "<document>",
            &json!({
                "type": "object",
                "required": ["valueType", "values"],
                "properties": {
                    "valueType": {
                        "enum": Category::ALL.map(Category::dir_name),
                    },
                    "values": { "type": "array" },
                },
            }),
        )?;
        let pair = compile(
            "<relation>",
            &json!({
                "type": "array",
                "minItems": 2,
                "maxItems": 2,
                "items": { "type": "object" },
            }),
        )?;

        let mut types = BTreeMap::new();
        for object in schema.types() {
            types.insert(object.name.clone(), compile_type(object)?);
        }

        Ok(Self {
            envelope,
            pair,
            types,
        })
    }

    /// Check one parsed import document.
    ///
    /// # Errors
    ///
    /// Returns every violation found in the document.
    pub fn validate_import_data(&self, document: &Value) -> Result<(), SchemaViolations> {
        let mut violations = Vec::new();
        push_errors(&self.envelope, document, "", &mut violations);
        if !violations.is_empty() {
            return Err(SchemaViolations(violations));
        }

        let category = document
            .get("valueType")
            .and_then(Value::as_str)
            .and_then(Category::from_value_type);
        let values = document.get("values").and_then(Value::as_array);
        let (Some(category), Some(values)) = (category, values) else {
            return Err(SchemaViolations(vec![Violation::new(
                "",
                "malformed import document",
            )]));
        };

        for (i, value) in values.iter().enumerate() {
            let pointer = format!("/values/{i}");
            match category {
                Category::Nodes | Category::Lists => {
                    self.check_record(category, value, &pointer, &mut violations);
                }
                Category::Relations => self.check_relation(value, &pointer, &mut violations),
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaViolations(violations))
        }
    }

    fn lookup<'v>(
        &self,
        value: &'v Value,
        pointer: &str,
        out: &mut Vec<Violation>,
    ) -> Option<(&'v str, &CompiledType)> {
        let Some(object) = value.as_object() else {
            out.push(Violation::new(
                pointer,
                format!("expected an object, found {}", kind_of(value)),
            ));
            return None;
        };
        let Some(type_name) = object.get(TYPE_NAME_KEY).and_then(Value::as_str) else {
            out.push(Violation::new(
                pointer,
                format!("missing string property '{TYPE_NAME_KEY}'"),
            ));
            return None;
        };
        let Some(compiled) = self.types.get(type_name) else {
            out.push(Violation::new(pointer, format!("unknown type '{type_name}'")));
            return None;
        };
        Some((type_name, compiled))
    }

    fn check_record(
        &self,
        category: Category,
        value: &Value,
        pointer: &str,
        out: &mut Vec<Violation>,
    ) {
        let Some((type_name, compiled)) = self.lookup(value, pointer, out) else {
            return;
        };
        let schema = match category {
            Category::Nodes => Some(&compiled.node),
            Category::Lists | Category::Relations => compiled.list.as_ref(),
        };
        match schema {
            Some(schema) => schema.check(value, pointer, out),
            None => out.push(Violation::new(
                pointer,
                format!("type '{type_name}' has no scalar list fields"),
            )),
        }
    }

    fn check_relation(&self, value: &Value, pointer: &str, out: &mut Vec<Violation>) {
        let before = out.len();
        push_errors(&self.pair, value, pointer, out);
        if out.len() > before {
            return;
        }
        let Some(sides) = value.as_array() else {
            return;
        };

        let mut resolved = Vec::with_capacity(2);
        for (j, side) in sides.iter().enumerate() {
            let side_pointer = format!("{pointer}/{j}");
            let Some((type_name, compiled)) = self.lookup(side, &side_pointer, out) else {
                continue;
            };
            let Some(relation) = &compiled.relation else {
                out.push(Violation::new(
                    &side_pointer,
                    format!("type '{type_name}' has no relation fields"),
                ));
                continue;
            };
            let before_side = out.len();
            push_errors(&relation.shape, side, &side_pointer, out);
            if out.len() > before_side {
                continue;
            }
            let field = side.get(FIELD_NAME_KEY).and_then(Value::as_str);
            if let Some((field, target)) =
                field.and_then(|f| relation.targets.get_key_value(f))
            {
                resolved.push(ResolvedSide {
                    type_name,
                    field,
                    target,
                });
            }
        }

        if let [a, b] = resolved.as_slice() {
            for (j, (from, to)) in [(a, b), (b, a)].into_iter().enumerate() {
                if from.target != to.type_name {
                    out.push(Violation::new(
                        format!("{pointer}/{j}"),
                        format!(
                            "relation field '{}.{}' points to '{}', not '{}'",
                            from.type_name, from.field, from.target, to.type_name
                        ),
                    ));
                }
            }
        }
    }
}

impl RecordSchema {
    fn check(&self, value: &Value, pointer: &str, out: &mut Vec<Violation>) {
        push_errors(&self.shape, value, pointer, out);
        if let Value::Object(map) = value {
            for (key, field_value) in map {
                if let Some(validator) = self.fields.get(key) {
                    let field_pointer = format!("{pointer}/{}", escape_pointer(key));
                    push_errors(validator, field_value, &field_pointer, out);
                }
            }
        }
    }
}

fn compile_type(object: &ObjectType) -> Result<CompiledType, SchemaError> {
    let type_name = object.name.as_str();

    // nodes: _typeName, id and scalar fields
    let scalars: Vec<_> = object
        .fields_of(FieldKind::Scalar)
        .filter(|f| f.name != ID_KEY)
        .collect();
    let mut required = vec![TYPE_NAME_KEY, ID_KEY];
    required.extend(scalars.iter().filter(|f| f.required).map(|f| f.name.as_str()));
    let node = RecordSchema {
        shape: compile(
            type_name,
            &record_shape(scalars.iter().map(|f| f.name.as_str()), &required, 2),
        )?,
        fields: scalars
            .iter()
            .map(|f| {
                compile(type_name, &value_schema(&f.ty, !f.required))
                    .map(|validator| (f.name.clone(), validator))
            })
            .chain(std::iter::once(id_validator(type_name)))
            .collect::<Result<_, SchemaError>>()?,
    };

    // lists: _typeName, id and at least one scalar list field
    let lists: Vec<_> = object.fields_of(FieldKind::ScalarList).collect();
    let list = if lists.is_empty() {
        None
    } else {
        Some(RecordSchema {
            shape: compile(
                type_name,
                &record_shape(
                    lists.iter().map(|f| f.name.as_str()),
                    &[TYPE_NAME_KEY, ID_KEY],
                    3,
                ),
            )?,
            fields: lists
                .iter()
                .map(|f| {
                    let schema = json!({
                        "type": "array",
                        "items": value_schema(&f.ty, !f.item_required),
                    });
                    compile(type_name, &schema).map(|validator| (f.name.clone(), validator))
                })
                .chain(std::iter::once(id_validator(type_name)))
                .collect::<Result<_, SchemaError>>()?,
        })
    };

    // relations: {_typeName, id, fieldName} naming one of the relation fields
    let targets: BTreeMap<String, String> = object
        .fields_of(FieldKind::Relation)
        .filter_map(|f| match &f.ty {
            FieldType::Object(target) => Some((f.name.clone(), target.clone())),
            FieldType::Scalar(_) | FieldType::Enum(_) => None,
        })
        .collect();
    let relation = if targets.is_empty() {
        None
    } else {
        let shape = json!({
            "type": "object",
            "required": [TYPE_NAME_KEY, ID_KEY, FIELD_NAME_KEY],
            "properties": {
                TYPE_NAME_KEY: { "type": "string" },
                ID_KEY: { "type": "string" },
                FIELD_NAME_KEY: { "enum": targets.keys().collect::<Vec<_>>() },
            },
            "additionalProperties": false,
        });
        Some(RelationSide {
            shape: compile(type_name, &shape)?,
            targets,
        })
    };

    Ok(CompiledType {
        node,
        list,
        relation,
    })
}

/// Object schema allowing exactly `_typeName`, `id` and `fields`.
fn record_shape<'a>(
    fields: impl Iterator<Item = &'a str>,
    required: &[&str],
    min_properties: usize,
) -> Value {
    let mut properties = Map::new();
    properties.insert(TYPE_NAME_KEY.to_owned(), Value::Bool(true));
    properties.insert(ID_KEY.to_owned(), Value::Bool(true));
    for name in fields {
        properties.insert(name.to_owned(), Value::Bool(true));
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "minProperties": min_properties,
        "additionalProperties": false,
    })
}

fn id_validator(type_name: &str) -> Result<(String, Validator), SchemaError> {
    Ok((
        ID_KEY.to_owned(),
        compile(type_name, &json!({ "type": "string" }))?,
    ))
}

/// Schema for a single scalar or enum value.
fn value_schema(ty: &FieldType, nullable: bool) -> Value {
    match ty {
        FieldType::Scalar(scalar) => match json_type(*scalar) {
            Some(t) if nullable => json!({ "type": [t, "null"] }),
            Some(t) => json!({ "type": t }),
            None if nullable => json!({}),
            None => json!({ "not": { "type": "null" } }),
        },
        FieldType::Enum(values) => {
            let mut allowed: Vec<Value> = values.iter().cloned().map(Value::String).collect();
            if nullable {
                allowed.push(Value::Null);
            }
            json!({ "enum": allowed })
        }
        FieldType::Object(_) => json!({}),
    }
}

/// JSON type of a scalar; `None` for `Json`, which accepts anything.
fn json_type(scalar: Scalar) -> Option<&'static str> {
    match scalar {
        Scalar::Id | Scalar::String | Scalar::DateTime => Some("string"),
        Scalar::Int => Some("integer"),
        Scalar::Float => Some("number"),
        Scalar::Boolean => Some("boolean"),
        Scalar::Json => None,
    }
}

fn compile(type_name: &str, schema: &Value) -> Result<Validator, SchemaError> {
    jsonschema::validator_for(schema).map_err(|e| SchemaError::Compile {
        type_name: type_name.to_owned(),
        message: e.to_string(),
    })
}

fn push_errors(validator: &Validator, value: &Value, pointer: &str, out: &mut Vec<Violation>) {
    for error in validator.iter_errors(value) {
        out.push(Violation::new(pointer, error.to_string()));
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const TYPES: &str = r#"
        type User @model {
          id: ID! @isUnique
          name: String!
          age: Int
          score: Float
          active: Boolean
          meta: Json
          tags: [String!]
          role: Role
          posts: [Post!]! @relation(name: "UserPosts")
        }

        type Post @model {
          id: ID! @isUnique
          title: String!
          author: User @relation(name: "UserPosts")
        }

        type Tag @model {
          id: ID!
          label: String
        }

        enum Role { ADMIN USER }
    "#;

    fn validator() -> ImportValidator {
        ImportValidator::new(TYPES).unwrap()
    }

    fn pointers(err: &SchemaViolations) -> Vec<&str> {
        err.iter().map(|v| v.pointer.as_str()).collect()
    }

    #[test]
    fn test_valid_nodes() {
        let doc = json!({
            "valueType": "nodes",
            "values": [
                {"_typeName": "User", "id": "u1", "name": "Ada", "age": 36, "score": 1.5,
                 "active": true, "meta": {"any": [1, "thing"]}, "role": "ADMIN"},
                {"_typeName": "User", "id": "u2", "name": "Bob", "age": null, "role": null},
                {"_typeName": "Post", "id": "p1", "title": "Hello"},
            ],
        });
        validator().validate_import_data(&doc).unwrap();
    }

    #[test]
    fn test_valid_lists() {
        let doc = json!({
            "valueType": "lists",
            "values": [{"_typeName": "User", "id": "u1", "tags": ["a", "b"]}],
        });
        validator().validate_import_data(&doc).unwrap();
    }

    #[test]
    fn test_valid_relations() {
        let doc = json!({
            "valueType": "relations",
            "values": [[
                {"_typeName": "User", "id": "u1", "fieldName": "posts"},
                {"_typeName": "Post", "id": "p1", "fieldName": "author"},
            ]],
        });
        validator().validate_import_data(&doc).unwrap();
    }

    #[test]
    fn test_empty_values_are_valid() {
        let doc = json!({"valueType": "relations", "values": []});
        validator().validate_import_data(&doc).unwrap();
    }

    #[test]
    fn test_envelope_violations() {
        let v = validator();

        let err = v
            .validate_import_data(&json!({"valueType": "edges", "values": []}))
            .unwrap_err();
        assert_eq!(pointers(&err), [""]);

        let err = v
            .validate_import_data(&json!({"valueType": "nodes", "values": {}}))
            .unwrap_err();
        assert_eq!(err.len(), 1);

        let err = v.validate_import_data(&json!([1, 2])).unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn test_node_field_violations_point_at_field() {
        let doc = json!({
            "valueType": "nodes",
            "values": [
                {"_typeName": "User", "id": "u1", "name": "Ada", "age": "old"},
                {"_typeName": "User", "id": "u2", "name": "Bob", "role": "ROOT"},
                {"_typeName": "User", "id": 3, "name": "Cy"},
            ],
        });
        let err = validator().validate_import_data(&doc).unwrap_err();
        assert_eq!(
            pointers(&err),
            ["/values/0/age", "/values/1/role", "/values/2/id"]
        );
    }

    #[test]
    fn test_node_shape_violations() {
        let v = validator();

        // missing required name
        let doc = json!({"valueType": "nodes", "values": [{"_typeName": "User", "id": "u1"}]});
        let err = v.validate_import_data(&doc).unwrap_err();
        assert_eq!(pointers(&err), ["/values/0"]);
        assert!(err.0[0].message.contains("name"), "got: {err}");

        // unknown field, list field and relation field are not node data
        for extra in ["nickname", "tags", "posts"] {
            let mut record = json!({"_typeName": "User", "id": "u1", "name": "Ada"});
            record[extra] = json!(["x"]);
            let doc = json!({"valueType": "nodes", "values": [record]});
            let err = v.validate_import_data(&doc).unwrap_err();
            assert!(err.0[0].message.contains(extra), "{extra}: {err}");
        }

        // null is not accepted for a non-null field
        let doc = json!({"valueType": "nodes", "values": [
            {"_typeName": "User", "id": "u1", "name": null},
        ]});
        let err = v.validate_import_data(&doc).unwrap_err();
        assert_eq!(pointers(&err), ["/values/0/name"]);

        // a non-null Json field takes any value except null
        let v = ImportValidator::new("type A { id: ID! meta: Json! }").unwrap();
        let doc = json!({"valueType": "nodes", "values": [
            {"_typeName": "A", "id": "a1", "meta": null},
        ]});
        let err = v.validate_import_data(&doc).unwrap_err();
        assert_eq!(pointers(&err), ["/values/0/meta"]);
        let doc = json!({"valueType": "nodes", "values": [
            {"_typeName": "A", "id": "a1", "meta": [1, {"x": false}]},
        ]});
        assert!(v.validate_import_data(&doc).is_ok());
    }

    #[test]
    fn test_list_element_nullability() {
        let v = ImportValidator::new("type A { id: ID! loose: [String] strict: [String!] }")
            .unwrap();

        let doc = json!({"valueType": "lists", "values": [
            {"_typeName": "A", "id": "a1", "loose": ["x", null]},
        ]});
        assert!(v.validate_import_data(&doc).is_ok());

        let doc = json!({"valueType": "lists", "values": [
            {"_typeName": "A", "id": "a1", "strict": ["x", null]},
        ]});
        let err = v.validate_import_data(&doc).unwrap_err();
        assert_eq!(pointers(&err), ["/values/0/strict"]);
    }

    #[test]
    fn test_unknown_or_missing_type_name() {
        let doc = json!({
            "valueType": "nodes",
            "values": [
                {"_typeName": "Usr", "id": "u1"},
                {"id": "u2"},
                "u3",
            ],
        });
        let err = validator().validate_import_data(&doc).unwrap_err();
        assert_eq!(err.len(), 3);
        assert!(err.0[0].message.contains("unknown type 'Usr'"));
        assert!(err.0[1].message.contains("_typeName"));
        assert!(err.0[2].message.contains("expected an object, found a string"));
    }

    #[test]
    fn test_list_violations() {
        let v = validator();

        let doc = json!({"valueType": "lists", "values": [
            {"_typeName": "User", "id": "u1", "tags": ["a", 2]},
        ]});
        let err = v.validate_import_data(&doc).unwrap_err();
        assert_eq!(pointers(&err), ["/values/0/tags"]);

        let doc = json!({"valueType": "lists", "values": [
            {"_typeName": "User", "id": "u1", "name": "Ada"},
        ]});
        assert!(v.validate_import_data(&doc).is_err());

        let doc = json!({"valueType": "lists", "values": [{"_typeName": "User", "id": "u1"}]});
        assert!(v.validate_import_data(&doc).is_err());

        let doc = json!({"valueType": "lists", "values": [
            {"_typeName": "Post", "id": "p1", "title": ["x"]},
        ]});
        let err = v.validate_import_data(&doc).unwrap_err();
        assert!(err.0[0].message.contains("no scalar list fields"), "got: {err}");
    }

    #[test]
    fn test_relation_violations() {
        let v = validator();

        // not a pair
        let doc = json!({"valueType": "relations", "values": [[
            {"_typeName": "User", "id": "u1", "fieldName": "posts"},
        ]]});
        let err = v.validate_import_data(&doc).unwrap_err();
        assert_eq!(pointers(&err), ["/values/0"]);

        // fieldName is not a relation field
        let doc = json!({"valueType": "relations", "values": [[
            {"_typeName": "User", "id": "u1", "fieldName": "name"},
            {"_typeName": "Post", "id": "p1", "fieldName": "author"},
        ]]});
        let err = v.validate_import_data(&doc).unwrap_err();
        assert_eq!(pointers(&err), ["/values/0/0"]);

        // type without relation fields
        let doc = json!({"valueType": "relations", "values": [[
            {"_typeName": "Tag", "id": "t1", "fieldName": "posts"},
            {"_typeName": "Post", "id": "p1", "fieldName": "author"},
        ]]});
        let err = v.validate_import_data(&doc).unwrap_err();
        assert!(err.0[0].message.contains("type 'Tag' has no relation fields"));
    }

    #[test]
    fn test_relation_sides_must_point_at_each_other() {
        let doc = json!({"valueType": "relations", "values": [[
            {"_typeName": "User", "id": "u1", "fieldName": "posts"},
            {"_typeName": "User", "id": "u2", "fieldName": "posts"},
        ]]});
        let err = validator().validate_import_data(&doc).unwrap_err();
        assert_eq!(pointers(&err), ["/values/0/0", "/values/0/1"]);
        assert!(
            err.0[0]
                .message
                .contains("relation field 'User.posts' points to 'Post', not 'User'"),
            "got: {err}"
        );
    }

    #[test]
    fn test_escape_pointer() {
        assert_eq!(escape_pointer("a/b~c"), "a~1b~0c");
    }
}
