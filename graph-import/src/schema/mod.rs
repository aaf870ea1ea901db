//! Type schema and import document validation.
//!
//! - `types` parses the textual type-schema description
//! - `validator` checks parsed import documents against it

mod types;
mod validator;

pub use types::{FieldDef, FieldKind, FieldType, ObjectType, Scalar, TypeSchema};
pub use validator::ImportValidator;

use thiserror::Error;

/// Errors in the type-schema description itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SchemaError {
    /// The description is not well-formed.
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// A type or enum name is declared twice, or shadows a built-in scalar.
    #[error("line {line}: type '{name}' is declared more than once")]
    DuplicateType {
        /// The repeated name.
        name: String,
        /// 1-based line of the second declaration.
        line: usize,
    },

    /// A field name is declared twice within one type.
    #[error("line {line}: field '{type_name}.{field}' is declared more than once")]
    DuplicateField {
        /// The declaring type.
        type_name: String,
        /// The repeated field.
        field: String,
        /// 1-based line of the second declaration.
        line: usize,
    },

    /// A field refers to a type that is neither a scalar, an enum nor a declared type.
    #[error("line {line}: field '{type_name}.{field}' refers to unknown type '{referenced}'")]
    UnknownType {
        /// The declaring type.
        type_name: String,
        /// The field.
        field: String,
        /// The unknown type name.
        referenced: String,
        /// 1-based line of the field.
        line: usize,
    },

    /// The description declares no object type.
    #[error("no object types declared")]
    NoTypes,

    /// A generated JSON Schema failed to compile.
    #[error("failed to compile record schema for '{type_name}': {message}")]
    Compile {
        /// The type the schema was generated for.
        type_name: String,
        /// The compiler's message.
        message: String,
    },
}

impl SchemaError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }
}
