//! Final construction of a schema type from its hydrated field values.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::schema::Schema;
use crate::schema_validator::validate_fields;

/// Builds the typed value once every field has been hydrated.
pub trait TypedConstructor<T> {
    fn construct(&self, schema: &Schema, fields: Map<String, Value>) -> Result<T, ValidationError>;
}

/// Checks schema constraints, then deserializes with serde.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeConstructor;

impl<T: DeserializeOwned> TypedConstructor<T> for SerdeConstructor {
    fn construct(&self, schema: &Schema, fields: Map<String, Value>) -> Result<T, ValidationError> {
        let violations = validate_fields(schema, &fields);
        if !violations.is_empty() {
            return Err(ValidationError::new(schema.name(), violations));
        }
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| ValidationError::single(schema.name(), "", e.to_string()))
    }
}
