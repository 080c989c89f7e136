//! Schema introspection.
//!
//! A schema type is any `T: JsonSchema`. Its generated JSON Schema is walked once
//! into an ordered list of [`SchemaNode`]s, each tagged with a single concrete
//! [`FieldKind`]. Optional and union types are rejected here so coercion never
//! has to pick a branch.

use std::collections::HashSet;
use std::fmt;

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, SchemaObject};
use schemars::JsonSchema;
use serde_json::{Map, Value};

use crate::error::SchemaError;

const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Fieldless version of [`FieldKind`], used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindTag {
    Text,
    Integer,
    Float,
    Decimal,
    Boolean,
    Mapping,
    Sequence,
    Set,
    Nested,
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KindTag::Text => "text",
            KindTag::Integer => "integer",
            KindTag::Float => "float",
            KindTag::Decimal => "decimal",
            KindTag::Boolean => "boolean",
            KindTag::Mapping => "mapping",
            KindTag::Sequence => "sequence",
            KindTag::Set => "set",
            KindTag::Nested => "nested schema",
        };
        f.write_str(name)
    }
}

/// Declared type of a schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Decimal,
    Boolean,
    /// JSON object with arbitrary keys, e.g. `HashMap<String, V>`.
    Mapping,
    /// JSON array, e.g. `Vec<T>` or a tuple.
    Sequence,
    /// JSON array with unique items, e.g. `HashSet<T>`.
    Set,
    /// A sub-schema hydrated from its own section.
    Nested(Schema),
}

impl FieldKind {
    pub fn tag(&self) -> KindTag {
        match self {
            FieldKind::Text => KindTag::Text,
            FieldKind::Integer => KindTag::Integer,
            FieldKind::Float => KindTag::Float,
            FieldKind::Decimal => KindTag::Decimal,
            FieldKind::Boolean => KindTag::Boolean,
            FieldKind::Mapping => KindTag::Mapping,
            FieldKind::Sequence => KindTag::Sequence,
            FieldKind::Set => KindTag::Set,
            FieldKind::Nested(_) => KindTag::Nested,
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    /// Default value as recorded in the JSON Schema, if any.
    pub default: Option<Value>,
    /// The field's own JSON Schema keywords (ranges, lengths, enum, format).
    pub constraints: Map<String, Value>,
}

impl SchemaNode {
    pub fn has_default(&self) -> bool {
        !self.required
    }
}

/// Ordered field list of one schema type.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    nodes: Vec<SchemaNode>,
}

impl Schema {
    /// Introspect a schema type.
    pub fn of<T: JsonSchema>() -> Result<Self, SchemaError> {
        let root = schemars::schema_for!(T);
        let name = T::schema_name();
        let value = serde_json::to_value(&root).map_err(|e| SchemaError::Serialization {
            schema: name.clone(),
            message: e.to_string(),
        })?;
        let empty = Map::new();
        let definitions = value
            .get("definitions")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let mut walker = Walker {
            definitions,
            stack: vec![name.clone()],
        };
        walker.object(&name, &value)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn nodes(&self) -> &[SchemaNode] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&SchemaNode> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// `schema_with` helper marking a field as a decimal carried as a string.
///
/// ```
/// use bigdecimal::BigDecimal;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct Pricing {
///     #[schemars(schema_with = "op_hydrate::schema::decimal_schema")]
///     unit_price: BigDecimal,
/// }
///
/// let schema = op_hydrate::Schema::of::<Pricing>().unwrap();
/// assert_eq!(schema.nodes()[0].kind, op_hydrate::FieldKind::Decimal);
/// ```
pub fn decimal_schema(_gen: &mut SchemaGenerator) -> schemars::schema::Schema {
    SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        format: Some("decimal".to_string()),
        ..Default::default()
    }
    .into()
}

struct Walker<'a> {
    definitions: &'a Map<String, Value>,
    // Definitions currently being expanded; guards against recursive types.
    stack: Vec<String>,
}

impl<'a> Walker<'a> {
    fn object(&mut self, name: &str, schema: &'a Value) -> Result<Schema, SchemaError> {
        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| SchemaError::NotAnObject {
                schema: name.to_string(),
            })?;
        let required: HashSet<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut nodes = Vec::with_capacity(properties.len());
        for (field, property) in properties {
            let (resolved, definition) = self.dereference(property)?;
            let kind = self.kind(field, resolved, definition)?;

            let mut constraints = resolved.as_object().cloned().unwrap_or_default();
            if let Some(outer) = property.as_object() {
                for (key, value) in outer {
                    if key != "$ref" && key != "allOf" {
                        constraints.insert(key.clone(), value.clone());
                    }
                }
            }

            nodes.push(SchemaNode {
                name: field.clone(),
                kind,
                required: required.contains(field.as_str()),
                default: property.get("default").cloned(),
                constraints,
            });
        }

        Ok(Schema {
            name: name.to_string(),
            nodes,
        })
    }

    /// Follow `$ref` and single-element `allOf` wrappers down to a concrete schema.
    fn dereference(&self, property: &'a Value) -> Result<(&'a Value, Option<&'a str>), SchemaError> {
        let definitions = self.definitions;
        let mut current = property;
        let mut definition = None;
        loop {
            if let Some(reference) = current.get("$ref").and_then(Value::as_str) {
                let (name, target) = reference
                    .strip_prefix(DEFINITIONS_PREFIX)
                    .and_then(|name| definitions.get_key_value(name))
                    .ok_or_else(|| SchemaError::DanglingReference(reference.to_string()))?;
                definition = Some(name.as_str());
                current = target;
                continue;
            }
            match current.get("allOf").and_then(Value::as_array) {
                Some(parts) if parts.len() == 1 => current = &parts[0],
                _ => break,
            }
        }
        Ok((current, definition))
    }

    fn kind(&mut self, field: &str, schema: &'a Value, definition: Option<&str>) -> Result<FieldKind, SchemaError> {
        let unsupported = |reason: &str| SchemaError::Unsupported {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if schema.get("anyOf").is_some() || schema.get("oneOf").is_some() {
            return Err(unsupported("optional and union types have no single target type"));
        }
        if schema.get("allOf").is_some() {
            return Err(unsupported("schema composition (allOf) is not supported"));
        }

        let instance_type = match schema.get("type") {
            Some(Value::String(t)) => t.as_str(),
            Some(Value::Array(_)) => {
                return Err(unsupported("optional and union types have no single target type"))
            }
            _ => {
                let all_strings = schema
                    .get("enum")
                    .and_then(Value::as_array)
                    .is_some_and(|variants| variants.iter().all(Value::is_string));
                if all_strings {
                    return Ok(FieldKind::Text);
                }
                return Err(unsupported("untyped fields cannot be coerced"));
            }
        };

        let kind = match instance_type {
            "string" if schema.get("format").and_then(Value::as_str) == Some("decimal") => FieldKind::Decimal,
            "string" => FieldKind::Text,
            "integer" => FieldKind::Integer,
            "number" => FieldKind::Float,
            "boolean" => FieldKind::Boolean,
            "array" if schema.get("uniqueItems").and_then(Value::as_bool) == Some(true) => FieldKind::Set,
            "array" => FieldKind::Sequence,
            "object" if schema.get("properties").is_some() => {
                let name = definition.unwrap_or(field).to_string();
                if self.stack.contains(&name) {
                    return Err(unsupported("recursive schemas are not supported"));
                }
                self.stack.push(name.clone());
                let nested = self.object(&name, schema);
                self.stack.pop();
                FieldKind::Nested(nested?)
            }
            "object" => FieldKind::Mapping,
            other => return Err(unsupported(&format!("JSON type '{}' has no coercion", other))),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap, HashSet};

    use bigdecimal::BigDecimal;
    use schemars::JsonSchema;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Database {
        host: String,
        port: u16,
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct AppConfig {
        database: Database,
        debug: bool,
        ratio: f64,
        tags: Vec<String>,
        roles: HashSet<String>,
        sorted: BTreeSet<u32>,
        labels: HashMap<String, String>,
        #[schemars(schema_with = "decimal_schema")]
        price: BigDecimal,
        pair: (String, u8),
    }

    #[test]
    fn test_kinds_in_declaration_order() {
        let schema = Schema::of::<AppConfig>().unwrap();
        assert_eq!(schema.name(), "AppConfig");
        let names: Vec<&str> = schema.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["database", "debug", "ratio", "tags", "roles", "sorted", "labels", "price", "pair"]
        );

        let tags: Vec<KindTag> = schema.nodes().iter().map(|n| n.kind.tag()).collect();
        assert_eq!(
            tags,
            vec![
                KindTag::Nested,
                KindTag::Boolean,
                KindTag::Float,
                KindTag::Sequence,
                KindTag::Set,
                KindTag::Set,
                KindTag::Mapping,
                KindTag::Decimal,
                KindTag::Sequence,
            ]
        );
    }

    #[test]
    fn test_nested_schema_is_expanded() {
        let schema = Schema::of::<AppConfig>().unwrap();
        let FieldKind::Nested(database) = &schema.node("database").unwrap().kind else {
            panic!("database should be nested");
        };
        assert_eq!(database.name(), "Database");
        assert_eq!(database.node("host").unwrap().kind, FieldKind::Text);
        assert_eq!(database.node("port").unwrap().kind, FieldKind::Integer);
        assert!(database.node("port").unwrap().required);
    }

    #[derive(Serialize, Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct WithDefaults {
        required_field: String,
        #[serde(default = "default_timeout")]
        timeout: u32,
    }

    fn default_timeout() -> u32 {
        60
    }

    #[test]
    fn test_defaults_are_recorded() {
        let schema = Schema::of::<WithDefaults>().unwrap();
        let required = schema.node("required_field").unwrap();
        assert!(required.required);
        assert!(!required.has_default());

        let timeout = schema.node("timeout").unwrap();
        assert!(timeout.has_default());
        assert_eq!(timeout.default, Some(serde_json::json!(60)));
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct WithOptional {
        maybe: Option<String>,
    }

    #[test]
    fn test_optional_rejected() {
        let err = Schema::of::<WithOptional>().unwrap_err();
        assert!(matches!(err, SchemaError::Unsupported { ref field, .. } if field == "maybe"));
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct WithOptionalSection {
        database: Option<Database>,
    }

    #[test]
    fn test_optional_section_rejected() {
        let err = Schema::of::<WithOptionalSection>().unwrap_err();
        assert!(matches!(err, SchemaError::Unsupported { ref field, .. } if field == "database"));
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    #[serde(rename_all = "lowercase")]
    enum Mode {
        Fast,
        Safe,
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct WithEnum {
        mode: Mode,
    }

    #[test]
    fn test_unit_enum_is_text_with_allowed_values() {
        let schema = Schema::of::<WithEnum>().unwrap();
        let node = schema.node("mode").unwrap();
        assert_eq!(node.kind, FieldKind::Text);
        assert_eq!(node.constraints["enum"], serde_json::json!(["fast", "safe"]));
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Recursive {
        name: String,
        child: Box<Recursive>,
    }

    #[test]
    fn test_recursive_rejected() {
        let err = Schema::of::<Recursive>().unwrap_err();
        assert!(matches!(err, SchemaError::Unsupported { ref field, .. } if field == "child"));
    }

    #[test]
    fn test_non_object_rejected() {
        let err = Schema::of::<String>().unwrap_err();
        assert!(matches!(err, SchemaError::NotAnObject { .. }));
    }

    #[test]
    fn test_kind_tag_display() {
        assert_eq!(KindTag::Boolean.to_string(), "boolean");
        assert_eq!(KindTag::Nested.to_string(), "nested schema");
    }
}
