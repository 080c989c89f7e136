//! Error types for hydration and its collaborators.

use std::fmt;

use thiserror::Error;

use crate::schema::KindTag;

/// Marker included in every depth-exceeded message, so operators can grep for
/// runaway reference chains separately from ordinary store failures.
pub const REFERENCE_DEPTH_MARKER: &str = "REFERENCE_DEPTH_EXCEEDED";

/// Top-level error for a single hydration call. Every variant is fatal.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HydrationError {
    #[error("no section '{section}' found for nested field '{path}'")]
    MissingSection { path: String, section: String },

    #[error("field '{path}' not found in {scope} and has no default")]
    MissingField { path: String, scope: String },

    #[error("naming collision in {scope}: {titles:?} all normalize to '{key}'")]
    FieldCollision {
        scope: String,
        key: String,
        titles: Vec<String>,
    },

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(
        "REFERENCE_DEPTH_EXCEEDED: field '{path}' followed more than {limit} op:// references (chain: {})",
        .chain.join(" -> ")
    )]
    ReferenceDepthExceeded {
        path: String,
        limit: usize,
        chain: Vec<String>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Failure to convert a resolved string into the declared field kind.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("cannot coerce field '{path}' value '{raw}' to {target}: {reason}")]
pub struct CoercionError {
    pub path: String,
    pub raw: String,
    pub target: KindTag,
    pub reason: String,
}

/// Errors raised by a [`crate::store::SecretStore`]. Passed through untouched.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("vault '{0}' not found")]
    VaultNotFound(String),

    #[error("item '{item}' not found in vault '{vault}'")]
    ItemNotFound { vault: String, item: String },

    #[error("field '{field}' not found for reference '{reference}'")]
    FieldNotFound { reference: String, field: String },

    #[error("malformed secret reference '{0}'")]
    InvalidReference(String),

    #[error("secret store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("secret store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("secret store misconfigured: {0}")]
    Config(String),
}

/// Raised while introspecting a schema type.
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum SchemaError {
    #[error("field '{field}' has an unsupported type: {reason}")]
    Unsupported { field: String, reason: String },

    #[error("schema '{schema}' is not an object with named fields")]
    NotAnObject { schema: String },

    #[error("unresolvable schema reference '{0}'")]
    DanglingReference(String),

    #[error("could not serialize the JSON schema of '{schema}': {message}")]
    Serialization { schema: String, message: String },
}

/// One violated constraint found by a [`crate::constructor::TypedConstructor`].
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Final construction of a schema type failed.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("validation failed for '{schema}': {}", format_violations(.violations))]
pub struct ValidationError {
    pub schema: String,
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(schema: &str, violations: Vec<Violation>) -> Self {
        Self {
            schema: schema.to_string(),
            violations,
        }
    }

    pub fn single(schema: &str, path: &str, message: impl Into<String>) -> Self {
        Self::new(
            schema,
            vec![Violation {
                path: path.to_string(),
                message: message.into(),
            }],
        )
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors while gathering settings sources (env, `.env`, secrets directory).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    #[error("failed to read override file {path}: {message}")]
    OverrideFile { path: String, message: String },

    #[error("failed to read secrets directory {path}: {source}")]
    SecretsDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
