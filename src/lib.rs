//! op-hydrate: typed configuration hydrated from 1Password items.
//!
//! A configuration type derives `serde::Deserialize` and `schemars::JsonSchema`.
//! Its fields are matched by normalized name against the fields and sections of
//! a secrets-manager item, `op://` references are followed, and string values are
//! coerced to the declared field types before the value is constructed.

pub mod client;
pub mod coerce;
pub mod constructor;
pub mod env_config;
pub mod error;
pub mod file_config;
pub mod hydrate;
pub mod item;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod reference;
pub mod schema;
pub mod schema_validator;
pub mod settings;
pub mod store;
pub mod utils;

pub use client::ConnectClient;
pub use constructor::{SerdeConstructor, TypedConstructor};
pub use error::{
    CoercionError, HydrationError, SchemaError, SourceError, StoreError, ValidationError, Violation,
};
pub use hydrate::{hydrate, load_config, load_config_from, load_with};
pub use item::{RawField, RawItem, RawSection};
pub use logging::configure_logging;
pub use models::{Environment, PostgresConfig, PostgresSslMode, SentryConfig, Secret};
pub use reference::{ResolutionContext, MAX_REFERENCE_DEPTH};
pub use schema::{decimal_schema, FieldKind, KindTag, Schema, SchemaNode};
pub use settings::{
    hydrate_settings, hydrate_settings_from, load_settings, resolve_value, Settings, SettingsConstructor,
    SettingsSources, SourceKind, SourceMode, SourceValue,
};
pub use store::{MemoryStore, SecretStore};
pub use utils::{normalize, NormalizedKey};
