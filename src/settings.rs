//! Settings source prioritization.
//!
//! A settings type can draw each field from four sources: init parameters
//! (the hydrated values), environment variables, the `.env` override file and a
//! secrets directory. The first source in the active order that defines a field
//! wins; partial structures are never merged.
//!
//! Standard order is init > environment > override file > file secrets. Setting
//! `OP_HYDRATE_DEV_MODE` to any non-empty value switches to developer order,
//! override file > environment > init > file secrets, so a local `.env` can
//! shadow what the secrets manager returns.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::client::ConnectClient;
use crate::coerce::coerce;
use crate::constructor::{SerdeConstructor, TypedConstructor};
use crate::env_config::{collect_env_values, collect_env_values_with_env};
use crate::error::{HydrationError, SourceError, ValidationError, Violation};
use crate::file_config::{load_override_file, load_secrets_dir, DEFAULT_OVERRIDE_FILE};
use crate::hydrate::load_with;
use crate::schema::{FieldKind, Schema, SchemaNode};
use crate::store::SecretStore;

/// Environment variable switching to developer source order.
pub const DEV_MODE_ENV: &str = "OP_HYDRATE_DEV_MODE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Init,
    Environment,
    OverrideFile,
    FileSecrets,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Init => "init parameters",
            SourceKind::Environment => "environment",
            SourceKind::OverrideFile => "override file",
            SourceKind::FileSecrets => "file secrets",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMode {
    #[default]
    Standard,
    Developer,
}

impl SourceMode {
    /// Sources in descending priority.
    pub fn order(self) -> [SourceKind; 4] {
        match self {
            SourceMode::Standard => [
                SourceKind::Init,
                SourceKind::Environment,
                SourceKind::OverrideFile,
                SourceKind::FileSecrets,
            ],
            SourceMode::Developer => [
                SourceKind::OverrideFile,
                SourceKind::Environment,
                SourceKind::Init,
                SourceKind::FileSecrets,
            ],
        }
    }

    /// Mode selected by the current process environment.
    pub fn from_env() -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::from_env_with(&env)
    }

    /// Mode selected by a provided env map.
    pub fn from_env_with(env: &HashMap<String, String>) -> Self {
        if env.get(DEV_MODE_ENV).is_some_and(|v| !v.is_empty()) {
            warn!("developer mode is ENABLED, override file takes precedence");
            SourceMode::Developer
        } else {
            debug!("developer mode is disabled");
            SourceMode::Standard
        }
    }
}

/// A value found in one source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    /// Already typed, from init parameters.
    Typed(Value),
    /// A string still to be coerced to the field's kind.
    Raw(String),
}

/// The four settings sources for one settings type.
///
/// Environment, override-file and secrets keys are stored lowercased with the
/// settings prefix removed. Init keys are exact field names.
#[derive(Debug, Clone, Default)]
pub struct SettingsSources {
    init: Map<String, Value>,
    env: HashMap<String, String>,
    override_file: HashMap<String, String>,
    file_secrets: HashMap<String, String>,
}

impl SettingsSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment variables plus `./.env`, both filtered by `prefix`.
    pub fn from_process(prefix: &str) -> Result<Self, SourceError> {
        Self::new()
            .with_process_env(prefix)
            .with_override_file(Path::new(DEFAULT_OVERRIDE_FILE), prefix)
    }

    /// Same as [`SettingsSources::from_process`], reading variables from a provided env map.
    pub fn from_process_with_env(prefix: &str, env: &HashMap<String, String>) -> Result<Self, SourceError> {
        Self::new()
            .with_env_vars(prefix, env)
            .with_override_file(Path::new(DEFAULT_OVERRIDE_FILE), prefix)
    }

    pub fn with_init(mut self, init: Map<String, Value>) -> Self {
        self.init = init;
        self
    }

    /// Environment source taken from the current process environment.
    pub fn with_process_env(mut self, prefix: &str) -> Self {
        self.env = collect_env_values(prefix);
        self
    }

    pub fn with_env_vars(mut self, prefix: &str, env: &HashMap<String, String>) -> Self {
        self.env = collect_env_values_with_env(prefix, env);
        self
    }

    pub fn with_override_file(mut self, path: &Path, prefix: &str) -> Result<Self, SourceError> {
        self.override_file = load_override_file(path, prefix)?;
        Ok(self)
    }

    pub fn with_secrets_dir(mut self, dir: &Path, prefix: &str) -> Result<Self, SourceError> {
        self.file_secrets = load_secrets_dir(dir, prefix)?;
        Ok(self)
    }

    /// Value of `field` in one source.
    pub fn get(&self, kind: SourceKind, field: &str) -> Option<SourceValue> {
        let raw = |values: &HashMap<String, String>| values.get(&field.to_lowercase()).cloned().map(SourceValue::Raw);
        match kind {
            SourceKind::Init => self.init.get(field).cloned().map(SourceValue::Typed),
            SourceKind::Environment => raw(&self.env),
            SourceKind::OverrideFile => raw(&self.override_file),
            SourceKind::FileSecrets => raw(&self.file_secrets),
        }
    }

    /// First value of `field` in `mode`'s order.
    pub fn resolve_value(&self, field: &str, mode: SourceMode) -> Option<(SourceKind, SourceValue)> {
        mode.order()
            .into_iter()
            .find_map(|kind| self.get(kind, field).map(|value| (kind, value)))
    }
}

/// First value of `field` across `sources`, in developer order when `dev_mode` is set.
pub fn resolve_value(field: &str, sources: &SettingsSources, dev_mode: bool) -> Option<(SourceKind, SourceValue)> {
    let mode = if dev_mode {
        SourceMode::Developer
    } else {
        SourceMode::Standard
    };
    sources.resolve_value(field, mode)
}

/// A configuration type loaded through prioritized settings sources.
pub trait Settings: DeserializeOwned + JsonSchema {
    /// Prefix of environment variables and override-file keys for this type.
    const ENV_PREFIX: &'static str = "";
}

/// Builds a settings type by picking each field from the prioritized sources.
///
/// The hydrated fields become the init source.
#[derive(Debug, Clone, Default)]
pub struct SettingsConstructor {
    sources: SettingsSources,
    mode: Option<SourceMode>,
}

impl SettingsConstructor {
    /// The source mode is read from the environment on every construction.
    pub fn new(sources: SettingsSources) -> Self {
        Self { sources, mode: None }
    }

    /// Pin the source mode instead of reading it from the environment.
    pub fn with_mode(mut self, mode: SourceMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

impl<T: DeserializeOwned> TypedConstructor<T> for SettingsConstructor {
    fn construct(&self, schema: &Schema, fields: Map<String, Value>) -> Result<T, ValidationError> {
        let sources = self.sources.clone().with_init(fields);
        let mode = self.mode.unwrap_or_else(SourceMode::from_env);

        let mut selected = Map::new();
        let mut violations = Vec::new();
        for node in schema.nodes() {
            let Some((kind, value)) = sources.resolve_value(&node.name, mode) else {
                continue;
            };
            debug!(field = %node.name, source = %kind, "settings value selected");
            match value {
                SourceValue::Typed(value) => {
                    selected.insert(node.name.clone(), value);
                }
                SourceValue::Raw(raw) => match raw_value(node, &raw) {
                    Ok(value) => {
                        selected.insert(node.name.clone(), value);
                    }
                    Err(message) => violations.push(Violation {
                        path: node.name.clone(),
                        message: format!("{} (from {})", message, kind),
                    }),
                },
            }
        }

        if !violations.is_empty() {
            return Err(ValidationError::new(schema.name(), violations));
        }
        SerdeConstructor.construct(schema, selected)
    }
}

fn raw_value(node: &SchemaNode, raw: &str) -> Result<Value, String> {
    match &node.kind {
        FieldKind::Nested(_) => match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => Ok(value),
            Ok(other) => Err(format!("expected a JSON object, got {}", other)),
            Err(e) => Err(format!("invalid JSON: {}", e)),
        },
        kind => coerce(&node.name, raw, kind).map_err(|e| e.to_string()),
    }
}

/// Load `T` from the process environment, `./.env` and nothing else.
pub fn load_settings<T: Settings>() -> Result<T, HydrationError> {
    let schema = Schema::of::<T>()?;
    let sources = SettingsSources::from_process(T::ENV_PREFIX)?;
    Ok(SettingsConstructor::new(sources).construct(&schema, Map::new())?)
}

/// Hydrate `T` from a Connect item, then apply the settings source order.
pub async fn hydrate_settings<T: Settings>(token: &str, vault: &str, item: &str) -> Result<T, HydrationError> {
    let client = ConnectClient::from_env(token)?;
    hydrate_settings_from(&client, vault, item).await
}

/// Hydrate `T` from any [`SecretStore`], then apply the settings source order.
pub async fn hydrate_settings_from<T, S>(store: &S, vault: &str, item: &str) -> Result<T, HydrationError>
where
    T: Settings,
    S: SecretStore + ?Sized,
{
    let sources = SettingsSources::from_process(T::ENV_PREFIX)?;
    load_with(store, vault, item, &SettingsConstructor::new(sources)).await
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn all_sources() -> SettingsSources {
        let mut sources = SettingsSources::new()
            .with_init(json!({"host": "from-init"}).as_object().cloned().unwrap())
            .with_env_vars("", &make_env(&[("HOST", "from-env")]));
        sources.override_file.insert("host".to_string(), "from-dotenv".to_string());
        sources.file_secrets.insert("host".to_string(), "from-secrets".to_string());
        sources
    }

    #[test]
    fn test_standard_order() {
        let (kind, value) = resolve_value("host", &all_sources(), false).unwrap();
        assert_eq!(kind, SourceKind::Init);
        assert_eq!(value, SourceValue::Typed(json!("from-init")));
    }

    #[test]
    fn test_developer_order() {
        let (kind, value) = resolve_value("host", &all_sources(), true).unwrap();
        assert_eq!(kind, SourceKind::OverrideFile);
        assert_eq!(value, SourceValue::Raw("from-dotenv".to_string()));
    }

    #[test]
    fn test_falls_through_to_lower_sources() {
        let mut sources = SettingsSources::new();
        sources.file_secrets.insert("host".to_string(), "from-secrets".to_string());
        let (kind, _) = resolve_value("host", &sources, false).unwrap();
        assert_eq!(kind, SourceKind::FileSecrets);
        let (kind, _) = resolve_value("host", &sources, true).unwrap();
        assert_eq!(kind, SourceKind::FileSecrets);
        assert!(resolve_value("port", &sources, false).is_none());
    }

    #[test]
    fn test_environment_lookup_is_case_insensitive() {
        let sources = SettingsSources::new().with_env_vars("", &make_env(&[("PGHOST", "db")]));
        let (kind, value) = sources.resolve_value("PGHOST", SourceMode::Standard).unwrap();
        assert_eq!(kind, SourceKind::Environment);
        assert_eq!(value, SourceValue::Raw("db".to_string()));
    }

    #[test]
    fn test_process_env_source() {
        std::env::set_var("OPHYDRATE_SETTINGS_TEST_HOST", "process-host");
        let sources = SettingsSources::new().with_process_env("OPHYDRATE_SETTINGS_TEST_");
        let (kind, value) = sources.resolve_value("host", SourceMode::Standard).unwrap();
        assert_eq!(kind, SourceKind::Environment);
        assert_eq!(value, SourceValue::Raw("process-host".to_string()));
    }

    #[test]
    fn test_mode_from_env() {
        assert_eq!(SourceMode::from_env_with(&make_env(&[])), SourceMode::Standard);
        assert_eq!(SourceMode::from_env_with(&make_env(&[(DEV_MODE_ENV, "")])), SourceMode::Standard);
        assert_eq!(SourceMode::from_env_with(&make_env(&[(DEV_MODE_ENV, "1")])), SourceMode::Developer);
    }

    #[derive(Debug, PartialEq, Deserialize, JsonSchema)]
    struct Database {
        host: String,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default)]
        verbose: bool,
    }

    fn default_port() -> u16 {
        5432
    }

    #[test]
    fn test_constructor_coerces_raw_values() {
        let schema = Schema::of::<Database>().unwrap();
        let sources = SettingsSources::new().with_env_vars("", &make_env(&[("PORT", "6432"), ("VERBOSE", "yes")]));
        let constructor = SettingsConstructor::new(sources).with_mode(SourceMode::Standard);
        let fields = json!({"host": "db.internal"}).as_object().cloned().unwrap();
        let db: Database = constructor.construct(&schema, fields).unwrap();
        assert_eq!(
            db,
            Database {
                host: "db.internal".to_string(),
                port: 6432,
                verbose: true
            }
        );
    }

    #[test]
    fn test_constructor_reports_bad_raw_value() {
        let schema = Schema::of::<Database>().unwrap();
        let sources = SettingsSources::new().with_env_vars("", &make_env(&[("PORT", "many")]));
        let constructor = SettingsConstructor::new(sources).with_mode(SourceMode::Standard);
        let fields = json!({"host": "db"}).as_object().cloned().unwrap();
        let err = TypedConstructor::<Database>::construct(&constructor, &schema, fields).unwrap_err();
        assert_eq!(err.violations[0].path, "port");
        assert!(err.violations[0].message.contains("environment"));
    }

    #[test]
    fn test_developer_mode_prefers_override_file_over_hydrated_value() {
        let schema = Schema::of::<Database>().unwrap();
        let mut sources = SettingsSources::new();
        sources.override_file.insert("host".to_string(), "localhost".to_string());
        let fields = json!({"host": "db.internal"}).as_object().cloned().unwrap();

        let standard: Database = SettingsConstructor::new(sources.clone())
            .with_mode(SourceMode::Standard)
            .construct(&schema, fields.clone())
            .unwrap();
        assert_eq!(standard.host, "db.internal");

        let developer: Database = SettingsConstructor::new(sources)
            .with_mode(SourceMode::Developer)
            .construct(&schema, fields)
            .unwrap();
        assert_eq!(developer.host, "localhost");
    }
}
