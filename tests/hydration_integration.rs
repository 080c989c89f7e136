//! End-to-end hydration against an in-memory store.

use std::collections::{BTreeMap, HashSet};

use op_hydrate::{
    decimal_schema, load_config_from, HydrationError, MemoryStore, RawItem, RawSection, SchemaError, StoreError,
};
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
struct Database {
    host: String,
    port: u16,
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
struct AppConfig {
    database: Database,
    debug: bool,
}

fn app_item() -> RawItem {
    RawItem::new("app")
        .with_field("DEBUG", "on")
        .with_section(
            RawSection::new("Database")
                .with_field("host", "op://v/i/f")
                .with_field("port", "5432"),
        )
}

#[tokio::test]
async fn hydrates_nested_section_with_reference() {
    let store = MemoryStore::new()
        .with_item("v", app_item())
        .with_reference("op://v/i/f", "db.internal");

    let config: AppConfig = load_config_from(&store, "v", "app").await.unwrap();
    assert_eq!(
        config,
        AppConfig {
            database: Database {
                host: "db.internal".to_string(),
                port: 5432,
            },
            debug: true,
        }
    );
    assert_eq!(store.resolution_count(), 1);
}

#[tokio::test]
async fn unknown_vault_and_item_pass_through() {
    let store = MemoryStore::new().with_item("v", app_item());

    let err = load_config_from::<AppConfig, _>(&store, "missing", "app").await.unwrap_err();
    assert!(matches!(err, HydrationError::Store(StoreError::VaultNotFound(ref v)) if v == "missing"));

    let err = load_config_from::<AppConfig, _>(&store, "v", "nope").await.unwrap_err();
    assert!(matches!(err, HydrationError::Store(StoreError::ItemNotFound { .. })));
}

#[tokio::test]
async fn empty_section_fails_on_required_field() {
    let item = RawItem::new("app")
        .with_field("debug", "false")
        .with_section(RawSection::new("database"));
    let store = MemoryStore::new().with_item("v", item);

    let err = load_config_from::<AppConfig, _>(&store, "v", "app").await.unwrap_err();
    match err {
        HydrationError::MissingField { path, scope } => {
            assert_eq!(path, "database.host");
            assert_eq!(scope, "section 'database'");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

fn default_db_port() -> u16 {
    5432
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
struct DbDefaults {
    #[serde(default = "default_db_port")]
    port: u16,
    #[serde(default)]
    verbose: bool,
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
struct DefaultsConfig {
    db: DbDefaults,
}

#[tokio::test]
async fn empty_section_takes_every_default() {
    let item = RawItem::new("app").with_section(RawSection::new("db"));
    let store = MemoryStore::new().with_item("v", item);

    let config: DefaultsConfig = load_config_from(&store, "v", "app").await.unwrap();
    assert_eq!(
        config,
        DefaultsConfig {
            db: DbDefaults {
                port: 5432,
                verbose: false,
            },
        }
    );
}

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct Narrow {
    n: u8,
    tags: Vec<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct NarrowConfig {
    limits: Narrow,
    retries: u8,
}

#[tokio::test]
async fn out_of_range_integers_name_their_field() {
    let item = RawItem::new("app")
        .with_field("retries", "300")
        .with_section(
            RawSection::new("limits")
                .with_field("n", "7")
                .with_field("tags", r#"["x"]"#),
        );
    let store = MemoryStore::new().with_item("v", item);

    let err = load_config_from::<NarrowConfig, _>(&store, "v", "app").await.unwrap_err();
    match err {
        HydrationError::Validation(err) => {
            let paths: Vec<&str> = err.violations.iter().map(|v| v.path.as_str()).collect();
            assert_eq!(paths, vec!["limits.tags[0]", "retries"]);
            assert!(err.violations[1].message.contains("uint8"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn boolean_table_accepts_any_case() {
    for (raw, expected) in [
        ("TRUE", true),
        ("Yes", true),
        (" on ", true),
        ("1", true),
        ("False", false),
        ("NO", false),
        ("off", false),
        ("0", false),
    ] {
        let item = RawItem::new("app").with_field("debug", raw).with_section(
            RawSection::new("database")
                .with_field("host", "h")
                .with_field("port", "1"),
        );
        let store = MemoryStore::new().with_item("v", item);
        let config: AppConfig = load_config_from(&store, "v", "app").await.unwrap();
        assert_eq!(config.debug, expected, "raw value {raw:?}");
    }
}

#[tokio::test]
async fn unknown_boolean_is_a_coercion_error() {
    let item = RawItem::new("app").with_field("debug", "enabled").with_section(
        RawSection::new("database")
            .with_field("host", "h")
            .with_field("port", "1"),
    );
    let store = MemoryStore::new().with_item("v", item);
    let err = load_config_from::<AppConfig, _>(&store, "v", "app").await.unwrap_err();
    assert!(matches!(err, HydrationError::Coercion(ref e) if e.path == "debug" && e.raw == "enabled"));
}

#[derive(Debug, Deserialize, JsonSchema)]
struct Pricing {
    #[schemars(schema_with = "decimal_schema")]
    unit_price: String,
    tiers: BTreeMap<String, u32>,
    regions: HashSet<String>,
    weight: f64,
}

#[tokio::test]
async fn collections_and_numbers() {
    let item = RawItem::new("pricing")
        .with_field("unit-price", "19.990")
        .with_field("tiers", r#"{"basic": 1, "pro": 5}"#)
        .with_field("regions", r#"["eu", "us", "eu"]"#)
        .with_field("weight", "0.5");
    let store = MemoryStore::new().with_item("v", item);

    let pricing: Pricing = load_config_from(&store, "v", "pricing").await.unwrap();
    assert_eq!(pricing.unit_price, "19.990");
    assert_eq!(pricing.tiers["pro"], 5);
    assert_eq!(pricing.regions.len(), 2);
    assert_eq!(pricing.weight, 0.5);
}

#[tokio::test]
async fn invalid_decimal_is_rejected() {
    let item = RawItem::new("pricing")
        .with_field("unit_price", "nineteen")
        .with_field("tiers", "{}")
        .with_field("regions", "[]")
        .with_field("weight", "1");
    let store = MemoryStore::new().with_item("v", item);
    let err = load_config_from::<Pricing, _>(&store, "v", "pricing").await.unwrap_err();
    assert!(matches!(err, HydrationError::Coercion(ref e) if e.path == "unit_price"));
}

#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct WithOptional {
    token: Option<String>,
}

#[tokio::test]
async fn optional_fields_are_rejected_up_front() {
    let store = MemoryStore::new().with_item("v", RawItem::new("app"));
    let err = load_config_from::<WithOptional, _>(&store, "v", "app").await.unwrap_err();
    assert!(matches!(err, HydrationError::Schema(SchemaError::Unsupported { ref field, .. }) if field == "token"));
}
