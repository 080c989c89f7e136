//! 1Password Connect client implementing [`SecretStore`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::item::{RawField, RawItem, RawSection};
use crate::store::SecretStore;
use crate::utils::REFERENCE_PREFIX;

/// Environment variable holding the Connect server address.
pub const CONNECT_HOST_ENV: &str = "OP_CONNECT_HOST";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a 1Password Connect server.
#[derive(Debug, Clone)]
pub struct ConnectClient {
    base_url: String,
    token: String,
    timeout: Duration,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct VaultSummary {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ItemSummary {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct ConnectItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    sections: Vec<ConnectSection>,
    #[serde(default)]
    fields: Vec<ConnectField>,
}

#[derive(Debug, Deserialize)]
struct ConnectSection {
    id: String,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectField {
    id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    section: Option<SectionRef>,
}

#[derive(Debug, Deserialize)]
struct SectionRef {
    id: String,
}

impl ConnectField {
    fn title(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    fn matches(&self, name: &str) -> bool {
        self.id == name || self.label.as_deref().is_some_and(|l| l.eq_ignore_ascii_case(name))
    }
}

impl ConnectItem {
    fn section_matches(&self, field: &ConnectField, name: &str) -> bool {
        let Some(section_ref) = &field.section else {
            return false;
        };
        section_ref.id == name
            || self.sections.iter().any(|s| {
                s.id == section_ref.id && s.label.as_deref().is_some_and(|l| l.eq_ignore_ascii_case(name))
            })
    }

    /// Group fields under their sections. Unsectioned fields stay at the root.
    fn into_raw(self) -> RawItem {
        let mut raw = RawItem::new(&self.title);
        let mut positions: HashMap<String, usize> = HashMap::new();
        for section in &self.sections {
            positions.insert(section.id.clone(), raw.sections.len());
            raw.sections
                .push(RawSection::new(section.label.as_deref().unwrap_or_default()));
        }

        for field in &self.fields {
            let value = field.value.clone().unwrap_or_default();
            let entry = RawField::new(field.title(), &value);
            match &field.section {
                None => raw.fields.push(entry),
                Some(section_ref) => {
                    let index = *positions.entry(section_ref.id.clone()).or_insert_with(|| {
                        raw.sections.push(RawSection::new(""));
                        raw.sections.len() - 1
                    });
                    raw.sections[index].fields.push(entry);
                }
            }
        }
        raw
    }
}

/// Parts of an `op://vault/item[/section]/field` reference.
#[derive(Debug, PartialEq)]
struct SecretReference<'r> {
    vault: &'r str,
    item: &'r str,
    section: Option<&'r str>,
    field: &'r str,
}

fn parse_reference(reference: &str) -> Result<SecretReference<'_>, StoreError> {
    let invalid = || StoreError::InvalidReference(reference.to_string());
    let rest = reference.strip_prefix(REFERENCE_PREFIX).ok_or_else(invalid)?;
    let parts: Vec<&str> = rest.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(invalid());
    }
    match *parts.as_slice() {
        [vault, item, field] => Ok(SecretReference {
            vault,
            item,
            section: None,
            field,
        }),
        [vault, item, section, field] => Ok(SecretReference {
            vault,
            item,
            section: Some(section),
            field,
        }),
        _ => Err(invalid()),
    }
}

impl ConnectClient {
    /// Create a client for the Connect server at `host`.
    pub fn new(host: &str, token: &str) -> Result<Self, StoreError> {
        let client = Client::builder().build()?;
        Ok(Self {
            base_url: host.trim_end_matches('/').to_string(),
            token: token.to_string(),
            timeout: DEFAULT_TIMEOUT,
            client,
        })
    }

    /// Create a client for the server named by `OP_CONNECT_HOST`.
    pub fn from_env(token: &str) -> Result<Self, StoreError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::from_env_with(token, &env)
    }

    /// Same as [`ConnectClient::from_env`], reading from a provided env map.
    pub fn from_env_with(token: &str, env: &HashMap<String, String>) -> Result<Self, StoreError> {
        match env.get(CONNECT_HOST_ENV) {
            Some(host) if !host.trim().is_empty() => Self::new(host.trim(), token),
            _ => Err(StoreError::Config(format!("{} is not set", CONNECT_HOST_ENV))),
        }
    }

    /// Per-request timeout. Defaults to 30 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    async fn vault_id(&self, vault: &str) -> Result<String, StoreError> {
        let vaults: Vec<VaultSummary> = self.get("/v1/vaults").await?;
        match vaults.into_iter().find(|v| v.name == vault || v.id == vault) {
            Some(found) => Ok(found.id),
            None => {
                warn!(vault, "vault not found");
                Err(StoreError::VaultNotFound(vault.to_string()))
            }
        }
    }

    async fn connect_item(&self, vault: &str, item: &str) -> Result<ConnectItem, StoreError> {
        let vault_id = self.vault_id(vault).await?;
        let items: Vec<ItemSummary> = self.get(&format!("/v1/vaults/{}/items", vault_id)).await?;
        let Some(summary) = items.into_iter().find(|i| i.title == item || i.id == item) else {
            warn!(vault, item, "item not found");
            return Err(StoreError::ItemNotFound {
                vault: vault.to_string(),
                item: item.to_string(),
            });
        };
        debug!(vault, item, "fetching item");
        self.get(&format!("/v1/vaults/{}/items/{}", vault_id, summary.id))
            .await
    }
}

#[async_trait]
impl SecretStore for ConnectClient {
    async fn fetch_item(&self, vault: &str, item: &str) -> Result<RawItem, StoreError> {
        Ok(self.connect_item(vault, item).await?.into_raw())
    }

    async fn resolve_reference(&self, reference: &str) -> Result<String, StoreError> {
        let parsed = parse_reference(reference)?;
        let item = self.connect_item(parsed.vault, parsed.item).await?;
        let found = item.fields.iter().find(|f| {
            f.matches(parsed.field) && parsed.section.map_or(true, |s| item.section_matches(f, s))
        });
        match found {
            Some(field) => Ok(field.value.clone().unwrap_or_default()),
            None => Err(StoreError::FieldNotFound {
                reference: reference.to_string(),
                field: parsed.field.to_string(),
            }),
        }
    }
}
