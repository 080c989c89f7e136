//! Hydration of a schema from a raw item.
//!
//! Fields are processed one at a time in declaration order: match, resolve
//! references, coerce, recurse into nested sections. The first error aborts the
//! whole call and nothing partial is returned.

use futures::future::{BoxFuture, FutureExt};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::client::ConnectClient;
use crate::coerce::coerce;
use crate::constructor::{SerdeConstructor, TypedConstructor};
use crate::error::HydrationError;
use crate::item::RawItem;
use crate::matcher::{Scope, SectionMatcher};
use crate::reference::{self, ResolutionContext};
use crate::schema::{FieldKind, Schema, SchemaNode};
use crate::store::SecretStore;

/// Load `T` from item `item` in vault `vault` through a 1Password Connect server.
///
/// The server address comes from `OP_CONNECT_HOST`; `token` is the Connect
/// access token.
pub async fn load_config<T>(token: &str, vault: &str, item: &str) -> Result<T, HydrationError>
where
    T: DeserializeOwned + JsonSchema,
{
    let client = ConnectClient::from_env(token)?;
    load_config_from(&client, vault, item).await
}

/// Load `T` from any [`SecretStore`].
pub async fn load_config_from<T, S>(store: &S, vault: &str, item: &str) -> Result<T, HydrationError>
where
    T: DeserializeOwned + JsonSchema,
    S: SecretStore + ?Sized,
{
    load_with(store, vault, item, &SerdeConstructor).await
}

/// Load `T` from any [`SecretStore`], building the result with `constructor`.
pub async fn load_with<T, S, C>(store: &S, vault: &str, item: &str, constructor: &C) -> Result<T, HydrationError>
where
    T: JsonSchema,
    S: SecretStore + ?Sized,
    C: TypedConstructor<T> + ?Sized,
{
    let schema = Schema::of::<T>()?;
    debug!(schema = schema.name(), vault, item, "loading configuration");
    let raw = store.fetch_item(vault, item).await?;
    hydrate(&schema, &raw, store, constructor).await
}

/// Hydrate `schema` from `item`, resolving references through `store`.
pub async fn hydrate<T, S, C>(schema: &Schema, item: &RawItem, store: &S, constructor: &C) -> Result<T, HydrationError>
where
    S: SecretStore + ?Sized,
    C: TypedConstructor<T> + ?Sized,
{
    debug!(schema = schema.name(), item = %item.title, "hydrating schema");
    let matcher = SectionMatcher::new(item)?;
    let hydrator = Hydrator {
        store,
        matcher: &matcher,
    };

    let fields = match hydrator.object(schema, Scope::Root, "").await {
        Ok(fields) => fields,
        Err(e) => {
            error!(schema = schema.name(), error = %e, "hydration failed");
            return Err(e);
        }
    };
    Ok(constructor.construct(schema, fields)?)
}

struct Hydrator<'h, 'a, S: ?Sized> {
    store: &'h S,
    matcher: &'h SectionMatcher<'a>,
}

impl<'h, 'a, S: SecretStore + ?Sized> Hydrator<'h, 'a, S> {
    fn object<'f>(
        &'f self,
        schema: &'f Schema,
        scope: Scope<'f, 'a>,
        prefix: &'f str,
    ) -> BoxFuture<'f, Result<Map<String, Value>, HydrationError>> {
        async move {
            let mut fields = Map::new();
            for node in schema.nodes() {
                let path = if prefix.is_empty() {
                    node.name.clone()
                } else {
                    format!("{}.{}", prefix, node.name)
                };
                if let Some(value) = self.node(node, scope, &path).await? {
                    fields.insert(node.name.clone(), value);
                }
            }
            Ok(fields)
        }
        .boxed()
    }

    /// Value for one node, `None` when it is left for the constructor's own default.
    async fn node(&self, node: &SchemaNode, scope: Scope<'_, 'a>, path: &str) -> Result<Option<Value>, HydrationError> {
        if let FieldKind::Nested(nested) = &node.kind {
            return match self.matcher.section(&node.name) {
                Some(section) => {
                    debug!(field = path, section = section.title(), "hydrating nested section");
                    let fields = self.object(nested, Scope::Section(section), path).await?;
                    Ok(Some(Value::Object(fields)))
                }
                None if node.has_default() => {
                    debug!(field = path, "no section found, using default");
                    Ok(node.default.clone())
                }
                None => Err(HydrationError::MissingSection {
                    path: path.to_string(),
                    section: node.name.clone(),
                }),
            };
        }

        match self.matcher.field(scope, &node.name)? {
            Some(raw) => {
                debug!(field = path, "hydrating field");
                let mut ctx = ResolutionContext::new();
                let literal = reference::resolve(path, &raw.value, &mut ctx, self.store).await?;
                Ok(Some(coerce(path, &literal, &node.kind)?))
            }
            None if node.has_default() => {
                debug!(field = path, "field not found, using default");
                Ok(node.default.clone())
            }
            None => Err(HydrationError::MissingField {
                path: path.to_string(),
                scope: scope.describe(),
            }),
        }
    }
}
