//! Resolution of chained `op://` references.
//!
//! The depth bound is the only defense against reference cycles: there is no
//! visited set, a cycle simply runs into the limit.

use tracing::debug;

use crate::error::HydrationError;
use crate::store::SecretStore;
use crate::utils::is_reference;

/// Maximum number of reference hops followed for a single value.
pub const MAX_REFERENCE_DEPTH: usize = 10;

/// Per-field resolution state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionContext {
    depth: usize,
    chain: Vec<String>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of hops taken so far.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// References visited so far, in order.
    pub fn chain(&self) -> &[String] {
        &self.chain
    }
}

/// Follow `value` through the store until it is no longer a reference.
///
/// Each hop is a separate store call. A chain of exactly [`MAX_REFERENCE_DEPTH`]
/// hops succeeds; needing one more fails with
/// [`HydrationError::ReferenceDepthExceeded`].
pub async fn resolve<S>(
    path: &str,
    value: &str,
    ctx: &mut ResolutionContext,
    store: &S,
) -> Result<String, HydrationError>
where
    S: SecretStore + ?Sized,
{
    let mut current = value.to_string();
    while is_reference(&current) {
        if ctx.depth >= MAX_REFERENCE_DEPTH {
            ctx.chain.push(current);
            return Err(HydrationError::ReferenceDepthExceeded {
                path: path.to_string(),
                limit: MAX_REFERENCE_DEPTH,
                chain: ctx.chain.clone(),
            });
        }
        debug!(field = path, depth = ctx.depth, "resolving secret reference");
        let next = store.resolve_reference(&current).await?;
        ctx.chain.push(current);
        ctx.depth += 1;
        current = next;
    }
    Ok(current)
}
