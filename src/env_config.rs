//! Environment variable settings source.

use std::collections::HashMap;

/// Collect settings values from the process environment.
///
/// Keys are matched case-insensitively: each name is lowercased and, when
/// `prefix` is non-empty, only variables starting with it are kept, with the
/// prefix stripped.
pub fn collect_env_values(prefix: &str) -> HashMap<String, String> {
    let env: HashMap<String, String> = std::env::vars().collect();
    collect_env_values_with_env(prefix, &env)
}

/// Collect settings values from a provided env map.
pub fn collect_env_values_with_env(prefix: &str, env: &HashMap<String, String>) -> HashMap<String, String> {
    env.iter()
        .filter_map(|(key, value)| strip_prefix(key, prefix).map(|k| (k, value.clone())))
        .collect()
}

/// Lowercased `key` without `prefix`, or `None` if it does not carry the prefix.
pub(crate) fn strip_prefix(key: &str, prefix: &str) -> Option<String> {
    let key = key.to_lowercase();
    let prefix = prefix.to_lowercase();
    let stripped = key.strip_prefix(prefix.as_str())?;
    if stripped.is_empty() {
        return None;
    }
    Some(stripped.to_string())
}
