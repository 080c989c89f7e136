//! Name normalization shared by the matcher and the settings sources.

use std::fmt;

/// Prefix marking a value as a secret reference rather than a literal.
pub const REFERENCE_PREFIX: &str = "op://";

/// Canonical, comparable form of a field title, section title or schema field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lowercase everything and turn every `-` into `_`.
///
/// Total and idempotent: `normalize(normalize(x).as_str()) == normalize(x)`.
pub fn normalize(title: &str) -> NormalizedKey {
    let mut out = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch == '-' {
            out.push('_');
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    NormalizedKey(out)
}

/// True when `value` should be resolved through the secret store.
pub fn is_reference(value: &str) -> bool {
    value.starts_with(REFERENCE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hyphen_becomes_underscore() {
        assert_eq!(normalize("Field-Name").as_str(), "field_name");
        assert_eq!(normalize("Multi-Word-Field").as_str(), "multi_word_field");
    }

    #[test]
    fn test_plain_names() {
        assert_eq!(normalize("Simple").as_str(), "simple");
        assert_eq!(normalize("UPPERCASE").as_str(), "uppercase");
        assert_eq!(normalize("already_snake").as_str(), "already_snake");
    }

    #[test]
    fn test_case_and_hyphen_insensitive() {
        let a = normalize("Database-Host");
        let b = normalize("database_host");
        let c = normalize("DATABASE-HOST");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_idempotent() {
        for title in ["Database-Host", "API_KEY", "a-B-c", "", "ÄPFEL-Saft", "--"] {
            let once = normalize(title);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "not idempotent for {title:?}");
        }
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(normalize("").as_str(), "");
    }

    #[test]
    fn test_spaces_are_kept() {
        assert_eq!(normalize("Section One").as_str(), "section one");
    }

    #[test]
    fn test_is_reference() {
        assert!(is_reference("op://vault/item/field"));
        assert!(!is_reference("plain_value"));
        assert!(!is_reference("OP://vault/item/field"));
        assert!(!is_reference(" op://vault/item/field"));
    }
}
