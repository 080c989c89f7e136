//! Store-agnostic view of a secrets-manager item.

use serde::{Deserialize, Serialize};

/// A single titled string value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawField {
    pub title: String,
    pub value: String,
}

impl RawField {
    pub fn new(title: &str, value: &str) -> Self {
        Self {
            title: title.to_string(),
            value: value.to_string(),
        }
    }
}

/// A named group of fields inside an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSection {
    pub title: String,
    #[serde(default)]
    pub fields: Vec<RawField>,
}

impl RawSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, title: &str, value: &str) -> Self {
        self.fields.push(RawField::new(title, value));
        self
    }
}

/// An item as fetched from the store: unsectioned root fields plus sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: Vec<RawField>,
    #[serde(default)]
    pub sections: Vec<RawSection>,
}

impl RawItem {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    /// Add a root-scope field.
    pub fn with_field(mut self, title: &str, value: &str) -> Self {
        self.fields.push(RawField::new(title, value));
        self
    }

    pub fn with_section(mut self, section: RawSection) -> Self {
        self.sections.push(section);
        self
    }
}
