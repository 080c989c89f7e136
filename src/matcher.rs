//! Matching of schema fields against an item's sections and fields.
//!
//! Every scope (the unsectioned root fields and each section) is indexed by
//! normalized title up front. Two titles normalizing to the same key inside one
//! scope, or two sections with the same normalized title, abort hydration even if
//! no schema field would ever look them up.

use std::collections::HashMap;

use crate::error::HydrationError;
use crate::item::{RawField, RawItem};
use crate::utils::{normalize, NormalizedKey};

const ROOT_SCOPE: &str = "item root";

/// Fields of one scope, indexed by normalized title.
#[derive(Debug)]
pub struct ScopeIndex<'a> {
    title: Option<&'a str>,
    fields: HashMap<NormalizedKey, &'a RawField>,
}

impl<'a> ScopeIndex<'a> {
    fn build(title: Option<&'a str>, fields: &'a [RawField]) -> Result<Self, HydrationError> {
        let mut index: HashMap<NormalizedKey, &'a RawField> = HashMap::with_capacity(fields.len());
        for field in fields {
            let key = normalize(&field.title);
            if let Some(existing) = index.get(&key) {
                return Err(HydrationError::FieldCollision {
                    scope: describe(title),
                    key: key.to_string(),
                    titles: vec![existing.title.clone(), field.title.clone()],
                });
            }
            index.insert(key, field);
        }
        Ok(Self { title, fields: index })
    }

    /// Section title, `None` for the root scope.
    pub fn title(&self) -> Option<&'a str> {
        self.title
    }

    pub fn describe(&self) -> String {
        describe(self.title)
    }

    fn get(&self, key: &NormalizedKey) -> Option<&'a RawField> {
        self.fields.get(key).copied()
    }
}

fn describe(title: Option<&str>) -> String {
    match title {
        Some(title) => format!("section '{}'", title),
        None => ROOT_SCOPE.to_string(),
    }
}

/// Where a leaf lookup happens.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'m, 'a> {
    /// Fields of a root-level schema: unsectioned fields and every section.
    Root,
    Section(&'m ScopeIndex<'a>),
}

impl Scope<'_, '_> {
    pub fn describe(&self) -> String {
        match self {
            Scope::Root => ROOT_SCOPE.to_string(),
            Scope::Section(section) => section.describe(),
        }
    }
}

/// Index over one raw item.
#[derive(Debug)]
pub struct SectionMatcher<'a> {
    root: ScopeIndex<'a>,
    sections: Vec<(NormalizedKey, ScopeIndex<'a>)>,
}

impl<'a> SectionMatcher<'a> {
    /// Index `item`, failing on any naming collision.
    pub fn new(item: &'a RawItem) -> Result<Self, HydrationError> {
        let root = ScopeIndex::build(None, &item.fields)?;

        let mut sections: Vec<(NormalizedKey, ScopeIndex<'a>)> = Vec::with_capacity(item.sections.len());
        for section in &item.sections {
            let key = normalize(&section.title);
            // Untitled sections cannot be addressed by name, only searched from the root scope.
            if !key.as_str().is_empty() {
                if let Some((_, existing)) = sections.iter().find(|(k, _)| *k == key) {
                    return Err(HydrationError::FieldCollision {
                        scope: "item sections".to_string(),
                        key: key.to_string(),
                        titles: vec![
                            existing.title().unwrap_or_default().to_string(),
                            section.title.clone(),
                        ],
                    });
                }
            }
            sections.push((key, ScopeIndex::build(Some(section.title.as_str()), &section.fields)?));
        }

        Ok(Self { root, sections })
    }

    /// Section whose normalized title equals the normalized `field_name`.
    pub fn section(&self, field_name: &str) -> Option<&ScopeIndex<'a>> {
        let key = normalize(field_name);
        if key.as_str().is_empty() {
            return None;
        }
        self.sections
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, index)| index)
    }

    /// Raw field matching `field_name` within `scope`.
    ///
    /// In the root scope the unsectioned fields are searched first, then every
    /// section; more than one candidate is a collision.
    pub fn field(&self, scope: Scope<'_, 'a>, field_name: &str) -> Result<Option<&'a RawField>, HydrationError> {
        let key = normalize(field_name);
        match scope {
            Scope::Section(section) => Ok(section.get(&key)),
            Scope::Root => {
                let candidates: Vec<(&ScopeIndex<'a>, &'a RawField)> = std::iter::once(&self.root)
                    .chain(self.sections.iter().map(|(_, index)| index))
                    .filter_map(|index| index.get(&key).map(|field| (index, field)))
                    .collect();
                match candidates.as_slice() {
                    [] => Ok(None),
                    [(_, field)] => Ok(Some(*field)),
                    many => Err(HydrationError::FieldCollision {
                        scope: ROOT_SCOPE.to_string(),
                        key: key.to_string(),
                        titles: many
                            .iter()
                            .map(|(index, field)| format!("{} in {}", field.title, index.describe()))
                            .collect(),
                    }),
                }
            }
        }
    }
}
