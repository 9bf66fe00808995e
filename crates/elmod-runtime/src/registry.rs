//! Element registry mapping tag names to wrapper classes.
//!
//! Mirrors the platform's custom element registry: each tag can be defined
//! once, and a class can only be registered under one tag.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::class::ElementClass;
use crate::element::{Element, ElementError};

/// Names the platform reserves even though they contain a hyphen.
const RESERVED_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// A registry of element classes.
#[derive(Debug, Default)]
pub struct ElementRegistry {
    /// Classes by tag name
    definitions: RwLock<HashMap<String, Arc<ElementClass>>>,
}

impl ElementRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `class` under `tag`.
    pub fn define(&self, tag: &str, class: Arc<ElementClass>) -> Result<(), RegistryError> {
        validate_name(tag)?;

        let mut definitions = self.write();
        if definitions.contains_key(tag) {
            return Err(RegistryError::AlreadyDefined(tag.to_string()));
        }
        if let Some((existing, _)) = definitions
            .iter()
            .find(|(_, defined)| Arc::ptr_eq(defined, &class))
        {
            return Err(RegistryError::ClassAlreadyDefined {
                class: class.name().to_string(),
                tag: existing.clone(),
            });
        }

        definitions.insert(tag.to_string(), class);
        tracing::debug!("Defined <{tag}>");
        Ok(())
    }

    /// Look up the class registered for a tag.
    pub fn get(&self, tag: &str) -> Option<Arc<ElementClass>> {
        self.read().get(tag).cloned()
    }

    /// Check if a tag is defined.
    pub fn contains(&self, tag: &str) -> bool {
        self.read().contains_key(tag)
    }

    /// All defined tag names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Construct a new instance of a defined element.
    pub fn create_element(&self, tag: &str) -> Result<Element, RegistryError> {
        let class = self
            .get(tag)
            .ok_or_else(|| RegistryError::NotDefined(tag.to_string()))?;
        Ok(class.construct(tag)?)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ElementClass>>> {
        self.definitions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<ElementClass>>> {
        self.definitions.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Check that `name` is a valid custom element name.
pub fn validate_name(name: &str) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(invalid("must start with a lowercase ASCII letter"));
    }
    if !name.contains('-') {
        return Err(invalid("must contain a hyphen"));
    }
    if name.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(invalid("must not contain uppercase ASCII letters"));
    }
    if let Some(c) = name.chars().find(|c| !is_name_char(*c)) {
        return Err(invalid(&format!("contains invalid character {c:?}")));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(invalid("is a reserved name"));
    }
    Ok(())
}

fn is_name_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '-' | '.' | '_') || !c.is_ascii()
}

/// Errors that can occur with the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid element name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("<{0}> is already defined")]
    AlreadyDefined(String),

    #[error("Class {class} is already defined as <{tag}>")]
    ClassAlreadyDefined { class: String, tag: String },

    #[error("<{0}> is not defined")]
    NotDefined(String),

    #[error(transparent)]
    Element(#[from] ElementError),
}
