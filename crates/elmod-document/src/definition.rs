//! Component definitions extracted from an element-module document.

use crate::attributes::{AttributeError, DefinitionAttributes, ShadowMode};

/// One `<element>` definition, in the order it appears in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Position among all definitions in the document (0-indexed)
    pub index: usize,

    /// Attributes of the definition node
    pub attributes: DefinitionAttributes,

    /// Text of the first inline script, if it has any content
    pub script: Option<String>,

    /// Number of scripts detached from the definition
    pub script_count: usize,

    /// Remaining inner markup after scripts were detached
    pub template: String,
}

impl Definition {
    /// Tag name the definition registers under.
    pub fn tag_name(&self) -> Option<&str> {
        self.attributes.name.as_deref()
    }

    /// Whether the definition is marked for export.
    pub fn exported(&self) -> bool {
        self.attributes.export
    }

    /// Encapsulation mode of the definition's root.
    pub fn shadow_mode(&self) -> Result<ShadowMode, AttributeError> {
        self.attributes.shadow_mode()
    }

    /// Camel-cased tag name used as the generated class name.
    pub fn class_name(&self) -> Option<String> {
        self.tag_name().map(to_camel_case)
    }

    /// Check if this definition will be registered at all.
    pub fn is_registrable(&self) -> bool {
        self.tag_name().is_some()
    }
}

/// Convert a tag name to camelCase: every `-` followed by a letter becomes
/// that letter uppercased (`say-hi` -> `sayHi`).
pub fn to_camel_case(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    let mut chars = tag.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '-' {
            if let Some(next) = chars.peek().copied().filter(|n| n.is_ascii_alphabetic()) {
                out.push(next.to_ascii_uppercase());
                chars.next();
                continue;
            }
        }
        out.push(c);
    }

    out
}

/// Camel-cased tag name reduced to a valid JavaScript identifier.
pub fn to_identifier(tag: &str) -> String {
    let mut ident: String = to_camel_case(tag)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }

    ident
}
