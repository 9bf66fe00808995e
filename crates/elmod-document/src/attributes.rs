//! Attributes of an `<element>` definition node and their defaults.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Encapsulation mode of a component's shadow root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowMode {
    /// Root reachable from outside through `element.shadowRoot` (default)
    #[default]
    Open,
    /// Root reachable only through the element's internals
    Closed,
}

impl ShadowMode {
    /// The attribute / `ShadowRootInit.mode` spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ShadowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShadowMode {
    type Err = AttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            _ => Err(AttributeError::InvalidShadowMode(s.to_string())),
        }
    }
}

/// Attributes read from a definition node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DefinitionAttributes {
    /// Custom element tag name (`name`); empty values count as absent
    pub name: Option<String>,

    /// Whether the definition carries the `export` attribute
    pub export: bool,

    /// Raw `shadowmode` value, validated lazily
    pub shadow_mode: Option<String>,
}

impl DefinitionAttributes {
    /// Build from `(name, value)` attribute pairs as the parser reports them.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut attributes = Self::default();

        for (name, value) in pairs {
            match name {
                "name" if !value.is_empty() => attributes.name = Some(value.to_string()),
                "export" => attributes.export = !value.eq_ignore_ascii_case("false"),
                "shadowmode" => attributes.shadow_mode = Some(value.to_string()),
                _ => {}
            }
        }

        attributes
    }

    /// Resolved shadow mode; `open` when the attribute is absent.
    pub fn shadow_mode(&self) -> Result<ShadowMode, AttributeError> {
        match &self.shadow_mode {
            Some(raw) => raw.parse(),
            None => Ok(ShadowMode::default()),
        }
    }
}

/// Errors from validating definition attributes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributeError {
    #[error("Invalid shadowmode \"{0}\": expected \"open\" or \"closed\"")]
    InvalidShadowMode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_known_attributes() {
        let attributes = DefinitionAttributes::from_pairs([
            ("name", "say-hi"),
            ("export", ""),
            ("shadowmode", "closed"),
            ("class", "ignored"),
        ]);

        assert_eq!(attributes.name.as_deref(), Some("say-hi"));
        assert!(attributes.export);
        assert_eq!(attributes.shadow_mode(), Ok(ShadowMode::Closed));
    }

    #[test]
    fn defaults_to_open_and_unexported() {
        let attributes = DefinitionAttributes::from_pairs([("name", "x-a")]);

        assert!(!attributes.export);
        assert_eq!(attributes.shadow_mode(), Ok(ShadowMode::Open));
    }

    #[test]
    fn empty_name_counts_as_absent() {
        let attributes = DefinitionAttributes::from_pairs([("name", "")]);

        assert!(attributes.name.is_none());
    }

    #[test]
    fn export_false_is_not_exported() {
        let attributes = DefinitionAttributes::from_pairs([("export", "false")]);

        assert!(!attributes.export);
    }

    #[test]
    fn shadow_mode_is_case_insensitive() {
        assert_eq!("Closed".parse::<ShadowMode>(), Ok(ShadowMode::Closed));
        assert_eq!(" open ".parse::<ShadowMode>(), Ok(ShadowMode::Open));
    }

    #[test]
    fn rejects_unknown_shadow_mode() {
        let attributes = DefinitionAttributes::from_pairs([("shadowmode", "sealed")]);

        assert_eq!(
            attributes.shadow_mode(),
            Err(AttributeError::InvalidShadowMode("sealed".to_string()))
        );
    }
}
