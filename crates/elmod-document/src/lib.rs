//! Element-module document parsing.
//!
//! This crate parses HTML documents containing `<element>` definitions and
//! extracts, for each one, its tag name, encapsulation mode, inline behavior
//! script and template markup. It also provides the owned node tree that
//! rendered templates are built from.

pub mod attributes;
pub mod definition;
pub mod node;
pub mod parser;

pub use attributes::{AttributeError, DefinitionAttributes, ShadowMode};
pub use definition::{to_camel_case, to_identifier, Definition};
pub use node::{parse_fragment, to_html, Node};
pub use parser::{parse_element_module, ParseError, ParsedDocument, DEFINITION_TAG};
