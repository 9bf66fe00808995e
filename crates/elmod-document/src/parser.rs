//! Element-module document parser.

use html5ever::serialize::{SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

use crate::attributes::DefinitionAttributes;
use crate::definition::Definition;

/// Tag of a definition node.
pub const DEFINITION_TAG: &str = "element";

const SCRIPT_TAG: &str = "script";

/// A parsed element-module document.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    /// All definitions in document order
    pub definitions: Vec<Definition>,
}

impl ParsedDocument {
    /// Definitions that carry a tag name.
    pub fn named(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.iter().filter(|d| d.is_registrable())
    }

    /// Look up a definition by tag name.
    pub fn find(&self, tag_name: &str) -> Option<&Definition> {
        self.definitions
            .iter()
            .find(|d| d.tag_name() == Some(tag_name))
    }
}

/// Errors that can occur when parsing a document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize template of definition {index}: {message}")]
    Serialize { index: usize, message: String },
}

/// Parse an element-module document and extract its definitions.
///
/// Every inline script is detached from its definition before the template
/// is serialized, so templates never carry executable script text. Nested
/// definitions are extracted first and keep their own scripts.
pub fn parse_element_module(source: &str) -> Result<ParsedDocument, ParseError> {
    let dom = html5ever::parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut source.as_bytes())?;

    let mut slots = Vec::new();
    collect_definitions(&dom.document, &mut slots)?;

    Ok(ParsedDocument {
        definitions: slots.into_iter().flatten().collect(),
    })
}

/// Walk the tree, reserving a slot per definition in pre-order and filling
/// it after the definition's descendants have been handled.
fn collect_definitions(
    handle: &Handle,
    slots: &mut Vec<Option<Definition>>,
) -> Result<(), ParseError> {
    let children: Vec<Handle> = handle.children.borrow().clone();

    for child in &children {
        if is_element(child, DEFINITION_TAG) {
            let index = slots.len();
            slots.push(None);
            collect_definitions(child, slots)?;
            slots[index] = Some(extract_definition(child, index)?);
        } else {
            collect_definitions(child, slots)?;
        }
    }

    Ok(())
}

fn extract_definition(node: &Handle, index: usize) -> Result<Definition, ParseError> {
    let attributes = read_attributes(node);

    let mut scripts = Vec::new();
    detach_scripts(node, &mut scripts);

    let script_count = scripts.len();
    let script = scripts
        .into_iter()
        .next()
        .filter(|text| !text.trim().is_empty());

    let template = inner_html(node).map_err(|e| ParseError::Serialize {
        index,
        message: e.to_string(),
    })?;

    Ok(Definition {
        index,
        attributes,
        script,
        script_count,
        template,
    })
}

fn read_attributes(node: &Handle) -> DefinitionAttributes {
    let NodeData::Element { attrs, .. } = &node.data else {
        return DefinitionAttributes::default();
    };

    let pairs: Vec<(String, String)> = attrs
        .borrow()
        .iter()
        .map(|a| (a.name.local.to_string(), a.value.to_string()))
        .collect();

    DefinitionAttributes::from_pairs(pairs.iter().map(|(n, v)| (n.as_str(), v.as_str())))
}

/// Remove every script below `node` (stopping at nested definitions) and
/// collect their text in document order.
fn detach_scripts(node: &Handle, scripts: &mut Vec<String>) {
    let mut children = node.children.borrow_mut();
    let mut kept = Vec::with_capacity(children.len());

    for child in children.drain(..) {
        if is_element(&child, SCRIPT_TAG) {
            scripts.push(text_content(&child));
            child.parent.set(None);
            continue;
        }
        if !is_element(&child, DEFINITION_TAG) {
            detach_scripts(&child, scripts);
        }
        kept.push(child);
    }

    *children = kept;
}

fn is_element(handle: &Handle, tag: &str) -> bool {
    matches!(&handle.data, NodeData::Element { name, .. } if &*name.local == tag)
}

fn text_content(handle: &Handle) -> String {
    let mut text = String::new();
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => text.push_str(&contents.borrow()),
            NodeData::Element { .. } => text.push_str(&text_content(child)),
            _ => {}
        }
    }
    text
}

fn inner_html(node: &Handle) -> std::io::Result<String> {
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    html5ever::serialize(&mut bytes, &SerializableHandle::from(node.clone()), opts)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
