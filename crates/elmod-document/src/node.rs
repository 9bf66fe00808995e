//! Owned node tree for rendered templates.

use std::fmt::Write;

use html5ever::tendril::TendrilSink;
use html5ever::{LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// A concrete node produced by rendering a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// An element with its attributes in source order
    Element {
        name: String,
        attributes: Vec<(String, String)>,
        children: Vec<Node>,
    },
    /// A text node
    Text(String),
    /// A comment node
    Comment(String),
}

impl Node {
    /// Element name, if this is an element.
    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Child nodes (empty for text and comments).
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// Attribute value by name.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match self {
            Node::Element { attributes, .. } => attributes
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        match self {
            Node::Text(text) => text.clone(),
            Node::Comment(_) => String::new(),
            Node::Element { children, .. } => children.iter().map(Node::text_content).collect(),
        }
    }

    /// Serialize back to markup.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_node(&mut out, self, false);
        out
    }
}

/// Serialize a node list to markup.
pub fn to_html(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node, false);
    }
    out
}

/// Parse a markup fragment into owned nodes, as if it were the content of
/// a `<body>`.
pub fn parse_fragment(markup: &str) -> Vec<Node> {
    let context = QualName::new(
        None,
        Namespace::from(HTML_NAMESPACE),
        LocalName::from("body"),
    );
    let dom = html5ever::parse_fragment(RcDom::default(), Default::default(), context, vec![])
        .one(markup);

    // The fragment parser wraps its output in a synthetic <html> root.
    let document = dom.document.children.borrow();
    let nodes = document
        .iter()
        .flat_map(|root| {
            root.children
                .borrow()
                .iter()
                .filter_map(convert)
                .collect::<Vec<_>>()
        })
        .collect();
    nodes
}

fn convert(handle: &Handle) -> Option<Node> {
    match &handle.data {
        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let attributes = attrs
                .borrow()
                .iter()
                .map(|a| (a.name.local.to_string(), a.value.to_string()))
                .collect();

            let source = template_contents
                .borrow()
                .clone()
                .unwrap_or_else(|| handle.clone());
            let children = source.children.borrow().iter().filter_map(convert).collect();

            Some(Node::Element {
                name: name.local.to_string(),
                attributes,
                children,
            })
        }
        NodeData::Text { contents } => Some(Node::Text(contents.borrow().to_string())),
        NodeData::Comment { contents } => Some(Node::Comment(contents.to_string())),
        _ => None,
    }
}

fn write_node(out: &mut String, node: &Node, raw_text: bool) {
    match node {
        Node::Text(text) if raw_text => out.push_str(text),
        Node::Text(text) => out.push_str(&escape_text(text)),
        Node::Comment(text) => {
            let _ = write!(out, "<!--{text}-->");
        }
        Node::Element {
            name,
            attributes,
            children,
        } => {
            out.push('<');
            out.push_str(name);
            for (key, value) in attributes {
                let _ = write!(out, " {}=\"{}\"", key, escape_attribute(value));
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&name.as_str()) {
                return;
            }

            let raw = RAW_TEXT_ELEMENTS.contains(&name.as_str());
            for child in children {
                write_node(out, child, raw);
            }

            let _ = write!(out, "</{name}>");
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}
