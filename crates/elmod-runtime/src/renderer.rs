//! Template rendering into concrete nodes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use elmod_document::{parse_fragment, Node};
use minijinja::{context, AutoEscape, Environment};
use regex::Regex;

/// Values a template can reference as `{{ name }}`.
pub type Bindings = BTreeMap<String, String>;

// `{{ name }}` where name is an attribute-style identifier
static BINDING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_-]*)\s*\}\}").expect("Invalid binding regex")
});

/// Errors that can occur while rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to render template: {0}")]
    Template(String),
}

/// Converts template markup plus bindings into concrete nodes.
pub trait TemplateRenderer: Send + Sync + fmt::Debug {
    fn render(&self, markup: &str, bindings: &Bindings) -> Result<Vec<Node>, RenderError>;
}

/// Renderer backed by minijinja with HTML auto-escaping.
///
/// Only `{{ name }}` bindings are expressions. All other text, including
/// stray `{{`, `{%` or `{#`, is emitted verbatim.
#[derive(Debug)]
pub struct MarkupRenderer {
    env: Environment<'static>,
}

impl MarkupRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        Self { env }
    }
}

impl Default for MarkupRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for MarkupRenderer {
    fn render(&self, markup: &str, bindings: &Bindings) -> Result<Vec<Node>, RenderError> {
        let (source, text) = compile_template(markup);
        let rendered = self
            .env
            .render_str(&source, context! { text => text, bindings => bindings })
            .map_err(|e: minijinja::Error| RenderError::Template(e.to_string()))?;

        Ok(parse_fragment(&rendered))
    }
}

/// Split markup into literal runs and bindings. Literal runs are passed to
/// the template as data so their text is never parsed as template syntax.
fn compile_template(markup: &str) -> (String, Vec<&str>) {
    let mut source = String::new();
    let mut text = Vec::new();
    let mut last = 0;

    for caps in BINDING_RE.captures_iter(markup) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_text(&mut source, &mut text, &markup[last..whole.start()]);
        source.push_str(&format!("{{{{ bindings[\"{}\"] }}}}", name.as_str()));
        last = whole.end();
    }
    push_text(&mut source, &mut text, &markup[last..]);

    (source, text)
}

fn push_text<'a>(source: &mut String, text: &mut Vec<&'a str>, run: &'a str) {
    if run.is_empty() {
        return;
    }
    source.push_str(&format!("{{{{ text[{}]|safe }}}}", text.len()));
    text.push(run);
}
