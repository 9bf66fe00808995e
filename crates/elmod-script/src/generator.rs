//! Element module synthesizer.
//!
//! Turns a normalized, rewritten behavior script into a module whose default
//! export is a generated wrapper class around the author's class.

use elmod_document::ShadowMode;
use url::Url;

use crate::context::ScriptError;
use crate::normalize::{find_class_header, Repair, PLATFORM_BASE};
use crate::rewrite::RewrittenSpecifier;

/// Module-scoped symbol keying the template method.
pub const TEMPLATE_KEY: &str = "__TEMPLATE__";

/// Module-internal alias of the author's class.
pub const AUTHOR_CLASS: &str = "__AUTHOR_CLASS__";

/// Alias the renderer's `html` function is imported under.
pub const RENDER_FN: &str = "__html__";

/// Message of the type error raised when code outside the wrapper's own
/// attachment step tries to create the root.
pub const ATTACH_SHADOW_BLOCKED: &str =
    "attachShadow is managed by the element module; use attachInternals().shadowRoot";

/// Message raised when a root exists before the wrapper attaches its own.
pub const PREEXISTING_ROOT: &str = "Element already has a shadow root before attachment";

/// Everything the synthesizer needs besides the script text.
#[derive(Debug, Clone)]
pub struct ModuleSpec<'a> {
    pub tag_name: &'a str,
    pub class_name: &'a str,
    pub template: &'a str,
    pub shadow_mode: ShadowMode,
    pub renderer_specifier: &'a str,
}

/// A compiled element module: the generated source plus the structured
/// record it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedModule {
    /// Tag the module's default export registers under
    pub tag_name: String,

    /// Name of the author class (and the wrapper's `static name`)
    pub class_name: String,

    /// Module-scope binding of the author class
    pub binding: String,

    /// Base type the author class extends
    pub base: String,

    /// Encapsulation mode of the managed root
    pub shadow_mode: ShadowMode,

    /// Template markup rendered into the root
    pub template: String,

    /// Specifier the module imports its renderer from
    pub renderer_specifier: String,

    /// Resolved document location the script was rewritten against
    pub base_url: Url,

    /// Whether the definition carried the export flag
    pub exported: bool,

    /// Generated module source
    pub source: String,

    /// Relative specifiers resolved during rewriting
    pub specifiers: Vec<RewrittenSpecifier>,

    /// Repairs applied during normalization
    pub repairs: Vec<Repair>,
}

/// Synthesize the module source for a rewritten script.
pub fn synthesize_module(script: &str, spec: &ModuleSpec<'_>) -> Result<String, ScriptError> {
    let header = find_class_header(script).ok_or(ScriptError::MissingDefaultClass)?;
    let binding = header.name.as_deref().unwrap_or(spec.class_name);
    let base = header.base.as_deref().unwrap_or(PLATFORM_BASE);

    let template = escape_template_literal(spec.template);
    let member = format!(
        "\n  [{TEMPLATE_KEY}]() {{\n    return {RENDER_FN}`{template}`;\n  }}\n"
    );

    let mut source = String::with_capacity(script.len() + template.len() + 2048);
    source.push_str(&format!("const {TEMPLATE_KEY} = Symbol('template');\n"));
    source.push_str(&script[..header.span.start]);
    source.push_str(&format!("class {binding} extends {base} {{"));
    source.push_str(&member);
    source.push_str(&script[header.span.end..]);
    source.push_str(&generate_wrapper(binding, spec));

    Ok(source)
}

fn generate_wrapper(binding: &str, spec: &ModuleSpec<'_>) -> String {
    let renderer = js_string(spec.renderer_specifier);
    let static_name = js_string(spec.class_name);
    let tag_name = js_string(spec.tag_name);
    let mode = js_string(spec.shadow_mode.as_str());
    let blocked = js_string(ATTACH_SHADOW_BLOCKED);
    let preexisting = js_string(PREEXISTING_ROOT);

    format!(
        r#"
;
const {AUTHOR_CLASS} = {binding};

import {{ html as {RENDER_FN} }} from {renderer};

const __INTERNALS__ = new WeakMap();
const __ATTACHING__ = new WeakSet();

/**
 * Wrapper for <{tag}>: attaches exactly one {mode_text} shadow root
 * during construction and renders the template into it.
 */
export default class extends {AUTHOR_CLASS} {{
  static name = {static_name};
  static tagName = {tag_name};

  constructor(...args) {{
    super(...args);
    if (!__INTERNALS__.has(this)) {{
      this.attachInternals();
    }}
  }}

  attachShadow(init) {{
    if (!__ATTACHING__.has(this)) {{
      throw new TypeError({blocked});
    }}
    return super.attachShadow(init);
  }}

  attachInternals() {{
    if (__INTERNALS__.has(this)) {{
      throw new DOMException('attachInternals() was already called', 'NotSupportedError');
    }}
    const internals = super.attachInternals();
    __INTERNALS__.set(this, internals);
    if (internals.shadowRoot) {{
      throw new Error({preexisting});
    }}

    __ATTACHING__.add(this);
    let root;
    try {{
      root = this.attachShadow({{ mode: {mode} }});
    }} finally {{
      __ATTACHING__.delete(this);
    }}

    root.append(...[].concat(this[{TEMPLATE_KEY}]()));
    return internals;
  }}
}}
"#,
        tag = spec.tag_name,
        mode_text = spec.shadow_mode,
    )
}

/// Escape text for embedding in a JavaScript template literal.
pub fn escape_template_literal(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

/// Quote a string as a JavaScript string literal.
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
