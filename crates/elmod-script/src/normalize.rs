//! Behavior-script normalization.
//!
//! Guarantees a script denotes exactly one `export default class NAME
//! extends BASE {` definition, repairing what the author left out.

use std::ops::Range;
use std::sync::LazyLock;

use elmod_document::to_identifier;
use regex::Regex;

use crate::lexer::scan;

/// Platform base component type.
pub const PLATFORM_BASE: &str = "HTMLElement";

/// Module-scope binding given to an unnamed default class.
pub const DEFAULT_BINDING: &str = "__DEFAULT_CLASS__";

/// Default class appended or synthesized when the author provides none.
const MINIMAL_CLASS: &str = "export default class extends HTMLElement {}";

// Narrow grammar: `export default class NAME? (extends BASE)? {`
static CLASS_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bexport\s+default\s+class(?:\s+([A-Za-z_$][\w$]*))?\s*(?:extends\s+([A-Za-z_$][\w$.]*)\s*)?\{",
    )
    .expect("Invalid class header regex")
});

/// A recognized default class header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
    /// Byte range from `export` through the opening brace
    pub span: Range<usize>,

    /// Class name, if written
    pub name: Option<String>,

    /// Base type, if written
    pub base: Option<String>,
}

/// A repair applied while normalizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// No script: a minimal class was synthesized
    Synthesized,
    /// Script without a recognizable header: a minimal class was appended
    AppendedDefault,
    /// Header without `extends`: the platform base was injected
    InjectedBase,
    /// Header without a name: an internal binding was injected and the
    /// camel-cased tag name became the class name
    InjectedName,
}

/// A script guaranteed to hold a complete default class header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedScript {
    /// Normalized script text
    pub source: String,

    /// Resolved class name
    pub class_name: String,

    /// Module-scope binding of the default class; differs from
    /// `class_name` when the name was inferred
    pub binding: String,

    /// Resolved base type
    pub base: String,

    /// Repairs applied, in rule order
    pub repairs: Vec<Repair>,
}

/// Find the first default class header that sits in code, ignoring
/// look-alikes inside strings and comments.
pub fn find_class_header(source: &str) -> Option<ClassHeader> {
    let scanned = scan(source);
    let caps = CLASS_HEADER_RE.captures(scanned.mask())?;
    let whole = caps.get(0)?;

    Some(ClassHeader {
        span: whole.range(),
        name: caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .filter(|name| name != "extends"),
        base: caps.get(2).map(|m| m.as_str().to_string()),
    })
}

/// Normalize a behavior script for the definition named `tag_name`.
pub fn normalize_script(script: Option<&str>, tag_name: &str) -> NormalizedScript {
    let script = script.filter(|s| !s.trim().is_empty());
    let mut repairs = Vec::new();

    let (mut source, header) = match script {
        None => {
            repairs.push(Repair::Synthesized);
            let source = MINIMAL_CLASS.to_string();
            let header = minimal_header(0);
            (source, header)
        }
        Some(text) => match find_class_header(text) {
            Some(header) => (text.to_string(), header),
            None => {
                repairs.push(Repair::AppendedDefault);
                let mut source = text.to_string();
                source.push_str("\n;");
                let header = minimal_header(source.len());
                source.push_str(MINIMAL_CLASS);
                source.push('\n');
                (source, header)
            }
        },
    };

    let base = header.base.clone().unwrap_or_else(|| {
        repairs.push(Repair::InjectedBase);
        PLATFORM_BASE.to_string()
    });
    let (class_name, binding) = match &header.name {
        Some(name) => (name.clone(), name.clone()),
        None => {
            repairs.push(Repair::InjectedName);
            (to_identifier(tag_name), unused_binding(&source))
        }
    };

    if header.base.is_none() || header.name.is_none() {
        let rebuilt = format!("export default class {binding} extends {base} {{");
        source.replace_range(header.span, &rebuilt);
    }

    NormalizedScript {
        source,
        class_name,
        binding,
        base,
        repairs,
    }
}

/// First of `__DEFAULT_CLASS__`, `__DEFAULT_CLASS_1__`, ... that does not
/// occur as an identifier in `source`.
fn unused_binding(source: &str) -> String {
    let mut candidate = DEFAULT_BINDING.to_string();
    let mut n = 0;
    while contains_identifier(source, &candidate) {
        n += 1;
        candidate = format!("__DEFAULT_CLASS_{n}__");
    }
    candidate
}

fn contains_identifier(source: &str, ident: &str) -> bool {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    source.match_indices(ident).any(|(at, _)| {
        let before = source[..at].chars().next_back();
        let after = source[at + ident.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

fn minimal_header(offset: usize) -> ClassHeader {
    // The header ends at the opening brace, one before the closing one.
    ClassHeader {
        span: offset..offset + MINIMAL_CLASS.len() - 1,
        name: None,
        base: Some(PLATFORM_BASE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn synthesizes_class_for_missing_script() {
        let normalized = normalize_script(None, "say-hi");

        assert_eq!(
            normalized.source,
            "export default class __DEFAULT_CLASS__ extends HTMLElement {}"
        );
        assert_eq!(normalized.class_name, "sayHi");
        assert_eq!(normalized.binding, DEFAULT_BINDING);
        assert_eq!(normalized.base, PLATFORM_BASE);
        assert_eq!(
            normalized.repairs,
            vec![Repair::Synthesized, Repair::InjectedName]
        );
    }

    #[test]
    fn appends_default_class_after_helpers() {
        let normalized = normalize_script(Some("function helper() { return 1 }"), "x-help");

        assert!(normalized.source.starts_with("function helper() { return 1 }"));
        assert!(normalized
            .source
            .contains("export default class __DEFAULT_CLASS__ extends HTMLElement {}"));
        assert_eq!(
            normalized.repairs,
            vec![Repair::AppendedDefault, Repair::InjectedName]
        );
    }

    #[test]
    fn injects_platform_base_only() {
        let normalized = normalize_script(
            Some("export default class Counter {\n  count = 0\n}"),
            "x-counter",
        );

        assert_eq!(
            normalized.source,
            "export default class Counter extends HTMLElement {\n  count = 0\n}"
        );
        assert_eq!(normalized.class_name, "Counter");
        assert_eq!(normalized.repairs, vec![Repair::InjectedBase]);
    }

    #[test]
    fn injects_name_from_tag() {
        let normalized = normalize_script(
            Some("import Base from './base.js'\nexport default class extends Base {}"),
            "fancy-button",
        );

        assert!(normalized
            .source
            .contains("export default class __DEFAULT_CLASS__ extends Base {}"));
        assert_eq!(normalized.class_name, "fancyButton");
        assert_eq!(normalized.base, "Base");
        assert_eq!(normalized.repairs, vec![Repair::InjectedName]);
    }

    #[test]
    fn leaves_complete_header_untouched() {
        let script = "export default class Greeting extends HTMLElement {}";
        let normalized = normalize_script(Some(script), "x-greeting");

        assert_eq!(normalized.source, script);
        assert_eq!(normalized.binding, "Greeting");
        assert!(normalized.repairs.is_empty());
    }

    #[test]
    fn ignores_header_inside_comment() {
        let script = "// export default class Fake extends HTMLElement {\nconst x = 1";
        assert!(find_class_header(script).is_none());

        let normalized = normalize_script(Some(script), "x-real");
        assert_eq!(normalized.repairs[0], Repair::AppendedDefault);
    }

    #[test]
    fn separately_exported_class_is_not_recognized() {
        let script = "class Foo extends HTMLElement {}\nexport default Foo";

        assert!(find_class_header(script).is_none());
    }

    #[test]
    fn header_without_space_before_brace() {
        let header = find_class_header("export default class Tight extends HTMLElement{}").unwrap();

        assert_eq!(header.name.as_deref(), Some("Tight"));
        assert_eq!(header.base.as_deref(), Some("HTMLElement"));
    }

    #[test]
    fn inferred_name_never_shadows_author_identifiers() {
        let normalized = normalize_script(
            Some("function xHelp() { return 1 }\nconst __DEFAULT_CLASS__ = 2;"),
            "x-help",
        );

        assert_eq!(normalized.class_name, "xHelp");
        assert_eq!(normalized.binding, "__DEFAULT_CLASS_1__");
        assert_eq!(normalized.source.matches("xHelp").count(), 1);
        assert!(normalized
            .source
            .contains("export default class __DEFAULT_CLASS_1__ extends HTMLElement {}"));
    }

    #[test]
    fn identifier_match_respects_word_boundaries() {
        assert!(contains_identifier("let a = __DEFAULT_CLASS__;", DEFAULT_BINDING));
        assert!(!contains_identifier("let a = __DEFAULT_CLASS__x;", DEFAULT_BINDING));
        assert!(!contains_identifier("let $__DEFAULT_CLASS__ = 1", DEFAULT_BINDING));
        assert_eq!(unused_binding("const x = 1"), DEFAULT_BINDING);
    }
}
