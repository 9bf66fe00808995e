//! Reference rewriting.
//!
//! Makes a behavior script act as if it were loaded from the document's
//! location: `import.meta.url` becomes the document URL and relative module
//! paths are resolved against it. Only code positions are touched.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::context::TransformContext;
use crate::lexer::{scan, ScannedSource, StringLiteral};

static META_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bimport\s*\.\s*meta\s*\.\s*url\b").expect("Invalid import.meta regex")
});

/// A module specifier that was resolved against the document location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenSpecifier {
    pub original: String,
    pub resolved: String,
}

/// Output of [`rewrite_references`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    /// Rewritten script text
    pub source: String,

    /// Number of `import.meta.url` occurrences replaced
    pub self_references: usize,

    /// Relative specifiers that were resolved, in source order
    pub specifiers: Vec<RewrittenSpecifier>,
}

struct Edit {
    range: Range<usize>,
    replacement: String,
}

/// Rewrite self-location and relative module references in `script`.
pub fn rewrite_references(script: &str, base: &Url, ctx: &TransformContext) -> RewriteResult {
    let scanned = scan(script);
    let mut edits = Vec::new();

    let self_references = collect_meta_urls(&scanned, base, &mut edits);

    let mut specifiers = Vec::new();
    for literal in scanned.literals() {
        if !literal.terminated || !is_module_path(&scanned, literal) {
            continue;
        }

        let value = literal.value.as_str();
        if !value.starts_with('.') || ctx.is_mapped(value) {
            continue;
        }

        let resolved = match base.join(value) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::debug!("Leaving unresolvable specifier {value:?}: {e}");
                continue;
            }
        };

        edits.push(Edit {
            range: literal.value_span(),
            replacement: escape_for_quote(&resolved, literal.quote),
        });
        specifiers.push(RewrittenSpecifier {
            original: value.to_string(),
            resolved,
        });
    }

    RewriteResult {
        source: apply_edits(script, edits),
        self_references,
        specifiers,
    }
}

fn collect_meta_urls(scanned: &ScannedSource<'_>, base: &Url, edits: &mut Vec<Edit>) -> usize {
    let quoted = serde_json::Value::String(base.to_string()).to_string();
    let mut count = 0;

    for found in META_URL_RE.find_iter(scanned.mask()) {
        // `obj.import.meta.url` is a property chain, not the meta property.
        if scanned.previous_token(found.start()) == Some(".") {
            continue;
        }
        edits.push(Edit {
            range: found.range(),
            replacement: quoted.clone(),
        });
        count += 1;
    }

    count
}

/// Whether a literal is a static or dynamic import path.
fn is_module_path(scanned: &ScannedSource<'_>, literal: &StringLiteral) -> bool {
    let start = literal.span.start;
    match scanned.previous_token(start) {
        Some("from") => true,
        Some("import") => !is_member_access(scanned, start),
        Some("(") => {
            let Some(paren) = scanned.previous_token_start(start) else {
                return false;
            };
            scanned.previous_token(paren) == Some("import") && !is_member_access(scanned, paren)
        }
        _ => false,
    }
}

// True when the keyword before `offset` is itself preceded by a `.`.
fn is_member_access(scanned: &ScannedSource<'_>, offset: usize) -> bool {
    scanned
        .previous_token_start(offset)
        .and_then(|keyword| scanned.previous_token(keyword))
        == Some(".")
}

fn escape_for_quote(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == quote || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    let mut out = source.to_string();
    edits.sort_by(|a, b| b.range.start.cmp(&a.range.start));
    for edit in edits {
        out.replace_range(edit.range, &edit.replacement);
    }
    out
}
