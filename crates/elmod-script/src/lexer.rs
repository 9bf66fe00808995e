//! Lexical scanner for behavior scripts.
//!
//! The scanner does not tokenize JavaScript fully. It only separates code
//! from quoted strings, template literals, comments and regex literals, which
//! is enough to keep textual rewrites away from non-code positions.
//!
//! The result is a *mask*: a copy of the source with every non-code byte
//! replaced by a space (newlines kept), so byte offsets in the mask are byte
//! offsets in the source. Patterns run against the mask and edits are applied
//! to the source.

use std::ops::Range;

/// A single- or double-quoted string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    /// Byte range including the quotes
    pub span: Range<usize>,

    /// Quote character
    pub quote: char,

    /// Raw text between the quotes, escapes left as written
    pub value: String,

    /// Whether a closing quote was found on the same line
    pub terminated: bool,
}

impl StringLiteral {
    /// Byte range of the text between the quotes.
    pub fn value_span(&self) -> Range<usize> {
        let end = if self.terminated {
            self.span.end - 1
        } else {
            self.span.end
        };
        self.span.start + 1..end
    }
}

/// Source text split into code and non-code regions.
#[derive(Debug, Clone)]
pub struct ScannedSource<'a> {
    source: &'a str,
    mask: String,
    literals: Vec<StringLiteral>,
}

impl<'a> ScannedSource<'a> {
    /// The original source.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Code-only view of the source with identical byte offsets.
    pub fn mask(&self) -> &str {
        &self.mask
    }

    /// Quoted string literals in source order.
    pub fn literals(&self) -> &[StringLiteral] {
        &self.literals
    }

    /// Last code token before `offset`: either a single punctuation
    /// character or a whole identifier/keyword.
    pub fn previous_token(&self, offset: usize) -> Option<&str> {
        previous_token(self.mask.as_bytes(), offset).map(|range| &self.mask[range])
    }

    /// Byte offset where the token returned by [`previous_token`] starts.
    ///
    /// [`previous_token`]: ScannedSource::previous_token
    pub fn previous_token_start(&self, offset: usize) -> Option<usize> {
        previous_token(self.mask.as_bytes(), offset).map(|range| range.start)
    }
}

/// Keywords after which a `/` starts a regex literal rather than a division.
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case",
    "do", "else", "yield", "await",
];

/// Scan a script, classifying every byte as code or non-code.
pub fn scan(source: &str) -> ScannedSource<'_> {
    let bytes = source.as_bytes();
    let mut mask = bytes.to_vec();
    let mut literals = Vec::new();

    // Brace depths at which an open `${` interpolation resumes its template.
    let mut template_stack: Vec<usize> = Vec::new();
    let mut brace_depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        match b {
            b'/' if next == Some(b'/') => {
                let end = find_byte(bytes, i, b'\n').unwrap_or(bytes.len());
                blank(&mut mask, i..end);
                i = end;
            }
            b'/' if next == Some(b'*') => {
                let end = find_block_comment_end(bytes, i + 2);
                blank(&mut mask, i..end);
                i = end;
            }
            b'\'' | b'"' => {
                let literal = scan_string(source, i);
                blank(&mut mask, literal.span.clone());
                i = literal.span.end;
                literals.push(literal);
            }
            b'`' => {
                i = scan_template(bytes, &mut mask, i + 1, i, &mut template_stack, brace_depth);
            }
            b'/' if regex_allowed(&mask, i) => match scan_regex(bytes, i) {
                Some(end) => {
                    blank(&mut mask, i..end);
                    i = end;
                }
                None => i += 1,
            },
            b'{' => {
                brace_depth += 1;
                i += 1;
            }
            b'}' if template_stack.last() == Some(&brace_depth) => {
                template_stack.pop();
                i = scan_template(bytes, &mut mask, i + 1, i, &mut template_stack, brace_depth);
            }
            b'}' => {
                brace_depth = brace_depth.saturating_sub(1);
                i += 1;
            }
            _ => i += 1,
        }
    }

    let mask = String::from_utf8(mask)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());

    ScannedSource {
        source,
        mask,
        literals,
    }
}

fn blank(mask: &mut [u8], range: Range<usize>) {
    for byte in &mut mask[range] {
        if *byte != b'\n' {
            *byte = b' ';
        }
    }
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes[from..].iter().position(|b| *b == needle).map(|p| from + p)
}

fn find_block_comment_end(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

fn scan_string(source: &str, start: usize) -> StringLiteral {
    let bytes = source.as_bytes();
    let quote = bytes[start];
    let mut i = start + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => break,
            b if b == quote => {
                return StringLiteral {
                    span: start..i + 1,
                    quote: quote as char,
                    value: source[start + 1..i].to_string(),
                    terminated: true,
                };
            }
            _ => i += 1,
        }
    }

    let end = i.min(bytes.len());
    StringLiteral {
        span: start..end,
        quote: quote as char,
        value: source[start + 1..end].to_string(),
        terminated: false,
    }
}

/// Scan template text from `from` until the closing backtick or the next
/// `${`, blanking everything from `blank_from`. Returns the offset where code
/// scanning resumes.
fn scan_template(
    bytes: &[u8],
    mask: &mut [u8],
    from: usize,
    blank_from: usize,
    template_stack: &mut Vec<usize>,
    brace_depth: usize,
) -> usize {
    let mut i = from;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => {
                blank(mask, blank_from..i + 1);
                return i + 1;
            }
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                blank(mask, blank_from..i + 2);
                template_stack.push(brace_depth);
                return i + 2;
            }
            _ => i += 1,
        }
    }

    blank(mask, blank_from..bytes.len());
    bytes.len()
}

fn scan_regex(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    let mut in_class = false;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            b'[' => {
                in_class = true;
                i += 1;
            }
            b']' => {
                in_class = false;
                i += 1;
            }
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                return Some(i);
            }
            _ => i += 1,
        }
    }

    None
}

fn regex_allowed(mask: &[u8], offset: usize) -> bool {
    let Some(range) = previous_token(mask, offset) else {
        return true;
    };
    let token = &mask[range];

    match token {
        [b] if is_ident_byte(*b) => false,
        [b] => !matches!(*b, b')' | b']'),
        word if word[0].is_ascii_digit() => false,
        word => std::str::from_utf8(word)
            .map(|w| REGEX_PREFIX_KEYWORDS.contains(&w))
            .unwrap_or(false),
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn previous_token(mask: &[u8], offset: usize) -> Option<Range<usize>> {
    let mut end = offset.min(mask.len());
    while end > 0 && mask[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    if end == 0 {
        return None;
    }

    if !is_ident_byte(mask[end - 1]) {
        return Some(end - 1..end);
    }

    let mut start = end;
    while start > 0 && is_ident_byte(mask[start - 1]) {
        start -= 1;
    }
    Some(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_strings_and_comments() {
        let source = "const a = 'x'; // import.meta.url\n/* from './y' */ b";
        let scanned = scan(source);

        assert_eq!(scanned.mask().len(), source.len());
        assert!(scanned.mask().contains("const a ="));
        assert!(!scanned.mask().contains("import"));
        assert!(!scanned.mask().contains("'x'"));
        assert!(scanned.mask().ends_with(" b"));
    }

    #[test]
    fn records_string_literals() {
        let scanned = scan(r#"import a from "./a.js"; import './b.js'"#);
        let values: Vec<_> = scanned.literals().iter().map(|l| l.value.as_str()).collect();

        assert_eq!(values, vec!["./a.js", "./b.js"]);
        assert_eq!(scanned.literals()[0].quote, '"');
        assert!(scanned.literals()[1].terminated);
    }

    #[test]
    fn handles_escaped_quotes() {
        let scanned = scan(r#"const s = 'it\'s'; const t = 1"#);

        assert_eq!(scanned.literals().len(), 1);
        assert_eq!(scanned.literals()[0].value, r"it\'s");
        assert!(scanned.mask().contains("const t = 1"));
    }

    #[test]
    fn template_interpolations_stay_code() {
        let source = "const s = `a ${ import.meta.url } b ${ {x: 1}.x } c`; done";
        let scanned = scan(source);

        assert!(scanned.mask().contains("import.meta.url"));
        assert!(scanned.mask().contains("{x: 1}.x"));
        assert!(!scanned.mask().contains(" a "));
        assert!(scanned.mask().ends_with("; done"));
    }

    #[test]
    fn distinguishes_regex_from_division() {
        let source = "const r = /'import'/g; const d = a / b / c; const q = 'x'";
        let scanned = scan(source);

        assert!(!scanned.mask().contains("import"));
        assert!(scanned.mask().contains("a / b / c"));
        assert_eq!(scanned.literals().len(), 1);
        assert_eq!(scanned.literals()[0].value, "x");
    }

    #[test]
    fn regex_after_return_keyword() {
        let scanned = scan("function f() { return /\"/.test(s) }");

        assert!(scanned.literals().is_empty());
    }

    #[test]
    fn finds_previous_token() {
        let scanned = scan("import x from   './x.js'");
        let literal = &scanned.literals()[0];

        assert_eq!(scanned.previous_token(literal.span.start), Some("from"));
    }

    #[test]
    fn keeps_multibyte_text_aligned() {
        let source = "const s = 'h\u{e9}llo'; const t = import.meta.url";
        let scanned = scan(source);

        assert_eq!(scanned.mask().len(), source.len());
        let offset = scanned.mask().find("import.meta.url").unwrap();
        assert_eq!(&source[offset..offset + 15], "import.meta.url");
    }
}
