//! Pre-pass over a freshly loaded document
//!
//! Two things happen to every string leaf before the first resolution pass:
//!
//! 1. Fallback candidates that were written without their own wrapping are rewrapped, so
//!    `${opt:stage, env:STAGE}` becomes `${opt:stage, ${env:STAGE}}`. Only candidates starting
//!    with a known resolver prefix are touched. Running the repair twice changes nothing.
//! 2. Text that has to survive resolution untouched (leaves under a verbatim key, and later values
//!    read from outside the document, quoted literals and references passed through by policy)
//!    is encoded with two private-use characters so the
//!    scanner no longer sees a start token. [decode_verbatim] restores it once the document is
//!    resolved.
//!
//! The escape character itself is doubled in every leaf, which keeps decoding lossless for
//! documents that happen to contain it.
use crate::expression;
use crate::path::{PathSegment, TreePath};
use crate::scanner::{self, Delimiters};
use crate::splitter;
use crate::value::Value;
use crate::visit::VisitStringsMut;
use std::collections::HashMap;

pub const ESCAPE: char = '\u{E000}';
/// stands in for the start token after an [ESCAPE]
pub const START_MARK: char = '\u{E001}';

/// Original text of expressions whose text changed, per leaf
///
/// Maps the current expression text to the text written in the source document and whether inner
/// references were substituted into it.
#[derive(Debug, Clone, Default)]
pub struct Lineage {
    leaves: HashMap<TreePath, HashMap<String, (String, bool)>>,
}

impl Lineage {
    pub fn original<'a>(&'a self, path: &TreePath, current: &'a str) -> (&'a str, bool) {
        self.leaves
            .get(path)
            .and_then(|leaf| leaf.get(current))
            .map(|(original, rewritten)| (original.as_str(), *rewritten))
            .unwrap_or((current, false))
    }

    /// `current` became `next` by substituting inner references
    pub fn rewrite(&mut self, path: &TreePath, current: &str, next: &str) {
        let (original, _) = self.original(path, current);
        let original = original.to_string();
        self.leaves
            .entry(path.clone())
            .or_default()
            .insert(next.to_string(), (original, true));
    }

    fn repaired(&mut self, path: &TreePath, original: &str, repaired: &str) {
        self.leaves
            .entry(path.clone())
            .or_default()
            .insert(repaired.to_string(), (original.to_string(), false));
    }
}

/// Prepare `tree` for resolution
pub fn normalize(
    tree: &mut Value,
    delimiters: &Delimiters,
    known_prefixes: &[String],
    verbatim_keys: &[String],
) -> Lineage {
    let mut lineage = Lineage::default();

    tree.visit_strings_mut(&mut |path: &TreePath, text: &mut String| {
        if under_verbatim_key(path, verbatim_keys) {
            *text = encode_verbatim(text, delimiters);
            return;
        }

        if text.contains(ESCAPE) {
            *text = text.replace(ESCAPE, &ESCAPE.to_string().repeat(2));
        }

        let repaired = repair_fallbacks(text, delimiters, known_prefixes);
        if repaired != *text {
            let before = scanner::find_expressions(text, delimiters);
            let after = scanner::find_expressions(&repaired, delimiters);
            for (old, new) in before.into_iter().zip(after) {
                if text[old.clone()] != repaired[new.clone()] {
                    lineage.repaired(path, &text[old], &repaired[new]);
                }
            }
            tracing::debug!(%path, before = %text, after = %repaired, "repaired fallbacks");
            *text = repaired;
        }
    });

    lineage
}

fn under_verbatim_key(path: &TreePath, verbatim_keys: &[String]) -> bool {
    path.segments().iter().any(|segment| match segment {
        PathSegment::Key(key) => verbatim_keys.iter().any(|verbatim| verbatim == key),
        PathSegment::Index(_) => false,
    })
}

/// Rewrap bare fallback candidates of every expression in `text`
pub fn repair_fallbacks(text: &str, delimiters: &Delimiters, known_prefixes: &[String]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for range in scanner::find_expressions(text, delimiters) {
        out.push_str(&text[last..range.start]);
        out.push_str(&repair_expression(
            &text[range.clone()],
            delimiters,
            known_prefixes,
        ));
        last = range.end;
    }

    out.push_str(&text[last..]);
    out
}

fn repair_expression(expression: &str, delimiters: &Delimiters, known_prefixes: &[String]) -> String {
    let body = delimiters.body(expression);
    let spans = splitter::split_spans(body, Some(delimiters));
    let primary_nested = spans
        .first()
        .is_some_and(|span| scanner::contains_expression(&body[span.clone()], delimiters));

    let mut repaired = String::with_capacity(body.len());
    let mut last = 0;

    for (index, span) in spans.into_iter().enumerate() {
        repaired.push_str(&body[last..span.start]);
        let candidate = &body[span.clone()];
        if expression::parse_literal(candidate).is_some() {
            repaired.push_str(candidate);
            last = span.end;
            continue;
        }
        let inner = repair_fallbacks(candidate, delimiters, known_prefixes);

        let bare = !scanner::contains_expression(&inner, delimiters)
            && known_prefixes.iter().any(|prefix| inner.starts_with(prefix.as_str()));
        if index > 0 && !primary_nested && bare {
            repaired.push_str(&delimiters.wrap(&inner));
        } else {
            repaired.push_str(&inner);
        }
        last = span.end;
    }

    repaired.push_str(&body[last..]);
    delimiters.wrap(&repaired)
}

/// Hide every start token in `text` from the scanner
pub fn encode_verbatim(text: &str, delimiters: &Delimiters) -> String {
    let start = delimiters.start();
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        if rest.starts_with(start) {
            out.push(ESCAPE);
            out.push(START_MARK);
            rest = &rest[start.len()..];
        } else {
            if ch == ESCAPE {
                out.push(ESCAPE);
            }
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }

    out
}

/// Inverse of [encode_verbatim]
pub fn decode_verbatim(text: &str, delimiters: &Delimiters) -> String {
    if !text.contains(ESCAPE) {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if ch != ESCAPE {
            out.push(ch);
            continue;
        }

        match chars.next() {
            Some(START_MARK) => out.push_str(delimiters.start()),
            Some(ESCAPE) | None => out.push(ESCAPE),
            Some(other) => {
                out.push(ESCAPE);
                out.push(other);
            }
        }
    }

    out
}

/// [encode_verbatim] every string in `value`
///
/// Applied to values that did not come from the document itself, so their text is never scanned
/// for references.
pub fn encode_value(value: &mut Value, delimiters: &Delimiters) {
    value.visit_strings_mut(&mut |_: &TreePath, text: &mut String| {
        *text = encode_verbatim(text, delimiters);
    });
}

/// [decode_verbatim] every string in `value`
pub fn decode_value(value: &mut Value, delimiters: &Delimiters) {
    value.visit_strings_mut(&mut |_: &TreePath, text: &mut String| {
        if text.contains(ESCAPE) {
            *text = decode_verbatim(text, delimiters);
        }
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document;
    use crate::visit::VisitStrings;
    use pretty_assertions::assert_eq;

    fn prefixes() -> Vec<String> {
        vec!["env:".into(), "opt:".into(), "self:".into(), "file(".into()]
    }

    #[test]
    fn rewraps_bare_fallbacks() {
        let d = Delimiters::default();
        assert_eq!(
            repair_fallbacks("${opt:stage, env:STAGE, 'dev'}", &d, &prefixes()),
            "${opt:stage, ${env:STAGE}, 'dev'}"
        );
        assert_eq!(
            repair_fallbacks("x ${self:a,env:B} y", &d, &prefixes()),
            "x ${self:a,${env:B}} y"
        );
        // unknown prefixes and literals stay as they are
        assert_eq!(
            repair_fallbacks("${opt:a, ssm:/x, 3}", &d, &prefixes()),
            "${opt:a, ssm:/x, 3}"
        );
        assert_eq!(
            repair_fallbacks("${opt:a, '${opt:b, env:C}'}", &d, &prefixes()),
            "${opt:a, '${opt:b, env:C}'}"
        );
    }

    #[test]
    fn repair_is_idempotent() {
        let d = Delimiters::default();
        let once = repair_fallbacks("${opt:a, ${env:B, self:c}}", &d, &prefixes());
        assert_eq!(once, "${opt:a, ${env:B, ${self:c}}}");
        assert_eq!(repair_fallbacks(&once, &d, &prefixes()), once);
    }

    #[test]
    fn nested_primary_is_left_alone() {
        let d = Delimiters::default();
        let text = "${self:a.${opt:b}, env:C}";
        assert_eq!(repair_fallbacks(text, &d, &prefixes()), text);
    }

    #[test]
    fn verbatim_round_trip() {
        let d = Delimiters::default();
        let text = "use ${env:HOME} and \u{E000} literally";
        let encoded = encode_verbatim(text, &d);
        assert!(!scanner::contains_expression(&encoded, &d));
        assert_eq!(decode_verbatim(&encoded, &d), text);
    }

    #[test]
    fn encoded_values_hide_references() {
        let d = Delimiters::default();
        let mut value = Value::from(serde_json::json!({ "password": "p@${ss}", "n": [1, "${x}"] }));
        let original = value.clone();

        encode_value(&mut value, &d);
        value.visit_strings(&mut |_: &TreePath, text: &str| {
            assert!(!scanner::contains_expression(text, &d), "{text}");
        });

        decode_value(&mut value, &d);
        assert_eq!(value, original);
    }

    #[test]
    fn normalize_document() {
        let d = Delimiters::default();
        let mut tree = document!(
            r#"
            a: ${opt:a, env:B}
            help:
              usage: run with ${opt:stage}
            "#
        );

        let lineage = normalize(&mut tree, &d, &prefixes(), &["help".to_string()]);

        let a = TreePath::parse_dotted("a").unwrap();
        assert_eq!(tree.get_path(&a), Some(&Value::from("${opt:a, ${env:B}}")));
        assert_eq!(
            lineage.original(&a, "${opt:a, ${env:B}}"),
            ("${opt:a, env:B}", false)
        );

        let usage = TreePath::parse_dotted("help.usage").unwrap();
        let encoded = tree.get_path(&usage).and_then(Value::as_str).unwrap();
        assert!(!scanner::contains_expression(encoded, &d));

        decode_value(&mut tree, &d);
        assert_eq!(
            tree.get_path(&usage),
            Some(&Value::from("run with ${opt:stage}"))
        );
    }

    #[test]
    fn lineage_follows_rewrites() {
        let mut lineage = Lineage::default();
        let path = TreePath::root().child_key("port");
        lineage.rewrite(&path, "${file(./${self:f}):p}", "${file(./a.json):p}");
        assert_eq!(
            lineage.original(&path, "${file(./a.json):p}"),
            ("${file(./${self:f}):p}", true)
        );
        assert_eq!(lineage.original(&path, "${other}"), ("${other}", false));
    }
}
