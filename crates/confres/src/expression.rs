//! Parsed reference expressions and their candidates
//!
//! `${opt:stage, ${env:STAGE}, "dev"}` has three candidates: the primary reference `opt:stage`,
//! the fallback reference `env:STAGE` (flattened out of its own wrapping) and the literal `"dev"`.
use crate::path::TreePath;
use crate::scanner::{self, Delimiters};
use crate::splitter;
use crate::value::Value;
use std::ops::Range;

/// Terminal fallback values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    QuotedString(String),
    Number(Value),
    Boolean(bool),
}

impl Literal {
    pub fn value(&self) -> Value {
        match self {
            Literal::QuotedString(s) => Value::String(s.clone()),
            Literal::Number(number) => number.clone(),
            Literal::Boolean(b) => Value::Boolean(*b),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Literal::QuotedString(_) => "string",
            Literal::Number(_) => "number",
            Literal::Boolean(_) => "boolean",
        }
    }
}

/// One entry of a fallback chain
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Literal(Literal),
    /// unparsed reference body, for example `self:a.b`
    Reference(String),
}

impl Candidate {
    pub fn parse(text: &str) -> Self {
        match parse_literal(text) {
            Some(literal) => Candidate::Literal(literal),
            None => Candidate::Reference(text.trim().to_string()),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Candidate::Literal(_))
    }
}

/// A candidate together with its location inside the expression it was taken from
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSpan {
    /// byte range relative to the start of the outermost expression
    pub range: Range<usize>,
    pub text: String,
}

impl CandidateSpan {
    /// `true` if the candidate still embeds an expression that must be resolved first
    pub fn is_nested(&self, delimiters: &Delimiters) -> bool {
        scanner::contains_expression(&self.text, delimiters)
    }
}

/// Candidates of an expression in fallback order
///
/// A candidate that is exactly one wrapped expression is replaced by that expression's own
/// candidates, so `${a, ${b, c}}` behaves like `${a, b, c}`.
pub fn candidate_spans(expression: &str, delimiters: &Delimiters) -> Vec<CandidateSpan> {
    let mut spans = vec![];
    flatten_into(expression, 0, delimiters, &mut spans);
    spans
}

fn flatten_into(
    expression: &str,
    offset: usize,
    delimiters: &Delimiters,
    spans: &mut Vec<CandidateSpan>,
) {
    let body = delimiters.body(expression);
    let body_offset = offset + delimiters.start().len();

    for range in splitter::split_spans(body, Some(delimiters)) {
        let text = &body[range.clone()];
        let absolute = (range.start + body_offset)..(range.end + body_offset);

        if scanner::is_single_expression(text, delimiters) {
            flatten_into(text, absolute.start, delimiters, spans);
        } else {
            spans.push(CandidateSpan {
                range: absolute,
                text: text.to_string(),
            });
        }
    }
}

/// A reference expression found in a document
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceExpression {
    pub raw: String,
    pub body: String,
    pub path: TreePath,
    pub candidates: Vec<Candidate>,
}

impl ReferenceExpression {
    pub fn parse(raw: &str, path: TreePath, delimiters: &Delimiters) -> Self {
        let candidates = candidate_spans(raw, delimiters)
            .iter()
            .map(|span| Candidate::parse(&span.text))
            .collect();

        Self {
            raw: raw.to_string(),
            body: delimiters.body(raw).to_string(),
            path,
            candidates,
        }
    }

    pub fn primary(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn has_fallback(&self) -> bool {
        self.candidates.len() > 1
    }

    /// A required reference has no fallback and is not a literal itself
    pub fn is_required(&self) -> bool {
        !self.has_fallback() && !self.candidates.iter().any(Candidate::is_literal)
    }
}

/// Parse a quoted string, number or boolean. Anything else is not a literal.
pub fn parse_literal(text: &str) -> Option<Literal> {
    let text = text.trim();

    if let Some(quoted) = parse_quoted(text) {
        return Some(Literal::QuotedString(quoted));
    }

    match text {
        "true" => return Some(Literal::Boolean(true)),
        "false" => return Some(Literal::Boolean(false)),
        _ => {}
    }

    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    if let Ok(int) = text.parse::<i64>() {
        return Some(Literal::Number(Value::Integer(int)));
    }

    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| Literal::Number(Value::Decimal(f)))
}

/// Contents of `'...'` or `"..."` if `text` is exactly one quoted string
pub fn parse_quoted(text: &str) -> Option<String> {
    let quote = text.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let mut unquoted = String::new();
    let mut chars = text[1..].char_indices();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some((_, escaped)) => unquoted.push(escaped),
                None => return None,
            },
            c if c == quote => {
                // the closing quote must end the text
                return (offset + 2 == text.len()).then_some(unquoted);
            }
            c => unquoted.push(c),
        }
    }

    None
}

/// Function-call shaped body: `name(args)suffix`
#[derive(Debug, Clone, PartialEq)]
pub struct Call<'a> {
    pub name: &'a str,
    pub args: &'a str,
    pub suffix: &'a str,
}

impl<'a> Call<'a> {
    /// `None` if the body is not shaped like a call. `Some(Err(..))` if the call is unterminated.
    pub fn parse(body: &'a str) -> Option<Result<Self, String>> {
        let body = body.trim();
        let name_len = body
            .find(|c: char| !is_identifier_char(c))
            .unwrap_or(body.len());

        if name_len == 0 || !body[name_len..].starts_with('(') {
            return None;
        }

        let Some(close) = splitter::find_closing_paren(body, name_len) else {
            return Some(Err(format!("unterminated call `{body}`")));
        };

        Some(Ok(Self {
            name: &body[..name_len],
            args: &body[name_len + 1..close],
            suffix: &body[close + 1..],
        }))
    }

    /// Positional arguments, split on top-level commas
    pub fn arguments(&self) -> Vec<String> {
        splitter::split_top_level(self.args, None)
    }

    /// Sub-path after the call, introduced by `:` or `.`
    pub fn sub_path(&self) -> Result<Option<&'a str>, String> {
        let suffix = self.suffix.trim();
        if suffix.is_empty() {
            return Ok(None);
        }

        let Some(path) = suffix.strip_prefix([':', '.']) else {
            return Err(format!(
                "invalid sub-path separator in `{suffix}`, expected `:` or `.`"
            ));
        };

        let path = path.trim();
        if path.is_empty() {
            return Err("empty sub-path after call".to_string());
        }

        Ok(Some(path))
    }
}

pub fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// `identifier(.identifier)*` with optional `[n]` indices
pub fn is_dotted_path(body: &str) -> bool {
    let body = body.trim();
    !body.is_empty()
        && body
            .chars()
            .all(|c| is_identifier_char(c) || matches!(c, '.' | '[' | ']'))
        && TreePath::parse_dotted(body).is_ok()
}

/// Prefix of a `prefix:key` body
pub fn reference_prefix(body: &str) -> Option<&str> {
    let (prefix, _) = body.trim_start().split_once(':')?;
    (!prefix.is_empty() && prefix.chars().all(is_identifier_char)).then_some(prefix)
}
