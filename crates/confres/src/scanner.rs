//! Locating reference expressions inside strings
//!
//! An expression starts with `prefix` + `open` (`${` by default) and ends with the matching `close`.
//! Inside an expression a bare `open` (or another full start token) nests one level deeper, so
//! `${a {b} c}` and `${self:a.${self:b}}` are each found as a single outermost expression.
//!
//! Quotes only matter inside an expression: there they suppress depth changes, so
//! `${opt:a, "}"}` is one expression. Outside of expressions quotes are plain text and
//! `"${self:name}"` is found as usual.
//!
//! Unterminated expressions are not an error. They are skipped and scanning resumes right after the
//! unmatched start token.
use std::ops::Range;

/// Token triple that frames an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    prefix: String,
    open: String,
    close: String,
    start: String,
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("invalid delimiters `{start}`...`{close}`: opening and closing tokens must not be empty")]
pub struct InvalidDelimiters {
    start: String,
    close: String,
}

impl Delimiters {
    pub fn new(
        prefix: impl Into<String>,
        open: impl Into<String>,
        close: impl Into<String>,
    ) -> Result<Self, InvalidDelimiters> {
        let prefix = prefix.into();
        let open = open.into();
        let close = close.into();
        let start = format!("{prefix}{open}");

        if open.is_empty() || close.is_empty() {
            return Err(InvalidDelimiters { start, close });
        }

        Ok(Self {
            prefix,
            open,
            close,
            start,
        })
    }

    /// `prefix` + `open`, the token that begins an expression
    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn open(&self) -> &str {
        &self.open
    }

    pub fn close(&self) -> &str {
        &self.close
    }

    pub fn wrap(&self, body: &str) -> String {
        format!("{}{}{}", self.start, body, self.close)
    }

    /// Body of an expression found by [find_expressions]
    pub fn body<'a>(&self, expression: &'a str) -> &'a str {
        let without_start = expression.strip_prefix(self.start()).unwrap_or(expression);
        without_start
            .strip_suffix(self.close())
            .unwrap_or(without_start)
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            prefix: "$".into(),
            open: "{".into(),
            close: "}".into(),
            start: "${".into(),
        }
    }
}

/// Byte ranges of all outermost expressions in `text`, in order and non-overlapping
pub fn find_expressions(text: &str, delimiters: &Delimiters) -> Vec<Range<usize>> {
    let mut found = vec![];
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(delimiters.start()) {
        let start = cursor + offset;
        match match_expression(text, start, delimiters) {
            Some(end) => {
                found.push(start..end);
                cursor = end;
            }
            None => {
                tracing::debug!(text, start, "unterminated expression skipped");
                cursor = start + delimiters.start().len();
            }
        }
    }

    found
}

/// `true` if there is at least one complete expression in `text`
pub fn contains_expression(text: &str, delimiters: &Delimiters) -> bool {
    !find_expressions(text, delimiters).is_empty()
}

/// `true` if `text` is exactly one expression, nothing before or after it
pub fn is_single_expression(text: &str, delimiters: &Delimiters) -> bool {
    let found = find_expressions(text, delimiters);
    matches!(found.as_slice(), [range] if range.start == 0 && range.end == text.len())
}

/// End offset (exclusive) of the expression beginning at `start`
fn match_expression(text: &str, start: usize, delimiters: &Delimiters) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut index = start + delimiters.start().len();

    while let Some(ch) = text[index..].chars().next() {
        if escaped {
            escaped = false;
            index += ch.len_utf8();
            continue;
        }

        if ch == '\\' {
            escaped = true;
            index += 1;
            continue;
        }

        if let Some(active) = quote {
            if ch == active {
                quote = None;
            }
            index += ch.len_utf8();
            continue;
        }

        let rest = &text[index..];
        if ch == '\'' || ch == '"' {
            quote = Some(ch);
            index += 1;
        } else if rest.starts_with(delimiters.start()) {
            depth += 1;
            index += delimiters.start().len();
        } else if rest.starts_with(delimiters.close()) {
            depth -= 1;
            index += delimiters.close().len();
            if depth == 0 {
                return Some(index);
            }
        } else if rest.starts_with(delimiters.open()) {
            depth += 1;
            index += delimiters.open().len();
        } else {
            index += ch.len_utf8();
        }
    }

    None
}
