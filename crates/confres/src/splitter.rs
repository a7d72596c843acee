//! Splitting expression bodies into top-level arguments
//!
//! `env:FOO, 'a, b', ${self:c, "d"}` splits into three pieces. Commas are ignored when they appear
//! inside quotes, inside `()`, `[]` or `{}`, or inside a nested expression when [Delimiters] are
//! given.
use crate::scanner::Delimiters;
use std::ops::Range;

/// Split on top-level commas. Pieces are trimmed.
///
/// An empty body yields one empty piece, never an empty list.
pub fn split_top_level(body: &str, delimiters: Option<&Delimiters>) -> Vec<String> {
    split_spans(body, delimiters)
        .into_iter()
        .map(|range| body[range].to_string())
        .collect()
}

/// Same as [split_top_level] but returns the (trimmed) byte ranges of each piece
pub fn split_spans(body: &str, delimiters: Option<&Delimiters>) -> Vec<Range<usize>> {
    let mut pieces = vec![];
    let mut piece_start = 0;
    let mut nesting = 0usize;
    let mut expression_depth = 0usize;
    let mut quote: Option<char> = None;
    let mut backslashes = 0usize;
    let mut index = 0;

    while let Some(ch) = body[index..].chars().next() {
        let escaped = backslashes % 2 == 1;
        if ch == '\\' {
            backslashes += 1;
            index += 1;
            continue;
        }
        backslashes = 0;

        if let Some(active) = quote {
            if ch == active && !escaped {
                quote = None;
            }
            index += ch.len_utf8();
            continue;
        }

        if escaped {
            index += ch.len_utf8();
            continue;
        }

        let rest = &body[index..];
        if let Some(delimiters) = delimiters {
            if rest.starts_with(delimiters.start()) {
                expression_depth += 1;
                index += delimiters.start().len();
                continue;
            }
            if expression_depth > 0 && rest.starts_with(delimiters.close()) {
                expression_depth -= 1;
                index += delimiters.close().len();
                continue;
            }
        }

        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' | '[' | '{' => nesting += 1,
            ')' | ']' | '}' => nesting = nesting.saturating_sub(1),
            ',' if nesting == 0 && expression_depth == 0 => {
                pieces.push(trim_range(body, piece_start..index));
                piece_start = index + 1;
            }
            _ => {}
        }
        index += ch.len_utf8();
    }

    pieces.push(trim_range(body, piece_start..body.len()));
    pieces
}

fn trim_range(text: &str, range: Range<usize>) -> Range<usize> {
    let slice = &text[range.clone()];
    let start = range.start + (slice.len() - slice.trim_start().len());
    let end = range.end - (slice.len() - slice.trim_end().len());
    if start > end {
        return range.start..range.start;
    }
    start..end
}

/// Offset of the parenthesis closing the one at `open`, honoring quotes and nesting
pub fn find_closing_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut backslashes = 0usize;

    for (offset, ch) in text[open..].char_indices() {
        let escaped = backslashes % 2 == 1;
        if ch == '\\' {
            backslashes += 1;
            continue;
        }
        backslashes = 0;

        if let Some(active) = quote {
            if ch == active && !escaped {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' if !escaped => quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }

    None
}
