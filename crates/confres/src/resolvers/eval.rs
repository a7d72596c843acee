//! `${eval(1 + 2 * 3)}`, `${eval('${self:stage}' == 'prod')}`
//!
//! Expressions are evaluated as HCL expressions without any variables in scope. References inside
//! the expression have already been substituted by the time it gets here.
//!
//! Two conveniences are applied before parsing: single-quoted strings become double-quoted and
//! `===`/`!==` are read as `==`/`!=`.
use super::{Outcome, Request, ResolverFailure, ResolverResult};
use crate::value::Value;
use hcl::eval::Evaluate;

pub(crate) fn resolve(request: &Request) -> ResolverResult {
    let call = request.call("eval")?;
    if !call.suffix.trim().is_empty() {
        return Err(ResolverFailure::Syntax(format!(
            "unexpected `{}` after eval(...)",
            call.suffix.trim()
        )));
    }

    evaluate(call.args).map(Outcome::Found)
}

/// Evaluate `expression` to a value
#[tracing::instrument(level = "trace")]
pub fn evaluate(expression: &str) -> Result<Value, ResolverFailure> {
    let source = normalize(expression);
    if source.trim().is_empty() {
        return Err(ResolverFailure::Syntax("empty expression".to_string()));
    }

    let parsed: hcl_edit::expr::Expression = source.parse().map_err(|e| {
        ResolverFailure::Syntax(format!("unable to parse expression `{expression}`: {e}"))
    })?;
    let expression: hcl::Expression = parsed.into();

    let value = expression
        .evaluate(&hcl::eval::Context::new())
        .map_err(|e| ResolverFailure::Execution(e.to_string()))?;

    Ok(value.into())
}

/// Requote `'...'` as `"..."` and rewrite strict comparisons, leaving string contents alone
fn normalize(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut chars = expression.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                out.push('"');
                while let Some(c) = chars.next() {
                    out.push(c);
                    match c {
                        '\\' => out.extend(chars.next()),
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '\'' => {
                out.push('"');
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(escaped) => {
                                out.push('\\');
                                out.push(escaped);
                            }
                            None => out.push('\\'),
                        },
                        '\'' => break,
                        '"' => out.push_str("\\\""),
                        c => out.push(c),
                    }
                }
                out.push('"');
            }
            '=' | '!' if chars.peek() == Some(&'=') => {
                out.push(ch);
                out.push('=');
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
            }
            c => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resolvers::test::{context, request};
    use pretty_assertions::assert_eq;

    #[test]
    fn arithmetic_and_comparison() {
        assert_eq!(evaluate("1 + 2 * 3"), Ok(Value::Integer(7)));
        assert_eq!(evaluate("'prod' == 'prod'"), Ok(Value::Boolean(true)));
        assert_eq!(evaluate("'a' === 'b'"), Ok(Value::Boolean(false)));
        assert_eq!(evaluate("2 !== 3"), Ok(Value::Boolean(true)));
        assert_eq!(evaluate("true ? 'yes' : 'no'"), Ok(Value::from("yes")));
    }

    #[test]
    fn quoting() {
        assert_eq!(normalize("'it\\'s'"), "\"it's\"");
        assert_eq!(normalize("'say \"hi\"'"), "\"say \\\"hi\\\"\"");
        assert_eq!(normalize("\"a === b\" === 'c'"), "\"a === b\" == \"c\"");
    }

    #[test]
    fn failures() {
        assert!(matches!(evaluate("1 +"), Err(ResolverFailure::Syntax(_))));
        assert!(matches!(evaluate(""), Err(ResolverFailure::Syntax(_))));
        assert!(matches!(
            evaluate("1 + 'a'"),
            Err(ResolverFailure::Execution(_))
        ));
        assert!(matches!(
            evaluate("unknown_var"),
            Err(ResolverFailure::Execution(_))
        ));
    }

    #[test]
    fn suffix_is_rejected() {
        let context = context(Value::default());
        assert_eq!(
            resolve(&request("eval(1 + 1)", &context)),
            Ok(Outcome::Found(Value::Integer(2)))
        );
        assert!(matches!(
            resolve(&request("eval(1 + 1):x", &context)),
            Err(ResolverFailure::Syntax(_))
        ));
    }
}
