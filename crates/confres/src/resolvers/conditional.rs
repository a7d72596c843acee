//! `${if(cond ? a : b)}` and `${if(cond, a, b)}`
use super::eval::evaluate;
use super::{Outcome, Request, ResolverFailure, ResolverResult};

pub(crate) fn resolve(request: &Request) -> ResolverResult {
    let call = request.call("if")?;
    if !call.suffix.trim().is_empty() {
        return Err(ResolverFailure::Syntax(format!(
            "unexpected `{}` after if(...)",
            call.suffix.trim()
        )));
    }

    let expression = match call.arguments().as_slice() {
        [ternary] => ternary.clone(),
        [condition, then, otherwise] => format!("({condition}) ? ({then}) : ({otherwise})"),
        arguments => {
            return Err(ResolverFailure::Syntax(format!(
                "if(...) takes a ternary or three arguments, got {}",
                arguments.len()
            )))
        }
    };

    evaluate(&expression).map(Outcome::Found)
}
