//! `${opt:name}`, values passed on the command line
use super::{Outcome, Request, ResolverResult};

pub(crate) fn resolve(request: &Request<'_>) -> ResolverResult {
    let name = request.key("opt")?;

    Ok(match request.context.cli_options.get(name) {
        Some(value) => Outcome::Found(value.clone()),
        None => Outcome::Undefined(format!("option `--{name}` was not provided")),
    })
}
