//! `${env:NAME}`
use super::{Outcome, Request, ResolverFailure, ResolverResult};

pub(crate) fn resolve(request: &Request<'_>) -> ResolverResult {
    let name = request.key("env")?;

    match std::env::var(name) {
        Ok(value) => Ok(Outcome::Found(value.into())),
        Err(std::env::VarError::NotPresent) => Ok(Outcome::Undefined(format!(
            "environment variable `{name}` is not set"
        ))),
        Err(std::env::VarError::NotUnicode(_)) => Err(ResolverFailure::Execution(format!(
            "environment variable `{name}` is not valid unicode"
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resolvers::test::{context, request};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_and_unset() {
        std::env::set_var("CONFRES_ENV_RESOLVER_TEST", "from env");
        let context = context(Value::default());

        assert_eq!(
            resolve(&request("env:CONFRES_ENV_RESOLVER_TEST", &context)),
            Ok(Outcome::Found("from env".into()))
        );
        assert!(matches!(
            resolve(&request("env:CONFRES_ENV_RESOLVER_TEST_UNSET", &context)),
            Ok(Outcome::Undefined(_))
        ));
    }

    #[test]
    fn empty_name_is_a_syntax_error() {
        let context = context(Value::default());
        assert!(matches!(
            resolve(&request("env:", &context)),
            Err(ResolverFailure::Syntax(_))
        ));
    }
}
