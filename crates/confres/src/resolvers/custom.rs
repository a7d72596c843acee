//! User-provided resolvers
//!
//! Implement [CustomResolver] for full control, or wrap a closure in a [FnResolver]:
//!
//! ```
//! use confres::resolvers::{FnResolver, Matcher, Outcome};
//!
//! let upper = FnResolver::new("upper", Matcher::Prefix("upper:".into()), |request| {
//!     Ok(Outcome::Found(request.key("upper")?.to_uppercase().into()))
//! });
//! # let _ = upper;
//! ```
use super::{Request, ResolverResult};
use crate::metadata::Metadata;
use crate::value::Value;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;

pub trait CustomResolver: Send + Sync {
    /// Type reported in metadata and error messages
    fn type_name(&self) -> &str;

    /// Literal prefix of matching bodies
    ///
    /// Used to recognize bare fallback candidates such as the `ssm:x` in `${opt:a, ssm:x}`.
    fn prefix(&self) -> Option<&str> {
        None
    }

    fn matches(&self, body: &str) -> bool;

    fn is_async(&self) -> bool {
        false
    }

    fn resolve<'a>(&'a self, request: Request<'a>) -> BoxFuture<'a, ResolverResult>;

    /// Extra entry for [Metadata::custom], computed once resolution finished
    fn collect_metadata(&self, _metadata: &Metadata) -> Option<(String, Value)> {
        None
    }
}

/// Which bodies a resolver handles
#[derive(Clone)]
pub enum Matcher {
    Prefix(String),
    Regex(regex::Regex),
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Matcher {
    pub fn matches(&self, body: &str) -> bool {
        match self {
            Matcher::Prefix(prefix) => body.starts_with(prefix.as_str()),
            Matcher::Regex(regex) => regex.is_match(body),
            Matcher::Predicate(predicate) => predicate(body),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        match self {
            Matcher::Prefix(prefix) => Some(prefix),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Matcher::Prefix(prefix) => f.debug_tuple("Prefix").field(prefix).finish(),
            Matcher::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

/// A synchronous closure as a resolver
pub struct FnResolver<F> {
    type_name: String,
    matcher: Matcher,
    resolve: F,
}

impl<F> FnResolver<F>
where
    F: Fn(&Request<'_>) -> ResolverResult + Send + Sync + 'static,
{
    pub fn new(type_name: impl Into<String>, matcher: Matcher, resolve: F) -> Self {
        Self {
            type_name: type_name.into(),
            matcher,
            resolve,
        }
    }
}

impl<F> CustomResolver for FnResolver<F>
where
    F: Fn(&Request<'_>) -> ResolverResult + Send + Sync + 'static,
{
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn prefix(&self) -> Option<&str> {
        self.matcher.prefix()
    }

    fn matches(&self, body: &str) -> bool {
        self.matcher.matches(body)
    }

    fn resolve<'a>(&'a self, request: Request<'a>) -> BoxFuture<'a, ResolverResult> {
        futures::future::ready((self.resolve)(&request)).boxed()
    }
}
