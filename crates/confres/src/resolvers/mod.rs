//! Resolver registry and dispatch
//!
//! A reference body (`env:HOME`, `file(./a.json):port`, `a.b.c`, ...) is classified against an
//! ordered list of [Resolver]s. The first match wins, so the order encodes priority:
//!
//! 1. `env:`, `opt:`, `self:`, `file(`, `git:`, `cron(`, `eval(`, `if(`
//! 2. custom resolvers, in registration order
//! 3. bare dotted paths (`a.b.c`), looked up in the document itself
//!
//! Every resolver is invoked through the same boxed future, synchronous ones simply complete
//! immediately.
//!
//! A resolver reports an absent value with [Outcome::NotFound] or [Outcome::Undefined], which makes
//! the engine try the next fallback. Malformed input or broken I/O is a [ResolverFailure] and aborts
//! the whole resolution. Do not mix the two up.
pub mod conditional;
pub mod cron;
pub mod custom;
pub mod env;
pub mod eval;
pub mod file;
pub mod git;
pub mod opt;
pub mod self_ref;

pub use custom::{CustomResolver, FnResolver, Matcher};

use crate::engine::Context;
use crate::expression::{self, Call};
use crate::path::TreePath;
use crate::value::Value;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;

/// Result of a single lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Found(Value),
    /// the source itself is not there (missing file, no git repository, ...)
    NotFound(String),
    /// the source is there but holds no value for the key
    Undefined(String),
    /// the value lives at this path of the document and is not resolved yet
    Pending(TreePath),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ResolverFailure {
    #[error("{0}")]
    Syntax(String),
    #[error("{0}")]
    Execution(String),
}

pub type ResolverResult = Result<Outcome, ResolverFailure>;

/// Everything a resolver gets to see
#[derive(Clone, Copy)]
pub struct Request<'a> {
    /// the reference body, e.g. `env:HOME`
    pub body: &'a str,
    /// path of the string leaf holding the reference
    pub path: &'a TreePath,
    /// the leaf's text as written in the source document
    pub source: &'a str,
    pub context: &'a Context,
}

impl<'a> Request<'a> {
    /// Key of a `prefix:key` body, rejecting empty keys
    pub fn key(&self, prefix: &str) -> Result<&'a str, ResolverFailure> {
        let key = self
            .body
            .trim()
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(|| {
                ResolverFailure::Syntax(format!("expected `{prefix}:<key>`, got `{}`", self.body))
            })?
            .trim();

        if key.is_empty() {
            return Err(ResolverFailure::Syntax(format!(
                "empty key in `{prefix}:` reference"
            )));
        }

        Ok(key)
    }

    /// Function-call form `name(args)`, rejecting unterminated calls
    pub fn call(&self, name: &str) -> Result<Call<'a>, ResolverFailure> {
        match Call::parse(self.body) {
            Some(Ok(call)) if call.name == name => Ok(call),
            Some(Err(message)) => Err(ResolverFailure::Syntax(message)),
            _ => Err(ResolverFailure::Syntax(format!(
                "expected `{name}(...)`, got `{}`",
                self.body
            ))),
        }
    }
}

/// A registered resolver
#[derive(Clone)]
pub enum Resolver {
    Env,
    Opt,
    SelfRef,
    File,
    Git,
    Cron,
    Eval,
    If,
    Custom(Arc<dyn CustomResolver>),
    DottedPath,
}

impl Resolver {
    pub fn type_name(&self) -> &str {
        match self {
            Resolver::Env => "env",
            Resolver::Opt => "opt",
            Resolver::SelfRef => "self",
            Resolver::File => "file",
            Resolver::Git => "git",
            Resolver::Cron => "cron",
            Resolver::Eval => "eval",
            Resolver::If => "if",
            Resolver::Custom(custom) => custom.type_name(),
            Resolver::DottedPath => "dotted-path",
        }
    }

    /// Text a body of this type starts with, if any
    pub fn prefix(&self) -> Option<&str> {
        match self {
            Resolver::Env => Some("env:"),
            Resolver::Opt => Some("opt:"),
            Resolver::SelfRef => Some("self:"),
            Resolver::File => Some("file("),
            Resolver::Git => Some("git:"),
            Resolver::Cron => Some("cron("),
            Resolver::Eval => Some("eval("),
            Resolver::If => Some("if("),
            Resolver::Custom(custom) => custom.prefix(),
            Resolver::DottedPath => None,
        }
    }

    pub fn matches(&self, body: &str) -> bool {
        let body = body.trim();
        match self {
            Resolver::Custom(custom) => custom.matches(body),
            Resolver::DottedPath => expression::is_dotted_path(body),
            builtin => builtin.prefix().is_some_and(|prefix| body.starts_with(prefix)),
        }
    }

    pub fn is_async(&self) -> bool {
        match self {
            Resolver::File | Resolver::Git => true,
            Resolver::Custom(custom) => custom.is_async(),
            _ => false,
        }
    }

    pub fn resolve<'a>(&'a self, request: Request<'a>) -> BoxFuture<'a, ResolverResult> {
        match self {
            Resolver::Env => futures::future::ready(env::resolve(&request)).boxed(),
            Resolver::Opt => futures::future::ready(opt::resolve(&request)).boxed(),
            Resolver::SelfRef => futures::future::ready(self_ref::resolve(&request)).boxed(),
            Resolver::DottedPath => {
                futures::future::ready(self_ref::resolve_dotted(&request)).boxed()
            }
            Resolver::File => file::resolve(request).boxed(),
            Resolver::Git => git::resolve(request).boxed(),
            Resolver::Cron => futures::future::ready(cron::resolve(&request)).boxed(),
            Resolver::Eval => futures::future::ready(eval::resolve(&request)).boxed(),
            Resolver::If => futures::future::ready(conditional::resolve(&request)).boxed(),
            Resolver::Custom(custom) => custom.resolve(request),
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// How a reference body was classified
#[derive(Debug, Clone)]
pub enum Classification<'r> {
    Known(&'r Resolver),
    /// `name(...)` with no resolver for `name`
    FunctionCall(String),
    Unknown(String),
}

impl Classification<'_> {
    pub fn type_name(&self) -> &str {
        match self {
            Classification::Known(resolver) => resolver.type_name(),
            Classification::FunctionCall(_) => "function-call",
            Classification::Unknown(_) => "unknown",
        }
    }
}

/// Ordered list of resolvers
#[derive(Debug, Clone)]
pub struct Registry {
    resolvers: Vec<Resolver>,
}

impl Registry {
    pub fn new(custom: &[Arc<dyn CustomResolver>]) -> Self {
        let mut resolvers = vec![
            Resolver::Env,
            Resolver::Opt,
            Resolver::SelfRef,
            Resolver::File,
            Resolver::Git,
            Resolver::Cron,
            Resolver::Eval,
            Resolver::If,
        ];
        resolvers.extend(custom.iter().cloned().map(Resolver::Custom));
        resolvers.push(Resolver::DottedPath);

        Self { resolvers }
    }

    pub fn resolvers(&self) -> &[Resolver] {
        &self.resolvers
    }

    #[tracing::instrument(level = "trace", skip(self))]
    pub fn classify(&self, body: &str) -> Classification<'_> {
        if let Some(resolver) = self.resolvers.iter().find(|r| r.matches(body)) {
            return Classification::Known(resolver);
        }

        match Call::parse(body) {
            Some(Ok(call)) => Classification::FunctionCall(call.name.to_string()),
            _ => Classification::Unknown(
                expression::reference_prefix(body)
                    .unwrap_or(body.trim())
                    .to_string(),
            ),
        }
    }

    /// Start resolving `request.body` with the first matching resolver
    ///
    /// Hands back the classification when no resolver matches.
    pub fn dispatch<'a>(
        &'a self,
        request: Request<'a>,
    ) -> Result<(&'a Resolver, BoxFuture<'a, ResolverResult>), Classification<'a>> {
        match self.classify(request.body) {
            Classification::Known(resolver) => {
                tracing::trace!(
                    resolver = resolver.type_name(),
                    asynchronous = resolver.is_async(),
                    "dispatch"
                );
                Ok((resolver, resolver.resolve(request)))
            }
            unmatched => Err(unmatched),
        }
    }

    /// Prefixes that mark a bare fallback candidate as a reference
    pub fn known_prefixes(&self) -> Vec<String> {
        self.resolvers
            .iter()
            .filter_map(|resolver| resolver.prefix().map(str::to_string))
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(&[])
    }
}
