//! Knobs for a resolution request
use crate::cache::ResolverCache;
use crate::documents::{FileLoader, Loader};
use crate::resolvers::git::{CommandGitRunner, GitRunner};
use crate::resolvers::CustomResolver;
use crate::scanner::Delimiters;
use crate::value::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// What to do when a reference cannot be resolved
///
/// Applied per reference, never toggled in the middle of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Policy {
    /// Emit references of an unrecognized type verbatim instead of failing
    pub allow_unknown: bool,
    /// Let a reference whose lookups all came back undefined become `null`
    pub allow_undefined: bool,
    /// Emit any reference whose fallback chain is exhausted verbatim
    pub allow_unresolved: bool,
}

#[derive(Clone)]
pub struct Options {
    /// values for `${opt:...}`
    pub cli_options: indexmap::IndexMap<String, Value>,
    /// base for relative `file(...)` paths and git lookups
    ///
    /// Defaults to the directory of the loaded document, then the current directory.
    pub source_directory: Option<PathBuf>,
    pub delimiters: Delimiters,
    pub custom_resolvers: Vec<Arc<dyn CustomResolver>>,
    pub policy: Policy,
    /// keys whose array-of-objects values are merged into one object after resolution
    pub merge_keys: Vec<String>,
    /// keys whose string content is passed through without resolving
    pub verbatim_keys: Vec<String>,
    /// upper bound for references dispatched at the same time
    pub concurrency: usize,
    /// shared cache; a fresh one is used per request when unset
    pub cache: Option<Arc<ResolverCache>>,
    pub loader: Arc<dyn Loader>,
    pub git: Arc<dyn GitRunner>,
    pub git_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cli_options: Default::default(),
            source_directory: None,
            delimiters: Delimiters::default(),
            custom_resolvers: vec![],
            policy: Policy::default(),
            merge_keys: vec![],
            verbatim_keys: vec![],
            concurrency: 8,
            cache: None,
            loader: Arc::new(FileLoader),
            git: Arc::new(CommandGitRunner),
            git_timeout: Duration::from_secs(5),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.cli_options.insert(name.into(), value.into());
        self
    }

    pub fn with_source_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.source_directory = Some(directory.into());
        self
    }

    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn with_resolver(mut self, resolver: impl CustomResolver + 'static) -> Self {
        self.custom_resolvers.push(Arc::new(resolver));
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn allow_unknown(mut self, allow: bool) -> Self {
        self.policy.allow_unknown = allow;
        self
    }

    pub fn allow_undefined(mut self, allow: bool) -> Self {
        self.policy.allow_undefined = allow;
        self
    }

    pub fn allow_unresolved(mut self, allow: bool) -> Self {
        self.policy.allow_unresolved = allow;
        self
    }

    pub fn with_merge_key(mut self, key: impl Into<String>) -> Self {
        self.merge_keys.push(key.into());
        self
    }

    pub fn with_verbatim_key(mut self, key: impl Into<String>) -> Self {
        self.verbatim_keys.push(key.into());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cache(mut self, cache: Arc<ResolverCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    pub fn with_git(mut self, git: impl GitRunner + 'static) -> Self {
        self.git = Arc::new(git);
        self
    }

    pub fn with_git_timeout(mut self, timeout: Duration) -> Self {
        self.git_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let custom: Vec<&str> = self
            .custom_resolvers
            .iter()
            .map(|resolver| resolver.type_name())
            .collect();

        f.debug_struct("Options")
            .field("cli_options", &self.cli_options)
            .field("source_directory", &self.source_directory)
            .field("delimiters", &self.delimiters)
            .field("custom_resolvers", &custom)
            .field("policy", &self.policy)
            .field("merge_keys", &self.merge_keys)
            .field("verbatim_keys", &self.verbatim_keys)
            .field("concurrency", &self.concurrency)
            .field("loader", &self.loader)
            .field("git", &self.git)
            .field("git_timeout", &self.git_timeout)
            .finish()
    }
}
