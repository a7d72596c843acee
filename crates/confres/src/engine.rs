//! Fixpoint resolution of a document
//!
//! Every pass scans all string leaves for expressions and walks each expression's fallback chain.
//! Candidates that still embed an expression get their inner expressions resolved and substituted
//! instead of being dispatched, so references are resolved innermost first and the outer text is
//! dispatched on a later pass. Passes repeat until no leaf holds an expression.
//!
//! A pass works on a snapshot of the tree: leaves are resolved concurrently against it and only
//! afterwards are the results written back. A reference to a leaf that still holds expressions
//! waits for a later pass. The waits of one pass form a graph; a cycle in it is fatal.
use crate::cache::ResolverCache;
use crate::documents::{DocumentSource, Loader};
use crate::error::{Location, ResolveError};
use crate::expression::{self, Candidate, ReferenceExpression};
use crate::metadata::{Attempt, AttemptOutcome, HistoryEntry, Metadata, ResolutionRecord, Tracker};
use crate::normalize;
use crate::options::{Options, Policy};
use crate::path::TreePath;
use crate::resolvers::git::GitRunner;
use crate::resolvers::{Classification, Outcome, Registry, Request, Resolver, ResolverFailure};
use crate::scanner::{self, Delimiters};
use crate::value::Value;
use crate::visit::VisitStrings;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// State shared by every resolver invocation of one request
pub struct Context {
    /// the document as of the start of the current pass
    pub tree: Value,
    /// the document as loaded
    pub original: Value,
    pub cli_options: IndexMap<String, Value>,
    pub source_directory: PathBuf,
    pub policy: Policy,
    pub delimiters: Delimiters,
    pub loader: Arc<dyn Loader>,
    pub cache: Arc<ResolverCache>,
    pub git: Arc<dyn GitRunner>,
    pub git_timeout: Duration,
}

impl Context {
    pub fn new(tree: Value, options: &Options, source_directory: PathBuf) -> Self {
        Self {
            original: tree.clone(),
            tree,
            cli_options: options.cli_options.clone(),
            source_directory,
            policy: options.policy,
            delimiters: options.delimiters.clone(),
            loader: options.loader.clone(),
            cache: options.cache.clone().unwrap_or_default(),
            git: options.git.clone(),
            git_timeout: options.git_timeout,
        }
    }

    /// Text of the leaf at `path` as written in the loaded document
    pub fn source_text(&self, path: &TreePath) -> Option<&str> {
        self.original.get_path(path).and_then(Value::as_str)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("source_directory", &self.source_directory)
            .field("policy", &self.policy)
            .field("delimiters", &self.delimiters)
            .finish_non_exhaustive()
    }
}

/// Result of [resolve_with_metadata]
#[derive(Debug, Clone, serde::Serialize)]
pub struct Resolved {
    pub config: Value,
    pub metadata: Metadata,
    pub original_config: Value,
    pub resolution_history: Vec<HistoryEntry>,
}

/// A failed resolution together with everything recorded up to the failure
#[derive(Debug)]
pub struct FailedResolution {
    pub error: ResolveError,
    pub metadata: Metadata,
}

impl std::fmt::Display for FailedResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for FailedResolution {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}

impl From<ResolveError> for FailedResolution {
    fn from(error: ResolveError) -> Self {
        Self {
            error,
            metadata: Metadata::default(),
        }
    }
}

/// Resolve `source` into a tree without references
pub async fn resolve(
    source: impl Into<DocumentSource>,
    options: Options,
) -> Result<Value, ResolveError> {
    Engine::new(options).resolve(source).await
}

pub async fn resolve_with_metadata(
    source: impl Into<DocumentSource>,
    options: Options,
) -> Result<Resolved, FailedResolution> {
    Engine::new(options).resolve_with_metadata(source).await
}

/// Discover and classify every reference in `source` without resolving any
pub fn analyze(
    source: impl Into<DocumentSource>,
    options: &Options,
) -> Result<crate::analyze::Analysis, ResolveError> {
    Engine::new(options.clone()).analyze(source)
}

#[derive(Debug)]
pub struct Engine {
    options: Options,
    registry: Registry,
}

impl Engine {
    pub fn new(options: Options) -> Self {
        let registry = Registry::new(&options.custom_resolvers);
        Self { options, registry }
    }

    pub async fn resolve(&self, source: impl Into<DocumentSource>) -> Result<Value, ResolveError> {
        self.resolve_with_metadata(source)
            .await
            .map(|resolved| resolved.config)
            .map_err(|failed| failed.error)
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn resolve_with_metadata(
        &self,
        source: impl Into<DocumentSource>,
    ) -> Result<Resolved, FailedResolution> {
        let (mut tree, source_directory) = self.load(source.into())?;
        let original = tree.clone();
        let delimiters = self.options.delimiters.clone();

        let lineage = normalize::normalize(
            &mut tree,
            &delimiters,
            &self.registry.known_prefixes(),
            &self.options.verbatim_keys,
        );
        let mut tracker = Tracker::new(lineage);

        let mut context = Context::new(tree, &self.options, source_directory);
        context.original = original.clone();

        let outcome = self.fixpoint(&mut context, &mut tracker).await;
        let (metadata, resolution_history) = tracker.finish(
            &context.source_directory,
            &delimiters,
            &self.options.custom_resolvers,
        );

        if let Err(error) = outcome {
            return Err(FailedResolution { error, metadata });
        }

        let mut config = context.tree;
        normalize::decode_value(&mut config, &delimiters);
        merge_keys(&mut config, &self.options.merge_keys);

        Ok(Resolved {
            config,
            metadata,
            original_config: original,
            resolution_history,
        })
    }

    pub fn analyze(
        &self,
        source: impl Into<DocumentSource>,
    ) -> Result<crate::analyze::Analysis, ResolveError> {
        let (mut tree, _) = self.load(source.into())?;
        normalize::normalize(
            &mut tree,
            &self.options.delimiters,
            &self.registry.known_prefixes(),
            &self.options.verbatim_keys,
        );
        Ok(crate::analyze::analyze(
            &tree,
            &self.registry,
            &self.options.delimiters,
        ))
    }

    fn load(&self, source: DocumentSource) -> Result<(Value, PathBuf), ResolveError> {
        let (tree, directory) = source.load(self.options.loader.as_ref())?;
        let source_directory = self
            .options
            .source_directory
            .clone()
            .or(directory)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        Ok((tree, source_directory))
    }

    async fn fixpoint(
        &self,
        context: &mut Context,
        tracker: &mut Tracker,
    ) -> Result<(), ResolveError> {
        let delimiters = context.delimiters.clone();
        let mut limit = 0;
        let mut pass = 0;

        loop {
            let leaves = unresolved_leaves(&context.tree, &delimiters);
            if leaves.is_empty() {
                tracing::debug!(passes = pass, "document resolved");
                return Ok(());
            }

            pass += 1;
            let expressions: usize = leaves.iter().map(|leaf| leaf.expressions.len()).sum();
            limit = limit.max(pass_limit(&context.tree, expressions));
            if pass > limit {
                return Err(ResolveError::Runaway { passes: pass - 1 });
            }
            tracing::debug!(pass, leaves = leaves.len(), expressions, "resolution pass");

            let snapshot: &Context = context;
            let mut outcomes: Vec<(usize, LeafOutcome)> =
                futures::stream::iter(leaves.iter().enumerate())
                    .map(|(index, leaf)| async move {
                        (index, self.resolve_leaf(leaf, snapshot).await)
                    })
                    .buffer_unordered(self.options.concurrency.max(1))
                    .collect()
                    .await;
            outcomes.sort_by_key(|(index, _)| *index);

            let mut first_error = None;
            let mut waits = Waits::default();
            for ((_, outcome), leaf) in outcomes.iter_mut().zip(&leaves) {
                for record in outcome.records.drain(..) {
                    tracker.record(pass, record, &delimiters);
                }
                if first_error.is_none() {
                    first_error = outcome.error.take();
                }
                for (raw, dependency) in &outcome.pending {
                    waits.add(&leaf.path, raw, dependency);
                }
            }

            if let Some(error) = first_error {
                return Err(error);
            }

            if let Some(cycle) = waits.find_cycle() {
                let (path, raw) = cycle.first().cloned().unwrap_or_default();
                let source = context.source_text(&path).unwrap_or(&raw).to_string();
                return Err(ResolveError::Cycle {
                    location: Location::new(path, raw, source),
                    cycle: cycle.into_iter().map(|(path, _)| path).collect(),
                });
            }

            let mut progressed = false;
            for ((_, outcome), leaf) in outcomes.into_iter().zip(leaves) {
                for (current, next) in &outcome.rewrites {
                    tracker.rewrite(&leaf.path, current, next);
                }
                if outcome.replacements.is_empty() {
                    continue;
                }

                progressed = true;
                let after = substitute(&leaf.text, outcome.replacements);
                tracing::trace!(path = %leaf.path, before = %leaf.text, after = %after, "substituted");
                if let Some(slot) = context.tree.get_path_mut(&leaf.path) {
                    *slot = after.clone();
                }
                tracker.history(HistoryEntry::new(pass, leaf.path, leaf.text, after));
            }

            if !progressed {
                return Err(ResolveError::Runaway { passes: pass });
            }
        }
    }

    async fn resolve_leaf(&self, leaf: &Leaf, context: &Context) -> LeafOutcome {
        let mut outcome = LeafOutcome::default();
        let source = context.source_text(&leaf.path).unwrap_or(&leaf.text);

        for range in &leaf.expressions {
            let raw = &leaf.text[range.clone()];
            let resolution = self
                .resolve_expression(raw, &leaf.path, source, context)
                .await;

            outcome.records.extend(resolution.records);
            match resolution.kind {
                Kind::Value(value) => outcome
                    .replacements
                    .push((range.clone(), Replacement::Value(value))),
                Kind::Verbatim(text) => outcome
                    .replacements
                    .push((range.clone(), Replacement::Text(text))),
                Kind::Rewritten(text) => {
                    outcome.rewrites.push((raw.to_string(), text.clone()));
                    outcome
                        .replacements
                        .push((range.clone(), Replacement::Text(text)));
                }
                Kind::Pending(dependency) => outcome.pending.push((raw.to_string(), dependency)),
                Kind::Failed(error) => {
                    outcome.error = Some(error);
                    break;
                }
            }
        }

        outcome
    }

    /// Resolve one expression, keeping the records of a failed attempt
    fn resolve_expression<'a>(
        &'a self,
        raw: &'a str,
        path: &'a TreePath,
        source: &'a str,
        context: &'a Context,
    ) -> BoxFuture<'a, Resolution> {
        async move {
            let mut records = vec![];
            let kind = self
                .walk_chain(raw, path, source, context, &mut records)
                .await
                .unwrap_or_else(Kind::Failed);
            Resolution { kind, records }
        }
        .boxed()
    }

    /// Walk the fallback chain of one expression
    async fn walk_chain(
        &self,
        raw: &str,
        path: &TreePath,
        source: &str,
        context: &Context,
        records: &mut Vec<ResolutionRecord>,
    ) -> Result<Kind, ResolveError> {
        let delimiters = &context.delimiters;
        let policy = context.policy;
        let location = || Location::new(path.clone(), raw.to_string(), source.to_string());

        if delimiters.body(raw).trim().is_empty() {
            return Err(ResolveError::Syntax {
                location: location(),
                message: "empty reference".to_string(),
            });
        }

        let reference = ReferenceExpression::parse(raw, path.clone(), delimiters);
        let primary_type = match reference.primary() {
            Some(Candidate::Literal(literal)) => format!("literal:{}", literal.kind()),
            Some(Candidate::Reference(body)) => self.registry.classify(body).type_name().to_string(),
            None => String::new(),
        };
        let mut draft = Draft::new(raw, path, &reference, primary_type);

        for span in expression::candidate_spans(raw, delimiters) {
            if span.text.trim().is_empty() {
                records.push(draft.fail());
                return Err(ResolveError::Syntax {
                    location: location(),
                    message: "empty candidate".to_string(),
                });
            }

            // quoted text is final, even when it looks like a reference
            let body = match Candidate::parse(&span.text) {
                Candidate::Literal(literal) => {
                    let mut value = literal.value();
                    normalize::encode_value(&mut value, delimiters);
                    let kind = format!("literal:{}", literal.kind());
                    draft.attempt(kind, &span.text, AttemptOutcome::Found, None);
                    records.push(draft.finish(Some(value.clone())));
                    return Ok(Kind::Value(value));
                }
                Candidate::Reference(body) => body,
            };

            if span.is_nested(delimiters) {
                let mut text = span.text.clone();
                let inner_ranges = scanner::find_expressions(&span.text, delimiters);
                for range in inner_ranges.into_iter().rev() {
                    let inner = self
                        .resolve_expression(&span.text[range.clone()], path, source, context)
                        .await;
                    records.extend(inner.records);
                    let replacement = match inner.kind {
                        Kind::Failed(error) => {
                            records.push(draft.fail());
                            return Err(error);
                        }
                        Kind::Pending(dependency) => return Ok(Kind::Pending(dependency)),
                        Kind::Value(value) => value.to_interpolated(),
                        Kind::Verbatim(text) | Kind::Rewritten(text) => text,
                    };
                    text.replace_range(range, &replacement);
                }

                let mut rewritten = raw.to_string();
                rewritten.replace_range(span.range.clone(), &text);
                tracing::trace!(%path, raw, %rewritten, "inner references substituted");
                return Ok(Kind::Rewritten(rewritten));
            }

            let request = Request {
                body: &body,
                path,
                source,
                context,
            };
            let (resolver, resolving) = match self.registry.dispatch(request) {
                Ok(dispatched) => dispatched,
                Err(unmatched) => {
                    if policy.allow_unknown {
                        tracing::debug!(%path, raw, "unknown reference passed through");
                        draft.resolver = unmatched.type_name().to_string();
                        records.push(draft.finish(None));
                        return Ok(Kind::verbatim(raw, delimiters));
                    }
                    let type_name = match unmatched {
                        Classification::FunctionCall(name) | Classification::Unknown(name) => name,
                        Classification::Known(resolver) => resolver.type_name().to_string(),
                    };
                    records.push(draft.fail());
                    return Err(ResolveError::UnknownReference {
                        location: location(),
                        type_name,
                    });
                }
            };

            let type_name = resolver.type_name().to_string();
            let outcome = match resolving.await {
                Ok(outcome) => outcome,
                Err(failure) => {
                    records.push(draft.fail());
                    return Err(match failure {
                        ResolverFailure::Syntax(message) => ResolveError::Syntax {
                            location: location(),
                            message,
                        },
                        ResolverFailure::Execution(message) => ResolveError::Execution {
                            location: location(),
                            resolver: type_name,
                            message,
                        },
                    });
                }
            };

            match outcome {
                Outcome::Found(mut value) => {
                    if reads_outside_document(resolver) {
                        normalize::encode_value(&mut value, delimiters);
                    }
                    draft.attempt(type_name, &body, AttemptOutcome::Found, None);
                    records.push(draft.finish(Some(value.clone())));
                    return Ok(Kind::Value(value));
                }
                Outcome::NotFound(reason) => {
                    tracing::trace!(%path, %body, %reason, "not found");
                    draft.attempt(type_name, &body, AttemptOutcome::NotFound, Some(reason));
                }
                Outcome::Undefined(reason) => {
                    tracing::trace!(%path, %body, %reason, "undefined");
                    draft.attempt(type_name, &body, AttemptOutcome::Undefined, Some(reason));
                }
                Outcome::Pending(dependency) => {
                    tracing::trace!(%path, %body, %dependency, "waiting");
                    return Ok(Kind::Pending(dependency));
                }
            }
        }

        if policy.allow_unresolved {
            tracing::debug!(%path, raw, "unresolved reference passed through");
            records.push(draft.finish(None));
            return Ok(Kind::verbatim(raw, delimiters));
        }

        let all_undefined = !draft.attempts.is_empty()
            && draft
                .attempts
                .iter()
                .all(|attempt| attempt.outcome == AttemptOutcome::Undefined);
        if policy.allow_undefined && all_undefined {
            records.push(draft.finish(Some(Value::Null)));
            return Ok(Kind::Value(Value::Null));
        }

        records.push(draft.fail());
        let reason = draft
            .attempts
            .iter()
            .filter_map(|attempt| attempt.reason.as_deref())
            .collect::<Vec<_>>()
            .join("; ");
        Err(ResolveError::Unresolved {
            location: location(),
            reason,
        })
    }
}

/// Passes allowed before resolution is declared runaway, given the tree as it stands
fn pass_limit(tree: &Value, expressions: usize) -> usize {
    16 + 4 * (tree.node_count() + expressions)
}

/// Values that did not come from the document itself are encoded so they are never rescanned
fn reads_outside_document(resolver: &Resolver) -> bool {
    matches!(
        resolver,
        Resolver::Env | Resolver::Opt | Resolver::File | Resolver::Git | Resolver::Custom(_)
    )
}

/// A string leaf that still holds expressions
#[derive(Debug)]
struct Leaf {
    path: TreePath,
    text: String,
    expressions: Vec<Range<usize>>,
}

fn unresolved_leaves(tree: &Value, delimiters: &Delimiters) -> Vec<Leaf> {
    let mut leaves = vec![];
    tree.visit_strings(&mut |path: &TreePath, text: &str| {
        let expressions = scanner::find_expressions(text, delimiters);
        if !expressions.is_empty() {
            leaves.push(Leaf {
                path: path.clone(),
                text: text.to_string(),
                expressions,
            });
        }
    });
    leaves
}

#[derive(Debug)]
enum Replacement {
    Value(Value),
    Text(String),
}

#[derive(Debug, Default)]
struct LeafOutcome {
    replacements: Vec<(Range<usize>, Replacement)>,
    /// expressions waiting for another leaf
    pending: Vec<(String, TreePath)>,
    rewrites: Vec<(String, String)>,
    records: Vec<ResolutionRecord>,
    error: Option<ResolveError>,
}

/// Apply replacements to a leaf. A leaf that is exactly one expression takes the value as is.
fn substitute(text: &str, mut replacements: Vec<(Range<usize>, Replacement)>) -> Value {
    if let [(range, Replacement::Value(_))] = replacements.as_slice() {
        if range.start == 0 && range.end == text.len() {
            if let Some((_, Replacement::Value(value))) = replacements.pop() {
                return value;
            }
        }
    }

    let mut out = text.to_string();
    for (range, replacement) in replacements.into_iter().rev() {
        match replacement {
            Replacement::Value(value) => out.replace_range(range, &value.to_interpolated()),
            Replacement::Text(text) => out.replace_range(range, &text),
        }
    }
    Value::String(out)
}

#[derive(Debug)]
enum Kind {
    Value(Value),
    /// pass the text through untouched, already encoded
    Verbatim(String),
    /// inner references were substituted, dispatch the new text on a later pass
    Rewritten(String),
    /// waiting for the leaf at this path
    Pending(TreePath),
    Failed(ResolveError),
}

impl Kind {
    /// `raw` may already carry encoded inner text, which is encoded again as a whole
    fn verbatim(raw: &str, delimiters: &Delimiters) -> Self {
        let decoded = normalize::decode_verbatim(raw, delimiters);
        Kind::Verbatim(normalize::encode_verbatim(&decoded, delimiters))
    }
}

#[derive(Debug)]
struct Resolution {
    kind: Kind,
    records: Vec<ResolutionRecord>,
}

/// A [ResolutionRecord] under construction
struct Draft<'a> {
    raw: &'a str,
    path: &'a TreePath,
    resolver: String,
    attempts: Vec<Attempt>,
    has_fallback: bool,
    is_required: bool,
}

impl<'a> Draft<'a> {
    fn new(
        raw: &'a str,
        path: &'a TreePath,
        reference: &ReferenceExpression,
        resolver: String,
    ) -> Self {
        Self {
            raw,
            path,
            resolver,
            attempts: vec![],
            has_fallback: reference.has_fallback(),
            is_required: reference.is_required(),
        }
    }

    fn attempt(
        &mut self,
        resolver: String,
        candidate: &str,
        outcome: AttemptOutcome,
        reason: Option<String>,
    ) {
        if outcome == AttemptOutcome::Found {
            self.resolver = resolver.clone();
        }
        self.attempts
            .push(Attempt::new(resolver, candidate.to_string(), outcome, reason));
    }

    fn finish(&self, final_value: Option<Value>) -> ResolutionRecord {
        ResolutionRecord {
            path: self.path.clone(),
            original: self.raw.to_string(),
            after_inner_resolution: None,
            resolver: self.resolver.clone(),
            attempts: self.attempts.clone(),
            has_fallback: self.has_fallback,
            is_required: self.is_required,
            verbatim: final_value.is_none(),
            final_value,
            pass: 0,
        }
    }

    /// Record of a chain that ended in an error
    fn fail(&self) -> ResolutionRecord {
        ResolutionRecord {
            verbatim: false,
            ..self.finish(None)
        }
    }
}

/// Expressions waiting for other leaves during one pass
#[derive(Debug, Default)]
struct Waits {
    order: Vec<TreePath>,
    edges: HashMap<TreePath, Vec<(String, TreePath)>>,
}

impl Waits {
    fn add(&mut self, from: &TreePath, raw: &str, to: &TreePath) {
        if !self.edges.contains_key(from) {
            self.order.push(from.clone());
        }
        self.edges
            .entry(from.clone())
            .or_default()
            .push((raw.to_string(), to.clone()));
    }

    /// First cycle in document order, as `(leaf, waiting expression)` pairs
    fn find_cycle(&self) -> Option<Vec<(TreePath, String)>> {
        let mut done = HashSet::new();
        for start in &self.order {
            let mut stack = vec![];
            if let Some(cycle) = self.visit(start, &mut stack, &mut done) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit(
        &self,
        node: &TreePath,
        stack: &mut Vec<(TreePath, String)>,
        done: &mut HashSet<TreePath>,
    ) -> Option<Vec<(TreePath, String)>> {
        if let Some(position) = stack.iter().position(|(path, _)| path == node) {
            return Some(stack[position..].to_vec());
        }
        if done.contains(node) {
            return None;
        }

        for (raw, next) in self.edges.get(node).into_iter().flatten() {
            stack.push((node.clone(), raw.clone()));
            if let Some(cycle) = self.visit(next, stack, done) {
                return Some(cycle);
            }
            stack.pop();
        }

        done.insert(node.clone());
        None
    }
}

/// Replace every listed key holding an array of objects by the merge of those objects
pub fn merge_keys(value: &mut Value, keys: &[String]) {
    match value {
        Value::Object(object) => {
            for (key, entry) in object.iter_mut() {
                merge_keys(entry, keys);
                if !keys.iter().any(|k| k == key) {
                    continue;
                }
                let Value::Array(items) = entry else {
                    continue;
                };
                if !items.iter().all(|item| matches!(item, Value::Object(_))) {
                    continue;
                }

                let mut merged = IndexMap::new();
                for item in items.drain(..) {
                    if let Value::Object(fields) = item {
                        merged.extend(fields);
                    }
                }
                *entry = Value::Object(merged);
            }
        }
        Value::Array(items) => {
            for item in items {
                merge_keys(item, keys);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document;
    use crate::resolvers::{FnResolver, Matcher, Outcome};
    use pretty_assertions::assert_eq;

    fn options() -> Options {
        Options::new().with_source_directory(std::env::temp_dir())
    }

    #[tokio::test]
    async fn self_references_resolve_bottom_up() {
        let tree = document!(
            r#"
            a: ${self:b}
            b: ${self:c}
            c: 3
            d: "c is ${c}"
            "#
        );

        let resolved = resolve(tree, options()).await.unwrap();
        assert_eq!(
            resolved,
            document!("a: 3\nb: 3\nc: 3\nd: c is 3\n")
        );
    }

    #[tokio::test]
    async fn single_expression_keeps_type() {
        let tree = document!("list: ${self:src}\nsrc: [1, 2]\ntext: 'x ${self:src}'\n");
        let resolved = resolve(tree, options()).await.unwrap();
        assert_eq!(
            resolved,
            document!("list: [1, 2]\nsrc: [1, 2]\ntext: 'x [1,2]'\n")
        );
    }

    #[tokio::test]
    async fn cycles_are_fatal() {
        let tree = document!("a: ${self:b}\nb: ${self:a}\n");
        let error = resolve(tree, options()).await.unwrap_err();
        let ResolveError::Cycle { cycle, location } = error else {
            panic!("expected a cycle, got {error}");
        };
        assert_eq!(
            cycle,
            vec![
                TreePath::parse_dotted("a").unwrap(),
                TreePath::parse_dotted("b").unwrap()
            ]
        );
        assert_eq!(location.reference, "${self:b}");
    }

    #[tokio::test]
    async fn self_cycle() {
        let tree = document!("a: x${self:a}\n");
        assert!(matches!(
            resolve(tree, options()).await,
            Err(ResolveError::Cycle { .. })
        ));
    }

    #[tokio::test]
    async fn empty_reference_is_a_syntax_error() {
        let tree = document!("a: '${}'\n");
        assert!(matches!(
            resolve(tree, options()).await,
            Err(ResolveError::Syntax { .. })
        ));
    }

    #[tokio::test]
    async fn empty_candidates_are_syntax_errors() {
        for yaml in ["a: '${ , ''x''}'\n", "a: '${opt:a, , ''x''}'\n"] {
            let error = resolve(document!(yaml), options().allow_unknown(true))
                .await
                .unwrap_err();
            assert!(matches!(error, ResolveError::Syntax { .. }), "{yaml}: {error}");
        }
    }

    #[tokio::test]
    async fn quoted_fallbacks_are_not_rescanned() {
        let tree = document!(r#"a: ${opt:missing, "${literal}"}"#);
        let resolved = resolve(tree, options()).await.unwrap();
        assert_eq!(resolved, document!("a: ${literal}\n"));
    }

    #[tokio::test]
    async fn outside_values_are_not_rescanned() {
        let tree = document!("password: ${opt:password}\nurl: db://u:${opt:password}@host\n");
        let options = options().with_option("password", "p@${ss}");
        let resolved = resolve(tree, options).await.unwrap();
        assert_eq!(
            resolved,
            document!("password: p@${ss}\nurl: db://u:p@${ss}@host\n")
        );
    }

    #[tokio::test]
    async fn numeric_keys_cycle() {
        let tree = document!("a:\n  '0': x${self:a.0}\n");
        let error = resolve(tree, options()).await.unwrap_err();
        let ResolveError::Cycle { cycle, .. } = error else {
            panic!("expected a cycle, got {error}");
        };
        assert_eq!(cycle, vec![TreePath::root().child_key("a").child_key("0")]);
    }

    #[tokio::test]
    async fn waiting_on_a_settled_value_is_runaway() {
        let stall = FnResolver::new("stall", Matcher::Prefix("stall:".into()), |_| {
            Ok(Outcome::Pending(TreePath::root().child_key("b")))
        });
        let tree = document!("a: ${stall:b}\nb: 1\n");
        let error = resolve(tree, options().with_resolver(stall))
            .await
            .unwrap_err();
        assert!(matches!(error, ResolveError::Runaway { passes: 1 }), "{error}");
    }

    #[test]
    fn pass_limit_grows_with_the_document() {
        let small = document!("a: 1\n");
        let large = document!("a: [1, 2, 3]\nb: { c: 1, d: 2 }\n");
        assert!(pass_limit(&small, 0) >= 16);
        assert!(pass_limit(&large, 0) > pass_limit(&small, 0));
        assert!(pass_limit(&small, 3) > pass_limit(&small, 0));
    }

    #[tokio::test]
    async fn policy() {
        let tree = || document!("a: ${opt:missing}\nb: ${ssm:/x}\n");

        let error = resolve(tree(), options()).await.unwrap_err();
        assert!(matches!(error, ResolveError::Unresolved { .. }), "{error}");

        let error = resolve(tree(), options().allow_undefined(true))
            .await
            .unwrap_err();
        assert!(matches!(error, ResolveError::UnknownReference { .. }), "{error}");

        let resolved = resolve(tree(), options().allow_undefined(true).allow_unknown(true))
            .await
            .unwrap();
        assert_eq!(resolved, document!("a: null\nb: ${ssm:/x}\n"));

        let resolved = resolve(tree(), options().allow_unresolved(true).allow_unknown(true))
            .await
            .unwrap();
        assert_eq!(resolved, document!("a: ${opt:missing}\nb: ${ssm:/x}\n"));
    }

    #[test]
    fn merging() {
        let mut tree = document!(
            r#"
            service:
              env:
                - { A: 1, B: 1 }
                - { B: 2 }
              tags: [x, y]
            "#
        );
        merge_keys(&mut tree, &["env".to_string(), "tags".to_string()]);
        assert_eq!(
            tree,
            document!("service:\n  env: { A: 1, B: 2 }\n  tags: [x, y]\n")
        );
    }

    #[test]
    fn substitution() {
        let text = "${a}-${b}";
        let replaced = substitute(
            text,
            vec![
                (0..4, Replacement::Value(Value::Integer(1))),
                (5..9, Replacement::Text("two".into())),
            ],
        );
        assert_eq!(replaced, Value::from("1-two"));

        let whole = substitute("${a}", vec![(0..4, Replacement::Value(Value::Boolean(false)))]);
        assert_eq!(whole, Value::Boolean(false));
    }
}
