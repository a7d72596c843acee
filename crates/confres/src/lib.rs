//! # confres - configuration reference resolution
//!
//! Takes a configuration document whose strings may contain references like `${env:HOME}` or
//! `${self:db.port}` and turns it into a tree without any of them.
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use confres::{document, Options};
//!
//! let tree = document!(
//!     r#"
//!     stage: ${opt:stage, 'dev'}
//!     name: app-${self:stage}
//!     replicas: ${if('${self:stage}' == 'prod', 3, 1)}
//!     "#
//! );
//!
//! let resolved = confres::resolve(tree, Options::new().with_option("stage", "prod"))
//!     .await
//!     .unwrap();
//! assert_eq!(resolved, document!("stage: prod\nname: app-prod\nreplicas: 3\n"));
//! # }
//! ```
//!
//! ## Introduction for developers
//!
//! Read this to understand how `confres` works internally.
//!
//! ### Terms
//!
//! - an **expression** is the text between `${` and its matching `}`; the delimiters can be changed
//!   ([scanner::Delimiters])
//! - its body is a comma separated list of **candidates**: the first one is the primary, the rest
//!   are fallbacks tried from left to right
//! - a candidate is either a **literal** (`'dev'`, `3`, `true`) or a **reference** body
//!   (`env:HOME`, `file(./a.json):port`, `a.b[0]`)
//! - a **resolver** knows how to produce a value for a reference body
//!
//! ### Loading
//!
//! A [DocumentSource] is either a tree that is already in memory or a path. Paths are decoded by a
//! [documents::Loader], by extension. Relative `file(...)` references are resolved against the
//! directory of the loaded document unless [Options::source_directory] says otherwise.
//!
//! ### Normalizing
//!
//! see [normalize::normalize]
//!
//! Before the first pass two things are fixed up: fallbacks written without their own `${...}` get
//! rewrapped, and strings under [Options::verbatim_keys] are encoded so they survive untouched.
//!
//! ### Resolving
//!
//! see [engine::Engine]
//!
//! Resolution runs in passes over a snapshot of the tree:
//!
//! 1. find every string leaf that still contains an expression ([scanner::find_expressions])
//! 2. split each expression into candidates ([splitter::split_top_level]) and try them in order
//! 3. a candidate that itself contains an expression is not dispatched. Its inner expressions are
//!    resolved and substituted, and the rewritten outer expression waits for the next pass. Quoted
//!    literals are taken as they are.
//! 4. reference bodies are classified by the [resolvers::Registry] and dispatched
//! 5. results are written back: an expression that is the whole string keeps the resolved value's
//!    type, otherwise the value is interpolated as text
//!
//! **Example**
//!
//! ```yaml
//! stage: prod
//! port: ${file(./env.${self:stage}.json):PORT}
//! ```
//!
//! | **pass** | **`port`**                              |
//! |----------|-----------------------------------------|
//! | 0        | `${file(./env.${self:stage}.json):PORT}` |
//! | 1        | `${file(./env.prod.json):PORT}`          |
//! | 2        | `8080`                                   |
//!
//! A self reference to a string that still holds expressions waits for a later pass. The waits
//! within one pass form a graph; a cycle in it is reported as [ResolveError::Cycle].
//!
//! Values read from outside the document (environment, options, files, git, custom resolvers) are
//! never scanned for references again.
//!
//! Lookups that find nothing ([resolvers::Outcome::NotFound], [resolvers::Outcome::Undefined])
//! move on to the next fallback. Malformed input or broken I/O ([resolvers::ResolverFailure]) ends
//! the whole resolution. What happens when all fallbacks are exhausted is up to the [Policy].
//!
//! ### Output
//!
//! The resolved tree is a [value::Value] which serializes via [serde]. Along with it
//! [resolve_with_metadata] returns a [metadata::Metadata] record for every expression.
//!
pub mod analyze;
pub mod cache;
pub mod documents;
pub mod engine;
pub mod error;
pub mod expression;
pub mod metadata;
pub mod normalize;
pub mod options;
pub mod path;
pub mod resolvers;
pub mod scanner;
pub mod splitter;
pub mod value;
mod visit;

pub use documents::DocumentSource;
pub use engine::{analyze, resolve, resolve_with_metadata, Engine, FailedResolution, Resolved};
pub use error::ResolveError;
pub use options::{Options, Policy};
pub use value::Value;
