//! `${file(./path.json)}`, `${file(./path.yml):some.key}`, `${file(./path.json, arg)}`
//!
//! Relative paths are resolved against the source directory. Decoding is left to the configured
//! [Loader](crate::documents::Loader); loaded trees are memoized in the request's cache.
//!
//! A missing file is "not found" and falls through to the next candidate. A missing sub-path is
//! "undefined". A file that exists but cannot be decoded is a hard failure.
use super::{Outcome, Request, ResolverFailure, ResolverResult};
use crate::cache::CacheKey;
use crate::documents::LoadError;
use crate::expression;
use crate::value::Value;
use std::path::{Path, PathBuf};

/// A parsed `file(...)` body
#[derive(Debug, Clone, PartialEq)]
pub struct FileReference {
    /// path as written
    pub path: String,
    pub args: Vec<Value>,
    pub sub_path: Option<String>,
}

impl FileReference {
    pub fn parse(body: &str) -> Result<Self, ResolverFailure> {
        let call = match expression::Call::parse(body) {
            Some(Ok(call)) if call.name == "file" => call,
            Some(Err(message)) => return Err(ResolverFailure::Syntax(message)),
            _ => {
                return Err(ResolverFailure::Syntax(format!(
                    "expected `file(<path>)`, got `{body}`"
                )))
            }
        };

        let mut arguments = call.arguments().into_iter();
        let path = arguments.next().unwrap_or_default();
        let path = expression::parse_quoted(&path).unwrap_or(path);
        if path.trim().is_empty() {
            return Err(ResolverFailure::Syntax(
                "file reference without a path".to_string(),
            ));
        }

        let args = arguments
            .map(|argument| match expression::parse_literal(&argument) {
                Some(literal) => literal.value(),
                None => Value::String(argument),
            })
            .collect();

        let sub_path = call
            .sub_path()
            .map_err(ResolverFailure::Syntax)?
            .map(str::to_string);

        Ok(Self {
            path: path.trim().to_string(),
            args,
            sub_path,
        })
    }

    /// Absolute location of the file
    pub fn location(&self, source_directory: &Path) -> PathBuf {
        let path = Path::new(&self.path);
        if path.is_absolute() {
            return path.to_path_buf();
        }

        // drops `.` segments so `a.json` and `./a.json` share a cache entry
        source_directory.join(path).components().collect()
    }
}

pub(crate) async fn resolve(request: Request<'_>) -> ResolverResult {
    let reference = FileReference::parse(request.body)?;
    let context = request.context;
    let location = reference.location(&context.source_directory);

    let cache_key = CacheKey::new(
        &context.source_directory,
        "file",
        format!("{}{:?}", location.display(), reference.args),
    );

    let tree = match context.cache.get(&cache_key) {
        Some(Some(tree)) => tree,
        Some(None) => return Ok(not_found(&location)),
        None => {
            let loader = context.loader.clone();
            let args = reference.args.clone();
            let path = location.clone();
            let loaded = tokio::task::spawn_blocking(move || loader.load(&path, &args))
                .await
                .map_err(|e| ResolverFailure::Execution(format!("file loader panicked: {e}")))?;

            match loaded {
                Ok(tree) => {
                    context.cache.insert(cache_key, Some(tree.clone()));
                    tree
                }
                Err(LoadError::NotFound(_)) => {
                    context.cache.insert(cache_key, None);
                    return Ok(not_found(&location));
                }
                Err(error) => {
                    return Err(ResolverFailure::Execution(error_chain(&error)));
                }
            }
        }
    };

    let Some(sub_path) = reference.sub_path else {
        return Ok(Outcome::Found(tree));
    };

    Ok(match context.loader.sub_path(&tree, &sub_path) {
        Some(value) => Outcome::Found(value),
        None => Outcome::Undefined(format!(
            "`{sub_path}` does not exist in {}",
            location.display()
        )),
    })
}

fn not_found(location: &Path) -> Outcome {
    Outcome::NotFound(format!("file {} does not exist", location.display()))
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::Context;
    use crate::options::Options;
    use crate::resolvers::test::request;
    use pretty_assertions::assert_eq;

    fn context_in(dir: &Path) -> Context {
        Context::new(Value::default(), &Options::default(), dir.to_path_buf())
    }

    #[test]
    fn parse_forms() {
        let reference = FileReference::parse("file(./a.json, 'x', 2):db.port").unwrap();
        assert_eq!(reference.path, "./a.json");
        assert_eq!(reference.args, vec![Value::from("x"), Value::Integer(2)]);
        assert_eq!(reference.sub_path.as_deref(), Some("db.port"));

        let quoted = FileReference::parse("file('./my file.yml')").unwrap();
        assert_eq!(quoted.path, "./my file.yml");
        assert_eq!(quoted.sub_path, None);
    }

    #[test]
    fn parse_errors() {
        for body in ["file()", "file(./a.json", "file(./a.json)port", "file(./a.json):"] {
            assert!(
                matches!(FileReference::parse(body), Err(ResolverFailure::Syntax(_))),
                "{body}"
            );
        }
    }

    #[tokio::test]
    async fn load_and_extract() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("env.prod.json"), r#"{ "PORT": 8080 }"#).unwrap();
        let context = context_in(dir.path());

        assert_eq!(
            resolve(request("file(./env.prod.json):PORT", &context)).await,
            Ok(Outcome::Found(Value::Integer(8080)))
        );
        assert_eq!(
            resolve(request("file(env.prod.json)", &context)).await,
            Ok(Outcome::Found(serde_json::json!({ "PORT": 8080 }).into()))
        );
        assert!(matches!(
            resolve(request("file(./env.prod.json):HOST", &context)).await,
            Ok(Outcome::Undefined(_))
        ));
        assert!(matches!(
            resolve(request("file(./env.dev.json)", &context)).await,
            Ok(Outcome::NotFound(_))
        ));
        // the file was read once, the missing one remembered as missing
        assert_eq!(context.cache.len(), 2);
    }

    #[tokio::test]
    async fn broken_file_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ nope").unwrap();
        let context = context_in(dir.path());

        assert!(matches!(
            resolve(request("file(./broken.json)", &context)).await,
            Err(ResolverFailure::Execution(_))
        ));
    }
}
