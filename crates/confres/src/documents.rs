//! Loading documents into a [Value] tree
//!
//! The engine never parses file formats itself. A [Loader] turns a path into a tree and extracts
//! sub-paths from it. [FileLoader] is the default and picks a decoder by file extension:
//! - `.json` via `serde_json`
//! - `.yml` / `.yaml` via `serde_yaml`
//! - `.toml` via `toml`
//! - `.hcl` via `hcl-rs` (blocks become nested objects)
//! - anything else is returned as raw text
use crate::path::TreePath;
use crate::value::Value;
use std::path::{Path, PathBuf};

/// Turns files into trees
pub trait Loader: Send + Sync + std::fmt::Debug {
    /// Load the document at `path`
    ///
    /// `args` are the extra positional arguments of a `file(path, arg...)` reference.
    fn load(&self, path: &Path, args: &[Value]) -> Result<Value, LoadError>;

    /// Extract `dotted_path` out of a loaded tree
    fn sub_path(&self, tree: &Value, dotted_path: &str) -> Option<Value> {
        let path = TreePath::parse_dotted(dotted_path).ok()?;
        tree.get_path(&path).cloned()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileLoader;

impl Loader for FileLoader {
    fn load(&self, path: &Path, args: &[Value]) -> Result<Value, LoadError> {
        if !args.is_empty() {
            tracing::trace!(path=%path.display(), ?args, "file loader ignores arguments");
        }

        load_file(path)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("unable to parse json file {path}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unable to parse yaml file {path}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("unable to parse toml file {path}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("unable to parse hcl file {path}")]
    Hcl { path: PathBuf, source: hcl::Error },
}

/// Format of a document, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
    Hcl,
    Text,
}

impl Format {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => Format::Json,
            Some("yml" | "yaml") => Format::Yaml,
            Some("toml") => Format::Toml,
            Some("hcl") => Format::Hcl,
            _ => Format::Text,
        }
    }
}

pub fn load_file(path: &Path) -> Result<Value, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    tracing::info!(path=%path.display(), "loading file");
    let contents = std::fs::read_to_string(path)?;
    parse_str(&contents, Format::from_path(path), path)
}

pub fn parse_str(contents: &str, format: Format, path: &Path) -> Result<Value, LoadError> {
    let path = path.to_path_buf();
    match format {
        Format::Json => serde_json::from_str(contents).map_err(|source| LoadError::Json { path, source }),
        Format::Yaml => {
            if contents.trim().is_empty() {
                return Ok(Value::default());
            }
            serde_yaml::from_str(contents).map_err(|source| LoadError::Yaml { path, source })
        }
        Format::Toml => toml::from_str(contents).map_err(|source| LoadError::Toml { path, source }),
        Format::Hcl => hcl::from_str(contents).map_err(|source| LoadError::Hcl { path, source }),
        Format::Text => Ok(Value::String(contents.to_string())),
    }
}

/// What to resolve: an in-memory tree or a file to load first
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Tree(Value),
    Path(PathBuf),
}

impl DocumentSource {
    /// Load the tree. Returns the directory relative references are resolved against, if known.
    pub fn load(self, loader: &dyn Loader) -> Result<(Value, Option<PathBuf>), LoadError> {
        match self {
            DocumentSource::Tree(tree) => Ok((tree, None)),
            DocumentSource::Path(path) => {
                let path = path
                    .canonicalize()
                    .map_err(|_| LoadError::NotFound(path.clone()))?;
                let tree = loader.load(&path, &[])?;
                Ok((tree, path.parent().map(Path::to_path_buf)))
            }
        }
    }
}

impl From<Value> for DocumentSource {
    fn from(value: Value) -> Self {
        DocumentSource::Tree(value)
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(value: PathBuf) -> Self {
        DocumentSource::Path(value)
    }
}

impl From<&Path> for DocumentSource {
    fn from(value: &Path) -> Self {
        DocumentSource::Path(value.to_path_buf())
    }
}

/// Utility macro to create a [Value] tree from yaml text
///
/// ```
/// # use confres::document;
/// let tree = document!("stage: ${opt:stage, 'dev'}");
/// assert!(tree.as_object().is_some());
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use confres::document;
/// document!("not: valid: yaml");
/// ```
#[macro_export]
macro_rules! document {
    { $expr:expr } => {
        $crate::documents::parse_str(
            $expr,
            $crate::documents::Format::Yaml,
            ::std::path::Path::new("<inline>"),
        )
        .expect("document must parse")
    };
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_by_extension() {
        assert_eq!(Format::from_path(Path::new("a.JSON")), Format::Json);
        assert_eq!(Format::from_path(Path::new("a.yml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("a.toml")), Format::Toml);
        assert_eq!(Format::from_path(Path::new("a.hcl")), Format::Hcl);
        assert_eq!(Format::from_path(Path::new("a.txt")), Format::Text);
        assert_eq!(Format::from_path(Path::new("Makefile")), Format::Text);
    }

    #[test]
    fn load_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, contents: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, contents).unwrap();
            path
        };

        let json = write("a.json", r#"{ "port": 8080 }"#);
        let yaml = write("a.yml", "port: 8080\n");
        let toml = write("a.toml", "port = 8080\n");
        let hcl = write("a.hcl", "port = 8080\n");
        let text = write("a.txt", "hello\n");

        let expected = Value::from(serde_json::json!({ "port": 8080 }));
        for path in [json, yaml, toml, hcl] {
            assert_eq!(FileLoader.load(&path, &[]).unwrap(), expected, "{path:?}");
        }
        assert_eq!(FileLoader.load(&text, &[]).unwrap(), Value::from("hello\n"));
    }

    #[test]
    fn missing_file() {
        let error = FileLoader
            .load(Path::new("/definitely/not/here.json"), &[])
            .unwrap_err();
        assert!(matches!(error, LoadError::NotFound(_)));
    }

    #[test]
    fn sub_paths() {
        let tree = document!("db:\n  hosts: [a, b]\n");
        assert_eq!(FileLoader.sub_path(&tree, "db.hosts[1]"), Some(Value::from("b")));
        assert_eq!(FileLoader.sub_path(&tree, "db.port"), None);
    }
}
