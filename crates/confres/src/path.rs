//! Addressing nodes inside a document
//!
//! A [TreePath] is displayed as `servers[0].port` and can be parsed from the
//! dotted notation used in references (`servers.0.port` or `servers[0].port`).

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath {
    segments: Vec<PathSegment>,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("empty segment in path `{0}`")]
    EmptySegment(String),
    #[error("unterminated index in path `{0}`")]
    UnterminatedIndex(String),
    #[error("invalid index `{index}` in path `{path}`")]
    InvalidIndex { path: String, index: String },
}

impl TreePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn child_key(&self, key: impl Into<String>) -> Self {
        self.child(PathSegment::Key(key.into()))
    }

    pub fn child_index(&self, index: usize) -> Self {
        self.child(PathSegment::Index(index))
    }

    /// Parse `a.b[0].c` or `a.b.0.c`
    ///
    /// Numeric dotted segments become [PathSegment::Index]; lookups treat those as object keys
    /// when the parent turns out to be an object.
    pub fn parse_dotted(text: &str) -> Result<Self, PathError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = vec![];
        for part in text.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(bracket) => (&part[..bracket], &part[bracket..]),
                None => (part, ""),
            };

            if key.is_empty() && rest.is_empty() {
                return Err(PathError::EmptySegment(text.to_string()));
            }

            if !key.is_empty() {
                match key.parse::<usize>() {
                    Ok(index) if index.to_string() == key => {
                        segments.push(PathSegment::Index(index))
                    }
                    _ => segments.push(PathSegment::Key(key.to_string())),
                }
            }

            while let Some(stripped) = rest.strip_prefix('[') {
                let Some(close) = stripped.find(']') else {
                    return Err(PathError::UnterminatedIndex(text.to_string()));
                };
                let index = &stripped[..close];
                let index = index.parse::<usize>().map_err(|_| PathError::InvalidIndex {
                    path: text.to_string(),
                    index: index.to_string(),
                })?;
                segments.push(PathSegment::Index(index));
                rest = &stripped[close + 1..];
            }

            if !rest.is_empty() {
                return Err(PathError::InvalidIndex {
                    path: text.to_string(),
                    index: rest.to_string(),
                });
            }
        }

        Ok(Self { segments })
    }
}

impl std::fmt::Display for TreePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<root>");
        }

        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if position == 0 => f.write_str(key)?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl serde::Serialize for TreePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_and_display() {
        let path = TreePath::parse_dotted("servers[0].port").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("servers".into()),
                PathSegment::Index(0),
                PathSegment::Key("port".into())
            ]
        );
        assert_eq!(path.to_string(), "servers[0].port");
    }

    #[test]
    fn numeric_segments_are_indices() {
        let path = TreePath::parse_dotted("list.2").unwrap();
        assert_eq!(
            path.segments(),
            &[PathSegment::Key("list".into()), PathSegment::Index(2)]
        );
    }

    #[test]
    fn malformed_paths() {
        assert_eq!(TreePath::parse_dotted(""), Err(PathError::Empty));
        assert!(matches!(
            TreePath::parse_dotted("a..b"),
            Err(PathError::EmptySegment(_))
        ));
        assert!(matches!(
            TreePath::parse_dotted("a[1"),
            Err(PathError::UnterminatedIndex(_))
        ));
        assert!(matches!(
            TreePath::parse_dotted("a[x]"),
            Err(PathError::InvalidIndex { .. })
        ));
    }
}
