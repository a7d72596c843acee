//! Errors raised while resolving a document
use crate::documents::LoadError;
use crate::path::TreePath;

/// Where a reference-level error happened
#[derive(derive_new::new, Debug, Clone, PartialEq)]
pub struct Location {
    /// path of the string leaf holding the reference
    pub path: TreePath,
    /// the offending reference expression
    pub reference: String,
    /// the leaf's text as written in the source document
    pub source: String,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "`{}` at {} (source: `{}`)",
            self.reference, self.path, self.source
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    /// Malformed expression. Never retried.
    #[error("invalid reference syntax {location}: {message}")]
    Syntax { location: Location, message: String },

    /// Every candidate of a fallback chain came up empty
    #[error("unable to resolve {location}: {reason}")]
    Unresolved { location: Location, reason: String },

    /// No resolver recognizes the reference type
    #[error("unknown reference type `{type_name}` in {location}")]
    UnknownReference {
        location: Location,
        type_name: String,
    },

    /// References depend on each other
    #[error("reference cycle detected: {}", display_cycle(.cycle))]
    Cycle {
        location: Location,
        cycle: Vec<TreePath>,
    },

    /// A resolver's own work failed (unreadable file, failed evaluation, ...)
    #[error("resolver `{resolver}` failed for {location}: {message}")]
    Execution {
        location: Location,
        resolver: String,
        message: String,
    },

    #[error("resolution did not settle after {passes} passes")]
    Runaway { passes: usize },

    #[error("unable to load document")]
    Load(#[from] LoadError),
}

impl ResolveError {
    pub fn location(&self) -> Option<&Location> {
        match self {
            ResolveError::Syntax { location, .. }
            | ResolveError::Unresolved { location, .. }
            | ResolveError::UnknownReference { location, .. }
            | ResolveError::Cycle { location, .. }
            | ResolveError::Execution { location, .. } => Some(location),
            ResolveError::Runaway { .. } | ResolveError::Load(_) => None,
        }
    }
}

fn display_cycle(cycle: &[TreePath]) -> String {
    let mut parts: Vec<String> = cycle.iter().map(ToString::to_string).collect();
    if let Some(first) = parts.first().cloned() {
        parts.push(first);
    }
    parts.join(" -> ")
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cycle_message_names_every_path() {
        let a = TreePath::parse_dotted("a").unwrap();
        let b = TreePath::parse_dotted("b").unwrap();
        let error = ResolveError::Cycle {
            location: Location::new(a.clone(), "${self:b}".into(), "${self:b}".into()),
            cycle: vec![a, b],
        };

        assert_eq!(error.to_string(), "reference cycle detected: a -> b -> a");
    }

    #[test]
    fn messages_carry_location() {
        let error = ResolveError::Unresolved {
            location: Location::new(
                TreePath::parse_dotted("db.host").unwrap(),
                "${env:DB_HOST}".into(),
                "postgres://${env:DB_HOST}".into(),
            ),
            reason: "environment variable `DB_HOST` is not set".into(),
        };

        assert_eq!(
            error.to_string(),
            "unable to resolve `${env:DB_HOST}` at db.host (source: `postgres://${env:DB_HOST}`): \
             environment variable `DB_HOST` is not set"
        );
    }
}
