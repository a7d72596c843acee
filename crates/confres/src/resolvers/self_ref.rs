//! `${self:a.b}` and bare `${a.b}`: lookups inside the document being resolved
//!
//! Lookups check for presence, not truthiness. `0`, `false`, `""` and `null` are values.
//!
//! A lookup that lands on (or passes through) a string which still holds references reports
//! [Outcome::Pending] with the path of that string, so the engine can wait for it or detect a cycle.
use super::{Outcome, Request, ResolverFailure, ResolverResult};
use crate::path::{PathSegment, TreePath};
use crate::scanner::{self, Delimiters};
use crate::value::Value;
use crate::visit::VisitStrings;

pub(crate) fn resolve(request: &Request<'_>) -> ResolverResult {
    let key = request.key("self")?;
    lookup(request, key)
}

pub(crate) fn resolve_dotted(request: &Request<'_>) -> ResolverResult {
    lookup(request, request.body.trim())
}

fn lookup(request: &Request<'_>, key: &str) -> ResolverResult {
    let path = TreePath::parse_dotted(key)
        .map_err(|e| ResolverFailure::Syntax(format!("invalid self reference: {e}")))?;

    Ok(find(
        &request.context.tree,
        &path,
        &request.context.delimiters,
    ))
}

/// Presence lookup of `path` in `tree`
///
/// Pending paths are spelled the way the document is shaped, so `a.0` under an object waits for
/// the key `"0"` rather than an index.
pub fn find(tree: &Value, path: &TreePath, delimiters: &Delimiters) -> Outcome {
    let mut current = tree;
    let mut walked = TreePath::root();

    for segment in path.segments() {
        if let Value::String(text) = current {
            if scanner::contains_expression(text, delimiters) {
                return Outcome::Pending(walked);
            }
        }

        let Some(next) = current.get_segment(segment) else {
            return Outcome::Undefined(format!("`{path}` does not exist in this document"));
        };
        walked = walked.child(walked_segment(current, segment));
        current = next;
    }

    if let Some(unresolved) = first_unresolved(current, delimiters) {
        let pending = unresolved
            .segments()
            .iter()
            .cloned()
            .fold(walked, |path, segment| path.child(segment));
        return Outcome::Pending(pending);
    }

    Outcome::Found(current.clone())
}

fn walked_segment(parent: &Value, segment: &PathSegment) -> PathSegment {
    match (parent, segment) {
        (Value::Object(_), PathSegment::Index(index)) => PathSegment::Key(index.to_string()),
        (Value::Array(_), PathSegment::Key(key)) => key
            .parse()
            .map(PathSegment::Index)
            .unwrap_or_else(|_| segment.clone()),
        _ => segment.clone(),
    }
}

/// Relative path of the first string in `value` that still holds a reference
fn first_unresolved(value: &Value, delimiters: &Delimiters) -> Option<TreePath> {
    let mut found = None;
    value.visit_strings(&mut |path: &TreePath, text: &str| {
        if found.is_none() && scanner::contains_expression(text, delimiters) {
            found = Some(path.clone());
        }
    });
    found
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document;
    use crate::resolvers::test::{context, request};
    use pretty_assertions::assert_eq;

    #[test]
    fn falsy_values_are_found() {
        let context = context(document!("zero: 0\nno: false\nempty: ''\nnothing: ~"));

        assert_eq!(
            resolve(&request("self:zero", &context)),
            Ok(Outcome::Found(Value::Integer(0)))
        );
        assert_eq!(
            resolve(&request("self:no", &context)),
            Ok(Outcome::Found(Value::Boolean(false)))
        );
        assert_eq!(
            resolve(&request("self:empty", &context)),
            Ok(Outcome::Found("".into()))
        );
        assert_eq!(
            resolve(&request("self:nothing", &context)),
            Ok(Outcome::Found(Value::Null))
        );
        assert!(matches!(
            resolve(&request("self:missing", &context)),
            Ok(Outcome::Undefined(_))
        ));
    }

    #[test]
    fn subtrees_and_indices() {
        let context = context(document!("db:\n  hosts: [a, b]\n  port: 5432\n"));

        assert_eq!(
            resolve_dotted(&request("db.hosts[1]", &context)),
            Ok(Outcome::Found("b".into()))
        );
        assert_eq!(
            resolve(&request("self:db", &context)),
            Ok(Outcome::Found(
                serde_json::json!({ "hosts": ["a", "b"], "port": 5432 }).into()
            ))
        );
    }

    #[test]
    fn unresolved_targets_are_pending() {
        let context = context(document!(
            "a: ${self:b}\nnested:\n  x: 1\n  y: ${env:Y}\n"
        ));

        assert_eq!(
            resolve(&request("self:a", &context)),
            Ok(Outcome::Pending(TreePath::parse_dotted("a").unwrap()))
        );
        assert_eq!(
            resolve(&request("self:nested", &context)),
            Ok(Outcome::Pending(TreePath::parse_dotted("nested.y").unwrap()))
        );
        assert_eq!(
            resolve(&request("self:a.deeper", &context)),
            Ok(Outcome::Pending(TreePath::parse_dotted("a").unwrap()))
        );
    }

    #[test]
    fn pending_paths_follow_the_document_shape() {
        let context = context(document!("a:\n  '0': ${self:x}\nlist: [1, '${self:y}']\n"));

        assert_eq!(
            resolve(&request("self:a.0", &context)),
            Ok(Outcome::Pending(TreePath::root().child_key("a").child_key("0")))
        );
        assert_eq!(
            resolve(&request("self:list", &context)),
            Ok(Outcome::Pending(TreePath::root().child_key("list").child_index(1)))
        );
    }

    #[test]
    fn malformed_keys() {
        let context = context(Value::default());
        assert!(matches!(
            resolve(&request("self:", &context)),
            Err(ResolverFailure::Syntax(_))
        ));
        assert!(matches!(
            resolve(&request("self:a..b", &context)),
            Err(ResolverFailure::Syntax(_))
        ));
    }
}
