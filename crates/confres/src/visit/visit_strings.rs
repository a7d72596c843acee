use super::{Visit, VisitMut};
use crate::path::TreePath;
use crate::value::Value;

/// Recursively visit all string leaves
pub trait VisitStrings {
    fn visit_strings(&self, visitor: &mut dyn Visit<str>);
}

/// Recursively visit all string leaves mutably
pub trait VisitStringsMut {
    fn visit_strings_mut(&mut self, visitor: &mut dyn VisitMut<String>);
}

impl VisitStrings for Value {
    fn visit_strings(&self, visitor: &mut dyn Visit<str>) {
        visit_strings_at(self, &TreePath::root(), visitor)
    }
}

impl VisitStringsMut for Value {
    fn visit_strings_mut(&mut self, visitor: &mut dyn VisitMut<String>) {
        visit_strings_mut_at(self, &TreePath::root(), visitor)
    }
}

fn visit_strings_at(value: &Value, path: &TreePath, visitor: &mut dyn Visit<str>) {
    match value {
        Value::String(string) => visitor.visit(path, string),
        Value::Array(array) => {
            for (index, element) in array.iter().enumerate() {
                visit_strings_at(element, &path.child_index(index), visitor);
            }
        }
        Value::Object(object) => {
            for (key, element) in object {
                visit_strings_at(element, &path.child_key(key.as_str()), visitor);
            }
        }
        _ => {}
    }
}

fn visit_strings_mut_at(value: &mut Value, path: &TreePath, visitor: &mut dyn VisitMut<String>) {
    match value {
        Value::String(string) => visitor.visit_mut(path, string),
        Value::Array(array) => {
            for (index, element) in array.iter_mut().enumerate() {
                visit_strings_mut_at(element, &path.child_index(index), visitor);
            }
        }
        Value::Object(object) => {
            for (key, element) in object.iter_mut() {
                let child = path.child_key(key.as_str());
                visit_strings_mut_at(element, &child, visitor);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn visits_leaves_in_document_order() {
        let mut value: Value =
            serde_json::json!({ "a": "one", "b": [1, "two", { "c": "three" }], "d": false }).into();

        let mut seen = vec![];
        value.visit_strings(&mut |path: &TreePath, text: &str| {
            seen.push((path.to_string(), text.to_string()))
        });
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), "one".to_string()),
                ("b[1]".to_string(), "two".to_string()),
                ("b[2].c".to_string(), "three".to_string()),
            ]
        );

        value.visit_strings_mut(&mut |_: &TreePath, text: &mut String| text.make_ascii_uppercase());
        assert_eq!(
            value,
            Value::from(serde_json::json!({ "a": "ONE", "b": [1, "TWO", { "c": "THREE" }], "d": false }))
        );
    }
}
