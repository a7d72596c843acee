//! Discovery of every reference in a document without resolving anything
use crate::expression::{self, Candidate, ReferenceExpression};
use crate::metadata::Summary;
use crate::path::TreePath;
use crate::resolvers::file::FileReference;
use crate::resolvers::Registry;
use crate::scanner::{self, Delimiters};
use crate::value::Value;
use crate::visit::VisitStrings;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DiscoveredCandidate {
    pub text: String,
    #[serde(rename = "type")]
    pub resolver: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DiscoveredVariable {
    pub path: TreePath,
    pub raw: String,
    /// type of the primary candidate
    #[serde(rename = "type")]
    pub resolver: String,
    pub candidates: Vec<DiscoveredCandidate>,
    pub has_fallback: bool,
    pub is_required: bool,
    /// found inside another expression
    pub nested: bool,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Analysis {
    pub variables: Vec<DiscoveredVariable>,
    pub file_refs: Vec<String>,
    pub summary: Summary,
}

pub fn analyze(tree: &Value, registry: &Registry, delimiters: &Delimiters) -> Analysis {
    let mut analysis = Analysis::default();

    tree.visit_strings(&mut |path: &TreePath, text: &str| {
        for range in scanner::find_expressions(text, delimiters) {
            discover(&text[range], path, false, registry, delimiters, &mut analysis);
        }
    });

    let mut seen = std::collections::HashSet::new();
    for variable in &analysis.variables {
        if !seen.insert(variable.raw.as_str()) {
            continue;
        }
        analysis.summary.total_variables += 1;
        if variable.is_required {
            analysis.summary.required_variables += 1;
        }
        if variable.has_fallback {
            analysis.summary.variables_with_defaults += 1;
        }
    }

    tracing::debug!(summary = ?analysis.summary, "analyzed");
    analysis
}

fn discover(
    raw: &str,
    path: &TreePath,
    nested: bool,
    registry: &Registry,
    delimiters: &Delimiters,
    analysis: &mut Analysis,
) {
    let reference = ReferenceExpression::parse(raw, path.clone(), delimiters);
    let spans = expression::candidate_spans(raw, delimiters);

    let candidates: Vec<DiscoveredCandidate> = spans
        .iter()
        .map(|span| {
            let resolver = match Candidate::parse(&span.text) {
                Candidate::Literal(literal) => format!("literal:{}", literal.kind()),
                Candidate::Reference(body) => registry.classify(&body).type_name().to_string(),
            };
            DiscoveredCandidate {
                text: span.text.clone(),
                resolver,
            }
        })
        .collect();

    for candidate in candidates.iter().filter(|c| c.resolver == "file") {
        if let Ok(file) = FileReference::parse(&candidate.text) {
            if !analysis.file_refs.contains(&file.path) {
                analysis.file_refs.push(file.path);
            }
        }
    }

    analysis.variables.push(DiscoveredVariable {
        path: path.clone(),
        raw: raw.to_string(),
        resolver: candidates
            .first()
            .map(|c| c.resolver.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        candidates,
        has_fallback: reference.has_fallback(),
        is_required: reference.is_required(),
        nested,
    });

    let nested_spans = spans.iter().filter(|span| {
        !Candidate::parse(&span.text).is_literal() && span.is_nested(delimiters)
    });
    for span in nested_spans {
        for range in scanner::find_expressions(&span.text, delimiters) {
            discover(&span.text[range], path, true, registry, delimiters, analysis);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document;
    use pretty_assertions::assert_eq;

    #[test]
    fn discovers_nested_references() {
        let tree = document!(
            r#"
            stage: ${opt:stage, 'dev'}
            port: ${file(./env.${self:stage}.json):PORT}
            greeting: hello ${self:stage} and ${ssm:/x}
            "#
        );
        let analysis = analyze(&tree, &Registry::default(), &Delimiters::default());

        let summary: Vec<(&str, &str, bool)> = analysis
            .variables
            .iter()
            .map(|v| (v.raw.as_str(), v.resolver.as_str(), v.nested))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("${opt:stage, 'dev'}", "opt", false),
                ("${file(./env.${self:stage}.json):PORT}", "file", false),
                ("${self:stage}", "self", true),
                ("${self:stage}", "self", false),
                ("${ssm:/x}", "unknown", false),
            ]
        );
        assert_eq!(
            analysis.variables[0].candidates[1].resolver,
            "literal:string"
        );
        assert_eq!(analysis.file_refs, vec!["./env.${self:stage}.json"]);
        assert_eq!(
            analysis.summary,
            Summary {
                total_variables: 4,
                required_variables: 3,
                variables_with_defaults: 1,
            }
        );
    }
}
