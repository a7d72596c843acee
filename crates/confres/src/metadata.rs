//! Per-reference records of how a document was resolved
//!
//! The tracker only observes. Nothing recorded here feeds back into resolution.
use crate::expression::{self, Candidate};
use crate::normalize::{self, Lineage};
use crate::path::TreePath;
use crate::resolvers::file::FileReference;
use crate::resolvers::CustomResolver;
use crate::scanner::Delimiters;
use crate::value::Value;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptOutcome {
    Found,
    NotFound,
    Undefined,
}

/// One candidate of a fallback chain that was tried
#[derive(derive_new::new, Debug, Clone, PartialEq, serde::Serialize)]
pub struct Attempt {
    #[serde(rename = "type")]
    pub resolver: String,
    pub candidate: String,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ResolutionRecord {
    pub path: TreePath,
    /// the expression as written in the source document
    pub original: String,
    /// the body that was finally dispatched, if substituting inner references changed it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_inner_resolution: Option<String>,
    /// type of the candidate that produced the value, or of the primary one if none did
    #[serde(rename = "type")]
    pub resolver: String,
    pub attempts: Vec<Attempt>,
    pub has_fallback: bool,
    pub is_required: bool,
    /// `None` when the expression was passed through verbatim
    pub final_value: Option<Value>,
    pub verbatim: bool,
    pub pass: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Summary {
    pub total_variables: usize,
    pub required_variables: usize,
    pub variables_with_defaults: usize,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Metadata {
    /// keyed by the reference text as written
    pub variables: IndexMap<String, Vec<ResolutionRecord>>,
    /// file paths as written
    pub file_refs: Vec<String>,
    /// absolute locations of the files that were looked up
    pub resolved_file_refs: Vec<PathBuf>,
    pub summary: Summary,
    pub custom: IndexMap<String, Value>,
}

/// A leaf changing during a pass
#[derive(derive_new::new, Debug, Clone, PartialEq, serde::Serialize)]
pub struct HistoryEntry {
    pub pass: usize,
    pub path: TreePath,
    pub before: String,
    pub after: Value,
}

#[derive(Debug, Default)]
pub struct Tracker {
    records: Vec<ResolutionRecord>,
    history: Vec<HistoryEntry>,
    lineage: Lineage,
}

impl Tracker {
    pub fn new(lineage: Lineage) -> Self {
        Self {
            lineage,
            ..Default::default()
        }
    }

    pub fn record(&mut self, pass: usize, mut record: ResolutionRecord, delimiters: &Delimiters) {
        let (original, rewritten) = self.lineage.original(&record.path, &record.original);
        if rewritten {
            record.after_inner_resolution = Some(delimiters.body(&record.original).to_string());
        }
        record.original = original.to_string();
        record.pass = pass;

        tracing::trace!(path = %record.path, original = %record.original, "recorded");
        self.records.push(record);
    }

    pub fn rewrite(&mut self, path: &TreePath, current: &str, next: &str) {
        self.lineage.rewrite(path, current, next);
    }

    pub fn history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    /// Build the final [Metadata], decoding verbatim text in recorded values
    pub fn finish(
        self,
        source_directory: &Path,
        delimiters: &Delimiters,
        custom_resolvers: &[Arc<dyn CustomResolver>],
    ) -> (Metadata, Vec<HistoryEntry>) {
        let mut metadata = Metadata::default();

        for mut record in self.records {
            if let Some(value) = record.final_value.as_mut() {
                normalize::decode_value(value, delimiters);
            }
            record.original = normalize::decode_verbatim(&record.original, delimiters);
            if let Some(body) = record.after_inner_resolution.as_mut() {
                *body = normalize::decode_verbatim(body, delimiters);
            }
            for attempt in &mut record.attempts {
                attempt.candidate = normalize::decode_verbatim(&attempt.candidate, delimiters);
            }
            collect_file_refs(&record, source_directory, delimiters, &mut metadata);
            metadata
                .variables
                .entry(record.original.clone())
                .or_default()
                .push(record);
        }

        metadata.summary = summarize(&metadata.variables);

        for resolver in custom_resolvers {
            if let Some((key, value)) = resolver.collect_metadata(&metadata) {
                metadata.custom.insert(key, value);
            }
        }

        let mut history = self.history;
        for entry in &mut history {
            entry.before = normalize::decode_verbatim(&entry.before, delimiters);
            normalize::decode_value(&mut entry.after, delimiters);
        }

        (metadata, history)
    }
}

fn summarize(variables: &IndexMap<String, Vec<ResolutionRecord>>) -> Summary {
    let firsts = || variables.values().filter_map(|records| records.first());
    Summary {
        total_variables: variables.len(),
        required_variables: firsts().filter(|record| record.is_required).count(),
        variables_with_defaults: firsts().filter(|record| record.has_fallback).count(),
    }
}

fn collect_file_refs(
    record: &ResolutionRecord,
    source_directory: &Path,
    delimiters: &Delimiters,
    metadata: &mut Metadata,
) {
    for span in expression::candidate_spans(&record.original, delimiters) {
        let Candidate::Reference(body) = Candidate::parse(&span.text) else {
            continue;
        };
        if !body.starts_with("file(") {
            continue;
        }
        if let Ok(reference) = FileReference::parse(&body) {
            push_unique(&mut metadata.file_refs, reference.path);
        }
    }

    for attempt in record.attempts.iter().filter(|a| a.resolver == "file") {
        if let Ok(reference) = FileReference::parse(&attempt.candidate) {
            push_unique(
                &mut metadata.resolved_file_refs,
                reference.location(source_directory),
            );
        }
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(original: &str, attempts: Vec<Attempt>) -> ResolutionRecord {
        ResolutionRecord {
            path: TreePath::root().child_key("port"),
            original: original.to_string(),
            after_inner_resolution: None,
            resolver: "file".to_string(),
            attempts,
            has_fallback: false,
            is_required: true,
            final_value: Some(Value::Integer(8080)),
            verbatim: false,
            pass: 0,
        }
    }

    #[test]
    fn lineage_and_file_refs() {
        let d = Delimiters::default();
        let path = TreePath::root().child_key("port");
        let mut tracker = Tracker::default();
        tracker.rewrite(
            &path,
            "${file(./env.${self:stage}.json):PORT}",
            "${file(./env.prod.json):PORT}",
        );
        tracker.record(
            2,
            record(
                "${file(./env.prod.json):PORT}",
                vec![Attempt::new(
                    "file".into(),
                    "file(./env.prod.json):PORT".into(),
                    AttemptOutcome::Found,
                    None,
                )],
            ),
            &d,
        );

        let (metadata, _) = tracker.finish(Path::new("/srv"), &d, &[]);
        let records = &metadata.variables["${file(./env.${self:stage}.json):PORT}"];
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].after_inner_resolution.as_deref(),
            Some("file(./env.prod.json):PORT")
        );
        assert_eq!(records[0].pass, 2);
        assert_eq!(metadata.file_refs, vec!["./env.${self:stage}.json".to_string()]);
        assert_eq!(
            metadata.resolved_file_refs,
            vec![PathBuf::from("/srv/env.prod.json")]
        );
        assert_eq!(
            metadata.summary,
            Summary {
                total_variables: 1,
                required_variables: 1,
                variables_with_defaults: 0,
            }
        );
    }
}
