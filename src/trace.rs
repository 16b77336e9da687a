//! Recorded usage traces.
//!
//! A trace is a JSON document listing requests, the querysets each request
//! executed, and the usage of every instance those querysets produced.
//! Instances are given either as usage records:
//!
//! ```json
//! { "used_fields": ["title"], "unused_fields": ["body"], "unused_fields_size": 120 }
//! ```
//!
//! or as fetched rows plus the names read on them:
//!
//! ```json
//! { "fields": { "title": "Eraserhead", "body": "..." }, "read": ["title"] }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::instance::{FieldValue, InstanceUsage};
use crate::queryset::{Model, QuerySet, QuerySetStorage};
use crate::request::{RequestContext, RequestStorage};

/// A fetched row and the names read on it.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRow {
    fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    read: Vec<String>,
}

/// An instance as written in the trace.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawInstance {
    Row(RawRow),
    Usage(InstanceUsage),
}

impl From<RawInstance> for InstanceUsage {
    fn from(raw: RawInstance) -> Self {
        match raw {
            RawInstance::Row(row) => InstanceUsage::from_fields(&row.fields, &row.read),
            RawInstance::Usage(usage) => usage,
        }
    }
}

fn deserialize_instances<'de, D>(deserializer: D) -> std::result::Result<Vec<InstanceUsage>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<RawInstance>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(Into::into).collect())
}

fn default_method() -> String {
    "GET".to_owned()
}

/// A recorded queryset execution.
#[derive(Debug, Deserialize)]
pub struct TracedQuerySet {
    pub model: Model,
    #[serde(default)]
    pub traceback: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_instances")]
    pub instances: Vec<InstanceUsage>,
}

impl QuerySet for TracedQuerySet {
    fn model(&self) -> &Model {
        &self.model
    }

    fn traceback(&self) -> &[String] {
        &self.traceback
    }
}

/// A recorded request.
#[derive(Debug, Deserialize)]
pub struct TracedRequest {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
    #[serde(default = "Utc::now")]
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub querysets: Vec<TracedQuerySet>,
}

impl TracedRequest {
    pub fn context(&self) -> RequestContext {
        RequestContext {
            id: self.id,
            method: self.method.clone(),
            path: self.path.clone(),
            started_at: self.started_at,
        }
    }

    /// Feed every recorded queryset through a fresh storage.
    pub fn replay(&self) -> RequestStorage {
        let mut ret = RequestStorage::new(self.context());

        for queryset in &self.querysets {
            let mut storage = QuerySetStorage::new(queryset, ret.context());
            for instance in &queryset.instances {
                storage.add_wrapped_model_instance(instance);
            }
            log::debug!(
                "Queryset {} of {} ran during {}: {}",
                storage.queryset_id(),
                storage.model_name(),
                storage.request(),
                storage.recommendation()
            );
            let report = storage.report();
            ret.add_queryset(report);
        }

        log::info!(
            "Replayed {} querysets of {}",
            self.querysets.len(),
            ret.context()
        );
        ret
    }
}

/// A whole trace file.
#[derive(Debug, Deserialize)]
pub struct Trace {
    pub requests: Vec<TracedRequest>,
}

impl Trace {
    /// Parse a trace. `source` names it in errors.
    pub fn parse(content: &str, source: &str) -> Result<Self> {
        let trace: Trace = serde_json::from_str(content)?;
        if trace.requests.is_empty() {
            log::error!("Trace {} contains no requests", source);
            return Err(Error::EmptyTrace(source.to_owned()));
        }
        Ok(trace)
    }

    /// Load a trace from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let trace = Self::parse(&content, &path.display().to_string())?;
        log::info!(
            "Loaded {} requests from {}",
            trace.requests.len(),
            path.display()
        );
        Ok(trace)
    }

    pub fn replay(&self) -> Vec<RequestStorage> {
        self.requests.iter().map(TracedRequest::replay).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::setup;

    use super::*;

    const TRACE: &str = r#"{
        "requests": [
            {
                "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
                "method": "GET",
                "path": "/books/",
                "started_at": "2024-01-02T03:04:05Z",
                "querysets": [
                    {
                        "model": "Book",
                        "traceback": ["/srv/app/books/views.py:12 in list_books"],
                        "instances": [
                            {"used_fields": ["id", "title"], "unused_fields": ["body"], "unused_fields_size": 100},
                            {"used_fields": ["id", "title"], "unused_fields": ["body"], "unused_fields_size": 144},
                            {"fields": {"id": 3, "title": "Dune", "body": "spice"}, "read": ["id", "title"]}
                        ]
                    },
                    {
                        "model": "Author",
                        "instances": [
                            {"used_fields": ["name"]}
                        ]
                    }
                ]
            },
            {
                "path": "/authors/"
            }
        ]
    }"#;

    #[test]
    fn test_parse() {
        setup::init_logging();

        let trace = Trace::parse(TRACE, "test").unwrap();
        assert_eq!(trace.requests.len(), 2);

        let request = &trace.requests[0];
        assert_eq!(
            request.id,
            Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap()
        );
        assert_eq!(request.started_at.to_rfc3339(), "2024-01-02T03:04:05+00:00");
        assert_eq!(request.querysets.len(), 2);

        let book = &request.querysets[0];
        assert_eq!(book.model().meta.object_name, "Book");
        assert_eq!(book.traceback().len(), 1);
        assert_eq!(book.instances.len(), 3);
        assert_eq!(book.instances[2], InstanceUsage::new(["id", "title"], ["body"], 5));

        let author = &request.querysets[1];
        assert!(author.traceback().is_empty());
        assert_eq!(author.instances[0].unused_fields_size, 0);
    }

    #[test]
    fn test_parse_defaults() {
        setup::init_logging();

        let before = Utc::now();
        let trace = Trace::parse(TRACE, "test").unwrap();
        let request = &trace.requests[1];

        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/authors/");
        assert!(request.started_at >= before);
        assert!(request.querysets.is_empty());
        assert_ne!(request.id, trace.requests[0].id);
    }

    #[test]
    fn test_empty_trace() {
        setup::init_logging();

        let err = Trace::parse(r#"{"requests": []}"#, "empty.json").unwrap_err();
        assert!(matches!(err, Error::EmptyTrace(source) if source == "empty.json"));
    }

    #[test]
    fn test_malformed_trace() {
        setup::init_logging();

        let err = Trace::parse(r#"{"requests": [{"method": "GET"}]}"#, "bad.json").unwrap_err();
        assert!(matches!(err, Error::Serde(_)));
    }

    fn single_queryset(instances: &str) -> String {
        format!(
            r#"{{"requests": [{{"path": "/", "querysets": [{{"model": "Book", "instances": [{instances}]}}]}}]}}"#
        )
    }

    #[test]
    fn test_misspelled_usage_key() {
        setup::init_logging();

        let content = single_queryset(r#"{"usedfields": ["title"], "unused_fields_sizee": 999}"#);
        let err = Trace::parse(&content, "typo.json").unwrap_err();
        assert!(matches!(err, Error::Serde(_)));
    }

    #[test]
    fn test_unsupported_row_value() {
        setup::init_logging();

        let content = single_queryset(r#"{"fields": {"id": 1, "meta": {"nested": true}}, "read": ["id"]}"#);
        let err = Trace::parse(&content, "nested.json").unwrap_err();
        assert!(matches!(err, Error::Serde(_)));

        let content = single_queryset(r#"{"fields": {"id": 1}, "reed": ["id"]}"#);
        let err = Trace::parse(&content, "typo.json").unwrap_err();
        assert!(matches!(err, Error::Serde(_)));
    }

    #[test]
    fn test_replay_saturates_wasted_memory() {
        setup::init_logging();

        let content = single_queryset(
            r#"{"used_fields": ["id"], "unused_fields": ["body"], "unused_fields_size": 18446744073709551615},
               {"used_fields": ["id"], "unused_fields": ["body"], "unused_fields_size": 1}"#,
        );
        let requests = Trace::parse(&content, "huge.json").unwrap().replay();

        assert_eq!(requests[0].querysets()[0].wasted_memory, u64::MAX);
        assert_eq!(requests[0].total_wasted_memory(), u64::MAX);
    }

    #[test]
    fn test_replay() {
        setup::init_logging();

        let trace = Trace::parse(TRACE, "test").unwrap();
        let requests = trace.replay();
        assert_eq!(requests.len(), 2);

        let request = &requests[0];
        assert_eq!(request.context().to_string(), "GET /books/");
        assert_eq!(request.querysets().len(), 2);
        assert_eq!(request.total_wasted_memory(), 249);

        let book = &request.querysets()[0];
        assert_eq!(book.model_name, "Book");
        assert_eq!(book.instances_count, 3);
        assert_eq!(book.used_fields, vec!["id".to_owned(), "title".to_owned()]);
        assert_eq!(book.unused_fields, vec!["body".to_owned()]);
        assert_eq!(book.wasted_memory, 249);
        assert_eq!(book.recommendation, "Model.objects.defer('body')");
        assert_eq!(book.traceback.len(), 1);

        let author = &request.querysets()[1];
        assert!(author.recommendation.starts_with("Nothing to do here"));
        assert_ne!(author.queryset_id, book.queryset_id);

        assert!(requests[1].is_empty());
    }

    #[test]
    fn test_load() {
        setup::init_logging();

        let path = PathBuf::from("test_load_trace.json");
        fs::write(&path, TRACE).unwrap();
        let trace = Trace::load(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(trace.unwrap().requests.len(), 2);

        let err = Trace::load(Path::new("test_load_missing_trace.json")).unwrap_err();
        assert!(matches!(err, Error::IO(_)));
    }
}
