//! Per-request collection of queryset reports.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::report::QuerySetReport;

/// Context of the request which executed querysets.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestContext {
    pub id: Uuid,
    pub method: String,
    pub path: String,
    pub started_at: DateTime<Utc>,
}

impl RequestContext {
    /// Create a context for a request starting now.
    #[cfg(test)]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.into(),
            path: path.into(),
            started_at: Utc::now(),
        }
    }
}

impl Display for RequestContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Reports of all querysets executed during one request.
#[derive(Serialize)]
pub struct RequestStorage {
    context: RequestContext,
    querysets: Vec<QuerySetReport>,
}

impl RequestStorage {
    pub fn new(context: RequestContext) -> Self {
        Self {
            context,
            querysets: Vec::new(),
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Add the report of a finished queryset.
    pub fn add_queryset(&mut self, report: QuerySetReport) {
        log::debug!(
            "Request {}: queryset {} of {} finished",
            self.context.id,
            report.queryset_id,
            report.model_name
        );
        self.querysets.push(report);
    }

    pub fn querysets(&self) -> &[QuerySetReport] {
        &self.querysets
    }

    pub fn is_empty(&self) -> bool {
        self.querysets.is_empty()
    }

    /// Drop reports of querysets with nothing to optimize.
    pub fn retain_imperfect(&mut self) {
        self.querysets.retain(|qs| !qs.is_perfect());
    }

    pub fn total_wasted_memory(&self) -> u64 {
        self.querysets
            .iter()
            .map(|qs| qs.wasted_memory)
            .fold(0, u64::saturating_add)
    }
}
