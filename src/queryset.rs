//! Queryset usage aggregation.
//!
//! One [`QuerySetStorage`] lives for one queryset execution. Every
//! materialized row is registered with it, and after iteration the
//! aggregated statistics are pulled out for reporting. Aggregates are
//! recomputed on every call, since instances keep recording reads after
//! they are registered.

use std::collections::BTreeSet;

use serde::Deserialize;
use uuid::Uuid;

use crate::instance::WrappedInstance;
use crate::recommend;
use crate::report::QuerySetReport;

/// Model metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Meta {
    pub object_name: String,
}

/// The model a queryset yields.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(from = "String")]
pub struct Model {
    pub meta: Meta,
}

impl Model {
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            meta: Meta {
                object_name: object_name.into(),
            },
        }
    }
}

impl From<String> for Model {
    fn from(object_name: String) -> Self {
        Self::new(object_name)
    }
}

/// Handle to an executed queryset.
pub trait QuerySet {
    /// The model this queryset yields.
    fn model(&self) -> &Model;

    /// Frames of the call site which executed the queryset, outermost first.
    fn traceback(&self) -> &[String] {
        &[]
    }
}

/// Aggregated usage of one queryset execution.
pub struct QuerySetStorage<'a, Q: ?Sized, R, I: ?Sized> {
    /// Correlation token of this execution.
    id: Uuid,
    /// The originating queryset.
    queryset: &'a Q,
    /// Context of the request which triggered the queryset.
    request: R,
    /// Registered instances, in materialization order.
    instances: Vec<&'a I>,
}

impl<'a, Q, R, I> QuerySetStorage<'a, Q, R, I>
where
    Q: QuerySet + ?Sized,
    I: WrappedInstance + ?Sized,
{
    /// Create a storage with a fresh correlation token.
    pub fn new(queryset: &'a Q, request: R) -> Self {
        Self::with_id(queryset, request, Uuid::new_v4())
    }

    /// Create a storage with a token generated by the caller.
    pub fn with_id(queryset: &'a Q, request: R, id: Uuid) -> Self {
        log::debug!("Tracking queryset {id}");
        Self {
            id,
            queryset,
            request,
            instances: Vec::new(),
        }
    }

    /// Register a materialized instance. Duplicates are counted again.
    pub fn add_wrapped_model_instance(&mut self, instance: &'a I) {
        self.instances.push(instance);
        log::debug!(
            "Queryset {}: instance #{} registered",
            self.id,
            self.instances.len()
        );
    }

    pub fn instances_count(&self) -> usize {
        self.instances.len()
    }

    pub fn model_name(&self) -> &str {
        &self.queryset.model().meta.object_name
    }

    pub fn queryset_id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &R {
        &self.request
    }

    /// Fields read on at least one instance.
    pub fn total_used_fields(&self) -> BTreeSet<String> {
        self.instances
            .iter()
            .flat_map(|instance| instance.used_fields())
            .collect()
    }

    /// Fields left unread on at least one instance.
    pub fn total_unused_fields(&self) -> BTreeSet<String> {
        self.instances
            .iter()
            .flat_map(|instance| instance.unused_fields())
            .collect()
    }

    /// Bytes held by unread fields across all instances, saturating at `u64::MAX`.
    pub fn total_wasted_memory(&self) -> u64 {
        self.instances
            .iter()
            .map(|instance| instance.unused_fields_size())
            .fold(0, u64::saturating_add)
    }

    pub fn get_defer_recommendations<S: AsRef<str>, T: AsRef<str>>(
        &self,
        used_fields: &[S],
        unused_fields: &[T],
    ) -> String {
        recommend::get_defer_recommendations(used_fields, unused_fields)
    }

    /// Recommendation for the current aggregates.
    ///
    /// A field read on any instance counts as used, so it is never
    /// suggested for deferring.
    pub fn recommendation(&self) -> String {
        let (used, unused) = self.split_fields();
        self.get_defer_recommendations(&used, &unused)
    }

    /// Sorted used fields, and sorted fields never read on any instance.
    fn split_fields(&self) -> (Vec<String>, Vec<String>) {
        let used = self.total_used_fields();
        let unused = self
            .total_unused_fields()
            .into_iter()
            .filter(|field| !used.contains(field))
            .collect();
        (used.into_iter().collect(), unused)
    }

    /// Snapshot the statistics for reporting.
    pub fn report(&self) -> QuerySetReport {
        let (used_fields, unused_fields) = self.split_fields();
        let recommendation = self.get_defer_recommendations(&used_fields, &unused_fields);
        let report = QuerySetReport {
            queryset_id: self.id,
            model_name: self.model_name().to_owned(),
            instances_count: self.instances_count(),
            used_fields,
            unused_fields,
            wasted_memory: self.total_wasted_memory(),
            recommendation,
            traceback: self.queryset.traceback().to_vec(),
        };
        log::debug!(
            "Queryset {} of {}: {} instances, {} bytes wasted",
            report.queryset_id,
            report.model_name,
            report.instances_count,
            report.wasted_memory
        );
        report
    }
}
