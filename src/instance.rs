//! Per-instance field usage.
//!
//! A wrapped instance is one materialized row whose field reads were
//! observed by the instrumentation layer. The aggregator only needs three
//! things from it, captured by [`WrappedInstance`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Usage data exposed by a wrapped model instance.
///
/// Implementations may record reads through interior mutability; every
/// call must reflect the current state.
pub trait WrappedInstance {
    /// Field names read at least once.
    fn used_fields(&self) -> BTreeSet<String>;

    /// Field names fetched but never read.
    fn unused_fields(&self) -> BTreeSet<String>;

    /// Estimated bytes occupied by the unused field values.
    fn unused_fields_size(&self) -> u64;
}

/// A fetched field value.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Estimated size of the value in bytes.
    pub fn size(&self) -> u64 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Int(_) | FieldValue::Float(_) => 8,
            FieldValue::Text(s) => s.len() as u64,
            FieldValue::Bytes(b) => b.len() as u64,
        }
    }
}

/// Snapshot of one instance's field usage.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceUsage {
    #[serde(default)]
    pub used_fields: BTreeSet<String>,
    #[serde(default)]
    pub unused_fields: BTreeSet<String>,
    #[serde(default)]
    pub unused_fields_size: u64,
}

impl InstanceUsage {
    #[cfg(test)]
    pub fn new<I, J, S, T>(used: I, unused: J, unused_fields_size: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            used_fields: used.into_iter().map(Into::into).collect(),
            unused_fields: unused.into_iter().map(Into::into).collect(),
            unused_fields_size,
        }
    }

    /// Build usage from a fetched row and the names read on it.
    ///
    /// Names in `read` which the row does not carry are ignored.
    pub fn from_fields<S: AsRef<str>>(fields: &BTreeMap<String, FieldValue>, read: &[S]) -> Self {
        let read: BTreeSet<&str> = read.iter().map(AsRef::as_ref).collect();

        let mut ret = Self::default();
        for (name, value) in fields {
            if read.contains(name.as_str()) {
                ret.used_fields.insert(name.clone());
            } else {
                ret.unused_fields.insert(name.clone());
                ret.unused_fields_size = ret.unused_fields_size.saturating_add(value.size());
            }
        }

        log::debug!(
            "Row of {} fields: {} used, {} unused ({} bytes)",
            fields.len(),
            ret.used_fields.len(),
            ret.unused_fields.len(),
            ret.unused_fields_size
        );
        ret
    }
}

impl WrappedInstance for InstanceUsage {
    fn used_fields(&self) -> BTreeSet<String> {
        self.used_fields.clone()
    }

    fn unused_fields(&self) -> BTreeSet<String> {
        self.unused_fields.clone()
    }

    fn unused_fields_size(&self) -> u64 {
        self.unused_fields_size
    }
}
