//! Optimization recommendations.

use crate::config::DEFAULT_MODEL_PLACEHOLDER;

pub const NOTHING_TO_DO: &str = "Nothing to do here, everything is perfect";
pub const NO_FIELDS_USED: &str = "No fields were used. Consider to remove this request";

/// Quote field names as literals, keeping their order.
fn quote_fields<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|field| format!("'{}'", field.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Suggest a `defer` or `only` call for the given usage.
///
/// Whichever list is shorter ends up in the call. When both have
/// the same length, `only` wins.
pub fn get_defer_recommendations<S: AsRef<str>, T: AsRef<str>>(
    used_fields: &[S],
    unused_fields: &[T],
) -> String {
    if unused_fields.is_empty() {
        return NOTHING_TO_DO.to_owned();
    }
    if used_fields.is_empty() {
        return NO_FIELDS_USED.to_owned();
    }

    if used_fields.len() > unused_fields.len() {
        format!(
            "{}.objects.defer({})",
            DEFAULT_MODEL_PLACEHOLDER,
            quote_fields(unused_fields)
        )
    } else {
        format!(
            "{}.objects.only({})",
            DEFAULT_MODEL_PLACEHOLDER,
            quote_fields(used_fields)
        )
    }
}
