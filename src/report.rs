//! Terminal reports.

use std::fmt::{self, Display, Formatter};

use console::style;
use prettytable::{format::consts::FORMAT_NO_LINESEP_WITH_TITLE, row, Table};
use serde::Serialize;
use uuid::Uuid;

use crate::config::SIZE_UNITS;
use crate::request::RequestStorage;

/// Statistics of one finished queryset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuerySetReport {
    pub queryset_id: Uuid,
    pub model_name: String,
    pub instances_count: usize,
    /// Fields read on at least one instance, sorted.
    pub used_fields: Vec<String>,
    /// Fields never read on any instance, sorted.
    pub unused_fields: Vec<String>,
    pub wasted_memory: u64,
    pub recommendation: String,
    pub traceback: Vec<String>,
}

impl QuerySetReport {
    /// Whether every fetched field was read.
    pub fn is_perfect(&self) -> bool {
        self.unused_fields.is_empty()
    }
}

/// Format a byte count, e.g. `244 B` or `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    // Compare the value as printed, so 1023.96 KB shows as 1.0 MB.
    while (size * 10.0).round() >= 10240.0 && unit + 1 < SIZE_UNITS.len() {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", SIZE_UNITS[unit])
}

/// Traceback frames of a queryset under `base_path`, all when unset.
fn frames<'r>(
    report: &'r QuerySetReport,
    base_path: Option<&'r str>,
) -> impl Iterator<Item = &'r String> + 'r {
    report
        .traceback
        .iter()
        .filter(move |frame| base_path.map_or(true, |base| frame.starts_with(base)))
}

/// Printable report of one request.
pub struct RequestReport<'a> {
    storage: &'a RequestStorage,
    /// Only frames under this path are shown.
    base_path: Option<&'a str>,
    /// Leave out querysets with nothing to optimize.
    skip_perfect: bool,
}

impl<'a> RequestReport<'a> {
    pub fn new(storage: &'a RequestStorage, base_path: Option<&'a str>, skip_perfect: bool) -> Self {
        Self {
            storage,
            base_path,
            skip_perfect,
        }
    }
}

impl Display for RequestReport<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let context = self.storage.context();
        writeln!(
            f,
            "{} {}",
            style(context).bold().cyan(),
            style(format!("({}, {})", context.id, context.started_at.to_rfc3339())).dim()
        )?;

        if self.storage.is_empty() {
            return writeln!(f, "  No querysets executed");
        }

        let mut shown = 0;
        for (i, report) in self.storage.querysets().iter().enumerate() {
            if self.skip_perfect && report.is_perfect() {
                continue;
            }
            shown += 1;

            writeln!(
                f,
                "  Queryset #{} {} {}",
                i + 1,
                style(&report.model_name).bold(),
                style(report.queryset_id).dim()
            )?;
            writeln!(f, "    Instances: {}", report.instances_count)?;
            writeln!(f, "    Used fields: {}", report.used_fields.join(", "))?;
            writeln!(
                f,
                "    Unused fields: {}",
                style(report.unused_fields.join(", ")).yellow()
            )?;
            writeln!(
                f,
                "    Wasted memory: {}",
                style(format_size(report.wasted_memory)).red()
            )?;
            writeln!(
                f,
                "    Recommendation: {}",
                style(&report.recommendation).green()
            )?;

            let mut shown_frames = frames(report, self.base_path).peekable();
            if shown_frames.peek().is_some() {
                writeln!(f, "    Place in your code:")?;
                for frame in shown_frames {
                    writeln!(f, "      {frame}")?;
                }
            }
        }

        if shown == 0 {
            writeln!(f, "  {}", style("Nothing to do here").green())?;
        }
        Ok(())
    }
}

/// Summary table with one row per queryset of every request.
/// Querysets with nothing to optimize are left out when `skip_perfect` is set.
pub fn summary_table(requests: &[RequestStorage], skip_perfect: bool) -> Table {
    let mut ret = Table::new();
    ret.set_format(*FORMAT_NO_LINESEP_WITH_TITLE);
    ret.set_titles(row![
        "Request",
        "Model",
        "Instances",
        "Unused fields",
        "Wasted memory",
        "Recommendation"
    ]);

    for request in requests {
        for report in request.querysets() {
            if skip_perfect && report.is_perfect() {
                continue;
            }
            ret.add_row(row![
                request.context(),
                report.model_name,
                report.instances_count,
                report.unused_fields.len(),
                format_size(report.wasted_memory),
                report.recommendation,
            ]);
        }
    }

    log::info!("Summary of {} querysets", ret.len());
    ret
}
