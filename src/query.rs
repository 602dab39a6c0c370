//! Time-range selection, predicate filtering and ordering.

use crate::annotate::{Align, Annotation};
use crate::dictionary::Dictionary;
use crate::expr::ExprError;
use crate::parser::Record;
use crate::timeutil::{TimeControlError, parse_time_control};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Records that survived filtering, plus the first predicate failure.
#[derive(Debug)]
pub struct FilterOutcome<'a, E> {
    pub records: Vec<&'a Record>,
    pub first_error: Option<E>,
}

/// Selects records within `[start, end]` that satisfy `predicate`, ordered by
/// time with timeless records last.
///
/// A record for which the predicate fails is kept, and only the first
/// failure of the pass is reported. When a bound is set, records without a
/// time are excluded.
pub fn filter_and_sort<'a, E, F>(
    records: &'a [Record],
    mut predicate: F,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> FilterOutcome<'a, E>
where
    F: FnMut(&Record) -> Result<bool, E>,
{
    let mut ordered: Vec<&Record> = records.iter().collect();
    ordered.sort_by_key(|record| record.gindex);

    let mut first_error = None;
    let mut selected = Vec::new();
    for record in ordered {
        if start.is_some_and(|start| record.time.is_none_or(|time| time < start)) {
            continue;
        }
        if end.is_some_and(|end| record.time.is_none_or(|time| time > end)) {
            continue;
        }
        match predicate(record) {
            Ok(true) => selected.push(record),
            Ok(false) => {}
            Err(err) => {
                first_error.get_or_insert(err);
                selected.push(record);
            }
        }
    }

    // Stable: equal times and timeless records keep their gindex order.
    selected.sort_by_key(|record| (record.time.is_none(), record.time));
    FilterOutcome {
        records: selected,
        first_error,
    }
}

/// Parses the start and end controls. A start beginning with `-` is taken
/// relative to the end, so the end is parsed first; otherwise the end may be
/// relative to the start.
pub fn resolve_time_bounds(
    start: &str,
    end: &str,
    records: &[Record],
) -> (
    Result<Option<DateTime<Utc>>, TimeControlError>,
    Result<Option<DateTime<Utc>>, TimeControlError>,
) {
    if start.starts_with('-') {
        let end_time = parse_time_control(end, records, None);
        let anchor = end_time.as_ref().ok().copied().flatten();
        let start_time = parse_time_control(start, records, anchor);
        (start_time, end_time)
    } else {
        let start_time = parse_time_control(start, records, None);
        let anchor = start_time.as_ref().ok().copied().flatten();
        let end_time = parse_time_control(end, records, anchor);
        (start_time, end_time)
    }
}

/// Per-log visibility and alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogView {
    pub visible: bool,
    pub align: Align,
}

/// Everything a host asks of one recomputation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Predicate; blank keeps everything.
    pub filter: String,
    pub start: String,
    pub end: String,
    /// Label expression.
    pub text: String,
    pub id: String,
    pub color: String,
    /// Overrides of the per-log defaults, by log name.
    pub log_views: BTreeMap<String, LogView>,
}

/// Independently reported failures, one slot per control.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryErrors {
    pub filter: Option<ExprError>,
    pub start: Option<TimeControlError>,
    pub end: Option<TimeControlError>,
    pub text: Option<ExprError>,
    pub color: Option<ExprError>,
    pub id: Option<ExprError>,
}

impl QueryErrors {
    pub fn is_empty(&self) -> bool {
        self.messages().is_empty()
    }

    /// `(slot, message)` for every slot that failed, in control order.
    pub fn messages(&self) -> Vec<(&'static str, String)> {
        let slots = [
            ("filter", self.filter.as_ref().map(ToString::to_string)),
            ("start", self.start.as_ref().map(ToString::to_string)),
            ("end", self.end.as_ref().map(ToString::to_string)),
            ("text", self.text.as_ref().map(ToString::to_string)),
            ("color", self.color.as_ref().map(ToString::to_string)),
            ("id", self.id.as_ref().map(ToString::to_string)),
        ];
        slots
            .into_iter()
            .filter_map(|(slot, message)| message.map(|message| (slot, message)))
            .collect()
    }
}

/// Result of [`crate::session::Session::query`].
#[derive(Debug)]
pub struct QueryOutcome<'a> {
    pub records: Vec<&'a Record>,
    /// Parallel to `records`.
    pub annotations: Vec<Annotation>,
    pub dictionary: Dictionary,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub errors: QueryErrors,
}
