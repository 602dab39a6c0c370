//! The in-memory master sequence of records and the queries run over it.

use crate::annotate::{Annotators, annotate};
use crate::config::ViewDefaults;
use crate::dictionary::build_dictionary;
use crate::expr::{ExprError, compile};
use crate::parser::{Record, logname_from_filepath, parse_log, parse_log_lines, split_logs};
use crate::query::{LogView, Query, QueryErrors, QueryOutcome, filter_and_sort, resolve_time_bounds};
use crate::timeutil::{format_time_control, reconcile_dates};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// One entry of a start/end dropdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSuggestion {
    /// Text to put in the control.
    pub value: String,
    /// What to show for it, e.g. `06:53:11 - client`.
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSuggestions {
    pub start: Vec<TimeSuggestion>,
    pub end: Vec<TimeSuggestion>,
}

/// Append-only record store. Records are never re-parsed; each load only
/// adds to the end.
#[derive(Debug, Default)]
pub struct Session {
    records: Vec<Record>,
    view: ViewDefaults,
}

impl Session {
    pub fn new(view: ViewDefaults) -> Self {
        Self {
            records: Vec::new(),
            view,
        }
    }

    /// Adds a combined stream, split on `==> path <==` lines. Returns the
    /// number of records added.
    pub fn ingest(&mut self, text: &str) -> usize {
        let parsed = split_logs(text)
            .into_iter()
            .flat_map(|segment| parse_log_lines(&segment.name, &segment.lines))
            .collect();
        self.append(parsed)
    }

    /// Adds one log file, named after its path.
    pub fn load(&mut self, path: &str, text: &str) -> usize {
        let parsed = parse_log(&logname_from_filepath(path), text);
        self.append(parsed)
    }

    fn append(&mut self, mut parsed: Vec<Record>) -> usize {
        let base = self.records.len();
        for (i, record) in parsed.iter_mut().enumerate() {
            record.gindex = base + i;
        }
        let added = parsed.len();
        self.records.append(&mut parsed);
        reconcile_dates(&mut self.records);
        debug!("session now holds {} records (+{added})", self.records.len());
        added
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn view(&self) -> &ViewDefaults {
        &self.view
    }

    /// Records per log, in the order logs were first seen.
    pub fn log_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for record in &self.records {
            match counts.iter_mut().find(|(log, _)| *log == record.log) {
                Some((_, count)) => *count += 1,
                None => counts.push((record.log.clone(), 1)),
            }
        }
        counts
    }

    pub fn default_log_view(&self, log: &str) -> LogView {
        let count = self.records.iter().filter(|r| r.log == log).count();
        self.view.log_view(log, count)
    }

    /// A query holding the configured control values and no per-log
    /// overrides.
    pub fn default_query(&self) -> Query {
        Query {
            filter: self.view.filter.clone(),
            start: self.view.start.clone(),
            end: self.view.end.clone(),
            text: self.view.text.clone(),
            id: self.view.id.clone(),
            color: self.view.color.clone(),
            log_views: BTreeMap::new(),
        }
    }

    pub fn query(&self, query: &Query) -> QueryOutcome<'_> {
        let log_views: BTreeMap<String, LogView> = self
            .log_counts()
            .into_iter()
            .map(|(log, count)| {
                let view = query
                    .log_views
                    .get(&log)
                    .copied()
                    .unwrap_or_else(|| self.view.log_view(&log, count));
                (log, view)
            })
            .collect();

        let (start, end) = resolve_time_bounds(&query.start, &query.end, &self.records);
        let filter = compile(&query.filter);

        let t0 = Instant::now();
        let filtered = filter_and_sort(
            &self.records,
            |record| {
                if !log_views.get(&record.log).is_some_and(|view| view.visible) {
                    Ok(false)
                } else if filter.is_blank() {
                    Ok(true)
                } else {
                    filter.test(record)
                }
            },
            start.as_ref().ok().copied().flatten(),
            end.as_ref().ok().copied().flatten(),
        );
        let t1 = Instant::now();

        let annotators = Annotators {
            text: compile(&query.text),
            color: compile(&query.color),
            id: compile(&query.id),
        };
        let (annotations, annotation_errors) = annotate(&filtered.records, &annotators, |log| {
            log_views
                .get(log)
                .map_or(self.view.align_for_other_logs, |view| view.align)
        });
        let t2 = Instant::now();

        let dictionary = build_dictionary(&filtered.records);
        let t3 = Instant::now();

        debug!(
            "query kept {}/{} records: filter {:?}, annotate {:?}, dictionary {:?}",
            filtered.records.len(),
            self.records.len(),
            t1 - t0,
            t2 - t1,
            t3 - t2
        );

        let errors = QueryErrors {
            filter: filtered.first_error,
            start: start.as_ref().err().cloned(),
            end: end.as_ref().err().cloned(),
            text: annotation_errors.text,
            color: annotation_errors.color,
            id: annotation_errors.id,
        };

        QueryOutcome {
            records: filtered.records,
            annotations,
            dictionary,
            start: start.ok().flatten(),
            end: end.ok().flatten(),
            errors,
        }
    }

    /// Evaluates `expr` for the record at `gindex`. `Ok(None)` when there is
    /// no such record or the value is null or undefined.
    pub fn details(&self, gindex: usize, expr: &str) -> Result<Option<String>, ExprError> {
        let Some(record) = self.records.iter().find(|r| r.gindex == gindex) else {
            return Ok(None);
        };
        let value = compile(expr).eval(record)?;
        Ok((!value.is_nullish()).then(|| value.to_display_string()))
    }

    /// Earliest and latest times overall and per log, formatted as control
    /// text. Empty when no record has a time.
    pub fn time_suggestions(&self) -> TimeSuggestions {
        let mut extremes: Vec<(&str, Option<(DateTime<Utc>, DateTime<Utc>)>)> = Vec::new();
        for record in &self.records {
            let index = match extremes.iter().position(|(log, _)| *log == record.log) {
                Some(index) => index,
                None => {
                    extremes.push((record.log.as_str(), None));
                    extremes.len() - 1
                }
            };
            let Some(time) = record.time else {
                continue;
            };
            let slot = &mut extremes[index].1;
            *slot = Some(match *slot {
                Some((earliest, latest)) => (time.min(earliest), time.max(latest)),
                None => (time, time),
            });
        }

        let overall = extremes
            .iter()
            .filter_map(|(_, range)| *range)
            .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)));
        let Some((earliest, latest)) = overall else {
            return TimeSuggestions::default();
        };

        let control = |time: DateTime<Utc>| format_time_control(&time, &self.records);
        let plain = |value: String| TimeSuggestion {
            label: value.clone(),
            value,
        };
        let mut suggestions = TimeSuggestions {
            start: vec![plain(control(earliest))],
            end: vec![
                plain(control(latest)),
                plain("+5s".to_string()),
                plain("+10 minutes".to_string()),
            ],
        };
        for (log, range) in &extremes {
            let Some((first, last)) = range else {
                continue;
            };
            for (list, time) in [(&mut suggestions.start, *first), (&mut suggestions.end, *last)] {
                let value = control(time);
                list.push(TimeSuggestion {
                    label: format!("{value} - {log}"),
                    value,
                });
            }
        }
        suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gindex_continues_across_loads() {
        let mut session = Session::default();
        assert_eq!(session.load("/tmp/a.log", "[10:00:00] one\n[10:00:01] two"), 2);
        assert_eq!(session.load("/tmp/b.log", "[10:00:02] three"), 1);
        let gindexes: Vec<usize> = session.records().iter().map(|r| r.gindex).collect();
        assert_eq!(gindexes, vec![0, 1, 2]);
    }

    #[test]
    fn log_counts_keep_first_seen_order() {
        let mut session = Session::default();
        session.ingest("==> /x/zeta.log <==\n[1] a\n[2] b\n==> /x/alpha.log <==\n[3] c");
        assert_eq!(
            session.log_counts(),
            vec![("zeta".to_string(), 2), ("alpha".to_string(), 1)]
        );
    }

    #[test]
    fn details_are_none_for_null_values() {
        let mut session = Session::default();
        session.load("client.log", "[10:00:00] started");
        assert_eq!(session.details(0, "filename"), Ok(None));
        assert_eq!(session.details(0, "title"), Ok(Some("started".to_string())));
        assert_eq!(session.details(7, "title"), Ok(None));
    }
}
