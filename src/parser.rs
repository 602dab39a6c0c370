//! Heuristic message parser.
//!
//! A log is a run of *messages* with trivia in between. A message starts on a
//! line that opens with `[` (or a severity word followed by ` [`) and owns
//! every following line up to the next such line:
//!
//! ```text
//! [INFO 2021-11-12 06:53:11.230] [build#4] compile: started /src/lib.rs
//! [06:53:12] result: {ok: true,
//!   warnings: []}
//! ```
//!
//! Each message becomes a [`Record`]. Nothing here can fail: text that does
//! not fit the heuristics just leaves the corresponding fields empty.

use crate::timeutil::{roll_past, try_parse_log_timestamp};
use chrono::{DateTime, Utc};
use log::{debug, trace};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

mod entities;
mod payload;
mod trace;

pub use entities::{
    DEFAULT_LOG, Field, LogSegment, RESERVED_TAG_KEYS, Record, SEVERITIES, Tags, is_server_log,
};
pub use payload::parse_relaxed;

static DIVIDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^==> (.*) <==$").expect("valid divider regex"));
static LEADING_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^\[ ]*) ").expect("valid leading word regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[ *([^\]{}()]+)\] *").expect("valid tag regex"));
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^ *([A-Za-z0-9_][^:'"{/\[()]*)([:'"{\[/()]) *"#).expect("valid title regex")
});
static TITLE_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^ *([A-Za-z0-9_][^:'"{/\[()]*)$"#).expect("valid bare title regex")
});
static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([ '"])(/[0-9A-Za-z/_\-.]*)"#).expect("valid filename regex")
});
static ID_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]*)#.*$").expect("valid id tag regex"));

/// True when `line` opens a new message.
pub fn starts_message(line: &str) -> bool {
    line.starts_with('[')
        || SEVERITIES
            .iter()
            .any(|severity| line.strip_prefix(severity).is_some_and(|rest| rest.starts_with(" [")))
}

/// Parses the text of one log into records.
///
/// Within the log, every record ends up with a time or none does: records
/// ahead of the first timestamp take the last time seen in the log.
pub fn parse_log(log: &str, text: &str) -> Vec<Record> {
    let lines: Vec<&str> = split_lines(text).collect();
    parse_log_lines(log, &lines)
}

pub fn parse_log_lines(log: &str, lines: &[&str]) -> Vec<Record> {
    let mut records = Vec::new();
    let mut prev_time = None;
    let mut start = 0;

    let bounds = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| starts_message(line))
        .map(|(i, _)| i)
        .chain(std::iter::once(lines.len()));
    for end in bounds {
        if end > start
            && let Some(record) = parse_message(log, prev_time, &lines[start..end])
        {
            prev_time = record.time.or(prev_time);
            records.push(record);
        }
        start = end;
    }

    for record in records.iter_mut().filter(|r| r.time.is_none()) {
        record.time = prev_time;
    }

    debug!(
        "parsed {} records from log '{log}' ({} lines)",
        records.len(),
        lines.len()
    );
    records
}

/// Parses one accumulated message. `prev_time` is the time of the previous
/// record in the same log. Returns `None` for preamble and blank input.
pub fn parse_message(
    log: &str,
    prev_time: Option<DateTime<Utc>>,
    lines: &[&str],
) -> Option<Record> {
    let end = lines.iter().rposition(|line| !line.is_empty())? + 1;
    let lines = &lines[..end];
    if !starts_message(lines[0]) {
        trace!("skipping {} lines of preamble in log '{log}'", lines.len());
        return None;
    }

    let (raw_tags, line) = strip_tags(lines[0]);
    let (title, body) = split_title(line);
    let filename = find_filename(&body);
    let payload = find_payload(&body, &lines[1..]);
    let (tags, time, id) = classify_tags(raw_tags);

    let mut record = Record {
        log: log.to_string(),
        message: lines.join("\n"),
        tags,
        time: None,
        line: line.to_string(),
        title,
        body,
        id,
        filename,
        payload,
        gindex: 0,
    };

    let time = trace::apply(&mut record, lines).or(time);
    record.time = time.map(|t| roll_past(t, prev_time)).or(prev_time);
    Some(record)
}

/// Splits a combined stream on `==> path <==` divider lines. Text ahead of
/// the first divider belongs to [`DEFAULT_LOG`].
pub fn split_logs(text: &str) -> Vec<LogSegment<'_>> {
    let mut segments = Vec::new();
    let mut current = LogSegment {
        name: DEFAULT_LOG.to_string(),
        lines: Vec::new(),
    };
    for line in split_lines(text) {
        match DIVIDER_RE.captures(line) {
            Some(caps) => {
                let next = LogSegment {
                    name: logname_from_filepath(&caps[1]),
                    lines: Vec::new(),
                };
                segments.push(std::mem::replace(&mut current, next));
            }
            None => current.lines.push(line),
        }
    }
    segments.push(current);
    segments
}

/// `/var/log/client.log` becomes `client`. Short extensions (fewer than three
/// characters) and short stems are kept.
pub fn logname_from_filepath(path: &str) -> String {
    let file = last_segment(path);
    match file.rfind('.') {
        Some(dot) if dot >= 3 && dot + 3 < file.len() => file[..dot].to_string(),
        _ => file.to_string(),
    }
}

/// Final component of a `/` or `\` separated path.
pub(crate) fn last_segment(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

/// Removes the severity word and `[...]` tags from the front of the first
/// line. Returns the tags in order and what is left of the line.
fn strip_tags(first: &str) -> (Vec<String>, &str) {
    let mut rest = first;
    let mut tags = Vec::new();

    if let Some(caps) = LEADING_WORD_RE.captures(rest) {
        tags.push(caps[1].to_string());
        rest = &rest[caps[0].len()..];
    }
    while let Some(caps) = TAG_RE.captures(rest) {
        tags.push(caps[1].trim_end_matches(' ').to_string());
        rest = &rest[caps[0].len()..];
    }

    let rest = rest
        .strip_prefix(':')
        .map_or(rest, |after| after.trim_start_matches(' '));
    (tags, rest)
}

/// `title: body`, `title(args)`, `title 'quoted'` and a bare `title`.
/// A separator other than `:` stays at the front of the body.
fn split_title(line: &str) -> (Option<String>, String) {
    if let Some(caps) = TITLE_RE.captures(line) {
        let title = caps[1].trim_end_matches(' ').to_string();
        let rest = &line[caps[0].len()..];
        let body = match &caps[2] {
            ":" => rest.to_string(),
            separator => format!("{separator}{rest}"),
        };
        return (Some(title), body);
    }
    if let Some(caps) = TITLE_ONLY_RE.captures(line) {
        return (Some(caps[1].trim_end_matches(' ').to_string()), String::new());
    }
    (None, line.to_string())
}

fn find_filename(body: &str) -> Option<String> {
    let padded = format!(" {body}");
    let caps = FILENAME_RE.captures(&padded)?;
    Some(last_segment(&caps[2]).to_string()).filter(|name| !name.is_empty())
}

/// Payload from the first `{` (or `[`) of the body plus the following lines,
/// else from the following lines alone.
fn find_payload(body: &str, following: &[&str]) -> Option<Value> {
    let rest = following.join("\n");
    body.find('{')
        .or_else(|| body.find('['))
        .and_then(|start| parse_relaxed(&format!("{}\n{rest}", &body[start..])))
        .or_else(|| parse_relaxed(&rest))
}

/// Sorts raw tags into severity, time, id and the rest.
fn classify_tags(mut raw: Vec<String>) -> (Tags, Option<DateTime<Utc>>, Option<String>) {
    let mut tags = Tags::default();

    if let Some(first) = raw.first() {
        if SEVERITIES.contains(&first.as_str()) {
            tags.kind = Some(raw.remove(0));
        } else if let Some((word, rest)) = first.split_once(' ')
            && SEVERITIES.contains(&word)
        {
            let kind = word.to_string();
            let rest = rest.trim_start().to_string();
            tags.kind = Some(kind);
            raw[0] = rest;
        }
    }

    let mut time = None;
    let mut id = None;
    for tag in raw {
        if let Some(stamp) = try_parse_log_timestamp(&tag) {
            time = time.or(Some(stamp));
            continue;
        }
        match ID_TAG_RE.captures(&tag).map(|caps| caps[1].to_string()) {
            Some(key) if key.is_empty() => id = Some(tag),
            // `kind` and `positional` are members of the tags object itself.
            Some(key) if RESERVED_TAG_KEYS.contains(&key.as_str()) => {
                id = id.or_else(|| Some(tag.clone()));
                tags.positional.push(tag);
            }
            Some(key) => {
                id = id.or_else(|| Some(tag.clone()));
                tags.named.insert(key, tag);
            }
            None => tags.positional.push(tag),
        }
    }

    (tags, time, id)
}
