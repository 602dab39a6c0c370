//! Language-server protocol traces, as written by editors:
//!
//! ```text
//! [Trace - 9:43:06 PM] Sending request 'textDocument/hover - (12)'.
//! Params: {"textDocument": {"uri": "file:///src/main.rs"}}
//! ```
//!
//! These carry more structure than the generic heuristics can recover, so a
//! matching message has its log, title, body, id, kind, filename and payload
//! replaced by what the trace says.

use super::entities::{DEFAULT_LOG, Record, Tags, is_server_log};
use super::last_segment;
use crate::timeutil::try_parse_log_timestamp;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TRACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[Trace - (?P<time>[^\]]*)\] (?P<dir>Sending|Received) (?P<kind>request|response|notification) '(?P<method>[^']*)' *(?P<body>.*)$",
    )
    .expect("valid trace header regex")
});
static METHOD_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" - \((?P<id>.*)\)$").expect("valid method id regex"));
static PAYLOAD_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:Result|Params|Error): ").expect("valid payload label regex"));

const CANCEL_METHOD: &str = "$/cancelRequest";

/// Overwrites the fields of `record` when `lines` open with a trace header.
/// Returns the trace time, or `None` when the message is not a trace.
pub(super) fn apply(record: &mut Record, lines: &[&str]) -> Option<DateTime<Utc>> {
    let caps = TRACE_RE.captures(lines.first()?)?;
    let time = try_parse_log_timestamp(&caps["time"])?;

    let side = if &caps["dir"] == "Sending" { "client" } else { "server" };
    record.log = if record.log == DEFAULT_LOG {
        side.to_string()
    } else {
        format!("{}:{side}", record.log)
    };

    let method = &caps["method"];
    record.title = Some(METHOD_ID_RE.replace(method, "").into_owned());
    record.body = caps["body"].to_string();

    let rest = lines[1..].join("\n");
    let payload: Option<Value> = serde_json::from_str(&PAYLOAD_LABEL_RE.replace(&rest, "")).ok();

    let (id, kind, root) = match &payload {
        Some(json) if json.get("jsonrpc").is_some() => {
            let id = json.get("id").and_then(id_text);
            let answered = [json.get("result"), json.get("error")]
                .into_iter()
                .flatten()
                .any(|v| !v.is_null());
            let kind = match (&id, answered) {
                (None, _) => "notification",
                (Some(_), true) => "response",
                (Some(_), false) => "request",
            };
            (id, kind.to_string(), json.get("params"))
        }
        _ => {
            let id = METHOD_ID_RE
                .captures(method)
                .map(|m| m["id"].to_string());
            (id, caps["kind"].to_string(), payload.as_ref())
        }
    };

    let mut from_server = is_server_log(&record.log);
    if kind == "response" {
        from_server = !from_server;
    }
    record.id = id.map(|id| if from_server { format!("s#{id}") } else { id });

    if record.title.as_deref() == Some(CANCEL_METHOD) {
        record.id = root.and_then(|r| r.get("id")).and_then(id_text);
    }

    record.filename = root
        .and_then(document_uri)
        .map(|uri| last_segment(uri).to_string());
    record.tags = Tags {
        kind: Some(kind),
        ..Tags::default()
    };
    record.payload = payload;

    Some(time)
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn document_uri(root: &Value) -> Option<&str> {
    non_empty(root.pointer("/textDocument/uri"))
        .or_else(|| non_empty(root.get("uri")))
        .or_else(|| non_empty(root.pointer("/changes/0/uri")))
}

fn non_empty(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}
