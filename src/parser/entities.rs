use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Log name used for text that arrives without a `==> path <==` divider.
pub const DEFAULT_LOG: &str = "(default)";

/// Leading tags that classify a message rather than describe it.
pub const SEVERITIES: [&str; 3] = ["INFO", "DEBUG", "ERROR"];

/// Tag object members that a `key#value` tag may not take over.
pub const RESERVED_TAG_KEYS: [&str; 2] = ["kind", "positional"];

/// Tags collected from the `[...]` prefix of a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tags {
    /// Severity word (`INFO`, `DEBUG`, `ERROR`) or, for protocol traces,
    /// `request` / `response` / `notification`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// `key#value` tags keyed by their prefix word.
    #[serde(flatten)]
    pub named: BTreeMap<String, String>,
    /// Tags that were neither a severity, a time nor an id.
    pub positional: Vec<String>,
}

impl Tags {
    pub fn to_value(&self) -> Value {
        let mut members: BTreeMap<String, Value> = self
            .named
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect();
        if let Some(kind) = &self.kind {
            members.insert("kind".to_string(), Value::from(kind.as_str()));
        }
        members.insert(
            "positional".to_string(),
            Value::Array(
                self.positional
                    .iter()
                    .map(|tag| Value::from(tag.as_str()))
                    .collect(),
            ),
        );
        Value::Object(members)
    }
}

/// One parsed message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Source log, e.g. `client`, `server`, `build:server` or `(default)`.
    pub log: String,
    /// The complete original text of the message, all lines included.
    pub message: String,
    pub tags: Tags,
    /// Parsed or inherited timestamp. Clock-only stamps are anchored to
    /// 1970-01-01 until dates are reconciled.
    pub time: Option<DateTime<Utc>>,
    /// First line with its leading tags removed.
    pub line: String,
    pub title: Option<String>,
    pub body: String,
    /// Best-guess correlation identifier.
    pub id: Option<String>,
    /// Unqualified filename mentioned in the message.
    pub filename: Option<String>,
    /// Structured value found at the end of the message.
    pub payload: Option<JsonValue>,
    /// Position in the session's master sequence.
    pub gindex: usize,
}

/// The closed set of record members an expression may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Log,
    Message,
    Tags,
    Time,
    Line,
    Title,
    Body,
    Id,
    Filename,
    Payload,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Log,
        Field::Message,
        Field::Tags,
        Field::Time,
        Field::Line,
        Field::Title,
        Field::Body,
        Field::Id,
        Field::Filename,
        Field::Payload,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Log => "log",
            Field::Message => "message",
            Field::Tags => "tags",
            Field::Time => "time",
            Field::Line => "line",
            Field::Title => "title",
            Field::Body => "body",
            Field::Id => "id",
            Field::Filename => "filename",
            Field::Payload => "payload",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|field| field.name() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Record {
    /// Reads one member as an expression value. Absent optional members
    /// read as `null`.
    pub fn field(&self, field: Field) -> Value {
        match field {
            Field::Log => Value::from(self.log.as_str()),
            Field::Message => Value::from(self.message.as_str()),
            Field::Tags => self.tags.to_value(),
            Field::Time => Value::from(self.time),
            Field::Line => Value::from(self.line.as_str()),
            Field::Title => Value::from(self.title.clone()),
            Field::Body => Value::from(self.body.as_str()),
            Field::Id => Value::from(self.id.clone()),
            Field::Filename => Value::from(self.filename.clone()),
            Field::Payload => self.payload.as_ref().map_or(Value::Null, Value::from),
        }
    }
}

/// `server` and `<name>:server` logs come from the server side of a trace.
pub fn is_server_log(log: &str) -> bool {
    log == "server" || log.ends_with(":server")
}

/// One `==> path <==` section of a combined stream.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSegment<'a> {
    pub name: String,
    pub lines: Vec<&'a str>,
}
