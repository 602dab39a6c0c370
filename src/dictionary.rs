//! Schema inference over a heterogeneous record set.
//!
//! Every member reachable from a record (including tag and payload members,
//! through objects and array elements) gets a hint listing the kinds of value
//! seen there, e.g. `number | undefined` for a payload member that some
//! messages lack. Array elements are described under the synthetic member
//! [`ELEMENT`].

use crate::parser::{Field, Record};
use crate::value::Value;
use serde::Serialize;
use std::borrow::Borrow;
use std::collections::BTreeMap;

/// Member name standing for "any element of this array".
pub const ELEMENT: &str = "ELEMENT";

pub type Dictionary = BTreeMap<String, DictionaryEntry>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DictionaryEntry {
    pub hint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<Dictionary>,
}

const FIELD_NOTES: [(Field, &str); 10] = [
    (
        Field::Log,
        "  -- which logfile it came in; for lsp is \"client / server\"",
    ),
    (Field::Message, "  -- the entire message"),
    (
        Field::Tags,
        "  -- a list of any [...] tags at the start of the message, other than time-like ones",
    ),
    (
        Field::Time,
        "  -- one of the timelike [...] tag from the start of the message",
    ),
    (
        Field::Line,
        "  -- the first line of the message, after all the tags",
    ),
    (
        Field::Title,
        "  -- if line had the form \"title: body\" then this is the title",
    ),
    (
        Field::Body,
        "  -- this is however much of line after the title has been removed",
    ),
    (
        Field::Id,
        "  -- best-guess as to the most important id; for lsp cancellation the id being cancelled",
    ),
    (
        Field::Filename,
        "  -- best-guess as to an (unqualified) filename found in the message",
    ),
    (
        Field::Payload,
        "  -- best-guess if the end of the message looked like json object or array",
    ),
];

/// Observed kinds at one member path, before they are folded into a hint.
#[derive(Debug, Default)]
struct Shape {
    hints: Vec<&'static str>,
    nested: Option<BTreeMap<String, Shape>>,
    array: bool,
    object: bool,
}

impl Shape {
    fn add_hint(&mut self, hint: &'static str) {
        if !self.hints.contains(&hint) {
            self.hints.push(hint);
        }
    }
}

/// Builds the dictionary for `records`. An empty slice gives an empty map.
pub fn build_dictionary<R: Borrow<Record>>(records: &[R]) -> Dictionary {
    if records.is_empty() {
        return Dictionary::new();
    }

    let values: Vec<Value> = records
        .iter()
        .map(|record| record_value(record.borrow()))
        .collect();

    let mut shapes = BTreeMap::new();
    for value in &values {
        if let Value::Object(members) = value {
            for (key, member) in members {
                observe(&mut shapes, key, member);
            }
        }
    }
    for value in &values {
        mark_absent(&mut shapes, value);
    }

    let mut dictionary = finish(shapes);
    for (field, note) in FIELD_NOTES {
        if let Some(entry) = dictionary.get_mut(field.name()) {
            entry.hint.push_str(note);
        }
    }
    dictionary
}

/// Lists every member path with its hint, depth first. Array elements
/// appear as `[]`, so `payload.items[].name`.
pub fn flatten(dictionary: &Dictionary) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    flatten_into(dictionary, "", &mut rows);
    rows
}

fn flatten_into(dictionary: &Dictionary, prefix: &str, rows: &mut Vec<(String, String)>) {
    for (key, entry) in dictionary {
        let path = if key == ELEMENT {
            format!("{prefix}[]")
        } else if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        rows.push((path.clone(), entry.hint.clone()));
        if let Some(nested) = &entry.nested {
            flatten_into(nested, &path, rows);
        }
    }
}

fn record_value(record: &Record) -> Value {
    Value::Object(
        Field::ALL
            .into_iter()
            .map(|field| (field.name().to_string(), record.field(field)))
            .collect(),
    )
}

fn observe(shapes: &mut BTreeMap<String, Shape>, key: &str, value: &Value) {
    let shape = shapes.entry(key.to_string()).or_default();
    match value {
        Value::Array(items) => {
            shape.array = true;
            let nested = shape.nested.get_or_insert_with(BTreeMap::new);
            for item in items {
                observe(nested, ELEMENT, item);
            }
        }
        Value::Object(members) => {
            shape.object = true;
            let nested = shape.nested.get_or_insert_with(BTreeMap::new);
            for (member_key, member) in members {
                observe(nested, member_key, member);
            }
        }
        other => shape.add_hint(other.hint_name()),
    }
}

/// Adds `undefined` to every member that `value` lacks.
fn mark_absent(shapes: &mut BTreeMap<String, Shape>, value: &Value) {
    let no_members = BTreeMap::new();
    let members = match value {
        Value::Object(members) => members,
        _ => &no_members,
    };

    for (key, shape) in shapes.iter_mut() {
        if key == ELEMENT {
            match value {
                Value::Array(items) => {
                    if let Some(nested) = shape.nested.as_mut() {
                        for item in items {
                            mark_absent(nested, item);
                        }
                    }
                }
                _ => shape.add_hint("undefined"),
            }
            continue;
        }

        let member = members.get(key);
        if member.is_none() {
            shape.add_hint("undefined");
        }
        if let Some(nested) = shape.nested.as_mut() {
            mark_absent(nested, member.unwrap_or(&Value::Undefined));
        }
    }
}

fn finish(shapes: BTreeMap<String, Shape>) -> Dictionary {
    shapes
        .into_iter()
        .map(|(key, shape)| {
            let mut parts = shape.hints;
            if shape.array {
                parts.push("array");
            }
            if shape.object {
                parts.push("object");
            }
            let hint = if parts.is_empty() {
                "none".to_string()
            } else {
                parts.join(" | ")
            };
            let entry = DictionaryEntry {
                hint,
                nested: shape.nested.map(finish),
            };
            (key, entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_keep_first_seen_order_without_duplicates() {
        let mut shape = Shape::default();
        shape.add_hint("string");
        shape.add_hint("null");
        shape.add_hint("string");
        assert_eq!(shape.hints, vec!["string", "null"]);
    }

    #[test]
    fn flatten_names_array_elements() {
        let mut element = Dictionary::new();
        element.insert(
            "name".to_string(),
            DictionaryEntry {
                hint: "string".to_string(),
                nested: None,
            },
        );
        let mut items = Dictionary::new();
        items.insert(
            ELEMENT.to_string(),
            DictionaryEntry {
                hint: "object".to_string(),
                nested: Some(element),
            },
        );
        let mut top = Dictionary::new();
        top.insert(
            "items".to_string(),
            DictionaryEntry {
                hint: "array".to_string(),
                nested: Some(items),
            },
        );

        let paths: Vec<String> = flatten(&top).into_iter().map(|(path, _)| path).collect();
        assert_eq!(paths, vec!["items", "items[]", "items[].name"]);
    }
}
