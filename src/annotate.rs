//! Per-record label, color, id list and alignment for a rendered view.

use crate::expr::{CompiledExpression, ExprError};
use crate::parser::Record;
use crate::value::Value;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Background used when the color or id expression fails.
pub const ERROR_COLOR: &str = "#E00000";
/// Label used when the text expression fails.
pub const ERROR_LABEL: &str = "error";

static HEX_COLOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#[0-9a-fA-F]{3}(?:[0-9a-fA-F]{3})?$").expect("valid hex color regex")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl fmt::Display for Align {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        })
    }
}

impl FromStr for Align {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(Align::Left),
            "center" => Ok(Align::Center),
            "right" => Ok(Align::Right),
            _ => Err(format!(
                "Invalid alignment: '{}'. Must be one of: left, center, right",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub gindex: usize,
    pub label: String,
    /// `#rrggbb` or `#rgb`.
    pub color: String,
    pub ids: Vec<String>,
    pub align: Align,
}

/// First failure of each annotation expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationErrors {
    pub text: Option<ExprError>,
    pub color: Option<ExprError>,
    pub id: Option<ExprError>,
}

/// The three expressions evaluated for every visible record.
#[derive(Debug, Clone)]
pub struct Annotators {
    pub text: CompiledExpression,
    pub color: CompiledExpression,
    pub id: CompiledExpression,
}

pub fn annotate<F>(
    records: &[&Record],
    annotators: &Annotators,
    align_for: F,
) -> (Vec<Annotation>, AnnotationErrors)
where
    F: Fn(&str) -> Align,
{
    let mut errors = AnnotationErrors::default();
    let annotations = records
        .iter()
        .map(|record| {
            let label = match annotators.text.eval(record) {
                Ok(value) => value.to_display_string(),
                Err(err) => {
                    errors.text.get_or_insert(err);
                    ERROR_LABEL.to_string()
                }
            };
            let mut color = match annotators.color.eval(record) {
                Ok(value) => color_for(&value),
                Err(err) => {
                    errors.color.get_or_insert(err);
                    ERROR_COLOR.to_string()
                }
            };
            let ids = match annotators.id.eval(record) {
                Ok(value) => ids_of(&value),
                Err(err) => {
                    errors.id.get_or_insert(err);
                    color = ERROR_COLOR.to_string();
                    Vec::new()
                }
            };
            Annotation {
                gindex: record.gindex,
                label,
                color,
                ids,
                align: align_for(&record.log),
            }
        })
        .collect();
    (annotations, errors)
}

/// A hex color string is used as is; any other value picks one of twelve
/// pastel hues.
pub fn color_for(value: &Value) -> String {
    if let Value::String(s) = value
        && HEX_COLOR_RE.is_match(s)
    {
        return s.clone();
    }
    let bucket = fnv1a(&value.to_display_string()) % 12;
    hsl(bucket as f64 / 12.0, 0.5, 0.9)
}

/// De-duplicated, stringified ids. Null entries are dropped.
pub fn ids_of(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => {
            let mut ids: Vec<String> = Vec::new();
            for item in items.iter().filter(|item| !item.is_nullish()) {
                let id = item.to_display_string();
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            ids
        }
        other if other.is_nullish() => Vec::new(),
        other => vec![other.to_display_string()],
    }
}

/// Positions (within `annotations`) of every id carried by more than one
/// record.
pub fn correlate(annotations: &[Annotation]) -> BTreeMap<String, Vec<usize>> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (position, annotation) in annotations.iter().enumerate() {
        for id in &annotation.ids {
            groups.entry(id.clone()).or_default().push(position);
        }
    }
    groups.retain(|_, positions| positions.len() > 1);
    groups
}

/// FNV-1a style hash over UTF-16 code units, wrapping at 32 bits between
/// rounds. Used only to pick a stable hue.
pub fn fnv1a(text: &str) -> u64 {
    let mut hash: i64 = 0x811c_9dc5;
    for unit in text.encode_utf16() {
        let h = (hash as i32) ^ i32::from(unit);
        hash = [0u32, 1, 4, 7, 8, 24]
            .iter()
            .map(|&shift| i64::from(h.wrapping_shl(shift)))
            .sum();
    }
    hash.unsigned_abs()
}

/// Hue, saturation and lightness in `[0, 1]` to `#rrggbb`.
pub fn hsl(h: f64, s: f64, l: f64) -> String {
    let (r, g, b) = if s == 0.0 {
        (l, l, l)
    } else {
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        (
            hue_to_channel(p, q, h + 1.0 / 3.0),
            hue_to_channel(p, q, h),
            hue_to_channel(p, q, h - 1.0 / 3.0),
        )
    };
    let byte = |channel: f64| (channel * 255.0 + 0.5).floor().clamp(0.0, 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", byte(r), byte(g), byte(b))
}

fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    } else if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_pass_through() {
        assert_eq!(color_for(&Value::from("#abc")), "#abc");
        assert_eq!(color_for(&Value::from("#A0B1C2")), "#A0B1C2");
        assert_ne!(color_for(&Value::from("#abcd")), "#abcd");
    }

    #[test]
    fn other_values_get_a_stable_pastel() {
        let first = color_for(&Value::from("hello"));
        assert_eq!(first, color_for(&Value::from("hello")));
        assert!(first.starts_with('#') && first.len() == 7);
    }

    #[test]
    fn hsl_matches_known_colors() {
        assert_eq!(hsl(0.0, 1.0, 0.5), "#ff0000");
        assert_eq!(hsl(0.0, 0.0, 1.0), "#ffffff");
        assert_eq!(hsl(1.0 / 3.0, 1.0, 0.5), "#00ff00");
    }

    #[test]
    fn empty_string_hash_is_the_offset_basis() {
        assert_eq!(fnv1a(""), 0x811c_9dc5);
        assert_ne!(fnv1a("a"), fnv1a("b"));
    }

    #[test]
    fn ids_are_deduplicated_and_nulls_dropped() {
        let value = Value::Array(vec![
            Value::from("a"),
            Value::Null,
            Value::from(1.0),
            Value::from("a"),
        ]);
        assert_eq!(ids_of(&value), vec!["a", "1"]);
        assert_eq!(ids_of(&Value::Undefined), Vec::<String>::new());
        assert_eq!(ids_of(&Value::from("x")), vec!["x"]);
    }

    #[test]
    fn correlate_keeps_shared_ids_only() {
        let annotation = |ids: &[&str]| Annotation {
            gindex: 0,
            label: String::new(),
            color: String::new(),
            ids: ids.iter().map(|id| id.to_string()).collect(),
            align: Align::Left,
        };
        let groups = correlate(&[annotation(&["1", "2"]), annotation(&["3"]), annotation(&["1"])]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["1"], vec![0, 2]);
    }

    #[test]
    fn align_parses_case_insensitively() {
        assert_eq!("Right".parse::<Align>(), Ok(Align::Right));
        assert!("middle".parse::<Align>().is_err());
    }
}
