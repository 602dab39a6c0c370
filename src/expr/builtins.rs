//! The closed set of functions an expression can call.
//!
//! Strings, arrays, numbers and dates have a fixed list of methods; `Math`,
//! `JSON`, `Array` and `Object` expose a fixed list of functions. Nothing
//! here performs I/O or keeps state between calls.

use super::error::ExprError;
use super::eval::Interpreter;
use super::parser::{Conversion, Expr, Namespace};
use crate::value::{Value, format_date, format_number};
use chrono::{Datelike, Timelike};
use regex::{Regex, RegexBuilder};
use std::f64::consts;

/// Upper bound on strings built by `repeat` and the pad methods.
const MAX_BUILT_LEN: usize = 1 << 20;
const MAX_REGEX_SIZE: usize = 1 << 20;

/// An evaluated call argument.
pub enum Arg<'e> {
    Value(Value),
    Lambda { arity: usize, body: &'e Expr },
}

fn value_at(args: &[Arg<'_>], i: usize) -> Value {
    match args.get(i) {
        Some(Arg::Value(value)) => value.clone(),
        _ => Value::Undefined,
    }
}

fn number_at(args: &[Arg<'_>], i: usize, default: f64) -> f64 {
    match value_at(args, i) {
        Value::Undefined => default,
        other => other.to_number(),
    }
}

fn string_at(args: &[Arg<'_>], i: usize) -> String {
    value_at(args, i).to_display_string()
}

fn lambda_at<'e>(args: &[Arg<'e>], i: usize, method: &str) -> Result<(usize, &'e Expr), ExprError> {
    match args.get(i) {
        Some(Arg::Lambda { arity, body }) => Ok((*arity, *body)),
        _ => Err(ExprError::Type(format!("{method} expects an arrow function"))),
    }
}

fn values(args: &[Arg<'_>]) -> Vec<Value> {
    (0..args.len()).map(|i| value_at(args, i)).collect()
}

fn not_a_function(receiver: &str, name: &str) -> ExprError {
    ExprError::NotAFunction(format!("{receiver}.{name}"))
}

/// Converts a possibly negative, possibly fractional position into an
/// offset within `0..=len`.
fn relative_index(position: f64, len: usize) -> usize {
    if position.is_nan() {
        return 0;
    }
    let position = position.trunc();
    if position < 0.0 {
        (len as f64 + position).max(0.0) as usize
    } else {
        position.min(len as f64) as usize
    }
}

pub fn convert(conversion: Conversion, args: &[Arg<'_>]) -> Value {
    let value = value_at(args, 0);
    match (conversion, args.is_empty()) {
        (Conversion::String, true) => Value::String(String::new()),
        (Conversion::Number, true) => Value::Number(0.0),
        (Conversion::String, false) => Value::String(value.to_display_string()),
        (Conversion::Number, false) => Value::Number(value.to_number()),
        (Conversion::Boolean, _) => Value::Bool(value.is_truthy()),
    }
}

/// Non-function members of a namespace, such as `Math.PI`.
pub fn namespace_member(namespace: Namespace, name: &str) -> Result<Value, ExprError> {
    match (namespace, name) {
        (Namespace::Math, "PI") => Ok(Value::Number(consts::PI)),
        (Namespace::Math, "E") => Ok(Value::Number(consts::E)),
        (Namespace::Math, "LN2") => Ok(Value::Number(consts::LN_2)),
        (Namespace::Math, "LN10") => Ok(Value::Number(consts::LN_10)),
        (Namespace::Math, "SQRT2") => Ok(Value::Number(consts::SQRT_2)),
        _ => Err(ExprError::Type(format!(
            "{}.{name} is not a value",
            namespace.name()
        ))),
    }
}

pub fn call_namespace(
    interp: &mut Interpreter<'_>,
    namespace: Namespace,
    name: &str,
    args: Vec<Arg<'_>>,
) -> Result<Value, ExprError> {
    match namespace {
        Namespace::Math => math(name, &args),
        Namespace::Json => json(name, &args),
        Namespace::Array => array_namespace(interp, name, &args),
        Namespace::Object => object_namespace(name, &args),
        Namespace::String => string_namespace(name, &args),
    }
}

fn string_namespace(name: &str, args: &[Arg<'_>]) -> Result<Value, ExprError> {
    match name {
        "fromCharCode" => {
            let units: Vec<u16> = values(args)
                .iter()
                .map(|value| {
                    let n = value.to_number();
                    if n.is_finite() {
                        n.trunc().rem_euclid(65536.0) as u16
                    } else {
                        0
                    }
                })
                .collect();
            Ok(Value::String(String::from_utf16_lossy(&units)))
        }
        "fromCodePoint" => values(args)
            .iter()
            .map(|value| {
                let n = value.to_number();
                (n.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&n))
                    .then(|| char::from_u32(n as u32))
                    .flatten()
                    .ok_or_else(|| {
                        ExprError::Runtime(format!("invalid code point {}", format_number(n)))
                    })
            })
            .collect::<Result<String, _>>()
            .map(Value::String),
        _ => Err(not_a_function("String", name)),
    }
}

fn math(name: &str, args: &[Arg<'_>]) -> Result<Value, ExprError> {
    let x = number_at(args, 0, f64::NAN);
    let result = match name {
        "abs" => x.abs(),
        "ceil" => x.ceil(),
        "floor" => x.floor(),
        "round" => (x + 0.5).floor(),
        "trunc" => x.trunc(),
        "sign" => {
            if x.is_nan() || x == 0.0 {
                x
            } else {
                x.signum()
            }
        }
        "sqrt" => x.sqrt(),
        "cbrt" => x.cbrt(),
        "exp" => x.exp(),
        "log" => x.ln(),
        "log10" => x.log10(),
        "log2" => x.log2(),
        "pow" => x.powf(number_at(args, 1, f64::NAN)),
        "min" | "max" => {
            let numbers: Vec<f64> = values(args).iter().map(Value::to_number).collect();
            if numbers.iter().any(|n| n.is_nan()) {
                f64::NAN
            } else if name == "min" {
                numbers.into_iter().fold(f64::INFINITY, f64::min)
            } else {
                numbers.into_iter().fold(f64::NEG_INFINITY, f64::max)
            }
        }
        _ => return Err(not_a_function("Math", name)),
    };
    Ok(Value::Number(result))
}

fn json(name: &str, args: &[Arg<'_>]) -> Result<Value, ExprError> {
    match name {
        "stringify" => Ok(value_at(args, 0)
            .to_json()
            .map_or(Value::Undefined, |json| Value::String(json.to_string()))),
        "parse" => serde_json::from_str::<serde_json::Value>(&string_at(args, 0))
            .map(|json| Value::from(&json))
            .map_err(|err| ExprError::Runtime(format!("JSON.parse: {err}"))),
        _ => Err(not_a_function("JSON", name)),
    }
}

fn array_namespace(
    interp: &mut Interpreter<'_>,
    name: &str,
    args: &[Arg<'_>],
) -> Result<Value, ExprError> {
    match name {
        "isArray" => Ok(Value::Bool(matches!(value_at(args, 0), Value::Array(_)))),
        "of" => Ok(Value::Array(values(args))),
        "from" => {
            let items = match value_at(args, 0) {
                Value::Array(items) => items,
                Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                _ => Vec::new(),
            };
            match args.get(1) {
                Some(Arg::Lambda { arity, body }) => items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| interp.invoke(*arity, body, &[item.clone(), Value::from(i as f64)]))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                _ => Ok(Value::Array(items)),
            }
        }
        _ => Err(not_a_function("Array", name)),
    }
}

fn object_namespace(name: &str, args: &[Arg<'_>]) -> Result<Value, ExprError> {
    let entries: Vec<(String, Value)> = match value_at(args, 0) {
        Value::Object(members) => members.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item))
            .collect(),
        Value::String(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::String(c.to_string())))
            .collect(),
        Value::Undefined | Value::Null => {
            return Err(ExprError::Type(format!(
                "Object.{name} called on null or undefined"
            )));
        }
        _ => Vec::new(),
    };
    let items = match name {
        "keys" => entries.into_iter().map(|(k, _)| Value::String(k)).collect(),
        "values" => entries.into_iter().map(|(_, v)| v).collect(),
        "entries" => entries
            .into_iter()
            .map(|(k, v)| Value::Array(vec![Value::String(k), v]))
            .collect(),
        _ => return Err(not_a_function("Object", name)),
    };
    Ok(Value::Array(items))
}

/// Calls `receiver.name(args)`.
pub fn call_method(
    interp: &mut Interpreter<'_>,
    receiver: Value,
    name: &str,
    args: Vec<Arg<'_>>,
) -> Result<Value, ExprError> {
    match receiver {
        Value::String(s) => string_method(&s, name, &args),
        Value::Array(items) => array_method(interp, items, name, &args),
        Value::Number(n) => number_method(n, name, &args),
        Value::Date(time) => date_method(&time, name),
        Value::Bool(b) if name == "toString" => Ok(Value::String(b.to_string())),
        Value::Object(_) if name == "toString" => Ok(Value::String(receiver.to_display_string())),
        other => Err(not_a_function(other.type_of(), name)),
    }
}

fn string_method(s: &str, name: &str, args: &[Arg<'_>]) -> Result<Value, ExprError> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let slice = |from: usize, to: usize| -> String {
        if from < to { chars[from..to].iter().collect() } else { String::new() }
    };
    let char_index = |byte: usize| s[..byte].chars().count();

    Ok(match name {
        "toString" | "valueOf" => Value::String(s.to_string()),
        "startsWith" => {
            let from = relative_index(number_at(args, 1, 0.0).max(0.0), len);
            Value::Bool(slice(from, len).starts_with(&string_at(args, 0)))
        }
        "endsWith" => {
            let to = relative_index(number_at(args, 1, len as f64).max(0.0), len);
            Value::Bool(slice(0, to).ends_with(&string_at(args, 0)))
        }
        "includes" => Value::Bool(s.contains(&string_at(args, 0))),
        "indexOf" => Value::Number(
            s.find(&string_at(args, 0))
                .map_or(-1.0, |byte| char_index(byte) as f64),
        ),
        "lastIndexOf" => Value::Number(
            s.rfind(&string_at(args, 0))
                .map_or(-1.0, |byte| char_index(byte) as f64),
        ),
        "slice" => {
            let from = relative_index(number_at(args, 0, 0.0), len);
            let to = relative_index(number_at(args, 1, len as f64), len);
            Value::String(slice(from, to))
        }
        "substring" => {
            let clamp = |n: f64| if n.is_nan() { 0 } else { n.clamp(0.0, len as f64) as usize };
            let a = clamp(number_at(args, 0, 0.0));
            let b = clamp(number_at(args, 1, len as f64));
            Value::String(slice(a.min(b), a.max(b)))
        }
        "charAt" => {
            let i = number_at(args, 0, 0.0);
            let i = if i.is_nan() { 0.0 } else { i.trunc() };
            Value::String(if i >= 0.0 && (i as usize) < len {
                chars[i as usize].to_string()
            } else {
                String::new()
            })
        }
        "at" => {
            let i = number_at(args, 0, 0.0).trunc();
            let i = if i < 0.0 { len as f64 + i } else { i };
            if i >= 0.0 && (i as usize) < len {
                Value::String(chars[i as usize].to_string())
            } else {
                Value::Undefined
            }
        }
        "toLowerCase" => Value::String(s.to_lowercase()),
        "toUpperCase" => Value::String(s.to_uppercase()),
        "trim" => Value::String(s.trim().to_string()),
        "trimStart" => Value::String(s.trim_start().to_string()),
        "trimEnd" => Value::String(s.trim_end().to_string()),
        "split" => {
            let parts: Vec<Value> = match value_at(args, 0) {
                Value::Undefined => vec![Value::String(s.to_string())],
                separator => {
                    let separator = separator.to_display_string();
                    if separator.is_empty() {
                        chars.iter().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(separator.as_str()).map(Value::from).collect()
                    }
                }
            };
            let limit = number_at(args, 1, f64::INFINITY);
            let limit = if limit.is_nan() { 0 } else { limit.max(0.0).min(parts.len() as f64) as usize };
            Value::Array(parts.into_iter().take(limit).collect())
        }
        "replace" => Value::String(s.replacen(&string_at(args, 0), &string_at(args, 1), 1)),
        "replaceAll" => {
            let pattern = string_at(args, 0);
            if pattern.is_empty() {
                return Err(ExprError::Runtime("replaceAll needs a non-empty pattern".to_string()));
            }
            Value::String(s.replace(&pattern, &string_at(args, 1)))
        }
        "match" => {
            let re = compile_regex(&string_at(args, 0))?;
            match re.captures(s) {
                Some(caps) => Value::Array(
                    caps.iter()
                        .map(|group| group.map_or(Value::Undefined, |m| Value::from(m.as_str())))
                        .collect(),
                ),
                None => Value::Null,
            }
        }
        "search" => {
            let re = compile_regex(&string_at(args, 0))?;
            Value::Number(re.find(s).map_or(-1.0, |m| char_index(m.start()) as f64))
        }
        "repeat" => {
            let count = number_at(args, 0, 0.0);
            if count < 0.0 || !count.is_finite() {
                return Err(ExprError::Runtime(format!("invalid repeat count {}", format_number(count))));
            }
            let count = count as usize;
            if s.len().saturating_mul(count) > MAX_BUILT_LEN {
                return Err(ExprError::Runtime("repeat result is too long".to_string()));
            }
            Value::String(s.repeat(count))
        }
        "padStart" | "padEnd" => {
            let target = number_at(args, 0, 0.0);
            if target > MAX_BUILT_LEN as f64 {
                return Err(ExprError::Runtime(format!("{name} result is too long")));
            }
            let target = if target.is_nan() { 0 } else { target.max(0.0) as usize };
            let fill = match value_at(args, 1) {
                Value::Undefined => " ".to_string(),
                other => other.to_display_string(),
            };
            if target <= len || fill.is_empty() {
                Value::String(s.to_string())
            } else {
                let padding: String = fill.chars().cycle().take(target - len).collect();
                Value::String(if name == "padStart" {
                    format!("{padding}{s}")
                } else {
                    format!("{s}{padding}")
                })
            }
        }
        "concat" => {
            let mut joined = s.to_string();
            for value in values(args) {
                joined.push_str(&value.to_display_string());
            }
            Value::String(joined)
        }
        _ => return Err(not_a_function("string", name)),
    })
}

fn compile_regex(pattern: &str) -> Result<Regex, ExprError> {
    RegexBuilder::new(pattern)
        .size_limit(MAX_REGEX_SIZE)
        .build()
        .map_err(|err| ExprError::Runtime(format!("invalid regular expression: {err}")))
}

fn array_method(
    interp: &mut Interpreter<'_>,
    items: Vec<Value>,
    name: &str,
    args: &[Arg<'_>],
) -> Result<Value, ExprError> {
    let len = items.len();
    Ok(match name {
        "toString" => Value::String(Value::Array(items).to_display_string()),
        "includes" => {
            let needle = value_at(args, 0);
            Value::Bool(items.iter().any(|item| item.same_value_zero(&needle)))
        }
        "indexOf" => {
            let needle = value_at(args, 0);
            Value::Number(
                items
                    .iter()
                    .position(|item| item.strict_eq(&needle))
                    .map_or(-1.0, |i| i as f64),
            )
        }
        "join" => {
            let separator = match value_at(args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_display_string(),
            };
            Value::String(
                items
                    .iter()
                    .map(|item| {
                        if item.is_nullish() {
                            String::new()
                        } else {
                            item.to_display_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(&separator),
            )
        }
        "slice" => {
            let from = relative_index(number_at(args, 0, 0.0), len);
            let to = relative_index(number_at(args, 1, len as f64), len);
            Value::Array(if from < to { items[from..to].to_vec() } else { Vec::new() })
        }
        "concat" => {
            let mut joined = items;
            for value in values(args) {
                match value {
                    Value::Array(more) => joined.extend(more),
                    other => joined.push(other),
                }
            }
            Value::Array(joined)
        }
        "at" => {
            let i = number_at(args, 0, 0.0).trunc();
            let i = if i < 0.0 { len as f64 + i } else { i };
            if i >= 0.0 {
                items.get(i as usize).cloned().unwrap_or_default()
            } else {
                Value::Undefined
            }
        }
        "reverse" => Value::Array(items.into_iter().rev().collect()),
        "map" | "filter" | "some" | "every" | "find" | "findIndex" => {
            let (arity, body) = lambda_at(args, 0, name)?;
            let mut results = Vec::with_capacity(len);
            for (i, item) in items.iter().enumerate() {
                let result = interp.invoke(arity, body, &[item.clone(), Value::from(i as f64)])?;
                let hit = result.is_truthy();
                match name {
                    "some" if hit => return Ok(Value::Bool(true)),
                    "every" if !hit => return Ok(Value::Bool(false)),
                    "find" if hit => return Ok(item.clone()),
                    "findIndex" if hit => return Ok(Value::from(i as f64)),
                    "map" => results.push(result),
                    "filter" if hit => results.push(item.clone()),
                    _ => {}
                }
            }
            match name {
                "some" => Value::Bool(false),
                "every" => Value::Bool(true),
                "find" => Value::Undefined,
                "findIndex" => Value::Number(-1.0),
                _ => Value::Array(results),
            }
        }
        _ => return Err(not_a_function("array", name)),
    })
}

fn number_method(n: f64, name: &str, args: &[Arg<'_>]) -> Result<Value, ExprError> {
    match name {
        "valueOf" => Ok(Value::Number(n)),
        "toString" => Ok(Value::String(format_number(n))),
        "toFixed" => {
            let digits = number_at(args, 0, 0.0);
            if !(0.0..=100.0).contains(&digits) {
                return Err(ExprError::Runtime(format!(
                    "toFixed digits must be between 0 and 100, got {}",
                    format_number(digits)
                )));
            }
            if !n.is_finite() {
                return Ok(Value::String(format_number(n)));
            }
            Ok(Value::String(format!("{:.*}", digits as usize, n)))
        }
        _ => Err(not_a_function("number", name)),
    }
}

fn date_method(time: &chrono::DateTime<chrono::Utc>, name: &str) -> Result<Value, ExprError> {
    let number = |n: u32| Ok(Value::Number(f64::from(n)));
    match name {
        "getTime" | "valueOf" => Ok(Value::Number(time.timestamp_millis() as f64)),
        "toISOString" | "toJSON" | "toString" => Ok(Value::String(format_date(time))),
        "getUTCFullYear" => Ok(Value::Number(f64::from(time.year()))),
        "getUTCMonth" => number(time.month0()),
        "getUTCDate" => number(time.day()),
        "getUTCDay" => number(time.weekday().num_days_from_sunday()),
        "getUTCHours" => number(time.hour()),
        "getUTCMinutes" => number(time.minute()),
        "getUTCSeconds" => number(time.second()),
        "getUTCMilliseconds" => number(time.timestamp_subsec_millis()),
        _ => Err(not_a_function("Date", name)),
    }
}
