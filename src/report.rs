//! Text and JSON renderings of query, schema and log listings.

use crate::annotate::{Align, correlate};
use crate::dictionary::{Dictionary, flatten};
use crate::query::QueryOutcome;
use crate::session::Session;
use crate::timeutil::format_time_control;
use crate::value::format_date;
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use serde_json::{Value as JsonValue, json};

const LABEL_WIDTH: usize = 60;

/// Creates a table with the standard look and bold headers.
pub fn create_styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );
    table
}

/// `#rgb` or `#rrggbb` to channels.
fn parse_hex_color(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut digits = hex.chars().map(|c| channel(&c.to_string()).map(|d| d * 17));
            Some((digits.next()??, digits.next()??, digits.next()??))
        }
        6 => Some((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        _ => None,
    }
}

fn one_line(text: &str) -> String {
    let line: String = text.replace(['\n', '\r'], " ");
    if line.chars().count() > LABEL_WIDTH {
        let mut cut: String = line.chars().take(LABEL_WIDTH - 1).collect();
        cut.push('…');
        cut
    } else {
        line
    }
}

fn aligned(text: &str, align: Align) -> String {
    match align {
        Align::Left => format!("{text:<LABEL_WIDTH$}"),
        Align::Center => format!("{text:^LABEL_WIDTH$}"),
        Align::Right => format!("{text:>LABEL_WIDTH$}"),
    }
}

/// One line per record: time, log, colored label and ids. Details (when
/// given) follow indented, then any per-slot errors.
pub fn format_query_text(
    session: &Session,
    outcome: &QueryOutcome<'_>,
    details: &[Option<String>],
    details_error: Option<&str>,
) -> String {
    let mut out = String::new();
    let records = session.records();
    let log_width = outcome
        .records
        .iter()
        .map(|r| r.log.chars().count())
        .max()
        .unwrap_or(0);

    for (i, (record, annotation)) in outcome.records.iter().zip(&outcome.annotations).enumerate() {
        let time = record
            .time
            .map(|t| format_time_control(&t, records))
            .unwrap_or_default();
        let label = aligned(&one_line(&annotation.label), annotation.align);
        let label = match parse_hex_color(&annotation.color) {
            Some((r, g, b)) => label.on_truecolor(r, g, b).black().to_string(),
            None => label,
        };
        out.push_str(&format!(
            "{} {} {label}",
            format!("{time:<12}").dimmed(),
            format!("{:<log_width$}", record.log).cyan(),
        ));
        if !annotation.ids.is_empty() {
            out.push_str(&format!(" [{}]", annotation.ids.join(", ")).bright_black().to_string());
        }
        out.push('\n');
        if let Some(Some(text)) = details.get(i) {
            for line in text.lines() {
                out.push_str(&format!("    {line}\n"));
            }
        }
    }

    out.push_str(&format!(
        "{}\n",
        format!(
            "{} of {} messages",
            outcome.records.len(),
            records.len()
        )
        .bold()
    ));

    let mut errors = outcome.errors.messages();
    if let Some(message) = details_error {
        errors.push(("details", message.to_string()));
    }
    for (slot, message) in errors {
        out.push_str(&format!("{} {}\n", format!("{slot}:").red().bold(), message.red()));
    }
    out
}

pub fn format_query_json(
    outcome: &QueryOutcome<'_>,
    details: &[Option<String>],
    details_error: Option<&str>,
) -> String {
    let records: Vec<JsonValue> = outcome
        .records
        .iter()
        .zip(&outcome.annotations)
        .enumerate()
        .map(|(i, (record, annotation))| {
            json!({
                "gindex": record.gindex,
                "log": record.log,
                "time": record.time.as_ref().map(format_date),
                "label": annotation.label,
                "color": annotation.color,
                "ids": annotation.ids,
                "align": annotation.align,
                "details": details.get(i).cloned().flatten(),
            })
        })
        .collect();

    let mut errors: serde_json::Map<String, JsonValue> = outcome
        .errors
        .messages()
        .into_iter()
        .map(|(slot, message)| (slot.to_string(), JsonValue::String(message)))
        .collect();
    if let Some(message) = details_error {
        errors.insert("details".to_string(), JsonValue::String(message.to_string()));
    }

    let output = json!({
        "start": outcome.start.as_ref().map(format_date),
        "end": outcome.end.as_ref().map(format_date),
        "records": records,
        "correlations": correlate(&outcome.annotations),
        "errors": errors,
    });
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_schema_text(dictionary: &Dictionary) -> String {
    if dictionary.is_empty() {
        return format!("{}\n", "No messages selected".yellow());
    }
    let mut table = create_styled_table(&["Member", "Hint"]);
    for (path, hint) in flatten(dictionary) {
        table.add_row(vec![Cell::new(path), Cell::new(hint)]);
    }
    format!("{table}\n")
}

pub fn format_schema_json(dictionary: &Dictionary) -> String {
    serde_json::to_string_pretty(dictionary).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_logs_text(session: &Session) -> String {
    let mut table = create_styled_table(&["Log", "Messages", "Shown", "Align"]);
    for (log, count) in session.log_counts() {
        let view = session.default_log_view(&log);
        table.add_row(vec![
            Cell::new(&log),
            Cell::new(count),
            Cell::new(if view.visible { "yes" } else { "no" }),
            Cell::new(view.align),
        ]);
    }

    let mut out = format!("{table}\n");
    let suggestions = session.time_suggestions();
    if suggestions.start.is_empty() {
        out.push_str(&format!("{}\n", "No message carries a time".yellow()));
        return out;
    }
    for (title, list) in [("Start", &suggestions.start), ("End", &suggestions.end)] {
        out.push_str(&format!("\n{}\n", title.bold()));
        for suggestion in list {
            out.push_str(&format!("  {}\n", suggestion.label));
        }
    }
    out
}

pub fn format_logs_json(session: &Session) -> String {
    let logs: Vec<JsonValue> = session
        .log_counts()
        .into_iter()
        .map(|(log, count)| {
            let view = session.default_log_view(&log);
            json!({
                "log": log,
                "messages": count,
                "visible": view.visible,
                "align": view.align,
            })
        })
        .collect();
    let output = json!({
        "logs": logs,
        "time_suggestions": session.time_suggestions(),
    });
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}
