pub mod annotate;
pub mod cli;
pub mod config;
pub mod dictionary;
pub mod expr;
pub mod parser;
pub mod query;
pub mod report;
pub mod session;
pub mod timeutil;
pub mod value;

use crate::cli::SelectionArgs;
use crate::config::SeaConfig;
use crate::query::Query;
use anyhow::Context;
use log::debug;
use std::io::Read;
use std::path::{Path, PathBuf};

pub use cli::{ColorMode, Commands, OutputFormat, cli_parse};
pub use expr::{CompiledExpression, ExprError, compile};
pub use parser::{Record, parse_log, parse_message, parse_relaxed, split_logs};
pub use session::Session;

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

/// Reads every file into one session. `-` and files containing
/// `==> path <==` dividers are read as combined streams.
fn load_session(files: &[PathBuf], config: &SeaConfig) -> anyhow::Result<Session> {
    let mut session = Session::new(config.view.clone());
    for file in files {
        if file == Path::new("-") {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            session.ingest(&text);
            continue;
        }
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read log file '{}'", file.display()))?;
        let added = if split_logs(&text).len() > 1 {
            session.ingest(&text)
        } else {
            session.load(&file.to_string_lossy(), &text)
        };
        debug!("loaded {added} records from {}", file.display());
    }
    Ok(session)
}

fn apply_selection(query: &mut Query, selection: &SelectionArgs) {
    if let Some(filter) = &selection.filter {
        query.filter = filter.clone();
    }
    if let Some(start) = &selection.start {
        query.start = start.clone();
    }
    if let Some(end) = &selection.end {
        query.end = end.clone();
    }
}

fn write_output_file(path: &Path, content: &str) -> anyhow::Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output file '{}'", path.display()))
}

pub fn run() -> anyhow::Result<()> {
    let cli = cli_parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }

    let config = config::load_config(cli.config.as_deref()).context("Failed to load config")?;
    debug!("config profile: {}", config.profile_name);

    let render = |session: &Session| -> String {
        match &cli.command {
            Commands::Query {
                selection,
                text,
                id,
                color_by,
                details,
                show,
                hide,
                align,
                ..
            } => {
                let mut query = session.default_query();
                apply_selection(&mut query, selection);
                if let Some(text) = text {
                    query.text = text.clone();
                }
                if let Some(id) = id {
                    query.id = id.clone();
                }
                if let Some(color) = color_by {
                    query.color = color.clone();
                }
                for (log, visible) in show
                    .iter()
                    .map(|log| (log, true))
                    .chain(hide.iter().map(|log| (log, false)))
                {
                    query
                        .log_views
                        .entry(log.clone())
                        .or_insert_with(|| session.default_log_view(log))
                        .visible = visible;
                }
                for (log, alignment) in align {
                    query
                        .log_views
                        .entry(log.clone())
                        .or_insert_with(|| session.default_log_view(log))
                        .align = *alignment;
                }

                let outcome = session.query(&query);

                let mut details_error = None;
                let details_expr = details
                    .as_ref()
                    .map(|expr| expr.as_deref().unwrap_or(&session.view().details));
                let details: Vec<Option<String>> = match details_expr {
                    Some(expr) => outcome
                        .records
                        .iter()
                        .map(|record| match session.details(record.gindex, expr) {
                            Ok(text) => text,
                            Err(err) => {
                                details_error.get_or_insert_with(|| err.to_string());
                                None
                            }
                        })
                        .collect(),
                    None => Vec::new(),
                };

                match cli.format {
                    OutputFormat::Text => report::format_query_text(
                        session,
                        &outcome,
                        &details,
                        details_error.as_deref(),
                    ),
                    OutputFormat::Json => {
                        report::format_query_json(&outcome, &details, details_error.as_deref())
                    }
                }
            }
            Commands::Schema { selection, .. } => {
                let mut query = session.default_query();
                apply_selection(&mut query, selection);
                let outcome = session.query(&query);
                for (slot, message) in outcome.errors.messages() {
                    log::warn!("{slot}: {message}");
                }
                match cli.format {
                    OutputFormat::Text => report::format_schema_text(&outcome.dictionary),
                    OutputFormat::Json => report::format_schema_json(&outcome.dictionary),
                }
            }
            Commands::Logs { .. } => match cli.format {
                OutputFormat::Text => report::format_logs_text(session),
                OutputFormat::Json => report::format_logs_json(session),
            },
        }
    };

    let files = match &cli.command {
        Commands::Query { files, .. } | Commands::Schema { files, .. } | Commands::Logs { files } => {
            files
        }
    };
    let session = load_session(files, &config)?;

    let output = render(&session);
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }

    if let Some(path) = &cli.output {
        let content = if cli.format == OutputFormat::Text {
            colored::control::set_override(false);
            let plain = render(&session);
            colored::control::unset_override();
            plain
        } else {
            output
        };
        write_output_file(path, &content)?;
    }

    Ok(())
}
