use crate::annotate::Align;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Explore heterogeneous text logs: parse, filter, label and correlate
/// messages with small expressions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML file with view defaults
    #[arg(long, global = true, env = "LOG_SEA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase diagnostic output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// When to color terminal output
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    pub color: ColorMode,

    /// Output format
    #[arg(short = 'F', long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Also write the output to this file
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Filter, order and label the messages of one or more logs
    Query {
        /// Log files; `-` reads a combined stream from stdin
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Label expression (default from config: `title || line`)
        #[arg(long)]
        text: Option<String>,

        /// Correlation id expression
        #[arg(long)]
        id: Option<String>,

        /// Expression choosing the background color
        #[arg(long = "color-by")]
        color_by: Option<String>,

        /// Expression shown under each message; without a value, the
        /// profile's `details` expression
        #[arg(long, value_name = "EXPR", num_args = 0..=1)]
        details: Option<Option<String>>,

        /// Show a log even if it is large
        #[arg(long, value_name = "LOG")]
        show: Vec<String>,

        /// Hide a log
        #[arg(long, value_name = "LOG")]
        hide: Vec<String>,

        /// Align a log's messages, e.g. `server=right`
        #[arg(long, value_name = "LOG=ALIGN", value_parser = parse_log_align)]
        align: Vec<(String, Align)>,
    },
    /// Show the member paths and value kinds of the selected messages
    Schema {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// List logs with their message counts and time range suggestions
    Logs {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Predicate expression, e.g. "title == 'hello'"
    #[arg(long)]
    pub filter: Option<String>,

    /// Start time: `yyyy-mm-dd hh:mm:ss`, `hh:mm:ss (+1day)` or `-N unit`
    #[arg(long, allow_hyphen_values = true)]
    pub start: Option<String>,

    /// End time: same forms as --start, or `+N unit` after the start
    #[arg(long, allow_hyphen_values = true)]
    pub end: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn parse_log_align(s: &str) -> Result<(String, Align), String> {
    let (log, align) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("Invalid alignment '{}': expected LOG=left|center|right", s))?;
    Ok((log.to_string(), align.parse()?))
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_argument_splits_on_last_equals() {
        assert_eq!(
            parse_log_align("lsp:server=center"),
            Ok(("lsp:server".to_string(), Align::Center))
        );
        assert!(parse_log_align("server").is_err());
        assert!(parse_log_align("server=up").is_err());
    }

    #[test]
    fn details_value_is_optional() {
        let cli = Cli::try_parse_from(["log-sea", "query", "a.log", "--details"]).unwrap();
        match cli.command {
            Commands::Query { details, .. } => assert_eq!(details, Some(None)),
            other => panic!("unexpected command {other:?}"),
        }
        let cli =
            Cli::try_parse_from(["log-sea", "query", "a.log", "--details", "payload.n"]).unwrap();
        match cli.command {
            Commands::Query { details, .. } => {
                assert_eq!(details, Some(Some("payload.n".to_string())))
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn negative_start_is_accepted_as_a_value() {
        let cli = Cli::try_parse_from(["log-sea", "query", "a.log", "--start", "-5s"]).unwrap();
        match cli.command {
            Commands::Query { selection, .. } => assert_eq!(selection.start.as_deref(), Some("-5s")),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
