use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::LogFormat;
use crate::notes::NoteNumberGrammar;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only print the verdict
    Quiet,
    /// Print the verdict and every error
    #[default]
    Normal,
}

/// How the `validate` subcommand prints its report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// MIDNAM document service
#[derive(Parser, Debug, Clone)]
#[command(name = "midnam-server")]
#[command(about = "Load, validate and save a MIDI name document over HTTP")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long = "host", global = true)]
    pub host: Option<String>,

    /// Port to bind
    #[arg(short = 'p', long = "port", global = true)]
    pub port: Option<u16>,

    /// Path of the stored document
    #[arg(short = 'd', long = "document", global = true)]
    pub document: Option<PathBuf>,

    /// Validate every document against this DTD instead of its own DOCTYPE
    #[arg(long = "dtd", global = true)]
    pub dtd: Option<PathBuf>,

    /// Directory of static files served next to the API
    #[arg(long = "static-dir", global = true)]
    pub static_dir: Option<PathBuf>,

    /// Accepted lexicon for note numbers
    #[arg(long = "note-numbers", value_enum, global = true)]
    pub note_numbers: Option<NoteNumberGrammar>,

    /// Log filter, e.g. "info" or "midnam_server=debug"
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Log line format
    #[arg(long = "log-format", value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP service (the default)
    Serve,

    /// Validate a document file and exit non-zero when it is invalid
    Validate {
        /// Document to validate
        file: PathBuf,

        /// Report format
        #[arg(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,

        /// Only print the verdict
        #[arg(short = 'q', long = "quiet")]
        quiet: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand to run; no subcommand means `serve`
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
