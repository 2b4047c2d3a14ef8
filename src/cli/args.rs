//! Command line argument parsing for the Quarry CLI using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Quarry - an in-memory document search engine
#[derive(Parser, Debug, Clone)]
#[command(name = "quarry")]
#[command(about = "Load documents into an in-memory index and search them")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct QuarryArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "json")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, env = "QUARRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl QuarryArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }

    /// The default log filter for the verbosity level.
    pub fn log_level(&self) -> &'static str {
        match self.verbosity() {
            0 => "error",
            1 => "warn",
            2 => "info",
            _ => "debug",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load documents and search them
    Search(SearchArgs),

    /// Load documents and count the matches of a query
    Count(SearchArgs),

    /// Load documents and print index statistics
    Stats(LoadArgs),

    /// Show the terms an analyzer produces for some text
    Analyze(AnalyzeArgs),
}

/// How documents are loaded into a fresh engine before a command runs.
#[derive(Parser, Debug, Clone)]
pub struct LoadArgs {
    /// Name of the index to create
    #[arg(value_name = "INDEX")]
    pub index: String,

    /// Newline-delimited bulk files to load (may be repeated)
    #[arg(short, long = "bulk", value_name = "FILE")]
    pub bulk_files: Vec<PathBuf>,

    /// Create-index body with settings and mappings (JSON)
    #[arg(long = "create", value_name = "FILE")]
    pub create_file: Option<PathBuf>,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub load: LoadArgs,

    /// Search request body (JSON)
    #[arg(long = "body", value_name = "FILE", conflicts_with = "q")]
    pub body_file: Option<PathBuf>,

    /// Query-string query
    #[arg(short = 'Q', long)]
    pub q: Option<String>,

    /// Sort, as `field:asc,other:desc`
    #[arg(short, long)]
    pub sort: Option<String>,

    /// Number of hits to return
    #[arg(long)]
    pub size: Option<usize>,

    /// Offset of the first hit
    #[arg(long)]
    pub from: Option<usize>,
}

/// Arguments for analyzing text
#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Text to analyze
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Analyzer to use
    #[arg(short, long, default_value = "standard")]
    pub analyzer: AnalyzerKind,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerKind {
    /// Lowercased word tokens
    Standard,
    /// The whole input as one token
    Keyword,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_command() {
        let args = QuarryArgs::try_parse_from([
            "quarry",
            "search",
            "bank",
            "--bulk",
            "accounts.json",
            "-Q",
            "*",
            "--sort",
            "account_number:asc",
            "--size",
            "5",
        ])
        .unwrap();

        if let Command::Search(search) = args.command {
            assert_eq!(search.load.index, "bank");
            assert_eq!(search.load.bulk_files, vec![PathBuf::from("accounts.json")]);
            assert_eq!(search.q.as_deref(), Some("*"));
            assert_eq!(search.sort.as_deref(), Some("account_number:asc"));
            assert_eq!(search.size, Some(5));
        } else {
            panic!("Expected Search command");
        }
    }

    #[test]
    fn test_body_conflicts_with_q() {
        let result = QuarryArgs::try_parse_from([
            "quarry", "search", "bank", "--body", "query.json", "-Q", "*",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_analyze_command() {
        let args =
            QuarryArgs::try_parse_from(["quarry", "analyze", "Hello World", "-a", "keyword"]).unwrap();
        if let Command::Analyze(analyze) = args.command {
            assert_eq!(analyze.text, "Hello World");
            assert_eq!(analyze.analyzer, AnalyzerKind::Keyword);
        } else {
            panic!("Expected Analyze command");
        }
    }

    #[test]
    fn test_verbosity_levels() {
        let args = QuarryArgs::try_parse_from(["quarry", "analyze", "x"]).unwrap();
        assert_eq!(args.verbosity(), 1);
        assert_eq!(args.log_level(), "warn");

        let args = QuarryArgs::try_parse_from(["quarry", "-vv", "analyze", "x"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = QuarryArgs::try_parse_from(["quarry", "-vvv", "analyze", "x"]).unwrap();
        assert_eq!(args.log_level(), "debug");

        let args = QuarryArgs::try_parse_from(["quarry", "--quiet", "analyze", "x"]).unwrap();
        assert_eq!(args.verbosity(), 0);
        assert_eq!(args.log_level(), "error");
    }

    #[test]
    fn test_output_format() {
        let args = QuarryArgs::try_parse_from(["quarry", "--format", "human", "analyze", "x"]).unwrap();
        assert_eq!(args.output_format, OutputFormat::Human);
    }
}
