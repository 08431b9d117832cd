//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// wfp-funding - funding breakdowns for Water Footprint Platform projects
///
/// Reconciles a project's funding against its compensators and produces
/// chart data, progress figures, and Markdown/JSON reports.
///
/// Examples:
///   wfp-funding --project k3x9abc
///   wfp-funding --compensator q8m2xyz --page 2
///   wfp-funding --input project.json --format json
///   wfp-funding --project k3x9abc --fail-under 50
///   wfp-funding --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Document id of the project to report on
    #[arg(
        short,
        long,
        value_name = "DOCUMENT_ID",
        required_unless_present_any = ["compensator", "input", "init_config"],
        conflicts_with_all = ["compensator", "input"]
    )]
    pub project: Option<String>,

    /// Document id of the compensator to report on
    #[arg(short = 'C', long, value_name = "DOCUMENT_ID", conflicts_with = "input")]
    pub compensator: Option<String>,

    /// Read a project from a local JSON file instead of the content store
    ///
    /// Accepts a bare project, a `{ "data": ... }` response, or a list.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to the config file setting, or funding_report.md
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Content store root URL (without /api)
    #[arg(long, value_name = "URL", env = "WFP_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Content store API token
    #[arg(long, value_name = "TOKEN", env = "WFP_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .wfp-funding.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Page of the compensator's project list to show (1-based)
    #[arg(long, default_value = "1", value_name = "PAGE")]
    pub page: usize,

    /// Projects per page in listings
    #[arg(long, value_name = "COUNT")]
    pub page_size: Option<usize>,

    /// Fail if funding progress is below this percentage
    ///
    /// Uses the budget percentage for projects and the pledge percentage
    /// for compensators. Exit code 2 when below the threshold.
    #[arg(long, value_name = "PCT")]
    pub fail_under: Option<u8>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .wfp-funding.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// What the report is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Project(String),
    Compensator(String),
    File(PathBuf),
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The selected report target, if any.
    pub fn target(&self) -> Option<Target> {
        if let Some(ref id) = self.project {
            Some(Target::Project(id.clone()))
        } else if let Some(ref id) = self.compensator {
            Some(Target::Compensator(id.clone()))
        } else {
            self.input.clone().map(Target::File)
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.target().is_none() {
            return Err("One of --project, --compensator or --input is required".to_string());
        }

        for (flag, id) in [("--project", &self.project), ("--compensator", &self.compensator)] {
            if let Some(id) = id {
                if id.trim().is_empty() || id.contains('/') {
                    return Err(format!("{} must be a plain document id", flag));
                }
            }
        }

        // Validate backend URL format (not needed for local input)
        if self.input.is_none() {
            if let Some(ref url) = self.backend_url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err("Backend URL must start with 'http://' or 'https://'".to_string());
                }
            }
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        if self.page == 0 {
            return Err("Page must be at least 1".to_string());
        }

        if self.page_size == Some(0) {
            return Err("Page size must be at least 1".to_string());
        }

        if let Some(threshold) = self.fail_under {
            if threshold > 100 {
                return Err("--fail-under must be between 0 and 100".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }
}
