//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.wfp-funding.toml` files.

use crate::analysis::{Palette, PaletteError, BASE_PALETTE, DEFAULT_PAGE_SIZE, UNFUNDED_COLOR};
use crate::content::ContentStoreConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".wfp-funding.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Content store connection settings.
    #[serde(default)]
    pub content_store: ContentStoreSettings,

    /// Chart settings.
    #[serde(default)]
    pub chart: ChartConfig,

    /// Listing settings.
    #[serde(default)]
    pub listing: ListingConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "funding_report.md".to_string()
}

/// Content store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentStoreSettings {
    /// Backend root URL (without `/api`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on transient failure.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// API token, if the content store requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl Default for ContentStoreSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            api_token: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:1337".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> usize {
    2
}

impl From<&ContentStoreSettings> for ContentStoreConfig {
    fn from(settings: &ContentStoreSettings) -> Self {
        ContentStoreConfig {
            base_url: settings.base_url.clone(),
            timeout_seconds: settings.timeout_seconds,
            retries: settings.retries,
            api_token: settings.api_token.clone(),
        }
    }
}

/// Chart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Slice colors, darkest first.
    #[serde(default = "default_palette")]
    pub palette: Vec<String>,

    /// Color of the "Caps Available" slice.
    #[serde(default = "default_unfunded_color")]
    pub unfunded_color: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            palette: default_palette(),
            unfunded_color: default_unfunded_color(),
        }
    }
}

fn default_palette() -> Vec<String> {
    BASE_PALETTE.iter().map(|c| c.to_string()).collect()
}

fn default_unfunded_color() -> String {
    UNFUNDED_COLOR.to_string()
}

impl ChartConfig {
    /// Build the validated palette.
    pub fn palette(&self) -> Result<Palette, PaletteError> {
        Palette::new(&self.palette, &self.unfunded_color)
    }
}

/// Listing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Items per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;

        Ok(config)
    }

    /// Check settings that would otherwise fail later at request time.
    pub fn validate(&self) -> Result<()> {
        self.chart.palette().context("Invalid [chart] palette")?;

        if self.content_store.timeout_seconds == 0 {
            bail!("[content_store] timeout_seconds must be at least 1");
        }
        if self.listing.page_size == 0 {
            bail!("[listing] page_size must be at least 1");
        }

        Ok(())
    }

    /// Log level from the merged settings; `quiet` wins over `verbose`.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.backend_url {
            self.content_store.base_url = url.clone();
        }
        if let Some(ref token) = args.api_token {
            self.content_store.api_token = Some(token.clone());
        }
        if let Some(timeout) = args.timeout {
            self.content_store.timeout_seconds = timeout;
        }
        if let Some(page_size) = args.page_size {
            self.listing.page_size = page_size;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
