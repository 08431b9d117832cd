//! wfp-funding - Funding breakdowns for Water Footprint Platform projects
//!
//! A CLI tool that fetches projects and compensators from the platform's
//! content store, reconciles their funding, and writes chart-ready
//! Markdown or JSON reports.
//!
//! Exit codes:
//!   0 - Success (threshold met, or no --fail-under set)
//!   1 - Runtime error (config, connection, record not found, etc.)
//!   2 - Funding progress below the --fail-under threshold

mod analysis;
mod cli;
mod config;
mod content;
mod models;
mod report;

use analysis::Palette;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat, Target};
use config::{Config, CONFIG_FILE_NAME};
use content::{CompensatorRecord, ContentStoreClient, ContentStoreConfig, ProjectRecord};
use indicatif::{ProgressBar, ProgressStyle};
use models::{CompensatorReport, FundableEntity, ProjectReport, ReportMetadata};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration first so [general] verbose can set the log level
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(config.log_level(args.quiet));

    info!("wfp-funding v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    source.log();

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Report failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .wfp-funding.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the content store URL, chart palette, and page size.");
    Ok(())
}

/// Initialize logging at the given level.
///
/// `RUST_LOG`, when set, takes precedence over --verbose/--quiet and the
/// config file.
fn init_logging(level: tracing::Level) {
    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let result = match EnvFilter::try_from_default_env() {
        Ok(filter) => {
            tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish())
        }
        Err(_) => tracing::subscriber::set_global_default(
            builder.with_max_level(level).finish(),
        ),
    };

    result.expect("Failed to set tracing subscriber");
}

/// Run the report workflow. Returns exit code (0 or 2).
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let palette = config.chart.palette().context("Invalid chart palette")?;
    let target = args
        .target()
        .context("One of --project, --compensator or --input is required")?;

    let (output, progress) = match target {
        Target::Project(document_id) => {
            let client = content_client(&config)?;
            if !args.quiet {
                println!("📥 Fetching project: {}", document_id);
            }

            let pb = spinner("Loading project from content store...", args.quiet);
            let record = client.fetch_project(&document_id).await;
            finish_spinner(pb);

            let record = record?
                .with_context(|| format!("Project not found: {}", document_id))?;
            let project_report = build_project_report(
                &record,
                client.endpoint("/projects"),
                &palette,
                start_time,
            );
            (
                render(&project_report, args.format, report::generate_project_markdown)?,
                project_report.progress.percentage_complete,
            )
        }
        Target::File(path) => {
            if !args.quiet {
                println!("📄 Reading project from: {}", path.display());
            }

            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let record = content::parse_project_document(&json)
                .with_context(|| format!("Failed to parse {}", path.display()))?
                .with_context(|| format!("No project found in {}", path.display()))?;

            let project_report =
                build_project_report(&record, path.display().to_string(), &palette, start_time);
            (
                render(&project_report, args.format, report::generate_project_markdown)?,
                project_report.progress.percentage_complete,
            )
        }
        Target::Compensator(document_id) => {
            let client = content_client(&config)?;
            if !args.quiet {
                println!("📥 Fetching compensator: {}", document_id);
            }

            let pb = spinner("Loading compensator from content store...", args.quiet);
            let fetched = fetch_compensator_with_projects(&client, &document_id).await;
            finish_spinner(pb);

            let (compensator, projects) = fetched?;
            let compensator_report = build_compensator_report(
                &compensator,
                &projects,
                client.endpoint(&format!("/compensators/{}", document_id)),
                args.page,
                config.listing.page_size,
                start_time,
            );
            (
                render(&compensator_report, args.format, report::generate_compensator_markdown)?,
                compensator_report.pledge.actual_pledge_percentage,
            )
        }
    };

    let output_path = Path::new(&config.general.output);
    std::fs::write(output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    if !args.quiet {
        println!("\n📊 Funding progress: {}%", progress);
        println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
        println!("\n✅ Report saved to: {}", output_path.display());
    }

    // Check --fail-under threshold
    if let Some(threshold) = args.fail_under {
        if progress < threshold {
            eprintln!(
                "\n⛔ Funding progress {}% is below {}%. Failing (exit code 2).",
                progress, threshold
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Where the configuration came from, reported once logging is up.
enum ConfigSource {
    File(PathBuf),
    Defaults,
    Fallback(anyhow::Error),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Defaults => debug!("No config file found, using defaults"),
            ConfigSource::Fallback(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
///
/// An explicit --config must load; a broken default file falls back to
/// defaults with a warning.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::File(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::File(PathBuf::from(CONFIG_FILE_NAME)))),
        Ok(None) => Ok((Config::default(), ConfigSource::Defaults)),
        Err(e) => Ok((Config::default(), ConfigSource::Fallback(e))),
    }
}

fn content_client(config: &Config) -> Result<ContentStoreClient> {
    ContentStoreClient::new(ContentStoreConfig::from(&config.content_store))
        .context("Failed to set up content store client")
}

/// Fetch a compensator and the projects its contributions belong to.
async fn fetch_compensator_with_projects(
    client: &ContentStoreClient,
    document_id: &str,
) -> Result<(CompensatorRecord, Vec<ProjectRecord>)> {
    let compensator = client
        .fetch_compensator(document_id)
        .await?
        .with_context(|| format!("Compensator not found: {}", document_id))?;

    let projects = client
        .fetch_projects_for_contributions(&compensator.contribution_ids())
        .await?;
    info!("Compensator funds {} projects", projects.len());

    Ok((compensator, projects))
}

/// Show a spinner while waiting on the content store.
fn spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

fn finish_spinner(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

fn render<T: serde::Serialize>(
    value: &T,
    format: OutputFormat,
    markdown: fn(&T) -> String,
) -> Result<String> {
    match format {
        OutputFormat::Json => report::generate_json_report(value),
        OutputFormat::Markdown => Ok(markdown(value)),
    }
}

fn metadata(source: String, start_time: Instant) -> ReportMetadata {
    ReportMetadata {
        source,
        generated_at: Utc::now(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    }
}

/// Build the funding report for a project record.
fn build_project_report(
    record: &ProjectRecord,
    source: String,
    palette: &Palette,
    start_time: Instant,
) -> ProjectReport {
    let entity = FundableEntity::from(record);
    let slices = analysis::prepare_chart_data(Some(record));

    if slices.is_empty() {
        warn!("Project has no contributions; no chart will be drawn");
    }

    ProjectReport {
        metadata: metadata(source, start_time),
        document_id: record.document_id.clone(),
        title: record.title(),
        country: record.country.as_ref().and_then(|c| c.country_name.clone()),
        basin: record.basin.as_ref().and_then(|b| b.name.clone()),
        budget: entity.total_budget,
        amount_funded: entity.amount_funded,
        total_funded: analysis::total_funded(&slices),
        progress: analysis::funding_progress(&entity),
        slices: palette.assign(&slices),
    }
}

/// Build the pledge report for a compensator and its projects.
fn build_compensator_report(
    compensator: &CompensatorRecord,
    projects: &[ProjectRecord],
    source: String,
    page: usize,
    page_size: usize,
    start_time: Instant,
) -> CompensatorReport {
    let listed = analysis::compensator_projects(compensator, projects);
    let page = analysis::paginate(&listed, page, page_size);

    CompensatorReport {
        metadata: metadata(source, start_time),
        document_id: compensator.document_id.clone(),
        name: compensator.name.clone().unwrap_or_default(),
        pledge: analysis::compensator_pledge(compensator),
        page: page.page,
        total_pages: page.total_pages,
        total_projects: page.total_items,
        projects: page.items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::records::Envelope;
    use clap::Parser;

    const PROJECT_FIXTURE: &str = include_str!("../fixtures/project.json");
    const COMPENSATOR_FIXTURE: &str = include_str!("../fixtures/compensator.json");

    fn fixture_project() -> ProjectRecord {
        content::parse_project_document(PROJECT_FIXTURE)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_build_project_report_from_fixture() {
        let built = build_project_report(
            &fixture_project(),
            "fixtures/project.json".to_string(),
            &Palette::default(),
            Instant::now(),
        );

        assert_eq!(built.title, "Lake Naivasha Wetland Restoration");
        assert_eq!(built.country.as_deref(), Some("Kenya"));
        assert_eq!(built.basin.as_deref(), Some("Rift Valley"));
        assert_eq!(built.total_funded, 1000.0);
        assert_eq!(built.progress.percentage_complete, 50);

        let names: Vec<&str> = built.slices.iter().map(|s| s.slice.name.as_str()).collect();
        assert_eq!(names, vec!["Compensator 1", "Other Sources", "Caps Available"]);
        assert_eq!(built.slices[2].color, "#e5e5e5");

        let markdown = report::generate_project_markdown(&built);
        assert!(markdown.contains("[Compensator 1](/compensators/comp1)"));
    }

    #[test]
    fn test_build_compensator_report_from_fixture() {
        let envelope: Envelope<CompensatorRecord> =
            serde_json::from_str(COMPENSATOR_FIXTURE).unwrap();
        let compensator = envelope.data.unwrap();

        let built = build_compensator_report(
            &compensator,
            &[fixture_project()],
            "fixtures/compensator.json".to_string(),
            1,
            6,
            Instant::now(),
        );

        assert_eq!(built.name, "Compensator 1");
        assert_eq!(built.pledge.actual_caps_funded, 340.0);
        assert_eq!(built.pledge.actual_pledge_percentage, 85);
        assert_eq!(built.total_projects, 1);
        assert_eq!(built.projects[0].caps_funded, 300.0);
        assert_eq!(built.projects[0].contribution_percentage, 75);
    }

    #[test]
    fn test_config_file_verbose_sets_log_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funding.toml");
        std::fs::write(&path, "[general]\nverbose = true\n").unwrap();
        let path = path.to_str().unwrap();

        let args = Args::try_parse_from(["wfp-funding", "-p", "p1", "--config", path]).unwrap();
        let (mut config, source) = load_config(&args).unwrap();
        config.merge_with_args(&args);

        assert!(matches!(source, ConfigSource::File(_)));
        assert_eq!(config.log_level(args.quiet), tracing::Level::DEBUG);

        let args =
            Args::try_parse_from(["wfp-funding", "-p", "p1", "--config", path, "--quiet"]).unwrap();
        let (config, _) = load_config(&args).unwrap();
        assert_eq!(config.log_level(args.quiet), tracing::Level::ERROR);
    }

    #[test]
    fn test_explicit_config_must_load() {
        let args = Args::try_parse_from([
            "wfp-funding",
            "-p",
            "p1",
            "--config",
            "/nonexistent/funding.toml",
        ])
        .unwrap();

        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_render_formats() {
        let built = build_project_report(
            &fixture_project(),
            "fixture".to_string(),
            &Palette::default(),
            Instant::now(),
        );

        let json = render(&built, OutputFormat::Json, report::generate_project_markdown).unwrap();
        assert!(json.trim_start().starts_with('{'));

        let markdown =
            render(&built, OutputFormat::Markdown, report::generate_project_markdown).unwrap();
        assert!(markdown.starts_with("# Funding Report"));
    }
}
