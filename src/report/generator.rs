//! Markdown and JSON report generation.
//!
//! This module renders funding reports for projects and compensators from
//! the analysis results.

use crate::models::{
    ColoredSlice, CompensatorPledge, CompensatorReport, FundingProgress, ProjectReport,
    ReportMetadata,
};
use anyhow::Result;
use serde::Serialize;

/// Width of text progress bars, in characters.
const BAR_WIDTH: usize = 20;

/// Generate a complete Markdown report for a project.
pub fn generate_project_markdown(report: &ProjectReport) -> String {
    let mut output = String::new();

    // Title
    output.push_str(&format!("# Funding Report: {}\n\n", display_title(&report.title)));

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_project_details(report));
    output.push_str(&generate_progress_section(&report.progress));
    output.push_str(&generate_funding_section(report));
    output.push_str(&generate_funders_section(&report.slices));
    output.push_str(&generate_chart_section(&report.slices));

    output.push_str(&generate_footer());

    output
}

/// Generate a complete Markdown report for a compensator.
pub fn generate_compensator_markdown(report: &CompensatorReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Compensator Report: {}\n\n", display_title(&report.name)));

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_pledge_section(&report.pledge));
    output.push_str(&generate_projects_section(report));

    output.push_str(&generate_footer());

    output
}

/// Generate a JSON report.
pub fn generate_json_report<T: Serialize>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

fn display_title(title: &str) -> &str {
    if title.is_empty() {
        "Untitled"
    } else {
        title
    }
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Duration:** {:.1}s\n", metadata.duration_seconds));
    section.push('\n');

    section
}

fn generate_project_details(report: &ProjectReport) -> String {
    let mut details = Vec::new();

    if let Some(ref country) = report.country {
        details.push(format!("- **Country:** {}", country));
    }
    if let Some(ref basin) = report.basin {
        details.push(format!("- **Basin:** {}", basin));
    }

    if details.is_empty() {
        return String::new();
    }

    format!("## Project\n\n{}\n\n", details.join("\n"))
}

/// Generate the progress bars section.
fn generate_progress_section(progress: &FundingProgress) -> String {
    let mut section = String::new();

    section.push_str("## Progress\n\n");
    section.push_str("| | Actual | Target | |\n");
    section.push_str("|:---|:---:|:---:|:---|\n");
    section.push_str(&format!(
        "| Funded | {}% | 100% | `{}` |\n",
        progress.percentage_complete,
        progress_bar(progress.percentage_complete)
    ));
    section.push_str(&format!(
        "| Water compensated | {}% | 100% | `{}` |\n\n",
        progress.percentage_compensated,
        progress_bar(progress.percentage_compensated)
    ));
    section.push_str(&format!(
        "*{} of {} caps funded (1 cap = 1000 m³)*\n\n",
        format_amount(progress.caps_funded),
        format_amount(progress.target_caps)
    ));

    section
}

fn generate_funding_section(report: &ProjectReport) -> String {
    let mut section = String::new();

    section.push_str("## Funding\n\n");
    section.push_str(&format!(
        "- **Project Budget:** {} EUR\n",
        format_amount(report.budget)
    ));
    section.push_str(&format!(
        "- **Total Funded:** {} EUR\n",
        format_amount(report.total_funded)
    ));
    section.push('\n');

    section
}

/// Generate the funders list.
fn generate_funders_section(slices: &[ColoredSlice]) -> String {
    let mut section = String::new();

    section.push_str("## Funders\n\n");

    if slices.is_empty() {
        section.push_str("No funding has been recorded for this project yet.\n\n");
        return section;
    }

    for colored in slices {
        let slice = &colored.slice;
        match slice.profile_path() {
            Some(path) => section.push_str(&format!(
                "- `{}` [{}]({})\n",
                colored.color,
                escape_markdown(&slice.name),
                path
            )),
            None => section.push_str(&format!(
                "- `{}` {}\n",
                colored.color,
                escape_markdown(&slice.name)
            )),
        }
    }
    section.push('\n');

    section
}

/// Generate the chart data table.
fn generate_chart_section(slices: &[ColoredSlice]) -> String {
    if slices.is_empty() {
        return String::new();
    }

    let total: f64 = slices.iter().map(|s| s.slice.amount).sum();
    let mut section = String::new();

    section.push_str("## Funding Breakdown\n\n");
    section.push_str("| Funder | Amount (EUR) | Caps | Share | Color |\n");
    section.push_str("|:---|---:|---:|---:|:---:|\n");

    for colored in slices {
        let slice = &colored.slice;
        let share = crate::analysis::compute_percentage(slice.amount, total);
        section.push_str(&format!(
            "| {} | {} | {} | {}% | `{}` |\n",
            escape_markdown(&slice.name),
            format_amount(slice.amount),
            format_amount(slice.capacity_units),
            share,
            colored.color
        ));
    }
    section.push('\n');

    section
}

fn generate_pledge_section(pledge: &CompensatorPledge) -> String {
    let mut section = String::new();

    section.push_str("## Pledge\n\n");
    section.push_str(&format!(
        "- **Caps Funded:** {} of {}\n",
        format_amount(pledge.actual_caps_funded),
        format_amount(pledge.target_pledge_caps)
    ));
    section.push_str(&format!(
        "- **Progress:** `{}` {}%\n\n",
        progress_bar(pledge.actual_pledge_percentage),
        pledge.actual_pledge_percentage
    ));

    section
}

fn generate_projects_section(report: &CompensatorReport) -> String {
    let mut section = String::new();

    section.push_str("## Projects\n\n");

    if report.projects.is_empty() {
        section.push_str("This compensator has not funded any projects yet.\n\n");
        return section;
    }

    section.push_str("| Project | Location | Caps Funded | Share of Pledge |\n");
    section.push_str("|:---|:---|---:|---:|\n");

    for project in &report.projects {
        let title = escape_markdown(display_title(&project.title));
        let title = match project.document_id {
            Some(ref id) => format!("[{}](/projects/{})", title, id),
            None => title,
        };
        section.push_str(&format!(
            "| {} | {} | {} | {}% |\n",
            title,
            escape_markdown(project.location.as_deref().unwrap_or("-")),
            format_amount(project.caps_funded),
            project.contribution_percentage
        ));
    }
    section.push('\n');

    if report.total_pages > 1 {
        section.push_str(&format!(
            "*Page {} of {} ({} projects)*\n\n",
            report.page, report.total_pages, report.total_projects
        ));
    }

    section
}

/// Escape text for use inside Markdown links and table cells.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' | '|' | '[' | ']' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '\n' | '\r' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by wfp-funding*\n".to_string()
}

/// Render a percentage as a fixed-width text bar.
pub fn progress_bar(percentage: u8) -> String {
    let filled = (percentage.min(100) as usize * BAR_WIDTH + 50) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// Format a number with thousands separators and at most two decimals.
pub fn format_amount(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), ""));

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let frac = frac_part.trim_end_matches('0');
    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };

    if frac.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartSlice, CompensatorProject};
    use chrono::Utc;

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            source: "http://localhost:1337/api/projects".to_string(),
            generated_at: Utc::now(),
            duration_seconds: 0.4,
        }
    }

    fn colored(name: &str, amount: f64, id: Option<&str>, remainder: bool, color: &str) -> ColoredSlice {
        ColoredSlice {
            slice: ChartSlice {
                name: name.to_string(),
                amount,
                capacity_units: amount / 2.0,
                contributor_id: id.map(String::from),
                id: None,
                is_unattributed_remainder: remainder,
            },
            color: color.to_string(),
        }
    }

    fn project_report() -> ProjectReport {
        ProjectReport {
            metadata: metadata(),
            document_id: Some("p1".to_string()),
            title: "Wetland Restoration".to_string(),
            country: Some("Kenya".to_string()),
            basin: None,
            budget: 2000.0,
            amount_funded: 1000.0,
            total_funded: 1000.0,
            progress: FundingProgress {
                caps_funded: 500.0,
                target_caps: 1000.0,
                percentage_complete: 50,
                percentage_compensated: 50,
            },
            slices: vec![
                colored("Compensator 1", 600.0, Some("comp1"), false, "#2a1e5c"),
                colored("Other Sources", 400.0, None, false, "#433770"),
                colored("Caps Available", 1000.0, None, true, "#e5e5e5"),
            ],
        }
    }

    #[test]
    fn test_generate_project_markdown() {
        let markdown = generate_project_markdown(&project_report());

        assert!(markdown.contains("# Funding Report: Wetland Restoration"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("- **Country:** Kenya"));
        assert!(markdown.contains("- **Project Budget:** 2,000 EUR"));
        assert!(markdown.contains("- **Total Funded:** 1,000 EUR"));
        assert!(markdown.contains("[Compensator 1](/compensators/comp1)"));
        assert!(markdown.contains("- `#433770` Other Sources\n"));
        assert!(markdown.contains("| Caps Available | 1,000 | 500 | 50% | `#e5e5e5` |"));
        assert!(markdown.contains("| Compensator 1 | 600 | 300 | 30% | `#2a1e5c` |"));
    }

    #[test]
    fn test_project_markdown_without_funders() {
        let mut report = project_report();
        report.slices.clear();
        report.country = None;

        let markdown = generate_project_markdown(&report);

        assert!(markdown.contains("No funding has been recorded"));
        assert!(!markdown.contains("## Funding Breakdown"));
        assert!(!markdown.contains("## Project\n"));
    }

    #[test]
    fn test_generate_compensator_markdown() {
        let report = CompensatorReport {
            metadata: metadata(),
            document_id: Some("comp1".to_string()),
            name: "Acme Beverages".to_string(),
            pledge: CompensatorPledge {
                actual_caps_funded: 80.0,
                target_pledge_caps: 200.0,
                actual_pledge_percentage: 40,
            },
            page: 1,
            total_pages: 2,
            total_projects: 7,
            projects: vec![CompensatorProject {
                document_id: Some("p1".to_string()),
                title: "Wetland Restoration".to_string(),
                location: Some("Kenya".to_string()),
                caps_funded: 20.0,
                contribution_percentage: 10,
            }],
        };

        let markdown = generate_compensator_markdown(&report);

        assert!(markdown.contains("# Compensator Report: Acme Beverages"));
        assert!(markdown.contains("- **Caps Funded:** 80 of 200"));
        assert!(markdown.contains("`[########------------]` 40%"));
        assert!(markdown.contains("| [Wetland Restoration](/projects/p1) | Kenya | 20 | 10% |"));
        assert!(markdown.contains("*Page 1 of 2 (7 projects)*"));
    }

    #[test]
    fn test_names_are_escaped() {
        let mut report = project_report();
        report.slices[0].slice.name = "Acme | Sons [EU]".to_string();

        let markdown = generate_project_markdown(&report);

        assert!(markdown.contains("[Acme \\| Sons \\[EU\\]](/compensators/comp1)"));
        assert!(markdown.contains("| Acme \\| Sons \\[EU\\] | 600 | 300 | 30% | `#2a1e5c` |"));
        assert_eq!(escape_markdown("line\nbreak"), "line break");
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&project_report()).unwrap();

        assert!(json.contains("\"total_funded\""));
        assert!(json.contains("\"isUnfunded\": true"));
        assert!(json.contains("\"documentId\": \"comp1\""));
        assert!(json.contains("\"color\": \"#e5e5e5\""));
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0), "[--------------------]");
        assert_eq!(progress_bar(50), "[##########----------]");
        assert_eq!(progress_bar(100), "[####################]");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(1000.0), "1,000");
        assert_eq!(format_amount(1234567.5), "1,234,567.5");
        assert_eq!(format_amount(12.346), "12.35");
        assert_eq!(format_amount(-150.0), "-150");
    }
}
