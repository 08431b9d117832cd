//! Data models for funding breakdowns.
//!
//! This module contains the validated domain types the aggregator works on
//! and the report structures produced from them.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Name of the synthetic slice for funding not traced to any contributor.
pub const OTHER_SOURCES: &str = "Other Sources";

/// Name of the terminal slice for the unfunded remainder.
pub const CAPS_AVAILABLE: &str = "Caps Available";

/// Fallback name when a contribution has no contributor record.
pub const UNKNOWN_CONTRIBUTOR: &str = "Unknown";

/// `id` carried by both synthetic slices.
pub const SYNTHETIC_SLICE_ID: &str = "unfunded";

/// A project with a funding goal and its itemized contributions.
///
/// Monetary values are in EUR. Capacity units are "caps" (1 cap = 1000 m³).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundableEntity {
    /// Target monetary funding goal.
    pub total_budget: f64,
    /// Amount funded so far, attributed or not.
    pub amount_funded: f64,
    /// Target number of caps.
    pub target_capacity_units: f64,
    /// Caps funded so far.
    pub actual_capacity_units: f64,
    /// Itemized contributions, in content-store order.
    pub contributions: Vec<Contribution>,
}

/// One funder's recorded contribution to a project.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub contributor_name: String,
    /// Document id of the compensator, if the entry is linked to one.
    pub contributor_id: Option<String>,
    /// Id of the contribution entry itself.
    pub entry_id: Option<String>,
    pub amount_funded: f64,
    pub capacity_units_funded: f64,
}

/// One slice of the funding donut chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSlice {
    pub name: String,
    /// Monetary value; also the pie "value".
    pub amount: f64,
    pub capacity_units: f64,
    /// Compensator document id; `None` means the slice is not linkable.
    pub contributor_id: Option<String>,
    pub id: Option<String>,
    /// True only for the trailing "Caps Available" slice.
    pub is_unattributed_remainder: bool,
}

impl ChartSlice {
    /// Link path to the contributor's profile page, if any.
    pub fn profile_path(&self) -> Option<String> {
        self.contributor_id
            .as_deref()
            .map(|id| format!("/compensators/{}", id))
    }
}

/// Wire shape consumed by chart and funder-list renderers.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChartSliceRecord<'a> {
    name: &'a str,
    amount: f64,
    caps: f64,
    document_id: Option<&'a str>,
    id: Option<&'a str>,
    value: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    is_unfunded: bool,
}

impl Serialize for ChartSlice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ChartSliceRecord {
            name: &self.name,
            amount: self.amount,
            caps: self.capacity_units,
            document_id: self.contributor_id.as_deref(),
            id: self.id.as_deref(),
            value: self.amount,
            is_unfunded: self.is_unattributed_remainder,
        }
        .serialize(serializer)
    }
}

/// A chart slice with its assigned color.
#[derive(Debug, Clone, Serialize)]
pub struct ColoredSlice {
    #[serde(flatten)]
    pub slice: ChartSlice,
    /// Hex color, `#rrggbb`.
    pub color: String,
}

/// Progress-bar percentages for a project.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingProgress {
    pub caps_funded: f64,
    pub target_caps: f64,
    /// Funding against budget, 0..=100.
    pub percentage_complete: u8,
    /// Caps against target caps, 0..=100.
    pub percentage_compensated: u8,
}

/// A compensator's pledge progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensatorPledge {
    pub actual_caps_funded: f64,
    pub target_pledge_caps: f64,
    pub actual_pledge_percentage: u8,
}

/// A project funded by a compensator, as listed on its profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensatorProject {
    pub document_id: Option<String>,
    pub title: String,
    pub location: Option<String>,
    pub caps_funded: f64,
    /// Share of the compensator's pledge that went to this project.
    pub contribution_percentage: u8,
}

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Where the data came from (content-store URL or local file).
    pub source: String,
    pub generated_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

/// Funding report for a single project.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub metadata: ReportMetadata,
    pub document_id: Option<String>,
    pub title: String,
    pub country: Option<String>,
    pub basin: Option<String>,
    pub budget: f64,
    pub amount_funded: f64,
    pub total_funded: f64,
    pub progress: FundingProgress,
    pub slices: Vec<ColoredSlice>,
}

/// Pledge report for a single compensator.
#[derive(Debug, Clone, Serialize)]
pub struct CompensatorReport {
    pub metadata: ReportMetadata,
    pub document_id: Option<String>,
    pub name: String,
    pub pledge: CompensatorPledge,
    pub page: usize,
    pub total_pages: usize,
    pub total_projects: usize,
    pub projects: Vec<CompensatorProject>,
}
