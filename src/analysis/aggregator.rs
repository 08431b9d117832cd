//! Funding aggregation and progress statistics.
//!
//! This module reconciles a project's top-level funding totals against its
//! itemized contributions and derives the figures shown in progress bars
//! and the funding chart.

use crate::content::records::{parse_decimal, CompensatorRecord, ProjectRecord};
use crate::models::{
    ChartSlice, CompensatorPledge, CompensatorProject, FundableEntity, FundingProgress,
    CAPS_AVAILABLE, OTHER_SOURCES, SYNTHETIC_SLICE_ID,
};
use tracing::debug;

/// Build chart data straight from a content-store record.
///
/// A missing record, or one without contributions, yields no slices.
pub fn prepare_chart_data(record: Option<&ProjectRecord>) -> Vec<ChartSlice> {
    match record {
        Some(record) => compute_chart_slices(&FundableEntity::from(record)),
        None => Vec::new(),
    }
}

/// Compute the ordered chart slices for a project.
///
/// One slice per contribution in input order, then "Other Sources" when the
/// project records more funding than its contributions account for, then
/// "Caps Available" for the unfunded remainder.
pub fn compute_chart_slices(entity: &FundableEntity) -> Vec<ChartSlice> {
    if entity.contributions.is_empty() {
        return Vec::new();
    }

    let mut slices: Vec<ChartSlice> = entity
        .contributions
        .iter()
        .map(|c| ChartSlice {
            name: c.contributor_name.clone(),
            amount: c.amount_funded,
            capacity_units: c.capacity_units_funded,
            contributor_id: c.contributor_id.clone(),
            id: c.entry_id.clone(),
            is_unattributed_remainder: false,
        })
        .collect();

    let (sum_amount, sum_caps) = entity
        .contributions
        .iter()
        .fold((0.0, 0.0), |(amount, caps), c| {
            (amount + c.amount_funded, caps + c.capacity_units_funded)
        });

    if sum_amount < entity.amount_funded {
        // Caps delta is left unclamped; inconsistent upstream data shows up
        // as a negative value here rather than being hidden.
        slices.push(ChartSlice {
            name: OTHER_SOURCES.to_string(),
            amount: entity.amount_funded - sum_amount,
            capacity_units: entity.actual_capacity_units - sum_caps,
            contributor_id: None,
            id: Some(SYNTHETIC_SLICE_ID.to_string()),
            is_unattributed_remainder: false,
        });
    }

    let remaining_caps = (entity.target_capacity_units - entity.actual_capacity_units).max(0.0);
    let remaining_funding = (entity.total_budget - entity.amount_funded).max(0.0);

    if sum_amount < entity.total_budget && remaining_caps > 0.0 && remaining_funding > 0.0 {
        slices.push(ChartSlice {
            name: CAPS_AVAILABLE.to_string(),
            amount: remaining_funding,
            capacity_units: remaining_caps,
            contributor_id: None,
            id: Some(SYNTHETIC_SLICE_ID.to_string()),
            is_unattributed_remainder: true,
        });
    }

    debug!(
        "Computed {} chart slices from {} contributions",
        slices.len(),
        entity.contributions.len()
    );

    slices
}

/// Percentage of `actual` against `target`, rounded and clamped to 0..=100.
///
/// A non-positive target yields 0.
pub fn compute_percentage(actual: f64, target: f64) -> u8 {
    if !(target > 0.0) {
        return 0;
    }

    let percentage = (actual / target * 100.0).round();
    if percentage.is_nan() {
        return 0;
    }

    percentage.clamp(0.0, 100.0) as u8
}

/// Progress-bar figures for a project.
pub fn funding_progress(entity: &FundableEntity) -> FundingProgress {
    FundingProgress {
        caps_funded: entity.actual_capacity_units,
        target_caps: entity.target_capacity_units,
        percentage_complete: compute_percentage(entity.amount_funded, entity.total_budget),
        percentage_compensated: compute_percentage(
            entity.actual_capacity_units,
            entity.target_capacity_units,
        ),
    }
}

/// Total funded across slices, excluding the unfunded remainder.
pub fn total_funded(slices: &[ChartSlice]) -> f64 {
    slices
        .iter()
        .filter(|s| !s.is_unattributed_remainder)
        .map(|s| s.amount)
        .sum()
}

/// Pledge progress for a compensator across all its contributions.
pub fn compensator_pledge(compensator: &CompensatorRecord) -> CompensatorPledge {
    let actual_caps_funded: f64 = compensator
        .project_compensations
        .iter()
        .flatten()
        .flatten()
        .map(|c| parse_decimal(c.caps_funded.as_ref()))
        .sum();
    let target_pledge_caps = compensator.target_pledge_caps();

    CompensatorPledge {
        actual_caps_funded,
        target_pledge_caps,
        actual_pledge_percentage: compute_percentage(actual_caps_funded, target_pledge_caps),
    }
}

/// Share of a compensator's pledge that one contribution represents.
pub fn contribution_percentage(caps_funded: f64, target_pledge_caps: f64) -> u8 {
    compute_percentage(caps_funded, target_pledge_caps)
}

/// List the projects a compensator funds, with its contribution to each.
///
/// Each project is matched to the compensator through the first of its
/// contribution entries whose document id belongs to the compensator.
pub fn compensator_projects(
    compensator: &CompensatorRecord,
    projects: &[ProjectRecord],
) -> Vec<CompensatorProject> {
    let contribution_ids = compensator.contribution_ids();
    let target = compensator.target_pledge_caps();

    projects
        .iter()
        .map(|project| {
            let caps_funded = project
                .compensators()
                .find(|entry| {
                    entry
                        .document_id
                        .as_ref()
                        .is_some_and(|id| contribution_ids.contains(id))
                })
                .map(|entry| parse_decimal(entry.caps_funded.as_ref()));

            CompensatorProject {
                document_id: project.document_id.clone(),
                title: project.title(),
                location: project.location.clone(),
                caps_funded: caps_funded.unwrap_or(0.0),
                contribution_percentage: caps_funded
                    .map(|caps| contribution_percentage(caps, target))
                    .unwrap_or(0),
            }
        })
        .collect()
}
