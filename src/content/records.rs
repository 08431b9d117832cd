//! Content-store record shapes.
//!
//! Responses from the content store are loosely typed: numeric fields arrive
//! as strings or numbers, relations may be missing or null. These records
//! decode that shape once, and the conversions at the bottom turn them into
//! validated domain types with the defaulting rules applied.

use crate::models::{Contribution, FundableEntity, UNKNOWN_CONTRIBUTOR};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Target pledge used when a compensator has none recorded.
pub const DEFAULT_TARGET_PLEDGE_CAPS: f64 = 100.0;

/// Standard `{ "data": ... }` response envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
}

/// A project as returned by the content store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectRecord {
    #[serde(deserialize_with = "lenient")]
    pub document_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub location: Option<String>,
    pub amount_funded: Option<Value>,
    pub budget: Option<Value>,
    pub actual_compensation: Option<Value>,
    pub target_compensation: Option<Value>,
    #[serde(deserialize_with = "lenient_list")]
    pub project_compensators: Option<Vec<Option<ProjectCompensatorRecord>>>,
    #[serde(deserialize_with = "lenient")]
    pub country: Option<CountryRecord>,
    #[serde(deserialize_with = "lenient")]
    pub basin: Option<BasinRecord>,
}

/// A contribution entry linking a compensator to a project.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectCompensatorRecord {
    pub id: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    pub document_id: Option<String>,
    pub amount_funded: Option<Value>,
    pub caps_funded: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    pub compensator: Option<CompensatorRef>,
}

/// Populated compensator relation on a contribution entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompensatorRef {
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CountryRecord {
    #[serde(deserialize_with = "lenient")]
    pub country_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BasinRecord {
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
}

/// A compensator (funder) as returned by the content store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompensatorRecord {
    #[serde(deserialize_with = "lenient")]
    pub document_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    pub target_pledge_caps: Option<Value>,
    #[serde(deserialize_with = "lenient_list")]
    pub project_compensations: Option<Vec<Option<ProjectCompensationRecord>>>,
}

/// A compensator's side of a contribution entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectCompensationRecord {
    #[serde(deserialize_with = "lenient")]
    pub document_id: Option<String>,
    pub caps_funded: Option<Value>,
}

impl ProjectRecord {
    /// Contribution entries with null items replaced by empty ones.
    pub fn compensators(&self) -> impl Iterator<Item = ProjectCompensatorRecord> + '_ {
        self.project_compensators
            .iter()
            .flatten()
            .map(|entry| entry.clone().unwrap_or_default())
    }

    pub fn title(&self) -> String {
        self.name.clone().unwrap_or_default()
    }
}

impl CompensatorRecord {
    /// Target pledge in caps; missing, empty, or zero means the default.
    pub fn target_pledge_caps(&self) -> f64 {
        match &self.target_pledge_caps {
            None | Some(Value::Null) | Some(Value::Bool(false)) => DEFAULT_TARGET_PLEDGE_CAPS,
            Some(Value::String(s)) if s.is_empty() => DEFAULT_TARGET_PLEDGE_CAPS,
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => DEFAULT_TARGET_PLEDGE_CAPS,
            Some(value) => parse_decimal(Some(value)),
        }
    }

    /// Document ids of this compensator's contribution entries.
    pub fn contribution_ids(&self) -> Vec<String> {
        self.project_compensations
            .iter()
            .flatten()
            .flatten()
            .filter_map(|c| c.document_id.clone())
            .collect()
    }
}

impl From<&ProjectCompensatorRecord> for Contribution {
    fn from(record: &ProjectCompensatorRecord) -> Self {
        let compensator = record.compensator.as_ref();
        Contribution {
            contributor_name: compensator
                .and_then(|c| c.name.clone())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| UNKNOWN_CONTRIBUTOR.to_string()),
            contributor_id: compensator.and_then(|c| c.document_id.clone()),
            entry_id: id_to_string(record.id.as_ref()),
            amount_funded: parse_decimal(record.amount_funded.as_ref()),
            capacity_units_funded: parse_decimal(record.caps_funded.as_ref()),
        }
    }
}

impl From<&ProjectRecord> for FundableEntity {
    fn from(record: &ProjectRecord) -> Self {
        FundableEntity {
            total_budget: parse_decimal(record.budget.as_ref()),
            amount_funded: parse_decimal(record.amount_funded.as_ref()),
            target_capacity_units: parse_decimal(record.target_compensation.as_ref()),
            actual_capacity_units: parse_decimal(record.actual_compensation.as_ref()),
            contributions: record.compensators().map(|c| Contribution::from(&c)).collect(),
        }
    }
}

/// Parse a numeric field the way the content store's consumers do.
///
/// Numbers pass through, strings are read up to the longest numeric prefix
/// (`"12.5 caps"` is `12.5`), anything else is `0`. Non-finite results are
/// `0` as well.
pub fn parse_decimal(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => parse_numeric_prefix(s).unwrap_or(0.0),
        _ => 0.0,
    };

    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

fn parse_numeric_prefix(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    // Exponent only counts when digits follow it.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

/// Decode a field, treating a value of the wrong shape as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Decode a list field item by item; malformed items become `None`.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<Option<T>>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items.into_iter().map(|item| T::deserialize(item).ok()).collect(),
        )),
        _ => Ok(None),
    }
}

/// Entry ids arrive as numbers or strings.
fn id_to_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode a project from a JSON document.
///
/// Accepts a bare project, a `{ "data": ... }` envelope, or a list (the
/// first project is used). Returns `None` for `null` or an empty list.
pub fn parse_project_document(json: &str) -> Result<Option<ProjectRecord>> {
    let value: Value = serde_json::from_str(json).context("Input is not valid JSON")?;
    project_from_value(value)
}

fn project_from_value(value: Value) -> Result<Option<ProjectRecord>> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => match items.into_iter().next() {
            Some(first) => project_from_value(first),
            None => Ok(None),
        },
        Value::Object(mut map) if map.contains_key("data") => {
            project_from_value(map.remove("data").unwrap_or(Value::Null))
        }
        other => {
            let record = serde_json::from_value(other).context("Malformed project record")?;
            Ok(Some(record))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_decimal_strings_and_numbers() {
        assert_eq!(parse_decimal(Some(&json!("1000"))), 1000.0);
        assert_eq!(parse_decimal(Some(&json!(" 12.5 caps"))), 12.5);
        assert_eq!(parse_decimal(Some(&json!("-3e2"))), -300.0);
        assert_eq!(parse_decimal(Some(&json!("4e"))), 4.0);
        assert_eq!(parse_decimal(Some(&json!(".5"))), 0.5);
        assert_eq!(parse_decimal(Some(&json!(42))), 42.0);
    }

    #[test]
    fn test_parse_decimal_malformed_is_zero() {
        assert_eq!(parse_decimal(None), 0.0);
        assert_eq!(parse_decimal(Some(&Value::Null)), 0.0);
        assert_eq!(parse_decimal(Some(&json!("abc"))), 0.0);
        assert_eq!(parse_decimal(Some(&json!(""))), 0.0);
        assert_eq!(parse_decimal(Some(&json!("."))), 0.0);
        assert_eq!(parse_decimal(Some(&json!(true))), 0.0);
        assert_eq!(parse_decimal(Some(&json!({"amount": 5}))), 0.0);
        assert_eq!(parse_decimal(Some(&json!("1e400"))), 0.0);
    }

    #[test]
    fn test_project_to_entity() {
        let record: ProjectRecord = serde_json::from_value(json!({
            "amountFunded": "1000",
            "budget": 2000,
            "actualCompensation": "500",
            "targetCompensation": "1000",
            "projectCompensators": [
                {
                    "id": 3,
                    "amountFunded": "600",
                    "capsFunded": "300",
                    "compensator": { "name": "Compensator 1", "documentId": "comp1" }
                },
                null,
                { "amountFunded": "n/a" },
                { "amountFunded": "50", "compensator": { "name": "", "documentId": "comp2" } }
            ]
        }))
        .unwrap();

        let entity = FundableEntity::from(&record);

        assert_eq!(entity.amount_funded, 1000.0);
        assert_eq!(entity.total_budget, 2000.0);
        assert_eq!(entity.actual_capacity_units, 500.0);
        assert_eq!(entity.target_capacity_units, 1000.0);
        assert_eq!(entity.contributions.len(), 4);

        let first = &entity.contributions[0];
        assert_eq!(first.contributor_name, "Compensator 1");
        assert_eq!(first.contributor_id.as_deref(), Some("comp1"));
        assert_eq!(first.entry_id.as_deref(), Some("3"));
        assert_eq!(first.amount_funded, 600.0);

        for missing in &entity.contributions[1..3] {
            assert_eq!(missing.contributor_name, "Unknown");
            assert_eq!(missing.contributor_id, None);
            assert_eq!(missing.amount_funded, 0.0);
        }

        let unnamed = &entity.contributions[3];
        assert_eq!(unnamed.contributor_name, "Unknown");
        assert_eq!(unnamed.contributor_id.as_deref(), Some("comp2"));
        assert_eq!(unnamed.amount_funded, 50.0);
    }

    #[test]
    fn test_mistyped_text_fields_degrade() {
        let record = parse_project_document(
            r#"{
                "name": ["not", "a", "name"],
                "amountFunded": "600",
                "country": "Kenya",
                "projectCompensators": [
                    {
                        "amountFunded": "600",
                        "compensator": { "name": 42, "documentId": "c1" }
                    },
                    "garbage"
                ]
            }"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(record.title(), "");
        assert!(record.country.is_none());

        let entity = FundableEntity::from(&record);
        assert_eq!(entity.contributions.len(), 2);
        assert_eq!(entity.contributions[0].contributor_name, "Unknown");
        assert_eq!(entity.contributions[0].contributor_id.as_deref(), Some("c1"));
        assert_eq!(entity.contributions[0].amount_funded, 600.0);
        assert_eq!(entity.contributions[1].contributor_name, "Unknown");
    }

    #[test]
    fn test_target_pledge_caps_defaults() {
        let with = |v: Value| CompensatorRecord {
            target_pledge_caps: Some(v),
            ..Default::default()
        };

        assert_eq!(CompensatorRecord::default().target_pledge_caps(), 100.0);
        assert_eq!(with(Value::Null).target_pledge_caps(), 100.0);
        assert_eq!(with(json!("")).target_pledge_caps(), 100.0);
        assert_eq!(with(json!(0)).target_pledge_caps(), 100.0);
        assert_eq!(with(json!("250")).target_pledge_caps(), 250.0);
        assert_eq!(with(json!("0")).target_pledge_caps(), 0.0);
        assert_eq!(with(json!("lots")).target_pledge_caps(), 0.0);
    }

    #[test]
    fn test_parse_project_document_shapes() {
        let bare = parse_project_document(r#"{"name": "Bare"}"#).unwrap().unwrap();
        assert_eq!(bare.title(), "Bare");

        let wrapped = parse_project_document(r#"{"data": [{"name": "Listed"}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(wrapped.title(), "Listed");

        assert!(parse_project_document("null").unwrap().is_none());
        assert!(parse_project_document(r#"{"data": []}"#).unwrap().is_none());
        assert!(parse_project_document("{ not json").is_err());
    }

    #[test]
    fn test_empty_object_has_no_contributions() {
        let record = parse_project_document("{}").unwrap().unwrap();
        assert!(FundableEntity::from(&record).contributions.is_empty());
    }

    #[test]
    fn test_compensator_envelope() {
        let envelope: Envelope<CompensatorRecord> = serde_json::from_value(json!({
            "data": {
                "documentId": "comp1",
                "name": "Acme",
                "projectCompensations": [
                    { "documentId": "pc1", "capsFunded": "10" },
                    { "capsFunded": "5" },
                    { "documentId": 7 }
                ]
            },
            "meta": {}
        }))
        .unwrap();

        let compensator = envelope.data.unwrap();
        assert_eq!(compensator.contribution_ids(), vec!["pc1".to_string()]);
    }
}
