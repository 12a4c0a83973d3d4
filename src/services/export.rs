//! CSV export of user profiles for Wikimedia Foundation staff.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::AppError;

pub const WMF_AFFILIATION: &str = "Wikimedia Foundation";

const HEADER: [&str; 7] = [
    "username",
    "affiliations",
    "territory",
    "languages",
    "skills_known",
    "skills_available",
    "skills_wanted",
];

/// `/list/affiliation/` answers either `{"id": "name"}` or `[{id, name}]`.
pub fn affiliation_names(list: &Value) -> HashMap<String, String> {
    match list {
        Value::Object(map) => map
            .iter()
            .filter_map(|(id, name)| name.as_str().map(|n| (id.clone(), n.to_string())))
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let id = scalar(item.get("id")?)?;
                let name = item.get("name")?.as_str()?.to_string();
                Some((id, name))
            })
            .collect(),
        _ => HashMap::new(),
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Entries of a list field; objects contribute their `id`.
fn list_field(user: &Value, key: &str) -> Vec<String> {
    match user.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(_) => item.get("id").and_then(scalar),
                other => scalar(other),
            })
            .collect(),
        Some(other) => scalar(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn username(user: &Value) -> String {
    user.get("user")
        .and_then(|u| u.get("username"))
        .or_else(|| user.get("username"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Whether `user` belongs to the Wikimedia Foundation affiliation.
pub fn is_wmf_member(user: &Value, affiliations: &HashMap<String, String>) -> bool {
    list_field(user, "affiliation").iter().any(|id| {
        affiliations
            .get(id)
            .is_some_and(|name| name.trim().eq_ignore_ascii_case(WMF_AFFILIATION))
    })
}

pub fn users_csv(users: &[Value], affiliations: &HashMap<String, String>) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let internal = |e: csv::Error| AppError::Internal(format!("Failed to write CSV: {e}"));

    writer.write_record(HEADER).map_err(internal)?;
    for user in users {
        let affiliation = list_field(user, "affiliation")
            .into_iter()
            .map(|id| affiliations.get(&id).cloned().unwrap_or(id))
            .collect::<Vec<_>>()
            .join(";");
        writer
            .write_record([
                username(user),
                affiliation,
                list_field(user, "territory").join(";"),
                list_field(user, "language").join(";"),
                list_field(user, "skills_known").join(";"),
                list_field(user, "skills_available").join(";"),
                list_field(user, "skills_wanted").join(";"),
            ])
            .map_err(internal)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV: {e}")))
}
