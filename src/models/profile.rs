use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::LazyLock;
use regex::Regex;
use url::{ParseError, Url};
use validator::{Validate, ValidationError};

static WIKIDATA_QID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Q[1-9][0-9]*$").expect("valid QID pattern"));

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContactLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(alias = "value")]
    #[validate(url(message = "Link is not a valid URL"))]
    pub url: String,
}

/// Profile body accepted by `PUT /api/profile`. Fields the gateway does not
/// check are kept in `extra` and forwarded untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_known: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_available: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_wanted: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_image_url"))]
    pub profile_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url(message = "Website is not a valid URL"))]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(regex(path = *WIKIDATA_QID, message = "Wikidata item must look like Q123"))]
    pub wikidata_qid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub contact: Option<Vec<ContactLink>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub social: Option<Vec<ContactLink>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProfileUpdate {
    /// Capacities offered for teaching but not declared as known. Only
    /// checked when the update carries both lists.
    pub fn invalid_capacities(&self) -> Vec<i64> {
        match (&self.skills_known, &self.skills_available) {
            (Some(known), Some(available)) => validate_capacities_before_save(known, available),
            _ => Vec::new(),
        }
    }
}

// Relative paths point at bundled avatars; absolute URLs must be http(s)
fn validate_image_url(value: &str) -> Result<(), ValidationError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Err(ParseError::RelativeUrlWithoutBase) => Ok(()),
        _ => Err(ValidationError::new("url")),
    }
}

/// Returns the codes in `available` missing from `known`, in input order
/// and without duplicates. An empty result means the profile can be saved.
pub fn validate_capacities_before_save(known: &[i64], available: &[i64]) -> Vec<i64> {
    let known: HashSet<i64> = known.iter().copied().collect();
    let mut seen = HashSet::new();
    available
        .iter()
        .copied()
        .filter(|code| !known.contains(code) && seen.insert(*code))
        .collect()
}
