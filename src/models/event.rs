use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

pub const LOCATION_TYPES: [&str; 3] = ["virtual", "in_person", "hybrid"];

/// Event body accepted on create/update and forwarded to `/events/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_event"))]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[validate(length(min = 1, max = 255, message = "Event name is required"))]
    pub name: String,
    pub time_begin: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    #[serde(default)]
    pub related_skills: Vec<i64>,
    #[serde(default)]
    pub organization: Option<i64>,
    #[serde(default)]
    pub type_of_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url(message = "Event URL is not a valid URL"))]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn validate_event(event: &EventPayload) -> Result<(), ValidationError> {
    if event.time_end < event.time_begin {
        return Err(ValidationError::new("time_end_before_time_begin"));
    }
    if let Some(location) = &event.type_of_location {
        if !LOCATION_TYPES.contains(&location.as_str()) {
            return Err(ValidationError::new("unknown_type_of_location"));
        }
    }
    Ok(())
}
