use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Deserialize)]
pub struct EmailableRequest {
    pub sender: String,
    pub receiver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MessagePayload {
    #[validate(length(min = 1, message = "Receiver is required"))]
    pub receiver: String,
    #[validate(length(min = 1, max = 255, message = "Subject must be 1-255 characters"))]
    pub subject: String,
    #[validate(length(min = 1, message = "Message body is required"))]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_method"))]
    pub method: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn validate_method(method: &str) -> Result<(), ValidationError> {
    match method {
        "email" | "talk_page" => Ok(()),
        _ => Err(ValidationError::new("unknown_method")),
    }
}
