use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DocumentPayload {
    #[validate(url(message = "Document URL is not a valid URL"))]
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
