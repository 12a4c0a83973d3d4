use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /api/login/callback`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackRequest {
    pub oauth_token: String,
    pub oauth_verifier: String,
    #[serde(default)]
    pub stored_token: Option<String>,
    #[serde(default)]
    pub stored_token_secret: Option<String>,
}

/// Result of the step 3 exchange: the backend API token plus the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResult {
    pub token: String,
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub first_login: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Step 1 response from the login service.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthStart {
    pub oauth_token: String,
    pub oauth_token_secret: String,
}

/// Which deployment started an OAuth exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthHostRecord {
    pub host: String,
    pub oauth_token_secret: String,
}
