pub mod auth;
pub mod badges;
pub mod capacity;
pub mod documents;
pub mod events;
pub mod language;
pub mod lists;
pub mod messages;
pub mod organizations;
pub mod profile;
pub mod users;
#[cfg(feature = "wmf-export")]
pub mod wmf;

use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use validator::ValidationErrors;

use crate::error::AppError;

/// Routes mounted under `/api`.
pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(auth::routes())
        .merge(profile::routes())
        .merge(users::routes())
        .merge(organizations::routes())
        .merge(capacity::routes())
        .merge(events::routes())
        .merge(documents::routes())
        .merge(messages::routes())
        .merge(badges::routes())
        .merge(lists::routes())
        .merge(language::routes())
}

/// Browser-facing routes outside `/api`.
pub fn pages() -> Router<Arc<crate::AppState>> {
    let router = Router::new().merge(auth::pages());
    #[cfg(feature = "wmf-export")]
    let router = router.merge(wmf::routes());
    router
}

/// Query parameters read by the gateway itself.
const OWN_PARAMS: [&str; 2] = ["userId", "language"];

/// Drops the gateway's own parameters before forwarding a query upstream.
pub(crate) fn forwarded(params: Vec<(String, String)>) -> Vec<(String, String)> {
    params
        .into_iter()
        .filter(|(key, _)| !OWN_PARAMS.contains(&key.as_str()))
        .collect()
}

pub(crate) fn invalid_payload(errors: ValidationErrors) -> AppError {
    let details = serde_json::to_value(&errors).unwrap_or(Value::Null);
    AppError::validation("Invalid payload", details)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_parameters_are_not_forwarded() {
        let params = vec![
            ("userId".to_string(), "3".to_string()),
            ("limit".to_string(), "10".to_string()),
            ("language".to_string(), "pt".to_string()),
        ];
        assert_eq!(
            forwarded(params),
            vec![("limit".to_string(), "10".to_string())]
        );
    }
}
