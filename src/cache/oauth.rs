use crate::cache::CacheService;
use crate::models::OAuthHostRecord;
use std::time::Duration;

/// Request tokens are only valid while the user is on the consent page.
const OAUTH_HOST_TTL: Duration = Duration::from_secs(600);

fn host_key(oauth_token: &str) -> String {
    format!("oauth:host:{}", oauth_token)
}

impl CacheService {
    /// Remembers which deployment started the exchange for `oauth_token`.
    pub async fn record_oauth_host(
        &self,
        oauth_token: &str,
        record: &OAuthHostRecord,
    ) -> Result<(), redis::RedisError> {
        let raw = serde_json::to_string(record).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        self.set_ex(&host_key(oauth_token), &raw, OAUTH_HOST_TTL).await
    }

    pub async fn oauth_host(
        &self,
        oauth_token: &str,
    ) -> Result<Option<OAuthHostRecord>, redis::RedisError> {
        let Some(raw) = self.get(&host_key(oauth_token)).await? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&raw).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
        })?;
        Ok(Some(record))
    }
}
