use crate::cache::CacheService;
use crate::services::wikimedia::EntityLabel;
use std::time::Duration;

const LABEL_TTL: Duration = Duration::from_secs(3600);

fn label_key(language: &str, qid: &str) -> String {
    format!("capacity:label:{}:{}", language, qid)
}

impl CacheService {
    /// Resolved capacity label for `(language, qid)`, if cached.
    pub async fn get_cached_label(&self, language: &str, qid: &str) -> Option<EntityLabel> {
        let raw = self.get(&label_key(language, qid)).await.ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    /// Caches a resolved label for one hour. Failures only cost a refetch.
    pub async fn cache_label(&self, language: &str, qid: &str, label: &EntityLabel) {
        let Ok(raw) = serde_json::to_string(label) else {
            return;
        };
        if let Err(e) = self.set_ex(&label_key(language, qid), &raw, LABEL_TTL).await {
            tracing::warn!("Failed to cache label for {}: {:?}", qid, e);
        }
    }
}
