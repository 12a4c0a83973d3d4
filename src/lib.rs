pub mod cache;
pub mod config;
pub mod controllers;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use cache::{login::LoginDedup, CacheService};
use services::{
    backend::BackendClient, capacity::CapacityService, i18n::LocaleStore, oauth::OAuthClient,
    wikimedia::WikimediaClient,
};

const EVICTION_INTERVAL: Duration = Duration::from_secs(30);

// Shared state for every handler
pub struct AppState {
    pub config: config::Config,
    pub backend: BackendClient,
    pub wikimedia: WikimediaClient,
    pub oauth: OAuthClient,
    pub cache: CacheService,
    pub login: LoginDedup,
    pub capacities: CapacityService,
    pub locales: LocaleStore,
}

impl AppState {
    /// Connects to Redis when configured and builds the outbound clients.
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let cache = match &config.redis.url {
            Some(url) => {
                let redis = redis_client::RedisClient::new(url).await?;
                info!("Redis connected, login dedup shared across instances");
                CacheService::redis(redis)
            }
            None => {
                info!("REDIS_URL not set, using in-process caches");
                CacheService::in_memory()
            }
        };
        Ok(Self::with_cache(config, cache)?)
    }

    pub fn with_cache(config: config::Config, cache: CacheService) -> Result<Arc<Self>, reqwest::Error> {
        let backend = BackendClient::from_config(&config.backend)?;
        let wikimedia = WikimediaClient::from_config(&config.wikimedia)?;
        let oauth = OAuthClient::from_config(&config.oauth)?;
        let capacities = CapacityService::new(
            backend.clone(),
            wikimedia.clone(),
            cache.clone(),
            config.features.clone(),
        );
        let locales = LocaleStore::new(&config.i18n);
        let login = LoginDedup::new(cache.clone());

        Ok(Arc::new(Self {
            config,
            backend,
            wikimedia,
            oauth,
            cache,
            login,
            capacities,
            locales,
        }))
    }

    /// Evicts expired dedup and cache entries in the background.
    pub fn spawn_maintenance(self: &Arc<Self>) -> task::JoinHandle<()> {
        let state = self.clone();
        task::spawn(async move {
            let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
            loop {
                ticker.tick().await;
                let evicted = state.login.evict();
                if evicted > 0 {
                    tracing::debug!("Maintenance evicted {} entries", evicted);
                }
            }
        })
    }
}

fn cors_layer(config: &config::Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .oauth
        .hosts
        .iter()
        .chain(std::iter::once(&config.app.public_url))
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Ignoring invalid CORS origin {}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Full application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "CapX API" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .merge(controllers::pages())
        .layer(CookieManagerLayer::new())
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
