use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

// Top-level configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub backend: BackendConfig,
    pub oauth: OAuthConfig,
    pub wikimedia: WikimediaConfig,
    pub session: SessionConfig,
    pub redis: RedisConfig,
    pub i18n: I18nConfig,
    pub features: FeatureFlags,
}

// Server settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: String,
    /// Public origin of this deployment, e.g. `https://capx.toolforge.org`.
    pub public_url: String,
}

// Django backend
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

// OAuth login service and the deployments sharing it
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub step01_url: String,
    pub step02_url: String,
    pub step03_url: String,
    pub hosts: Vec<String>,
}

// Wikimedia services used for capacity names and the emailable check
#[derive(Debug, Clone, Deserialize)]
pub struct WikimediaConfig {
    pub metabase_url: String,
    pub wikidata_api_url: String,
    pub mediawiki_api_url: String,
}

// JWT session
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_hours: i64,
    pub cookie_secure: bool,
}

// Redis is optional; without it caches stay in-process
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct I18nConfig {
    pub locales_dir: PathBuf,
    pub default_language: String,
}

// Feature flags for the capacity name sources
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    pub enable_metabase: bool,
    pub enable_wikidata: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = or_default(name, default);
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let public_url = trim_slash(or_default("PUBLIC_URL", "http://localhost:8000"));
        let environment = or_default("ENVIRONMENT", "development");

        let hosts = match env::var("OAUTH_HOSTS") {
            Ok(list) => list
                .split(',')
                .map(|h| trim_slash(h.trim().to_string()))
                .filter(|h| !h.is_empty())
                .collect(),
            Err(_) => vec![public_url.clone()],
        };

        Ok(Config {
            app: AppConfig {
                host: or_default("HOST", "0.0.0.0"),
                port: parsed("PORT", "8000")?,
                rust_log: or_default("RUST_LOG", "capx=debug,tower_http=debug"),
                log_format: or_default("LOG_FORMAT", "text"),
                environment,
                public_url,
            },
            backend: BackendConfig {
                base_url: trim_slash(required("BASE_URL")?),
                timeout_seconds: parsed("BACKEND_TIMEOUT_SECONDS", "30")?,
            },
            oauth: OAuthConfig {
                step01_url: required("LOGIN_STEP01_URL")?,
                step02_url: required("LOGIN_STEP02_URL")?,
                step03_url: required("LOGIN_STEP03_URL")?,
                hosts,
            },
            wikimedia: WikimediaConfig {
                metabase_url: or_default(
                    "METABASE_URL",
                    "https://metabase.wikibase.cloud/query/sparql",
                ),
                wikidata_api_url: or_default(
                    "WIKIDATA_API_URL",
                    "https://www.wikidata.org/w/api.php",
                ),
                mediawiki_api_url: or_default(
                    "MEDIAWIKI_API_URL",
                    "https://meta.wikimedia.org/w/api.php",
                ),
            },
            session: SessionConfig {
                secret: required("SESSION_SECRET")?,
                ttl_hours: parsed("SESSION_TTL_HOURS", "24")?,
                cookie_secure: parsed("SESSION_COOKIE_SECURE", "false")?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty()),
            },
            i18n: I18nConfig {
                locales_dir: PathBuf::from(or_default("LOCALES_DIR", "locales")),
                default_language: or_default("DEFAULT_LANGUAGE", "en"),
            },
            features: FeatureFlags {
                enable_metabase: parsed("ENABLE_METABASE", "true")?,
                enable_wikidata: parsed("ENABLE_WIKIDATA", "true")?,
            },
        })
    }

    /// Host part (`scheme://host[:port]`) of this deployment.
    pub fn public_host(&self) -> &str {
        &self.app.public_url
    }
}
