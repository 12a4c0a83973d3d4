//! Locale bundles served by `/api/language`.
//!
//! A translation string is only used when it keeps every placeholder of the
//! default-language string (`$1`, `$name`, `{count}`); otherwise the default
//! string is served so the UI never renders a broken interpolation.

use dashmap::DashMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::I18nConfig;
use crate::error::AppError;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$[A-Za-z0-9_]+|\{[A-Za-z0-9_]+\}").expect("valid placeholder pattern")
});

pub type Bundle = Map<String, Value>;

#[derive(Debug, Error)]
pub enum I18nError {
    #[error("failed to read locale file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("locale file {path} is not a JSON object")]
    Parse { path: PathBuf },
}

impl From<I18nError> for AppError {
    fn from(e: I18nError) -> Self {
        AppError::Internal(e.to_string())
    }
}

#[derive(Clone)]
pub struct LocaleStore {
    dir: PathBuf,
    default_language: String,
    bundles: Arc<DashMap<String, Arc<Bundle>>>,
}

/// Placeholders a message interpolates.
pub fn placeholders(message: &str) -> BTreeSet<&str> {
    PLACEHOLDER.find_iter(message).map(|m| m.as_str()).collect()
}

/// Merges `translation` over `default`. Keys missing from the default are
/// dropped; strings losing a placeholder fall back to the default text.
pub fn compile_bundle(default: &Bundle, translation: &Bundle) -> Bundle {
    default
        .iter()
        .map(|(key, fallback)| {
            let value = match (fallback, translation.get(key)) {
                (Value::String(source), Some(Value::String(translated)))
                    if !translated.trim().is_empty()
                        && placeholders(source).is_subset(&placeholders(translated)) =>
                {
                    Value::String(translated.clone())
                }
                (Value::String(_), Some(Value::String(translated))) if !translated.trim().is_empty() => {
                    debug!("Translation of '{}' drops a placeholder, using default", key);
                    fallback.clone()
                }
                (Value::Object(source), Some(Value::Object(translated))) => {
                    Value::Object(compile_bundle(source, translated))
                }
                _ => fallback.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Language codes are file names; anything outside `[a-z0-9-]` is refused.
pub fn sanitize_language(language: &str) -> Option<String> {
    let code = language.trim().to_ascii_lowercase().replace('_', "-");
    let valid = !code.is_empty()
        && code.len() <= 16
        && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    valid.then_some(code)
}

impl LocaleStore {
    pub fn new(config: &I18nConfig) -> Self {
        Self {
            dir: config.locales_dir.clone(),
            default_language: config.default_language.clone(),
            bundles: Arc::new(DashMap::new()),
        }
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Compiled bundle for `language`, the default bundle for unknown codes.
    pub async fn bundle(&self, language: &str) -> Result<(String, Arc<Bundle>), I18nError> {
        let code = sanitize_language(language).unwrap_or_else(|| self.default_language.clone());
        if let Some(bundle) = self.bundles.get(&code) {
            return Ok((code, bundle.clone()));
        }

        let default = self.read(&self.default_language).await?.unwrap_or_default();
        let (served, compiled) = if code == self.default_language {
            (code, default)
        } else {
            match self.read(&code).await? {
                Some(translation) => {
                    let compiled = compile_bundle(&default, &translation);
                    (code, compiled)
                }
                None => {
                    warn!("No locale file for '{}', serving {}", code, self.default_language);
                    (self.default_language.clone(), default)
                }
            }
        };

        let compiled = Arc::new(compiled);
        self.bundles.insert(served.clone(), compiled.clone());
        Ok((served, compiled))
    }

    /// Codes with a locale file, sorted.
    pub async fn available_languages(&self) -> Result<Vec<String>, I18nError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|source| I18nError::Io { path: self.dir.clone(), source })?;
        let mut languages = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| I18nError::Io { path: self.dir.clone(), source })?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    languages.push(stem.to_string());
                }
            }
        }
        languages.sort();
        Ok(languages)
    }

    async fn read(&self, code: &str) -> Result<Option<Bundle>, I18nError> {
        let path = self.dir.join(format!("{code}.json"));
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(I18nError::Io { path, source }),
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            _ => Err(I18nError::Parse { path }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(value: Value) -> Bundle {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn finds_both_placeholder_styles() {
        let found = placeholders("Hello $1, you have {count} messages from $sender");
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["$1", "$sender", "{count}"]);
    }

    #[test]
    fn falls_back_when_placeholder_dropped() {
        let default = bundle(json!({
            "greeting": "Hello $1",
            "count": "{count} capacities",
            "plain": "Save",
            "missing": "Only in default"
        }));
        let translation = bundle(json!({
            "greeting": "Olá",
            "count": "{count} capacidades",
            "plain": "Salvar",
            "extra": "ignored"
        }));
        let compiled = compile_bundle(&default, &translation);
        assert_eq!(compiled["greeting"], "Hello $1");
        assert_eq!(compiled["count"], "{count} capacidades");
        assert_eq!(compiled["plain"], "Salvar");
        assert_eq!(compiled["missing"], "Only in default");
        assert!(!compiled.contains_key("extra"));
    }

    #[test]
    fn reordered_placeholders_are_fine() {
        let default = bundle(json!({ "m": "$1 sent $2" }));
        let translation = bundle(json!({ "m": "$2 recebeu de $1" }));
        assert_eq!(compile_bundle(&default, &translation)["m"], "$2 recebeu de $1");
    }

    #[test]
    fn blank_translation_uses_default() {
        let default = bundle(json!({ "m": "Send" }));
        let translation = bundle(json!({ "m": "  " }));
        assert_eq!(compile_bundle(&default, &translation)["m"], "Send");
    }

    #[test]
    fn language_codes_are_sanitized() {
        assert_eq!(sanitize_language("pt_BR").as_deref(), Some("pt-br"));
        assert_eq!(sanitize_language("../etc/passwd"), None);
        assert_eq!(sanitize_language(""), None);
    }

    #[tokio::test]
    async fn store_compiles_and_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("en.json"), r#"{"hi": "Hi $1", "bye": "Bye"}"#).unwrap();
        std::fs::write(dir.path().join("es.json"), r#"{"hi": "Hola", "bye": "Adiós"}"#).unwrap();

        let store = LocaleStore::new(&I18nConfig {
            locales_dir: dir.path().to_path_buf(),
            default_language: "en".into(),
        });

        let (code, es) = store.bundle("es").await.unwrap();
        assert_eq!(code, "es");
        assert_eq!(es["hi"], "Hi $1");
        assert_eq!(es["bye"], "Adiós");

        let (code, fallback) = store.bundle("xx").await.unwrap();
        assert_eq!(code, "en");
        assert_eq!(fallback["bye"], "Bye");

        assert_eq!(store.available_languages().await.unwrap(), vec!["en", "es"]);
    }
}
