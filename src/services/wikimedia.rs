//! Outbound calls to Wikimedia services: the Metabase SPARQL endpoint and
//! Wikidata for capacity labels, the MediaWiki action API for the emailable
//! check.

use reqwest::header;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::WikimediaConfig;
use crate::services::retry::with_linear_backoff;

const USER_AGENT: &str = "capx-gateway/0.1 (https://capx.toolforge.org)";
const WIKIDATA_BATCH: usize = 50;
const METABASE_ATTEMPTS: u32 = 3;
const METABASE_BACKOFF_STEP: Duration = Duration::from_millis(200);

/// Name and description of an entity in one language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityLabel {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emailability {
    pub sender_emailable: bool,
    pub receiver_emailable: bool,
    pub can_send_email: bool,
}

#[derive(Clone)]
pub struct WikimediaClient {
    http: reqwest::Client,
    metabase_url: String,
    wikidata_api_url: String,
    mediawiki_api_url: String,
}

// --- Metabase SPARQL payload ---

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<HashMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
}

// --- Wikidata wbgetentities payload ---

#[derive(Debug, Deserialize)]
struct EntitiesResponse {
    #[serde(default)]
    entities: HashMap<String, Entity>,
}

#[derive(Debug, Deserialize)]
struct Entity {
    #[serde(default)]
    labels: HashMap<String, LangValue>,
    #[serde(default)]
    descriptions: HashMap<String, LangValue>,
}

#[derive(Debug, Deserialize)]
struct LangValue {
    value: String,
}

// --- MediaWiki list=users payload ---

#[derive(Debug, Deserialize)]
struct UsersResponse {
    query: UsersQuery,
}

#[derive(Debug, Deserialize)]
struct UsersQuery {
    #[serde(default)]
    users: Vec<MediaWikiUser>,
}

#[derive(Debug, Deserialize)]
struct MediaWikiUser {
    name: String,
    #[serde(default)]
    emailable: bool,
    #[serde(default)]
    missing: bool,
}

impl WikimediaClient {
    pub fn from_config(config: &WikimediaConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()?;
        Ok(Self {
            http,
            metabase_url: config.metabase_url.clone(),
            wikidata_api_url: config.wikidata_api_url.clone(),
            mediawiki_api_url: config.mediawiki_api_url.clone(),
        })
    }

    /// Labels from Metabase keyed by Wikidata QID. Items are linked to
    /// Wikidata through their `P1` statement.
    pub async fn metabase_labels(
        &self,
        qids: &[String],
        language: &str,
    ) -> Result<HashMap<String, EntityLabel>, reqwest::Error> {
        let qids: Vec<&str> = qids.iter().map(String::as_str).filter(|q| is_entity_id(q)).collect();
        if qids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = metabase_query(&qids, language);
        let query = query.as_str();
        let this = self;

        let response: SparqlResponse = with_linear_backoff(
            "Metabase query",
            METABASE_ATTEMPTS,
            METABASE_BACKOFF_STEP,
            || async move {
                this.http
                    .get(&this.metabase_url)
                    .header(header::ACCEPT, "application/sparql-results+json")
                    .query(&[("query", query), ("format", "json")])
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<SparqlResponse>()
                    .await
            },
        )
        .await?;

        let mut labels = HashMap::new();
        for binding in response.results.bindings {
            let Some(qid) = binding.get("value").map(|v| v.value.clone()) else {
                continue;
            };
            let name = binding
                .get("itemLabel")
                .map(|v| v.value.clone())
                .filter(|label| !is_entity_id(label))
                .unwrap_or_default();
            let description = binding
                .get("itemDescription")
                .map(|v| v.value.clone())
                .unwrap_or_default();
            labels.insert(qid, EntityLabel { name, description });
        }
        debug!("Metabase resolved {} of {} items", labels.len(), qids.len());
        Ok(labels)
    }

    /// Labels from Wikidata in `language`, falling back to English.
    pub async fn wikidata_labels(
        &self,
        qids: &[String],
        language: &str,
    ) -> Result<HashMap<String, EntityLabel>, reqwest::Error> {
        let mut labels = HashMap::new();
        let languages = if language == "en" {
            "en".to_string()
        } else {
            format!("{language}|en")
        };

        for chunk in qids.chunks(WIKIDATA_BATCH) {
            let ids = chunk.join("|");
            let response: EntitiesResponse = self
                .http
                .get(&self.wikidata_api_url)
                .query(&[
                    ("action", "wbgetentities"),
                    ("ids", ids.as_str()),
                    ("props", "labels|descriptions"),
                    ("languages", languages.as_str()),
                    ("format", "json"),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            for (qid, entity) in response.entities {
                let pick = |values: &HashMap<String, LangValue>| {
                    values
                        .get(language)
                        .or_else(|| values.get("en"))
                        .map(|v| v.value.clone())
                        .unwrap_or_default()
                };
                labels.insert(
                    qid,
                    EntityLabel {
                        name: pick(&entity.labels),
                        description: pick(&entity.descriptions),
                    },
                );
            }
        }
        Ok(labels)
    }

    /// Asks MediaWiki whether both users accept email.
    pub async fn check_emailable(
        &self,
        sender: &str,
        receiver: &str,
    ) -> Result<Emailability, reqwest::Error> {
        let users = format!("{sender}|{receiver}");
        let response: UsersResponse = self
            .http
            .post(&self.mediawiki_api_url)
            .form(&[
                ("action", "query"),
                ("list", "users"),
                ("ususers", users.as_str()),
                ("usprop", "emailable"),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(emailability(&response.query.users, sender, receiver))
    }
}

fn emailability(users: &[MediaWikiUser], sender: &str, receiver: &str) -> Emailability {
    let lookup = |name: &str| {
        let wanted = normalize_username(name);
        users
            .iter()
            .find(|u| normalize_username(&u.name) == wanted)
            .map(|u| u.emailable && !u.missing)
            .unwrap_or(false)
    };
    let sender_emailable = lookup(sender);
    let receiver_emailable = lookup(receiver);
    Emailability {
        sender_emailable,
        receiver_emailable,
        can_send_email: sender_emailable && receiver_emailable,
    }
}

/// MediaWiki title normalization: underscores are spaces and the first
/// letter is upper case.
pub fn normalize_username(name: &str) -> String {
    let spaced = name.trim().replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_entity_id(label: &str) -> bool {
    let mut chars = label.chars();
    chars.next() == Some('Q') && {
        let rest: Vec<char> = chars.collect();
        !rest.is_empty() && rest.iter().all(char::is_ascii_digit)
    }
}

/// `qids` must already be entity ids; they are quoted into the query as is.
fn metabase_query(qids: &[&str], language: &str) -> String {
    let values = qids
        .iter()
        .map(|q| format!("\"{q}\""))
        .collect::<Vec<_>>()
        .join(" ");
    let language = language
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>();
    format!(
        "SELECT ?item ?itemLabel ?itemDescription ?value WHERE {{ \
         VALUES ?value {{ {values} }} \
         ?item wdt:P1 ?value . \
         SERVICE wikibase:label {{ bd:serviceParam wikibase:language \"{language},en\". }} }}"
    )
}
