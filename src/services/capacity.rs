//! Capacity taxonomy with localized names.
//!
//! The backend only stores codes, parent links and Wikidata items. Names and
//! descriptions are resolved per language through a priority list: Metabase,
//! then Wikidata, then a built-in table, then a generic `Capacity {code}`.

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::cache::CacheService;
use crate::config::FeatureFlags;
use crate::error::{AppError, AppResult};
use crate::models::{Capacity, SkillRecord};
use crate::services::backend::BackendClient;
use crate::services::wikimedia::{EntityLabel, WikimediaClient};

/// Display data for a root capacity: code, English name, color token, icon.
struct RootStyle {
    code: i64,
    name: &'static str,
    color: &'static str,
    icon: &'static str,
}

const ROOT_STYLES: [RootStyle; 7] = [
    RootStyle { code: 10, name: "Organizational", color: "organizational", icon: "/icons/corporate_fare.svg" },
    RootStyle { code: 36, name: "Communication", color: "communication", icon: "/icons/communication.svg" },
    RootStyle { code: 50, name: "Learning", color: "learning", icon: "/icons/local_library.svg" },
    RootStyle { code: 56, name: "Community", color: "community", icon: "/icons/communities.svg" },
    RootStyle { code: 65, name: "Social", color: "social", icon: "/icons/cheer.svg" },
    RootStyle { code: 74, name: "Strategic", color: "strategic", icon: "/icons/chess_pawn.svg" },
    RootStyle { code: 106, name: "Technology", color: "technology", icon: "/icons/wifi_tethering.svg" },
];

const DEFAULT_COLOR: &str = "gray-600";
const DEFAULT_ICON: &str = "/icons/capacity.svg";

fn root_style(code: i64) -> Option<&'static RootStyle> {
    ROOT_STYLES.iter().find(|style| style.code == code)
}

/// Built-in names for capacities whose labels are missing upstream.
fn hardcoded_name(code: i64) -> Option<&'static str> {
    root_style(code).map(|style| style.name)
}

/// Where a resolved name came from. Only upstream names are worth caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    Metabase,
    Wikidata,
    Table,
    Generic,
}

impl LabelSource {
    pub fn is_upstream(self) -> bool {
        matches!(self, LabelSource::Metabase | LabelSource::Wikidata)
    }
}

/// Picks the first non-empty name along the priority list; the description
/// comes from the first source that has one.
pub fn resolve_label(
    code: i64,
    metabase: Option<&EntityLabel>,
    wikidata: Option<&EntityLabel>,
) -> (EntityLabel, LabelSource) {
    let sources = [(metabase, LabelSource::Metabase), (wikidata, LabelSource::Wikidata)];
    let (name, source) = sources
        .iter()
        .filter_map(|(label, source)| label.map(|label| (label.name.trim(), *source)))
        .find(|(name, _)| !name.is_empty())
        .map(|(name, source)| (name.to_string(), source))
        .or_else(|| hardcoded_name(code).map(|name| (name.to_string(), LabelSource::Table)))
        .unwrap_or_else(|| (format!("Capacity {code}"), LabelSource::Generic));
    let description = sources
        .iter()
        .filter_map(|(label, _)| *label)
        .map(|label| label.description.trim())
        .find(|d| !d.is_empty())
        .unwrap_or_default()
        .to_string();
    (EntityLabel { name, description }, source)
}

/// Walks parent links up to the root. Cycles stop at the first repeat.
fn root_of(code: i64, by_code: &HashMap<i64, &SkillRecord>) -> i64 {
    let mut current = code;
    let mut seen = HashSet::new();
    while seen.insert(current) {
        match by_code.get(&current).and_then(|skill| skill.skill_type.first()) {
            Some(parent) => current = *parent,
            None => break,
        }
    }
    current
}

#[derive(Clone)]
pub struct CapacityService {
    backend: BackendClient,
    wikimedia: WikimediaClient,
    cache: CacheService,
    features: FeatureFlags,
}

impl CapacityService {
    pub fn new(
        backend: BackendClient,
        wikimedia: WikimediaClient,
        cache: CacheService,
        features: FeatureFlags,
    ) -> Self {
        Self { backend, wikimedia, cache, features }
    }

    pub async fn skills(&self, authorization: Option<&str>) -> AppResult<Vec<SkillRecord>> {
        self.backend.get_as("/skill/", authorization, &[]).await
    }

    /// Labels for `skills` in `language`, keyed by capacity code.
    pub async fn resolve_labels(
        &self,
        skills: &[&SkillRecord],
        language: &str,
    ) -> HashMap<i64, EntityLabel> {
        let mut cached: HashMap<String, EntityLabel> = HashMap::new();
        let mut missing: Vec<String> = Vec::new();
        for skill in skills {
            let qid = &skill.skill_wikidata_item;
            if qid.is_empty() || cached.contains_key(qid) || missing.contains(qid) {
                continue;
            }
            match self.cache.get_cached_label(language, qid).await {
                Some(label) => {
                    cached.insert(qid.clone(), label);
                }
                None => missing.push(qid.clone()),
            }
        }

        let metabase = if self.features.enable_metabase && !missing.is_empty() {
            self.wikimedia
                .metabase_labels(&missing, language)
                .await
                .unwrap_or_else(|e| {
                    warn!("Metabase unavailable, falling back: {}", e);
                    HashMap::new()
                })
        } else {
            HashMap::new()
        };

        let unresolved: Vec<String> = missing
            .iter()
            .filter(|qid| metabase.get(*qid).map_or(true, |l| l.name.trim().is_empty()))
            .cloned()
            .collect();
        let wikidata = if self.features.enable_wikidata && !unresolved.is_empty() {
            self.wikimedia
                .wikidata_labels(&unresolved, language)
                .await
                .unwrap_or_else(|e| {
                    warn!("Wikidata unavailable, falling back: {}", e);
                    HashMap::new()
                })
        } else {
            HashMap::new()
        };
        debug!(
            "Resolved labels: {} cached, {} from Metabase, {} from Wikidata",
            cached.len(),
            metabase.len(),
            wikidata.len()
        );

        let mut labels = HashMap::new();
        for skill in skills {
            let qid = skill.skill_wikidata_item.as_str();
            if let Some(label) = cached.get(qid) {
                labels.insert(skill.id, label.clone());
                continue;
            }
            let (label, source) = resolve_label(skill.id, metabase.get(qid), wikidata.get(qid));
            // Fallback names are retried on the next request
            if !qid.is_empty() && source.is_upstream() {
                self.cache.cache_label(language, qid, &label).await;
            }
            labels.insert(skill.id, label);
        }
        labels
    }

    fn build(
        skill: &SkillRecord,
        label: Option<&EntityLabel>,
        all: &[SkillRecord],
        by_code: &HashMap<i64, &SkillRecord>,
        with_description: bool,
    ) -> Capacity {
        let root = root_of(skill.id, by_code);
        let style = root_style(root);
        let label = label.cloned().unwrap_or_else(|| resolve_label(skill.id, None, None).0);
        Capacity {
            code: skill.id,
            name: label.name,
            color: style.map_or(DEFAULT_COLOR, |s| s.color).to_string(),
            icon: style.map_or(DEFAULT_ICON, |s| s.icon).to_string(),
            has_children: all.iter().any(|other| other.skill_type.contains(&skill.id)),
            skill_type: skill.skill_type.clone(),
            skill_wikidata_item: skill.skill_wikidata_item.clone(),
            description: with_description.then_some(label.description),
            parent_code: skill.skill_type.first().copied(),
        }
    }

    async fn materialize(
        &self,
        all: &[SkillRecord],
        selected: Vec<&SkillRecord>,
        language: &str,
        with_description: bool,
    ) -> Vec<Capacity> {
        let by_code: HashMap<i64, &SkillRecord> = all.iter().map(|s| (s.id, s)).collect();
        let labels = self.resolve_labels(&selected, language).await;
        let mut capacities: Vec<Capacity> = selected
            .into_iter()
            .map(|skill| Self::build(skill, labels.get(&skill.id), all, &by_code, with_description))
            .collect();
        capacities.sort_by_key(|c| c.code);
        capacities
    }

    /// Root capacities (no parent).
    pub async fn roots(&self, authorization: Option<&str>, language: &str) -> AppResult<Vec<Capacity>> {
        let all = self.skills(authorization).await?;
        let roots = all.iter().filter(|s| s.skill_type.is_empty()).collect();
        Ok(self.materialize(&all, roots, language, false).await)
    }

    /// Direct children of `code`.
    pub async fn children(
        &self,
        authorization: Option<&str>,
        code: i64,
        language: &str,
    ) -> AppResult<Vec<Capacity>> {
        let all = self.skills(authorization).await?;
        if !all.iter().any(|s| s.id == code) {
            return Err(AppError::NotFound(format!("Capacity {code} not found")));
        }
        let children = all.iter().filter(|s| s.skill_type.contains(&code)).collect();
        Ok(self.materialize(&all, children, language, false).await)
    }

    /// One capacity with its description.
    pub async fn get(
        &self,
        authorization: Option<&str>,
        code: i64,
        language: &str,
    ) -> AppResult<Capacity> {
        let all = self.skills(authorization).await?;
        let skill = all
            .iter()
            .find(|s| s.id == code)
            .ok_or_else(|| AppError::NotFound(format!("Capacity {code} not found")))?;
        self.materialize(&all, vec![skill], language, true)
            .await
            .pop()
            .ok_or_else(|| AppError::Internal(format!("Capacity {code} could not be built")))
    }

    /// Capacities whose localized name contains `query`, case-insensitively.
    pub async fn search(
        &self,
        authorization: Option<&str>,
        query: &str,
        language: &str,
    ) -> AppResult<Vec<Capacity>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let all = self.skills(authorization).await?;
        let every = all.iter().collect();
        Ok(self
            .materialize(&all, every, language, false)
            .await
            .into_iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(name: &str, description: &str) -> EntityLabel {
        EntityLabel { name: name.into(), description: description.into() }
    }

    fn skill(id: i64, parents: &[i64]) -> SkillRecord {
        SkillRecord { id, skill_wikidata_item: format!("Q{id}"), skill_type: parents.to_vec() }
    }

    #[test]
    fn first_non_empty_name_wins() {
        let metabase = label("Facilitation", "Leading groups");
        let wikidata = label("facilitation (wd)", "");
        let (resolved, source) = resolve_label(99, Some(&metabase), Some(&wikidata));
        assert_eq!(resolved.name, "Facilitation");
        assert_eq!(source, LabelSource::Metabase);

        let blank = label("  ", "");
        let (resolved, source) = resolve_label(99, Some(&blank), Some(&wikidata));
        assert_eq!(resolved.name, "facilitation (wd)");
        assert_eq!(resolved.description, "");
        assert_eq!(source, LabelSource::Wikidata);
    }

    #[test]
    fn falls_back_to_table_then_generic_name() {
        let (resolved, source) = resolve_label(36, None, None);
        assert_eq!(resolved.name, "Communication");
        assert_eq!(source, LabelSource::Table);

        let (resolved, source) = resolve_label(4242, Some(&label("", "")), Some(&label("", "d")));
        assert_eq!(resolved.name, "Capacity 4242");
        assert_eq!(resolved.description, "d");
        assert_eq!(source, LabelSource::Generic);
        assert!(!source.is_upstream());
    }

    #[test]
    fn root_lookup_follows_parents_and_survives_cycles() {
        let skills = vec![skill(50, &[]), skill(51, &[50]), skill(52, &[51]), skill(7, &[8]), skill(8, &[7])];
        let by_code: HashMap<i64, &SkillRecord> = skills.iter().map(|s| (s.id, s)).collect();
        assert_eq!(root_of(52, &by_code), 50);
        assert_eq!(root_of(50, &by_code), 50);
        let cyclic = root_of(7, &by_code);
        assert!(cyclic == 7 || cyclic == 8);
    }

    #[test]
    fn built_capacity_inherits_root_style() {
        let skills = vec![skill(50, &[]), skill(51, &[50]), skill(52, &[51])];
        let by_code: HashMap<i64, &SkillRecord> = skills.iter().map(|s| (s.id, s)).collect();
        let capacity = CapacityService::build(&skills[1], Some(&label("Mentoring", "")), &skills, &by_code, false);
        assert_eq!(capacity.color, "learning");
        assert_eq!(capacity.icon, "/icons/local_library.svg");
        assert!(capacity.has_children);
        assert_eq!(capacity.parent_code, Some(50));
        assert_eq!(capacity.description, None);
    }
}
