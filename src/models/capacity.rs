use serde::{Deserialize, Serialize};

/// Skill as stored by the backend (`/skill/`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SkillRecord {
    pub id: i64,
    #[serde(default)]
    pub skill_wikidata_item: String,
    /// Parent codes; empty for root capacities.
    #[serde(default)]
    pub skill_type: Vec<i64>,
}

/// Capacity as returned to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capacity {
    pub code: i64,
    pub name: String,
    pub color: String,
    pub icon: String,
    #[serde(rename = "hasChildren")]
    pub has_children: bool,
    pub skill_type: Vec<i64>,
    #[serde(rename = "wd_code", alias = "skill_wikidata_item")]
    pub skill_wikidata_item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "parentCode", default, skip_serializing_if = "Option::is_none")]
    pub parent_code: Option<i64>,
}
