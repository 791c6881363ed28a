use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{PageGenError, Result};
use crate::integrations::IntegrationRecord;

/// Keys the LLM must return.
pub const LLM_FIELDS: [&str; 6] = [
    "HEADLINE",
    "SUBHEADLINE",
    "FEATURE_1_TITLE",
    "FEATURE_1_DESC",
    "FEATURE_2_TITLE",
    "FEATURE_2_DESC",
];

/// Every placeholder a generated page can fill.
pub const ALL_FIELDS: [&str; 8] = [
    "HEADLINE",
    "SUBHEADLINE",
    "FEATURE_1_TITLE",
    "FEATURE_1_DESC",
    "FEATURE_2_TITLE",
    "FEATURE_2_DESC",
    "HERO_IMAGE",
    "INTEGRATION_NAME",
];

/// Copy for one integration page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContent {
    pub headline: String,
    pub subheadline: String,
    pub feature_1_title: String,
    pub feature_1_desc: String,
    pub feature_2_title: String,
    pub feature_2_desc: String,
    pub hero_image: String,
    pub integration_name: String,
}

impl GeneratedContent {
    /// Validate an LLM JSON object and combine it with the record-derived
    /// fields. Any missing, empty or non-string key fails the record.
    pub fn from_llm_json(
        object: &Map<String, Value>,
        record: &IntegrationRecord,
        hero_image: &str,
    ) -> Result<Self> {
        let text = |key: &str| -> Option<String> {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let missing: Vec<String> = LLM_FIELDS
            .iter()
            .copied()
            .filter(|k| text(*k).is_none())
            .map(|k| k.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PageGenError::GenerationIncomplete(missing));
        }

        let extra: Vec<&str> = object
            .keys()
            .map(String::as_str)
            .filter(|k| !LLM_FIELDS.contains(k))
            .collect();
        if !extra.is_empty() {
            warn!(
                "Ignoring unexpected fields for {}: {}",
                record.name,
                extra.join(", ")
            );
        }

        Ok(Self {
            headline: text("HEADLINE").unwrap_or_default(),
            subheadline: text("SUBHEADLINE").unwrap_or_default(),
            feature_1_title: text("FEATURE_1_TITLE").unwrap_or_default(),
            feature_1_desc: text("FEATURE_1_DESC").unwrap_or_default(),
            feature_2_title: text("FEATURE_2_TITLE").unwrap_or_default(),
            feature_2_desc: text("FEATURE_2_DESC").unwrap_or_default(),
            hero_image: hero_image.to_string(),
            integration_name: record.name.clone(),
        })
    }

    /// Look up a value by its placeholder name.
    pub fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "HEADLINE" => &self.headline,
            "SUBHEADLINE" => &self.subheadline,
            "FEATURE_1_TITLE" => &self.feature_1_title,
            "FEATURE_1_DESC" => &self.feature_1_desc,
            "FEATURE_2_TITLE" => &self.feature_2_title,
            "FEATURE_2_DESC" => &self.feature_2_desc,
            "HERO_IMAGE" => &self.hero_image,
            "INTEGRATION_NAME" => &self.integration_name,
            _ => return None,
        };
        Some(value.as_str())
    }
}
