//! Ports to the external object storage and recipe store.

pub mod supabase;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub use supabase::SupabaseClient;

use crate::recipe::{Difficulty, Ingredient, NutritionInfo, Recipe, RecipeStep};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected store response: {0}")]
    Decode(String),
}

/// Row ids may be integers or uuids depending on the table.
fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoredRecipe {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeStats {
    #[serde(deserialize_with = "id_string")]
    pub recipe_id: String,
    pub view_count: u64,
    pub favorite_count: u64,
    pub cook_count: u64,
    pub average_rating: f64,
}

impl RecipeStats {
    pub fn zeroed(recipe_id: impl Into<String>) -> Self {
        Self {
            recipe_id: recipe_id.into(),
            view_count: 0,
            favorite_count: 0,
            cook_count: 0,
            average_rating: 0.0,
        }
    }
}

/// How a recipe was produced, stored alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisProvenance {
    pub model: String,
    pub processed_at: DateTime<Utc>,
    pub processing_time_secs: f64,
    pub parse_shape: String,
    pub text_sources: Vec<String>,
    pub combined_text_length: usize,
    pub confidence: Option<f64>,
    pub raw_response: String,
}

/// The record upserted into the `recipes` table, keyed by `video_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeRow {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<RecipeStep>,
    pub prep_time: Option<u32>,
    pub cook_time: Option<u32>,
    pub servings: Option<u32>,
    pub difficulty_level: Difficulty,
    pub tags: Vec<String>,
    pub nutrition_info: Option<NutritionInfo>,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    pub image_urls: Option<Vec<String>>,
    /// Per-step frame URLs in step order.
    pub step_images: Option<Vec<String>>,
    pub ai_generated: bool,
    pub ai_analysis_data: AnalysisProvenance,
}

pub const DEFAULT_TITLE: &str = "AI 생성 레시피";
pub const DEFAULT_DESCRIPTION: &str = "AI가 분석한 요리 레시피입니다.";
pub const REQUIRED_TAGS: [&str; 2] = ["AI-Generated", "YouTube"];

impl RecipeRow {
    /// Normalizes a parsed recipe into a row. Missing text gets defaults and
    /// the generated-content tags are always present.
    pub fn build(
        recipe: &Recipe,
        video_id: &str,
        source_url: &str,
        fallback_title: Option<&str>,
        category_id: Option<String>,
        image_urls: Vec<String>,
        provenance: AnalysisProvenance,
    ) -> Self {
        let title = Some(recipe.title.trim())
            .filter(|t| !t.is_empty())
            .or(fallback_title.map(str::trim).filter(|t| !t.is_empty()))
            .unwrap_or(DEFAULT_TITLE)
            .to_string();
        let description = Some(recipe.description.trim())
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION)
            .to_string();

        let mut tags: Vec<String> = Vec::new();
        for tag in recipe
            .tags
            .iter()
            .map(String::as_str)
            .chain(REQUIRED_TAGS)
        {
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }

        Self {
            video_id: video_id.to_string(),
            title,
            description,
            ingredients: recipe.ingredients.clone(),
            instructions: recipe.instructions.clone(),
            prep_time: recipe.prep_time,
            cook_time: recipe.cook_time,
            servings: recipe.servings,
            difficulty_level: recipe.difficulty_level,
            tags,
            nutrition_info: recipe.nutrition_info.clone(),
            source_url: source_url.to_string(),
            category_id,
            image_urls: (!image_urls.is_empty()).then_some(image_urls),
            step_images: None,
            ai_generated: true,
            ai_analysis_data: provenance,
        }
    }

    /// Sets each instruction's `thumbnail_url` from `urls`, keyed by step
    /// number, and lists the same URLs in `step_images`.
    pub fn attach_step_images(&mut self, urls: &BTreeMap<u32, String>) {
        for step in &mut self.instructions {
            step.thumbnail_url = urls.get(&step.step).cloned();
        }
        self.step_images = (!urls.is_empty()).then(|| urls.values().cloned().collect());
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Uploads `bytes` and returns the object's public URL.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<String, StoreError>;

    fn public_url(&self, bucket: &str, key: &str) -> String;
}

#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Case-insensitive partial match, first row only.
    async fn find_category(&self, name: &str) -> Result<Option<Category>, StoreError>;

    async fn find_category_exact(&self, name: &str) -> Result<Option<Category>, StoreError>;

    /// Insert or update keyed by `video_id`.
    async fn upsert_recipe(&self, row: &RecipeRow) -> Result<StoredRecipe, StoreError>;

    async fn find_stats(&self, recipe_id: &str) -> Result<Option<RecipeStats>, StoreError>;

    async fn insert_stats(&self, stats: &RecipeStats) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provenance() -> AnalysisProvenance {
        AnalysisProvenance {
            model: "gemini-2.5-flash".into(),
            processed_at: Utc::now(),
            processing_time_secs: 1.5,
            parse_shape: "strict".into(),
            text_sources: vec!["ocr".into()],
            combined_text_length: 10,
            confidence: None,
            raw_response: "{}".into(),
        }
    }

    #[test]
    fn row_fills_defaults_and_required_tags() {
        let recipe = Recipe {
            tags: vec!["YouTube".into(), "국물".into()],
            ..Default::default()
        };
        let row = RecipeRow::build(
            &recipe,
            "vid",
            "https://youtu.be/vid",
            None,
            None,
            vec![],
            provenance(),
        );

        assert_eq!(row.title, DEFAULT_TITLE);
        assert_eq!(row.description, DEFAULT_DESCRIPTION);
        assert_eq!(row.tags, vec!["YouTube", "국물", "AI-Generated"]);
        assert!(row.ai_generated);
        assert!(row.image_urls.is_none());

        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("category_id").is_none());
        assert_eq!(json["ai_analysis_data"]["parse_shape"], "strict");
    }

    #[test]
    fn video_title_is_used_when_model_gave_none() {
        let row = RecipeRow::build(
            &Recipe::default(),
            "vid",
            "u",
            Some("엄마표 김치찌개"),
            Some("7".into()),
            vec!["https://cdn/x.jpg".into()],
            provenance(),
        );
        assert_eq!(row.title, "엄마표 김치찌개");
        assert_eq!(row.category_id.as_deref(), Some("7"));
        assert_eq!(row.image_urls, Some(vec!["https://cdn/x.jpg".to_string()]));
    }

    #[test]
    fn step_images_land_on_their_instructions() {
        let recipe = Recipe {
            instructions: (1..=3)
                .map(|step| RecipeStep {
                    step,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        let mut row = RecipeRow::build(&recipe, "vid", "u", None, None, vec![], provenance());

        let json = serde_json::to_value(&row).unwrap();
        assert!(json["step_images"].is_null());
        assert!(json["instructions"][0].get("thumbnail_url").is_none());

        let urls = BTreeMap::from([
            (3, "https://cdn/vid/step_3.jpg".to_string()),
            (1, "https://cdn/vid/step_1.jpg".to_string()),
        ]);
        row.attach_step_images(&urls);

        let thumbs: Vec<_> = row
            .instructions
            .iter()
            .map(|s| s.thumbnail_url.as_deref())
            .collect();
        assert_eq!(
            thumbs,
            vec![Some("https://cdn/vid/step_1.jpg"), None, Some("https://cdn/vid/step_3.jpg")]
        );
        assert_eq!(
            row.step_images,
            Some(vec![
                "https://cdn/vid/step_1.jpg".to_string(),
                "https://cdn/vid/step_3.jpg".to_string(),
            ])
        );
    }
}
