//! Supabase-backed store: PostgREST for rows, the storage API for images.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    Category, ObjectStorage, RecipeRow, RecipeStats, RecipeStore, StoreError, StoredRecipe,
};
use crate::config::SupabaseConfig;

const CATEGORIES: &str = "recipe_categories";
const RECIPES: &str = "recipes";
const STATS: &str = "recipe_stats";

#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    pub fn from_config(config: &SupabaseConfig) -> Self {
        Self::new(config.url.clone(), config.service_key.clone())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn table(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }

    async fn check_status(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(StoreError::Api {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }

    async fn first_row<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        select: &str,
    ) -> Result<Option<T>, StoreError> {
        let mut query: Vec<(&str, String)> = vec![("select", select.to_string())];
        query.extend(filters.iter().cloned());
        query.push(("limit", "1".to_string()));

        let response = self
            .authorized(self.client.get(self.table(table)))
            .query(&query)
            .send()
            .await?;
        let rows: Vec<T> = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl ObjectStorage for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<String, StoreError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.url, bucket, key);
        debug!(bucket, key, size = bytes.len(), "uploading object");

        let response = self
            .authorized(self.client.post(url))
            .header("Content-Type", content_type)
            .header("x-upsert", upsert.to_string())
            .body(bytes)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(self.public_url(bucket, key))
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.url, bucket, key)
    }
}

#[async_trait]
impl RecipeStore for SupabaseClient {
    async fn find_category(&self, name: &str) -> Result<Option<Category>, StoreError> {
        self.first_row(CATEGORIES, &[("name", format!("ilike.*{name}*"))], "id,name")
            .await
    }

    async fn find_category_exact(&self, name: &str) -> Result<Option<Category>, StoreError> {
        self.first_row(CATEGORIES, &[("name", format!("eq.{name}"))], "id,name")
            .await
    }

    async fn upsert_recipe(&self, row: &RecipeRow) -> Result<StoredRecipe, StoreError> {
        let response = self
            .authorized(self.client.post(self.table(RECIPES)))
            .query(&[("on_conflict", "video_id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(row)
            .send()
            .await?;
        let rows: Vec<StoredRecipe> = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("upsert returned no rows".to_string()))
    }

    async fn find_stats(&self, recipe_id: &str) -> Result<Option<RecipeStats>, StoreError> {
        self.first_row(STATS, &[("recipe_id", format!("eq.{recipe_id}"))], "*")
            .await
    }

    async fn insert_stats(&self, stats: &RecipeStats) -> Result<(), StoreError> {
        let response = self
            .authorized(self.client.post(self.table(STATS)))
            .header("Prefer", "return=minimal")
            .json(stats)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path, query_param},
    };

    fn client(server: &MockServer) -> SupabaseClient {
        SupabaseClient::new(format!("{}/", server.uri()), "service-key")
    }

    #[tokio::test]
    async fn category_lookup_uses_partial_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/recipe_categories"))
            .and(query_param("name", "ilike.*한식*"))
            .and(query_param("limit", "1"))
            .and(header("apikey", "service-key"))
            .and(header("authorization", "Bearer service-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": 3, "name": "한식"}])),
            )
            .mount(&server)
            .await;

        let category = client(&server).find_category("한식").await.unwrap();
        assert_eq!(
            category,
            Some(Category {
                id: "3".into(),
                name: "한식".into()
            })
        );
    }

    #[tokio::test]
    async fn missing_category_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/recipe_categories"))
            .and(query_param("name", "eq.기타"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        assert!(client(&server).find_category_exact("기타").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_is_keyed_by_video_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/recipes"))
            .and(query_param("on_conflict", "video_id"))
            .and(body_partial_json(json!({"video_id": "abc", "ai_generated": true})))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!([{"id": "b7f1", "title": "김치찌개"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let row = RecipeRow::build(
            &crate::recipe::Recipe::default(),
            "abc",
            "https://youtu.be/abc",
            Some("김치찌개"),
            None,
            vec![],
            crate::store::AnalysisProvenance {
                model: "m".into(),
                processed_at: chrono::Utc::now(),
                processing_time_secs: 0.0,
                parse_shape: "strict".into(),
                text_sources: vec![],
                combined_text_length: 0,
                confidence: None,
                raw_response: String::new(),
            },
        );
        let stored = client(&server).upsert_recipe(&row).await.unwrap();
        assert_eq!(stored.id, "b7f1");
    }

    #[tokio::test]
    async fn store_errors_carry_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/recipe_stats"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
            .mount(&server)
            .await;

        let err = client(&server)
            .insert_stats(&RecipeStats::zeroed("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 409, ref body } if body == "duplicate key"));
    }

    #[tokio::test]
    async fn upload_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/recipe-thumbnails/abc.jpg"))
            .and(header("x-upsert", "true"))
            .and(header("content-type", "image/jpeg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Key": "x"})))
            .expect(1)
            .mount(&server)
            .await;

        let url = client(&server)
            .upload("recipe-thumbnails", "abc.jpg", vec![0xff, 0xd8], "image/jpeg", true)
            .await
            .unwrap();
        assert_eq!(
            url,
            format!("{}/storage/v1/object/public/recipe-thumbnails/abc.jpg", server.uri())
        );
    }
}
