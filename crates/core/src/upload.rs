//! Persists a parsed recipe: thumbnail, step frames, category, row upsert
//! and stats.
//!
//! Only the recipe upsert is fatal. Every other step degrades with a warning
//! that is also returned to the caller in [`UploadOutcome::warnings`].

use std::{collections::BTreeMap, path::Path, sync::Arc};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::{
    artifacts::RunArtifacts,
    config::UploadConfig,
    error::{CookitError, Result},
    media::FrameGrabber,
    recipe::Recipe,
    store::{AnalysisProvenance, ObjectStorage, RecipeRow, RecipeStats, RecipeStore},
    thumbnail::ThumbnailFetcher,
    types::VideoSource,
};

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub recipe_id: String,
    pub title: String,
    pub category_id: Option<String>,
    pub thumbnail_url: Option<String>,
    pub step_images: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct Uploader {
    storage: Arc<dyn ObjectStorage>,
    store: Arc<dyn RecipeStore>,
    thumbnails: ThumbnailFetcher,
    frames: Option<Arc<dyn FrameGrabber>>,
    config: UploadConfig,
}

impl Uploader {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        store: Arc<dyn RecipeStore>,
        thumbnails: ThumbnailFetcher,
        config: UploadConfig,
    ) -> Self {
        Self {
            storage,
            store,
            thumbnails,
            frames: None,
            config,
        }
    }

    /// Captures a frame per step from the run's video and stores it.
    pub fn with_step_frames(mut self, frames: Arc<dyn FrameGrabber>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub async fn upload(
        &self,
        recipe: &Recipe,
        source: &VideoSource,
        run: &RunArtifacts,
        provenance: AnalysisProvenance,
    ) -> Result<UploadOutcome> {
        let mut warnings = Vec::new();

        let thumbnail_url = self.upload_thumbnail(source, run, &mut warnings).await;
        let step_urls = self.upload_step_frames(recipe, source, run, &mut warnings).await;
        let category_id = self
            .resolve_category(recipe.category_name.as_deref(), &mut warnings)
            .await;

        let mut row = RecipeRow::build(
            recipe,
            &source.video_id,
            &source.url,
            source.title.as_deref(),
            category_id.clone(),
            thumbnail_url.iter().cloned().collect(),
            provenance,
        );
        row.attach_step_images(&step_urls);
        let stored = self
            .store
            .upsert_recipe(&row)
            .await
            .map_err(CookitError::Persistence)?;
        info!(video_id = %source.video_id, recipe_id = %stored.id, "recipe upserted");

        self.ensure_stats(&stored.id, &mut warnings).await;

        for path in [run.response_path(), run.recipe_path(), run.thumbnail_path()] {
            remove_if_present(&path).await;
        }
        if let Err(e) = fs::remove_dir_all(run.step_frames_dir()).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(error = %e, "could not remove step frames");
        }

        Ok(UploadOutcome {
            recipe_id: stored.id,
            title: row.title,
            category_id,
            thumbnail_url,
            step_images: row.step_images.unwrap_or_default(),
            warnings,
        })
    }

    /// One frame per step at its earliest action, keyed by step number.
    /// Steps without a usable time get no frame.
    async fn upload_step_frames(
        &self,
        recipe: &Recipe,
        source: &VideoSource,
        run: &RunArtifacts,
        warnings: &mut Vec<String>,
    ) -> BTreeMap<u32, String> {
        let mut urls = BTreeMap::new();
        let Some(frames) = &self.frames else {
            return urls;
        };
        let Some(video) = run.find_video() else {
            debug!(video_id = %source.video_id, "no video in run directory, skipping step frames");
            return urls;
        };

        let dir = run.step_frames_dir();
        if let Err(e) = fs::create_dir_all(&dir).await {
            warn!(path = %dir.display(), error = %e, "step frame directory unavailable");
            warnings.push(format!("step frames skipped: {e}"));
            return urls;
        }

        for step in &recipe.instructions {
            let Some(at_secs) = step.earliest_action_seconds() else {
                continue;
            };
            let file_name = format!("step_{}.jpg", step.step);
            let path = dir.join(&file_name);

            if let Err(e) = frames.grab(&video, at_secs, &path).await {
                warn!(step = step.step, at_secs, error = %e, "step frame capture failed");
                warnings.push(format!("step {} frame capture failed: {e}", step.step));
                continue;
            }
            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "step frame unreadable");
                    warnings.push(format!("step {} frame unreadable: {e}", step.step));
                    continue;
                }
            };

            let key = format!("{}/{file_name}", source.video_id);
            match self
                .storage
                .upload(&self.config.step_thumbnail_bucket, &key, bytes, "image/jpeg", true)
                .await
            {
                Ok(url) => {
                    urls.insert(step.step, url);
                }
                Err(e) => {
                    warn!(step = step.step, error = %e, "step frame upload failed");
                    warnings.push(format!("step {} frame upload failed: {e}", step.step));
                }
            }
        }

        debug!(video_id = %source.video_id, uploaded = urls.len(), "step frames stored");
        urls
    }

    async fn upload_thumbnail(
        &self,
        source: &VideoSource,
        run: &RunArtifacts,
        warnings: &mut Vec<String>,
    ) -> Option<String> {
        let Some(path) = self.thumbnails.acquire(source, run).await else {
            warnings.push("no thumbnail available".to_string());
            return None;
        };

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "thumbnail unreadable");
                warnings.push(format!("thumbnail unreadable: {e}"));
                return None;
            }
        };

        let key = format!("{}.jpg", source.video_id);
        match self
            .storage
            .upload(&self.config.thumbnail_bucket, &key, bytes, "image/jpeg", true)
            .await
        {
            Ok(url) => {
                debug!(%url, "thumbnail uploaded");
                Some(url)
            }
            Err(e) => {
                warn!(video_id = %source.video_id, error = %e, "thumbnail upload failed");
                warnings.push(format!("thumbnail upload failed: {e}"));
                None
            }
        }
    }

    /// Partial match on the model's category, then the default category.
    async fn resolve_category(
        &self,
        name: Option<&str>,
        warnings: &mut Vec<String>,
    ) -> Option<String> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        if let Some(name) = name {
            match self.store.find_category(name).await {
                Ok(Some(category)) => return Some(category.id),
                Ok(None) => debug!(category = name, "no matching category, using default"),
                Err(e) => {
                    warn!(category = name, error = %e, "category lookup failed");
                    warnings.push(format!("category lookup failed: {e}"));
                    return None;
                }
            }
        }

        match self
            .store
            .find_category_exact(&self.config.default_category)
            .await
        {
            Ok(found) => found.map(|c| c.id),
            Err(e) => {
                warn!(error = %e, "default category lookup failed");
                warnings.push(format!("category lookup failed: {e}"));
                None
            }
        }
    }

    async fn ensure_stats(&self, recipe_id: &str, warnings: &mut Vec<String>) {
        let result = match self.store.find_stats(recipe_id).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => self.store.insert_stats(&RecipeStats::zeroed(recipe_id)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(recipe_id, error = %e, "stats initialization failed");
            warnings.push(format!("stats initialization failed: {e}"));
        }
    }
}

async fn remove_if_present(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove file"),
    }
}
