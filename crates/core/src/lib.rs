pub mod artifacts;
pub mod combine;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod format;
pub mod media;
pub mod ocr;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod queues;
pub mod recipe;
pub mod routes;
pub mod source;
pub mod store;
pub mod subtitle;
pub mod summarize;
pub mod thumbnail;
pub mod transcribe;
pub mod types;
pub mod upload;
pub mod workers;

pub use artifacts::{RunArtifacts, get_model_dir, get_root_work_dir};
pub use combine::{CombinedTranscript, combine};
pub use config::{OcrConfig, PipelineConfig, SupabaseConfig, UploadConfig};
pub use error::{CookitError, Result};
pub use extract::SourceExtractor;
pub use format::{format_recipe_readable, format_timestamp, format_transcript_with_timestamps};
pub use parser::{ParseError, ParseShape, ParsedRecipe, parse_response};
pub use prompt::{PromptDocument, build_prompt};
pub use provider::{GenerationConfig, GenerativeModel, Provider, ProviderClient, ProviderConfig};
pub use recipe::{Difficulty, Ingredient, Recipe, RecipeStep, SubStep};
pub use source::{VideoSourceProvider, YtDlp, resolve_source};
pub use store::{ObjectStorage, RecipeStore, SupabaseClient};
pub use summarize::{Summarizer, Summary};
pub use thumbnail::ThumbnailFetcher;
pub use types::{ExtractedSources, RunResult, RunStatus, Segment, Transcript, VideoSource};
pub use upload::{UploadOutcome, Uploader};
