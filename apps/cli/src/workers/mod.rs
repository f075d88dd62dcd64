pub mod build_prompt;
pub mod combine_text;
pub mod completion_sink;
pub mod events;
pub mod extract_sources;
pub mod summarize_recipe;
pub mod upload_recipe;
