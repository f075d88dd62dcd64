//! Turns raw model output into a [`Recipe`].
//!
//! Two shapes are accepted. JSON (possibly fenced, wrapped in prose or
//! slightly malformed) is decoded directly, with a single repair attempt when
//! strict decoding fails. Step-numbered narrative text is tokenized by
//! [`narrative`]. Either way steps are renumbered 1..n by appearance.

pub mod json_repair;
pub mod narrative;

use serde::Serialize;
use tracing::{debug, warn};

pub use json_repair::{json_slice, repair_json, strip_code_fences};
pub use narrative::{has_step_markers, parse_narrative, split_sentences};

use crate::recipe::{Ingredient, Recipe};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("model response is empty")]
    Empty,

    #[error("JSON could not be repaired: {reason}")]
    Unrecoverable { reason: String },

    #[error("response contains neither a recipe object nor numbered steps")]
    NoRecipe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseShape {
    Strict,
    Repaired,
    Narrative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecipe {
    pub recipe: Recipe,
    pub shape: ParseShape,
}

/// JSON when an object starts before any step marker does.
fn looks_like_json(text: &str) -> bool {
    match text.find('{') {
        Some(0) => true,
        Some(brace) => !has_step_markers(&text[..brace]),
        None => false,
    }
}

fn finish(mut recipe: Recipe, shape: ParseShape) -> Result<ParsedRecipe, ParseError> {
    if recipe.is_empty() {
        return Err(ParseError::NoRecipe);
    }
    recipe.renumber_steps();
    recipe.fill_action_seconds();
    debug!(
        ?shape,
        steps = recipe.instructions.len(),
        ingredients = recipe.ingredients.len(),
        "recipe parsed"
    );
    Ok(ParsedRecipe { recipe, shape })
}

fn parse_json(text: &str) -> Result<ParsedRecipe, ParseError> {
    let candidate = json_slice(text).unwrap_or(text);

    for attempt in [text, candidate] {
        if let Ok(recipe) = serde_json::from_str::<Recipe>(attempt) {
            return finish(recipe, ParseShape::Strict);
        }
    }

    let repaired = repair_json(candidate);
    match serde_json::from_str::<Recipe>(&repaired) {
        Ok(recipe) => {
            warn!("model returned malformed JSON, recovered after repair");
            finish(recipe, ParseShape::Repaired)
        }
        Err(e) => Err(ParseError::Unrecoverable {
            reason: e.to_string(),
        }),
    }
}

fn looks_like_title(line: &str) -> bool {
    let len = line.chars().count();
    len > 0 && len <= 60 && !line.ends_with([':', '：', '.'])
}

fn parse_narrative_recipe(text: &str) -> Result<ParsedRecipe, ParseError> {
    let parsed = parse_narrative(text);

    let mut ingredients: Vec<Ingredient> = Vec::new();
    for name in parsed.steps.iter().flat_map(|s| s.ingredients.iter()) {
        if !ingredients.iter().any(|i| &i.name == name) {
            ingredients.push(Ingredient::named(name.clone()));
        }
    }

    let recipe = Recipe {
        title: parsed
            .heading
            .filter(|h| looks_like_title(h))
            .unwrap_or_default(),
        ingredients,
        instructions: parsed.steps,
        ..Default::default()
    };
    finish(recipe, ParseShape::Narrative)
}

pub fn parse_response(raw: &str) -> Result<ParsedRecipe, ParseError> {
    let text = strip_code_fences(raw);
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    if looks_like_json(text) {
        parse_json(text)
    } else if has_step_markers(text) {
        parse_narrative_recipe(text)
    } else {
        Err(ParseError::NoRecipe)
    }
}
