use crate::{
    recipe::Recipe,
    types::{FrameText, Transcript},
};

/// Format seconds as HH:MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Format transcript segments with timestamps
pub fn format_transcript_with_timestamps(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .filter(|seg| !seg.text.trim().is_empty())
        .map(|seg| format!("[{}] {}", format_timestamp(seg.start), seg.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One `[HH:MM:SS] text` line per recognized frame.
pub fn format_frame_texts(frames: &[FrameText]) -> String {
    frames
        .iter()
        .map(|f| format!("[{}] {}", f.timestamp, f.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_recipe_readable(recipe: &Recipe) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", recipe.title));
    if !recipe.description.is_empty() {
        output.push_str(&format!("{}\n\n", recipe.description));
    }

    let minutes = |m: Option<u32>| m.map(|m| format!("{m} min")).unwrap_or_else(|| "-".into());
    output.push_str(&format!(
        "**Prep:** {} | **Cook:** {} | **Servings:** {} | **Difficulty:** {}\n\n",
        minutes(recipe.prep_time),
        minutes(recipe.cook_time),
        recipe
            .servings
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into()),
        recipe.difficulty_level.as_str()
    ));

    if !recipe.ingredients.is_empty() {
        output.push_str("## Ingredients\n\n");
        for ingredient in &recipe.ingredients {
            let amount = [ingredient.quantity.as_str(), ingredient.unit.as_deref().unwrap_or("")]
                .concat();
            if amount.is_empty() {
                output.push_str(&format!("• {}\n", ingredient.name));
            } else {
                output.push_str(&format!("• {} {}\n", ingredient.name, amount));
            }
        }
        output.push('\n');
    }

    output.push_str("## Steps\n\n");
    for step in &recipe.instructions {
        match &step.start_time {
            Some(at) => output.push_str(&format!("### {}. {} [{}]\n\n", step.step, step.title, at)),
            None => output.push_str(&format!("### {}. {}\n\n", step.step, step.title)),
        }
        if !step.ingredients.is_empty() {
            output.push_str(&format!("_{}_\n\n", step.ingredients.join(", ")));
        }
        for action in &step.actions {
            let label = if action.action.is_empty() {
                action.description.clone()
            } else {
                format!("**{}** {}", action.action, action.description)
            };
            match &action.start_time {
                Some(at) => output.push_str(&format!("- [{}] {}\n", at, label)),
                None => output.push_str(&format!("- {}\n", label)),
            }
        }
        output.push('\n');
    }

    if !recipe.tags.is_empty() {
        output.push_str(&format!("Tags: {}\n", recipe.tags.join(", ")));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{RecipeStep, SubStep};

    #[test]
    fn timestamps_are_hours_minutes_seconds() {
        assert_eq!(format_timestamp(0.0), "00:00:00");
        assert_eq!(format_timestamp(38.0), "00:00:38");
        assert_eq!(format_timestamp(3725.9), "01:02:05");
    }

    #[test]
    fn readable_recipe_lists_steps_with_times() {
        let recipe = Recipe {
            title: "된장찌개".into(),
            instructions: vec![RecipeStep {
                step: 1,
                title: "육수 내기".into(),
                start_time: Some("00:00:10".into()),
                actions: vec![SubStep {
                    description: "멸치를 끓인다.".into(),
                    start_time: Some("00:00:12".into()),
                    ..Default::default()
                }],
                ingredients: vec![],
                thumbnail_url: None,
            }],
            ..Default::default()
        };

        let text = format_recipe_readable(&recipe);
        assert!(text.starts_with("# 된장찌개"));
        assert!(text.contains("### 1. 육수 내기 [00:00:10]"));
        assert!(text.contains("- [00:00:12] 멸치를 끓인다."));
    }
}
