//! Structured recipe model produced by the parser and persisted by the uploader.
//!
//! Deserialization is lenient on purpose: model output mixes numbers and
//! strings, uses `null` for unknown fields and sometimes lists ingredients as
//! bare strings. Serialization is strict and stable so a serialized recipe
//! reads back unchanged.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recipe {
    #[serde(deserialize_with = "de::string")]
    pub title: String,
    #[serde(deserialize_with = "de::string")]
    pub description: String,
    #[serde(deserialize_with = "de::ingredients")]
    pub ingredients: Vec<Ingredient>,
    #[serde(alias = "steps", deserialize_with = "de::nullable_vec")]
    pub instructions: Vec<RecipeStep>,
    #[serde(deserialize_with = "de::opt_count")]
    pub prep_time: Option<u32>,
    #[serde(deserialize_with = "de::opt_count")]
    pub cook_time: Option<u32>,
    #[serde(deserialize_with = "de::opt_count")]
    pub servings: Option<u32>,
    #[serde(alias = "difficulty")]
    pub difficulty_level: Difficulty,
    #[serde(deserialize_with = "de::string_list")]
    pub tags: Vec<String>,
    pub nutrition_info: Option<NutritionInfo>,
    #[serde(deserialize_with = "de::opt_string")]
    pub source_url: Option<String>,
    #[serde(alias = "category", deserialize_with = "de::opt_string")]
    pub category_name: Option<String>,
}

impl Recipe {
    /// True when nothing usable came out of the response.
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.ingredients.is_empty() && self.instructions.is_empty()
    }

    /// Step numbers follow order of appearance, whatever the model wrote.
    pub fn renumber_steps(&mut self) {
        for (i, step) in self.instructions.iter_mut().enumerate() {
            step.step = (i + 1) as u32;
        }
    }

    /// Fills `start_time_seconds` on every action from its `start_time`.
    pub fn fill_action_seconds(&mut self) {
        for action in self
            .instructions
            .iter_mut()
            .flat_map(|step| step.actions.iter_mut())
        {
            action.start_time_seconds = action.start_time.as_deref().and_then(timestamp_seconds);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "IngredientRepr")]
pub struct Ingredient {
    pub name: String,
    pub quantity: String,
    pub unit: Option<String>,
}

impl Ingredient {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IngredientRepr {
    Name(String),
    Full {
        #[serde(default, deserialize_with = "de::string")]
        name: String,
        #[serde(default, alias = "amount", deserialize_with = "de::string")]
        quantity: String,
        #[serde(default, deserialize_with = "de::opt_string")]
        unit: Option<String>,
    },
}

impl From<IngredientRepr> for Ingredient {
    fn from(repr: IngredientRepr) -> Self {
        match repr {
            IngredientRepr::Name(name) => Ingredient::named(name.trim()),
            IngredientRepr::Full {
                name,
                quantity,
                unit,
            } => Ingredient {
                name,
                quantity,
                unit,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeStep {
    #[serde(deserialize_with = "de::count")]
    pub step: u32,
    #[serde(deserialize_with = "de::string")]
    pub title: String,
    /// Anchor time taken from the step heading.
    #[serde(alias = "timeline", deserialize_with = "de::opt_string")]
    pub start_time: Option<String>,
    #[serde(alias = "substeps", alias = "sub_steps", deserialize_with = "de::nullable_vec")]
    pub actions: Vec<SubStep>,
    #[serde(deserialize_with = "de::string_list")]
    pub ingredients: Vec<String>,
    /// Public URL of the frame captured for this step.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de::opt_string")]
    pub thumbnail_url: Option<String>,
}

impl RecipeStep {
    /// Earliest action start in seconds, where the step's frame is taken.
    pub fn earliest_action_seconds(&self) -> Option<u32> {
        self.actions
            .iter()
            .filter_map(|a| {
                a.start_time_seconds
                    .or_else(|| a.start_time.as_deref().and_then(timestamp_seconds))
            })
            .min()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubStep {
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "de::string")]
    pub action: String,
    #[serde(deserialize_with = "de::string")]
    pub description: String,
    #[serde(alias = "timeline", deserialize_with = "de::opt_string")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de::opt_count")]
    pub start_time_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "de::ingredients")]
    pub ingredients: Vec<Ingredient>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains('쉬') || label.contains("easy") {
            Difficulty::Easy
        } else if label.contains("어려") || label.contains("어렵") || label.contains("hard") {
            Difficulty::Hard
        } else {
            Difficulty::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let label = de::opt_string(d)?;
        Ok(label.map(|l| Difficulty::from_label(&l)).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NutritionInfo {
    #[serde(deserialize_with = "de::opt_string")]
    pub calories: Option<String>,
    #[serde(deserialize_with = "de::opt_string")]
    pub carbs: Option<String>,
    #[serde(deserialize_with = "de::opt_string")]
    pub protein: Option<String>,
    #[serde(deserialize_with = "de::opt_string")]
    pub fat: Option<String>,
}

/// First run of ASCII digits in `s`, e.g. `"약 15분"` gives 15.
/// `HH:MM:SS`, `MM:SS` or plain seconds as a number of seconds.
pub fn timestamp_seconds(t: &str) -> Option<u32> {
    let parts: Vec<u32> = t
        .trim()
        .split(':')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    match parts[..] {
        [h, m, s] => Some(h * 3600 + m * 60 + s),
        [m, s] => Some(m * 60 + s),
        [s] => Some(s),
        _ => None,
    }
}

pub fn leading_number(s: &str) -> Option<u32> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let digits: String = s[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{Ingredient, leading_number};

    fn scalar_to_string(v: &Value) -> Option<String> {
        match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(scalar_to_string(&Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(scalar_to_string(&Value::deserialize(d)?).filter(|s| !s.is_empty()))
    }

    pub fn opt_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n
                .as_u64()
                .map(|v| v as u32)
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u32)),
            Value::String(s) => leading_number(&s),
            _ => None,
        })
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        Ok(opt_count(d)?.unwrap_or(0))
    }

    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let items: Vec<String> = match Value::deserialize(d)? {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(map) => {
                        let name = map.get("name").and_then(scalar_to_string)?;
                        let quantity = map
                            .get("quantity")
                            .and_then(scalar_to_string)
                            .unwrap_or_default();
                        Some(format!("{name} {quantity}").trim().to_string())
                    }
                    other => scalar_to_string(other),
                })
                .collect(),
            Value::String(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
            _ => Vec::new(),
        };
        Ok(items.into_iter().filter(|s| !s.is_empty()).collect())
    }

    pub fn ingredients<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Ingredient>, D::Error> {
        let value = Value::deserialize(d)?;
        let items = match value {
            Value::Array(items) => items,
            Value::String(s) => s
                .split(',')
                .map(|p| Value::String(p.trim().to_string()))
                .collect(),
            _ => return Ok(Vec::new()),
        };
        Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<Ingredient>(item).ok())
            .filter(|i| !i.name.is_empty())
            .collect())
    }

    pub fn nullable_vec<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_fields_are_normalized() {
        let json = r#"{
            "title": "김치찌개",
            "ingredients": ["김치", {"name": "돼지고기", "quantity": 200, "unit": "g"}],
            "instructions": [{"step": "1", "title": "재료 손질", "actions": [
                {"action": "썰기", "description": "김치를 썬다.", "timeline": "00:00:12"}
            ], "ingredients": [{"name": "김치", "quantity": "1/4포기"}]}],
            "prep_time": "10분",
            "cook_time": 20.0,
            "servings": null,
            "difficulty_level": "쉬움",
            "tags": null,
            "nutrition_info": {"calories": 350}
        }"#;

        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.ingredients[0], Ingredient::named("김치"));
        assert_eq!(recipe.ingredients[1].quantity, "200");
        assert_eq!(recipe.ingredients[1].unit.as_deref(), Some("g"));
        assert_eq!(recipe.instructions[0].step, 1);
        assert_eq!(
            recipe.instructions[0].actions[0].start_time.as_deref(),
            Some("00:00:12")
        );
        assert_eq!(recipe.instructions[0].ingredients, vec!["김치 1/4포기"]);
        assert_eq!(recipe.prep_time, Some(10));
        assert_eq!(recipe.cook_time, Some(20));
        assert_eq!(recipe.servings, None);
        assert_eq!(recipe.difficulty_level, Difficulty::Easy);
        assert!(recipe.tags.is_empty());
        assert_eq!(
            recipe.nutrition_info.and_then(|n| n.calories).as_deref(),
            Some("350")
        );
    }

    #[test]
    fn difficulty_labels() {
        assert_eq!(Difficulty::from_label("어려움"), Difficulty::Hard);
        assert_eq!(Difficulty::from_label("조금 어렵다"), Difficulty::Hard);
        assert_eq!(Difficulty::from_label("HARD"), Difficulty::Hard);
        assert_eq!(Difficulty::from_label("Easy"), Difficulty::Easy);
        assert_eq!(Difficulty::from_label("보통"), Difficulty::Medium);
    }

    #[test]
    fn action_times_become_seconds() {
        assert_eq!(timestamp_seconds("01:02:03"), Some(3723));
        assert_eq!(timestamp_seconds("02:40"), Some(160));
        assert_eq!(timestamp_seconds("45"), Some(45));
        assert_eq!(timestamp_seconds(""), None);
        assert_eq!(timestamp_seconds("약 1분"), None);

        let mut recipe = Recipe {
            instructions: vec![RecipeStep {
                actions: vec![
                    SubStep {
                        start_time: Some("00:01:30".into()),
                        ..Default::default()
                    },
                    SubStep {
                        start_time: Some("00:00:50".into()),
                        ..Default::default()
                    },
                    SubStep::default(),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        recipe.fill_action_seconds();

        let step = &recipe.instructions[0];
        let seconds: Vec<_> = step.actions.iter().map(|a| a.start_time_seconds).collect();
        assert_eq!(seconds, vec![Some(90), Some(50), None]);
        assert_eq!(step.earliest_action_seconds(), Some(50));
        assert_eq!(RecipeStep::default().earliest_action_seconds(), None);

        let json = serde_json::to_value(&step.actions[0]).unwrap();
        assert_eq!(json["start_time_seconds"], 90);
    }

    #[test]
    fn leading_number_takes_first_digits() {
        assert_eq!(leading_number("약 15분"), Some(15));
        assert_eq!(leading_number("2-3인분"), Some(2));
        assert_eq!(leading_number("모름"), None);
    }

    #[test]
    fn serialized_recipe_reads_back_unchanged() {
        let recipe = Recipe {
            title: "달걀말이".into(),
            description: "간단한 반찬".into(),
            ingredients: vec![Ingredient {
                name: "달걀".into(),
                quantity: "3".into(),
                unit: Some("개".into()),
            }],
            instructions: vec![RecipeStep {
                step: 1,
                title: "달걀 풀기".into(),
                start_time: Some("00:00:05".into()),
                actions: vec![SubStep {
                    description: "달걀을 푼다.".into(),
                    start_time: Some("00:00:05".into()),
                    start_time_seconds: Some(5),
                    ..Default::default()
                }],
                ingredients: vec!["달걀".into()],
                thumbnail_url: Some("https://cdn.test/abc/step_1.jpg".into()),
            }],
            prep_time: Some(5),
            cook_time: Some(10),
            servings: Some(2),
            difficulty_level: Difficulty::Easy,
            tags: vec!["반찬".into()],
            nutrition_info: None,
            source_url: Some("https://www.youtube.com/watch?v=abc".into()),
            category_name: Some("한식".into()),
        };

        let json = serde_json::to_string(&recipe).unwrap();
        let back: Recipe = serde_json::from_str(&json).unwrap();
        assert_eq!(back, recipe);
    }
}
