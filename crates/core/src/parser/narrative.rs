//! Line-oriented parser for step-numbered free text such as
//!
//! ```text
//! **1단계: 양파 썰기 (00:00:10)**
//! * **재료:** 양파, 마늘
//! * **설명:** 양파를 채썬다. 마늘을 다진다 (00:00:25).
//! ```
//!
//! Lines are first classified into [`Token`]s, then folded into steps.

use std::sync::LazyLock;

use regex::Regex;

use crate::recipe::{RecipeStep, SubStep};

static STEP_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*단계\s*[:：]\s*(.*)$").unwrap());
static INGREDIENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:사용\s*)?재료\s*(?:목록)?\s*[:：]\s*(.*)$").unwrap());
static DESCRIPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:설명|조리\s*과정(?:\s*설명)?)\s*[:：]\s*(.*)$").unwrap());
static TIMELINE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:시작\s*)?타임라인\s*[:：]\s*(.*)$").unwrap());
// Timestamps inside prose must be parenthesized with two-digit fields, so
// ratios and scores such as `1:10` stay part of the sentence.
static ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d{2}:\d{2}(?::\d{2})?)\)").unwrap());
static INLINE_TIME_STRIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\d{2}:\d{2}(?::\d{2})?\)").unwrap());
static TIMELINE_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2}:\d{2}(?::\d{2})?)\b").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    StepMarker { title: &'a str },
    Ingredients(&'a str),
    Description(&'a str),
    Timeline(&'a str),
    Text(&'a str),
    Blank,
}

/// Drops list bullets, heading hashes and bold markers around a line.
fn normalize_line(line: &str) -> String {
    line.trim()
        .trim_start_matches(|c: char| {
            matches!(c, '#' | '*' | '-' | '•' | '>') || c.is_whitespace()
        })
        .replace("**", "")
        .replace("__", "")
        .trim()
        .to_string()
}

fn capture<'a>(re: &Regex, line: &'a str, group: usize) -> Option<&'a str> {
    re.captures(line)
        .and_then(|c| c.get(group))
        .map(|m| m.as_str().trim())
}

pub fn classify(line: &str) -> Token<'_> {
    if line.is_empty() {
        Token::Blank
    } else if let Some(title) = capture(&STEP_MARKER, line, 2) {
        Token::StepMarker { title }
    } else if let Some(rest) = capture(&INGREDIENT_LINE, line, 1) {
        Token::Ingredients(rest)
    } else if let Some(rest) = capture(&DESCRIPTION_LINE, line, 1) {
        Token::Description(rest)
    } else if let Some(rest) = capture(&TIMELINE_LINE, line, 1) {
        Token::Timeline(rest)
    } else {
        Token::Text(line)
    }
}

pub fn has_step_markers(text: &str) -> bool {
    text.lines().any(|line| STEP_MARKER.is_match(&normalize_line(line)))
}

/// Splits on a period followed by whitespace, keeping the period.
///
/// `0.5kg` stays whole because no whitespace
/// follows the period, but an abbreviation like `Dr. Kim` is split.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c == '.' && chars.peek().is_some_and(|(_, next)| next.is_whitespace()) {
            let end = i + c.len_utf8();
            sentences.push(text[start..end].trim().to_string());
            start = end;
        }
    }
    sentences.push(text[start..].trim().to_string());
    sentences.retain(|s| !s.is_empty());
    sentences
}

pub fn split_ingredients(line: &str) -> Vec<String> {
    line.split([',', '，', '、'])
        .map(|s| s.trim().trim_end_matches('.').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Removes an embedded `(HH:MM:SS)` / `(HH:MM)` from a step heading.
pub fn split_anchor(title: &str) -> (String, Option<String>) {
    let anchor = ANCHOR.captures(title).map(|c| c[1].to_string());
    let title = ANCHOR.replace_all(title, "");
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    (title, anchor)
}

fn sentence_to_substep(sentence: &str, index: usize, anchor: Option<&str>) -> Option<SubStep> {
    let inline = ANCHOR.captures(sentence).map(|c| c[1].to_string());
    let cleaned = INLINE_TIME_STRIP.replace_all(sentence, "");
    let cleaned = cleaned.trim();
    if !cleaned.chars().any(char::is_alphanumeric) {
        return None;
    }

    let start_time = match (inline, index) {
        (Some(at), _) => Some(at),
        (None, 0) => anchor.map(str::to_string),
        (None, _) => None,
    };
    Some(SubStep {
        description: cleaned.to_string(),
        start_time,
        ..Default::default()
    })
}

#[derive(Default)]
struct StepDraft {
    heading: String,
    ingredients: Vec<String>,
    description: Vec<String>,
    timeline: Option<String>,
}

impl StepDraft {
    fn finish(self, step: u32) -> RecipeStep {
        let (title, anchor) = split_anchor(&self.heading);
        let anchor = anchor.or(self.timeline);

        let description = self.description.join(" ");
        let actions = split_sentences(&description)
            .iter()
            .enumerate()
            .filter_map(|(i, sentence)| sentence_to_substep(sentence, i, anchor.as_deref()))
            .collect();

        RecipeStep {
            step,
            title,
            start_time: anchor,
            actions,
            ingredients: self.ingredients,
            thumbnail_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NarrativeRecipe {
    /// First free-text line before any step, usually the dish name.
    pub heading: Option<String>,
    pub steps: Vec<RecipeStep>,
}

/// Folds the token stream into steps numbered by order of appearance.
pub fn parse_narrative(text: &str) -> NarrativeRecipe {
    let mut heading = None;
    let mut steps = Vec::new();
    let mut current: Option<StepDraft> = None;

    let lines: Vec<String> = text.lines().map(normalize_line).collect();
    for line in &lines {
        match classify(line) {
            Token::StepMarker { title } => {
                if let Some(draft) = current.take() {
                    steps.push(draft.finish(steps.len() as u32 + 1));
                }
                current = Some(StepDraft {
                    heading: title.to_string(),
                    ..Default::default()
                });
            }
            Token::Ingredients(rest) => {
                if let Some(draft) = current.as_mut() {
                    draft.ingredients.extend(split_ingredients(rest));
                }
            }
            Token::Description(rest) | Token::Text(rest) => match current.as_mut() {
                Some(draft) => {
                    if !rest.is_empty() {
                        draft.description.push(rest.to_string());
                    }
                }
                None => {
                    if heading.is_none() && !rest.is_empty() {
                        heading = Some(rest.to_string());
                    }
                }
            },
            Token::Timeline(rest) => {
                if let Some(draft) = current.as_mut() {
                    draft.timeline = TIMELINE_VALUE.captures(rest).map(|c| c[1].to_string());
                }
            }
            Token::Blank => {}
        }
    }
    if let Some(draft) = current.take() {
        steps.push(draft.finish(steps.len() as u32 + 1));
    }

    NarrativeRecipe { heading, steps }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_step_with_anchor_and_inline_times() {
        let text = "**1단계: 양파 썰기 (00:00:10)**\n* **재료:** 양파, 마늘\n* **설명:** 양파를 채썬다. 마늘을 다진다 (00:00:25).";
        let parsed = parse_narrative(text);

        assert_eq!(parsed.steps.len(), 1);
        let step = &parsed.steps[0];
        assert_eq!(step.step, 1);
        assert_eq!(step.title, "양파 썰기");
        assert_eq!(step.start_time.as_deref(), Some("00:00:10"));
        assert_eq!(step.ingredients, vec!["양파", "마늘"]);

        let actions: Vec<(&str, Option<&str>)> = step
            .actions
            .iter()
            .map(|a| (a.description.as_str(), a.start_time.as_deref()))
            .collect();
        assert_eq!(
            actions,
            vec![
                ("양파를 채썬다.", Some("00:00:10")),
                ("마늘을 다진다.", Some("00:00:25")),
            ]
        );
    }

    #[test]
    fn only_first_sentence_inherits_anchor() {
        let text = "1단계: 볶기 (00:01:00)\n- 설명: 기름을 두른다. 양파를 넣는다. 간장을 붓는다 (00:01:30).";
        let step = &parse_narrative(text).steps[0];
        let times: Vec<Option<&str>> = step
            .actions
            .iter()
            .map(|a| a.start_time.as_deref())
            .collect();
        assert_eq!(times, vec![Some("00:01:00"), None, Some("00:01:30")]);
    }

    #[test]
    fn steps_are_numbered_by_appearance() {
        let text = "3단계: 끓이기\n- 설명: 물을 끓인다.\n\n7단계: 담기\n- 설명: 그릇에 담는다.\n\n1단계: 장식\n- 설명: 파를 올린다.";
        let steps = parse_narrative(text).steps;
        let numbered: Vec<(u32, &str)> = steps
            .iter()
            .map(|s| (s.step, s.title.as_str()))
            .collect();
        assert_eq!(numbered, vec![(1, "끓이기"), (2, "담기"), (3, "장식")]);
    }

    #[test]
    fn step_without_description_is_kept() {
        let text = "1단계: 재료 준비 (00:00:05)\n- 재료: 두부\n2단계: 굽기\n- 설명: 노릇하게 굽는다.";
        let steps = parse_narrative(text).steps;
        assert_eq!(steps.len(), 2);
        assert!(steps[0].actions.is_empty());
        assert_eq!(steps[0].ingredients, vec!["두부"]);
    }

    #[test]
    fn timestamp_only_sentence_is_dropped() {
        let text = "1단계: 마무리\n- 설명: (00:03:00). 불을 끈다.";
        let step = &parse_narrative(text).steps[0];
        assert_eq!(step.actions.len(), 1);
        assert_eq!(step.actions[0].description, "불을 끈다.");
        // the dropped sentence was the first one, so nothing inherits the anchor
        assert_eq!(step.actions[0].start_time, None);
    }

    #[test]
    fn timeline_line_supplies_missing_anchor() {
        let text = "1단계: 재료 준비 및 손질\n- 재료: 파, 마늘, 피망\n- 설명: 파를 다진다. 피망은 선택입니다.\n- 시작 타임라인: 00:00:38";
        let step = &parse_narrative(text).steps[0];
        assert_eq!(step.start_time.as_deref(), Some("00:00:38"));
        assert_eq!(step.actions[0].start_time.as_deref(), Some("00:00:38"));
        assert_eq!(step.actions[1].start_time, None);
    }

    #[test]
    fn short_anchor_is_kept_verbatim() {
        let (title, anchor) = split_anchor("면 삶기 (03:15)");
        assert_eq!(title, "면 삶기");
        assert_eq!(anchor.as_deref(), Some("03:15"));
    }

    #[test]
    fn ratios_in_prose_are_not_timestamps() {
        let text = "1단계: 반죽 (00:02:00)\n- 설명: 물과 밀가루를 1:10 비율로 섞는다. 5:3으로 나눈다 (00:02:40).";
        let step = &parse_narrative(text).steps[0];
        let actions: Vec<(&str, Option<&str>)> = step
            .actions
            .iter()
            .map(|a| (a.description.as_str(), a.start_time.as_deref()))
            .collect();
        assert_eq!(
            actions,
            vec![
                ("물과 밀가루를 1:10 비율로 섞는다.", Some("00:02:00")),
                ("5:3으로 나눈다.", Some("00:02:40")),
            ]
        );
    }

    #[test]
    fn heading_before_steps_is_captured() {
        let text = "## 김치볶음밥\n\n1단계: 볶기\n- 설명: 김치를 볶는다.";
        assert_eq!(parse_narrative(text).heading.as_deref(), Some("김치볶음밥"));
    }

    #[test]
    fn decimal_numbers_are_not_sentence_boundaries() {
        assert_eq!(
            split_sentences("설탕 0.5kg을 넣는다. 섞는다."),
            vec!["설탕 0.5kg을 넣는다.", "섞는다."]
        );
    }

    #[test]
    fn abbreviations_are_split_as_a_known_approximation() {
        assert_eq!(
            split_sentences("Dr. Kim이 알려준 방법이다."),
            vec!["Dr.", "Kim이 알려준 방법이다."]
        );
    }

    #[test]
    fn classify_recognizes_line_kinds() {
        assert_eq!(
            classify("2단계: 소스 만들기"),
            Token::StepMarker { title: "소스 만들기" }
        );
        assert_eq!(classify("재료: 간장"), Token::Ingredients("간장"));
        assert_eq!(classify("설명: 섞는다."), Token::Description("섞는다."));
        assert_eq!(classify("시작 타임라인: 00:02:00"), Token::Timeline("00:02:00"));
        assert_eq!(classify("2단계에서 만든 소스"), Token::Text("2단계에서 만든 소스"));
        assert_eq!(classify(""), Token::Blank);
    }
}
