//! Instruction document sent to the generative model.
//!
//! The wording is a contract with [`crate::parser`]: the step marker format
//! (`N단계: 제목`, `- 재료:`, `- 설명:`, `- 시작 타임라인:`) in the example and
//! the JSON field names below are exactly what the parser looks for.

use serde::Serialize;

use crate::{combine::CombinedTranscript, types::VideoSource};

const PREAMBLE: &str = "다음은 OCR, Whisper, 자막 텍스트를 통합한 데이터입니다. 영상이 존재할 경우 반드시 참고하여 단계별 조리 요약을 작성하세요.";

const ROLE: &str = "당신은 요리 분석 전문가입니다.

다음 텍스트는 하나의 요리 유튜브 영상에서 추출된 자막, OCR, Whisper 텍스트를 통합한 것입니다.";

const RULES: &str = r#"요약 규칙:
1. 단계별로 "1단계", "2단계"로 번호를 붙여 정리하고, 각 단계는 여러 '세부 조리 동작'으로 구성될 수 있습니다.
2. 각 세부 조리 동작은 다음 정보를 포함합니다:
   - 조리 동작 이름
   - 사용된 재료 목록 (있는 경우)
   - 조리 과정 설명
   - 시작 타임라인 (**시:분:초 단위로 해당 동작이 영상에서 처음 시작되는 시점을 정확히 기입**)
3. 중복되는 표현은 간결하게 통합하며, 블로그 스타일처럼 자연스럽고 구체적으로 작성해주세요.
4. 반드시 유튜브 영상 내용을 우선적으로 참고해주세요.

※ 타임라인은 가능한 한 시각적으로 동작이 시작되는 순간 또는 조리 동작이 언어로 언급되는 순간을 기준으로 가장 먼저 등장한 시점을 사용하세요."#;

const TIMELINE_EXAMPLE: &str = "--- 타임라인 예시 ---

1단계: 재료 준비 및 손질
- 재료: 파, 마늘, 피망
- 설명: 파 흰대 반 개와 마늘 반 큰술을 다져 준비합니다. 피망은 색감을 위해 선택적으로 사용합니다.
- 시작 타임라인: 00:00:38";

const OUTPUT_FORMAT: &str = r#"--- 출력 형식 ---

위 예시의 단계 구성을 아래 JSON 구조로 작성하세요. JSON 외의 다른 텍스트는 출력하지 마세요.
{
  "title": "레시피 제목",
  "description": "레시피 한 줄 설명",
  "category_name": "한식/중식/양식/일식/디저트/기타 중 하나",
  "ingredients": [{"name": "재료명", "quantity": "양", "unit": "단위"}],
  "instructions": [
    {
      "step": 1,
      "title": "단계 제목",
      "start_time": "00:00:38",
      "ingredients": ["파", "마늘"],
      "actions": [
        {
          "action": "조리 동작 이름",
          "description": "조리 과정 설명",
          "ingredients": [{"name": "재료명", "quantity": "양"}],
          "start_time": "00:00:38"
        }
      ]
    }
  ],
  "prep_time": 10,
  "cook_time": 20,
  "servings": 2,
  "difficulty_level": "easy/medium/hard",
  "tags": ["태그"],
  "nutrition_info": {"calories": "", "carbs": "", "protein": "", "fat": ""}
}
prep_time과 cook_time은 분 단위 숫자입니다. 모든 start_time은 HH:MM:SS 형식입니다."#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptDocument {
    text: String,
}

impl PromptDocument {
    pub fn new(text: String) -> Self {
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

pub fn build_prompt(source: &VideoSource, combined: &CombinedTranscript) -> PromptDocument {
    let mut text = String::new();
    text.push_str(PREAMBLE);
    text.push_str("\n\n");
    text.push_str(ROLE);
    text.push_str("\n이 영상의 주소는 다음과 같습니다:\n\n");
    text.push_str(&format!("🔗 영상 링크: {}\n", source.url));
    if let Some(title) = &source.title {
        text.push_str(&format!("🎬 영상 제목: {}\n", title));
    }
    text.push_str("\n이 영상의 실제 내용을 반드시 함께 참고하여\n아래 텍스트의 내용을 조리 단계로 정리해주세요.\n\n");
    text.push_str(RULES);
    text.push_str("\n\n");
    text.push_str(TIMELINE_EXAMPLE);
    text.push_str("\n\n");
    text.push_str(OUTPUT_FORMAT);
    text.push_str("\n\n--- 아래는 통합된 원문 텍스트입니다 ---\n-------------------------------\n");
    text.push_str(&combined.render());
    PromptDocument::new(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::combine;

    fn source(title: Option<&str>) -> VideoSource {
        VideoSource {
            video_id: "abc123xyz".into(),
            url: "https://www.youtube.com/watch?v=abc123xyz".into(),
            title: title.map(str::to_string),
            channel: None,
        }
    }

    #[test]
    fn prompt_carries_url_rules_and_all_sections() {
        let combined = combine(Some("[00:00:02] 양파"), None, Some("[00:00:03] 썰어요"));
        let prompt = build_prompt(&source(Some("초간단 볶음밥")), &combined);
        let text = prompt.as_str();

        assert!(text.starts_with(PREAMBLE));
        assert!(text.contains("🔗 영상 링크: https://www.youtube.com/watch?v=abc123xyz"));
        assert!(text.contains("🎬 영상 제목: 초간단 볶음밥"));
        assert!(text.contains("\"1단계\", \"2단계\""));
        assert!(text.contains("1단계: 재료 준비 및 손질"));
        assert!(text.contains("- 시작 타임라인: 00:00:38"));
        assert!(text.contains("\"start_time\""));
        assert!(text.ends_with(&combined.render()));
    }

    #[test]
    fn prompt_is_deterministic() {
        let combined = combine(None, Some("자막"), None);
        assert_eq!(
            build_prompt(&source(None), &combined),
            build_prompt(&source(None), &combined)
        );
        assert!(!build_prompt(&source(None), &combined).as_str().contains("영상 제목"));
    }
}
