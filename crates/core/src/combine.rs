//! Merges the three text sources into one labelled document.

use serde::Serialize;

pub const OCR_LABEL: &str = "OCR 텍스트";
pub const CAPTION_LABEL: &str = "자막 텍스트";
pub const SPEECH_LABEL: &str = "Whisper 텍스트";
pub const ABSENT_MARKER: &str = "(없음)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub label: &'static str,
    pub content: Option<String>,
}

/// Always exactly three sections, in OCR, caption, speech order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedTranscript {
    sections: [Section; 3],
}

fn present(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub fn combine(
    ocr: Option<&str>,
    captions: Option<&str>,
    speech: Option<&str>,
) -> CombinedTranscript {
    CombinedTranscript {
        sections: [
            Section {
                label: OCR_LABEL,
                content: present(ocr),
            },
            Section {
                label: CAPTION_LABEL,
                content: present(captions),
            },
            Section {
                label: SPEECH_LABEL,
                content: present(speech),
            },
        ],
    }
}

impl CombinedTranscript {
    pub fn sections(&self) -> &[Section; 3] {
        &self.sections
    }

    pub fn present_count(&self) -> usize {
        self.sections.iter().filter(|s| s.content.is_some()).count()
    }

    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(|s| {
                format!(
                    "[{}]\n{}\n",
                    s.label,
                    s.content.as_deref().unwrap_or(ABSENT_MARKER)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_positions(doc: &str) -> Vec<usize> {
        [OCR_LABEL, CAPTION_LABEL, SPEECH_LABEL]
            .iter()
            .map(|label| {
                let needle = format!("[{label}]");
                assert_eq!(doc.matches(&needle).count(), 1, "{label} in {doc}");
                doc.find(&needle).unwrap()
            })
            .collect()
    }

    #[test]
    fn every_combination_has_three_ordered_sections() {
        for mask in 0..8u8 {
            let ocr = (mask & 1 != 0).then_some("[00:00:02] 양파");
            let captions = (mask & 2 != 0).then_some("[00:00:01] 안녕하세요");
            let speech = (mask & 4 != 0).then_some("[00:00:03] 썰어 주세요");

            let combined = combine(ocr, captions, speech);
            let doc = combined.render();
            let positions = label_positions(&doc);
            assert!(positions.windows(2).all(|w| w[0] < w[1]), "mask {mask}");

            assert_eq!(combined.present_count(), mask.count_ones() as usize);
            assert_eq!(
                doc.matches(ABSENT_MARKER).count(),
                3 - mask.count_ones() as usize
            );
        }
    }

    #[test]
    fn blank_sources_count_as_absent() {
        let doc = combine(Some("  \n"), None, Some("말")).render();
        assert_eq!(
            doc,
            "[OCR 텍스트]\n(없음)\n\n[자막 텍스트]\n(없음)\n\n[Whisper 텍스트]\n말\n"
        );
    }
}
