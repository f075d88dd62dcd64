//! WebVTT / SRT caption parsing.

use std::{path::Path, sync::LazyLock};

use regex::Regex;
use tracing::debug;

use crate::{error::Result, format::format_timestamp};

static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>|\{\\[^}]*\}").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionLine {
    pub timestamp: String,
    pub text: String,
}

/// Seconds from a cue time such as `00:01:02.500`, `01:02.500` or `00:01:02,500`.
fn parse_cue_time(raw: &str) -> Option<f64> {
    let raw = raw.trim().split_whitespace().next()?;
    let parts: Vec<&str> = raw.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (h.parse::<f64>().ok()?, m.parse::<f64>().ok()?, *s),
        [m, s] => (0.0, m.parse::<f64>().ok()?, *s),
        _ => return None,
    };
    let s = s.replace(',', ".").parse::<f64>().ok()?;
    Some(h * 3600.0 + m * 60.0 + s)
}

fn clean_text(line: &str) -> String {
    let text = TAGS.replace_all(line, "");
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .trim()
        .to_string()
}

/// Extracts cue text with its start time.
///
/// Header, `NOTE`/`STYLE`/`REGION` blocks and cue numbers are dropped. A line
/// identical to the one just emitted is dropped too, which collapses the
/// rolling repeats of auto-generated captions.
pub fn parse_captions(raw: &str) -> Vec<CaptionLine> {
    let normalized = raw.replace("\r\n", "\n").replace('\u{feff}', "");
    let mut lines = Vec::new();
    let mut last_text: Option<String> = None;

    for block in normalized.split("\n\n") {
        let block_lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
        let Some(first) = block_lines.first() else {
            continue;
        };
        let first = first.trim_start();
        if ["WEBVTT", "NOTE", "STYLE", "REGION"]
            .iter()
            .any(|kw| first.starts_with(kw))
        {
            continue;
        }

        let Some(timing_at) = block_lines.iter().position(|l| l.contains("-->")) else {
            continue;
        };
        let Some(start) = block_lines[timing_at]
            .split("-->")
            .next()
            .and_then(parse_cue_time)
        else {
            continue;
        };
        let timestamp = format_timestamp(start);

        for line in &block_lines[timing_at + 1..] {
            let text = clean_text(line);
            if text.is_empty() || last_text.as_deref() == Some(text.as_str()) {
                continue;
            }
            last_text = Some(text.clone());
            lines.push(CaptionLine {
                timestamp: timestamp.clone(),
                text,
            });
        }
    }

    lines
}

pub fn render_captions(lines: &[CaptionLine]) -> String {
    lines
        .iter()
        .map(|l| format!("[{}] {}", l.timestamp, l.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads and renders a caption file. `None` when it holds no cue text.
pub async fn load_captions(path: &Path) -> Result<Option<String>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let lines = parse_captions(&raw);
    debug!(path = %path.display(), cues = lines.len(), "captions parsed");
    if lines.is_empty() {
        return Ok(None);
    }
    Ok(Some(render_captions(&lines)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VTT: &str = "WEBVTT\nKind: captions\nLanguage: ko\n\nNOTE generated\n\n00:00:01.000 --> 00:00:03.000 align:start position:0%\n<c>안녕하세요</c>\n\n00:00:03.000 --> 00:00:05.500\n안녕하세요\n오늘은 <00:00:04.000><c>김치찌개</c>\n\n01:05.000 --> 01:07.000\n&amp; 마무리\n";

    #[test]
    fn vtt_cues_keep_start_times_and_drop_rolling_repeats() {
        let lines = parse_captions(VTT);
        assert_eq!(
            render_captions(&lines),
            "[00:00:01] 안녕하세요\n[00:00:03] 오늘은 김치찌개\n[00:01:05] & 마무리"
        );
    }

    #[test]
    fn srt_cue_numbers_are_ignored() {
        let srt = "1\r\n00:00:02,000 --> 00:00:04,000\r\n물을 끓인다\r\n\r\n2\r\n00:01:10,250 --> 00:01:12,000\r\n면을 넣는다\r\n";
        let lines = parse_captions(srt);
        assert_eq!(
            lines,
            vec![
                CaptionLine {
                    timestamp: "00:00:02".into(),
                    text: "물을 끓인다".into()
                },
                CaptionLine {
                    timestamp: "00:01:10".into(),
                    text: "면을 넣는다".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn header_only_file_has_no_captions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.vtt");
        tokio::fs::write(&path, "WEBVTT\n\n").await.unwrap();
        assert!(load_captions(&path).await.unwrap().is_none());
    }
}
