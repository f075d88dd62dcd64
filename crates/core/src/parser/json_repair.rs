use std::sync::LazyLock;

use regex::Regex;

static FENCED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").unwrap());
static OPEN_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z]*[ \t]*\r?\n?").unwrap());
static BARE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([{,]\s*)([A-Za-z0-9_]+)\s*:").unwrap());
static NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n\s*").unwrap());
static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Content of the first markdown code fence, or the input without a dangling
/// opening fence when the response was cut off before the closing one.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(caps) = FENCED.captures(trimmed) {
        return caps[1].trim().to_string();
    }
    OPEN_FENCE.replace(trimmed, "").trim().to_string()
}

/// Slice from the first `{` to the last `}`, dropping prose around an object.
pub fn json_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Best-effort fix-up of almost-JSON.
///
/// Quotes bare object keys, turns single quotes into double quotes, folds
/// newlines into spaces and drops trailing commas. Applied at most once.
pub fn repair_json(text: &str) -> String {
    let text = strip_code_fences(text);
    let text = BARE_KEY.replace_all(&text, r#"${1}"${2}":"#);
    let text = text.replace('\'', "\"");
    let text = NEWLINES.replace_all(&text, " ");
    TRAILING_COMMA.replace_all(&text, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_keys_and_trailing_commas_are_fixed() {
        assert_eq!(
            repair_json(r#"{title: "Test", tags: ["a","b",]}"#),
            r#"{"title": "Test", "tags": ["a","b"]}"#
        );
    }

    #[test]
    fn single_quotes_and_newlines_are_normalized() {
        let repaired = repair_json("```json\n{'title': '국수',\n  'servings': 2,\n}\n```");
        assert_eq!(repaired, r#"{"title": "국수", "servings": 2}"#);
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("앞말\n```\n{}\n```\n뒷말"), "{}");
        assert_eq!(strip_code_fences("```json\n{\"a\": 1"), "{\"a\": 1");
        assert_eq!(strip_code_fences("plain"), "plain");
    }

    #[test]
    fn slice_drops_surrounding_prose() {
        assert_eq!(
            json_slice("Here you go: {\"a\": {\"b\": 1}} enjoy"),
            Some("{\"a\": {\"b\": 1}}")
        );
        assert_eq!(json_slice("no object"), None);
    }
}
