//! Optional structural checks on the model's output.
//!
//! By default the model's text is handed back untouched. With
//! [`PostProcess::Validate`] each structured format gets one cheap check
//! before the attempt may succeed:
//!
//! | Format | Check |
//! |--------|-------|
//! | json | parses with `serde_json` (a single wrapping code fence is tolerated) |
//! | csv | every record has the same, non-zero number of fields |
//! | rtf | starts with `{\rtf` |
//! | html / pdf / docx | contains at least one HTML element |
//! | markdown / text | always passes |
//!
//! Nothing is repaired. A failed check surfaces as
//! [`ConvertError::InvalidOutput`].

use crate::config::PostProcess;
use crate::error::ConvertError;
use crate::format::TargetFormat;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\n(.*)\n```\s*$").unwrap());

static RE_HTML_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)<\s*(!doctype|html|head|body|div|p|h[1-6]|table|section|article|main|span|ul|ol|pre)\b",
    )
    .unwrap()
});

/// Apply the configured post-processing to `text` for `format`.
///
/// Returns the text unchanged on success.
pub fn apply(mode: PostProcess, format: TargetFormat, text: String) -> Result<String, ConvertError> {
    match mode {
        PostProcess::None => Ok(text),
        PostProcess::Validate => {
            validate(format, &text).map_err(|detail| ConvertError::InvalidOutput { format, detail })?;
            Ok(text)
        }
    }
}

/// Check `text` against the expectations for `format`.
pub fn validate(format: TargetFormat, text: &str) -> Result<(), String> {
    match format {
        TargetFormat::Json => validate_json(text),
        TargetFormat::Csv => validate_csv(text),
        TargetFormat::Rtf => validate_rtf(text),
        TargetFormat::Html | TargetFormat::Pdf | TargetFormat::Docx => validate_markup(text),
        TargetFormat::Markdown | TargetFormat::Text => Ok(()),
    }
}

/// Strip a single code fence wrapping the whole text, if present.
pub fn unwrap_fence(text: &str) -> &str {
    match RE_OUTER_FENCE.captures(text.trim()) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(text),
        None => text,
    }
}

fn validate_json(text: &str) -> Result<(), String> {
    serde_json::from_str::<serde_json::Value>(unwrap_fence(text))
        .map(|_| ())
        .map_err(|e| format!("not valid JSON: {e}"))
}

fn validate_rtf(text: &str) -> Result<(), String> {
    if text.trim_start().starts_with("{\\rtf") {
        Ok(())
    } else {
        Err("missing {\\rtf header".to_string())
    }
}

fn validate_markup(text: &str) -> Result<(), String> {
    if RE_HTML_ELEMENT.is_match(text) {
        Ok(())
    } else {
        Err("no HTML elements found".to_string())
    }
}

/// Count fields per record, honouring double-quoted fields (which may span lines).
fn csv_field_counts(text: &str) -> Result<Vec<usize>, String> {
    let mut counts = Vec::new();
    let mut in_quotes = false;
    let mut fields = 1;
    let mut record_has_content = false;

    for ch in text.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                record_has_content = true;
            }
            ',' if !in_quotes => {
                fields += 1;
                record_has_content = true;
            }
            '\n' if !in_quotes => {
                if record_has_content {
                    counts.push(fields);
                }
                fields = 1;
                record_has_content = false;
            }
            '\r' if !in_quotes => {}
            c if !c.is_whitespace() => record_has_content = true,
            _ => {}
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    if record_has_content {
        counts.push(fields);
    }
    Ok(counts)
}

fn validate_csv(text: &str) -> Result<(), String> {
    let counts = csv_field_counts(text)?;
    let Some(&header) = counts.first() else {
        return Err("no records".to_string());
    };
    match counts.iter().position(|&c| c != header) {
        None => Ok(()),
        Some(i) => Err(format!(
            "record {} has {} fields, header has {}",
            i + 1,
            counts[i],
            header
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_passes_text_through_untouched() {
        let out = apply(PostProcess::None, TargetFormat::Json, "not json".into()).unwrap();
        assert_eq!(out, "not json");
    }

    #[test]
    fn json_accepts_fenced_object() {
        let text = "```json\n{\"title\": \"Hello\"}\n```";
        assert!(validate(TargetFormat::Json, text).is_ok());
        let out = apply(PostProcess::Validate, TargetFormat::Json, text.to_string()).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn json_rejects_garbage() {
        let err = apply(PostProcess::Validate, TargetFormat::Json, "{ nope".into()).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::InvalidOutput {
                format: TargetFormat::Json,
                ..
            }
        ));
    }

    #[test]
    fn csv_with_quoted_commas_and_newlines() {
        let text = "name,notes\n\"Doe, Jane\",\"line one\nline two\"\nBob,ok\n";
        assert!(validate(TargetFormat::Csv, text).is_ok());
    }

    #[test]
    fn csv_ragged_rows_fail() {
        let err = validate(TargetFormat::Csv, "a,b,c\n1,2\n").unwrap_err();
        assert!(err.contains("record 2"), "got: {err}");
    }

    #[test]
    fn csv_unterminated_quote_fails() {
        assert!(validate(TargetFormat::Csv, "a,b\n\"x,1\n").is_err());
    }

    #[test]
    fn csv_empty_fails() {
        assert!(validate(TargetFormat::Csv, "\n\n").is_err());
    }

    #[test]
    fn rtf_header_required() {
        assert!(validate(TargetFormat::Rtf, "{\\rtf1\\ansi Hello}").is_ok());
        assert!(validate(TargetFormat::Rtf, "Hello").is_err());
    }

    #[test]
    fn markup_formats_need_an_element() {
        for format in [TargetFormat::Html, TargetFormat::Pdf, TargetFormat::Docx] {
            assert!(validate(format, "<!DOCTYPE html><html><body>x</body></html>").is_ok());
            assert!(validate(format, "just words").is_err());
        }
    }

    #[test]
    fn free_text_formats_always_pass() {
        assert!(validate(TargetFormat::Markdown, "").is_ok());
        assert!(validate(TargetFormat::Text, "{ whatever").is_ok());
    }

    #[test]
    fn unwrap_fence_leaves_unfenced_text() {
        assert_eq!(unwrap_fence("plain"), "plain");
        assert_eq!(unwrap_fence("```\n[1,2]\n```\n"), "[1,2]");
    }
}
