//! Target formats, the format registry, and per-attempt conversion options.
//!
//! The registry maps each [`TargetFormat`] to the MIME type and file extension
//! used when the result is saved. "PDF" is print-ready HTML here: the crate
//! never produces PDF bytes, so `pdf` maps to `text/html` / `html` and the
//! user prints it to PDF. `docx` is likewise Word-compatible HTML saved under
//! the Word MIME type, which Word opens directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MIME type for anything the registry does not know.
pub const FALLBACK_MIME: &str = "text/plain";

/// Extension for anything the registry does not know.
pub const FALLBACK_EXTENSION: &str = "txt";

/// The closed set of output representations a user can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Markdown,
    Json,
    Csv,
    Text,
    Html,
    #[default]
    Docx,
    Rtf,
    Pdf,
}

impl TargetFormat {
    /// Every format, in the order the picker shows them.
    pub const ALL: [TargetFormat; 8] = [
        TargetFormat::Docx,
        TargetFormat::Pdf,
        TargetFormat::Rtf,
        TargetFormat::Html,
        TargetFormat::Markdown,
        TargetFormat::Json,
        TargetFormat::Csv,
        TargetFormat::Text,
    ];

    /// Wire identifier, e.g. `"markdown"`.
    pub fn as_str(self) -> &'static str {
        match self {
            TargetFormat::Markdown => "markdown",
            TargetFormat::Json => "json",
            TargetFormat::Csv => "csv",
            TargetFormat::Text => "text",
            TargetFormat::Html => "html",
            TargetFormat::Docx => "docx",
            TargetFormat::Rtf => "rtf",
            TargetFormat::Pdf => "pdf",
        }
    }

    /// MIME type of the downloadable artifact.
    pub fn mime_type(self) -> &'static str {
        match self {
            TargetFormat::Markdown => "text/markdown",
            TargetFormat::Json => "application/json",
            TargetFormat::Csv => "text/csv",
            TargetFormat::Text => FALLBACK_MIME,
            TargetFormat::Html => "text/html",
            TargetFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            TargetFormat::Rtf => "application/rtf",
            TargetFormat::Pdf => "text/html",
        }
    }

    /// File extension (without the dot) of the downloadable artifact.
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Markdown => "md",
            TargetFormat::Json => "json",
            TargetFormat::Csv => "csv",
            TargetFormat::Text => FALLBACK_EXTENSION,
            TargetFormat::Html => "html",
            TargetFormat::Docx => "docx",
            TargetFormat::Rtf => "rtf",
            TargetFormat::Pdf => "html",
        }
    }

    /// Short human label used by the CLI.
    pub fn label(self) -> &'static str {
        match self {
            TargetFormat::Markdown => "Markdown",
            TargetFormat::Json => "JSON Data",
            TargetFormat::Csv => "CSV Table",
            TargetFormat::Text => "Plain Text",
            TargetFormat::Html => "Web Page",
            TargetFormat::Docx => "Word Pro",
            TargetFormat::Rtf => "Rich Text",
            TargetFormat::Pdf => "Print PDF",
        }
    }

    /// Whether the result is HTML markup meant to be rendered or printed.
    pub fn is_markup(self) -> bool {
        matches!(
            self,
            TargetFormat::Html | TargetFormat::Pdf | TargetFormat::Docx
        )
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(TargetFormat::Markdown),
            "json" => Ok(TargetFormat::Json),
            "csv" => Ok(TargetFormat::Csv),
            "text" | "txt" => Ok(TargetFormat::Text),
            "html" | "htm" => Ok(TargetFormat::Html),
            "docx" | "word" => Ok(TargetFormat::Docx),
            "rtf" => Ok(TargetFormat::Rtf),
            "pdf" => Ok(TargetFormat::Pdf),
            other => Err(format!(
                "unknown format '{other}' (expected one of: markdown, json, csv, text, html, docx, rtf, pdf)"
            )),
        }
    }
}

/// Registry lookup by identifier: `(mime_type, extension)`.
///
/// Unknown identifiers fall back to `text/plain` / `txt`.
pub fn lookup(identifier: &str) -> (&'static str, &'static str) {
    match identifier.parse::<TargetFormat>() {
        Ok(format) => (format.mime_type(), format.extension()),
        Err(_) => (FALLBACK_MIME, FALLBACK_EXTENSION),
    }
}

/// Output language for translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    /// Keep the document's own language.
    #[default]
    Original,
    Indonesian,
    English,
    Japanese,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Original,
        Language::Indonesian,
        Language::English,
        Language::Japanese,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Language::Original => "original",
            Language::Indonesian => "Indonesian",
            Language::English => "English",
            Language::Japanese => "Japanese",
        }
    }

    pub fn is_original(self) -> bool {
        self == Language::Original
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Language::ALL
            .into_iter()
            .find(|lang| lang.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!(
                    "unsupported language '{wanted}' (expected original, Indonesian, English or Japanese)"
                )
            })
    }
}

/// Processing options chosen for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOptions {
    /// Produce an executive summary instead of the full content.
    pub summarize: bool,
    /// Translate the output; `Original` leaves the language alone.
    pub translate_to: Language,
    /// Use the slower, deeper processing tier.
    pub high_precision: bool,
}

impl ConversionOptions {
    pub fn summarize(mut self, v: bool) -> Self {
        self.summarize = v;
        self
    }

    pub fn translate_to(mut self, lang: Language) -> Self {
        self.translate_to = lang;
        self
    }

    pub fn high_precision(mut self, v: bool) -> Self {
        self.high_precision = v;
        self
    }
}

/// A single option toggle, as dispatched by a presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionChange {
    Summarize(bool),
    TranslateTo(Language),
    HighPrecision(bool),
}

impl ConversionOptions {
    /// Apply one toggle.
    pub fn apply(&mut self, change: OptionChange) {
        match change {
            OptionChange::Summarize(v) => self.summarize = v,
            OptionChange::TranslateTo(lang) => self.translate_to = lang,
            OptionChange::HighPrecision(v) => self.high_precision = v,
        }
    }
}
