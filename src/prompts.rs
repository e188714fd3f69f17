//! Instruction text sent with every conversion request.
//!
//! All prompt wording lives here so it can change without touching the
//! client. Callers can replace the system instruction wholesale via
//! [`crate::config::ConverterConfig::system_prompt`]; the per-format and
//! option-driven directives below are used only when no override is set.

use crate::format::{ConversionOptions, TargetFormat};

/// Format-specific rule, one block per target format.
pub fn format_instructions(format: TargetFormat) -> String {
    match format {
        TargetFormat::Rtf => "Output a complete, valid RTF 1.5 document string. Include correct control words for bold, italic, and tables.".to_string(),
        TargetFormat::Docx => "Create a sophisticated HTML5 wrapper optimized for Word compatibility. Use inline CSS for layout preservation.".to_string(),
        TargetFormat::Pdf => "Construct a professional print-ready HTML5 document designed for high-quality A4 PDF export.".to_string(),
        TargetFormat::Html => "Produce a clean, accessible HTML5 structure using semantic tags.".to_string(),
        TargetFormat::Json => "Extract and map document sections to a clean JSON schema.".to_string(),
        TargetFormat::Csv => "Identify tabular data and generate a standard CSV output with headers.".to_string(),
        TargetFormat::Markdown | TargetFormat::Text => format!(
            "Return the output strictly as valid {}.",
            format.as_str().to_uppercase()
        ),
    }
}

/// Summarisation directive.
pub fn mission_directive(options: &ConversionOptions) -> &'static str {
    if options.summarize {
        "MISSION: Generate a concise executive summary."
    } else {
        "MISSION: Convert full content."
    }
}

/// Translation directive, or `None` when the language is left alone.
pub fn translation_directive(options: &ConversionOptions) -> Option<String> {
    if options.translate_to.is_original() {
        None
    } else {
        Some(format!(
            "TRANSLATION: Output language: {}.",
            options.translate_to.name()
        ))
    }
}

/// Build the full system instruction for one attempt.
pub fn system_instruction(format: TargetFormat, options: &ConversionOptions) -> String {
    let mut rules = vec![
        format_instructions(format),
        "Maintain layout and emphasis.".to_string(),
        mission_directive(options).to_string(),
    ];
    if let Some(translation) = translation_directive(options) {
        rules.push(translation);
    }

    let mut out = String::from("You are an Ultra-Fast Document Processing Engine.\n");
    out.push_str(&format!(
        "Task: Convert to {}.\n\nRules:\n",
        format.as_str().to_uppercase()
    ));
    for (i, rule) in rules.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, rule));
    }
    out.push_str(
        "\nReturn ONLY the document content. No chat, no markdown fences (except for Markdown format).",
    );
    out
}

/// The user-turn text that accompanies the inline file.
pub fn user_prompt(format: TargetFormat) -> String {
    format!(
        "Convert this file. Format: {}. Speed and structure are priority.",
        format.as_str()
    )
}
