//! CLI binary for omniconvert.
//!
//! A thin shim over the library: maps flags to `ConverterConfig` and the
//! session's choices, runs one attempt (plus any retries the user asked
//! for), and writes, prints or copies the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use omniconvert::{
    build_client, output, ConversionProgressCallback, ConversionReport, ConverterConfig, Failure,
    FailureKind, Language, OptionChange, PostProcess, ProcessingTier, ProgressCallback, Session,
    SourceFile, Status, TargetFormat,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: one spinner per attempt, replaced by a
/// ✓/✗ line when the attempt settles.
struct CliProgressCallback {
    bar: Mutex<Option<ProgressBar>>,
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
            started: Mutex::new(None),
        })
    }

    fn take_bar(&self) -> (Option<ProgressBar>, f64) {
        let bar = self.bar.lock().ok().and_then(|mut b| b.take());
        let secs = self
            .started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (bar, secs)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_attempt_start(
        &self,
        attempt: u64,
        file_name: &str,
        format: TargetFormat,
        tier: ProcessingTier,
    ) {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix(if attempt > 1 { "Retrying" } else { "Converting" });
        bar.set_message(format!("{file_name} → {} ({tier} mode)", format.label()));
        bar.enable_steady_tick(Duration::from_millis(80));

        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
        if let Ok(mut t) = self.started.lock() {
            *t = Some(Instant::now());
        }
    }

    fn on_payload_encoded(&self, _attempt: u64, encoded_len: usize) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(ref bar) = *slot {
                bar.set_message(format!(
                    "waiting for the model  {}",
                    dim(&format!("{} KB sent", encoded_len / 1024))
                ));
            }
        }
    }

    fn on_attempt_success(&self, _attempt: u64, result_len: usize) {
        let (bar, secs) = self.take_bar();
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        eprintln!(
            "{} Converted  {}  {}",
            green("✔"),
            dim(&format!("{result_len} chars")),
            dim(&format!("{secs:.1}s")),
        );
    }

    fn on_attempt_error(&self, _attempt: u64, failure: &Failure) {
        let (bar, secs) = self.take_bar();
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        eprintln!(
            "{} {}  {}",
            red("✘"),
            red(&failure.message),
            dim(&format!("{secs:.1}s")),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Word-compatible document next to the source (default format: docx)
  omniconvert report.pdf

  # Markdown summary, translated, written to ./out
  omniconvert scan.png --format markdown --summarize --translate english -o out

  # High precision (deep model with a thinking budget), copy to stdout
  omniconvert contract.docx --format json --precision --stdout

  # Print-ready page in addition to the artifact
  omniconvert notes.txt --format html --print

  # Structured report, retry once if the service fails
  omniconvert slides.pdf --format csv --json --retry 1

FORMATS:
  markdown  json  csv  text  html  docx  rtf  pdf
  (docx and pdf produce HTML meant to be opened in Word or printed to PDF)

TIERS:
  fast (default)   gemini-3-flash-preview   thinking budget 0
  deep --precision gemini-3-pro-preview     thinking budget 2000

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (API_KEY also accepted)
  OMNICONVERT_PROVIDER    Use another provider via edgequake-llm (openai, anthropic, ollama, ...)
  OMNICONVERT_FORMAT      Default target format
  RUST_LOG                Override log filtering

LIMITS:
  Files larger than 15 MB are rejected before anything is sent (--max-size-mb).
"#;

/// Convert documents with a generative model.
#[derive(Parser, Debug)]
#[command(
    name = "omniconvert",
    version,
    about = "Convert documents to Markdown, JSON, CSV, HTML, Word, RTF or print-ready HTML",
    long_about = "Convert PDF, Word, text and image files into another document format by \
handing the file to a multimodal generative model. Uses Google Gemini natively, or any \
provider supported by edgequake-llm.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// File to convert.
    input: PathBuf,

    /// Target format: markdown, json, csv, text, html, docx, rtf, pdf.
    #[arg(short, long, env = "OMNICONVERT_FORMAT", default_value = "docx")]
    format: TargetFormat,

    /// Produce an executive summary instead of a full conversion.
    #[arg(long, env = "OMNICONVERT_SUMMARIZE")]
    summarize: bool,

    /// Translate the output: original, indonesian, english, japanese.
    #[arg(long, env = "OMNICONVERT_TRANSLATE", default_value = "original")]
    translate: Language,

    /// High precision: deep model with a thinking budget (slower).
    #[arg(long, env = "OMNICONVERT_PRECISION")]
    precision: bool,

    /// Directory for the converted file. Default: the source's directory.
    #[arg(short, long, env = "OMNICONVERT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Write the result to stdout instead of a file.
    #[arg(long)]
    stdout: bool,

    /// Also write a print-ready `<name>_print.html`.
    #[arg(long)]
    print: bool,

    /// Print a JSON report of the conversion.
    #[arg(long, env = "OMNICONVERT_JSON")]
    json: bool,

    /// Check structured output (JSON parses, CSV is rectangular, ...) before accepting it.
    #[arg(long, env = "OMNICONVERT_VALIDATE")]
    validate: bool,

    /// Provider: gemini (default), or any edgequake-llm provider name.
    #[arg(long, env = "OMNICONVERT_PROVIDER")]
    provider: Option<String>,

    /// Model used in fast mode.
    #[arg(long, env = "OMNICONVERT_MODEL_FAST")]
    model_fast: Option<String>,

    /// Model used in precision mode.
    #[arg(long, env = "OMNICONVERT_MODEL_DEEP")]
    model_deep: Option<String>,

    /// Gemini API key. Default: GEMINI_API_KEY, then API_KEY.
    #[arg(long)]
    api_key: Option<String>,

    /// Reject files larger than this many megabytes.
    #[arg(long, env = "OMNICONVERT_MAX_SIZE_MB", default_value_t = 15,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_size_mb: u64,

    /// Per-request timeout in seconds. Default: none.
    #[arg(long, env = "OMNICONVERT_TIMEOUT")]
    timeout: Option<u64>,

    /// Path to a text file containing a custom system instruction.
    #[arg(long, env = "OMNICONVERT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Re-issue the identical attempt up to N times if it fails.
    #[arg(long, default_value_t = 0)]
    retry: u32,

    /// Disable the spinner.
    #[arg(long, env = "OMNICONVERT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OMNICONVERT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OMNICONVERT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs out
    // of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config + client ────────────────────────────────────────────
    let config = build_config(&cli).await?;
    let client = build_client(&config).context("Could not set up the generative service")?;

    // ── Select the file ──────────────────────────────────────────────────
    let file = SourceFile::from_path(&cli.input, config.max_file_bytes)
        .await
        .with_context(|| format!("Cannot use {}", cli.input.display()))?;

    let mut session = Session::new(config.max_file_bytes);
    if show_progress {
        let cb = CliProgressCallback::new();
        session = session.with_progress(cb as ProgressCallback);
    }

    let _ = session.select_file(file).context("File rejected")?;
    let _ = session.set_format(cli.format);
    let _ = session.set_option(OptionChange::Summarize(cli.summarize));
    let _ = session.set_option(OptionChange::TranslateTo(cli.translate));
    let _ = session.set_option(OptionChange::HighPrecision(cli.precision));

    // ── Run, then retry on request ───────────────────────────────────────
    let start = Instant::now();
    session.run(&client).await;
    let mut attempts = 1;
    while attempts <= cli.retry && matches!(session.status(), Status::Error { .. }) {
        if !cli.quiet && !show_progress {
            eprintln!("{} retry {}/{}", cyan("↻"), attempts, cli.retry);
        }
        session.run_retry(&client).await;
        attempts += 1;
    }
    let duration = start.elapsed();

    // ── Deliver ──────────────────────────────────────────────────────────
    let mut report = ConversionReport::from_session(&session, attempts, duration);

    if let Some(artifact) = session.artifact() {
        if cli.stdout {
            write_result(&mut io::stdout().lock(), &artifact.content)
                .context("Failed to write to stdout")?;
        } else {
            let dir = output_dir(&cli);
            let path = output::write_artifact(&dir, &artifact)
                .await
                .context("Failed to save the converted file")?;
            if !cli.quiet && !cli.json {
                eprintln!(
                    "{}  {}  {}",
                    green("→"),
                    bold(&path.display().to_string()),
                    dim(&artifact.mime_type)
                );
            }
            report = report.with_output_path(path);
        }

        if cli.print {
            let source_name = session.file().map(|f| f.name()).unwrap_or("document");
            let dir = output_dir(&cli);
            let path = output::write_print_document(&dir, source_name, &artifact.content)
                .await
                .context("Failed to save the print page")?;
            if !cli.quiet && !cli.json {
                eprintln!("{}  {}", green("⎙"), bold(&path.display().to_string()));
            }
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    }

    if let Some(failure) = session.failure() {
        if !cli.quiet && !show_progress && !cli.json {
            eprintln!("{} {}", red("✘"), red(&failure.message));
        }
        if !cli.quiet && !cli.json {
            print_hint(failure, cli.precision);
        }
        anyhow::bail!("Conversion failed after {} attempt(s): {}", attempts, failure.message);
    }

    Ok(())
}

/// Next steps after a failure.
/// Write the converted text, ending it with a newline if it lacks one.
fn write_result(out: &mut impl Write, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.flush()
}

fn mebibytes_to_bytes(mb: u64) -> Result<u64> {
    mb.checked_mul(1024 * 1024)
        .with_context(|| format!("--max-size-mb {} is too large", mb))
}

fn print_hint(failure: &Failure, precision: bool) {
    match failure.kind {
        FailureKind::ServiceError if precision => eprintln!(
            "   {}",
            dim("Try again without --precision (fast mode), or add --retry 1")
        ),
        FailureKind::ServiceError | FailureKind::EmptyResult => {
            eprintln!("   {}", dim("Run again, or add --retry 1"))
        }
        FailureKind::InvalidOutput => eprintln!(
            "   {}",
            dim("The model's output failed validation; retry or drop --validate")
        ),
        FailureKind::TooLarge | FailureKind::ReadFailed => {}
    }
}

fn output_dir(cli: &Cli) -> PathBuf {
    match cli.output_dir {
        Some(ref dir) => dir.clone(),
        None => cli
            .input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    }
}

/// Map CLI args to `ConverterConfig`.
async fn build_config(cli: &Cli) -> Result<ConverterConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ConverterConfig::builder()
        .max_file_bytes(mebibytes_to_bytes(cli.max_size_mb)?)
        .postprocess(if cli.validate {
            PostProcess::Validate
        } else {
            PostProcess::None
        });

    if let Some(ref m) = cli.model_fast {
        builder = builder.fast_model(m);
    }
    if let Some(ref m) = cli.model_deep {
        builder = builder.deep_model(m);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Accepts the text, then fails on the trailing newline.
    struct FailsOnNewline(Vec<u8>);

    impl Write for FailsOnNewline {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf == b"\n" {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn result_gets_one_trailing_newline() {
        let mut out = Vec::new();
        write_result(&mut out, "a,b").unwrap();
        assert_eq!(out, b"a,b\n");

        let mut out = Vec::new();
        write_result(&mut out, "a,b\n").unwrap();
        assert_eq!(out, b"a,b\n");
    }

    #[test]
    fn stdout_write_errors_are_reported() {
        assert!(write_result(&mut BrokenPipe, "text").is_err());

        let mut out = FailsOnNewline(Vec::new());
        let err = write_result(&mut out, "text").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(out.0, b"text");
    }

    #[test]
    fn size_ceiling_in_bytes() {
        assert_eq!(mebibytes_to_bytes(15).unwrap(), 15 * 1024 * 1024);
        assert!(mebibytes_to_bytes(u64::MAX).is_err());
        assert!(mebibytes_to_bytes(u64::MAX / (1024 * 1024) + 1).is_err());
    }

    #[test]
    fn huge_max_size_flag_is_an_error_not_a_panic() {
        let cli = Cli::try_parse_from([
            "omniconvert",
            "doc.txt",
            "--max-size-mb",
            "18446744073709551615",
        ])
        .unwrap();
        let err = tokio_test::block_on(build_config(&cli)).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
