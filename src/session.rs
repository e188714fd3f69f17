//! The conversion session: an explicit state container for one user's
//! file, choices, and the attempt lifecycle.
//!
//! ## States
//!
//! ```text
//!            select / clear / set_format / set_option
//!                  ┌──────┐
//!                  ▼      │
//!   ┌────────▶  Idle ─────┘
//!   │             │ start_convert (file present)
//!   │             ▼
//!   │        Processing ──── settle_error ───▶ Error ──┐
//!   │             │                              │     │ retry
//!   │             │ settle_success               │     │ (same params)
//!   │             ▼                              │     ▼
//!   └─ clear ── Success ◀──────────────────── Processing
//! ```
//!
//! Every action is a synchronous command that produces at most one
//! transition. The async work of an attempt (encode, then call the service)
//! happens outside the session in [`Attempt::execute`]. `start_convert`
//! hands out an [`Attempt`] only when the session is not already
//! `Processing`, and only the attempt in flight can settle it.

use crate::config::{ProcessingTier, DEFAULT_MAX_FILE_BYTES};
use crate::error::{ConvertError, Failure};
use crate::format::{ConversionOptions, OptionChange, TargetFormat};
use crate::output::OutputArtifact;
use crate::pipeline::encode::encode_source;
use crate::pipeline::input::SourceFile;
use crate::pipeline::llm::ConversionClient;
use crate::progress::ProgressCallback;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Identifier of one conversion attempt within a session.
pub type AttemptId = u64;

/// Where the session is in its lifecycle. Exactly one holds at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Status {
    /// Nothing running; no result to show.
    #[default]
    Idle,
    /// An attempt is in flight.
    Processing { attempt: AttemptId },
    /// The last attempt produced this text, exactly as the client returned it.
    Success { result: String },
    /// The last attempt failed.
    Error { failure: Failure },
}

impl Status {
    pub fn is_processing(&self) -> bool {
        matches!(self, Status::Processing { .. })
    }

    /// Short name of the state, e.g. `"processing"`.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Processing { .. } => "processing",
            Status::Success { .. } => "success",
            Status::Error { .. } => "error",
        }
    }
}

/// Whether a command changed the session.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Applied,
    /// Guard rejected the command; state is unchanged.
    Ignored,
}

impl Dispatch {
    pub fn is_applied(self) -> bool {
        self == Dispatch::Applied
    }
}

/// The inputs of one attempt, captured when it starts.
#[derive(Debug, Clone)]
pub struct AttemptParams {
    pub file: SourceFile,
    pub format: TargetFormat,
    pub options: ConversionOptions,
}

impl AttemptParams {
    pub fn tier(&self) -> ProcessingTier {
        ProcessingTier::for_options(&self.options)
    }
}

/// A unit of work handed out by [`Session::start_convert`] or [`Session::retry`].
pub struct Attempt {
    id: AttemptId,
    params: AttemptParams,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attempt")
            .field("id", &self.id)
            .field("params", &self.params)
            .finish()
    }
}

impl Attempt {
    pub fn id(&self) -> AttemptId {
        self.id
    }

    pub fn params(&self) -> &AttemptParams {
        &self.params
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.params.options
    }

    /// Run the attempt: encode the file, then call the client.
    ///
    /// The two suspension points run strictly in sequence; the request is
    /// not built until encoding has finished.
    pub async fn execute(&self, client: &ConversionClient) -> Result<String, ConvertError> {
        let file = &self.params.file;
        let payload = encode_source(file).await?;
        if let Some(ref cb) = self.progress {
            cb.on_payload_encoded(self.id, payload.len());
        }
        client
            .convert(
                payload,
                file.mime_type(),
                self.params.format,
                &self.params.options,
            )
            .await
    }
}

/// State container for one conversion session.
pub struct Session {
    file: Option<SourceFile>,
    format: TargetFormat,
    options: ConversionOptions,
    status: Status,
    last_attempt: Option<AttemptParams>,
    next_attempt: AttemptId,
    max_file_bytes: u64,
    progress: Option<ProgressCallback>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_BYTES)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("file", &self.file.as_ref().map(|s| s.name()))
            .field("format", &self.format)
            .field("options", &self.options)
            .field("status", &self.status.label())
            .field("next_attempt", &self.next_attempt)
            .finish()
    }
}

impl Session {
    /// New idle session rejecting files larger than `max_file_bytes`.
    pub fn new(max_file_bytes: u64) -> Self {
        Self {
            file: None,
            format: TargetFormat::default(),
            options: ConversionOptions::default(),
            status: Status::Idle,
            last_attempt: None,
            next_attempt: 1,
            max_file_bytes,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn file(&self) -> Option<&SourceFile> {
        self.file.as_ref()
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// The result text, when the session is in `Success`.
    pub fn result(&self) -> Option<&str> {
        match &self.status {
            Status::Success { result } => Some(result),
            _ => None,
        }
    }

    /// The failure, when the session is in `Error`.
    pub fn failure(&self) -> Option<&Failure> {
        match &self.status {
            Status::Error { failure } => Some(failure),
            _ => None,
        }
    }

    /// Parameters of the most recent attempt, used by retry and download.
    pub fn last_attempt(&self) -> Option<&AttemptParams> {
        self.last_attempt.as_ref()
    }

    /// Whether `start_convert` would hand out an attempt right now.
    pub fn can_convert(&self) -> bool {
        self.file.is_some() && !self.status.is_processing()
    }

    /// The downloadable artifact for the current result.
    ///
    /// Named after the file and format of the attempt that produced it.
    pub fn artifact(&self) -> Option<OutputArtifact> {
        let result = self.result()?;
        let params = self.last_attempt.as_ref()?;
        Some(OutputArtifact::new(
            params.file.name(),
            params.format,
            result.to_string(),
        ))
    }

    // ── Commands ─────────────────────────────────────────────────────────

    /// Attach a new file, replacing any previous one and clearing the last
    /// result or error.
    ///
    /// # Errors
    /// [`ConvertError::TooLarge`] when the file exceeds the ceiling; the
    /// session is left exactly as it was.
    pub fn select_file(&mut self, file: SourceFile) -> Result<Dispatch, ConvertError> {
        if self.status.is_processing() {
            warn!("Ignoring file selection while an attempt is in flight");
            return Ok(Dispatch::Ignored);
        }
        if file.size() > self.max_file_bytes {
            warn!(
                "Rejected {}: {} bytes exceeds {} byte limit",
                file.name(),
                file.size(),
                self.max_file_bytes
            );
            return Err(ConvertError::TooLarge {
                name: file.name().to_string(),
                size: file.size(),
                limit: self.max_file_bytes,
            });
        }

        debug!("Selected file {} ({} bytes)", file.name(), file.size());
        self.file = Some(file);
        self.last_attempt = None;
        self.status = Status::Idle;
        Ok(Dispatch::Applied)
    }

    /// Detach the file and return to `Idle`.
    pub fn clear_file(&mut self) -> Dispatch {
        if self.status.is_processing() {
            return Dispatch::Ignored;
        }
        self.file = None;
        self.last_attempt = None;
        self.status = Status::Idle;
        Dispatch::Applied
    }

    /// Choose the output format for the next attempt.
    pub fn set_format(&mut self, format: TargetFormat) -> Dispatch {
        self.format = format;
        Dispatch::Applied
    }

    /// Toggle one option for the next attempt.
    pub fn set_option(&mut self, change: OptionChange) -> Dispatch {
        self.options.apply(change);
        Dispatch::Applied
    }

    /// Begin an attempt with the current file, format and options.
    ///
    /// Returns `None` (and changes nothing) when no file is attached or an
    /// attempt is already in flight.
    pub fn start_convert(&mut self) -> Option<Attempt> {
        if self.status.is_processing() {
            warn!("Convert ignored: an attempt is already in flight");
            return None;
        }
        let file = self.file.clone()?;
        let params = AttemptParams {
            file,
            format: self.format,
            options: self.options,
        };
        Some(self.begin(params))
    }

    /// Re-issue the failed attempt with identical parameters.
    ///
    /// Only valid from `Error`; otherwise returns `None`.
    pub fn retry(&mut self) -> Option<Attempt> {
        if !matches!(self.status, Status::Error { .. }) {
            return None;
        }
        let params = self.last_attempt.clone()?;
        info!("Retrying with identical parameters");
        Some(self.begin(params))
    }

    /// Settle the in-flight attempt with its result text.
    pub fn settle_success(&mut self, attempt: AttemptId, result: String) -> Dispatch {
        if !self.is_in_flight(attempt) {
            return Dispatch::Ignored;
        }
        info!("Attempt {} succeeded ({} chars)", attempt, result.len());
        if let Some(ref cb) = self.progress {
            cb.on_attempt_success(attempt, result.len());
        }
        self.status = Status::Success { result };
        Dispatch::Applied
    }

    /// Settle the in-flight attempt with a failure.
    pub fn settle_error(&mut self, attempt: AttemptId, failure: Failure) -> Dispatch {
        if !self.is_in_flight(attempt) {
            return Dispatch::Ignored;
        }
        warn!("Attempt {} failed ({}): {}", attempt, failure.kind, failure.message);
        if let Some(ref cb) = self.progress {
            cb.on_attempt_error(attempt, &failure);
        }
        self.status = Status::Error { failure };
        Dispatch::Applied
    }

    /// Settle the in-flight attempt from its outcome.
    pub fn settle(&mut self, attempt: AttemptId, outcome: Result<String, ConvertError>) -> Dispatch {
        match outcome {
            Ok(text) => self.settle_success(attempt, text),
            Err(e) => self.settle_error(attempt, Failure::from(&e)),
        }
    }

    /// Drop the file, result and choices, keeping the size ceiling.
    pub fn reset(&mut self) -> Dispatch {
        if self.status.is_processing() {
            return Dispatch::Ignored;
        }
        let progress = self.progress.take();
        *self = Session {
            progress,
            ..Session::new(self.max_file_bytes)
        };
        Dispatch::Applied
    }

    // ── Drivers ──────────────────────────────────────────────────────────

    /// Start an attempt, run it to completion, and settle it.
    ///
    /// A no-op when there is no file or an attempt is already in flight.
    pub async fn run(&mut self, client: &ConversionClient) -> &Status {
        if let Some(attempt) = self.start_convert() {
            let outcome = attempt.execute(client).await;
            let _ = self.settle(attempt.id(), outcome);
        }
        &self.status
    }

    /// Retry the failed attempt and settle it. A no-op unless in `Error`.
    pub async fn run_retry(&mut self, client: &ConversionClient) -> &Status {
        if let Some(attempt) = self.retry() {
            let outcome = attempt.execute(client).await;
            let _ = self.settle(attempt.id(), outcome);
        }
        &self.status
    }

    // ── Internal ─────────────────────────────────────────────────────────

    fn begin(&mut self, params: AttemptParams) -> Attempt {
        let id = self.next_attempt;
        self.next_attempt += 1;

        info!(
            "Attempt {}: {} → {} ({} tier)",
            id,
            params.file.name(),
            params.format,
            params.tier()
        );
        if let Some(ref cb) = self.progress {
            cb.on_attempt_start(id, params.file.name(), params.format, params.tier());
        }

        self.status = Status::Processing { attempt: id };
        self.last_attempt = Some(params.clone());
        Attempt {
            id,
            params,
            progress: self.progress.clone(),
        }
    }

    fn is_in_flight(&self, attempt: AttemptId) -> bool {
        match self.status {
            Status::Processing { attempt: current } if current == attempt => true,
            _ => {
                debug!("Ignoring settle for stale attempt {}", attempt);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::format::Language;

    fn text_file(name: &str, len: usize) -> SourceFile {
        SourceFile::from_bytes(name, vec![b'a'; len], None, u64::MAX).unwrap()
    }

    fn session_with_file() -> Session {
        let mut s = Session::default();
        let _ = s.select_file(text_file("notes.txt", 2048)).unwrap();
        s
    }

    #[test]
    fn new_session_is_idle_with_defaults() {
        let s = Session::default();
        assert_eq!(s.status(), &Status::Idle);
        assert!(s.file().is_none());
        assert_eq!(s.format(), TargetFormat::Docx);
        assert_eq!(s.options(), &ConversionOptions::default());
        assert!(!s.can_convert());
    }

    #[test]
    fn convert_without_file_is_noop() {
        let mut s = Session::default();
        assert!(s.start_convert().is_none());
        assert_eq!(s.status(), &Status::Idle);
    }

    #[test]
    fn start_convert_moves_to_processing() {
        let mut s = session_with_file();
        let attempt = s.start_convert().expect("attempt");
        assert_eq!(s.status(), &Status::Processing { attempt: attempt.id() });
        assert!(!s.can_convert());
    }

    #[test]
    fn second_trigger_while_processing_is_ignored() {
        let mut s = session_with_file();
        let first = s.start_convert();
        let second = s.start_convert();
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(
            s.status(),
            &Status::Processing {
                attempt: first.unwrap().id()
            }
        );
    }

    #[test]
    fn settle_success_stores_text_exactly() {
        let mut s = session_with_file();
        let a = s.start_convert().unwrap();
        assert!(s.settle_success(a.id(), "  # Hello \n".into()).is_applied());
        assert_eq!(s.result(), Some("  # Hello \n"));
        assert!(s.failure().is_none());
    }

    #[test]
    fn settle_error_stores_failure() {
        let mut s = session_with_file();
        let a = s.start_convert().unwrap();
        let _ = s.settle(a.id(), Err(ConvertError::service("rate limited")));
        let f = s.failure().expect("failure");
        assert_eq!(f.kind, FailureKind::ServiceError);
        assert_eq!(f.message, "rate limited");
    }

    #[test]
    fn stale_settle_is_ignored() {
        let mut s = session_with_file();
        let a = s.start_convert().unwrap();
        let _ = s.settle_success(a.id(), "done".into());
        assert_eq!(s.settle_success(a.id(), "again".into()), Dispatch::Ignored);
        assert_eq!(s.settle_success(999, "other".into()), Dispatch::Ignored);
        assert_eq!(s.result(), Some("done"));
    }

    #[test]
    fn oversized_file_is_rejected_and_state_kept() {
        let mut s = Session::new(1024);
        let err = s.select_file(text_file("big.bin", 1025)).unwrap_err();
        assert!(matches!(err, ConvertError::TooLarge { .. }));
        assert!(s.file().is_none());
        assert_eq!(s.status(), &Status::Idle);
    }

    #[test]
    fn oversized_file_keeps_previous_result() {
        let mut s = Session::new(4096);
        let _ = s.select_file(text_file("a.txt", 10)).unwrap();
        let a = s.start_convert().unwrap();
        let _ = s.settle_success(a.id(), "ok".into());

        assert!(s.select_file(text_file("b.txt", 5000)).is_err());
        assert_eq!(s.file().map(|f| f.name()), Some("a.txt"));
        assert_eq!(s.result(), Some("ok"));
    }

    #[test]
    fn file_at_limit_is_accepted() {
        let mut s = Session::new(1024);
        assert!(s.select_file(text_file("edge.txt", 1024)).unwrap().is_applied());
    }

    #[test]
    fn selecting_a_file_clears_result_and_error() {
        let mut s = session_with_file();
        let a = s.start_convert().unwrap();
        let _ = s.settle(a.id(), Err(ConvertError::EmptyResult));
        assert!(s.failure().is_some());

        let _ = s.select_file(text_file("other.txt", 10)).unwrap();
        assert_eq!(s.status(), &Status::Idle);
        assert!(s.last_attempt().is_none());
    }

    #[test]
    fn file_cannot_change_while_processing() {
        let mut s = session_with_file();
        let _a = s.start_convert().unwrap();
        assert_eq!(
            s.select_file(text_file("other.txt", 10)).unwrap(),
            Dispatch::Ignored
        );
        assert_eq!(s.clear_file(), Dispatch::Ignored);
        assert_eq!(s.reset(), Dispatch::Ignored);
        assert_eq!(s.file().map(|f| f.name()), Some("notes.txt"));
    }

    #[test]
    fn clear_file_returns_to_idle() {
        let mut s = session_with_file();
        let a = s.start_convert().unwrap();
        let _ = s.settle_success(a.id(), "x".into());
        assert!(s.clear_file().is_applied());
        assert_eq!(s.status(), &Status::Idle);
        assert!(s.file().is_none());
    }

    #[test]
    fn set_format_twice_is_idempotent() {
        let mut s = session_with_file();
        let _ = s.set_format(TargetFormat::Csv);
        let before = (s.status().clone(), s.options().to_owned(), s.format());
        let _ = s.set_format(TargetFormat::Csv);
        let after = (s.status().clone(), s.options().to_owned(), s.format());
        assert_eq!(before, after);
    }

    #[test]
    fn retry_only_from_error_and_reuses_params() {
        let mut s = session_with_file();
        let _ = s.set_format(TargetFormat::Json);
        let _ = s.set_option(OptionChange::Summarize(true));
        assert!(s.retry().is_none());

        let a = s.start_convert().unwrap();
        let _ = s.settle(a.id(), Err(ConvertError::service("rate limited")));

        // Choices changed after the failure do not leak into the retry.
        let _ = s.set_format(TargetFormat::Csv);
        let _ = s.set_option(OptionChange::TranslateTo(Language::English));

        let r = s.retry().expect("retry from error");
        assert_ne!(r.id(), a.id());
        assert_eq!(r.params().format, TargetFormat::Json);
        assert!(r.options().summarize);
        assert!(r.options().translate_to.is_original());
        assert!(s.status().is_processing());
        assert!(s.retry().is_none());
    }

    #[test]
    fn convert_from_error_and_success_is_allowed() {
        let mut s = session_with_file();
        let a = s.start_convert().unwrap();
        let _ = s.settle(a.id(), Err(ConvertError::EmptyResult));
        let b = s.start_convert().expect("from error");
        let _ = s.settle_success(b.id(), "ok".into());
        assert!(s.start_convert().is_some(), "from success");
    }

    #[test]
    fn artifact_uses_attempt_format() {
        let mut s = session_with_file();
        let _ = s.set_format(TargetFormat::Markdown);
        let a = s.start_convert().unwrap();
        let _ = s.settle_success(a.id(), "# Hello".into());
        let _ = s.set_format(TargetFormat::Rtf);

        let art = s.artifact().expect("artifact");
        assert_eq!(art.file_name, "notes_converted.md");
        assert_eq!(art.mime_type, "text/markdown");
        assert_eq!(art.content, "# Hello");
    }

    #[test]
    fn reset_restores_defaults_but_keeps_limit() {
        let mut s = Session::new(10);
        let _ = s.select_file(text_file("a.txt", 5)).unwrap();
        let _ = s.set_format(TargetFormat::Pdf);
        assert!(s.reset().is_applied());
        assert!(s.file().is_none());
        assert_eq!(s.format(), TargetFormat::Docx);
        assert_eq!(s.max_file_bytes(), 10);
    }

    #[test]
    fn status_serialises_with_tag() {
        let json = serde_json::to_value(Status::Success {
            result: "x".into(),
        })
        .unwrap();
        assert_eq!(json["state"], "success");
        assert_eq!(json["result"], "x");
    }
}
