//! Pipeline stages for one conversion attempt.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the service behind [`llm`] can be swapped without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ postprocess
//! (select)  (base64)   (AI)    (optional checks)
//! ```
//!
//! 1. [`input`]: build a [`input::SourceFile`] from a path or bytes and
//!    enforce the size ceiling
//! 2. [`encode`]: read the bytes once and base64-encode them; the first
//!    suspension point of an attempt
//! 3. [`llm`]: the conversion client; the only stage with network I/O
//! 4. [`postprocess`]: pass-through by default, structural validation when
//!    enabled

pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
