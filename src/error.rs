//! Typed errors for the extraction core.
//!
//! The scanner and URL matcher never fail; the only way extraction can be
//! refused is an unknown language tag. Callers above the core wrap this in
//! `anyhow` like every other error.

use thiserror::Error;

/// Errors raised by comment and URL extraction
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The language tag is outside the supported set
    #[error("can't extract comments because {language} isn't a supported language")]
    UnsupportedLanguage { language: String },
}
