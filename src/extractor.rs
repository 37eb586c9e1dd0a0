//! Extraction facade: language tag in, comment URLs out

use crate::comment_scanner;
use crate::error::ExtractError;
use crate::models::{ExtractedUrl, Language, SourceUnit};
use crate::url_matcher;

/// Return every comment in `code`, trimmed and in source order
///
/// Fails only when `language` is not one of the supported tags.
pub fn extract_comments(code: &str, language: &str) -> Result<Vec<String>, ExtractError> {
    let language = Language::from_tag(language)?;
    Ok(comment_scanner::scan(code, language.family()))
}

/// Return every URL found in the comments of `code`
///
/// An empty result is a successful scan, distinct from
/// [`ExtractError::UnsupportedLanguage`].
pub fn extract_comment_urls(code: &str, language: &str) -> Result<Vec<ExtractedUrl>, ExtractError> {
    let comments = extract_comments(code, language)?;
    Ok(url_matcher::match_urls(&comments))
}

/// [`extract_comment_urls`] for a dataset source unit
pub fn extract_source_unit(unit: &SourceUnit<'_>) -> Result<Vec<ExtractedUrl>, ExtractError> {
    let urls = extract_comment_urls(unit.code, unit.language)?;
    log::trace!("Extracted {} URLs from {}", urls.len(), unit.id);
    Ok(urls)
}
