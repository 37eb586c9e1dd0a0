//! Core data models for vulnurl
//!
//! These structures describe the rows flowing from a fix dataset through
//! comment extraction and into the URL store.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

use crate::error::ExtractError;

/// Programming language tag as spelled in the fix dataset
///
/// The set is closed: any other spelling is rejected with
/// [`ExtractError::UnsupportedLanguage`].
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display, EnumIter,
)]
pub enum Language {
    C,
    Java,
    #[strum(serialize = "C++")]
    #[serde(rename = "C++")]
    Cpp,
    JavaScript,
    Go,
    TypeScript,
    PHP,
    Python,
    Ruby,
}

impl Language {
    /// Parse a dataset language tag (case-sensitive, exact spelling)
    pub fn from_tag(tag: &str) -> Result<Self, ExtractError> {
        Language::from_str(tag).map_err(|_| ExtractError::UnsupportedLanguage {
            language: tag.to_string(),
        })
    }

    /// Comment syntax family this language belongs to
    pub fn family(&self) -> CommentFamily {
        match self {
            Language::C
            | Language::Java
            | Language::Cpp
            | Language::JavaScript
            | Language::Go
            | Language::TypeScript => CommentFamily::CLike,
            Language::PHP => CommentFamily::Php,
            Language::Python => CommentFamily::Python,
            Language::Ruby => CommentFamily::Ruby,
        }
    }
}

/// Group of languages sharing identical comment delimiters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum CommentFamily {
    /// `//` and `/* */`
    CLike,
    /// `//`, `#` and `/* */`
    Php,
    /// `#` and line-leading `"""`
    Python,
    /// `#` and `=begin` / `=end`
    Ruby,
}

/// One file body at one point in history, borrowed from its owning row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceUnit<'a> {
    /// Stable identifier, shared by every fix record reusing this file body
    pub id: &'a str,
    pub code: &'a str,
    /// Raw language tag, not yet validated
    pub language: &'a str,
}

/// A URL occurrence found in a comment, split into its components
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedUrl {
    /// The matched text exactly as it appeared in the comment
    pub raw: String,
    /// Lowercased scheme (`http` or `https`)
    pub scheme: String,
    /// Network location: optional `user:pass@`, host and optional `:port`
    pub host: String,
    pub path: String,
    pub query: String,
    pub fragment: String,
}

/// A file change row from the fix dataset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChange {
    pub file_change_id: String,
    pub filename: String,
    /// Path of the file before the fix, absent for newly added files
    pub path: Option<String>,
    /// File body before the fix
    pub code: Option<String>,
    /// Language tag exactly as stored in the dataset
    pub programming_language: String,
}

impl FileChange {
    /// View this row as a scannable source unit (missing code scans as empty)
    pub fn source_unit(&self) -> SourceUnit<'_> {
        SourceUnit {
            id: &self.file_change_id,
            code: self.code.as_deref().unwrap_or_default(),
            language: &self.programming_language,
        }
    }
}

/// A CWE classification attached to a fix
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CweRecord {
    pub cwe_id: String,
    pub cwe_name: Option<String>,
    pub description: Option<String>,
    pub extended_description: Option<String>,
    pub url: Option<String>,
    pub is_category: Option<bool>,
}

/// One joined row of the fix dataset: a file change paired with one CWE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixRow {
    pub file_change: FileChange,
    pub cwe: CweRecord,
}

/// A URL row as persisted in the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUrl {
    pub url_id: i64,
    #[serde(flatten)]
    pub url: ExtractedUrl,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_language_tags_round_trip() {
        for lang in Language::iter() {
            let tag = lang.to_string();
            assert_eq!(Language::from_tag(&tag).unwrap(), lang);
        }
    }

    #[test]
    fn test_cpp_tag_spelling() {
        assert_eq!(Language::from_tag("C++").unwrap(), Language::Cpp);
        assert_eq!(Language::Cpp.to_string(), "C++");
        assert!(Language::from_tag("Cpp").is_err());
    }

    #[test]
    fn test_tags_are_case_sensitive() {
        assert!(Language::from_tag("python").is_err());
        assert!(Language::from_tag("php").is_err());
        assert!(Language::from_tag("Python").is_ok());
    }

    #[test]
    fn test_unsupported_tag_keeps_spelling() {
        let err = Language::from_tag("COBOL").unwrap_err();
        assert_eq!(
            err,
            ExtractError::UnsupportedLanguage {
                language: "COBOL".to_string()
            }
        );
    }

    #[test]
    fn test_family_mapping() {
        assert_eq!(Language::Go.family(), CommentFamily::CLike);
        assert_eq!(Language::TypeScript.family(), CommentFamily::CLike);
        assert_eq!(Language::PHP.family(), CommentFamily::Php);
        assert_eq!(Language::Python.family(), CommentFamily::Python);
        assert_eq!(Language::Ruby.family(), CommentFamily::Ruby);
    }

    #[test]
    fn test_source_unit_with_missing_code() {
        let fc = FileChange {
            file_change_id: "fc1".to_string(),
            filename: "a.c".to_string(),
            path: None,
            code: None,
            programming_language: "C".to_string(),
        };
        let unit = fc.source_unit();
        assert_eq!(unit.id, "fc1");
        assert_eq!(unit.code, "");
        assert_eq!(unit.language, "C");
    }
}
