//! vulnurl: URLs from source-code comments in vulnerability-fix datasets
//!
//! Security researchers mining fix commits often want the external resources
//! developers referenced while fixing a bug: advisories, proof-of-concept
//! code, discussion threads. vulnurl finds them in comments.
//!
//! # Architecture
//!
//! - **Comment Scanner**: one table-driven lexer for C-like, PHP, Python and
//!   Ruby comment syntax that skips string literals
//! - **URL Matcher**: pulls `http(s)` URLs out of comment text and splits them
//!   into components
//! - **Extractor**: language tag dispatch over the two
//! - **Pipeline**: streams a fix dataset in batches into a SQLite URL store
//! - **Filter**: copies an allow-listed subset of a store into another
//!
//! # Example Usage
//!
//! ```
//! use vulnurl::extractor::extract_comment_urls;
//!
//! let urls = extract_comment_urls("// see http://example.com/a", "C").unwrap();
//! assert_eq!(urls[0].host, "example.com");
//! assert_eq!(urls[0].path, "/a");
//! ```

pub mod cli;
pub mod comment_scanner;
pub mod config;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod url_matcher;

// Re-export commonly used types
pub use config::{Config, DuplicatePolicy, FilterConfig, PipelineConfig};
pub use error::ExtractError;
pub use extractor::{extract_comment_urls, extract_comments};
pub use filter::{run_filter, UrlFilter};
pub use models::{CommentFamily, CweRecord, ExtractedUrl, FileChange, FixRow, Language, SourceUnit};
pub use pipeline::{BatchPipeline, FileOutcome, FileOutcomeCache, PipelineStats};
pub use source::FixDataset;
pub use store::UrlStore;
