//! Batch pipeline: fix dataset rows in, URL store rows out
//!
//! The same file body appears once per CWE its fix is classified under, so
//! each file is scanned only on first sight. The outcome is remembered in a
//! [`FileOutcomeCache`] owned by the pipeline; later rows for the same file
//! only add their CWE link (or are skipped when the file had nothing to keep).

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;

use crate::config::PipelineConfig;
use crate::error::ExtractError;
use crate::extractor;
use crate::models::FixRow;
use crate::source::FixDataset;
use crate::store::UrlStore;

/// What scanning a file body produced the first time it was seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// At least one comment URL; the file is persisted
    HasUrls,
    /// Supported language, but no comment URLs
    NoUrls,
    /// Language tag outside the supported set
    Unsupported,
}

/// Memo of per-file scan outcomes, keyed by file change id
#[derive(Debug, Default)]
pub struct FileOutcomeCache {
    outcomes: HashMap<String, FileOutcome>,
}

impl FileOutcomeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file_change_id: &str) -> Option<FileOutcome> {
        self.outcomes.get(file_change_id).copied()
    }

    pub fn record(&mut self, file_change_id: &str, outcome: FileOutcome) {
        self.outcomes.insert(file_change_id.to_string(), outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Counters for one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Dataset rows processed
    pub rows: usize,
    /// Distinct file bodies scanned
    pub files_scanned: usize,
    /// Files with at least one comment URL
    pub files_with_urls: usize,
    /// Files skipped because of their language tag
    pub unsupported_files: usize,
    /// URL occurrences extracted (before store deduplication)
    pub urls_extracted: usize,
}

/// Drives extraction over a fix dataset and persists the results
pub struct BatchPipeline {
    store: UrlStore,
    config: PipelineConfig,
    outcomes: FileOutcomeCache,
    stats: PipelineStats,
}

impl BatchPipeline {
    pub fn new(store: UrlStore, config: PipelineConfig) -> Self {
        Self {
            store,
            config,
            outcomes: FileOutcomeCache::new(),
            stats: PipelineStats::default(),
        }
    }

    pub fn store(&self) -> &UrlStore {
        &self.store
    }

    pub fn outcomes(&self) -> &FileOutcomeCache {
        &self.outcomes
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Hand back the store once the run is over
    pub fn into_store(self) -> UrlStore {
        self.store
    }

    /// Process every row of `dataset`, batch by batch
    pub fn run(&mut self, dataset: &FixDataset, show_progress: bool) -> Result<PipelineStats> {
        let total_rows = dataset.count_rows()?;
        log::info!(
            "Mining {} rows from {} in batches of {}",
            total_rows,
            dataset.path().display(),
            self.config.batch_size
        );

        let pb = if show_progress {
            let pb = ProgressBar::new(total_rows as u64);
            pb.set_draw_target(ProgressDrawTarget::stderr());
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({percent}%) {msg}")
                    .context("Invalid progress bar template")?
                    .progress_chars("=>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        dataset.for_each_batch(self.config.batch_size, |batch| {
            self.process_batch(batch)?;
            pb.inc(batch.len() as u64);
            pb.set_message(format!("{} files with URLs", self.stats.files_with_urls));
            log::info!("Rows processed: {}", self.stats.rows);
            Ok(())
        })?;

        pb.finish_and_clear();
        log::info!(
            "Mining complete: {} files scanned, {} with URLs, {} unsupported",
            self.stats.files_scanned,
            self.stats.files_with_urls,
            self.stats.unsupported_files
        );
        Ok(self.stats)
    }

    /// Process one batch of dataset rows
    pub fn process_batch(&mut self, rows: &[FixRow]) -> Result<()> {
        for row in rows {
            self.process_row(row)?;
        }
        Ok(())
    }

    fn process_row(&mut self, row: &FixRow) -> Result<()> {
        self.stats.rows += 1;
        let file_change = &row.file_change;
        let policy = self.config.duplicate_policy;

        match self.outcomes.get(&file_change.file_change_id) {
            Some(FileOutcome::HasUrls) => {
                // Already stored with its URLs; only the new CWE link is missing
                self.store.add_file_change(file_change, &[], &row.cwe, policy)?;
            }
            Some(FileOutcome::NoUrls) | Some(FileOutcome::Unsupported) => {}
            None => {
                self.stats.files_scanned += 1;
                match extractor::extract_source_unit(&file_change.source_unit()) {
                    Ok(urls) if urls.is_empty() => {
                        self.outcomes.record(&file_change.file_change_id, FileOutcome::NoUrls);
                    }
                    Ok(urls) => {
                        self.outcomes.record(&file_change.file_change_id, FileOutcome::HasUrls);
                        self.stats.files_with_urls += 1;
                        self.stats.urls_extracted += urls.len();
                        self.store
                            .add_file_change(file_change, &urls, &row.cwe, policy)
                            .with_context(|| {
                                format!("Failed to store file change {}", file_change.file_change_id)
                            })?;
                    }
                    Err(ExtractError::UnsupportedLanguage { language }) => {
                        log::debug!(
                            "Skipping {}: unsupported language '{}'",
                            file_change.file_change_id,
                            language
                        );
                        self.outcomes.record(&file_change.file_change_id, FileOutcome::Unsupported);
                        self.stats.unsupported_files += 1;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicatePolicy;
    use crate::models::{CweRecord, FileChange};
    use tempfile::TempDir;

    fn row(id: &str, lang: &str, code: &str, cwe_id: &str) -> FixRow {
        FixRow {
            file_change: FileChange {
                file_change_id: id.to_string(),
                filename: "f".to_string(),
                path: None,
                code: Some(code.to_string()),
                programming_language: lang.to_string(),
            },
            cwe: CweRecord {
                cwe_id: cwe_id.to_string(),
                cwe_name: None,
                description: None,
                extended_description: None,
                url: None,
                is_category: None,
            },
        }
    }

    fn pipeline(temp: &TempDir, policy: DuplicatePolicy) -> BatchPipeline {
        let store = UrlStore::open(temp.path().join("urls.db")).unwrap();
        let config = PipelineConfig {
            batch_size: 2,
            duplicate_policy: policy,
        };
        BatchPipeline::new(store, config)
    }

    #[test]
    fn test_outcome_cache() {
        let mut cache = FileOutcomeCache::new();
        assert!(cache.is_empty());
        cache.record("a", FileOutcome::NoUrls);
        cache.record("a", FileOutcome::HasUrls);
        assert_eq!(cache.get("a"), Some(FileOutcome::HasUrls));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_file_with_urls_is_stored_once_per_cwe() {
        let temp = TempDir::new().unwrap();
        let mut pipeline = pipeline(&temp, DuplicatePolicy::Distinct);

        let rows = vec![
            row("fc1", "C", "// http://a.com/x", "CWE-79"),
            row("fc1", "C", "// http://a.com/x", "CWE-89"),
        ];
        pipeline.process_batch(&rows).unwrap();

        let stats = pipeline.stats();
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.files_scanned, 1);
        assert_eq!(stats.files_with_urls, 1);
        assert_eq!(stats.urls_extracted, 1);

        let counts = pipeline.store().counts().unwrap();
        assert_eq!(counts.file_changes, 1);
        assert_eq!(counts.urls, 1);
        assert_eq!(counts.change_cwes, 2);
    }

    #[test]
    fn test_file_without_urls_is_not_stored_or_rescanned() {
        let temp = TempDir::new().unwrap();
        let mut pipeline = pipeline(&temp, DuplicatePolicy::Distinct);

        pipeline.process_batch(&[row("fc1", "Python", "x = 1 # plain", "CWE-79")]).unwrap();
        pipeline.process_batch(&[row("fc1", "Python", "x = 1 # plain", "CWE-89")]).unwrap();

        assert_eq!(pipeline.outcomes().get("fc1"), Some(FileOutcome::NoUrls));
        assert_eq!(pipeline.stats().files_scanned, 1);
        assert_eq!(pipeline.store().counts().unwrap().file_changes, 0);
    }

    #[test]
    fn test_unsupported_language_does_not_fail_batch() {
        let temp = TempDir::new().unwrap();
        let mut pipeline = pipeline(&temp, DuplicatePolicy::Distinct);

        let rows = vec![
            row("fc1", "COBOL", "* http://a.com/x", "CWE-79"),
            row("fc2", "Ruby", "# http://b.com/y", "CWE-79"),
            row("fc1", "COBOL", "* http://a.com/x", "CWE-89"),
        ];
        pipeline.process_batch(&rows).unwrap();

        assert_eq!(pipeline.outcomes().get("fc1"), Some(FileOutcome::Unsupported));
        assert_eq!(pipeline.outcomes().get("fc2"), Some(FileOutcome::HasUrls));

        let stats = pipeline.stats();
        assert_eq!(stats.unsupported_files, 1);
        assert_eq!(stats.files_scanned, 2);

        let urls = pipeline.store().urls().unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].url.host, "b.com");
    }

    #[test]
    fn test_count_policy_is_applied() {
        let temp = TempDir::new().unwrap();
        let mut pipeline = pipeline(&temp, DuplicatePolicy::CountOccurrences);

        let code = "// http://a.com/x\n// again http://a.com/x";
        pipeline
            .process_batch(&[row("fc1", "Go", code, "CWE-79"), row("fc1", "Go", code, "CWE-89")])
            .unwrap();

        let store = pipeline.into_store();
        assert_eq!(store.occurrences("fc1", "http://a.com/x").unwrap(), Some(2));
    }
}
