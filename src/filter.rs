//! Allow-list filtering of a mined URL store into a curated copy
//!
//! A URL survives when its path is not blocked and either its host is on the
//! allow-list or its path matches an allowed pattern. The filtered store then
//! receives every file change linked to a surviving URL, plus those files'
//! CWE classifications.

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::params;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

use crate::config::FilterConfig;
use crate::store::{self, UrlStore};

/// Compiled host and path rules
#[derive(Debug, Clone)]
pub struct UrlFilter {
    allowed_hosts: HashSet<String>,
    allowed_paths: Vec<Regex>,
    blocked_paths: Vec<Regex>,
}

impl UrlFilter {
    /// Compile the rules from configuration
    ///
    /// Path patterns only need to match at the start of the path, the way a
    /// `match` (not `search`) test behaves; they are anchored with `^`.
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        Ok(Self {
            allowed_hosts: config.allowed_hosts.iter().cloned().collect(),
            allowed_paths: compile_patterns(&config.allowed_path_patterns)?,
            blocked_paths: compile_patterns(&config.blocked_path_patterns)?,
        })
    }

    /// Decide whether a URL with this host and path is kept
    pub fn is_allowed(&self, host: &str, path: &str) -> bool {
        if self.blocked_paths.iter().any(|p| p.is_match(path)) {
            return false;
        }
        self.allowed_hosts.contains(host) || self.allowed_paths.iter().any(|p| p.is_match(path))
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("^(?:{})", p)).with_context(|| format!("Invalid path pattern: {}", p)))
        .collect()
}

/// What a filter run copied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub urls_seen: usize,
    pub urls_kept: usize,
    pub file_changes_kept: usize,
    pub cwes_kept: usize,
}

/// Copy the allow-listed subset of `source` into `dest`
///
/// Runs inside one transaction on `dest`; URL ids are preserved so links stay
/// comparable between the two stores. Rows already present in `dest` are left
/// untouched, so re-running is harmless.
pub fn run_filter(source: &UrlStore, dest: &mut UrlStore, filter: &UrlFilter) -> Result<FilterStats> {
    let mut stats = FilterStats::default();

    let urls = source.urls()?;
    stats.urls_seen = urls.len();

    let kept: Vec<_> = urls
        .into_iter()
        .filter(|u| filter.is_allowed(&u.url.host, &u.url.path))
        .collect();
    stats.urls_kept = kept.len();
    log::info!("Keeping {} of {} URLs", stats.urls_kept, stats.urls_seen);

    let mut links = Vec::new();
    let mut file_change_ids = BTreeSet::new();
    for stored in &kept {
        for (file_change_id, occurrences) in source.url_links(stored.url_id)? {
            file_change_ids.insert(file_change_id.clone());
            links.push((file_change_id, stored.url_id, occurrences));
        }
    }

    let tx = dest.connection_mut().transaction()?;

    for stored in &kept {
        let url = &stored.url;
        tx.execute(
            "INSERT OR IGNORE INTO url (url_id, full_url, scheme, host, path, query, fragment)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![stored.url_id, url.raw, url.scheme, url.host, url.path, url.query, url.fragment],
        )?;
    }

    let mut cwe_ids = BTreeSet::new();
    for file_change_id in &file_change_ids {
        let Some(file_change) = source.file_change(file_change_id)? else {
            log::warn!("file_url references missing file change {}", file_change_id);
            continue;
        };
        store::insert_file_change(&tx, &file_change)?;
        stats.file_changes_kept += 1;

        for cwe in source.cwes_for(file_change_id)? {
            store::insert_cwe(&tx, &cwe)?;
            tx.execute(
                "INSERT OR IGNORE INTO change_cwe (file_change_id, cwe_id) VALUES (?1, ?2)",
                params![file_change_id, cwe.cwe_id],
            )?;
            cwe_ids.insert(cwe.cwe_id);
        }
    }
    stats.cwes_kept = cwe_ids.len();

    for (file_change_id, url_id, occurrences) in &links {
        tx.execute(
            "INSERT OR IGNORE INTO file_url (file_change_id, url_id, occurrences) VALUES (?1, ?2, ?3)",
            params![file_change_id, url_id, occurrences],
        )?;
    }

    tx.commit().context("Failed to commit filtered store")?;

    log::info!(
        "Filter complete: {} URLs, {} file changes, {} CWEs copied",
        stats.urls_kept,
        stats.file_changes_kept,
        stats.cwes_kept
    );
    Ok(stats)
}
