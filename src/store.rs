//! SQLite store for extracted URLs
//!
//! The store keeps a normalized copy of everything the pipeline found:
//! - `file_change`: file bodies that contained at least one comment URL
//! - `url`: unique URLs, keyed by the full URL string
//! - `cwe`: CWE classifications, keyed by CWE id
//! - `file_url`, `change_cwe`: many-to-many links
//!
//! The same schema backs both the raw mining output and the filtered copy.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::DuplicatePolicy;
use crate::models::{CweRecord, ExtractedUrl, FileChange, StoredUrl};

/// Row counts for every table in a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub file_changes: usize,
    pub urls: usize,
    pub cwes: usize,
    pub file_urls: usize,
    pub change_cwes: usize,
}

/// A SQLite database holding extracted URLs and their links
pub struct UrlStore {
    path: PathBuf,
    conn: Connection,
}

impl UrlStore {
    /// Open (or create) a store and make sure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open URL store at {}", path.display()))?;

        let store = Self { path, conn };
        store.init_schema()?;

        log::debug!("Opened URL store at {}", store.path.display());
        Ok(store)
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS file_change (
                file_change_id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                path TEXT,
                code TEXT,
                programming_language TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS url (
                url_id INTEGER PRIMARY KEY AUTOINCREMENT,
                full_url TEXT NOT NULL UNIQUE,
                scheme TEXT NOT NULL,
                host TEXT NOT NULL,
                path TEXT NOT NULL,
                query TEXT NOT NULL,
                fragment TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS cwe (
                cwe_id TEXT PRIMARY KEY,
                cwe_name TEXT,
                description TEXT,
                extended_description TEXT,
                url TEXT,
                is_category INTEGER
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS file_url (
                file_change_id TEXT NOT NULL,
                url_id INTEGER NOT NULL,
                occurrences INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (file_change_id, url_id),
                FOREIGN KEY (file_change_id) REFERENCES file_change(file_change_id),
                FOREIGN KEY (url_id) REFERENCES url(url_id)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_file_url_url ON file_url(url_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS change_cwe (
                file_change_id TEXT NOT NULL,
                cwe_id TEXT NOT NULL,
                PRIMARY KEY (file_change_id, cwe_id),
                FOREIGN KEY (file_change_id) REFERENCES file_change(file_change_id),
                FOREIGN KEY (cwe_id) REFERENCES cwe(cwe_id)
            )",
            [],
        )?;

        Ok(())
    }

    /// Record a file change, its URLs and one CWE in a single transaction
    ///
    /// Every insert is insert-or-ignore, so re-adding the same file with a new
    /// CWE only adds the new CWE link. URLs are content-addressed: an existing
    /// `full_url` is reused rather than duplicated. Under
    /// [`DuplicatePolicy::CountOccurrences`] the link stores how often the URL
    /// occurs in this call's `urls`, overwriting any earlier count, so adding
    /// the same file twice leaves the counts unchanged.
    pub fn add_file_change(
        &mut self,
        file_change: &FileChange,
        urls: &[ExtractedUrl],
        cwe: &CweRecord,
        policy: DuplicatePolicy,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;

        insert_file_change(&tx, file_change)?;

        let mut occurrences: BTreeMap<i64, i64> = BTreeMap::new();
        for url in urls {
            *occurrences.entry(upsert_url(&tx, url)?).or_insert(0) += 1;
        }

        insert_cwe(&tx, cwe)?;

        for (url_id, count) in occurrences {
            link_url(&tx, &file_change.file_change_id, url_id, count, policy)?;
        }

        tx.execute(
            "INSERT OR IGNORE INTO change_cwe (file_change_id, cwe_id) VALUES (?1, ?2)",
            params![file_change.file_change_id, cwe.cwe_id],
        )?;

        tx.commit()
            .with_context(|| format!("Failed to commit file change {}", file_change.file_change_id))?;

        log::trace!(
            "Stored file change {} with {} URLs (CWE {})",
            file_change.file_change_id,
            urls.len(),
            cwe.cwe_id
        );
        Ok(())
    }

    /// All URLs in the store, ordered by id
    pub fn urls(&self) -> Result<Vec<StoredUrl>> {
        let mut stmt = self.conn.prepare(
            "SELECT url_id, full_url, scheme, host, path, query, fragment FROM url ORDER BY url_id",
        )?;
        let urls = stmt
            .query_map([], stored_url_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(urls)
    }

    /// Look up a file change by id
    pub fn file_change(&self, file_change_id: &str) -> Result<Option<FileChange>> {
        let file_change = self
            .conn
            .query_row(
                "SELECT file_change_id, filename, path, code, programming_language
                 FROM file_change WHERE file_change_id = ?1",
                [file_change_id],
                file_change_from_row,
            )
            .optional()?;
        Ok(file_change)
    }

    /// `(file_change_id, occurrences)` for every file linked to a URL
    pub fn url_links(&self, url_id: i64) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_change_id, occurrences FROM file_url
             WHERE url_id = ?1 ORDER BY file_change_id",
        )?;
        let links = stmt
            .query_map([url_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }

    /// CWEs linked to a file change, ordered by CWE id
    pub fn cwes_for(&self, file_change_id: &str) -> Result<Vec<CweRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.cwe_id, c.cwe_name, c.description, c.extended_description, c.url, c.is_category
             FROM cwe c JOIN change_cwe cc ON c.cwe_id = cc.cwe_id
             WHERE cc.file_change_id = ?1
             ORDER BY c.cwe_id",
        )?;
        let cwes = stmt
            .query_map([file_change_id], cwe_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cwes)
    }

    /// Number of times a URL was linked to a file, if linked at all
    pub fn occurrences(&self, file_change_id: &str, full_url: &str) -> Result<Option<i64>> {
        let count = self
            .conn
            .query_row(
                "SELECT fu.occurrences FROM file_url fu JOIN url u ON fu.url_id = u.url_id
                 WHERE fu.file_change_id = ?1 AND u.full_url = ?2",
                [file_change_id, full_url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count)
    }

    /// Row counts for every table
    pub fn counts(&self) -> Result<StoreCounts> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                .with_context(|| format!("Failed to count rows in {}", table))?;
            Ok(n as usize)
        };

        Ok(StoreCounts {
            file_changes: count("file_change")?,
            urls: count("url")?,
            cwes: count("cwe")?,
            file_urls: count("file_url")?,
            change_cwes: count("change_cwe")?,
        })
    }

    /// Mutable access to the connection for multi-statement copies
    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

pub(crate) fn insert_file_change(conn: &Connection, file_change: &FileChange) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO file_change (file_change_id, filename, path, code, programming_language)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            file_change.file_change_id,
            file_change.filename,
            file_change.path,
            file_change.code,
            file_change.programming_language,
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_cwe(conn: &Connection, cwe: &CweRecord) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO cwe (cwe_id, cwe_name, description, extended_description, url, is_category)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            cwe.cwe_id,
            cwe.cwe_name,
            cwe.description,
            cwe.extended_description,
            cwe.url,
            cwe.is_category,
        ],
    )?;
    Ok(())
}

/// Insert a URL unless its full string is already stored; return its id
fn upsert_url(conn: &Connection, url: &ExtractedUrl) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO url (full_url, scheme, host, path, query, fragment)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![url.raw, url.scheme, url.host, url.path, url.query, url.fragment],
    )?;

    let url_id = conn
        .query_row(
            "SELECT url_id FROM url WHERE full_url = ?1",
            [&url.raw],
            |row| row.get(0),
        )
        .with_context(|| format!("URL vanished after insert: {}", url.raw))?;
    Ok(url_id)
}

fn link_url(
    conn: &Connection,
    file_change_id: &str,
    url_id: i64,
    count: i64,
    policy: DuplicatePolicy,
) -> Result<()> {
    match policy {
        DuplicatePolicy::Distinct => {
            conn.execute(
                "INSERT OR IGNORE INTO file_url (file_change_id, url_id) VALUES (?1, ?2)",
                params![file_change_id, url_id],
            )?;
        }
        DuplicatePolicy::CountOccurrences => {
            conn.execute(
                "INSERT INTO file_url (file_change_id, url_id, occurrences) VALUES (?1, ?2, ?3)
                 ON CONFLICT (file_change_id, url_id) DO UPDATE SET occurrences = excluded.occurrences",
                params![file_change_id, url_id, count],
            )?;
        }
    }
    Ok(())
}

pub(crate) fn stored_url_from_row(row: &Row<'_>) -> rusqlite::Result<StoredUrl> {
    Ok(StoredUrl {
        url_id: row.get(0)?,
        url: ExtractedUrl {
            raw: row.get(1)?,
            scheme: row.get(2)?,
            host: row.get(3)?,
            path: row.get(4)?,
            query: row.get(5)?,
            fragment: row.get(6)?,
        },
    })
}

pub(crate) fn file_change_from_row(row: &Row<'_>) -> rusqlite::Result<FileChange> {
    Ok(FileChange {
        file_change_id: row.get(0)?,
        filename: row.get(1)?,
        path: row.get(2)?,
        code: row.get(3)?,
        programming_language: row.get(4)?,
    })
}

pub(crate) fn cwe_from_row(row: &Row<'_>) -> rusqlite::Result<CweRecord> {
    Ok(CweRecord {
        cwe_id: row.get(0)?,
        cwe_name: row.get(1)?,
        description: row.get(2)?,
        extended_description: row.get(3)?,
        url: row.get(4)?,
        is_category: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url_matcher::decompose;
    use tempfile::TempDir;

    fn file_change(id: &str) -> FileChange {
        FileChange {
            file_change_id: id.to_string(),
            filename: "parser.c".to_string(),
            path: Some("src/parser.c".to_string()),
            code: Some("// http://a.com/x".to_string()),
            programming_language: "C".to_string(),
        }
    }

    fn cwe(id: &str) -> CweRecord {
        CweRecord {
            cwe_id: id.to_string(),
            cwe_name: Some("Out-of-bounds Write".to_string()),
            description: None,
            extended_description: None,
            url: Some(format!("https://cwe.mitre.org/data/definitions/{}.html", id)),
            is_category: Some(false),
        }
    }

    fn url(raw: &str) -> ExtractedUrl {
        decompose(raw).unwrap()
    }

    #[test]
    fn test_open_creates_empty_store() {
        let temp = TempDir::new().unwrap();
        let store = UrlStore::open(temp.path().join("urls.db")).unwrap();
        assert_eq!(store.counts().unwrap(), StoreCounts::default());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("urls.db");
        {
            let mut store = UrlStore::open(&path).unwrap();
            store
                .add_file_change(&file_change("fc1"), &[url("http://a.com/x")], &cwe("787"), DuplicatePolicy::Distinct)
                .unwrap();
        }
        let store = UrlStore::open(&path).unwrap();
        assert_eq!(store.counts().unwrap().urls, 1);
    }

    #[test]
    fn test_add_file_change_links_everything() {
        let temp = TempDir::new().unwrap();
        let mut store = UrlStore::open(temp.path().join("urls.db")).unwrap();

        let urls = vec![url("http://a.com/x"), url("https://b.org/y?z=1")];
        store
            .add_file_change(&file_change("fc1"), &urls, &cwe("787"), DuplicatePolicy::Distinct)
            .unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.file_changes, 1);
        assert_eq!(counts.urls, 2);
        assert_eq!(counts.cwes, 1);
        assert_eq!(counts.file_urls, 2);
        assert_eq!(counts.change_cwes, 1);

        let stored = store.urls().unwrap();
        assert_eq!(stored[1].url.query, "z=1");
        assert_eq!(store.file_change("fc1").unwrap().unwrap(), file_change("fc1"));
        assert_eq!(store.cwes_for("fc1").unwrap(), vec![cwe("787")]);
    }

    #[test]
    fn test_urls_are_shared_across_files() {
        let temp = TempDir::new().unwrap();
        let mut store = UrlStore::open(temp.path().join("urls.db")).unwrap();

        let shared = [url("http://a.com/x")];
        store.add_file_change(&file_change("fc1"), &shared, &cwe("787"), DuplicatePolicy::Distinct).unwrap();
        store.add_file_change(&file_change("fc2"), &shared, &cwe("787"), DuplicatePolicy::Distinct).unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.urls, 1);
        assert_eq!(counts.file_urls, 2);
        assert_eq!(counts.cwes, 1);

        let url_id = store.urls().unwrap()[0].url_id;
        let links = store.url_links(url_id).unwrap();
        assert_eq!(links, vec![("fc1".to_string(), 1), ("fc2".to_string(), 1)]);
    }

    #[test]
    fn test_second_cwe_only_adds_link() {
        let temp = TempDir::new().unwrap();
        let mut store = UrlStore::open(temp.path().join("urls.db")).unwrap();

        store
            .add_file_change(&file_change("fc1"), &[url("http://a.com/x")], &cwe("787"), DuplicatePolicy::Distinct)
            .unwrap();
        store
            .add_file_change(&file_change("fc1"), &[], &cwe("125"), DuplicatePolicy::Distinct)
            .unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.file_changes, 1);
        assert_eq!(counts.file_urls, 1);
        assert_eq!(counts.cwes, 2);
        assert_eq!(counts.change_cwes, 2);
    }

    #[test]
    fn test_distinct_policy_ignores_repeats() {
        let temp = TempDir::new().unwrap();
        let mut store = UrlStore::open(temp.path().join("urls.db")).unwrap();

        let repeated = vec![url("http://a.com/x"), url("http://a.com/x")];
        store
            .add_file_change(&file_change("fc1"), &repeated, &cwe("787"), DuplicatePolicy::Distinct)
            .unwrap();

        assert_eq!(store.occurrences("fc1", "http://a.com/x").unwrap(), Some(1));
    }

    #[test]
    fn test_count_policy_counts_repeats() {
        let temp = TempDir::new().unwrap();
        let mut store = UrlStore::open(temp.path().join("urls.db")).unwrap();

        let repeated = vec![url("http://a.com/x"), url("http://a.com/x"), url("http://a.com/x")];
        store
            .add_file_change(&file_change("fc1"), &repeated, &cwe("787"), DuplicatePolicy::CountOccurrences)
            .unwrap();

        assert_eq!(store.counts().unwrap().file_urls, 1);
        assert_eq!(store.occurrences("fc1", "http://a.com/x").unwrap(), Some(3));
        assert_eq!(store.occurrences("fc1", "http://other.com/x").unwrap(), None);
    }

    #[test]
    fn test_count_policy_re_adding_keeps_counts() {
        let temp = TempDir::new().unwrap();
        let mut store = UrlStore::open(temp.path().join("urls.db")).unwrap();

        let repeated = vec![url("http://a.com/x"), url("http://b.com/y"), url("http://a.com/x")];
        for _ in 0..2 {
            store
                .add_file_change(&file_change("fc1"), &repeated, &cwe("787"), DuplicatePolicy::CountOccurrences)
                .unwrap();
        }

        assert_eq!(store.occurrences("fc1", "http://a.com/x").unwrap(), Some(2));
        assert_eq!(store.occurrences("fc1", "http://b.com/y").unwrap(), Some(1));
    }
}
