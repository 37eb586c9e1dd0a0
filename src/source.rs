//! Read-only access to a vulnerability-fix dataset
//!
//! The dataset is a SQLite database with the usual fix-mining layout:
//! `file_change` rows tied to commits, `fixes` mapping commits to CVEs, and
//! `cwe_classification` / `cwe` describing each CVE's weakness. One output row
//! is produced per (file change, CWE) pair, so a file body shows up once for
//! every CWE its fix is classified under.

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};

use crate::models::{CweRecord, FileChange, FixRow};

const FIX_ROWS_QUERY: &str = "
    SELECT
        file_change.file_change_id,
        file_change.filename,
        file_change.old_path,
        file_change.code_before,
        file_change.programming_language,
        cwe.cwe_id,
        cwe.cwe_name,
        cwe.description,
        cwe.extended_description,
        cwe.url,
        cwe.is_category
    FROM file_change
    JOIN fixes ON file_change.hash = fixes.hash
    JOIN cwe_classification ON fixes.cve_id = cwe_classification.cve_id
    JOIN cwe ON cwe_classification.cwe_id = cwe.cwe_id
    ORDER BY file_change.file_change_id, cwe.cwe_id";

/// A fix dataset opened for reading
pub struct FixDataset {
    path: PathBuf,
    conn: Connection,
}

impl FixDataset {
    /// Open an existing dataset read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            anyhow::bail!("Fix dataset not found: {}", path.display());
        }

        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open fix dataset {}", path.display()))?;

        log::info!("Opened fix dataset {}", path.display());
        Ok(Self { path, conn })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of joined (file change, CWE) rows
    pub fn count_rows(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM ({})", FIX_ROWS_QUERY), [], |row| row.get(0))
            .context("Failed to count fix dataset rows")?;
        Ok(n as usize)
    }

    /// Stream every joined row to `f` in batches of at most `batch_size`
    ///
    /// Rows are read from a single cursor; only one batch is held in memory.
    /// Returns the number of rows delivered.
    pub fn for_each_batch<F>(&self, batch_size: usize, mut f: F) -> Result<usize>
    where
        F: FnMut(&[FixRow]) -> Result<()>,
    {
        if batch_size == 0 {
            anyhow::bail!("Batch size must be greater than zero");
        }

        let mut stmt = self
            .conn
            .prepare(FIX_ROWS_QUERY)
            .context("Fix dataset is missing file_change/fixes/cwe_classification/cwe tables")?;
        let mut rows = stmt.query([])?;

        let mut batch = Vec::with_capacity(batch_size);
        let mut delivered = 0;

        while let Some(row) = rows.next()? {
            batch.push(fix_row_from_row(row)?);
            if batch.len() == batch_size {
                f(&batch)?;
                delivered += batch.len();
                batch.clear();
            }
        }

        if !batch.is_empty() {
            f(&batch)?;
            delivered += batch.len();
        }

        Ok(delivered)
    }
}

fn fix_row_from_row(row: &Row<'_>) -> rusqlite::Result<FixRow> {
    Ok(FixRow {
        file_change: FileChange {
            file_change_id: row.get(0)?,
            filename: row.get(1)?,
            path: row.get(2)?,
            code: row.get(3)?,
            programming_language: row.get(4)?,
        },
        cwe: CweRecord {
            cwe_id: row.get(5)?,
            cwe_name: row.get(6)?,
            description: row.get(7)?,
            extended_description: row.get(8)?,
            url: row.get(9)?,
            is_category: row.get(10)?,
        },
    })
}
