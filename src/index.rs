//! Release index: two CSV tables on the metadata branch.
//!
//! | File | Columns |
//! |------|---------|
//! | `java-library-example-index.csv` | `id, name, language, tag, package, version, date_epoch, date` |
//! | `java-library-example-list.csv` | `id, file, release_id` |
//!
//! The in-memory form is the two row lists plus next-id watermarks. It is
//! reloaded from disk before every update; the checked-out branch is the
//! source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

pub const RELEASE_FILE: &str = "java-library-example-index.csv";
pub const FILE_LIST_FILE: &str = "java-library-example-list.csv";

const RELEASE_HEADER: [&str; 8] = [
    "id",
    "name",
    "language",
    "tag",
    "package",
    "version",
    "date_epoch",
    "date",
];
const FILE_HEADER: [&str; 3] = ["id", "file", "release_id"];

/// One row of the release table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRow {
    pub id: u64,
    pub name: String,
    pub language: String,
    pub tag: String,
    pub package: String,
    pub version: String,
    pub date_epoch: i64,
    pub date: String,
}

/// One row of the file table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRow {
    pub id: u64,
    pub file: String,
    pub release_id: u64,
}

/// A release to record.
#[derive(Debug, Clone)]
pub struct ReleaseEntry {
    /// Module identifier from the job report.
    pub name: String,
    pub language: String,
    pub tag: String,
    pub package: String,
    pub version: String,
    pub date: DateTime<Utc>,
}

/// Answer of [`ReleaseIndex::query_releases`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRelease {
    pub tag: String,
    pub package: String,
    pub version: String,
    pub date: String,
}

#[derive(Debug, Clone)]
pub struct ReleaseIndex {
    releases: Vec<ReleaseRow>,
    files: Vec<FileRow>,
    next_release_id: u64,
    next_file_id: u64,
}

impl Default for ReleaseIndex {
    fn default() -> Self {
        Self {
            releases: Vec::new(),
            files: Vec::new(),
            next_release_id: 1,
            next_file_id: 1,
        }
    }
}

impl ReleaseIndex {
    /// Load both tables from `dir`. Missing files are empty tables.
    pub fn load(dir: &Path) -> Result<Self> {
        let releases: Vec<ReleaseRow> = read_table(&dir.join(RELEASE_FILE))?;
        let files: Vec<FileRow> = read_table(&dir.join(FILE_LIST_FILE))?;

        let next_release_id = releases.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let next_file_id = files.iter().map(|f| f.id).max().unwrap_or(0) + 1;
        debug!(
            releases = releases.len(),
            files = files.len(),
            "release index loaded"
        );

        Ok(Self {
            releases,
            files,
            next_release_id,
            next_file_id,
        })
    }

    /// Rewrite both tables in `dir`, header first, rows in insertion order.
    pub fn dump(&self, dir: &Path) -> Result<()> {
        write_table(&dir.join(RELEASE_FILE), &RELEASE_HEADER, &self.releases)?;
        write_table(&dir.join(FILE_LIST_FILE), &FILE_HEADER, &self.files)?;
        Ok(())
    }

    pub fn releases(&self) -> &[ReleaseRow] {
        &self.releases
    }

    pub fn files(&self) -> &[FileRow] {
        &self.files
    }

    /// Record a release and the files it published.
    ///
    /// Returns `false`, leaving the index untouched, when a release with the
    /// same `(name, language)` is already recorded. A file path already owned
    /// by an older release moves to the new one.
    pub fn new_release(&mut self, entry: &ReleaseEntry, files: &[String]) -> bool {
        if self
            .releases
            .iter()
            .any(|r| r.name == entry.name && r.language == entry.language)
        {
            info!(
                name = %entry.name,
                language = %entry.language,
                "release already in index"
            );
            return false;
        }

        let release_id = self.next_release_id;
        self.next_release_id += 1;
        self.releases.push(ReleaseRow {
            id: release_id,
            name: entry.name.clone(),
            language: entry.language.clone(),
            tag: entry.tag.clone(),
            package: entry.package.clone(),
            version: entry.version.clone(),
            date_epoch: entry.date.timestamp(),
            date: entry.date.format("%m/%d/%Y").to_string(),
        });

        for file in files {
            let before = self.files.len();
            self.files.retain(|row| &row.file != file);
            if self.files.len() != before {
                debug!(file = %file, "file superseded by newer release");
            }
            self.files.push(FileRow {
                id: self.next_file_id,
                file: file.clone(),
                release_id,
            });
            self.next_file_id += 1;
        }

        info!(
            name = %entry.name,
            release_id,
            files = files.len(),
            "release added to index"
        );
        true
    }

    /// Every recorded release of `language`.
    pub fn query_releases(&self, language: &str) -> Vec<IndexedRelease> {
        self.releases
            .iter()
            .filter(|r| r.language == language)
            .map(|r| IndexedRelease {
                tag: r.tag.clone(),
                package: r.package.clone(),
                version: r.version.clone(),
                date: r.date.clone(),
            })
            .collect()
    }
}

/// Paths worth indexing from a job report: code files, without the `.json`
/// metadata sidecars.
pub fn code_files(files: &[String]) -> Vec<String> {
    files
        .iter()
        .filter(|file| !file.ends_with(".json"))
        .cloned()
        .collect()
}

fn read_table<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| PipelineError::index("read", format!("{}: {}", path.display(), e)))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| PipelineError::index("read", format!("{}: {}", path.display(), e)))
}

fn write_table<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<()> {
    let write_error =
        |e: csv::Error| PipelineError::index("write", format!("{}: {}", path.display(), e));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(write_error)?;
    writer.write_record(header).map_err(write_error)?;
    for row in rows {
        writer.serialize(row).map_err(write_error)?;
    }
    writer
        .flush()
        .map_err(|e| PipelineError::io(format!("flush {}", path.display()), e))?;
    Ok(())
}
