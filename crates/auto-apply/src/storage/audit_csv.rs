use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use serde::Serialize;
use tracing::warn;

use super::io_error;
use crate::workflows::applications::{AuditEntry, AuditLog, PostingId, StoreError};

#[derive(Debug, Serialize)]
struct AuditRow<'a> {
    id: u64,
    posting: &'a str,
    employer: &'a str,
    applied_at: String,
}

/// Headerless, append-only CSV: `id, posting, employer, applied_at`.
#[derive(Debug, Clone)]
pub struct CsvAuditLog {
    path: PathBuf,
}

impl CsvAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn csv_error(&self) -> impl FnOnce(csv::Error) -> StoreError + '_ {
        move |source| StoreError::Csv {
            path: self.path.clone(),
            source,
        }
    }

    fn open_for_read(path: &Path) -> Result<Option<File>, StoreError> {
        match File::open(path) {
            Ok(file) => Ok(Some(file)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(path)(err)),
        }
    }
}

impl AuditLog for CsvAuditLog {
    fn append(&self, entries: &[AuditEntry]) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error(&self.path))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        for entry in entries {
            writer
                .serialize(AuditRow {
                    id: entry.posting_id.0,
                    posting: &entry.posting_name,
                    employer: &entry.employer_name,
                    applied_at: entry
                        .applied_at
                        .to_rfc3339_opts(SecondsFormat::Secs, true),
                })
                .map_err(self.csv_error())?;
        }
        writer.flush().map_err(io_error(&self.path))
    }

    fn applied_ids(&self) -> Result<HashSet<PostingId>, StoreError> {
        let Some(file) = Self::open_for_read(&self.path)? else {
            return Ok(HashSet::new());
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut ids = HashSet::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(self.csv_error())?;
            match row.get(0).and_then(|id| id.parse::<u64>().ok()) {
                Some(id) => {
                    ids.insert(PostingId(id));
                }
                None => warn!(line = line + 1, path = %self.path.display(), "skipping audit row without a posting id"),
            }
        }
        Ok(ids)
    }
}
