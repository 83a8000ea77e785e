use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{io_error, json_error, write_atomic};
use crate::workflows::applications::{JobRecord, StoreError, WaitlistStore};
use crate::workflows::handshake::feed::parse_entry;

/// A waitlist element: a saved record, or a raw feed entry as older tooling wrote them.
#[derive(Deserialize)]
#[serde(untagged)]
enum WaitlistEntry {
    Record(JobRecord),
    Feed(Value),
}

/// Deferred postings as a JSON array.
#[derive(Debug, Clone)]
pub struct JsonWaitlistStore {
    path: PathBuf,
}

impl JsonWaitlistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WaitlistStore for JsonWaitlistStore {
    fn load(&self) -> Result<Vec<JobRecord>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(&self.path)(err)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let entries: Vec<WaitlistEntry> =
            serde_json::from_str(&raw).map_err(json_error(&self.path))?;

        Ok(entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                WaitlistEntry::Record(record) => Some(record),
                WaitlistEntry::Feed(raw) => match parse_entry(&raw) {
                    Ok(record) => Some(record),
                    Err(err) => {
                        warn!(index, error = %err, path = %self.path.display(), "dropping unreadable waitlist entry");
                        None
                    }
                },
            })
            .collect())
    }

    fn save(&self, records: &[JobRecord]) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(records).map_err(json_error(&self.path))?;
        write_atomic(&self.path, &body)
    }
}
