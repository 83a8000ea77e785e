use std::collections::HashSet;
use std::path::PathBuf;

use super::domain::{AuditEntry, CredentialBlob, JobRecord, PostingId, StoredConfig};

/// Persistence failure. Always fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path}: malformed json: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{path}: malformed csv: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("{path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Run configuration: auth flag, watermark, documents, credentials and feed URL.
pub trait ConfigStore {
    fn load(&self) -> Result<StoredConfig, StoreError>;
    fn save(&self, config: &StoredConfig) -> Result<(), StoreError>;
}

/// Postings deferred by the previous run.
pub trait WaitlistStore {
    /// A store that was never written yields an empty list.
    fn load(&self) -> Result<Vec<JobRecord>, StoreError>;
    /// Replaces the whole list.
    fn save(&self, records: &[JobRecord]) -> Result<(), StoreError>;
}

/// Append-only trail of successful submissions.
pub trait AuditLog {
    fn append(&self, entries: &[AuditEntry]) -> Result<(), StoreError>;
    /// Every posting ever recorded, used to avoid applying twice.
    fn applied_ids(&self) -> Result<HashSet<PostingId>, StoreError>;
}

/// Operator recovery after a credential failure: install fresh cookies and mark
/// the credential usable again. Everything else in the stored config is kept.
pub fn refresh_credentials<C: ConfigStore + ?Sized>(
    store: &C,
    credentials: CredentialBlob,
) -> Result<StoredConfig, StoreError> {
    let mut config = store.load()?;
    config.credentials = credentials;
    config.auth_valid = true;
    store.save(&config)?;
    Ok(config)
}
