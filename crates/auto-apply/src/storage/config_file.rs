use std::fs;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{io_error, json_error, write_atomic};
use crate::workflows::applications::{
    parse_timestamp, ConfigStore, CredentialBlob, DocumentBindings, DocumentId, DocumentKind,
    StoreError, StoredConfig,
};
use crate::workflows::handshake::sanitize_feed_url;

/// On-disk shape of the run configuration.
#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    valid: bool,
    date: String,
    url: String,
    #[serde(default)]
    resume: Option<u64>,
    #[serde(default)]
    cover: Option<u64>,
    #[serde(default)]
    transcript: Option<u64>,
    #[serde(default)]
    cookies: CredentialBlob,
}

#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn invalid(&self, reason: impl Into<String>) -> StoreError {
        StoreError::Invalid {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn decode(&self, file: ConfigFile) -> Result<StoredConfig, StoreError> {
        let watermark = parse_timestamp(&file.date)
            .ok_or_else(|| self.invalid(format!("unreadable date '{}'", file.date)))?;
        let feed_url = sanitize_feed_url(&file.url).map_err(|err| self.invalid(err.to_string()))?;

        Ok(StoredConfig {
            auth_valid: file.valid,
            watermark,
            feed_url,
            documents: DocumentBindings::standard(
                file.resume.map(DocumentId),
                file.cover.map(DocumentId),
                file.transcript.map(DocumentId),
            ),
            credentials: file.cookies,
        })
    }
}

fn encode(config: &StoredConfig) -> ConfigFile {
    let document = |kind| config.documents.get(kind).map(|id| id.0);
    ConfigFile {
        valid: config.auth_valid,
        date: config.watermark.to_rfc3339_opts(SecondsFormat::Micros, true),
        url: config.feed_url.clone(),
        resume: document(DocumentKind::RESUME),
        cover: document(DocumentKind::COVER_LETTER),
        transcript: document(DocumentKind::TRANSCRIPT),
        cookies: config.credentials.clone(),
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<StoredConfig, StoreError> {
        let raw = fs::read_to_string(&self.path).map_err(io_error(&self.path))?;
        let file: ConfigFile = serde_json::from_str(&raw).map_err(json_error(&self.path))?;
        self.decode(file)
    }

    fn save(&self, config: &StoredConfig) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(&encode(config)).map_err(json_error(&self.path))?;
        write_atomic(&self.path, &body)?;
        debug!(path = %self.path.display(), valid = config.auth_valid, "config saved");
        Ok(())
    }
}

/// Read a cookie export: a flat JSON object of cookie names to values.
pub fn read_credentials(path: &Path) -> Result<CredentialBlob, StoreError> {
    let raw = fs::read_to_string(path).map_err(io_error(path))?;
    let blob: CredentialBlob = serde_json::from_str(&raw).map_err(json_error(path))?;
    if blob.is_empty() {
        return Err(StoreError::Invalid {
            path: path.to_path_buf(),
            reason: "no cookies found".to_string(),
        });
    }
    Ok(blob)
}
