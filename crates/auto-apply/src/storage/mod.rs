//! File-backed stores for the state a run carries between invocations.

mod audit_csv;
mod config_file;
mod waitlist_file;

pub use audit_csv::CsvAuditLog;
pub use config_file::{read_credentials, JsonConfigStore};
pub use waitlist_file::JsonWaitlistStore;

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::workflows::applications::StoreError;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn json_error(path: &Path) -> impl FnOnce(serde_json::Error) -> StoreError + '_ {
    move |source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    }
}

/// Write through a sibling temp file so readers never see a half-written file.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let mut staged = OsString::from(path.as_os_str());
    staged.push(".tmp");
    let staged = PathBuf::from(staged);

    fs::write(&staged, contents).map_err(io_error(&staged))?;
    fs::rename(&staged, path).map_err(io_error(path))
}

#[cfg(test)]
pub(crate) fn scratch_dir(label: &str) -> PathBuf {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    let dir = std::env::temp_dir().join(format!(
        "auto-apply-{label}-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}
