use std::fs;
use std::path::{Path, PathBuf};
use chrono::Utc;
use log::warn;
use sha2::{Digest, Sha256};
use thiserror::Error;
use crate::transaction::{redact_all, BatchTransaction};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("batch size must be at least 1")]
    ZeroSize,
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not encode batch: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Splits `transactions` into consecutive batches of at most `size`;
/// only the last batch may be shorter.
pub fn split_batches(
    transactions: &[BatchTransaction],
    size: usize,
) -> Result<std::slice::Chunks<'_, BatchTransaction>, BatchError> {
    if size == 0 {
        return Err(BatchError::ZeroSize);
    }
    Ok(transactions.chunks(size))
}

/// Batch file handed to `itc transfer --file`. Deleted on drop.
#[derive(Debug)]
pub struct BatchFile {
    path: PathBuf,
}

impl BatchFile {
    pub fn write(dir: &Path, batch: &[BatchTransaction]) -> Result<Self, BatchError> {
        let body = serde_json::to_vec(batch)?;
        let digest = hex::encode(Sha256::digest(&body));
        let path = dir.join(format!("itc-csv-{}.json", &digest[..16]));

        // A read-only leftover from an interrupted run would refuse the write.
        match fs::remove_file(&path) {
            Ok(()) => warn!("Replaced stale batch file {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(BatchError::Write { path, source }),
        }
        fs::write(&path, &body).map_err(|source| BatchError::Write { path: path.clone(), source })?;
        let file = BatchFile { path };
        file.make_read_only()?;
        Ok(file)
    }

    #[cfg(unix)]
    fn make_read_only(&self) -> Result<(), BatchError> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&self.path, fs::Permissions::from_mode(0o400))
            .map_err(|source| BatchError::Write { path: self.path.clone(), source })
    }

    #[cfg(not(unix))]
    fn make_read_only(&self) -> Result<(), BatchError> {
        let mut permissions = fs::metadata(&self.path)
            .map_err(|source| BatchError::Write { path: self.path.clone(), source })?
            .permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&self.path, permissions)
            .map_err(|source| BatchError::Write { path: self.path.clone(), source })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BatchFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Could not remove batch file {}: {}", self.path.display(), e);
        }
    }
}

/// Per-batch record of what was sent and what the CLI answered.
#[derive(Debug, Clone)]
pub struct BatchLog {
    path: PathBuf,
}

impl BatchLog {
    pub fn new(dir: &Path, index: usize) -> Self {
        let now = Utc::now();
        let name = format!(
            "batch_tx_{}.{:06}-{}.log",
            now.timestamp(),
            now.timestamp_subsec_micros(),
            index
        );
        BatchLog { path: dir.join(name) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Literal passphrases never reach the log.
    pub fn write(&self, batch: &[BatchTransaction], response: &str) -> Result<(), BatchError> {
        let sent = serde_json::to_string_pretty(&redact_all(batch))?;
        let body = format!("Sent-tx: {}\nResponse: {}", sent, response);
        fs::write(&self.path, body).map_err(|source| BatchError::Write { path: self.path.clone(), source })
    }
}
