use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::{fs, io};

use super::ServiceIdentity;

/// Receives the raw body of a response that broke the JSON contract.
pub trait DiagnosticSink: Debug + Send + Sync {
    /// Persists `raw` and reports where it went.
    fn capture(&self, service: ServiceIdentity, raw: &[u8]) -> io::Result<PathBuf>;
}

/// Writes every capture to the same file, replacing the previous one.
#[derive(Debug, Clone)]
pub struct FileDiagnosticSink {
    path: PathBuf,
}

impl FileDiagnosticSink {
    pub const FILE_NAME: &'static str = "non_json_dump.html";

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(Self::FILE_NAME),
        }
    }
}

impl DiagnosticSink for FileDiagnosticSink {
    fn capture(&self, service: ServiceIdentity, raw: &[u8]) -> io::Result<PathBuf> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, raw)?;
        tracing::debug!(%service, path = %self.path.display(), bytes = raw.len(), "Saved raw response");
        Ok(self.path.clone())
    }
}
