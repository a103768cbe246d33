//! Collaborator trait implemented by sandbox backends.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SandboxResult;
use crate::model::{ProcessLogs, SupervisedProcess};

/// Process control and file access inside a sandbox.
///
/// Paths are sandbox-absolute (`/data/config/x.json`). Implementations tag every
/// error with a [`crate::SandboxErrorKind`]; callers decide retries from that tag.
#[async_trait]
pub trait SandboxClient: Send + Sync {
    /// List every process the sandbox knows about, in launch order.
    async fn list_processes(&self) -> SandboxResult<Vec<SupervisedProcess>>;

    /// Launch `command` and return its record in `Starting` status.
    async fn spawn(&self, command: &str) -> SandboxResult<SupervisedProcess>;

    /// Retrieve captured output for a process.
    async fn process_logs(&self, id: &str) -> SandboxResult<ProcessLogs>;

    /// Wait until the process accepts connections on `port`, bounded by `timeout`.
    async fn wait_for_port(&self, id: &str, port: u16, timeout: Duration) -> SandboxResult<()>;

    /// List every regular file below `root`, recursively, as sandbox-absolute paths.
    async fn list_files(&self, root: &str) -> SandboxResult<Vec<String>>;

    /// Read a file's bytes.
    async fn read_file(&self, path: &str) -> SandboxResult<Vec<u8>>;

    /// Write bytes to a file, replacing existing content.
    async fn write_file(&self, path: &str, bytes: &[u8]) -> SandboxResult<()>;

    /// Create a directory and all missing parents.
    async fn create_dir_all(&self, path: &str) -> SandboxResult<()>;

    /// Whether a regular file exists at `path`.
    async fn file_exists(&self, path: &str) -> SandboxResult<bool>;
}
