//! Host-backed sandbox implementation.
//!
//! # Design
//! - Sandbox-absolute paths resolve below a configured host root; `..` is rejected.
//! - Processes run through `sh -c` with piped output captured into bounded buffers.
//! - File operations are bounded by [`FILE_OP_TIMEOUT`]; interrupted and reset IO
//!   errors are tagged as transient resets.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{debug, error, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::client::SandboxClient;
use crate::error::{SandboxError, SandboxResult};
use crate::model::{ProcessLogs, ProcessStatus, SupervisedProcess};

/// Upper bound on a single file operation.
pub const FILE_OP_TIMEOUT: Duration = Duration::from_secs(15);
const PORT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const PORT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const LOG_CAPACITY_BYTES: usize = 64 * 1024;

struct ProcessSlot {
    record: SupervisedProcess,
    child: Child,
    logs: Arc<Mutex<ProcessLogs>>,
}

impl ProcessSlot {
    fn refresh(&mut self) {
        if !self.record.status.is_active() {
            return;
        }
        match self.child.try_wait() {
            Ok(Some(exit)) => {
                let next = if exit.success() {
                    ProcessStatus::Completed
                } else {
                    ProcessStatus::Failed
                };
                self.record.exit_code = exit.code();
                if let Err(err) = self.record.transition(next) {
                    warn!(error = %err, id = %self.record.id, "ignored invalid status transition");
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, id = %self.record.id, "failed to poll process status");
            }
        }
    }
}

#[derive(Clone, Copy)]
enum LogStream {
    Stdout,
    Stderr,
}

/// Sandbox backed by the local host: a directory root and child processes.
#[derive(Clone)]
pub struct LocalSandbox {
    root: PathBuf,
    processes: Arc<Mutex<Vec<ProcessSlot>>>,
}

impl LocalSandbox {
    /// Create a sandbox rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            processes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Resolve a sandbox-absolute path to a host path below the root.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::InvalidPath`] for relative paths or paths that would
    /// escape the root.
    pub fn resolve(&self, path: &str) -> SandboxResult<PathBuf> {
        let relative = path.strip_prefix('/').ok_or_else(|| SandboxError::InvalidPath {
            path: path.to_string(),
            reason: "not_absolute",
        })?;
        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(SandboxError::InvalidPath {
                        path: path.to_string(),
                        reason: "escapes_root",
                    });
                }
            }
        }
        Ok(resolved)
    }

    fn to_sandbox_path(&self, host: &Path) -> Option<String> {
        let relative = host.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(format!("/{}", parts.join("/")))
    }

    fn slots(&self) -> MutexGuard<'_, Vec<ProcessSlot>> {
        match self.processes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("sandbox process table mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }

    /// Refresh the process and report whether it is still active.
    fn poll_process(&self, id: &str) -> SandboxResult<()> {
        let mut slots = self.slots();
        let slot = slots
            .iter_mut()
            .find(|slot| slot.record.id == id)
            .ok_or_else(|| SandboxError::UnknownProcess { id: id.to_string() })?;
        slot.refresh();
        if slot.record.status.is_terminal() {
            return Err(SandboxError::ProcessExited {
                id: id.to_string(),
                exit_code: slot.record.exit_code,
            });
        }
        Ok(())
    }

    fn mark_running(&self, id: &str) {
        let mut slots = self.slots();
        if let Some(slot) = slots.iter_mut().find(|slot| slot.record.id == id)
            && slot.record.status == ProcessStatus::Starting
            && let Err(err) = slot.record.transition(ProcessStatus::Running)
        {
            warn!(error = %err, id, "failed to mark process running");
        }
    }

    async fn poll_port(&self, id: &str, port: u16) -> SandboxResult<()> {
        loop {
            self.poll_process(id)?;
            let connect = TcpStream::connect(("127.0.0.1", port));
            if let Ok(Ok(_stream)) = tokio::time::timeout(PORT_CONNECT_TIMEOUT, connect).await {
                self.mark_running(id);
                return Ok(());
            }
            tokio::time::sleep(PORT_POLL_INTERVAL).await;
        }
    }
}

async fn bounded<T, F>(operation: &'static str, fut: F) -> SandboxResult<T>
where
    F: Future<Output = SandboxResult<T>>,
{
    tokio::time::timeout(FILE_OP_TIMEOUT, fut)
        .await
        .map_err(|_| SandboxError::Timeout {
            operation,
            after: FILE_OP_TIMEOUT,
        })?
}

fn pump_logs<R>(reader: R, logs: Arc<Mutex<ProcessLogs>>, stream: LogStream)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let mut guard = match logs.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    let buffer = match stream {
                        LogStream::Stdout => &mut guard.stdout,
                        LogStream::Stderr => &mut guard.stderr,
                    };
                    buffer.push_str(&line);
                    buffer.push('\n');
                    if buffer.len() > LOG_CAPACITY_BYTES {
                        let mut cut = buffer.len() - LOG_CAPACITY_BYTES;
                        while !buffer.is_char_boundary(cut) {
                            cut += 1;
                        }
                        buffer.drain(..cut);
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    debug!(error = %err, "process output stream closed");
                    break;
                }
            }
        }
    });
}

#[async_trait]
impl SandboxClient for LocalSandbox {
    async fn list_processes(&self) -> SandboxResult<Vec<SupervisedProcess>> {
        let mut slots = self.slots();
        Ok(slots
            .iter_mut()
            .map(|slot| {
                slot.refresh();
                slot.record.clone()
            })
            .collect())
    }

    async fn spawn(&self, command: &str) -> SandboxResult<SupervisedProcess> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let logs = Arc::new(Mutex::new(ProcessLogs::default()));
        if let Some(stdout) = child.stdout.take() {
            pump_logs(stdout, Arc::clone(&logs), LogStream::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            pump_logs(stderr, Arc::clone(&logs), LogStream::Stderr);
        }

        let record = SupervisedProcess::starting(format!("proc-{}", Uuid::new_v4()), command);
        debug!(id = %record.id, command, "spawned sandbox process");
        self.slots().push(ProcessSlot {
            record: record.clone(),
            child,
            logs,
        });
        Ok(record)
    }

    async fn process_logs(&self, id: &str) -> SandboxResult<ProcessLogs> {
        let slots = self.slots();
        let slot = slots
            .iter()
            .find(|slot| slot.record.id == id)
            .ok_or_else(|| SandboxError::UnknownProcess { id: id.to_string() })?;
        let logs = match slot.logs.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        Ok(logs)
    }

    async fn wait_for_port(&self, id: &str, port: u16, timeout: Duration) -> SandboxResult<()> {
        tokio::time::timeout(timeout, self.poll_port(id, port))
            .await
            .map_err(|_| SandboxError::Timeout {
                operation: "wait_for_port",
                after: timeout,
            })?
    }

    async fn list_files(&self, root: &str) -> SandboxResult<Vec<String>> {
        let host_root = self.resolve(root)?;
        let sandbox_root = root.to_string();
        let this = self.clone();
        bounded("list_files", async move {
            let walked = tokio::task::spawn_blocking(move || -> SandboxResult<Vec<String>> {
                let mut files = Vec::new();
                for entry in WalkDir::new(&host_root).follow_links(false) {
                    let entry = entry.map_err(|err| {
                        let source = err
                            .into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                        SandboxError::from_io("list_files", &sandbox_root, source)
                    })?;
                    if entry.file_type().is_file()
                        && let Some(path) = this.to_sandbox_path(entry.path())
                    {
                        files.push(path);
                    }
                }
                files.sort();
                Ok(files)
            })
            .await;
            walked.map_err(|err| SandboxError::Io {
                operation: "list_files.join",
                path: root.to_string(),
                source: std::io::Error::other(err.to_string()),
            })?
        })
        .await
    }

    async fn read_file(&self, path: &str) -> SandboxResult<Vec<u8>> {
        let host = self.resolve(path)?;
        bounded("read_file", async {
            tokio::fs::read(&host)
                .await
                .map_err(|source| SandboxError::from_io("read_file", path, source))
        })
        .await
    }

    async fn write_file(&self, path: &str, bytes: &[u8]) -> SandboxResult<()> {
        let host = self.resolve(path)?;
        bounded("write_file", async {
            tokio::fs::write(&host, bytes)
                .await
                .map_err(|source| SandboxError::from_io("write_file", path, source))
        })
        .await
    }

    async fn create_dir_all(&self, path: &str) -> SandboxResult<()> {
        let host = self.resolve(path)?;
        bounded("create_dir_all", async {
            tokio::fs::create_dir_all(&host)
                .await
                .map_err(|source| SandboxError::from_io("create_dir_all", path, source))
        })
        .await
    }

    async fn file_exists(&self, path: &str) -> SandboxResult<bool> {
        let host = self.resolve(path)?;
        bounded("file_exists", async {
            match tokio::fs::metadata(&host).await {
                Ok(metadata) => Ok(metadata.is_file()),
                Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(source) => Err(SandboxError::from_io("file_exists", path, source)),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn resolve_rejects_relative_and_escaping_paths() {
        let sandbox = LocalSandbox::new("/srv/sandbox");
        assert!(matches!(
            sandbox.resolve("data/x"),
            Err(SandboxError::InvalidPath {
                reason: "not_absolute",
                ..
            })
        ));
        assert!(matches!(
            sandbox.resolve("/data/../../etc/passwd"),
            Err(SandboxError::InvalidPath {
                reason: "escapes_root",
                ..
            })
        ));
        assert_eq!(
            sandbox.resolve("/data/./config/x.json").ok(),
            Some(PathBuf::from("/srv/sandbox/data/config/x.json"))
        );
    }

    #[tokio::test]
    async fn file_operations_round_trip_below_root() -> Result<()> {
        let temp = TempDir::new()?;
        let sandbox = LocalSandbox::new(temp.path());

        sandbox.create_dir_all("/data/config/nested").await?;
        sandbox.write_file("/data/config/a.json", b"{}").await?;
        sandbox
            .write_file("/data/config/nested/b.txt", b"bee")
            .await?;

        assert!(temp.path().join("data/config/nested/b.txt").is_file());
        assert_eq!(sandbox.read_file("/data/config/a.json").await?, b"{}");
        assert!(sandbox.file_exists("/data/config/a.json").await?);
        assert!(!sandbox.file_exists("/data/config/missing.json").await?);
        assert!(!sandbox.file_exists("/data/config/nested").await?);

        let files = sandbox.list_files("/data/config/").await?;
        assert_eq!(
            files,
            vec![
                "/data/config/a.json".to_string(),
                "/data/config/nested/b.txt".to_string(),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_files_are_tagged_not_found() -> Result<()> {
        let temp = TempDir::new()?;
        let sandbox = LocalSandbox::new(temp.path());
        let err = sandbox
            .read_file("/nope.txt")
            .await
            .expect_err("missing file should fail");
        assert_eq!(err.kind(), crate::SandboxErrorKind::NotFound);
        assert!(sandbox.list_files("/absent/").await.is_err());
        Ok(())
    }
}
