//! Scripted sandbox and store doubles.
//!
//! Both doubles are cheap to clone and share state, so a test can hand one clone to the
//! code under test and inspect or re-script the other.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use berth_sandbox::{
    ProcessLogs, ProcessStatus, SandboxClient, SandboxError, SandboxResult, SupervisedProcess,
};
use berth_store::{
    MemoryObjectStore, ObjectMeta, ObjectStore, StoreError, StoreResult, StoredObject,
};
use tracing::error;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!("test double mutex poisoned; continuing with recovered guard");
            poisoned.into_inner()
        }
    }
}

/// Failure injected into a fake sandbox call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The execution environment reset mid-call.
    TransientReset,
    /// The addressed path does not exist.
    NotFound,
    /// A non-transient IO failure.
    Failed,
}

impl Fault {
    fn into_error(self, operation: &'static str, path: &str) -> SandboxError {
        match self {
            Self::TransientReset => SandboxError::TransientReset {
                operation,
                detail: "injected reset".into(),
            },
            Self::NotFound => SandboxError::NotFound {
                operation,
                path: path.to_string(),
            },
            Self::Failed => SandboxError::Io {
                operation,
                path: path.to_string(),
                source: io::Error::other("injected failure"),
            },
        }
    }
}

/// How spawned processes behave while the caller waits for their port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Readiness {
    /// The port opens immediately.
    #[default]
    Ready,
    /// The port never opens; the wait runs to its timeout.
    NeverReady,
    /// The process exits with code 1 before opening the port.
    ExitsEarly,
}

#[derive(Debug)]
struct FaultRule {
    operation: &'static str,
    path: Option<String>,
    fault: Fault,
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct SandboxState {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    processes: Vec<SupervisedProcess>,
    process_logs: HashMap<String, ProcessLogs>,
    spawn_logs: ProcessLogs,
    readiness: Readiness,
    faults: Vec<FaultRule>,
    calls: Vec<&'static str>,
    spawned: usize,
}

impl SandboxState {
    fn call(&mut self, operation: &'static str, path: &str) -> SandboxResult<()> {
        self.calls.push(operation);
        let rule = self.faults.iter_mut().find(|rule| {
            rule.operation == operation
                && rule.path.as_deref().is_none_or(|wanted| wanted == path)
                && rule.remaining != Some(0)
        });
        match rule {
            Some(rule) => {
                if let Some(remaining) = rule.remaining.as_mut() {
                    *remaining -= 1;
                }
                Err(rule.fault.into_error(operation, path))
            }
            None => Ok(()),
        }
    }

    fn add_dirs(&mut self, path: &str) {
        let mut current = path.trim_end_matches('/');
        while !current.is_empty() {
            self.dirs.insert(current.to_string());
            current = current.rsplit_once('/').map_or("", |(parent, _)| parent);
        }
    }

    fn process_mut(&mut self, id: &str) -> SandboxResult<&mut SupervisedProcess> {
        self.processes
            .iter_mut()
            .find(|process| process.id == id)
            .ok_or_else(|| SandboxError::UnknownProcess { id: id.to_string() })
    }
}

/// In-memory sandbox with scriptable faults, processes, and readiness.
#[derive(Debug, Clone, Default)]
pub struct FakeSandbox {
    state: Arc<Mutex<SandboxState>>,
}

impl FakeSandbox {
    /// Empty sandbox: no files, no processes, ports ready immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file (and its parent directories) and return the sandbox.
    #[must_use]
    pub fn with_file(self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.put_file(path, bytes);
        self
    }

    /// Add or replace a file, creating parent directories.
    pub fn put_file(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        let mut state = lock(&self.state);
        if let Some((parent, _)) = path.rsplit_once('/') {
            state.add_dirs(parent);
        }
        state.files.insert(path.to_string(), bytes.into());
    }

    /// Remove a file if present.
    pub fn remove_file(&self, path: &str) {
        lock(&self.state).files.remove(path);
    }

    /// Current contents of a file.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.state).files.get(path).cloned()
    }

    /// Snapshot of every file.
    #[must_use]
    pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
        lock(&self.state).files.clone()
    }

    /// Register a process as if it had been launched earlier.
    pub fn add_process(&self, process: SupervisedProcess) {
        lock(&self.state).processes.push(process);
    }

    /// Decide how spawned processes respond to readiness waits.
    pub fn set_readiness(&self, readiness: Readiness) {
        lock(&self.state).readiness = readiness;
    }

    /// Output attached to every process spawned from now on.
    pub fn set_spawn_logs(&self, logs: ProcessLogs) {
        lock(&self.state).spawn_logs = logs;
    }

    /// Fail calls to `operation` (optionally only for `path`), `times` times or forever.
    pub fn fail(
        &self,
        operation: &'static str,
        path: Option<&str>,
        fault: Fault,
        times: Option<usize>,
    ) {
        lock(&self.state).faults.push(FaultRule {
            operation,
            path: path.map(str::to_string),
            fault,
            remaining: times,
        });
    }

    /// Number of calls made to `operation`, including failed ones.
    #[must_use]
    pub fn calls(&self, operation: &str) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|called| **called == operation)
            .count()
    }

    /// Snapshot of every known process.
    #[must_use]
    pub fn processes(&self) -> Vec<SupervisedProcess> {
        lock(&self.state).processes.clone()
    }
}

#[async_trait]
impl SandboxClient for FakeSandbox {
    async fn list_processes(&self) -> SandboxResult<Vec<SupervisedProcess>> {
        let mut state = lock(&self.state);
        state.call("list_processes", "")?;
        Ok(state.processes.clone())
    }

    async fn spawn(&self, command: &str) -> SandboxResult<SupervisedProcess> {
        let mut state = lock(&self.state);
        state.call("spawn", command)?;
        state.spawned += 1;
        let process = SupervisedProcess::starting(format!("fake-{}", state.spawned), command);
        let logs = state.spawn_logs.clone();
        state.process_logs.insert(process.id.clone(), logs);
        state.processes.push(process.clone());
        Ok(process)
    }

    async fn process_logs(&self, id: &str) -> SandboxResult<ProcessLogs> {
        let mut state = lock(&self.state);
        state.call("process_logs", id)?;
        state.process_mut(id)?;
        Ok(state.process_logs.get(id).cloned().unwrap_or_default())
    }

    async fn wait_for_port(&self, id: &str, _port: u16, timeout: Duration) -> SandboxResult<()> {
        {
            let mut state = lock(&self.state);
            state.call("wait_for_port", id)?;
            let readiness = state.readiness;
            let process = state.process_mut(id)?;
            match readiness {
                Readiness::Ready => {
                    if process.status == ProcessStatus::Starting {
                        process.transition(ProcessStatus::Running)?;
                    }
                    return Ok(());
                }
                Readiness::ExitsEarly => {
                    process.exit_code = Some(1);
                    process.transition(ProcessStatus::Failed)?;
                    return Err(SandboxError::ProcessExited {
                        id: id.to_string(),
                        exit_code: Some(1),
                    });
                }
                Readiness::NeverReady => {}
            }
        }
        tokio::time::sleep(timeout).await;
        Err(SandboxError::Timeout {
            operation: "wait_for_port",
            after: timeout,
        })
    }

    async fn list_files(&self, root: &str) -> SandboxResult<Vec<String>> {
        let mut state = lock(&self.state);
        state.call("list_files", root)?;
        let files: Vec<String> = state
            .files
            .keys()
            .filter(|path| path.starts_with(root))
            .cloned()
            .collect();
        if files.is_empty() && !state.dirs.contains(root.trim_end_matches('/')) {
            return Err(Fault::NotFound.into_error("list_files", root));
        }
        Ok(files)
    }

    async fn read_file(&self, path: &str) -> SandboxResult<Vec<u8>> {
        let mut state = lock(&self.state);
        state.call("read_file", path)?;
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Fault::NotFound.into_error("read_file", path))
    }

    async fn write_file(&self, path: &str, bytes: &[u8]) -> SandboxResult<()> {
        let mut state = lock(&self.state);
        state.call("write_file", path)?;
        let parent = path.rsplit_once('/').map_or("", |(parent, _)| parent);
        if !parent.is_empty() && !state.dirs.contains(parent) {
            return Err(Fault::NotFound.into_error("write_file", path));
        }
        state.files.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn create_dir_all(&self, path: &str) -> SandboxResult<()> {
        let mut state = lock(&self.state);
        state.call("create_dir_all", path)?;
        state.add_dirs(path);
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> SandboxResult<bool> {
        let mut state = lock(&self.state);
        state.call("file_exists", path)?;
        Ok(state.files.contains_key(path))
    }
}

#[derive(Debug, Default)]
struct StoreFaults {
    put_fragments: Vec<String>,
    get_fragments: Vec<String>,
    fail_list: bool,
    puts: usize,
    gets: usize,
}

/// In-memory store whose calls can be made to fail by key fragment.
#[derive(Debug, Clone, Default)]
pub struct FaultyStore {
    inner: MemoryObjectStore,
    faults: Arc<Mutex<StoreFaults>>,
}

impl FaultyStore {
    /// Empty store with no faults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Underlying objects, bypassing fault injection.
    #[must_use]
    pub const fn inner(&self) -> &MemoryObjectStore {
        &self.inner
    }

    /// Fail every `put` whose key contains `fragment`.
    pub fn fail_put_matching(&self, fragment: &str) {
        lock(&self.faults).put_fragments.push(fragment.to_string());
    }

    /// Fail every `get` whose key contains `fragment`.
    pub fn fail_get_matching(&self, fragment: &str) {
        lock(&self.faults).get_fragments.push(fragment.to_string());
    }

    /// Make `list` fail.
    pub fn fail_list(&self) {
        lock(&self.faults).fail_list = true;
    }

    /// Number of `put` calls, including failed ones.
    #[must_use]
    pub fn puts(&self) -> usize {
        lock(&self.faults).puts
    }

    /// Number of `get` calls, including failed ones.
    #[must_use]
    pub fn gets(&self) -> usize {
        lock(&self.faults).gets
    }
}

fn unavailable(operation: &'static str) -> StoreError {
    StoreError::Unavailable {
        operation,
        detail: "injected failure".into(),
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        {
            let mut faults = lock(&self.faults);
            faults.puts += 1;
            if faults.put_fragments.iter().any(|fragment| key.contains(fragment.as_str())) {
                return Err(unavailable("put"));
            }
        }
        self.inner.put(key, bytes).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        {
            let mut faults = lock(&self.faults);
            faults.gets += 1;
            if faults.get_fragments.iter().any(|fragment| key.contains(fragment.as_str())) {
                return Err(unavailable("get"));
            }
        }
        self.inner.get(key).await
    }

    async fn list(&self) -> StoreResult<Vec<ObjectMeta>> {
        if lock(&self.faults).fail_list {
            return Err(unavailable("list"));
        }
        self.inner.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn faults_fire_the_requested_number_of_times() {
        let sandbox = FakeSandbox::new().with_file("/data/config/a.json", b"{}".to_vec());
        sandbox.fail("read_file", None, Fault::TransientReset, Some(1));

        let first = sandbox.read_file("/data/config/a.json").await;
        assert!(first.is_err_and(|err| err.is_transient()));
        let second = sandbox.read_file("/data/config/a.json").await;
        assert_eq!(second.ok(), Some(b"{}".to_vec()));
        assert_eq!(sandbox.calls("read_file"), 2);
    }

    #[tokio::test]
    async fn writes_require_parent_directories() {
        let sandbox = FakeSandbox::new();
        assert!(sandbox.write_file("/data/skills/a.md", b"a").await.is_err());
        assert!(sandbox.create_dir_all("/data/skills").await.is_ok());
        assert!(sandbox.write_file("/data/skills/a.md", b"a").await.is_ok());
        assert_eq!(
            sandbox.list_files("/data/skills/").await.ok(),
            Some(vec!["/data/skills/a.md".to_string()])
        );
        assert!(sandbox.list_files("/data/config/").await.is_err());
    }

    #[tokio::test]
    async fn faulty_store_fails_matching_keys_only() {
        let store = FaultyStore::new();
        store.fail_put_matching("broken");
        assert!(store.put("config/broken.json", Vec::new()).await.is_err());
        assert!(store.put("config/fine.json", Vec::new()).await.is_ok());
        assert_eq!(store.puts(), 2);
        assert_eq!(store.inner().keys(), vec!["config/fine.json".to_string()]);
    }
}
