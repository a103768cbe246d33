//! Discovery of an already-running gateway process.
//!
//! # Design
//! - Selection is a pure function over the process list so it can be tested without a sandbox.
//! - Discovery is fail-open: list errors and timeouts are logged and read as "no process".

use std::time::Duration;

use berth_config::GatewayConfig;
use tracing::{debug, warn};

use crate::client::SandboxClient;
use crate::model::SupervisedProcess;

/// Upper bound on the process-list call made during discovery.
pub const PROCESS_LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Matches sandbox processes against the gateway's command-line signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLocator {
    start_signatures: Vec<String>,
    utility_signatures: Vec<String>,
}

impl ProcessLocator {
    /// Build a locator from explicit signature lists.
    #[must_use]
    pub const fn new(start_signatures: Vec<String>, utility_signatures: Vec<String>) -> Self {
        Self {
            start_signatures,
            utility_signatures,
        }
    }

    /// Build a locator from the gateway configuration.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.start_signatures.clone(),
            config.utility_signatures.clone(),
        )
    }

    fn matches(&self, command: &str) -> bool {
        self.start_signatures
            .iter()
            .any(|signature| command.contains(signature.as_str()))
            && !self
                .utility_signatures
                .iter()
                .any(|signature| command.contains(signature.as_str()))
    }

    /// First active process whose command carries a start signature and no utility signature.
    #[must_use]
    pub fn select<'a>(&self, processes: &'a [SupervisedProcess]) -> Option<&'a SupervisedProcess> {
        processes
            .iter()
            .find(|process| process.status.is_active() && self.matches(&process.command))
    }

    /// Query the sandbox and return the authoritative gateway process, if any.
    pub async fn find_existing(&self, sandbox: &dyn SandboxClient) -> Option<SupervisedProcess> {
        let listed = tokio::time::timeout(PROCESS_LIST_TIMEOUT, sandbox.list_processes()).await;
        let processes = match listed {
            Ok(Ok(processes)) => processes,
            Ok(Err(err)) => {
                warn!(error = %err, kind = ?err.kind(), "process list failed; assuming no gateway");
                return None;
            }
            Err(_) => {
                warn!(
                    timeout_secs = PROCESS_LIST_TIMEOUT.as_secs(),
                    "process list timed out; assuming no gateway"
                );
                return None;
            }
        };
        let found = self.select(&processes).cloned();
        match &found {
            Some(process) => debug!(
                id = %process.id,
                status = process.status.as_str(),
                "located gateway process"
            ),
            None => debug!(scanned = processes.len(), "no gateway process located"),
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SandboxResult;
    use crate::model::ProcessStatus;

    fn locator() -> ProcessLocator {
        ProcessLocator::new(
            vec!["start-gateway.sh".into(), "gateway run".into()],
            vec!["gateway devices".into(), "gateway --version".into()],
        )
    }

    fn process(id: &str, command: &str, status: ProcessStatus) -> SandboxResult<SupervisedProcess> {
        let mut record = SupervisedProcess::starting(id, command);
        if status != ProcessStatus::Starting {
            record.transition(status)?;
        }
        Ok(record)
    }

    #[test]
    fn empty_list_selects_nothing() {
        assert!(locator().select(&[]).is_none());
    }

    #[test]
    fn utility_invocations_and_terminal_processes_are_ignored() -> SandboxResult<()> {
        let processes = vec![
            process("p1", "gateway devices list", ProcessStatus::Running)?,
            process("p2", "/usr/local/bin/start-gateway.sh", ProcessStatus::Completed)?,
            process("p3", "gateway run --port 18789", ProcessStatus::Failed)?,
            process("p4", "gateway --version", ProcessStatus::Starting)?,
        ];
        assert!(locator().select(&processes).is_none());
        Ok(())
    }

    #[test]
    fn first_active_match_wins() -> SandboxResult<()> {
        let processes = vec![
            process("p1", "sleep 30", ProcessStatus::Running)?,
            process("p2", "sh -c /usr/local/bin/start-gateway.sh", ProcessStatus::Starting)?,
            process("p3", "gateway run", ProcessStatus::Running)?,
        ];
        let found = locator().select(&processes).map(|process| process.id.as_str());
        assert_eq!(found, Some("p2"));
        Ok(())
    }
}
