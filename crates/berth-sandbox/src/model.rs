//! Process records exchanged with the sandbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SandboxError, SandboxResult};

/// Lifecycle status of a sandbox process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Launched but not yet confirmed ready.
    Starting,
    /// Confirmed ready.
    Running,
    /// Exited successfully.
    Completed,
    /// Exited with a failure or was killed.
    Failed,
}

impl ProcessStatus {
    /// Render the status as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the process may still be serving.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Whether the status is final.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotone.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// A process launched inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisedProcess {
    /// Sandbox-assigned identifier; never reused.
    pub id: String,
    /// Command line the process was launched with.
    pub command: String,
    /// Current lifecycle status.
    pub status: ProcessStatus,
    /// Launch time.
    pub started_at: DateTime<Utc>,
    /// Exit time once terminal.
    pub ended_at: Option<DateTime<Utc>>,
    /// Exit code once terminal, when the sandbox reports one.
    pub exit_code: Option<i32>,
}

impl SupervisedProcess {
    /// Record a freshly launched process.
    #[must_use]
    pub fn starting(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            status: ProcessStatus::Starting,
            started_at: Utc::now(),
            ended_at: None,
            exit_code: None,
        }
    }

    /// Advance the status, stamping the end time when the new status is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::InvalidTransition`] when the change would move the
    /// process backwards or out of a terminal status.
    pub fn transition(&mut self, next: ProcessStatus) -> SandboxResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(SandboxError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Captured output of a sandbox process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLogs {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ProcessLogs {
    /// Keep at most the last `max_chars` characters of each stream.
    #[must_use]
    pub fn tail(&self, max_chars: usize) -> Self {
        Self {
            stdout: tail_chars(&self.stdout, max_chars),
            stderr: tail_chars(&self.stderr, max_chars),
        }
    }
}

fn tail_chars(value: &str, max_chars: usize) -> String {
    let count = value.chars().count();
    if count <= max_chars {
        return value.to_string();
    }
    value.chars().skip(count - max_chars).collect()
}
