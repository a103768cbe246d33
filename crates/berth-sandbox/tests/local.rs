use std::net::TcpListener;
use std::time::Duration;

use anyhow::Result;
use berth_sandbox::{LocalSandbox, ProcessStatus, SandboxClient, SandboxError};
use tempfile::TempDir;

async fn wait_until_terminal(sandbox: &LocalSandbox, id: &str) -> Result<ProcessStatus> {
    for _ in 0..100 {
        let processes = sandbox.list_processes().await?;
        if let Some(process) = processes.iter().find(|process| process.id == id)
            && process.status.is_terminal()
        {
            return Ok(process.status);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    anyhow::bail!("process {id} did not exit")
}

#[tokio::test]
async fn spawned_process_output_is_captured() -> Result<()> {
    let temp = TempDir::new()?;
    let sandbox = LocalSandbox::new(temp.path());

    let process = sandbox
        .spawn("echo booting; echo boom 1>&2; exit 3")
        .await?;
    assert_eq!(process.status, ProcessStatus::Starting);
    assert!(process.id.starts_with("proc-"));

    assert_eq!(
        wait_until_terminal(&sandbox, &process.id).await?,
        ProcessStatus::Failed
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    let logs = sandbox.process_logs(&process.id).await?;
    assert!(logs.stdout.contains("booting"));
    assert!(logs.stderr.contains("boom"));

    let listed = sandbox.list_processes().await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].exit_code, Some(3));
    assert!(listed[0].ended_at.is_some());
    Ok(())
}

#[tokio::test]
async fn port_readiness_marks_process_running() -> Result<()> {
    let temp = TempDir::new()?;
    let sandbox = LocalSandbox::new(temp.path());
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();

    let process = sandbox.spawn("sleep 5").await?;
    sandbox
        .wait_for_port(&process.id, port, Duration::from_secs(5))
        .await?;

    let listed = sandbox.list_processes().await?;
    assert_eq!(listed[0].status, ProcessStatus::Running);
    drop(listener);
    Ok(())
}

#[tokio::test]
async fn readiness_fails_fast_when_process_exits() -> Result<()> {
    let temp = TempDir::new()?;
    let sandbox = LocalSandbox::new(temp.path());
    let port = {
        let probe = TcpListener::bind("127.0.0.1:0")?;
        probe.local_addr()?.port()
    };

    let process = sandbox.spawn("exit 7").await?;
    let err = sandbox
        .wait_for_port(&process.id, port, Duration::from_secs(10))
        .await
        .expect_err("exited process cannot become ready");
    assert!(matches!(
        err,
        SandboxError::ProcessExited {
            exit_code: Some(7),
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn readiness_wait_is_bounded() -> Result<()> {
    let temp = TempDir::new()?;
    let sandbox = LocalSandbox::new(temp.path());
    let port = {
        let probe = TcpListener::bind("127.0.0.1:0")?;
        probe.local_addr()?.port()
    };

    let process = sandbox.spawn("sleep 5").await?;
    let err = sandbox
        .wait_for_port(&process.id, port, Duration::from_millis(600))
        .await
        .expect_err("nothing listens on the port");
    assert!(matches!(
        err,
        SandboxError::Timeout {
            operation: "wait_for_port",
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn unknown_process_ids_are_rejected() -> Result<()> {
    let temp = TempDir::new()?;
    let sandbox = LocalSandbox::new(temp.path());
    assert!(matches!(
        sandbox.process_logs("proc-missing").await,
        Err(SandboxError::UnknownProcess { .. })
    ));
    Ok(())
}
