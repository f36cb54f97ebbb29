//! Detached task execution
//!
//! Spawns the agent process, forwards its stdout/stderr through a
//! single writer task, and delivers output to remote storage under
//! time-windowed batching. The caller never waits on the child; all
//! outcomes are reported through storage keys.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::storage::{RemoteStorage, StorageKeys};

/// Minimum time between successive output appends
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Everything needed to run one task
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub agent_id: String,
    pub session_id: String,
    pub prompt: String,
    pub env: HashMap<String, String>,
    /// Agent command; the prompt is appended as the final argument
    pub command: String,
    pub args: Vec<String>,
}

enum Chunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// Run one task to completion, reporting through storage
///
/// The child is detached: it is never killed when this future or the
/// server goes away, and no timeout is applied.
pub async fn run_task(spec: TaskSpec, storage: Option<Arc<RemoteStorage>>) {
    let keys = StorageKeys::new(&spec.agent_id, &spec.session_id);

    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args)
        .arg(&spec.prompt)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(
                "Failed to spawn {} for agent {}: {}",
                spec.command, spec.agent_id, err
            );
            if let Some(storage) = &storage {
                storage.set_logged(&keys.status, "error").await;
                storage
                    .set_logged(
                        &keys.error,
                        &format!("Failed to start agent process: {}", err),
                    )
                    .await;
            }
            return;
        }
    };

    info!(
        "Spawned agent process for {} session {} (pid {:?})",
        spec.agent_id,
        spec.session_id,
        child.id()
    );

    if let Some(storage) = &storage {
        storage.set_logged(&keys.status, "running").await;
    }

    let (tx, rx) = mpsc::channel::<Chunk>(64);
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, tx.clone(), Chunk::Stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, tx.clone(), Chunk::Stderr);
    }
    drop(tx);

    // Runs until both pipes hit EOF, which happens at process exit.
    let (stdout_rest, stderr_buf) = buffer_and_flush(rx, storage.clone(), &keys.output).await;

    let status = child.wait().await;

    let Some(storage) = storage else {
        warn!(
            "No storage configured; output for {} session {} was dropped",
            spec.agent_id, spec.session_id
        );
        return;
    };

    // Final flush: no output is lost even if the process exits before
    // an interval boundary.
    if !stdout_rest.is_empty() {
        storage.append_logged(&keys.output, stdout_rest).await;
    }
    if !stderr_buf.is_empty() {
        storage.append_logged(&keys.stderr, stderr_buf).await;
    }

    match status {
        Ok(exit) if exit.success() => {
            info!("Task for {} session {} completed", spec.agent_id, spec.session_id);
            storage.set_logged(&keys.status, "completed").await;
        }
        Ok(exit) => {
            let code = exit.code();
            warn!(
                "Task for {} session {} failed with code {:?}",
                spec.agent_id, spec.session_id, code
            );
            storage.set_logged(&keys.status, "failed").await;
            let message = match code {
                Some(code) => format!("Process exited with code {}", code),
                None => "Process terminated by signal".to_string(),
            };
            storage.set_logged(&keys.error, &message).await;
        }
        Err(err) => {
            error!(
                "Failed waiting on task for {} session {}: {}",
                spec.agent_id, spec.session_id, err
            );
            storage.set_logged(&keys.status, "error").await;
            storage
                .set_logged(&keys.error, &format!("Runtime error: {}", err))
                .await;
        }
    }
}

fn spawn_reader<R>(mut reader: R, tx: mpsc::Sender<Chunk>, wrap: fn(Vec<u8>) -> Chunk)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(wrap(buf[..n].to_vec())).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!("Output reader error: {}", err);
                    break;
                }
            }
        }
    });
}

/// Accumulate chunks, appending stdout whenever the flush window has
/// elapsed and the buffer is non-empty
///
/// Returns the unflushed stdout remainder and the whole stderr buffer.
/// The buffer is taken before each write is dispatched, so chunks
/// arriving while a write is in flight land in a fresh buffer and are
/// never lost or duplicated.
async fn buffer_and_flush(
    mut rx: mpsc::Receiver<Chunk>,
    storage: Option<Arc<RemoteStorage>>,
    output_key: &str,
) -> (Vec<u8>, Vec<u8>) {
    let mut stdout_buf: Vec<u8> = Vec::new();
    let mut stderr_buf: Vec<u8> = Vec::new();
    let mut last_flush = Instant::now();
    let mut tick = tokio::time::interval_at(Instant::now() + FLUSH_INTERVAL, FLUSH_INTERVAL);

    loop {
        tokio::select! {
            chunk = rx.recv() => match chunk {
                Some(Chunk::Stdout(bytes)) => {
                    stdout_buf.extend_from_slice(&bytes);
                    if last_flush.elapsed() >= FLUSH_INTERVAL && !stdout_buf.is_empty() {
                        flush(&mut stdout_buf, &mut last_flush, &storage, output_key).await;
                    }
                }
                Some(Chunk::Stderr(bytes)) => stderr_buf.extend_from_slice(&bytes),
                None => break,
            },
            _ = tick.tick() => {
                // The tick free-runs from stream start; a chunk-path
                // flush mid-window moves last_flush, so re-check it.
                if last_flush.elapsed() >= FLUSH_INTERVAL && !stdout_buf.is_empty() {
                    flush(&mut stdout_buf, &mut last_flush, &storage, output_key).await;
                }
            }
        }
    }

    (stdout_buf, stderr_buf)
}

async fn flush(
    buf: &mut Vec<u8>,
    last_flush: &mut Instant,
    storage: &Option<Arc<RemoteStorage>>,
    key: &str,
) {
    let bytes = std::mem::take(buf);
    *last_flush = Instant::now();
    if let Some(storage) = storage {
        storage.append_logged(key, bytes).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_stub_storage;

    fn shell_spec(script: &str) -> TaskSpec {
        TaskSpec {
            agent_id: "a1".to_string(),
            session_id: "s1".to_string(),
            // The prompt lands in $0; the script ignores it.
            prompt: "ignored".to_string(),
            env: HashMap::new(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[tokio::test]
    async fn test_successful_task_flushes_and_completes() {
        let stub = spawn_stub_storage().await;
        let storage = Some(Arc::new(stub.client()));

        run_task(shell_spec("printf out; printf err >&2"), storage).await;

        assert_eq!(stub.value("agent:a1:session:s1:output").await.unwrap(), b"out");
        assert_eq!(stub.value("agent:a1:session:s1:stderr").await.unwrap(), b"err");
        assert_eq!(
            stub.value("agent:a1:session:s1:status").await.unwrap(),
            b"completed"
        );
        assert!(stub.value("agent:a1:session:s1:error").await.is_none());
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_failed_with_code() {
        let stub = spawn_stub_storage().await;
        let storage = Some(Arc::new(stub.client()));

        run_task(shell_spec("printf partial; exit 3"), storage).await;

        assert_eq!(
            stub.value("agent:a1:session:s1:status").await.unwrap(),
            b"failed"
        );
        let error = stub.value("agent:a1:session:s1:error").await.unwrap();
        assert!(String::from_utf8(error).unwrap().contains("3"));
        // Output produced before the failure was still delivered.
        assert_eq!(
            stub.value("agent:a1:session:s1:output").await.unwrap(),
            b"partial"
        );
    }

    #[tokio::test]
    async fn test_spawn_failure_reports_error_status() {
        let stub = spawn_stub_storage().await;
        let storage = Some(Arc::new(stub.client()));

        let mut spec = shell_spec("true");
        spec.command = "/nonexistent/agent-binary".to_string();
        run_task(spec, storage).await;

        assert_eq!(
            stub.value("agent:a1:session:s1:status").await.unwrap(),
            b"error"
        );
        assert!(stub.value("agent:a1:session:s1:error").await.is_some());
        // No output buffers existed to flush.
        assert!(stub.value("agent:a1:session:s1:output").await.is_none());
    }

    #[tokio::test]
    async fn test_fast_exit_is_single_final_flush() {
        let stub = spawn_stub_storage().await;
        let storage = Some(Arc::new(stub.client()));

        run_task(shell_spec("printf one; printf two"), storage).await;

        // The process exited well inside the flush window, so all
        // output arrived in one append at completion.
        assert_eq!(stub.appends("agent:a1:session:s1:output").await, 1);
        assert_eq!(
            stub.value("agent:a1:session:s1:output").await.unwrap(),
            b"onetwo"
        );
    }

    #[tokio::test]
    async fn test_long_task_flushes_in_windows() {
        let stub = spawn_stub_storage().await;
        let storage = Some(Arc::new(stub.client()));

        run_task(shell_spec("printf first; sleep 2.5; printf second"), storage).await;

        // One windowed flush while the process slept, one at exit.
        assert_eq!(stub.appends("agent:a1:session:s1:output").await, 2);
        assert_eq!(
            stub.value("agent:a1:session:s1:output").await.unwrap(),
            b"firstsecond"
        );
    }

    #[tokio::test]
    async fn test_flushes_are_spaced_by_at_least_the_interval() {
        let stub = spawn_stub_storage().await;
        let storage = Some(Arc::new(stub.client()));

        // The first chunk lands just past the window and flushes on
        // arrival. The second lands mid-window and must ride until the
        // next boundary, even though the periodic tick fires before it.
        run_task(
            shell_spec("sleep 2.3; printf a; sleep 0.2; printf b; sleep 2"),
            storage,
        )
        .await;

        let instants = stub.append_instants("agent:a1:session:s1:output").await;
        assert_eq!(instants.len(), 2);
        let gap = instants[1].duration_since(instants[0]);
        assert!(
            gap >= FLUSH_INTERVAL,
            "appends {}ms apart, expected at least {}ms",
            gap.as_millis(),
            FLUSH_INTERVAL.as_millis()
        );
        assert_eq!(
            stub.value("agent:a1:session:s1:output").await.unwrap(),
            b"ab"
        );
    }

    #[tokio::test]
    async fn test_silent_task_writes_only_status() {
        let stub = spawn_stub_storage().await;
        let storage = Some(Arc::new(stub.client()));

        run_task(shell_spec("true"), storage).await;

        assert_eq!(stub.appends("agent:a1:session:s1:output").await, 0);
        assert!(stub.value("agent:a1:session:s1:stderr").await.is_none());
        assert_eq!(
            stub.value("agent:a1:session:s1:status").await.unwrap(),
            b"completed"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_storage_does_not_panic() {
        // A storage outage (or no config yet) must never crash the
        // supervision path.
        run_task(shell_spec("printf out"), None).await;
    }
}
