//! Remote command probe
//!
//! Opens an exec stream into the target container, feeds it the command
//! input, drains stdout/stderr, and classifies the remote termination into
//! an exit code. One invocation, one stream, no retry.

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::{
    api::{Api, AttachParams},
    Client,
};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::resolver::ExecTarget;

/// Cap on captured output per stream; anything past it is dropped.
const MAX_CAPTURE_BYTES: usize = 1024 * 1024;

const READ_BUF_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Kube error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Exec stream did not expose {0}")]
    StreamUnavailable(&'static str),

    #[error("Failed to find exit code: {0}")]
    UnknownExit(String),
}

/// The command to run remotely plus the script body fed to it on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    pub argv: String,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>, argv: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            argv: argv.into(),
        }
    }

    /// The two-line stdin payload: the literal `-c` and the argv string,
    /// newline-joined. The remote command is expected to be a shell that
    /// accepts `-c <script>` invocation.
    pub fn stdin_payload(&self) -> String {
        ["-c", self.argv.as_str()].join("\n")
    }
}

/// Outcome of one probe invocation. Immutable; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Normalized external code: 0 for success, 2 for any non-zero remote exit.
    pub exit_code: i32,
    /// Human-readable summary carrying the original remote code.
    pub summary: String,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ExecutionResult {
    /// Build a result from the original remote exit code, normalizing it for
    /// external consumers while keeping the original in the summary.
    pub fn new(remote_code: i32, stdout: Vec<String>, stderr: Vec<String>) -> Self {
        let summary = format!("Exit Code: {remote_code}");
        let exit_code = if remote_code == 0 { 0 } else { 2 };
        Self {
            exit_code,
            summary,
            stdout,
            stderr,
        }
    }
}

/// Append-only ordered sequence of received output chunks.
///
/// Owned by a single probe invocation and discarded with it. Bounded: once
/// the byte cap is reached further chunks are dropped.
#[derive(Debug, Default)]
pub struct OutputSink {
    chunks: Vec<String>,
    bytes: usize,
    truncated: bool,
}

impl OutputSink {
    pub fn push(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if self.bytes + bytes.len() > MAX_CAPTURE_BYTES {
            if !self.truncated {
                self.truncated = true;
                tracing::warn!("Output capture exceeded {} bytes, dropping the rest", MAX_CAPTURE_BYTES);
            }
            return;
        }
        self.bytes += bytes.len();
        self.chunks.push(String::from_utf8_lossy(bytes).into_owned());
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<String> {
        self.chunks
    }
}

/// Run `command` inside the resolved target and classify its termination.
///
/// Blocks until the remote side closes the stream or errors; the underlying
/// connection's own timeout behavior governs. This is the sole suspension
/// point of the program.
pub async fn probe(
    client: &Client,
    target: &ExecTarget,
    command: &CommandSpec,
) -> Result<ExecutionResult, ProbeError> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), &target.namespace);

    let mut params = AttachParams::default()
        .stdin(true)
        .stdout(true)
        .stderr(true)
        .tty(false);
    if let Some(container) = &target.container {
        params = params.container(container.as_str());
    }

    tracing::debug!(
        "Starting exec in {}/{}: {} (stdin: {} bytes)",
        target.namespace,
        target.pod,
        command.command,
        command.stdin_payload().len(),
    );

    let mut attached = pods
        .exec(&target.pod, [command.command.as_str()], &params)
        .await?;

    let mut stdin = attached
        .stdin()
        .ok_or(ProbeError::StreamUnavailable("stdin"))?;
    let mut stdout = attached
        .stdout()
        .ok_or(ProbeError::StreamUnavailable("stdout"))?;
    let mut stderr = attached
        .stderr()
        .ok_or(ProbeError::StreamUnavailable("stderr"))?;
    let status = attached.take_status();

    stdin.write_all(command.stdin_payload().as_bytes()).await?;
    stdin.flush().await?;
    // EOF ends the remote shell's input
    drop(stdin);

    let mut stdout_sink = OutputSink::default();
    let mut stderr_sink = OutputSink::default();
    let mut out_buf = vec![0u8; READ_BUF_SIZE];
    let mut err_buf = vec![0u8; READ_BUF_SIZE];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            result = stdout.read(&mut out_buf), if out_open => match result {
                Ok(0) => out_open = false,
                Ok(n) => stdout_sink.push(&out_buf[..n]),
                Err(e) => {
                    tracing::debug!("stdout stream closed: {}", e);
                    out_open = false;
                }
            },
            result = stderr.read(&mut err_buf), if err_open => match result {
                Ok(0) => err_open = false,
                Ok(n) => stderr_sink.push(&err_buf[..n]),
                Err(e) => {
                    tracing::debug!("stderr stream closed: {}", e);
                    err_open = false;
                }
            },
        }
    }

    let status = match status {
        Some(pending) => pending.await,
        None => None,
    };

    attached
        .join()
        .await
        .map_err(|e| ProbeError::UnknownExit(e.to_string()))?;

    let remote_code = exit_code_from_status(status.as_ref())?;
    tracing::debug!("Remote process exited with code {}", remote_code);

    Ok(ExecutionResult::new(
        remote_code,
        stdout_sink.into_chunks(),
        stderr_sink.into_chunks(),
    ))
}

/// Translate the exec status frame into the remote exit code.
///
/// A stream that completed without a status frame, or with an explicit
/// `Success`, is exit 0. A `Failure` carrying a well-formed `ExitCode` cause
/// is that code. Everything else has no extractable exit status.
pub fn exit_code_from_status(status: Option<&Status>) -> Result<i32, ProbeError> {
    let Some(status) = status else {
        return Ok(0);
    };

    match status.status.as_deref() {
        Some("Success") => Ok(0),
        Some("Failure") if status.reason.as_deref() == Some("NonZeroExitCode") => {
            exit_code_cause(status).ok_or_else(|| ProbeError::UnknownExit(status_detail(status)))
        }
        _ => Err(ProbeError::UnknownExit(status_detail(status))),
    }
}

fn exit_code_cause(status: &Status) -> Option<i32> {
    status
        .details
        .as_ref()?
        .causes
        .as_ref()?
        .iter()
        .find(|cause| cause.reason.as_deref() == Some("ExitCode"))?
        .message
        .as_deref()?
        .parse()
        .ok()
}

fn status_detail(status: &Status) -> String {
    status
        .message
        .clone()
        .unwrap_or_else(|| "remote stream ended without an exit status".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{StatusCause, StatusDetails};

    fn failure_status(reason: &str, cause_reason: &str, cause_message: &str) -> Status {
        Status {
            status: Some("Failure".to_string()),
            reason: Some(reason.to_string()),
            message: Some("command terminated with non-zero exit code".to_string()),
            details: Some(StatusDetails {
                causes: Some(vec![StatusCause {
                    reason: Some(cause_reason.to_string()),
                    message: Some(cause_message.to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_stdin_payload_shape() {
        let spec = CommandSpec::new("/bin/sh", "exit 7");
        assert_eq!(spec.stdin_payload(), "-c\nexit 7");
    }

    #[test]
    fn test_stdin_payload_empty_argv() {
        let spec = CommandSpec::new("/bin/sh", "");
        assert_eq!(spec.stdin_payload(), "-c\n");
    }

    #[test]
    fn test_no_status_is_success() {
        assert_eq!(exit_code_from_status(None).unwrap(), 0);
    }

    #[test]
    fn test_success_status() {
        let status = Status {
            status: Some("Success".to_string()),
            ..Default::default()
        };
        assert_eq!(exit_code_from_status(Some(&status)).unwrap(), 0);
    }

    #[test]
    fn test_failure_with_exit_code() {
        let status = failure_status("NonZeroExitCode", "ExitCode", "3");
        assert_eq!(exit_code_from_status(Some(&status)).unwrap(), 3);
    }

    #[test]
    fn test_failure_with_unparseable_code() {
        let status = failure_status("NonZeroExitCode", "ExitCode", "not-a-number");
        assert!(matches!(
            exit_code_from_status(Some(&status)),
            Err(ProbeError::UnknownExit(_))
        ));
    }

    #[test]
    fn test_failure_without_exit_code_cause() {
        let status = Status {
            status: Some("Failure".to_string()),
            reason: Some("InternalError".to_string()),
            message: Some("error dialing backend".to_string()),
            ..Default::default()
        };
        let err = exit_code_from_status(Some(&status)).unwrap_err();
        assert!(matches!(err, ProbeError::UnknownExit(detail) if detail.contains("dialing")));
    }

    #[test]
    fn test_normalization() {
        for (remote, reported) in [(0, 0), (1, 2), (5, 2), (127, 2)] {
            let result = ExecutionResult::new(remote, vec![], vec![]);
            assert_eq!(result.exit_code, reported);
            assert_eq!(result.summary, format!("Exit Code: {remote}"));
        }
    }

    #[test]
    fn test_stream_failure_with_status_three() {
        let status = failure_status("NonZeroExitCode", "ExitCode", "3");
        let remote = exit_code_from_status(Some(&status)).unwrap();
        let result = ExecutionResult::new(remote, vec![], vec![]);
        assert_eq!(result.exit_code, 2);
        assert_eq!(result.summary, "Exit Code: 3");
    }

    #[test]
    fn test_sink_skips_empty_chunks() {
        let mut sink = OutputSink::default();
        sink.push(b"");
        sink.push(b"hello");
        sink.push(b" world");
        assert_eq!(sink.chunks(), ["hello", " world"]);
    }

    #[test]
    fn test_sink_is_bounded() {
        let mut sink = OutputSink::default();
        let chunk = vec![b'x'; MAX_CAPTURE_BYTES];
        sink.push(&chunk);
        sink.push(b"overflow");
        assert_eq!(sink.chunks().len(), 1);
    }
}
