use crate::error::{BcExtractorError, Result};
use crate::job::JobObserver;
use crate::runner::cancel::CancelToken;
use crate::runner::invocation::ToolInvocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;

const READ_CHUNK: usize = 8 * 1024;

/// How the extraction tool terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolExit {
    /// Normal exit with a code.
    Code { code: i32 },
    /// Abnormal termination (signal or crash) without an exit code.
    Terminated { signal: Option<i32> },
}

impl ToolExit {
    pub fn success(&self) -> bool {
        matches!(self, ToolExit::Code { code: 0 })
    }
}

impl From<std::process::ExitStatus> for ToolExit {
    fn from(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(code) => ToolExit::Code { code },
            None => ToolExit::Terminated {
                signal: termination_signal(&status),
            },
        }
    }
}

#[cfg(unix)]
fn termination_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

impl fmt::Display for ToolExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolExit::Code { code } => write!(f, "exit code {}", code),
            ToolExit::Terminated { signal: Some(signal) } => {
                write!(f, "terminated by signal {}", signal)
            }
            ToolExit::Terminated { signal: None } => f.write_str("terminated abnormally"),
        }
    }
}

/// Complete standard output and standard error of one tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl CapturedOutput {
    pub fn new(stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self { stdout, stderr }
    }

    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Result of a tool run that started and terminated, whatever its exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub exit: ToolExit,
    pub output: CapturedOutput,
    pub duration: Duration,
}

/// Runs the extraction tool and captures both of its output streams.
///
/// Both pipes are drained by their own task while the process runs, so a
/// tool that fills one pipe can never block on it while the other is read.
/// There is no timeout unless one is configured; cancellation goes through
/// the [`CancelToken`].
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    interpreter: Option<PathBuf>,
    timeout: Option<Duration>,
    drain_grace: Duration,
}

/// How one waiting phase of a run ended.
enum Waited<T> {
    Finished(T),
    Cancelled(String),
    TimedOut(Duration),
}

type Reader = Option<JoinHandle<std::io::Result<()>>>;

type Capture = Arc<Mutex<Vec<u8>>>;

impl ProcessRunner {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            interpreter: None,
            timeout: None,
            drain_grace: Duration::from_secs(2),
        }
    }

    /// Launch the program through an interpreter, e.g. `/bin/sh` for script tools.
    pub fn with_interpreter<P: Into<PathBuf>>(mut self, interpreter: Option<P>) -> Self {
        self.interpreter = interpreter.map(Into::into);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// How long stream readers may keep running after the tool was killed.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub async fn run(
        &self,
        invocation: &ToolInvocation,
        mut cancel: CancelToken,
        observer: &dyn JobObserver,
    ) -> Result<ProcessResult> {
        let started = Instant::now();

        if cancel.is_cancelled() {
            return Err(BcExtractorError::Cancelled {
                reason: cancel.cancelled().await,
                captured: CapturedOutput::default(),
            });
        }

        let mut child = self
            .command(invocation)
            .spawn()
            .map_err(|source| BcExtractorError::ExecutionFailure {
                program: self.program.display().to_string(),
                source,
            })?;

        observer.process_started(invocation, child.id());

        let stdout = Capture::default();
        let stderr = Capture::default();
        let mut readers = [
            child.stdout.take().map(|pipe| spawn_drain(pipe, stdout.clone())),
            child.stderr.take().map(|pipe| spawn_drain(pipe, stderr.clone())),
        ];
        let deadline = self.timeout.map(|timeout| (TokioInstant::now() + timeout, timeout));

        let waited = tokio::select! {
            status = child.wait() => Waited::Finished(status),
            reason = cancel.cancelled() => Waited::Cancelled(reason),
            elapsed = expire(deadline) => Waited::TimedOut(elapsed),
        };

        let status = match waited {
            Waited::Finished(Ok(status)) => status,
            Waited::Finished(Err(e)) => {
                let _ = child.start_kill();
                self.release(readers).await;
                return Err(BcExtractorError::CaptureFailure {
                    message: format!("failed to wait for {}: {}", self.program.display(), e),
                    captured: CapturedOutput::new(take(&stdout), take(&stderr)),
                });
            }
            Waited::Cancelled(reason) => {
                return Err(self.abort(child, reason, readers, &stdout, &stderr).await);
            }
            Waited::TimedOut(elapsed) => {
                let reason = format!("timed out after {:?}", elapsed);
                return Err(self.abort(child, reason, readers, &stdout, &stderr).await);
            }
        };

        // The result is final only once both streams reached end-of-file.
        // A background child of the tool may hold them open, so cancellation
        // and the deadline still apply here.
        let drained = tokio::select! {
            joined = join_readers(&mut readers) => Waited::Finished(joined),
            reason = cancel.cancelled() => Waited::Cancelled(reason),
            elapsed = expire(deadline) => Waited::TimedOut(elapsed),
        };

        match drained {
            Waited::Finished(Ok(())) => {}
            Waited::Finished(Err(message)) => {
                self.release(readers).await;
                return Err(BcExtractorError::CaptureFailure {
                    message,
                    captured: CapturedOutput::new(take(&stdout), take(&stderr)),
                });
            }
            Waited::Cancelled(reason) => {
                return Err(self.abort(child, reason, readers, &stdout, &stderr).await);
            }
            Waited::TimedOut(elapsed) => {
                let reason = format!("timed out after {:?}", elapsed);
                return Err(self.abort(child, reason, readers, &stdout, &stderr).await);
            }
        }

        let result = ProcessResult {
            exit: ToolExit::from(status),
            output: CapturedOutput::new(take(&stdout), take(&stderr)),
            duration: started.elapsed(),
        };

        observer.process_exited(&result);
        Ok(result)
    }

    fn command(&self, invocation: &ToolInvocation) -> Command {
        let mut command = match self.interpreter {
            Some(ref interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(&self.program);
                command
            }
            None => Command::new(&self.program),
        };

        command
            .args(invocation.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        command
    }

    async fn abort(
        &self,
        mut child: tokio::process::Child,
        reason: String,
        readers: [Reader; 2],
        stdout: &Capture,
        stderr: &Capture,
    ) -> BcExtractorError {
        // The process may already be gone; either way it is reaped here
        let _ = child.kill().await;
        self.release(readers).await;

        BcExtractorError::Cancelled {
            reason,
            captured: CapturedOutput::new(take(stdout), take(stderr)),
        }
    }

    /// Gives the remaining readers the drain grace, then stops them.
    async fn release(&self, readers: [Reader; 2]) {
        for mut reader in readers.into_iter().flatten() {
            if tokio::time::timeout(self.drain_grace, &mut reader).await.is_err() {
                // A grandchild still holds the pipe open
                reader.abort();
            }
        }
    }
}

fn spawn_drain<R>(pipe: R, sink: Capture) -> JoinHandle<std::io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(drain(pipe, sink))
}

async fn drain<R: AsyncRead + Unpin>(mut pipe: R, sink: Capture) -> std::io::Result<()> {
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(&chunk[..n]);
    }
}

/// Waits for both readers in turn. A reader that finished is cleared from
/// its slot so the caller only has to release the ones still running.
async fn join_readers(readers: &mut [Reader; 2]) -> std::result::Result<(), String> {
    for (slot, stream) in readers.iter_mut().zip(["stdout", "stderr"]) {
        let Some(reader) = slot.as_mut() else {
            continue;
        };
        let joined = reader.await;
        *slot = None;

        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(format!("reading {} failed: {}", stream, e)),
            Err(e) => return Err(format!("{} reader task failed: {}", stream, e)),
        }
    }
    Ok(())
}

async fn expire(deadline: Option<(TokioInstant, Duration)>) -> Duration {
    match deadline {
        Some((at, timeout)) => {
            tokio::time::sleep_until(at).await;
            timeout
        }
        None => std::future::pending().await,
    }
}

fn take(capture: &Capture) -> Vec<u8> {
    std::mem::take(&mut *capture.lock().unwrap_or_else(PoisonError::into_inner))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::job::NoopObserver;
    use crate::request::{InputValidator, RawRequest, BC_TABLE, END_DATETIME, START_DATETIME};
    use crate::runner::{cancel_pair, DatasetRoot};
    use std::fs;
    use tempfile::TempDir;

    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("tool.sh");
        fs::write(&path, body).unwrap();
        path
    }

    fn invocation(dir: &TempDir) -> ToolInvocation {
        let table = dir.path().join("table.txt");
        fs::write(&table, "ta 130").unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();

        let request = InputValidator::new()
            .validate(
                &RawRequest::new()
                    .with_literal(START_DATETIME, "2020-01-01_00:00:00")
                    .with_literal(END_DATETIME, "2020-01-02_00:00:00")
                    .with_file(BC_TABLE, &table),
            )
            .unwrap();
        ToolInvocation::new(&request, &DatasetRoot::new("/data/CanESM2").unwrap(), &out)
    }

    fn sh_runner(program: PathBuf) -> ProcessRunner {
        ProcessRunner::new(program).with_interpreter(Some("/bin/sh"))
    }

    #[tokio::test]
    async fn test_arguments_reach_the_tool() {
        let dir = TempDir::new().unwrap();
        let tool = script(&dir, "printf '%s|' \"$@\"\n");
        let invocation = invocation(&dir);

        let result = sh_runner(tool)
            .run(&invocation, CancelToken::never(), &NoopObserver)
            .await
            .unwrap();

        let expected: Vec<String> = invocation
            .to_args()
            .iter()
            .map(|a| format!("{}|", a.to_string_lossy()))
            .collect();
        assert_eq!(result.output.stdout_text(), expected.concat());
        assert!(result.exit.success());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let tool = script(&dir, "echo 'bad range' >&2\nexit 7\n");

        let result = sh_runner(tool)
            .run(&invocation(&dir), CancelToken::never(), &NoopObserver)
            .await
            .unwrap();

        assert_eq!(result.exit, ToolExit::Code { code: 7 });
        assert_eq!(result.output.stderr(), b"bad range\n");
    }

    #[tokio::test]
    async fn test_signal_termination_is_distinct() {
        let dir = TempDir::new().unwrap();
        let tool = script(&dir, "kill -9 $$\n");

        let result = sh_runner(tool)
            .run(&invocation(&dir), CancelToken::never(), &NoopObserver)
            .await
            .unwrap();

        assert_eq!(result.exit, ToolExit::Terminated { signal: Some(9) });
        assert!(!result.exit.success());
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let dir = TempDir::new().unwrap();
        let runner = ProcessRunner::new(dir.path().join("does-not-exist"));

        let err = runner
            .run(&invocation(&dir), CancelToken::never(), &NoopObserver)
            .await
            .unwrap_err();

        assert!(matches!(err, BcExtractorError::ExecutionFailure { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_keeps_partial_output() {
        let dir = TempDir::new().unwrap();
        let tool = script(&dir, "echo started\nexec sleep 30\n");
        let invocation = invocation(&dir);
        let (handle, token) = cancel_pair();

        let runner = sh_runner(tool).with_drain_grace(Duration::from_millis(500));
        let run = tokio::spawn(async move { runner.run(&invocation, token, &NoopObserver).await });

        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.cancel("operator request");

        let err = tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();

        match err {
            BcExtractorError::Cancelled { reason, captured } => {
                assert_eq!(reason, "operator request");
                assert_eq!(captured.stdout(), b"started\n");
            }
            other => panic!("expected cancellation, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_cancels_the_tool() {
        let dir = TempDir::new().unwrap();
        let tool = script(&dir, "exec sleep 30\n");

        let err = sh_runner(tool)
            .with_timeout(Some(Duration::from_millis(200)))
            .run(&invocation(&dir), CancelToken::never(), &NoopObserver)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("timed out after 200ms"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_never_spawns() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        let tool = script(&dir, &format!("touch '{}'\n", marker.display()));
        let (handle, token) = cancel_pair();
        handle.cancel("shutting down");

        let err = sh_runner(tool)
            .run(&invocation(&dir), token, &NoopObserver)
            .await
            .unwrap_err();

        assert!(matches!(err, BcExtractorError::Cancelled { .. }));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_timeout_applies_while_background_child_holds_pipes() {
        let dir = TempDir::new().unwrap();
        let tool = script(&dir, "echo hi\nsleep 5 &\nexit 0\n");
        let started = Instant::now();

        let err = sh_runner(tool)
            .with_timeout(Some(Duration::from_millis(500)))
            .with_drain_grace(Duration::from_millis(200))
            .run(&invocation(&dir), CancelToken::never(), &NoopObserver)
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(3));
        match err {
            BcExtractorError::Cancelled { reason, captured } => {
                assert_eq!(reason, "timed out after 500ms");
                assert_eq!(captured.stdout(), b"hi\n");
            }
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_applies_while_background_child_holds_pipes() {
        let dir = TempDir::new().unwrap();
        let tool = script(&dir, "echo hi >&2\nsleep 5 &\nexit 0\n");
        let invocation = invocation(&dir);
        let (handle, token) = cancel_pair();
        let started = Instant::now();

        let runner = sh_runner(tool).with_drain_grace(Duration::from_millis(200));
        let run = tokio::spawn(async move { runner.run(&invocation, token, &NoopObserver).await });

        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.cancel("operator abort");

        let err = run.await.unwrap().unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(3));
        match err {
            BcExtractorError::Cancelled { reason, captured } => {
                assert_eq!(reason, "operator abort");
                assert_eq!(captured.stderr(), b"hi\n");
            }
            other => panic!("expected cancellation, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_reader_error_names_the_stream() {
        let failing = tokio::spawn(async {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "pipe broke"))
        });
        let healthy = tokio::spawn(async { Ok(()) });
        let mut readers: [Reader; 2] = [Some(failing), Some(healthy)];

        let message = join_readers(&mut readers).await.unwrap_err();

        assert_eq!(message, "reading stdout failed: pipe broke");
        assert!(readers[0].is_none());
        assert!(readers[1].is_some());
    }
}
