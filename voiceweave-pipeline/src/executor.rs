//! Step-executor contract and the subprocess implementation.
//!
//! An executor is invoked as `<program> [args..] <project_dir> <step>`. It
//! reads and updates `project.json` itself and prints one JSON document on
//! stdout:
//!
//! ```text
//! { "success": true|false, "error"?: "...", "message"?: "...", ...extra }
//! ```
//!
//! The exit code must be zero iff `success` is true. Anything else is an
//! invocation error, not a business failure.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use voiceweave_core::Step;

use crate::error::{io_err, PipelineError};

/// Environment variable naming the executor directory.
pub const EXECUTOR_DIR_ENV: &str = "VOICEWEAVE_EXECUTOR_DIR";

/// Script run by [`ExecutorConfig::python`].
pub const PIPELINE_SCRIPT: &str = "project_pipeline.py";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Structured result printed by a step executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Stage-specific extra fields, kept verbatim.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl StepReport {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            error: None,
            message: Some(message.into()),
            details: Map::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            message: None,
            details: Map::new(),
        }
    }
}

/// Cooperative cancellation flag shared between a caller and a running step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-invocation limits.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Kill the executor after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl RunOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Runs one pipeline stage against a project folder.
pub trait StepExecutor {
    fn execute(
        &self,
        project_dir: &Path,
        step: Step,
        options: &RunOptions,
    ) -> Result<StepReport, PipelineError>;
}

impl<T: StepExecutor + ?Sized> StepExecutor for &T {
    fn execute(
        &self,
        project_dir: &Path,
        step: Step,
        options: &RunOptions,
    ) -> Result<StepReport, PipelineError> {
        (**self).execute(project_dir, step, options)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How to launch the external executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub program: PathBuf,
    /// Arguments placed before `<project_dir> <step>`.
    pub args: Vec<OsString>,
    /// Child working directory, also exported as [`EXECUTOR_DIR_ENV`] and
    /// prepended to `PYTHONPATH`.
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<OsString, OsString>,
}

impl ExecutorConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Python executor rooted at `executor_dir`: `<python> <dir>/project_pipeline.py`.
    ///
    /// A virtualenv inside the directory wins over the system `python3`.
    pub fn python(executor_dir: impl Into<PathBuf>) -> Self {
        let dir = executor_dir.into();
        let interpreter = [
            ".venv/bin/python3",
            ".venv/bin/python",
            ".venv/Scripts/python.exe",
        ]
        .iter()
        .map(|rel| dir.join(rel))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| PathBuf::from("python3"));

        Self::new(interpreter)
            .arg(dir.join(PIPELINE_SCRIPT))
            .working_dir(dir)
    }

    /// [`ExecutorConfig::python`] for the directory named by [`EXECUTOR_DIR_ENV`].
    pub fn from_env() -> Result<Self, PipelineError> {
        std::env::var_os(EXECUTOR_DIR_ENV)
            .filter(|dir| !dir.is_empty())
            .map(Self::python)
            .ok_or(PipelineError::ExecutorNotConfigured)
    }

    fn command(&self, project_dir: &Path, step: Step) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(project_dir)
            .arg(step.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir)
                .env(EXECUTOR_DIR_ENV, dir)
                .env("PYTHONPATH", python_path_with(dir));
        }
        cmd.envs(&self.env);
        cmd
    }
}

fn python_path_with(dir: &Path) -> OsString {
    let mut entries = vec![dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PYTHONPATH") {
        entries.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(entries).unwrap_or_else(|_| dir.as_os_str().to_owned())
}

// ---------------------------------------------------------------------------
// Subprocess executor
// ---------------------------------------------------------------------------

/// [`StepExecutor`] that launches an external program per stage.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    config: ExecutorConfig,
}

impl ProcessExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }
}

impl StepExecutor for ProcessExecutor {
    fn execute(
        &self,
        project_dir: &Path,
        step: Step,
        options: &RunOptions,
    ) -> Result<StepReport, PipelineError> {
        let program = &self.config.program;
        let mut child = self
            .config
            .command(project_dir, step)
            .spawn()
            .map_err(|source| PipelineError::Spawn {
                program: program.clone(),
                source,
            })?;
        tracing::debug!(
            program = %program.display(),
            pid = child.id(),
            step = %step,
            "spawned step executor"
        );

        let stdout = Capture::start(child.stdout.take());
        let stderr = Capture::start(child.stderr.take());

        let deadline = options.timeout.map(|after| (Instant::now() + after, after));
        let waited = wait_for(&mut child, options, deadline).map_err(|e| io_err(program, e))?;
        let stopped = match waited {
            // Descendants of the executor may still hold the pipes open.
            Waited::Exited(status) => match drain(&[&stdout, &stderr], options, deadline) {
                None => return parse_report(status, stdout.finish(), stderr.finish()),
                Some(stopped) => stopped,
            },
            Waited::Stopped(stopped) => stopped,
        };
        Err(match stopped {
            Stopped::TimedOut(after) => PipelineError::TimedOut {
                after,
                stdout: stdout.snapshot(),
                stderr: stderr.snapshot(),
            },
            Stopped::Cancelled => PipelineError::Cancelled {
                stdout: stdout.snapshot(),
                stderr: stderr.snapshot(),
            },
        })
    }
}

enum Waited {
    Exited(ExitStatus),
    Stopped(Stopped),
}

/// Why a run ended before its result could be read.
enum Stopped {
    TimedOut(Duration),
    Cancelled,
}

fn wait_for(
    child: &mut Child,
    options: &RunOptions,
    deadline: Option<(Instant, Duration)>,
) -> io::Result<Waited> {
    if deadline.is_none() && options.cancel.is_none() {
        return child.wait().map(Waited::Exited);
    }

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Waited::Exited(status));
        }
        if let Some(stopped) = check_stop(options, deadline) {
            kill_and_reap(child);
            return Ok(Waited::Stopped(stopped));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Wait for every capture to reach end of stream, bounded by the same
/// deadline and cancel token as the child itself.
fn drain(
    captures: &[&Capture],
    options: &RunOptions,
    deadline: Option<(Instant, Duration)>,
) -> Option<Stopped> {
    if deadline.is_none() && options.cancel.is_none() {
        return None;
    }
    loop {
        if captures.iter().all(|c| c.is_finished()) {
            return None;
        }
        if let Some(stopped) = check_stop(options, deadline) {
            tracing::warn!("step executor exited but its output pipes are still open");
            return Some(stopped);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn check_stop(options: &RunOptions, deadline: Option<(Instant, Duration)>) -> Option<Stopped> {
    if options.is_cancelled() {
        return Some(Stopped::Cancelled);
    }
    match deadline {
        Some((at, after)) if Instant::now() >= at => Some(Stopped::TimedOut(after)),
        _ => None,
    }
}

fn kill_and_reap(child: &mut Child) {
    if let Err(err) = child.kill() {
        tracing::warn!(pid = child.id(), error = %err, "failed to kill step executor");
    }
    let _ = child.wait();
}

/// Drains one child pipe on a background thread.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl Capture {
    fn start<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            let Some(mut pipe) = pipe else { return };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => lock(&sink).extend_from_slice(&chunk[..n]),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        });
        Self { buf, handle }
    }

    fn finish(self) -> String {
        let Capture { buf, handle } = self;
        let _ = handle.join();
        let text = String::from_utf8_lossy(&lock(&buf)).into_owned();
        text
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    fn snapshot(&self) -> String {
        String::from_utf8_lossy(&lock(&self.buf)).into_owned()
    }
}

fn lock(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Result parsing
// ---------------------------------------------------------------------------

/// Validate the executor's stdout against its exit status.
pub(crate) fn parse_report(
    status: ExitStatus,
    stdout: String,
    stderr: String,
) -> Result<StepReport, PipelineError> {
    let report = match result_document(&stdout) {
        Ok(report) => report,
        Err(reason) => {
            return Err(PipelineError::MalformedOutput {
                reason,
                stdout,
                stderr,
            })
        }
    };

    if report.success != status.success() {
        return Err(PipelineError::ExitMismatch {
            success: report.success,
            code: status.code(),
            stdout,
            stderr,
        });
    }
    Ok(report)
}

/// The whole of stdout should be the result document; executors that log
/// progress to stdout are tolerated when the last non-empty line is.
fn result_document(stdout: &str) -> Result<StepReport, String> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err("no output on stdout".to_owned());
    }

    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(whole_err) => trimmed
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .and_then(|line| serde_json::from_str::<Value>(line).ok())
            .ok_or_else(|| format!("stdout is not a JSON document: {whole_err}"))?,
    };

    match value.get("success") {
        Some(Value::Bool(_)) => {}
        Some(_) => return Err("`success` is not a boolean".to_owned()),
        None => return Err("missing `success` field".to_owned()),
    }
    serde_json::from_value(value).map_err(|e| format!("invalid result document: {e}"))
}
