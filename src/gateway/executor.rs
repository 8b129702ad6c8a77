//! Execution Gateway
//!
//! Runs one `ToolInvocation` to completion or timeout and reports the
//! outcome as a value. Nothing in here returns an error once a process has
//! been attempted: launch problems, non-zero exits and timeouts are all
//! `ExecutionStatus` variants carrying whatever output was captured.

use super::error::GatewayError;
use super::invocation::{ExecSpec, ToolInvocation, PIPELINE_SHELL};
use super::profile::ProfileRegistry;
use super::projector::{project, ProjectedOutput};
use super::scratch::ScratchFile;
use super::validator::{validate_options, validate_target, ValidationError};
use crate::metrics;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Maximum captured bytes per stream (4MB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// How long to wait for output pipes to close after the process exits
const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8192;

/// Outcome of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Exited with status zero
    Success,
    /// Ran and exited non-zero (or was killed by a signal)
    ToolFailure,
    /// Never started: missing executable, permissions, resource limits
    LaunchFailure,
    /// Exceeded its wall-clock bound and was killed
    Timeout,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::ToolFailure => "tool_failure",
            ExecutionStatus::LaunchFailure => "launch_failure",
            ExecutionStatus::Timeout => "timeout",
        }
    }
}

/// Result of tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,

    /// Standard output, capped at the configured size
    pub stdout: String,

    /// Standard error, capped at the configured size
    pub stderr: String,

    /// Exit code (None if the process never ran or was killed)
    pub exit_code: Option<i32>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: f64,

    /// Whether either stream hit the output cap
    pub output_truncated: bool,

    /// OS error text when the process could not be started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_error: Option<String>,
}

impl ExecutionResult {
    fn launch_failure(error: String, elapsed: Duration) -> Self {
        Self {
            status: ExecutionStatus::LaunchFailure,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            output_truncated: false,
            launch_error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_ms / 1000.0)
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        match self.status {
            ExecutionStatus::Timeout => format!("Timeout after {:.0}ms", self.duration_ms),
            ExecutionStatus::LaunchFailure => format!(
                "Launch failed: {}",
                self.launch_error.as_deref().unwrap_or("unknown error")
            ),
            ExecutionStatus::Success => format!(
                "Success (exit code: {:?}, {:.0}ms, {} bytes output)",
                self.exit_code,
                self.duration_ms,
                self.stdout.len()
            ),
            ExecutionStatus::ToolFailure => format!(
                "Failed (exit code: {:?}, {:.0}ms, {} bytes output)",
                self.exit_code,
                self.duration_ms,
                self.stdout.len() + self.stderr.len()
            ),
        }
    }
}

/// Full outcome of `Gateway::execute`
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub tool: String,
    pub target: String,
    #[serde(flatten)]
    pub result: ExecutionResult,
    /// Present for `Success` and `ToolFailure`
    pub output: Option<ProjectedOutput>,
}

/// Configuration for the gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Directory for per-invocation scratch files
    pub scratch_dir: PathBuf,

    /// Maximum captured bytes per stream
    pub max_output_bytes: usize,

    /// Wait for output pipes after exit or kill
    pub kill_grace: Duration,

    /// Working directory for tool processes (default: inherited)
    pub working_dir: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("recon-gateway"),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            kill_grace: DEFAULT_KILL_GRACE,
            working_dir: None,
        }
    }
}

impl GatewayConfig {
    /// Create a config with a custom scratch directory
    pub fn with_scratch_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the output cap
    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }
}

/// Safe external-command execution gateway
///
/// # Security
///
/// 1. Targets and options are allow-list validated before anything runs
/// 2. Programs are exec'd with discrete argv elements; only audited
///    pipeline profiles go through `sh -c`, with validated values
/// 3. Every run is time-bounded; the whole process group is killed on
///    timeout and when the calling future is dropped
/// 4. Captured output is capped per stream
///
/// # Example
///
/// ```no_run
/// use recon_gateway::gateway::{Gateway, GatewayConfig, ProfileRegistry};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let gateway = Gateway::new(ProfileRegistry::builtin(), GatewayConfig::default());
///     let outcome = gateway.execute("nuclei", "https://example.com", None).await?;
///     println!("{}", outcome.result.summary());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Gateway {
    registry: ProfileRegistry,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(registry: ProfileRegistry, config: GatewayConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Validate, run and project one scan.
    ///
    /// # Errors
    ///
    /// Only pre-execution problems are errors: unknown tool, rejected input,
    /// or an unusable scratch directory. Everything after spawn is reported
    /// in the returned `ScanOutcome`.
    pub async fn execute(
        &self,
        tool_id: &str,
        target: &str,
        options: Option<&str>,
    ) -> Result<ScanOutcome, GatewayError> {
        let profile = self
            .registry
            .get(tool_id)
            .ok_or_else(|| GatewayError::UnknownTool(tool_id.to_string()))?;

        let options = match self.check_input(tool_id, target, options, profile.accepts_options()) {
            Ok(options) => options,
            Err(e) => {
                warn!("Rejected {} request for {:?}: {}", tool_id, target, e);
                metrics::VALIDATION_REJECTIONS_TOTAL.inc();
                return Err(e.into());
            }
        };

        let scratch = if profile.needs_scratch() {
            Some(ScratchFile::allocate(&self.config.scratch_dir, profile.id()).map_err(GatewayError::Scratch)?)
        } else {
            None
        };
        let scratch_path = scratch.as_ref().map(|s| s.path());

        let mut invocation = ToolInvocation::from_profile(profile, target, &options, scratch_path)?;
        if let Some(dir) = &self.config.working_dir {
            invocation = invocation.in_dir(dir);
        }

        let result = self.run(&invocation).await;

        let output = match result.status {
            ExecutionStatus::Success | ExecutionStatus::ToolFailure => {
                Some(project(&result, profile.format(), scratch_path))
            }
            ExecutionStatus::LaunchFailure | ExecutionStatus::Timeout => None,
        };
        drop(scratch);

        Ok(ScanOutcome {
            tool: tool_id.to_string(),
            target: target.to_string(),
            result,
            output,
        })
    }

    fn check_input(
        &self,
        tool_id: &str,
        target: &str,
        options: Option<&str>,
        accepts_options: bool,
    ) -> Result<Vec<String>, ValidationError> {
        validate_target(target)?;
        let options = validate_options(options.unwrap_or(""))?;
        if !options.is_empty() && !accepts_options {
            return Err(ValidationError::OptionsNotAccepted(tool_id.to_string()));
        }
        Ok(options)
    }

    /// Run an invocation to completion, timeout or cancellation.
    ///
    /// Dropping the returned future kills the process group.
    pub async fn run(&self, invocation: &ToolInvocation) -> ExecutionResult {
        let start = Instant::now();
        let tool = invocation.tool();
        let _active = metrics::ActiveScan::start();

        info!("Executing {}: {}", tool, invocation.summary());
        debug!("Invocation: {:?}", invocation.spec());

        // The shell itself always starts, so check the piped tool up front
        if let ExecSpec::Pipeline { program, .. } = invocation.spec() {
            if let Err(e) = which::which(program) {
                warn!("{} is not executable for {}: {}", program.display(), tool, e);
                let result = ExecutionResult::launch_failure(
                    format!("{}: {}", program.display(), e),
                    start.elapsed(),
                );
                metrics::record_scan(tool, &result);
                return result;
            }
        }

        let mut child = match build_command(invocation).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", tool, e);
                let result = ExecutionResult::launch_failure(e.to_string(), start.elapsed());
                metrics::record_scan(tool, &result);
                return result;
            }
        };
        let mut group = ProcessGroup::new(child.id());

        let cap = self.config.max_output_bytes;
        let stdout_task = tokio::spawn(read_capped(child.stdout.take(), cap));
        let stderr_task = tokio::spawn(read_capped(child.stderr.take(), cap));

        let waited = invocation.timeout().run(child.wait()).await;
        let (status, exit_code, wait_error) = match waited {
            Some(Ok(exit)) if exit.success() => (ExecutionStatus::Success, exit.code(), None),
            Some(Ok(exit)) => (ExecutionStatus::ToolFailure, exit.code(), None),
            Some(Err(e)) => {
                warn!("Failed to wait on {}: {}", tool, e);
                group.kill();
                let _ = child.kill().await;
                (ExecutionStatus::LaunchFailure, None, Some(e.to_string()))
            }
            None => {
                warn!("{} timed out after {:?}", tool, invocation.timeout().duration());
                group.kill();
                if let Err(e) = child.kill().await {
                    debug!("Kill after timeout for {}: {}", tool, e);
                }
                (ExecutionStatus::Timeout, None, None)
            }
        };

        // Descendants left behind by the tool die with the group
        group.kill_remaining();

        let (stdout, stdout_truncated) = self.collect(stdout_task, tool, "stdout").await;
        let (stderr, stderr_truncated) = self.collect(stderr_task, tool, "stderr").await;
        let output_truncated = stdout_truncated || stderr_truncated;
        if output_truncated {
            warn!("{} output exceeded {} bytes and was truncated", tool, cap);
            metrics::OUTPUT_TRUNCATIONS_TOTAL.inc();
        }

        let result = ExecutionResult {
            status,
            stdout,
            stderr,
            exit_code,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            output_truncated,
            launch_error: wait_error,
        };

        match result.status {
            ExecutionStatus::Success => info!("{} finished: {}", tool, result.summary()),
            _ => warn!("{} finished: {}", tool, result.summary()),
        }
        metrics::record_scan(tool, &result);
        result
    }

    async fn collect(
        &self,
        task: tokio::task::JoinHandle<(Vec<u8>, bool)>,
        tool: &str,
        stream: &str,
    ) -> (String, bool) {
        let abort = task.abort_handle();
        match tokio::time::timeout(self.config.kill_grace, task).await {
            Ok(Ok((bytes, truncated))) => (String::from_utf8_lossy(&bytes).into_owned(), truncated),
            Ok(Err(e)) => {
                warn!("{} reader for {} failed: {}", stream, tool, e);
                (String::new(), false)
            }
            Err(_) => {
                warn!("{} of {} still open after exit, dropping it", stream, tool);
                abort.abort();
                (String::new(), false)
            }
        }
    }
}

fn build_command(invocation: &ToolInvocation) -> Command {
    let mut command = match invocation.spec() {
        ExecSpec::Argv { program, args } => {
            let mut command = Command::new(program);
            command.args(args);
            command
        }
        ExecSpec::Pipeline { script, .. } => {
            let mut command = Command::new(PIPELINE_SHELL);
            command.arg("-c").arg(script);
            command
        }
    };

    if let Some(dir) = invocation.working_dir() {
        command.current_dir(dir);
    }

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group so the whole tree can be signalled at once
    #[cfg(unix)]
    command.process_group(0);

    command
}

/// Read a stream to EOF, keeping at most `cap` bytes.
///
/// Reading continues past the cap so the child never blocks on a full pipe.
async fn read_capped<R>(reader: Option<R>, cap: usize) -> (Vec<u8>, bool)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return (Vec::new(), false);
    };

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut truncated = false;

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = cap.saturating_sub(buffer.len());
                if n > room {
                    buffer.extend_from_slice(&chunk[..room]);
                    truncated = true;
                } else {
                    buffer.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) => {
                debug!("Output read error: {}", e);
                break;
            }
        }
    }

    (buffer, truncated)
}

/// Process group of a spawned tool; signalled with SIGKILL on drop.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    /// Kill the group after the leader was reaped, but only while members
    /// remain. An empty group's id is free for reuse and is left alone.
    fn kill_remaining(&mut self) {
        if self.has_members() {
            self.kill();
        } else {
            self.pgid = None;
        }
    }

    /// Whether any process still belongs to the group
    fn has_members(&self) -> bool {
        let Some(pgid) = self.pgid else {
            return false;
        };

        #[cfg(unix)]
        {
            use nix::sys::signal::killpg;
            use nix::unistd::Pid;

            // Signal 0 only checks for existence; EPERM means the id now
            // belongs to someone else's group
            killpg(Pid::from_raw(pgid as i32), None).is_ok()
        }

        #[cfg(not(unix))]
        {
            let _ = pgid;
            false
        }
    }

    fn kill(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
            }
        }

        #[cfg(not(unix))]
        let _ = pgid;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::profile::{OutputFormat, ToolProfile};
    use crate::gateway::timeout::ExecutionTimeout;
    use std::fs;
    use tempfile::TempDir;

    fn gateway_in(dir: &TempDir) -> Gateway {
        Gateway::new(ProfileRegistry::new(), GatewayConfig::with_scratch_dir(dir.path()))
    }

    fn quick(tool: &str, program: &str, args: &[&str]) -> ToolInvocation {
        ToolInvocation::argv(tool, program, args.iter().copied(), ExecutionTimeout::from_secs(10))
    }

    /// Whether `pid` is a live (non-zombie) process
    #[cfg(target_os = "linux")]
    fn process_alive(pid: u32) -> bool {
        match fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => {
                // State follows the parenthesised command name
                let state = stat.rsplit(')').next().and_then(|rest| rest.trim().chars().next());
                !matches!(state, Some('Z') | Some('X'))
            }
            Err(_) => false,
        }
    }

    #[tokio::test]
    async fn test_argv_preserves_argument_boundaries() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway_in(&dir);

        let invocation = quick("printf", "printf", &["[%s]\n", "hello world", "a;b", "$HOME"]);
        let result = gateway.run(&invocation).await;

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout, "[hello world]\n[a;b]\n[$HOME]\n");
        assert!(!result.output_truncated);
    }

    #[tokio::test]
    async fn test_echo_success() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway_in(&dir);

        let result = gateway.run(&quick("echo", "echo", &["one", "two words"])).await;
        assert!(result.is_success());
        assert_eq!(result.stdout, "one two words\n");
        assert!(result.duration_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_non_zero_exit_keeps_output() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway_in(&dir);

        let invocation = quick("sh", "sh", &["-c", "echo '{\"partial\":true}'; echo oops >&2; exit 3"]);
        let result = gateway.run(&invocation).await;

        assert_eq!(result.status, ExecutionStatus::ToolFailure);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.stdout, "{\"partial\":true}\n");
        assert_eq!(result.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_failure() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway_in(&dir);

        let result = gateway
            .run(&quick("ghost", "/nonexistent/bin/this-tool-does-not-exist", &[]))
            .await;

        assert_eq!(result.status, ExecutionStatus::LaunchFailure);
        assert!(result.exit_code.is_none());
        assert!(result.launch_error.is_some());
        assert!(result.summary().contains("Launch failed"));
    }

    #[tokio::test]
    async fn test_missing_pipeline_program_is_launch_failure() {
        let dir = TempDir::new().unwrap();
        let mut registry = ProfileRegistry::new();
        registry.insert(
            ToolProfile::new(
                "crawler",
                "definitely-not-installed-3141",
                &["{target}"],
                OutputFormat::Raw,
                ExecutionTimeout::from_secs(10),
            )
            .and_then(|p| p.with_pipeline("echo {target} | {program} -subs"))
            .unwrap(),
        );
        let gateway = Gateway::new(registry, GatewayConfig::with_scratch_dir(dir.path()));

        let outcome = gateway.execute("crawler", "example.com", None).await.unwrap();
        assert_eq!(outcome.result.status, ExecutionStatus::LaunchFailure);
        assert!(outcome.result.exit_code.is_none());
        assert!(outcome
            .result
            .launch_error
            .as_deref()
            .unwrap()
            .contains("definitely-not-installed-3141"));
        assert!(outcome.output.is_none());
    }

    #[tokio::test]
    async fn test_pipeline_program_not_executable() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway_in(&dir);
        let script = dir.path().join("not-executable");
        fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();

        let invocation = ToolInvocation::pipeline(
            "crawl",
            "echo {target} | {program}",
            &script,
            &[("{target}", "example.com")],
            ExecutionTimeout::from_secs(10),
        )
        .unwrap();
        let result = gateway.run(&invocation).await;

        assert_eq!(result.status, ExecutionStatus::LaunchFailure);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_group_kill_after_exit_only_with_members() {
        let dir = TempDir::new().unwrap();

        let mut lone = Command::new("true");
        lone.process_group(0);
        let mut child = lone.spawn().unwrap();
        let mut group = ProcessGroup::new(child.id());
        child.wait().await.unwrap();
        assert!(!group.has_members());
        group.kill_remaining();
        assert!(group.pgid.is_none());

        let pid_file = dir.path().join("left.pid");
        let script = format!("sleep 30 & echo $! > {}; exit 0", pid_file.display());
        let mut parent = Command::new("sh");
        parent.arg("-c").arg(script).process_group(0);
        let mut child = parent.spawn().unwrap();
        let mut group = ProcessGroup::new(child.id());
        child.wait().await.unwrap();
        assert!(group.has_members());
        group.kill_remaining();

        let pid: u32 = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        let mut alive = true;
        for _ in 0..50 {
            if !process_alive(pid) {
                alive = false;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive, "leftover sleep {} survived", pid);
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway_in(&dir);

        let invocation = ToolInvocation::argv(
            "sleep",
            "sleep",
            ["30"],
            ExecutionTimeout::new(Duration::from_millis(300)),
        );
        let started = Instant::now();
        let result = gateway.run(&invocation).await;

        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert!(result.exit_code.is_none());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_descendants() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway_in(&dir);
        let pid_file = dir.path().join("child.pid");

        let script = format!("sleep 60 & echo $! > {}; wait", pid_file.display());
        let invocation = ToolInvocation::argv(
            "sh",
            "sh",
            ["-c".to_string(), script],
            ExecutionTimeout::new(Duration::from_millis(500)),
        );
        let result = gateway.run(&invocation).await;
        assert_eq!(result.status, ExecutionStatus::Timeout);

        let pid: u32 = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        let mut alive = true;
        for _ in 0..50 {
            if !process_alive(pid) {
                alive = false;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive, "background sleep {} survived the timeout", pid);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropped_future_kills_process_group() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway_in(&dir);
        let pid_file = dir.path().join("cancel.pid");

        let script = format!("sleep 60 & echo $! > {}; wait", pid_file.display());
        let invocation = ToolInvocation::argv("sh", "sh", ["-c".to_string(), script], ExecutionTimeout::from_secs(60));

        // Cancel the way an abandoned HTTP request does: drop the future
        let cancelled = tokio::time::timeout(Duration::from_millis(500), gateway.run(&invocation)).await;
        assert!(cancelled.is_err());

        let pid: u32 = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        let mut alive = true;
        for _ in 0..50 {
            if !process_alive(pid) {
                alive = false;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive, "background sleep {} survived cancellation", pid);
    }

    #[tokio::test]
    async fn test_output_truncation() {
        let dir = TempDir::new().unwrap();
        let config = GatewayConfig::with_scratch_dir(dir.path()).max_output_bytes(100);
        let gateway = Gateway::new(ProfileRegistry::new(), config);

        let result = gateway.run(&quick("seq", "seq", &["100000"])).await;

        assert!(result.is_success());
        assert!(result.output_truncated);
        assert_eq!(result.stdout.len(), 100);
        assert!(result.stdout.starts_with("1\n2\n3\n"));
    }

    #[tokio::test]
    async fn test_working_directory() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway_in(&dir);

        let invocation = quick("pwd", "pwd", &[]).in_dir(dir.path());
        let result = gateway.run(&invocation).await;

        assert!(result.is_success());
        let expected = fs::canonicalize(dir.path()).unwrap();
        assert_eq!(PathBuf::from(result.stdout.trim()), expected);
    }

    #[tokio::test]
    async fn test_pipeline_invocation() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway_in(&dir);

        let invocation = ToolInvocation::pipeline(
            "crawl",
            "echo {target} | {program} a-z A-Z",
            "tr",
            &[("{target}", "example.com")],
            ExecutionTimeout::from_secs(10),
        )
        .unwrap();
        let result = gateway.run(&invocation).await;

        assert!(result.is_success());
        assert_eq!(result.stdout, "EXAMPLE.COM\n");
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway_in(&dir);

        let err = gateway.execute("masscan", "example.com", None).await.unwrap_err();
        assert!(matches!(err, GatewayError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn test_execute_rejects_before_spawn() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("spawned");
        let mut registry = ProfileRegistry::new();
        registry.insert(
            ToolProfile::new(
                "touch",
                "touch",
                &[marker.to_str().unwrap(), "{target}"],
                OutputFormat::Raw,
                ExecutionTimeout::from_secs(5),
            )
            .unwrap(),
        );
        let gateway = Gateway::new(registry, GatewayConfig::with_scratch_dir(dir.path()));

        for target in ["a;b", "", "x`id`", "a b", "-rf"] {
            let err = gateway.execute("touch", target, None).await.unwrap_err();
            assert!(matches!(err, GatewayError::ValidationRejected(_)), "{:?}", target);
        }
        let err = gateway.execute("touch", "example.com", Some("-v")).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::ValidationRejected(ValidationError::OptionsNotAccepted(_))
        ));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_execute_projects_json() {
        let dir = TempDir::new().unwrap();
        let mut registry = ProfileRegistry::new();
        registry.insert(
            ToolProfile::new(
                "json-echo",
                "printf",
                &["%s\n", "{target}"],
                OutputFormat::Json,
                ExecutionTimeout::from_secs(5),
            )
            .unwrap(),
        );
        let gateway = Gateway::new(registry, GatewayConfig::with_scratch_dir(dir.path()));

        let outcome = gateway.execute("json-echo", "42", None).await.unwrap();
        assert!(outcome.result.is_success());
        assert_eq!(
            outcome.output,
            Some(ProjectedOutput::Json {
                value: serde_json::json!(42)
            })
        );

        let outcome = gateway.execute("json-echo", "example.com", None).await.unwrap();
        assert_eq!(outcome.output.map(|o| o.kind()), Some("parse_failure"));
    }

    /// Registry with a tool that writes its target into the scratch file,
    /// then runs `tail` (a shell snippet) before exiting.
    fn scratch_gateway(dir: &TempDir, tail: &str, timeout: ExecutionTimeout) -> Gateway {
        let script = format!("echo \"$1\" > \"$0\"; echo \"  \" >> \"$0\"; {}", tail);
        let mut registry = ProfileRegistry::new();
        registry.insert(
            ToolProfile::new(
                "writer",
                "sh",
                &["-c", script.as_str(), "{scratch}", "{target}"],
                OutputFormat::LinesFromFile,
                timeout,
            )
            .unwrap(),
        );
        Gateway::new(registry, GatewayConfig::with_scratch_dir(dir.path().join("scratch")))
    }

    fn scratch_entries(dir: &TempDir) -> usize {
        fs::read_dir(dir.path().join("scratch"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_scratch_lines_and_cleanup_on_success() {
        let dir = TempDir::new().unwrap();
        let gateway = scratch_gateway(&dir, "exit 0", ExecutionTimeout::from_secs(10));

        let outcome = gateway.execute("writer", "a.example.com", None).await.unwrap();
        assert!(outcome.result.is_success());
        assert_eq!(
            outcome.output,
            Some(ProjectedOutput::Lines {
                lines: vec!["a.example.com".to_string()]
            })
        );
        assert_eq!(scratch_entries(&dir), 0);
    }

    #[tokio::test]
    async fn test_scratch_cleanup_on_failure() {
        let dir = TempDir::new().unwrap();
        let gateway = scratch_gateway(&dir, "exit 2", ExecutionTimeout::from_secs(10));

        let outcome = gateway.execute("writer", "b.example.com", None).await.unwrap();
        assert_eq!(outcome.result.status, ExecutionStatus::ToolFailure);
        assert_eq!(outcome.result.exit_code, Some(2));
        assert_eq!(outcome.output.map(|o| o.kind()), Some("lines"));
        assert_eq!(scratch_entries(&dir), 0);
    }

    #[tokio::test]
    async fn test_scratch_cleanup_on_timeout() {
        let dir = TempDir::new().unwrap();
        let gateway = scratch_gateway(&dir, "sleep 30", ExecutionTimeout::new(Duration::from_millis(300)));

        let outcome = gateway.execute("writer", "c.example.com", None).await.unwrap();
        assert_eq!(outcome.result.status, ExecutionStatus::Timeout);
        assert!(outcome.output.is_none());
        assert_eq!(scratch_entries(&dir), 0);
    }

    #[tokio::test]
    async fn test_missing_scratch_output() {
        let dir = TempDir::new().unwrap();
        let mut registry = ProfileRegistry::new();
        registry.insert(
            ToolProfile::new(
                "silent",
                "true",
                &["{scratch}", "{target}"],
                OutputFormat::LinesFromFile,
                ExecutionTimeout::from_secs(5),
            )
            .unwrap(),
        );
        let gateway = Gateway::new(registry, GatewayConfig::with_scratch_dir(dir.path()));

        let outcome = gateway.execute("silent", "example.com", None).await.unwrap();
        assert!(outcome.result.is_success());
        assert_eq!(outcome.output.map(|o| o.kind()), Some("missing_output"));
    }

    #[tokio::test]
    async fn test_concurrent_invocations_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let gateway = scratch_gateway(&dir, "sleep 0.2", ExecutionTimeout::from_secs(10));

        let (first, second) = futures::future::join(
            gateway.execute("writer", "one.example.com", None),
            gateway.execute("writer", "two.example.com", None),
        )
        .await;

        assert_eq!(
            first.unwrap().output,
            Some(ProjectedOutput::Lines {
                lines: vec!["one.example.com".to_string()]
            })
        );
        assert_eq!(
            second.unwrap().output,
            Some(ProjectedOutput::Lines {
                lines: vec!["two.example.com".to_string()]
            })
        );
        assert_eq!(scratch_entries(&dir), 0);
    }
}
