//! Subprocess execution with timeout handling.

use std::collections::HashMap;
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{CommandError, CommandResult};

/// Shell used for scripts and exec actions.
pub const SHELL: &str = "/bin/bash";

/// Output of a finished subprocess.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    pub success: bool,
}

/// Runs subprocesses with a deadline.
///
/// A subprocess still running when the deadline passes is killed.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    timeout_seconds: u64,
    env: HashMap<String, String>,
}

impl CommandExecutor {
    /// Initialize an executor.
    ///
    /// # Arguments
    /// * `timeout_seconds` - Maximum time a subprocess may run.
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            timeout_seconds,
            env: HashMap::new(),
        }
    }

    /// Extra environment variables, on top of the inherited environment.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Get the timeout in seconds.
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    /// Execute `program` with `args`, capturing its output.
    ///
    /// # Returns
    /// ExecutionResult for any finished process, successful or not. Timeouts
    /// and spawn failures are errors.
    pub async fn execute(&self, program: &str, args: &[String]) -> CommandResult<ExecutionResult> {
        let mut cmd = TokioCommand::new(program);
        cmd.args(args)
            .envs(&self.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        trace!(program, ?args, "executing subprocess");

        match timeout(Duration::from_secs(self.timeout_seconds), cmd.output()).await {
            Ok(Ok(output)) => Ok(ExecutionResult {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                return_code: output.status.code().unwrap_or(-1),
                success: output.status.success(),
            }),
            Ok(Err(e)) => Err(CommandError::Io(e)),
            Err(_) => {
                warn!("sub-command timed out");
                Err(CommandError::timeout(
                    describe(program, args),
                    self.timeout_seconds,
                ))
            }
        }
    }

    /// Execute a subprocess on behalf of command `owner` and return its stdout lines.
    ///
    /// A failing subprocess is reported as a bad arguments error, since the
    /// values it should have produced cannot be validated.
    pub async fn lines(&self, owner: &str, program: &str, args: &[String]) -> CommandResult<Vec<String>> {
        let failed = |reason: String| {
            CommandError::bad_arguments(format!(
                "could not validate argument for command {}, ran <{}> failed: {}",
                owner,
                describe(program, args),
                reason
            ))
        };

        let result = match self.execute(program, args).await {
            Ok(result) => result,
            Err(CommandError::Io(e)) => {
                debug!("error running {}: {}", describe(program, args), e);
                return Err(failed(e.to_string()));
            }
            Err(e) => return Err(e),
        };

        if !result.success {
            debug!(
                "error running {}: exit status {}: {}",
                describe(program, args),
                result.return_code,
                result.stderr.trim_end()
            );
            return Err(failed(format!("exit status: {}", result.return_code)));
        }

        trace!("finished running {}: {}", describe(program, args), result.stdout);
        Ok(split_lines(&result.stdout))
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(5)
    }
}

fn describe(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Split subprocess output into lines, dropping the final newline.
///
/// Empty output yields no lines.
pub fn split_lines(stdout: &str) -> Vec<String> {
    let trimmed = stdout.strip_suffix('\n').unwrap_or(stdout);
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('\n').map(str::to_string).collect()
}

/// Run `script` through the shell, streaming its stdout into `out`.
///
/// Blocks until the script finishes; stderr is inherited.
pub fn run_shell(script: &str, env: &HashMap<String, String>, out: &mut dyn Write) -> CommandResult<()> {
    debug!("running shell action: {}", script);
    let output = std::process::Command::new(SHELL)
        .arg("-c")
        .arg(script)
        .envs(env)
        .stdin(Stdio::inherit())
        .stderr(Stdio::inherit())
        .stdout(Stdio::piped())
        .output()
        .map_err(|e| CommandError::execution(format!("Failed to execute '{}': {}", script, e)))?;

    out.write_all(&output.stdout)?;

    if !output.status.success() {
        return Err(CommandError::execution(format!(
            "Command failed with exit code: {}",
            output.status.code().unwrap_or(-1)
        )));
    }

    Ok(())
}
