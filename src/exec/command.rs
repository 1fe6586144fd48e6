// src/exec/command.rs

//! Shell command action bodies.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::action::{ActionBody, ActionFuture, ActionInputs, ActionValue, SkipAction};

/// Environment variable holding the dependency results as a JSON object.
pub const INPUTS_ENV_VAR: &str = "ACTION_GRAPH_INPUTS";

/// Runs a shell command as an action body.
///
/// - The command is run through `sh -c` (`cmd /C` on Windows).
/// - Direct dependency results are passed as JSON in [`INPUTS_ENV_VAR`].
/// - Trimmed stdout becomes the action's value (a JSON string).
/// - A non-zero exit fails the action, unless it matches the configured
///   skip exit code, in which case the action declines to run.
/// - stderr is logged at `debug`.
#[derive(Debug, Clone)]
pub struct CommandAction {
    name: String,
    cmd: String,
    skip_exit_code: Option<i32>,
}

impl CommandAction {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            skip_exit_code: None,
        }
    }

    /// Treat this exit code as "declined" rather than failed.
    pub fn with_skip_exit_code(mut self, code: Option<i32>) -> Self {
        self.skip_exit_code = code;
        self
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    async fn run(&self, inputs: ActionInputs) -> Result<ActionValue> {
        info!(action = %self.name, cmd = %self.cmd, inputs = inputs.len(), "starting command");

        let inputs_json = serde_json::to_string(&inputs.to_json())
            .with_context(|| format!("serializing inputs for action '{}'", self.name))?;

        let mut cmd = shell_command(&self.cmd);
        cmd.env(INPUTS_ENV_VAR, inputs_json)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for action '{}'", self.name))?;

        // Always consume stderr so buffers don't fill; log at debug.
        let stderr_task = child.stderr.take().map(|stderr| {
            let name = self.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(action = %name, "stderr: {}", line);
                }
            })
        });

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout)
                .await
                .with_context(|| format!("reading stdout of action '{}'", self.name))?;
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of action '{}'", self.name))?;

        if let Some(task) = stderr_task {
            if let Err(err) = task.await {
                debug!(action = %self.name, error = %err, "stderr reader task failed");
            }
        }

        let code = status.code().unwrap_or(-1);
        info!(
            action = %self.name,
            exit_code = code,
            success = status.success(),
            "command exited"
        );

        if status.success() {
            return Ok(ActionValue::String(stdout.trim().to_string()));
        }
        if self.skip_exit_code == Some(code) {
            return Err(SkipAction::new(format!("command exited with skip code {code}")).into());
        }
        bail!("command `{}` exited with code {code}", self.cmd)
    }
}

impl ActionBody for CommandAction {
    fn execute(&self, inputs: ActionInputs) -> ActionFuture<'_> {
        Box::pin(self.run(inputs))
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(script: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(script);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(script);
        c
    }
}
