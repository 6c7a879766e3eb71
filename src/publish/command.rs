use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use tracing::debug;

use crate::error::{PublishError, Result};

/// Runs shell command lines in the project directory
pub trait CommandRunner: Send + Sync {
    /// Run `command` through the shell in `dir`; non-zero exit is an error
    fn run(&self, command: &str, dir: &Path) -> Result<()>;
}

/// Runs commands with the platform shell
#[derive(Debug, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, dir: &Path) -> Result<()> {
        debug!(command = %command, dir = %dir.display(), "running command");

        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C");
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c");
            cmd
        };

        let output = cmd
            .arg(command)
            .current_dir(dir)
            .output()
            .map_err(|e| PublishError::CommandFailed {
                command: command.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(PublishError::CommandFailed {
                command: command.to_string(),
                message: format!(
                    "exit code {}\nStdout: {}\nStderr: {}",
                    output.status.code().unwrap_or(-1),
                    stdout,
                    stderr
                ),
            });
        }

        Ok(())
    }
}

/// Records commands instead of running them
#[derive(Debug, Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        RecordingRunner::default()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &str, _dir: &Path) -> Result<()> {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command.to_string());
        }
        Ok(())
    }
}
