//! Page actuator backed by shell commands.
//!
//! Each action runs through `sh -c`. The capture command receives the target
//! file through a `{path}` placeholder, shell-quoted.

use crate::core::guard::PageActuator;
use crate::error::ActuatorError;
use std::path::Path;
use std::process::{Command, Output};
use std::time::Duration;
use tracing::debug;

/// Shell commands driving the device
#[derive(Debug, Clone, Default)]
pub struct CommandActuatorConfig {
    /// Advances one page
    pub turn_command: Option<String>,
    /// Writes a PNG of the current screen to `{path}`
    pub capture_command: Option<String>,
    /// Exit status 0 while the reading session is open
    pub liveness_command: Option<String>,
    /// Exit status 0 while another page follows
    pub has_next_command: Option<String>,
    /// Settle time after every page turn
    pub wait_after_turn: Duration,
}

/// [`PageActuator`] that shells out for every action
#[derive(Debug, Clone)]
pub struct CommandActuator {
    config: CommandActuatorConfig,
}

impl CommandActuator {
    pub fn new(config: CommandActuatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CommandActuatorConfig {
        &self.config
    }

    fn run(command: &str) -> Result<Output, ActuatorError> {
        debug!(command, "Running device command");
        let mut child = Command::new("sh");
        child.arg("-c").arg(command);
        // Own process group: a terminal Ctrl-C reaches only this process, so
        // the running capture finishes before the session stops.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut child, 0);
        child
            .output()
            .map_err(|source| ActuatorError::Spawn {
                command: command.to_string(),
                source,
            })
    }

    fn run_checked(command: &str) -> Result<(), ActuatorError> {
        let output = Self::run(command)?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ActuatorError::CommandFailed {
            command: command.to_string(),
            reason: format!("{} {}", output.status, stderr.trim()),
        })
    }

    /// Exit status as a yes/no answer
    fn probe(command: &str) -> Result<bool, ActuatorError> {
        Ok(Self::run(command)?.status.success())
    }
}

impl PageActuator for CommandActuator {
    fn turn_page(&mut self) -> Result<(), ActuatorError> {
        let command = self
            .config
            .turn_command
            .as_deref()
            .ok_or(ActuatorError::NotConfigured { action: "page turns" })?;
        Self::run_checked(command)?;
        if !self.config.wait_after_turn.is_zero() {
            std::thread::sleep(self.config.wait_after_turn);
        }
        Ok(())
    }

    fn capture_frame(&mut self, destination: &Path) -> Result<(), ActuatorError> {
        let template = self
            .config
            .capture_command
            .as_deref()
            .ok_or(ActuatorError::NotConfigured { action: "capture" })?;
        let command = substitute_path(template, destination);
        Self::run_checked(&command)?;
        if !destination.is_file() {
            return Err(ActuatorError::MissingFrame {
                path: destination.to_path_buf(),
            });
        }
        Ok(())
    }

    fn has_next_page(&mut self) -> Result<bool, ActuatorError> {
        match self.config.has_next_command.as_deref() {
            Some(command) => Self::probe(command),
            None => Ok(true),
        }
    }

    fn is_session_alive(&mut self) -> Result<bool, ActuatorError> {
        match self.config.liveness_command.as_deref() {
            Some(command) => Self::probe(command),
            None => Ok(true),
        }
    }
}

/// Replace every `{path}` in `template` with the quoted destination
fn substitute_path(template: &str, path: &Path) -> String {
    template.replace("{path}", &shell_quote(&path.to_string_lossy()))
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
