//! Guest operations built on [`VsockHost::request`].

use std::time::Duration;

use guestlink_frame::payload::{
    decode_error, decode_exec_result, decode_write_file_result, encode_exec, encode_write_file,
};
use guestlink_frame::{ExecResult, MessageType, MAX_PATH_LEN, MAX_WRITE_CONTENT};
use tracing::{debug, info};

use crate::error::{HostError, Result};
use crate::host::VsockHost;

const REACHABILITY_PROBE: &str = "echo ok";

impl VsockHost {
    /// Run a shell command in the guest with the default timeout.
    ///
    /// Never fails: transport problems, timeouts and guest errors come back
    /// as an [`ExecResult`] with exit code 1 and the error text on stderr.
    pub async fn exec(&self, command: &str) -> ExecResult {
        self.exec_with_timeout(command, self.config().exec_timeout)
            .await
    }

    /// Run a shell command with an explicit command timeout.
    ///
    /// The guest enforces `timeout`. The host waits `timeout` plus the
    /// configured transit grace for the result.
    pub async fn exec_with_timeout(&self, command: &str, timeout: Duration) -> ExecResult {
        match self.try_exec(command, timeout).await {
            Ok(result) => result,
            Err(err) => {
                debug!(command, error = %err, "exec failed");
                ExecResult::failure(err.to_string())
            }
        }
    }

    async fn try_exec(&self, command: &str, timeout: Duration) -> Result<ExecResult> {
        let timeout_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        let payload = encode_exec(command, timeout_ms)?;
        let response = self
            .request(
                MessageType::Exec,
                payload,
                timeout.saturating_add(self.config().transit_grace),
            )
            .await?;

        if response.is(MessageType::Error) {
            return Ok(ExecResult::failure(decode_error(&response.payload)));
        }
        Ok(decode_exec_result(&response.payload))
    }

    /// Like [`exec`](Self::exec), but a non-zero exit code is an error
    /// carrying stderr, or stdout when stderr is empty.
    pub async fn exec_checked(&self, command: &str) -> Result<ExecResult> {
        let result = self.exec(command).await;
        if !result.success() {
            return Err(command_failed(&result));
        }
        Ok(result)
    }

    /// Write `content` to `path` in the guest as the agent's own user.
    pub async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        self.write_file_as(path, content, false).await
    }

    /// Write `content` to `path` in the guest with elevated privileges.
    pub async fn write_file_with_sudo(&self, path: &str, content: &[u8]) -> Result<()> {
        self.write_file_as(path, content, true).await
    }

    async fn write_file_as(&self, path: &str, content: &[u8], sudo: bool) -> Result<()> {
        if path.len() > MAX_PATH_LEN {
            return Err(HostError::PathTooLong {
                len: path.len(),
                max: MAX_PATH_LEN,
            });
        }
        if content.len() > MAX_WRITE_CONTENT {
            return Err(HostError::ContentTooLarge {
                size: content.len(),
                max: MAX_WRITE_CONTENT,
            });
        }

        let payload = encode_write_file(path, content, sudo)?;
        let response = self
            .request(MessageType::WriteFile, payload, self.config().write_timeout)
            .await?;

        if response.is(MessageType::Error) {
            return Err(HostError::Guest(decode_error(&response.payload)));
        }
        let result = decode_write_file_result(&response.payload);
        if !result.success {
            return Err(HostError::WriteFailed {
                path: path.to_string(),
                reason: result.error,
            });
        }

        info!(path, bytes = content.len(), sudo, "wrote file to guest");
        Ok(())
    }

    /// Read a text file from the guest.
    pub async fn read_file(&self, path: &str) -> Result<String> {
        let result = self.exec(&format!("cat {}", shell_quote(path))).await;
        if !result.success() {
            return Err(command_failed(&result));
        }
        Ok(result.stdout)
    }

    /// Create a directory and its parents in the guest.
    pub async fn mkdir(&self, path: &str) -> Result<()> {
        self.exec_checked(&format!("mkdir -p {}", shell_quote(path)))
            .await?;
        Ok(())
    }

    /// Whether `path` exists in the guest. Any failure counts as absent.
    pub async fn exists(&self, path: &str) -> bool {
        self.exec(&format!("test -e {}", shell_quote(path)))
            .await
            .success()
    }

    /// Whether the guest answers a trivial command.
    pub async fn is_reachable(&self) -> bool {
        let result = self
            .exec_with_timeout(REACHABILITY_PROBE, self.config().reachability_timeout)
            .await;
        result.success() && result.stdout.trim() == "ok"
    }
}

fn command_failed(result: &ExecResult) -> HostError {
    let output = if result.stderr.is_empty() {
        &result.stdout
    } else {
        &result.stderr
    };
    HostError::CommandFailed {
        exit_code: result.exit_code,
        output: output.clone(),
    }
}

/// Quote `arg` as a single POSIX shell word.
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}
