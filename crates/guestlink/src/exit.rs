use std::fmt;
use std::io;

use guestlink_frame::FrameError;
use guestlink_host::HostError;
use guestlink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::AddrInUse => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::FrameTooLarge { .. }
        | FrameError::FrameTooShort { .. }
        | FrameError::PathTooLong { .. }
        | FrameError::InvalidPayload(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

/// Map a host error to the exit code the CLI reports for it.
pub fn host_error(context: &str, err: HostError) -> CliError {
    match err {
        HostError::Transport(err) => transport_error(context, err),
        HostError::Frame(err) => frame_error(context, err),
        HostError::HandshakeTimeout(_) | HostError::Timeout(_) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        HostError::PathTooLong { .. } | HostError::ContentTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        HostError::HandshakeFailed(_)
        | HostError::NotConnected
        | HostError::AlreadyConnected
        | HostError::ConnectionClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        HostError::Guest(_) | HostError::WriteFailed { .. } | HostError::CommandFailed { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

/// Exit code for a guest command's exit code.
///
/// Codes outside what a process can return are reported as [`FAILURE`].
pub fn guest_exit_code(code: i32) -> i32 {
    if (0..=255).contains(&code) {
        code
    } else {
        FAILURE
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn timeouts_map_to_124() {
        let err = host_error("wait", HostError::HandshakeTimeout(Duration::from_secs(1)));
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("wait: "));

        let err = host_error("exec", HostError::Timeout(Duration::from_millis(5)));
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn oversized_input_is_data_invalid() {
        let err = host_error(
            "push",
            HostError::ContentTooLarge {
                size: 20,
                max: 10,
            },
        );
        assert_eq!(err.code, DATA_INVALID);

        let err = host_error(
            "push",
            HostError::Frame(FrameError::FrameTooLarge { len: 20, max: 10 }),
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn permission_denied_bind_is_reported() {
        let err = host_error(
            "wait",
            HostError::Transport(TransportError::Bind {
                path: "/run/x".into(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            }),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }

    #[test]
    fn guest_exit_codes_pass_through() {
        assert_eq!(guest_exit_code(0), 0);
        assert_eq!(guest_exit_code(42), 42);
        assert_eq!(guest_exit_code(-9), FAILURE);
        assert_eq!(guest_exit_code(1000), FAILURE);
    }
}
