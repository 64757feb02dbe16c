//! Typed payloads carried inside frames.
//!
//! Host-side requests (`exec`, `write_file`) encode strictly and fail on
//! oversized fields. Guest responses decode leniently: a malformed response
//! becomes a failed result instead of an error, so one bad reply never takes
//! down the connection.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{MAX_FRAME_LEN, MIN_BODY_LEN};
use crate::error::{FrameError, Result};

/// Longest path that fits the 2-byte `path_len` field.
pub const MAX_PATH_LEN: usize = u16::MAX as usize;

/// Largest file content accepted for `write_file`, leaving headroom for the
/// path and fixed fields inside one frame.
pub const MAX_WRITE_CONTENT: usize = MAX_FRAME_LEN - 1024;

/// `write_file` flag bit: write through `sudo`.
pub const SUDO_FLAG: u8 = 0x01;

const MAX_ERROR_LEN: usize = u16::MAX as usize;

const INVALID_EXEC_RESULT: &str = "Invalid exec_result payload";
const INVALID_WRITE_FILE_RESULT: &str = "Invalid write_file_result payload";
const INVALID_ERROR: &str = "Invalid error payload";

/// Decoded `exec` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Time the guest may spend running the command.
    pub timeout_ms: u32,
    /// Shell command line.
    pub command: String,
}

/// Outcome of a command executed in the guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Process exit code.
    pub exit_code: i32,
    /// Captured stdout (lossy UTF-8).
    pub stdout: String,
    /// Captured stderr (lossy UTF-8).
    pub stderr: String,
}

impl ExecResult {
    /// A failed result with exit code 1 and the given message on stderr.
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Decoded `write_file` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFileRequest {
    pub path: String,
    pub content: Bytes,
    pub sudo: bool,
}

/// Outcome of a `write_file` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFileResult {
    pub success: bool,
    /// Empty on success.
    pub error: String,
}

/// Encode an `exec` payload: `[4B timeout_ms][4B cmd_len][cmd]`.
pub fn encode_exec(command: &str, timeout_ms: u32) -> Result<Bytes> {
    let cmd_len = checked_len(command.len())?;
    let mut buf = BytesMut::with_capacity(8 + command.len());
    buf.put_u32(timeout_ms);
    buf.put_u32(cmd_len);
    buf.put_slice(command.as_bytes());
    Ok(buf.freeze())
}

/// Decode an `exec` payload (guest side).
pub fn decode_exec(payload: &[u8]) -> Result<ExecRequest> {
    let mut cur = PayloadCursor::new(payload);
    let (Some(timeout_ms), Some(cmd_len)) = (cur.u32(), cur.u32()) else {
        return Err(FrameError::InvalidPayload("Invalid exec payload"));
    };
    let command = cur.take_up_to(cmd_len as usize);
    Ok(ExecRequest {
        timeout_ms,
        command: String::from_utf8_lossy(command).into_owned(),
    })
}

/// Encode an `exec_result` payload:
/// `[4B exit_code (signed)][4B stdout_len][stdout][4B stderr_len][stderr]`.
pub fn encode_exec_result(exit_code: i32, stdout: &[u8], stderr: &[u8]) -> Result<Bytes> {
    let stdout_len = checked_len(stdout.len())?;
    let stderr_len = checked_len(stderr.len())?;
    let mut buf = BytesMut::with_capacity(12 + stdout.len() + stderr.len());
    buf.put_i32(exit_code);
    buf.put_u32(stdout_len);
    buf.put_slice(stdout);
    buf.put_u32(stderr_len);
    buf.put_slice(stderr);
    Ok(buf.freeze())
}

/// Decode an `exec_result` payload.
///
/// Never fails. Any truncation yields exit code 1 with
/// `"Invalid exec_result payload"` on stderr: a payload shorter than the
/// 8-byte header, and also one whose stdout or stderr length prefix points
/// past the end of the payload. No partial output is returned in either case.
pub fn decode_exec_result(payload: &[u8]) -> ExecResult {
    let mut cur = PayloadCursor::new(payload);
    let parsed = (|| {
        let exit_code = cur.i32()?;
        let stdout_len = cur.u32()? as usize;
        let stdout = cur.take(stdout_len)?;
        let stderr_len = cur.u32()? as usize;
        let stderr = cur.take(stderr_len)?;
        Some(ExecResult {
            exit_code,
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        })
    })();
    parsed.unwrap_or_else(|| ExecResult::failure(INVALID_EXEC_RESULT))
}

/// Encode a `write_file` payload:
/// `[2B path_len][path][1B flags][4B content_len][content]`.
///
/// Fails if the UTF-8 path is longer than [`MAX_PATH_LEN`] bytes.
pub fn encode_write_file(path: &str, content: &[u8], sudo: bool) -> Result<Bytes> {
    if path.len() > MAX_PATH_LEN {
        return Err(FrameError::PathTooLong {
            len: path.len(),
            max: MAX_PATH_LEN,
        });
    }
    let content_len = checked_len(content.len())?;
    let flags = if sudo { SUDO_FLAG } else { 0 };

    let mut buf = BytesMut::with_capacity(7 + path.len() + content.len());
    buf.put_u16(path.len() as u16);
    buf.put_slice(path.as_bytes());
    buf.put_u8(flags);
    buf.put_u32(content_len);
    buf.put_slice(content);
    Ok(buf.freeze())
}

/// Decode a `write_file` payload (guest side).
pub fn decode_write_file(payload: &[u8]) -> Result<WriteFileRequest> {
    if payload.len() < 3 {
        return Err(FrameError::InvalidPayload("Invalid write_file payload"));
    }
    let mut cur = PayloadCursor::new(payload);
    let too_short = || FrameError::InvalidPayload("Invalid write_file payload: too short");

    let path_len = cur.u16().ok_or_else(too_short)? as usize;
    let path = cur.take(path_len).ok_or_else(too_short)?;
    let flags = cur.u8().ok_or_else(too_short)?;
    let content_len = cur.u32().ok_or_else(too_short)? as usize;
    let content = cur.take(content_len).ok_or(FrameError::InvalidPayload(
        "Invalid write_file payload: content truncated",
    ))?;

    Ok(WriteFileRequest {
        path: String::from_utf8_lossy(path).into_owned(),
        content: Bytes::copy_from_slice(content),
        sudo: flags & SUDO_FLAG != 0,
    })
}

/// Encode a `write_file_result` payload: `[1B success][2B error_len][error]`.
///
/// Error text longer than 65535 bytes is truncated.
pub fn encode_write_file_result(success: bool, error: &str) -> Bytes {
    let error = truncate_utf8(error, MAX_ERROR_LEN);
    let mut buf = BytesMut::with_capacity(3 + error.len());
    buf.put_u8(u8::from(success));
    buf.put_u16(error.len() as u16);
    buf.put_slice(error.as_bytes());
    buf.freeze()
}

/// Decode a `write_file_result` payload.
///
/// Never fails: a truncated payload yields an unsuccessful result.
pub fn decode_write_file_result(payload: &[u8]) -> WriteFileResult {
    let mut cur = PayloadCursor::new(payload);
    let parsed = (|| {
        let success = cur.u8()? != 0;
        let error_len = cur.u16()? as usize;
        let error = cur.take(error_len)?;
        Some(WriteFileResult {
            success,
            error: String::from_utf8_lossy(error).into_owned(),
        })
    })();
    parsed.unwrap_or_else(|| WriteFileResult {
        success: false,
        error: INVALID_WRITE_FILE_RESULT.to_string(),
    })
}

/// Encode an `error` payload: `[2B error_len][error]`.
///
/// Error text longer than 65535 bytes is truncated.
pub fn encode_error(error: &str) -> Bytes {
    let error = truncate_utf8(error, MAX_ERROR_LEN);
    let mut buf = BytesMut::with_capacity(2 + error.len());
    buf.put_u16(error.len() as u16);
    buf.put_slice(error.as_bytes());
    buf.freeze()
}

/// Decode an `error` payload. Never fails.
pub fn decode_error(payload: &[u8]) -> String {
    let mut cur = PayloadCursor::new(payload);
    let parsed = (|| {
        let error_len = cur.u16()? as usize;
        cur.take(error_len)
    })();
    match parsed {
        Some(error) => String::from_utf8_lossy(error).into_owned(),
        None => INVALID_ERROR.to_string(),
    }
}

fn checked_len(len: usize) -> Result<u32> {
    if len > MAX_FRAME_LEN - MIN_BODY_LEN {
        return Err(FrameError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN - MIN_BODY_LEN,
        });
    }
    Ok(len as u32)
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Bounds-checked big-endian reader over a payload slice.
struct PayloadCursor<'a> {
    rest: &'a [u8],
}

impl<'a> PayloadCursor<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self { rest: payload }
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let (head, tail) = self.rest.split_first_chunk::<N>()?;
        self.rest = tail;
        Some(*head)
    }

    fn u8(&mut self) -> Option<u8> {
        self.array::<1>().map(|[b]| b)
    }

    fn u16(&mut self) -> Option<u16> {
        self.array().map(u16::from_be_bytes)
    }

    fn u32(&mut self) -> Option<u32> {
        self.array().map(u32::from_be_bytes)
    }

    fn i32(&mut self) -> Option<i32> {
        self.array().map(i32::from_be_bytes)
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let (head, tail) = self.rest.split_at_checked(n)?;
        self.rest = tail;
        Some(head)
    }

    fn take_up_to(&mut self, n: usize) -> &'a [u8] {
        let n = n.min(self.rest.len());
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        head
    }
}
