use std::time::Duration;

use guestlink_frame::MAX_FRAME_LEN;

/// Timeouts and limits for a [`VsockHost`](crate::VsockHost).
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Default bound for `wait_for_guest_connection` callers that have no
    /// better value.
    pub handshake_timeout: Duration,
    /// Default command timeout for `exec`.
    pub exec_timeout: Duration,
    /// Extra time the host waits for an `exec_result` beyond the command's own
    /// timeout.
    pub transit_grace: Duration,
    /// Timeout of the `echo ok` probe behind `is_reachable`.
    pub reachability_timeout: Duration,
    /// Timeout for `write_file` round trips.
    pub write_timeout: Duration,
    /// Largest inbound frame body accepted from the guest.
    pub max_frame_len: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
            exec_timeout: Duration::from_secs(300),
            transit_grace: Duration::from_secs(5),
            reachability_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(30),
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}
