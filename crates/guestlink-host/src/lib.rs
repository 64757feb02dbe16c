//! Host side of the guest control channel.
//!
//! [`VsockHost`] listens on the hypervisor's vsock forwarding socket, runs
//! the guest-initiated ready/ping/pong handshake and then multiplexes
//! concurrent requests over the single connection, matching responses by
//! sequence number.
//!
//! ```no_run
//! # async fn demo() -> guestlink_host::Result<()> {
//! use std::time::Duration;
//! use guestlink_host::VsockHost;
//!
//! let host = VsockHost::new("/run/vm/vsock.sock");
//! host.wait_for_guest_connection(Duration::from_secs(30)).await?;
//!
//! let result = host.exec("uname -a").await;
//! println!("{}", result.stdout);
//!
//! host.write_file("/etc/motd", b"hello\n").await?;
//! host.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod correlator;
pub mod error;
pub mod guest;
pub mod handshake;
pub mod host;
pub mod ops;

pub use config::HostConfig;
pub use correlator::{Correlator, PendingRequest};
pub use error::{HostError, Result};
pub use guest::GuestTransport;
pub use handshake::{ConnectionState, Handshake, HandshakeStep};
pub use host::VsockHost;
pub use ops::shell_quote;

pub use guestlink_frame::{ExecResult, MAX_PATH_LEN, MAX_WRITE_CONTENT};
