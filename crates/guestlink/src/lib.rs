//! Host-side control channel for guest VMs over a forwarded vsock.
//!
//! A guest agent connects out to the host after boot, announces itself with
//! `ready` and answers a `ping`. The host can then run shell commands in the
//! guest and push files into it over the same connection.
//!
//! # Crate Structure
//!
//! - [`transport`] - Listening socket for the guest's connection
//! - [`frame`] - Wire format, streaming decoder and payload codecs
//! - [`host`] - Handshake, request correlation and guest operations (behind `host` feature)

/// Re-export transport types.
pub mod transport {
    pub use guestlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use guestlink_frame::*;
}

/// Re-export host types (requires `host` feature).
#[cfg(feature = "host")]
pub mod host {
    pub use guestlink_host::*;
}

#[cfg(feature = "host")]
pub use guestlink_host::{ExecResult, GuestTransport, HostConfig, HostError, VsockHost};
