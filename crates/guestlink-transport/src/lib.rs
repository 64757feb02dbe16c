//! Host-side transport for guest-initiated vsock connections.
//!
//! The hypervisor forwards a guest's `connect(HOST_CID, GUEST_PORT)` to a
//! Unix domain socket on the host at `{base}_{GUEST_PORT}`. This crate owns
//! that listening socket: binding it, admitting exactly one guest, and
//! removing the socket file on every exit path.
//!
//! This is the lowest layer of guestlink. The frame and host crates build on
//! the [`GuestListener`] and [`SocketFile`] types provided here.

pub mod error;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};

#[cfg(unix)]
pub use uds::{listen_path, GuestListener, SocketFile, GUEST_PORT, HOST_CID};
