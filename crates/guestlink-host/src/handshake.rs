//! Guest-initiated connection handshake.
//!
//! ```text
//! Disconnected --listen--> WaitingForReady --ready/ping--> WaitingForPong --pong--> Connected
//! ```
//!
//! The guest opens the connection and sends `ready`. The host answers with a
//! `ping` carrying a fresh sequence number, and the handshake completes when
//! the guest echoes that sequence number back in a `pong`. Anything else that
//! arrives during the handshake is logged and ignored.

use guestlink_frame::{Message, MessageType};
use tracing::{debug, warn};

use crate::error::{HostError, Result};

/// Connection lifecycle as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No listener and no guest connection.
    Disconnected,
    /// Listening, or connected and waiting for the guest's `ready`.
    WaitingForReady,
    /// `ping` sent, waiting for the matching `pong`.
    WaitingForPong,
    /// Handshake complete; requests may be sent.
    Connected,
}

impl ConnectionState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::WaitingForReady => "waiting_for_ready",
            Self::WaitingForPong => "waiting_for_pong",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What the driver of a [`Handshake`] has to do next.
#[derive(Debug, PartialEq, Eq)]
pub enum HandshakeStep {
    /// Keep reading.
    Pending,
    /// Send this message to the guest, then keep reading.
    Send(Message),
    /// The guest is connected.
    Complete,
}

/// Handshake state machine, independent of any I/O.
#[derive(Debug)]
pub struct Handshake {
    state: ConnectionState,
    ping_seq: u32,
}

impl Handshake {
    /// A handshake in `Disconnected`.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            ping_seq: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The host is now listening for the guest.
    pub fn listen(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Disconnected => {
                self.state = ConnectionState::WaitingForReady;
                Ok(())
            }
            ConnectionState::Connected => Err(HostError::AlreadyConnected),
            state => Err(HostError::HandshakeFailed(format!(
                "handshake already in progress ({state})"
            ))),
        }
    }

    /// Advance the machine with one inbound message.
    ///
    /// `next_seq` is called once, when the `ping` is built.
    pub fn on_message(
        &mut self,
        msg: &Message,
        next_seq: impl FnOnce() -> u32,
    ) -> Result<HandshakeStep> {
        match (self.state, msg.kind()) {
            (ConnectionState::WaitingForReady, Some(MessageType::Ready)) => {
                self.ping_seq = next_seq();
                self.state = ConnectionState::WaitingForPong;
                debug!(seq = self.ping_seq, "guest ready, sending ping");
                Ok(HandshakeStep::Send(Message::empty(
                    MessageType::Ping,
                    self.ping_seq,
                )))
            }
            (ConnectionState::WaitingForPong, Some(MessageType::Pong))
                if msg.seq == self.ping_seq =>
            {
                self.state = ConnectionState::Connected;
                Ok(HandshakeStep::Complete)
            }
            (ConnectionState::WaitingForPong, Some(MessageType::Pong)) => {
                warn!(
                    expected = self.ping_seq,
                    got = msg.seq,
                    "ignoring pong with unexpected sequence number"
                );
                Ok(HandshakeStep::Pending)
            }
            (ConnectionState::Disconnected | ConnectionState::Connected, _) => {
                Err(HostError::HandshakeFailed(format!(
                    "no handshake in progress ({})",
                    self.state
                )))
            }
            (state, _) => {
                debug!(
                    %state,
                    msg_type = guestlink_frame::type_name(msg.msg_type),
                    seq = msg.seq,
                    "ignoring message during handshake"
                );
                Ok(HandshakeStep::Pending)
            }
        }
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}
