use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use guestlink_frame::{type_name, FrameError, GuestCodec, Message, MessageType};
use guestlink_transport::{listen_path, GuestListener};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn};

use crate::config::HostConfig;
use crate::correlator::Correlator;
use crate::error::{HostError, Result};
use crate::handshake::{ConnectionState, Handshake, HandshakeStep};

type GuestReader = FramedRead<OwnedReadHalf, GuestCodec>;
type GuestWriter = FramedWrite<OwnedWriteHalf, GuestCodec>;

/// Host end of the control channel to one guest VM.
///
/// The guest connects to `{base}_1000` once it has booted. Call
/// [`wait_for_guest_connection`](Self::wait_for_guest_connection) to listen
/// for it and run the handshake. After that, requests can be issued
/// concurrently from any number of tasks.
///
/// Must be used from within a Tokio runtime.
pub struct VsockHost {
    vsock_path: PathBuf,
    config: HostConfig,
    shared: Arc<Shared>,
    handshake_lock: tokio::sync::Mutex<()>,
}

struct Shared {
    state: Mutex<ConnectionState>,
    correlator: Correlator,
    link: Mutex<Option<Link>>,
    next_link_id: AtomicU64,
}

/// One established guest connection.
///
/// Frames are queued on `outbound` and written by `writer`, so a guest that
/// stops reading never blocks a caller or the teardown path.
struct Link {
    id: u64,
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Link {
    fn shutdown(self) {
        drop(self.outbound);
        self.reader.abort();
        self.writer.abort();
    }
}

impl VsockHost {
    /// Host for the VM whose vsock socket is configured at `base`.
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self::with_config(base, HostConfig::default())
    }

    pub fn with_config(base: impl AsRef<Path>, config: HostConfig) -> Self {
        Self {
            vsock_path: base.as_ref().to_path_buf(),
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(ConnectionState::Disconnected),
                correlator: Correlator::new(),
                link: Mutex::new(None),
                next_link_id: AtomicU64::new(1),
            }),
            handshake_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The configured base path (not the `_1000` listening path).
    pub fn vsock_path(&self) -> &Path {
        &self.vsock_path
    }

    /// The path the host listens on while waiting for the guest.
    pub fn listen_path(&self) -> PathBuf {
        listen_path(&self.vsock_path)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Listen for the guest and complete the ready/ping/pong handshake.
    ///
    /// Only the first guest connection is accepted. The listening socket file
    /// is removed once the guest is connected, and also when the handshake
    /// fails or times out. A handshake that completes after `timeout` fired
    /// is discarded.
    pub async fn wait_for_guest_connection(&self, timeout: Duration) -> Result<()> {
        if self.is_connected() {
            return Err(HostError::AlreadyConnected);
        }
        let _guard = self.handshake_lock.try_lock().map_err(|_| {
            HostError::HandshakeFailed("another handshake is already in progress".to_string())
        })?;

        let path = self.listen_path();
        let listener = GuestListener::bind(&path)?;
        info!(?path, timeout_ms = timeout.as_millis() as u64, "waiting for guest connection");

        let started = Instant::now();
        match tokio::time::timeout(timeout, self.handshake(listener)).await {
            Ok(Ok((reader, writer))) => {
                self.install(reader, writer);
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "guest connected"
                );
                Ok(())
            }
            Ok(Err(err)) => {
                self.shared.set_state(ConnectionState::Disconnected);
                warn!(error = %err, "guest handshake failed");
                Err(err)
            }
            Err(_) => {
                self.shared.set_state(ConnectionState::Disconnected);
                warn!(timeout_ms = timeout.as_millis() as u64, "guest handshake timed out");
                Err(HostError::HandshakeTimeout(timeout))
            }
        }
    }

    /// [`wait_for_guest_connection`](Self::wait_for_guest_connection) with the
    /// configured handshake timeout.
    pub async fn wait_for_guest(&self) -> Result<()> {
        self.wait_for_guest_connection(self.config.handshake_timeout)
            .await
    }

    async fn handshake(&self, listener: GuestListener) -> Result<(GuestReader, GuestWriter)> {
        let mut handshake = Handshake::new();
        handshake.listen()?;
        self.shared.set_state(handshake.state());

        let (stream, mut socket_file) = listener.accept_one().await?;
        let (read_half, write_half) = stream.into_split();
        let codec = GuestCodec::with_max_frame_len(self.config.max_frame_len);
        let mut reader = FramedRead::new(read_half, codec.clone());
        let mut writer = FramedWrite::new(write_half, codec);

        loop {
            let msg = match reader.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(FrameError::Io(err))) => {
                    return Err(HostError::HandshakeFailed(format!(
                        "guest connection error: {err}"
                    )))
                }
                Some(Err(err)) => return Err(err.into()),
                None => {
                    return Err(HostError::HandshakeFailed(format!(
                        "guest closed the connection in state {}",
                        handshake.state()
                    )))
                }
            };

            match handshake.on_message(&msg, || self.shared.correlator.next_seq())? {
                HandshakeStep::Pending => {}
                HandshakeStep::Send(reply) => writer.send(reply).await?,
                HandshakeStep::Complete => {
                    socket_file.remove();
                    return Ok((reader, writer));
                }
            }
            self.shared.set_state(handshake.state());
        }
    }

    fn install(&self, reader: GuestReader, writer: GuestWriter) {
        let id = self.shared.next_link_id.fetch_add(1, Ordering::Relaxed);
        let (outbound, queue) = mpsc::unbounded_channel();

        let mut link = self.shared.link();
        if let Some(previous) = link.take() {
            previous.shutdown();
        }
        *link = Some(Link {
            id,
            outbound,
            reader: tokio::spawn(read_loop(Arc::clone(&self.shared), id, reader)),
            writer: tokio::spawn(write_loop(Arc::clone(&self.shared), id, writer, queue)),
        });
        self.shared.set_state(ConnectionState::Connected);
    }

    /// Send one request and wait up to `timeout` for the response with the
    /// same sequence number.
    ///
    /// The frame is queued for the connection's writer task and the timer
    /// starts at once, so `timeout` also bounds a write the guest is not
    /// draining.
    pub async fn request(
        &self,
        kind: MessageType,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Message> {
        if !self.is_connected() {
            return Err(HostError::NotConnected);
        }

        let seq = self.shared.correlator.next_seq();
        let pending = self.shared.correlator.register(seq);
        self.shared.enqueue(Message::new(kind, seq, payload))?;
        trace!(seq, msg_type = kind.name(), "request queued");

        pending.wait(timeout).await
    }

    /// Tear down the connection.
    ///
    /// Outstanding requests fail with [`HostError::ConnectionClosed`]. Calling
    /// this on a host that is not connected is a no-op.
    pub async fn close(&self) {
        if self.shared.teardown(None) {
            info!("guest connection closed by host");
        }
    }
}

impl Drop for VsockHost {
    fn drop(&mut self) {
        if let Some(link) = self.shared.link().take() {
            link.shutdown();
        }
    }
}

impl std::fmt::Debug for VsockHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VsockHost")
            .field("vsock_path", &self.vsock_path)
            .field("state", &self.state())
            .finish()
    }
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn link(&self) -> MutexGuard<'_, Option<Link>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, msg: Message) -> Result<()> {
        let link = self.link();
        let link = link.as_ref().ok_or(HostError::ConnectionClosed)?;
        link.outbound
            .send(msg)
            .map_err(|_| HostError::ConnectionClosed)
    }

    fn dispatch(&self, msg: Message) {
        let seq = msg.seq;
        let msg_type = msg.msg_type;
        if self.correlator.complete(msg) {
            trace!(seq, msg_type = type_name(msg_type), "response delivered");
        } else {
            debug!(
                seq,
                msg_type = type_name(msg_type),
                "discarding message with no pending request"
            );
        }
    }

    /// Drop the current link, or only link `id` when given.
    ///
    /// Never waits on the socket. Returns `true` if a link was torn down.
    fn teardown(&self, id: Option<u64>) -> bool {
        let link = {
            let mut slot = self.link();
            match slot.as_ref() {
                Some(current) if id.map_or(true, |id| id == current.id) => slot.take(),
                _ => None,
            }
        };
        let Some(link) = link else {
            return false;
        };

        self.set_state(ConnectionState::Disconnected);
        let rejected = self.correlator.fail_all(|| HostError::ConnectionClosed);
        if rejected > 0 {
            warn!(rejected, "rejected pending requests on disconnect");
        }
        link.shutdown();
        true
    }
}

async fn write_loop(
    shared: Arc<Shared>,
    id: u64,
    mut writer: GuestWriter,
    mut queue: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = queue.recv().await {
        let seq = msg.seq;
        if let Err(err) = writer.send(msg).await {
            error!(seq, error = %err, "write to guest connection failed, disconnecting");
            shared.teardown(Some(id));
            return;
        }
    }
    if let Err(err) = writer.close().await {
        debug!(error = %err, "error shutting down guest connection");
    }
}

async fn read_loop(shared: Arc<Shared>, id: u64, mut reader: GuestReader) {
    loop {
        match reader.next().await {
            Some(Ok(msg)) => shared.dispatch(msg),
            Some(Err(err)) => {
                error!(error = %err, "protocol error on guest connection, disconnecting");
                break;
            }
            None => {
                warn!("guest closed the connection");
                break;
            }
        }
    }
    shared.teardown(Some(id));
}
