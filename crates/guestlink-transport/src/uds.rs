use std::ffi::OsString;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Vsock port the guest agent connects to after boot.
pub const GUEST_PORT: u32 = 1000;

/// Vsock context id the guest uses to address the host.
pub const HOST_CID: u32 = 2;

/// Host-side listening path for a given base path: `{base}_{GUEST_PORT}`.
///
/// The hypervisor appends the guest's destination port to the configured
/// vsock socket path when forwarding guest-initiated connections.
pub fn listen_path(base: impl AsRef<Path>) -> PathBuf {
    let mut raw = OsString::from(base.as_ref().as_os_str());
    raw.push(format!("_{GUEST_PORT}"));
    PathBuf::from(raw)
}

/// Listening Unix domain socket that admits a single guest connection.
///
/// The listener is consumed by [`GuestListener::accept_one`], so a second
/// guest connection racing the first is refused by the kernel once the first
/// one has been accepted.
pub struct GuestListener {
    listener: UnixListener,
    socket_file: SocketFile,
}

impl GuestListener {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on `path`.
    ///
    /// A stale socket left at `path` by an earlier run is removed first. Any
    /// other kind of file at `path` is left alone and binding fails.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind and listen on `path` with an explicit permission mode.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        remove_stale_socket(&path)?;

        let listener = UnixListener::bind(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
            TransportError::Bind {
                path: path.clone(),
                source: e,
            }
        })?;
        let created = std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        info!(?path, "listening for guest connection");

        Ok(Self {
            listener,
            socket_file: SocketFile {
                path,
                created_inode: Some((created.dev(), created.ino())),
            },
        })
    }

    /// Accept the first guest connection and close the listener.
    ///
    /// The socket file is handed back as a [`SocketFile`] guard so the caller
    /// decides when it disappears. Dropping this future before a guest
    /// connects closes the listener and removes the socket file.
    pub async fn accept_one(self) -> Result<(UnixStream, SocketFile)> {
        let Self {
            listener,
            socket_file,
        } = self;

        let (stream, _addr) = listener.accept().await.map_err(TransportError::Accept)?;
        drop(listener);
        debug!(path = ?socket_file.path(), "accepted guest connection, listener closed");

        Ok((stream, socket_file))
    }

    /// The path this listener is bound to.
    pub fn path(&self) -> &Path {
        self.socket_file.path()
    }
}

impl std::fmt::Debug for GuestListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestListener")
            .field("path", &self.socket_file.path)
            .finish()
    }
}

/// Ownership of a socket file created by [`GuestListener::bind`].
///
/// The file is removed by [`SocketFile::remove`] or on drop, whichever comes
/// first. Removal only happens if the path still refers to the socket this
/// process created.
#[derive(Debug)]
pub struct SocketFile {
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

impl SocketFile {
    /// Path of the socket file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the socket file. Safe to call more than once.
    pub fn remove(&mut self) {
        let Some((expected_dev, expected_ino)) = self.created_inode.take() else {
            return;
        };

        match std::fs::symlink_metadata(&self.path) {
            Ok(metadata)
                if metadata.file_type().is_socket()
                    && metadata.dev() == expected_dev
                    && metadata.ino() == expected_ino =>
            {
                debug!(path = ?self.path, "removing socket file");
                let _ = std::fs::remove_file(&self.path);
            }
            Ok(_) => {
                debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
            }
            Err(_) => {}
        }
    }
}

impl Drop for SocketFile {
    fn drop(&mut self) {
        self.remove();
    }
}

fn remove_stale_socket(path: &Path) -> Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(TransportError::Bind {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    if !metadata.file_type().is_socket() {
        return Err(TransportError::Bind {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "existing path is not a unix socket",
            ),
        });
    }

    debug!(?path, "removing stale socket");
    std::fs::remove_file(path).map_err(|e| TransportError::Bind {
        path: path.to_path_buf(),
        source: e,
    })
}
