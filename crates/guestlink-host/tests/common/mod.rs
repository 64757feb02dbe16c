#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use guestlink_frame::payload::{
    decode_exec, decode_write_file, encode_error, encode_exec_result, encode_write_file_result,
};
use guestlink_frame::{GuestCodec, Message, MessageType};
use guestlink_host::{HostConfig, VsockHost};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

pub type GuestReader = FramedRead<OwnedReadHalf, GuestCodec>;
pub type GuestWriter = FramedWrite<OwnedWriteHalf, GuestCodec>;

pub fn unique_temp_dir(tag: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time should be after epoch")
        .as_nanos();
    let dir = PathBuf::from(format!("/tmp/glh-{tag}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

pub fn test_config() -> HostConfig {
    HostConfig {
        transit_grace: Duration::from_millis(100),
        write_timeout: Duration::from_secs(5),
        reachability_timeout: Duration::from_secs(2),
        ..HostConfig::default()
    }
}

/// Connect to the host's listening socket, retrying until it exists.
pub async fn connect_guest(listen_path: &Path) -> (GuestReader, GuestWriter) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match UnixStream::connect(listen_path).await {
            Ok(stream) => {
                let (read_half, write_half) = stream.into_split();
                return (
                    FramedRead::new(read_half, GuestCodec::new()),
                    FramedWrite::new(write_half, GuestCodec::new()),
                );
            }
            Err(err) if Instant::now() >= deadline => {
                panic!("guest could not connect to {}: {err}", listen_path.display())
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
}

/// Connect and complete the guest half of the handshake.
pub async fn handshake_as_guest(listen_path: &Path) -> (GuestReader, GuestWriter) {
    let (mut reader, mut writer) = connect_guest(listen_path).await;
    writer
        .send(Message::empty(MessageType::Ready, 0))
        .await
        .unwrap();

    let ping = reader.next().await.unwrap().unwrap();
    assert!(ping.is(MessageType::Ping), "expected ping, got {ping:?}");
    assert_ne!(ping.seq, 0);

    writer
        .send(Message::empty(MessageType::Pong, ping.seq))
        .await
        .unwrap();
    (reader, writer)
}

/// In-memory stand-in for the guest agent.
#[derive(Debug, Default)]
pub struct FakeGuest {
    files: Mutex<HashMap<String, (Vec<u8>, bool)>>,
    dirs: Mutex<HashSet<String>>,
    write_requests: AtomicUsize,
}

impl FakeGuest {
    /// Stored content and sudo flag of a written file.
    pub fn file(&self, path: &str) -> Option<(Vec<u8>, bool)> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn write_requests(&self) -> usize {
        self.write_requests.load(Ordering::SeqCst)
    }

    fn handle(&self, msg: &Message) -> Option<Message> {
        match msg.kind() {
            Some(MessageType::Ping) => Some(Message::empty(MessageType::Pong, msg.seq)),
            Some(MessageType::Exec) => {
                let request = decode_exec(&msg.payload).unwrap();
                self.run(&request.command).map(|(code, stdout, stderr)| {
                    Message::new(
                        MessageType::ExecResult,
                        msg.seq,
                        encode_exec_result(code, &stdout, stderr.as_bytes()).unwrap(),
                    )
                })
            }
            Some(MessageType::WriteFile) => {
                self.write_requests.fetch_add(1, Ordering::SeqCst);
                let request = decode_write_file(&msg.payload).unwrap();
                if request.path == "/crash" {
                    return Some(Message::new(
                        MessageType::Error,
                        msg.seq,
                        encode_error("write handler crashed"),
                    ));
                }
                let payload = if request.path.starts_with("/readonly/") {
                    encode_write_file_result(false, "EROFS: read-only file system")
                } else {
                    self.files
                        .lock()
                        .unwrap()
                        .insert(request.path, (request.content.to_vec(), request.sudo));
                    encode_write_file_result(true, "")
                };
                Some(Message::new(MessageType::WriteFileResult, msg.seq, payload))
            }
            _ => Some(Message::new(
                MessageType::Error,
                msg.seq,
                encode_error(&format!("Unknown message type: {:#04x}", msg.msg_type)),
            )),
        }
    }

    fn run(&self, command: &str) -> Option<(i32, Vec<u8>, String)> {
        if command == "hang" {
            return None;
        }
        let outcome = if command == "echo ok" {
            (0, b"ok\n".to_vec(), String::new())
        } else if command == "fail" {
            (3, b"partial".to_vec(), "boom".to_string())
        } else if command == "fail-quietly" {
            (4, b"only stdout".to_vec(), String::new())
        } else if let Some(path) = command.strip_prefix("cat ") {
            let path = unquote(path);
            match self.files.lock().unwrap().get(&path) {
                Some((content, _)) => (0, content.clone(), String::new()),
                None => (1, Vec::new(), format!("cat: {path}: No such file or directory")),
            }
        } else if let Some(path) = command.strip_prefix("test -e ") {
            let path = unquote(path);
            let exists = self.files.lock().unwrap().contains_key(&path)
                || self.dirs.lock().unwrap().contains(&path);
            (if exists { 0 } else { 1 }, Vec::new(), String::new())
        } else if let Some(path) = command.strip_prefix("mkdir -p ") {
            let path = unquote(path);
            if path.starts_with("/readonly") {
                (
                    1,
                    Vec::new(),
                    format!("mkdir: cannot create directory '{path}': Read-only file system"),
                )
            } else {
                self.dirs.lock().unwrap().insert(path);
                (0, Vec::new(), String::new())
            }
        } else {
            (127, Vec::new(), format!("sh: {command}: not found"))
        };
        Some(outcome)
    }
}

fn unquote(word: &str) -> String {
    word.strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(word)
        .replace(r"'\''", "'")
}

/// Run a [`FakeGuest`] against `listen_path` until the host disconnects.
pub fn spawn_guest(listen_path: PathBuf, guest: Arc<FakeGuest>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (mut reader, mut writer) = handshake_as_guest(&listen_path).await;
        while let Some(Ok(msg)) = reader.next().await {
            if let Some(reply) = guest.handle(&msg) {
                if writer.send(reply).await.is_err() {
                    break;
                }
            }
        }
    })
}

/// Complete the handshake, then hold the connection open without ever
/// reading from it, like an agent stuck in a long command.
pub fn spawn_stalled_guest(listen_path: PathBuf) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _connection = handshake_as_guest(&listen_path).await;
        std::future::pending::<()>().await;
    })
}

/// A host connected to a fresh [`FakeGuest`].
pub async fn connected_host(tag: &str) -> (PathBuf, VsockHost, Arc<FakeGuest>) {
    let dir = unique_temp_dir(tag);
    let host = VsockHost::with_config(dir.join("vm.sock"), test_config());
    let guest = Arc::new(FakeGuest::default());
    spawn_guest(host.listen_path(), Arc::clone(&guest));

    host.wait_for_guest_connection(Duration::from_secs(5))
        .await
        .unwrap();
    assert!(host.is_connected());
    (dir, host, guest)
}
