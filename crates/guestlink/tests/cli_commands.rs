#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use guestlink::frame::payload::{decode_exec, decode_write_file, encode_exec_result, encode_write_file_result};
use guestlink::frame::{GuestCodec, Message, MessageType};
use guestlink::transport::listen_path;
use tokio::net::UnixStream;
use tokio_util::codec::{FramedRead, FramedWrite};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/glcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn guestlink(args: Vec<String>) -> tokio::task::JoinHandle<Output> {
    tokio::task::spawn_blocking(move || {
        Command::new(env!("CARGO_BIN_EXE_guestlink"))
            .arg("--log-level")
            .arg("error")
            .args(args)
            .output()
            .expect("guestlink should run")
    })
}

fn args(parts: &[&str], base: &Path) -> Vec<String> {
    let mut out = Vec::new();
    for part in parts {
        if *part == "{base}" {
            out.push(base.display().to_string());
        } else {
            out.push(part.to_string());
        }
    }
    out
}

/// Connect as the guest, complete the handshake and answer every request
/// with `respond` until the host hangs up.
async fn run_guest<F>(base: &Path, respond: F)
where
    F: Fn(&Message) -> Message,
{
    let path = listen_path(base);
    let deadline = Instant::now() + Duration::from_secs(10);
    let stream = loop {
        match UnixStream::connect(&path).await {
            Ok(stream) => break stream,
            Err(err) if Instant::now() >= deadline => panic!("guest could not connect: {err}"),
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    };
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, GuestCodec::new());
    let mut writer = FramedWrite::new(write_half, GuestCodec::new());

    writer
        .send(Message::empty(MessageType::Ready, 0))
        .await
        .unwrap();
    let ping = reader.next().await.unwrap().unwrap();
    writer
        .send(Message::empty(MessageType::Pong, ping.seq))
        .await
        .unwrap();

    while let Some(Ok(request)) = reader.next().await {
        if writer.send(respond(&request)).await.is_err() {
            break;
        }
    }
}

fn exec_reply(request: &Message, exit_code: i32, stdout: &str, stderr: &str) -> Message {
    let payload = encode_exec_result(exit_code, stdout.as_bytes(), stderr.as_bytes()).unwrap();
    Message::new(MessageType::ExecResult, request.seq, payload)
}

#[tokio::test(flavor = "multi_thread")]
async fn exec_prints_result_as_json() {
    let dir = unique_temp_dir("exec");
    let base = dir.join("vm.sock");

    let cli = guestlink(args(
        &["--format", "json", "exec", "{base}", "--timeout", "10s", "--", "echo", "ok"],
        &base,
    ));
    run_guest(&base, |request| {
        let exec = decode_exec(&request.payload).unwrap();
        assert_eq!(exec.command, "echo ok");
        assert_eq!(exec.timeout_ms, 300_000);
        exec_reply(request, 0, "ok\n", "")
    })
    .await;

    let output = cli.await.unwrap();
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"exit_code\":0"), "{stdout}");
    assert!(stdout.contains("\"stdout\":\"ok\\n\""), "{stdout}");
    assert!(!listen_path(&base).exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test(flavor = "multi_thread")]
async fn exec_exits_with_guest_exit_code() {
    let dir = unique_temp_dir("exitcode");
    let base = dir.join("vm.sock");

    let cli = guestlink(args(
        &["--format", "raw", "exec", "{base}", "--exec-timeout", "5s", "--", "false"],
        &base,
    ));
    run_guest(&base, |request| {
        assert_eq!(decode_exec(&request.payload).unwrap().timeout_ms, 5_000);
        exec_reply(request, 3, "", "nope\n")
    })
    .await;

    let output = cli.await.unwrap();
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nope"), "{stderr}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test(flavor = "multi_thread")]
async fn wait_without_guest_times_out_with_124() {
    let dir = unique_temp_dir("wait");
    let base = dir.join("vm.sock");

    let output = guestlink(args(&["wait", "{base}", "--timeout", "200ms"], &base))
        .await
        .unwrap();
    assert_eq!(output.status.code(), Some(124));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("timed out waiting for guest"), "{stderr}");
    assert!(!listen_path(&base).exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test(flavor = "multi_thread")]
async fn push_with_sudo_delivers_file() {
    let dir = unique_temp_dir("push");
    let base = dir.join("vm.sock");
    let local = dir.join("motd");
    std::fs::write(&local, b"welcome\n").unwrap();

    let cli = guestlink(vec![
        "--format".into(),
        "json".into(),
        "push".into(),
        base.display().to_string(),
        local.display().to_string(),
        "/etc/motd".into(),
        "--sudo".into(),
    ]);
    run_guest(&base, |request| {
        assert!(request.is(MessageType::WriteFile));
        let write = decode_write_file(&request.payload).unwrap();
        assert_eq!(write.path, "/etc/motd");
        assert_eq!(write.content.as_ref(), b"welcome\n");
        assert!(write.sudo);
        Message::new(
            MessageType::WriteFileResult,
            request.seq,
            encode_write_file_result(true, ""),
        )
    })
    .await;

    let output = cli.await.unwrap();
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"bytes\":8"), "{stdout}");
    assert!(stdout.contains("\"sudo\":true"), "{stdout}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test(flavor = "multi_thread")]
async fn cat_missing_file_fails() {
    let dir = unique_temp_dir("cat");
    let base = dir.join("vm.sock");

    let cli = guestlink(args(&["cat", "{base}", "/etc/missing"], &base));
    run_guest(&base, |request| {
        assert_eq!(
            decode_exec(&request.payload).unwrap().command,
            "cat '/etc/missing'"
        );
        exec_reply(
            request,
            1,
            "",
            "cat: /etc/missing: No such file or directory",
        )
    })
    .await;

    let output = cli.await.unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("read failed"), "{stderr}");
    assert!(stderr.contains("No such file"), "{stderr}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_name() {
    let output = Command::new(env!("CARGO_BIN_EXE_guestlink"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("guestlink "), "{stdout}");
}
