#![cfg(all(unix, feature = "cli"))]

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use ipcpkt::packet::{Packet, PacketType, HEADER_SIZE};
use ipcpkt::transport::{NamedPipe, PacketTransport, TransportConfig};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "ipcpkt-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_open(name: &str, config: &TransportConfig, timeout: Duration) -> io::Result<NamedPipe> {
    let start = Instant::now();
    loop {
        match NamedPipe::open_with_config(name, config.clone()) {
            Ok(pipe) => return Ok(pipe),
            Err(err) => {
                if start.elapsed() >= timeout {
                    return Err(io::Error::other(format!("open timeout: {err}")));
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

fn ipcpkt() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ipcpkt"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn stdio_send_output_feeds_stdio_listen() {
    let sent = ipcpkt()
        .args(["send", "-t", "stdio", "--type", "command", "--seq", "5", "--data", "hi"])
        .stdin(Stdio::null())
        .output()
        .expect("send should run");
    assert!(sent.status.success(), "send failed: {sent:?}");
    assert_eq!(sent.stdout.len(), HEADER_SIZE + 2);
    assert_eq!(&sent.stdout[..4], &3u32.to_le_bytes());
    assert_eq!(&sent.stdout[4..8], &2u32.to_le_bytes());
    assert_eq!(&sent.stdout[8..12], &5u32.to_le_bytes());
    assert_eq!(&sent.stdout[12..], b"hi");

    let mut listen = ipcpkt()
        .args(["listen", "-t", "stdio", "--format", "json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("listen should start");
    {
        let mut stdin = listen.stdin.take().expect("listen stdin");
        stdin.write_all(&sent.stdout).expect("packet bytes should write");
    }
    let out = listen.wait_with_output().expect("listen should exit");
    assert!(out.status.success(), "listen failed: {out:?}");

    let line = String::from_utf8(out.stdout).expect("utf8 output");
    let value: serde_json::Value =
        serde_json::from_str(line.trim()).expect("listen should print one JSON object");
    assert_eq!(value["packet_type"], "COMMAND");
    assert_eq!(value["type_tag"], 3);
    assert_eq!(value["length"], 2);
    assert_eq!(value["sequence_num"], 5);
    assert_eq!(value["payload"], "hi");
    assert_eq!(value["transport"], "anonymous-pipe");
}

#[test]
fn stdio_listen_filters_by_type() {
    let mut bytes = Vec::new();
    for (packet_type, seq) in [
        (PacketType::Message, 1),
        (PacketType::Data, 2),
        (PacketType::Message, 3),
    ] {
        let packet = Packet::new(packet_type, seq, &b"x"[..]).expect("packet");
        bytes.extend_from_slice(&packet.header.to_bytes());
        bytes.extend_from_slice(&packet.payload);
    }

    let mut listen = ipcpkt()
        .args(["listen", "-t", "stdio", "--format", "json", "--types", "data"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("listen should start");
    listen
        .stdin
        .take()
        .expect("listen stdin")
        .write_all(&bytes)
        .expect("packet bytes should write");
    let out = listen.wait_with_output().expect("listen should exit");
    assert!(out.status.success());

    let text = String::from_utf8(out.stdout).expect("utf8 output");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    let value: serde_json::Value = serde_json::from_str(lines[0]).expect("json line");
    assert_eq!(value["sequence_num"], 2);
}

#[test]
fn named_pipe_listen_echoes_and_exits_after_count() {
    let dir = unique_temp_dir("echo");
    let mut listen = ipcpkt()
        .arg("listen")
        .arg("cli-echo")
        .arg("--runtime-dir")
        .arg(&dir)
        .args(["--echo", "--count", "1", "--format", "pretty"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen should start");

    let config = TransportConfig {
        runtime_dir: Some(dir.clone()),
        read_timeout: Some(Duration::from_secs(5)),
        ..TransportConfig::default()
    };
    let mut client =
        wait_for_open("cli-echo", &config, Duration::from_secs(3)).expect("client should attach");

    let packet = Packet::new(PacketType::Message, 11, &b"ping"[..]).expect("packet");
    client.write_packet(&packet).expect("send should succeed");
    let echoed = client.read_packet().expect("echo should arrive");
    assert_eq!(echoed, packet);
    client.close();

    let out = listen.wait_with_output().expect("listen should exit");
    assert!(out.status.success(), "listen failed: {out:?}");
    let text = String::from_utf8(out.stdout).expect("utf8 output");
    assert!(text.contains("type=MESSAGE seq=11 length=4"), "{text}");
    assert!(!dir.join("cli-echo.pipe").exists());

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn send_to_missing_pipe_fails() {
    let dir = unique_temp_dir("missing");
    let out = ipcpkt()
        .arg("send")
        .arg("nobody-home")
        .arg("--runtime-dir")
        .arg(&dir)
        .args(["--data", "hello"])
        .output()
        .expect("send should run");

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("connect failed"), "{stderr}");

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn send_without_target_is_usage_error() {
    let out = ipcpkt()
        .args(["send", "-t", "socket", "--data", "x"])
        .output()
        .expect("send should run");
    assert_eq!(out.status.code(), Some(64));
}

#[test]
fn stdio_send_refuses_to_wait_for_reply() {
    let out = ipcpkt()
        .args(["send", "-t", "stdio", "--wait", "--data", "x"])
        .stdin(Stdio::null())
        .output()
        .expect("send should run");
    assert_eq!(out.status.code(), Some(64));
    assert!(out.stdout.is_empty());
}

#[test]
fn version_reports_package_version() {
    let out = ipcpkt().arg("version").output().expect("version should run");
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).expect("utf8 output");
    assert_eq!(text.trim(), format!("ipcpkt {}", env!("CARGO_PKG_VERSION")));

    let out = ipcpkt()
        .args(["version", "--extended"])
        .output()
        .expect("version should run");
    let text = String::from_utf8(out.stdout).expect("utf8 output");
    assert!(text.contains("header_size: 12"));
}
