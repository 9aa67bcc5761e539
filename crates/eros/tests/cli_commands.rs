#![cfg(all(unix, feature = "cli"))]

use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("ephemeral bind should succeed");
    listener.local_addr().expect("local addr").port()
}

fn wait_for_listener(port: u16, timeout: Duration) {
    let start = Instant::now();
    loop {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("listener on port {port} never came up");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn eros() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_eros"));
    command.arg("--log-level").arg("error");
    command
}

fn spawn_echo(port: u16) -> Child {
    let child = eros()
        .arg("echo")
        .arg("--listen")
        .arg(format!("127.0.0.1:{port}"))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("echo command should start");
    wait_for_listener(port, Duration::from_secs(3));
    child
}

fn send(port: u16, args: &[&str]) -> Output {
    eros()
        .arg("--format")
        .arg("json")
        .arg("send")
        .arg(format!("tcp:127.0.0.1:{port}"))
        .args(args)
        .output()
        .expect("send command should run")
}

fn json_line(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().next().expect("stdout should have a line");
    serde_json::from_str(line).expect("stdout should be json")
}

#[test]
fn send_wait_reports_ack_from_command_channel() {
    let port = free_port();
    let mut echo = spawn_echo(port);

    let output = send(port, &["--channel", "5", "--data", "status", "--wait"]);
    let _ = echo.kill();
    let _ = echo.wait();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let value = json_line(&output);
    assert_eq!(value["channel"], 5);
    assert_eq!(value["channel_name"], "TERMINAL");
    assert_eq!(value["resp_type"], "ACK");
    assert_eq!(value["data"], "status");
}

#[test]
fn send_wait_reports_nack_for_empty_command() {
    let port = free_port();
    let mut echo = spawn_echo(port);

    let output = send(port, &["--channel", "5", "--wait"]);
    let _ = echo.kill();
    let _ = echo.wait();

    assert!(output.status.success());
    let value = json_line(&output);
    assert_eq!(value["resp_type"], "NACK");
    assert_eq!(value["data"], "empty command");
}

#[test]
fn send_wait_on_plain_channel_gets_data_echo() {
    let port = free_port();
    let mut echo = spawn_echo(port);

    let output = send(port, &["--channel", "3", "--data", "abc", "--wait"]);
    let _ = echo.kill();
    let _ = echo.wait();

    assert!(output.status.success());
    let value = json_line(&output);
    assert_eq!(value["resp_type"], "DATA");
    assert_eq!(value["data"], "abc");
}

#[test]
fn send_to_closed_port_is_a_transport_error() {
    let port = free_port();
    let output = send(port, &["--data", "x", "--connect-timeout", "3s"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("could not connect"));
}

#[test]
fn invalid_endpoint_is_a_usage_error() {
    let output = eros()
        .arg("send")
        .arg("carrier-pigeon:home")
        .arg("--data")
        .arg("x")
        .output()
        .expect("send command should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn invalid_channel_is_rejected() {
    let port = free_port();
    let mut echo = spawn_echo(port);

    let output = send(port, &["--channel", "16", "--data", "x"]);
    let _ = echo.kill();
    let _ = echo.wait();

    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn version_prints_package_version() {
    let output = eros().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("eros {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn extended_version_lists_features() {
    let output = eros()
        .arg("version")
        .arg("--extended")
        .output()
        .expect("version should run");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: eros"));
    assert!(stdout.contains("cli=true"));
    assert!(stdout.contains("max_payload=4096"));
}
