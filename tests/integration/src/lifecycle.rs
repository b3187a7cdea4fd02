//! Process lifecycle: clean shutdown and fatal startup errors.

use std::process::{Command, Stdio};
use std::time::Duration;

use crate::helpers::{server_binary, start_single_primary};

#[tokio::test]
async fn shutdown_acknowledges_then_exits_zero() {
    let mut node = start_single_primary();
    let mut c = node.connect().await;

    let resp = c.send("SHUTDOWN").await;
    assert_eq!(resp["status"], "OK");
    assert_eq!(resp["message"], "Server shutting down");
    drop(c);

    let status = node.wait_exit();
    assert!(status.success(), "expected exit code 0, got {status:?}");
}

#[tokio::test]
async fn binding_a_busy_port_exits_nonzero() {
    let node = start_single_primary();

    // second process contending for the same port must die quickly
    let mut child = Command::new(server_binary())
        .args([
            "--node-id",
            "node1",
            "--port",
            &node.port.to_string(),
            "--peers",
            &format!("node1@127.0.0.1:{}", node.port),
        ])
        .env("RUST_LOG", "error")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if std::time::Instant::now() > deadline {
            let _ = child.kill();
            panic!("process kept running despite the busy port");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    assert!(!status.success(), "expected a nonzero exit, got {status:?}");
}

#[tokio::test]
async fn unknown_node_id_exits_nonzero() {
    let output = Command::new(server_binary())
        .args([
            "--node-id",
            "nodeX",
            "--port",
            "1",
            "--peers",
            "node1@127.0.0.1:1",
        ])
        .env("RUST_LOG", "error")
        .output()
        .unwrap();
    assert!(!output.status.success());
}
