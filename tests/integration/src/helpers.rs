//! Test helpers for spawning cinder-server processes and speaking the
//! line protocol.

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use bytes::BytesMut;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A cinder-server subprocess managed by the test harness.
pub struct TestNode {
    child: Option<Child>,
    pub id: String,
    pub port: u16,
    peers: String,
}

impl TestNode {
    /// Spawns a node and blocks until it accepts connections (up to
    /// 5 seconds).
    pub fn start(id: &str, port: u16, peers: &str, primary: bool) -> Self {
        let mut cmd = Command::new(server_binary());
        cmd.arg("--node-id").arg(id);
        cmd.arg("--port").arg(port.to_string());
        cmd.arg("--peers").arg(peers);
        if primary {
            cmd.arg("--primary");
        }
        // suppress tracing output in tests
        cmd.env("RUST_LOG", "error");

        let child = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap_or_else(|e| panic!("failed to spawn cinder-server: {e}"));

        let node = Self {
            child: Some(child),
            id: id.to_string(),
            port,
            peers: peers.to_string(),
        };
        node.wait_until_ready();
        node
    }

    fn wait_until_ready(&self) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            if std::time::Instant::now() > deadline {
                panic!(
                    "cinder-server {} failed to start on port {} within 5 seconds",
                    self.id, self.port
                );
            }
            if std::net::TcpStream::connect(("127.0.0.1", self.port)).is_ok() {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    /// Connects a fresh client to this node.
    pub async fn connect(&self) -> TestClient {
        TestClient::connect(self.port).await
    }

    /// Kills the process immediately, simulating a crash.
    pub fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// Restarts the node with the same identity and the given bootstrap
    /// role.
    pub fn restart(&mut self, primary: bool) {
        self.kill();
        *self = Self::start(&self.id.clone(), self.port, &self.peers.clone(), primary);
    }

    /// Waits for the process to exit on its own and returns its status.
    pub fn wait_exit(&mut self) -> std::process::ExitStatus {
        self.child
            .take()
            .expect("process already reaped")
            .wait()
            .expect("failed to wait for cinder-server")
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.kill();
    }
}

/// A three-node cluster on free ports: node1 boots primary, node2 and
/// node3 boot secondary.
pub struct TestCluster {
    pub nodes: Vec<TestNode>,
}

impl TestCluster {
    pub fn start() -> Self {
        let ports = [find_free_port(), find_free_port(), find_free_port()];
        let peers = format!(
            "node1@127.0.0.1:{},node2@127.0.0.1:{},node3@127.0.0.1:{}",
            ports[0], ports[1], ports[2]
        );
        let nodes = vec![
            TestNode::start("node1", ports[0], &peers, true),
            TestNode::start("node2", ports[1], &peers, false),
            TestNode::start("node3", ports[2], &peers, false),
        ];
        Self { nodes }
    }

    pub fn node(&self, id: &str) -> &TestNode {
        self.nodes.iter().find(|n| n.id == id).unwrap()
    }

    pub fn node_mut(&mut self, id: &str) -> &mut TestNode {
        self.nodes.iter_mut().find(|n| n.id == id).unwrap()
    }
}

/// Starts a lone node that is the entire cluster — handy for client
/// protocol tests that don't need replication.
pub fn start_single_primary() -> TestNode {
    let port = find_free_port();
    let peers = format!("node1@127.0.0.1:{port}");
    TestNode::start("node1", port, &peers, true)
}

/// A minimal line-protocol client.
pub struct TestClient {
    stream: TcpStream,
    buf: BytesMut,
}

impl TestClient {
    pub async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port))
            .await
            .unwrap_or_else(|e| panic!("failed to connect to 127.0.0.1:{port}: {e}"));
        Self {
            stream,
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Sends one raw line and returns the decoded JSON response.
    pub async fn send(&mut self, line: &str) -> Value {
        self.stream
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
        self.read_response().await
    }

    /// Reads the next newline-terminated JSON response.
    pub async fn read_response(&mut self) -> Value {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let raw = self.buf.split_to(pos + 1);
                return serde_json::from_slice(&raw[..raw.len() - 1])
                    .unwrap_or_else(|e| panic!("undecodable response: {e}"));
            }
            let n = self.stream.read_buf(&mut self.buf).await.unwrap();
            if n == 0 {
                panic!("server closed connection while waiting for a response");
            }
        }
    }

    /// Writes raw bytes without waiting for a response (for pipelining
    /// tests).
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    pub async fn set(&mut self, key: &str, value: &Value) -> Value {
        self.send(&format!("SET {key} {value}")).await
    }

    pub async fn get(&mut self, key: &str) -> Value {
        self.send(&format!("GET {key}")).await
    }

    pub async fn delete(&mut self, key: &str) -> Value {
        self.send(&format!("DELETE {key}")).await
    }

    pub async fn status(&mut self) -> Value {
        self.send("STATUS").await
    }
}

/// STATUS against a node that may be down; `None` when unreachable.
pub async fn try_status(port: u16) -> Option<Value> {
    let connect = tokio::time::timeout(
        Duration::from_millis(500),
        TcpStream::connect(("127.0.0.1", port)),
    );
    let stream = connect.await.ok()?.ok()?;
    let mut client = TestClient {
        stream,
        buf: BytesMut::with_capacity(1024),
    };
    tokio::time::timeout(Duration::from_secs(1), client.status())
        .await
        .ok()
}

/// Finds a free TCP port by binding to port 0.
pub fn find_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Locates the cinder-server binary in the cargo target directory.
pub fn server_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    // test binary lives in target/debug/deps/ — go up to target/debug/
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("cinder-server");
    if !path.exists() {
        panic!(
            "cinder-server binary not found. run `cargo build` first.\nlooked at: {}",
            path.display()
        );
    }
    path
}
