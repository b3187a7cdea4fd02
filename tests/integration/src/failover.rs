//! Failover: a killed primary is replaced by an elected secondary, and
//! the old primary rejoins as a secondary.

use std::time::{Duration, Instant};

use serde_json::json;

use crate::helpers::{try_status, TestCluster};

/// Polls the given ports until exactly one reports the primary role,
/// returning its port. Panics after `budget`.
async fn wait_for_new_primary(ports: &[u16], budget: Duration) -> u16 {
    let deadline = Instant::now() + budget;
    loop {
        if Instant::now() > deadline {
            panic!("no new primary elected within {budget:?}");
        }
        for &port in ports {
            if let Some(status) = try_status(port).await {
                if status["role"] == "primary"
                    && status["election_term"].as_u64().unwrap_or(0) >= 1
                {
                    return port;
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

#[tokio::test]
async fn killed_primary_is_replaced_and_rejoins_as_secondary() {
    let mut cluster = TestCluster::start();

    // write through the bootstrap primary and let replication land
    let mut c = cluster.node("node1").connect().await;
    let resp = c.set("user:1", &json!({"name": "Alice"})).await;
    assert_eq!(resp["status"], "OK");
    tokio::time::sleep(Duration::from_secs(2)).await;
    drop(c);

    // crash the primary
    cluster.node_mut("node1").kill();

    // a survivor must win an election; the timeout is 5-8s, plus slack
    // for a split-vote retry round
    let survivor_ports = [cluster.node("node2").port, cluster.node("node3").port];
    let new_primary_port = wait_for_new_primary(&survivor_ports, Duration::from_secs(25)).await;

    // the replicated write survives the failover
    let mut c = crate::helpers::TestClient::connect(new_primary_port).await;
    let resp = c.get("user:1").await;
    assert_eq!(resp["status"], "OK", "replicated key lost in failover: {resp}");
    assert_eq!(resp["value"], json!({"name": "Alice"}));

    // the new primary accepts writes
    let resp = c.set("after:failover", &json!(true)).await;
    assert_eq!(resp["status"], "OK");
    drop(c);

    // restart the old primary with its original --primary flag; the
    // running cluster's higher term must demote it
    cluster.node_mut("node1").restart(true);
    let node1_port = cluster.node("node1").port;

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(status) = try_status(node1_port).await {
            if status["role"] == "secondary" {
                assert!(status["election_term"].as_u64().unwrap() >= 1);
                break;
            }
        }
        if Instant::now() > deadline {
            panic!("restarted primary was not demoted within 10s");
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    // and the real primary is still the one elected earlier
    let status = try_status(new_primary_port).await.unwrap();
    assert_eq!(status["role"], "primary");
}
