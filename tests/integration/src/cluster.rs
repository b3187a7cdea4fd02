//! Role admission, peer-message grammar, and replication behavior in a
//! live three-node cluster.

use serde_json::json;

use crate::helpers::TestCluster;

#[tokio::test]
async fn bootstrap_roles_are_reported() {
    let cluster = TestCluster::start();

    let mut c = cluster.node("node1").connect().await;
    let status = c.status().await;
    assert_eq!(status["role"], "primary");
    assert_eq!(status["node_id"], "node1");

    for id in ["node2", "node3"] {
        let mut c = cluster.node(id).connect().await;
        let status = c.status().await;
        assert_eq!(status["role"], "secondary", "{id} should boot secondary");
    }
}

#[tokio::test]
async fn writes_and_reads_rejected_on_secondaries() {
    let cluster = TestCluster::start();
    let mut c = cluster.node("node2").connect().await;

    let resp = c.set("k", &json!("v")).await;
    assert_eq!(resp["status"], "ERROR");
    assert!(
        resp["message"].as_str().unwrap().contains("not primary"),
        "unexpected message: {resp}"
    );

    let resp = c.get("k").await;
    assert_eq!(resp["status"], "ERROR");

    // the rejected write never reached the secondary's log
    let resp = c
        .send(r#"{"type":"SYNC","from_node":"test","since_timestamp":0}"#)
        .await;
    assert_eq!(resp["status"], "OK");
    assert_eq!(resp["entries"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn primary_log_is_served_via_sync() {
    let cluster = TestCluster::start();
    let mut c = cluster.node("node1").connect().await;

    c.set("a", &json!(1)).await;
    c.set("b", &json!({"x": [1, 2]})).await;
    c.delete("a").await;

    let resp = c
        .send(r#"{"type":"SYNC","from_node":"test","since_timestamp":0}"#)
        .await;
    let entries = resp["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["operation"], "SET");
    assert_eq!(entries[0]["key"], "a");
    assert_eq!(entries[1]["value"], json!({"x": [1, 2]}));
    assert_eq!(entries[2]["operation"], "DELETE");
    assert_eq!(entries[2]["value"], json!(null));

    // asking from the last timestamp returns nothing new
    let last_ts = entries[2]["timestamp"].as_f64().unwrap();
    let resp = c
        .send(&format!(
            r#"{{"type":"SYNC","from_node":"test","since_timestamp":{last_ts}}}"#
        ))
        .await;
    assert_eq!(resp["entries"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn vote_grammar_on_the_wire() {
    let cluster = TestCluster::start();
    let mut c = cluster.node("node3").connect().await;

    // fresh candidate in a new term is granted
    let resp = c
        .send(r#"{"type":"ELECTION","candidate_id":"node2","term":7}"#)
        .await;
    assert_eq!(resp["status"], "OK");
    assert_eq!(resp["message"], "Vote granted");
    assert_eq!(resp["term"], 7);

    // a different candidate in the same term is refused
    let resp = c
        .send(r#"{"type":"ELECTION","candidate_id":"node1","term":7}"#)
        .await;
    assert_eq!(resp["status"], "ERROR");
    assert_eq!(resp["message"], "Already voted");

    // a stale term is refused with the current term attached
    let resp = c
        .send(r#"{"type":"ELECTION","candidate_id":"node1","term":3}"#)
        .await;
    assert_eq!(resp["status"], "ERROR");
    assert_eq!(resp["message"], "Stale term");
    assert_eq!(resp["term"], 7);

    // the granted term shows up in STATUS
    let status = c.status().await;
    assert_eq!(status["election_term"], 7);
}

#[tokio::test]
async fn higher_term_election_demotes_the_primary() {
    let cluster = TestCluster::start();
    let mut c = cluster.node("node1").connect().await;

    let resp = c
        .send(r#"{"type":"ELECTION","candidate_id":"node2","term":5}"#)
        .await;
    assert_eq!(resp["message"], "Vote granted");

    let status = c.status().await;
    assert_eq!(status["role"], "secondary");
    assert_eq!(status["election_term"], 5);
}

#[tokio::test]
async fn replicate_is_refused_at_the_primary() {
    let cluster = TestCluster::start();
    let mut c = cluster.node("node1").connect().await;

    let resp = c
        .send(r#"{"type":"REPLICATE","operation":"SET","key":"k","value":1}"#)
        .await;
    assert_eq!(resp["status"], "ERROR");
}

#[tokio::test]
async fn heartbeat_and_register_node_are_acknowledged() {
    let cluster = TestCluster::start();
    let mut c = cluster.node("node2").connect().await;

    let resp = c
        .send(r#"{"type":"HEARTBEAT","from_node":"node1","term":0}"#)
        .await;
    assert_eq!(resp["status"], "OK");

    let resp = c
        .send(
            r#"{"type":"REGISTER_NODE","node":{"node_id":"node3","host":"127.0.0.1","port":9999,"role":"secondary"}}"#,
        )
        .await;
    assert_eq!(resp["status"], "OK");
}

#[tokio::test]
async fn heartbeats_keep_secondaries_loyal() {
    let cluster = TestCluster::start();

    // past the longest election timeout — with the primary alive no
    // secondary may have called an election
    tokio::time::sleep(std::time::Duration::from_secs(10)).await;

    for id in ["node2", "node3"] {
        let mut c = cluster.node(id).connect().await;
        let status = c.status().await;
        assert_eq!(status["role"], "secondary", "{id} deserted its primary");
        assert_eq!(status["election_term"], 0);
    }
    let mut c = cluster.node("node1").connect().await;
    assert_eq!(c.status().await["role"], "primary");
}
