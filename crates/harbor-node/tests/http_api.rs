//! Two nodes talking over real HTTP on loopback

use harbor_core::block::ChainSnapshot;
use harbor_core::party::PartyDescriptor;
use harbor_core::types::PartyId;
use harbor_node::{rpc_server, NodeConfig, NodeContext};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

struct TestNode {
    url: String,
    ctx: Arc<NodeContext>,
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

fn start(listener: TcpListener, url: &str, own: &str, peers: Vec<PartyDescriptor>) -> TestNode {
    let mut config = NodeConfig::default();
    config.node.party_id = Some(PartyId::new(own));
    config.node.name = format!("Port {}", own);
    config.node.address = url.to_string();
    config.network.peers = peers;
    config.network.request_timeout_ms = 2000;

    let ctx = Arc::new(NodeContext::new(config).unwrap());
    tokio::spawn(rpc_server::serve(listener, ctx.clone()));
    TestNode {
        url: url.to_string(),
        ctx,
    }
}

fn descriptor(id: &str, url: &str) -> PartyDescriptor {
    PartyDescriptor {
        id: PartyId::new(id),
        name: format!("Port {}", id),
        address: url.to_string(),
    }
}

async fn pair() -> (TestNode, TestNode) {
    let (listener_a, url_a) = bind().await;
    let (listener_b, url_b) = bind().await;
    let a = start(listener_a, &url_a, "A", vec![descriptor("B", &url_b)]);
    let b = start(listener_b, &url_b, "B", vec![descriptor("A", &url_a)]);
    (a, b)
}

#[tokio::test]
async fn test_submission_status_codes() {
    let (a, _b) = pair().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/contracts/new", a.url))
        .json(&json!({ "port_from": "A", "port_to": "B", "cost": 30 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Transaction will be added to Block 2");

    for (payload, fragment) in [
        (json!({ "port_from": "A", "port_to": "A", "cost": 1 }), "Ports matched"),
        (json!({ "port_from": "A", "port_to": "Q", "cost": 1 }), "No such port"),
        (json!({ "port_from": "A", "cost": 1 }), "Missing values"),
    ] {
        let response = client
            .post(format!("{}/contracts/new", a.url))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert!(body["message"].as_str().unwrap().contains(fragment));
    }

    assert_eq!(a.ctx.ledger().read().chain().pending().len(), 1);
}

#[tokio::test]
async fn test_mistyped_body_is_bad_request() {
    let (a, _b) = pair().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/contracts/new", a.url))
        .json(&json!({ "port_from": "A", "port_to": "B", "cost": "30" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 1000);
    assert!(body["message"].as_str().unwrap().starts_with("Malformed request"));

    let response = client
        .post(format!("{}/nodes/register", a.url))
        .json(&json!({ "nodes": "B" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 1000);

    assert!(a.ctx.ledger().read().chain().pending().is_empty());
}

#[tokio::test]
async fn test_oracle_settlement_and_consensus_over_http() {
    let (a, b) = pair().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/contracts/new", a.url))
        .json(&json!({ "port_from": "A", "port_to": "B", "cost": 30, "uuid": "c-42", "timestamp": 1700000000 }))
        .send()
        .await
        .unwrap();

    // B has not confirmed yet, so mining leaves the contract pending
    let mined: Value = client.get(format!("{}/mine", a.url)).send().await.unwrap().json().await.unwrap();
    assert_eq!(mined["message"], "New Block Forged");
    assert_eq!(mined["index"], 2);
    assert_eq!(mined["transactions"][0]["is_done"], false);

    let status = client.get(format!("{}/contract/c-42/is_done", b.url)).send().await.unwrap().status();
    assert_eq!(status, 406);

    let status = client
        .post(format!("{}/contract/c-42/export_oracle", b.url))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, 200);

    // Resolution keeps A's longer chain and the following settlement pass executes
    let resolved: Value = client
        .get(format!("{}/nodes/resolve", a.url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resolved["message"], "Our chain is authoritative");
    assert_eq!(resolved["chain"][1]["transactions"][0]["is_done"], true);

    let port: Value = client.get(format!("{}/port", a.url)).send().await.unwrap().json().await.unwrap();
    assert_eq!(port["id"], "A");
    assert_eq!(port["balance"], 130);

    // B adopts A's chain; balances are never imported
    let resolved: Value = client
        .get(format!("{}/nodes/resolve", b.url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resolved["message"], "Our chain was replaced");
    assert_eq!(resolved["new_chain"].as_array().unwrap().len(), 2);

    let chain: ChainSnapshot = client.get(format!("{}/chain", b.url)).send().await.unwrap().json().await.unwrap();
    assert_eq!(chain.length, 2);
    assert_eq!(chain.chain[1].transactions[0].id.as_str(), "c-42");
    assert_eq!(b.ctx.ledger().read().parties().balance(&PartyId::new("B")), Some(100));
}

#[tokio::test]
async fn test_register_nodes_ignores_duplicates() {
    let (a, _b) = pair().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/nodes/register", a.url))
        .json(&json!({ "nodes": [
            { "id": "B", "name": "Other B", "address": "http://elsewhere" },
            { "id": "C", "name": "Port C", "address": "http://c.harbor.test" },
        ] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    let total = body["total_nodes"].as_array().unwrap();
    assert_eq!(total.len(), 3);
    assert_eq!(total[1]["name"], "Port B");

    let response = client
        .post(format!("{}/nodes/register", a.url))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (a, _b) = pair().await;
    let client = reqwest::Client::new();

    client.get(format!("{}/mine", a.url)).send().await.unwrap();
    let text = client
        .get(format!("{}/metrics", a.url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("harbor_blocks_mined_total 1"));
    assert!(text.contains("harbor_chain_height 2"));
}
