//! End-to-end smoke test for namereg-node.
//!
//! Starts a real node process on a fresh database, drives it over JSON-RPC,
//! and asserts that registry state changes are reflected by the queries.
//!
//! Run with:
//!   cargo test -p namereg-node --test smoke

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use namereg_core::Principal;
use serde_json::{json, Value};

// ── Node lifecycle ────────────────────────────────────────────────────────────

struct NodeGuard {
    child: Child,
    data_dir: PathBuf,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

/// Find a free TCP port on loopback.
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

// ── RPC helpers ───────────────────────────────────────────────────────────────

async fn rpc_try(client: &reqwest::Client, url: &str, method: &str, params: Value) -> Result<Value, Value> {
    let body = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap_or_else(|e| panic!("RPC call {method} failed: {e}"));
    let json: Value = resp.json().await.expect("parse RPC JSON");
    match json.get("error") {
        Some(err) => Err(err.clone()),
        None => Ok(json["result"].clone()),
    }
}

async fn rpc_call(client: &reqwest::Client, url: &str, method: &str, params: Value) -> Value {
    rpc_try(client, url, method, params)
        .await
        .unwrap_or_else(|err| panic!("RPC error from {method}: {err}"))
}

/// Poll until the RPC server responds or the timeout elapses.
async fn wait_for_rpc(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let body = json!({
        "jsonrpc": "2.0",
        "method": "registry_getRenewalFee",
        "params": [],
        "id": 1
    });
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client.post(url).json(&body).send().await {
            if resp.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    false
}

fn registration(name: &str, owner: &Principal) -> Value {
    json!({
        "domain_name": name,
        "administrator": owner.to_b58(),
        "operator": owner.to_b58(),
        "payment_block": 1
    })
}

// ── Smoke test ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn smoke_season_registration_and_queries() {
    // ── 1. Prepare temp dir and init params ───────────────────────────────────
    let data_dir = std::env::temp_dir().join(format!("namereg_e2e_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    std::fs::create_dir_all(&data_dir).unwrap();

    let admin = Principal::derive(b"smoke-admin");
    let params = json!({ "admins": [admin.to_b58()], "reserved_names": ["premium"] });
    let params_path = data_dir.join("init-params.json");
    std::fs::write(&params_path, params.to_string()).unwrap();

    // ── 2. Start node ─────────────────────────────────────────────────────────
    let rpc_port = free_port();
    let rpc_url = format!("http://127.0.0.1:{}", rpc_port);

    let node_bin = env!("CARGO_BIN_EXE_namereg-node");
    let child = Command::new(node_bin)
        .args([
            "--data-dir",    data_dir.join("state").to_str().unwrap(),
            "--rpc-addr",    &format!("127.0.0.1:{}", rpc_port),
            "--init-params", params_path.to_str().unwrap(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn namereg-node");

    let _guard = NodeGuard { child, data_dir };

    // ── 3. Wait for RPC ready ─────────────────────────────────────────────────
    let http = reqwest::Client::new();
    assert!(
        wait_for_rpc(&http, &rpc_url, Duration::from_secs(20)).await,
        "namereg-node did not become ready within 20 seconds"
    );

    let admins = rpc_call(&http, &rpc_url, "registry_getAdmins", json!([])).await;
    assert_eq!(admins, json!([admin.to_b58()]));

    // ── 4. Open a two-name season ─────────────────────────────────────────────
    let season = json!({ "min_letters": 4, "max_letters": 10, "total_allowed": 2, "price_icp": 10 });
    let receipt = rpc_call(&http, &rpc_url, "registry_createSeason", json!([admin.to_b58(), season])).await;
    assert_eq!(receipt["season_id"], 1);

    let err = rpc_try(&http, &rpc_url, "registry_createSeason", json!([admin.to_b58(), season]))
        .await
        .unwrap_err();
    assert!(err["message"].as_str().unwrap().contains("already an active season"));

    // ── 5. Self-service registration and the one-domain rule ──────────────────
    let user1 = Principal::derive(b"smoke-user-1");
    let receipt = rpc_call(
        &http,
        &rpc_url,
        "registry_registerDomain",
        json!([user1.to_b58(), registration("user1domain", &user1)]),
    )
    .await;
    assert!(receipt["message"].as_str().unwrap().contains("registered successfully"));
    assert_eq!(receipt["fee_e8s"], 1_000_000_000u64);

    let err = rpc_try(
        &http,
        &rpc_url,
        "registry_registerDomain",
        json!([user1.to_b58(), registration("user1other", &user1)]),
    )
    .await
    .unwrap_err();
    assert_eq!(err["code"], -32000);
    assert!(err["message"].as_str().unwrap().contains("already owns domain"));

    let err = rpc_try(
        &http,
        &rpc_url,
        "registry_registerDomain",
        json!([user1.to_b58(), registration("premium", &user1)]),
    )
    .await
    .unwrap_err();
    assert!(err["message"].as_str().unwrap().contains("reserved"));

    // ── 6. Gift fills the season ──────────────────────────────────────────────
    let user2 = Principal::derive(b"smoke-user-2");
    let gift = json!({
        "domain_name": "giftdomain",
        "recipient": user2.to_b58(),
        "administrator": user2.to_b58(),
        "operator": user2.to_b58()
    });
    let receipt = rpc_call(&http, &rpc_url, "registry_adminGiftDomain", json!([admin.to_b58(), gift])).await;
    assert!(receipt["message"].as_str().unwrap().contains("gifted"));

    let stats = rpc_call(&http, &rpc_url, "registry_getSeasonStatsByNumber", json!([0])).await;
    assert_eq!(stats["names_taken"], 2);

    let user3 = Principal::derive(b"smoke-user-3");
    let err = rpc_try(
        &http,
        &rpc_url,
        "registry_registerDomain",
        json!([user3.to_b58(), registration("user3domain", &user3)]),
    )
    .await
    .unwrap_err();
    assert!(err["message"].as_str().unwrap().contains("full"));

    // ── 7. Read side ──────────────────────────────────────────────────────────
    let since = rpc_call(&http, &rpc_url, "registry_getDomainsSinceTimestamp", json!([0])).await;
    let names: Vec<&str> = since
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["domain_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["user1domain", "giftdomain"]);

    let endpoint = rpc_call(&http, &rpc_url, "registry_getMcpEndpoint", json!(["user1domain"])).await;
    assert_eq!(endpoint, "https://mcp.ctx.xyz/user1domain");

    let wallet = rpc_call(&http, &rpc_url, "registry_getWalletDomain", json!([user2.to_b58()])).await;
    assert_eq!(wallet, "giftdomain");

    let info = rpc_call(&http, &rpc_url, "registry_getDomainInfo", json!(["giftdomain"])).await;
    assert_eq!(info["was_gifted"], true);
    assert_eq!(info["owner"], user2.to_b58());
}
