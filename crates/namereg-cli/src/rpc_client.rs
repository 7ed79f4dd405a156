use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use namereg_core::{DomainInfo, SearchResult, Season, SeasonStats};
use namereg_rpc::{RpcReceipt, RpcRegistryInfo, RpcTimestampedDomain};

/// Minimal JSON-RPC 2.0 client for a running registry node.
///
/// Plain HTTP POST through reqwest; results are decoded straight into the
/// registry's own types.
pub struct RegistryRpcClient {
    url: String,
    client: reqwest::Client,
}

impl RegistryRpcClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Call a JSON-RPC method and return the `result` field.
    async fn call(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("connecting to node at {}", self.url))?;

        let json: Value = resp.json().await.context("parsing RPC response")?;

        if let Some(err) = json.get("error") {
            match err.get("message").and_then(Value::as_str) {
                Some(msg) => bail!("{msg}"),
                None => bail!("RPC error: {err}"),
            }
        }

        Ok(json["result"].clone())
    }

    async fn call_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> anyhow::Result<T> {
        let result = self.call(method, params).await?;
        serde_json::from_value(result).with_context(|| format!("decoding {method} result"))
    }

    /// Submit a mutation on behalf of `caller`. `args` follow the caller.
    pub async fn submit(&self, method: &str, caller: &str, args: Vec<Value>) -> anyhow::Result<RpcReceipt> {
        let mut params = vec![Value::String(caller.to_string())];
        params.extend(args);
        self.call_as(&format!("registry_{method}"), Value::Array(params)).await
    }

    pub async fn get_domain_info(&self, name: &str) -> anyhow::Result<Option<DomainInfo>> {
        self.call_as("registry_getDomainInfo", json!([name])).await
    }

    pub async fn list_domains(&self, owner: Option<&str>) -> anyhow::Result<Vec<DomainInfo>> {
        self.call_as("registry_listDomains", json!([owner])).await
    }

    pub async fn discover_domains(&self, query: &str) -> anyhow::Result<Vec<SearchResult>> {
        self.call_as("registry_discoverDomains", json!([query])).await
    }

    pub async fn get_domains_since(&self, since: u64) -> anyhow::Result<Vec<RpcTimestampedDomain>> {
        self.call_as("registry_getDomainsSinceTimestamp", json!([since])).await
    }

    pub async fn get_wallet_domains(&self, principal: &str) -> anyhow::Result<Vec<String>> {
        self.call_as("registry_getWalletDomains", json!([principal])).await
    }

    pub async fn get_all_seasons(&self) -> anyhow::Result<Vec<Season>> {
        self.call_as("registry_getAllSeasons", json!([])).await
    }

    pub async fn get_season_stats_by_number(&self, number: u64) -> anyhow::Result<Option<SeasonStats>> {
        self.call_as("registry_getSeasonStatsByNumber", json!([number])).await
    }

    pub async fn get_season_addresses(&self, season_id: u64) -> anyhow::Result<Vec<String>> {
        self.call_as("registry_getSeasonAddresses", json!([season_id])).await
    }

    pub async fn get_registration_fee(&self, name: &str) -> anyhow::Result<u64> {
        self.call_as("registry_getRegistrationFee", json!([name])).await
    }

    pub async fn can_register_domain(&self, name: &str, user: &str) -> anyhow::Result<bool> {
        self.call_as("registry_canRegisterDomain", json!([name, user])).await
    }

    pub async fn get_admins(&self) -> anyhow::Result<Vec<String>> {
        self.call_as("registry_getAdmins", json!([])).await
    }

    pub async fn get_registry_info(&self) -> anyhow::Result<RpcRegistryInfo> {
        self.call_as("registry_getRegistryInfo", json!([])).await
    }
}
