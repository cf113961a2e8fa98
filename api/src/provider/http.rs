//! JSON-RPC over HTTP, for the desktop build.
//!
//! Talks to a node that manages its own (unlocked) accounts, so there is no
//! wallet popup: "requesting" accounts simply lists them.

use std::env;

use alloy_rpc_client::RpcClient;
use dioxus_logger::tracing::warn;
use serde_json::Value;
use tokio::sync::broadcast;

use super::{ChainProvider, ProviderEvent};
use crate::error::{ChainError, ChainResult};

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// The node endpoint, from `RPC_URL` if set.
pub fn rpc_url() -> String {
    env::var("RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string())
}

pub struct HttpProvider {
    /// `None` when the endpoint did not parse; every request then fails.
    client: Option<RpcClient>,
    url: String,
    // a node never switches chain or accounts under us; kept so subscribers
    // get a live, silent channel.
    events: broadcast::Sender<ProviderEvent>,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let client = match url.parse::<reqwest::Url>() {
            Ok(parsed) => Some(RpcClient::new_http(parsed)),
            Err(e) => {
                warn!("invalid RPC endpoint {url:?}: {e}");
                None
            }
        };
        let (events, _) = broadcast::channel(16);
        Self {
            client,
            url,
            events,
        }
    }

    pub fn from_env() -> Self {
        Self::new(rpc_url())
    }
}

#[async_trait::async_trait]
impl ChainProvider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> ChainResult<Value> {
        let Some(client) = &self.client else {
            return Err(ChainError::Transport(format!(
                "invalid RPC endpoint {}",
                self.url
            )));
        };
        let method = match method {
            "eth_requestAccounts" => "eth_accounts",
            other => other,
        };
        client
            .request::<Value, Value>(method.to_owned(), params)
            .await
            .map_err(|e| match e.as_error_resp() {
                Some(payload) => ChainError::from_rpc(payload.code, payload.message.to_string()),
                None => ChainError::Transport(e.to_string()),
            })
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn unparsable_endpoint_fails_every_request() {
        let provider = HttpProvider::new("not a url");

        let result = provider.request("eth_chainId", json!([])).await;

        assert!(matches!(result, Err(ChainError::Transport(_))));
        assert!(result.unwrap_err().is_transient());
    }
}
