//! Shared RPC utilities for interacting with Ethereum JSON-RPC endpoints.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RpcError;

/// Default timeout for RPC requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result. Connection failures are [`RpcError::Transport`], error
/// objects returned by the node are [`RpcError::Node`].
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, RpcError> {
    let transport = |source: reqwest::Error| RpcError::Transport {
        url: url.to_string(),
        request_sent: !(source.is_connect() || source.is_builder()),
        source: Box::new(source),
    };
    let decode = |reason: String| RpcError::Decode {
        method: method.to_string(),
        reason,
    };

    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .map_err(transport)?;

    let status = response.status();
    let body = response.bytes().await.map_err(transport)?;

    let result: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) if status.is_success() => return Err(decode(e.to_string())),
        Err(_) => {
            return Err(RpcError::Transport {
                url: url.to_string(),
                request_sent: true,
                source: format!("HTTP {}", status).into(),
            });
        }
    };

    if let Some(error) = result.get("error") {
        return Err(RpcError::Node {
            method: method.to_string(),
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        });
    }

    let result_value = result
        .get("result")
        .cloned()
        .ok_or_else(|| decode("no result in response".to_string()))?;

    serde_json::from_value(result_value).map_err(|e| decode(e.to_string()))
}
