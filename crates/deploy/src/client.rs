//! Chain client abstraction used by the deployer, and its JSON-RPC implementation.

use std::{future::Future, time::Duration};

use alloy_core::primitives::{Address, Bytes, TxHash, U64, U256};
use serde::{Deserialize, Serialize};

use crate::{
    error::RpcError,
    network::NetworkProfile,
    rpc::{self, DEFAULT_TIMEOUT},
};

/// Receipt fields needed to confirm a contract creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationReceipt {
    pub transaction_hash: TxHash,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub block_number: Option<U64>,
    /// `1` on success, `0` on revert. Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<U64>,
}

impl CreationReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| status == U64::from(1))
    }

    pub fn block_number(&self) -> Option<u64> {
        self.block_number.map(|n| n.to::<u64>())
    }
}

/// The chain operations the deployer needs. Every method is one network round-trip.
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> impl Future<Output = Result<u64, RpcError>> + Send;

    /// Nonce for the next transaction from `address`, counting pending ones.
    fn transaction_count(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<u64, RpcError>> + Send;

    fn gas_price(&self) -> impl Future<Output = Result<u128, RpcError>> + Send;

    fn estimate_gas(
        &self,
        from: Address,
        input: &Bytes,
    ) -> impl Future<Output = Result<u64, RpcError>> + Send;

    fn balance(&self, address: Address) -> impl Future<Output = Result<U256, RpcError>> + Send;

    /// Broadcast a signed, EIP-2718 encoded transaction.
    fn send_raw_transaction(
        &self,
        raw: &Bytes,
    ) -> impl Future<Output = Result<TxHash, RpcError>> + Send;

    /// `None` while the transaction is not yet included.
    fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = Result<Option<CreationReceipt>, RpcError>> + Send;
}

/// Opens a [`ChainClient`] for a network profile.
pub trait ChainConnector {
    type Client: ChainClient;

    fn connect(&self, profile: &NetworkProfile) -> Result<Self::Client, RpcError>;
}

/// [`ChainClient`] speaking JSON-RPC over HTTP.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
}

impl JsonRpcClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T, RpcError> {
        tracing::trace!(method, url = %self.url, "JSON-RPC request");
        rpc::json_rpc_call(&self.http, &self.url, method, params).await
    }
}

impl ChainClient for JsonRpcClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let id: U64 = self.call("eth_chainId", vec![]).await?;
        Ok(id.to())
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, RpcError> {
        let count: U64 = self
            .call(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!("pending")],
            )
            .await?;
        Ok(count.to())
    }

    async fn gas_price(&self) -> Result<u128, RpcError> {
        let price: U256 = self.call("eth_gasPrice", vec![]).await?;
        Ok(price.saturating_to())
    }

    async fn estimate_gas(&self, from: Address, input: &Bytes) -> Result<u64, RpcError> {
        let gas: U64 = self
            .call(
                "eth_estimateGas",
                vec![serde_json::json!({
                    "from": from,
                    "data": input,
                })],
            )
            .await?;
        Ok(gas.to())
    }

    async fn balance(&self, address: Address) -> Result<U256, RpcError> {
        self.call(
            "eth_getBalance",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<TxHash, RpcError> {
        self.call("eth_sendRawTransaction", vec![serde_json::json!(raw)])
            .await
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<CreationReceipt>, RpcError> {
        self.call("eth_getTransactionReceipt", vec![serde_json::json!(hash)])
            .await
    }
}

/// Connects to the profile's endpoint over HTTP.
#[derive(Debug, Clone, Copy)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ChainConnector for HttpConnector {
    type Client = JsonRpcClient;

    fn connect(&self, profile: &NetworkProfile) -> Result<JsonRpcClient, RpcError> {
        let http = rpc::create_client(self.timeout).map_err(|e| RpcError::Transport {
            url: profile.endpoint().to_string(),
            request_sent: false,
            source: Box::new(e),
        })?;
        Ok(JsonRpcClient::new(http, profile.endpoint().as_str()))
    }
}
