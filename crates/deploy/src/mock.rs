//! In-memory chain client for testing without a network.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use alloy_core::primitives::{Address, Bytes, TxHash, U64, U256, keccak256};

use crate::{
    client::{ChainClient, ChainConnector, CreationReceipt},
    error::RpcError,
    network::NetworkProfile,
};

/// When submitted transactions become visible as receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inclusion {
    /// After the given number of empty receipt polls.
    AfterPolls(usize),
    Never,
}

#[derive(Debug)]
struct MockState {
    chain_id: u64,
    gas_price: u128,
    gas_estimate: u64,
    balance: U256,
    inclusion: Inclusion,
    revert: bool,
    reject_with: Option<String>,
    unreachable: bool,
    lose_responses: bool,
    nonces: HashMap<Address, u64>,
    last_sender: Address,
    receipts: HashMap<TxHash, (CreationReceipt, usize)>,
    block_number: u64,
    calls: usize,
    submissions: usize,
    receipt_polls: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            chain_id: 31337,
            gas_price: 1_000_000_000,
            gas_estimate: 300_000,
            balance: U256::from(10u128.pow(20)),
            inclusion: Inclusion::AfterPolls(0),
            revert: false,
            reject_with: None,
            unreachable: false,
            lose_responses: false,
            nonces: HashMap::new(),
            last_sender: Address::ZERO,
            receipts: HashMap::new(),
            block_number: 1,
            calls: 0,
            submissions: 0,
            receipt_polls: 0,
        }
    }
}

/// Mock chain client.
///
/// Simulates nonce tracking, contract creation and receipt polling in memory, and
/// counts every call so tests can assert that no network traffic happened.
#[derive(Debug, Clone, Default)]
pub struct MockChainClient {
    state: Arc<Mutex<MockState>>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_chain_id(self, chain_id: u64) -> Self {
        self.state().chain_id = chain_id;
        self
    }

    pub fn with_balance(self, balance: U256) -> Self {
        self.state().balance = balance;
        self
    }

    /// Receipts appear after `polls` empty polls.
    pub fn confirm_after_polls(self, polls: usize) -> Self {
        self.state().inclusion = Inclusion::AfterPolls(polls);
        self
    }

    /// Submissions are accepted but never included.
    pub fn never_confirm(self) -> Self {
        self.state().inclusion = Inclusion::Never;
        self
    }

    /// Included creations revert.
    pub fn revert_creations(self) -> Self {
        self.state().revert = true;
        self
    }

    /// `eth_sendRawTransaction` fails with a node error carrying `message`.
    pub fn reject_submissions(self, message: impl Into<String>) -> Self {
        self.state().reject_with = Some(message.into());
        self
    }

    /// Every call fails with a transport error.
    pub fn unreachable(self) -> Self {
        self.state().unreachable = true;
        self
    }

    /// `eth_sendRawTransaction` accepts the transaction but the response never arrives.
    pub fn lose_submission_responses(self) -> Self {
        self.state().lose_responses = true;
        self
    }

    /// Record a pending transaction without going through submission.
    pub fn insert_pending_receipt(&self) -> TxHash {
        let mut state = self.state();
        let hash = keccak256(state.receipts.len().to_be_bytes());
        let block = state.block_number;
        state.receipts.insert(
            hash,
            (
                CreationReceipt {
                    transaction_hash: hash,
                    contract_address: Some(Address::repeat_byte(0x42)),
                    block_number: Some(U64::from(block)),
                    status: Some(U64::from(1)),
                },
                0,
            ),
        );
        hash
    }

    /// Total number of chain calls made.
    pub fn calls(&self) -> usize {
        self.state().calls
    }

    /// Number of `eth_sendRawTransaction` calls.
    pub fn submissions(&self) -> usize {
        self.state().submissions
    }

    /// Number of receipt queries.
    pub fn receipt_polls(&self) -> usize {
        self.state().receipt_polls
    }

    fn enter(&self, method: &str) -> Result<MutexGuard<'_, MockState>, RpcError> {
        let mut state = self.state();
        state.calls += 1;
        if state.unreachable {
            return Err(RpcError::Transport {
                url: "mock://unreachable".to_string(),
                request_sent: false,
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("{} refused", method),
                )),
            });
        }
        Ok(state)
    }
}

impl ChainClient for MockChainClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        Ok(self.enter("eth_chainId")?.chain_id)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, RpcError> {
        let mut state = self.enter("eth_getTransactionCount")?;
        state.last_sender = address;
        Ok(state.nonces.get(&address).copied().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<u128, RpcError> {
        Ok(self.enter("eth_gasPrice")?.gas_price)
    }

    async fn estimate_gas(&self, _from: Address, _input: &Bytes) -> Result<u64, RpcError> {
        Ok(self.enter("eth_estimateGas")?.gas_estimate)
    }

    async fn balance(&self, _address: Address) -> Result<U256, RpcError> {
        Ok(self.enter("eth_getBalance")?.balance)
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> Result<TxHash, RpcError> {
        let mut state = self.enter("eth_sendRawTransaction")?;
        state.submissions += 1;

        if let Some(message) = state.reject_with.clone() {
            return Err(RpcError::Node {
                method: "eth_sendRawTransaction".to_string(),
                code: -32000,
                message,
            });
        }

        let sender = state.last_sender;
        let nonce = state.nonces.entry(sender).or_default();
        let contract_address = sender.create(*nonce);
        *nonce += 1;

        state.block_number += 1;
        let hash = keccak256(raw);
        let receipt = CreationReceipt {
            transaction_hash: hash,
            contract_address: (!state.revert).then_some(contract_address),
            block_number: Some(U64::from(state.block_number)),
            status: Some(U64::from(u64::from(!state.revert))),
        };
        state.receipts.insert(hash, (receipt, 0));

        if state.lose_responses {
            return Err(RpcError::Transport {
                url: "mock://lossy".to_string(),
                request_sent: true,
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "eth_sendRawTransaction timed out",
                )),
            });
        }

        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<CreationReceipt>, RpcError> {
        let mut state = self.enter("eth_getTransactionReceipt")?;
        state.receipt_polls += 1;

        let inclusion = state.inclusion;
        let Some((receipt, polls)) = state.receipts.get_mut(&hash) else {
            return Ok(None);
        };

        match inclusion {
            Inclusion::Never => Ok(None),
            Inclusion::AfterPolls(required) if *polls < required => {
                *polls += 1;
                Ok(None)
            }
            Inclusion::AfterPolls(_) => Ok(Some(receipt.clone())),
        }
    }
}

/// Connector handing out clones of one shared [`MockChainClient`].
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    client: MockChainClient,
    connections: Arc<Mutex<usize>>,
}

impl MockConnector {
    pub fn new(client: MockChainClient) -> Self {
        Self {
            client,
            connections: Arc::default(),
        }
    }

    pub fn client(&self) -> &MockChainClient {
        &self.client
    }

    /// Number of times a client was opened.
    pub fn connections(&self) -> usize {
        *self.connections.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ChainConnector for MockConnector {
    type Client = MockChainClient;

    fn connect(&self, profile: &NetworkProfile) -> Result<MockChainClient, RpcError> {
        tracing::debug!(network = profile.identifier(), "Opening mock chain client");
        *self.connections.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
        Ok(self.client.clone())
    }
}
