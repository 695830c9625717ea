//! Waiting for a submitted transaction to be included.

use std::time::Duration;

use alloy_core::primitives::TxHash;
use backon::{ExponentialBuilder, Retryable};

use crate::{
    client::{ChainClient, CreationReceipt},
    config::ConfirmationConfig,
    error::RpcError,
};

#[derive(Debug, thiserror::Error)]
enum PollError {
    #[error("receipt not available yet")]
    Pending,
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Poll for the receipt of `tx_hash` with exponential backoff until it appears.
///
/// Returns `None` once `config.timeout()` elapses. RPC errors while polling are
/// logged and polled through; this never resubmits anything.
pub async fn wait_for_receipt<C: ChainClient>(
    client: &C,
    tx_hash: TxHash,
    config: &ConfirmationConfig,
) -> Option<CreationReceipt> {
    let backoff = ExponentialBuilder::default()
        .with_min_delay(config.min_poll_interval())
        .with_max_delay(config.max_poll_interval())
        .without_max_times();

    let poll = (|| async {
        match client.transaction_receipt(tx_hash).await? {
            Some(receipt) => Ok(receipt),
            None => Err(PollError::Pending),
        }
    })
    .retry(backoff)
    .notify(|err: &PollError, delay: Duration| match err {
        PollError::Pending => {
            tracing::debug!(%tx_hash, ?delay, "Transaction not yet included, polling again...");
        }
        PollError::Rpc(e) => {
            tracing::warn!(%tx_hash, ?delay, error = %e, "Receipt query failed, polling again...");
        }
    });

    match tokio::time::timeout(config.timeout(), poll).await {
        Ok(Ok(receipt)) => Some(receipt),
        Ok(Err(e)) => {
            tracing::warn!(%tx_hash, error = %e, "Receipt polling gave up");
            None
        }
        Err(_) => None,
    }
}
