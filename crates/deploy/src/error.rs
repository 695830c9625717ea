//! Error types for the deployment pipeline.

use std::time::Duration;

use alloy_core::primitives::TxHash;
use thiserror::Error;

/// Errors raised while reading a signer credential from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("credential `{variable}` is not set or is empty")]
    Missing { variable: String },

    #[error("credential `{variable}` is not a valid private key: {reason}")]
    Malformed { variable: String, reason: String },
}

/// Errors raised by a JSON-RPC endpoint.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to reach {url}")]
    Transport {
        url: String,
        /// Whether the request may have been delivered before the failure.
        request_sent: bool,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{method} failed with code {code}: {message}")]
    Node {
        method: String,
        code: i64,
        message: String,
    },

    #[error("malformed {method} response: {reason}")]
    Decode { method: String, reason: String },
}

impl RpcError {
    /// Whether the endpoint refused the request because the sender cannot pay for it.
    pub fn is_insufficient_funds(&self) -> bool {
        match self {
            RpcError::Node { message, .. } => message.to_lowercase().contains("insufficient funds"),
            _ => false,
        }
    }

    /// Whether the request may have reached the endpoint without an answer coming back.
    ///
    /// False for failures that happen before the request leaves, such as a refused connection.
    pub fn is_response_lost(&self) -> bool {
        matches!(self, RpcError::Transport { request_sent: true, .. })
    }
}

/// Reasons a creation transaction could not be submitted.
#[derive(Debug, Error)]
pub enum SubmissionFailure {
    #[error("invalid constructor arguments: {0}")]
    InvalidArguments(String),

    #[error("insufficient signer funds: {0}")]
    InsufficientFunds(String),

    #[error("endpoint unreachable")]
    Unreachable(#[source] RpcError),

    #[error("endpoint rejected the transaction")]
    Rejected(#[source] RpcError),

    #[error("failed to sign the creation transaction: {0}")]
    Signing(String),
}

impl From<RpcError> for SubmissionFailure {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Transport { .. } => SubmissionFailure::Unreachable(err),
            RpcError::Node { ref message, .. } if err.is_insufficient_funds() => {
                SubmissionFailure::InsufficientFunds(message.clone())
            }
            RpcError::Node { .. } | RpcError::Decode { .. } => SubmissionFailure::Rejected(err),
        }
    }
}

/// How a failed invocation should be reported to whoever runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Outcome {
    /// Nothing was created on-chain, or creation definitely failed.
    Failed,
    /// A transaction was submitted but its fate is unknown.
    Ambiguous,
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Failed => 1,
            Outcome::Ambiguous => 2,
        }
    }
}

/// Every way a deployment invocation can terminate without a result.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("unknown network `{network}` (registered: {registered})")]
    UnknownNetwork { network: String, registered: String },

    #[error("network `{network}` has no usable signer credential")]
    InvalidCredential {
        network: String,
        #[source]
        source: CredentialError,
    },

    #[error("network `{network}` is misconfigured: {reason}")]
    InvalidNetwork { network: String, reason: String },

    #[error("contract artifact `{name}` not found under {searched}")]
    ArtifactNotFound { name: String, searched: String },

    #[error("contract artifact `{name}` cannot be deployed: {reason}")]
    InvalidArtifact { name: String, reason: String },

    #[error("failed to submit creation transaction for `{contract}`")]
    Submission {
        contract: String,
        #[source]
        source: SubmissionFailure,
    },

    #[error(
        "creation transaction {tx_hash} for `{contract}` was not confirmed within {timeout:?}; \
         the contract may still be created, verify on-chain before redeploying"
    )]
    ConfirmationTimeout {
        contract: String,
        tx_hash: TxHash,
        timeout: Duration,
    },

    #[error(
        "creation transaction {tx_hash} for `{contract}` was broadcast but its confirmation was \
         interrupted; verify on-chain before redeploying"
    )]
    AmbiguousOutcome { contract: String, tx_hash: TxHash },

    #[error("deployment of `{contract}` was cancelled before submission")]
    Cancelled { contract: String },

    #[error("creation transaction {tx_hash} for `{contract}` was included but reverted")]
    Reverted { contract: String, tx_hash: TxHash },
}

impl DeployError {
    pub fn outcome(&self) -> Outcome {
        match self {
            DeployError::ConfirmationTimeout { .. } | DeployError::AmbiguousOutcome { .. } => {
                Outcome::Ambiguous
            }
            _ => Outcome::Failed,
        }
    }

    /// The submitted transaction hash, if the failure happened after submission.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            DeployError::ConfirmationTimeout { tx_hash, .. }
            | DeployError::AmbiguousOutcome { tx_hash, .. }
            | DeployError::Reverted { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }

    pub(crate) fn submission(contract: &str, source: impl Into<SubmissionFailure>) -> Self {
        DeployError::Submission {
            contract: contract.to_string(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_and_interruption_are_ambiguous() {
        let timeout = DeployError::ConfirmationTimeout {
            contract: "Bidding".to_string(),
            tx_hash: TxHash::repeat_byte(0xab),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(timeout.outcome(), Outcome::Ambiguous);
        assert_eq!(timeout.tx_hash(), Some(TxHash::repeat_byte(0xab)));

        let interrupted = DeployError::AmbiguousOutcome {
            contract: "Bidding".to_string(),
            tx_hash: TxHash::repeat_byte(0x01),
        };
        assert_eq!(interrupted.outcome(), Outcome::Ambiguous);
        assert_eq!(interrupted.outcome().exit_code(), 2);
    }

    #[test]
    fn test_configuration_defects_fail_outright() {
        let err = DeployError::UnknownNetwork {
            network: "mainnet".to_string(),
            registered: "amoy".to_string(),
        };
        assert_eq!(err.outcome(), Outcome::Failed);
        assert_eq!(err.outcome().exit_code(), 1);
        assert!(err.tx_hash().is_none());

        let err: DeployError = CredentialError::Missing {
            variable: "PRIVATE_KEY".to_string(),
        }
        .into();
        assert_eq!(err.outcome(), Outcome::Failed);
        assert!(err.to_string().contains("PRIVATE_KEY"));
    }

    #[test]
    fn test_rpc_errors_classify_into_submission_failures() {
        let rejected = RpcError::Node {
            method: "eth_sendRawTransaction".to_string(),
            code: -32000,
            message: "nonce too low".to_string(),
        };
        assert!(!rejected.is_insufficient_funds());
        assert!(matches!(
            SubmissionFailure::from(rejected),
            SubmissionFailure::Rejected(_)
        ));

        let broke = RpcError::Node {
            method: "eth_sendRawTransaction".to_string(),
            code: -32000,
            message: "Insufficient funds for gas * price + value".to_string(),
        };
        assert!(broke.is_insufficient_funds());
        assert!(matches!(
            SubmissionFailure::from(broke),
            SubmissionFailure::InsufficientFunds(_)
        ));
    }

    #[test]
    fn test_transport_failures_track_delivery() {
        let refused = RpcError::Transport {
            url: "http://127.0.0.1:8545".to_string(),
            request_sent: false,
            source: "connection refused".into(),
        };
        assert!(!refused.is_response_lost());

        let timed_out = RpcError::Transport {
            url: "http://127.0.0.1:8545".to_string(),
            request_sent: true,
            source: "operation timed out".into(),
        };
        assert!(timed_out.is_response_lost());
        assert!(matches!(
            SubmissionFailure::from(timed_out),
            SubmissionFailure::Unreachable(_)
        ));
    }
}
