//! Creation transaction construction and signing.

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_core::primitives::{Address, Bytes, TxHash, TxKind, U256};
use alloy_eips::eip2718::Encodable2718;
use alloy_network::TxSigner;
use alloy_signer_local::PrivateKeySigner;

use crate::error::SubmissionFailure;

/// Unsigned contract creation transaction (EIP-155 legacy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    /// Creation code followed by the encoded constructor arguments.
    pub input: Bytes,
}

/// A signed creation transaction, ready to broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCreation {
    pub raw: Bytes,
    pub hash: TxHash,
    pub sender: Address,
    /// Address the contract will get if this transaction is included.
    pub expected_address: Address,
}

impl CreationTransaction {
    /// Worst-case cost of the transaction in wei.
    pub fn max_cost(&self) -> U256 {
        U256::from(self.gas_price) * U256::from(self.gas_limit)
    }

    pub async fn sign(self, signer: &PrivateKeySigner) -> Result<SignedCreation, SubmissionFailure> {
        let sender = signer.address();
        let mut tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            to: TxKind::Create,
            value: U256::ZERO,
            input: self.input,
        };

        let signature = signer
            .sign_transaction(&mut tx)
            .await
            .map_err(|e| SubmissionFailure::Signing(e.to_string()))?;

        let envelope = TxEnvelope::Legacy(tx.into_signed(signature));

        Ok(SignedCreation {
            raw: envelope.encoded_2718().into(),
            hash: *envelope.tx_hash(),
            sender,
            expected_address: sender.create(self.nonce),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn creation(nonce: u64) -> CreationTransaction {
        CreationTransaction {
            chain_id: 80002,
            nonce,
            gas_price: 30_000_000_000,
            gas_limit: 500_000,
            input: Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52]),
        }
    }

    #[test]
    fn test_max_cost() {
        assert_eq!(creation(0).max_cost(), U256::from(15_000_000_000_000_000u128));
    }

    #[tokio::test]
    async fn test_sign_creation() {
        let signer: PrivateKeySigner = DEV_KEY.parse().unwrap();
        let signed = creation(0).sign(&signer).await.unwrap();

        assert_eq!(signed.sender, signer.address());
        // First contract created by the well-known dev account.
        assert_eq!(
            signed.expected_address,
            "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse::<Address>().unwrap()
        );
        // Legacy transactions are RLP lists with no type prefix.
        assert!(signed.raw[0] >= 0xc0);
        assert_eq!(signed.hash, alloy_core::primitives::keccak256(&signed.raw));
    }

    #[tokio::test]
    async fn test_nonce_changes_expected_address() {
        let signer: PrivateKeySigner = DEV_KEY.parse().unwrap();
        let first = creation(0).sign(&signer).await.unwrap();
        let second = creation(1).sign(&signer).await.unwrap();

        assert_ne!(first.expected_address, second.expected_address);
        assert_ne!(first.hash, second.hash);
    }
}
