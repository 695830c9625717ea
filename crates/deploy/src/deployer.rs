//! Deployment orchestration: resolve, submit, await confirmation, report.
//!
//! Every failure is terminal for the invocation. Nothing here retries a submission:
//! a creation transaction that is retried without knowing whether the first one
//! landed can deploy the contract twice.

use std::{future::Future, pin::Pin};

use alloy_core::primitives::{Address, Bytes, TxHash};
use alloy_signer_local::PrivateKeySigner;
use serde::Serialize;

use crate::{
    artifact::{ArtifactRegistry, ContractFactory},
    client::{ChainClient, ChainConnector},
    config::{ConfirmationConfig, GasConfig},
    confirmation::wait_for_receipt,
    error::{DeployError, SubmissionFailure},
    network::{NetworkProfile, NetworkRegistry},
    transaction::{CreationTransaction, SignedCreation},
};

/// Stages of one deployment invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum DeploymentStage {
    Resolving,
    Submitting,
    AwaitingConfirmation,
    Reporting,
    Failed,
}

/// One contract creation against one network.
pub struct DeploymentRequest<'a> {
    pub factory: &'a dyn ContractFactory,
    pub profile: &'a NetworkProfile,
    /// Constructor arguments in textual form, coerced against the constructor ABI.
    pub constructor_arguments: Vec<String>,
}

/// The confirmed result of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentResult {
    pub contract_name: String,
    pub network: String,
    pub contract_address: Address,
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    pub confirmed: bool,
}

impl std::fmt::Display for DeploymentResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} deployed to: {}", self.contract_name, self.contract_address)
    }
}

/// Drives a deployment through [`DeploymentStage`]s.
///
/// Registries are borrowed read-only; the connector opens a chain client per deployment.
pub struct Deployer<'a, N> {
    networks: &'a NetworkRegistry,
    artifacts: &'a ArtifactRegistry,
    connector: N,
    confirmation: ConfirmationConfig,
    gas: GasConfig,
}

impl<'a, N: ChainConnector> Deployer<'a, N> {
    pub fn new(networks: &'a NetworkRegistry, artifacts: &'a ArtifactRegistry, connector: N) -> Self {
        Self {
            networks,
            artifacts,
            connector,
            confirmation: ConfirmationConfig::default(),
            gas: GasConfig::default(),
        }
    }

    pub fn confirmation(mut self, confirmation: ConfirmationConfig) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn gas(mut self, gas: GasConfig) -> Self {
        self.gas = gas;
        self
    }

    /// Resolve `contract_name` and `network` and deploy.
    pub async fn deploy_by_name(
        &self,
        contract_name: &str,
        network: &str,
        constructor_arguments: Vec<String>,
    ) -> Result<DeploymentResult, DeployError> {
        self.deploy_by_name_until(contract_name, network, constructor_arguments, std::future::pending())
            .await
    }

    /// [`Self::deploy_by_name`], aborting when `cancel` completes.
    pub async fn deploy_by_name_until<F>(
        &self,
        contract_name: &str,
        network: &str,
        constructor_arguments: Vec<String>,
        cancel: F,
    ) -> Result<DeploymentResult, DeployError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            stage = %DeploymentStage::Resolving,
            contract = contract_name,
            network,
            "Resolving deployment target..."
        );

        let resolved = self
            .artifacts
            .resolve_artifact(contract_name)
            .and_then(|factory| Ok((factory, self.networks.resolve_profile(network)?)));

        let (factory, profile) = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                log_failure(contract_name, network, &err);
                return Err(err);
            }
        };

        let request = DeploymentRequest {
            factory,
            profile,
            constructor_arguments,
        };

        self.deploy_until(request, cancel).await
    }

    /// Deploy an already resolved request.
    pub async fn deploy(&self, request: DeploymentRequest<'_>) -> Result<DeploymentResult, DeployError> {
        self.deploy_until(request, std::future::pending()).await
    }

    /// [`Self::deploy`], aborting when `cancel` completes.
    ///
    /// Cancellation before the transaction is broadcast yields [`DeployError::Cancelled`].
    /// Once broadcast, it can only stop the wait and yields [`DeployError::AmbiguousOutcome`].
    pub async fn deploy_until<F>(
        &self,
        request: DeploymentRequest<'_>,
        cancel: F,
    ) -> Result<DeploymentResult, DeployError>
    where
        F: Future<Output = ()>,
    {
        let contract = request.factory.name().to_string();
        let network = request.profile.identifier().to_string();

        let cancel = std::pin::pin!(cancel);
        let result = self.run(request, cancel).await;

        match &result {
            Ok(deployment) => {
                tracing::info!(
                    stage = %DeploymentStage::Reporting,
                    contract = %deployment.contract_name,
                    network = %deployment.network,
                    address = %deployment.contract_address,
                    tx_hash = %deployment.transaction_hash,
                    block = ?deployment.block_number,
                    "{}",
                    deployment
                );
            }
            Err(err) => log_failure(&contract, &network, err),
        }

        result
    }

    async fn run<F>(
        &self,
        request: DeploymentRequest<'_>,
        mut cancel: Pin<&mut F>,
    ) -> Result<DeploymentResult, DeployError>
    where
        F: Future<Output = ()>,
    {
        let contract = request.factory.name().to_string();
        let profile = request.profile;

        tracing::info!(
            stage = %DeploymentStage::Submitting,
            contract = %contract,
            network = profile.identifier(),
            endpoint = %profile.endpoint(),
            args = request.constructor_arguments.len(),
            "Building creation transaction..."
        );

        let input = request
            .factory
            .creation_code(&request.constructor_arguments)
            .map_err(|e| DeployError::submission(&contract, e))?;

        let client = self
            .connector
            .connect(profile)
            .map_err(|e| DeployError::submission(&contract, e))?;

        let signer = profile.primary_signer();
        let prepared = tokio::select! {
            biased;
            _ = cancel.as_mut() => return Err(DeployError::Cancelled { contract }),
            prepared = self.prepare(&client, profile, signer, input) => prepared,
        };
        let signed = prepared.map_err(|e| DeployError::submission(&contract, e))?;

        tracing::debug!(
            sender = %signed.sender,
            expected_address = %signed.expected_address,
            tx_hash = %signed.hash,
            "Broadcasting creation transaction..."
        );

        // From here on the transaction may exist on-chain.
        let tx_hash = match client.send_raw_transaction(&signed.raw).await {
            Ok(tx_hash) => tx_hash,
            Err(e) if e.is_response_lost() => {
                tracing::warn!(
                    tx_hash = %signed.hash,
                    error = %e,
                    "No response to the broadcast, the transaction may have been accepted"
                );
                return Err(DeployError::AmbiguousOutcome {
                    contract,
                    tx_hash: signed.hash,
                });
            }
            Err(e) => return Err(DeployError::submission(&contract, e)),
        };

        if tx_hash != signed.hash {
            tracing::warn!(
                returned = %tx_hash,
                computed = %signed.hash,
                "Endpoint returned an unexpected transaction hash"
            );
        }

        tracing::info!(
            stage = %DeploymentStage::AwaitingConfirmation,
            contract = %contract,
            %tx_hash,
            timeout = ?self.confirmation.timeout(),
            "Waiting for creation transaction to be included..."
        );

        let receipt = tokio::select! {
            biased;
            _ = cancel.as_mut() => {
                return Err(DeployError::AmbiguousOutcome { contract, tx_hash });
            }
            receipt = wait_for_receipt(&client, tx_hash, &self.confirmation) => receipt,
        };

        let Some(receipt) = receipt else {
            return Err(DeployError::ConfirmationTimeout {
                contract,
                tx_hash,
                timeout: self.confirmation.timeout(),
            });
        };

        let contract_address = match receipt.contract_address {
            Some(address) if receipt.succeeded() => address,
            _ => return Err(DeployError::Reverted { contract, tx_hash }),
        };

        if contract_address != signed.expected_address {
            tracing::warn!(
                %contract_address,
                expected = %signed.expected_address,
                "Contract address differs from the one derived from sender and nonce"
            );
        }

        Ok(DeploymentResult {
            contract_name: contract,
            network: profile.identifier().to_string(),
            contract_address,
            transaction_hash: tx_hash,
            block_number: receipt.block_number(),
            confirmed: true,
        })
    }

    /// Fetch chain parameters, check the signer can pay, and sign.
    async fn prepare<C: ChainClient>(
        &self,
        client: &C,
        profile: &NetworkProfile,
        signer: &PrivateKeySigner,
        input: Bytes,
    ) -> Result<SignedCreation, SubmissionFailure> {
        let sender = signer.address();

        let chain_id = match profile.chain_id() {
            Some(chain_id) => chain_id,
            None => client.chain_id().await?,
        };
        let nonce = client.transaction_count(sender).await?;
        let gas_price = client.gas_price().await?;
        let estimate = client.estimate_gas(sender, &input).await?;

        let tx = CreationTransaction {
            chain_id,
            nonce,
            gas_price,
            gas_limit: self.gas.apply(estimate),
            input,
        };

        let available = client.balance(sender).await?;
        let required = tx.max_cost();
        if available < required {
            return Err(SubmissionFailure::InsufficientFunds(format!(
                "{} wei required, {} wei available to {}",
                required, available, sender
            )));
        }

        tracing::debug!(
            %sender,
            chain_id,
            nonce,
            gas_price,
            gas_limit = tx.gas_limit,
            "Signing creation transaction..."
        );

        tx.sign(signer).await
    }
}

fn log_failure(contract: &str, network: &str, err: &DeployError) {
    tracing::error!(
        stage = %DeploymentStage::Failed,
        outcome = %err.outcome(),
        contract,
        network,
        tx_hash = ?err.tx_hash(),
        error = %err,
        "Deployment failed"
    );
}
