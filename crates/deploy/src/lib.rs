//! shipwright-deploy - Smart contract deployment library.
//!
//! This crate resolves a target network and its signing credentials, looks up a
//! compiled contract artifact, submits the creation transaction and waits for it
//! to be confirmed before reporting the deployed address.

pub mod artifact;
pub use artifact::{ArtifactRegistry, CompiledContract, ContractArtifact, ContractFactory};

mod client;
pub use client::{ChainClient, ChainConnector, CreationReceipt, HttpConnector, JsonRpcClient};

mod config;
pub use config::{
    CONFIG_FILENAME, ConfirmationConfig, DEFAULT_ARTIFACTS_DIR, DEFAULT_CONTRACT,
    DEFAULT_CREDENTIAL_VARIABLE, DEFAULT_NETWORK, DEFAULT_NETWORK_URL, DeployConfig, ENV_PREFIX,
    Environment, GasConfig, NetworkConfig,
};

mod confirmation;
pub use confirmation::wait_for_receipt;

mod credentials;
pub use credentials::{CredentialLoader, Secret};

mod deployer;
pub use deployer::{Deployer, DeploymentRequest, DeploymentResult, DeploymentStage};

mod error;
pub use error::{CredentialError, DeployError, Outcome, RpcError, SubmissionFailure};

pub mod mock;

mod network;
pub use network::{NetworkProfile, NetworkRegistry};

pub mod rpc;

mod transaction;
pub use transaction::{CreationTransaction, SignedCreation};
