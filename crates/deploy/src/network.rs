//! Network profile registry.
//!
//! Profiles are built once from [`DeployConfig`] and an [`Environment`] snapshot and
//! are read-only afterwards. Credential failures are recorded per network at build time
//! and surface only when that network is resolved, so a broken profile never blocks
//! deployments to the others.

use std::collections::BTreeMap;

use alloy_core::primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use url::Url;

use crate::{
    config::{DeployConfig, Environment, NetworkConfig},
    credentials::CredentialLoader,
    error::{CredentialError, DeployError},
};

/// Connection and signing parameters for one network.
#[derive(Clone)]
pub struct NetworkProfile {
    identifier: String,
    endpoint: Url,
    chain_id: Option<u64>,
    signers: Vec<PrivateKeySigner>,
}

impl NetworkProfile {
    /// Build a profile. `signers` must contain at least one key.
    pub fn new(
        identifier: impl Into<String>,
        endpoint: Url,
        chain_id: Option<u64>,
        signers: Vec<PrivateKeySigner>,
    ) -> Result<Self, DeployError> {
        let identifier = identifier.into();
        if signers.is_empty() {
            return Err(DeployError::InvalidNetwork {
                network: identifier,
                reason: "no signer credentials configured".to_string(),
            });
        }

        Ok(Self {
            identifier,
            endpoint,
            chain_id,
            signers,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    /// The signer used for creation transactions.
    pub fn primary_signer(&self) -> &PrivateKeySigner {
        &self.signers[0]
    }

    pub fn signer_addresses(&self) -> Vec<Address> {
        self.signers.iter().map(|s| s.address()).collect()
    }
}

impl std::fmt::Debug for NetworkProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkProfile")
            .field("identifier", &self.identifier)
            .field("endpoint", &self.endpoint.as_str())
            .field("chain_id", &self.chain_id)
            .field("signers", &self.signer_addresses())
            .finish()
    }
}

#[derive(Debug)]
enum RegistryEntry {
    Ready(NetworkProfile),
    CredentialUnavailable(CredentialError),
}

/// Read-only mapping from network identifier to [`NetworkProfile`].
#[derive(Debug, Default)]
pub struct NetworkRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl NetworkRegistry {
    /// Build the registry from the configured networks, loading every signer credential.
    ///
    /// Fails only on structural defects such as a malformed endpoint URL or an empty
    /// account list.
    pub fn from_config(config: &DeployConfig, env: &Environment) -> Result<Self, DeployError> {
        let loader = CredentialLoader::new(env);
        let mut entries = BTreeMap::new();

        for (identifier, network) in &config.networks {
            let entry = Self::build_entry(identifier, network, &loader)?;
            entries.insert(identifier.clone(), entry);
        }

        tracing::debug!(networks = ?entries.keys().collect::<Vec<_>>(), "Network registry built");
        Ok(Self { entries })
    }

    fn build_entry(
        identifier: &str,
        network: &NetworkConfig,
        loader: &CredentialLoader<'_>,
    ) -> Result<RegistryEntry, DeployError> {
        let endpoint = Url::parse(&network.url).map_err(|e| DeployError::InvalidNetwork {
            network: identifier.to_string(),
            reason: format!("invalid endpoint URL `{}`: {}", network.url, e),
        })?;

        if network.accounts.is_empty() {
            return Err(DeployError::InvalidNetwork {
                network: identifier.to_string(),
                reason: "no signer accounts configured".to_string(),
            });
        }

        let mut signers = Vec::with_capacity(network.accounts.len());
        for variable in &network.accounts {
            match load_signer(loader, variable) {
                Ok(signer) => signers.push(signer),
                Err(err) => {
                    tracing::debug!(network = identifier, error = %err, "Signer credential unavailable");
                    return Ok(RegistryEntry::CredentialUnavailable(err));
                }
            }
        }

        let profile = NetworkProfile::new(identifier, endpoint, network.chain_id, signers)?;
        Ok(RegistryEntry::Ready(profile))
    }

    /// Register a ready-made profile, replacing any existing one with the same identifier.
    pub fn with_profile(mut self, profile: NetworkProfile) -> Self {
        self.entries
            .insert(profile.identifier.clone(), RegistryEntry::Ready(profile));
        self
    }

    /// Look up the profile for `identifier`.
    pub fn resolve_profile(&self, identifier: &str) -> Result<&NetworkProfile, DeployError> {
        match self.entries.get(identifier) {
            Some(RegistryEntry::Ready(profile)) => Ok(profile),
            Some(RegistryEntry::CredentialUnavailable(err)) => {
                Err(DeployError::InvalidCredential {
                    network: identifier.to_string(),
                    source: err.clone(),
                })
            }
            None => Err(DeployError::UnknownNetwork {
                network: identifier.to_string(),
                registered: self.identifiers().join(", "),
            }),
        }
    }

    pub fn identifiers(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Whether `identifier` is registered with all credentials loaded.
    pub fn is_ready(&self, identifier: &str) -> bool {
        matches!(self.entries.get(identifier), Some(RegistryEntry::Ready(_)))
    }
}

fn load_signer(
    loader: &CredentialLoader<'_>,
    variable: &str,
) -> Result<PrivateKeySigner, CredentialError> {
    let secret = loader.load_credential(variable)?;
    secret
        .expose()
        .parse::<PrivateKeySigner>()
        .map_err(|e| CredentialError::Malformed {
            variable: variable.to_string(),
            reason: e.to_string(),
        })
}
