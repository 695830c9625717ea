//! Process-wide configuration: the deployment config file and the environment snapshot.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result, bail};
use derive_more::Deref;
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
    value::Value,
};
use serde::{Deserialize, Serialize};

/// The default name for the shipwright configuration file.
pub const CONFIG_FILENAME: &str = "Shipwright.toml";

/// Prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "SHIPWRIGHT_";

/// Default network identifier.
pub const DEFAULT_NETWORK: &str = "amoy";
/// Default RPC endpoint of the default network.
pub const DEFAULT_NETWORK_URL: &str = "https://rpc-amoy.polygon.technology";
/// Default name of the credential entry holding the signer's private key.
pub const DEFAULT_CREDENTIAL_VARIABLE: &str = "PRIVATE_KEY";
/// Default contract to deploy.
pub const DEFAULT_CONTRACT: &str = "Bidding";
/// Default directory holding compiled contract artifacts.
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// Connection parameters for one network, as written in the config file.
///
/// `accounts` lists the *names* of credential entries, never the keys themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// The JSON-RPC endpoint URL.
    pub url: String,
    /// Names of the environment entries holding signer private keys, primary first.
    #[serde(default)]
    pub accounts: Vec<String>,
    /// The chain ID. Queried from the endpoint when not provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

/// Confirmation polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Maximum time to wait for the creation receipt, in seconds.
    pub timeout_secs: u64,
    /// Delay before the first receipt poll, in milliseconds.
    pub min_poll_interval_ms: u64,
    /// Upper bound of the exponential poll delay, in milliseconds.
    pub max_poll_interval_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            min_poll_interval_ms: 1_000,
            max_poll_interval_ms: 15_000,
        }
    }
}

impl ConfirmationConfig {
    /// Floor applied to the receipt poll delay.
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Reject a zero timeout or a zero poll interval.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("confirmation.timeout_secs must be greater than zero");
        }
        if self.min_poll_interval_ms == 0 {
            bail!("confirmation.min_poll_interval_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Never below [`Self::MIN_POLL_INTERVAL`].
    pub fn min_poll_interval(&self) -> Duration {
        Duration::from_millis(self.min_poll_interval_ms).max(Self::MIN_POLL_INTERVAL)
    }

    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms).max(self.min_poll_interval())
    }
}

/// Gas settings for creation transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Percentage applied to the node's gas estimate (120 = +20% headroom).
    pub estimate_multiplier_percent: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            estimate_multiplier_percent: 120,
        }
    }
}

impl GasConfig {
    pub fn apply(&self, estimate: u64) -> u64 {
        let scaled = u128::from(estimate) * u128::from(self.estimate_multiplier_percent.max(100)) / 100;
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }
}

/// Deployment configuration, layered from defaults, the config file and `SHIPWRIGHT_*` variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Network used when none is given on the command line.
    pub default_network: String,
    /// Contract deployed when none is given on the command line.
    pub default_contract: String,
    /// Root directory of the compiled artifacts.
    pub artifacts_dir: PathBuf,
    /// Network profiles keyed by identifier.
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Library addresses used to link artifacts, keyed by library name.
    pub libraries: BTreeMap<String, Address>,
    pub confirmation: ConfirmationConfig,
    pub gas: GasConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(
            DEFAULT_NETWORK.to_string(),
            NetworkConfig {
                url: DEFAULT_NETWORK_URL.to_string(),
                accounts: vec![DEFAULT_CREDENTIAL_VARIABLE.to_string()],
                chain_id: None,
            },
        );

        Self {
            default_network: DEFAULT_NETWORK.to_string(),
            default_contract: DEFAULT_CONTRACT.to_string(),
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            networks,
            libraries: BTreeMap::new(),
            confirmation: ConfirmationConfig::default(),
            gas: GasConfig::default(),
        }
    }
}

impl DeployConfig {
    /// Build the layered figment: defaults, then the TOML file (if present), then the
    /// `SHIPWRIGHT_*` entries of `env`.
    pub fn figment(path: &Path, env: &Environment) -> Figment {
        Figment::from(Serialized::defaults(DeployConfig::default()))
            .merge(Toml::file(path))
            .merge(env.overrides())
    }

    /// Load the configuration from a file path or a directory containing [`CONFIG_FILENAME`].
    pub fn load(path: &Path, env: &Environment) -> Result<Self> {
        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        if !config_path.exists() {
            tracing::debug!(
                path = %config_path.display(),
                "No configuration file found, using defaults"
            );
        }

        let config: Self = Self::figment(&config_path, env)
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
        config
            .confirmation
            .validate()
            .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

        tracing::debug!(
            path = %config_path.display(),
            networks = config.networks.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}

/// Snapshot of the key-value configuration state available to the process.
///
/// Built once at process entry from the environment plus an optional `.env` file,
/// then passed by reference. Values already set in the process environment win
/// over the `.env` file.
#[derive(Clone, Default, Deref)]
pub struct Environment(HashMap<String, String>);

impl Environment {
    /// Snapshot the process environment, filling gaps from `env_file` (or `./.env` when `None`).
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        let mut vars: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();

        let dotenv = match env_file {
            Some(path) => Some(
                dotenvy::from_path_iter(path)
                    .with_context(|| format!("Failed to read env file {}", path.display()))?,
            ),
            None => match dotenvy::dotenv_iter() {
                Ok(iter) => Some(iter),
                Err(e) if e.not_found() => None,
                Err(e) => return Err(e).context("Failed to read .env file"),
            },
        };

        if let Some(iter) = dotenv {
            for item in iter {
                let (key, value) = item.context("Failed to parse .env entry")?;
                vars.entry(key).or_insert(value);
            }
        }

        Ok(Self(vars))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// `SHIPWRIGHT_*` entries as a figment layer. `__` separates nested keys, so
    /// `SHIPWRIGHT_CONFIRMATION__TIMEOUT_SECS` sets `confirmation.timeout_secs`.
    fn overrides(&self) -> Figment {
        let mut entries: Vec<_> = self
            .0
            .iter()
            .filter_map(|(key, value)| {
                let key = key.strip_prefix(ENV_PREFIX)?;
                (!key.is_empty()).then(|| (key.to_lowercase().replace("__", "."), value))
            })
            .collect();
        entries.sort();

        entries
            .into_iter()
            .fold(Figment::new(), |figment, (key, raw)| {
                let value = raw
                    .parse::<Value>()
                    .unwrap_or_else(|_| Value::from(raw.clone()));
                figment.merge(Serialized::default(&key, value))
            })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("entries", &self.0.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_targets_amoy() {
        let config = DeployConfig::default();
        assert_eq!(config.default_network, "amoy");
        assert_eq!(config.default_contract, "Bidding");

        let amoy = &config.networks["amoy"];
        assert_eq!(amoy.url, "https://rpc-amoy.polygon.technology");
        assert_eq!(amoy.accounts, vec!["PRIVATE_KEY".to_string()]);
        assert_eq!(config.confirmation.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let toml = r#"
            default_network = "sepolia"

            [networks.sepolia]
            url = "https://ethereum-sepolia-rpc.publicnode.com"
            accounts = ["SEPOLIA_KEY"]
            chain_id = 11155111

            [libraries]
            BidMath = "0x00000000000000000000000000000000000000aa"

            [confirmation]
            timeout_secs = 60
        "#;

        let config: DeployConfig = Figment::from(Serialized::defaults(DeployConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();

        assert_eq!(config.default_network, "sepolia");
        assert_eq!(config.networks["sepolia"].chain_id, Some(11155111));
        assert!(config.networks.contains_key("amoy"));
        assert_eq!(config.confirmation.timeout_secs, 60);
        assert_eq!(config.confirmation.min_poll_interval_ms, 1_000);
        assert_eq!(
            config.libraries["BidMath"],
            "0x00000000000000000000000000000000000000aa".parse::<Address>().unwrap()
        );
    }

    #[test]
    fn test_config_roundtrips_through_file() {
        let dir = tempdir::TempDir::new("shipwright-config").unwrap();
        let path = dir.path().join(CONFIG_FILENAME);

        let mut config = DeployConfig::default();
        config.confirmation.timeout_secs = 42;
        config.save_to_file(&path).unwrap();

        let loaded = DeployConfig::load(dir.path(), &Environment::default()).unwrap();
        assert_eq!(loaded.confirmation.timeout_secs, 42);
        assert_eq!(loaded.networks, config.networks);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempdir::TempDir::new("shipwright-config").unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "default_network = \"sepolia\"\n\n[confirmation]\ntimeout_secs = 60\n")
            .unwrap();

        let env = Environment::from_iter([
            ("SHIPWRIGHT_DEFAULT_NETWORK", "local"),
            ("SHIPWRIGHT_CONFIRMATION__TIMEOUT_SECS", "90"),
            ("PRIVATE_KEY", "0xabc"),
        ]);
        let config = DeployConfig::load(&path, &env).unwrap();

        assert_eq!(config.default_network, "local");
        assert_eq!(config.confirmation.timeout_secs, 90);
        assert_eq!(config.confirmation.min_poll_interval_ms, 1_000);
    }

    #[test]
    fn test_zero_confirmation_settings_are_rejected() {
        let dir = tempdir::TempDir::new("shipwright-config").unwrap();
        let path = dir.path().join(CONFIG_FILENAME);

        std::fs::write(&path, "[confirmation]\ntimeout_secs = 0\n").unwrap();
        let err = DeployConfig::load(&path, &Environment::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("timeout_secs"));

        std::fs::write(&path, "[confirmation]\nmin_poll_interval_ms = 0\n").unwrap();
        let err = DeployConfig::load(&path, &Environment::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("min_poll_interval_ms"));
    }

    #[test]
    fn test_poll_interval_has_a_floor() {
        let confirmation = ConfirmationConfig {
            timeout_secs: 1,
            min_poll_interval_ms: 0,
            max_poll_interval_ms: 0,
        };
        assert_eq!(confirmation.min_poll_interval(), ConfirmationConfig::MIN_POLL_INTERVAL);
        assert_eq!(confirmation.max_poll_interval(), ConfirmationConfig::MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_gas_multiplier() {
        let gas = GasConfig::default();
        assert_eq!(gas.apply(100_000), 120_000);

        let below_one = GasConfig {
            estimate_multiplier_percent: 50,
        };
        assert_eq!(below_one.apply(100_000), 100_000);
    }

    #[test]
    fn test_env_file_does_not_override_process_values() {
        let dir = tempdir::TempDir::new("shipwright-env").unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "SHIPWRIGHT_TEST_ONLY_FROM_FILE=from-file\nPATH=overridden\n").unwrap();

        let env = Environment::load(Some(&path)).unwrap();
        assert_eq!(env.get("SHIPWRIGHT_TEST_ONLY_FROM_FILE"), Some("from-file"));
        assert_ne!(env.get("PATH"), Some("overridden"));
    }
}
