use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shipwright_deploy::CONFIG_FILENAME;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "shipwright")]
#[command(
    author,
    version,
    about = "Deploy compiled smart contracts to EVM networks"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "SHIPWRIGHT_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file, or a directory containing one.
    ///
    /// A missing file is not an error: built-in defaults are used instead.
    #[arg(short, long, global = true, env = "SHIPWRIGHT_CONFIG", default_value = CONFIG_FILENAME)]
    pub config: PathBuf,

    /// Path to a dotenv file holding signer credentials.
    ///
    /// If not provided, `./.env` is read when it exists. Variables already set in the
    /// process environment take precedence.
    #[arg(long, global = true, env = "SHIPWRIGHT_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Deploy a contract and print its address once the creation is confirmed.
    Deploy(DeployArgs),

    /// List configured networks and available contract artifacts.
    List,

    /// Write a configuration file with the default settings.
    Init {
        /// Where to write the configuration.
        #[arg(default_value = CONFIG_FILENAME)]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct DeployArgs {
    /// The contract to deploy, by name or as `path/To.sol:Name`.
    ///
    /// Defaults to `default_contract` from the configuration.
    pub contract: Option<String>,

    /// Constructor arguments, in declaration order.
    #[arg(last = true)]
    pub args: Vec<String>,

    /// The network to deploy to.
    ///
    /// Defaults to `default_network` from the configuration.
    #[arg(short, long)]
    pub network: Option<String>,

    /// Override the artifacts directory.
    #[arg(long, alias = "artifacts-dir")]
    pub artifacts: Option<PathBuf>,

    /// Override the confirmation timeout, in seconds.
    #[arg(long, alias = "timeout")]
    pub confirmation_timeout: Option<u64>,

    /// Print the result as JSON on stdout instead of the summary line.
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_defaults() {
        let cli = Cli::try_parse_from(["shipwright", "deploy"]).unwrap();
        let Command::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert!(args.contract.is_none());
        assert!(args.network.is_none());
        assert!(args.args.is_empty());
        assert_eq!(cli.config, PathBuf::from(CONFIG_FILENAME));
    }

    #[test]
    fn test_deploy_with_constructor_args() {
        let cli = Cli::try_parse_from([
            "shipwright",
            "deploy",
            "Bidding",
            "--network",
            "amoy",
            "--",
            "1000",
            "0x5FbDB2315678afecb367f032d93F642f64180aa3",
        ])
        .unwrap();
        let Command::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert_eq!(args.contract.as_deref(), Some("Bidding"));
        assert_eq!(args.network.as_deref(), Some("amoy"));
        assert_eq!(args.args.len(), 2);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["shipwright", "list", "--config", "deploy/Shipwright.toml"])
            .unwrap();
        assert!(matches!(cli.command, Command::List));
        assert_eq!(cli.config, PathBuf::from("deploy/Shipwright.toml"));
    }
}
