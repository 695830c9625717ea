//! shipwright is a CLI tool to deploy compiled smart contracts to EVM networks.

mod cli;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;

use cli::{Cli, Command, DeployArgs};
use shipwright_deploy::{
    ArtifactRegistry, DeployConfig, DeployError, Deployer, Environment, HttpConnector,
    NetworkRegistry, Outcome,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize the logger. Stdout is reserved for the deployment report.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let deploy_error = err.downcast_ref::<DeployError>();
            let outcome = deploy_error.map_or(Outcome::Failed, DeployError::outcome);

            // The error chain carries the transaction hash when the outcome is ambiguous.
            eprintln!("Error: {:?}", err);

            ExitCode::from(outcome.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init { path, force } => init(&path, force),
        Command::List => {
            let env = Environment::load(cli.env_file.as_deref())?;
            let config = DeployConfig::load(&cli.config, &env)?;
            list(&config, &env)
        }
        Command::Deploy(args) => {
            let env = Environment::load(cli.env_file.as_deref())?;
            let config = DeployConfig::load(&cli.config, &env)?;
            deploy(config, &env, args).await
        }
    }
}

async fn deploy(mut config: DeployConfig, env: &Environment, args: DeployArgs) -> Result<()> {
    if let Some(artifacts) = args.artifacts {
        config.artifacts_dir = artifacts;
    }
    if let Some(timeout_secs) = args.confirmation_timeout {
        config.confirmation.timeout_secs = timeout_secs;
        config.confirmation.validate()?;
    }

    let contract = args.contract.unwrap_or_else(|| config.default_contract.clone());
    let network = args.network.unwrap_or_else(|| config.default_network.clone());

    let networks = NetworkRegistry::from_config(&config, env)?;
    let artifacts = ArtifactRegistry::load(&config.artifacts_dir, &config.libraries)?;

    let deployer = Deployer::new(&networks, &artifacts, HttpConnector::default())
        .confirmation(config.confirmation)
        .gas(config.gas);

    let deployment = deployer
        .deploy_by_name_until(&contract, &network, args.args, interrupted())
        .await?;

    if args.json {
        let json = serde_json::to_string_pretty(&deployment)
            .context("Failed to serialize deployment result")?;
        println!("{}", json);
    } else {
        println!("{}", deployment);
    }

    Ok(())
}

fn list(config: &DeployConfig, env: &Environment) -> Result<()> {
    let networks = NetworkRegistry::from_config(config, env)?;
    let artifacts = ArtifactRegistry::load(&config.artifacts_dir, &config.libraries)?;

    let mut table = Table::new();
    table.set_header(vec!["Network", "Endpoint", "Chain ID", "Signer"]);
    for (identifier, network) in &config.networks {
        let signer = match networks.resolve_profile(identifier) {
            Ok(profile) => profile.primary_signer().address().to_string(),
            Err(err) => format!("unavailable: {}", err),
        };
        let chain_id = network
            .chain_id
            .map_or_else(|| "from endpoint".to_string(), |id| id.to_string());
        table.add_row(vec![identifier.clone(), network.url.clone(), chain_id, signer]);
    }
    println!("{table}");

    let mut table = Table::new();
    table.set_header(vec!["Contract", "Constructor args", "Functions"]);
    for factory in artifacts.factories() {
        let artifact = factory.artifact();
        table.add_row(vec![
            artifact.qualified_name.clone(),
            artifact.constructor_arity().to_string(),
            artifact.signatures().len().to_string(),
        ]);
    }
    println!("{table}");

    let skipped = artifacts.qualified_names().len() - artifacts.factories().count();
    if skipped > 0 {
        tracing::warn!(skipped, "Some artifacts could not be loaded, deploy them by name to see why");
    }

    Ok(())
}

fn init(path: &std::path::Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        );
    }

    DeployConfig::default().save_to_file(path)
}

/// Completes on the first Ctrl+C. Never completes if the signal handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::warn!("Interrupt received, stopping deployment...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = TempDir::new("shipwright-init").unwrap();
        let path = dir.path().join("Shipwright.toml");

        init(&path, false).unwrap();
        let config = DeployConfig::load(&path, &Environment::default()).unwrap();
        assert_eq!(config, DeployConfig::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new("shipwright-init").unwrap();
        let path = dir.path().join("Shipwright.toml");
        std::fs::write(&path, "default_network = \"local\"\n").unwrap();

        assert!(init(&path, false).is_err());
        init(&path, true).unwrap();
        assert_eq!(DeployConfig::load(&path, &Environment::default()).unwrap().default_network, "amoy");
    }

    #[tokio::test]
    async fn test_zero_timeout_override_is_rejected() {
        let args = DeployArgs {
            contract: None,
            args: vec![],
            network: None,
            artifacts: None,
            confirmation_timeout: Some(0),
            json: false,
        };

        let err = deploy(DeployConfig::default(), &Environment::default(), args)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("timeout_secs"));
    }
}
