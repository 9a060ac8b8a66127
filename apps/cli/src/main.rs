//! `strata`: check resource configuration and prepare encrypted credentials.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use strata_config::Config;
use strata_resource::{Manager, ResourceKind, Secrets, preset_for};

#[derive(Parser)]
#[command(author, version, about = "Named-resource bootstrap checks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build and probe named resources, exiting non-zero if any fails.
    Check(CheckArgs),
    /// Encrypt a credential for use in the config file.
    Encrypt {
        /// The plaintext credential
        value: String,
        /// Config file holding `[security] credential_key`
        #[arg(long, env = "STRATA_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Print a fresh base64 credential key.
    GenerateKey,
}

#[derive(Args)]
struct CheckArgs {
    /// Config file (TOML, or JSON by extension)
    #[arg(long, env = "STRATA_CONFIG")]
    config: PathBuf,
    /// Database names to check
    #[arg(long = "database", value_name = "NAME")]
    databases: Vec<String>,
    /// Cache names to check
    #[arg(long = "cache", value_name = "NAME")]
    caches: Vec<String>,
    /// Object-storage names to check
    #[arg(long = "storage", value_name = "NAME")]
    stores: Vec<String>,
    /// Logger names to check
    #[arg(long = "logger", value_name = "NAME")]
    loggers: Vec<String>,
}

impl CheckArgs {
    /// Requested names in dependency order.
    fn targets(&self) -> Vec<(ResourceKind, &str)> {
        ResourceKind::ALL
            .into_iter()
            .flat_map(|kind| {
                let names = match kind {
                    ResourceKind::Logger => &self.loggers,
                    ResourceKind::Database => &self.databases,
                    ResourceKind::Cache => &self.caches,
                    ResourceKind::ObjectStorage => &self.stores,
                };
                names.iter().map(move |name| (kind, name.as_str()))
            })
            .collect()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Command::Check(args) => check(args).await,
        Command::Encrypt { value, config } => encrypt(&value, config.as_deref()),
        Command::GenerateKey => {
            println!("{}", Secrets::generate_key());
            Ok(())
        }
    }
}

fn load(path: &Path) -> anyhow::Result<Config> {
    Config::from_file(path).with_context(|| format!("loading {}", path.display()))
}

async fn check(args: CheckArgs) -> anyhow::Result<()> {
    let config = load(&args.config)?;
    let _log = strata_log::init_with(preset_for(config.mode()))
        .context("installing the process logger")?;

    let targets = args.targets();
    if targets.is_empty() {
        println!(
            "config ok: {} ({} mode), sections: {}",
            config.app_name(),
            config.mode(),
            config.section_names().join(", ")
        );
        return Ok(());
    }

    let manager = Manager::new(config)?;
    let mut failed = 0;
    for (kind, name) in &targets {
        let outcome = match kind {
            ResourceKind::Logger => manager.logger(name).await.map(drop),
            ResourceKind::Database => manager.database(name).await.map(drop),
            ResourceKind::Cache => manager.cache(name).await.map(drop),
            ResourceKind::ObjectStorage => manager.object_store(name).await.map(drop),
        };
        match outcome {
            Ok(()) => println!("ok    {kind} {name}"),
            Err(e) => {
                failed += 1;
                tracing::error!(%kind, name, error = %e, "resource check failed");
                println!("FAIL  {kind} {name}: {e}");
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} resources failed", targets.len());
    }
    Ok(())
}

fn encrypt(value: &str, config: Option<&Path>) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => load(path)?,
        None => Config::from_toml_str("")?,
    };
    let secrets = Secrets::from_config(&config)?;
    if !secrets.is_enabled() {
        bail!(
            "no credential key: set [security] credential_key or {}",
            strata_resource::CREDENTIAL_KEY_ENV
        );
    }
    println!("{}", secrets.encrypt(value)?);
    Ok(())
}
