//! Airdrop daemon: entry point for running the airdrop service.

use airdrop_node::{init_logging, AirdropService, LogFormat, NodeConfig};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "airdrop-daemon", about = "Identity-gated airdrop service")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "AIRDROP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for the claim database.
    #[arg(long, env = "AIRDROP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Address the HTTP API binds to.
    #[arg(long, env = "AIRDROP_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// HTTP API port.
    #[arg(long, env = "AIRDROP_PORT")]
    port: Option<u16>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "AIRDROP_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "AIRDROP_LOG_FORMAT")]
    log_format: Option<String>,

    /// Hex-encoded Ed25519 secret of the paying account.
    #[arg(long, env = "AIRDROP_SENDER_KEY", hide_env_values = true)]
    sender_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the service until SIGINT/SIGTERM.
    Run,
    /// Print the effective configuration (without the sender key) and exit.
    Config,
}

impl Cli {
    fn effective_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let path_str = path.to_str().context("config path is not valid UTF-8")?;
                NodeConfig::from_toml_file(path_str)
                    .with_context(|| format!("loading config from {}", path.display()))?
            }
            None => NodeConfig::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.store.data_dir = dir.clone();
        }
        if let Some(addr) = &self.listen_addr {
            config.server.listen_addr = addr.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(key) = &self.sender_key {
            config.broadcaster.sender_key = Some(key.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.effective_config()?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string());
        }
        Command::Run => {
            let format: LogFormat = config.logging.format.parse()?;
            init_logging(format, &config.logging.level);
            if let Some(path) = &cli.config {
                tracing::info!(path = %path.display(), "loaded config");
            }

            let service = AirdropService::new(config).context("starting airdrop service")?;
            service.run().await.context("running airdrop service")?;
            tracing::info!("airdrop daemon exited cleanly");
        }
    }

    Ok(())
}
