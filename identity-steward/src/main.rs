//! identity-steward: edit identity content maps on a replace-only daemon
//!
//! Every mutating command runs one fetch/merge/submit/refresh cycle through
//! `identity-sync`. See DESIGN.md for the limitations of that cycle.

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use identity_sync::{IdentitySyncEngine, RpcTransport, SyncConfig, SyncHistory};

#[derive(Parser)]
#[command(name = "identity-steward")]
#[command(about = "Edit identity content maps and multimaps over daemon JSON-RPC")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "identity-steward.toml")]
    config: String,

    /// RPC endpoint (overrides config file)
    #[arg(long, env = "IDENTITY_RPC_URL")]
    rpc_url: Option<String>,

    /// RPC user (overrides config file)
    #[arg(long, env = "IDENTITY_RPC_USER")]
    rpc_user: Option<String>,

    /// RPC password (overrides config file)
    #[arg(long, env = "IDENTITY_RPC_PASSWORD", hide_env_values = true)]
    rpc_password: Option<String>,

    /// Daemon conf file to take credentials from
    #[arg(long, env = "IDENTITY_DAEMON_CONF")]
    conf_file: Option<PathBuf>,

    /// Show ticket/lottery identities in listings
    #[arg(long)]
    no_filter: bool,

    #[command(subcommand)]
    command: cli::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("identity_steward=info".parse()?)
                .add_directive("identity_sync=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = SyncConfig::load(&cli.config)?;

    // Apply CLI overrides
    if let Some(url) = cli.rpc_url {
        config.rpc.url = url;
    }
    if let Some(user) = cli.rpc_user {
        config.rpc.user = Some(user);
    }
    if let Some(password) = cli.rpc_password {
        config.rpc.password = Some(password);
    }
    if let Some(conf_file) = cli.conf_file {
        config.rpc.conf_file = Some(conf_file);
    }
    if cli.no_filter {
        config.filter.enabled = false;
    }
    config.rpc.resolve_conf_file()?;
    config.rpc.validate()?;

    info!(url = %config.rpc.url, "using daemon RPC endpoint");

    let transport = RpcTransport::new(&config.rpc)?;
    let engine = IdentitySyncEngine::new(Arc::new(transport))
        .with_config(config)
        .with_history(Arc::new(SyncHistory::new()));

    match cli::execute_command(&engine, cli.command).await {
        Ok(output) => {
            println!("{}", output.trim_end());
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
