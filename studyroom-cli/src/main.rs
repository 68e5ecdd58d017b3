use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use studyroom_server::{ServerConfig, serve};

#[derive(Parser)]
#[command(name = "studyroom-relay")]
#[command(about = "Signaling and broadcast relay for live tutoring sessions")]
struct Cli {
    /// Address to listen on, overrides the config file.
    #[arg(short, long, env = "STUDYROOM_BIND")]
    bind: Option<SocketAddr>,

    /// TOML config file.
    #[arg(short, long, env = "STUDYROOM_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, env = "STUDYROOM_LOG", default_value = "info")]
    log_level: String,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    if cli.check {
        config.directory().context("Invalid session list")?;
        println!("{}", "✅ Configuration is valid".green().bold());
        print_summary(&config);
        return Ok(());
    }

    println!("{}", "📡 Starting studyroom relay...".green().bold());
    print_summary(&config);

    serve(config, shutdown_signal())
        .await
        .context("Relay stopped with an error")?;

    println!("{}", "👋 Relay stopped".cyan());
    Ok(())
}

fn print_summary(config: &ServerConfig) {
    println!("   🔌 Listen:   {}", config.bind);
    println!("   🧊 ICE:      {} server(s)", config.ice_servers.len());
    if config.sessions.is_empty() {
        println!("   📚 Sessions: {}", "open (any room id)".yellow());
    } else {
        println!("   📚 Sessions: {} booked", config.sessions.len());
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Ctrl-C received, shutting down");
    }
}
