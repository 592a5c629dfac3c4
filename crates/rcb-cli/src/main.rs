use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rconbridge", version, about = "Webhook-to-RCON bridge for game server automation")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge (the default when no subcommand is given)
    Run,
    /// Show the current configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => run_bridge().await,
        Some(Commands::Status) => status(),
    }
}

async fn run_bridge() -> Result<()> {
    let config = rcb_gateway::config::load_config()?;
    let bridge = rcb_gateway::Bridge::new(config);
    bridge.run().await
}

fn status() -> Result<()> {
    let cfg = rcb_gateway::config::load_config()?;
    println!("rconbridge v{}", env!("CARGO_PKG_VERSION"));
    println!("HTTP: {}:{}", cfg.http.host, cfg.http.port);
    println!("RCON: {}:{}", cfg.rcon.host, cfg.rcon.port);
    println!(
        "RCON password: {}",
        if cfg.rcon.password.is_empty() { "not set" } else { "configured" }
    );
    println!("Reply timeout: {} ms", cfg.rcon.reply_timeout_ms);
    println!("Config: {}", rcb_gateway::config::config_path().display());
    Ok(())
}
