use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hollowdhcp::{Config, LeaseResolver, Result};

#[derive(Parser)]
#[command(name = "hollowdhcp")]
#[command(author, version, about = "Look up DHCP leases stored in hollow", long_about = None)]
struct Cli {
    /// Base URL of the hollow inventory service
    url: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the lease for a MAC address
    Lookup {
        mac: String,

        #[arg(long)]
        ipv6: bool,

        /// Overrides the configured request timeout
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = Config::from_args(&[cli.url.as_str()])?;

    match cli.command {
        Commands::Lookup {
            mac,
            ipv6,
            timeout_ms,
        } => {
            let deadline = timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.request_timeout());
            let resolver = LeaseResolver::from_config(&config)?;
            info!("Looking up {} in {}", mac, config.base_url);

            let output = if ipv6 {
                serde_json::to_string_pretty(&resolver.resolve_v6_within(&mac, deadline).await?)?
            } else {
                serde_json::to_string_pretty(&resolver.resolve_v4_within(&mac, deadline).await?)?
            };
            println!("{}", output);
            Ok(())
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            Ok(())
        }
    }
}
