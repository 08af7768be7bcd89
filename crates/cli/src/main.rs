use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use wheel_scan_cli::Services;
use wheel_scan_core::config_loader::{ConfigLoader, DEFAULT_CONFIG_PATH};

#[derive(Parser)]
#[command(name = "wheel-scan")]
#[command(about = "Wheel strategy screener: nearest-delta put and call near a target DTE", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP front end
    Serve {
        /// Server address (defaults to server.host:server.port)
        #[arg(short, long)]
        addr: Option<String>,
    },
    /// Run one screening pass and print the result as JSON
    Screen {
        /// Underlying symbol (e.g., "SPY", "BRK.B")
        #[arg(short, long)]
        symbol: String,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Print the OAuth consent URL used to bootstrap a refresh token
    AuthorizeUrl {
        /// CSRF state to embed (random when omitted)
        #[arg(long)]
        state: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ConfigLoader::load_from(&cli.config)?;

    match cli.command {
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.server.bind_addr());
            let services = Services::build(&config)?;
            services.api_server().serve(&addr).await?;
        }
        Commands::Screen { symbol, pretty } => {
            run_screen(&config, &symbol, pretty).await?;
        }
        Commands::AuthorizeUrl { state } => {
            let services = Services::build(&config)?;
            let state = state.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let url = services
                .tokens
                .authorization_url(&state)
                .context("failed to build authorization URL")?;
            println!("{url}");
            tracing::info!(%state, "open the URL above and pass the returned code to /oauth/callback");
        }
    }

    Ok(())
}

async fn run_screen(
    config: &wheel_scan_core::AppConfig,
    symbol: &str,
    pretty: bool,
) -> anyhow::Result<()> {
    let services = Services::build(config)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, returning what was collected");
            on_ctrl_c.cancel();
        }
    });

    let result = services
        .screener
        .screen_with_cancel(symbol, cancel)
        .await
        .with_context(|| format!("screening {symbol} failed"))?;

    let json = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{json}");
    Ok(())
}
