use clap::{Parser, Subcommand};
use salvium_regtest::{HarnessConfig, Scenario};
use std::path::PathBuf;
use std::time::Duration;

mod commands;

/// Salvium regtest funding harness.
#[derive(Parser)]
#[command(name = "salvium-regtest")]
#[command(about = "Run a Salvium regtest node and fund a fresh wallet from it")]
#[command(version)]
struct Cli {
    /// Scenario preset (standard or flood).
    #[arg(long, default_value = "standard")]
    scenario: Scenario,

    /// Path to the salviumd binary.
    #[arg(long, env = "SALVIUMD_BIN")]
    salviumd: Option<PathBuf>,

    /// Path to the salvium-wallet-rpc binary.
    #[arg(long, env = "SALVIUM_WALLET_RPC_BIN")]
    wallet_rpc: Option<PathBuf>,

    /// Extra daemon flag (repeatable), e.g. --daemon-arg=--log-level=2.
    #[arg(long = "daemon-arg", allow_hyphen_values = true)]
    daemon_args: Vec<String>,

    /// Seconds to wait for each process to answer RPC.
    #[arg(long, default_value = "60")]
    setup_timeout: u64,

    /// Sync and readiness poll interval in milliseconds.
    #[arg(long, default_value = "500")]
    poll_interval_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a node, create a wallet, wait for sync and fund it.
    Fund {
        /// Number of outputs to send (overrides the scenario).
        #[arg(long)]
        iterations: Option<u32>,

        /// Amount per output in SAL, e.g. "0.01" (overrides the scenario).
        #[arg(long)]
        amount: Option<String>,

        /// Fee priority of the funding transfers (default, unimportant, normal, elevated).
        #[arg(long)]
        priority: Option<String>,

        /// Seconds to wait for the wallet to sync.
        #[arg(long)]
        sync_timeout: Option<u64>,

        /// Wallet seed as 64 hex characters (default: all zero).
        #[arg(long)]
        seed: Option<String>,

        /// Print the funding report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start a node with a mined chain and keep it running until Ctrl+C.
    Node,

    /// Print the keys and address derived from a seed.
    Keys {
        /// Seed as 64 hex characters (default: all zero).
        #[arg(long)]
        seed: Option<String>,
    },
}

/// Application context shared across commands.
struct AppContext {
    scenario: Scenario,
    harness: HarnessConfig,
}

impl AppContext {
    fn from_cli(cli: &Cli) -> Self {
        let mut harness = HarnessConfig {
            extra_daemon_args: cli.daemon_args.clone(),
            setup_timeout: Duration::from_secs(cli.setup_timeout),
            poll_interval: Duration::from_millis(cli.poll_interval_ms),
            ..HarnessConfig::default()
        };
        if let Some(ref path) = cli.salviumd {
            harness.daemon_bin = path.clone();
        }
        if let Some(ref path) = cli.wallet_rpc {
            harness.wallet_rpc_bin = path.clone();
        }

        Self {
            scenario: cli.scenario.clone(),
            harness,
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let ctx = AppContext::from_cli(&cli);

    let result = match cli.command {
        Commands::Fund {
            iterations,
            amount,
            priority,
            sync_timeout,
            seed,
            json,
        } => {
            let overrides = commands::FundOverrides {
                iterations,
                amount,
                priority,
                sync_timeout,
                seed,
            };
            commands::fund(&ctx, overrides, json).await
        }
        Commands::Node => commands::run_node(&ctx).await,
        Commands::Keys { seed } => commands::show_keys(&ctx, seed.as_deref()),
    };

    if let Err(e) = result {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
