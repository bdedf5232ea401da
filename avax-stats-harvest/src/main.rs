//! Avalanche stats harvester CLI.
//!
//! Exports OONODZ subscription events from the C-Chain and validator stats
//! from the Avascan API as CSV files.
//!
//! # Usage
//!
//! ```bash
//! # Export NewSubscription / StopSubscription events to ./oonodz-stats.csv
//! avax-stats-harvest events --abi files/Subscriptions.json
//!
//! # Resume-safe export from a later block with a private RPC
//! avax-stats-harvest events --start-block 32166124 --rpc https://my-rpc.example.com \
//!     --checkpoint .events-checkpoint.json
//!
//! # First page of active mainnet validators to output/validators-stats.csv
//! avax-stats-harvest validators
//!
//! # Every pending testnet validator
//! avax-stats-harvest validators -n testnet -s pending -p -1 -o output/pending.csv
//! ```

use std::path::PathBuf;

use alloy::primitives::Address;
use anyhow::Result;
use avax_stats::{Network, Status};
use avax_stats_harvest::abi::ContractInterface;
use avax_stats_harvest::checkpoint::Checkpoint;
use avax_stats_harvest::config::Config;
use avax_stats_harvest::events::{self, EventsJob, RpcLogSource};
use avax_stats_harvest::table::{self, OutputFormat};
use avax_stats_harvest::validators::{self, AvascanClient, PageLimit};
use clap::{Parser, Subcommand};

/// Avalanche events and validator stats harvester.
#[derive(Debug, Parser)]
#[command(name = "avax-stats-harvest", version, about)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(long, global = true, default_value = "avax-stats.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Export contract events from the C-Chain to CSV.
    Events {
        /// C-Chain RPC endpoint; repeat to add fallbacks, tried in order.
        #[arg(long)]
        rpc: Vec<String>,

        /// Contract emitting the events.
        #[arg(long)]
        contract: Option<Address>,

        /// Compiler artifact (JSON with an `abi` field) of the contract.
        #[arg(long)]
        abi: Option<PathBuf>,

        /// First block to scan (defaults to the contract creation block).
        #[arg(long)]
        start_block: Option<u64>,

        /// Event to export; repeat for several. Defaults to
        /// `NewSubscription` and `StopSubscription`.
        #[arg(long = "event")]
        events: Vec<String>,

        /// Output file.
        #[arg(short, long, default_value = "oonodz-stats.csv")]
        output_file: PathBuf,

        /// Output format.
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,

        /// State file that makes an interrupted run resumable.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },

    /// Export validator stats from the Avascan API to CSV.
    Validators {
        /// Network: mainnet or testnet.
        #[arg(short, long, default_value = "mainnet")]
        network: Network,

        /// Status: active or pending.
        #[arg(short, long, default_value = "active")]
        status: Status,

        /// Number of pages to fetch. -1 for all pages.
        #[arg(short, long, default_value = "1", allow_negative_numbers = true)]
        pages: PageLimit,

        /// Output file.
        #[arg(short, long, default_value = "output/validators-stats.csv")]
        output_file: PathBuf,

        /// Output format.
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,

        /// Override the Avascan API base URL.
        #[arg(long)]
        api: Option<String>,

        /// State file that makes an interrupted run resumable.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },

    /// List the known networks and their endpoints.
    Networks,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Events {
            rpc,
            contract,
            abi,
            start_block,
            events,
            output_file,
            format,
            checkpoint,
        } => {
            let args = EventsArgs {
                rpcs: config.events.rpcs(&rpc),
                contract: config.events.contract(contract),
                abi: config.events.abi(abi),
                start_block: config.events.start_block(start_block),
                events: config.events.names(&events),
                output_file,
                format,
                checkpoint: checkpoint.map(Checkpoint::new),
            };
            cmd_events(&config, args).await
        }
        Command::Validators {
            network,
            status,
            pages,
            output_file,
            format,
            api,
            checkpoint,
        } => {
            let args = ValidatorsArgs {
                api: config.validators.api(api),
                network,
                status,
                pages,
                output_file,
                format,
                checkpoint: checkpoint.map(Checkpoint::new),
            };
            cmd_validators(&config, args).await
        }
        Command::Networks => {
            cmd_networks();
            Ok(())
        }
    }
}

/// Resolved arguments of the `events` subcommand.
#[derive(Debug)]
struct EventsArgs {
    rpcs: Vec<String>,
    contract: Address,
    abi: PathBuf,
    start_block: u64,
    events: Vec<String>,
    output_file: PathBuf,
    format: OutputFormat,
    checkpoint: Option<Checkpoint>,
}

/// Execute the `events` subcommand.
async fn cmd_events(config: &Config, args: EventsArgs) -> Result<()> {
    let interface = ContractInterface::load(&args.abi)?;
    let job = EventsJob::new(&interface, args.contract, args.start_block, &args.events)?;

    tracing::info!(
        contract = %args.contract,
        start_block = args.start_block,
        events = ?args.events,
        output = %args.output_file.display(),
        "starting events harvest"
    );

    let table = events::sync(
        &args.rpcs,
        RpcLogSource::connect,
        &job,
        &config.retry,
        args.checkpoint.as_ref(),
    )
    .await?;
    table::write(&args.output_file, &table, args.format)?;

    if let Some(cp) = &args.checkpoint {
        cp.clear()?;
    }
    Ok(())
}

/// Resolved arguments of the `validators` subcommand.
#[derive(Debug)]
struct ValidatorsArgs {
    api: String,
    network: Network,
    status: Status,
    pages: PageLimit,
    output_file: PathBuf,
    format: OutputFormat,
    checkpoint: Option<Checkpoint>,
}

/// Execute the `validators` subcommand.
async fn cmd_validators(config: &Config, args: ValidatorsArgs) -> Result<()> {
    let client = AvascanClient::new(&args.api, args.network)?;
    tracing::info!(url = %client.url(), "starting validators harvest");

    let items = validators::harvest(
        &client,
        args.network,
        args.status,
        args.pages,
        &config.retry,
        args.checkpoint.as_ref(),
    )
    .await?;

    tracing::info!(path = %args.output_file.display(), "writing validators stats");
    table::write(&args.output_file, &validators::to_table(&items)?, args.format)?;

    if let Some(cp) = &args.checkpoint {
        cp.clear()?;
    }
    Ok(())
}

/// Execute the `networks` subcommand.
#[allow(clippy::print_stdout)]
fn cmd_networks() {
    println!(
        "{:<10} {:<10} {:<45} Avascan path",
        "Network", "Chain ID", "C-Chain RPC"
    );
    println!("{}", "-".repeat(100));

    for network in Network::ALL {
        println!(
            "{:<10} {:<10} {:<45} {}",
            network,
            network.c_chain_id(),
            network.c_chain_rpc(),
            network.validations_path(),
        );
    }
}
