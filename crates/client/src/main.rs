//! CLI for simulating chained Diffie-Hellman auctions.
//!
//! This binary provides commands for:
//! - Running the key exchange and a full auction in-process
//! - Computing tiered allocations and prices for a list of values

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use auction_client::{Simulation, SimulationConfig, SimulationReport};
use auction_module::AuctionGenesisConfig;
use auction_pricing::allocate_values;
use auction_types::AuctionVariant;

#[derive(Parser)]
#[command(name = "auction-sim")]
#[command(about = "Simulator for chained Diffie-Hellman sealed-bid auctions")]
struct Cli {
    /// Genesis configuration (JSON); bidders are generated when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of generated bidders
    #[arg(long, default_value = "4")]
    bidders: usize,

    /// Tier capacities, comma-separated
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    ctrs: Option<Vec<i64>>,

    /// Seed for every random draw
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Auction variant
    #[arg(long, value_enum)]
    variant: Option<VariantArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the key exchange and one auction end to end
    Simulate {
        /// Bid values in registry order, comma-separated
        #[arg(long, value_delimiter = ',')]
        values: Option<Vec<u64>>,
    },

    /// Compute winners and prices only
    Allocate {
        /// Bid values, comma-separated
        #[arg(long, value_delimiter = ',', required = true)]
        values: Vec<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    Plain,
    Sealed,
    Mixer,
}

impl From<VariantArg> for AuctionVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Plain => AuctionVariant::Plain,
            VariantArg::Sealed => AuctionVariant::Sealed,
            VariantArg::Mixer => AuctionVariant::Mixer,
        }
    }
}

fn load_genesis(path: &PathBuf) -> Result<AuctionGenesisConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let genesis: AuctionGenesisConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    genesis
        .validate()
        .with_context(|| format!("Invalid genesis in {}", path.display()))?;
    Ok(genesis)
}

fn simulate_cmd(cli: &Cli, values: Option<Vec<u64>>) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::from_genesis(load_genesis(path)?, cli.seed),
        None => SimulationConfig::generated(cli.bidders, cli.seed),
    };
    if let Some(variant) = cli.variant {
        config.variant = variant.into();
    }
    if let Some(ctrs) = &cli.ctrs {
        config.capacities = ctrs.clone();
    }
    config.values = values;

    info!(
        bidders = config.genesis.participants.len(),
        variant = ?config.variant,
        seed = config.seed,
        "Starting simulation"
    );

    let report = Simulation::new(config)
        .context("Failed to set up simulation")?
        .run()
        .context("Simulation failed")?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!("Auction {} ({:?}):", report.auction_id, report.variant);
    if let Some(fp) = report.key_fingerprint {
        println!("  Key fingerprint: {}", hex::encode(fp));
        println!("  Exchange passes: {}", report.exchange_passes);
    }
    println!("  Revealed bids:");
    for (bidder, value) in &report.revealed {
        println!("    {bidder}: {value}");
    }
    if !report.outcome.forfeited.is_empty() {
        println!("  Forfeited:");
        for bidder in &report.outcome.forfeited {
            println!("    {bidder}");
        }
    }
    println!("  Winners:");
    for (winner, payee) in report.outcome.winners.iter().zip(&report.payees) {
        println!(
            "    tier {} {} bid {} pays {} (to {})",
            winner.tier, winner.bidder, winner.value, winner.price, payee
        );
    }
    println!(
        "  Commitments digest: {}",
        hex::encode(report.outcome.commitments_digest)
    );
    println!("  Proceeds: {}", report.proceeds);
}

fn allocate_cmd(cli: &Cli, values: &[u64]) -> Result<()> {
    let ctrs = cli.ctrs.clone().unwrap_or_else(|| vec![1]);
    let allocation = allocate_values(values, &ctrs).context("Allocation failed")?;

    if allocation.winners.is_empty() {
        println!("No winners");
        return Ok(());
    }

    println!("Winners:");
    for ((index, price), tier) in allocation
        .winners
        .iter()
        .zip(&allocation.prices)
        .zip(&allocation.tiers)
    {
        println!(
            "  [{}] value {} tier {} pays {}",
            index, values[*index], tier, price
        );
    }
    println!(
        "Revenue: {}",
        allocation.prices.iter().map(|&p| u128::from(p)).sum::<u128>()
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("auction_sim=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Simulate { values } => simulate_cmd(&cli, values.clone())?,
        Commands::Allocate { values } => allocate_cmd(&cli, values)?,
    }

    Ok(())
}
