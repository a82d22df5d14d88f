use std::path::PathBuf;
use clap::Parser;
use itc_batch::sanity::ChainId;
use itc_batch::settings::DEFAULT_CONFIG;

#[derive(Parser, Debug)]
#[command(name = "itc-csv", author, version)]
#[command(about = "Intelchain CLI, transaction from CSV file wrapper", long_about = None)]
pub struct CliArgs {
    /// The path to the CSV file
    pub path: PathBuf,

    /// The node or endpoint to send the transactions to [default: https://testnet.intelchain.network/]
    #[arg(short, long)]
    pub node: Option<String>,

    /// Number of transactions to send in 1 batch to the CLI before checking output [default: 4]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: Option<u64>,

    /// Max time spent checking for a single transaction to confirm; ignored with --fast [default: 40]
    #[arg(long)]
    pub timeout_per_tx: Option<u64>,

    /// The chain ID of the transactions; default uses the implicit chain ID of the CLI
    #[arg(long, value_parser = parse_chain_id)]
    pub chain_id: Option<ChainId>,

    /// Send transactions without waiting for transaction confirmation
    #[arg(long)]
    pub fast: bool,

    /// Use default passphrase if no passphrase file or string is provided in the CSV file
    #[arg(long)]
    pub use_default_passphrase: bool,

    /// Say yes to the confirmation check
    #[arg(long)]
    pub yes: bool,

    /// Enable verbose mode when sending transactions
    #[arg(long)]
    pub verbose: bool,

    /// Settings file (any format the config crate reads); missing file is fine
    #[arg(long, default_value = DEFAULT_CONFIG)]
    pub config: String,

    /// Directory holding the itc binary or itc.sh [default: directory of this program]
    #[arg(long)]
    pub itc_dir: Option<PathBuf>,

    /// Directory for per-batch log files [default: the itc directory]
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

fn parse_chain_id(value: &str) -> Result<ChainId, String> {
    value.parse().map_err(|e: itc_batch::sanity::SanityError| e.to_string())
}
