use std::error::Error;
use std::time::Duration;
use clap::Parser;
use log::{info, LevelFilter};
use itc_batch::csv_parser::CsvParser;
use itc_batch::dispatch::{AssumeYes, Confirm, DispatchOptions, DispatchSummary, Dispatcher, LineConfirm};
use itc_batch::passphrase::{PassphraseMode, PassphraseResolver, TerminalPrompt};
use itc_batch::sanity::{check_csv_path, check_node, expand_home};
use itc_batch::settings::Settings;
use itc_batch::tool::ItcCli;

mod cli;

fn init_logger(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(if verbose { LevelFilter::Debug } else { LevelFilter::Info });
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = cli::CliArgs::parse();
    init_logger(args.verbose);
    info!("Starting itc-csv v{}", env!("CARGO_PKG_VERSION"));

    let mut settings = Settings::load(&args.config)?;
    if let Some(node) = args.node {
        settings.node = node;
    }
    if let Some(batch_size) = args.batch_size {
        settings.batch_size = batch_size as usize;
    }
    if let Some(timeout_per_tx) = args.timeout_per_tx {
        settings.timeout_per_tx = timeout_per_tx;
    }
    if args.itc_dir.is_some() {
        settings.itc_dir = args.itc_dir;
    }
    if args.log_dir.is_some() {
        settings.log_dir = args.log_dir;
    }

    let cli = ItcCli::locate(&settings.itc_dir(), Duration::from_secs(settings.cli_timeout), args.verbose)?;

    let path = expand_home(&args.path);
    check_csv_path(&path)?;
    check_node(&settings.node)?;

    let mode = if args.use_default_passphrase {
        PassphraseMode::Default(settings.default_passphrase.clone())
    } else {
        PassphraseMode::Prompt(Box::new(TerminalPrompt))
    };
    let report = CsvParser::new(&cli, &settings.node, PassphraseResolver::new(mode)).parse(&path)?;

    let options = DispatchOptions {
        node: settings.node.clone(),
        chain_id: args.chain_id,
        batch_size: settings.batch_size,
        timeout_per_tx: settings.timeout_per_tx,
        fast: args.fast,
        temp_dir: std::env::temp_dir(),
        log_dir: settings.log_dir(),
    };
    let mut confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(LineConfirm::stdin())
    };

    match Dispatcher::new(&cli, options).run(&report.transactions, confirm.as_mut())? {
        DispatchSummary::Sent(outcomes) => {
            for outcome in &outcomes {
                info!("Batch #{} ({} tx) logged at {}", outcome.index, outcome.size, outcome.log_file.display());
            }
        }
        DispatchSummary::Declined | DispatchSummary::Nothing => {}
    }
    if !report.skipped.is_empty() {
        info!("{} CSV row(s) were skipped, see warnings above", report.skipped.len());
    }

    Ok(())
}
