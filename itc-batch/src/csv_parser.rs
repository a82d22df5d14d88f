use std::collections::HashMap;
use std::path::Path;
use csv::{ReaderBuilder, StringRecord, Trim};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use thiserror::Error;
use crate::passphrase::PassphraseResolver;
use crate::tool::{ChainTool, ToolError};
use crate::transaction::{BatchTransaction, CSV_COLUMNS};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV header is missing the '{0}' column")]
    MissingColumn(&'static str),
    #[error("could not query the CLI: {0}")]
    Tool(#[from] ToolError),
    #[error("could not read passphrase: {0}")]
    Passphrase(#[from] std::io::Error),
}

/// Why a row was left out of the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("address error! From: {from}; To: {to}")]
    InvalidAddress { from: String, to: String },
    #[error("to and/or from shard is not provided")]
    MissingShard,
    #[error("{which} shard ({value}) is not a shard number")]
    BadShard { which: &'static str, value: String },
    #[error("{which} shard ({shard}) is >= number of shards ({count})")]
    ShardOutOfRange { which: &'static str, shard: u32, count: usize },
    #[error("amount is not provided")]
    MissingAmount,
    #[error("{field} ({value}) is not an integer")]
    BadGas { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct ParseReport {
    pub transactions: Vec<BatchTransaction>,
    pub skipped: Vec<SkippedRow>,
}

struct Columns(HashMap<&'static str, usize>);

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, ParseError> {
        let mut index = HashMap::new();
        for column in CSV_COLUMNS {
            let position = headers
                .iter()
                .position(|h| h == column)
                .ok_or(ParseError::MissingColumn(column))?;
            index.insert(column, position);
        }
        Ok(Columns(index))
    }

    /// Field value with surrounding whitespace removed.
    fn get<'r>(&self, record: &'r StringRecord, column: &'static str) -> &'r str {
        self.raw(record, column).trim()
    }

    /// Field value exactly as written; passphrases may carry spaces.
    fn raw<'r>(&self, record: &'r StringRecord, column: &'static str) -> &'r str {
        self.0.get(column).and_then(|&i| record.get(i)).unwrap_or("")
    }

    fn is_blank(&self, record: &StringRecord) -> bool {
        CSV_COLUMNS.iter().all(|c| self.get(record, c).is_empty())
    }
}

pub struct CsvParser<'a, T: ChainTool + ?Sized> {
    tool: &'a T,
    node: &'a str,
    resolver: PassphraseResolver,
    show_progress: bool,
}

impl<'a, T: ChainTool + ?Sized> CsvParser<'a, T> {
    pub fn new(tool: &'a T, node: &'a str, resolver: PassphraseResolver) -> Self {
        CsvParser { tool, node, resolver, show_progress: true }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn parse(&mut self, path: &Path) -> Result<ParseReport, ParseError> {
        info!("Parsing CSV at {}", path.display());
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::Headers)
            .from_path(path)?;
        let columns = Columns::from_headers(reader.headers()?)?;
        let records = reader.records().collect::<Result<Vec<_>, _>>()?;

        let shard_count = self.tool.shard_count(self.node)?;
        info!("Node {} reports {} shard(s)", self.node, shard_count);

        let progress = self.progress_bar(records.len() as u64);
        let mut report = ParseReport::default();
        for record in &records {
            progress.inc(1);
            if columns.is_blank(record) {
                continue;
            }
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            match self.parse_row(&columns, record, shard_count, &progress)? {
                Ok(tx) => report.transactions.push(tx),
                Err(reason) => {
                    progress.suspend(|| warn!("Line {}: {}. Skipping!", line, reason));
                    report.skipped.push(SkippedRow { line, reason });
                }
            }
        }
        progress.finish_and_clear();

        info!(
            "Finished parsing CSV: {} transaction(s), {} row(s) skipped",
            report.transactions.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar().template("Parsing line {pos}/{len} [{bar:40.cyan/blue}]") {
            bar.set_style(style.progress_chars("##-"));
        }
        bar
    }

    /// Outer error aborts the whole parse, inner error skips the row.
    fn parse_row(
        &mut self,
        columns: &Columns,
        record: &StringRecord,
        shard_count: usize,
        progress: &ProgressBar,
    ) -> Result<Result<BatchTransaction, SkipReason>, ParseError> {
        let from = columns.get(record, "from");
        let to = columns.get(record, "to");

        for address in [from, to] {
            match self.tool.validate_address(address) {
                Ok(()) => {}
                Err(e @ ToolError::Failed { .. }) => {
                    progress.suspend(|| warn!("{}", e));
                    return Ok(Err(SkipReason::InvalidAddress {
                        from: from.to_string(),
                        to: to.to_string(),
                    }));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let from_shard = columns.get(record, "from-shard");
        let to_shard = columns.get(record, "to-shard");
        if from_shard.is_empty() || to_shard.is_empty() {
            return Ok(Err(SkipReason::MissingShard));
        }
        let from_shard = match check_shard("From", from_shard, shard_count) {
            Ok(shard) => shard,
            Err(reason) => return Ok(Err(reason)),
        };
        let to_shard = match check_shard("To", to_shard, shard_count) {
            Ok(shard) => shard,
            Err(reason) => return Ok(Err(reason)),
        };

        let amount = columns.get(record, "amount");
        if amount.is_empty() {
            return Ok(Err(SkipReason::MissingAmount));
        }

        let gas_price = match check_gas("gas-price", columns.get(record, "gas-price")) {
            Ok(value) => value,
            Err(reason) => return Ok(Err(reason)),
        };
        let gas_limit = match check_gas("gas-limit", columns.get(record, "gas-limit")) {
            Ok(value) => value,
            Err(reason) => return Ok(Err(reason)),
        };

        let file = columns.get(record, "passphrase-file");
        let literal = columns.raw(record, "passphrase-string");
        let resolver = &mut self.resolver;
        let passphrase = progress.suspend(|| resolver.resolve(from, file, literal))?;

        let mut tx = BatchTransaction::new(
            from.to_string(),
            to.to_string(),
            amount.to_string(),
            from_shard,
            to_shard,
            passphrase,
        );
        tx.gas_price = gas_price;
        tx.gas_limit = gas_limit;
        Ok(Ok(tx))
    }
}

fn check_shard(which: &'static str, value: &str, shard_count: usize) -> Result<u32, SkipReason> {
    let shard: u32 = value.parse().map_err(|_| SkipReason::BadShard {
        which,
        value: value.to_string(),
    })?;
    if shard as usize >= shard_count {
        return Err(SkipReason::ShardOutOfRange { which, shard, count: shard_count });
    }
    Ok(shard)
}

fn check_gas(field: &'static str, value: &str) -> Result<Option<String>, SkipReason> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<u64>()
        .map(|_| Some(value.to_string()))
        .map_err(|_| SkipReason::BadGas { field, value: value.to_string() })
}
