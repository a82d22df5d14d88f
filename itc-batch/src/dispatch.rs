use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use log::{error, info};
use thiserror::Error;
use crate::batch::{split_batches, BatchError, BatchFile, BatchLog};
use crate::sanity::ChainId;
use crate::tool::{ChainTool, ToolError, TransferRequest};
use crate::transaction::{redact_all, BatchTransaction};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("could not read confirmation: {0}")]
    Confirm(#[from] io::Error),
    #[error("batch #{index} failed (log at {}): {source}", log_file.display())]
    BatchFailed {
        index: usize,
        log_file: PathBuf,
        #[source]
        source: ToolError,
    },
}

/// Asks the operator whether to go ahead.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> io::Result<bool>;
}

/// Reads the answer from a line of input; only `y`/`yes` proceeds.
pub struct LineConfirm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LineConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        LineConfirm { input, output }
    }
}

impl LineConfirm<io::StdinLock<'static>, io::Stdout> {
    pub fn stdin() -> Self {
        LineConfirm::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Confirm for LineConfirm<R, W> {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        write!(self.output, "{} [Y]/n\n> ", question)?;
        self.output.flush()?;
        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

/// Skips the question entirely (`--yes`).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _question: &str) -> io::Result<bool> {
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub node: String,
    pub chain_id: Option<ChainId>,
    pub batch_size: usize,
    pub timeout_per_tx: u64,
    pub fast: bool,
    pub temp_dir: PathBuf,
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub index: usize,
    pub size: usize,
    pub log_file: PathBuf,
    pub output: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DispatchSummary {
    Nothing,
    Declined,
    Sent(Vec<BatchOutcome>),
}

pub struct Dispatcher<'a, T: ChainTool + ?Sized> {
    tool: &'a T,
    options: DispatchOptions,
}

impl<'a, T: ChainTool + ?Sized> Dispatcher<'a, T> {
    pub fn new(tool: &'a T, options: DispatchOptions) -> Self {
        Dispatcher { tool, options }
    }

    pub fn run(
        &self,
        transactions: &[BatchTransaction],
        confirm: &mut dyn Confirm,
    ) -> Result<DispatchSummary, DispatchError> {
        if transactions.is_empty() {
            info!("No valid transactions to send");
            return Ok(DispatchSummary::Nothing);
        }
        let batches = split_batches(transactions, self.options.batch_size)?;

        self.print_summary(transactions)?;
        if !confirm.confirm("Send Transactions?")? {
            info!("Transactions not sent");
            return Ok(DispatchSummary::Declined);
        }

        let mut outcomes = Vec::new();
        for (index, batch) in batches.enumerate() {
            outcomes.push(self.send_batch(index, batch)?);
        }
        println!("=== HOORAY! Sent all {} transaction(s) in {} batch(es)! ===", transactions.len(), outcomes.len());
        Ok(DispatchSummary::Sent(outcomes))
    }

    fn print_summary(&self, transactions: &[BatchTransaction]) -> Result<(), DispatchError> {
        println!("Transactions to send:");
        println!("{}", serde_json::to_string_pretty(&redact_all(transactions)).map_err(BatchError::from)?);
        println!("Transaction Count: {}", transactions.len());
        println!("Node/Endpoint: {}", self.options.node);
        if let Some(chain_id) = self.options.chain_id {
            println!("Chain-ID: {}", chain_id);
        }
        Ok(())
    }

    fn send_batch(&self, index: usize, batch: &[BatchTransaction]) -> Result<BatchOutcome, DispatchError> {
        let file = BatchFile::write(&self.options.temp_dir, batch)?;
        let log = BatchLog::new(&self.options.log_dir, index);
        info!("Sending batch #{} of {} transaction(s)", index, batch.len());
        info!("Logs for this batch will be at {}", log.path().display());

        let request = TransferRequest {
            file: file.path(),
            node: &self.options.node,
            chain_id: self.options.chain_id,
            fast: self.options.fast,
            timeout_per_tx: self.options.timeout_per_tx,
            batch_len: batch.len(),
        };
        let result = self.tool.transfer(&request);
        drop(file);

        match result {
            Ok(output) => {
                log.write(batch, &output)?;
                println!("Batch #{} sent successfully! Transaction hashes/receipts:", index);
                println!("{}", output.trim_end());
                Ok(BatchOutcome {
                    index,
                    size: batch.len(),
                    log_file: log.path().to_path_buf(),
                    output,
                })
            }
            Err(source) => {
                error!("Transaction failure: {}", source);
                let response = source.output().map(str::to_string).unwrap_or_else(|| source.to_string());
                if let Err(e) = log.write(batch, &response) {
                    error!("Could not write the log for batch #{}: {}", index, e);
                }
                Err(DispatchError::BatchFailed {
                    index,
                    log_file: log.path().to_path_buf(),
                    source,
                })
            }
        }
    }
}
