use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use log::{debug, info, warn};
use thiserror::Error;
use crate::sanity::ChainId;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error while talking to the CLI: {0}")]
    Io(#[from] std::io::Error),
    #[error("`{command}` exited with {status}: {output}")]
    Failed {
        command: String,
        status: ExitStatus,
        output: String,
    },
    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("unexpected CLI response: {0}")]
    BadResponse(String),
    #[error("unable to execute itc CLI at '{0}'; try downloading it with `./itc.sh -d`")]
    WrapperBroken(PathBuf),
    #[error("'itc.sh' is not found in directory {0}")]
    NotFound(PathBuf),
}

impl ToolError {
    /// Whatever the CLI printed before failing, if anything.
    pub fn output(&self) -> Option<&str> {
        match self {
            ToolError::Failed { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Everything `itc transfer` needs to send one batch file.
#[derive(Debug, Clone)]
pub struct TransferRequest<'a> {
    pub file: &'a Path,
    pub node: &'a str,
    pub chain_id: Option<ChainId>,
    pub fast: bool,
    pub timeout_per_tx: u64,
    pub batch_len: usize,
}

impl TransferRequest<'_> {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "transfer".to_string(),
            "--file".to_string(),
            self.file.display().to_string(),
            "--node".to_string(),
            self.node.to_string(),
        ];
        if let Some(chain_id) = self.chain_id {
            args.push("--chain-id".to_string());
            args.push(chain_id.to_string());
        }
        args.push("--timeout".to_string());
        if self.fast {
            args.push("0".to_string());
        } else {
            args.push(self.timeout_per_tx.to_string());
        }
        args
    }

    /// Wall-clock bound for the whole `transfer` call.
    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_per_tx.saturating_mul(self.batch_len.max(1) as u64))
    }
}

/// The external wallet CLI, seen from this crate.
pub trait ChainTool {
    fn validate_address(&self, address: &str) -> Result<(), ToolError>;
    fn shard_count(&self, node: &str) -> Result<usize, ToolError>;
    fn transfer(&self, request: &TransferRequest<'_>) -> Result<String, ToolError>;
}

#[derive(Debug, Clone)]
pub struct ItcCli {
    program: PathBuf,
    prefix: Vec<String>,
    verbose: bool,
    timeout: Duration,
}

impl ItcCli {
    pub fn new(program: impl Into<PathBuf>, prefix: Vec<String>, timeout: Duration) -> Self {
        ItcCli {
            program: program.into(),
            prefix,
            verbose: false,
            timeout,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Finds a working CLI in `dir`: the `itc` binary first, then the
    /// `itc.sh` wrapper.
    pub fn locate(dir: &Path, timeout: Duration, verbose: bool) -> Result<Self, ToolError> {
        let direct = ItcCli::new(dir.join("itc"), Vec::new(), timeout).with_verbose(verbose);
        match direct.version() {
            Ok(version) => {
                info!("Using itc CLI at {} ({})", direct.program.display(), version.trim());
                return Ok(direct);
            }
            Err(e) => {
                warn!("Unable to execute itc CLI directly at '{}': {}", direct.program.display(), e);
                info!("Trying to use 'itc.sh'...");
            }
        }

        let wrapper = dir.join("itc.sh");
        if !wrapper.is_file() {
            return Err(ToolError::NotFound(dir.to_path_buf()));
        }
        let wrapped = ItcCli::new(wrapper.clone(), vec!["--".to_string()], timeout).with_verbose(verbose);
        match wrapped.version() {
            Ok(version) => {
                info!("Using itc CLI through {} ({})", wrapper.display(), version.trim());
                Ok(wrapped)
            }
            Err(e) => {
                warn!("'itc.sh' failed: {}", e);
                Err(ToolError::WrapperBroken(wrapper))
            }
        }
    }

    pub fn version(&self) -> Result<String, ToolError> {
        self.call(&["version"], self.timeout)
    }

    /// Runs the CLI with `args` and returns its stdout. Non-zero exit and
    /// running past `timeout` are both errors; the child is killed on timeout
    /// and the call returns without waiting for its output.
    pub fn call<S: AsRef<str>>(&self, args: &[S], timeout: Duration) -> Result<String, ToolError> {
        let mut command = Command::new(&self.program);
        command.args(&self.prefix);
        command.args(args.iter().map(|a| AsRef::<str>::as_ref(a)));
        if self.verbose {
            command.arg("--verbose");
        }
        let rendered = self.render(args);
        debug!("Running `{}`", rendered);

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            if Instant::now() >= deadline {
                child.kill()?;
                child.wait()?;
                break None;
            }
            thread::sleep(POLL_INTERVAL);
        };

        // Processes started by a wrapper script can outlive the kill and keep
        // the pipes open, so the readers are left detached on timeout.
        let status = match status {
            Some(status) => status,
            None => {
                warn!("`{}` timed out after {:?}", rendered, timeout);
                return Err(ToolError::Timeout { command: rendered, timeout });
            }
        };
        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if status.success() {
            return Ok(stdout);
        }
        Err(ToolError::Failed {
            command: rendered,
            status,
            output: format!("{}{}", stdout, stderr),
        })
    }

    fn render<S: AsRef<str>>(&self, args: &[S]) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.prefix.iter().cloned());
        parts.extend(args.iter().map(|a| AsRef::<str>::as_ref(a).to_string()));
        parts.join(" ")
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<thread::JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Pulls the shard count out of `itc utility shards` output.
pub fn parse_shard_count(response: &str) -> Result<usize, ToolError> {
    let value: serde_json::Value = serde_json::from_str(response)
        .map_err(|e| ToolError::BadResponse(format!("shards output is not JSON: {}", e)))?;
    if let Some(error) = value.get("error") {
        return Err(ToolError::BadResponse(format!("node returned an error: {}", error)));
    }
    value
        .get("result")
        .and_then(|r| r.as_array())
        .map(Vec::len)
        .ok_or_else(|| ToolError::BadResponse("shards output has no `result` array".to_string()))
}

impl ChainTool for ItcCli {
    fn validate_address(&self, address: &str) -> Result<(), ToolError> {
        self.call(&["utility", "bech32-to-addr", address], self.timeout)
            .map(|_| ())
    }

    fn shard_count(&self, node: &str) -> Result<usize, ToolError> {
        let response = self.call(&["utility", "shards", "-n", node], self.timeout)?;
        parse_shard_count(&response)
    }

    fn transfer(&self, request: &TransferRequest<'_>) -> Result<String, ToolError> {
        self.call(&request.to_args(), request.process_timeout())
    }
}
