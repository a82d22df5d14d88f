use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use log::info;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;

const NODE_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum SanityError {
    #[error("{0} does not exist")]
    Missing(PathBuf),
    #[error("{0} is not a file")]
    NotAFile(PathBuf),
    #[error("unable to connect to node {node}: {source}")]
    Unreachable {
        node: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("bad response code ({status}) from node {node}")]
    BadStatus { node: String, status: StatusCode },
    #[error("unknown chain id '{0}', expected one of: mainnet, testnet, stressnet, partner, dryrun")]
    UnknownChainId(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainId {
    Mainnet,
    Testnet,
    Stressnet,
    Partner,
    Dryrun,
}

impl ChainId {
    pub const ALL: [ChainId; 5] = [
        ChainId::Mainnet,
        ChainId::Testnet,
        ChainId::Stressnet,
        ChainId::Partner,
        ChainId::Dryrun,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::Mainnet => "mainnet",
            ChainId::Testnet => "testnet",
            ChainId::Stressnet => "stressnet",
            ChainId::Partner => "partner",
            ChainId::Dryrun => "dryrun",
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainId {
    type Err = SanityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChainId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| SanityError::UnknownChainId(s.to_string()))
    }
}

/// Expands a leading `~` against `$HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

pub fn check_csv_path(path: &Path) -> Result<(), SanityError> {
    if !path.exists() {
        return Err(SanityError::Missing(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(SanityError::NotAFile(path.to_path_buf()));
    }
    Ok(())
}

/// Probes the node with a plain GET. Certificates are not verified.
pub fn check_node(node: &str) -> Result<(), SanityError> {
    let client = Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(NODE_PROBE_TIMEOUT)
        .build()
        .map_err(|source| SanityError::Unreachable { node: node.to_string(), source })?;
    check_node_with(&client, node)
}

pub fn check_node_with(client: &Client, node: &str) -> Result<(), SanityError> {
    let status = client
        .get(node)
        .send()
        .map_err(|source| SanityError::Unreachable { node: node.to_string(), source })?
        .status();
    if status != StatusCode::OK {
        return Err(SanityError::BadStatus { node: node.to_string(), status });
    }
    info!("Node {} is reachable", node);
    Ok(())
}
