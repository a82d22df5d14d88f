use serde::{Serialize, Deserialize};

const REDACTED: &str = "********";

/// Columns every input CSV must carry, in the order they are documented.
pub const CSV_COLUMNS: [&str; 9] = [
    "from",
    "to",
    "amount",
    "from-shard",
    "to-shard",
    "passphrase-file",
    "passphrase-string",
    "gas-price",
    "gas-limit",
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Passphrase {
    #[serde(rename = "passphrase-file")]
    File(String),
    #[serde(rename = "passphrase-string")]
    Literal(String),
}

/// One entry of the batch file handed to `itc transfer --file`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct BatchTransaction {
    pub from: String,
    pub to: String,
    pub amount: String,
    pub from_shard: String,
    pub to_shard: String,
    #[serde(flatten)]
    pub passphrase: Passphrase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<String>,
    pub stop_on_error: bool,
}

impl BatchTransaction {
    pub fn new(
        from: String,
        to: String,
        amount: String,
        from_shard: u32,
        to_shard: u32,
        passphrase: Passphrase,
    ) -> Self {
        BatchTransaction {
            from,
            to,
            amount,
            from_shard: from_shard.to_string(),
            to_shard: to_shard.to_string(),
            passphrase,
            gas_price: None,
            gas_limit: None,
            stop_on_error: true,
        }
    }

    /// Copy safe to print or persist: literal passphrases are masked.
    pub fn redacted(&self) -> Self {
        let mut tx = self.clone();
        if let Passphrase::Literal(_) = tx.passphrase {
            tx.passphrase = Passphrase::Literal(REDACTED.to_string());
        }
        tx
    }
}

pub fn redact_all(transactions: &[BatchTransaction]) -> Vec<BatchTransaction> {
    transactions.iter().map(BatchTransaction::redacted).collect()
}
