// src/models.rs
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};

/// Fixed page size of every `transfer_history` query. No cursor is ever sent,
/// so histories longer than this are truncated by the contract.
pub const HISTORY_PAGE_SIZE: u32 = 10_000;

/// Amount plus unit label as carried by a history entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String, // Uint128 as a decimal string
}

/// One entry of a SNIP-20 transfer history
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransferRecord {
    #[serde(deserialize_with = "u64_from_string_or_number")]
    pub id: u64,
    pub coins: Coin,
    pub from: String,
    pub sender: String,
    pub receiver: String,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub block_time: Option<u64>, // not populated by every contract
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferHistory {
    pub txs: Vec<TransferRecord>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferHistoryResponse {
    pub transfer_history: TransferHistory,
}

/// `token_info` answer of a SNIP-20 contract
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default)]
    pub total_supply: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfoResponse {
    pub token_info: TokenMetadata,
}

/// Contract queries this client sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
    TransferHistory {
        address: String,
        key: String,
        page_size: u32,
        should_filter_decoys: bool,
    },
    TokenInfo {},
}

impl QueryMsg {
    pub fn transfer_history(address: &str, key: &str) -> Self {
        QueryMsg::TransferHistory {
            address: address.to_string(),
            key: key.to_string(),
            page_size: HISTORY_PAGE_SIZE,
            should_filter_decoys: true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QueryMsg::TransferHistory { .. } => "transfer_history",
            QueryMsg::TokenInfo {} => "token_info",
        }
    }
}

/// One table row derived from a `TransferRecord`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub id: u64,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_value: Option<Decimal>,
    pub from: String,
    pub sender: String,
    pub receiver: String,
    pub block_height: Option<u64>,
    pub block_time: String,

    // sort keys
    #[serde(skip)]
    pub raw_amount: u128,
    #[serde(skip)]
    pub raw_block_time: Option<u64>,
}

fn u64_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    match Id::deserialize(deserializer)? {
        Id::Number(n) => Ok(n),
        Id::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}
