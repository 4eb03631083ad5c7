// src/parser.rs
use chrono::{Local, TimeZone};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::amount::TokenAmount;
use crate::error::FormatError;
use crate::models::{
    DisplayRow, TokenInfoResponse, TokenMetadata, TransferHistoryResponse, TransferRecord,
};

/// Shown instead of a date when the contract does not record block times.
pub const UNSUPPORTED_BLOCK_TIME: &str = "Not Supported for this Token";

/// Bech32 prefix of Secret Network accounts and contracts.
pub const SECRET_HRP: &str = "secret";

/// Trim `address` and check it is a checksummed `secret1...` address of a
/// 20- or 32-byte account.
pub fn parse_token_address(address: &str) -> Result<&str, FormatError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(FormatError::EmptyTokenAddress);
    }

    let invalid = || FormatError::InvalidTokenAddress(address.to_string());
    let (hrp, data) = bech32::decode(address).map_err(|_| invalid())?;
    if hrp.to_lowercase() != SECRET_HRP || !matches!(data.len(), 20 | 32) {
        return Err(invalid());
    }
    Ok(address)
}

fn decode<T: DeserializeOwned>(what: &'static str, payload: Map<String, Value>) -> Result<T, FormatError> {
    serde_json::from_value(Value::Object(payload)).map_err(|e| FormatError::Payload {
        what,
        reason: e.to_string(),
    })
}

/// Decode a `transfer_history` answer into its records
pub fn decode_transfer_history(payload: Map<String, Value>) -> Result<Vec<TransferRecord>, FormatError> {
    let resp: TransferHistoryResponse = decode("transfer_history", payload)?;
    Ok(resp.transfer_history.txs)
}

/// Decode a `token_info` answer
pub fn decode_token_info(payload: Map<String, Value>) -> Result<TokenMetadata, FormatError> {
    let resp: TokenInfoResponse = decode("token_info", payload)?;
    Ok(resp.token_info)
}

/// Render Unix seconds as `M/D/YYYY, h:mm:ss AM` in the given zone.
pub fn format_block_time_in<Tz>(secs: u64, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let millis = i64::try_from(secs).ok()?.checked_mul(1000)?;
    let dt = tz.timestamp_millis_opt(millis).single()?;
    Some(dt.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string())
}

/// Block time column value in local time, or the unsupported marker.
pub fn format_block_time(block_time: Option<u64>) -> String {
    match block_time {
        Some(secs) => format_block_time_in(secs, &Local).unwrap_or_else(|| secs.to_string()),
        None => UNSUPPORTED_BLOCK_TIME.to_string(),
    }
}

/// Map a history record and its scaled amount into a table row
pub fn project_row(record: &TransferRecord, amount: &TokenAmount) -> DisplayRow {
    DisplayRow {
        id: record.id,
        amount: amount.with_denom(&record.coins.denom),
        amount_value: amount.to_decimal(),
        from: record.from.clone(),
        sender: record.sender.clone(),
        receiver: record.receiver.clone(),
        block_height: record.block_height,
        block_time: format_block_time(record.block_time),
        raw_amount: amount.raw(),
        raw_block_time: record.block_time,
    }
}
