// src/history.rs
use tracing::{debug, info};

use crate::amount::TokenAmount;
use crate::error::{AppError, FormatError};
use crate::models::{DisplayRow, QueryMsg};
use crate::parser;
use crate::rpc::{QueryClient, QueryResponse};
use crate::wallet::{resolve_viewing_key, Wallet};

/// Fetch the transfer history of `owner` on `token_address` and turn it into
/// table rows. Any failure aborts the whole fetch; there are no partial rows.
pub async fn fetch_history(
    wallet: &dyn Wallet,
    client: &dyn QueryClient,
    chain_id: &str,
    owner: &str,
    token_address: &str,
) -> Result<Vec<DisplayRow>, AppError> {
    let token_address = parser::parse_token_address(token_address)?;

    let key = resolve_viewing_key(wallet, chain_id, token_address).await?;

    let history = QueryMsg::transfer_history(owner, &key);
    let txs = match client.query_contract(token_address, &history).await? {
        QueryResponse::Object(payload) => parser::decode_transfer_history(payload)?,
        QueryResponse::Error(message) => return Err(AppError::RemoteQuery(message)),
    };
    debug!("Fetched {} history entries for {}", txs.len(), token_address);

    let token_info = match client.query_contract(token_address, &QueryMsg::TokenInfo {}).await? {
        QueryResponse::Object(payload) => parser::decode_token_info(payload)?,
        QueryResponse::Error(message) => return Err(AppError::RemoteQuery(message)),
    };
    debug!(
        "Token info: {} ({}) decimals = {}",
        token_info.name, token_info.symbol, token_info.decimals
    );

    let rows = txs
        .iter()
        .map(|tx| {
            let amount = TokenAmount::parse(&tx.coins.amount, token_info.decimals)?;
            Ok(parser::project_row(tx, &amount))
        })
        .collect::<Result<Vec<_>, FormatError>>()?;

    info!("Decoded {} transfers of {} for {}", rows.len(), token_info.symbol, owner);
    Ok(rows)
}
