// src/rpc.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Network;
use crate::enigma::{CipherError, EnigmaUtils, NONCE_SIZE};
use crate::models::QueryMsg;
use crate::parser::parse_token_address;

/// Outcome of a contract query: a JSON object, or the string the remote
/// side answers with when the query fails.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    Object(Map<String, Value>),
    Error(String),
}

impl QueryResponse {
    /// Classify a decoded payload; anything but an object is a failure.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => QueryResponse::Object(map),
            Value::String(s) => QueryResponse::Error(s),
            other => QueryResponse::Error(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed LCD response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Read access to contracts on one chain.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn query_contract(
        &self,
        contract_address: &str,
        query: &QueryMsg,
    ) -> Result<QueryResponse, QueryError>;
}

/// Builds a query client once a wallet is connected to a network.
pub trait ClientFactory: Send + Sync {
    fn connect(&self, network: &Network, enigma: Arc<dyn EnigmaUtils>) -> Arc<dyn QueryClient>;
}

#[derive(Debug, Deserialize)]
struct CodeHashResponse {
    code_hash: String,
}

#[derive(Debug, Deserialize)]
struct QueryDataResponse {
    data: String,
}

#[derive(Debug, Deserialize)]
struct LcdErrorResponse {
    #[serde(default)]
    message: String,
}

/// Contract queries over the Secret compute REST routes of an LCD endpoint.
pub struct LcdQueryClient {
    http: Client,
    lcd: String,
    enigma: Arc<dyn EnigmaUtils>,
    code_hashes: Mutex<HashMap<String, String>>,
}

impl LcdQueryClient {
    pub fn new(http: Client, lcd: &str, enigma: Arc<dyn EnigmaUtils>) -> Self {
        Self {
            http,
            lcd: lcd.trim_end_matches('/').to_string(),
            enigma,
            code_hashes: Mutex::new(HashMap::new()),
        }
    }

    /// Contract code hash, or the LCD's error message.
    async fn code_hash(&self, contract_address: &str) -> Result<Result<String, String>, QueryError> {
        let cached = self
            .code_hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(contract_address)
            .cloned();
        if let Some(hash) = cached {
            return Ok(Ok(hash));
        }

        let url = format!(
            "{}/compute/v1beta1/code_hash/by_contract_address/{}",
            self.lcd, contract_address
        );
        debug!("Sending code_hash lookup → {}", url);

        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Ok(Err(lcd_error_message(status, &text)));
        }

        let parsed: CodeHashResponse =
            serde_json::from_str(&text).map_err(|e| QueryError::Malformed(e.to_string()))?;
        let hash = parsed.code_hash.trim_start_matches("0x").to_lowercase();

        self.code_hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(contract_address.to_string(), hash.clone());

        Ok(Ok(hash))
    }

    async fn decrypt_payload(&self, data: &str, nonce: &[u8; NONCE_SIZE]) -> Result<Vec<u8>, QueryError> {
        let ciphertext = STANDARD
            .decode(data.trim())
            .map_err(|e| QueryError::Malformed(format!("query data: {e}")))?;
        Ok(self.enigma.decrypt(&ciphertext, nonce).await?)
    }
}

#[async_trait]
impl QueryClient for LcdQueryClient {
    async fn query_contract(
        &self,
        contract_address: &str,
        query: &QueryMsg,
    ) -> Result<QueryResponse, QueryError> {
        // the address becomes a URL path segment
        let contract_address = parse_token_address(contract_address)
            .map_err(|e| QueryError::Malformed(e.to_string()))?;

        let code_hash = match self.code_hash(contract_address).await? {
            Ok(hash) => hash,
            Err(message) => return Ok(QueryResponse::Error(message)),
        };

        let msg = serde_json::to_value(query).map_err(CipherError::from)?;
        let sealed = self.enigma.encrypt(&code_hash, &msg).await?;
        let nonce: [u8; NONCE_SIZE] = sealed
            .get(..NONCE_SIZE)
            .and_then(|n| n.try_into().ok())
            .ok_or_else(|| QueryError::Malformed("encrypted query shorter than its nonce".into()))?;

        let url = format!("{}/compute/v1beta1/query/{}", self.lcd, contract_address);
        info!("Sending {} query → {} ({})", query.name(), self.lcd, contract_address);

        let resp = self
            .http
            .get(&url)
            .query(&[("query", STANDARD.encode(&sealed))])
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let message = lcd_error_message(status, &text);
            return match encrypted_error(&message).map(str::to_owned) {
                Some(encrypted) => {
                    let plain = self.decrypt_payload(&encrypted, &nonce).await?;
                    Ok(QueryResponse::Error(String::from_utf8_lossy(&plain).into_owned()))
                }
                None => Ok(QueryResponse::Error(message)),
            };
        }

        let parsed: QueryDataResponse =
            serde_json::from_str(&text).map_err(|e| QueryError::Malformed(e.to_string()))?;
        let plain = self.decrypt_payload(&parsed.data, &nonce).await?;

        // the decrypted payload is itself base64 of the contract's JSON answer
        let json_bytes = STANDARD
            .decode(&plain)
            .map_err(|e| QueryError::Malformed(format!("decrypted data: {e}")))?;
        let value: Value = serde_json::from_slice(&json_bytes)
            .map_err(|e| QueryError::Malformed(format!("contract answer: {e}")))?;

        Ok(QueryResponse::from_value(value))
    }
}

/// Creates one `LcdQueryClient` per connected network, sharing an HTTP pool.
#[derive(Debug, Clone, Default)]
pub struct LcdClientFactory {
    http: Client,
}

impl LcdClientFactory {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

impl ClientFactory for LcdClientFactory {
    fn connect(&self, network: &Network, enigma: Arc<dyn EnigmaUtils>) -> Arc<dyn QueryClient> {
        Arc::new(LcdQueryClient::new(self.http.clone(), &network.lcd, enigma))
    }
}

fn lcd_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<LcdErrorResponse>(body) {
        Ok(err) if !err.message.is_empty() => err.message,
        _ if body.trim().is_empty() => format!("LCD returned HTTP {status}"),
        _ => body.trim().to_string(),
    }
}

/// Base64 ciphertext embedded as `encrypted: <data>: ...` in a node error.
fn encrypted_error(message: &str) -> Option<&str> {
    let start = message.find("encrypted: ")? + "encrypted: ".len();
    let rest = &message[start..];
    let end = rest.find(':').unwrap_or(rest.len());
    let data = rest[..end].trim();
    (!data.is_empty()).then_some(data)
}
