#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::Notify;

use snip20_history::config::{Network, Token};
use snip20_history::enigma::{CipherError, EnigmaUtils, NONCE_SIZE};
use snip20_history::models::QueryMsg;
use snip20_history::rpc::{ClientFactory, QueryClient, QueryError, QueryResponse};
use snip20_history::session::Controller;
use snip20_history::wallet::{AccountData, OfflineSigner, Wallet, WalletError};

pub const OWNER: &str = "secret1owner";
pub const SSCRT: &str = "secret1k0jntykt7e4g3y88ltc60czgjuqdy4c9e8fzek";
/// Well-formed contract address that is not in any token list
pub const UNLISTED: &str = "secret1zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3rcrt0n";

pub fn networks() -> Vec<Network> {
    vec![
        Network {
            name: "Secret Mainnet".to_string(),
            chain_id: "secret-4".to_string(),
            lcd: "http://mainnet.invalid".to_string(),
            tokens: vec![Token {
                name: "Secret SCRT".to_string(),
                symbol: "sSCRT".to_string(),
                address: SSCRT.to_string(),
            }],
        },
        Network {
            name: "Pulsar Testnet".to_string(),
            chain_id: "pulsar-3".to_string(),
            lcd: "http://pulsar.invalid".to_string(),
            tokens: Vec::new(),
        },
    ]
}

pub fn object(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        other => panic!("not an object: {other}"),
    }
}

/// `transfer_history` payload with `(id, amount, block_time)` entries
pub fn history_payload(entries: &[(u64, &str, Option<u64>)]) -> QueryResponse {
    let txs: Vec<Value> = entries
        .iter()
        .map(|(id, amount, block_time)| {
            let mut tx = json!({
                "id": id,
                "coins": { "denom": "SSCRT", "amount": amount },
                "from": OWNER,
                "sender": OWNER,
                "receiver": format!("secret1receiver{id}"),
                "block_height": 1000 + id,
            });
            if let Some(t) = block_time {
                tx["block_time"] = json!(t);
            }
            tx
        })
        .collect();
    let total = txs.len();
    QueryResponse::Object(object(json!({
        "transfer_history": { "txs": txs, "total": total }
    })))
}

pub fn token_info_payload(decimals: u8) -> QueryResponse {
    QueryResponse::Object(object(json!({
        "token_info": {
            "name": "Secret SCRT",
            "symbol": "SSCRT",
            "decimals": decimals,
            "total_supply": null
        }
    })))
}

// ---------- wallet ----------

struct MockSigner {
    accounts: Vec<AccountData>,
}

#[async_trait]
impl OfflineSigner for MockSigner {
    async fn accounts(&self) -> Result<Vec<AccountData>, WalletError> {
        Ok(self.accounts.clone())
    }
}

/// Passes plaintext through; the mock client never looks at it.
pub struct PlainEnigma;

#[async_trait]
impl EnigmaUtils for PlainEnigma {
    async fn encrypt(&self, contract_code_hash: &str, msg: &Value) -> Result<Vec<u8>, CipherError> {
        let mut out = contract_code_hash.as_bytes().to_vec();
        out.extend(serde_json::to_vec(msg)?);
        Ok(out)
    }

    async fn decrypt(&self, ciphertext: &[u8], _nonce: &[u8; NONCE_SIZE]) -> Result<Vec<u8>, CipherError> {
        Ok(ciphertext.to_vec())
    }
}

/// In-memory wallet. `provision` is the key `suggest_token` installs, if any.
pub struct MockWallet {
    pub accounts: Vec<String>,
    pub keys: Mutex<HashMap<String, String>>,
    pub provision: Option<String>,
    pub calls: Mutex<Vec<String>>,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            accounts: vec![OWNER.to_string()],
            keys: Mutex::new(HashMap::new()),
            provision: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_key(self, token: &str, key: &str) -> Self {
        self.keys.lock().unwrap().insert(token.to_string(), key.to_string());
        self
    }

    pub fn provisioning(mut self, key: &str) -> Self {
        self.provision = Some(key.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Wallet for MockWallet {
    async fn enable(&self, chain_id: &str) -> Result<(), WalletError> {
        self.record(format!("enable {chain_id}"));
        Ok(())
    }

    fn offline_signer(&self, _chain_id: &str) -> Result<Arc<dyn OfflineSigner>, WalletError> {
        Ok(Arc::new(MockSigner {
            accounts: self
                .accounts
                .iter()
                .map(|a| AccountData { address: a.clone() })
                .collect(),
        }))
    }

    fn enigma_utils(&self, _chain_id: &str) -> Result<Arc<dyn EnigmaUtils>, WalletError> {
        Ok(Arc::new(PlainEnigma))
    }

    async fn viewing_key(&self, _chain_id: &str, token: &str) -> Result<Option<String>, WalletError> {
        self.record(format!("viewing_key {token}"));
        Ok(self.keys.lock().unwrap().get(token).cloned())
    }

    async fn suggest_token(&self, _chain_id: &str, token: &str) -> Result<(), WalletError> {
        self.record(format!("suggest_token {token}"));
        if let Some(key) = &self.provision {
            self.keys.lock().unwrap().insert(token.to_string(), key.clone());
        }
        Ok(())
    }
}

// ---------- query client ----------

/// Answers by query name. A scripted `Err` becomes a transport failure.
#[derive(Default)]
pub struct MockClient {
    pub responses: Mutex<HashMap<&'static str, Result<QueryResponse, String>>>,
    pub calls: Mutex<Vec<(String, QueryMsg)>>,
    pub gate: Option<Arc<Notify>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, query: &'static str, response: QueryResponse) -> Self {
        self.responses.lock().unwrap().insert(query, Ok(response));
        self
    }

    pub fn fail(self, query: &'static str, message: &str) -> Self {
        self.responses.lock().unwrap().insert(query, Err(message.to_string()));
        self
    }

    /// Hold every query until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn queried(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|(_, q)| q.name()).collect()
    }

    pub fn contracts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }
}

#[async_trait]
impl QueryClient for MockClient {
    async fn query_contract(
        &self,
        contract_address: &str,
        query: &QueryMsg,
    ) -> Result<QueryResponse, QueryError> {
        self.calls
            .lock()
            .unwrap()
            .push((contract_address.to_string(), query.clone()));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let scripted = self.responses.lock().unwrap().get(query.name()).cloned();
        match scripted {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(QueryError::Malformed(message)),
            None => Ok(QueryResponse::Error(format!("no answer for {}", query.name()))),
        }
    }
}

/// Hands out the same client for every network and remembers the chains.
pub struct MockFactory {
    pub client: Arc<MockClient>,
    pub connected: Mutex<Vec<String>>,
}

impl MockFactory {
    pub fn new(client: Arc<MockClient>) -> Self {
        Self {
            client,
            connected: Mutex::new(Vec::new()),
        }
    }
}

impl ClientFactory for MockFactory {
    fn connect(&self, network: &Network, _enigma: Arc<dyn EnigmaUtils>) -> Arc<dyn QueryClient> {
        self.connected.lock().unwrap().push(network.chain_id.clone());
        self.client.clone()
    }
}

pub struct Harness {
    pub controller: Arc<Controller>,
    pub wallet: Arc<MockWallet>,
    pub client: Arc<MockClient>,
    pub factory: Arc<MockFactory>,
}

pub fn harness(wallet: MockWallet, client: MockClient) -> Harness {
    let wallet = Arc::new(wallet);
    let client = Arc::new(client);
    let factory = Arc::new(MockFactory::new(client.clone()));
    let controller = Controller::new(
        networks(),
        Some(wallet.clone() as Arc<dyn Wallet>),
        factory.clone(),
    )
    .unwrap();
    Harness {
        controller: Arc::new(controller),
        wallet,
        client,
        factory,
    }
}
