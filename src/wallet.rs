// src/wallet.rs
//! Wallet capability: chain enablement, accounts, viewing keys and the
//! encrypted-query utilities for a chain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Network;
use crate::enigma::{EnigmaUtils, SecretEnigma};
use crate::error::AppError;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("chain {0} is not enabled in the wallet")]
    ChainNotEnabled(String),

    #[error("wallet has no account for {0}")]
    NoAccounts(String),

    #[error("keyring {}: {reason}", .path.display())]
    Keyring { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    pub address: String,
}

#[async_trait]
pub trait OfflineSigner: Send + Sync {
    async fn accounts(&self) -> Result<Vec<AccountData>, WalletError>;
}

/// What the service needs from a wallet.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Ask the wallet to expose `chain_id`.
    async fn enable(&self, chain_id: &str) -> Result<(), WalletError>;

    fn offline_signer(&self, chain_id: &str) -> Result<Arc<dyn OfflineSigner>, WalletError>;

    fn enigma_utils(&self, chain_id: &str) -> Result<Arc<dyn EnigmaUtils>, WalletError>;

    async fn viewing_key(&self, chain_id: &str, token: &str) -> Result<Option<String>, WalletError>;

    /// Ask the wallet to add `token` (and provision its viewing key).
    async fn suggest_token(&self, chain_id: &str, token: &str) -> Result<(), WalletError>;
}

/// Viewing key for `token`, provisioning it once through the wallet if absent.
pub async fn resolve_viewing_key(
    wallet: &dyn Wallet,
    chain_id: &str,
    token: &str,
) -> Result<String, AppError> {
    if let Some(key) = wallet.viewing_key(chain_id, token).await? {
        return Ok(key);
    }

    info!("No viewing key for {} on {}, suggesting token", token, chain_id);
    wallet.suggest_token(chain_id, token).await?;

    wallet
        .viewing_key(chain_id, token)
        .await?
        .ok_or_else(|| AppError::CredentialMissing {
            token: token.to_string(),
        })
}

// ---------- keyring wallet ----------

/// Keys of one chain in the keyring file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainKeys {
    pub address: String,
    #[serde(default)]
    pub encryption_seed: Option<String>, // hex, 32 bytes
    #[serde(default)]
    pub viewing_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Keyring {
    #[serde(default)]
    pub chains: HashMap<String, ChainKeys>,
}

impl Keyring {
    pub fn read(path: &Path) -> Result<Self, WalletError> {
        let keyring_err = |reason: String| WalletError::Keyring {
            path: path.to_path_buf(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| keyring_err(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| keyring_err(e.to_string()))
    }
}

struct KeyringSigner {
    accounts: Vec<AccountData>,
}

#[async_trait]
impl OfflineSigner for KeyringSigner {
    async fn accounts(&self) -> Result<Vec<AccountData>, WalletError> {
        Ok(self.accounts.clone())
    }
}

/// Wallet backed by a JSON keyring file. Keys are provisioned out of band by
/// editing the file; `suggest_token` re-reads it.
pub struct KeyringWallet {
    path: PathBuf,
    keyring: RwLock<Keyring>,
    lcds: HashMap<String, String>,
    http: Client,
    enigmas: Mutex<HashMap<String, Arc<SecretEnigma>>>,
}

impl KeyringWallet {
    pub fn load(path: &Path, networks: &[Network], http: Client) -> Result<Self, WalletError> {
        let keyring = Keyring::read(path)?;
        info!(
            "Loaded keyring {} ({} chains)",
            path.display(),
            keyring.chains.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            keyring: RwLock::new(keyring),
            lcds: networks
                .iter()
                .map(|n| (n.chain_id.clone(), n.lcd.clone()))
                .collect(),
            http,
            enigmas: Mutex::new(HashMap::new()),
        })
    }

    /// Swap in a freshly read keyring. Chains whose encryption seed changed
    /// lose their cached enigma; clients connected later use the new seed.
    fn reload(&self, fresh: Keyring) {
        let stale: Vec<String> = {
            let mut keyring = self.keyring.write().unwrap_or_else(PoisonError::into_inner);
            let stale = keyring
                .chains
                .iter()
                .filter(|(id, old)| {
                    fresh.chains.get(id.as_str()).map(|c| &c.encryption_seed)
                        != Some(&old.encryption_seed)
                })
                .map(|(id, _)| id.clone())
                .collect();
            *keyring = fresh;
            stale
        };

        // keyring lock released first; enigma_utils locks in the other order
        let mut enigmas = self.enigmas.lock().unwrap_or_else(PoisonError::into_inner);
        for chain_id in &stale {
            if enigmas.remove(chain_id).is_some() {
                info!("Encryption seed of {} changed, dropping its query key", chain_id);
            }
        }
    }

    fn chain(&self, chain_id: &str) -> Result<ChainKeys, WalletError> {
        self.keyring
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .chains
            .get(chain_id)
            .cloned()
            .ok_or_else(|| WalletError::ChainNotEnabled(chain_id.to_string()))
    }
}

fn parse_seed(chain_id: &str, hex_seed: &str) -> Result<[u8; 32], WalletError> {
    let bytes = hex::decode(hex_seed.trim().trim_start_matches("0x")).map_err(|e| {
        WalletError::ChainNotEnabled(format!("{chain_id} (bad encryption_seed: {e})"))
    })?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        WalletError::ChainNotEnabled(format!(
            "{chain_id} (encryption_seed must be 32 bytes, got {})",
            bytes.len()
        ))
    })
}

#[async_trait]
impl Wallet for KeyringWallet {
    async fn enable(&self, chain_id: &str) -> Result<(), WalletError> {
        let keys = self.chain(chain_id)?;
        if keys.address.trim().is_empty() {
            return Err(WalletError::NoAccounts(chain_id.to_string()));
        }
        Ok(())
    }

    fn offline_signer(&self, chain_id: &str) -> Result<Arc<dyn OfflineSigner>, WalletError> {
        let keys = self.chain(chain_id)?;
        Ok(Arc::new(KeyringSigner {
            accounts: vec![AccountData {
                address: keys.address,
            }],
        }))
    }

    fn enigma_utils(&self, chain_id: &str) -> Result<Arc<dyn EnigmaUtils>, WalletError> {
        let mut enigmas = self.enigmas.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(enigma) = enigmas.get(chain_id) {
            return Ok(enigma.clone());
        }

        let keys = self.chain(chain_id)?;
        let lcd = self
            .lcds
            .get(chain_id)
            .ok_or_else(|| WalletError::ChainNotEnabled(chain_id.to_string()))?;

        let enigma = match keys.encryption_seed.as_deref() {
            Some(seed) => SecretEnigma::new(parse_seed(chain_id, seed)?, self.http.clone(), lcd),
            None => SecretEnigma::random(self.http.clone(), lcd),
        };
        let enigma = Arc::new(enigma);
        enigmas.insert(chain_id.to_string(), enigma.clone());
        Ok(enigma)
    }

    async fn viewing_key(&self, chain_id: &str, token: &str) -> Result<Option<String>, WalletError> {
        Ok(self.chain(chain_id)?.viewing_keys.get(token).cloned())
    }

    async fn suggest_token(&self, chain_id: &str, token: &str) -> Result<(), WalletError> {
        let fresh = Keyring::read(&self.path)?;
        let provisioned = fresh
            .chains
            .get(chain_id)
            .is_some_and(|c| c.viewing_keys.contains_key(token));
        self.reload(fresh);

        if !provisioned {
            warn!(
                "Token {} has no viewing key in {}; add one under chains.{}.viewing_keys",
                token,
                self.path.display(),
                chain_id
            );
        }
        Ok(())
    }
}
