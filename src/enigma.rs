// src/enigma.rs
//! Secret Network query encryption.
//!
//! A query is sealed with AES-128-SIV under a key derived from an x25519
//! exchange between the wallet's key and the chain's consensus IO key:
//!
//! `key = HKDF-SHA256(salt, shared_secret || nonce)`
//!
//! and travels as `nonce (32) || our_pubkey (32) || ciphertext`.

use aes_siv::{siv::Aes128Siv, KeyInit};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;
use x25519_dalek::{PublicKey, StaticSecret};

pub const NONCE_SIZE: usize = 32;
pub const PUBKEY_SIZE: usize = 32;

/// Fixed HKDF salt of the Secret Network encryption scheme.
const HKDF_SALT: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x4b, 0xea, 0xd8, 0xdf, 0x69,
    0x99, 0x08, 0x52, 0xc2, 0x02, 0xdb, 0x0e, 0x00, 0x97, 0xc1, 0xa1, 0x2e, 0xa6, 0x37, 0xd7,
    0xe9, 0x6d,
];

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("failed to fetch consensus IO key: {0}")]
    ConsensusKey(String),

    #[error("key derivation failed")]
    KeyDerivation,

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,

    #[error("failed to serialize query: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Encrypted-query capability handed out by a wallet for one chain.
#[async_trait]
pub trait EnigmaUtils: Send + Sync {
    /// Seal `contract_code_hash || json(msg)`; the output starts with the nonce.
    async fn encrypt(&self, contract_code_hash: &str, msg: &Value) -> Result<Vec<u8>, CipherError>;

    /// Open a node answer sealed under the key of `nonce`.
    async fn decrypt(&self, ciphertext: &[u8], nonce: &[u8; NONCE_SIZE]) -> Result<Vec<u8>, CipherError>;
}

#[derive(Debug, Deserialize)]
struct TxKeyResponse {
    key: String,
}

/// `EnigmaUtils` backed by an x25519 seed and the chain's LCD endpoint.
pub struct SecretEnigma {
    secret: StaticSecret,
    public: PublicKey,
    http: Client,
    lcd: String,
    consensus_key: OnceCell<[u8; 32]>,
}

impl SecretEnigma {
    pub fn new(seed: [u8; 32], http: Client, lcd: &str) -> Self {
        let secret = StaticSecret::from(seed);
        let public = PublicKey::from(&secret);
        Self {
            secret,
            public,
            http,
            lcd: lcd.trim_end_matches('/').to_string(),
            consensus_key: OnceCell::new(),
        }
    }

    /// Seeded with fresh OS randomness.
    pub fn random(http: Client, lcd: &str) -> Self {
        Self::new(generate_seed(), http, lcd)
    }

    /// Skip the network lookup of the consensus IO key.
    pub fn with_consensus_key(seed: [u8; 32], consensus_key: [u8; 32]) -> Self {
        let enigma = Self::new(seed, Client::new(), "");
        // a fresh cell cannot be full
        let _ = enigma.consensus_key.set(consensus_key);
        enigma
    }

    pub fn public_key(&self) -> [u8; PUBKEY_SIZE] {
        *self.public.as_bytes()
    }

    async fn consensus_key(&self) -> Result<[u8; 32], CipherError> {
        self.consensus_key
            .get_or_try_init(|| async {
                let url = format!("{}/registration/v1beta1/tx-key", self.lcd);
                debug!("Fetching consensus IO key from {}", url);

                let resp: TxKeyResponse = self
                    .http
                    .get(&url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| CipherError::ConsensusKey(e.to_string()))?
                    .json()
                    .await
                    .map_err(|e| CipherError::ConsensusKey(e.to_string()))?;

                let bytes = STANDARD
                    .decode(resp.key.trim())
                    .map_err(|e| CipherError::ConsensusKey(e.to_string()))?;
                <[u8; 32]>::try_from(bytes.as_slice())
                    .map_err(|_| CipherError::ConsensusKey(format!("key is {} bytes", bytes.len())))
            })
            .await
            .copied()
    }

    async fn tx_key(&self, nonce: &[u8; NONCE_SIZE]) -> Result<[u8; 32], CipherError> {
        let io_key = PublicKey::from(self.consensus_key().await?);
        derive_tx_key(&self.secret, &io_key, nonce)
    }
}

#[async_trait]
impl EnigmaUtils for SecretEnigma {
    async fn encrypt(&self, contract_code_hash: &str, msg: &Value) -> Result<Vec<u8>, CipherError> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let key = self.tx_key(&nonce).await?;
        let mut plaintext = contract_code_hash.as_bytes().to_vec();
        plaintext.extend_from_slice(serde_json::to_string(msg)?.as_bytes());

        let ciphertext = seal(&key, &plaintext)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + PUBKEY_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(self.public.as_bytes());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    async fn decrypt(&self, ciphertext: &[u8], nonce: &[u8; NONCE_SIZE]) -> Result<Vec<u8>, CipherError> {
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }
        let key = self.tx_key(nonce).await?;
        open(&key, ciphertext)
    }
}

pub fn generate_seed() -> [u8; 32] {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    seed
}

/// Per-message key shared between `secret` and the holder of `peer`.
pub fn derive_tx_key(
    secret: &StaticSecret,
    peer: &PublicKey,
    nonce: &[u8; NONCE_SIZE],
) -> Result<[u8; 32], CipherError> {
    let shared = secret.diffie_hellman(peer);

    let mut ikm = Vec::with_capacity(32 + NONCE_SIZE);
    ikm.extend_from_slice(shared.as_bytes());
    ikm.extend_from_slice(nonce);

    let hk = Hkdf::<Sha256>::new(Some(&HKDF_SALT[..]), &ikm);
    let mut okm = [0u8; 32];
    hk.expand(&[], &mut okm).map_err(|_| CipherError::KeyDerivation)?;
    Ok(okm)
}

pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let mut siv = Aes128Siv::new_from_slice(key).map_err(|_| CipherError::Encrypt)?;
    siv.encrypt([&[] as &[u8]], plaintext)
        .map_err(|_| CipherError::Encrypt)
}

pub fn open(key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let mut siv = Aes128Siv::new_from_slice(key).map_err(|_| CipherError::Decrypt)?;
    siv.decrypt([&[] as &[u8]], ciphertext)
        .map_err(|_| CipherError::Decrypt)
}
