use dotenvy::dotenv;
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::{
    env,
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
};
use tracing::info;

const MAINNET_TOKENS: &str = include_str!("../config/tokens.json");

/// A token contract offered in the token selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub symbol: String,
    pub address: String,
}

/// A selectable chain with its LCD endpoint and known tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub chain_id: String,
    pub lcd: String,
    #[serde(default)]
    pub tokens: Vec<Token>,
}

impl Network {
    pub fn token(&self, address: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.address == address)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub networks: Vec<Network>,
    pub wallet_file: Option<PathBuf>,
}

pub fn load() -> Result<Config> {
    dotenv().ok(); // load .env if present

    // API bind address (default: 127.0.0.1)
    let bind_addr = env::var("BIND_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    // API port (default: 8080)
    let port = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    // Networks: JSON file replaces the built-in list
    let mut networks = match env::var("NETWORKS_FILE") {
        Ok(path) => load_networks(&path)?,
        Err(_) => default_networks()?,
    };

    // LCD overrides for the built-in chains
    for (var, chain_id) in [("SECRET_MAINNET_LCD", "secret-4"), ("PULSAR_LCD", "pulsar-3")] {
        if let Ok(lcd) = env::var(var) {
            if let Some(network) = networks.iter_mut().find(|n| n.chain_id == chain_id) {
                network.lcd = lcd;
            }
        }
    }

    if networks.is_empty() {
        return Err(eyre!("no networks configured"));
    }

    // Keyring wallet (absent: wallet actions report the wallet as unavailable)
    let wallet_file = env::var("WALLET_FILE")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from);

    let cfg = Config {
        bind_addr,
        port,
        networks,
        wallet_file,
    };

    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}

/// Secret Mainnet and the Pulsar 3 testnet
pub fn default_networks() -> Result<Vec<Network>> {
    let tokens: Vec<Token> =
        serde_json::from_str(MAINNET_TOKENS).wrap_err("bundled token list is invalid")?;

    Ok(vec![
        Network {
            name: "Secret Mainnet".to_string(),
            chain_id: "secret-4".to_string(),
            lcd: "https://secret.api.trivium.network:1317".to_string(),
            tokens,
        },
        Network {
            name: "Pulsar 3 Testnet".to_string(),
            chain_id: "pulsar-3".to_string(),
            lcd: "https://pulsar.lcd.secretnodes.com".to_string(),
            tokens: Vec::new(),
        },
    ])
}

pub fn load_networks(path: &str) -> Result<Vec<Network>> {
    let text = std::fs::read_to_string(path).wrap_err_with(|| format!("reading {path}"))?;
    let networks: Vec<Network> =
        serde_json::from_str(&text).wrap_err_with(|| format!("parsing {path}"))?;
    Ok(networks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn built_in_networks() {
        let networks = default_networks().unwrap();
        assert_eq!(networks[0].chain_id, "secret-4");
        assert!(!networks[0].tokens.is_empty());
        assert_eq!(networks[1].chain_id, "pulsar-3");
        assert!(networks[1].tokens.is_empty());
    }

    #[test]
    fn networks_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "Local", "chain_id": "secretdev-1", "lcd": "http://localhost:1317",
                 "tokens": [{{"name": "Test", "symbol": "TST", "address": "secret1tst"}}]}}]"#
        )
        .unwrap();

        let networks = load_networks(file.path().to_str().unwrap()).unwrap();
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].token("secret1tst").unwrap().symbol, "TST");
        assert!(networks[0].token("secret1other").is_none());
    }

    #[test]
    fn tokens_default_to_empty() {
        let network: Network = serde_json::from_str(
            r#"{"name": "Local", "chain_id": "secretdev-1", "lcd": "http://localhost:1317"}"#,
        )
        .unwrap();
        assert!(network.tokens.is_empty());
    }
}
