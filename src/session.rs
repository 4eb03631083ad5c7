// src/session.rs
//! User-facing state: selected network and token, connected wallet, last
//! result set, and the phase machine that keeps one action running at a time.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{error, info};

use crate::config::Network;
use crate::error::AppError;
use crate::history;
use crate::models::DisplayRow;
use crate::rpc::{ClientFactory, QueryClient};
use crate::table::{self, TablePage, TableQuery};
use crate::wallet::Wallet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Connecting,
    Querying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Connecting => write!(f, "connecting"),
            Phase::Querying => write!(f, "querying"),
        }
    }
}

/// Token picked in the selector; `Other` means the free-text address is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "address", rename_all = "snake_case")]
pub enum TokenSelection {
    Known(String),
    Other,
}

impl TokenSelection {
    /// First known token of `network`, or `Other` when it lists none.
    pub fn default_for(network: &Network) -> Self {
        network
            .tokens
            .first()
            .map(|t| TokenSelection::Known(t.address.clone()))
            .unwrap_or(TokenSelection::Other)
    }
}

#[derive(Clone)]
pub struct ConnectedWallet {
    pub address: String,
    pub client: Arc<dyn QueryClient>,
}

/// Handle for one running action; completing with a stale ticket is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    seq: u64,
    phase: Phase,
}

pub struct Session {
    network: Network,
    token: TokenSelection,
    custom_address: String,
    wallet: Option<ConnectedWallet>,
    phase: Phase,
    seq: u64,
    rows: Option<Arc<Vec<DisplayRow>>>,
    last_error: Option<String>,
}

impl Session {
    pub fn new(network: Network) -> Self {
        Self {
            token: TokenSelection::default_for(&network),
            network,
            custom_address: String::new(),
            wallet: None,
            phase: Phase::Idle,
            seq: 0,
            rows: None,
            last_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn token(&self) -> &TokenSelection {
        &self.token
    }

    pub fn wallet(&self) -> Option<&ConnectedWallet> {
        self.wallet.as_ref()
    }

    pub fn rows(&self) -> Option<Arc<Vec<DisplayRow>>> {
        self.rows.clone()
    }

    fn ensure_idle(&self) -> Result<(), AppError> {
        match self.phase {
            Phase::Idle => Ok(()),
            busy => Err(AppError::Busy(busy)),
        }
    }

    /// Switch chains: token selection goes back to the default and the
    /// connected wallet and results are dropped.
    pub fn select_network(&mut self, network: Network) -> Result<(), AppError> {
        self.ensure_idle()?;
        self.token = TokenSelection::default_for(&network);
        self.network = network;
        self.wallet = None;
        self.rows = None;
        Ok(())
    }

    pub fn select_token(&mut self, selection: TokenSelection) -> Result<(), AppError> {
        self.ensure_idle()?;
        if let TokenSelection::Known(address) = &selection {
            if self.network.token(address).is_none() {
                return Err(AppError::UnknownToken(address.clone()));
            }
        }
        self.token = selection;
        Ok(())
    }

    pub fn set_custom_address(&mut self, address: &str) -> Result<(), AppError> {
        self.ensure_idle()?;
        self.custom_address = address.trim().to_string();
        Ok(())
    }

    /// Contract the next submit queries.
    pub fn token_address(&self) -> &str {
        match &self.token {
            TokenSelection::Known(address) => address,
            TokenSelection::Other => &self.custom_address,
        }
    }

    pub fn begin(&mut self, phase: Phase) -> Result<Ticket, AppError> {
        self.ensure_idle()?;
        self.seq += 1;
        self.phase = phase;
        Ok(Ticket {
            seq: self.seq,
            phase,
        })
    }

    /// Return to `Idle`. False when `ticket` is no longer the running action.
    pub fn finish(&mut self, ticket: &Ticket) -> bool {
        if ticket.seq != self.seq || ticket.phase != self.phase {
            return false;
        }
        self.phase = Phase::Idle;
        true
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase,
            network: NetworkRef {
                name: self.network.name.clone(),
                chain_id: self.network.chain_id.clone(),
            },
            token: self.token.clone(),
            custom_address: self.custom_address.clone(),
            token_address: self.token_address().to_string(),
            connected_address: self.wallet.as_ref().map(|w| w.address.clone()),
            rows: self.rows.as_ref().map(|r| r.len()),
            last_error: self.last_error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkRef {
    pub name: String,
    pub chain_id: String,
}

/// Serializable snapshot of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub phase: Phase,
    pub network: NetworkRef,
    pub token: TokenSelection,
    pub custom_address: String,
    pub token_address: String,
    pub connected_address: Option<String>,
    pub rows: Option<usize>,
    pub last_error: Option<String>,
}

/// Drives a `Session` with the injected wallet and query clients.
pub struct Controller {
    networks: Vec<Network>,
    wallet: Option<Arc<dyn Wallet>>,
    clients: Arc<dyn ClientFactory>,
    session: Mutex<Session>,
}

impl Controller {
    pub fn new(
        networks: Vec<Network>,
        wallet: Option<Arc<dyn Wallet>>,
        clients: Arc<dyn ClientFactory>,
    ) -> Result<Self, AppError> {
        let first = networks
            .first()
            .cloned()
            .ok_or_else(|| AppError::UnknownNetwork("<none configured>".to_string()))?;

        Ok(Self {
            networks,
            wallet,
            clients,
            session: Mutex::new(Session::new(first)),
        })
    }

    // never held across an await
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    pub fn view(&self) -> SessionView {
        self.session().view()
    }

    /// Log a failed action and keep it as the session's last error.
    fn report<T>(&self, action: &str, result: Result<T, AppError>) -> Result<T, AppError> {
        let mut session = self.session();
        match &result {
            Ok(_) => session.last_error = None,
            Err(e) => {
                error!("{} failed: {} ({:?})", action, e, e);
                session.last_error = Some(e.to_string());
            }
        }
        result
    }

    pub fn select_network(&self, chain_id: &str) -> Result<SessionView, AppError> {
        let result = match self.networks.iter().find(|n| n.chain_id == chain_id) {
            Some(network) => {
                let mut session = self.session();
                session.select_network(network.clone()).map(|_| session.view())
            }
            None => Err(AppError::UnknownNetwork(chain_id.to_string())),
        };
        if result.is_ok() {
            info!("Selected network {}", chain_id);
        }
        self.report("select network", result)
    }

    /// Pick a listed token, or `Other` with an optional free-text address.
    pub fn select_token(
        &self,
        address: Option<&str>,
        custom_address: Option<&str>,
    ) -> Result<SessionView, AppError> {
        let result = {
            let mut session = self.session();
            let selection = match address {
                Some(a) if !a.trim().is_empty() => TokenSelection::Known(a.trim().to_string()),
                _ => TokenSelection::Other,
            };
            session.select_token(selection).and_then(|_| {
                if let Some(text) = custom_address {
                    session.set_custom_address(text)?;
                }
                Ok(session.view())
            })
        };
        self.report("select token", result)
    }

    /// Enable the selected chain in the wallet and remember its first account.
    pub async fn connect(&self) -> Result<String, AppError> {
        let result = self.try_connect().await;
        self.report("connect wallet", result)
    }

    async fn try_connect(&self) -> Result<String, AppError> {
        let wallet = self.wallet.clone().ok_or(AppError::WalletUnavailable)?;

        let (ticket, network) = {
            let mut session = self.session();
            let ticket = session.begin(Phase::Connecting)?;
            (ticket, session.network.clone())
        };

        let outcome = self.open_wallet(wallet.as_ref(), &network).await;

        let mut session = self.session();
        session.finish(&ticket);
        let connected = outcome?;
        let address = connected.address.clone();
        info!("Connected {} on {}", address, network.chain_id);
        session.wallet = Some(connected);
        Ok(address)
    }

    async fn open_wallet(&self, wallet: &dyn Wallet, network: &Network) -> Result<ConnectedWallet, AppError> {
        let chain_id = network.chain_id.as_str();
        wallet.enable(chain_id).await?;

        let signer = wallet.offline_signer(chain_id)?;
        let account = signer
            .accounts()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::WalletNotConnected(format!("no account for {chain_id}")))?;

        let enigma = wallet.enigma_utils(chain_id)?;
        Ok(ConnectedWallet {
            address: account.address,
            client: self.clients.connect(network, enigma),
        })
    }

    /// Query the selected token's history. Previous rows are cleared first and
    /// stay empty when the query fails. Returns the number of rows.
    pub async fn submit(&self) -> Result<usize, AppError> {
        let result = self.try_submit().await;
        self.report("submit", result)
    }

    async fn try_submit(&self) -> Result<usize, AppError> {
        let wallet = self.wallet.clone().ok_or(AppError::WalletUnavailable)?;

        let (ticket, chain_id, connected, token_address) = {
            let mut session = self.session();
            let connected = session
                .wallet
                .clone()
                .ok_or_else(|| AppError::WalletNotConnected("connect a wallet first".to_string()))?;
            let ticket = session.begin(Phase::Querying)?;
            session.rows = None;
            (
                ticket,
                session.network.chain_id.clone(),
                connected,
                session.token_address().to_string(),
            )
        };

        let outcome = history::fetch_history(
            wallet.as_ref(),
            connected.client.as_ref(),
            &chain_id,
            &connected.address,
            &token_address,
        )
        .await;

        let mut session = self.session();
        session.finish(&ticket);
        let rows = outcome?;
        let count = rows.len();
        session.rows = Some(Arc::new(rows));
        Ok(count)
    }

    /// One page of the last result set.
    pub fn transactions(&self, query: &TableQuery) -> Result<TablePage, AppError> {
        let rows = self.session().rows().ok_or(AppError::NoResults)?;
        Ok(table::render_page(&rows, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Token;

    fn network(chain_id: &str, tokens: &[&str]) -> Network {
        Network {
            name: chain_id.to_uppercase(),
            chain_id: chain_id.to_string(),
            lcd: "http://localhost:1317".to_string(),
            tokens: tokens
                .iter()
                .map(|a| Token {
                    name: a.to_string(),
                    symbol: a.to_uppercase(),
                    address: a.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn defaults_to_first_token_or_other() {
        let s = Session::new(network("secret-4", &["secret1a", "secret1b"]));
        assert_eq!(s.token(), &TokenSelection::Known("secret1a".into()));
        assert_eq!(s.token_address(), "secret1a");

        let s = Session::new(network("pulsar-3", &[]));
        assert_eq!(s.token(), &TokenSelection::Other);
        assert_eq!(s.token_address(), "");
    }

    #[test]
    fn only_one_action_at_a_time() {
        let mut s = Session::new(network("secret-4", &["secret1a"]));
        let ticket = s.begin(Phase::Connecting).unwrap();
        assert!(matches!(s.begin(Phase::Querying), Err(AppError::Busy(Phase::Connecting))));
        assert!(matches!(
            s.select_network(network("pulsar-3", &[])),
            Err(AppError::Busy(_))
        ));
        assert!(matches!(s.set_custom_address("x"), Err(AppError::Busy(_))));

        assert!(s.finish(&ticket));
        assert_eq!(s.phase(), Phase::Idle);
        assert!(!s.finish(&ticket), "a ticket completes once");
    }

    #[test]
    fn stale_ticket_does_not_end_a_newer_action() {
        let mut s = Session::new(network("secret-4", &[]));
        let old = s.begin(Phase::Connecting).unwrap();
        assert!(s.finish(&old));
        let _new = s.begin(Phase::Querying).unwrap();
        assert!(!s.finish(&old));
        assert_eq!(s.phase(), Phase::Querying);
    }

    #[test]
    fn switching_network_resets_selection() {
        let mut s = Session::new(network("secret-4", &["secret1a", "secret1b"]));
        s.select_token(TokenSelection::Known("secret1b".into())).unwrap();
        s.rows = Some(Arc::new(Vec::new()));

        s.select_network(network("pulsar-3", &[])).unwrap();
        assert_eq!(s.token(), &TokenSelection::Other);
        assert!(s.wallet().is_none());
        assert!(s.rows().is_none());
        assert_eq!(s.network().chain_id, "pulsar-3");
    }

    #[test]
    fn unknown_token_is_rejected() {
        let mut s = Session::new(network("secret-4", &["secret1a"]));
        assert!(matches!(
            s.select_token(TokenSelection::Known("secret1zzz".into())),
            Err(AppError::UnknownToken(_))
        ));
        s.select_token(TokenSelection::Other).unwrap();
        s.set_custom_address("  secret1custom ").unwrap();
        assert_eq!(s.token_address(), "secret1custom");
    }

    #[test]
    fn view_reports_selection() {
        let s = Session::new(network("secret-4", &["secret1a"]));
        let v = serde_json::to_value(s.view()).unwrap();
        assert_eq!(v["phase"], "idle");
        assert_eq!(v["network"]["chain_id"], "secret-4");
        assert_eq!(v["token"]["kind"], "known");
        assert_eq!(v["token"]["address"], "secret1a");
        assert!(v["connected_address"].is_null());
        assert!(v["rows"].is_null());
    }
}
