//! SNIP-20 transfer history service.
//!
//! Connects a wallet to a Secret Network chain, queries a token contract for
//! the account's transfer history and serves the decoded rows as a sortable,
//! paginated table over HTTP.

pub mod amount;
pub mod api;
pub mod config;
pub mod enigma;
pub mod error;
pub mod history;
pub mod models;
pub mod parser;
pub mod rpc;
pub mod session;
pub mod table;
pub mod wallet;
