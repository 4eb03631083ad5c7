use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::{Config, Network};
use crate::error::AppError;
use crate::session::{Controller, SessionView};
use crate::table::{TablePage, TableQuery};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkRequest {
    pub chain_id: String,
}

/// `address` picks a listed token; leaving it out selects "Other", where
/// `custom_address` is the contract queried.
#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TokenRequest {
    pub address: Option<String>,
    pub custom_address: Option<String>,
}

pub fn router(controller: Arc<Controller>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "SNIP-20 history API running" }))
        .route("/networks", get(get_networks))
        .route("/session", get(get_session))
        .route("/session/network", post(post_network))
        .route("/session/token", post(post_token))
        .route("/session/connect", post(post_connect))
        .route("/session/submit", post(post_submit))
        .route("/transactions", get(get_transactions))
        .layer(cors)
        .with_state(controller)
}

pub async fn serve(cfg: &Config, controller: Arc<Controller>) -> eyre::Result<()> {
    let app = router(controller);

    let addr = SocketAddr::new(cfg.bind_addr, cfg.port);
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn get_networks(State(controller): State<Arc<Controller>>) -> Json<Vec<Network>> {
    Json(controller.networks().to_vec())
}

async fn get_session(State(controller): State<Arc<Controller>>) -> Json<SessionView> {
    Json(controller.view())
}

async fn post_network(
    State(controller): State<Arc<Controller>>,
    Json(req): Json<NetworkRequest>,
) -> Result<Json<SessionView>, AppError> {
    controller.select_network(&req.chain_id).map(Json)
}

async fn post_token(
    State(controller): State<Arc<Controller>>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<SessionView>, AppError> {
    controller
        .select_token(req.address.as_deref(), req.custom_address.as_deref())
        .map(Json)
}

async fn post_connect(State(controller): State<Arc<Controller>>) -> Result<Json<Value>, AppError> {
    let address = controller.connect().await?;
    Ok(Json(json!({ "address": address })))
}

async fn post_submit(State(controller): State<Arc<Controller>>) -> Result<Json<Value>, AppError> {
    let rows = controller.submit().await?;
    Ok(Json(json!({ "rows": rows })))
}

async fn get_transactions(
    State(controller): State<Arc<Controller>>,
    Query(query): Query<TableQuery>,
) -> Result<Json<TablePage>, AppError> {
    controller.transactions(&query).map(Json)
}
