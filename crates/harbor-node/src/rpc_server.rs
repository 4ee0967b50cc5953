//! HTTP API
//!
//! A thin adapter over [`NodeContext`]; response bodies keep the shapes
//! peer nodes and the dashboard already consume.

use crate::context::NodeContext;
use crate::error::NodeError;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use harbor_consensus::Resolution;
use harbor_core::contract::ContractSubmission;
use harbor_core::party::PartyDescriptor;
use harbor_core::types::ContractId;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) | Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Self::MiningCancelled | Self::Superseded => StatusCode::CONFLICT,
            Self::PortNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({ "message": self.to_string(), "code": self.code() });
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for NodeError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedRequest(rejection.body_text())
    }
}

/// Build the API router
pub fn router(ctx: Arc<NodeContext>) -> Router {
    let mut app = Router::new()
        .route("/mine", get(mine))
        .route("/contracts/new", post(new_contract))
        .route("/chain", get(full_chain))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(consensus))
        .route("/port", get(own_port))
        .route("/contract/:id/is_done", get(is_contract_done))
        .route("/contract/:id/export_oracle", post(export_oracle))
        .route("/metrics", get(metrics));

    if ctx.config().rpc.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app.with_state(ctx)
}

/// HTTP API server
pub struct RpcServer {
    address: String,
    ctx: Arc<NodeContext>,
}

impl RpcServer {
    pub fn new(address: &str, ctx: Arc<NodeContext>) -> Self {
        Self {
            address: address.to_string(),
            ctx,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr: SocketAddr = self.address.parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("HTTP API listening on {}", addr);
        serve(listener, self.ctx).await
    }
}

/// Serve the API on an already bound listener
pub async fn serve(listener: tokio::net::TcpListener, ctx: Arc<NodeContext>) -> anyhow::Result<()> {
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

async fn mine(State(ctx): State<Arc<NodeContext>>) -> Result<Json<Value>, NodeError> {
    let block = ctx.mine().await?;
    Ok(Json(json!({
        "message": "New Block Forged",
        "index": block.index,
        "transactions": block.transactions,
        "proof": block.proof,
        "previous_hash": block.previous_hash,
    })))
}

async fn new_contract(
    State(ctx): State<Arc<NodeContext>>,
    payload: Result<Json<ContractSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), NodeError> {
    let Json(submission) = payload?;
    let index = ctx.submit(submission)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": format!("Transaction will be added to Block {}", index) })),
    ))
}

async fn full_chain(State(ctx): State<Arc<NodeContext>>) -> impl IntoResponse {
    Json(ctx.chain())
}

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    nodes: Option<Vec<PartyDescriptor>>,
}

async fn register_nodes(
    State(ctx): State<Arc<NodeContext>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return NodeError::from(rejection).into_response(),
    };
    let Some(nodes) = request.nodes else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Error: Please supply a valid list of nodes" })),
        )
            .into_response();
    };

    let total = ctx.register_parties(nodes);
    (
        StatusCode::CREATED,
        Json(json!({
            "message": "New nodes have been added",
            "total_nodes": total,
        })),
    )
        .into_response()
}

async fn consensus(State(ctx): State<Arc<NodeContext>>) -> Json<Value> {
    let resolution = ctx.resolve().await;
    let chain = ctx.chain().chain;

    Json(match resolution {
        Resolution::Replaced { .. } => json!({
            "message": "Our chain was replaced",
            "new_chain": chain,
        }),
        Resolution::Kept { .. } => json!({
            "message": "Our chain is authoritative",
            "chain": chain,
        }),
    })
}

async fn own_port(State(ctx): State<Arc<NodeContext>>) -> Response {
    match ctx.own_party() {
        Ok(party) => Json(party).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, Json(json!({ "status": "port not found" }))).into_response(),
    }
}

async fn is_contract_done(State(ctx): State<Arc<NodeContext>>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    if ctx.is_confirmed(&ContractId::new(id)) {
        (StatusCode::OK, Json(json!({ "status": "done" })))
    } else {
        (StatusCode::NOT_ACCEPTABLE, Json(json!({ "status": "not done" })))
    }
}

async fn export_oracle(State(ctx): State<Arc<NodeContext>>, Path(id): Path<String>) -> Json<Value> {
    ctx.confirm(ContractId::new(id));
    Json(json!({ "status": "OK" }))
}

async fn metrics(State(ctx): State<Arc<NodeContext>>) -> Result<impl IntoResponse, NodeError> {
    let body = ctx.metrics().render()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
