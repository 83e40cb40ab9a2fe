// src/api/mod.rs
use crate::error::ExplorerError;
use crate::gateway::UpstreamGateway;
use crate::types::ChainTransaction;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Largest transaction page the provider serves per request.
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Clone)]
pub struct ApiState {
    pub gateway: Arc<UpstreamGateway>,
}

#[derive(Debug, Deserialize)]
pub struct BlockchainQuery {
    pub address: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct BlockchainResponse {
    pub address: String,
    pub n_tx: u64,
    pub total_received: u64,
    pub total_sent: u64,
    pub final_balance: u64,
    pub txs: Vec<ChainTransaction>,
    pub cached: bool,
    #[serde(rename = "cacheTimestamp")]
    pub cache_timestamp: chrono::DateTime<chrono::Utc>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/blockchain", get(blockchain_handler))
        .with_state(state)
}

/// Bind and serve the API. The client key for inbound rate limiting is the
/// peer IP.
pub async fn serve(addr: SocketAddr, state: ApiState) -> Result<(), ExplorerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API listening");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

async fn blockchain_handler(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(params): Query<BlockchainQuery>,
) -> Response {
    let address = match params.address.as_deref().map(str::trim) {
        Some(address) if !address.is_empty() => address.to_string(),
        _ => return error_response(&ExplorerError::MissingAddress),
    };
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0);
    let client_key = peer.ip().to_string();

    match state.gateway.fetch(&address, limit, offset, &client_key).await {
        Ok(response) => {
            let snapshot = response.snapshot;
            let body = BlockchainResponse {
                address: snapshot.address,
                n_tx: snapshot.n_tx,
                total_received: snapshot.total_received,
                total_sent: snapshot.total_sent,
                final_balance: snapshot.final_balance,
                txs: snapshot.txs,
                cached: response.served_from_cache,
                cache_timestamp: response.cache_timestamp,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

/// Map an explorer error onto the HTTP surface: 400 for validation, 429 for
/// both rate-limit flavors (the local one carries the limiter headers), 500
/// for everything else.
fn error_response(err: &ExplorerError) -> Response {
    match err {
        ExplorerError::MissingAddress | ExplorerError::InvalidAddress(_) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),

        ExplorerError::ClientRateLimited {
            retry_after_seconds,
            limit,
            reset_at,
        } => (
            StatusCode::TOO_MANY_REQUESTS,
            [
                ("retry-after", retry_after_seconds.to_string()),
                ("x-ratelimit-limit", limit.to_string()),
                ("x-ratelimit-reset", reset_at.to_rfc3339()),
            ],
            Json(json!({
                "error": err.to_string(),
                "retryAfter": retry_after_seconds,
            })),
        )
            .into_response(),

        ExplorerError::UpstreamRateLimited { .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": err.to_string(),
                "suggestion": "The data provider is throttling requests, wait a moment and retry",
            })),
        )
            .into_response(),

        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Failed to fetch address data",
                "details": err.to_string(),
            })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_validation_errors_map_to_400() {
        let response = error_response(&ExplorerError::MissingAddress);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_client_rate_limit_maps_to_429_with_headers() {
        let response = error_response(&ExplorerError::ClientRateLimited {
            retry_after_seconds: 42,
            limit: 10,
            reset_at: Utc::now(),
        });

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers.get("retry-after").unwrap(), "42");
        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "10");
        assert!(headers.contains_key("x-ratelimit-reset"));
    }

    #[test]
    fn test_upstream_rate_limit_maps_to_429_without_limiter_headers() {
        let response = error_response(&ExplorerError::UpstreamRateLimited {
            retry_after_seconds: None,
        });

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(!response.headers().contains_key("x-ratelimit-limit"));
    }

    #[test]
    fn test_exhausted_upstream_maps_to_500() {
        let response = error_response(&ExplorerError::RetriesExhausted {
            attempts: 3,
            last_error: "connection reset".to_string(),
        });
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
