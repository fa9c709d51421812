//! HTTP surface for the bot: an outgoing-webhook endpoint plus a stats endpoint.

use super::{Bot, IncomingMessage};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(bot: Arc<Bot>) -> Router {
    Router::new()
        .route("/", post(webhook))
        .route("/api/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(bot)
}

/// Binds `addr` and serves the webhook until the server stops.
pub async fn serve(addr: SocketAddr, bot: Arc<Bot>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "starting HTTP server");
    axum::serve(listener, router(bot)).await
}

async fn webhook(State(bot): State<Arc<Bot>>, Form(message): Form<IncomingMessage>) -> Response {
    match bot.handle(&message) {
        Some(reply) => {
            // Flood control: replies are held back, never the chain.
            tokio::time::sleep(bot.config().response_delay).await;
            Json(reply).into_response()
        }
        None => StatusCode::OK.into_response(),
    }
}

async fn stats(State(bot): State<Arc<Bot>>) -> impl IntoResponse {
    Json(bot.chain().stats())
}
