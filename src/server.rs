//! Webhook HTTP 服务
//!
//! `POST /webhook/{room_id}`：请求体为任意 JSON，渲染后逐条发送到房间。
//!
//! | 结果 | 状态码 |
//! |------|--------|
//! | 发送成功 | 200 `{"status": "ok"}` |
//! | bot 不在房间 | 403 `{"status": "forbidden", "error": "forbidden"}` |
//! | 请求体不是 JSON | 400 |
//! | 其他发送失败 | 502 |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::alert::classify_and_render;
use crate::delivery::{deliver_all, MessageSink};
use crate::mode::ModeSwitch;

/// 路由共享状态
pub struct AppState {
    pub sink: Arc<dyn MessageSink>,
    pub mode: Arc<ModeSwitch>,
}

impl AppState {
    pub fn new(sink: Arc<dyn MessageSink>, mode: Arc<ModeSwitch>) -> Self {
        Self { sink, mode }
    }
}

/// 创建 webhook 路由
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook/{room_id}", post(handle_webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// 启动服务，直到 `shutdown` 完成
pub async fn serve(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Webhook server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Webhook server failed")
}

async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let room_id = room_id.trim();
    debug!(room_id = %room_id, body = %String::from_utf8_lossy(&body), "Webhook body");

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(room_id = %room_id, error = %e, "Webhook body is not valid JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "error": format!("invalid JSON: {e}")})),
            );
        }
    };

    let mode = state.mode.current();
    let (kind, messages) = classify_and_render(&payload, mode);
    info!(
        room_id = %room_id,
        kind = kind.map_or("raw", |k| k.as_str()),
        mode = %mode,
        messages = messages.len(),
        "Webhook received"
    );

    match deliver_all(state.sink.as_ref(), room_id, &messages).await {
        Ok(_) => (StatusCode::OK, Json(json!({"status": "ok"}))),
        Err(e) if e.is_forbidden() => {
            error!(
                room_id = %room_id,
                "Could not send to room: forbidden. Most likely the bot is not invited in the room"
            );
            (
                StatusCode::FORBIDDEN,
                Json(json!({"status": "forbidden", "error": "forbidden"})),
            )
        }
        Err(e) => {
            error!(room_id = %room_id, error = %e, "Failed to deliver alert");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"status": "error", "error": e.to_string()})),
            )
        }
    }
}
