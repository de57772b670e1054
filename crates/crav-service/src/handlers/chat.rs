//! Chat widget handler.

use axum::Json;
use serde::{Deserialize, Serialize};

use crav_core::reply_to;

use crate::error::ApiError;

/// Chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Visitor message.
    pub message: String,
}

/// Chat response.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// Canned reply.
    pub reply: String,
    /// Rule that matched, or `fallback`.
    pub topic: String,
}

/// Answer a widget message from the keyword table.
pub async fn chat(Json(body): Json<ChatRequest>) -> Result<Json<ChatResponse>, ApiError> {
    let reply = reply_to(&body.message)?;
    tracing::debug!(topic = reply.topic, "Chat reply");
    Ok(Json(ChatResponse {
        reply: reply.reply.to_string(),
        topic: reply.topic.to_string(),
    }))
}
