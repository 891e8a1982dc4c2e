//! Message submission: validation, moderation, persistence and the realtime
//! push to the recipient.

use tracing::{debug, info};
use uuid::Uuid;

use chatty_db::models::NewMessage;
use chatty_gateway::Delivery;
use chatty_moderation::ContentKind;
use chatty_types::api::SendMessageRequest;
use chatty_types::events::GatewayEvent;
use chatty_types::models::EnrichedMessage;

use crate::error::ApiError;
use crate::state::{AppState, db_call};

const TEXT_REJECTION: &str = "Message contains inappropriate content";

#[derive(Debug)]
pub struct Submission {
    pub message: EnrichedMessage,
    /// Whether the recipient had a live connection. The sender's response
    /// does not depend on it.
    pub delivery: Delivery,
}

/// Persist one message from `sender_id` to `recipient_id` and push it to the
/// recipient if they are online.
///
/// Nothing is written unless the message has content and passed moderation.
pub async fn submit_message(
    state: &AppState,
    sender_id: &str,
    recipient_id: &str,
    req: SendMessageRequest,
) -> Result<Submission, ApiError> {
    let text = req
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let image = req.image.filter(|i| !i.trim().is_empty());

    if text.is_none() && image.is_none() {
        return Err(ApiError::validation("Message must have text or image"));
    }

    if let Some(text) = &text {
        state
            .moderation
            .evaluate_text(text, ContentKind::MessageBody)
            .await
            .ensure_allowed(TEXT_REJECTION)?;
    }

    let image_url = match &image {
        Some(raw) => Some(state.images.prepare_image(raw, "messages").await?.url),
        None => None,
    };

    let message_id = Uuid::new_v4().to_string();
    let (mid, sid, rid) = (
        message_id.clone(),
        sender_id.to_string(),
        recipient_id.to_string(),
    );
    let row = db_call(state, move |db| {
        db.insert_message(&NewMessage {
            id: &mid,
            sender_id: &sid,
            recipient_id: &rid,
            text: text.as_deref().unwrap_or(""),
            image: image_url.as_deref(),
        })?;
        db.get_enriched_message(&mid)
    })
    .await?
    .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("message {message_id} vanished after insert")))?;

    let message = row.into_message();

    // Fire and forget: the paginated fetch stays authoritative.
    let delivery = state
        .presence
        .deliver(recipient_id, GatewayEvent::NewMessage(message.clone()))
        .await;

    match &delivery {
        Delivery::Pushed(conn) => {
            info!(message_id = %message.id, recipient = recipient_id, conn = %conn, "Message stored and pushed")
        }
        Delivery::Offline => {
            debug!(message_id = %message.id, recipient = recipient_id, "Message stored, recipient offline")
        }
    }

    Ok(Submission { message, delivery })
}
