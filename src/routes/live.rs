//! WebSocket channel for live quiz editing.
//!
//! Once the socket is up the caller is registered as present and receives every
//! `presence` and `changes` event for the quiz. Text frames carrying an
//! apply-change request are run through the coordinator; failures go back
//! to the sender only.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use uuid::Uuid;
use validator::Validate;

use crate::dto::collab_dto::ApplyChangeRequest;
use crate::error::{Error, Result};
use crate::middleware::auth::CallerIdentity;
use crate::services::broadcast::QuizEvent;
use crate::AppState;

#[axum::debug_handler]
pub async fn live_quiz(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(quiz_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    // Presence is only taken once the socket exists.
    state
        .collab_service
        .ensure_editor(quiz_id, caller.user_id)
        .await?;

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, caller, quiz_id))
        .into_response())
}

/// Subscribes, then joins, so the caller sees its own presence frame.
async fn attach(state: &AppState, caller: &CallerIdentity, quiz_id: Uuid) -> Result<Receiver<QuizEvent>> {
    let rx = state.collab_service.subscribe(quiz_id);
    match state
        .collab_service
        .join(quiz_id, caller.user_id, &caller.username)
        .await
    {
        Ok(_) => Ok(rx),
        Err(e) => {
            drop(rx);
            state.collab_service.release(quiz_id);
            Err(e)
        }
    }
}

fn detach(state: &AppState, caller: &CallerIdentity, quiz_id: Uuid, rx: Receiver<QuizEvent>) {
    // The receiver must be gone before leave() so the channel can be pruned.
    drop(rx);
    state.collab_service.leave(quiz_id, caller.user_id);
}

async fn handle_socket(mut socket: WebSocket, state: AppState, caller: CallerIdentity, quiz_id: Uuid) {
    // Rights may have been revoked between the upgrade request and now.
    let mut rx = match attach(&state, &caller, quiz_id).await {
        Ok(rx) => rx,
        Err(e) => {
            let _ = socket.send(Message::Text(error_frame(&e))).await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(error = %e, %quiz_id, "failed to encode quiz event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%quiz_id, user_id = %caller.user_id, skipped, "live editor lagged");
                }
                Err(RecvError::Closed) => break,
            },
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = apply_frame(&state, &caller, quiz_id, &text).await {
                        if sender.send(Message::Text(error_frame(&e))).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, %quiz_id, "websocket receive failed");
                    break;
                }
            },
        }
    }

    detach(&state, &caller, quiz_id, rx);
}

async fn apply_frame(state: &AppState, caller: &CallerIdentity, quiz_id: Uuid, text: &str) -> Result<()> {
    let req: ApplyChangeRequest = serde_json::from_str(text)?;
    req.validate()?;
    state
        .collab_service
        .apply_change(
            quiz_id,
            caller.user_id,
            &req.change_type,
            req.change_data,
            req.version,
        )
        .await?;
    Ok(())
}

fn error_frame(err: &Error) -> String {
    let payload = match err {
        Error::Conflict {
            message,
            current_version,
        } => json!({ "error": message, "current_version": current_version }),
        Error::Database(_) | Error::Internal(_) => json!({ "error": "An unexpected error occurred" }),
        other => json!({ "error": other.to_string() }),
    };
    json!({ "topic": "error", "payload": payload }).to_string()
}
