use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use folio_db::models::{MessageRow, NewAttachment, parse_timestamp};
use folio_types::api::{MessageResponse, SendMessageRequest};

use crate::config::Config;
use crate::error::ApiError;
use crate::forms::{Payload, UploadedFile};
use crate::media;
use crate::middleware::CurrentUser;
use crate::state::{AppState, run_db};
use crate::threads::participant_thread;
use crate::uploads;
use crate::uuid_of;

const NOT_PARTICIPANT: &str = "You are not in this conversation.";

/// Thread id from either `/threads/{thread_id}/...` or the project-scoped
/// alias. The project id of the alias is ignored.
#[derive(Debug, Deserialize)]
pub struct ThreadPath {
    pub thread_id: String,
}

pub fn message_response(config: &Config, row: &MessageRow) -> MessageResponse {
    MessageResponse {
        id: uuid_of(&row.id),
        thread: uuid_of(&row.thread_id),
        sender: uuid_of(&row.sender_id),
        sender_username: row.sender_username.clone(),
        text: row.text.clone(),
        attachment_url: config.media_link_opt(row.attachment.as_deref()),
        attachment_name: row.attachment_name.clone(),
        created_at: parse_timestamp(&row.created_at),
    }
}

pub async fn list_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(path): Path<ThreadPath>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let (thread, _) = participant_thread(&state, &user, path.thread_id, NOT_PARTICIPANT).await?;
    let rows = run_db(&state, move |db| db.list_messages(&thread.id)).await?;
    Ok(Json(rows.iter().map(|m| message_response(&state.config, m)).collect()))
}

/// Post text, one attachment, or both. Either participant blocking the other
/// closes the thread for sending in both directions.
pub async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(path): Path<ThreadPath>,
    payload: Payload<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (thread, _) = participant_thread(&state, &user, path.thread_id, NOT_PARTICIPANT).await?;
    if thread.state.is_blocked() {
        return Err(ApiError::forbidden("This conversation is blocked."));
    }

    let (text, file) = match payload {
        Payload::Json(req) => (req.text, None),
        Payload::Form(form) => {
            if form.files().len() > 1 {
                return Err(ApiError::validation("attachment", "Attach at most one file per message."));
            }
            let text = form.text("text").unwrap_or_default().to_string();
            (text, form.files().first().cloned())
        }
    };
    let text = text.trim().to_string();
    if text.is_empty() && file.is_none() {
        return Err(ApiError::validation("text", "A message needs text or an attachment."));
    }
    if let Some(file) = &file {
        uploads::check_message_attachment(&file.file_name, file.size())?;
    }

    let attachment = match &file {
        Some(file) => Some(store_attachment(&state, &thread.id, file).await?),
        None => None,
    };

    let sender_id = user.id();
    let thread_id = thread.id.clone();
    let stored = attachment.as_ref().map(|a| a.path.clone());
    let result = run_db(&state, move |db| {
        db.insert_message(&thread_id, &sender_id, &text, attachment.as_ref())
    })
    .await;

    let row = match result {
        Ok(row) => row,
        Err(e) => {
            if let Some(path) = &stored {
                state.media.remove_best_effort(path).await;
            }
            return Err(e);
        }
    };

    Ok((StatusCode::CREATED, Json(message_response(&state.config, &row))))
}

async fn store_attachment(
    state: &AppState,
    thread_id: &str,
    file: &UploadedFile,
) -> Result<NewAttachment, ApiError> {
    let path = state
        .media
        .save(&media::message_dir(thread_id), &file.file_name, &file.data)
        .await?;
    let name = std::path::Path::new(&file.file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(&file.file_name)
        .to_string();
    Ok(NewAttachment { path, name })
}
