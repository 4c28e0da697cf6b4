use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::info;

use folio_db::models::{MessageRow, ParticipantRow, ThreadRow, parse_timestamp};
use folio_types::api::{ParticipantProfile, ThreadActionRequest, ThreadResponse};
use folio_types::models::{Role, ThreadAction};

use crate::config::Config;
use crate::error::ApiError;
use crate::forms::JsonBody;
use crate::messages::message_response;
use crate::middleware::CurrentUser;
use crate::projects::visible_project;
use crate::state::{AppState, run_db};
use crate::uuid_of;

fn participant_profile(config: &Config, row: &ParticipantRow) -> ParticipantProfile {
    ParticipantProfile {
        user_id: uuid_of(&row.user_id),
        username: row.username.clone(),
        display_name: row.display_name.clone(),
        avatar: config.media_link_opt(row.avatar.as_deref()),
    }
}

/// A thread as seen from `role`'s side.
pub fn thread_response(
    config: &Config,
    thread: &ThreadRow,
    role: Role,
    latest: Option<&MessageRow>,
) -> ThreadResponse {
    let mine = thread.state_of(role);
    let theirs = thread.state_of(role.other());

    ThreadResponse {
        id: uuid_of(&thread.id),
        owner: uuid_of(&thread.owner.user_id),
        owner_username: thread.owner.username.clone(),
        client: uuid_of(&thread.client.user_id),
        client_username: thread.client.username.clone(),
        owner_profile: participant_profile(config, &thread.owner),
        client_profile: participant_profile(config, &thread.client),
        counterpart: participant_profile(config, thread.participant(role.other())),
        origin_project: thread.origin_project_id.as_deref().map(uuid_of),
        is_request: !mine.accepted,
        is_archived: mine.archived,
        is_blocked: mine.blocked_other,
        blocked_by_other: theirs.blocked_other,
        latest_message: latest.map(|m| message_response(config, m)),
        created_at: parse_timestamp(&thread.created_at),
        updated_at: parse_timestamp(&thread.updated_at),
    }
}

/// Responses for a list of threads, with each thread's latest message
/// fetched in one query.
async fn thread_list(
    state: &AppState,
    user_id: &str,
    threads: Vec<ThreadRow>,
) -> Result<Vec<ThreadResponse>, ApiError> {
    let ids: Vec<String> = threads.iter().map(|t| t.id.clone()).collect();
    let latest = run_db(state, move |db| db.latest_messages_for_threads(&ids)).await?;
    let latest: HashMap<&str, &MessageRow> = latest.iter().map(|m| (m.thread_id.as_str(), m)).collect();

    Ok(threads
        .iter()
        .filter_map(|thread| {
            let role = thread.role_of(user_id)?;
            Some(thread_response(&state.config, thread, role, latest.get(thread.id.as_str()).copied()))
        })
        .collect())
}

async fn single_thread(state: &AppState, thread: ThreadRow, role: Role) -> Result<ThreadResponse, ApiError> {
    let ids = vec![thread.id.clone()];
    let latest = run_db(state, move |db| db.latest_messages_for_threads(&ids)).await?;
    Ok(thread_response(&state.config, &thread, role, latest.first()))
}

/// Load a thread and the caller's role in it.
pub async fn participant_thread(
    state: &AppState,
    user: &CurrentUser,
    thread_id: String,
    not_participant: &str,
) -> Result<(ThreadRow, Role), ApiError> {
    let thread = run_db(state, move |db| db.get_thread(&thread_id))
        .await?
        .ok_or(ApiError::NotFound("Thread"))?;
    let role = thread
        .role_of(&user.id())
        .ok_or_else(|| ApiError::forbidden(not_participant))?;
    Ok((thread, role))
}

/// Start (or reopen) the conversation between the caller and a project's owner.
pub async fn start_project_thread(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id();
    let project = visible_project(&state, Some(user_id.clone()), project_id).await?;
    if project.owner_id == user_id {
        return Err(ApiError::bad_request("You cannot start a private chat with yourself."));
    }

    let uid = user_id.clone();
    let (thread, created) = run_db(&state, move |db| {
        db.get_or_create_thread(&uid, &project.owner_id, Some(project.id.as_str()), &uid)
    })
    .await?;

    let role = thread
        .role_of(&user_id)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("caller missing from thread {}", thread.id)))?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(single_thread(&state, thread, role).await?)))
}

pub async fn get_project_thread(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<String>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let user_id = user.id();
    let project = visible_project(&state, Some(user_id.clone()), project_id).await?;

    let uid = user_id.clone();
    let thread = run_db(&state, move |db| db.find_thread(&uid, &project.owner_id))
        .await?
        .ok_or(ApiError::NotFound("Thread"))?;
    let role = thread.role_of(&user_id).ok_or(ApiError::NotFound("Thread"))?;
    Ok(Json(single_thread(&state, thread, role).await?))
}

pub async fn inbox(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ThreadResponse>>, ApiError> {
    let user_id = user.id();
    let uid = user_id.clone();
    let threads = run_db(&state, move |db| db.list_threads_for_user(&uid)).await?;
    Ok(Json(thread_list(&state, &user_id, threads).await?))
}

pub async fn blocked(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ThreadResponse>>, ApiError> {
    let user_id = user.id();
    let uid = user_id.clone();
    let threads = run_db(&state, move |db| db.list_blocked_threads(&uid)).await?;
    Ok(Json(thread_list(&state, &user_id, threads).await?))
}

pub async fn thread_action(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(thread_id): Path<String>,
    JsonBody(req): JsonBody<ThreadActionRequest>,
) -> Result<Response, ApiError> {
    let (thread, role) = participant_thread(&state, &user, thread_id, "Not allowed.").await?;
    let action = ThreadAction::parse(&req.action).ok_or_else(|| ApiError::bad_request("Unknown action."))?;

    if action == ThreadAction::Delete {
        let id = thread.id.clone();
        let attachments = run_db(&state, move |db| db.delete_thread(&id))
            .await?
            .ok_or(ApiError::NotFound("Thread"))?;
        state.media.remove_all_best_effort(&attachments).await;
        info!("{} deleted thread {}", user.username(), thread.id);
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let mut thread_state = thread.state;
    thread_state.apply(role, action);
    let id = thread.id.clone();
    let updated = run_db(&state, move |db| db.save_thread_state(&id, &thread_state))
        .await?
        .ok_or(ApiError::NotFound("Thread"))?;
    info!("{} applied {:?} to thread {}", user.username(), action, updated.id);

    Ok(Json(single_thread(&state, updated, role).await?).into_response())
}
