use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use folio_db::models::{CommentRow, parse_timestamp};
use folio_types::api::{CommentRequest, CommentResponse};

use crate::error::ApiError;
use crate::forms::JsonBody;
use crate::middleware::{CurrentUser, Viewer};
use crate::projects::visible_project;
use crate::state::{AppState, run_db};
use crate::uuid_of;

pub const MAX_COMMENT_CHARS: usize = 5000;

fn to_response(row: CommentRow) -> CommentResponse {
    CommentResponse {
        id: uuid_of(&row.id),
        project: uuid_of(&row.project_id),
        author: uuid_of(&row.author_id),
        author_username: row.author_username,
        text: row.text,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

fn clean_text(text: &str) -> Result<String, ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::validation("text", "This field may not be blank."));
    }
    if text.chars().count() > MAX_COMMENT_CHARS {
        return Err(ApiError::validation(
            "text",
            format!("Ensure this field has no more than {} characters.", MAX_COMMENT_CHARS),
        ));
    }
    Ok(text.to_string())
}

pub async fn list_comments(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    let project = visible_project(&state, viewer.user_id(), project_id).await?;
    let rows = run_db(&state, move |db| db.list_comments(&project.id)).await?;
    Ok(Json(rows.into_iter().map(to_response).collect()))
}

pub async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<String>,
    JsonBody(req): JsonBody<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let author_id = user.id();
    let project = visible_project(&state, Some(author_id.clone()), project_id).await?;
    let text = clean_text(&req.text)?;

    let row = run_db(&state, move |db| db.create_comment(&project.id, &author_id, &text)).await?;
    Ok((StatusCode::CREATED, Json(to_response(row))))
}

pub async fn get_comment(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((project_id, comment_id)): Path<(String, String)>,
) -> Result<Json<CommentResponse>, ApiError> {
    let project = visible_project(&state, viewer.user_id(), project_id).await?;
    let row = run_db(&state, move |db| db.get_comment(&project.id, &comment_id))
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;
    Ok(Json(to_response(row)))
}

/// Load a comment for mutation by its author.
async fn authored_comment(
    state: &AppState,
    user: &CurrentUser,
    project_id: String,
    comment_id: String,
) -> Result<CommentRow, ApiError> {
    let project = visible_project(state, Some(user.id()), project_id).await?;
    let comment = run_db(state, move |db| db.get_comment(&project.id, &comment_id))
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;
    if comment.author_id != user.id() {
        return Err(ApiError::forbidden("Only the author can change this comment."));
    }
    Ok(comment)
}

pub async fn update_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, comment_id)): Path<(String, String)>,
    JsonBody(req): JsonBody<CommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = authored_comment(&state, &user, project_id, comment_id).await?;
    let text = clean_text(&req.text)?;

    let row = run_db(&state, move |db| db.update_comment(&comment.project_id, &comment.id, &text))
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;
    Ok(Json(to_response(row)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, comment_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let comment = authored_comment(&state, &user, project_id, comment_id).await?;
    let deleted = run_db(&state, move |db| db.delete_comment(&comment.project_id, &comment.id)).await?;
    if !deleted {
        return Err(ApiError::NotFound("Comment"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_text_rules() {
        assert_eq!(clean_text("  nice work  ").expect("ok"), "nice work");
        assert!(clean_text("   ").is_err());
        assert!(clean_text(&"x".repeat(MAX_COMMENT_CHARS)).is_ok());
        assert!(clean_text(&"x".repeat(MAX_COMMENT_CHARS + 1)).is_err());
    }
}
