use axum::{
    Json,
    extract::{Path, State},
};

use folio_db::models::parse_timestamp;
use folio_types::api::{FavoriteResponse, FavoriteStatus};

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::projects::{visible_project, with_images};
use crate::state::{AppState, run_db};
use crate::uuid_of;

pub async fn favorite_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<String>,
) -> Result<Json<FavoriteStatus>, ApiError> {
    let user_id = user.id();
    let project = visible_project(&state, Some(user_id.clone()), project_id).await?;
    let is_favorited = run_db(&state, move |db| db.is_favorited(&user_id, &project.id)).await?;
    Ok(Json(FavoriteStatus { is_favorited }))
}

/// Idempotent: answers 200 whether or not the favorite already existed.
pub async fn add_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<String>,
) -> Result<Json<FavoriteStatus>, ApiError> {
    let user_id = user.id();
    let project = visible_project(&state, Some(user_id.clone()), project_id).await?;
    run_db(&state, move |db| db.add_favorite(&user_id, &project.id)).await?;
    Ok(Json(FavoriteStatus { is_favorited: true }))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<String>,
) -> Result<Json<FavoriteStatus>, ApiError> {
    let user_id = user.id();
    let project = visible_project(&state, Some(user_id.clone()), project_id).await?;
    run_db(&state, move |db| db.remove_favorite(&user_id, &project.id)).await?;
    Ok(Json(FavoriteStatus { is_favorited: false }))
}

pub async fn list_favorites(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<FavoriteResponse>>, ApiError> {
    let user_id = user.id();
    let rows = run_db(&state, move |db| db.list_favorites(&user_id)).await?;

    let (favorites, projects): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
    let projects = with_images(&state, projects).await?;

    let body = favorites
        .into_iter()
        .zip(projects)
        .map(|(favorite, project)| FavoriteResponse {
            id: uuid_of(&favorite.id),
            project,
            created_at: parse_timestamp(&favorite.created_at),
        })
        .collect();
    Ok(Json(body))
}
