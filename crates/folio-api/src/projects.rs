use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use folio_db::models::{ImageRow, ProjectFields, ProjectRow, parse_timestamp};
use folio_types::api::{ProjectImageResponse, ProjectInput, ProjectResponse, is_truthy};

use crate::config::Config;
use crate::error::ApiError;
use crate::forms::{MultipartForm, Payload, UploadedFile};
use crate::media;
use crate::middleware::{CurrentUser, Viewer};
use crate::state::{AppState, run_db};
use crate::uploads;
use crate::{uuid_of, validate};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CATEGORY_CHARS: usize = 120;
pub const MAX_LOCATION_CHARS: usize = 140;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub owner: Option<String>,
}

/// Load a project the caller may see. Invisible and missing projects are
/// both reported as not found.
pub async fn visible_project(
    state: &AppState,
    viewer: Option<String>,
    project_id: String,
) -> Result<ProjectRow, ApiError> {
    run_db(state, move |db| db.get_project(&project_id))
        .await?
        .filter(|p| p.visible_to(viewer.as_deref()))
        .ok_or(ApiError::NotFound("Project"))
}

/// Load a project the caller owns; 403 if they can see it but do not own it.
pub async fn owned_project(
    state: &AppState,
    user: &CurrentUser,
    project_id: String,
) -> Result<ProjectRow, ApiError> {
    let user_id = user.id();
    let project = visible_project(state, Some(user_id.clone()), project_id).await?;
    if project.owner_id != user_id {
        return Err(ApiError::forbidden("You do not have permission to modify this project."));
    }
    Ok(project)
}

pub fn image_response(config: &Config, row: &ImageRow) -> ProjectImageResponse {
    ProjectImageResponse {
        id: uuid_of(&row.id),
        project: uuid_of(&row.project_id),
        url: config.media_link(&row.image),
        caption: row.caption.clone(),
        alt_text: row.alt_text.clone(),
        order: u32::try_from(row.sort_order).unwrap_or(0),
        is_cover: row.sort_order == 0,
        created_at: parse_timestamp(&row.created_at),
    }
}

/// Build the response for one project. `images` must be in display order.
pub fn project_response(config: &Config, row: ProjectRow, images: &[ImageRow]) -> ProjectResponse {
    let images: Vec<ProjectImageResponse> = images.iter().map(|img| image_response(config, img)).collect();
    let cover_image = config
        .media_link_opt(row.cover_image.as_deref())
        .or_else(|| images.first().map(|img| img.url.clone()));
    let tech_stack = row
        .tech_stack
        .as_deref()
        .map(|raw| serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())));

    ProjectResponse {
        id: uuid_of(&row.id),
        owner: uuid_of(&row.owner_id),
        owner_username: row.owner_username,
        title: row.title,
        summary: row.summary,
        category: row.category,
        cover_image,
        is_public: row.is_public,
        tech_stack,
        location: row.location,
        budget: row.budget,
        sqf: row.sqf,
        highlights: row.highlights,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
        images,
    }
}

/// Attach images to a batch of projects with one query.
pub async fn with_images(
    state: &AppState,
    rows: Vec<ProjectRow>,
) -> Result<Vec<ProjectResponse>, ApiError> {
    let ids: Vec<String> = rows.iter().map(|p| p.id.clone()).collect();
    let images = run_db(state, move |db| db.list_images_for_projects(&ids)).await?;

    let mut by_project: HashMap<String, Vec<ImageRow>> = HashMap::new();
    for image in images {
        by_project.entry(image.project_id.clone()).or_default().push(image);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let images = by_project.remove(&row.id).unwrap_or_default();
            project_response(&state.config, row, &images)
        })
        .collect())
}

async fn single_response(state: &AppState, row: ProjectRow) -> Result<ProjectResponse, ApiError> {
    let mut responses = with_images(state, vec![row]).await?;
    responses.pop().ok_or_else(|| ApiError::Internal(anyhow::anyhow!("project response missing")))
}

pub async fn list_projects(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProjectResponse>>, ApiError> {
    let viewer_id = viewer.user_id();
    let owner = query.owner.filter(|o| !o.trim().is_empty());
    let rows = run_db(&state, move |db| db.list_projects(viewer_id.as_deref(), owner.as_deref())).await?;
    Ok(Json(with_images(&state, rows).await?))
}

pub async fn my_projects(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ProjectResponse>>, ApiError> {
    let user_id = user.id();
    let rows = run_db(&state, move |db| db.list_projects_by_owner(&user_id)).await?;
    Ok(Json(with_images(&state, rows).await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let project = visible_project(&state, viewer.user_id(), project_id).await?;
    Ok(Json(single_response(&state, project).await?))
}

pub async fn create_project(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Payload<ProjectInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (mut fields, cover) = project_fields(payload)?;
    match fields.title.as_deref() {
        None => return Err(ApiError::validation("title", "This field is required.")),
        Some(title) if title.trim().is_empty() => {
            return Err(ApiError::validation("title", "This field may not be blank."));
        }
        _ => {}
    }

    let owner_id = user.id();
    let project_id = Uuid::new_v4().to_string();
    let mut uploaded = None;
    if let Some(file) = cover {
        let dir = media::project_cover_dir(&owner_id, &project_id);
        let path = state.media.save(&dir, &file.file_name, &file.data).await?;
        fields.cover_image = Some(Some(path.clone()));
        uploaded = Some(path);
    }

    let project = match run_db(&state, move |db| db.insert_project(&project_id, &owner_id, &fields)).await {
        Ok(project) => project,
        Err(e) => {
            if let Some(path) = &uploaded {
                state.media.remove_best_effort(path).await;
            }
            return Err(e);
        }
    };
    info!("Created project {} for {}", project.id, user.username());

    Ok((StatusCode::CREATED, Json(single_response(&state, project).await?)))
}

pub async fn update_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<String>,
    payload: Payload<ProjectInput>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let project = owned_project(&state, &user, project_id).await?;
    let (mut fields, cover) = project_fields(payload)?;
    if let Some(title) = &fields.title {
        if title.trim().is_empty() {
            return Err(ApiError::validation("title", "This field may not be blank."));
        }
    }

    let mut uploaded = None;
    if let Some(file) = cover {
        let dir = media::project_cover_dir(&project.owner_id, &project.id);
        let path = state.media.save(&dir, &file.file_name, &file.data).await?;
        fields.cover_image = Some(Some(path.clone()));
        uploaded = Some(path);
    }

    let id = project.id.clone();
    let updated = match run_db(&state, move |db| db.update_project(&id, &fields)).await {
        Ok(Some(updated)) => updated,
        Ok(None) => return Err(ApiError::NotFound("Project")),
        Err(e) => {
            if let Some(path) = &uploaded {
                state.media.remove_best_effort(path).await;
            }
            return Err(e);
        }
    };

    if let Some(old) = &project.cover_image {
        if updated.cover_image.as_ref() != Some(old) {
            state.media.remove_best_effort(old).await;
        }
    }

    Ok(Json(single_response(&state, updated).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let project = owned_project(&state, &user, project_id).await?;

    let id = project.id.clone();
    let deleted = run_db(&state, move |db| db.delete_project(&id))
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    state.media.remove_all_best_effort(&deleted.files).await;

    info!("{} deleted project {}", user.username(), project.id);
    Ok(StatusCode::NO_CONTENT)
}

/// Validated field changes plus an optional cover upload.
fn project_fields(
    payload: Payload<ProjectInput>,
) -> Result<(ProjectFields, Option<UploadedFile>), ApiError> {
    let (fields, cover) = match payload {
        Payload::Json(input) => {
            if matches!(input.cover_image, Some(Some(_))) {
                return Err(ApiError::validation(
                    "cover_image",
                    "Upload a file with multipart/form-data to set the cover; send null to clear it.",
                ));
            }
            let tech_stack = match input.tech_stack {
                Some(Some(value)) => Some(Some(encode_tech_stack(&value)?)),
                Some(None) => Some(None),
                None => None,
            };
            let fields = ProjectFields {
                title: input.title,
                summary: input.summary,
                category: input.category,
                is_public: input.is_public,
                tech_stack,
                location: input.location,
                budget: input.budget,
                sqf: input.sqf,
                highlights: input.highlights,
                cover_image: input.cover_image.map(|_| None),
            };
            (fields, None)
        }
        Payload::Form(form) => fields_from_form(&form)?,
    };

    if let Some(title) = &fields.title {
        validate::max_chars("title", title, MAX_TITLE_CHARS)?;
    }
    if let Some(category) = &fields.category {
        validate::max_chars("category", category, MAX_CATEGORY_CHARS)?;
    }
    if let Some(location) = &fields.location {
        validate::max_chars("location", location, MAX_LOCATION_CHARS)?;
    }
    if let Some(Some(budget)) = fields.budget {
        if !budget.is_finite() || budget < 0.0 {
            return Err(ApiError::validation("budget", "Ensure this value is greater than or equal to 0."));
        }
    }
    if let Some(Some(sqf)) = fields.sqf {
        if sqf < 0 {
            return Err(ApiError::validation("sqf", "Ensure this value is greater than or equal to 0."));
        }
    }

    Ok((fields, cover))
}

fn fields_from_form(form: &MultipartForm) -> Result<(ProjectFields, Option<UploadedFile>), ApiError> {
    let text = |name: &str| form.text(name).map(str::to_string);

    let budget = match form.text("budget").map(str::trim) {
        None => None,
        Some("") => Some(None),
        Some(raw) => Some(Some(
            raw.parse::<f64>()
                .map_err(|_| ApiError::validation("budget", "A valid number is required."))?,
        )),
    };
    let sqf = match form.text("sqf").map(str::trim) {
        None => None,
        Some("") => Some(None),
        Some(raw) => Some(Some(
            raw.parse::<i64>()
                .map_err(|_| ApiError::validation("sqf", "A valid integer is required."))?,
        )),
    };
    let tech_stack = match form.text("tech_stack").map(str::trim) {
        None => None,
        Some("") => Some(None),
        Some(raw) => {
            // Either a JSON document or a plain comma-separated list.
            let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| {
                Value::Array(
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| Value::String(s.to_string()))
                        .collect(),
                )
            });
            Some(Some(encode_tech_stack(&value)?))
        }
    };

    let cover = match form.file("cover_image") {
        Some(file) => {
            uploads::check_image("cover_image", file)?;
            Some(file.clone())
        }
        None => None,
    };
    let cover_image = match (&cover, form.text("cover_image")) {
        (None, Some(v)) if v.trim().is_empty() => Some(None),
        _ => None,
    };

    let fields = ProjectFields {
        title: text("title"),
        summary: text("summary"),
        category: text("category"),
        is_public: form.text("is_public").map(|v| is_truthy(&Value::String(v.to_string()))),
        tech_stack,
        location: text("location"),
        budget,
        sqf,
        highlights: text("highlights"),
        cover_image,
    };
    Ok((fields, cover))
}

fn encode_tech_stack(value: &Value) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::validation("tech_stack", e.to_string()))
}
