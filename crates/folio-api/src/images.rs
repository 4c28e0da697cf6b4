use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use folio_db::models::{ImageChanges, NewImage};
use folio_types::api::{ProjectImageResponse, UpdateImageRequest};

use crate::error::ApiError;
use crate::forms::{JsonBody, MultipartForm};
use crate::media;
use crate::middleware::{CurrentUser, Viewer};
use crate::projects::{image_response, owned_project, visible_project};
use crate::state::{AppState, run_db};
use crate::uploads;
use crate::validate;

const MAX_ALT_TEXT_CHARS: usize = 200;
const MAX_CAPTION_CHARS: usize = 240;

pub async fn list_images(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<ProjectImageResponse>>, ApiError> {
    let project = visible_project(&state, viewer.user_id(), project_id).await?;
    let images = run_db(&state, move |db| db.list_images(&project.id)).await?;
    Ok(Json(images.iter().map(|img| image_response(&state.config, img)).collect()))
}

/// Append uploaded files to the gallery. Captions are matched to files by
/// position.
pub async fn upload_images(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(project_id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let project = owned_project(&state, &user, project_id).await?;
    let form = MultipartForm::read(multipart).await?;

    let files = form.files_named(&["images", "image"]);
    if files.is_empty() {
        return Err(ApiError::validation("images", "No images were uploaded."));
    }
    for file in &files {
        uploads::check_image("images", file)?;
    }
    let mut captions = form.texts("captions[]");
    if captions.is_empty() {
        captions = form.texts("captions");
    }
    for caption in &captions {
        validate::max_chars("captions", caption, MAX_CAPTION_CHARS)?;
    }

    let dir = media::project_images_dir(&project.owner_id, &project.id);
    let mut new_images = Vec::with_capacity(files.len());
    for (index, file) in files.iter().enumerate() {
        let path = match state.media.save(&dir, &file.file_name, &file.data).await {
            Ok(path) => path,
            Err(e) => {
                let saved: Vec<String> = new_images.iter().map(|n: &NewImage| n.image.clone()).collect();
                state.media.remove_all_best_effort(&saved).await;
                return Err(e.into());
            }
        };
        new_images.push(NewImage {
            image: path,
            caption: captions.get(index).map(|c| c.to_string()).unwrap_or_default(),
        });
    }

    let saved: Vec<String> = new_images.iter().map(|n| n.image.clone()).collect();
    let id = project.id.clone();
    let created = match run_db(&state, move |db| db.add_images(&id, &new_images)).await {
        Ok(created) => created,
        Err(e) => {
            state.media.remove_all_best_effort(&saved).await;
            return Err(e);
        }
    };

    info!("Added {} images to project {}", created.len(), project.id);
    let body: Vec<ProjectImageResponse> =
        created.iter().map(|img| image_response(&state.config, img)).collect();
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn update_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, image_id)): Path<(String, String)>,
    JsonBody(req): JsonBody<UpdateImageRequest>,
) -> Result<Json<ProjectImageResponse>, ApiError> {
    let project = owned_project(&state, &user, project_id).await?;
    if let Some(caption) = &req.caption {
        validate::max_chars("caption", caption, MAX_CAPTION_CHARS)?;
    }
    if let Some(alt_text) = &req.alt_text {
        validate::max_chars("alt_text", alt_text, MAX_ALT_TEXT_CHARS)?;
    }

    let changes = ImageChanges {
        make_cover: req.wants_cover(),
        caption: req.caption,
        alt_text: req.alt_text,
        position: req.order,
    };
    let updated = run_db(&state, move |db| db.update_image(&project.id, &image_id, &changes))
        .await?
        .ok_or(ApiError::NotFound("Image"))?;

    Ok(Json(image_response(&state.config, &updated)))
}

pub async fn delete_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((project_id, image_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let project = owned_project(&state, &user, project_id).await?;
    let path = run_db(&state, move |db| db.delete_image(&project.id, &image_id))
        .await?
        .ok_or(ApiError::NotFound("Image"))?;
    state.media.remove_best_effort(&path).await;
    Ok(StatusCode::NO_CONTENT)
}
