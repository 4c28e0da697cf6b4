use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;

use folio_db::models::{ProfileChanges, ProfileRow};
use folio_types::api::{ProfileResponse, UpdateProfileRequest};

use crate::config::Config;
use crate::error::ApiError;
use crate::forms::{MultipartForm, Payload};
use crate::media::{self, MediaStore};
use crate::middleware::CurrentUser;
use crate::state::{AppState, run_db};
use crate::uploads;
use crate::validate;

const IMAGE_FIELDS: [&str; 3] = ["logo", "avatar", "banner"];

pub fn to_response(config: &Config, row: ProfileRow) -> ProfileResponse {
    ProfileResponse {
        username: row.username,
        display_name: row.display_name,
        company_name: row.company_name,
        location: row.service_location.clone(),
        service_location: row.service_location,
        coverage_radius_miles: row.coverage_radius_miles.and_then(|v| u32::try_from(v).ok()),
        bio: row.bio,
        contact_email: row.contact_email,
        contact_phone: row.contact_phone,
        logo: config.media_link_opt(row.logo.as_deref()),
        avatar: config.media_link_opt(row.avatar.as_deref()),
        banner: config.media_link_opt(row.banner.as_deref()),
    }
}

pub async fn get_me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user_id = user.id();
    let row = run_db(&state, move |db| db.get_or_init_profile(&user_id)).await?;
    Ok(Json(to_response(&state.config, row)))
}

pub async fn get_public(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let row = run_db(&state, move |db| db.get_or_init_profile_by_username(&username))
        .await?
        .ok_or(ApiError::NotFound("Profile"))?;
    Ok(Json(to_response(&state.config, row)))
}

/// Partial update from JSON or multipart. Newly uploaded files are written
/// before the row changes; files the row no longer references are removed
/// afterwards.
pub async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Payload<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user_id = user.id();

    let changes = match payload {
        Payload::Json(req) => changes_from_json(req)?,
        Payload::Form(form) => changes_from_form(&state.media, &user_id, &form).await?,
    };
    let uploaded: Vec<String> = [&changes.logo, &changes.avatar, &changes.banner]
        .into_iter()
        .filter_map(|c| c.clone().flatten())
        .collect();

    if let Err(e) = check_limits(&changes) {
        state.media.remove_all_best_effort(&uploaded).await;
        return Err(e);
    }

    let uid = user_id.clone();
    let db_changes = changes.clone();
    let result = run_db(&state, move |db| {
        let before = db.get_or_init_profile(&uid)?;
        let after = db.update_profile(&uid, &db_changes)?;
        Ok((before, after))
    })
    .await;

    let (before, after) = match result {
        Ok(pair) => pair,
        Err(e) => {
            state.media.remove_all_best_effort(&uploaded).await;
            return Err(e);
        }
    };

    let replaced: Vec<String> = [
        (&before.logo, &after.logo),
        (&before.avatar, &after.avatar),
        (&before.banner, &after.banner),
    ]
    .into_iter()
    .filter_map(|(old, new)| match old {
        Some(old) if Some(old) != new.as_ref() => Some(old.clone()),
        _ => None,
    })
    .collect();
    state.media.remove_all_best_effort(&replaced).await;

    info!("Updated profile of {}", user.username());
    Ok(Json(to_response(&state.config, after)))
}

fn changes_from_json(req: UpdateProfileRequest) -> Result<ProfileChanges, ApiError> {
    for (field, value) in [("logo", &req.logo), ("avatar", &req.avatar), ("banner", &req.banner)] {
        if matches!(value, Some(Some(_))) {
            return Err(ApiError::validation(
                field,
                "Upload a file with multipart/form-data to change this image; send null to clear it.",
            ));
        }
    }

    Ok(ProfileChanges {
        display_name: req.display_name,
        company_name: req.company_name,
        service_location: req.service_location,
        coverage_radius_miles: req.coverage_radius_miles.map(|v| v.map(i64::from)),
        bio: req.bio,
        contact_email: req.contact_email,
        contact_phone: req.contact_phone,
        logo: req.logo.map(|_| None),
        avatar: req.avatar.map(|_| None),
        banner: req.banner.map(|_| None),
    })
}

async fn changes_from_form(
    store: &MediaStore,
    user_id: &str,
    form: &MultipartForm,
) -> Result<ProfileChanges, ApiError> {
    let text = |name: &str| form.text(name).map(str::to_string);

    let coverage_radius_miles = match form.text("coverage_radius_miles").map(str::trim) {
        None => None,
        Some("") => Some(None),
        Some(raw) => Some(Some(raw.parse::<u32>().map(i64::from).map_err(|_| {
            ApiError::validation("coverage_radius_miles", "A valid non-negative integer is required.")
        })?)),
    };

    for field in IMAGE_FIELDS {
        if let Some(file) = form.file(field) {
            uploads::check_image(field, file)?;
        }
    }

    let mut changes = ProfileChanges {
        display_name: text("display_name"),
        company_name: text("company_name"),
        service_location: text("service_location").or_else(|| text("location")),
        coverage_radius_miles,
        bio: text("bio"),
        contact_email: text("contact_email"),
        contact_phone: text("contact_phone"),
        ..Default::default()
    };

    let mut saved: Vec<String> = Vec::new();
    for field in IMAGE_FIELDS {
        let change = match form.file(field) {
            Some(file) => {
                let dir = match field {
                    "avatar" => media::avatar_dir(user_id),
                    "banner" => media::banner_dir(user_id),
                    _ => media::logo_dir(user_id),
                };
                match store.save(&dir, &file.file_name, &file.data).await {
                    Ok(path) => {
                        saved.push(path.clone());
                        Some(Some(path))
                    }
                    Err(e) => {
                        store.remove_all_best_effort(&saved).await;
                        return Err(e.into());
                    }
                }
            }
            None if form.text(field).is_some_and(|v| v.trim().is_empty()) => Some(None),
            None => None,
        };
        match field {
            "logo" => changes.logo = change,
            "avatar" => changes.avatar = change,
            _ => changes.banner = change,
        }
    }

    Ok(changes)
}

fn check_limits(changes: &ProfileChanges) -> Result<(), ApiError> {
    for (field, value, max) in [
        ("display_name", &changes.display_name, 255),
        ("company_name", &changes.company_name, 255),
        ("service_location", &changes.service_location, 255),
        ("contact_phone", &changes.contact_phone, 50),
    ] {
        if let Some(value) = value {
            validate::max_chars(field, value, max)?;
        }
    }
    if let Some(email) = &changes.contact_email {
        let email = email.trim();
        if !email.is_empty() && !validate::looks_like_email(email) {
            return Err(ApiError::validation("contact_email", "Enter a valid email address."));
        }
    }
    Ok(())
}
