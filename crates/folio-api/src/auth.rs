use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use folio_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;
use crate::forms::JsonBody;
use crate::state::{AppState, run_db};
use crate::validate;

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    validate::username(&username)?;
    let email = req.email.trim().to_string();
    if !validate::looks_like_email(&email) {
        return Err(ApiError::validation("email", "Enter a valid email address."));
    }
    validate::password("password", &req.password)?;

    let password_hash = hash_password(&req.password)?;

    let user = run_db(&state, move |db| {
        let Some(user) = db.create_user(&username, &email, &password_hash)? else {
            return Ok(None);
        };
        db.get_or_init_profile(&user.id)?;
        Ok(Some(user))
    })
    .await?
    .ok_or_else(|| ApiError::Conflict("A user with that username already exists.".into()))?;

    let user_id: Uuid = user.id.parse().map_err(|e| anyhow::anyhow!("Corrupt user id: {}", e))?;
    let token = create_token(&state.config.jwt_secret, state.config.token_ttl_hours, user_id, &user.username)?;
    info!("Registered user {} ({})", user.username, user.id);

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();
    let user = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&req.password, &user.password)? {
        return Err(ApiError::Unauthorized);
    }

    let user_id: Uuid = user.id.parse().map_err(|e| anyhow::anyhow!("Corrupt user id: {}", e))?;
    let token = create_token(&state.config.jwt_secret, state.config.token_ttl_hours, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

/// Argon2id PHC string for `password`.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed =
        PasswordHash::new(stored).map_err(|e| anyhow::anyhow!("Corrupt password hash: {}", e))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

pub fn create_token(secret: &str, ttl_hours: i64, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(ttl_hours)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
