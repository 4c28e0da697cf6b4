use axum::{Json, extract::State};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use folio_db::models::{format_timestamp, now};
use folio_types::api::{DetailResponse, PasswordResetConfirmRequest, PasswordResetRequest};

use crate::auth::hash_password;
use crate::error::ApiError;
use crate::forms::JsonBody;
use crate::mailer::OutgoingMail;
use crate::state::{AppState, run_db};
use crate::validate;

pub const RESET_REQUESTED: &str = "If that email exists, a reset link has been sent.";
pub const RESET_DONE: &str = "Password has been reset.";

/// Issue a reset token for every account registered under the email and
/// mail out the links. The answer is the same whether or not any account
/// matched.
pub async fn request_reset(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PasswordResetRequest>,
) -> Result<Json<DetailResponse>, ApiError> {
    let email = req.email.trim().to_string();
    if !validate::looks_like_email(&email) {
        return Err(ApiError::validation("email", "Enter a valid email address."));
    }

    let expires_at = format_timestamp(
        chrono::Utc::now() + chrono::Duration::hours(state.config.reset_token_ttl_hours),
    );

    let issued = run_db(&state, move |db| {
        let mut issued = Vec::new();
        for user in db.find_users_by_email(&email)? {
            let token = generate_token();
            db.create_reset_token(&user.id, &hash_token(&token), &expires_at)?;
            issued.push((user, token));
        }
        Ok(issued)
    })
    .await?;

    for (user, token) in issued {
        let link = reset_link(&state.config.frontend_url, &user.id, &token);
        let mail = OutgoingMail {
            from: state.config.from_email.clone(),
            to: user.email.clone(),
            subject: "Reset your password".into(),
            body: format!(
                "Hi {},\n\nUse the link below to choose a new password:\n{}\n\nIf you did not ask for this, ignore this email.\n",
                user.username, link
            ),
        };
        match state.mailer.send(&mail) {
            Ok(()) => info!("Password reset link sent for user {}", user.id),
            Err(e) => warn!("Failed to send password reset mail for user {}: {}", user.id, e),
        }
    }

    Ok(Json(DetailResponse { detail: RESET_REQUESTED.into() }))
}

pub async fn confirm_reset(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PasswordResetConfirmRequest>,
) -> Result<Json<DetailResponse>, ApiError> {
    validate::password("new_password", &req.new_password)?;

    let user_id = decode_uid(&req.uid).ok_or_else(|| ApiError::bad_request("Invalid reset link"))?;
    let password_hash = hash_password(&req.new_password)?;
    let token_hash = hash_token(req.token.trim());

    let outcome = run_db(&state, move |db| {
        if db.get_user_by_id(&user_id)?.is_none() {
            return Ok(Err("Invalid reset link"));
        }
        if !db.consume_reset_token(&user_id, &token_hash, &now())? {
            return Ok(Err("Invalid or expired reset token"));
        }
        db.set_password(&user_id, &password_hash)?;
        info!("Password reset for user {}", user_id);
        Ok(Ok(()))
    })
    .await?;
    outcome.map_err(ApiError::bad_request)?;

    Ok(Json(DetailResponse { detail: RESET_DONE.into() }))
}

/// 32 random bytes, URL-safe base64.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn encode_uid(user_id: &str) -> String {
    URL_SAFE_NO_PAD.encode(user_id.as_bytes())
}

fn decode_uid(uid: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(uid.trim()).ok()?;
    let id = String::from_utf8(bytes).ok()?;
    uuid::Uuid::parse_str(&id).ok()?;
    Some(id)
}

pub fn reset_link(frontend_url: &str, user_id: &str, token: &str) -> String {
    format!(
        "{}/reset-password?uid={}&token={}",
        frontend_url.trim_end_matches('/'),
        encode_uid(user_id),
        token
    )
}
