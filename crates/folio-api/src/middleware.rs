use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};

use folio_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;
    Ok(token_data.claims)
}

/// Validate the bearer token if one was sent and attach its claims to the
/// request. No header means an anonymous request; a bad header is a 401.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if req.headers().contains_key(header::AUTHORIZATION) {
        let bearer = req
            .headers()
            .typed_get::<Authorization<Bearer>>()
            .ok_or(ApiError::Unauthorized)?;
        let claims = decode_token(&state.config.jwt_secret, bearer.token())?;
        req.extensions_mut().insert(claims);
    }
    Ok(next.run(req).await)
}

/// The authenticated caller, if any.
pub struct Viewer(pub Option<Claims>);

impl Viewer {
    pub fn user_id(&self) -> Option<String> {
        self.0.as_ref().map(|c| c.sub.to_string())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(parts.extensions.get::<Claims>().cloned()))
    }
}

/// The authenticated caller. Rejects anonymous requests with 401.
pub struct CurrentUser(pub Claims);

impl CurrentUser {
    pub fn id(&self) -> String {
        self.0.sub.to_string()
    }

    pub fn username(&self) -> &str {
        &self.0.username
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(CurrentUser)
            .ok_or(ApiError::Unauthorized)
    }
}
