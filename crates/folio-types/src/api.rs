use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Distinguishes "field absent" (`None`) from "field set to null"
/// (`Some(None)`) in partial updates. Use together with `#[serde(default)]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// -- JWT Claims --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub uid: String,
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetailResponse {
    pub detail: String,
}

// -- Profiles --

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub username: String,
    pub display_name: String,
    pub company_name: String,
    pub service_location: String,
    pub location: String,
    pub coverage_radius_miles: Option<u32>,
    pub bio: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub logo: Option<String>,
    pub avatar: Option<String>,
    pub banner: Option<String>,
}

/// JSON body of `PATCH /users/me`. Image fields may only be `null` here;
/// new files go through multipart.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub company_name: Option<String>,
    #[serde(alias = "location")]
    pub service_location: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub coverage_radius_miles: Option<Option<u32>>,
    pub bio: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub logo: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub banner: Option<Option<String>>,
}

// -- Projects --

/// Body of project create and partial update. Unknown fields (including
/// `owner`) are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectInput {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub is_public: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub tech_stack: Option<Option<serde_json::Value>>,
    pub location: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub budget: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub sqf: Option<Option<i64>>,
    pub highlights: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub cover_image: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectImageResponse {
    pub id: Uuid,
    pub project: Uuid,
    pub url: String,
    pub caption: String,
    pub alt_text: String,
    pub order: u32,
    pub is_cover: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub owner: Uuid,
    pub owner_username: String,
    pub title: String,
    pub summary: String,
    pub category: String,
    /// Explicit cover upload, falling back to the order-0 image.
    pub cover_image: Option<String>,
    pub is_public: bool,
    pub tech_stack: Option<serde_json::Value>,
    pub location: String,
    pub budget: Option<f64>,
    pub sqf: Option<i64>,
    pub highlights: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub images: Vec<ProjectImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateImageRequest {
    pub caption: Option<String>,
    pub alt_text: Option<String>,
    pub order: Option<u32>,
    /// Cover intent. Accepts booleans, numbers and strings such as "yes".
    #[serde(alias = "is_cover_image", alias = "is_cover_photo")]
    pub is_cover: Option<serde_json::Value>,
}

impl UpdateImageRequest {
    pub fn wants_cover(&self) -> bool {
        self.is_cover.as_ref().is_some_and(is_truthy)
    }
}

/// Loose truthiness used by form-style flags: `true`, non-zero numbers, and
/// the strings "1", "true", "yes", "on".
pub fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        serde_json::Value::String(s) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
        }
        _ => false,
    }
}

// -- Comments --

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub project: Uuid,
    pub author: Uuid,
    pub author_username: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Favorites --

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoriteStatus {
    pub is_favorited: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FavoriteResponse {
    pub id: Uuid,
    pub project: ProjectResponse,
    pub created_at: DateTime<Utc>,
}

// -- Messaging --

/// Compact view of a thread participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantProfile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub thread: Uuid,
    pub sender: Uuid,
    pub sender_username: String,
    pub text: String,
    pub attachment_url: Option<String>,
    pub attachment_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A thread as seen by one participant.
#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub id: Uuid,
    pub owner: Uuid,
    pub owner_username: String,
    pub client: Uuid,
    pub client_username: String,
    pub owner_profile: ParticipantProfile,
    pub client_profile: ParticipantProfile,
    pub counterpart: ParticipantProfile,
    pub origin_project: Option<Uuid>,
    /// The viewer has not accepted this thread yet.
    pub is_request: bool,
    pub is_archived: bool,
    /// The viewer blocked the other participant.
    pub is_blocked: bool,
    pub blocked_by_other: bool,
    pub latest_message: Option<MessageResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ThreadActionRequest {
    #[serde(default)]
    pub action: String,
}
