//! Database row types. These map directly to SQLite rows and stay
//! independent of the JSON shapes in `folio-types::api`.

use chrono::{DateTime, SecondsFormat, Utc};
use folio_types::models::{ParticipantState, Role, ThreadState};
use tracing::warn;

/// Current time in the storage format: RFC 3339, UTC, millisecond precision.
/// Matches the `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')` column defaults.
pub fn now() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp. Also accepts SQLite's `datetime('now')` format
/// for rows written by hand.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct ProfileRow {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub company_name: String,
    pub service_location: String,
    pub coverage_radius_miles: Option<i64>,
    pub bio: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub logo: Option<String>,
    pub avatar: Option<String>,
    pub banner: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial profile update. `Some(None)` clears a nullable column.
#[derive(Debug, Default, Clone)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub company_name: Option<String>,
    pub service_location: Option<String>,
    pub coverage_radius_miles: Option<Option<i64>>,
    pub bio: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub logo: Option<Option<String>>,
    pub avatar: Option<Option<String>>,
    pub banner: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub id: String,
    pub owner_id: String,
    pub owner_username: String,
    pub title: String,
    pub summary: String,
    pub category: String,
    pub cover_image: Option<String>,
    pub is_public: bool,
    /// Raw JSON text.
    pub tech_stack: Option<String>,
    pub location: String,
    pub budget: Option<f64>,
    pub sqf: Option<i64>,
    pub highlights: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ProjectRow {
    pub fn visible_to(&self, viewer: Option<&str>) -> bool {
        self.is_public || viewer == Some(self.owner_id.as_str())
    }
}

/// Project fields for create and partial update. On create a missing
/// `title` is an error and every other field falls back to its default.
#[derive(Debug, Default, Clone)]
pub struct ProjectFields {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub is_public: Option<bool>,
    pub tech_stack: Option<Option<String>>,
    pub location: Option<String>,
    pub budget: Option<Option<f64>>,
    pub sqf: Option<Option<i64>>,
    pub highlights: Option<String>,
    pub cover_image: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct ImageRow {
    pub id: String,
    pub project_id: String,
    pub image: String,
    pub caption: String,
    pub alt_text: String,
    pub sort_order: i64,
    pub created_at: String,
}

pub struct NewImage {
    pub image: String,
    pub caption: String,
}

#[derive(Debug, Default, Clone)]
pub struct ImageChanges {
    pub caption: Option<String>,
    pub alt_text: Option<String>,
    /// Target position. `Some(0)` is the same as `make_cover`.
    pub position: Option<u32>,
    pub make_cover: bool,
}

pub struct CommentRow {
    pub id: String,
    pub project_id: String,
    pub author_id: String,
    pub author_username: String,
    pub text: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct FavoriteRow {
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    pub created_at: String,
}

/// A thread participant joined with the bits of their profile the inbox shows.
#[derive(Debug, Clone)]
pub struct ParticipantRow {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ThreadRow {
    pub id: String,
    pub owner: ParticipantRow,
    pub client: ParticipantRow,
    pub origin_project_id: Option<String>,
    pub state: ThreadState,
    pub created_at: String,
    pub updated_at: String,
}

impl ThreadRow {
    /// Role of `user_id` in this thread, or `None` for outsiders.
    pub fn role_of(&self, user_id: &str) -> Option<Role> {
        if self.owner.user_id == user_id {
            Some(Role::Owner)
        } else if self.client.user_id == user_id {
            Some(Role::Client)
        } else {
            None
        }
    }

    pub fn participant(&self, role: Role) -> &ParticipantRow {
        match role {
            Role::Owner => &self.owner,
            Role::Client => &self.client,
        }
    }

    pub fn state_of(&self, role: Role) -> &ParticipantState {
        self.state.get(role)
    }
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub thread_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub text: String,
    pub attachment: Option<String>,
    pub attachment_name: Option<String>,
    pub created_at: String,
}

/// A stored attachment: relative media path plus the uploader's file name.
pub struct NewAttachment {
    pub path: String,
    pub name: String,
}
