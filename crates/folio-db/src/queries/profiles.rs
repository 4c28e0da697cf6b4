use crate::Database;
use crate::models::{ProfileChanges, ProfileRow, now};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};

const PROFILE_SELECT: &str = "SELECT p.user_id, u.username, p.display_name, p.company_name,
        p.service_location, p.coverage_radius_miles, p.bio, p.contact_email,
        p.contact_phone, p.logo, p.avatar, p.banner, p.created_at, p.updated_at
     FROM profiles p
     JOIN users u ON u.id = p.user_id";

fn map_profile(row: &Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        user_id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        company_name: row.get(3)?,
        service_location: row.get(4)?,
        coverage_radius_miles: row.get(5)?,
        bio: row.get(6)?,
        contact_email: row.get(7)?,
        contact_phone: row.get(8)?,
        logo: row.get(9)?,
        avatar: row.get(10)?,
        banner: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

impl Database {
    /// Return the user's profile, creating an empty one on first access.
    /// Fails if the user does not exist.
    pub fn get_or_init_profile(&self, user_id: &str) -> Result<ProfileRow> {
        self.with_conn(|conn| get_or_init(conn, user_id))
    }

    /// Public lookup by username. `None` if no such user; an existing user
    /// without a profile row gets one initialized.
    pub fn get_or_init_profile_by_username(&self, username: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let user_id: Option<String> = conn
                .query_row("SELECT id FROM users WHERE username = ?1", [username], |row| {
                    row.get(0)
                })
                .optional()?;
            match user_id {
                Some(id) => get_or_init(conn, &id).map(Some),
                None => Ok(None),
            }
        })
    }

    /// Apply a partial update and return the stored result.
    pub fn update_profile(&self, user_id: &str, changes: &ProfileChanges) -> Result<ProfileRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut profile = get_or_init(&tx, user_id)?;

            if let Some(v) = &changes.display_name {
                profile.display_name = v.clone();
            }
            if let Some(v) = &changes.company_name {
                profile.company_name = v.clone();
            }
            if let Some(v) = &changes.service_location {
                profile.service_location = v.clone();
            }
            if let Some(v) = changes.coverage_radius_miles {
                profile.coverage_radius_miles = v;
            }
            if let Some(v) = &changes.bio {
                profile.bio = v.clone();
            }
            if let Some(v) = &changes.contact_email {
                profile.contact_email = v.clone();
            }
            if let Some(v) = &changes.contact_phone {
                profile.contact_phone = v.clone();
            }
            if let Some(v) = &changes.logo {
                profile.logo = v.clone();
            }
            if let Some(v) = &changes.avatar {
                profile.avatar = v.clone();
            }
            if let Some(v) = &changes.banner {
                profile.banner = v.clone();
            }

            tx.execute(
                "UPDATE profiles SET display_name = ?2, company_name = ?3, service_location = ?4,
                    coverage_radius_miles = ?5, bio = ?6, contact_email = ?7, contact_phone = ?8,
                    logo = ?9, avatar = ?10, banner = ?11, updated_at = ?12
                 WHERE user_id = ?1",
                rusqlite::params![
                    user_id,
                    profile.display_name,
                    profile.company_name,
                    profile.service_location,
                    profile.coverage_radius_miles,
                    profile.bio,
                    profile.contact_email,
                    profile.contact_phone,
                    profile.logo,
                    profile.avatar,
                    profile.banner,
                    now(),
                ],
            )?;

            let updated = query_profile(&tx, user_id)?
                .ok_or_else(|| anyhow!("Profile {} vanished during update", user_id))?;
            tx.commit()?;
            Ok(updated)
        })
    }
}

fn get_or_init(conn: &Connection, user_id: &str) -> Result<ProfileRow> {
    conn.execute("INSERT OR IGNORE INTO profiles (user_id) VALUES (?1)", [user_id])?;
    query_profile(conn, user_id)?.ok_or_else(|| anyhow!("No profile for user {}", user_id))
}

fn query_profile(conn: &Connection, user_id: &str) -> Result<Option<ProfileRow>> {
    let row = conn
        .query_row(
            &format!("{} WHERE p.user_id = ?1", PROFILE_SELECT),
            [user_id],
            map_profile,
        )
        .optional()?;
    Ok(row)
}
