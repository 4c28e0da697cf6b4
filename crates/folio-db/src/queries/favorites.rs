use crate::Database;
use crate::models::{FavoriteRow, ProjectRow};
use anyhow::Result;
use uuid::Uuid;

impl Database {
    pub fn is_favorited(&self, user_id: &str, project_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM project_favorites WHERE user_id = ?1 AND project_id = ?2)",
                [user_id, project_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Idempotent add. Returns true if a new favorite was stored.
    pub fn add_favorite(&self, user_id: &str, project_id: &str) -> Result<bool> {
        let id = Uuid::new_v4().to_string();
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO project_favorites (id, user_id, project_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, project_id) DO NOTHING",
                (&id, user_id, project_id),
            )?;
            Ok(inserted > 0)
        })
    }

    /// Idempotent remove. Returns true if a favorite was deleted.
    pub fn remove_favorite(&self, user_id: &str, project_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM project_favorites WHERE user_id = ?1 AND project_id = ?2",
                [user_id, project_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// The user's favorites, newest first, with their projects loaded in the
    /// same query. Projects the user can no longer see are left out.
    pub fn list_favorites(&self, user_id: &str) -> Result<Vec<(FavoriteRow, ProjectRow)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT f.id, f.user_id, f.project_id, f.created_at,
                        p.id, p.owner_id, u.username, p.title, p.summary, p.category,
                        p.cover_image, p.is_public, p.tech_stack, p.location, p.budget, p.sqf,
                        p.highlights, p.created_at, p.updated_at
                 FROM project_favorites f
                 JOIN projects p ON p.id = f.project_id
                 JOIN users u ON u.id = p.owner_id
                 WHERE f.user_id = ?1 AND (p.is_public = 1 OR p.owner_id = ?1)
                 ORDER BY f.created_at DESC, f.rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    let favorite = FavoriteRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        project_id: row.get(2)?,
                        created_at: row.get(3)?,
                    };
                    let project = ProjectRow {
                        id: row.get(4)?,
                        owner_id: row.get(5)?,
                        owner_username: row.get(6)?,
                        title: row.get(7)?,
                        summary: row.get(8)?,
                        category: row.get(9)?,
                        cover_image: row.get(10)?,
                        is_public: row.get(11)?,
                        tech_stack: row.get(12)?,
                        location: row.get(13)?,
                        budget: row.get(14)?,
                        sqf: row.get(15)?,
                        highlights: row.get(16)?,
                        created_at: row.get(17)?,
                        updated_at: row.get(18)?,
                    };
                    Ok((favorite, project))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
