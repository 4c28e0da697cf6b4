use crate::Database;
use crate::models::{ProjectFields, ProjectRow, now};
use anyhow::{Result, anyhow, bail};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

const PROJECT_SELECT: &str = "SELECT p.id, p.owner_id, u.username, p.title, p.summary, p.category,
        p.cover_image, p.is_public, p.tech_stack, p.location, p.budget, p.sqf,
        p.highlights, p.created_at, p.updated_at
     FROM projects p
     JOIN users u ON u.id = p.owner_id";

pub(crate) fn map_project(row: &Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        owner_username: row.get(2)?,
        title: row.get(3)?,
        summary: row.get(4)?,
        category: row.get(5)?,
        cover_image: row.get(6)?,
        is_public: row.get(7)?,
        tech_stack: row.get(8)?,
        location: row.get(9)?,
        budget: row.get(10)?,
        sqf: row.get(11)?,
        highlights: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

/// Stored files that belonged to a deleted project.
#[derive(Debug, Default)]
pub struct DeletedProject {
    pub files: Vec<String>,
}

impl Database {
    pub fn create_project(&self, owner_id: &str, fields: &ProjectFields) -> Result<ProjectRow> {
        self.insert_project(&Uuid::new_v4().to_string(), owner_id, fields)
    }

    /// Insert a project under an id chosen by the caller, so files can be
    /// stored under the project's directory before the row exists.
    pub fn insert_project(&self, id: &str, owner_id: &str, fields: &ProjectFields) -> Result<ProjectRow> {
        let title = match &fields.title {
            Some(t) => t.clone(),
            None => bail!("Project title is required"),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO projects (id, owner_id, title, summary, category, cover_image,
                    is_public, tech_stack, location, budget, sqf, highlights)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    id,
                    owner_id,
                    title,
                    fields.summary.clone().unwrap_or_default(),
                    fields.category.clone().unwrap_or_default(),
                    fields.cover_image.clone().flatten(),
                    fields.is_public.unwrap_or(true),
                    fields.tech_stack.clone().flatten(),
                    fields.location.clone().unwrap_or_default(),
                    fields.budget.flatten(),
                    fields.sqf.flatten(),
                    fields.highlights.clone().unwrap_or_default(),
                ],
            )?;
            query_project(conn, id)?.ok_or_else(|| anyhow!("Project {} vanished after insert", id))
        })
    }

    pub fn get_project(&self, id: &str) -> Result<Option<ProjectRow>> {
        self.with_conn(|conn| query_project(conn, id))
    }

    /// Projects visible to `viewer`: every public project plus the viewer's
    /// own private ones. Anonymous viewers (`None`) only see public projects.
    /// Newest first.
    pub fn list_projects(
        &self,
        viewer: Option<&str>,
        owner_username: Option<&str>,
    ) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE (p.is_public = 1 OR p.owner_id = ?1)
                   AND (?2 IS NULL OR u.username = ?2)
                 ORDER BY p.created_at DESC, p.rowid DESC",
                PROJECT_SELECT
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![viewer, owner_username], map_project)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All of one owner's projects, most recently updated first.
    pub fn list_projects_by_owner(&self, owner_id: &str) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE p.owner_id = ?1 ORDER BY p.updated_at DESC, p.rowid DESC",
                PROJECT_SELECT
            ))?;
            let rows = stmt
                .query_map([owner_id], map_project)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply a partial update. The owner is never touched.
    pub fn update_project(&self, id: &str, fields: &ProjectFields) -> Result<Option<ProjectRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(mut project) = query_project(&tx, id)? else {
                return Ok(None);
            };

            if let Some(v) = &fields.title {
                project.title = v.clone();
            }
            if let Some(v) = &fields.summary {
                project.summary = v.clone();
            }
            if let Some(v) = &fields.category {
                project.category = v.clone();
            }
            if let Some(v) = fields.is_public {
                project.is_public = v;
            }
            if let Some(v) = &fields.tech_stack {
                project.tech_stack = v.clone();
            }
            if let Some(v) = &fields.location {
                project.location = v.clone();
            }
            if let Some(v) = fields.budget {
                project.budget = v;
            }
            if let Some(v) = fields.sqf {
                project.sqf = v;
            }
            if let Some(v) = &fields.highlights {
                project.highlights = v.clone();
            }
            if let Some(v) = &fields.cover_image {
                project.cover_image = v.clone();
            }

            tx.execute(
                "UPDATE projects SET title = ?2, summary = ?3, category = ?4, cover_image = ?5,
                    is_public = ?6, tech_stack = ?7, location = ?8, budget = ?9, sqf = ?10,
                    highlights = ?11, updated_at = ?12
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    project.title,
                    project.summary,
                    project.category,
                    project.cover_image,
                    project.is_public,
                    project.tech_stack,
                    project.location,
                    project.budget,
                    project.sqf,
                    project.highlights,
                    now(),
                ],
            )?;

            let updated = query_project(&tx, id)?;
            tx.commit()?;
            Ok(updated)
        })
    }

    /// Delete a project and everything hanging off it in one transaction:
    /// images, comments and favorites are removed, threads that started from
    /// the project lose their origin reference. Returns the stored files the
    /// caller should clean up, or `None` if the project did not exist.
    pub fn delete_project(&self, id: &str) -> Result<Option<DeletedProject>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let cover: Option<Option<String>> = tx
                .query_row("SELECT cover_image FROM projects WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?;
            let Some(cover) = cover else {
                return Ok(None);
            };

            let mut files = {
                let mut stmt =
                    tx.prepare("SELECT image FROM project_images WHERE project_id = ?1")?;
                let paths = stmt
                    .query_map([id], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                paths
            };
            files.extend(cover);

            tx.execute("DELETE FROM project_images WHERE project_id = ?1", [id])?;
            tx.execute("DELETE FROM project_comments WHERE project_id = ?1", [id])?;
            tx.execute("DELETE FROM project_favorites WHERE project_id = ?1", [id])?;
            tx.execute(
                "UPDATE message_threads SET origin_project_id = NULL WHERE origin_project_id = ?1",
                [id],
            )?;
            tx.execute("DELETE FROM projects WHERE id = ?1", [id])?;
            tx.commit()?;

            info!("Deleted project {} ({} stored files)", id, files.len());
            Ok(Some(DeletedProject { files }))
        })
    }
}

pub(crate) fn query_project(conn: &Connection, id: &str) -> Result<Option<ProjectRow>> {
    let row = conn
        .query_row(&format!("{} WHERE p.id = ?1", PROJECT_SELECT), [id], map_project)
        .optional()?;
    Ok(row)
}
