use crate::Database;
use crate::models::{CommentRow, now};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

const COMMENT_SELECT: &str = "SELECT c.id, c.project_id, c.author_id, u.username, c.text,
        c.created_at, c.updated_at
     FROM project_comments c
     JOIN users u ON u.id = c.author_id";

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        text: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl Database {
    /// Comments on a project, newest first.
    pub fn list_comments(&self, project_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE c.project_id = ?1 ORDER BY c.created_at DESC, c.rowid DESC",
                COMMENT_SELECT
            ))?;
            let rows = stmt
                .query_map([project_id], map_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn create_comment(&self, project_id: &str, author_id: &str, text: &str) -> Result<CommentRow> {
        let id = Uuid::new_v4().to_string();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO project_comments (id, project_id, author_id, text) VALUES (?1, ?2, ?3, ?4)",
                (&id, project_id, author_id, text),
            )?;
            query_comment(conn, project_id, &id)?
                .ok_or_else(|| anyhow!("Comment {} vanished after insert", id))
        })
    }

    /// A comment scoped to its project; comments of other projects are not found.
    pub fn get_comment(&self, project_id: &str, comment_id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| query_comment(conn, project_id, comment_id))
    }

    pub fn update_comment(&self, project_id: &str, comment_id: &str, text: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE project_comments SET text = ?3, updated_at = ?4
                 WHERE id = ?1 AND project_id = ?2",
                (comment_id, project_id, text, now()),
            )?;
            query_comment(conn, project_id, comment_id)
        })
    }

    pub fn delete_comment(&self, project_id: &str, comment_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM project_comments WHERE id = ?1 AND project_id = ?2",
                (comment_id, project_id),
            )?;
            Ok(deleted > 0)
        })
    }
}

fn query_comment(conn: &Connection, project_id: &str, comment_id: &str) -> Result<Option<CommentRow>> {
    let row = conn
        .query_row(
            &format!("{} WHERE c.id = ?1 AND c.project_id = ?2", COMMENT_SELECT),
            [comment_id, project_id],
            map_comment,
        )
        .optional()?;
    Ok(row)
}
