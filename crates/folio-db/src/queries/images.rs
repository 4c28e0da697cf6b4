use crate::Database;
use crate::models::{ImageChanges, ImageRow, NewImage};
use crate::queries::placeholders;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

const IMAGE_COLUMNS: &str = "id, project_id, image, caption, alt_text, sort_order, created_at";

fn map_image(row: &Row<'_>) -> rusqlite::Result<ImageRow> {
    Ok(ImageRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        image: row.get(2)?,
        caption: row.get(3)?,
        alt_text: row.get(4)?,
        sort_order: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Database {
    /// Images of one project in display order.
    pub fn list_images(&self, project_id: &str) -> Result<Vec<ImageRow>> {
        self.with_conn(|conn| query_images(conn, project_id))
    }

    /// Batch-fetch images for a set of projects, each project's images in
    /// display order.
    pub fn list_images_for_projects(&self, project_ids: &[String]) -> Result<Vec<ImageRow>> {
        if project_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM project_images WHERE project_id IN ({})
                 ORDER BY project_id, sort_order, rowid",
                IMAGE_COLUMNS,
                placeholders(1, project_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(project_ids.iter()), map_image)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_image(&self, project_id: &str, image_id: &str) -> Result<Option<ImageRow>> {
        self.with_conn(|conn| query_image(conn, project_id, image_id))
    }

    /// Append images after the current last position, in the given order.
    pub fn add_images(&self, project_id: &str, images: &[NewImage]) -> Result<Vec<ImageRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let next: i64 = tx.query_row(
                "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM project_images WHERE project_id = ?1",
                [project_id],
                |row| row.get(0),
            )?;

            let mut ids = Vec::with_capacity(images.len());
            for (offset, image) in images.iter().enumerate() {
                let id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO project_images (id, project_id, image, caption, sort_order)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![id, project_id, image.image, image.caption, next + offset as i64],
                )?;
                ids.push(id);
            }

            let mut created = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(row) = query_image(&tx, project_id, id)? {
                    created.push(row);
                }
            }
            tx.commit()?;
            Ok(created)
        })
    }

    /// Update caption/alt text and optionally reposition an image.
    ///
    /// Making an image the cover (or moving it to position 0) shifts every
    /// other image up by one, puts the target at 0 and then renumbers the
    /// project to `0..N-1`. Any other position moves the image there and
    /// renumbers. All of it happens in one transaction.
    pub fn update_image(
        &self,
        project_id: &str,
        image_id: &str,
        changes: &ImageChanges,
    ) -> Result<Option<ImageRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if query_image(&tx, project_id, image_id)?.is_none() {
                return Ok(None);
            }

            if let Some(caption) = &changes.caption {
                tx.execute(
                    "UPDATE project_images SET caption = ?2 WHERE id = ?1",
                    (image_id, caption),
                )?;
            }
            if let Some(alt_text) = &changes.alt_text {
                tx.execute(
                    "UPDATE project_images SET alt_text = ?2 WHERE id = ?1",
                    (image_id, alt_text),
                )?;
            }

            if changes.make_cover || changes.position == Some(0) {
                tx.execute(
                    "UPDATE project_images SET sort_order = sort_order + 1
                     WHERE project_id = ?1 AND id != ?2",
                    (project_id, image_id),
                )?;
                tx.execute(
                    "UPDATE project_images SET sort_order = 0 WHERE id = ?1",
                    [image_id],
                )?;
                compact(&tx, project_id)?;
            } else if let Some(position) = changes.position {
                move_to(&tx, project_id, image_id, position as usize)?;
            }

            let updated = query_image(&tx, project_id, image_id)?;
            tx.commit()?;
            Ok(updated)
        })
    }

    /// Delete one image and close the gap it leaves. Returns the stored file
    /// path, or `None` if the image did not exist.
    pub fn delete_image(&self, project_id: &str, image_id: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(image) = query_image(&tx, project_id, image_id)? else {
                return Ok(None);
            };
            tx.execute("DELETE FROM project_images WHERE id = ?1", [image_id])?;
            compact(&tx, project_id)?;
            tx.commit()?;
            Ok(Some(image.image))
        })
    }
}

fn query_images(conn: &Connection, project_id: &str) -> Result<Vec<ImageRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM project_images WHERE project_id = ?1 ORDER BY sort_order, rowid",
        IMAGE_COLUMNS
    ))?;
    let rows = stmt
        .query_map([project_id], map_image)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_image(conn: &Connection, project_id: &str, image_id: &str) -> Result<Option<ImageRow>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM project_images WHERE id = ?1 AND project_id = ?2",
                IMAGE_COLUMNS
            ),
            [image_id, project_id],
            map_image,
        )
        .optional()?;
    Ok(row)
}

fn ordered_ids(conn: &Connection, project_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM project_images WHERE project_id = ?1 ORDER BY sort_order, rowid",
    )?;
    let ids = stmt
        .query_map([project_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn renumber(conn: &Connection, ids: &[String]) -> Result<()> {
    let mut stmt = conn.prepare("UPDATE project_images SET sort_order = ?2 WHERE id = ?1")?;
    for (index, id) in ids.iter().enumerate() {
        stmt.execute(rusqlite::params![id, index as i64])?;
    }
    Ok(())
}

/// Renumber a project's images to a dense `0..N-1` keeping current order.
fn compact(conn: &Connection, project_id: &str) -> Result<()> {
    let ids = ordered_ids(conn, project_id)?;
    renumber(conn, &ids)
}

fn move_to(conn: &Connection, project_id: &str, image_id: &str, position: usize) -> Result<()> {
    let mut ids = ordered_ids(conn, project_id)?;
    ids.retain(|id| id != image_id);
    let position = position.min(ids.len());
    ids.insert(position, image_id.to_string());
    renumber(conn, &ids)
}
