use std::collections::HashSet;

use crate::Database;
use anyhow::Result;

/// Every column that holds a path relative to the media root.
const MEDIA_COLUMNS: [(&str, &str); 6] = [
    ("profiles", "logo"),
    ("profiles", "avatar"),
    ("profiles", "banner"),
    ("projects", "cover_image"),
    ("project_images", "image"),
    ("private_messages", "attachment"),
];

impl Database {
    /// All media paths some row still points at.
    pub fn referenced_media_paths(&self) -> Result<HashSet<String>> {
        self.with_conn(|conn| {
            let mut referenced = HashSet::new();
            for (table, column) in MEDIA_COLUMNS {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {column} FROM {table} WHERE {column} IS NOT NULL AND {column} != ''"
                ))?;
                let paths = stmt.query_map([], |row| row.get::<_, String>(0))?;
                for path in paths {
                    referenced.insert(path?.trim_start_matches('/').to_string());
                }
            }
            Ok(referenced)
        })
    }
}
