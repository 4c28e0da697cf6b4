use crate::Database;
use crate::models::UserRow;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, password, created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl Database {
    /// Insert a user. Returns `None` when the username is already taken,
    /// including when a concurrent registration won the race.
    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<Option<UserRow>> {
        let id = Uuid::new_v4().to_string();
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, email, password) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(username) DO NOTHING",
                (&id, username, email, password_hash),
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            let user = query_user_by_id(conn, &id)?
                .ok_or_else(|| anyhow::anyhow!("User {} vanished after insert", id))?;
            Ok(Some(user))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                    [username],
                    map_user,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Case-insensitive email lookup. Emails are not unique, so several
    /// accounts may come back.
    pub fn find_users_by_email(&self, email: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users WHERE email = ?1 COLLATE NOCASE ORDER BY rowid",
                USER_COLUMNS
            ))?;
            let rows = stmt
                .query_map([email.trim()], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_password(&self, user_id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?2 WHERE id = ?1",
                (user_id, password_hash),
            )?;
            Ok(changed > 0)
        })
    }
}

pub(crate) fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            [id],
            map_user,
        )
        .optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_lookup() {
        let db = Database::open_in_memory().expect("open");
        let user = db
            .create_user("alice", "Alice@Example.com", "hash")
            .expect("create")
            .expect("new user");

        let by_name = db.get_user_by_username("alice").expect("query").expect("found");
        assert_eq!(by_name.id, user.id);
        assert!(db.get_user_by_username("bob").expect("query").is_none());

        let by_email = db.find_users_by_email(" alice@example.COM ").expect("query");
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].username, "alice");
    }

    #[test]
    fn duplicate_username_rejected() {
        let db = Database::open_in_memory().expect("open");
        let first = db.create_user("alice", "a@example.com", "hash").expect("create");
        assert!(first.is_some());
        assert!(db.create_user("alice", "b@example.com", "hash").expect("create again").is_none());
        let stored = db.get_user_by_username("alice").expect("query").expect("found");
        assert_eq!(stored.email, "a@example.com");
    }

    #[test]
    fn password_update() {
        let db = Database::open_in_memory().expect("open");
        let user = db.create_user("alice", "a@example.com", "old").expect("create").expect("new user");
        assert!(db.set_password(&user.id, "new").expect("update"));
        let user = db.get_user_by_id(&user.id).expect("query").expect("found");
        assert_eq!(user.password, "new");
        assert!(!db.set_password("missing", "x").expect("update"));
    }
}
