use crate::Database;
use crate::models::{ParticipantRow, ThreadRow};
use anyhow::{Result, anyhow, bail};
use folio_types::models::{ParticipantState, Role, ThreadState, canonical_pair};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

const THREAD_SELECT: &str = "SELECT t.id, t.owner_id, uo.username, COALESCE(po.display_name, ''), po.avatar,
        t.client_id, uc.username, COALESCE(pc.display_name, ''), pc.avatar,
        t.origin_project_id,
        t.owner_accepted, t.owner_blocked_other, t.owner_archived,
        t.client_accepted, t.client_blocked_other, t.client_archived,
        t.created_at, t.updated_at
     FROM message_threads t
     JOIN users uo ON uo.id = t.owner_id
     JOIN users uc ON uc.id = t.client_id
     LEFT JOIN profiles po ON po.user_id = t.owner_id
     LEFT JOIN profiles pc ON pc.user_id = t.client_id";

fn map_thread(row: &Row<'_>) -> rusqlite::Result<ThreadRow> {
    Ok(ThreadRow {
        id: row.get(0)?,
        owner: ParticipantRow {
            user_id: row.get(1)?,
            username: row.get(2)?,
            display_name: row.get(3)?,
            avatar: row.get(4)?,
        },
        client: ParticipantRow {
            user_id: row.get(5)?,
            username: row.get(6)?,
            display_name: row.get(7)?,
            avatar: row.get(8)?,
        },
        origin_project_id: row.get(9)?,
        state: ThreadState {
            owner: ParticipantState {
                accepted: row.get(10)?,
                blocked_other: row.get(11)?,
                archived: row.get(12)?,
            },
            client: ParticipantState {
                accepted: row.get(13)?,
                blocked_other: row.get(14)?,
                archived: row.get(15)?,
            },
        },
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

impl Database {
    /// Fetch the one thread between two users, creating it if needed.
    ///
    /// The pair is canonicalized first, and creation is an insert that does
    /// nothing on conflict with the `(owner_id, client_id)` uniqueness
    /// constraint, so two simultaneous first contacts from opposite sides end
    /// up on the same row. Returns `(thread, created)`.
    pub fn get_or_create_thread(
        &self,
        user_a: &str,
        user_b: &str,
        origin_project_id: Option<&str>,
        initiated_by: &str,
    ) -> Result<(ThreadRow, bool)> {
        if user_a == user_b {
            bail!("A thread needs two distinct users");
        }
        let (owner_id, client_id) = canonical_pair(user_a, user_b);
        let initiator = if initiated_by == owner_id { Role::Owner } else { Role::Client };
        let state = ThreadState::initiated_by(initiator);
        let id = Uuid::new_v4().to_string();

        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO message_threads (id, owner_id, client_id, origin_project_id,
                    owner_accepted, client_accepted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(owner_id, client_id) DO NOTHING",
                rusqlite::params![
                    id,
                    owner_id,
                    client_id,
                    origin_project_id,
                    state.owner.accepted,
                    state.client.accepted,
                ],
            )?;

            let thread = query_thread_by_pair(conn, owner_id, client_id)?
                .ok_or_else(|| anyhow!("Thread for {}/{} missing after insert", owner_id, client_id))?;
            if inserted > 0 {
                info!("Created thread {} between {} and {}", thread.id, owner_id, client_id);
            }
            Ok((thread, inserted > 0))
        })
    }

    /// The thread between two users, if any.
    pub fn find_thread(&self, user_a: &str, user_b: &str) -> Result<Option<ThreadRow>> {
        let (owner_id, client_id) = canonical_pair(user_a, user_b);
        self.with_conn(|conn| query_thread_by_pair(conn, owner_id, client_id))
    }

    pub fn get_thread(&self, id: &str) -> Result<Option<ThreadRow>> {
        self.with_conn(|conn| query_thread(conn, id))
    }

    /// Persist both participants' flags.
    pub fn save_thread_state(&self, id: &str, state: &ThreadState) -> Result<Option<ThreadRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE message_threads SET
                    owner_accepted = ?2, owner_blocked_other = ?3, owner_archived = ?4,
                    client_accepted = ?5, client_blocked_other = ?6, client_archived = ?7
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    state.owner.accepted,
                    state.owner.blocked_other,
                    state.owner.archived,
                    state.client.accepted,
                    state.client.blocked_other,
                    state.client.archived,
                ],
            )?;
            query_thread(conn, id)
        })
    }

    /// Bump the thread's last-activity timestamp.
    pub fn touch_thread(&self, id: &str, at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE message_threads SET updated_at = ?2 WHERE id = ?1", [id, at])?;
            Ok(())
        })
    }

    /// Delete a thread and its messages. Returns the attachment paths the
    /// caller should clean up, or `None` if the thread did not exist.
    pub fn delete_thread(&self, id: &str) -> Result<Option<Vec<String>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if query_thread(&tx, id)?.is_none() {
                return Ok(None);
            }

            let attachments = {
                let mut stmt = tx.prepare(
                    "SELECT attachment FROM private_messages
                     WHERE thread_id = ?1 AND attachment IS NOT NULL",
                )?;
                let paths = stmt
                    .query_map([id], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                paths
            };

            tx.execute("DELETE FROM private_messages WHERE thread_id = ?1", [id])?;
            tx.execute("DELETE FROM message_threads WHERE id = ?1", [id])?;
            tx.commit()?;

            info!("Deleted thread {}", id);
            Ok(Some(attachments))
        })
    }

    /// Every thread the user takes part in, most recent activity first.
    pub fn list_threads_for_user(&self, user_id: &str) -> Result<Vec<ThreadRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE t.owner_id = ?1 OR t.client_id = ?1
                 ORDER BY t.updated_at DESC, t.rowid DESC",
                THREAD_SELECT
            ))?;
            let rows = stmt
                .query_map([user_id], map_thread)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Threads in which the user has blocked the other participant.
    pub fn list_blocked_threads(&self, user_id: &str) -> Result<Vec<ThreadRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE (t.owner_id = ?1 AND t.owner_blocked_other = 1)
                       OR (t.client_id = ?1 AND t.client_blocked_other = 1)
                 ORDER BY t.updated_at DESC, t.rowid DESC",
                THREAD_SELECT
            ))?;
            let rows = stmt
                .query_map([user_id], map_thread)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_thread(conn: &Connection, id: &str) -> Result<Option<ThreadRow>> {
    let row = conn
        .query_row(&format!("{} WHERE t.id = ?1", THREAD_SELECT), [id], map_thread)
        .optional()?;
    Ok(row)
}

fn query_thread_by_pair(conn: &Connection, owner_id: &str, client_id: &str) -> Result<Option<ThreadRow>> {
    let row = conn
        .query_row(
            &format!("{} WHERE t.owner_id = ?1 AND t.client_id = ?2", THREAD_SELECT),
            [owner_id, client_id],
            map_thread,
        )
        .optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format_timestamp;
    use crate::queries::fixtures;
    use chrono::{TimeZone, Utc};
    use folio_types::models::ThreadAction;

    #[test]
    fn both_directions_converge_on_one_thread() {
        let db = Database::open_in_memory().expect("open");
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");

        let (first, created) = db.get_or_create_thread(&alice.id, &bob.id, None, &alice.id).expect("create");
        assert!(created);
        let (second, created) = db.get_or_create_thread(&bob.id, &alice.id, None, &bob.id).expect("fetch");
        assert!(!created);
        assert_eq!(first.id, second.id);

        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM message_threads", [], |r| r.get(0))?))
            .expect("count");
        assert_eq!(count, 1);

        assert!(first.owner.user_id < first.client.user_id);
        assert_eq!(db.find_thread(&bob.id, &alice.id).expect("find").expect("exists").id, first.id);
    }

    #[test]
    fn initiator_is_accepted_recipient_pending() {
        let db = Database::open_in_memory().expect("open");
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");

        let (thread, _) = db.get_or_create_thread(&bob.id, &alice.id, None, &bob.id).expect("create");
        let bob_role = thread.role_of(&bob.id).expect("participant");
        let alice_role = thread.role_of(&alice.id).expect("participant");
        assert!(thread.state_of(bob_role).accepted);
        assert!(!thread.state_of(alice_role).accepted);
        assert_eq!(thread.participant(bob_role).username, "bob");
        assert!(thread.role_of("stranger").is_none());
    }

    #[test]
    fn self_thread_rejected() {
        let db = Database::open_in_memory().expect("open");
        let alice = fixtures::user(&db, "alice");
        assert!(db.get_or_create_thread(&alice.id, &alice.id, None, &alice.id).is_err());
    }

    #[test]
    fn state_changes_persist() {
        let db = Database::open_in_memory().expect("open");
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let (thread, _) = db.get_or_create_thread(&alice.id, &bob.id, None, &alice.id).expect("create");

        let role = thread.role_of(&bob.id).expect("participant");
        let mut state = thread.state;
        state.apply(role, ThreadAction::Accept);
        state.apply(role, ThreadAction::Block);
        let saved = db.save_thread_state(&thread.id, &state).expect("save").expect("exists");
        assert!(saved.state_of(role).accepted);
        assert!(saved.state.is_blocked());

        let blocked = db.list_blocked_threads(&bob.id).expect("blocked");
        assert_eq!(blocked.len(), 1);
        assert!(db.list_blocked_threads(&alice.id).expect("blocked").is_empty());
    }

    #[test]
    fn inbox_orders_by_last_activity() {
        let db = Database::open_in_memory().expect("open");
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let carol = fixtures::user(&db, "carol");

        let (with_bob, _) = db.get_or_create_thread(&alice.id, &bob.id, None, &alice.id).expect("create");
        let (with_carol, _) = db.get_or_create_thread(&alice.id, &carol.id, None, &alice.id).expect("create");

        let later = format_timestamp(Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap());
        db.touch_thread(&with_bob.id, &later).expect("touch");

        let inbox: Vec<String> =
            db.list_threads_for_user(&alice.id).expect("inbox").into_iter().map(|t| t.id).collect();
        assert_eq!(inbox, vec![with_bob.id.clone(), with_carol.id.clone()]);
        assert_eq!(db.list_threads_for_user(&carol.id).expect("inbox").len(), 1);
    }

    #[test]
    fn delete_removes_messages() {
        let db = Database::open_in_memory().expect("open");
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let (thread, _) = db.get_or_create_thread(&alice.id, &bob.id, None, &alice.id).expect("create");
        db.insert_message(&thread.id, &alice.id, "hi", None).expect("message");

        let attachments = db.delete_thread(&thread.id).expect("delete").expect("existed");
        assert!(attachments.is_empty());
        assert!(db.get_thread(&thread.id).expect("query").is_none());
        assert!(db.list_messages(&thread.id).expect("list").is_empty());
        assert!(db.delete_thread(&thread.id).expect("delete").is_none());
    }
}
