use crate::Database;
use crate::models::{MessageRow, NewAttachment, now};
use crate::queries::placeholders;
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

const MESSAGE_SELECT: &str = "SELECT m.id, m.thread_id, m.sender_id, u.username, m.text,
        m.attachment, m.attachment_name, m.created_at
     FROM private_messages m
     JOIN users u ON u.id = m.sender_id";

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_username: row.get(3)?,
        text: row.get(4)?,
        attachment: row.get(5)?,
        attachment_name: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl Database {
    /// Store a message and bump the thread's `updated_at` to the message time,
    /// both in one transaction.
    pub fn insert_message(
        &self,
        thread_id: &str,
        sender_id: &str,
        text: &str,
        attachment: Option<&NewAttachment>,
    ) -> Result<MessageRow> {
        let id = Uuid::new_v4().to_string();
        let created_at = now();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO private_messages (id, thread_id, sender_id, text, attachment, attachment_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id,
                    thread_id,
                    sender_id,
                    text,
                    attachment.map(|a| a.path.as_str()),
                    attachment.map(|a| a.name.as_str()),
                    created_at,
                ],
            )?;
            tx.execute(
                "UPDATE message_threads SET updated_at = ?2 WHERE id = ?1",
                [thread_id, created_at.as_str()],
            )?;
            let message = query_message(&tx, &id)?
                .ok_or_else(|| anyhow!("Message {} vanished after insert", id))?;
            tx.commit()?;
            Ok(message)
        })
    }

    /// A thread's messages, oldest first.
    pub fn list_messages(&self, thread_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE m.thread_id = ?1 ORDER BY m.created_at, m.rowid",
                MESSAGE_SELECT
            ))?;
            let rows = stmt
                .query_map([thread_id], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The most recent message of each given thread. Threads without messages
    /// are simply absent from the result.
    pub fn latest_messages_for_threads(&self, thread_ids: &[String]) -> Result<Vec<MessageRow>> {
        if thread_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE m.rowid IN (
                    SELECT MAX(rowid) FROM private_messages
                    WHERE thread_id IN ({})
                    GROUP BY thread_id
                 )",
                MESSAGE_SELECT,
                placeholders(1, thread_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(thread_ids.iter()), map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let row = conn
        .query_row(&format!("{} WHERE m.id = ?1", MESSAGE_SELECT), [id], map_message)
        .optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    #[test]
    fn messages_are_chronological_and_bump_thread() {
        let db = Database::open_in_memory().expect("open");
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let (thread, _) = db.get_or_create_thread(&alice.id, &bob.id, None, &alice.id).expect("thread");

        db.insert_message(&thread.id, &alice.id, "hello", None).expect("send");
        let reply = db.insert_message(&thread.id, &bob.id, "hi back", None).expect("send");

        let messages = db.list_messages(&thread.id).expect("list");
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "hi back"]);
        assert_eq!(messages[1].sender_username, "bob");

        let bumped = db.get_thread(&thread.id).expect("query").expect("exists");
        assert_eq!(bumped.updated_at, reply.created_at);
    }

    #[test]
    fn attachments_are_stored() {
        let db = Database::open_in_memory().expect("open");
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let (thread, _) = db.get_or_create_thread(&alice.id, &bob.id, None, &alice.id).expect("thread");

        let attachment = NewAttachment { path: "messages/t/quote.pdf".into(), name: "quote.pdf".into() };
        let message = db.insert_message(&thread.id, &alice.id, "", Some(&attachment)).expect("send");
        assert_eq!(message.attachment.as_deref(), Some("messages/t/quote.pdf"));
        assert_eq!(message.attachment_name.as_deref(), Some("quote.pdf"));

        let leftovers = db.delete_thread(&thread.id).expect("delete").expect("existed");
        assert_eq!(leftovers, vec!["messages/t/quote.pdf".to_string()]);
    }

    #[test]
    fn latest_message_per_thread() {
        let db = Database::open_in_memory().expect("open");
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let carol = fixtures::user(&db, "carol");
        let (with_bob, _) = db.get_or_create_thread(&alice.id, &bob.id, None, &alice.id).expect("thread");
        let (with_carol, _) = db.get_or_create_thread(&alice.id, &carol.id, None, &alice.id).expect("thread");

        db.insert_message(&with_bob.id, &alice.id, "one", None).expect("send");
        db.insert_message(&with_bob.id, &bob.id, "two", None).expect("send");

        let latest = db
            .latest_messages_for_threads(&[with_bob.id.clone(), with_carol.id.clone()])
            .expect("latest");
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].thread_id, with_bob.id);
        assert_eq!(latest[0].text, "two");
        assert!(db.latest_messages_for_threads(&[]).expect("empty").is_empty());
    }
}
