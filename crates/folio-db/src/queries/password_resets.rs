use crate::Database;
use anyhow::Result;
use rusqlite::OptionalExtension;

impl Database {
    /// Store the hash of a freshly issued reset token. The raw token never
    /// touches the database.
    pub fn create_reset_token(&self, user_id: &str, token_hash: &str, expires_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO password_reset_tokens (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
                [token_hash, user_id, expires_at],
            )?;
            Ok(())
        })
    }

    /// Redeem a token: it must belong to `user_id`, be unused and expire after
    /// `now`. On success the token and every other outstanding token of the
    /// user are marked used. Returns false for any invalid token.
    pub fn consume_reset_token(&self, user_id: &str, token_hash: &str, now: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let found = tx
                .query_row(
                    "SELECT 1 FROM password_reset_tokens
                     WHERE token_hash = ?1 AND user_id = ?2 AND used = 0 AND expires_at > ?3",
                    [token_hash, user_id, now],
                    |_| Ok(()),
                )
                .optional()?;
            if found.is_none() {
                return Ok(false);
            }

            tx.execute(
                "UPDATE password_reset_tokens SET used = 1 WHERE user_id = ?1",
                [user_id],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }
}
