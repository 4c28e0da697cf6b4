use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const SCHEMA_VERSION: i64 = 1;

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;
    Ok(version)
}

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version = current_version(conn)?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL DEFAULT '',
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_users_email ON users(email COLLATE NOCASE);

            CREATE TABLE profiles (
                user_id                 TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                display_name            TEXT NOT NULL DEFAULT '',
                company_name            TEXT NOT NULL DEFAULT '',
                service_location        TEXT NOT NULL DEFAULT '',
                coverage_radius_miles   INTEGER,
                bio                     TEXT NOT NULL DEFAULT '',
                contact_email           TEXT NOT NULL DEFAULT '',
                contact_phone           TEXT NOT NULL DEFAULT '',
                logo                    TEXT,
                avatar                  TEXT,
                banner                  TEXT,
                created_at              TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at              TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE projects (
                id          TEXT PRIMARY KEY,
                owner_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                summary     TEXT NOT NULL DEFAULT '',
                category    TEXT NOT NULL DEFAULT '',
                cover_image TEXT,
                is_public   INTEGER NOT NULL DEFAULT 1,
                tech_stack  TEXT,
                location    TEXT NOT NULL DEFAULT '',
                budget      REAL,
                sqf         INTEGER,
                highlights  TEXT NOT NULL DEFAULT '',
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_projects_owner ON projects(owner_id);

            CREATE TABLE project_images (
                id          TEXT PRIMARY KEY,
                project_id  TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                image       TEXT NOT NULL,
                caption     TEXT NOT NULL DEFAULT '',
                alt_text    TEXT NOT NULL DEFAULT '',
                sort_order  INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_project_images_project
                ON project_images(project_id, sort_order);

            CREATE TABLE project_comments (
                id          TEXT PRIMARY KEY,
                project_id  TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                author_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text        TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_project_comments_project
                ON project_comments(project_id, created_at);

            CREATE TABLE project_favorites (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                project_id  TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(user_id, project_id)
            );

            CREATE TABLE message_threads (
                id                      TEXT PRIMARY KEY,
                owner_id                TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                client_id               TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                origin_project_id       TEXT REFERENCES projects(id) ON DELETE SET NULL,
                owner_accepted          INTEGER NOT NULL DEFAULT 0,
                owner_blocked_other     INTEGER NOT NULL DEFAULT 0,
                owner_archived          INTEGER NOT NULL DEFAULT 0,
                client_accepted         INTEGER NOT NULL DEFAULT 0,
                client_blocked_other    INTEGER NOT NULL DEFAULT 0,
                client_archived         INTEGER NOT NULL DEFAULT 0,
                created_at              TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at              TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(owner_id, client_id),
                CHECK(owner_id < client_id)
            );

            CREATE INDEX idx_message_threads_client ON message_threads(client_id);

            CREATE TABLE private_messages (
                id              TEXT PRIMARY KEY,
                thread_id       TEXT NOT NULL REFERENCES message_threads(id) ON DELETE CASCADE,
                sender_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text            TEXT NOT NULL DEFAULT '',
                attachment      TEXT,
                attachment_name TEXT,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_private_messages_thread
                ON private_messages(thread_id, created_at);

            CREATE TABLE password_reset_tokens (
                token_hash  TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at  TEXT NOT NULL,
                used        INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            "
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
