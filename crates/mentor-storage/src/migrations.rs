//! Database schema migrations.
//!
//! Version 1 creates the users, conversations, feedback and appointments
//! tables. Applied versions are recorded in `schema_migrations`, so running
//! the migrations again is a no-op.

use rusqlite::Connection;
use tracing::info;

use mentor_core::error::MentorError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), MentorError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| MentorError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| MentorError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: users, conversation log, feedback, appointments.
fn apply_v1(conn: &Connection) -> Result<(), MentorError> {
    conn.execute_batch(
        "
        BEGIN;

        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY NOT NULL,
            session_id  TEXT NOT NULL UNIQUE,
            phone       TEXT,
            email       TEXT,
            name        TEXT,
            metadata    TEXT NOT NULL DEFAULT '{}',
            preferences TEXT NOT NULL DEFAULT '{}',
            created_at  INTEGER NOT NULL,
            last_active INTEGER NOT NULL,
            deleted_at  INTEGER
        );

        CREATE TABLE IF NOT EXISTS conversations (
            id               TEXT PRIMARY KEY NOT NULL,
            user_id          TEXT NOT NULL
                             REFERENCES users (id) ON DELETE CASCADE,
            session_id       TEXT NOT NULL,
            message          TEXT NOT NULL,
            response         TEXT NOT NULL,
            agent_type       TEXT NOT NULL,
            intent           TEXT,
            confidence       REAL
                             CHECK (confidence IS NULL OR (confidence >= 0.0 AND confidence <= 1.0)),
            response_time_ms INTEGER,
            created_at       INTEGER NOT NULL,
            metadata         TEXT NOT NULL DEFAULT '{}'
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user
            ON conversations (user_id);

        CREATE INDEX IF NOT EXISTS idx_conversations_created
            ON conversations (created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_conversations_session
            ON conversations (session_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS feedback (
            id              TEXT PRIMARY KEY NOT NULL,
            conversation_id TEXT NOT NULL
                            REFERENCES conversations (id) ON DELETE CASCADE,
            rating          INTEGER NOT NULL
                            CHECK (rating IN (-1, 0, 1)),
            comment         TEXT,
            created_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_feedback_conversation
            ON feedback (conversation_id);

        CREATE TABLE IF NOT EXISTS appointments (
            id               TEXT PRIMARY KEY NOT NULL,
            user_id          TEXT NOT NULL
                             REFERENCES users (id) ON DELETE CASCADE,
            scheduled_for    INTEGER NOT NULL,
            appointment_type TEXT NOT NULL DEFAULT 'consultation',
            phone_number     TEXT,
            notes            TEXT,
            status           TEXT NOT NULL DEFAULT 'booked'
                             CHECK (status IN ('booked', 'cancelled', 'completed')),
            created_at       INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_appointments_user
            ON appointments (user_id, scheduled_for);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');

        COMMIT;
        ",
    )
    .map_err(|e| MentorError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("Failed to open in-memory DB");
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).expect("Migrations failed");
        conn
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    fn insert_user(conn: &Connection, id: &str, session: &str) {
        conn.execute(
            "INSERT INTO users (id, session_id, created_at, last_active) VALUES (?1, ?2, 0, 0)",
            [id, session],
        )
        .unwrap();
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).expect("Second run failed");

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_all_tables_exist() {
        let conn = open_test_conn();
        for table in ["users", "conversations", "feedback", "appointments"] {
            assert!(table_exists(&conn, table), "missing table {}", table);
        }
    }

    #[test]
    fn test_session_id_unique() {
        let conn = open_test_conn();
        insert_user(&conn, "u1", "s1");
        let dup = conn.execute(
            "INSERT INTO users (id, session_id, created_at, last_active) VALUES ('u2', 's1', 0, 0)",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_feedback_rating_check() {
        let conn = open_test_conn();
        insert_user(&conn, "u1", "s1");
        conn.execute(
            "INSERT INTO conversations (id, user_id, session_id, message, response, agent_type, created_at)
             VALUES ('c1', 'u1', 's1', 'hi', 'hello', 'retrieval', 0)",
            [],
        )
        .unwrap();

        let bad = conn.execute(
            "INSERT INTO feedback (id, conversation_id, rating, created_at) VALUES ('f1', 'c1', 2, 0)",
            [],
        );
        assert!(bad.is_err());

        let good = conn.execute(
            "INSERT INTO feedback (id, conversation_id, rating, created_at) VALUES ('f2', 'c1', -1, 0)",
            [],
        );
        assert!(good.is_ok());
    }

    #[test]
    fn test_conversation_requires_user() {
        let conn = open_test_conn();
        let orphan = conn.execute(
            "INSERT INTO conversations (id, user_id, session_id, message, response, agent_type, created_at)
             VALUES ('c1', 'missing', 's1', 'hi', 'hello', 'retrieval', 0)",
            [],
        );
        assert!(orphan.is_err());
    }

    #[test]
    fn test_deleting_user_cascades() {
        let conn = open_test_conn();
        insert_user(&conn, "u1", "s1");
        conn.execute(
            "INSERT INTO conversations (id, user_id, session_id, message, response, agent_type, created_at)
             VALUES ('c1', 'u1', 's1', 'hi', 'hello', 'retrieval', 0)",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM users WHERE id = 'u1'", []).unwrap();

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
