use sqlx::SqlitePool;

/// The two logical collections are `rooms` and `messages`. Their set-valued
/// fields (`active_users`, `read_by`) live in append-only relation tables so
/// a merge-add is a single idempotent INSERT instead of a read-then-overwrite
/// of the whole set.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS rooms (
        id TEXT PRIMARY KEY,
        code TEXT NOT NULL,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        is_private INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL,
        moderate INTEGER NOT NULL DEFAULT 0,
        advanced INTEGER NOT NULL DEFAULT 0,
        ephemeral INTEGER NOT NULL DEFAULT 0,
        whiteboard INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_rooms_code ON rooms (code, expires_at)",
    "CREATE TABLE IF NOT EXISTS room_members (
        room_id TEXT NOT NULL,
        username TEXT NOT NULL,
        joined_at INTEGER NOT NULL,
        PRIMARY KEY (room_id, username)
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        room_id TEXT NOT NULL,
        username TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        ephemeral INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_room ON messages (room_id, created_at, seq)",
    "CREATE TABLE IF NOT EXISTS message_reads (
        message_id TEXT NOT NULL,
        username TEXT NOT NULL,
        PRIMARY KEY (message_id, username)
    )",
];

pub async fn init(pool: &SqlitePool) -> sqlx::Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
