use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{clock, EngineError, EngineResult};

const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_ATTEMPTS: usize = 64;
const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    #[default]
    Chat,
    Collaboration,
    Secure,
}

impl RoomKind {
    fn as_str(self) -> &'static str {
        match self {
            RoomKind::Chat => "chat",
            RoomKind::Collaboration => "collaboration",
            RoomKind::Secure => "secure",
        }
    }

    fn from_db(kind: &str) -> Self {
        match kind {
            "collaboration" => RoomKind::Collaboration,
            "secure" => RoomKind::Secure,
            _ => RoomKind::Chat,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomConfig {
    pub name: String,
    #[serde(default)]
    pub kind: RoomKind,
    #[serde(default = "default_duration")]
    pub duration: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub moderate: bool,
    #[serde(default)]
    pub advanced: bool,
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default)]
    pub whiteboard: bool,
}

fn default_duration() -> String {
    clock::FALLBACK_TOKEN.to_owned()
}

#[derive(Debug, Clone, Serialize)]
pub struct Room {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub kind: RoomKind,
    pub is_private: bool,
    pub created_at: i64,
    pub expires_at: i64,
    pub moderate: bool,
    pub advanced: bool,
    pub ephemeral: bool,
    pub whiteboard: bool,
}

impl Room {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now.unix_timestamp() > self.expires_at
    }
}

#[derive(FromRow)]
struct RoomRow {
    id: Uuid,
    code: String,
    name: String,
    kind: String,
    is_private: bool,
    created_at: i64,
    expires_at: i64,
    moderate: bool,
    advanced: bool,
    ephemeral: bool,
    whiteboard: bool,
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        Room {
            id: row.id,
            code: row.code,
            name: row.name,
            kind: RoomKind::from_db(&row.kind),
            is_private: row.is_private,
            created_at: row.created_at,
            expires_at: row.expires_at,
            moderate: row.moderate,
            advanced: row.advanced,
            ephemeral: row.ephemeral,
            whiteboard: row.whiteboard,
        }
    }
}

const ROOM_COLUMNS: &str =
    "id, code, name, kind, is_private, created_at, expires_at, moderate, advanced, ephemeral, whiteboard";

/// Owns room records: creation, code/id lookup, public listing. Never touches
/// `active_users`; that set belongs to the presence tracker alone.
#[derive(Clone)]
pub struct RoomRegistry {
    pool: SqlitePool,
}

impl RoomRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, config: RoomConfig) -> EngineResult<Room> {
        let name = config.name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation("room name must not be empty".into()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(EngineError::Validation(format!(
                "room name is limited to {MAX_NAME_LEN} characters"
            )));
        }

        let now = OffsetDateTime::now_utc();
        let created_at = now.unix_timestamp();
        let expires_at = clock::expiry_for(&config.duration, now).unix_timestamp();
        let id = Uuid::now_v7();

        // Codes only have to be unique among rooms that are still alive, so
        // the check and the insert share one transaction; sqlite serializes
        // writers, so two concurrent creates cannot both claim a code.
        let mut tx = self.pool.begin().await?;
        let mut code = None;
        for _ in 0..CODE_ATTEMPTS {
            let candidate = generate_code();
            let taken: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM rooms WHERE code = ? AND expires_at >= ?")
                    .bind(&candidate)
                    .bind(created_at)
                    .fetch_optional(&mut *tx)
                    .await?;
            if taken.is_none() {
                code = Some(candidate);
                break;
            }
        }
        let Some(code) = code else {
            return Err(EngineError::Store("room code space exhausted".into()));
        };

        sqlx::query(
            "INSERT INTO rooms (id, code, name, kind, is_private, created_at, expires_at, \
             moderate, advanced, ephemeral, whiteboard) VALUES (?,?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(id)
        .bind(&code)
        .bind(name)
        .bind(config.kind.as_str())
        .bind(config.is_private)
        .bind(created_at)
        .bind(expires_at)
        .bind(config.moderate)
        .bind(config.advanced)
        .bind(config.ephemeral)
        .bind(config.whiteboard)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Room {
            id,
            code,
            name: name.to_owned(),
            kind: config.kind,
            is_private: config.is_private,
            created_at,
            expires_at,
            moderate: config.moderate,
            advanced: config.advanced,
            ephemeral: config.ephemeral,
            whiteboard: config.whiteboard,
        })
    }

    /// Case-insensitive code lookup. A code held only by a dead room answers
    /// `Expired`, never `NotFound`: the room existed and died.
    pub async fn resolve_by_code(&self, code: &str) -> EngineResult<Room> {
        let code = code.trim().to_uppercase();
        let row: Option<RoomRow> = sqlx::query_as(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE code = ? ORDER BY expires_at DESC LIMIT 1"
        ))
        .bind(&code)
        .fetch_optional(&self.pool)
        .await?;

        let room: Room = row.ok_or(EngineError::NotFound)?.into();
        if room.is_expired(OffsetDateTime::now_utc()) {
            return Err(EngineError::Expired);
        }
        Ok(room)
    }

    pub async fn resolve_by_id(&self, id: Uuid) -> EngineResult<Room> {
        let row: Option<RoomRow> =
            sqlx::query_as(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let room: Room = row.ok_or(EngineError::NotFound)?.into();
        if room.is_expired(OffsetDateTime::now_utc()) {
            return Err(EngineError::Expired);
        }
        Ok(room)
    }

    pub async fn list_public(&self) -> EngineResult<Vec<Room>> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let rows: Vec<RoomRow> = sqlx::query_as(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE is_private = 0 AND expires_at >= ? \
             ORDER BY created_at DESC"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Room::from).collect())
    }
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_chars_from_the_compact_alphabet() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)), "{code}");
        }
    }
}
