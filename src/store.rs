//! Persistent SQLite store for users, conversation turns and characters.
//!
//! Implements the storage and catalog collaborators the router contracts
//! assume: read of the last-N turns, read/write of the per-user quota fields,
//! and read-only character profiles. The generation core itself never touches
//! this module; the embedding application loads state here, calls the router,
//! and commits what came back.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::character::{CharacterProfile, builtin_characters};
use crate::prompt::Turn;
use crate::quota::QuotaState;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema();
        store
    }

    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> Result<Self, String> {
        let conn = Connection::open(path).map_err(|e| format!("Failed to open database: {e}"))?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema();

        let (users, turns) = store.counts();
        info!("Loaded store from {:?} ({} users, {} turns)", path, users, turns);
        Ok(store)
    }

    fn init_schema(&self) {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                username TEXT,
                elevated_until TEXT,
                messages_used_today INTEGER NOT NULL DEFAULT 0,
                last_message_date TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS characters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                personality TEXT NOT NULL,
                is_premium INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                character_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                is_user INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_turns_conversation ON turns(user_id, character_id, id);
            CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
        "#,
        )
        .expect("Failed to initialize database schema");
    }

    fn counts(&self) -> (usize, usize) {
        let conn = self.conn.lock().unwrap();
        let users: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap_or(0);
        let turns: i64 = conn
            .query_row("SELECT COUNT(*) FROM turns", [], |row| row.get(0))
            .unwrap_or(0);
        (users as usize, turns as usize)
    }

    // ==================== USERS / QUOTA ====================

    /// Register a user if unseen; existing rows keep their counters.
    pub fn upsert_user(&self, user_id: i64, username: Option<&str>) {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (user_id, username, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET username = COALESCE(?2, username)",
            params![user_id, username, now],
        )
        .unwrap_or_else(|e| {
            warn!("Failed to upsert user {user_id}: {e}");
            0
        });
    }

    /// The two quota fields for a user. Unknown users read as a fresh state.
    pub fn quota_state(&self, user_id: i64) -> QuotaState {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT messages_used_today, last_message_date FROM users WHERE user_id = ?1",
            params![user_id],
            |row| {
                let used: u32 = row.get(0)?;
                let date: Option<String> = row.get(1)?;
                Ok(QuotaState {
                    messages_used_today: used,
                    last_message_date: date.and_then(|d| d.parse::<NaiveDate>().ok()),
                })
            },
        )
        .optional()
        .unwrap_or_else(|e| {
            warn!("Failed to read quota for user {user_id}: {e}");
            None
        })
        .unwrap_or_default()
    }

    /// Write back the quota fields mutated by a router call.
    pub fn save_quota(&self, user_id: i64, quota: &QuotaState) -> Result<(), String> {
        let conn = self.conn.lock().unwrap();
        let date = quota.last_message_date.map(|d| d.to_string());
        let updated = conn
            .execute(
                "UPDATE users SET messages_used_today = ?2, last_message_date = ?3 WHERE user_id = ?1",
                params![user_id, quota.messages_used_today, date],
            )
            .map_err(|e| format!("Failed to save quota: {e}"))?;
        if updated == 0 {
            return Err(format!("No such user: {user_id}"));
        }
        Ok(())
    }

    /// When the user's elevated subscription lapses, if ever set.
    pub fn elevated_until(&self, user_id: i64) -> Option<DateTime<Utc>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT elevated_until FROM users WHERE user_id = ?1",
            params![user_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()
        .ok()
        .flatten()
        .flatten()
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
    }

    /// Grant (or extend) an elevated subscription.
    pub fn set_elevated_until(&self, user_id: i64, until: Option<DateTime<Utc>>) -> Result<(), String> {
        let conn = self.conn.lock().unwrap();
        let until = until.map(|dt| dt.to_rfc3339());
        let updated = conn
            .execute(
                "UPDATE users SET elevated_until = ?2 WHERE user_id = ?1",
                params![user_id, until],
            )
            .map_err(|e| format!("Failed to set subscription: {e}"))?;
        if updated == 0 {
            return Err(format!("No such user: {user_id}"));
        }
        Ok(())
    }

    // ==================== TURNS ====================

    /// Append one turn to a user/character conversation.
    pub fn append_turn(&self, user_id: i64, character_id: i64, turn: &Turn) -> Result<(), String> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO turns (user_id, character_id, content, is_user, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, character_id, turn.content, turn.is_user, now],
        )
        .map_err(|e| format!("Failed to append turn: {e}"))?;
        Ok(())
    }

    /// The last `limit` turns of a conversation, oldest first.
    pub fn recent_turns(&self, user_id: i64, character_id: i64, limit: usize) -> Vec<Turn> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = match conn.prepare(
            "SELECT content, is_user FROM turns
             WHERE user_id = ?1 AND character_id = ?2
             ORDER BY id DESC LIMIT ?3",
        ) {
            Ok(stmt) => stmt,
            Err(e) => {
                warn!("Failed to prepare turn query: {e}");
                return Vec::new();
            }
        };

        let rows = stmt.query_map(params![user_id, character_id, limit as i64], |row| {
            Ok(Turn { content: row.get(0)?, is_user: row.get(1)? })
        });

        let mut turns: Vec<Turn> = match rows {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(e) => {
                warn!("Failed to read turns: {e}");
                Vec::new()
            }
        };
        turns.reverse();
        turns
    }

    // ==================== CHARACTERS ====================

    /// Insert any built-in character missing by name. Idempotent.
    pub fn seed_characters(&self) -> Result<usize, String> {
        let conn = self.conn.lock().unwrap();
        let mut inserted = 0;
        for character in builtin_characters() {
            let n = conn
                .execute(
                    "INSERT OR IGNORE INTO characters (name, description, personality, is_premium)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        character.name,
                        character.description,
                        character.personality,
                        character.is_premium
                    ],
                )
                .map_err(|e| format!("Failed to seed character {}: {e}", character.name))?;
            inserted += n;
        }
        if inserted > 0 {
            info!("🎭 Seeded {inserted} characters");
        }
        Ok(inserted)
    }

    /// Fetch a character profile by row id.
    pub fn character(&self, character_id: i64) -> Option<CharacterProfile> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT name, description, personality, is_premium FROM characters WHERE id = ?1",
            params![character_id],
            |row| {
                Ok(CharacterProfile {
                    name: row.get(0)?,
                    description: row.get(1)?,
                    personality: row.get(2)?,
                    is_premium: row.get(3)?,
                })
            },
        )
        .optional()
        .unwrap_or_else(|e| {
            warn!("Failed to read character {character_id}: {e}");
            None
        })
    }

    /// All characters, with their row ids, in insertion order.
    pub fn characters(&self) -> Vec<(i64, CharacterProfile)> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = match conn
            .prepare("SELECT id, name, description, personality, is_premium FROM characters ORDER BY id")
        {
            Ok(stmt) => stmt,
            Err(e) => {
                warn!("Failed to prepare character query: {e}");
                return Vec::new();
            }
        };

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get(0)?,
                CharacterProfile {
                    name: row.get(1)?,
                    description: row.get(2)?,
                    personality: row.get(3)?,
                    is_premium: row.get(4)?,
                },
            ))
        });

        match rows {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(e) => {
                warn!("Failed to read characters: {e}");
                Vec::new()
            }
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unknown_user_reads_fresh_quota() {
        let store = Store::new();
        assert_eq!(store.quota_state(42), QuotaState::default());
    }

    #[test]
    fn test_quota_roundtrip() {
        let store = Store::new();
        store.upsert_user(42, Some("alice"));

        let quota = QuotaState {
            messages_used_today: 7,
            last_message_date: Some("2024-03-01".parse().unwrap()),
        };
        store.save_quota(42, &quota).unwrap();
        assert_eq!(store.quota_state(42), quota);
    }

    #[test]
    fn test_save_quota_for_missing_user_errors() {
        let store = Store::new();
        assert!(store.save_quota(99, &QuotaState::default()).is_err());
    }

    #[test]
    fn test_upsert_keeps_counters() {
        let store = Store::new();
        store.upsert_user(42, Some("alice"));
        let quota = QuotaState {
            messages_used_today: 3,
            last_message_date: Some("2024-03-01".parse().unwrap()),
        };
        store.save_quota(42, &quota).unwrap();

        store.upsert_user(42, None);
        assert_eq!(store.quota_state(42).messages_used_today, 3);
    }

    #[test]
    fn test_subscription_roundtrip() {
        let store = Store::new();
        store.upsert_user(42, None);
        assert_eq!(store.elevated_until(42), None);

        let until = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        store.set_elevated_until(42, Some(until)).unwrap();
        assert_eq!(store.elevated_until(42), Some(until));
    }

    #[test]
    fn test_recent_turns_ordered_and_bounded() {
        let store = Store::new();
        store.upsert_user(1, None);
        for i in 0..12 {
            let turn = if i % 2 == 0 {
                Turn::user(&format!("message {i}"))
            } else {
                Turn::assistant(&format!("reply {i}"))
            };
            store.append_turn(1, 5, &turn).unwrap();
        }

        let turns = store.recent_turns(1, 5, 8);
        assert_eq!(turns.len(), 8);
        // Oldest retained is #4, newest is #11, in creation order.
        assert_eq!(turns[0].content, "message 4");
        assert_eq!(turns[7].content, "reply 11");
        assert!(turns[0].is_user);
        assert!(!turns[7].is_user);
    }

    #[test]
    fn test_turns_scoped_to_conversation() {
        let store = Store::new();
        store.append_turn(1, 5, &Turn::user("to character five")).unwrap();
        store.append_turn(1, 6, &Turn::user("to character six")).unwrap();
        store.append_turn(2, 5, &Turn::user("someone else")).unwrap();

        let turns = store.recent_turns(1, 5, 10);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "to character five");
    }

    #[test]
    fn test_seed_characters_idempotent() {
        let store = Store::new();
        assert_eq!(store.seed_characters().unwrap(), 6);
        assert_eq!(store.seed_characters().unwrap(), 0);
        assert_eq!(store.characters().len(), 6);
    }

    #[test]
    fn test_character_lookup() {
        let store = Store::new();
        store.seed_characters().unwrap();
        let all = store.characters();
        let (id, profile) = &all[0];
        let fetched = store.character(*id).unwrap();
        assert_eq!(fetched.name, profile.name);
        assert!(store.character(9999).is_none());
    }

    #[test]
    fn test_open_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charisma.db");

        {
            let store = Store::open(&path).unwrap();
            store.upsert_user(42, Some("alice"));
            store.append_turn(42, 1, &Turn::user("hello")).unwrap();
        }

        let store = Store::open(&path).unwrap();
        let turns = store.recent_turns(42, 1, 10);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "hello");
    }
}
