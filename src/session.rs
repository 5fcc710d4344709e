//! Language choices persisted across sessions in a small SQLite key/value table.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::language;

const KEY_SOURCE_LANG: &str = "text.source_lang";
const KEY_TARGET_LANG: &str = "text.target_lang";
const KEY_DOCUMENT_TARGET_LANG: &str = "document.target_lang";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub source_lang: String,
    pub target_lang: String,
    pub document_target_lang: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            source_lang: language::AUTO_DETECT.to_string(),
            target_lang: "ZH".to_string(),
            document_target_lang: "EN".to_string(),
        }
    }
}

impl SessionState {
    /// Read stored choices; missing or unknown codes keep their defaults.
    pub fn load(store: &SessionStore) -> Result<Self, SessionError> {
        let mut state = Self::default();
        if let Some(code) = store.get(KEY_SOURCE_LANG)? {
            if language::find(&code).is_some() {
                state.source_lang = code;
            } else {
                warn!(code = %code, "unknown stored source language, using default");
            }
        }
        for (key, slot) in [
            (KEY_TARGET_LANG, &mut state.target_lang),
            (KEY_DOCUMENT_TARGET_LANG, &mut state.document_target_lang),
        ] {
            match store.get(key)? {
                Some(code) if language::find(&code).is_some() && !language::is_auto(&code) => {
                    *slot = code;
                }
                Some(code) => warn!(key, code = %code, "invalid stored target language, using default"),
                None => {}
            }
        }
        debug!(?state, "session restored");
        Ok(state)
    }

    pub fn save(&self, store: &SessionStore) -> Result<(), SessionError> {
        store.set(KEY_SOURCE_LANG, &self.source_lang)?;
        store.set(KEY_TARGET_LANG, &self.target_lang)?;
        store.set(KEY_DOCUMENT_TARGET_LANG, &self.document_target_lang)?;
        Ok(())
    }
}

pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    /// Open (or create) the session database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, SessionError> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let store = Self::init(conn)?;
        info!(path = %db_path.display(), "session store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, SessionError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SessionError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS session_kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM session_kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO session_kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}
