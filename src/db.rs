use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "acadreport.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    // Readers keep a stable snapshot while a write lands.
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
    log::debug!("journal mode for {}: {}", db_path.to_string_lossy(), mode);
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS school_profile(
            id INTEGER PRIMARY KEY CHECK (id = 1),
            name TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            term TEXT NOT NULL,
            logo TEXT,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            level INTEGER NOT NULL CHECK (level > 0)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_level ON classes(level, name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            coefficient INTEGER NOT NULL CHECK (coefficient > 0),
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_class ON subjects(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS pupils(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            admission_number TEXT NOT NULL,
            sex TEXT NOT NULL CHECK (sex IN ('Male', 'Female')),
            date_of_birth TEXT,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            UNIQUE(class_id, admission_number)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pupils_class ON pupils(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS marks(
            id TEXT PRIMARY KEY,
            pupil_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            term TEXT NOT NULL,
            score REAL NOT NULL CHECK (score >= 0 AND score <= 20),
            recorded_at TEXT,
            FOREIGN KEY(pupil_id) REFERENCES pupils(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            UNIQUE(pupil_id, subject_id, term)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_pupil ON marks(pupil_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_subject ON marks(subject_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => Ok(Some(
            serde_json::from_str(&text)
                .with_context(|| format!("settings value for {} is not valid JSON", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
