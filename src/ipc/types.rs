use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Deserialize;

use crate::db;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    /// Opens (creating if needed) the workspace database and makes it current.
    /// On failure the previous workspace stays selected.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let conn = db::open_db(path)?;
        self.workspace = Some(path.to_path_buf());
        self.db = Some(conn);
        log::info!("workspace selected: {}", path.to_string_lossy());
        Ok(())
    }

    /// Drops the open handle so the database file can be replaced.
    pub fn close_db(&mut self) {
        self.db = None;
    }
}
