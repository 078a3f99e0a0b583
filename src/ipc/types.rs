use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub start_minimized: bool,
}

impl AppState {
    pub fn new(start_minimized: bool) -> Self {
        Self {
            workspace: None,
            db: None,
            start_minimized,
        }
    }
}
