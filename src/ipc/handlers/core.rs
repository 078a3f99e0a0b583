use crate::config;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::repo::settings;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

/// Opens (or creates) the store in `path` and makes it the active workspace.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    std::fs::create_dir_all(crate::storage::files_root(path))?;
    // Drop the previous handle before swapping workspaces.
    state.db = None;
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    info!(workspace = %path.display(), "workspace opened");
    Ok(())
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let is_first_run = state
        .db
        .as_ref()
        .and_then(|conn| settings::load(conn).ok())
        .map(|s| s.is_first_run);
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "defaultWorkspacePath": config::default_workspace().map(|p| p.to_string_lossy().to_string()),
            "startMinimized": state.start_minimized,
            "isFirstRun": is_first_run
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .or_else(config::default_workspace);
    let Some(path) = path else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    if let Err(e) = open_workspace(state, &path) {
        return err(
            &req.id,
            "db_open_failed",
            format!("{e:#}"),
            Some(json!({ "path": path.to_string_lossy() })),
        );
    }
    let is_first_run = state
        .db
        .as_ref()
        .and_then(|conn| settings::load(conn).ok())
        .map(|s| s.is_first_run)
        .unwrap_or(true);
    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "isFirstRun": is_first_run
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
