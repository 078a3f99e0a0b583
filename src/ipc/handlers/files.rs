use crate::ipc::helpers::{db, fail, req_str, respond, workspace, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::repo::works;
use crate::storage;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn attach(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let files_root = storage::files_root(workspace(state)?);
    let work_id = req_str(req, "workId")?;
    let source = PathBuf::from(req_str(req, "sourcePath")?);

    let w = works::get(conn, &work_id)
        .map_err(fail("db_query_failed"))?
        .ok_or_else(|| HandlerErr::not_found("work", &work_id))?;
    if !source.is_file() {
        return Err(HandlerErr::not_found("file", &source.to_string_lossy()));
    }

    let relative = storage::copy_to_storage(&files_root, &source, &w.teacher_id, &w.work_id)
        .map_err(fail("io_failed"))?;
    let stored_name = relative.rsplit('/').next().unwrap_or_default().to_string();
    let f = works::new_file(
        &w.work_id,
        &stored_name,
        &relative,
        &storage::file_type(&stored_name),
    );
    if let Err(e) = works::insert_file(conn, &f) {
        let _ = storage::delete_stored_file(&files_root, &relative);
        return Err(HandlerErr::new("db_insert_failed", format!("{e:#}")));
    }
    info!(work = %w.work_id, file = %f.file_name, "file attached");
    Ok(json!({ "file": f }))
}

fn list(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let files = works::files_by_work(conn, &req_str(req, "workId")?).map_err(fail("db_query_failed"))?;
    Ok(json!({ "files": files }))
}

fn delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let files_root = storage::files_root(workspace(state)?);
    let file_id = req_str(req, "fileId")?;
    let f = works::get_file(conn, &file_id)
        .map_err(fail("db_query_failed"))?
        .ok_or_else(|| HandlerErr::not_found("file", &file_id))?;
    storage::delete_stored_file(&files_root, &f.file_path).map_err(fail("io_failed"))?;
    works::delete_file(conn, &file_id).map_err(fail("db_delete_failed"))?;
    info!(work = %f.work_id, file = %f.file_name, "file deleted");
    Ok(json!({ "deleted": true }))
}

/// Absolute location for the shell to open.
fn path(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let files_root = storage::files_root(workspace(state)?);
    let file_id = req_str(req, "fileId")?;
    let f = works::get_file(conn, &file_id)
        .map_err(fail("db_query_failed"))?
        .ok_or_else(|| HandlerErr::not_found("file", &file_id))?;
    let full = storage::full_path(&files_root, &f.file_path);
    Ok(json!({
        "path": full.to_string_lossy(),
        "exists": full.is_file()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "files.attach" => Some(respond(req, attach(state, req))),
        "files.list" => Some(respond(req, list(state, req))),
        "files.delete" => Some(respond(req, delete(state, req))),
        "files.path" => Some(respond(req, path(state, req))),
        _ => None,
    }
}
