use crate::exchange;
use crate::ipc::helpers::{db, fail, opt_str, req_str, respond, teacher_id, workspace, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::repo::teachers;
use crate::storage;
use serde_json::json;
use std::path::PathBuf;

const EXPORTS_DIR: &str = "exports";

fn export(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let ws = workspace(state)?;
    let tid = teacher_id(conn, req)?;
    if teachers::get(conn, &tid)
        .map_err(fail("db_query_failed"))?
        .is_none()
    {
        return Err(HandlerErr::not_found("teacher", &tid));
    }
    let out_dir = opt_str(req, "outDir")
        .map(PathBuf::from)
        .unwrap_or_else(|| ws.join(EXPORTS_DIR));

    // Flush WAL so the archive reflects the latest writes on disk too.
    let _ = conn.execute_batch("PRAGMA wal_checkpoint(FULL)");

    let summary = exchange::export_teacher(conn, &storage::files_root(ws), &tid, &out_dir)
        .map_err(fail("export_failed"))?;
    Ok(json!(summary))
}

fn import(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let ws = workspace(state)?;
    let in_path = PathBuf::from(req_str(req, "path")?);
    if !in_path.is_file() {
        return Err(HandlerErr::not_found("archive", &in_path.to_string_lossy()));
    }
    let summary = exchange::import_package(conn, &storage::files_root(ws), &in_path)
        .map_err(fail("import_failed"))?;
    Ok(json!(summary))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exchange.export" => Some(respond(req, export(state, req))),
        "exchange.import" => Some(respond(req, import(state, req))),
        _ => None,
    }
}
