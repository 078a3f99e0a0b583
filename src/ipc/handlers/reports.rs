use crate::ipc::helpers::{db, fail, opt_str, respond, teacher_id, workspace, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::reports;
use serde_json::json;
use std::path::PathBuf;

const REPORTS_DIR: &str = "reports";

fn out_dir(state: &AppState, req: &Request) -> Result<PathBuf, HandlerErr> {
    match opt_str(req, "outDir") {
        Some(d) => Ok(PathBuf::from(d)),
        None => Ok(workspace(state)?.join(REPORTS_DIR)),
    }
}

fn summary(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let dir = out_dir(state, req)?;
    let explicit = opt_str(req, "outPath").map(PathBuf::from);
    let path = reports::write_summary(conn, &dir, explicit.as_deref()).map_err(fail("report_failed"))?;
    Ok(json!({ "path": path.to_string_lossy() }))
}

fn personal(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let tid = teacher_id(conn, req)?;
    let dir = out_dir(state, req)?;
    let explicit = opt_str(req, "outPath").map(PathBuf::from);
    let path =
        reports::write_personal(conn, &tid, &dir, explicit.as_deref()).map_err(fail("report_failed"))?;
    Ok(json!({ "path": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.summary" => Some(respond(req, summary(state, req))),
        "reports.personal" => Some(respond(req, personal(state, req))),
        _ => None,
    }
}
