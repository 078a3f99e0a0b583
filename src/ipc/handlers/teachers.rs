use crate::ipc::helpers::{db, fail, opt_bool, opt_str, req_str, respond, workspace, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::points;
use crate::repo::{reference, settings, teachers, works};
use crate::storage;
use serde_json::json;
use tracing::{info, warn};

fn list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let current = settings::load(conn)
        .map_err(fail("db_query_failed"))?
        .current_teacher_id;
    let section_ids = reference::section_ids(conn).map_err(fail("db_query_failed"))?;

    let mut out = Vec::new();
    for t in teachers::list(conn).map_err(fail("db_query_failed"))? {
        let entries = works::points_entries(conn, &t.teacher_id).map_err(fail("db_query_failed"))?;
        let raw = works::total_points_by_teacher(conn, &t.teacher_id).map_err(fail("db_query_failed"))?;
        let mut v = json!(t);
        v["totalPoints"] = json!(points::effective_total(&entries, &section_ids));
        v["rawPoints"] = json!(raw);
        v["isCurrent"] = json!(t.teacher_id == current);
        out.push(v);
    }
    Ok(json!({ "teachers": out }))
}

fn create(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let full_name = req_str(req, "fullName")?;
    if teachers::exists_by_full_name(conn, &full_name).map_err(fail("db_query_failed"))? {
        return Err(HandlerErr::bad_params("teacher already exists")
            .with_details(json!({ "fullName": full_name })));
    }
    let short_name = opt_str(req, "shortName").unwrap_or_else(|| storage::short_name(&full_name));
    let t = teachers::new_teacher(&full_name, &short_name, opt_bool(req, "isHead").unwrap_or(false));
    teachers::insert(conn, &t).map_err(fail("db_insert_failed"))?;
    info!(teacher = %t.short_name, "teacher created");
    Ok(json!({ "teacher": t }))
}

fn update(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let id = req_str(req, "teacherId")?;
    let mut t = teachers::get(conn, &id)
        .map_err(fail("db_query_failed"))?
        .ok_or_else(|| HandlerErr::not_found("teacher", &id))?;
    if let Some(v) = opt_str(req, "fullName") {
        t.full_name = v;
    }
    if let Some(v) = opt_str(req, "shortName") {
        t.short_name = v;
    }
    if let Some(v) = opt_bool(req, "isHead") {
        t.is_head = v;
    }
    teachers::update(conn, &t).map_err(fail("db_update_failed"))?;
    Ok(json!({ "teacher": t }))
}

/// Refuses the acting user and the last remaining teacher.
fn delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let files_root = storage::files_root(workspace(state)?);
    let id = req_str(req, "teacherId")?;

    let t = teachers::get(conn, &id)
        .map_err(fail("db_query_failed"))?
        .ok_or_else(|| HandlerErr::not_found("teacher", &id))?;
    let current = settings::load(conn)
        .map_err(fail("db_query_failed"))?
        .current_teacher_id;
    if current == id {
        return Err(HandlerErr::new("forbidden", "cannot delete the current user"));
    }
    if teachers::count(conn).map_err(fail("db_query_failed"))? <= 1 {
        return Err(HandlerErr::new("forbidden", "cannot delete the last teacher"));
    }

    let teacher_works = works::by_teacher(conn, &id).map_err(fail("db_query_failed"))?;
    teachers::delete(conn, &id).map_err(fail("db_delete_failed"))?;
    for w in &teacher_works {
        if let Err(e) = storage::delete_work_files(&files_root, &id, &w.work_id) {
            warn!(work = %w.work_id, "stored files not removed: {e:#}");
        }
    }
    info!(teacher = %t.short_name, works = teacher_works.len(), "teacher deleted");
    Ok(json!({ "deleted": true, "worksDeleted": teacher_works.len() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(respond(req, list(state))),
        "teachers.create" => Some(respond(req, create(state, req))),
        "teachers.update" => Some(respond(req, update(state, req))),
        "teachers.delete" => Some(respond(req, delete(state, req))),
        _ => None,
    }
}
