use crate::ipc::helpers::{db, fail, opt_bool, opt_i64, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::AppSettings;
use crate::repo::{settings, teachers};
use rusqlite::Connection;
use serde_json::json;
use tracing::info;

fn settings_json(conn: &Connection, s: &AppSettings) -> Result<serde_json::Value, HandlerErr> {
    let current = if s.current_teacher_id.is_empty() {
        None
    } else {
        teachers::get(conn, &s.current_teacher_id).map_err(fail("db_query_failed"))?
    };
    Ok(json!({
        "settings": s,
        "currentTeacher": current
    }))
}

fn settings_get(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let s = settings::load(conn).map_err(fail("db_query_failed"))?;
    settings_json(conn, &s)
}

/// Only the keys present in params are changed; strings may be set to "".
fn settings_update(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let mut s = settings::load(conn).map_err(fail("db_query_failed"))?;
    let text = |key: &str| req.params.get(key).and_then(|v| v.as_str()).map(|v| v.trim().to_string());

    if let Some(v) = text("departmentName") {
        s.department_name = v;
    }
    if let Some(v) = text("departmentShortName") {
        s.department_short_name = v;
    }
    if let Some(v) = text("semesterYear") {
        s.semester_year = v;
    }
    if let Some(n) = opt_i64(req, "semesterNumber")? {
        if !(0..=2).contains(&n) {
            return Err(HandlerErr::bad_params("semesterNumber must be 1 or 2")
                .with_details(json!({ "semesterNumber": n })));
        }
        s.semester_number = n;
    }
    if let Some(v) = text("referenceFilePath") {
        s.reference_file_path = v;
    }
    if let Some(v) = opt_bool(req, "isFirstRun") {
        s.is_first_run = v;
    }

    settings::save(conn, &s).map_err(fail("db_update_failed"))?;
    settings_json(conn, &s)
}

/// Switches the acting user and role without re-running setup.
fn session_switch(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let mut s = settings::load(conn).map_err(fail("db_query_failed"))?;

    if let Some(id) = req.params.get("teacherId").and_then(|v| v.as_str()) {
        let id = id.trim();
        if teachers::get(conn, id)
            .map_err(fail("db_query_failed"))?
            .is_none()
        {
            return Err(HandlerErr::not_found("teacher", id));
        }
        s.current_teacher_id = id.to_string();
    }
    if let Some(is_head) = opt_bool(req, "isHead") {
        s.is_head = is_head;
    }

    settings::save(conn, &s).map_err(fail("db_update_failed"))?;
    info!(teacher = %s.current_teacher_id, head = s.is_head, "session switched");
    settings_json(conn, &s)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(respond(req, settings_get(state))),
        "settings.update" => Some(respond(req, settings_update(state, req))),
        "session.switch" => Some(respond(req, session_switch(state, req))),
        _ => None,
    }
}
