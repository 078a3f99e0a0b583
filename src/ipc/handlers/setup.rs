use crate::ipc::helpers::{db, fail, opt_bool, opt_i64, opt_str, req_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::repo::{reference, settings, teachers};
use crate::rubric_import;
use crate::storage;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

/// First-run step: loads the rubric workbook. Semester data found in the
/// sheet header is stored unless the settings already carry a value.
fn import_workbook(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let path = PathBuf::from(req_str(req, "path")?);
    if !path.is_file() {
        return Err(HandlerErr::not_found("workbook", &path.to_string_lossy()));
    }

    if opt_bool(req, "replaceRubric").unwrap_or(false) {
        reference::clear(conn).map_err(|e| {
            HandlerErr::new(
                "import_failed",
                format!("rubric is still referenced by planned works: {e:#}"),
            )
        })?;
    }

    let result = rubric_import::import_workbook(conn, &path).map_err(fail("import_failed"))?;

    let mut s = settings::load(conn).map_err(fail("db_query_failed"))?;
    s.reference_file_path = path.to_string_lossy().to_string();
    if s.semester_year.trim().is_empty() && !result.year.is_empty() {
        s.semester_year = result.year.clone();
    }
    if s.semester_number == 0 && result.semester_number > 0 {
        s.semester_number = result.semester_number;
    }
    settings::save(conn, &s).map_err(fail("db_update_failed"))?;

    Ok(json!(result))
}

/// Records who uses this workspace and in which role, then closes the wizard.
fn complete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let full_name = req_str(req, "fullName")?;
    let short_name = opt_str(req, "shortName").unwrap_or_else(|| storage::short_name(&full_name));
    let is_head = opt_bool(req, "isHead").unwrap_or(false);

    let teacher = match teachers::get_by_full_name(conn, &full_name).map_err(fail("db_query_failed"))? {
        Some(mut t) => {
            t.short_name = short_name;
            t.is_head = is_head;
            teachers::update(conn, &t).map_err(fail("db_update_failed"))?;
            t
        }
        None => {
            let t = teachers::new_teacher(&full_name, &short_name, is_head);
            teachers::insert(conn, &t).map_err(fail("db_insert_failed"))?;
            t
        }
    };

    let mut s = settings::load(conn).map_err(fail("db_query_failed"))?;
    s.current_teacher_id = teacher.teacher_id.clone();
    s.is_head = is_head;
    if let Some(v) = opt_str(req, "departmentName") {
        s.department_name = v;
    }
    if let Some(v) = opt_str(req, "departmentShortName") {
        s.department_short_name = v;
    }
    if let Some(v) = opt_str(req, "semesterYear") {
        s.semester_year = v;
    }
    if let Some(n) = opt_i64(req, "semesterNumber")? {
        s.semester_number = n;
    }
    s.is_first_run = false;
    settings::save(conn, &s).map_err(fail("db_update_failed"))?;

    info!(teacher = %teacher.short_name, head = is_head, "setup completed");
    Ok(json!({
        "settings": s,
        "teacher": teacher
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.importWorkbook" => Some(respond(req, import_workbook(state, req))),
        "setup.complete" => Some(respond(req, complete(state, req))),
        _ => None,
    }
}
