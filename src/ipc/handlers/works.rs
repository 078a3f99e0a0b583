use crate::ipc::helpers::{
    db, fail, opt_i64, opt_str, req_i64, req_str, respond, teacher_id, workspace, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{PlannedWork, WorkItem, WorkStatus};
use crate::points::{self, MAX_PER_SECTION, MAX_TOTAL};
use crate::repo::{periods, reference, teachers, works};
use crate::storage;
use rusqlite::Connection;
use serde_json::json;
use tracing::{info, warn};

fn work_json(w: &PlannedWork) -> serde_json::Value {
    let mut v = json!(w);
    v["statusLabel"] = json!(w.status.label());
    v
}

fn load_work(conn: &Connection, work_id: &str) -> Result<PlannedWork, HandlerErr> {
    works::get(conn, work_id)
        .map_err(fail("db_query_failed"))?
        .ok_or_else(|| HandlerErr::not_found("work", work_id))
}

fn load_item(conn: &Connection, section_id: i64, item_id: &str) -> Result<WorkItem, HandlerErr> {
    reference::get_item(conn, section_id, item_id)
        .map_err(fail("db_query_failed"))?
        .ok_or_else(|| HandlerErr::not_found("work item", &format!("{}/{}", section_id, item_id)))
}

/// Item cap first, then the section and total ceilings.
fn validate_points(
    conn: &Connection,
    teacher_id: &str,
    item: &WorkItem,
    points_value: i64,
    exclude_work_id: Option<&str>,
) -> Result<(), HandlerErr> {
    if !(-MAX_TOTAL..=MAX_TOTAL).contains(&points_value) {
        return Err(HandlerErr::bad_params(format!(
            "points must be between {} and {}",
            -MAX_TOTAL, MAX_TOTAL
        ))
        .with_details(json!({ "points": points_value })));
    }
    if !points::fits_item_cap(points_value, item.max_points_numeric) {
        return Err(HandlerErr::new(
            "points_exceed_item_cap",
            format!(
                "points {} do not fit item {} ({})",
                points_value,
                item.display_id(),
                points::cap_display(&item.max_points, item.max_points_numeric)
            ),
        )
        .with_details(json!({
            "points": points_value,
            "cap": item.max_points_numeric,
            "maxPoints": item.max_points
        })));
    }

    let entries = works::points_entries(conn, teacher_id).map_err(fail("db_query_failed"))?;
    points::check_limits(points_value, item.section_id, exclude_work_id, &entries).map_err(|e| {
        let details = match &e {
            points::LimitError::SectionExceeded {
                limit,
                current,
                available,
            }
            | points::LimitError::TotalExceeded {
                limit,
                current,
                available,
            } => json!({
                "limit": limit,
                "current": current,
                "available": available,
                "sectionId": item.section_id
            }),
        };
        HandlerErr::new(e.code(), e.to_string()).with_details(details)
    })
}

fn parse_due_date(req: &Request) -> Result<Option<Option<String>>, HandlerErr> {
    match req.params.get("dueDate") {
        None => Ok(None),
        Some(serde_json::Value::Null) => Ok(Some(None)),
        Some(v) => {
            let raw = v.as_str().unwrap_or("").trim();
            if raw.is_empty() {
                return Ok(Some(None));
            }
            works::parse_date(raw)
                .map(|d| Some(Some(works::format_date(d))))
                .ok_or_else(|| {
                    HandlerErr::bad_params("dueDate must be YYYY-MM-DD")
                        .with_details(json!({ "dueDate": raw }))
                })
        }
    }
}

fn check_period(conn: &Connection, period_id: i64) -> Result<(), HandlerErr> {
    if period_id == 0 {
        return Ok(());
    }
    match periods::get(conn, period_id).map_err(fail("db_query_failed"))? {
        Some(_) => Ok(()),
        None => Err(HandlerErr::not_found("period", &period_id.to_string())),
    }
}

fn parse_status(req: &Request) -> Result<Option<WorkStatus>, HandlerErr> {
    let Some(v) = req.params.get("status").filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let raw = match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    WorkStatus::parse(&raw).map(Some).ok_or_else(|| {
        HandlerErr::bad_params("unknown status").with_details(json!({ "status": raw }))
    })
}

fn list(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let tid = teacher_id(conn, req)?;
    let section_id = opt_i64(req, "sectionId")?;
    let list = match (opt_i64(req, "periodId")?, section_id) {
        (Some(pid), sid) => works::by_teacher_and_period(conn, &tid, pid, sid),
        (None, Some(sid)) => works::by_teacher_and_section(conn, &tid, sid),
        (None, None) => works::by_teacher(conn, &tid),
    }
    .map_err(fail("db_query_failed"))?;
    let out: Vec<serde_json::Value> = list.iter().map(work_json).collect();
    Ok(json!({ "works": out }))
}

fn get(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let w = load_work(conn, &req_str(req, "workId")?)?;
    Ok(json!({ "work": work_json(&w) }))
}

fn create(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let tid = teacher_id(conn, req)?;
    if teachers::get(conn, &tid)
        .map_err(fail("db_query_failed"))?
        .is_none()
    {
        return Err(HandlerErr::not_found("teacher", &tid));
    }
    let item = load_item(conn, req_i64(req, "sectionId")?, &req_str(req, "itemId")?)?;
    let points_value = req_i64(req, "points")?;
    validate_points(conn, &tid, &item, points_value, None)?;

    let name = opt_str(req, "workName").unwrap_or_else(|| item.name.clone());
    let mut w = works::new_work(&tid, item.section_id, &item.item_id, &name, points_value, None);
    if let Some(due) = parse_due_date(req)? {
        w.due_date = due;
    }
    if let Some(pid) = opt_i64(req, "periodId")? {
        check_period(conn, pid)?;
        w.period_id = pid;
    }
    if let Some(st) = parse_status(req)? {
        w.status = st;
    }
    works::insert(conn, &w).map_err(fail("db_insert_failed"))?;
    info!(work = %w.work_id, item = %item.display_id(), points = w.points, "work created");
    Ok(json!({ "work": work_json(&w) }))
}

fn update(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let mut w = load_work(conn, &req_str(req, "workId")?)?;

    let section_id = opt_i64(req, "sectionId")?.unwrap_or(w.section_id);
    let item_id = opt_str(req, "itemId").unwrap_or_else(|| w.item_id.clone());
    let item = load_item(conn, section_id, &item_id)?;
    let points_value = opt_i64(req, "points")?.unwrap_or(w.points);
    validate_points(conn, &w.teacher_id, &item, points_value, Some(&w.work_id))?;

    w.section_id = item.section_id;
    w.item_id = item.item_id.clone();
    w.points = points_value;
    if let Some(name) = opt_str(req, "workName") {
        w.work_name = name;
    }
    if let Some(due) = parse_due_date(req)? {
        w.due_date = due;
    }
    if let Some(pid) = opt_i64(req, "periodId")? {
        check_period(conn, pid)?;
        w.period_id = pid;
    }
    if let Some(st) = parse_status(req)? {
        w.status = st;
    }
    works::update(conn, &w).map_err(fail("db_update_failed"))?;
    let w = load_work(conn, &w.work_id)?;
    Ok(json!({ "work": work_json(&w) }))
}

fn set_status(conn: &Connection, w: &PlannedWork, status: WorkStatus) -> Result<serde_json::Value, HandlerErr> {
    works::update_status(conn, &w.work_id, status).map_err(fail("db_update_failed"))?;
    info!(work = %w.work_id, from = w.status.name(), to = status.name(), "work status changed");
    let w = load_work(conn, &w.work_id)?;
    Ok(json!({ "work": work_json(&w) }))
}

fn advance_status(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let w = load_work(conn, &req_str(req, "workId")?)?;
    set_status(conn, &w, w.status.next())
}

fn explicit_status(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let w = load_work(conn, &req_str(req, "workId")?)?;
    let status = parse_status(req)?.ok_or_else(|| HandlerErr::bad_params("missing status"))?;
    set_status(conn, &w, status)
}

fn delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let files_root = storage::files_root(workspace(state)?);
    let w = load_work(conn, &req_str(req, "workId")?)?;
    works::delete(conn, &w.work_id).map_err(fail("db_delete_failed"))?;
    if let Err(e) = storage::delete_work_files(&files_root, &w.teacher_id, &w.work_id) {
        warn!(work = %w.work_id, "stored files not removed: {e:#}");
    }
    info!(work = %w.work_id, files = w.attached_files.len(), "work deleted");
    Ok(json!({ "deleted": true }))
}

/// Per-section raw and capped sums plus what is still available.
fn summary(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let tid = teacher_id(conn, req)?;
    let entries = works::points_entries(conn, &tid).map_err(fail("db_query_failed"))?;
    let sections = reference::list_sections(conn).map_err(fail("db_query_failed"))?;
    let section_ids: Vec<i64> = sections.iter().map(|s| s.section_id).collect();

    let mut rows = Vec::with_capacity(sections.len());
    for s in &sections {
        let raw = works::section_points_by_teacher(conn, &tid, s.section_id)
            .map_err(fail("db_query_failed"))?;
        let effective = points::effective_section_sum(&entries, s.section_id);
        rows.push(json!({
            "sectionId": s.section_id,
            "name": s.name,
            "points": raw,
            "effectivePoints": effective,
            "limit": MAX_PER_SECTION,
            "available": (MAX_PER_SECTION - raw).max(0)
        }));
    }
    let raw_total: i64 = entries.iter().map(|e| e.points).sum();
    let effective_total = points::effective_total(&entries, &section_ids);
    Ok(json!({
        "teacherId": tid,
        "sections": rows,
        "totalPoints": raw_total,
        "effectiveTotal": effective_total,
        "limit": MAX_TOTAL,
        "available": (MAX_TOTAL - raw_total).max(0)
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "works.list" => Some(respond(req, list(state, req))),
        "works.get" => Some(respond(req, get(state, req))),
        "works.create" => Some(respond(req, create(state, req))),
        "works.update" => Some(respond(req, update(state, req))),
        "works.advanceStatus" => Some(respond(req, advance_status(state, req))),
        "works.setStatus" => Some(respond(req, explicit_status(state, req))),
        "works.delete" => Some(respond(req, delete(state, req))),
        "works.summary" => Some(respond(req, summary(state, req))),
        _ => None,
    }
}
