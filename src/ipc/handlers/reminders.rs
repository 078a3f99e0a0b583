use crate::ipc::helpers::{db, fail, opt_i64, opt_str, respond, teacher_id, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::reminders;
use crate::repo::{self, works};
use chrono::NaiveDate;
use serde_json::json;

/// `today` may be pinned by the caller; otherwise the local date.
fn today(req: &Request) -> Result<NaiveDate, HandlerErr> {
    match opt_str(req, "today") {
        Some(raw) => works::parse_date(&raw).ok_or_else(|| {
            HandlerErr::bad_params("today must be YYYY-MM-DD").with_details(json!({ "today": raw }))
        }),
        None => Ok(repo::today()),
    }
}

fn list(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let tid = teacher_id(conn, req)?;
    let days_ahead = opt_i64(req, "daysAhead")?.unwrap_or(reminders::DEFAULT_DAYS_AHEAD);
    if !(0..=reminders::MAX_DAYS_AHEAD).contains(&days_ahead) {
        return Err(HandlerErr::bad_params(format!(
            "daysAhead must be between 0 and {}",
            reminders::MAX_DAYS_AHEAD
        ))
        .with_details(json!({ "daysAhead": days_ahead })));
    }
    let list = reminders::reminders(conn, &tid, today(req)?, days_ahead).map_err(fail("db_query_failed"))?;
    Ok(json!({ "reminders": list }))
}

fn overdue_count(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let tid = teacher_id(conn, req)?;
    let n = reminders::overdue_count(conn, &tid, today(req)?).map_err(fail("db_query_failed"))?;
    Ok(json!({ "count": n }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reminders.list" => Some(respond(req, list(state, req))),
        "reminders.overdueCount" => Some(respond(req, overdue_count(state, req))),
        _ => None,
    }
}
