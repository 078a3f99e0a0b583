use crate::ipc::helpers::{db, fail, req_i64, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::AcademicPeriod;
use crate::repo::periods;
use serde_json::json;

fn period_json(p: &AcademicPeriod) -> serde_json::Value {
    let mut v = json!(p);
    v["displayName"] = json!(p.display_name());
    v
}

fn list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let list = periods::list(conn).map_err(fail("db_query_failed"))?;
    let out: Vec<serde_json::Value> = list.iter().map(period_json).collect();
    Ok(json!({ "periods": out }))
}

fn get_or_create(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let year_start = req_i64(req, "yearStart")?;
    let semester = req_i64(req, "semester")?;
    if semester != 1 && semester != 2 {
        return Err(HandlerErr::bad_params("semester must be 1 or 2")
            .with_details(json!({ "semester": semester })));
    }
    if !(1900..=9999).contains(&year_start) {
        return Err(HandlerErr::bad_params("yearStart is out of range")
            .with_details(json!({ "yearStart": year_start })));
    }
    let p = periods::get_or_create(conn, year_start, semester).map_err(fail("db_insert_failed"))?;
    Ok(json!({ "period": period_json(&p) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "periods.list" => Some(respond(req, list(state))),
        "periods.getOrCreate" => Some(respond(req, get_or_create(state, req))),
        _ => None,
    }
}
