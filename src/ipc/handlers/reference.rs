use crate::ipc::helpers::{db, fail, opt_i64, req_i64, req_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::WorkItem;
use crate::points;
use crate::repo::reference;
use serde_json::json;

fn item_json(it: &WorkItem) -> serde_json::Value {
    let mut v = json!(it);
    v["displayId"] = json!(it.display_id());
    v["capDisplay"] = json!(points::cap_display(&it.max_points, it.max_points_numeric));
    v
}

fn sections(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let list = reference::list_sections(conn).map_err(fail("db_query_failed"))?;
    Ok(json!({
        "sections": list,
        "maxPerSection": points::MAX_PER_SECTION,
        "maxTotal": points::MAX_TOTAL
    }))
}

fn items(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let list = match opt_i64(req, "sectionId")? {
        Some(sid) => reference::items_by_section(conn, sid),
        None => reference::all_items(conn),
    }
    .map_err(fail("db_query_failed"))?;
    let out: Vec<serde_json::Value> = list.iter().map(item_json).collect();
    Ok(json!({ "items": out }))
}

fn item(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let section_id = req_i64(req, "sectionId")?;
    let item_id = req_str(req, "itemId")?;
    let it = reference::get_item(conn, section_id, &item_id)
        .map_err(fail("db_query_failed"))?
        .ok_or_else(|| HandlerErr::not_found("work item", &format!("{}/{}", section_id, item_id)))?;
    Ok(json!({ "item": item_json(&it) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reference.sections" => Some(respond(req, sections(state))),
        "reference.items" => Some(respond(req, items(state, req))),
        "reference.item" => Some(respond(req, item(state, req))),
        _ => None,
    }
}
