use super::now_stamp;
use crate::model::{AttachedFile, PlannedWork, WorkStatus};
use crate::points::PointsEntry;
use anyhow::anyhow;
use chrono::{Days, NaiveDate};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use uuid::Uuid;

const COLUMNS: &str = "work_id, teacher_id, section_id, item_id, work_name, points, due_date, \
                       status, period_id, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<PlannedWork> {
    Ok(PlannedWork {
        work_id: row.get(0)?,
        teacher_id: row.get(1)?,
        section_id: row.get(2)?,
        item_id: row.get(3)?,
        work_name: row.get(4)?,
        points: row.get(5)?,
        due_date: row.get(6)?,
        status: WorkStatus::from_i64(row.get(7)?),
        period_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        attached_files: Vec::new(),
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<AttachedFile> {
    Ok(AttachedFile {
        file_id: row.get(0)?,
        work_id: row.get(1)?,
        file_name: row.get(2)?,
        file_path: row.get(3)?,
        file_type: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    })
}

/// Fresh work in `Planned` state with new id and timestamps.
pub fn new_work(
    teacher_id: &str,
    section_id: i64,
    item_id: &str,
    work_name: &str,
    points: i64,
    due_date: Option<NaiveDate>,
) -> PlannedWork {
    let now = now_stamp();
    PlannedWork {
        work_id: Uuid::new_v4().to_string(),
        teacher_id: teacher_id.to_string(),
        section_id,
        item_id: item_id.to_string(),
        work_name: work_name.to_string(),
        points,
        due_date: due_date.map(format_date),
        status: WorkStatus::Planned,
        period_id: 0,
        created_at: now.clone(),
        updated_at: now,
        attached_files: Vec::new(),
    }
}

pub fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Accepts `YYYY-MM-DD`, a full RFC 3339 timestamp, or `DD.MM.YYYY`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(t) {
        return Some(dt.date_naive());
    }
    if let Some(prefix) = t.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(d);
        }
    }
    NaiveDate::parse_from_str(t, "%d.%m.%Y").ok()
}

fn query_works(
    conn: &Connection,
    where_clause: &str,
    order: &str,
    params: Vec<rusqlite::types::Value>,
) -> anyhow::Result<Vec<PlannedWork>> {
    let sql = format!(
        "SELECT {} FROM planned_works WHERE {} ORDER BY {}",
        COLUMNS, where_clause, order
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut works = stmt
        .query_map(params_from_iter(params), from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    fill_attached_files(conn, &mut works)?;
    Ok(works)
}

fn fill_attached_files(conn: &Connection, works: &mut [PlannedWork]) -> anyhow::Result<()> {
    if works.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["?"; works.len()].join(", ");
    let sql = format!(
        "SELECT file_id, work_id, file_name, file_path, file_type
         FROM attached_files WHERE work_id IN ({}) ORDER BY rowid",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let files = stmt
        .query_map(
            params_from_iter(works.iter().map(|w| w.work_id.as_str())),
            file_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let mut grouped: HashMap<String, Vec<AttachedFile>> = HashMap::new();
    for f in files {
        grouped.entry(f.work_id.clone()).or_default().push(f);
    }
    for w in works.iter_mut() {
        if let Some(files) = grouped.remove(&w.work_id) {
            w.attached_files = files;
        }
    }
    Ok(())
}

pub fn get(conn: &Connection, work_id: &str) -> anyhow::Result<Option<PlannedWork>> {
    let sql = format!("SELECT {} FROM planned_works WHERE work_id = ?", COLUMNS);
    let work = conn.query_row(&sql, [work_id], from_row).optional()?;
    match work {
        Some(mut w) => {
            w.attached_files = files_by_work(conn, work_id)?;
            Ok(Some(w))
        }
        None => Ok(None),
    }
}

pub fn by_teacher(conn: &Connection, teacher_id: &str) -> anyhow::Result<Vec<PlannedWork>> {
    query_works(
        conn,
        "teacher_id = ?",
        "section_id, item_id, created_at",
        vec![teacher_id.to_string().into()],
    )
}

pub fn by_teacher_and_section(
    conn: &Connection,
    teacher_id: &str,
    section_id: i64,
) -> anyhow::Result<Vec<PlannedWork>> {
    query_works(
        conn,
        "teacher_id = ? AND section_id = ?",
        "item_id, created_at",
        vec![teacher_id.to_string().into(), section_id.into()],
    )
}

/// Works of the period plus the ones never assigned to any period.
pub fn by_teacher_and_period(
    conn: &Connection,
    teacher_id: &str,
    period_id: i64,
    section_id: Option<i64>,
) -> anyhow::Result<Vec<PlannedWork>> {
    match section_id {
        Some(sid) => query_works(
            conn,
            "teacher_id = ? AND section_id = ? AND (period_id = ? OR period_id = 0)",
            "item_id, created_at",
            vec![teacher_id.to_string().into(), sid.into(), period_id.into()],
        ),
        None => query_works(
            conn,
            "teacher_id = ? AND (period_id = ? OR period_id = 0)",
            "section_id, item_id, created_at",
            vec![teacher_id.to_string().into(), period_id.into()],
        ),
    }
}

/// Open works due on or before `today + days_ahead`.
pub fn upcoming_by_teacher(
    conn: &Connection,
    teacher_id: &str,
    today: NaiveDate,
    days_ahead: i64,
) -> anyhow::Result<Vec<PlannedWork>> {
    let limit = u64::try_from(days_ahead)
        .ok()
        .and_then(|d| today.checked_add_days(Days::new(d)))
        .ok_or_else(|| anyhow!("days ahead out of range: {}", days_ahead))?;
    query_works(
        conn,
        "teacher_id = ? AND due_date IS NOT NULL AND due_date <= ? AND status IN (0, 1)",
        "due_date",
        vec![teacher_id.to_string().into(), format_date(limit).into()],
    )
}

pub fn overdue_by_teacher(
    conn: &Connection,
    teacher_id: &str,
    today: NaiveDate,
) -> anyhow::Result<Vec<PlannedWork>> {
    query_works(
        conn,
        "teacher_id = ? AND due_date IS NOT NULL AND due_date < ? AND status IN (0, 1)",
        "due_date",
        vec![teacher_id.to_string().into(), format_date(today).into()],
    )
}

pub fn insert(conn: &Connection, w: &PlannedWork) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO planned_works(work_id, teacher_id, section_id, item_id, work_name, points,
                                   due_date, status, period_id, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            w.work_id,
            w.teacher_id,
            w.section_id,
            w.item_id,
            w.work_name,
            w.points,
            w.due_date,
            w.status.as_i64(),
            w.period_id,
            w.created_at,
            now_stamp(),
        ],
    )?;
    Ok(())
}

pub fn update(conn: &Connection, w: &PlannedWork) -> anyhow::Result<usize> {
    let n = conn.execute(
        "UPDATE planned_works SET
           section_id = ?, item_id = ?, work_name = ?, points = ?, due_date = ?,
           status = ?, period_id = ?, updated_at = ?
         WHERE work_id = ?",
        rusqlite::params![
            w.section_id,
            w.item_id,
            w.work_name,
            w.points,
            w.due_date,
            w.status.as_i64(),
            w.period_id,
            now_stamp(),
            w.work_id,
        ],
    )?;
    Ok(n)
}

pub fn update_status(conn: &Connection, work_id: &str, status: WorkStatus) -> anyhow::Result<usize> {
    let n = conn.execute(
        "UPDATE planned_works SET status = ?, updated_at = ? WHERE work_id = ?",
        (status.as_i64(), now_stamp(), work_id),
    )?;
    Ok(n)
}

/// File rows follow through `ON DELETE CASCADE`.
pub fn delete(conn: &Connection, work_id: &str) -> anyhow::Result<usize> {
    let n = conn.execute("DELETE FROM planned_works WHERE work_id = ?", [work_id])?;
    Ok(n)
}

pub fn total_points_by_teacher(conn: &Connection, teacher_id: &str) -> anyhow::Result<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(points), 0) FROM planned_works WHERE teacher_id = ?",
        [teacher_id],
        |r| r.get(0),
    )?)
}

pub fn section_points_by_teacher(
    conn: &Connection,
    teacher_id: &str,
    section_id: i64,
) -> anyhow::Result<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(points), 0) FROM planned_works WHERE teacher_id = ? AND section_id = ?",
        (teacher_id, section_id),
        |r| r.get(0),
    )?)
}

/// Lightweight rows for limit arithmetic.
pub fn points_entries(conn: &Connection, teacher_id: &str) -> anyhow::Result<Vec<PointsEntry>> {
    let mut stmt =
        conn.prepare("SELECT work_id, section_id, points FROM planned_works WHERE teacher_id = ?")?;
    let rows = stmt
        .query_map([teacher_id], |row| {
            Ok(PointsEntry {
                work_id: row.get(0)?,
                section_id: row.get(1)?,
                points: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn has_work_for_item(
    conn: &Connection,
    teacher_id: &str,
    section_id: i64,
    item_id: &str,
) -> anyhow::Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM planned_works WHERE teacher_id = ? AND section_id = ? AND item_id = ?",
        (teacher_id, section_id, item_id),
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

pub fn files_by_work(conn: &Connection, work_id: &str) -> anyhow::Result<Vec<AttachedFile>> {
    let mut stmt = conn.prepare(
        "SELECT file_id, work_id, file_name, file_path, file_type
         FROM attached_files WHERE work_id = ? ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([work_id], file_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_file(conn: &Connection, file_id: &str) -> anyhow::Result<Option<AttachedFile>> {
    Ok(conn
        .query_row(
            "SELECT file_id, work_id, file_name, file_path, file_type
             FROM attached_files WHERE file_id = ?",
            [file_id],
            file_from_row,
        )
        .optional()?)
}

pub fn new_file(work_id: &str, file_name: &str, file_path: &str, file_type: &str) -> AttachedFile {
    AttachedFile {
        file_id: Uuid::new_v4().to_string(),
        work_id: work_id.to_string(),
        file_name: file_name.to_string(),
        file_path: file_path.to_string(),
        file_type: file_type.to_string(),
    }
}

pub fn insert_file(conn: &Connection, f: &AttachedFile) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO attached_files(file_id, work_id, file_name, file_path, file_type)
         VALUES(?, ?, ?, ?, ?)",
        (&f.file_id, &f.work_id, &f.file_name, &f.file_path, &f.file_type),
    )?;
    Ok(())
}

pub fn delete_file(conn: &Connection, file_id: &str) -> anyhow::Result<usize> {
    let n = conn.execute("DELETE FROM attached_files WHERE file_id = ?", [file_id])?;
    Ok(n)
}
