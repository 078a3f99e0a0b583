use super::now_stamp;
use crate::model::Teacher;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

const COLUMNS: &str = "teacher_id, full_name, short_name, is_head, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        teacher_id: row.get(0)?,
        full_name: row.get(1)?,
        short_name: row.get(2)?,
        is_head: row.get::<_, i64>(3)? != 0,
        created_at: row.get(4)?,
    })
}

pub fn new_teacher(full_name: &str, short_name: &str, is_head: bool) -> Teacher {
    Teacher {
        teacher_id: Uuid::new_v4().to_string(),
        full_name: full_name.trim().to_string(),
        short_name: short_name.trim().to_string(),
        is_head,
        created_at: now_stamp(),
    }
}

pub fn get(conn: &Connection, teacher_id: &str) -> anyhow::Result<Option<Teacher>> {
    let sql = format!("SELECT {} FROM teachers WHERE teacher_id = ?", COLUMNS);
    Ok(conn.query_row(&sql, [teacher_id], from_row).optional()?)
}

pub fn get_by_full_name(conn: &Connection, full_name: &str) -> anyhow::Result<Option<Teacher>> {
    let sql = format!(
        "SELECT {} FROM teachers WHERE full_name = ? ORDER BY created_at LIMIT 1",
        COLUMNS
    );
    Ok(conn.query_row(&sql, [full_name], from_row).optional()?)
}

pub fn exists_by_full_name(conn: &Connection, full_name: &str) -> anyhow::Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM teachers WHERE full_name = ?",
        [full_name],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

pub fn list(conn: &Connection) -> anyhow::Result<Vec<Teacher>> {
    let sql = format!("SELECT {} FROM teachers ORDER BY short_name, full_name", COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count(conn: &Connection) -> anyhow::Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM teachers", [], |r| r.get(0))?)
}

/// Duplicate ids are ignored so archive re-imports stay idempotent.
pub fn insert(conn: &Connection, t: &Teacher) -> anyhow::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO teachers(teacher_id, full_name, short_name, is_head, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (
            &t.teacher_id,
            &t.full_name,
            &t.short_name,
            t.is_head as i64,
            &t.created_at,
        ),
    )?;
    Ok(())
}

pub fn update(conn: &Connection, t: &Teacher) -> anyhow::Result<usize> {
    let n = conn.execute(
        "UPDATE teachers SET full_name = ?, short_name = ?, is_head = ? WHERE teacher_id = ?",
        (&t.full_name, &t.short_name, t.is_head as i64, &t.teacher_id),
    )?;
    Ok(n)
}

/// Works and their file rows go with the teacher through FK cascades.
pub fn delete(conn: &Connection, teacher_id: &str) -> anyhow::Result<usize> {
    let n = conn.execute("DELETE FROM teachers WHERE teacher_id = ?", [teacher_id])?;
    Ok(n)
}
