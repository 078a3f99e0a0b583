use crate::model::{Section, WorkItem};
use rusqlite::{Connection, OptionalExtension, Row};

const ITEM_COLUMNS: &str = "section_id, item_id, name, max_points, max_points_numeric, sort_order";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<WorkItem> {
    Ok(WorkItem {
        section_id: row.get(0)?,
        item_id: row.get(1)?,
        name: row.get(2)?,
        max_points: row.get(3)?,
        max_points_numeric: row.get(4)?,
        sort_order: row.get(5)?,
    })
}

pub fn list_sections(conn: &Connection) -> anyhow::Result<Vec<Section>> {
    let mut stmt = conn.prepare(
        "SELECT section_id, name, sort_order FROM sections ORDER BY sort_order, section_id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Section {
                section_id: row.get(0)?,
                name: row.get(1)?,
                sort_order: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn section_ids(conn: &Connection) -> anyhow::Result<Vec<i64>> {
    Ok(list_sections(conn)?.into_iter().map(|s| s.section_id).collect())
}

/// Upsert instead of `INSERT OR REPLACE`: a replace would delete the row and
/// cascade into the section's work items.
pub fn upsert_section(conn: &Connection, s: &Section) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO sections(section_id, name, sort_order) VALUES(?, ?, ?)
         ON CONFLICT(section_id) DO UPDATE SET
           name = excluded.name,
           sort_order = excluded.sort_order",
        (s.section_id, &s.name, s.sort_order),
    )?;
    Ok(())
}

pub fn items_by_section(conn: &Connection, section_id: i64) -> anyhow::Result<Vec<WorkItem>> {
    let sql = format!(
        "SELECT {} FROM work_items WHERE section_id = ? ORDER BY sort_order",
        ITEM_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([section_id], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn all_items(conn: &Connection) -> anyhow::Result<Vec<WorkItem>> {
    let sql = format!(
        "SELECT {} FROM work_items ORDER BY section_id, sort_order",
        ITEM_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_item(conn: &Connection, section_id: i64, item_id: &str) -> anyhow::Result<Option<WorkItem>> {
    let sql = format!(
        "SELECT {} FROM work_items WHERE section_id = ? AND item_id = ?",
        ITEM_COLUMNS
    );
    Ok(conn
        .query_row(&sql, (section_id, item_id), item_from_row)
        .optional()?)
}

pub fn upsert_item(conn: &Connection, it: &WorkItem) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO work_items(section_id, item_id, name, max_points, max_points_numeric, sort_order)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(section_id, item_id) DO UPDATE SET
           name = excluded.name,
           max_points = excluded.max_points,
           max_points_numeric = excluded.max_points_numeric,
           sort_order = excluded.sort_order",
        (
            it.section_id,
            &it.item_id,
            &it.name,
            &it.max_points,
            it.max_points_numeric,
            it.sort_order,
        ),
    )?;
    Ok(())
}

/// Fails while planned works still reference the rubric.
pub fn clear(conn: &Connection) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM work_items", [])?;
    tx.execute("DELETE FROM sections", [])?;
    tx.commit()?;
    Ok(())
}
