use crate::model::AcademicPeriod;
use rusqlite::{Connection, OptionalExtension, Row};

fn from_row(row: &Row<'_>) -> rusqlite::Result<AcademicPeriod> {
    Ok(AcademicPeriod {
        period_id: row.get(0)?,
        year_start: row.get(1)?,
        semester: row.get(2)?,
    })
}

pub fn list(conn: &Connection) -> anyhow::Result<Vec<AcademicPeriod>> {
    let mut stmt = conn.prepare(
        "SELECT period_id, year_start, semester FROM academic_periods
         ORDER BY year_start DESC, semester DESC",
    )?;
    let rows = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, period_id: i64) -> anyhow::Result<Option<AcademicPeriod>> {
    Ok(conn
        .query_row(
            "SELECT period_id, year_start, semester FROM academic_periods WHERE period_id = ?",
            [period_id],
            from_row,
        )
        .optional()?)
}

pub fn get_or_create(conn: &Connection, year_start: i64, semester: i64) -> anyhow::Result<AcademicPeriod> {
    conn.execute(
        "INSERT OR IGNORE INTO academic_periods(year_start, semester) VALUES(?, ?)",
        (year_start, semester),
    )?;
    Ok(conn.query_row(
        "SELECT period_id, year_start, semester FROM academic_periods
         WHERE year_start = ? AND semester = ?",
        (year_start, semester),
        from_row,
    )?)
}
