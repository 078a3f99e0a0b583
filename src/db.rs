use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "asuipp.sqlite3";
pub const SCHEMA_VERSION: &str = "2";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections(
            section_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS work_items(
            section_id INTEGER NOT NULL,
            item_id TEXT NOT NULL,
            name TEXT NOT NULL,
            max_points TEXT NOT NULL DEFAULT '',
            max_points_numeric INTEGER,
            sort_order INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY(section_id, item_id),
            FOREIGN KEY(section_id) REFERENCES sections(section_id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            teacher_id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            short_name TEXT NOT NULL,
            is_head INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS academic_periods(
            period_id INTEGER PRIMARY KEY AUTOINCREMENT,
            year_start INTEGER NOT NULL,
            semester INTEGER NOT NULL,
            UNIQUE(year_start, semester)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS planned_works(
            work_id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            section_id INTEGER NOT NULL,
            item_id TEXT NOT NULL,
            work_name TEXT NOT NULL,
            points INTEGER NOT NULL DEFAULT 0,
            due_date TEXT,
            status INTEGER NOT NULL DEFAULT 0,
            period_id INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(teacher_id) REFERENCES teachers(teacher_id) ON DELETE CASCADE,
            FOREIGN KEY(section_id, item_id) REFERENCES work_items(section_id, item_id)
        )",
        [],
    )?;
    // Version 1 stores had no academic periods.
    ensure_planned_works_period(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attached_files(
            file_id TEXT PRIMARY KEY,
            work_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_path TEXT NOT NULL,
            file_type TEXT,
            FOREIGN KEY(work_id) REFERENCES planned_works(work_id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_planned_works_teacher ON planned_works(teacher_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_planned_works_section ON planned_works(section_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_planned_works_due ON planned_works(due_date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attached_files_work ON attached_files(work_id)",
        [],
    )?;

    conn.execute(
        "INSERT INTO settings(key, value) VALUES('SchemaVersion', ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [SCHEMA_VERSION],
    )?;

    Ok(conn)
}

fn ensure_planned_works_period(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "planned_works", "period_id")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE planned_works ADD COLUMN period_id INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let v: Option<Option<String>> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(v.flatten())
}

pub fn settings_set(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent_and_versioned() {
        let tmp = tempfile::tempdir().expect("tempdir");
        drop(open_db(tmp.path()).expect("first open"));
        let conn = open_db(tmp.path()).expect("second open");
        assert_eq!(
            settings_get(&conn, "SchemaVersion").expect("read version"),
            Some(SCHEMA_VERSION.to_string())
        );
        assert!(table_has_column(&conn, "planned_works", "period_id").expect("pragma"));
        assert!(!table_has_column(&conn, "planned_works", "nope").expect("pragma"));
    }

    #[test]
    fn adds_period_column_to_old_stores() {
        let tmp = tempfile::tempdir().expect("tempdir");
        {
            let conn = Connection::open(tmp.path().join(DB_FILE)).expect("open raw");
            conn.execute_batch(
                "CREATE TABLE planned_works(
                    work_id TEXT PRIMARY KEY,
                    teacher_id TEXT NOT NULL,
                    section_id INTEGER NOT NULL,
                    item_id TEXT NOT NULL,
                    work_name TEXT NOT NULL,
                    points INTEGER NOT NULL DEFAULT 0,
                    due_date TEXT,
                    status INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );",
            )
            .expect("create v1 table");
        }
        let conn = open_db(tmp.path()).expect("migrate");
        assert!(table_has_column(&conn, "planned_works", "period_id").expect("pragma"));
    }
}
