use crate::db::{settings_get, settings_set};
use crate::model::AppSettings;
use rusqlite::Connection;

pub const CURRENT_TEACHER_ID: &str = "CurrentTeacherId";
pub const IS_HEAD: &str = "IsHead";
pub const DEPARTMENT_NAME: &str = "DepartmentName";
pub const DEPARTMENT_SHORT_NAME: &str = "DepartmentShortName";
pub const SEMESTER_YEAR: &str = "SemesterYear";
pub const SEMESTER_NUMBER: &str = "SemesterNumber";
pub const IS_FIRST_RUN: &str = "IsFirstRun";
pub const REFERENCE_FILE_PATH: &str = "ReferenceFilePath";

fn text(conn: &Connection, key: &str) -> anyhow::Result<String> {
    Ok(settings_get(conn, key)?.unwrap_or_default())
}

pub fn load(conn: &Connection) -> anyhow::Result<AppSettings> {
    Ok(AppSettings {
        current_teacher_id: text(conn, CURRENT_TEACHER_ID)?,
        is_head: text(conn, IS_HEAD)? == "1",
        department_name: text(conn, DEPARTMENT_NAME)?,
        department_short_name: text(conn, DEPARTMENT_SHORT_NAME)?,
        semester_year: text(conn, SEMESTER_YEAR)?,
        semester_number: text(conn, SEMESTER_NUMBER)?.trim().parse().unwrap_or(0),
        // Anything but an explicit "0" keeps the setup wizard pending.
        is_first_run: text(conn, IS_FIRST_RUN)? != "0",
        reference_file_path: text(conn, REFERENCE_FILE_PATH)?,
    })
}

pub fn save(conn: &Connection, s: &AppSettings) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    settings_set(&tx, CURRENT_TEACHER_ID, &s.current_teacher_id)?;
    settings_set(&tx, IS_HEAD, if s.is_head { "1" } else { "0" })?;
    settings_set(&tx, DEPARTMENT_NAME, &s.department_name)?;
    settings_set(&tx, DEPARTMENT_SHORT_NAME, &s.department_short_name)?;
    settings_set(&tx, SEMESTER_YEAR, &s.semester_year)?;
    settings_set(&tx, SEMESTER_NUMBER, &s.semester_number.to_string())?;
    settings_set(&tx, IS_FIRST_RUN, if s.is_first_run { "1" } else { "0" })?;
    settings_set(&tx, REFERENCE_FILE_PATH, &s.reference_file_path)?;
    tx.commit()?;
    Ok(())
}
