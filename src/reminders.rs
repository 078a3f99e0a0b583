use crate::model::{PlannedWork, WorkStatus};
use crate::repo::{reference, works};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_DAYS_AHEAD: i64 = 60;
pub const MAX_DAYS_AHEAD: i64 = 3660;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub work_id: String,
    pub work_name: String,
    pub section_id: i64,
    pub section_name: String,
    pub due_date: Option<String>,
    pub days_until_due: Option<i64>,
    pub status: WorkStatus,
    pub is_overdue: bool,
}

/// Negative when the deadline has passed.
pub fn days_until_due(work: &PlannedWork, today: NaiveDate) -> Option<i64> {
    work.due_date
        .as_deref()
        .and_then(works::parse_date)
        .map(|d| (d - today).num_days())
}

/// Overdue and upcoming open works, earliest deadline first.
pub fn reminders(
    conn: &Connection,
    teacher_id: &str,
    today: NaiveDate,
    days_ahead: i64,
) -> anyhow::Result<Vec<Reminder>> {
    let sections: HashMap<i64, String> = reference::list_sections(conn)?
        .into_iter()
        .map(|s| (s.section_id, s.name))
        .collect();

    let overdue = works::overdue_by_teacher(conn, teacher_id, today)?;
    let upcoming = works::upcoming_by_teacher(conn, teacher_id, today, days_ahead)?;
    Ok(merge(overdue, upcoming, &sections, today))
}

fn merge(
    overdue: Vec<PlannedWork>,
    upcoming: Vec<PlannedWork>,
    sections: &HashMap<i64, String>,
    today: NaiveDate,
) -> Vec<Reminder> {
    let mut seen = HashSet::new();
    let mut all: Vec<PlannedWork> = overdue
        .into_iter()
        .chain(upcoming)
        .filter(|w| w.status.is_open())
        .filter(|w| seen.insert(w.work_id.clone()))
        .collect();
    all.sort_by(|a, b| a.due_date.cmp(&b.due_date));

    all.into_iter()
        .map(|w| {
            let days = days_until_due(&w, today);
            Reminder {
                section_name: sections.get(&w.section_id).cloned().unwrap_or_default(),
                is_overdue: days.map(|d| d < 0).unwrap_or(false),
                days_until_due: days,
                work_id: w.work_id,
                work_name: w.work_name,
                section_id: w.section_id,
                due_date: w.due_date,
                status: w.status,
            }
        })
        .collect()
}

pub fn overdue_count(conn: &Connection, teacher_id: &str, today: NaiveDate) -> anyhow::Result<usize> {
    Ok(works::overdue_by_teacher(conn, teacher_id, today)?.len())
}
