use crate::model::{Section, WorkItem, WorkStatus};
use crate::points;
use crate::repo::{self, reference, teachers, works};
use crate::rubric::{self, ParsedRubric, SemesterInfo};
use crate::workbook::{self, Department};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub sections_count: usize,
    pub work_items_count: usize,
    pub teachers_count: usize,
    pub scores_count: usize,
    pub semester: String,
    pub year: String,
    pub semester_number: i64,
    pub departments: Vec<Department>,
    pub errors: Vec<String>,
}

pub fn import_workbook(conn: &Connection, path: &Path) -> anyhow::Result<ImportResult> {
    let wb = workbook::read_workbook(path)?;
    let parsed = rubric::parse_rubric(&wb.rubric);
    let info = rubric::semester_info(&wb.rubric);
    let mut result = apply_rubric(conn, &parsed, info)?;
    result.departments = wb.departments;
    info!(
        path = %path.display(),
        sections = result.sections_count,
        items = result.work_items_count,
        teachers = result.teachers_count,
        scores = result.scores_count,
        errors = result.errors.len(),
        "rubric workbook imported"
    );
    Ok(result)
}

/// Writes a parsed rubric into the store. Sections, items and roster teachers
/// are committed together; score rows fail individually into `errors`.
pub fn apply_rubric(
    conn: &Connection,
    parsed: &ParsedRubric,
    info: SemesterInfo,
) -> anyhow::Result<ImportResult> {
    let mut result = ImportResult {
        semester: parsed.semester.clone(),
        year: info.year,
        semester_number: info.number,
        ..Default::default()
    };

    let tx = conn.unchecked_transaction()?;

    let mut roster: HashMap<String, String> = HashMap::new();
    for col in &parsed.teachers {
        let teacher = match teachers::get_by_full_name(&tx, &col.name)? {
            Some(t) => t,
            None => {
                // Roster cells already hold the short form ("Хабаров В.И.").
                let t = teachers::new_teacher(&col.name, &col.name, false);
                teachers::insert(&tx, &t)?;
                result.teachers_count += 1;
                t
            }
        };
        roster.insert(col.name.clone(), teacher.teacher_id);
    }

    for s in &parsed.sections {
        reference::upsert_section(
            &tx,
            &Section {
                section_id: s.section_id,
                name: s.name.clone(),
                sort_order: s.sort_order,
            },
        )?;
        result.sections_count += 1;
    }

    for it in &parsed.items {
        reference::upsert_item(
            &tx,
            &WorkItem {
                section_id: it.section_id,
                item_id: it.item_id.clone(),
                name: it.name.clone(),
                max_points: it.max_points.clone(),
                max_points_numeric: it.max_points_numeric,
                sort_order: it.sort_order,
            },
        )?;
        result.work_items_count += 1;
    }

    let today = repo::today();
    for score in &parsed.scores {
        let Some(teacher_id) = roster.get(&score.teacher_name) else {
            continue;
        };
        if works::has_work_for_item(&tx, teacher_id, score.section_id, &score.item_id)? {
            continue;
        }
        for portion in points::split_points(score.points, score.max_per_work) {
            let mut work = works::new_work(
                teacher_id,
                score.section_id,
                &score.item_id,
                &score.item_name,
                portion,
                Some(today),
            );
            work.status = WorkStatus::Confirmed;
            match works::insert(&tx, &work) {
                Ok(()) => result.scores_count += 1,
                Err(e) => {
                    warn!(row = score.row, teacher = %score.teacher_name, "score row skipped: {e}");
                    result
                        .errors
                        .push(format!("Row {}, {}: {}", score.row + 1, score.teacher_name, e));
                }
            }
        }
    }

    tx.commit()?;
    Ok(result)
}
