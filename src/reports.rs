//! Excel reports: the department summary and a teacher's personal sheet.
//!
//! Report content is assembled into plain tables first (`build_*`) so the
//! capped arithmetic can be checked without opening a workbook.

use crate::model::{PlannedWork, Section, Teacher, WorkItem};
use crate::points::{self, PointsEntry, MAX_PER_SECTION};
use crate::repo::{self, reference, settings, teachers, works};
use crate::storage;
use anyhow::{anyhow, Context};
use rusqlite::Connection;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

const SECTION_FILL: u32 = 0xD9E1F2;
const TOTAL_FILL: u32 = 0xFCE4D6;

pub struct SummarySection {
    pub section: Section,
    /// Capped section sum per teacher, in `SummaryTable::teachers` order.
    pub totals: Vec<i64>,
    pub items: Vec<(WorkItem, Vec<i64>)>,
}

pub struct SummaryTable {
    pub teachers: Vec<Teacher>,
    pub sections: Vec<SummarySection>,
    pub totals: Vec<i64>,
}

pub struct PersonalSection {
    pub section: Section,
    pub raw: i64,
    pub capped: i64,
    pub works: Vec<PlannedWork>,
}

pub struct PersonalTable {
    pub teacher: Teacher,
    pub sections: Vec<PersonalSection>,
    pub total: i64,
}

impl PersonalSection {
    pub fn points_label(&self) -> String {
        if self.raw > MAX_PER_SECTION {
            format!("{} (из {})", self.capped, self.raw)
        } else {
            self.raw.to_string()
        }
    }
}

fn entries_of(list: &[PlannedWork]) -> Vec<PointsEntry> {
    list.iter()
        .map(|w| PointsEntry {
            work_id: w.work_id.clone(),
            section_id: w.section_id,
            points: w.points,
        })
        .collect()
}

pub fn build_summary(conn: &Connection) -> anyhow::Result<SummaryTable> {
    let teacher_list = teachers::list(conn)?;
    let sections = reference::list_sections(conn)?;
    let section_ids: Vec<i64> = sections.iter().map(|s| s.section_id).collect();

    let mut per_teacher: Vec<Vec<PlannedWork>> = Vec::with_capacity(teacher_list.len());
    for t in &teacher_list {
        per_teacher.push(works::by_teacher(conn, &t.teacher_id)?);
    }
    let entries: Vec<Vec<PointsEntry>> = per_teacher.iter().map(|w| entries_of(w)).collect();

    // (teacher index, section, item) -> summed points
    let mut item_sums: HashMap<(usize, i64, String), i64> = HashMap::new();
    for (idx, list) in per_teacher.iter().enumerate() {
        for w in list {
            *item_sums
                .entry((idx, w.section_id, w.item_id.clone()))
                .or_default() += w.points;
        }
    }

    let mut out_sections = Vec::with_capacity(sections.len());
    for s in sections {
        let totals = entries
            .iter()
            .map(|e| points::effective_section_sum(e, s.section_id))
            .collect();
        let items = reference::items_by_section(conn, s.section_id)?
            .into_iter()
            .map(|it| {
                let sums = (0..teacher_list.len())
                    .map(|idx| {
                        item_sums
                            .get(&(idx, it.section_id, it.item_id.clone()))
                            .copied()
                            .unwrap_or(0)
                    })
                    .collect();
                (it, sums)
            })
            .collect();
        out_sections.push(SummarySection {
            section: s,
            totals,
            items,
        });
    }

    let totals = entries
        .iter()
        .map(|e| points::effective_total(e, &section_ids))
        .collect();

    Ok(SummaryTable {
        teachers: teacher_list,
        sections: out_sections,
        totals,
    })
}

pub fn build_personal(conn: &Connection, teacher_id: &str) -> anyhow::Result<PersonalTable> {
    let teacher = teachers::get(conn, teacher_id)?
        .ok_or_else(|| anyhow!("teacher not found: {}", teacher_id))?;
    let all = works::by_teacher(conn, teacher_id)?;
    let entries = entries_of(&all);
    let sections = reference::list_sections(conn)?;
    let section_ids: Vec<i64> = sections.iter().map(|s| s.section_id).collect();

    let mut out_sections = Vec::new();
    for s in sections {
        let section_works: Vec<PlannedWork> = all
            .iter()
            .filter(|w| w.section_id == s.section_id)
            .cloned()
            .collect();
        if section_works.is_empty() {
            continue;
        }
        out_sections.push(PersonalSection {
            raw: points::raw_section_sum(&entries, s.section_id),
            capped: points::effective_section_sum(&entries, s.section_id),
            section: s,
            works: section_works,
        });
    }

    Ok(PersonalTable {
        teacher,
        sections: out_sections,
        total: points::effective_total(&entries, &section_ids),
    })
}

fn semester_line(conn: &Connection) -> anyhow::Result<String> {
    let app = settings::load(conn)?;
    Ok(match (app.semester_number, app.semester_year.trim()) {
        (0, "") => String::new(),
        (0, year) => format!("{} учебный год", year),
        (n, "") => format!("{} семестр", n),
        (n, year) => format!("{} семестр {} учебного года", n, year),
    })
}

fn resolve_target(out_dir: &Path, explicit: Option<&Path>, default_name: String) -> anyhow::Result<PathBuf> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => out_dir.join(default_name),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    Ok(path)
}

pub fn write_summary(
    conn: &Connection,
    out_dir: &Path,
    out_path: Option<&Path>,
) -> anyhow::Result<PathBuf> {
    let table = build_summary(conn)?;
    let app = settings::load(conn)?;
    let dept = if app.department_short_name.trim().is_empty() {
        "кафедра".to_string()
    } else {
        storage::sanitize_file_name(app.department_short_name.trim())
    };
    let path = resolve_target(
        out_dir,
        out_path,
        format!(
            "Сводный_отчёт_{}_{}.xlsx",
            dept,
            works::format_date(repo::today())
        ),
    )?;

    let title = Format::new().set_bold().set_font_size(14);
    let header = Format::new()
        .set_bold()
        .set_text_wrap()
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);
    let teacher_header = header.clone().set_rotation(90);
    let section_fmt = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(SECTION_FILL))
        .set_border(FormatBorder::Thin);
    let cell = Format::new().set_border(FormatBorder::Thin);
    let wrap = cell.clone().set_text_wrap();
    let total_fmt = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(TOTAL_FILL))
        .set_border(FormatBorder::Thin);

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Сводный отчёт")?;
    sheet.set_column_width(0, 8)?;
    sheet.set_column_width(1, 60)?;
    sheet.set_column_width(2, 14)?;

    let dept_name = if app.department_name.trim().is_empty() {
        app.department_short_name.clone()
    } else {
        app.department_name.clone()
    };
    sheet.write_string_with_format(
        0,
        0,
        format!("Сводный отчёт по баллам ППС кафедры {}", dept_name).trim(),
        &title,
    )?;
    sheet.write_string(1, 0, &semester_line(conn)?)?;

    let header_row = 3u32;
    sheet.write_string_with_format(header_row, 0, "№", &header)?;
    sheet.write_string_with_format(header_row, 1, "Виды работ", &header)?;
    sheet.write_string_with_format(header_row, 2, "Баллы", &header)?;
    for (i, t) in table.teachers.iter().enumerate() {
        let col = 3 + i as u16;
        sheet.set_column_width(col, 6)?;
        sheet.write_string_with_format(header_row, col, &t.short_name, &teacher_header)?;
    }

    let mut row = header_row + 1;
    for block in &table.sections {
        sheet.write_string_with_format(row, 0, &format!("{}.", block.section.section_id), &section_fmt)?;
        sheet.write_string_with_format(row, 1, &block.section.name, &section_fmt)?;
        sheet.write_string_with_format(row, 2, &format!("макс. {}", MAX_PER_SECTION), &section_fmt)?;
        for (i, v) in block.totals.iter().enumerate() {
            sheet.write_number_with_format(row, 3 + i as u16, *v as f64, &section_fmt)?;
        }
        row += 1;

        for (item, sums) in &block.items {
            sheet.write_string_with_format(row, 0, &item.item_id, &cell)?;
            sheet.write_string_with_format(row, 1, &item.name, &wrap)?;
            sheet.write_string_with_format(row, 2, &item.max_points, &cell)?;
            for (i, v) in sums.iter().enumerate() {
                let col = 3 + i as u16;
                if *v == 0 {
                    sheet.write_blank(row, col, &cell)?;
                } else {
                    sheet.write_number_with_format(row, col, *v as f64, &cell)?;
                }
            }
            row += 1;
        }
    }

    sheet.write_string_with_format(row, 0, "", &total_fmt)?;
    sheet.write_string_with_format(row, 1, "ИТОГО", &total_fmt)?;
    sheet.write_string_with_format(row, 2, &format!("макс. {}", points::MAX_TOTAL), &total_fmt)?;
    for (i, v) in table.totals.iter().enumerate() {
        sheet.write_number_with_format(row, 3 + i as u16, *v as f64, &total_fmt)?;
    }

    workbook
        .save(&path)
        .with_context(|| format!("failed to write report {}", path.to_string_lossy()))?;
    info!(
        path = %path.display(),
        teachers = table.teachers.len(),
        "summary report written"
    );
    Ok(path)
}

pub fn write_personal(
    conn: &Connection,
    teacher_id: &str,
    out_dir: &Path,
    out_path: Option<&Path>,
) -> anyhow::Result<PathBuf> {
    let table = build_personal(conn, teacher_id)?;
    let safe = storage::sanitize_file_name(&table.teacher.short_name.replace('.', ""));
    let path = resolve_target(
        out_dir,
        out_path,
        format!("Отчёт_{}_{}.xlsx", safe, works::format_date(repo::today())),
    )?;

    let title = Format::new().set_bold().set_font_size(14);
    let header = Format::new()
        .set_bold()
        .set_text_wrap()
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);
    let section_fmt = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(SECTION_FILL))
        .set_border(FormatBorder::Thin);
    let cell = Format::new().set_border(FormatBorder::Thin);
    let wrap = cell.clone().set_text_wrap();
    let total_fmt = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(TOTAL_FILL))
        .set_border(FormatBorder::Thin);

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Индивидуальный отчёт")?;
    for (col, width) in [(0u16, 30.0), (1, 10.0), (2, 50.0), (3, 10.0), (4, 24.0), (5, 12.0), (6, 40.0)] {
        sheet.set_column_width(col, width)?;
    }

    sheet.write_string_with_format(
        0,
        0,
        &format!("Индивидуальный отчёт: {}", table.teacher.full_name),
        &title,
    )?;
    sheet.write_string(1, 0, &semester_line(conn)?)?;

    let header_row = 3u32;
    for (col, name) in ["Раздел", "Пункт", "Название работы", "Баллы", "Статус", "Дата", "Файлы"]
        .iter()
        .enumerate()
    {
        sheet.write_string_with_format(header_row, col as u16, *name, &header)?;
    }

    let mut row = header_row + 1;
    for block in &table.sections {
        sheet.write_string_with_format(
            row,
            0,
            &format!("{}. {}", block.section.section_id, block.section.name),
            &section_fmt,
        )?;
        for col in [1u16, 2, 4, 5, 6] {
            sheet.write_blank(row, col, &section_fmt)?;
        }
        sheet.write_string_with_format(row, 3, &block.points_label(), &section_fmt)?;
        row += 1;

        for w in &block.works {
            let files = w
                .attached_files
                .iter()
                .map(|f| f.file_name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            sheet.write_blank(row, 0, &cell)?;
            sheet.write_string_with_format(row, 1, &format!("п.{}", w.item_id), &cell)?;
            sheet.write_string_with_format(row, 2, &w.work_name, &wrap)?;
            sheet.write_number_with_format(row, 3, w.points as f64, &cell)?;
            sheet.write_string_with_format(row, 4, w.status.label(), &cell)?;
            sheet.write_string_with_format(row, 5, w.due_date.as_deref().unwrap_or(""), &cell)?;
            sheet.write_string_with_format(row, 6, &files, &wrap)?;
            row += 1;
        }
    }

    sheet.write_string_with_format(row, 0, "ИТОГО", &total_fmt)?;
    for col in [1u16, 2, 4, 5, 6] {
        sheet.write_blank(row, col, &total_fmt)?;
    }
    sheet.write_number_with_format(row, 3, table.total as f64, &total_fmt)?;

    workbook
        .save(&path)
        .with_context(|| format!("failed to write report {}", path.to_string_lossy()))?;
    info!(
        path = %path.display(),
        teacher = %table.teacher.short_name,
        total = table.total,
        "personal report written"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::WorkStatus;

    fn seed(conn: &Connection) -> (Teacher, Teacher) {
        for (id, name) in [(1, "Учебная работа"), (2, "Научная работа")] {
            reference::upsert_section(
                conn,
                &Section {
                    section_id: id,
                    name: name.to_string(),
                    sort_order: id,
                },
            )
            .expect("section");
        }
        for (sid, iid) in [(1, "1"), (1, "2"), (2, "1")] {
            reference::upsert_item(
                conn,
                &WorkItem {
                    section_id: sid,
                    item_id: iid.to_string(),
                    name: format!("item {sid}.{iid}"),
                    max_points: "40".to_string(),
                    max_points_numeric: Some(40),
                    sort_order: 0,
                },
            )
            .expect("item");
        }
        let a = teachers::new_teacher("Агеев Антон Андреевич", "Агеев А.А.", false);
        let b = teachers::new_teacher("Борисов Борис Борисович", "Борисов Б.Б.", false);
        teachers::insert(conn, &a).expect("teacher a");
        teachers::insert(conn, &b).expect("teacher b");
        (a, b)
    }

    fn add(conn: &Connection, t: &Teacher, section: i64, item: &str, pts: i64) {
        let mut w = works::new_work(&t.teacher_id, section, item, "work", pts, None);
        w.status = WorkStatus::Confirmed;
        works::insert(conn, &w).expect("work");
    }

    #[test]
    fn summary_caps_sections_and_sums_items() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let conn = db::open_db(tmp.path()).expect("db");
        let (a, b) = seed(&conn);
        // Imports bypass validation, so raw sums may exceed the ceilings.
        add(&conn, &a, 1, "1", 40);
        add(&conn, &a, 1, "2", 30);
        add(&conn, &a, 2, "1", 5);
        add(&conn, &b, 1, "1", 3);
        add(&conn, &b, 1, "1", 4);

        let table = build_summary(&conn).expect("summary");
        assert_eq!(table.teachers.len(), 2);
        assert_eq!(table.sections[0].totals, vec![50, 7]);
        assert_eq!(table.sections[0].items[0].1, vec![40, 7]);
        assert_eq!(table.sections[0].items[1].1, vec![30, 0]);
        assert_eq!(table.totals, vec![55, 7]);

        let path = write_summary(&conn, tmp.path(), None).expect("write");
        assert!(path.is_file());
    }

    #[test]
    fn personal_shows_raw_when_over_section_cap() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let conn = db::open_db(tmp.path()).expect("db");
        let (a, b) = seed(&conn);
        add(&conn, &a, 1, "1", 40);
        add(&conn, &a, 1, "2", 20);

        let table = build_personal(&conn, &a.teacher_id).expect("personal");
        assert_eq!(table.sections.len(), 1);
        assert_eq!(table.sections[0].points_label(), "50 (из 60)");
        assert_eq!(table.total, 50);

        let empty = build_personal(&conn, &b.teacher_id).expect("personal b");
        assert!(empty.sections.is_empty());
        assert_eq!(empty.total, 0);

        let out = tmp.path().join("reports").join("mine.xlsx");
        let path = write_personal(&conn, &a.teacher_id, tmp.path(), Some(&out)).expect("write");
        assert_eq!(path, out);
        assert!(out.is_file());
    }
}
