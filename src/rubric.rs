//! Heuristic reader for the department rubric spreadsheet.
//!
//! The sheet has no machine-readable structure: section headers, numbered
//! items and lettered sub-items are told apart by the text in columns A/B.
//! Row 4 lists the teachers (one column each, starting at D) and the cells
//! under them hold the points each teacher already earned.

use crate::points;
use regex::Regex;
use std::sync::OnceLock;

const HEADER_ROW: usize = 0;
const SEMESTER_COL: usize = 4;
const YEAR_COL: usize = 8;
const ROSTER_ROW: usize = 4;
const ROSTER_FIRST_COL: usize = 3;
const FIRST_ITEM_ROW: usize = 5;
const COL_NUMBER: usize = 0;
const COL_NAME: usize = 1;
const COL_POINTS: usize = 2;

const SUB_LETTERS: &[char] = &['а', 'б', 'в', 'г', 'д', 'е', 'ж', 'з', 'и', 'к'];
const NBSP: char = '\u{a0}';

/// Plain text view of one worksheet, row-major and 0-based.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row_len(&self, row: usize) -> usize {
        self.rows.get(row).map(|r| r.len()).unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSection {
    pub section_id: i64,
    pub name: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedItem {
    pub section_id: i64,
    pub item_id: String,
    pub name: String,
    pub max_points: String,
    pub max_points_numeric: Option<i64>,
    pub sort_order: i64,
    pub is_container: bool,
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterColumn {
    pub col: usize,
    pub name: String,
}

/// Points a roster teacher has against one item, before splitting by cap.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScore {
    pub teacher_name: String,
    pub section_id: i64,
    pub item_id: String,
    pub item_name: String,
    pub points: i64,
    pub max_per_work: i64,
    pub row: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedRubric {
    pub semester: String,
    pub year: String,
    pub teachers: Vec<RosterColumn>,
    pub sections: Vec<ParsedSection>,
    pub items: Vec<ParsedItem>,
    pub scores: Vec<ParsedScore>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemesterInfo {
    pub number: i64,
    pub year: String,
}

fn section_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.\s+\S").expect("valid section regex"))
}

fn section_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\s+").expect("valid prefix regex"))
}

fn item_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\d.]+$").expect("valid item regex"))
}

/// Returns the section number when the row is a `N. Name` header.
pub fn detect_section_header(cell_a: &str, cell_b: &str) -> Option<i64> {
    let text = format!("{} {}", cell_a, cell_b).replace(NBSP, " ");
    let text = text.trim();
    section_header_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .filter(|id| *id > 0)
}

pub fn extract_section_name(cell_a: &str, cell_b: &str) -> String {
    let text = if cell_b.is_empty() { cell_a } else { cell_b };
    let text = text.replace(NBSP, " ");
    section_prefix_re()
        .replace(text.trim(), "")
        .trim()
        .to_string()
}

fn numbered_item_id(cell_a: &str) -> Option<String> {
    let cleaned = cell_a.replace(NBSP, "");
    let cleaned = cleaned.trim();
    if !cleaned.is_empty() && item_number_re().is_match(cleaned) {
        Some(cleaned.to_string())
    } else {
        None
    }
}

fn looks_like_sub_item(cell_b: &str) -> bool {
    cell_b.starts_with('-') || cell_b.starts_with(' ') || cell_b.starts_with(NBSP)
}

fn is_total_row(cell_a: &str, cell_b: &str) -> bool {
    cell_a.trim().to_lowercase().starts_with("итого")
        || cell_b.trim().to_lowercase().starts_with("итого")
}

/// Normalizes the points cell: line breaks separate alternatives.
pub fn clean_points(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    raw.replace('\n', "/")
        .replace(['\r', NBSP], "")
        .trim()
        .trim_end_matches('/')
        .to_string()
}

/// Letter suffix for the `index`-th sub-item of a numbered item.
pub fn sub_item_suffix(index: usize) -> String {
    match SUB_LETTERS.get(index) {
        Some(c) => c.to_string(),
        None => (index + 1).to_string(),
    }
}

fn is_container_row(grid: &Grid, row: usize) -> bool {
    if row + 1 >= grid.row_count() {
        return false;
    }
    grid.cell(row + 1, COL_NUMBER).is_empty() && looks_like_sub_item(grid.cell(row + 1, COL_NAME))
}

/// Integer value of a score cell; anything unreadable counts as zero.
pub fn cell_int(text: &str) -> i64 {
    let t = text.trim();
    if let Ok(v) = t.parse::<i64>() {
        return v;
    }
    match t.replace(',', ".").parse::<f64>() {
        Ok(v) if v.is_finite() => v.trunc() as i64,
        _ => 0,
    }
}

pub fn semester_info(grid: &Grid) -> SemesterInfo {
    let label = grid.cell(HEADER_ROW, SEMESTER_COL);
    let digits: String = label
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    SemesterInfo {
        number: digits.parse().unwrap_or(0),
        year: grid.cell(HEADER_ROW, YEAR_COL).trim().to_string(),
    }
}

fn roster(grid: &Grid) -> Vec<RosterColumn> {
    (ROSTER_FIRST_COL..grid.row_len(ROSTER_ROW))
        .filter_map(|col| {
            let name = grid.cell(ROSTER_ROW, col).trim();
            if name.is_empty() {
                None
            } else {
                Some(RosterColumn {
                    col,
                    name: name.to_string(),
                })
            }
        })
        .collect()
}

pub fn parse_rubric(grid: &Grid) -> ParsedRubric {
    let mut out = ParsedRubric {
        semester: grid.cell(HEADER_ROW, SEMESTER_COL).trim().to_string(),
        year: grid.cell(HEADER_ROW, YEAR_COL).trim().to_string(),
        teachers: roster(grid),
        ..Default::default()
    };

    // Pass 1: sections and items.
    let mut current_section = 0i64;
    let mut section_sort = 0i64;
    let mut item_sort = 0i64;
    let mut last_main: Option<String> = None;
    let mut sub_count = 0usize;

    for row in FIRST_ITEM_ROW..grid.row_count() {
        let cell_a = grid.cell(row, COL_NUMBER);
        let cell_b = grid.cell(row, COL_NAME);

        if let Some(sid) = detect_section_header(cell_a, cell_b) {
            current_section = sid;
            if !out.sections.iter().any(|s| s.section_id == sid) {
                section_sort += 1;
                out.sections.push(ParsedSection {
                    section_id: sid,
                    name: extract_section_name(cell_a, cell_b),
                    sort_order: section_sort,
                });
            }
            item_sort = 0;
            last_main = None;
            sub_count = 0;
            continue;
        }

        if current_section == 0 {
            continue;
        }
        if is_total_row(cell_a, cell_b) {
            break;
        }

        let (item_id, item_name) = match numbered_item_id(cell_a) {
            Some(id) => {
                last_main = Some(id.clone());
                sub_count = 0;
                (id, cell_b.trim().to_string())
            }
            None => {
                if cell_b.is_empty() || !looks_like_sub_item(cell_b) {
                    continue;
                }
                let Some(base) = last_main.as_ref() else {
                    continue;
                };
                let id = format!("{}{}", base, sub_item_suffix(sub_count));
                sub_count += 1;
                let name = cell_b
                    .trim_start_matches([' ', '-', NBSP, '–'])
                    .trim()
                    .to_string();
                (id, name)
            }
        };
        if item_name.is_empty() {
            continue;
        }

        let max_points = clean_points(grid.cell(row, COL_POINTS));
        let is_container = max_points.is_empty() && is_container_row(grid, row);
        let max_points_numeric = points::parse_max_points(&max_points);

        item_sort += 1;
        out.items.push(ParsedItem {
            section_id: current_section,
            item_id,
            name: item_name,
            max_points,
            max_points_numeric,
            sort_order: item_sort,
            is_container,
            row,
        });
    }

    // Pass 2: roster scores on the item rows found above.
    for item in out.items.iter().filter(|i| !i.is_container) {
        let max_per_work = item.max_points_numeric.filter(|c| *c > 0).unwrap_or(0);
        for teacher in &out.teachers {
            let value = cell_int(grid.cell(item.row, teacher.col));
            if value == 0 {
                continue;
            }
            out.scores.push(ParsedScore {
                teacher_name: teacher.name.clone(),
                section_id: item.section_id,
                item_id: item.item_id.clone(),
                item_name: item.name.clone(),
                points: value,
                max_per_work,
                row: item.row,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn sample_grid() -> Grid {
        Grid::from_rows(vec![
            row(&["Показатели", "", "", "", "1 семестр", "", "", "", "2024-2025"]),
            row(&[]),
            row(&[]),
            row(&[]),
            row(&["№", "Виды работ", "Баллы", "Хабаров В.И.", "Петрова А.А.", ""]),
            row(&["1.", "Учебная работа"]),
            row(&["1", "Оценка по анкете", "7", "7", ""]),
            row(&["2", "Руководство практикой", "", "", ""]),
            row(&["", "- учебной", "1 балл за 1 практику", "3", ""]),
            row(&["", "\u{a0}производственной", "2", "", "4"]),
            row(&["4.1", "Подготовка пособия", "3/5\n7/", "", "9"]),
            row(&["2.\u{a0}Научная работа", ""]),
            row(&["1", "Статья ВАК", "8", "28", ""]),
            row(&["2", "Штраф", "-5", "-5", ""]),
            row(&["Итого", "", "", "43", "13"]),
            row(&["3", "после итого", "1", "1", "1"]),
        ])
    }

    #[test]
    fn header_detection() {
        assert_eq!(detect_section_header("1.", "Учебная работа"), Some(1));
        assert_eq!(detect_section_header("3.\u{a0}Воспитательная", ""), Some(3));
        assert_eq!(detect_section_header("4.1", "Пособие"), None);
        assert_eq!(detect_section_header("1", "Оценка"), None);
        assert_eq!(extract_section_name("2. Научная", ""), "Научная");
        assert_eq!(extract_section_name("1.", " Учебная работа "), "Учебная работа");
    }

    #[test]
    fn points_cleanup() {
        assert_eq!(clean_points("3/5\n7/"), "3/5/7");
        assert_eq!(clean_points("\u{a0}7\r\n"), "7");
        assert_eq!(clean_points("  "), "");
    }

    #[test]
    fn suffixes_run_out_into_digits() {
        assert_eq!(sub_item_suffix(0), "а");
        assert_eq!(sub_item_suffix(9), "к");
        assert_eq!(sub_item_suffix(10), "11");
    }

    #[test]
    fn parses_sections_items_and_subitems() {
        let parsed = parse_rubric(&sample_grid());
        assert_eq!(parsed.semester, "1 семестр");
        assert_eq!(parsed.year, "2024-2025");
        assert_eq!(
            parsed.teachers.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            vec!["Хабаров В.И.", "Петрова А.А."]
        );

        assert_eq!(parsed.sections.len(), 2);
        assert_eq!(parsed.sections[0].name, "Учебная работа");
        assert_eq!(parsed.sections[1].section_id, 2);
        assert_eq!(parsed.sections[1].name, "Научная работа");

        let ids: Vec<(i64, &str)> = parsed
            .items
            .iter()
            .map(|i| (i.section_id, i.item_id.as_str()))
            .collect();
        assert_eq!(
            ids,
            vec![(1, "1"), (1, "2"), (1, "2а"), (1, "2б"), (1, "4.1"), (2, "1"), (2, "2")]
        );

        let container = &parsed.items[1];
        assert!(container.is_container);
        assert_eq!(container.max_points_numeric, None);

        let sub = &parsed.items[2];
        assert_eq!(sub.name, "учебной");
        assert_eq!(sub.max_points_numeric, Some(1));
        assert_eq!(parsed.items[3].name, "производственной");

        let manual = &parsed.items[4];
        assert_eq!(manual.max_points, "3/5/7");
        assert_eq!(manual.max_points_numeric, Some(7));
        assert_eq!(parsed.items[6].max_points_numeric, Some(-5));
    }

    #[test]
    fn collects_roster_scores_and_stops_at_total() {
        let parsed = parse_rubric(&sample_grid());
        let scores: Vec<(&str, i64, &str, i64, i64)> = parsed
            .scores
            .iter()
            .map(|s| {
                (
                    s.teacher_name.as_str(),
                    s.section_id,
                    s.item_id.as_str(),
                    s.points,
                    s.max_per_work,
                )
            })
            .collect();
        assert_eq!(
            scores,
            vec![
                ("Хабаров В.И.", 1, "1", 7, 7),
                ("Хабаров В.И.", 1, "2а", 3, 1),
                ("Петрова А.А.", 1, "2б", 4, 2),
                ("Петрова А.А.", 1, "4.1", 9, 7),
                ("Хабаров В.И.", 2, "1", 28, 8),
                ("Хабаров В.И.", 2, "2", -5, 0),
            ]
        );
    }

    #[test]
    fn semester_number_from_label() {
        let info = semester_info(&sample_grid());
        assert_eq!(
            info,
            SemesterInfo {
                number: 1,
                year: "2024-2025".to_string()
            }
        );
        assert_eq!(semester_info(&Grid::default()).number, 0);
    }
}
