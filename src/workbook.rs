use crate::rubric::Grid;
use anyhow::{anyhow, Context};
use calamine::{open_workbook_auto, Data, Range, Reader};
use serde::Serialize;
use std::path::Path;

pub const DEPARTMENTS_SHEET: &str = "Кафедры";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub full_name: String,
    pub short_name: String,
}

pub struct RubricWorkbook {
    pub rubric: Grid,
    pub departments: Vec<Department>,
}

/// Reads the first sheet as the rubric and the optional departments sheet.
pub fn read_workbook(path: &Path) -> anyhow::Result<RubricWorkbook> {
    let mut wb = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.to_string_lossy()))?;

    let first = wb
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook has no sheets"))?
        .context("failed to read first sheet")?;
    let rubric = range_to_grid(&first);

    let has_departments = wb
        .sheet_names()
        .iter()
        .any(|n| n.trim() == DEPARTMENTS_SHEET);
    let departments = if has_departments {
        let range = wb
            .worksheet_range(DEPARTMENTS_SHEET)
            .context("failed to read departments sheet")?;
        parse_departments(&range_to_grid(&range))
    } else {
        Vec::new()
    };

    Ok(RubricWorkbook {
        rubric,
        departments,
    })
}

fn range_to_grid(range: &Range<Data>) -> Grid {
    let Some((last_row, last_col)) = range.end() else {
        return Grid::default();
    };
    let rows = (0..=last_row)
        .map(|r| {
            (0..=last_col)
                .map(|c| range.get_value((r, c)).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();
    Grid::from_rows(rows)
}

/// Numbers render the way a spreadsheet shows them: `7`, not `7.0`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

pub fn format_number(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

pub fn parse_departments(grid: &Grid) -> Vec<Department> {
    let mut out: Vec<Department> = Vec::new();
    for row in 0..grid.row_count() {
        let full = grid.cell(row, 0).trim();
        if full.is_empty() {
            continue;
        }
        if row == 0 && full.to_lowercase().contains("кафедр") {
            continue;
        }
        let short = grid.cell(row, 1).trim();
        let short_name = if short.is_empty() {
            acronym(full)
        } else {
            short.to_string()
        };
        if out.iter().any(|d| d.full_name == full) {
            continue;
        }
        out.push(Department {
            full_name: full.to_string(),
            short_name,
        });
    }
    out
}

/// "Информационные технологии транспорта" -> "ИТТ"; short words are skipped.
pub fn acronym(name: &str) -> String {
    name.split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .filter_map(|w| w.chars().next())
        .flat_map(|c| c.to_uppercase())
        .collect()
}
