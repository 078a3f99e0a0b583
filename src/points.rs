use thiserror::Error;

pub const MAX_PER_SECTION: i64 = 50;
pub const MAX_TOTAL: i64 = 100;

/// Extracts the largest point value a rubric string allows.
///
/// Rubric cells hold things like `"7"`, `"-5"`, `"7.0"`, `"3/5/7"` or
/// `"1 балл за 1 практику"`. Strategies are tried in that order; `None` means
/// the cell carries no number at all.
pub fn parse_max_points(raw: &str) -> Option<i64> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(v) = cleaned.parse::<i64>() {
        return Some(v);
    }

    if let Ok(v) = cleaned.replace(',', ".").parse::<f64>() {
        if v.is_finite() {
            return Some(v.trunc() as i64);
        }
    }

    if cleaned.contains('/') {
        let max = cleaned
            .split('/')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .filter_map(|p| p.replace(',', ".").parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .map(|v| v.trunc() as i64)
            .max();
        if max.is_some() {
            return max;
        }
    }

    first_number(cleaned)
}

/// First run of digits, with an optional leading minus. A minus that is not
/// directly followed by a digit ends the scan.
fn first_number(text: &str) -> Option<i64> {
    let mut buf = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() || (ch == '-' && buf.is_empty()) {
            buf.push(ch);
        } else if !buf.is_empty() {
            break;
        }
    }
    buf.parse::<i64>().ok()
}

/// Negative caps are penalties: the claim must sit between the cap and zero.
pub fn fits_item_cap(points: i64, cap: Option<i64>) -> bool {
    match cap {
        None => true,
        Some(c) if c < 0 => points >= c && points <= 0,
        Some(c) => points >= 0 && points <= c,
    }
}

pub fn cap_display(raw: &str, cap: Option<i64>) -> String {
    let Some(c) = cap else {
        return "без ограничений".to_string();
    };
    if c < 0 {
        return format!("штраф: {}", raw);
    }
    let raw = raw.trim();
    if raw.contains('/') {
        format!("макс. {} ({})", c, raw)
    } else {
        format!("макс. {}", c)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("section limit ({limit} points) exceeded: current {current}, available {available}")]
    SectionExceeded {
        limit: i64,
        current: i64,
        available: i64,
    },
    #[error("total limit ({limit} points) exceeded: current {current}, available {available}")]
    TotalExceeded {
        limit: i64,
        current: i64,
        available: i64,
    },
}

impl LimitError {
    pub fn code(&self) -> &'static str {
        match self {
            LimitError::SectionExceeded { .. } => "section_limit_exceeded",
            LimitError::TotalExceeded { .. } => "total_limit_exceeded",
        }
    }
}

/// Minimal view of a planned work needed for limit arithmetic.
#[derive(Debug, Clone)]
pub struct PointsEntry {
    pub work_id: String,
    pub section_id: i64,
    pub points: i64,
}

fn saturating_sum(points: impl Iterator<Item = i64>) -> i64 {
    points.fold(0i64, i64::saturating_add)
}

/// Checks that `new_points` still fits the section and total ceilings.
/// `exclude_work_id` is the work being edited, whose old value must not count.
/// A sum that overflows `i64` counts as over the ceiling.
pub fn check_limits(
    new_points: i64,
    section_id: i64,
    exclude_work_id: Option<&str>,
    entries: &[PointsEntry],
) -> Result<(), LimitError> {
    let others = entries
        .iter()
        .filter(|e| Some(e.work_id.as_str()) != exclude_work_id);

    let section_sum = saturating_sum(
        others
            .clone()
            .filter(|e| e.section_id == section_id)
            .map(|e| e.points),
    );
    if section_sum
        .checked_add(new_points)
        .map_or(true, |sum| sum > MAX_PER_SECTION)
    {
        return Err(LimitError::SectionExceeded {
            limit: MAX_PER_SECTION,
            current: section_sum,
            available: MAX_PER_SECTION.saturating_sub(section_sum),
        });
    }

    let total_sum = saturating_sum(others.map(|e| e.points));
    if total_sum
        .checked_add(new_points)
        .map_or(true, |sum| sum > MAX_TOTAL)
    {
        return Err(LimitError::TotalExceeded {
            limit: MAX_TOTAL,
            current: total_sum,
            available: MAX_TOTAL.saturating_sub(total_sum),
        });
    }

    Ok(())
}

pub fn raw_section_sum(entries: &[PointsEntry], section_id: i64) -> i64 {
    saturating_sum(
        entries
            .iter()
            .filter(|e| e.section_id == section_id)
            .map(|e| e.points),
    )
}

pub fn effective_section_sum(entries: &[PointsEntry], section_id: i64) -> i64 {
    raw_section_sum(entries, section_id).min(MAX_PER_SECTION)
}

pub fn effective_total(entries: &[PointsEntry], section_ids: &[i64]) -> i64 {
    saturating_sum(
        section_ids
            .iter()
            .map(|sid| effective_section_sum(entries, *sid)),
    )
    .min(MAX_TOTAL)
}

/// Splits an imported score into per-work portions no larger than the item cap.
pub fn split_points(total: i64, max_per_work: i64) -> Vec<i64> {
    if max_per_work <= 0 || total <= max_per_work {
        return vec![total];
    }
    let mut out = Vec::new();
    let mut remaining = total;
    while remaining > 0 {
        let portion = remaining.min(max_per_work);
        out.push(portion);
        remaining -= portion;
    }
    out
}
