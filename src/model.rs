use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkStatus {
    Planned,
    InProgress,
    Done,
    Confirmed,
    Reported,
}

impl WorkStatus {
    pub const ALL: [WorkStatus; 5] = [
        WorkStatus::Planned,
        WorkStatus::InProgress,
        WorkStatus::Done,
        WorkStatus::Confirmed,
        WorkStatus::Reported,
    ];

    pub fn as_i64(self) -> i64 {
        match self {
            WorkStatus::Planned => 0,
            WorkStatus::InProgress => 1,
            WorkStatus::Done => 2,
            WorkStatus::Confirmed => 3,
            WorkStatus::Reported => 4,
        }
    }

    /// Unknown stored values fall back to `Planned`.
    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => WorkStatus::InProgress,
            2 => WorkStatus::Done,
            3 => WorkStatus::Confirmed,
            4 => WorkStatus::Reported,
            _ => WorkStatus::Planned,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WorkStatus::Planned => "Planned",
            WorkStatus::InProgress => "InProgress",
            WorkStatus::Done => "Done",
            WorkStatus::Confirmed => "Confirmed",
            WorkStatus::Reported => "Reported",
        }
    }

    /// Accepts the enum name (any case) or its numeric code.
    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim();
        if let Ok(n) = t.parse::<i64>() {
            return Self::ALL.iter().copied().find(|st| st.as_i64() == n);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|st| st.name().eq_ignore_ascii_case(t))
    }

    /// Manual status button: steps forward and wraps after `Reported`.
    pub fn next(self) -> Self {
        match self {
            WorkStatus::Planned => WorkStatus::InProgress,
            WorkStatus::InProgress => WorkStatus::Done,
            WorkStatus::Done => WorkStatus::Confirmed,
            WorkStatus::Confirmed => WorkStatus::Reported,
            WorkStatus::Reported => WorkStatus::Planned,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WorkStatus::Planned => "Запланирована",
            WorkStatus::InProgress => "Выполняется",
            WorkStatus::Done => "Ожидает подтверждения",
            WorkStatus::Confirmed => "Подтверждена",
            WorkStatus::Reported => "Учтена в отчёте",
        }
    }

    /// Statuses that still have a deadline to chase.
    pub fn is_open(self) -> bool {
        matches!(self, WorkStatus::Planned | WorkStatus::InProgress)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub teacher_id: String,
    pub full_name: String,
    pub short_name: String,
    pub is_head: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub section_id: i64,
    pub name: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub section_id: i64,
    pub item_id: String,
    pub name: String,
    pub max_points: String,
    pub max_points_numeric: Option<i64>,
    pub sort_order: i64,
}

impl WorkItem {
    pub fn display_id(&self) -> String {
        format!("п.{}", self.item_id)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedFile {
    pub file_id: String,
    pub work_id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedWork {
    pub work_id: String,
    pub teacher_id: String,
    pub section_id: i64,
    pub item_id: String,
    pub work_name: String,
    pub points: i64,
    pub due_date: Option<String>,
    pub status: WorkStatus,
    pub period_id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub attached_files: Vec<AttachedFile>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicPeriod {
    pub period_id: i64,
    pub year_start: i64,
    pub semester: i64,
}

impl AcademicPeriod {
    pub fn display_name(&self) -> String {
        format!(
            "{}-{}, {} семестр",
            self.year_start,
            self.year_start + 1,
            self.semester
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub current_teacher_id: String,
    pub is_head: bool,
    pub department_name: String,
    pub department_short_name: String,
    pub semester_year: String,
    pub semester_number: i64,
    pub is_first_run: bool,
    pub reference_file_path: String,
}
