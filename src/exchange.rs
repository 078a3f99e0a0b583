//! ZIP transfer package a teacher sends to the department head.
//!
//! Layout: `data.json` plus `files/{work_id}/{file_name}` for every attached
//! file that still exists on disk. Keys in `data.json` are PascalCase so the
//! archive stays readable by the desktop client.

use crate::model::{Teacher, WorkStatus};
use crate::repo::{self, settings, teachers, works};
use crate::storage;
use anyhow::{anyhow, Context};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DATA_ENTRY: &str = "data.json";
pub const PACKAGE_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportPackage {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub export_date: String,
    pub teacher: Option<ExportTeacher>,
    #[serde(default)]
    pub semester: Option<ExportSemester>,
    #[serde(default)]
    pub works: Vec<ExportWork>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportTeacher {
    pub teacher_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub short_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportSemester {
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub number: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportWork {
    pub work_id: String,
    pub section_id: i64,
    pub item_id: String,
    #[serde(default)]
    pub work_name: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub attached_files: Vec<ExportFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportFile {
    pub file_name: String,
    pub relative_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub path: PathBuf,
    pub works_count: usize,
    pub files_count: usize,
    pub skipped_files: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub teacher_id: String,
    pub teacher_created: bool,
    pub works_inserted: usize,
    pub works_updated: usize,
    pub files_copied: usize,
    pub errors: Vec<String>,
}

/// `АСУИПП_{short name without dots}_{YYYY-MM-DD}.zip`
pub fn archive_file_name(teacher: &Teacher, date: chrono::NaiveDate) -> String {
    let safe = storage::sanitize_file_name(&teacher.short_name.replace('.', ""));
    format!("АСУИПП_{}_{}.zip", safe, works::format_date(date))
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn export_teacher(
    conn: &Connection,
    files_root: &Path,
    teacher_id: &str,
    out_dir: &Path,
) -> anyhow::Result<ExportSummary> {
    let teacher = teachers::get(conn, teacher_id)?
        .ok_or_else(|| anyhow!("teacher not found: {}", teacher_id))?;
    let app = settings::load(conn)?;
    let teacher_works = works::by_teacher(conn, teacher_id)?;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create directory {}", out_dir.to_string_lossy()))?;
    let out_path = out_dir.join(archive_file_name(&teacher, repo::today()));
    if out_path.exists() {
        std::fs::remove_file(&out_path).with_context(|| {
            format!("failed to replace {}", out_path.to_string_lossy())
        })?;
    }

    let out_file = File::create(&out_path).with_context(|| {
        format!("failed to create output file {}", out_path.to_string_lossy())
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut package = ExportPackage {
        version: PACKAGE_VERSION.to_string(),
        export_date: repo::now_stamp(),
        teacher: Some(ExportTeacher {
            teacher_id: teacher.teacher_id.clone(),
            full_name: teacher.full_name.clone(),
            short_name: teacher.short_name.clone(),
        }),
        semester: Some(ExportSemester {
            year: Some(app.semester_year.clone()),
            number: app.semester_number,
        }),
        works: Vec::new(),
    };

    let mut files_count = 0usize;
    let mut skipped_files = Vec::new();
    for w in &teacher_works {
        let mut export_work = ExportWork {
            work_id: w.work_id.clone(),
            section_id: w.section_id,
            item_id: w.item_id.clone(),
            work_name: w.work_name.clone(),
            points: w.points,
            due_date: w.due_date.clone(),
            status: w.status.name().to_string(),
            attached_files: Vec::new(),
        };

        for f in &w.attached_files {
            let source = storage::full_path(files_root, &f.file_path);
            let bytes = match std::fs::read(&source) {
                Ok(b) => b,
                Err(e) => {
                    warn!(file = %source.display(), "attachment skipped: {e}");
                    skipped_files.push(f.file_path.clone());
                    continue;
                }
            };
            let relative_path = format!("files/{}/{}", w.work_id, f.file_name);
            zip.start_file(relative_path.as_str(), opts)
                .with_context(|| format!("failed to start entry {}", relative_path))?;
            zip.write_all(&bytes)
                .with_context(|| format!("failed to write entry {}", relative_path))?;
            export_work.attached_files.push(ExportFile {
                file_name: f.file_name.clone(),
                relative_path,
                sha256: Some(sha256_hex(&bytes)),
            });
            files_count += 1;
        }
        package.works.push(export_work);
    }

    zip.start_file(DATA_ENTRY, opts)
        .context("failed to start data.json entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&package)
            .context("failed to serialize data.json")?
            .as_bytes(),
    )
    .context("failed to write data.json entry")?;
    zip.finish().context("failed to finalize zip archive")?;

    info!(
        teacher = %teacher.short_name,
        works = package.works.len(),
        files = files_count,
        path = %out_path.display(),
        "exchange archive written"
    );

    Ok(ExportSummary {
        path: out_path,
        works_count: package.works.len(),
        files_count,
        skipped_files,
    })
}

pub fn read_package(in_path: &Path) -> anyhow::Result<(ExportPackage, ZipArchive<File>)> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open archive {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut text = String::new();
    archive
        .by_name(DATA_ENTRY)
        .context("archive missing data.json")?
        .read_to_string(&mut text)
        .context("failed to read data.json")?;
    // Files written by Windows tools may start with a BOM.
    let package: ExportPackage = serde_json::from_str(text.trim_start_matches('\u{feff}'))
        .context("data.json is invalid JSON")?;
    Ok((package, archive))
}

pub fn import_package(
    conn: &Connection,
    files_root: &Path,
    in_path: &Path,
) -> anyhow::Result<ImportSummary> {
    let (package, mut archive) = read_package(in_path)?;
    let Some(pkg_teacher) = package.teacher.as_ref() else {
        return Err(anyhow!("data.json has no teacher"));
    };
    if !storage::is_plain_component(&pkg_teacher.teacher_id) {
        return Err(anyhow!(
            "data.json has an invalid teacher id: {:?}",
            pkg_teacher.teacher_id
        ));
    }

    let mut summary = ImportSummary {
        teacher_id: pkg_teacher.teacher_id.clone(),
        ..Default::default()
    };

    if teachers::get(conn, &pkg_teacher.teacher_id)?.is_none() {
        let mut t = teachers::new_teacher(&pkg_teacher.full_name, &pkg_teacher.short_name, false);
        t.teacher_id = pkg_teacher.teacher_id.clone();
        if t.short_name.is_empty() {
            t.short_name = storage::short_name(&t.full_name);
        }
        teachers::insert(conn, &t)?;
        summary.teacher_created = true;
    }

    for ew in &package.works {
        if !storage::is_plain_component(&ew.work_id) {
            warn!(work = %ew.work_id, "archive work skipped: invalid id");
            summary
                .errors
                .push(format!("{} ({:?}): invalid work id", ew.work_name, ew.work_id));
            continue;
        }
        let status = WorkStatus::parse(&ew.status).unwrap_or(WorkStatus::Planned);
        let due_date = ew
            .due_date
            .as_deref()
            .and_then(works::parse_date)
            .map(works::format_date);

        let stored = match works::get(conn, &ew.work_id)? {
            Some(mut existing) => {
                existing.section_id = ew.section_id;
                existing.item_id = ew.item_id.clone();
                existing.work_name = ew.work_name.clone();
                existing.points = ew.points;
                existing.due_date = due_date;
                existing.status = status;
                works::update(conn, &existing).map(|_| false)
            }
            None => {
                let mut w = works::new_work(
                    &pkg_teacher.teacher_id,
                    ew.section_id,
                    &ew.item_id,
                    &ew.work_name,
                    ew.points,
                    None,
                );
                w.work_id = ew.work_id.clone();
                w.due_date = due_date;
                w.status = status;
                works::insert(conn, &w).map(|_| true)
            }
        };
        match stored {
            Ok(true) => summary.works_inserted += 1,
            Ok(false) => summary.works_updated += 1,
            Err(e) => {
                warn!(work = %ew.work_id, "archive work skipped: {e}");
                summary
                    .errors
                    .push(format!("{} ({}): {}", ew.work_name, ew.work_id, e));
                continue;
            }
        }

        for ef in &ew.attached_files {
            match import_file(conn, files_root, &mut archive, &pkg_teacher.teacher_id, &ew.work_id, ef) {
                Ok(true) => summary.files_copied += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(file = %ef.relative_path, "archive file skipped: {e}");
                    summary.errors.push(format!("{}: {}", ef.relative_path, e));
                }
            }
        }
    }

    info!(
        teacher = %summary.teacher_id,
        inserted = summary.works_inserted,
        updated = summary.works_updated,
        files = summary.files_copied,
        errors = summary.errors.len(),
        "exchange archive imported"
    );
    Ok(summary)
}

/// Copies one archived file into storage. Returns false when the entry is
/// missing from the archive or the file is already stored.
fn import_file(
    conn: &Connection,
    files_root: &Path,
    archive: &mut ZipArchive<File>,
    teacher_id: &str,
    work_id: &str,
    ef: &ExportFile,
) -> anyhow::Result<bool> {
    let entry_name = ef.relative_path.replace('\\', "/");
    let mut bytes = Vec::new();
    match archive.by_name(&entry_name) {
        Ok(mut entry) => {
            entry
                .read_to_end(&mut bytes)
                .with_context(|| format!("failed to read entry {}", entry_name))?;
        }
        Err(zip::result::ZipError::FileNotFound) => return Ok(false),
        Err(e) => return Err(e.into()),
    }

    if let Some(expected) = ef.sha256.as_deref() {
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(anyhow!("checksum mismatch for {}", ef.file_name));
        }
    }

    let Some(relative) =
        storage::write_if_absent(files_root, teacher_id, work_id, &ef.file_name, &bytes)?
    else {
        return Ok(false);
    };
    let stored_name = relative.rsplit('/').next().unwrap_or(&ef.file_name).to_string();
    let file = works::new_file(
        work_id,
        &stored_name,
        &relative,
        &storage::file_type(&stored_name),
    );
    works::insert_file(conn, &file)?;
    Ok(true)
}
