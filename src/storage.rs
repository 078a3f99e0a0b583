use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};

pub const FILES_DIR: &str = "files";

pub fn files_root(workspace: &Path) -> PathBuf {
    workspace.join(FILES_DIR)
}

/// True when `name` can be used as a single directory name under `files/`.
pub fn is_plain_component(name: &str) -> bool {
    const SEPARATORS: &[char] = &['/', '\\', ':'];
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(SEPARATORS)
        && !name.chars().any(|c| c.is_control())
}

fn work_dir(root: &Path, teacher_id: &str, work_id: &str) -> anyhow::Result<PathBuf> {
    for id in [teacher_id, work_id] {
        if !is_plain_component(id) {
            return Err(anyhow!("invalid storage id: {:?}", id));
        }
    }
    Ok(root.join(teacher_id).join(work_id))
}

/// `files/{teacher_id}/{work_id}`, created on demand.
pub fn work_files_dir(root: &Path, teacher_id: &str, work_id: &str) -> anyhow::Result<PathBuf> {
    let dir = work_dir(root, teacher_id, work_id)?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory {}", dir.to_string_lossy()))?;
    Ok(dir)
}

/// Copies `source` into the work's directory and returns the relative path
/// to record in the database. An existing name gets a `_N` suffix.
pub fn copy_to_storage(
    root: &Path,
    source: &Path,
    teacher_id: &str,
    work_id: &str,
) -> anyhow::Result<String> {
    if !source.is_file() {
        return Err(anyhow!("file not found: {}", source.to_string_lossy()));
    }
    let file_name = source
        .file_name()
        .and_then(|s| s.to_str())
        .map(sanitize_file_name)
        .ok_or_else(|| anyhow!("invalid file name: {}", source.to_string_lossy()))?;

    let dir = work_files_dir(root, teacher_id, work_id)?;
    let dest = unique_destination(&dir, &file_name);
    std::fs::copy(source, &dest).with_context(|| {
        format!(
            "failed to copy {} to {}",
            source.to_string_lossy(),
            dest.to_string_lossy()
        )
    })?;

    let stored_name = dest
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(&file_name)
        .to_string();
    Ok(relative_path(teacher_id, work_id, &stored_name))
}

/// Writes raw bytes under the work's directory, keeping the given name.
/// Returns `None` when the file is already present.
pub fn write_if_absent(
    root: &Path,
    teacher_id: &str,
    work_id: &str,
    file_name: &str,
    bytes: &[u8],
) -> anyhow::Result<Option<String>> {
    let file_name = sanitize_file_name(file_name);
    let dir = work_files_dir(root, teacher_id, work_id)?;
    let dest = dir.join(&file_name);
    if dest.exists() {
        return Ok(None);
    }
    std::fs::write(&dest, bytes)
        .with_context(|| format!("failed to write {}", dest.to_string_lossy()))?;
    Ok(Some(relative_path(teacher_id, work_id, &file_name)))
}

fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let mut dest = dir.join(file_name);
    if !dest.exists() {
        return dest;
    }
    let (stem, ext) = split_extension(file_name);
    let mut counter = 1;
    while dest.exists() {
        let candidate = match ext {
            Some(e) => format!("{}_{}.{}", stem, counter, e),
            None => format!("{}_{}", stem, counter),
        };
        dest = dir.join(candidate);
        counter += 1;
    }
    dest
}

fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(i) if i > 0 && i + 1 < file_name.len() => (&file_name[..i], Some(&file_name[i + 1..])),
        _ => (file_name, None),
    }
}

/// Relative paths always use `/` so they survive a move between machines.
pub fn relative_path(teacher_id: &str, work_id: &str, file_name: &str) -> String {
    format!("{}/{}/{}", teacher_id, work_id, file_name)
}

pub fn full_path(root: &Path, relative: &str) -> PathBuf {
    let mut p = root.to_path_buf();
    for part in relative.split(['/', '\\']).filter(|s| !s.is_empty() && *s != "..") {
        p.push(part);
    }
    p
}

pub fn delete_stored_file(root: &Path, relative: &str) -> anyhow::Result<()> {
    let p = full_path(root, relative);
    if p.is_file() {
        std::fs::remove_file(&p)
            .with_context(|| format!("failed to remove {}", p.to_string_lossy()))?;
    }
    Ok(())
}

pub fn delete_work_files(root: &Path, teacher_id: &str, work_id: &str) -> anyhow::Result<()> {
    let dir = work_dir(root, teacher_id, work_id)?;
    if dir.is_dir() {
        std::fs::remove_dir_all(&dir)
            .with_context(|| format!("failed to remove {}", dir.to_string_lossy()))?;
    }
    Ok(())
}

/// Lower-case extension without the dot; empty when there is none.
pub fn file_type(file_name: &str) -> String {
    match split_extension(file_name) {
        (_, Some(ext)) => ext.to_lowercase(),
        _ => String::new(),
    }
}

pub fn sanitize_file_name(name: &str) -> String {
    const INVALID: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
    let clean: String = name
        .chars()
        .filter(|c| !INVALID.contains(c) && !c.is_control())
        .collect();
    if clean.trim().is_empty() || clean.trim().chars().all(|c| c == '.') {
        "file".to_string()
    } else {
        clean
    }
}

/// "Выплавень Владимир Сергеевич" -> "Выплавень В.С."
///
/// At most two initials are kept.
pub fn short_name(full_name: &str) -> String {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.as_slice() {
        [] => String::new(),
        [single] => single.to_string(),
        [surname, rest @ ..] => {
            let initials: String = rest
                .iter()
                .take(2)
                .filter_map(|p| p.chars().next())
                .map(|c| format!("{}.", c))
                .collect();
            format!("{} {}", surname, initials)
        }
    }
}
