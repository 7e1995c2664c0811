use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::domain::library::ArchiveMode;

/// Image extensions picked up by the image indexer (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp"];

const UNSAFE_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Collects files with one of `extensions` under `path`.
///
/// A matching file is returned on its own; a directory is walked recursively.
/// Results are sorted so repeated runs see the same order. Unreadable
/// directory entries are skipped.
pub fn list_files_with_extensions(path: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    if path.is_file() {
        return if has_extension(path, extensions) {
            vec![path.to_path_buf()]
        } else {
            log::warn!("{} does not have a supported extension ({:?})", path.display(), extensions);
            Vec::new()
        };
    }
    if !path.exists() {
        log::warn!("Path does not exist: {}", path.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Skipping unreadable entry under {}: {}", path.display(), err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), extensions))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

pub fn list_pdfs(path: &Path) -> Vec<PathBuf> {
    list_files_with_extensions(path, &["pdf"])
}

pub fn list_images(path: &Path) -> Vec<PathBuf> {
    list_files_with_extensions(path, IMAGE_EXTENSIONS)
}

/// Replaces characters that are not allowed in file names on common filesystems.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Absolute form of `path` without resolving symlinks.
pub fn absolute_path(path: &Path) -> io::Result<PathBuf> {
    std::path::absolute(path)
}

/// Deterministic id for an image: a name-based (SHA-1) UUID of its absolute path.
pub fn stable_image_id(path: &Path) -> io::Result<String> {
    let absolute = absolute_path(path)?;
    Ok(Uuid::new_v5(&Uuid::NAMESPACE_URL, absolute.to_string_lossy().as_bytes()).to_string())
}

fn short_token() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Picks a path inside `dir` for `file_name` that does not exist yet,
/// appending `_<8 hex chars>` to the stem on collision.
fn unique_target(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    let extension = as_path.extension().map(|e| e.to_string_lossy().to_string());
    loop {
        let name = match &extension {
            Some(ext) => format!("{}_{}.{}", stem, short_token(), ext),
            None => format!("{}_{}", stem, short_token()),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
    }
}

fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            // rename cannot cross filesystems; fall back to copy + remove.
            log::debug!(
                "rename {} -> {} failed ({}), copying instead",
                source.display(),
                target.display(),
                rename_err
            );
            fs::copy(source, target)?;
            fs::remove_file(source)
        }
    }
}

/// Moves or copies `source` into `<archive_root>/<topic>/` and returns the new absolute path.
///
/// Topic and file name are sanitized; an existing file is never overwritten.
pub fn archive_file(
    source: &Path,
    archive_root: &Path,
    topic: &str,
    default_topic: &str,
    mode: ArchiveMode,
) -> io::Result<PathBuf> {
    let topic = if topic.trim().is_empty() { default_topic } else { topic };
    let target_dir = archive_root.join(sanitize_filename(topic));
    fs::create_dir_all(&target_dir)?;

    let file_name = source
        .file_name()
        .map(|n| sanitize_filename(&n.to_string_lossy()))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", source.display()),
            )
        })?;
    let target = unique_target(&target_dir, &file_name);

    match mode {
        ArchiveMode::Move => move_file(source, &target)?,
        ArchiveMode::Copy => {
            fs::copy(source, &target)?;
        }
    }
    absolute_path(&target)
}
