use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Extensions offered when picking images
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Check whether a path names an image file by extension (case-insensitive)
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Expand user-supplied paths into image ids.
///
/// Files are passed through as given, whatever their extension, so the
/// recognition source decides whether they are readable. Directories
/// contribute their image files (not recursive), sorted by name.
pub fn collect_image_ids(paths: &[PathBuf]) -> Result<Vec<String>, String> {
    let mut image_ids = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(path)
                .map_err(|e| format!("Failed to read directory {}: {}", path.display(), e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image_path(p))
                .collect();
            found.sort();

            if found.is_empty() {
                warn!(dir = %path.display(), "No image files in directory");
            }
            image_ids.extend(found.iter().map(|p| p.to_string_lossy().into_owned()));
        } else {
            image_ids.push(path.to_string_lossy().into_owned());
        }
    }

    Ok(image_ids)
}
