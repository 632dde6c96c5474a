//! Collecting input images for CLI batch analysis.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Check if a file is a supported image format.
/// Supports: jpg, jpeg, png, webp, bmp, tiff, tif
pub fn is_supported_image_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext_lower = ext.to_string_lossy().to_lowercase();
        matches!(
            ext_lower.as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tiff" | "tif"
        )
    } else {
        false
    }
}

/// Find all image files in a directory (non-recursive).
pub fn find_images_in_directory(dir_path: &Path) -> Result<Vec<PathBuf>> {
    let mut image_files = Vec::new();

    for entry in fs::read_dir(dir_path)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && is_supported_image_file(&path) {
            image_files.push(path);
        }
    }

    // Sort for consistent ordering
    image_files.sort();
    Ok(image_files)
}

/// Collect all image files from multiple sources (files or directories).
///
/// In strict mode missing or unsupported sources are errors; in permissive
/// mode they are logged and skipped.
pub fn collect_images_from_sources(sources: &[String], strict: bool) -> Result<Vec<PathBuf>> {
    let mut all_image_files = Vec::new();

    for source in sources {
        let source_path = Path::new(source);

        if source_path.is_file() {
            if is_supported_image_file(source_path) {
                all_image_files.push(source_path.to_path_buf());
            } else if strict {
                return Err(anyhow::anyhow!(
                    "File is not a supported image format: {}",
                    source_path.display()
                ));
            }
            // In permissive mode, silently skip unsupported files
        } else if source_path.is_dir() {
            let dir_images = find_images_in_directory(source_path)?;
            all_image_files.extend(dir_images);
        } else if strict {
            return Err(anyhow::anyhow!("File does not exist: {}", source));
        } else {
            log::warn!("⚠️  File does not exist: {source}");
        }
    }

    // Sort all collected files for consistent ordering
    all_image_files.sort();

    // Remove duplicates (in case same file is specified multiple ways)
    all_image_files.dedup();

    if all_image_files.is_empty() && strict {
        return Err(anyhow::anyhow!(
            "No image files found in the specified sources"
        ));
    }

    Ok(all_image_files)
}
