// Shared filename/path construction for recordings and snapshots:
// "basePath[/deviceLogicalID]/basename[.format]", per-device subdirectory
// iff `use_subdirs`, extension appended iff not already present.

use std::path::{Path, PathBuf};

pub fn compose_path(
    base_path: &Path,
    device_id: Option<&str>,
    use_subdirs: bool,
    basename: &str,
    format: &str,
) -> PathBuf {
    let mut path = base_path.to_path_buf();
    if use_subdirs {
        if let Some(device_id) = device_id {
            path.push(device_id);
        }
    }
    path.push(with_extension(basename, format));
    path
}

pub fn with_extension(
    basename: &str,
    format: &str,
) -> String {
    let suffix = format!(".{format}");
    if basename.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()) {
        basename.to_owned()
    } else {
        format!("{basename}{suffix}")
    }
}

pub fn generate_basename(prefix: &str) -> String {
    format!(
        "{prefix}_{}_{}",
        chrono::Utc::now().format("%Y%m%d_%H%M%S"),
        uuid::Uuid::new_v4().simple()
    )
}

#[cfg(test)]
mod test_paths {
    use super::*;

    #[test]
    fn composes_with_subdir() {
        let path = compose_path(Path::new("/data/recordings"), Some("camera0"), true, "clip", "mp4");
        assert_eq!(path, PathBuf::from("/data/recordings/camera0/clip.mp4"));
    }

    #[test]
    fn composes_without_subdir() {
        let path = compose_path(Path::new("/data/recordings"), Some("camera0"), false, "clip", "mp4");
        assert_eq!(path, PathBuf::from("/data/recordings/clip.mp4"));
    }

    #[test]
    fn does_not_double_extension() {
        assert_eq!(with_extension("clip.mp4", "mp4"), "clip.mp4");
        assert_eq!(with_extension("clip.MP4", "mp4"), "clip.MP4");
        assert_eq!(with_extension("clip", "mp4"), "clip.mp4");
    }
}
