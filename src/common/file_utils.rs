use std::path::{Path, PathBuf};
use crate::errors::AppError;
use log::debug;

// Classification applied to every path the retrieval tool reports
pub fn is_image(reported_path: &str) -> bool {
    reported_path.ends_with(".jpg")
}

pub fn ensure_scratch_directory(dir_path: &Path) -> Result<PathBuf, AppError> {
    if !dir_path.exists() {
        debug!("Scratch directory '{}' does not exist, attempting to create it.", dir_path.display());
        std::fs::create_dir_all(dir_path).map_err(|e| {
            AppError::Io(format!(
                "Failed to create scratch directory '{}': {}",
                dir_path.display(),
                e
            ))
        })?;
    } else if !dir_path.is_dir() {
        return Err(AppError::Io(format!(
            "Scratch path '{}' exists but is not a directory.",
            dir_path.display()
        )));
    }
    Ok(dir_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_jpg_suffix_counts_as_image() {
        assert!(is_image("2024/01/02/cam1_0001.jpg"));
        assert!(!is_image("2024/01/02/cam1_0001.png"));
        assert!(!is_image("2024/01/02/"));
        assert!(!is_image("cam1_0001.JPG"));
        assert!(!is_image("sending incremental file list"));
    }

    #[test]
    fn scratch_directory_is_created_once() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = tmp.path().join("cam1");
        assert_eq!(ensure_scratch_directory(&scratch).unwrap(), scratch);
        assert!(scratch.is_dir());
        assert!(ensure_scratch_directory(&scratch).is_ok());
    }

    #[test]
    fn scratch_path_that_is_a_file_is_rejected() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        assert!(ensure_scratch_directory(tmp.path()).is_err());
    }
}
