use crate::collector::format_detector::{FormatDetector, FormatTag};
use crate::error::{BcExtractorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One file the extraction tool left in its output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Base name only.
    pub name: String,
    /// Absolute location inside the job workspace.
    pub path: PathBuf,
    pub format: FormatTag,
    pub size: u64,
}

/// Lists the files the tool produced. Runs only after the tool has exited.
pub struct OutputCollector {
    detector: FormatDetector,
}

impl OutputCollector {
    pub fn new(detector: FormatDetector) -> Self {
        Self { detector }
    }

    /// Regular files directly inside `output_dir`, sorted by name.
    ///
    /// The directory is not descended into and symlinks are not followed.
    /// An empty directory yields an empty list; a missing or unreadable one
    /// is an `OutputCollectionFailure`.
    pub fn collect(&self, output_dir: &Path) -> Result<Vec<Artifact>> {
        let failure = |message: String| BcExtractorError::OutputCollectionFailure {
            path: output_dir.display().to_string(),
            message,
        };

        let root = output_dir
            .canonicalize()
            .map_err(|e| failure(e.to_string()))?;

        if !root.is_dir() {
            return Err(failure("not a directory".to_string()));
        }

        let walker = WalkDir::new(&root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false);

        let mut artifacts = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| failure(e.to_string()))?;

            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| failure(e.to_string()))?;
            let name = entry.file_name().to_string_lossy().into_owned();

            artifacts.push(Artifact {
                format: self.detector.detect(&name),
                path: entry.into_path(),
                name,
                size: metadata.len(),
            });
        }

        artifacts.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(artifacts)
    }
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormatConfig;
    use std::fs;
    use tempfile::TempDir;

    fn collector() -> OutputCollector {
        OutputCollector::new(FormatDetector::new(&FormatConfig::default()).unwrap())
    }

    #[test]
    fn test_sorted_base_names() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        // Deliberately created out of order
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.nc"), "aa").unwrap();
        fs::write(root.join("c.log"), "ccc").unwrap();

        let artifacts = collector().collect(root).unwrap();
        let names: Vec<_> = artifacts.iter().map(|a| a.name.as_str()).collect();

        assert_eq!(names, vec!["a.nc", "b.txt", "c.log"]);
        for artifact in &artifacts {
            assert!(!artifact.name.contains('/'));
            assert!(artifact.path.is_absolute());
            assert!(artifact.path.exists());
        }
        assert_eq!(artifacts[0].format.mime_type(), "application/x-netcdf");
        assert_eq!(artifacts[0].size, 2);
    }

    #[test]
    fn test_byte_wise_ordering() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("wrfbdy_d01"), "x").unwrap();
        fs::write(root.join("Z.nc"), "x").unwrap();
        fs::write(root.join("CanESM2:2020-01-01_00"), "x").unwrap();

        let names: Vec<_> = collector()
            .collect(root)
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["CanESM2:2020-01-01_00", "Z.nc", "wrfbdy_d01"]);
    }

    #[test]
    fn test_subdirectories_are_not_descended() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("nested").join("inner.nc"), "x").unwrap();
        fs::write(root.join("top.nc"), "x").unwrap();

        let artifacts = collector().collect(root).unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "top.nc");
    }

    #[test]
    fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let artifacts = collector().collect(temp_dir.path()).unwrap();
        assert!(artifacts.is_empty());
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let err = collector()
            .collect(&temp_dir.path().join("never-created"))
            .unwrap_err();
        assert!(matches!(err, BcExtractorError::OutputCollectionFailure { .. }));
    }

    #[test]
    fn test_file_instead_of_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        let err = collector().collect(&file).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
    }
}
