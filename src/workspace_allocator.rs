use crate::error::{BcExtractorError, Result};
use crate::job::Workspace;
use std::fs;
use std::path::{Path, PathBuf};

/// Chooses and prepares the output directory a CLI-hosted job runs in.
///
/// The job itself never creates or removes directories; this is the host's
/// half of that contract.
#[derive(Debug, Clone)]
pub struct WorkspaceAllocator {
    base_path: Option<PathBuf>,
    output_directory: PathBuf,
    force_overwrite: bool,
}

impl WorkspaceAllocator {
    /// Allocates `<base_path>/bc_<start>_<end>`, with the raw timestamps
    /// sanitized into a directory name.
    pub fn for_period(base_path: PathBuf, start: &str, end: &str) -> Self {
        let name = sanitize_dir_name(&format!("bc_{}_{}", start, end));
        let output_directory = base_path.join(name);

        Self {
            base_path: Some(base_path),
            output_directory,
            force_overwrite: false,
        }
    }

    /// Uses `directory` as given.
    pub fn explicit<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            base_path: None,
            output_directory: directory.into(),
            force_overwrite: false,
        }
    }

    pub fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Creates the directory, or clears it when it already has content and
    /// overwriting was requested. An existing empty directory is reused.
    pub fn allocate(&self) -> Result<Workspace> {
        self.validate_paths()?;

        if self.output_directory.exists() {
            if !self.output_directory.is_dir() {
                return Err(BcExtractorError::WorkspaceExists {
                    path: self.output_directory.display().to_string(),
                });
            }

            if !is_empty_dir(&self.output_directory)? {
                if !self.force_overwrite {
                    return Err(BcExtractorError::WorkspaceExists {
                        path: self.output_directory.display().to_string(),
                    });
                }
                fs::remove_dir_all(&self.output_directory)?;
            }
        }

        fs::create_dir_all(&self.output_directory).map_err(|e| BcExtractorError::Permission {
            path: format!(
                "Cannot create workspace {}: {}",
                self.output_directory.display(),
                e
            ),
        })?;

        Ok(Workspace::new(self.output_directory.clone()))
    }

    fn validate_paths(&self) -> Result<()> {
        let Some(base_path) = &self.base_path else {
            return Ok(());
        };

        if !base_path.exists() {
            fs::create_dir_all(base_path).map_err(|e| BcExtractorError::Permission {
                path: format!("Cannot create base directory {}: {}", base_path.display(), e),
            })?;
        }

        let test_file = base_path.join(".bc-extractor_write_test");
        match fs::File::create(&test_file) {
            Ok(_) => {
                let _ = fs::remove_file(&test_file);
            }
            Err(e) => {
                return Err(BcExtractorError::Permission {
                    path: format!(
                        "No write permission for directory {}: {}",
                        base_path.display(),
                        e
                    ),
                });
            }
        }

        Ok(())
    }
}

fn is_empty_dir(path: &Path) -> Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

fn sanitize_dir_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.trim_matches(|c| c == '.' || c == '_');

    if sanitized.is_empty() {
        "bc_job".to_string()
    } else if sanitized.len() > 100 {
        sanitized[..100].to_string()
    } else {
        sanitized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_dir_name() {
        assert_eq!(
            sanitize_dir_name("bc_2000-01-01_00:00:00_2000-01-02_00:00:00"),
            "bc_2000-01-01_00_00_00_2000-01-02_00_00_00"
        );
        assert_eq!(sanitize_dir_name("bc_../../etc_x"), "bc_.._.._etc_x");
        assert_eq!(sanitize_dir_name("..."), "bc_job");
        assert_eq!(sanitize_dir_name(&"a".repeat(150)).len(), 100);
    }

    #[test]
    fn test_period_directory_stays_under_base() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = WorkspaceAllocator::for_period(
            temp_dir.path().to_path_buf(),
            "../2000-01-01_00:00:00",
            "2000-01-02_00:00:00",
        );

        assert_eq!(allocator.output_directory().parent(), Some(temp_dir.path()));
    }

    #[test]
    fn test_allocate_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = WorkspaceAllocator::for_period(
            temp_dir.path().join("jobs"),
            "2000-01-01_00:00:00",
            "2000-01-02_00:00:00",
        );
        assert!(!temp_dir.path().join("jobs").exists());

        let workspace = allocator.allocate().unwrap();
        assert!(workspace.output_dir().is_dir());
        assert!(workspace.output_dir().starts_with(temp_dir.path().join("jobs")));
    }

    #[test]
    fn test_existing_empty_directory_is_reused() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = WorkspaceAllocator::explicit(temp_dir.path());
        assert!(allocator.allocate().is_ok());
    }

    #[test]
    fn test_non_empty_directory_refused_without_force() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("old.nc"), b"x").unwrap();

        let result = WorkspaceAllocator::explicit(temp_dir.path()).allocate();
        assert!(matches!(result, Err(BcExtractorError::WorkspaceExists { .. })));
        assert!(temp_dir.path().join("old.nc").exists());
    }

    #[test]
    fn test_force_clears_directory() {
        let temp_dir = TempDir::new().unwrap();
        let workdir = temp_dir.path().join("job");
        fs::create_dir(&workdir).unwrap();
        fs::write(workdir.join("old.nc"), b"x").unwrap();

        let workspace = WorkspaceAllocator::explicit(&workdir)
            .with_force_overwrite(true)
            .allocate()
            .unwrap();

        assert!(workspace.output_dir().is_dir());
        assert!(!workdir.join("old.nc").exists());
    }
}
