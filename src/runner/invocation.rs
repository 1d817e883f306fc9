use crate::error::{BcExtractorError, Result};
use crate::request::{ExtractionRequest, Timestamp};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

/// Root of the climate dataset the tool reads from.
///
/// Only operator configuration produces one; job requests never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRoot(PathBuf);

impl DatasetRoot {
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(BcExtractorError::Config {
                message: format!("dataset root must be absolute: {}", path.display()),
            });
        }
        Ok(Self(path))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

/// The five positional arguments of the extraction tool, in contract order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    start: Timestamp,
    end: Timestamp,
    dataset_root: PathBuf,
    bc_table: PathBuf,
    output_dir: PathBuf,
}

impl ToolInvocation {
    pub fn new(request: &ExtractionRequest, dataset_root: &DatasetRoot, output_dir: &Path) -> Self {
        Self {
            start: request.start(),
            end: request.end(),
            dataset_root: dataset_root.as_path().to_path_buf(),
            bc_table: request.bc_table().to_path_buf(),
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// `[start, end, dataset_root, bc_table, output_dir]`
    pub fn to_args(&self) -> [OsString; 5] {
        [
            OsString::from(self.start.to_string()),
            OsString::from(self.end.to_string()),
            self.dataset_root.clone().into_os_string(),
            self.bc_table.clone().into_os_string(),
            self.output_dir.clone().into_os_string(),
        ]
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self.to_args();
        let rendered: Vec<_> = args.iter().map(|a| a.to_string_lossy()).collect();
        write!(f, "{}", rendered.join(" "))
    }
}
