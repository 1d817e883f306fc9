use std::path::{Path, PathBuf};

/// Job-exclusive output directory handed to the job by its host.
///
/// The job neither creates nor removes it; a missing directory only shows up
/// as a collection failure after the tool has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    output_dir: PathBuf,
}

impl Workspace {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
