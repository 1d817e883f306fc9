use crate::collector::Artifact;
use crate::error::{BcExtractorError, Result};
use crate::manifest::metalink;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    /// JSON document
    Json,
    /// Metalink 4 XML document
    Metalink,
}

/// One produced file, referenced by location rather than embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub location: String,
    pub path: PathBuf,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultManifest {
    pub identity: String,
    pub generator: String,
    pub entries: Vec<ManifestEntry>,
}

impl ResultManifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_metalink(&self) -> String {
        metalink::render(self)
    }

    pub fn render(&self, format: ManifestFormat) -> Result<String> {
        match format {
            ManifestFormat::Json => self.to_json(),
            ManifestFormat::Metalink => Ok(self.to_metalink()),
        }
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P, format: ManifestFormat) -> Result<()> {
        let path = path.as_ref();
        let content = self.render(format)?;
        fs::write(path, content).map_err(|e| BcExtractorError::Manifest {
            message: format!("Failed to write manifest {}: {}", path.display(), e),
        })
    }
}

/// Turns collected artifacts into a [`ResultManifest`]. Never fails.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    identity: String,
    generator: String,
}

impl ManifestBuilder {
    pub fn new<S: Into<String>>(identity: S) -> Self {
        Self {
            identity: identity.into(),
            generator: format!("bc-extractor/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn build(&self, artifacts: &[Artifact]) -> ResultManifest {
        let mut entries: Vec<ManifestEntry> = artifacts
            .iter()
            .map(|artifact| ManifestEntry {
                name: artifact.name.clone(),
                location: file_location(&artifact.path),
                path: artifact.path.clone(),
                mime_type: artifact.format.mime_type().to_string(),
                size: artifact.size,
            })
            .collect();

        entries.sort_by(|a, b| a.name.cmp(&b.name));

        ResultManifest {
            identity: self.identity.clone(),
            generator: self.generator.clone(),
            entries,
        }
    }
}

fn file_location(path: &Path) -> String {
    Url::from_file_path(path)
        .map(String::from)
        .unwrap_or_else(|_| path.display().to_string())
}
