use crate::error::{BcExtractorError, Result};
use crate::manifest::ManifestFormat;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub tool: ToolConfig,
    pub workspace: WorkspaceConfig,
    pub formats: FormatConfig,
    pub manifest: ManifestConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolConfig {
    pub executable: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<PathBuf>,
    pub dataset_root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    pub base_directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FormatConfig {
    pub default_mime_type: String,
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
    #[serde(default)]
    pub patterns: Vec<NamePattern>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NamePattern {
    pub pattern: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManifestConfig {
    pub identity: String,
    pub format: ManifestFormat,
}

fn default_drain_grace_ms() -> u64 {
    2000
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("bctool/preprocessor.ESGF"),
            interpreter: None,
            dataset_root: PathBuf::from("/oceano/gmeteo/WORK/ASNA/DATA/CanESM2"),
            timeout_secs: None, // Wait for the tool as long as it takes
            drain_grace_ms: default_drain_grace_ms(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        let extensions = [
            ("nc", "application/x-netcdf"),
            ("nc4", "application/x-netcdf"),
            ("grb", "application/x-grib"),
            ("grib", "application/x-grib"),
            ("grb2", "application/x-grib"),
            ("txt", "text/plain"),
            ("log", "text/plain"),
            ("out", "text/plain"),
            ("csv", "text/csv"),
            ("json", "application/json"),
            ("meta4", "application/metalink4+xml"),
        ]
        .into_iter()
        .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
        .collect();

        Self {
            default_mime_type: "application/octet-stream".to_string(),
            extensions,
            patterns: vec![NamePattern {
                pattern: r"^wrf(bdy|lowinp|input)_d[0-9]{2}".to_string(),
                mime_type: "application/x-netcdf".to_string(),
            }],
        }
    }
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            identity: "bc".to_string(),
            format: ManifestFormat::Json,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BcExtractorError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BcExtractorError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| BcExtractorError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["bc-extractor.toml", ".bc-extractor.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(timeout) = cli_args.timeout {
            self.tool.timeout_secs = Some(timeout);
        }

        if let Some(ref base_directory) = cli_args.base_directory {
            self.workspace.base_directory = base_directory.clone();
        }

        if let Some(format) = cli_args.manifest_format {
            self.manifest.format = format;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| BcExtractorError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| BcExtractorError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.tool.executable.as_os_str().is_empty() {
            return Err(BcExtractorError::Config {
                message: "tool.executable must not be empty".to_string(),
            });
        }

        if !self.tool.dataset_root.is_absolute() {
            return Err(BcExtractorError::Config {
                message: format!(
                    "tool.dataset_root must be an absolute path, got '{}'",
                    self.tool.dataset_root.display()
                ),
            });
        }

        if self.tool.timeout_secs == Some(0) {
            return Err(BcExtractorError::Config {
                message: "tool.timeout_secs must be greater than 0 (omit it to wait indefinitely)"
                    .to_string(),
            });
        }

        if self.formats.default_mime_type.trim().is_empty() {
            return Err(BcExtractorError::Config {
                message: "formats.default_mime_type must not be empty".to_string(),
            });
        }

        for pattern in &self.formats.patterns {
            Regex::new(&pattern.pattern)?;
        }

        if self.manifest.identity.trim().is_empty() {
            return Err(BcExtractorError::Config {
                message: "manifest.identity must not be empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool.timeout_secs.map(Duration::from_secs)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.tool.drain_grace_ms)
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub timeout: Option<u64>,
    pub base_directory: Option<PathBuf>,
    pub manifest_format: Option<ManifestFormat>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<u64>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_base_directory(mut self, base_directory: Option<PathBuf>) -> Self {
        self.base_directory = base_directory;
        self
    }

    pub fn with_manifest_format(mut self, format: Option<ManifestFormat>) -> Self {
        self.manifest_format = format;
        self
    }
}
