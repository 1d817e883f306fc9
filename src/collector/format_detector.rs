use crate::config::FormatConfig;
use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub const GENERIC_MIME_TYPE: &str = "application/octet-stream";

/// Declared media type of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatTag(String);

impl FormatTag {
    pub fn new<S: Into<String>>(mime_type: S) -> Self {
        Self(mime_type.into())
    }

    pub fn generic() -> Self {
        Self::new(GENERIC_MIME_TYPE)
    }

    pub fn mime_type(&self) -> &str {
        &self.0
    }

    pub fn is_generic(&self) -> bool {
        self.0 == GENERIC_MIME_TYPE
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct FormatDetector {
    default_tag: FormatTag,
    extensions: BTreeMap<String, FormatTag>,
    patterns: Vec<(Regex, FormatTag)>,
}

impl FormatDetector {
    pub fn new(config: &FormatConfig) -> Result<Self> {
        let patterns = config
            .patterns
            .iter()
            .map(|p| -> Result<(Regex, FormatTag)> {
                Ok((Regex::new(&p.pattern)?, FormatTag::new(p.mime_type.clone())))
            })
            .collect::<Result<Vec<_>>>()?;

        let extensions = config
            .extensions
            .iter()
            .map(|(ext, mime)| {
                let ext = ext.trim_start_matches('.').to_lowercase();
                (ext, FormatTag::new(mime.clone()))
            })
            .collect();

        Ok(Self {
            default_tag: FormatTag::new(config.default_mime_type.clone()),
            extensions,
            patterns,
        })
    }

    /// Name patterns win over extensions; anything unrecognised gets the default tag.
    pub fn detect(&self, file_name: &str) -> FormatTag {
        if let Some((_, tag)) = self.patterns.iter().find(|(re, _)| re.is_match(file_name)) {
            return tag.clone();
        }

        Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.extensions.get(&ext.to_lowercase()))
            .cloned()
            .unwrap_or_else(|| self.default_tag.clone())
    }
}

impl Default for FormatDetector {
    fn default() -> Self {
        Self {
            default_tag: FormatTag::generic(),
            extensions: BTreeMap::new(),
            patterns: Vec::new(),
        }
    }
}
