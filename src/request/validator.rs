use crate::error::{BcExtractorError, Result};
use crate::request::raw_request::{RawRequest, RawValue};
use crate::request::timestamp::Timestamp;
use std::fs;
use std::path::{Path, PathBuf};

pub const START_DATETIME: &str = "start_datetime";
pub const END_DATETIME: &str = "end_datetime";
pub const BC_TABLE: &str = "bc_table";

/// Validated inputs of one extraction job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    start: Timestamp,
    end: Timestamp,
    bc_table: PathBuf,
}

impl ExtractionRequest {
    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// Absolute path of the BC table file.
    pub fn bc_table(&self) -> &Path {
        &self.bc_table
    }
}

/// Checks raw job inputs before anything is executed.
///
/// Only parseability and readability are checked. Whether `end` comes after
/// `start` is left to the extraction tool.
#[derive(Debug, Clone, Default)]
pub struct InputValidator;

impl InputValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, request: &RawRequest) -> Result<ExtractionRequest> {
        let start = self.timestamp(request, START_DATETIME)?;
        let end = self.timestamp(request, END_DATETIME)?;
        let bc_table = self.bc_table(request)?;

        Ok(ExtractionRequest {
            start,
            end,
            bc_table,
        })
    }

    fn single<'a>(&self, request: &'a RawRequest, field: &str) -> Result<&'a RawValue> {
        match request.values(field) {
            [] => Err(BcExtractorError::invalid_input(field, "value is missing")),
            [value] => Ok(value),
            values => Err(BcExtractorError::invalid_input(
                field,
                format!("expected exactly one value, got {}", values.len()),
            )),
        }
    }

    fn timestamp(&self, request: &RawRequest, field: &str) -> Result<Timestamp> {
        match self.single(request, field)? {
            RawValue::Literal(value) => {
                Timestamp::parse(value).map_err(|reason| BcExtractorError::invalid_input(field, reason))
            }
            RawValue::File(_) => Err(BcExtractorError::invalid_input(
                field,
                "expected a literal timestamp, got a file reference",
            )),
        }
    }

    fn bc_table(&self, request: &RawRequest) -> Result<PathBuf> {
        let path = match self.single(request, BC_TABLE)? {
            RawValue::File(path) => path,
            RawValue::Literal(_) => {
                return Err(BcExtractorError::invalid_input(
                    BC_TABLE,
                    "expected a file reference, got a literal value",
                ))
            }
        };

        let unreadable = |reason: String| {
            BcExtractorError::invalid_input(BC_TABLE, format!("{}: {}", path.display(), reason))
        };

        let metadata = fs::metadata(path).map_err(|e| unreadable(e.to_string()))?;
        if !metadata.is_file() {
            return Err(unreadable("not a regular file".to_string()));
        }

        // Readability is only known once the file is actually opened
        fs::File::open(path).map_err(|e| unreadable(e.to_string()))?;

        path.canonicalize().map_err(|e| unreadable(e.to_string()))
    }
}
