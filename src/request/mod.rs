pub mod raw_request;
pub mod timestamp;
pub mod validator;

pub use raw_request::{RawRequest, RawValue};
pub use timestamp::{Timestamp, TIMESTAMP_FORMAT};
pub use validator::{ExtractionRequest, InputValidator, BC_TABLE, END_DATETIME, START_DATETIME};
