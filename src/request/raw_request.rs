use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single caller-supplied value, as handed over by the hosting framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Literal(String),
    File(PathBuf),
}

/// Unvalidated job inputs. Every field may carry any number of values; the
/// validator decides what is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRequest {
    fields: BTreeMap<String, Vec<RawValue>>,
}

impl RawRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_literal<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.push(key, RawValue::Literal(value.into()));
        self
    }

    pub fn with_file<K: Into<String>, P: Into<PathBuf>>(mut self, key: K, path: P) -> Self {
        self.push(key, RawValue::File(path.into()));
        self
    }

    pub fn push<K: Into<String>>(&mut self, key: K, value: RawValue) {
        self.fields.entry(key.into()).or_default().push(value);
    }

    pub fn values(&self, key: &str) -> &[RawValue] {
        self.fields.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}
