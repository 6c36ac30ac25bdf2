//! JSON encoding of grammar tables.

use super::{GrammarTable, Language, LanguageError, TABLE_FORMAT_VERSION};
use serde::Deserialize;

/// Only the version is decoded before deciding whether to read the rest.
#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

impl GrammarTable {
    pub fn to_json(&self) -> Result<String, LanguageError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a table, rejecting other format versions before the body is read.
    pub fn from_json(json: &str) -> Result<Self, LanguageError> {
        let header: VersionHeader = serde_json::from_str(json)?;
        if header.version != TABLE_FORMAT_VERSION {
            return Err(LanguageError::VersionMismatch {
                found: header.version,
                supported: TABLE_FORMAT_VERSION,
            });
        }
        Ok(serde_json::from_str(json)?)
    }
}

impl Language {
    pub fn from_json(json: &str) -> Result<Self, LanguageError> {
        Language::new(GrammarTable::from_json(json)?)
    }
}
