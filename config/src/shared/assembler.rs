use std::path::PathBuf;

use serde::Deserialize;

use crate::load::Config;
use crate::shared::{AssemblyConfig, ValidationError};

/// Top-level configuration of the assembler binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssemblerConfig {
    pub assembly: AssemblyConfig,
    pub output: OutputConfig,
}

impl AssemblerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.assembly.validate()?;
        self.output.validate()
    }
}

impl Config for AssemblerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

/// Destination of the assembled table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OutputConfig {
    pub path: PathBuf,
    #[serde(default = "default_output_delimiter")]
    pub delimiter: String,
}

impl OutputConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.delimiter_byte().map(|_| ())
    }

    pub fn delimiter_byte(&self) -> Result<u8, ValidationError> {
        match self.delimiter.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(ValidationError::InvalidFieldValue {
                field: "output.delimiter".to_string(),
                constraint: "must be a single ASCII character".to_string(),
            }),
        }
    }
}

fn default_output_delimiter() -> String {
    ",".to_string()
}
