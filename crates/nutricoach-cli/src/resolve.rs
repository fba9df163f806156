//! Command-line argument resolution shared by the subcommand handlers.

use std::path::Path;

use anyhow::{Context, Result};
use uuid::Uuid;

/// Parse a UUID argument, naming what it identifies in the error.
pub fn parse_id(kind: &str, input: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim()).with_context(|| format!("invalid {kind} ID: {input:?}"))
}

/// Read a UTF-8 input file, naming what it should contain in the error.
pub fn read_input(kind: &str, path: &str) -> Result<String> {
    std::fs::read_to_string(Path::new(path))
        .with_context(|| format!("failed to read {kind} file: {path}"))
}
