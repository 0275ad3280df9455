//! GitHub Actions step outputs.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Append `name=value` to the step output file, when Actions provides one.
pub fn set_output(output_file: Option<&Path>, name: &str, value: &str) -> Result<()> {
    let Some(path) = output_file else {
        debug!(name, value, "GITHUB_OUTPUT not set; output skipped");
        return Ok(());
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open step output file {}", path.display()))?;
    writeln!(file, "{}={}", name, value)
        .with_context(|| format!("Failed to write step output {}", name))?;
    Ok(())
}
