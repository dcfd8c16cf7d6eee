//! Coefficient dump tool: one float per line, in pipeline order.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::dsp::Pipeline;
use crate::error::{ConfigError, Result};

pub fn dump_coeffs(pipeline: &Pipeline, path: &Path) -> Result<()> {
    let file = File::create(path)
        .map_err(|_| ConfigError::DumpPath(path.display().to_string()))?;
    let mut writer = BufWriter::new(file);

    for coeff in pipeline.coeffs() {
        writeln!(writer, "{coeff}").map_err(|_| ConfigError::DumpPath(path.display().to_string()))?;
    }

    Ok(())
}
