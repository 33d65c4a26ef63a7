//! Publication tree writer.
//!
//! Each unit becomes a code file plus a sibling `.json` holding the SDK
//! README permalink. Files are written to a temporary sibling and renamed
//! into place, so a reader never sees a half-written example.

use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::models::ExampleUnit;

/// Sidecar metadata of one example.
#[derive(Debug, Serialize)]
struct ExampleMetadata<'a> {
    #[serde(rename = "sdkUrl")]
    sdk_url: &'a str,
}

/// Write every unit into `examples_root`.
///
/// Returns the relative paths written, code file first, in unit order.
pub fn emit_units(
    examples_root: &Path,
    units: &[ExampleUnit],
    extension: &str,
    sdk_url: &str,
) -> Result<Vec<String>> {
    let metadata = serde_json::to_string(&ExampleMetadata { sdk_url })
        .map_err(|e| PipelineError::Emit {
            path: examples_root.to_path_buf(),
            source: std::io::Error::other(e),
        })?;

    let mut files = Vec::with_capacity(units.len() * 2);
    for unit in units {
        let code_path = unit.code_path(extension);
        atomic_write(&examples_root.join(&code_path), unit.content.as_bytes())?;
        info!("Code written to file: {}", code_path);

        let metadata_path = unit.metadata_path();
        atomic_write(&examples_root.join(&metadata_path), metadata.as_bytes())?;
        info!("Metadata written to file: {}", metadata_path);

        files.push(code_path);
        files.push(metadata_path);
    }
    Ok(files)
}

/// Write to a temp file in the target directory, then rename over `path`.
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let emit_error = |source: std::io::Error| PipelineError::Emit {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().ok_or_else(|| {
        emit_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no parent dir",
        ))
    })?;
    std::fs::create_dir_all(dir).map_err(emit_error)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp_")
        .tempfile_in(dir)
        .map_err(emit_error)?;
    tmp.write_all(data).map_err(emit_error)?;
    tmp.persist(path).map_err(|e| emit_error(e.error))?;
    Ok(())
}
