//! Pipeline orchestrator: one job JSON in, one job report out.
//!
//! ```text
//! input.json ──► Release ──► discover ──► decompose/normalize ──► validate ──► emit ──► output.json
//! ```
//!
//! Validation is all-or-nothing: a toolchain failure on any unit fails the
//! release and nothing is written to the publication tree. The report is
//! written on every path, including invalid input.

use anyhow::Context;
use std::path::Path;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::emit::emit_units;
use crate::error::{PipelineError, Result};
use crate::language::{create_language, LanguageSupport};
use crate::models::{ExampleUnit, JobInput, JobReport, JobStatus, Language};
use crate::release::Release;

/// Read `input_path`, run the job, and write the report to `output_path`.
///
/// Only a failure to write the report is returned as an error; every
/// pipeline failure is captured in the report itself.
pub fn run_extract(
    input_path: &Path,
    output_path: &Path,
    language: Option<Language>,
    config: &Config,
) -> anyhow::Result<JobReport> {
    let report = match read_input(input_path) {
        Ok(input) => run_job(&input, language, config),
        Err(e) => {
            error!(kind = e.kind(), "{}", e);
            JobReport::failed("")
        }
    };
    write_report(output_path, &report)?;
    Ok(report)
}

fn read_input(path: &Path) -> Result<JobInput> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::input(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&text)
        .map_err(|e| PipelineError::input(format!("invalid job JSON {}: {}", path.display(), e)))
}

/// Write the report as pretty JSON.
pub fn write_report(path: &Path, report: &JobReport) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write job report: {}", path.display()))?;
    info!("Output JSON: {}", path.display());
    Ok(())
}

/// Run one job. `language` overrides the `language` key of the input.
pub fn run_job(input: &JobInput, language: Option<Language>, config: &Config) -> JobReport {
    let mut name = input.release.tag.trim().to_string();
    match execute(input, language, config, &mut name) {
        Ok(files) => {
            info!(name = %name, files = files.len(), "job succeeded");
            JobReport {
                status: JobStatus::Succeeded,
                name,
                files,
            }
        }
        Err(e) => {
            error!(kind = e.kind(), name = %name, "{}", e);
            JobReport::failed(name)
        }
    }
}

fn execute(
    input: &JobInput,
    language: Option<Language>,
    config: &Config,
    name: &mut String,
) -> Result<Vec<String>> {
    let language = language.or(input.language).ok_or_else(|| {
        PipelineError::input("language not given on the command line or in the job JSON")
    })?;
    let support = create_language(language);

    let release = Release::from_input(&input.release, support.as_ref(), &input.sdk_path)?;
    *name = support.module_name(&release);
    info!(
        language = %language,
        tag = %release.tag,
        sdk_subdirectory = %release.sdk_subdirectory,
        "Processing release"
    );

    let location = support.discover_samples(&release, &input.sdk_path)?;
    info!("Processing SDK examples: {}", location.samples_dir.display());

    let mut units = collect_units(support.as_ref(), &release, &location.samples_dir)?;
    if let Some(specs_path) = &input.specs_path {
        units = retain_known_specs(units, specs_path);
    }
    if units.is_empty() {
        info!("No example extracted");
        return Ok(Vec::new());
    }
    info!(count = units.len(), "Validating examples");

    let units = support.validate_batch(
        &release,
        &location,
        units,
        &input.temp_path,
        &config.toolchain,
    )?;

    emit_units(
        &input.sdk_examples_path,
        &units,
        support.file_extension(),
        &support.compose_permalink(&release),
    )
}

/// Decompose every candidate file under `samples_dir`, in path order.
fn collect_units(
    support: &dyn LanguageSupport,
    release: &Release,
    samples_dir: &Path,
) -> Result<Vec<ExampleUnit>> {
    let mut units = Vec::new();
    let walker = WalkDir::new(samples_dir).sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| {
            PipelineError::io(
                "walk samples",
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            )
        })?;
        if !entry.file_type().is_file() || !support.is_sample_file(entry.path()) {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(samples_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io(format!("read {}", path.display()), e))?;

        match support.extract_units(release, &relative, &text) {
            Ok(found) => units.extend(found),
            Err(e @ PipelineError::Parse { .. }) => warn!("skipping file: {}", e),
            Err(e) => return Err(e),
        }
    }
    Ok(units)
}

/// Drop units whose original spec example does not exist in the specs checkout.
fn retain_known_specs(units: Vec<ExampleUnit>, specs_path: &Path) -> Vec<ExampleUnit> {
    units
        .into_iter()
        .filter(|unit| {
            let exists = specs_path.join(&unit.original_file).is_file();
            if !exists {
                warn!(
                    example = %unit.original_file,
                    "skipping example, original file not found in specs"
                );
            }
            exists
        })
        .collect()
}
