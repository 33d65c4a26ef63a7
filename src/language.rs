//! Per-language capability set and dispatch.
//!
//! Every stage of the pipeline differs between SDK languages only in narrow
//! ways: where samples live, how methods are delimited, how a unit is made
//! standalone, which toolchain checks it, and how the README permalink is
//! built. [`LanguageSupport`] captures exactly that set; [`create_language`]
//! picks the implementation.
//!
//! | Language | Implementation | Folder suffix |
//! |----------|----------------|---------------|
//! | Java | [`JavaSupport`](crate::lang_java::JavaSupport) | `examples-java` |
//! | Go | [`GoSupport`](crate::lang_go::GoSupport) | `examples-go` |
//! | JavaScript | [`JsSupport`](crate::lang_js::JsSupport) | `examples-js`, `examples-js-rlc` |
//! | .NET | [`DotnetSupport`](crate::lang_dotnet::DotnetSupport) | `examples-dotnet` |
//! | Python | [`PythonSupport`](crate::lang_python::PythonSupport) | `examples-python` |

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ToolchainConfig;
use crate::decompose::{Aggregate, MethodRegion};
use crate::error::{PipelineError, Result};
use crate::lang_dotnet::DotnetSupport;
use crate::lang_go::GoSupport;
use crate::lang_java::JavaSupport;
use crate::lang_js::JsSupport;
use crate::lang_python::PythonSupport;
use crate::models::{ExampleUnit, Language, ReleaseInfo};
use crate::normalize::target_location;
use crate::release::Release;

/// Where the aggregated samples of a release live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleLocation {
    /// Directory containing the aggregated sample files.
    pub samples_dir: PathBuf,
    /// Companion dependency manifest (`go.mod`, `package.json`), if any.
    pub manifest: Option<PathBuf>,
}

/// Language-specific behavior of the extraction pipeline.
pub trait LanguageSupport {
    fn language(&self) -> Language;

    /// Extension of the emitted code files, without the dot.
    fn file_extension(&self) -> &'static str;

    /// Suffix of the `examples-<suffix>` publication folder.
    fn example_folder(&self, release: &Release) -> &'static str;

    /// Derive the SDK subdirectory of a release from its package name.
    fn sdk_subdirectory(&self, info: &ReleaseInfo, sdk_root: &Path) -> Result<String>;

    /// Module identifier reported as the job `name`.
    fn module_name(&self, release: &Release) -> String;

    /// Locate the aggregated samples of `release` inside the SDK checkout.
    fn discover_samples(&self, release: &Release, sdk_root: &Path) -> Result<SampleLocation>;

    /// Whether a file under the samples directory is a decomposition candidate.
    fn is_sample_file(&self, path: &Path) -> bool;

    /// Split one aggregated file into method regions. `None` when the file
    /// carries no marker and is not an aggregated sample.
    fn decompose_file<'a>(&self, text: &'a str) -> Option<Aggregate<'a>>;

    /// Rewrite one region into standalone source.
    fn normalize_unit(
        &self,
        release: &Release,
        aggregate: &Aggregate<'_>,
        region: &MethodRegion,
    ) -> Result<ExampleUnit>;

    /// Check every unit with the native toolchain in one scratch project.
    ///
    /// Returns the units, possibly rewritten by formatters.
    fn validate_batch(
        &self,
        release: &Release,
        location: &SampleLocation,
        units: Vec<ExampleUnit>,
        scratch_root: &Path,
        toolchain: &ToolchainConfig,
    ) -> Result<Vec<ExampleUnit>>;

    /// GitHub README link written as `sdkUrl` next to every example.
    fn compose_permalink(&self, release: &Release) -> String;

    /// Decompose and normalize one aggregated file.
    ///
    /// Methods that cannot be normalized are skipped with a warning. A file
    /// with markers but no extractable method is a [`PipelineError::Parse`].
    fn extract_units(&self, release: &Release, file: &str, text: &str) -> Result<Vec<ExampleUnit>> {
        let Some(aggregate) = self.decompose_file(text) else {
            debug!(file, "no original-file marker, not an aggregated sample");
            return Ok(Vec::new());
        };

        if aggregate.regions.is_empty() {
            return Err(PipelineError::parse(
                file,
                format!(
                    "{} marker(s) found but no example method could be extracted",
                    aggregate.markers
                ),
            ));
        }

        let mut units = Vec::with_capacity(aggregate.regions.len());
        for region in &aggregate.regions {
            match self.normalize_unit(release, &aggregate, region) {
                Ok(unit) => {
                    info!(example = %region.original_file, "Processing example");
                    units.push(unit);
                }
                Err(PipelineError::Parse { details, .. }) => {
                    warn!(file, example = %region.original_file, "skipping example: {}", details);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(units)
    }
}

/// Create the [`LanguageSupport`] implementation for a language.
pub fn create_language(language: Language) -> Box<dyn LanguageSupport> {
    match language {
        Language::Java => Box::new(JavaSupport),
        Language::Go => Box::new(GoSupport),
        Language::Js => Box::new(JsSupport),
        Language::Dotnet => Box::new(DotnetSupport),
        Language::Python => Box::new(PythonSupport),
    }
}

/// Shared target-location step of the normalizers.
pub(crate) fn locate_unit(
    original_file: &str,
    folder: &str,
    content: String,
) -> Result<ExampleUnit> {
    let location =
        target_location(original_file, folder).map_err(|e| PipelineError::parse(original_file, e))?;
    Ok(ExampleUnit {
        original_file: original_file.to_string(),
        target_dir: location.dir,
        target_filename: location.filename,
        content,
    })
}
