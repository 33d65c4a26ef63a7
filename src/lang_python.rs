//! Python: `azure-mgmt-*` packages.
//!
//! Every generated sample is already a standalone script holding exactly one
//! example; its marker is a `# x-ms-original-file:` comment near the end.
//! The unit is the script minus its leading comment header.

use std::path::Path;

use crate::config::ToolchainConfig;
use crate::decompose::{
    clean_spec_path, has_marker, join_lines, scan, Aggregate, Dialect, MethodRegion,
};
use crate::error::{PipelineError, Result};
use crate::language::{locate_unit, LanguageSupport, SampleLocation};
use crate::models::{ExampleUnit, Language, ReleaseInfo};
use crate::release::{find_unique_module_dir, Release};
use crate::toolchain::ScratchProject;

const MARKER: &str = "# x-ms-original-file:";

pub struct PythonSupport;

struct PythonDialect;

impl Dialect for PythonDialect {
    fn marker_prefix(&self) -> &'static str {
        MARKER
    }

    fn marker_inside_method(&self) -> bool {
        true
    }

    fn closes_at_eof(&self) -> bool {
        true
    }

    fn begins_method(&self, line: &str) -> bool {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    }

    fn ends_method(&self, _line: &str, _previous: Option<&str>, _opening: &str) -> bool {
        false
    }

    fn resolve_marker(&self, raw: &str) -> std::result::Result<String, String> {
        match raw.find("specification/") {
            Some(pos) => clean_spec_path(&raw[pos..]),
            None => clean_spec_path(raw),
        }
    }
}

impl LanguageSupport for PythonSupport {
    fn language(&self) -> Language {
        Language::Python
    }

    fn file_extension(&self) -> &'static str {
        "py"
    }

    fn example_folder(&self, _release: &Release) -> &'static str {
        "python"
    }

    fn sdk_subdirectory(&self, info: &ReleaseInfo, sdk_root: &Path) -> Result<String> {
        find_unique_module_dir(sdk_root, info.package.trim())
    }

    fn module_name(&self, release: &Release) -> String {
        format!("{}=={}", release.package, release.version)
    }

    fn discover_samples(&self, release: &Release, sdk_root: &Path) -> Result<SampleLocation> {
        let module_dir = sdk_root.join(&release.sdk_subdirectory);
        ["generated_samples", "samples"]
            .iter()
            .map(|name| module_dir.join(name))
            .find(|dir| dir.is_dir())
            .map(|samples_dir| SampleLocation {
                samples_dir,
                manifest: None,
            })
            .ok_or_else(|| {
                PipelineError::layout(format!(
                    "no generated_samples folder in {}",
                    module_dir.display()
                ))
            })
    }

    fn is_sample_file(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "py")
    }

    fn decompose_file<'a>(&self, text: &'a str) -> Option<Aggregate<'a>> {
        has_marker(text, &PythonDialect).then(|| scan(text, &PythonDialect))
    }

    fn normalize_unit(
        &self,
        release: &Release,
        aggregate: &Aggregate<'_>,
        region: &MethodRegion,
    ) -> Result<ExampleUnit> {
        locate_unit(
            &region.original_file,
            self.example_folder(release),
            join_lines(aggregate.region_lines(region)),
        )
    }

    fn validate_batch(
        &self,
        _release: &Release,
        _location: &SampleLocation,
        units: Vec<ExampleUnit>,
        scratch_root: &Path,
        toolchain: &ToolchainConfig,
    ) -> Result<Vec<ExampleUnit>> {
        if !toolchain.python_syntax_check || units.is_empty() {
            return Ok(units);
        }

        let project = ScratchProject::create(scratch_root, "python")?;
        let mut args = vec!["-m".to_string(), "py_compile".to_string()];
        for (index, unit) in units.iter().enumerate() {
            let relative = format!("example_{:04}.py", index + 1);
            project.write_file(&relative, &unit.content)?;
            args.push(relative);
        }
        project.run(&toolchain.python, &args)?;

        project.close()?;
        Ok(units)
    }

    fn compose_permalink(&self, release: &Release) -> String {
        format!(
            "https://github.com/Azure/azure-sdk-for-python/blob/{}/{}/README.md",
            release.escaped_tag(),
            release.sdk_subdirectory
        )
    }
}
