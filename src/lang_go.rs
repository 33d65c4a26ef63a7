//! Go: `sdk/resourcemanager/<service>/arm<service>` modules.
//!
//! Examples are `func Example...()` functions in `*_example_test.go` files,
//! each preceded by a `// Generated from example definition: <url>` comment.
//! The URL points at the spec repository; everything from `specification/`
//! on is the relative example path.

use std::path::Path;

use crate::config::ToolchainConfig;
use crate::decompose::{has_marker, join_lines, scan, Aggregate, Dialect, MethodRegion};
use crate::error::{PipelineError, Result};
use crate::language::{locate_unit, LanguageSupport, SampleLocation};
use crate::models::{ExampleUnit, Language, ReleaseInfo};
use crate::release::Release;
use crate::toolchain::ScratchProject;

const MARKER: &str = "// Generated from example definition:";
const SDK_MODULE_ROOT: &str = "github.com/Azure/azure-sdk-for-go";
const AZCORE: &str = "github.com/Azure/azure-sdk-for-go/sdk/azcore";
const AZIDENTITY: &str = "github.com/Azure/azure-sdk-for-go/sdk/azidentity";

pub struct GoSupport;

struct GoDialect;

impl Dialect for GoDialect {
    fn marker_prefix(&self) -> &'static str {
        MARKER
    }

    fn begins_method(&self, line: &str) -> bool {
        line.starts_with("func ")
    }

    fn ends_method(&self, line: &str, _previous: Option<&str>, _opening: &str) -> bool {
        line.trim_end() == "}"
    }

    fn resolve_marker(&self, raw: &str) -> std::result::Result<String, String> {
        match raw.find("specification/") {
            Some(pos) => crate::decompose::clean_spec_path(&raw[pos..]),
            None => Err(format!("example definition '{}' is not a spec path", raw.trim())),
        }
    }
}

/// Semantic version with the leading `v` Go modules use.
pub fn go_version(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

/// Import path of the released module, with the `/vN` suffix for major >= 2.
pub fn module_path(package: &str, version: &str) -> String {
    let version = go_version(version);
    let major: u64 = version[1..]
        .split('.')
        .next()
        .and_then(|m| m.parse().ok())
        .unwrap_or(0);
    if major >= 2 {
        format!("{}/{}/v{}", SDK_MODULE_ROOT, package, major)
    } else {
        format!("{}/{}", SDK_MODULE_ROOT, package)
    }
}

/// The `go` directive of a go.mod file.
fn go_directive(go_mod: &str) -> Option<String> {
    go_mod.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next()) {
            (Some("go"), Some(version)) => Some(version.to_string()),
            _ => None,
        }
    })
}

/// Version of `module` required by a go.mod file.
fn required_version(go_mod: &str, module: &str) -> Option<String> {
    go_mod.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        let mut first = tokens.next()?;
        if first == "require" {
            first = tokens.next()?;
        }
        if first == module {
            tokens.next().map(|v| v.to_string())
        } else {
            None
        }
    })
}

impl LanguageSupport for GoSupport {
    fn language(&self) -> Language {
        Language::Go
    }

    fn file_extension(&self) -> &'static str {
        "go"
    }

    fn example_folder(&self, _release: &Release) -> &'static str {
        "go"
    }

    fn sdk_subdirectory(&self, info: &ReleaseInfo, sdk_root: &Path) -> Result<String> {
        let package = info.package.trim().trim_matches('/');
        if !sdk_root.join(package).is_dir() {
            return Err(PipelineError::layout(format!(
                "Go module folder not found: {}",
                sdk_root.join(package).display()
            )));
        }
        Ok(package.to_string())
    }

    fn module_name(&self, release: &Release) -> String {
        format!(
            "{}@{}",
            module_path(&release.package, &release.version),
            go_version(&release.version)
        )
    }

    fn discover_samples(&self, release: &Release, sdk_root: &Path) -> Result<SampleLocation> {
        let samples_dir = sdk_root.join(&release.sdk_subdirectory);
        if !samples_dir.is_dir() {
            return Err(PipelineError::layout(format!(
                "Go module folder not found: {}",
                samples_dir.display()
            )));
        }
        let go_mod = samples_dir.join("go.mod");
        Ok(SampleLocation {
            samples_dir,
            manifest: go_mod.is_file().then_some(go_mod),
        })
    }

    fn is_sample_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with("_test.go") && name.contains("example"))
    }

    fn decompose_file<'a>(&self, text: &'a str) -> Option<Aggregate<'a>> {
        has_marker(text, &GoDialect).then(|| scan(text, &GoDialect))
    }

    fn normalize_unit(
        &self,
        release: &Release,
        aggregate: &Aggregate<'_>,
        region: &MethodRegion,
    ) -> Result<ExampleUnit> {
        if !aggregate
            .preamble()
            .iter()
            .any(|line| line.starts_with("package "))
        {
            return Err(PipelineError::parse(
                &region.original_file,
                "no package clause before the example function",
            ));
        }

        let mut lines: Vec<&str> = aggregate.preamble().to_vec();
        lines.extend_from_slice(aggregate.region_lines(region));
        locate_unit(
            &region.original_file,
            self.example_folder(release),
            join_lines(&lines),
        )
    }

    fn validate_batch(
        &self,
        release: &Release,
        location: &SampleLocation,
        mut units: Vec<ExampleUnit>,
        scratch_root: &Path,
        toolchain: &ToolchainConfig,
    ) -> Result<Vec<ExampleUnit>> {
        let go_mod = match &location.manifest {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| PipelineError::io("read go.mod", e))?,
            None => String::new(),
        };

        let go = &toolchain.go;
        let project = ScratchProject::create(scratch_root, "go")?;
        project.run(go, &["mod", "init", "example.com/validation"])?;
        if let Some(version) = go_directive(&go_mod) {
            project.run(go, &["mod".to_string(), "edit".to_string(), format!("-go={}", version)])?;
        }

        let release_module = format!(
            "{}@{}",
            module_path(&release.package, &release.version),
            go_version(&release.version)
        );
        project.run(go, &["get".to_string(), release_module])?;
        for dependency in [AZCORE, AZIDENTITY] {
            let version =
                required_version(&go_mod, dependency).unwrap_or_else(|| "latest".to_string());
            project.run(go, &["get".to_string(), format!("{}@{}", dependency, version)])?;
        }

        // Plain `.go` names: `go build` skips `_test.go` files.
        let mut sources = Vec::with_capacity(units.len());
        for (index, unit) in units.iter().enumerate() {
            let relative = format!("{:04}_example.go", index + 1);
            project.write_file(&relative, &unit.content)?;
            sources.push(relative);
        }

        project.run(&toolchain.goimports, &["-w", "."])?;
        project.run(go, &["build", "./..."])?;
        project.run(go, &["vet", "./..."])?;

        for (unit, relative) in units.iter_mut().zip(&sources) {
            unit.content = project.read_file(relative)?;
        }

        project.close()?;
        Ok(units)
    }

    fn compose_permalink(&self, release: &Release) -> String {
        format!(
            "https://github.com/Azure/azure-sdk-for-go/blob/{}/{}/README.md",
            release.escaped_tag(),
            release.sdk_subdirectory
        )
    }
}
