//! Java: `azure-resourcemanager-*` samples under `src/samples/java`.
//!
//! Aggregated samples are classes holding one `public static void` method per
//! example. The marker lives in a block comment above the method and may wrap
//! over several `*` lines. Each unit keeps the class wrapper (renamed to
//! `Main`), all imports, and every non-example member (helpers between the
//! example methods and after the last one); the `package` declaration is
//! dropped.

use std::path::Path;

use crate::config::ToolchainConfig;
use crate::decompose::{has_marker, join_lines, scan, Aggregate, Dialect, MethodRegion};
use crate::error::{PipelineError, Result};
use crate::language::{locate_unit, LanguageSupport, SampleLocation};
use crate::models::{ExampleUnit, Language, ReleaseInfo};
use crate::release::{find_unique_module_dir, Release};
use crate::toolchain::ScratchProject;

const MARKER: &str = "* x-ms-original-file:";
const RESOURCE_MANAGER_PREFIX: &str = "azure-resourcemanager-";
const CLASS_NAME: &str = "Main";

pub struct JavaSupport;

struct JavaDialect;

impl Dialect for JavaDialect {
    fn marker_prefix(&self) -> &'static str {
        MARKER
    }

    fn wraps_markers(&self) -> bool {
        true
    }

    fn begins_method(&self, line: &str) -> bool {
        line.starts_with("    public static void ")
    }

    fn ends_method(&self, line: &str, _previous: Option<&str>, _opening: &str) -> bool {
        line.starts_with("    }")
    }

    fn is_attached(&self, line: &str, _opening: &str) -> bool {
        line.trim_start().starts_with('@')
    }
}

impl LanguageSupport for JavaSupport {
    fn language(&self) -> Language {
        Language::Java
    }

    fn file_extension(&self) -> &'static str {
        "java"
    }

    fn example_folder(&self, _release: &Release) -> &'static str {
        "java"
    }

    fn sdk_subdirectory(&self, info: &ReleaseInfo, sdk_root: &Path) -> Result<String> {
        let package = info.package.trim();
        if let Some(service) = package.strip_prefix(RESOURCE_MANAGER_PREFIX) {
            if sdk_root.join("sdk").join(service).join(package).is_dir() {
                return Ok(service.to_string());
            }
        }

        // Service folders do not always match the package suffix.
        let module = find_unique_module_dir(sdk_root, package)?;
        module
            .split('/')
            .nth(1)
            .map(|s| s.to_string())
            .ok_or_else(|| PipelineError::layout(format!("unexpected module path {}", module)))
    }

    fn module_name(&self, release: &Release) -> String {
        format!(
            "{}:{}:{}",
            group_id(&release.package),
            release.package,
            release.version
        )
    }

    fn discover_samples(&self, release: &Release, sdk_root: &Path) -> Result<SampleLocation> {
        let module_dir = sdk_root
            .join("sdk")
            .join(&release.sdk_subdirectory)
            .join(&release.package);
        let samples_dir = module_dir.join("src").join("samples").join("java");
        if !samples_dir.is_dir() {
            return Err(PipelineError::layout(format!(
                "Java samples folder not found: {}",
                samples_dir.display()
            )));
        }
        let pom = module_dir.join("pom.xml");
        Ok(SampleLocation {
            samples_dir,
            manifest: pom.is_file().then_some(pom),
        })
    }

    fn is_sample_file(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "java")
    }

    fn decompose_file<'a>(&self, text: &'a str) -> Option<Aggregate<'a>> {
        has_marker(text, &JavaDialect).then(|| scan(text, &JavaDialect))
    }

    fn normalize_unit(
        &self,
        release: &Release,
        aggregate: &Aggregate<'_>,
        region: &MethodRegion,
    ) -> Result<ExampleUnit> {
        let mut lines: Vec<String> = Vec::new();
        let mut renamed = false;
        let mut skip_blank = false;

        for line in aggregate.preamble() {
            if skip_blank {
                skip_blank = false;
                if line.trim().is_empty() {
                    continue;
                }
            }
            if line.trim_start().starts_with("package ") {
                skip_blank = true;
                continue;
            }
            if !renamed {
                if let Some(rewritten) = rename_class(line, CLASS_NAME) {
                    lines.push(rewritten);
                    renamed = true;
                    continue;
                }
            }
            lines.push(line.to_string());
        }

        if !renamed {
            return Err(PipelineError::parse(
                &region.original_file,
                "class declaration not found in the aggregated sample",
            ));
        }

        lines.extend(aggregate.region_lines(region).iter().map(|l| l.to_string()));
        for members in aggregate.members_between(MARKER) {
            lines.push("\n".to_string());
            lines.extend(members.iter().map(|l| l.to_string()));
        }
        lines.extend(aggregate.trailer().iter().map(|l| l.to_string()));

        let borrowed: Vec<&str> = lines.iter().map(|l| l.as_str()).collect();
        locate_unit(
            &region.original_file,
            self.example_folder(release),
            join_lines(&borrowed),
        )
    }

    fn validate_batch(
        &self,
        release: &Release,
        _location: &SampleLocation,
        mut units: Vec<ExampleUnit>,
        scratch_root: &Path,
        toolchain: &ToolchainConfig,
    ) -> Result<Vec<ExampleUnit>> {
        let project = ScratchProject::create(scratch_root, "java")?;
        project.write_file("pom.xml", &pom_xml(release))?;

        let mut sources = Vec::with_capacity(units.len());
        for (index, unit) in units.iter().enumerate() {
            let package = source_package(index);
            let relative = format!("src/main/java/{}/{}.java", package, CLASS_NAME);
            project.write_file(&relative, &format!("package {};\n\n{}", package, unit.content))?;
            sources.push(relative);
        }

        project.run(&toolchain.java_formatter, &sources)?;
        project.run(&toolchain.maven, &["compile"])?;

        for (index, unit) in units.iter_mut().enumerate() {
            let formatted = project.read_file(&sources[index])?;
            unit.content = strip_source_package(&formatted, &source_package(index));
        }

        project.close()?;
        Ok(units)
    }

    fn compose_permalink(&self, release: &Release) -> String {
        format!(
            "https://github.com/Azure/azure-sdk-for-java/blob/{}/sdk/{}/{}/README.md",
            release.tag, release.sdk_subdirectory, release.package
        )
    }
}

fn group_id(package: &str) -> &'static str {
    if package.starts_with("azure-resourcemanager") {
        "com.azure.resourcemanager"
    } else {
        "com.azure"
    }
}

fn source_package(index: usize) -> String {
    format!("example{:04}", index + 1)
}

/// Rename the class declared on `line`, keeping its modifiers.
fn rename_class(line: &str, name: &str) -> Option<String> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("//") || trimmed.starts_with('*') || trimmed.starts_with("/*") {
        return None;
    }
    let keyword = if trimmed.starts_with("class ") {
        line.len() - trimmed.len()
    } else {
        line.find(" class ")? + 1
    };

    let ident_start = keyword + "class ".len();
    let rest = &line[ident_start..];
    let ident_len = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(rest.len());
    if ident_len == 0 {
        return None;
    }
    Some(format!(
        "{}{}{}",
        &line[..ident_start],
        name,
        &rest[ident_len..]
    ))
}

/// Remove the `package` line added for validation and the blank line after it.
fn strip_source_package(formatted: &str, package: &str) -> String {
    let declaration = format!("package {};", package);
    let mut lines = formatted.split_inclusive('\n').peekable();
    if lines.peek().map(|l| l.trim()) == Some(declaration.as_str()) {
        lines.next();
        if lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }
    }
    lines.collect()
}

fn pom_xml(release: &Release) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0"
         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xsi:schemaLocation="http://maven.apache.org/POM/4.0.0 http://maven.apache.org/xsd/maven-4.0.0.xsd">
  <modelVersion>4.0.0</modelVersion>

  <groupId>com.azure.resourcemanager</groupId>
  <artifactId>examples-validation</artifactId>
  <version>1.0.0</version>

  <properties>
    <maven.compiler.source>1.8</maven.compiler.source>
    <maven.compiler.target>1.8</maven.compiler.target>
    <project.build.sourceEncoding>UTF-8</project.build.sourceEncoding>
  </properties>

  <dependencies>
    <dependency>
      <groupId>{}</groupId>
      <artifactId>{}</artifactId>
      <version>{}</version>
    </dependency>
  </dependencies>
</project>
"#,
        group_id(&release.package),
        release.package,
        release.version
    )
}
