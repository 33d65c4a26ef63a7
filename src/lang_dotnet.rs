//! .NET: `Azure.ResourceManager.*` packages.
//!
//! Generated samples are NUnit test classes under `samples/Generated/Samples`
//! (older packages: `tests/Generated/Samples`). The marker is the first
//! comment inside each test method. A unit is the method body turned into
//! top-level statements under the file's `using` directives.

use std::path::Path;

use crate::config::ToolchainConfig;
use crate::decompose::{
    bare, clean_spec_path, has_marker, indent_of, scan, Aggregate, Dialect, MethodRegion,
};
use crate::error::{PipelineError, Result};
use crate::language::{locate_unit, LanguageSupport, SampleLocation};
use crate::models::{ExampleUnit, Language, ReleaseInfo};
use crate::normalize::dedent;
use crate::release::{find_unique_module_dir, Release};
use crate::toolchain::ScratchProject;

const MARKER: &str = "// Generated from example definition:";
const TEST_ONLY_USINGS: [&str; 1] = ["using NUnit.Framework;"];

pub struct DotnetSupport;

struct DotnetDialect;

impl Dialect for DotnetDialect {
    fn marker_prefix(&self) -> &'static str {
        MARKER
    }

    fn marker_inside_method(&self) -> bool {
        true
    }

    fn begins_method(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        indent_of(line) > 0
            && trimmed.starts_with("public ")
            && trimmed.contains('(')
            && !trimmed.contains(" class ")
    }

    fn ends_method(&self, line: &str, _previous: Option<&str>, opening: &str) -> bool {
        let indent = &opening[..indent_of(opening)];
        line.trim_end()
            .strip_prefix(indent)
            .is_some_and(|rest| rest == "}")
    }

    fn is_attached(&self, line: &str, _opening: &str) -> bool {
        line.trim_start().starts_with('[')
    }

    fn resolve_marker(&self, raw: &str) -> std::result::Result<String, String> {
        match raw.find("specification/") {
            Some(pos) => clean_spec_path(&raw[pos..]),
            None => clean_spec_path(raw),
        }
    }
}

/// `using` directives and namespace declared before the first method.
fn header(preamble: &[&str]) -> (Vec<String>, Option<String>) {
    let mut usings = Vec::new();
    let mut namespace = None;
    for line in preamble {
        let trimmed = line.trim();
        if trimmed.starts_with("using ") && trimmed.ends_with(';') {
            if !TEST_ONLY_USINGS.contains(&trimmed) {
                usings.push(trimmed.to_string());
            }
        } else if let Some(name) = trimmed.strip_prefix("namespace ") {
            namespace = Some(name.trim_end_matches(';').trim().to_string());
        }
    }
    (usings, namespace)
}

/// Lines strictly between the method's opening and closing braces.
fn method_body<'s, 'a>(lines: &'s [&'a str]) -> Option<&'s [&'a str]> {
    let opening = lines.iter().position(|l| DotnetDialect.begins_method(bare(l)))?;
    let brace = lines[opening..]
        .iter()
        .position(|l| l.trim() == "{" || bare(l).trim_end().ends_with('{'))?
        + opening;
    let last = lines.len().checked_sub(1)?;
    (brace < last).then(|| &lines[brace + 1..last])
}

impl LanguageSupport for DotnetSupport {
    fn language(&self) -> Language {
        Language::Dotnet
    }

    fn file_extension(&self) -> &'static str {
        "cs"
    }

    fn example_folder(&self, _release: &Release) -> &'static str {
        "dotnet"
    }

    fn sdk_subdirectory(&self, info: &ReleaseInfo, sdk_root: &Path) -> Result<String> {
        find_unique_module_dir(sdk_root, info.package.trim())
    }

    fn module_name(&self, release: &Release) -> String {
        format!("{}@{}", release.package, release.version)
    }

    fn discover_samples(&self, release: &Release, sdk_root: &Path) -> Result<SampleLocation> {
        let module_dir = sdk_root.join(&release.sdk_subdirectory);
        ["samples", "tests"]
            .iter()
            .map(|root| module_dir.join(root).join("Generated").join("Samples"))
            .find(|dir| dir.is_dir())
            .map(|samples_dir| SampleLocation {
                samples_dir,
                manifest: None,
            })
            .ok_or_else(|| {
                PipelineError::layout(format!(
                    "no Generated/Samples folder in {}",
                    module_dir.display()
                ))
            })
    }

    fn is_sample_file(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "cs")
    }

    fn decompose_file<'a>(&self, text: &'a str) -> Option<Aggregate<'a>> {
        has_marker(text, &DotnetDialect).then(|| scan(text, &DotnetDialect))
    }

    fn normalize_unit(
        &self,
        release: &Release,
        aggregate: &Aggregate<'_>,
        region: &MethodRegion,
    ) -> Result<ExampleUnit> {
        let (mut usings, namespace) = header(aggregate.preamble());
        // Generated `.Samples` namespaces carry nothing the body needs.
        if let Some(namespace) = namespace.filter(|ns| !ns.ends_with(".Samples")) {
            let directive = format!("using {};", namespace);
            if !usings.contains(&directive) {
                usings.push(directive);
            }
        }

        let body = method_body(aggregate.region_lines(region)).ok_or_else(|| {
            PipelineError::parse(&region.original_file, "method body braces not found")
        })?;

        let mut content = String::new();
        for using in &usings {
            content.push_str(using);
            content.push('\n');
        }
        content.push('\n');
        for line in dedent(body) {
            content.push_str(&line);
            content.push('\n');
        }

        locate_unit(&region.original_file, self.example_folder(release), content)
    }

    fn validate_batch(
        &self,
        release: &Release,
        _location: &SampleLocation,
        units: Vec<ExampleUnit>,
        scratch_root: &Path,
        toolchain: &ToolchainConfig,
    ) -> Result<Vec<ExampleUnit>> {
        let project = ScratchProject::create(scratch_root, "dotnet")?;
        project.write_file(
            "Validation.csproj",
            &csproj(release, &toolchain.dotnet_target_framework),
        )?;
        for (index, unit) in units.iter().enumerate() {
            project.write_file(
                &format!("Example{:04}.cs", index + 1),
                &wrap_for_build(&unit.content, index),
            )?;
        }

        project.run(&toolchain.dotnet, &["build", "--nologo"])?;

        project.close()?;
        Ok(units)
    }

    fn compose_permalink(&self, release: &Release) -> String {
        format!(
            "https://github.com/Azure/azure-sdk-for-net/blob/{}/{}/README.md",
            release.tag, release.sdk_subdirectory
        )
    }
}

/// Top-level statements cannot be compiled side by side, so each unit
/// becomes the body of its own static method for the build.
fn wrap_for_build(content: &str, index: usize) -> String {
    let mut usings = String::new();
    let mut body = String::new();
    let mut in_header = true;
    for line in content.lines() {
        if in_header && (line.starts_with("using ") || line.trim().is_empty()) {
            if !line.trim().is_empty() {
                usings.push_str(line);
                usings.push('\n');
            }
            continue;
        }
        in_header = false;
        if !line.is_empty() {
            body.push_str("            ");
            body.push_str(line);
        }
        body.push('\n');
    }

    format!(
        "{usings}\nnamespace Validation\n{{\n    internal static class Example{number:04}\n    {{\n        internal static async System.Threading.Tasks.Task RunAsync()\n        {{\n{body}        }}\n    }}\n}}\n",
        number = index + 1
    )
}

fn csproj(release: &Release, target_framework: &str) -> String {
    format!(
        r#"<Project Sdk="Microsoft.NET.Sdk">

  <PropertyGroup>
    <OutputType>Library</OutputType>
    <TargetFramework>{}</TargetFramework>
    <Nullable>disable</Nullable>
    <ImplicitUsings>disable</ImplicitUsings>
  </PropertyGroup>

  <ItemGroup>
    <PackageReference Include="{}" Version="{}" />
    <PackageReference Include="Azure.Identity" Version="1.*" />
  </ItemGroup>

</Project>
"#,
        target_framework, release.package, release.version
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const AGGREGATED: &str = r#"// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

// <auto-generated/>

#nullable disable

using System;
using System.Threading.Tasks;
using Azure.Core;
using Azure.Identity;
using Azure.ResourceManager.Foo.Models;
using NUnit.Framework;

namespace Azure.ResourceManager.Foo.Samples
{
    public partial class Sample_FooResource
    {
        [Test]
        [Ignore("Only validating compilation of examples")]
        public async Task Get_GetFoo()
        {
            // Generated from example definition: specification/foo/resource-manager/Microsoft.Foo/stable/2023-01-01/examples/Foo_Get.json
            // this example is just showing the usage of "Foo_Get" operation.

            TokenCredential cred = new DefaultAzureCredential();
            ArmClient client = new ArmClient(cred);
            if (client != null)
            {
                Console.WriteLine("Succeeded");
            }
        }

        public void Helper()
        {
        }

        [Test]
        [Ignore("Only validating compilation of examples")]
        public async Task Delete_DeleteFoo()
        {
            // Generated from example definition: specification/foo/resource-manager/Microsoft.Foo/stable/2023-01-01/examples/Foo_Delete.json
            ArmClient client = new ArmClient(new DefaultAzureCredential());
            await Task.Yield();
        }
    }
}
"#;

    fn release() -> Release {
        Release {
            tag: "Azure.ResourceManager.Foo_1.0.0".to_string(),
            package: "Azure.ResourceManager.Foo".to_string(),
            version: "1.0.0".to_string(),
            sdk_subdirectory: "sdk/foo/Azure.ResourceManager.Foo".to_string(),
        }
    }

    #[test]
    fn test_methods_with_markers_extracted() {
        let aggregate = DotnetSupport.decompose_file(AGGREGATED).unwrap();
        assert_eq!(aggregate.markers, 2);
        assert_eq!(aggregate.regions.len(), 2);
        let first = aggregate.region_lines(&aggregate.regions[0]);
        assert_eq!(first[0].trim(), "[Test]");
        assert_eq!(first.last().unwrap().trim_end(), "        }");
    }

    #[test]
    fn test_unit_is_top_level_statements() {
        let units = DotnetSupport
            .extract_units(&release(), "Sample_FooResource.cs", AGGREGATED)
            .unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].target_filename, "Foo_Get");
        assert_eq!(
            units[0].target_dir,
            "specification/foo/resource-manager/Microsoft.Foo/stable/2023-01-01/examples-dotnet"
        );

        let expected = "using System;
using System.Threading.Tasks;
using Azure.Core;
using Azure.Identity;
using Azure.ResourceManager.Foo.Models;

// Generated from example definition: specification/foo/resource-manager/Microsoft.Foo/stable/2023-01-01/examples/Foo_Get.json
// this example is just showing the usage of \"Foo_Get\" operation.

TokenCredential cred = new DefaultAzureCredential();
ArmClient client = new ArmClient(cred);
if (client != null)
{
    Console.WriteLine(\"Succeeded\");
}
";
        assert_eq!(units[0].content, expected);
        assert!(!units[1].content.contains("NUnit"));
        assert!(units[1].content.ends_with("await Task.Yield();\n"));
    }

    #[test]
    fn test_samples_namespace_is_not_a_using() {
        let units = DotnetSupport
            .extract_units(&release(), "Sample_FooResource.cs", AGGREGATED)
            .unwrap();
        for unit in &units {
            assert!(!unit.content.contains("using Azure.ResourceManager.Foo;"));
            assert!(!unit.content.contains("namespace"));
        }
    }

    #[test]
    fn test_other_namespace_becomes_using() {
        let text = AGGREGATED.replace(
            "namespace Azure.ResourceManager.Foo.Samples",
            "namespace Azure.ResourceManager.Foo.Snippets",
        );
        let units = DotnetSupport
            .extract_units(&release(), "Sample_FooResource.cs", &text)
            .unwrap();
        assert!(units[0].content.contains(
            "using Azure.ResourceManager.Foo.Models;\nusing Azure.ResourceManager.Foo.Snippets;\n\n"
        ));
        assert_eq!(
            units[0]
                .content
                .matches("using Azure.ResourceManager.Foo.Snippets;")
                .count(),
            1
        );
    }

    #[test]
    fn test_wrap_for_build() {
        let wrapped = wrap_for_build("using System;\n\nConsole.WriteLine(1);\n", 0);
        assert!(wrapped.starts_with("using System;\n\nnamespace Validation\n"));
        assert!(wrapped.contains("internal static class Example0001"));
        assert!(wrapped.contains("            Console.WriteLine(1);\n"));
    }

    #[test]
    fn test_discover_falls_back_to_tests_folder() {
        let tmp = TempDir::new().unwrap();
        let module = tmp.path().join("sdk/foo/Azure.ResourceManager.Foo");
        std::fs::create_dir_all(module.join("tests/Generated/Samples")).unwrap();
        let location = DotnetSupport.discover_samples(&release(), tmp.path()).unwrap();
        assert!(location.samples_dir.ends_with("tests/Generated/Samples"));

        std::fs::create_dir_all(module.join("samples/Generated/Samples")).unwrap();
        let location = DotnetSupport.discover_samples(&release(), tmp.path()).unwrap();
        assert!(location.samples_dir.ends_with("samples/Generated/Samples"));
    }

    #[test]
    fn test_permalink_uses_raw_tag() {
        assert_eq!(
            DotnetSupport.compose_permalink(&release()),
            "https://github.com/Azure/azure-sdk-for-net/blob/Azure.ResourceManager.Foo_1.0.0/sdk/foo/Azure.ResourceManager.Foo/README.md"
        );
    }

    #[test]
    fn test_build_project_written() {
        let tmp = TempDir::new().unwrap();
        let units = DotnetSupport
            .extract_units(&release(), "Sample_FooResource.cs", AGGREGATED)
            .unwrap();
        let location = SampleLocation {
            samples_dir: tmp.path().to_path_buf(),
            manifest: None,
        };
        let toolchain = ToolchainConfig {
            dotnet: vec![
                "sh".to_string(),
                "-c".to_string(),
                "grep -q 'Include=\"Azure.ResourceManager.Foo\" Version=\"1.0.0\"' Validation.csproj && test -f Example0002.cs".to_string(),
            ],
            ..ToolchainConfig::default()
        };
        let validated = DotnetSupport
            .validate_batch(&release(), &location, units.clone(), tmp.path(), &toolchain)
            .unwrap();
        assert_eq!(validated, units);
    }
}
