//! JavaScript: `@azure/arm-*` (HLC) and `@azure-rest/arm-*` (RLC) packages.
//!
//! Aggregated samples live in `samples/v<major>[-beta]/javascript/*Sample.js`.
//! Two generator styles exist. The older one invokes every example right
//! after its declaration (`foo().catch(console.error);`), so the invocation
//! line closes the method. The newer one gathers the calls in an
//! `async function main()`; methods then close at a bare `}` and the `main`
//! function itself carries no marker and is dropped.

use std::path::Path;

use serde_json::{json, Map, Value};

use crate::config::ToolchainConfig;
use crate::decompose::{has_marker, join_lines, scan, Aggregate, Dialect, MethodRegion};
use crate::error::{PipelineError, Result};
use crate::language::{locate_unit, LanguageSupport, SampleLocation};
use crate::models::{ExampleUnit, Language, ReleaseInfo};
use crate::release::{find_unique_module_dir, Release};
use crate::toolchain::ScratchProject;

const MARKER: &str = "* x-ms-original-file:";
const MAIN_FUNCTION: &str = "async function main()";
const DOTENV: &str = "require(\"dotenv\").config();";

const ESLINT_CONFIG: &str = r#"{
  "root": true,
  "extends": "eslint:recommended",
  "env": {
    "node": true,
    "es2022": true
  },
  "parserOptions": {
    "ecmaVersion": 2022,
    "sourceType": "script"
  },
  "rules": {
    "no-unused-vars": "off"
  }
}
"#;

pub struct JsSupport;

/// Generated package flavor, told apart by the npm scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageType {
    /// High-level client, `@azure/arm-<name>`.
    Hlc,
    /// REST-level client, `@azure-rest/arm-<name>`.
    Rlc,
}

impl PackageType {
    const HLC_PREFIX: &'static str = "@azure/arm-";
    const RLC_PREFIX: &'static str = "@azure-rest/arm-";

    pub fn of(package: &str) -> Self {
        if package.starts_with(Self::HLC_PREFIX) {
            PackageType::Hlc
        } else {
            PackageType::Rlc
        }
    }

    /// Service name: the package without its scope and `arm-` prefix.
    pub fn sdk_name(self, package: &str) -> &str {
        let prefix = match self {
            PackageType::Hlc => Self::HLC_PREFIX,
            PackageType::Rlc => Self::RLC_PREFIX,
        };
        package.strip_prefix(prefix).unwrap_or(package)
    }

    fn module_suffix(self) -> &'static str {
        match self {
            PackageType::Hlc => "",
            PackageType::Rlc => "-rest",
        }
    }

    fn folder(self) -> &'static str {
        match self {
            PackageType::Hlc => "js",
            PackageType::Rlc => "js-rlc",
        }
    }
}

struct JsDialect {
    with_main: bool,
}

impl JsDialect {
    fn for_text(text: &str) -> Self {
        Self {
            with_main: text.contains(MAIN_FUNCTION),
        }
    }
}

impl Dialect for JsDialect {
    fn marker_prefix(&self) -> &'static str {
        MARKER
    }

    fn begins_method(&self, line: &str) -> bool {
        line.starts_with("async function ")
    }

    fn ends_method(&self, line: &str, previous: Option<&str>, _opening: &str) -> bool {
        line.contains(".catch(console.error);")
            || (line.starts_with(");") && previous.is_some_and(|p| p.contains("console.error")))
            || (self.with_main && line.trim_end() == "}")
    }
}

/// Samples folder version: `v<major>`, with `-beta` for beta releases.
pub fn sample_version(version: &str) -> String {
    let major = version.split('.').next().unwrap_or(version);
    let mut folder = format!("v{}", major);
    if version.contains("-beta") {
        folder.push_str("-beta");
    }
    folder
}

/// The `require(...)` statements of the shared preamble, without `dotenv`.
fn require_lines<'a>(preamble: &[&'a str]) -> Vec<&'a str> {
    preamble
        .iter()
        .copied()
        .filter(|line| line.contains("require(") && !line.contains(DOTENV))
        .collect()
}

impl LanguageSupport for JsSupport {
    fn language(&self) -> Language {
        Language::Js
    }

    fn file_extension(&self) -> &'static str {
        "js"
    }

    fn example_folder(&self, release: &Release) -> &'static str {
        PackageType::of(&release.package).folder()
    }

    fn sdk_subdirectory(&self, info: &ReleaseInfo, sdk_root: &Path) -> Result<String> {
        let package = info.package.trim();
        let package_type = PackageType::of(package);
        let sdk_name = package_type.sdk_name(package);
        let folder = format!("arm-{}{}", sdk_name, package_type.module_suffix());

        let direct = format!("sdk/{}/{}", sdk_name, folder);
        if sdk_root.join(&direct).is_dir() {
            return Ok(direct);
        }
        tracing::info!(
            "SDK folder {} not found, searching sdk/*/{}",
            direct,
            folder
        );
        find_unique_module_dir(sdk_root, &folder)
    }

    fn module_name(&self, release: &Release) -> String {
        format!("{}@{}", release.package, release.version)
    }

    fn discover_samples(&self, release: &Release, sdk_root: &Path) -> Result<SampleLocation> {
        let samples_dir = sdk_root
            .join(&release.sdk_subdirectory)
            .join("samples")
            .join(sample_version(&release.version))
            .join("javascript");
        if !samples_dir.is_dir() {
            return Err(PipelineError::layout(format!(
                "JavaScript samples folder not found: {}",
                samples_dir.display()
            )));
        }
        let manifest = samples_dir.join("package.json");
        Ok(SampleLocation {
            samples_dir,
            manifest: manifest.is_file().then_some(manifest),
        })
    }

    fn is_sample_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with("Sample.js"))
    }

    fn decompose_file<'a>(&self, text: &'a str) -> Option<Aggregate<'a>> {
        let dialect = JsDialect::for_text(text);
        has_marker(text, &dialect).then(|| scan(text, &dialect))
    }

    fn normalize_unit(
        &self,
        release: &Release,
        aggregate: &Aggregate<'_>,
        region: &MethodRegion,
    ) -> Result<ExampleUnit> {
        let mut lines = require_lines(aggregate.preamble());
        if lines.is_empty() {
            return Err(PipelineError::parse(
                &region.original_file,
                "no require() statement in the aggregated sample",
            ));
        }
        lines.push("\n");
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
        units: Vec<ExampleUnit>,
        scratch_root: &Path,
        toolchain: &ToolchainConfig,
    ) -> Result<Vec<ExampleUnit>> {
        let project = ScratchProject::create(scratch_root, "js")?;
        project.write_file(
            "package.json",
            &package_json(release, location.manifest.as_deref())?,
        )?;
        project.write_file(".eslintrc.json", ESLINT_CONFIG)?;

        let mut sources = Vec::with_capacity(units.len());
        for (index, unit) in units.iter().enumerate() {
            let relative = format!("example_{:04}.js", index + 1);
            project.write_file(&relative, &unit.content)?;
            sources.push(relative);
        }

        project.run(&toolchain.npm, &["install", "--no-audit", "--no-fund"])?;
        let mut eslint = vec!["eslint".to_string()];
        eslint.extend(sources);
        project.run(&toolchain.npx, &eslint)?;

        project.close()?;
        Ok(units)
    }

    fn compose_permalink(&self, release: &Release) -> String {
        format!(
            "https://github.com/Azure/azure-sdk-for-js/blob/{}/{}/README.md",
            release.escaped_tag(),
            release.sdk_subdirectory
        )
    }
}

/// Scratch `package.json`: the samples' dependencies with the released
/// package pinned to the release version.
fn package_json(release: &Release, manifest: Option<&Path>) -> Result<String> {
    let mut dependencies = Map::new();
    if let Some(manifest) = manifest {
        let text = std::fs::read_to_string(manifest)
            .map_err(|e| PipelineError::io("read samples package.json", e))?;
        let parsed: Value = serde_json::from_str(&text).map_err(|e| {
            PipelineError::layout(format!("invalid {}: {}", manifest.display(), e))
        })?;
        if let Some(deps) = parsed.get("dependencies").and_then(|d| d.as_object()) {
            dependencies.extend(deps.clone());
        }
    }
    dependencies.insert(
        release.package.clone(),
        Value::String(release.version.clone()),
    );

    let package = json!({
        "name": "examples-validation",
        "version": "1.0.0",
        "private": true,
        "dependencies": dependencies,
        "devDependencies": {
            "eslint": "^8.57.0"
        }
    });
    serde_json::to_string_pretty(&package)
        .map_err(|e| PipelineError::layout(format!("cannot render package.json: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const OLD_STYLE: &str = r#"const { StorageManagementClient } = require("@azure/arm-storage");
const { DefaultAzureCredential } = require("@azure/identity");

/**
 * This sample demonstrates how to Gets properties of a specified container.
 *
 * @summary Gets properties of a specified container.
 * x-ms-original-file: specification/storage/resource-manager/Microsoft.Storage/stable/2022-09-01/examples/BlobContainersGetWithAllowProtectedAppendWritesAll.json
 */
async function getBlobContainersGetWithAllowProtectedAppendWritesAll() {
  const subscriptionId = "{subscription-id}";
  const credential = new DefaultAzureCredential();
  const client = new StorageManagementClient(credential, subscriptionId);
  const result = await client.blobContainers.get("res9871", "sto6217", "container1634");
  console.log(result);
}

getBlobContainersGetWithAllowProtectedAppendWritesAll().catch(console.error);

/**
 * This sample demonstrates how to Gets properties of a specified container.
 *
 * @summary Gets properties of a specified container.
 * x-ms-original-file: specification/storage/resource-manager/Microsoft.Storage/stable/2022-09-01/examples/BlobContainersGet.json
 */
async function getContainers() {
  const subscriptionId = "{subscription-id}";
  const credential = new DefaultAzureCredential();
  const client = new StorageManagementClient(credential, subscriptionId);
  const result = await client.blobContainers.get("res9871", "sto6217", "container1634");
  console.log(result);
}

getContainers().catch(console.error);
"#;

    const NEW_STYLE_SINGLE: &str = r#"const { SynapseManagementClient } = require("@azure/arm-synapse");
const { DefaultAzureCredential } = require("@azure/identity");
require("dotenv").config();

/**
 * This sample demonstrates how to Lists auditing settings of a Sql pool.
 *
 * @summary Lists auditing settings of a Sql pool.
 * x-ms-original-file: specification/synapse/resource-manager/Microsoft.Synapse/stable/2021-06-01/examples/SqlPoolAuditingSettingsList.json
 */
async function listAuditSettingsOfADatabase() {
  const subscriptionId =
    process.env["SYNAPSE_SUBSCRIPTION_ID"] || "00000000-1111-2222-3333-444444444444";
  const credential = new DefaultAzureCredential();
  const client = new SynapseManagementClient(credential, subscriptionId);
  const resArray = new Array();
  for await (let item of client.sqlPoolBlobAuditingPolicies.listBySqlPool(
    "blobauditingtest-6852",
    "blobauditingtest-2080",
    "testdb"
  )) {
    resArray.push(item);
  }
  console.log(resArray);
}

async function main() {
  listAuditSettingsOfADatabase();
}

main().catch(console.error);
"#;

    fn new_style_multiple() -> String {
        let mut text = String::from(
            "const { SynapseManagementClient } = require(\"@azure/arm-synapse\");\n\
             const { DefaultAzureCredential } = require(\"@azure/identity\");\n\
             require(\"dotenv\").config();\n\n",
        );
        let names = ["DefaultMax", "DefaultMin", "Number", "Text"];
        for name in names {
            text.push_str(&format!(
                "/**\n * This sample demonstrates how to Creates or updates a Sql pool data masking rule.\n *\n * @summary Creates or updates a Sql pool data masking rule.\n * x-ms-original-file: specification/synapse/resource-manager/Microsoft.Synapse/stable/2021-06-01/examples/DataMaskingRuleCreateOrUpdate{name}.json\n */\nasync function createOrUpdateDataMaskingRuleFor{name}() {{\n  const parameters = {{\n    columnName: \"test1\",\n  }};\n  const result = await client.dataMaskingRules.createOrUpdate(\n    parameters\n  );\n  console.log(result);\n}}\n\n"
            ));
        }
        text.push_str("async function main() {\n");
        for name in names {
            text.push_str(&format!("  createOrUpdateDataMaskingRuleFor{name}();\n"));
        }
        text.push_str("}\n\nmain().catch(console.error);\n");
        text
    }

    fn release(package: &str) -> Release {
        Release {
            tag: format!("{}_3.0.0", package),
            package: package.to_string(),
            version: "3.0.0".to_string(),
            sdk_subdirectory: "sdk/storage/arm-storage".to_string(),
        }
    }

    #[test]
    fn test_sample_version() {
        assert_eq!(sample_version("3.0.0"), "v3");
        assert_eq!(sample_version("3.0.0-beta.3"), "v3-beta");
    }

    #[test]
    fn test_method_start_includes_doc_comment() {
        let text = r#"const { StorSimpleManagementClient } = require("@azure/arm-storsimple1200series");
const { DefaultAzureCredential } = require("@azure/identity");

/**
 * This sample demonstrates how to Upload Vault Cred Certificate.
Returns UploadCertificateResponse
 *
 * @summary Upload Vault Cred Certificate.
Returns UploadCertificateResponse
 * x-ms-original-file: specification/storSimple1200Series/resource-manager/Microsoft.StorSimple/stable/2016-10-01/examples/ManagersUploadRegistrationCertificate.json
 */
async function managersUploadRegistrationCertificate() {
  const credential = new DefaultAzureCredential();
  console.log(credential);
}

managersUploadRegistrationCertificate().catch(console.error);
"#;
        let aggregate = JsSupport.decompose_file(text).unwrap();
        assert_eq!(aggregate.regions.len(), 1);
        assert_eq!(aggregate.regions[0].start, 3);
        assert_eq!(aggregate.regions[0].end, aggregate.lines.len());
    }

    #[test]
    fn test_old_style_breakdown() {
        let aggregate = JsSupport.decompose_file(OLD_STYLE).unwrap();
        assert_eq!(aggregate.regions.len(), 2);

        let first = aggregate.region_lines(&aggregate.regions[0]);
        assert_eq!(
            first[1].trim(),
            "* This sample demonstrates how to Gets properties of a specified container."
        );
        assert_eq!(
            first[6].trim(),
            "async function getBlobContainersGetWithAllowProtectedAppendWritesAll() {"
        );
        assert_eq!(
            first.last().unwrap().trim(),
            "getBlobContainersGetWithAllowProtectedAppendWritesAll().catch(console.error);"
        );

        let second = aggregate.region_lines(&aggregate.regions[1]);
        assert_eq!(second[6].trim(), "async function getContainers() {");
        assert_eq!(
            second.last().unwrap().trim(),
            "getContainers().catch(console.error);"
        );
    }

    #[test]
    fn test_new_style_multiple() {
        let text = new_style_multiple();
        let aggregate = JsSupport.decompose_file(&text).unwrap();
        assert_eq!(aggregate.regions.len(), 4);
        assert_eq!(
            aggregate.region_lines(&aggregate.regions[0])[6].trim(),
            "async function createOrUpdateDataMaskingRuleForDefaultMax() {"
        );
        assert!(aggregate.skipped.is_empty());
    }

    #[test]
    fn test_new_style_single() {
        let aggregate = JsSupport.decompose_file(NEW_STYLE_SINGLE).unwrap();
        assert_eq!(aggregate.regions.len(), 1);
        let lines = aggregate.region_lines(&aggregate.regions[0]);
        assert_eq!(
            lines[6].trim(),
            "async function listAuditSettingsOfADatabase() {"
        );
        assert_eq!(lines.last().unwrap().trim_end(), "}");

        let units = JsSupport
            .extract_units(
                &release("@azure/arm-synapse"),
                "sqlPoolBlobAuditingPoliciesListBySqlPoolSample.js",
                NEW_STYLE_SINGLE,
            )
            .unwrap();
        assert_eq!(units.len(), 1);
        let content = &units[0].content;
        assert!(!content.contains("dotenv"));
        assert!(!content.contains("async function main()"));
        // Two requires and the blank line, then the method.
        assert_eq!(content.lines().nth(2), Some(""));
        assert_eq!(content.lines().nth(3), Some("/**"));
        assert_eq!(units[0].target_filename, "SqlPoolAuditingSettingsList");
        assert_eq!(
            units[0].target_dir,
            "specification/synapse/resource-manager/Microsoft.Synapse/stable/2021-06-01/examples-js"
        );
    }

    #[test]
    fn test_rlc_folder() {
        let units = JsSupport
            .extract_units(&release("@azure-rest/arm-storage"), "getSample.js", OLD_STYLE)
            .unwrap();
        assert_eq!(units.len(), 2);
        assert!(units[0].target_dir.ends_with("/examples-js-rlc"));
    }

    #[test]
    fn test_preamble_keeps_only_requires() {
        let lines = [
            "// Copyright (c) Microsoft.\n",
            "\n",
            "const a = require(\"a\");\n",
            "require(\"dotenv\").config();\n",
            "\n",
        ];
        assert_eq!(require_lines(&lines), vec!["const a = require(\"a\");\n"]);
    }

    #[test]
    fn test_package_type() {
        assert_eq!(PackageType::of("@azure/arm-storage"), PackageType::Hlc);
        assert_eq!(PackageType::of("@azure-rest/arm-storage"), PackageType::Rlc);
        assert_eq!(PackageType::Rlc.sdk_name("@azure-rest/arm-storage"), "storage");
    }

    #[test]
    fn test_sdk_subdirectory() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("sdk/mysql/arm-mysql-flexible")).unwrap();
        std::fs::create_dir_all(tmp.path().join("sdk/storage/arm-storage-rest")).unwrap();

        let info = |package: &str| ReleaseInfo {
            tag: format!("{}_1.0.0", package),
            package: package.to_string(),
            version: "1.0.0".to_string(),
        };
        assert_eq!(
            JsSupport
                .sdk_subdirectory(&info("@azure/arm-mysql-flexible"), tmp.path())
                .unwrap(),
            "sdk/mysql/arm-mysql-flexible"
        );
        assert_eq!(
            JsSupport
                .sdk_subdirectory(&info("@azure-rest/arm-storage"), tmp.path())
                .unwrap(),
            "sdk/storage/arm-storage-rest"
        );
        assert!(JsSupport
            .sdk_subdirectory(&info("@azure/arm-missing"), tmp.path())
            .is_err());
    }

    #[test]
    fn test_package_json_pins_release() {
        let tmp = TempDir::new().unwrap();
        let manifest = tmp.path().join("package.json");
        std::fs::write(
            &manifest,
            r#"{"dependencies": {"@azure/arm-storage": "latest", "@azure/identity": "^4.0.0"}}"#,
        )
        .unwrap();

        let rendered = package_json(&release("@azure/arm-storage"), Some(&manifest)).unwrap();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["dependencies"]["@azure/arm-storage"], "3.0.0");
        assert_eq!(parsed["dependencies"]["@azure/identity"], "^4.0.0");
    }

    #[test]
    fn test_permalink_escapes_tag() {
        let release = release("@azure/arm-storage");
        assert_eq!(
            JsSupport.compose_permalink(&release),
            "https://github.com/Azure/azure-sdk-for-js/blob/%40azure%2Farm-storage_3.0.0/sdk/storage/arm-storage/README.md"
        );
        assert_eq!(JsSupport.module_name(&release), "@azure/arm-storage@3.0.0");
    }

    #[test]
    fn test_lint_failure_blocks_batch() {
        let tmp = TempDir::new().unwrap();
        let release = release("@azure/arm-storage");
        let units = JsSupport
            .extract_units(&release, "getSample.js", OLD_STYLE)
            .unwrap();
        let location = SampleLocation {
            samples_dir: tmp.path().to_path_buf(),
            manifest: None,
        };

        let passing = ToolchainConfig {
            npm: vec!["true".to_string()],
            npx: vec!["true".to_string()],
            ..ToolchainConfig::default()
        };
        let validated = JsSupport
            .validate_batch(&release, &location, units.clone(), tmp.path(), &passing)
            .unwrap();
        assert_eq!(validated, units);

        let failing = ToolchainConfig {
            npx: vec!["false".to_string()],
            ..passing
        };
        let err = JsSupport
            .validate_batch(&release, &location, units, tmp.path(), &failing)
            .unwrap_err();
        assert_eq!(err.kind(), "ToolchainError");
    }
}
