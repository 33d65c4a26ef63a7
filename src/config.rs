//! TOML configuration parsing.
//!
//! Every section has defaults so the extractor runs without a config file;
//! the outer scheduler needs at least one `[[sdks]]` entry to do anything.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::Language;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub examples: ExamplesConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub sdks: Vec<SdkConfig>,
}

/// The publication repository (`azure-rest-api-specs-examples`).
#[derive(Debug, Deserialize, Clone)]
pub struct ExamplesConfig {
    #[serde(default = "default_examples_repository")]
    pub repository: String,
    /// REST API specs repository, cloned once per run to check that
    /// referenced spec examples still exist.
    #[serde(default = "default_specs_repository")]
    pub specs_repository: String,
    #[serde(default = "default_metadata_branch")]
    pub metadata_branch: String,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    #[serde(default = "default_git_user_name")]
    pub git_user_name: String,
    #[serde(default = "default_git_user_email")]
    pub git_user_email: String,
}

impl Default for ExamplesConfig {
    fn default() -> Self {
        Self {
            repository: default_examples_repository(),
            specs_repository: default_specs_repository(),
            metadata_branch: default_metadata_branch(),
            base_branch: default_base_branch(),
            git_user_name: default_git_user_name(),
            git_user_email: default_git_user_email(),
        }
    }
}

fn default_examples_repository() -> String {
    "https://github.com/Azure/azure-rest-api-specs-examples".to_string()
}
fn default_specs_repository() -> String {
    "https://github.com/Azure/azure-rest-api-specs".to_string()
}
fn default_metadata_branch() -> String {
    "metadata".to_string()
}
fn default_base_branch() -> String {
    "main".to_string()
}
fn default_git_user_name() -> String {
    "azure-sdk".to_string()
}
fn default_git_user_email() -> String {
    "azuresdk@microsoft.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

/// Commands used to validate examples. Each entry is a program followed by
/// leading arguments; the validator appends its own arguments.
#[derive(Debug, Deserialize, Clone)]
pub struct ToolchainConfig {
    #[serde(default = "default_maven")]
    pub maven: Vec<String>,
    #[serde(default = "default_java_formatter")]
    pub java_formatter: Vec<String>,
    #[serde(default = "default_go")]
    pub go: Vec<String>,
    #[serde(default = "default_goimports")]
    pub goimports: Vec<String>,
    #[serde(default = "default_npm")]
    pub npm: Vec<String>,
    #[serde(default = "default_npx")]
    pub npx: Vec<String>,
    #[serde(default = "default_dotnet")]
    pub dotnet: Vec<String>,
    #[serde(default = "default_python")]
    pub python: Vec<String>,
    #[serde(default = "default_true")]
    pub python_syntax_check: bool,
    #[serde(default = "default_dotnet_target_framework")]
    pub dotnet_target_framework: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            maven: default_maven(),
            java_formatter: default_java_formatter(),
            go: default_go(),
            goimports: default_goimports(),
            npm: default_npm(),
            npx: default_npx(),
            dotnet: default_dotnet(),
            python: default_python(),
            python_syntax_check: true,
            dotnet_target_framework: default_dotnet_target_framework(),
        }
    }
}

fn default_maven() -> Vec<String> {
    vec!["mvn".to_string(), "--batch-mode".to_string()]
}
fn default_java_formatter() -> Vec<String> {
    vec!["google-java-format".to_string(), "--replace".to_string()]
}
fn default_go() -> Vec<String> {
    vec!["go".to_string()]
}
fn default_goimports() -> Vec<String> {
    vec!["goimports".to_string()]
}
fn default_npm() -> Vec<String> {
    vec!["npm".to_string()]
}
fn default_npx() -> Vec<String> {
    vec!["npx".to_string()]
}
fn default_dotnet() -> Vec<String> {
    vec!["dotnet".to_string()]
}
fn default_python() -> Vec<String> {
    vec!["python3".to_string()]
}
fn default_true() -> bool {
    true
}
fn default_dotnet_target_framework() -> String {
    "net8.0".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AutomationConfig {
    /// Stop scheduling new releases after this many minutes.
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u64,
    /// Keep per-release scratch directories for debugging.
    #[serde(default)]
    pub keep_temp: bool,
    /// Root of the specs clone, the metadata checkout, and per-release scratch dirs.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: default_timeout_minutes(),
            keep_temp: false,
            work_dir: default_work_dir(),
        }
    }
}

fn default_timeout_minutes() -> u64 {
    45
}
fn default_work_dir() -> PathBuf {
    PathBuf::from("tmp")
}

/// One SDK repository watched by the outer scheduler.
#[derive(Debug, Deserialize, Clone)]
pub struct SdkConfig {
    pub name: String,
    pub language: Language,
    pub repository: String,
    pub release_tag: ReleaseTagConfig,
    #[serde(default)]
    pub ignored_packages: Vec<String>,
}

/// How to recognise a release tag and pull package and version out of it.
#[derive(Debug, Deserialize, Clone)]
pub struct ReleaseTagConfig {
    pub regex_match: String,
    pub package_regex_group: String,
    pub version_regex_group: String,
}

impl SdkConfig {
    /// `(owner, name)` of the SDK GitHub repository.
    pub fn repository_owner_and_name(&self) -> Result<(String, String)> {
        split_github_repository(&self.repository)
    }
}

/// Split `https://github.com/<owner>/<name>` into its two components.
pub fn split_github_repository(url: &str) -> Result<(String, String)> {
    let trimmed = url.trim_end_matches('/').trim_end_matches(".git");
    let rest = trimmed
        .strip_prefix("https://github.com/")
        .ok_or_else(|| anyhow::anyhow!("Not a GitHub repository URL: {}", url))?;
    match rest.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner.to_string(), name.to_string()))
        }
        _ => anyhow::bail!("Not a GitHub repository URL: {}", url),
    }
}

/// Load configuration. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.github.max_retries > 10 {
        anyhow::bail!("github.max_retries must be <= 10");
    }

    split_github_repository(&config.examples.repository)
        .with_context(|| "examples.repository must be a GitHub repository URL")?;

    let commands = [
        ("maven", &config.toolchain.maven),
        ("java_formatter", &config.toolchain.java_formatter),
        ("go", &config.toolchain.go),
        ("goimports", &config.toolchain.goimports),
        ("npm", &config.toolchain.npm),
        ("npx", &config.toolchain.npx),
        ("dotnet", &config.toolchain.dotnet),
        ("python", &config.toolchain.python),
    ];
    for (name, command) in commands {
        if command.is_empty() {
            anyhow::bail!("toolchain.{} must name a program", name);
        }
    }

    for sdk in &config.sdks {
        let tag = &sdk.release_tag;
        for (field, pattern) in [
            ("regex_match", &tag.regex_match),
            ("package_regex_group", &tag.package_regex_group),
            ("version_regex_group", &tag.version_regex_group),
        ] {
            if pattern.is_empty() {
                anyhow::bail!("sdks.{}.release_tag.{} must not be empty", sdk.name, field);
            }
            regex::Regex::new(pattern).with_context(|| {
                format!("sdks.{}.release_tag.{} is not a valid regex", sdk.name, field)
            })?;
        }
        sdk.repository_owner_and_name()
            .with_context(|| format!("sdks.{}.repository", sdk.name))?;
    }

    Ok(())
}
