//! Core data models used throughout the extraction pipeline.
//!
//! These types represent the job input, the extracted examples, and the job
//! report that flow between the orchestrator and the outer scheduler.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Target SDK language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    Go,
    Js,
    Dotnet,
    Python,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Java,
        Language::Go,
        Language::Js,
        Language::Dotnet,
        Language::Python,
    ];

    /// Identifier stored in the release index and used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::Go => "go",
            Language::Js => "js",
            Language::Dotnet => "dotnet",
            Language::Python => "python",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "java" => Ok(Language::Java),
            "go" => Ok(Language::Go),
            "js" | "javascript" => Ok(Language::Js),
            "dotnet" | "net" | "csharp" => Ok(Language::Dotnet),
            "python" => Ok(Language::Python),
            other => Err(format!(
                "Unknown language: '{}'. Must be java, go, js, dotnet, or python.",
                other
            )),
        }
    }
}

/// The release triple as it appears in the job JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub tag: String,
    pub package: String,
    pub version: String,
}

/// Job input consumed by the orchestrator (`input.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInput {
    pub sdk_path: PathBuf,
    pub sdk_examples_path: PathBuf,
    pub temp_path: PathBuf,
    pub release: ReleaseInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

/// Final status of one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Succeeded,
    Failed,
}

/// Job report written by the orchestrator (`output.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub status: JobStatus,
    pub name: String,
    pub files: Vec<String>,
}

impl JobReport {
    pub fn failed(name: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            name: name.into(),
            files: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Succeeded
    }
}

/// One example extracted from an aggregated sample file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleUnit {
    /// Relative path of the REST API spec example the method was generated from.
    pub original_file: String,
    /// Slash-separated publication directory (`.../examples-<lang>`).
    pub target_dir: String,
    /// Output file name without extension.
    pub target_filename: String,
    /// Complete standalone source text.
    pub content: String,
}

impl ExampleUnit {
    /// Relative path of the code file inside the publication tree.
    pub fn code_path(&self, extension: &str) -> String {
        format!("{}/{}.{}", self.target_dir, self.target_filename, extension)
    }

    /// Relative path of the sidecar metadata file.
    pub fn metadata_path(&self) -> String {
        format!("{}/{}.json", self.target_dir, self.target_filename)
    }
}
