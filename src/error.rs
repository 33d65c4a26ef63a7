//! Error kinds raised by the extraction pipeline and the release index.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// Bad job JSON: missing keys, unknown language, empty release fields.
    #[error("Invalid job input: {0}")]
    Input(String),

    /// The SDK source tree does not match the expected conventions.
    #[error("Unexpected SDK layout: {0}")]
    Layout(String),

    /// An aggregated sample could not be decomposed.
    #[error("Failed to parse '{file}': {details}")]
    Parse { file: String, details: String },

    /// A compiler, linter, or formatter exited non-zero.
    #[error("Toolchain command '{command}' failed with {status}:\n{diagnostics}")]
    Toolchain {
        command: String,
        status: String,
        diagnostics: String,
    },

    /// Writing to the publication tree failed.
    #[error("Failed to write '{}': {source}", path.display())]
    Emit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Clone, push, or pull request failed for the release index.
    #[error("Release index operation '{operation}' failed: {details}")]
    Index { operation: String, details: String },

    /// A git subprocess failed.
    #[error("git {operation} failed: {details}")]
    Git { operation: String, details: String },

    /// IO error outside the publication tree.
    #[error("IO error during '{operation}': {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn input(details: impl Into<String>) -> Self {
        Self::Input(details.into())
    }

    pub fn layout(details: impl Into<String>) -> Self {
        Self::Layout(details.into())
    }

    pub fn parse(file: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            details: details.into(),
        }
    }

    pub fn index(operation: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Index {
            operation: operation.into(),
            details: details.into(),
        }
    }

    pub fn git(operation: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Git {
            operation: operation.into(),
            details: details.into(),
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Short label used in logs and run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "InputError",
            Self::Layout(_) => "LayoutError",
            Self::Parse { .. } => "ParseError",
            Self::Toolchain { .. } => "ToolchainError",
            Self::Emit { .. } => "EmitError",
            Self::Index { .. } => "IndexError",
            Self::Git { .. } => "GitError",
            Self::Io { .. } => "IoError",
        }
    }
}
