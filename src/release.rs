//! Release descriptor: the immutable identity of one SDK package version.

use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::language::LanguageSupport;
use crate::models::ReleaseInfo;

/// One publishable SDK package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag: String,
    pub package: String,
    pub version: String,
    /// Language-specific location of the package inside the SDK repository:
    /// the service folder for Java, the module path for Go, and the
    /// `sdk/<service>/<package>` folder for JS, .NET, and Python.
    pub sdk_subdirectory: String,
}

impl Release {
    /// Validate the release triple and derive the SDK subdirectory.
    pub fn from_input(
        info: &ReleaseInfo,
        language: &dyn LanguageSupport,
        sdk_root: &Path,
    ) -> Result<Self> {
        for (field, value) in [
            ("release.tag", &info.tag),
            ("release.package", &info.package),
            ("release.version", &info.version),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::input(format!("{} must not be empty", field)));
            }
        }

        let sdk_subdirectory = language.sdk_subdirectory(info, sdk_root)?;

        Ok(Self {
            tag: info.tag.trim().to_string(),
            package: info.package.trim().to_string(),
            version: info.version.trim().to_string(),
            sdk_subdirectory,
        })
    }

    /// The tag escaped for use as a URL path segment.
    pub fn escaped_tag(&self) -> String {
        urlencoding::encode(&self.tag).into_owned()
    }
}

/// Locate the unique `sdk/<service>/<folder>` directory in an SDK checkout.
///
/// Returns the slash-separated path relative to `sdk_root`. Zero or several
/// matches are a [`PipelineError::Layout`].
pub fn find_unique_module_dir(sdk_root: &Path, folder: &str) -> Result<String> {
    let sdk_dir = sdk_root.join("sdk");
    let entries = std::fs::read_dir(&sdk_dir).map_err(|e| {
        PipelineError::layout(format!(
            "cannot list SDK folder {}: {}",
            sdk_dir.display(),
            e
        ))
    })?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io("list SDK folder", e))?;
        if entry.path().join(folder).is_dir() {
            candidates.push(format!(
                "sdk/{}/{}",
                entry.file_name().to_string_lossy(),
                folder
            ));
        }
    }
    candidates.sort();

    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        0 => Err(PipelineError::layout(format!(
            "no folder sdk/*/{} in {}",
            folder,
            sdk_root.display()
        ))),
        _ => Err(PipelineError::layout(format!(
            "several folders match sdk/*/{}: {}",
            folder,
            candidates.join(", ")
        ))),
    }
}
