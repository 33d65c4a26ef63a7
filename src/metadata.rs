//! Propagation of the release index through pull requests.
//!
//! A [`MetadataSession`] clones the metadata branch of the publication
//! repository once per run. Each recorded release reloads the CSVs from the
//! checkout, applies [`ReleaseIndex::new_release`], and commits the result on
//! a dated topic branch. [`MetadataSession::publish`] pushes that branch and
//! opens a single pull request labelled `auto-merge`. Nothing is ever pushed
//! to the metadata branch directly.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ExamplesConfig;
use crate::error::{PipelineError, Result};
use crate::git::{self, Identity};
use crate::github::{GitHubClient, AUTO_MERGE_LABEL};
use crate::index::{IndexedRelease, ReleaseEntry, ReleaseIndex};
use crate::toolchain::ScratchProject;

/// Topic branch used for every index commit staged on `date`.
pub fn topic_branch(date: DateTime<Utc>) -> String {
    format!("automation-metadata-{}", date.format("%Y-%m-%d"))
}

/// A checkout of the metadata branch with the commits staged so far.
pub struct MetadataSession {
    scratch: ScratchProject,
    repository: String,
    metadata_branch: String,
    identity: Identity,
    branch: Option<String>,
    commits: usize,
}

impl MetadataSession {
    /// Clone the metadata branch (depth 1) into a scratch directory under `temp_root`.
    pub fn checkout(config: &ExamplesConfig, temp_root: &Path) -> Result<Self> {
        let scratch = ScratchProject::create(temp_root, "metadata")?;
        let repo = scratch.path().join("index");
        info!(
            "Checking out repository: {} (branch {})",
            config.repository, config.metadata_branch
        );
        git::clone_shallow(&config.repository, Some(&config.metadata_branch), &repo)
            .map_err(|e| PipelineError::index("clone", e.to_string()))?;

        Ok(Self {
            scratch,
            repository: config.repository.clone(),
            metadata_branch: config.metadata_branch.clone(),
            identity: Identity {
                name: config.git_user_name.clone(),
                email: config.git_user_email.clone(),
            },
            branch: None,
            commits: 0,
        })
    }

    /// Root of the working copy holding the two CSV files.
    pub fn repo_path(&self) -> PathBuf {
        self.scratch.path().join("index")
    }

    /// Releases already recorded for `language`.
    pub fn query_releases(&self, language: &str) -> Result<Vec<IndexedRelease>> {
        Ok(ReleaseIndex::load(&self.repo_path())?.query_releases(language))
    }

    /// Record one release and commit the rewritten CSVs.
    ///
    /// Returns `false`, without committing, when the release is already indexed.
    pub fn record_release(&mut self, entry: &ReleaseEntry, files: &[String]) -> Result<bool> {
        let repo = self.repo_path();
        let mut index = ReleaseIndex::load(&repo)?;
        if !index.new_release(entry, files) {
            info!(name = %entry.name, language = %entry.language, "release already indexed");
            return Ok(false);
        }
        index.dump(&repo)?;

        let git_error = |operation: &str| {
            let operation = operation.to_string();
            move |e: PipelineError| PipelineError::index(operation, e.to_string())
        };

        if self.branch.is_none() {
            let branch = topic_branch(Utc::now());
            git::checkout_new_branch(&repo, &branch).map_err(git_error("checkout"))?;
            self.branch = Some(branch);
        }
        git::add_all(&repo).map_err(git_error("add"))?;
        let message = format!("[Automation] Update metadata for {}", entry.name);
        git::commit(&repo, &self.identity, &message).map_err(git_error("commit"))?;
        self.commits += 1;
        info!(name = %entry.name, files = files.len(), "release indexed");
        Ok(true)
    }

    /// Number of commits staged on the topic branch.
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Push the topic branch and open the pull request.
    ///
    /// Returns the pull request number, or `None` when nothing was staged.
    pub async fn publish(&self, token: &str, github: &GitHubClient) -> Result<Option<u64>> {
        let Some(branch) = &self.branch else {
            info!("No metadata change to publish");
            return Ok(None);
        };

        git::push(&self.repo_path(), &self.repository, token, branch)
            .map_err(|e| PipelineError::index("push", e.to_string()))?;

        let title = format!("[Automation] Update metadata ({} release(s))", self.commits);
        let head = format!("{}:{}", github.owner(), branch);
        let number = github
            .create_pull_request(&title, &head, &self.metadata_branch)
            .await
            .map_err(|e| PipelineError::index("pull request", e.to_string()))?;
        github
            .add_labels(number, &[AUTO_MERGE_LABEL])
            .await
            .map_err(|e| PipelineError::index("label", e.to_string()))?;
        Ok(Some(number))
    }
}
