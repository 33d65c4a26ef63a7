//! Thin wrappers over the `git` command line.
//!
//! Every call runs with an explicit working directory and captured output.
//! Push URLs carry the access token, so they are redacted from logs and from
//! error details.

use std::path::Path;
use std::process::Command;
use tracing::info;

use crate::error::{PipelineError, Result};

/// Committer identity passed with `-c user.name=... -c user.email=...`.
#[derive(Debug, Clone)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

fn run_git(cwd: &Path, args: &[&str], secret: Option<&str>) -> Result<String> {
    let redact = |text: &str| match secret {
        Some(secret) if !secret.is_empty() => text.replace(secret, "***"),
        _ => text.to_string(),
    };
    let command_line = redact(&format!("git {}", args.join(" ")));
    info!("Command line: {}", command_line);

    let operation = args.first().copied().unwrap_or("git");
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| {
            PipelineError::git(operation, format!("failed to execute '{}': {}", command_line, e))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::git(
            operation,
            format!("'{}' exited with {}: {}", command_line, output.status, redact(stderr.trim())),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Shallow-clone `url` into `dest`, optionally at a branch or tag.
pub fn clone_shallow(url: &str, branch: Option<&str>, dest: &Path) -> Result<()> {
    let parent = dest.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| PipelineError::io("create clone parent", e))?;
    // Runs inside `parent`, so only the last component names the target.
    let dest = dest
        .file_name()
        .map(|name| name.to_string_lossy())
        .ok_or_else(|| PipelineError::git("clone", format!("invalid destination {}", dest.display())))?;

    let mut args = vec!["clone", "-c", "advice.detachedHead=false", "--quiet", "--depth", "1"];
    if let Some(branch) = branch {
        args.extend(["--branch", branch]);
    }
    args.extend([url, &*dest]);
    run_git(parent, &args, None)?;
    Ok(())
}

/// Output of `git status --porcelain`; empty when the tree is clean.
pub fn status_porcelain(repo: &Path) -> Result<String> {
    run_git(repo, &["status", "--porcelain"], None)
}

pub fn add_all(repo: &Path) -> Result<()> {
    run_git(repo, &["add", "--all"], None).map(|_| ())
}

pub fn checkout_new_branch(repo: &Path, branch: &str) -> Result<()> {
    run_git(repo, &["checkout", "-b", branch], None).map(|_| ())
}

pub fn commit(repo: &Path, identity: &Identity, message: &str) -> Result<()> {
    let name = format!("user.name={}", identity.name);
    let email = format!("user.email={}", identity.email);
    run_git(
        repo,
        &["-c", &name, "-c", &email, "commit", "--quiet", "-m", message],
        None,
    )
    .map(|_| ())
}

/// Push `branch` without force, authenticating with `token`.
pub fn push(repo: &Path, repository_url: &str, token: &str, branch: &str) -> Result<()> {
    let remote = authenticated_remote(repository_url, token);
    run_git(repo, &["push", &remote, branch], Some(token)).map(|_| ())
}

/// `https://<token>@host/...` for an `https://host/...` repository URL.
pub fn authenticated_remote(repository_url: &str, token: &str) -> String {
    match repository_url.strip_prefix("https://") {
        Some(rest) if !token.is_empty() => format!("https://{}@{}", token, rest),
        _ => repository_url.to_string(),
    }
}

/// Paths listed by `git status --porcelain` (rename targets for renames).
pub fn changed_files(porcelain: &str) -> Vec<String> {
    porcelain
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let path = &line[3..];
            let path = path.rsplit_once(" -> ").map_or(path, |(_, to)| to);
            path.trim_matches('"').to_string()
        })
        .collect()
}

/// Branch-safe rendering of free text: anything outside
/// `[A-Za-z0-9._/-]` becomes `-`.
pub fn sanitize_branch_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/') {
                c
            } else {
                '-'
            }
        })
        .collect()
}
