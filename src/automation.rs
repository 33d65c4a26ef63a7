//! Outer scheduler: find fresh SDK releases, extract their examples, and
//! open pull requests against the publication repository.
//!
//! For every configured SDK the GitHub releases are listed page by page,
//! filtered by tag pattern and publication window, and sorted newest first.
//! Only the newest release of each package is processed. Each release runs
//! the extraction pipeline in its own scratch directory; changes to the
//! publication tree are committed on a topic branch and proposed as a pull
//! request labelled `auto-merge`. With `persist_data` the release index is
//! updated through a [`MetadataSession`] and published once at the end.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::{split_github_repository, Config, ReleaseTagConfig, SdkConfig};
use crate::git::{self, Identity};
use crate::github::{GitHubClient, GitHubRelease, AUTO_MERGE_LABEL};
use crate::index::{code_files, ReleaseEntry};
use crate::metadata::MetadataSession;
use crate::models::{JobInput, JobReport, Language, ReleaseInfo};
use crate::pipeline;

const RELEASES_PER_PAGE: u32 = 100;
const MERGE_PAUSE: Duration = Duration::from_secs(5);

/// Command-line switches of one scheduler run.
#[derive(Debug, Clone)]
pub struct AutomationOptions {
    pub build_id: String,
    pub language: Option<Language>,
    pub release_in_days: i64,
    pub persist_data: bool,
    pub skip_processed: bool,
    pub merge_pull_requests: bool,
}

/// A release selected from the GitHub listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub tag: String,
    pub package: String,
    pub version: String,
    pub date: DateTime<Utc>,
}

/// Per-tag status lines plus every error met during the run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub statuses: Vec<(String, String)>,
    pub errors: Vec<anyhow::Error>,
}

impl RunReport {
    fn record(&mut self, tag: &str, status: impl Into<String>) {
        self.statuses.push((tag.to_string(), status.into()));
    }

    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Statuses:` followed by one `<tag>: <status>` line per release.
    pub fn summary(&self) -> String {
        let mut text = String::from("Statuses:");
        for (tag, status) in &self.statuses {
            text.push_str(&format!("\n{}: {}", tag, status));
        }
        text
    }
}

/// Compiled form of a [`ReleaseTagConfig`].
pub struct TagMatcher {
    tag: Regex,
    package: Regex,
    version: Regex,
}

impl TagMatcher {
    pub fn new(config: &ReleaseTagConfig) -> Result<Self> {
        Ok(Self {
            tag: Regex::new(&config.regex_match)?,
            package: Regex::new(&config.package_regex_group)?,
            version: Regex::new(&config.version_regex_group)?,
        })
    }

    /// `(package, version)` of a matching tag.
    pub fn parse(&self, tag: &str) -> Option<(String, String)> {
        match_at_start(&self.tag, tag)?;
        let package = match_at_start(&self.package, tag)?.get(1)?.as_str().to_string();
        let version = match_at_start(&self.version, tag)?.get(1)?.as_str().to_string();
        Some((package, version))
    }
}

/// A match anchored at the beginning of `text` (but not at its end).
fn match_at_start<'t>(regex: &Regex, text: &'t str) -> Option<Captures<'t>> {
    regex
        .captures(text)
        .filter(|captures| captures.get(0).is_some_and(|m| m.start() == 0))
}

/// Non-draft releases published strictly inside `(start, end)` whose tag
/// matches, newest first.
pub fn select_candidates(
    releases: &[GitHubRelease],
    matcher: &TagMatcher,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = releases
        .iter()
        .filter(|release| !release.draft)
        .filter_map(|release| {
            let date = release.published_at?;
            if date <= start || date >= end {
                return None;
            }
            let (package, version) = matcher.parse(&release.tag_name)?;
            info!("Found release tag: {}", release.tag_name);
            Some(Candidate {
                tag: release.tag_name.clone(),
                package,
                version,
                date,
            })
        })
        .collect();
    candidates.sort_by(|a, b| b.date.cmp(&a.date));
    candidates
}

/// What the scheduler does with one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Process,
    SkipProcessedTag,
    SkipProcessedPackage,
    SkipIgnoredPackage,
}

/// Decide every candidate in order. A package is processed at most once,
/// and an already indexed tag also marks its package as done.
pub fn plan(
    candidates: &[Candidate],
    processed_tags: &HashSet<String>,
    ignored: &GlobSet,
) -> Vec<Decision> {
    let mut processed_packages = HashSet::new();
    candidates
        .iter()
        .map(|candidate| {
            if processed_tags.contains(&candidate.tag) {
                processed_packages.insert(candidate.package.clone());
                Decision::SkipProcessedTag
            } else if processed_packages.contains(&candidate.package) {
                Decision::SkipProcessedPackage
            } else if ignored.is_match(&candidate.package) {
                Decision::SkipIgnoredPackage
            } else {
                processed_packages.insert(candidate.package.clone());
                Decision::Process
            }
        })
        .collect()
}

/// Glob set of `ignored_packages`; plain package names match themselves.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid pattern {}", pattern))?);
    }
    Ok(builder.build()?)
}

/// Title of the pull request proposing examples of one release.
pub fn examples_pull_request_title(sdk: &str, tag: &str) -> String {
    format!("[Automation] Collect examples from {}#{}", sdk, tag)
}

/// Topic branch proposing examples of one release.
pub fn examples_branch(sdk: &str, tag: &str, build_id: &str) -> String {
    git::sanitize_branch_name(&format!("automation-examples_{}_{}_{}", sdk, tag, build_id))
}

/// Shared state of one scheduler run.
struct Run<'a> {
    config: &'a Config,
    options: &'a AutomationOptions,
    token: &'a str,
    deadline: Instant,
    examples: GitHubClient,
    specs_path: PathBuf,
    metadata: Option<MetadataSession>,
    report: RunReport,
}

impl Run<'_> {
    fn timed_out(&self) -> bool {
        Instant::now() > self.deadline
    }
}

/// Run the scheduler. Per-release failures are collected in the report.
pub async fn run(config: &Config, options: &AutomationOptions, token: &str) -> Result<RunReport> {
    let deadline = Instant::now() + Duration::from_secs(config.automation.timeout_minutes * 60);
    let (owner, name) = split_github_repository(&config.examples.repository)?;
    let examples = GitHubClient::new(&config.github, &owner, &name, token)?;

    if options.merge_pull_requests {
        merge_pull_requests(&examples).await?;
    }

    let work_dir = &config.automation.work_dir;
    std::fs::create_dir_all(work_dir)
        .with_context(|| format!("Failed to create {}", work_dir.display()))?;

    let specs_path = work_dir.join("spec");
    if specs_path.exists() {
        std::fs::remove_dir_all(&specs_path)
            .with_context(|| format!("Failed to remove {}", specs_path.display()))?;
    }
    info!("Checking out repository: {}", config.examples.specs_repository);
    git::clone_shallow(&config.examples.specs_repository, None, &specs_path)?;

    let metadata = if options.persist_data || options.skip_processed {
        Some(MetadataSession::checkout(&config.examples, work_dir)?)
    } else {
        None
    };

    let mut run = Run {
        config,
        options,
        token,
        deadline,
        examples,
        specs_path,
        metadata,
        report: RunReport::default(),
    };

    for sdk in &config.sdks {
        if options.language.is_some_and(|language| language != sdk.language) {
            continue;
        }
        if let Err(e) = process_sdk(&mut run, sdk).await {
            error!(sdk = %sdk.name, "Error: {:#}", e);
            run.report.errors.push(e);
        }
    }

    if options.persist_data {
        if let Some(session) = &run.metadata {
            match session.publish(token, &run.examples).await {
                Ok(Some(number)) => info!(number, "Metadata pull request created"),
                Ok(None) => {}
                Err(e) => {
                    error!("Error: {}", e);
                    run.report.errors.push(e.into());
                }
            }
        }
    }

    Ok(run.report)
}

async fn merge_pull_requests(examples: &GitHubClient) -> Result<()> {
    info!("Merge pull requests");
    for pull_request in examples.list_pull_requests().await? {
        if pull_request.title.starts_with("[Automation]") && pull_request.has_label(AUTO_MERGE_LABEL)
        {
            examples.merge_pull_request(pull_request.number).await?;
            tokio::time::sleep(MERGE_PAUSE).await;
        }
    }
    Ok(())
}

async fn list_candidates(run: &mut Run<'_>, sdk: &SdkConfig) -> Result<Vec<Candidate>> {
    let (owner, name) = sdk.repository_owner_and_name()?;
    let client = GitHubClient::new(&run.config.github, &owner, &name, run.token)?;
    let matcher = TagMatcher::new(&sdk.release_tag)?;
    let end = Utc::now();
    let start = end - ChronoDuration::days(run.options.release_in_days);

    let mut count = 0;
    let mut candidates = Vec::new();
    for page in 1.. {
        match client.list_releases(RELEASES_PER_PAGE, page).await {
            Ok(releases) if releases.is_empty() => break,
            Ok(releases) => {
                count += releases.len();
                candidates.extend(select_candidates(&releases, &matcher, start, end));
            }
            Err(e) => {
                error!(sdk = %sdk.name, "Error listing releases: {:#}", e);
                run.report.errors.push(e);
                break;
            }
        }
    }
    info!("Count of all releases: {}", count);

    candidates.sort_by(|a, b| b.date.cmp(&a.date));
    for candidate in &candidates {
        info!(
            "Candidate release tag: {}, on {}",
            candidate.tag,
            candidate.date.date_naive()
        );
    }
    Ok(candidates)
}

async fn process_sdk(run: &mut Run<'_>, sdk: &SdkConfig) -> Result<()> {
    if run.timed_out() {
        warn!("Timeout, skip sdk: {}", sdk.name);
        return Ok(());
    }
    info!("Processing sdk: {}", sdk.name);

    let candidates = list_candidates(run, sdk).await?;

    let mut processed_tags = HashSet::new();
    if run.options.skip_processed {
        if let Some(session) = &run.metadata {
            processed_tags.extend(
                session
                    .query_releases(sdk.language.as_str())?
                    .into_iter()
                    .map(|release| release.tag),
            );
        }
    }
    let ignored = build_globset(&sdk.ignored_packages)?;

    for (candidate, decision) in candidates.iter().zip(plan(&candidates, &processed_tags, &ignored)) {
        if run.timed_out() {
            warn!("Timeout, skip remaining packages");
            break;
        }
        match decision {
            Decision::SkipProcessedTag => info!("Skip processed tag: {}", candidate.tag),
            Decision::SkipProcessedPackage => info!("Skip processed package: {}", candidate.tag),
            Decision::SkipIgnoredPackage => info!("Skip ignored package: {}", candidate.tag),
            Decision::Process => match process_release(run, sdk, candidate).await {
                Ok(status) => run.report.record(&candidate.tag, status),
                Err(failure) => {
                    error!(tag = %candidate.tag, "Error: {:#}", failure.error);
                    run.report.record(&candidate.tag, failure.status);
                    run.report.errors.push(failure.error);
                }
            },
        }
    }
    Ok(())
}

/// A release that stopped before completion, with its report status.
struct ReleaseFailure {
    status: &'static str,
    error: anyhow::Error,
}

fn failed<E: Into<anyhow::Error>>(status: &'static str) -> impl FnOnce(E) -> ReleaseFailure {
    move |error| ReleaseFailure {
        status,
        error: error.into(),
    }
}

async fn process_release(
    run: &mut Run<'_>,
    sdk: &SdkConfig,
    candidate: &Candidate,
) -> std::result::Result<String, ReleaseFailure> {
    const GIT_FAILED: &str = "failed to invoke git";
    info!("Processing release: {}", candidate.tag);

    let scratch = tempfile::Builder::new()
        .prefix("tmp")
        .keep(run.config.automation.keep_temp)
        .tempdir_in(&run.config.automation.work_dir)
        .map_err(failed(GIT_FAILED))?;
    let tmp_path = scratch.path().to_path_buf();
    info!("Work directory: {}", tmp_path.display());

    let example_repo = tmp_path.join("example");
    let sdk_repo = tmp_path.join("sdk");
    info!("Checking out repository: {}", run.config.examples.repository);
    git::clone_shallow(&run.config.examples.repository, None, &example_repo)
        .map_err(failed(GIT_FAILED))?;
    info!("Checking out repository: {}", sdk.repository);
    git::clone_shallow(&sdk.repository, Some(&candidate.tag), &sdk_repo)
        .map_err(failed(GIT_FAILED))?;

    let input = JobInput {
        sdk_path: sdk_repo,
        sdk_examples_path: example_repo.clone(),
        temp_path: tmp_path.clone(),
        release: ReleaseInfo {
            tag: candidate.tag.clone(),
            package: candidate.package.clone(),
            version: candidate.version.clone(),
        },
        specs_path: Some(run.specs_path.clone()),
        language: Some(sdk.language),
    };
    let report = run_worker(run.config, input, &tmp_path)
        .await
        .map_err(failed("failed at worker"))?;
    if !report.succeeded() {
        return Err(ReleaseFailure {
            status: "failed at worker",
            error: anyhow::anyhow!("Worker failed for release tag: {}", candidate.tag),
        });
    }

    let status = git::status_porcelain(&example_repo).map_err(failed(GIT_FAILED))?;
    if status.is_empty() {
        info!("No change to repository: {}", example_repo.display());
        return Ok("succeeded, no change".to_string());
    }
    info!("git status:\n{}", status);

    git::add_all(&example_repo).map_err(failed(GIT_FAILED))?;
    let changed = git::changed_files(&git::status_porcelain(&example_repo).map_err(failed(GIT_FAILED))?);

    let branch = examples_branch(&sdk.name, &candidate.tag, &run.options.build_id);
    git::checkout_new_branch(&example_repo, &branch).map_err(failed(GIT_FAILED))?;
    let title = examples_pull_request_title(&sdk.name, &candidate.tag);
    info!("git commit: {}", title);
    let identity = Identity {
        name: run.config.examples.git_user_name.clone(),
        email: run.config.examples.git_user_email.clone(),
    };
    git::commit(&example_repo, &identity, &title).map_err(failed(GIT_FAILED))?;
    git::push(&example_repo, &run.config.examples.repository, run.token, &branch)
        .map_err(failed(GIT_FAILED))?;

    let head = format!("{}:{}", run.examples.owner(), branch);
    let number = run
        .examples
        .create_pull_request(&title, &head, &run.config.examples.base_branch)
        .await
        .map_err(failed("failed to create pull request"))?;
    run.examples
        .add_labels(number, &[AUTO_MERGE_LABEL])
        .await
        .map_err(failed("failed to create pull request"))?;

    if run.options.persist_data {
        record_release(run, sdk, candidate, &report).map_err(failed("failed to update database"))?;
    }

    Ok(format!(
        "succeeded, {} files changed, pull number {}",
        changed.len(),
        number
    ))
}

/// Run the pipeline on a blocking thread; the job files are kept next to
/// the checkouts for inspection.
async fn run_worker(config: &Config, input: JobInput, tmp_path: &Path) -> Result<JobReport> {
    let input_path = tmp_path.join("input.json");
    let output_path = tmp_path.join("output.json");
    let json = serde_json::to_string_pretty(&input)?;
    info!("Input JSON for worker: {}", json);
    std::fs::write(&input_path, json)?;

    let config = config.clone();
    let started = Instant::now();
    let report = tokio::task::spawn_blocking(move || {
        pipeline::run_extract(&input_path, &output_path, None, &config)
    })
    .await??;
    info!("Worker ran: {:?}", started.elapsed());
    info!(
        status = ?report.status,
        name = %report.name,
        files = report.files.len(),
        "Output JSON from worker"
    );
    Ok(report)
}

fn record_release(
    run: &mut Run<'_>,
    sdk: &SdkConfig,
    candidate: &Candidate,
    report: &JobReport,
) -> Result<()> {
    let files = code_files(&report.files);
    if files.is_empty() {
        return Ok(());
    }
    let Some(session) = run.metadata.as_mut() else {
        return Ok(());
    };
    let entry = ReleaseEntry {
        name: report.name.clone(),
        language: sdk.language.as_str().to_string(),
        tag: candidate.tag.clone(),
        package: candidate.package.clone(),
        version: candidate.version.clone(),
        date: candidate.date,
    };
    session.record_release(&entry, &files)?;
    Ok(())
}
