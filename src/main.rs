//! # specs-examples CLI
//!
//! ## Usage
//!
//! ```bash
//! specs-examples --config ./config/automation.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `extract <input> <output>` | Run the pipeline for one release described by a job JSON |
//! | `index query` | List indexed releases of a language from a local index checkout |
//! | `index add` | Record a job report in a local index checkout |
//! | `publish-index` | Record a job report on the metadata branch through a pull request |
//! | `automation` | Discover new SDK releases and open example pull requests |
//!
//! Logs go to stderr; `RUST_LOG` overrides the level chosen by `--verbose`.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use specs_examples::automation::{self, AutomationOptions};
use specs_examples::config::{self, split_github_repository, Config};
use specs_examples::github::GitHubClient;
use specs_examples::index::{code_files, ReleaseEntry, ReleaseIndex};
use specs_examples::metadata::MetadataSession;
use specs_examples::models::{JobReport, Language};
use specs_examples::pipeline;

/// Extract REST API examples from Azure SDK releases.
#[derive(Parser)]
#[command(name = "specs-examples", version)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/automation.toml")]
    config: PathBuf,

    /// Log at DEBUG instead of INFO.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, validate, and emit the examples of one release.
    ///
    /// Always writes the job report; exits non-zero only when the report
    /// itself cannot be written.
    Extract {
        /// Job JSON (`sdkPath`, `sdkExamplesPath`, `tempPath`, `release`).
        input: PathBuf,
        /// Where to write the job report.
        output: PathBuf,
        /// SDK language; overrides the `language` key of the job JSON.
        #[arg(long)]
        language: Option<Language>,
    },

    /// Read or update a local checkout of the release index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Record a job report on the metadata branch and open a pull request.
    PublishIndex {
        #[command(flatten)]
        release: ReleaseArgs,
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: String,
    },

    /// Process recent SDK releases of every configured SDK.
    Automation {
        /// Build identifier appended to topic branch names.
        #[arg(long)]
        build_id: String,
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: String,
        /// Only process SDKs of this language.
        #[arg(long)]
        language: Option<Language>,
        /// Process releases published within this many days.
        #[arg(long, default_value_t = 3)]
        release_in_days: i64,
        /// Record processed releases in the release index.
        #[arg(long)]
        persist_data: bool,
        /// Skip releases already present in the release index.
        #[arg(long)]
        skip_processed: bool,
        /// Merge open automation pull requests before processing.
        #[arg(long)]
        merge_pull_requests: bool,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Print `tag, package, version, date` of every release of a language.
    Query {
        #[arg(long)]
        index_dir: PathBuf,
        #[arg(long)]
        language: Language,
    },
    /// Apply one job report to the index and rewrite the CSV files.
    Add {
        #[arg(long)]
        index_dir: PathBuf,
        #[command(flatten)]
        release: ReleaseArgs,
    },
}

/// A succeeded job report plus the release it came from.
#[derive(clap::Args)]
struct ReleaseArgs {
    /// Job report written by `extract`.
    #[arg(long)]
    report: PathBuf,
    #[arg(long)]
    language: Language,
    #[arg(long)]
    tag: String,
    #[arg(long)]
    package: String,
    #[arg(long)]
    version: String,
    /// Release date (YYYY-MM-DD); defaults to now.
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl ReleaseArgs {
    /// Index entry and code files of the report.
    fn load(&self) -> Result<(ReleaseEntry, Vec<String>)> {
        let text = std::fs::read_to_string(&self.report)
            .with_context(|| format!("Failed to read job report: {}", self.report.display()))?;
        let report: JobReport = serde_json::from_str(&text)
            .with_context(|| format!("Invalid job report: {}", self.report.display()))?;
        if !report.succeeded() {
            bail!("Job report {} did not succeed", self.report.display());
        }

        let date = match self.date {
            Some(day) => day
                .and_hms_opt(0, 0, 0)
                .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
                .ok_or_else(|| anyhow::anyhow!("Invalid date: {}", day))?,
            None => Utc::now(),
        };
        let entry = ReleaseEntry {
            name: report.name.clone(),
            language: self.language.as_str().to_string(),
            tag: self.tag.clone(),
            package: self.package.clone(),
            version: self.version.clone(),
            date,
        };
        Ok((entry, code_files(&report.files)))
    }
}

fn configure_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_logging(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Extract {
            input,
            output,
            language,
        } => {
            let report = tokio::task::spawn_blocking(move || {
                pipeline::run_extract(&input, &output, language, &cfg)
            })
            .await??;
            info!(status = ?report.status, files = report.files.len(), "extract finished");
        }
        Commands::Index { action } => match action {
            IndexAction::Query {
                index_dir,
                language,
            } => {
                let index = ReleaseIndex::load(&index_dir)?;
                for release in index.query_releases(language.as_str()) {
                    println!(
                        "{}\t{}\t{}\t{}",
                        release.tag, release.package, release.version, release.date
                    );
                }
            }
            IndexAction::Add { index_dir, release } => {
                add_to_index(&index_dir, &release)?;
            }
        },
        Commands::PublishIndex {
            release,
            github_token,
        } => {
            publish_index(&cfg, &release, &github_token).await?;
        }
        Commands::Automation {
            build_id,
            github_token,
            language,
            release_in_days,
            persist_data,
            skip_processed,
            merge_pull_requests,
        } => {
            let options = AutomationOptions {
                build_id,
                language,
                release_in_days,
                persist_data,
                skip_processed,
                merge_pull_requests,
            };
            let report = automation::run(&cfg, &options, &github_token).await?;
            if !report.statuses.is_empty() {
                info!("{}", report.summary());
            }
            if !report.succeeded() {
                for e in &report.errors {
                    error!("{:#}", e);
                }
                bail!("{} error(s) during automation", report.errors.len());
            }
        }
    }

    Ok(())
}

fn add_to_index(index_dir: &Path, release: &ReleaseArgs) -> Result<()> {
    let (entry, files) = release.load()?;
    let mut index = ReleaseIndex::load(index_dir)?;
    if index.new_release(&entry, &files) {
        index.dump(index_dir)?;
        println!("Recorded {} ({} files)", entry.name, files.len());
    } else {
        println!("Already recorded: {}", entry.name);
    }
    Ok(())
}

async fn publish_index(cfg: &Config, release: &ReleaseArgs, token: &str) -> Result<()> {
    let (entry, files) = release.load()?;
    let (owner, name) = split_github_repository(&cfg.examples.repository)?;
    let github = GitHubClient::new(&cfg.github, &owner, &name, token)?;

    let mut session = MetadataSession::checkout(&cfg.examples, &cfg.automation.work_dir)?;
    if !session.record_release(&entry, &files)? {
        println!("Already recorded: {}", entry.name);
        return Ok(());
    }
    match session.publish(token, &github).await? {
        Some(number) => println!("Pull request: {}", number),
        None => println!("Nothing to publish"),
    }
    Ok(())
}
