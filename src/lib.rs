//! # specs-examples
//!
//! Extracts per-operation REST API examples from published Azure SDK
//! releases and publishes them to the `azure-rest-api-specs-examples`
//! repository, keeping a CSV index of which release produced which file.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐
//! │ Release  │──▶│ Discover +   │──▶│ Normalize │──▶│ Validate  │──▶│   Emit   │
//! │ (tag)    │   │ Decompose    │   │ per unit  │   │ toolchain │   │ .ext+json│
//! └──────────┘   └──────────────┘   └───────────┘   └───────────┘   └────┬─────┘
//!                                                                        │
//!                                       ┌────────────────────────────────┘
//!                                       ▼
//!                                ┌──────────────┐
//!                                │ Release index│  (metadata branch, via PR)
//!                                └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! specs-examples extract input.json output.json --language go
//! specs-examples index query --index-dir ./metadata --language java
//! specs-examples automation --build-id 20230405.1 --persist-data --skip-processed
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Job input, job report, example units |
//! | [`error`] | Pipeline error kinds |
//! | [`release`] | Release descriptor |
//! | [`decompose`] | Aggregated-sample state machine |
//! | [`normalize`] | Target directory and file naming |
//! | [`language`] | Per-language dispatch |
//! | [`toolchain`] | Scratch projects and subprocesses |
//! | [`emit`] | Publication tree writer |
//! | [`index`] | CSV release index |
//! | [`metadata`] | Index updates through pull requests |
//! | [`git`] | git command wrappers |
//! | [`github`] | GitHub REST client |
//! | [`pipeline`] | One-release orchestrator |
//! | [`automation`] | Release scheduler |

pub mod automation;
pub mod config;
pub mod decompose;
pub mod emit;
pub mod error;
pub mod git;
pub mod github;
pub mod index;
pub mod lang_dotnet;
pub mod lang_go;
pub mod lang_java;
pub mod lang_js;
pub mod lang_python;
pub mod language;
pub mod metadata;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod release;
pub mod toolchain;
