//! Scratch projects and toolchain subprocesses used for validation.
//!
//! A [`ScratchProject`] owns a unique directory under the job's `tempPath`;
//! the directory is removed when the project is dropped, so every exit path
//! (success, toolchain failure, early `?` return, panic unwind) cleans up.
//!
//! [`run_command`] always runs with an explicit working directory, captures
//! stdout and stderr, and turns a failed spawn or a non-zero exit into
//! [`PipelineError::Toolchain`] carrying the captured diagnostics.

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

/// Captured output of a successful command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Temporary project directory with guaranteed removal.
pub struct ScratchProject {
    dir: TempDir,
}

impl ScratchProject {
    /// Create a fresh directory named `<prefix>XXXX` inside `temp_root`.
    pub fn create(temp_root: &Path, prefix: &str) -> Result<Self> {
        std::fs::create_dir_all(temp_root)
            .map_err(|e| PipelineError::io("create temp root", e))?;
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(temp_root)
            .map_err(|e| PipelineError::io("create scratch project", e))?;
        debug!(dir = %dir.path().display(), "scratch project created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to a path relative to the project root.
    pub fn write_file(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io("create scratch folder", e))?;
        }
        std::fs::write(&path, content).map_err(|e| PipelineError::io("write scratch file", e))?;
        Ok(path)
    }

    pub fn read_file(&self, relative: &str) -> Result<String> {
        std::fs::read_to_string(self.dir.path().join(relative))
            .map_err(|e| PipelineError::io("read scratch file", e))
    }

    /// Run `command` followed by `args` inside the project directory.
    pub fn run<S: AsRef<str>>(&self, command: &[String], args: &[S]) -> Result<CommandOutput> {
        run_command(self.dir.path(), command, args)
    }

    /// Remove the directory now, reporting any error.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| PipelineError::io(format!("remove {}", path.display()), e))
    }
}

/// Run a toolchain command in `cwd`.
///
/// `command` is the program and its leading arguments (from configuration);
/// `args` are appended.
pub fn run_command<S: AsRef<str>>(
    cwd: &Path,
    command: &[String],
    args: &[S],
) -> Result<CommandOutput> {
    let (program, leading) = command.split_first().ok_or_else(|| PipelineError::Toolchain {
        command: String::new(),
        status: "not started".to_string(),
        diagnostics: "empty command".to_string(),
    })?;

    let mut parts: Vec<&str> = vec![program.as_str()];
    parts.extend(leading.iter().map(|s| s.as_str()));
    parts.extend(args.iter().map(|s| s.as_ref()));
    let command_line = parts.join(" ");
    info!(cwd = %cwd.display(), "Command line: {}", command_line);

    let output = Command::new(program)
        .args(leading)
        .args(args.iter().map(|s| s.as_ref()))
        .current_dir(cwd)
        .output()
        .map_err(|e| PipelineError::Toolchain {
            command: command_line.clone(),
            status: "not started".to_string(),
            diagnostics: format!("failed to start '{}': {}", program, e),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        let mut diagnostics = String::new();
        if !stdout.trim().is_empty() {
            diagnostics.push_str(stdout.trim_end());
            diagnostics.push('\n');
        }
        diagnostics.push_str(stderr.trim_end());
        return Err(PipelineError::Toolchain {
            command: command_line,
            status: output.status.to_string(),
            diagnostics,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}
