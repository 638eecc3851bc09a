//! Post-training analysis report
//!
//! After training the engine can produce a correlation/significance table,
//! and the toolset ships a macro turning the training log into a PDF report.
//! Both steps need the training log; the macro additionally needs the
//! toolset root from the environment.

use crate::engine::SharedEngine;
use mvaplug_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// Runs an external command line synchronously
pub trait CommandRunner: Send + Sync {
    /// Run `command` and return its exit code
    fn run(&self, command: &str) -> Result<i32>;
}

/// Runs commands through `sh -c`
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<i32> {
        let status = Command::new("sh").arg("-c").arg(command).status()?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// What the analysis step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// No training log was found; nothing ran
    Skipped,
    /// The report macro ran
    Completed { command: String, exit_code: i32 },
}

/// Inputs of one analysis run
#[derive(Debug, Clone)]
pub struct PostTrainingAnalysis {
    pub job: String,
    pub method: String,
    pub log_file: PathBuf,
    pub toolset_env: String,
    pub output_dir: PathBuf,
}

impl PostTrainingAnalysis {
    /// Correlation table paths: `<dir>/<job>correl_signi.{txt,html}`
    pub fn correlation_files(&self) -> (PathBuf, PathBuf) {
        (
            self.output_dir.join(format!("{}correl_signi.txt", self.job)),
            self.output_dir.join(format!("{}correl_signi.html", self.job)),
        )
    }

    /// Report macro invocation for a given toolset root.
    ///
    /// The command goes through `sh -c`, so job and method names are
    /// limited to `[A-Za-z0-9_.+-]` and the root path must not contain
    /// quotes, whitespace or shell metacharacters.
    pub fn command_line(&self, toolset_root: &Path) -> Result<String> {
        check_shell_safe("job name", &self.job, false)?;
        check_shell_safe("method name", &self.method, false)?;
        let root = toolset_root.display().to_string();
        check_shell_safe("toolset root", &root, true)?;

        Ok(format!(
            "root -b -q {}/external/analysis.C'(\"{job}ahist.txt\",\"{job}_{method}.pdf\",1,\"{job}correl_signi.txt\")'",
            root,
            job = self.job,
            method = self.method,
        ))
    }

    /// Run the analysis on behalf of engine owner `ordinal`.
    ///
    /// A missing training log skips the step with a warning. A missing
    /// toolset environment variable is a configuration error and leaves no
    /// correlation tables behind.
    pub fn run(
        &self,
        engine: &SharedEngine,
        ordinal: u32,
        labels: &[String],
        runner: &dyn CommandRunner,
    ) -> Result<AnalysisOutcome> {
        if !self.log_file.is_file() {
            warn!(
                "Training log {} was not found, skipping analysis",
                self.log_file.display()
            );
            return Ok(AnalysisOutcome::Skipped);
        }

        let root = std::env::var_os(&self.toolset_env)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                Error::config(format!(
                    "variable ${} not found, please check your environment setup",
                    self.toolset_env
                ))
            })?;
        let command = self.command_line(&root)?;

        let (txt, html) = self.correlation_files();
        engine.with(ordinal, |e| e.correlation_significance(labels, &txt, &html))??;

        info!("Executing analysis macro: {}", command);
        let exit_code = runner.run(&command)?;
        if exit_code != 0 {
            warn!("Analysis macro exited with code {}", exit_code);
        }

        Ok(AnalysisOutcome::Completed { command, exit_code })
    }
}

fn check_shell_safe(what: &str, value: &str, allow_path: bool) -> Result<()> {
    let ok = !value.is_empty()
        && value.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-') || (allow_path && c == '/')
        });
    if ok {
        Ok(())
    } else {
        Err(Error::config(format!(
            "{} '{}' cannot be passed to the analysis macro",
            what, value
        )))
    }
}
