// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//! # Post Processing
//! Optionally hands every generated trace to an external conversion tool and removes the trace
//! once the converted sibling file shows up.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("[convert] `{}` did not appear within {waited:?}", .path.display())]
    Timeout { path: PathBuf, waited: Duration },
    #[error("[convert] `{program}` failed with {status}")]
    ToolFailed { program: String, status: ExitStatus },
    #[error("[convert] failed to run `{0}`")]
    Launch(String, #[source] std::io::Error),
    #[error("I/O operation failed")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

/// How long to wait for a file produced by another process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct WaitPolicy {
    /// Pause between two checks.
    pub interval: Duration,
    /// Number of checks before giving up.
    pub max_attempts: u32,
}

impl WaitPolicy {
    pub fn with_timeout(timeout: Duration, interval: Duration) -> Self {
        let attempts = if interval.is_zero() {
            1
        } else {
            timeout.as_millis().div_ceil(interval.as_millis().max(1)) as u32
        };
        Self {
            interval,
            max_attempts: attempts.max(1),
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 600,
        }
    }
}

/// `path` with its extension replaced, e.g. `out/cycle_8.vcd` -> `out/cycle_8.saif`.
pub fn sibling_path(path: &Path, extension: &str) -> PathBuf {
    path.with_extension(extension)
}

/// Blocks until `path` exists or the policy runs out of attempts.
pub fn wait_for_file(path: &Path, policy: &WaitPolicy) -> Result<()> {
    let mut waited = Duration::ZERO;
    for attempt in 0..policy.max_attempts {
        if path.exists() {
            return Ok(());
        }
        if attempt + 1 < policy.max_attempts {
            std::thread::sleep(policy.interval);
            waited += policy.interval;
        }
    }
    if path.exists() {
        return Ok(());
    }
    Err(ConvertError::Timeout {
        path: path.to_path_buf(),
        waited,
    })
}

/// Converts a trace into another format.
pub trait Converter {
    /// Extension of the produced files, without the dot.
    fn extension(&self) -> &str;
    fn convert(&mut self, source: &Path, target: &Path) -> Result<()>;
}

/// Runs `<program> -input <source> -output <target>`.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    extension: String,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            extension: extension.into(),
        }
    }

    /// The Synopsys `vcd2saif` converter.
    pub fn vcd2saif() -> Self {
        Self::new("vcd2saif", "saif")
    }
}

impl Converter for CommandConverter {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn convert(&mut self, source: &Path, target: &Path) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("-input")
            .arg(source)
            .arg("-output")
            .arg(target)
            .output()
            .map_err(|e| ConvertError::Launch(self.program.clone(), e))?;
        debug!(
            program = self.program.as_str(),
            stdout = %String::from_utf8_lossy(&output.stdout),
            "converter finished"
        );
        if !output.status.success() {
            return Err(ConvertError::ToolFailed {
                program: self.program.clone(),
                status: output.status,
            });
        }
        Ok(())
    }
}

/// Converts every file in `files`. When `remove_source` is set, each source is deleted once its
/// converted sibling exists. Returns the converted files.
#[instrument(skip_all, fields(files = files.len()))]
pub fn convert_all(
    files: &[PathBuf],
    converter: &mut dyn Converter,
    remove_source: Option<&WaitPolicy>,
) -> Result<Vec<PathBuf>> {
    let mut out = Vec::with_capacity(files.len());
    for source in files {
        let target = sibling_path(source, converter.extension());
        converter.convert(source, &target)?;
        if let Some(policy) = remove_source {
            wait_for_file(&target, policy)?;
            std::fs::remove_file(source)?;
        } else if !target.exists() {
            warn!(path = %target.display(), "converter did not produce a file yet");
        }
        out.push(target);
    }
    info!(converted = out.len(), "converted traces");
    Ok(out)
}
