// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//! # Run
//! Decodes one trace, extracts a window and writes it out, all in one call.

use crate::convert::{convert_all, Converter, WaitPolicy};
use crate::ids::IdAllocator;
use crate::resolve::{resolve_gating_signals, resolve_instances, Resolver};
use crate::signals::Time;
use crate::vcd::decode_file;
use crate::window::{extract, InstanceFilter, WindowSpec};
use crate::writer::{write_window, DirectoryOutput, WriterOptions};
use crate::{LoadOptions, Result};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct RunConfig {
    pub input: PathBuf,
    /// Signals to load, empty means: all.
    pub signals: Vec<String>,
    /// Instance names, empty means: all instances.
    pub instances: Vec<String>,
    /// Inclusive time window. Defaults to the first and last time step of the trace.
    pub time: Option<(Time, Time)>,
    /// Name fragments of the gating signals.
    pub gating: Vec<String>,
    pub writer: WriterOptions,
    /// Every input gets its own directory below this one.
    pub output_root: PathBuf,
    /// Delete each generated trace once its converted sibling exists.
    pub remove_source: Option<WaitPolicy>,
}

impl RunConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            signals: Vec::new(),
            instances: Vec::new(),
            time: None,
            gating: Vec::new(),
            writer: WriterOptions::default(),
            output_root: PathBuf::from("output"),
            remove_source: None,
        }
    }

    /// `<output_root>/<input file stem>`
    pub fn output_dir(&self) -> PathBuf {
        output_dir(&self.output_root, &self.input)
    }
}

pub fn output_dir(root: &Path, input: &Path) -> PathBuf {
    match input.file_stem() {
        Some(stem) => root.join(stem),
        None => root.join("trace"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// First time step of the input.
    pub begin_time: Time,
    /// Last time step of the input.
    pub end_time: Time,
    /// The extracted window.
    pub window: (Time, Time),
    /// Number of signals in the window.
    pub signals: usize,
    pub files: Vec<PathBuf>,
    /// Files produced by the converter, if any.
    pub converted: Vec<PathBuf>,
}

#[instrument(skip_all, fields(input = %config.input.display()))]
pub fn run(
    config: &RunConfig,
    resolver: &mut dyn Resolver,
    converter: Option<&mut dyn Converter>,
) -> Result<RunReport> {
    let options = LoadOptions {
        signals: config.signals.clone(),
        ..Default::default()
    };
    let trace = decode_file(&config.input, &options)?;
    let (start, end) = config.time.unwrap_or((trace.begin_time, trace.end_time));
    info!(start, end, "monitoring window");

    let instances = if config.instances.is_empty() {
        InstanceFilter::All
    } else {
        InstanceFilter::Substrings(resolve_instances(
            &trace.hierarchy,
            &config.instances,
            resolver,
        )?)
    };
    let gating = resolve_gating_signals(&trace.signals, &config.gating, resolver)?;
    if gating.is_empty() {
        info!("no gating signals, keeping all time steps");
    } else {
        info!(?gating, "gating signals");
    }
    let spec = WindowSpec {
        start,
        end,
        instances,
        gating,
    };
    let window = extract(&trace.signals, &spec)?;

    let mut target = DirectoryOutput::create_all(config.output_dir())?;
    let mut ids = IdAllocator::new();
    write_window(
        &window,
        trace.timescale(),
        &mut ids,
        &config.writer,
        &mut target,
    )?;
    let files = target.into_written();
    info!(files = files.len(), "wrote output");

    let converted = match converter {
        Some(converter) => convert_all(&files, converter, config.remove_source.as_ref())?,
        None => Vec::new(),
    };

    Ok(RunReport {
        begin_time: trace.begin_time,
        end_time: trace.end_time,
        window: (start, end),
        signals: window.len(),
        files,
        converted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir() {
        assert_eq!(
            output_dir(Path::new("out"), Path::new("inputs/cpu_run.vcd")),
            PathBuf::from("out/cpu_run")
        );
        let config = RunConfig::new("/tmp/a.b.vcd");
        assert_eq!(config.output_dir(), PathBuf::from("output/a.b"));
    }
}
