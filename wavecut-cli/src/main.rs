// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use clap::Parser;
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wavecut::convert::{CommandConverter, Converter, WaitPolicy};
use wavecut::resolve::{Resolver, SelectAll, Selection, Strict};
use wavecut::run::{run, RunConfig};
use wavecut::writer::WriterOptions;

#[derive(Parser, Debug)]
#[command(name = "wavecut")]
#[command(author = "Kevin Laeufer <laeufer@cornell.edu>")]
#[command(version)]
#[command(about = "Cuts a time window out of a VCD file and writes it as one file per clock cycle or per burst of activity.", long_about = None)]
struct Args {
    #[arg(value_name = "VCDFILE", index = 1, required_unless_present = "folder")]
    input: Option<PathBuf>,
    /// Process every `.vcd` file in this folder.
    #[arg(short, long, conflicts_with = "input")]
    folder: Option<PathBuf>,
    /// Only keep signals of these instances.
    #[arg(short, long, num_args = 1..)]
    instances: Vec<String>,
    /// Only load these signals (full names).
    #[arg(long, num_args = 1..)]
    signals: Vec<String>,
    /// Inclusive time window, defaults to the whole trace.
    #[arg(short, long, num_args = 2, value_names = ["START", "END"])]
    time: Option<Vec<u64>>,
    /// Clock period. Writes one file per cycle.
    #[arg(short, long)]
    clock: Option<u64>,
    /// Only keep changes at time steps where one of these (enable) signals is `1`.
    #[arg(short, long, num_args = 1..)]
    enable: Vec<String>,
    /// Start a new file when two time steps are further apart. 0 never splits.
    #[arg(short = 'g', long, default_value_t = 0)]
    enable_gap_threshold: u64,
    #[arg(short, long, default_value = "output")]
    output_folder: PathBuf,
    /// Convert each generated file with `vcd2saif`.
    #[arg(long)]
    saif: bool,
    /// Delete each generated VCD once its SAIF file exists.
    #[arg(long, requires = "saif")]
    remove_vcd: bool,
    /// How long to wait for a SAIF file before giving up.
    #[arg(long, default_value_t = 600)]
    wait_timeout_secs: u64,
    /// Select all candidates when a name is ambiguous instead of asking.
    #[arg(long)]
    select_all: bool,
    #[arg(short, long)]
    verbose: bool,
}

/// Asks on the terminal which candidates to use.
struct Prompt;

impl Resolver for Prompt {
    fn resolve(&mut self, query: &str, candidates: &[String]) -> Selection {
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "`{query}` is not exact. Did you mean one of the following?");
        for (ii, c) in candidates.iter().enumerate() {
            let _ = writeln!(stderr, "{}: {c}", ii + 1);
        }
        let _ = write!(stderr, "Your choice (comma-separated for multiple, 'all' for all): ");
        let _ = stderr.flush();
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return Selection::Reject;
        }
        parse_choice(line.trim(), candidates.len())
    }
}

fn parse_choice(choice: &str, candidates: usize) -> Selection {
    if choice == "all" {
        return Selection::All;
    }
    let indices: Option<Vec<usize>> = choice
        .split(',')
        .map(|c| c.trim().parse::<usize>().ok())
        .map(|c| c.filter(|i| (1..=candidates).contains(i)).map(|i| i - 1))
        .collect();
    match indices {
        Some(indices) if !indices.is_empty() => Selection::Indices(indices),
        _ => Selection::Reject,
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn vcd_files_in(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "vcd") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let inputs = match (&args.folder, &args.input) {
        (Some(folder), _) => match vcd_files_in(folder) {
            Ok(files) => files,
            Err(e) => {
                error!("failed to list {}: {e}", folder.display());
                return ExitCode::FAILURE;
            }
        },
        (None, Some(input)) => vec![input.clone()],
        (None, None) => Vec::new(),
    };

    let mut resolver: Box<dyn Resolver> = if args.select_all {
        Box::new(SelectAll)
    } else if std::io::stdin().is_terminal() {
        Box::new(Prompt)
    } else {
        Box::new(Strict)
    };
    let mut converter = CommandConverter::vcd2saif();
    let remove_source = args.remove_vcd.then(|| {
        WaitPolicy::with_timeout(
            Duration::from_secs(args.wait_timeout_secs),
            Duration::from_secs(1),
        )
    });

    let mut failed = 0;
    for input in inputs.iter() {
        let config = RunConfig {
            input: input.clone(),
            signals: args.signals.clone(),
            instances: args.instances.clone(),
            time: args.time.as_deref().and_then(|t| match t {
                [start, end] => Some((*start, *end)),
                _ => None,
            }),
            gating: args.enable.clone(),
            writer: WriterOptions {
                clock_period: args.clock,
                gap_threshold: args.enable_gap_threshold,
                ..Default::default()
            },
            output_root: args.output_folder.clone(),
            remove_source,
        };
        let converter = if args.saif {
            Some(&mut converter as &mut dyn Converter)
        } else {
            None
        };
        match run(&config, resolver.as_mut(), converter) {
            Ok(report) => info!(
                "{}: {} signals from {} to {} (trace spans {} to {}), {} files in {}",
                input.display(),
                report.signals,
                report.window.0,
                report.window.1,
                report.begin_time,
                report.end_time,
                report.files.len(),
                config.output_dir().display()
            ),
            Err(e) => {
                error!("{}: {e}", input.display());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        error!("{failed} of {} inputs failed", inputs.len());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("all", 3), Selection::All);
        assert_eq!(parse_choice("1, 3", 3), Selection::Indices(vec![0, 2]));
        assert_eq!(parse_choice("4", 3), Selection::Reject);
        assert_eq!(parse_choice("", 3), Selection::Reject);
        assert_eq!(parse_choice("a", 3), Selection::Reject);
    }

    #[test]
    fn test_args() {
        let args = Args::try_parse_from([
            "wavecut", "trace.vcd", "-t", "10", "20", "-c", "4", "-e", "en", "valid",
        ])
        .unwrap();
        assert_eq!(args.time, Some(vec![10, 20]));
        assert_eq!(args.clock, Some(4));
        assert_eq!(args.enable, ["en", "valid"]);
        assert_eq!(args.output_folder, PathBuf::from("output"));
        assert!(Args::try_parse_from(["wavecut"]).is_err());
    }
}
