// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

pub mod convert;
mod hierarchy;
mod ids;
pub mod resolve;
pub mod run;
mod signals;
mod timescale;
mod vcd;
pub mod window;
pub mod writer;

/// Cargo.toml version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadOptions {
    /// Full names of the signals to load. Empty means: load all signals.
    pub signals: Vec<String>,
    /// Keep every value change. When disabled only the last value of each signal is tracked.
    pub store_values: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            signals: Vec::new(),
            store_values: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WavecutError {
    #[error(transparent)]
    Vcd(#[from] VcdParseError),
    #[error(transparent)]
    Window(#[from] window::WindowError),
    #[error(transparent)]
    Resolve(#[from] resolve::ResolveError),
    #[error(transparent)]
    Write(#[from] writer::WriteError),
    #[error(transparent)]
    Convert(#[from] convert::ConvertError),
    #[error("io error")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WavecutError>;

pub use hierarchy::{Hierarchy, Scope, ScopeOrVar, ScopeOrVarRef, ScopeRef, Var, VarRef};
pub use ids::{IdAllocator, IdError};
pub use signals::{Change, Signal, SignalRef, SignalStore, Time, Value};
pub use timescale::{parse_timescale, Decimal, MalformedTimescale, Timescale, TimescaleUnit};
pub use vcd::{decode, decode_file, decode_str, Trace, VcdParseError};
