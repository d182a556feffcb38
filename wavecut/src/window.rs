// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//! # Window Extraction
//! Restricts the decoded signals to a set of instances and a time window, optionally only
//! keeping changes at instants where a gating (enable) signal reports `1`.

use crate::signals::{Change, SignalStore, Time, Value};
use rustc_hash::FxHashMap;
use tracing::{debug, info, instrument};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("[window] unknown gating signal `{0}`")]
    UnknownSignal(String),
    #[error("[window] start time {start} is after end time {end}")]
    InvalidRange { start: Time, end: Time },
}

pub type Result<T> = std::result::Result<T, WindowError>;

/// Selects the signals that take part in a window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum InstanceFilter {
    /// No filtering.
    #[default]
    All,
    /// Keep a signal if its full name contains any of the strings. This is a plain substring
    /// test, not a match on path segments.
    Substrings(Vec<String>),
}

impl InstanceFilter {
    pub fn matches(&self, reference: &str) -> bool {
        match self {
            InstanceFilter::All => true,
            InstanceFilter::Substrings(instances) => {
                instances.iter().any(|i| reference.contains(i.as_str()))
            }
        }
    }
}

/// Defines which signals and which time interval to extract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowSpec {
    /// First included time step.
    pub start: Time,
    /// Last included time step.
    pub end: Time,
    pub instances: InstanceFilter,
    /// Full names of the gating signals. Empty means: no gating.
    pub gating: Vec<String>,
}

impl WindowSpec {
    pub fn new(start: Time, end: Time) -> Self {
        Self {
            start,
            end,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredSignal {
    pub reference: String,
    pub changes: Vec<Change>,
}

/// The signals selected by a [`WindowSpec`], in declaration order, each with its changes
/// restricted to `[start, end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredWindow {
    pub start: Time,
    pub end: Time,
    signals: Vec<MonitoredSignal>,
}

impl MonitoredWindow {
    pub fn new(start: Time, end: Time, signals: Vec<MonitoredSignal>) -> Self {
        Self {
            start,
            end,
            signals,
        }
    }

    pub fn signals(&self) -> &[MonitoredSignal] {
        &self.signals
    }

    pub fn get(&self, reference: &str) -> Option<&MonitoredSignal> {
        self.signals.iter().find(|s| s.reference == reference)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Sorted, deduplicated timestamps of all retained changes.
    pub fn distinct_times(&self) -> Vec<Time> {
        let mut times: Vec<Time> = self
            .signals
            .iter()
            .flat_map(|s| s.changes.iter().map(|c| c.time))
            .collect();
        times.sort_unstable();
        times.dedup();
        times
    }
}

/// Gating values of all gating signals merged by timestamp.
///
/// When two gating signals report at the same timestamp, the one listed later overwrites the
/// earlier one. The gate is only open at instants with an exact entry of `1`; it does not hold
/// its value between changes.
#[derive(Debug, Clone, Default)]
pub struct GatingTable {
    values: FxHashMap<Time, Value>,
}

impl GatingTable {
    pub fn new(store: &SignalStore, gating: &[String]) -> Result<Self> {
        let mut values = FxHashMap::default();
        for reference in gating {
            let signal = store
                .lookup(reference)
                .ok_or_else(|| WindowError::UnknownSignal(reference.clone()))?;
            for change in signal.changes() {
                values.insert(change.time, change.value.clone());
            }
        }
        Ok(Self { values })
    }

    pub fn is_open(&self, time: Time) -> bool {
        self.values
            .get(&time)
            .map(|v| v.as_str() == "1")
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[instrument(skip_all, fields(start = spec.start, end = spec.end))]
pub fn extract(store: &SignalStore, spec: &WindowSpec) -> Result<MonitoredWindow> {
    if spec.start > spec.end {
        return Err(WindowError::InvalidRange {
            start: spec.start,
            end: spec.end,
        });
    }
    let gate = if spec.gating.is_empty() {
        None
    } else {
        let table = GatingTable::new(store, &spec.gating)?;
        debug!(entries = table.len(), "merged gating signals");
        Some(table)
    };

    let mut signals = Vec::new();
    for reference in store.references() {
        if !spec.instances.matches(reference) {
            continue;
        }
        let Some(signal) = store.lookup(reference) else {
            continue;
        };
        let changes = signal
            .changes()
            .iter()
            .filter(|c| gate.as_ref().map(|g| g.is_open(c.time)).unwrap_or(true))
            .filter(|c| spec.start <= c.time && c.time <= spec.end)
            .cloned()
            .collect();
        signals.push(MonitoredSignal {
            reference: reference.clone(),
            changes,
        });
    }
    info!(signals = signals.len(), "extracted window");
    Ok(MonitoredWindow::new(spec.start, spec.end, signals))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SignalStore {
        let mut store = SignalStore::default();
        let data = [
            ("!", "top.cpu.valid", &[(0, "0"), (5, "1"), (50, "0")][..]),
            ("\"", "top.cpu.data[7:0]", &[(0, "00000000"), (5, "10101010"), (60, "1")][..]),
            ("#", "top.mem.en", &[(5, "1"), (50, "1"), (100, "1")][..]),
            ("$", "top.mem.en_b", &[(50, "0"), (100, "0")][..]),
        ];
        for (id, reference, changes) in data {
            let signal = store.get_or_insert(id, 1, "wire");
            store.add_reference(signal, reference.to_string());
            for (t, v) in changes {
                store.record(id.as_bytes(), *t, Value::vector(v), true);
            }
        }
        store
    }

    fn times(w: &MonitoredWindow, reference: &str) -> Vec<Time> {
        w.get(reference)
            .unwrap()
            .changes
            .iter()
            .map(|c| c.time)
            .collect()
    }

    #[test]
    fn test_time_bounds_are_inclusive() {
        let w = extract(&store(), &WindowSpec::new(5, 50)).unwrap();
        assert_eq!(w.len(), 4);
        assert_eq!(times(&w, "top.cpu.valid"), [5, 50]);
        assert_eq!(times(&w, "top.cpu.data[7:0]"), [5]);
        assert_eq!(w.distinct_times(), [5, 50]);
    }

    #[test]
    fn test_instance_substring_filter() {
        let mut spec = WindowSpec::new(0, 1000);
        // substring, not a path segment match
        spec.instances = InstanceFilter::Substrings(vec!["cp".to_string()]);
        let w = extract(&store(), &spec).unwrap();
        let names = w.signals().iter().map(|s| s.reference.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["top.cpu.valid", "top.cpu.data[7:0]"]);
    }

    #[test]
    fn test_gating_uses_exact_instants() {
        let mut spec = WindowSpec::new(0, 1000);
        spec.gating = vec!["top.mem.en".to_string()];
        let w = extract(&store(), &spec).unwrap();
        assert_eq!(times(&w, "top.cpu.valid"), [5, 50]);
        // the gate was opened at 5 but there is no entry at 60
        assert_eq!(times(&w, "top.cpu.data[7:0]"), [5]);
    }

    /// Two gating signals reporting at the same instant: the later listed one wins.
    #[test]
    fn test_gating_collision_last_write_wins() {
        let s = store();
        let mut spec = WindowSpec::new(0, 1000);
        spec.gating = vec!["top.mem.en".to_string(), "top.mem.en_b".to_string()];
        let w = extract(&s, &spec).unwrap();
        assert_eq!(times(&w, "top.cpu.valid"), [5]);

        spec.gating = vec!["top.mem.en_b".to_string(), "top.mem.en".to_string()];
        let w = extract(&s, &spec).unwrap();
        assert_eq!(times(&w, "top.cpu.valid"), [5, 50]);

        let table = GatingTable::new(&s, &spec.gating).unwrap();
        assert!(table.is_open(100));
        assert!(!table.is_open(99));
    }

    #[test]
    fn test_errors() {
        let mut spec = WindowSpec::new(0, 10);
        spec.gating = vec!["top.nope".to_string()];
        assert_eq!(
            extract(&store(), &spec).unwrap_err(),
            WindowError::UnknownSignal("top.nope".to_string())
        );
        assert_eq!(
            extract(&store(), &WindowSpec::new(10, 0)).unwrap_err(),
            WindowError::InvalidRange { start: 10, end: 0 }
        );
    }
}
