// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use rustc_hash::FxHashMap;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::num::NonZeroU32;
use std::ops::Range;

pub type Time = u64;

/// Uniquely identifies a signal (i.e., one VCD identifier code) inside a [`SignalStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalRef(NonZeroU32);

impl SignalRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        NonZeroU32::new(index as u32 + 1).map(Self)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// A value as it appeared in a value change record.
///
/// Two values are equal when they carry the same literal and both are (or both are not) real.
/// A 1-bit `b1` vector therefore equals the scalar `1`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// A single character value, e.g., the `1` in `1!`.
    Scalar(u8),
    /// A bit-vector literal without its `b` prefix.
    Vector(Box<str>),
    /// A real literal without its `r` prefix.
    Real(Box<str>),
}

impl Value {
    /// Returns `None` if `c` is not a valid single bit value character.
    pub fn scalar(c: u8) -> Option<Self> {
        scalar_str(c).map(|_| Value::Scalar(c))
    }

    pub fn vector(literal: &str) -> Self {
        Value::Vector(literal.into())
    }

    pub fn real(literal: &str) -> Self {
        Value::Real(literal.into())
    }

    /// The literal without any prefix.
    pub fn as_str(&self) -> &str {
        match self {
            Value::Scalar(c) => scalar_str(*c).unwrap_or("x"),
            Value::Vector(literal) | Value::Real(literal) => literal,
        }
    }

    /// A value containing the unknown marker `x` in any position.
    pub fn is_unknown(&self) -> bool {
        match self {
            Value::Real(_) => false,
            _ => self.as_str().bytes().any(|c| matches!(c, b'x' | b'X')),
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Value::Real(_))
    }
}

#[inline]
fn scalar_str(c: u8) -> Option<&'static str> {
    let s = match c {
        b'0' => "0",
        b'1' => "1",
        b'x' => "x",
        b'X' => "X",
        b'z' => "z",
        b'Z' => "Z",
        b'h' => "h",
        b'H' => "H",
        b'u' => "u",
        b'U' => "U",
        b'w' => "w",
        b'W' => "W",
        b'l' => "l",
        b'L' => "L",
        b'-' => "-",
        _ => return None,
    };
    Some(s)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_real() == other.is_real() && self.as_str() == other.as_str()
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.is_real().hash(state);
        self.as_str().hash(state);
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Change {
    pub time: Time,
    pub value: Value,
}

impl Change {
    pub fn new(time: Time, value: Value) -> Self {
        Self { time, value }
    }
}

/// All data recorded for one identifier code.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Signal {
    id: String,
    width: u32,
    kind: String,
    references: Vec<String>,
    changes: Vec<Change>,
    last_value: Option<Value>,
}

impl Debug for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Signal({}, {} bits, {:?}, {} changes)",
            self.id,
            self.width,
            self.references,
            self.changes.len()
        )
    }
}

impl Signal {
    pub fn new(id: String, width: u32, kind: String) -> Self {
        Self {
            id,
            width,
            kind,
            references: Vec::new(),
            changes: Vec::new(),
            last_value: None,
        }
    }

    /// Identifier code from the input file.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// All full names that alias this identifier.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Time-ordered change log.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Most recent value seen while decoding. Also available when change logs are not stored.
    pub fn last_value(&self) -> Option<&Value> {
        self.last_value.as_ref()
    }

    /// Value of the latest change with a timestamp `<= time` (step function).
    /// Returns `None` before the first change. Negative times are clamped to zero.
    pub fn value_at(&self, time: i64) -> Option<&Value> {
        let time = time.max(0) as Time;
        let after = self.changes.partition_point(|c| c.time <= time);
        after.checked_sub(1).map(|ii| &self.changes[ii].value)
    }

    /// One value per time step in `range`. The end of the range is exclusive.
    pub fn values_over(&self, range: Range<i64>) -> Vec<Option<&Value>> {
        range.map(|t| self.value_at(t)).collect()
    }

    pub(crate) fn push(&mut self, time: Time, value: Value, store: bool) {
        debug_assert!(
            self.changes.last().map(|c| c.time <= time).unwrap_or(true),
            "changes need to be recorded in order"
        );
        if store {
            self.changes.push(Change::new(time, value.clone()));
        }
        self.last_value = Some(value);
    }
}

/// Per identifier change logs plus the reference to identifier mapping.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalStore {
    signals: Vec<Signal>,
    by_id: FxHashMap<Vec<u8>, SignalRef>,
    by_reference: FxHashMap<String, SignalRef>,
    /// in declaration order
    references: Vec<String>,
}

impl SignalStore {
    /// Returns the existing signal for `id` or creates a new one.
    pub fn get_or_insert(&mut self, id: &str, width: u32, kind: &str) -> SignalRef {
        if let Some(signal) = self.by_id.get(id.as_bytes()) {
            return *signal;
        }
        let signal = SignalRef::from_index(self.signals.len())
            .expect("more than u32::MAX signals are not supported");
        self.signals
            .push(Signal::new(id.to_string(), width, kind.to_string()));
        self.by_id.insert(id.as_bytes().to_vec(), signal);
        signal
    }

    /// Registers `reference` as an alias of `signal`. A reference maps to exactly one identifier,
    /// a repeated declaration rebinds it.
    pub fn add_reference(&mut self, signal: SignalRef, reference: String) {
        if let Some(old) = self.by_reference.insert(reference.clone(), signal) {
            self.signals[old.index()].references.retain(|r| r != &reference);
            self.references.retain(|r| r != &reference);
        }
        self.signals[signal.index()].references.push(reference.clone());
        self.references.push(reference);
    }

    /// Appends a change if the identifier is known. Returns `false` for unknown identifiers.
    #[inline]
    pub fn record(&mut self, id: &[u8], time: Time, value: Value, store: bool) -> bool {
        match self.by_id.get(id) {
            Some(signal) => {
                self.signals[signal.index()].push(time, value, store);
                true
            }
            None => false,
        }
    }

    pub fn lookup(&self, reference: &str) -> Option<&Signal> {
        self.by_reference
            .get(reference)
            .map(|s| &self.signals[s.index()])
    }

    pub fn lookup_ref(&self, reference: &str) -> Option<SignalRef> {
        self.by_reference.get(reference).copied()
    }

    pub fn by_identifier(&self, id: &str) -> Option<&Signal> {
        self.by_id
            .get(id.as_bytes())
            .map(|s| &self.signals[s.index()])
    }

    /// All references in declaration order.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// All references that contain `fragment` as a substring, in declaration order.
    pub fn matching(&self, fragment: &str) -> Vec<&str> {
        self.references
            .iter()
            .filter(|r| r.contains(fragment))
            .map(|r| r.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignalRef, &Signal)> {
        self.signals
            .iter()
            .enumerate()
            .flat_map(|(ii, s)| SignalRef::from_index(ii).map(|r| (r, s)))
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

impl std::ops::Index<SignalRef> for SignalStore {
    type Output = Signal;

    fn index(&self, index: SignalRef) -> &Self::Output {
        &self.signals[index.index()]
    }
}
