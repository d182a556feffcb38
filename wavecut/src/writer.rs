// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//! # VCD Writer
//! Re-encodes a [`MonitoredWindow`] into one or more self-contained VCD files, either one file
//! per clock cycle or one file per run of changes without large time gaps.

use crate::hierarchy::SCOPE_SEPARATOR;
use crate::ids::{IdAllocator, IdError};
use crate::signals::{Change, Time, Value};
use crate::timescale::Timescale;
use crate::window::{MonitoredSignal, MonitoredWindow};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("[writer] the clock period must be larger than zero")]
    InvalidClockPeriod,
    #[error(transparent)]
    Ids(#[from] IdError),
    #[error("[writer] failed to write `{0}`")]
    Output(String, #[source] std::io::Error),
    #[error("I/O operation failed")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WriteError>;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct WriterOptions {
    /// One file per clock cycle if set, otherwise files are split at time gaps.
    pub clock_period: Option<Time>,
    /// Largest gap between two consecutive time steps that stays in the same file.
    /// Zero means: never split.
    pub gap_threshold: Time,
    /// File extension of the generated files, without the dot.
    pub extension: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            clock_period: None,
            gap_threshold: 0,
            extension: "vcd".to_string(),
        }
    }
}

/// Where the generated files go.
pub trait OutputTarget {
    type File: Write;
    fn create(&mut self, name: &str) -> std::io::Result<Self::File>;
    /// Called once a file is complete.
    fn close(&mut self, name: &str, file: Self::File) -> std::io::Result<()>;
}

/// Writes files into a directory on disk.
#[derive(Debug)]
pub struct DirectoryOutput {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectoryOutput {
    /// Creates `dir` and all of its parents if necessary.
    pub fn create_all(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            written: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths of all completed files in the order they were written.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn into_written(self) -> Vec<PathBuf> {
        self.written
    }
}

impl OutputTarget for DirectoryOutput {
    type File = BufWriter<File>;

    fn create(&mut self, name: &str) -> std::io::Result<Self::File> {
        Ok(BufWriter::new(File::create(self.dir.join(name))?))
    }

    fn close(&mut self, name: &str, mut file: Self::File) -> std::io::Result<()> {
        file.flush()?;
        self.written.push(self.dir.join(name));
        Ok(())
    }
}

/// Keeps all files in memory, mostly useful for testing.
#[derive(Debug, Default, Clone)]
pub struct MemoryOutput {
    files: Vec<(String, Vec<u8>)>,
}

impl MemoryOutput {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|(n, _)| n.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, content)| std::str::from_utf8(content).ok())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl OutputTarget for MemoryOutput {
    type File = Vec<u8>;

    fn create(&mut self, _name: &str) -> std::io::Result<Self::File> {
        Ok(Vec::new())
    }

    fn close(&mut self, name: &str, file: Self::File) -> std::io::Result<()> {
        self.files.push((name.to_string(), file));
        Ok(())
    }
}

/// Finds the first `[<digits>:<digits>]` at or after `from`.
/// Returns the byte range of the brackets and both numbers.
fn find_range(name: &str, from: usize) -> Option<(usize, usize, u32, u32)> {
    let bytes = name.as_bytes();
    let mut start = from;
    while let Some(offset) = bytes.get(start..)?.iter().position(|c| *c == b'[') {
        let open = start + offset;
        if let Some((end, left, right)) = parse_range(bytes, open + 1) {
            return Some((open, end, left, right));
        }
        start = open + 1;
    }
    None
}

/// Parses `<digits>:<digits>]` starting at `pos`. Returns the position after the `]`.
fn parse_range(bytes: &[u8], pos: usize) -> Option<(usize, u32, u32)> {
    let (left, pos) = parse_number(bytes, pos)?;
    if bytes.get(pos) != Some(&b':') {
        return None;
    }
    let (right, pos) = parse_number(bytes, pos + 1)?;
    if bytes.get(pos) != Some(&b']') {
        return None;
    }
    Some((pos + 1, left, right))
}

fn parse_number(bytes: &[u8], pos: usize) -> Option<(u32, usize)> {
    let digits = bytes
        .get(pos..)?
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    let num = std::str::from_utf8(&bytes[pos..pos + digits])
        .ok()?
        .parse::<u32>()
        .ok()?;
    Some((num, pos + digits))
}

/// Bit width derived from the first `[hi:lo]` range in a signal name, `1` if there is none.
/// The declared width of the input is not used.
pub fn infer_width(name: &str) -> u32 {
    match find_range(name, 0) {
        Some((_, _, left, right)) => left.abs_diff(right).saturating_add(1),
        None => 1,
    }
}

/// Separates every `[hi:lo]` range from the preceding name with a space, e.g.,
/// `data[7:0]` becomes `data [7:0]`.
pub fn display_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    let mut pos = 0;
    while let Some((open, end, _, _)) = find_range(name, pos) {
        out.push_str(&name[pos..open]);
        out.push(' ');
        out.push_str(&name[open..end]);
        pos = end;
    }
    out.push_str(&name[pos..]);
    out
}

/// Scope tree rebuilt from dotted references.
#[derive(Debug, Default)]
struct ScopeTree {
    nodes: Vec<ScopeNode>,
    lookup: FxHashMap<(usize, String), usize>,
}

#[derive(Debug, Default)]
struct ScopeNode {
    name: String,
    items: Vec<TreeItem>,
}

#[derive(Debug)]
enum TreeItem {
    Scope(usize),
    /// index into the window's signals
    Var(usize, String),
}

impl ScopeTree {
    fn new(window: &MonitoredWindow) -> Self {
        let mut tree = ScopeTree {
            nodes: vec![ScopeNode::default()],
            lookup: FxHashMap::default(),
        };
        for (ii, signal) in window.signals().iter().enumerate() {
            let mut parts: Vec<&str> = signal.reference.split(SCOPE_SEPARATOR).collect();
            let name = parts.pop().unwrap_or_default();
            let mut node = 0;
            for part in parts {
                node = tree.child(node, part);
            }
            tree.nodes[node].items.push(TreeItem::Var(ii, name.to_string()));
        }
        tree
    }

    fn child(&mut self, parent: usize, name: &str) -> usize {
        if let Some(&id) = self.lookup.get(&(parent, name.to_string())) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(ScopeNode {
            name: name.to_string(),
            items: Vec::new(),
        });
        self.nodes[parent].items.push(TreeItem::Scope(id));
        self.lookup.insert((parent, name.to_string()), id);
        id
    }
}

/// Per signal output identifier and width.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Column {
    id: String,
    width: u32,
}

/// The declaration section shared by all files of one window.
#[derive(Debug, Clone)]
pub struct Header {
    text: String,
    columns: Vec<Column>,
}

impl Header {
    /// Declares all signals of `window`. Identifiers come from `ids`, so signals keep their
    /// identifier across all files that use the same allocator.
    pub fn new(
        window: &MonitoredWindow,
        timescale: Option<Timescale>,
        ids: &mut IdAllocator,
    ) -> Result<Self> {
        let tree = ScopeTree::new(window);
        let mut columns = vec![
            Column {
                id: String::new(),
                width: 1
            };
            window.len()
        ];
        let mut text = String::new();
        text.push_str(&format!(
            "$version Generated by wavecut {} $end\n",
            crate::VERSION
        ));
        if let Some(ts) = timescale {
            text.push_str(&format!("$timescale {ts} $end\n"));
        }
        write_scope_items(&tree, 0, "", window, ids, &mut columns, &mut text)?;
        text.push_str("$enddefinitions $end\n");
        Ok(Self { text, columns })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Output identifier of the signal at `index` in the window.
    pub fn id(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.id.as_str())
    }

    pub fn width(&self, index: usize) -> Option<u32> {
        self.columns.get(index).map(|c| c.width)
    }
}

fn write_scope_items(
    tree: &ScopeTree,
    node: usize,
    indent: &str,
    window: &MonitoredWindow,
    ids: &mut IdAllocator,
    columns: &mut [Column],
    out: &mut String,
) -> Result<()> {
    for item in tree.nodes[node].items.iter() {
        match item {
            TreeItem::Scope(child) => {
                out.push_str(&format!(
                    "{indent}$scope module {} $end\n",
                    tree.nodes[*child].name
                ));
                let inner = format!("{indent}  ");
                write_scope_items(tree, *child, &inner, window, ids, columns, out)?;
                out.push_str(&format!("{indent}$upscope $end\n"));
            }
            TreeItem::Var(index, name) => {
                let width = infer_width(name);
                let id = ids.allocate(&window.signals()[*index].reference)?;
                // the width column is padded for narrow signals
                let pad = match width {
                    0..=9 => "   ",
                    10..=99 => "  ",
                    _ => " ",
                };
                out.push_str(&format!(
                    "{indent}$var wire{pad}{width} {id} {} $end\n",
                    display_name(name)
                ));
                columns[*index] = Column { id, width };
            }
        }
    }
    Ok(())
}

fn write_value<W: Write>(out: &mut W, value: &Value, column: &Column) -> std::io::Result<()> {
    let literal = value.as_str();
    match value {
        Value::Real(_) => writeln!(out, "r{literal} {}", column.id),
        _ if column.width == 1 && literal.len() == 1 => writeln!(out, "{literal}{}", column.id),
        _ => writeln!(out, "b{literal} {}", column.id),
    }
}

/// Writes all files for `window`, choosing the mode from `options`.
/// Returns the names of the generated files.
pub fn write_window<T: OutputTarget>(
    window: &MonitoredWindow,
    timescale: Option<Timescale>,
    ids: &mut IdAllocator,
    options: &WriterOptions,
    target: &mut T,
) -> Result<Vec<String>> {
    let header = Header::new(window, timescale, ids)?;
    match options.clock_period {
        Some(period) => write_fixed_cycles(window, &header, period, &options.extension, target),
        None => write_gap_split(
            window,
            &header,
            options.gap_threshold,
            &options.extension,
            target,
        ),
    }
}

/// Number of clock cycles covered by the window, rounded up.
pub fn num_cycles(start: Time, end: Time, period: Time) -> Result<u64> {
    if period == 0 {
        return Err(WriteError::InvalidClockPeriod);
    }
    Ok(end.saturating_sub(start).div_ceil(period))
}

/// Index of the first change at or after `time`.
fn first_at_or_after(changes: &[Change], time: Time) -> usize {
    changes.partition_point(|c| c.time < time)
}

/// The latest concrete value strictly before `pos` in the change list.
fn last_concrete(changes: &[Change], pos: usize) -> Option<&Value> {
    changes[..pos]
        .iter()
        .rev()
        .map(|c| &c.value)
        .find(|v| !v.is_unknown())
}

fn write_instant<W: Write>(
    out: &mut W,
    signal: &MonitoredSignal,
    column: &Column,
    time: Time,
) -> std::io::Result<()> {
    let changes = &signal.changes;
    let first = first_at_or_after(changes, time);
    let last = first + changes[first..].partition_point(|c| c.time == time);
    if first < last {
        for pos in first..last {
            let value = &changes[pos].value;
            let value = if value.is_unknown() {
                last_concrete(changes, pos).unwrap_or(value)
            } else {
                value
            };
            write_value(out, value, column)?;
        }
    } else if let Some(held) = first.checked_sub(1).map(|p| &changes[p].value) {
        if !held.is_unknown() {
            write_value(out, held, column)?;
        }
    }
    Ok(())
}

/// One file per clock cycle, named `cycle_<time>.<ext>`, each with the three time steps
/// starting at the cycle time. Signals without a change at a step repeat their last value.
#[instrument(skip_all, fields(period = period))]
pub fn write_fixed_cycles<T: OutputTarget>(
    window: &MonitoredWindow,
    header: &Header,
    period: Time,
    extension: &str,
    target: &mut T,
) -> Result<Vec<String>> {
    let cycles = num_cycles(window.start, window.end, period)?;
    info!(cycles, "writing one file per cycle");
    let mut names = Vec::with_capacity(cycles as usize);
    for cycle in 0..cycles {
        let cycle_time = window.start + cycle * period;
        let name = format!("cycle_{cycle_time}.{extension}");
        let mut out = target.create(&name).map_err(|e| WriteError::Output(name.clone(), e))?;
        out.write_all(header.text.as_bytes())?;
        for time in cycle_time..cycle_time + 3 {
            writeln!(out, "#{time}")?;
            for (signal, column) in window.signals().iter().zip(header.columns.iter()) {
                write_instant(&mut out, signal, column, time)?;
            }
        }
        writeln!(out, "$end")?;
        target
            .close(&name, out)
            .map_err(|e| WriteError::Output(name.clone(), e))?;
        names.push(name);
    }
    Ok(names)
}

fn gap_file_name(threshold: Time, count: usize, extension: &str) -> String {
    if threshold == 0 {
        format!("monitored_data.{extension}")
    } else {
        format!("monitored_data_{count}.{extension}")
    }
}

/// Writes all changes in time order. A new file is started whenever two consecutive time steps
/// are more than `threshold` apart. Files are called `monitored_data.<ext>` if `threshold` is
/// zero and `monitored_data_<n>.<ext>` (counting from 1) otherwise.
#[instrument(skip_all, fields(threshold = threshold))]
pub fn write_gap_split<T: OutputTarget>(
    window: &MonitoredWindow,
    header: &Header,
    threshold: Time,
    extension: &str,
    target: &mut T,
) -> Result<Vec<String>> {
    let times = window.distinct_times();
    let mut cursors = vec![0usize; window.len()];
    let mut names = vec![gap_file_name(threshold, 1, extension)];
    let mut name = names[0].clone();
    let mut out = target.create(&name).map_err(|e| WriteError::Output(name.clone(), e))?;
    out.write_all(header.text.as_bytes())?;
    let mut last_time: Option<Time> = None;
    for time in times {
        if let Some(last) = last_time {
            if threshold > 0 && time - last > threshold {
                writeln!(out, "$end")?;
                target
                    .close(&name, out)
                    .map_err(|e| WriteError::Output(name.clone(), e))?;
                name = gap_file_name(threshold, names.len() + 1, extension);
                debug!(gap = time - last, file = name.as_str(), "starting new file");
                out = target.create(&name).map_err(|e| WriteError::Output(name.clone(), e))?;
                out.write_all(header.text.as_bytes())?;
                names.push(name.clone());
            }
        }
        writeln!(out, "#{time}")?;
        for ((signal, column), cursor) in window
            .signals()
            .iter()
            .zip(header.columns.iter())
            .zip(cursors.iter_mut())
        {
            while let Some(change) = signal.changes.get(*cursor) {
                if change.time != time {
                    break;
                }
                write_value(&mut out, &change.value, column)?;
                *cursor += 1;
            }
        }
        last_time = Some(time);
    }
    writeln!(out, "$end")?;
    target
        .close(&name, out)
        .map_err(|e| WriteError::Output(name.clone(), e))?;
    info!(files = names.len(), "wrote gap separated files");
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timescale::TimescaleUnit;

    fn signal(reference: &str, changes: &[(Time, &str)]) -> MonitoredSignal {
        MonitoredSignal {
            reference: reference.to_string(),
            changes: changes
                .iter()
                .map(|(t, v)| {
                    let value = match v.as_bytes() {
                        [c] => Value::scalar(*c).unwrap_or_else(|| Value::vector(v)),
                        _ => Value::vector(v),
                    };
                    Change::new(*t, value)
                })
                .collect(),
        }
    }

    #[test]
    fn test_infer_width() {
        assert_eq!(infer_width("data[7:0]"), 8);
        assert_eq!(infer_width("data[0:7]"), 8);
        assert_eq!(infer_width("data"), 1);
        assert_eq!(infer_width("mem[3][15:0]"), 16);
        assert_eq!(infer_width("data[a:0]"), 1);
        assert_eq!(infer_width("x[4:4]"), 1);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("data[7:0]"), "data [7:0]");
        assert_eq!(display_name("a[1:0]b[3:2]"), "a [1:0]b [3:2]");
        assert_eq!(display_name("mem[3]"), "mem[3]");
        assert_eq!(display_name("clk"), "clk");
    }

    #[test]
    fn test_header() {
        let window = MonitoredWindow::new(
            0,
            10,
            vec![
                signal("top.cpu.data[11:0]", &[]),
                signal("top.clk", &[]),
                signal("top.cpu.valid", &[]),
                signal("other", &[]),
            ],
        );
        let mut ids = IdAllocator::new();
        let ts = Timescale::new(10, TimescaleUnit::PicoSeconds);
        let header = Header::new(&window, Some(ts), &mut ids).unwrap();
        let expected = format!(
            "$version Generated by wavecut {} $end
$timescale 10ps $end
$scope module top $end
  $scope module cpu $end
    $var wire  12 AAAAAA data [11:0] $end
    $var wire   1 AAAAAB valid $end
  $upscope $end
  $var wire   1 AAAAAC clk $end
$upscope $end
$var wire   1 AAAAAD other $end
$enddefinitions $end
",
            crate::VERSION
        );
        assert_eq!(header.text(), expected);
        assert_eq!(header.width(0), Some(12));
        assert_eq!(header.id(3), Some("AAAAAD"));
    }

    #[test]
    fn test_gap_split() {
        let window = MonitoredWindow::new(
            0,
            100,
            vec![signal("top.a", &[(0, "0"), (5, "1"), (50, "0")])],
        );
        let options = WriterOptions {
            gap_threshold: 10,
            ..Default::default()
        };
        let mut ids = IdAllocator::new();
        let mut out = MemoryOutput::default();
        let names = write_window(&window, None, &mut ids, &options, &mut out).unwrap();
        assert_eq!(names, ["monitored_data_1.vcd", "monitored_data_2.vcd"]);
        let first = out.get("monitored_data_1.vcd").unwrap();
        assert!(first.ends_with("$enddefinitions $end\n#0\n0AAAAAA\n#5\n1AAAAAA\n$end\n"));
        let second = out.get("monitored_data_2.vcd").unwrap();
        assert!(second.ends_with("$enddefinitions $end\n#50\n0AAAAAA\n$end\n"));
        // both files share the same header
        let header_len = first.find("#0").unwrap();
        assert_eq!(&first[..header_len], &second[..second.find("#50").unwrap()]);
    }

    #[test]
    fn test_gap_zero_never_splits() {
        let window = MonitoredWindow::new(
            0,
            1000,
            vec![signal("top.bus[3:0]", &[(0, "0000"), (900, "1010")])],
        );
        let mut out = MemoryOutput::default();
        let names = write_window(
            &window,
            None,
            &mut IdAllocator::new(),
            &WriterOptions::default(),
            &mut out,
        )
        .unwrap();
        assert_eq!(names, ["monitored_data.vcd"]);
        let text = out.get("monitored_data.vcd").unwrap();
        assert!(text.ends_with("#0\nb0000 AAAAAA\n#900\nb1010 AAAAAA\n$end\n"));
    }

    #[test]
    fn test_fixed_cycle_carry_forward() {
        let window = MonitoredWindow::new(
            6,
            9,
            vec![
                signal("top.a", &[(2, "1"), (7, "0")]),
                signal("top.b", &[(1, "x")]),
                signal("top.c[1:0]", &[(3, "01"), (8, "x1")]),
            ],
        );
        let options = WriterOptions {
            clock_period: Some(4),
            ..Default::default()
        };
        let mut out = MemoryOutput::default();
        let names =
            write_window(&window, None, &mut IdAllocator::new(), &options, &mut out).unwrap();
        assert_eq!(names, ["cycle_6.vcd"]);
        let text = out.get("cycle_6.vcd").unwrap();
        let body = &text[text.find("#6").unwrap()..];
        // `b` only has an unknown value and is never repeated, `c` replaces x by its last
        // concrete value
        assert_eq!(
            body,
            "#6\n1AAAAAA\nb01 AAAAAC\n#7\n0AAAAAA\nb01 AAAAAC\n#8\n0AAAAAA\nb01 AAAAAC\n$end\n"
        );
    }

    #[test]
    fn test_fixed_cycle_carries_single_early_change() {
        let window = MonitoredWindow::new(0, 8, vec![signal("top.a", &[(0, "1")])]);
        let header = Header::new(&window, None, &mut IdAllocator::new()).unwrap();
        let mut out = MemoryOutput::default();
        let names = write_fixed_cycles(&window, &header, 2, "vcd", &mut out).unwrap();
        assert_eq!(
            names,
            ["cycle_0.vcd", "cycle_2.vcd", "cycle_4.vcd", "cycle_6.vcd"]
        );
        let text = out.get("cycle_6.vcd").unwrap();
        assert!(text.ends_with("#6\n1AAAAAA\n#7\n1AAAAAA\n#8\n1AAAAAA\n$end\n"));
    }

    #[test]
    fn test_carry_forward_does_not_use_future_values() {
        let window = MonitoredWindow::new(
            0,
            8,
            vec![signal("top.a", &[(0, "1"), (6, "0")])],
        );
        let header = Header::new(&window, None, &mut IdAllocator::new()).unwrap();
        let mut out = MemoryOutput::default();
        let names = write_fixed_cycles(&window, &header, 4, "vcd", &mut out).unwrap();
        assert_eq!(names, ["cycle_0.vcd", "cycle_4.vcd"]);
        let text = out.get("cycle_4.vcd").unwrap();
        assert!(text.ends_with("#4\n1AAAAAA\n#5\n1AAAAAA\n#6\n0AAAAAA\n$end\n"));
    }

    #[test]
    fn test_num_cycles() {
        assert_eq!(num_cycles(0, 10, 3).unwrap(), 4);
        assert_eq!(num_cycles(0, 9, 3).unwrap(), 3);
        assert_eq!(num_cycles(5, 5, 3).unwrap(), 0);
        assert!(matches!(
            num_cycles(0, 10, 0),
            Err(WriteError::InvalidClockPeriod)
        ));
    }

    #[test]
    fn test_real_values() {
        let mut s = signal("top.r", &[]);
        s.changes.push(Change::new(3, Value::real("1.5")));
        let window = MonitoredWindow::new(0, 10, vec![s]);
        let mut out = MemoryOutput::default();
        write_window(
            &window,
            None,
            &mut IdAllocator::new(),
            &WriterOptions::default(),
            &mut out,
        )
        .unwrap();
        assert!(out
            .get("monitored_data.vcd")
            .unwrap()
            .ends_with("#3\nr1.5 AAAAAA\n$end\n"));
    }
}
