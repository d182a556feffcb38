// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Single pass VCD decoder. The header is read command by command (commands may span several
// lines), the body is read line by line since the format forbids vector changes on a line that
// carries a time marker.

use crate::hierarchy::{Hierarchy, HierarchyBuilder, SCOPE_SEPARATOR};
use crate::signals::{SignalStore, Time, Value};
use crate::timescale::{parse_timescale, MalformedTimescale, Timescale};
use crate::LoadOptions;
use rustc_hash::FxHashSet;
use std::io::{BufRead, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, trace};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VcdParseError {
    #[error("[vcd] failed to read `{0}`")]
    SourceUnavailable(PathBuf, #[source] std::io::Error),
    #[error("[vcd] malformed header: {0}")]
    MalformedHeader(String),
    #[error(transparent)]
    MalformedTimescale(#[from] MalformedTimescale),
    #[error("[vcd] vector value changes have to be on a separate line (body line {0})")]
    VectorMustBeOnOwnLine(usize),
    #[error("[vcd] failed to parse length: `{0}` for variable `{1}`")]
    VarLengthParsing(String, String),
    #[error("[vcd] unknown or invalid command: `{0}`, valid are: {list:?}", list=get_vcd_command_str())]
    InvalidCommand(String),
    #[error("[vcd] unexpected number of tokens for command {0}: {1}")]
    UnexpectedNumberOfTokens(String, String),
    #[error("[vcd] expected an id for a value change in body line {0}")]
    MissingIdentifier(usize),
    #[error("[vcd] failed to parse time stamp `{1}` in body line {0}")]
    TimeStamp(usize, String),
    #[error("[vcd] time marker #{value} in body line {line} is before the current time {current}")]
    TimeGoesBackwards {
        line: usize,
        current: Time,
        value: Time,
    },
    #[error("I/O operation failed")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VcdParseError>;

/// Everything the decoder extracts from a trace.
#[derive(Debug, Clone)]
pub struct Trace {
    pub hierarchy: Hierarchy,
    pub signals: SignalStore,
    /// Timestamp of the first time marker.
    pub begin_time: Time,
    /// Timestamp of the last time marker.
    pub end_time: Time,
}

impl Trace {
    pub fn timescale(&self) -> Option<Timescale> {
        self.hierarchy.timescale()
    }
}

/// Decodes the VCD file at `filename`.
#[instrument(skip_all, fields(path = %filename.as_ref().display()))]
pub fn decode_file<P: AsRef<Path>>(filename: P, options: &LoadOptions) -> Result<Trace> {
    let path = filename.as_ref();
    let unavailable = |e| VcdParseError::SourceUnavailable(path.to_path_buf(), e);
    let input_file = std::fs::File::open(path).map_err(unavailable)?;
    let len = input_file.metadata().map_err(unavailable)?.len();
    let trace = if len == 0 {
        decode(std::io::Cursor::new(&[] as &[u8]), options)?
    } else {
        let mmap = unsafe { memmap2::Mmap::map(&input_file).map_err(unavailable)? };
        decode(std::io::Cursor::new(&mmap[..]), options)?
    };
    info!(
        signals = trace.signals.len(),
        begin = trace.begin_time,
        end = trace.end_time,
        "decoded trace"
    );
    Ok(trace)
}

/// Decodes a VCD held in memory.
pub fn decode_str(input: &str, options: &LoadOptions) -> Result<Trace> {
    decode(input.as_bytes(), options)
}

/// Decodes a VCD in a single forward pass.
pub fn decode<R: BufRead>(mut input: R, options: &LoadOptions) -> Result<Trace> {
    let allowed: FxHashSet<&str> = options.signals.iter().map(|s| s.as_str()).collect();
    let mut decoder = Decoder {
        hierarchy: HierarchyBuilder::default(),
        signals: SignalStore::default(),
        allowed,
        store_values: options.store_values,
    };
    read_vcd_header(&mut input, |cmd| decoder.header_command(cmd))?;

    let mut body = BodyDecoder {
        signals: &mut decoder.signals,
        store_values: decoder.store_values,
        time: None,
        begin_time: None,
        end_time: 0,
    };
    parse_body(&mut input, &mut body)?;
    let begin_time = body.begin_time.unwrap_or(0);
    let end_time = body.end_time;

    Ok(Trace {
        hierarchy: decoder.hierarchy.finish(),
        signals: decoder.signals,
        begin_time,
        end_time,
    })
}

struct Decoder<'a> {
    hierarchy: HierarchyBuilder,
    signals: SignalStore,
    /// empty means: all signals
    allowed: FxHashSet<&'a str>,
    store_values: bool,
}

impl Decoder<'_> {
    fn header_command(&mut self, cmd: HeaderCmd) -> Result<()> {
        match cmd {
            HeaderCmd::Scope(tpe, name) => {
                self.hierarchy
                    .add_scope(to_string(name), to_string(tpe));
            }
            HeaderCmd::UpScope => {
                if !self.hierarchy.pop_scope() {
                    return Err(VcdParseError::MalformedHeader(
                        "`$upscope` without matching `$scope`".to_string(),
                    ));
                }
            }
            HeaderCmd::Var(tpe, size, id, name) => {
                let width = match std::str::from_utf8(size).ok().and_then(|s| s.parse().ok()) {
                    Some(width) => width,
                    None => {
                        return Err(VcdParseError::VarLengthParsing(
                            to_string(size),
                            to_string(&name),
                        ));
                    }
                };
                let name = to_string(&name);
                let path = self.hierarchy.current_path();
                let reference = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{path}{SCOPE_SEPARATOR}{name}")
                };
                if self.allowed.is_empty() || self.allowed.contains(reference.as_str()) {
                    let kind = to_string(tpe);
                    let signal = self.signals.get_or_insert(&to_string(id), width, &kind);
                    self.signals.add_reference(signal, reference);
                    self.hierarchy.add_var(name, kind, width, signal);
                }
            }
            HeaderCmd::Date(value) => self.hierarchy.set_date(to_trimmed_string(value)),
            HeaderCmd::Version(value) => self.hierarchy.set_version(to_trimmed_string(value)),
            HeaderCmd::Comment(value) => self.hierarchy.add_comment(to_trimmed_string(value)),
            HeaderCmd::Timescale(value) => {
                self.hierarchy.set_timescale(parse_timescale(value)?);
            }
        }
        Ok(())
    }
}

#[inline]
fn to_string(value: &[u8]) -> String {
    String::from_utf8_lossy(value).to_string()
}

fn to_trimmed_string(value: &[u8]) -> String {
    String::from_utf8_lossy(value).trim().to_string()
}

fn read_vcd_header(
    input: &mut impl BufRead,
    mut callback: impl FnMut(HeaderCmd) -> Result<()>,
) -> Result<()> {
    let mut buf: Vec<u8> = Vec::with_capacity(128);
    loop {
        buf.clear();
        let (cmd, body) = match read_command(input, &mut buf)? {
            Some(cmd) => cmd,
            // a file without `$enddefinitions` simply has no body
            None => return Ok(()),
        };
        let parsed = match cmd {
            VcdCmd::Scope => {
                let tokens = find_tokens(body);
                let tpe = tokens.first().cloned().unwrap_or(&[] as &[u8]);
                let name = tokens.get(1).cloned().unwrap_or(&[] as &[u8]);
                HeaderCmd::Scope(tpe, name)
            }
            VcdCmd::Var => {
                let tokens = find_tokens(body);
                if tokens.len() < 4 {
                    return Err(unexpected_n_tokens("variable", &tokens));
                }
                HeaderCmd::Var(tokens[0], tokens[1], tokens[2], tokens[3..].concat())
            }
            VcdCmd::UpScope => HeaderCmd::UpScope,
            VcdCmd::Date => HeaderCmd::Date(body),
            VcdCmd::Comment => HeaderCmd::Comment(body),
            VcdCmd::Version => HeaderCmd::Version(body),
            VcdCmd::Timescale => HeaderCmd::Timescale(body),
            VcdCmd::EndDefinitions => {
                // header is done
                return Ok(());
            }
            VcdCmd::Attribute | VcdCmd::AttributeEnd => {
                trace!("skipping attribute");
                continue;
            }
        };
        callback(parsed)?;
    }
}

const VCD_DATE: &[u8] = b"date";
const VCD_TIMESCALE: &[u8] = b"timescale";
const VCD_VAR: &[u8] = b"var";
const VCD_SCOPE: &[u8] = b"scope";
const VCD_UP_SCOPE: &[u8] = b"upscope";
const VCD_COMMENT: &[u8] = b"comment";
const VCD_VERSION: &[u8] = b"version";
const VCD_END_DEFINITIONS: &[u8] = b"enddefinitions";
/// This might be an unofficial extension used by VHDL simulators.
const VCD_ATTRIBUTE_BEGIN: &[u8] = b"attrbegin";
/// Empty command that is generated in fst2vcd by e.g. NVCs VCD-generation
const VCD_ATTRIBUTE_END: &[u8] = b"attrend";
const VCD_COMMANDS: [&[u8]; 10] = [
    VCD_DATE,
    VCD_TIMESCALE,
    VCD_VAR,
    VCD_SCOPE,
    VCD_UP_SCOPE,
    VCD_COMMENT,
    VCD_VERSION,
    VCD_END_DEFINITIONS,
    VCD_ATTRIBUTE_BEGIN,
    VCD_ATTRIBUTE_END,
];

/// Used to show all commands when printing an error message.
fn get_vcd_command_str() -> String {
    iter_bytes_to_list_str(VCD_COMMANDS.iter())
}

fn iter_bytes_to_list_str<'a, I>(bytes: I) -> String
where
    I: Iterator<Item = &'a &'a [u8]>,
{
    bytes
        .map(|c| String::from_utf8_lossy(c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[inline]
fn unexpected_n_tokens(cmd: &str, tokens: &[&[u8]]) -> VcdParseError {
    VcdParseError::UnexpectedNumberOfTokens(cmd.to_string(), iter_bytes_to_list_str(tokens.iter()))
}

#[derive(Debug, PartialEq, Copy, Clone)]
enum VcdCmd {
    Date,
    Timescale,
    Var,
    Scope,
    UpScope,
    Comment,
    Version,
    EndDefinitions,
    Attribute,
    AttributeEnd,
}

impl VcdCmd {
    fn from_bytes(name: &[u8]) -> Option<Self> {
        match name {
            VCD_VAR => Some(VcdCmd::Var),
            VCD_SCOPE => Some(VcdCmd::Scope),
            VCD_UP_SCOPE => Some(VcdCmd::UpScope),
            VCD_DATE => Some(VcdCmd::Date),
            VCD_TIMESCALE => Some(VcdCmd::Timescale),
            VCD_COMMENT => Some(VcdCmd::Comment),
            VCD_VERSION => Some(VcdCmd::Version),
            VCD_END_DEFINITIONS => Some(VcdCmd::EndDefinitions),
            VCD_ATTRIBUTE_BEGIN => Some(VcdCmd::Attribute),
            VCD_ATTRIBUTE_END => Some(VcdCmd::AttributeEnd),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            VcdCmd::Date => "$date",
            VcdCmd::Timescale => "$timescale",
            VcdCmd::Var => "$var",
            VcdCmd::Scope => "$scope",
            VcdCmd::UpScope => "$upscope",
            VcdCmd::Comment => "$comment",
            VcdCmd::Version => "$version",
            VcdCmd::EndDefinitions => "$enddefinitions",
            VcdCmd::Attribute => "$attrbegin",
            VcdCmd::AttributeEnd => "$attrend",
        }
    }
}

/// Reads in a command until the `$end`. Uses buf to store the read data.
/// Returns the name and the body of the command, or `None` if the input ended before a command.
fn read_command<'a>(
    input: &mut impl BufRead,
    buf: &'a mut Vec<u8>,
) -> Result<Option<(VcdCmd, &'a [u8])>> {
    debug_assert!(buf.is_empty());

    // skip over any preceding whitespace
    let start_char = match skip_whitespace(input) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if start_char != b'$' {
        return Err(VcdParseError::MalformedHeader(format!(
            "expected command to start with `$`, not `{}`",
            String::from_utf8_lossy(&[start_char])
        )));
    }

    // read the rest of the command into the buffer
    match read_token(input, buf) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            return Err(VcdParseError::MalformedHeader(format!(
                "unterminated `${}`",
                String::from_utf8_lossy(buf)
            )))
        }
        Err(e) => return Err(e.into()),
    }

    // check to see if this is a valid command
    let cmd = VcdCmd::from_bytes(buf)
        .ok_or_else(|| VcdParseError::InvalidCommand(String::from_utf8_lossy(buf).to_string()))?;
    buf.clear();

    // read until we find the end token
    match read_until_end_token(input, buf) {
        Ok(()) => Ok(Some((cmd, &buf[..]))),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(VcdParseError::MalformedHeader(
            format!("`{}` is missing its `$end`", cmd.name()),
        )),
        Err(e) => Err(e.into()),
    }
}

#[inline]
fn find_tokens(line: &[u8]) -> Vec<&[u8]> {
    line.split(|c| is_white_space(*c))
        .filter(|e| !e.is_empty())
        .collect()
}

#[inline]
fn read_until_end_token(input: &mut impl BufRead, buf: &mut Vec<u8>) -> std::io::Result<()> {
    // count how many characters of the $end token we have recognized
    let mut end_index = 0;
    // we skip any whitespace at the beginning, but not between tokens
    let mut skipping_preceding_whitespace = true;
    loop {
        let byte = read_byte(input)?;
        if skipping_preceding_whitespace {
            if is_white_space(byte) {
                continue;
            }
            skipping_preceding_whitespace = false;
        }
        // we always append and then later drop the `$end` bytes.
        buf.push(byte);
        end_index = match (end_index, byte) {
            (_, b'$') => 1,
            (1, b'e') => 2,
            (2, b'n') => 3,
            (3, b'd') => {
                // we are done!
                buf.truncate(buf.len() - 4); // drop $end
                right_strip(buf);
                return Ok(());
            }
            _ => 0, // reset
        };
    }
}

#[inline]
fn read_token(input: &mut impl BufRead, buf: &mut Vec<u8>) -> std::io::Result<()> {
    loop {
        let byte = read_byte(input)?;
        if is_white_space(byte) {
            return Ok(());
        }
        buf.push(byte);
    }
}

/// Advances the input until the first non-whitespace character which is then returned.
#[inline]
fn skip_whitespace(input: &mut impl BufRead) -> std::io::Result<u8> {
    loop {
        let byte = read_byte(input)?;
        if !is_white_space(byte) {
            return Ok(byte);
        }
    }
}

#[inline]
fn read_byte(input: &mut impl BufRead) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    input.read_exact(&mut buf)?;
    Ok(buf[0])
}

#[inline]
fn right_strip(buf: &mut Vec<u8>) {
    while buf.last().map(|b| is_white_space(*b)).unwrap_or(false) {
        buf.pop();
    }
}

#[inline]
fn is_white_space(b: u8) -> bool {
    matches!(b, b' ' | b'\n' | b'\r' | b'\t')
}

enum HeaderCmd<'a> {
    Date(&'a [u8]),
    Version(&'a [u8]),
    Comment(&'a [u8]),
    Timescale(&'a [u8]),
    Scope(&'a [u8], &'a [u8]),             // tpe, name
    UpScope,
    Var(&'a [u8], &'a [u8], &'a [u8], Vec<u8>), // tpe, size, id, name
}

trait ParseBodyOutput {
    fn time(&mut self, value: Time);
    fn value(&mut self, value: Value, id: &[u8]);
}

/// Tracks the current time and forwards value changes to the signal store.
struct BodyDecoder<'a> {
    signals: &'a mut SignalStore,
    store_values: bool,
    /// undefined until the first time marker
    time: Option<Time>,
    begin_time: Option<Time>,
    end_time: Time,
}

impl ParseBodyOutput for BodyDecoder<'_> {
    fn time(&mut self, value: Time) {
        if self.begin_time.is_none() {
            self.begin_time = Some(value);
        }
        self.time = Some(value);
        self.end_time = value;
    }

    fn value(&mut self, value: Value, id: &[u8]) {
        // changes before the first time marker belong to time zero
        let time = self.time.unwrap_or(0);
        // unknown ids belong to signals outside of the selection
        self.signals.record(id, time, value, self.store_values);
    }
}

enum BodyToken {
    Time(Time),
    OneBitValue(Value),
    MultiBitValue(Value),
    CommentStart,
    IgnoredCmd,
    Unknown,
}

fn parse_token(token: &[u8], line_no: usize) -> Result<BodyToken> {
    match token[0] {
        b'#' => {
            let value_str = String::from_utf8_lossy(&token[1..]);
            let value = match value_str.parse::<u64>() {
                Ok(val) => Some(val),
                // time stamps ending with .0 can show up from Migen
                Err(_) => match value_str.parse::<f64>() {
                    Ok(val) if val.fract() == 0.0 && val >= 0.0 => Some(val as u64),
                    _ => None,
                },
            };
            value
                .map(BodyToken::Time)
                .ok_or_else(|| VcdParseError::TimeStamp(line_no, value_str.to_string()))
        }
        b'b' | b'B' => Ok(BodyToken::MultiBitValue(Value::vector(
            &String::from_utf8_lossy(&token[1..]),
        ))),
        b'r' | b'R' => Ok(BodyToken::MultiBitValue(Value::real(
            &String::from_utf8_lossy(&token[1..]),
        ))),
        b'$' => match token {
            b"$comment" => Ok(BodyToken::CommentStart),
            b"$dumpvars" | b"$dumpall" | b"$dumpon" | b"$dumpoff" | b"$end" => {
                Ok(BodyToken::IgnoredCmd)
            }
            _ => Ok(BodyToken::Unknown),
        },
        other => Ok(match Value::scalar(other) {
            Some(value) => BodyToken::OneBitValue(value),
            None => BodyToken::Unknown,
        }),
    }
}

fn parse_body(input: &mut impl BufRead, out: &mut impl ParseBodyOutput) -> Result<()> {
    let mut line = Vec::with_capacity(128);
    let mut in_comment = false;
    let mut line_no = 0;
    // time markers must never decrease
    let mut current_time: Option<Time> = None;
    loop {
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        line_no += 1;
        let mut tokens = line
            .split(|c| is_white_space(*c))
            .filter(|t| !t.is_empty());
        // a vector change has to be the only record on its line
        let mut saw_record = false;
        while let Some(token) = tokens.next() {
            if in_comment {
                in_comment = token != b"$end";
                continue;
            }
            match parse_token(token, line_no)? {
                BodyToken::Time(value) => {
                    if let Some(current) = current_time.filter(|c| value < *c) {
                        return Err(VcdParseError::TimeGoesBackwards {
                            line: line_no,
                            current,
                            value,
                        });
                    }
                    current_time = Some(value);
                    saw_record = true;
                    out.time(value);
                }
                BodyToken::OneBitValue(value) => {
                    let id = if token.len() > 1 {
                        &token[1..]
                    } else {
                        // tolerate a space between value and id
                        tokens
                            .next()
                            .ok_or(VcdParseError::MissingIdentifier(line_no))?
                    };
                    saw_record = true;
                    out.value(value, id);
                }
                BodyToken::MultiBitValue(value) => {
                    if saw_record {
                        return Err(VcdParseError::VectorMustBeOnOwnLine(line_no));
                    }
                    let id = tokens
                        .next()
                        .ok_or(VcdParseError::MissingIdentifier(line_no))?;
                    if tokens.next().is_some() {
                        return Err(VcdParseError::VectorMustBeOnOwnLine(line_no));
                    }
                    out.value(value, id);
                }
                BodyToken::CommentStart => in_comment = true,
                BodyToken::IgnoredCmd => {}
                BodyToken::Unknown => {
                    trace!(
                        line = line_no,
                        token = %String::from_utf8_lossy(token),
                        "ignoring unexpected token in body"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl ParseBodyOutput for Vec<String> {
        fn time(&mut self, value: Time) {
            self.push(format!("Time({value})"));
        }

        fn value(&mut self, value: Value, id: &[u8]) {
            self.push(format!("{} = {}", String::from_utf8_lossy(id), value));
        }
    }

    fn read_body_to_vec(input: &[u8]) -> Result<Vec<String>> {
        let mut out = Vec::new();
        parse_body(&mut std::io::Cursor::new(input), &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_read_body() {
        let input = r#"
$dumpvars
1I,!
x J
$end
#2678437829
b00 D2!
r1.5 d2!
$comment
 some text #12 b1 !
$end
#10 1! 0"
z%i" $comment inline $end 0j2!"#;
        let expected = vec![
            "I,! = 1",
            "J = x",
            "Time(2678437829)",
            "D2! = 00",
            "d2! = 1.5",
            "Time(10)",
            "! = 1",
            "\" = 0",
            "%i\" = z",
            "j2! = 0",
        ];
        let res = read_body_to_vec(input.as_bytes()).unwrap();
        assert_eq!(res, expected);
    }

    #[test]
    fn test_vector_on_time_marker_line() {
        let input = b"#0\nb01 !\n#5 1\" b10 !\n";
        let err = read_body_to_vec(input).unwrap_err();
        assert!(matches!(err, VcdParseError::VectorMustBeOnOwnLine(3)));
    }

    #[test]
    fn test_vector_followed_by_other_changes() {
        let err = read_body_to_vec(b"#0\nb01 ! 1\"\n").unwrap_err();
        assert!(matches!(err, VcdParseError::VectorMustBeOnOwnLine(2)));
        let err = read_body_to_vec(b"#0\n1\" r2.5 !\n").unwrap_err();
        assert!(matches!(err, VcdParseError::VectorMustBeOnOwnLine(2)));
    }

    #[test]
    fn test_time_goes_backwards() {
        let err = read_body_to_vec(b"#10\n1!\n#5\n0!\n").unwrap_err();
        assert!(matches!(
            err,
            VcdParseError::TimeGoesBackwards {
                line: 3,
                current: 10,
                value: 5
            }
        ));
        // repeating the current time is fine
        assert_eq!(
            read_body_to_vec(b"#10 1!\n#10 0!\n").unwrap(),
            ["Time(10)", "! = 1", "Time(10)", "! = 0"]
        );
    }

    #[test]
    fn test_missing_identifier() {
        let err = read_body_to_vec(b"#0\nb0101\n").unwrap_err();
        assert!(matches!(err, VcdParseError::MissingIdentifier(2)));
    }

    #[test]
    fn test_float_time_stamp() {
        assert_eq!(read_body_to_vec(b"#10.0\n").unwrap(), ["Time(10)"]);
        assert!(matches!(
            read_body_to_vec(b"#10.5\n").unwrap_err(),
            VcdParseError::TimeStamp(1, _)
        ));
    }

    #[test]
    fn test_read_command() {
        let mut buf = Vec::with_capacity(128);
        let input_0 = b"$upscope $end";
        let (cmd_0, body_0) = read_command(&mut input_0.as_slice(), &mut buf)
            .unwrap()
            .unwrap();
        assert_eq!(cmd_0, VcdCmd::UpScope);
        assert!(body_0.is_empty());

        // test with more whitespace
        buf.clear();
        let input_1 = b" \t $timescale \n 1 \n ps \n $end  \n ";
        let (cmd_1, body_1) = read_command(&mut input_1.as_slice(), &mut buf)
            .unwrap()
            .unwrap();
        assert_eq!(cmd_1, VcdCmd::Timescale);
        assert_eq!(body_1, b"1 \n ps");

        // nothing left
        buf.clear();
        assert!(read_command(&mut b"  \n".as_slice(), &mut buf)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unterminated_command() {
        let mut buf = Vec::with_capacity(128);
        let err = read_command(&mut b"$timescale 1ps\n".as_slice(), &mut buf).unwrap_err();
        assert!(matches!(err, VcdParseError::MalformedHeader(_)));
        assert!(err.to_string().contains("$timescale"));
    }

    #[test]
    fn test_invalid_command() {
        let mut buf = Vec::with_capacity(128);
        let err = read_command(&mut b"$foo bar $end".as_slice(), &mut buf).unwrap_err();
        assert!(err.to_string().contains("unknown or invalid command"));
    }
}
