// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use std::fmt::{Display, Formatter};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("[vcd] malformed timescale: `{0}`")]
pub struct MalformedTimescale(pub String);

/// Exact decimal number `mantissa * 10^exponent`. Used instead of floating point so that
/// multiplying a large tick count with the timescale does not drift.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Decimal {
    pub mantissa: u128,
    pub exponent: i16,
}

impl Decimal {
    pub const fn new(mantissa: u128, exponent: i16) -> Self {
        Self { mantissa, exponent }
    }

    /// Removes trailing decimal zeros from the mantissa.
    pub fn normalized(mut self) -> Self {
        if self.mantissa == 0 {
            return Self::new(0, 0);
        }
        while self.mantissa % 10 == 0 {
            self.mantissa /= 10;
            self.exponent += 1;
        }
        self
    }

    /// Exact product. Returns `None` on overflow.
    pub fn checked_mul(self, other: Decimal) -> Option<Decimal> {
        Some(Decimal {
            mantissa: self.mantissa.checked_mul(other.mantissa)?,
            exponent: self.exponent.checked_add(other.exponent)?,
        })
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.normalized(), other.normalized());
        a.mantissa == b.mantissa && a.exponent == b.exponent
    }
}

impl Eq for Decimal {}

impl Display for Decimal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let n = self.normalized();
        if n.exponent == 0 {
            write!(f, "{}", n.mantissa)
        } else {
            write!(f, "{}e{}", n.mantissa, n.exponent)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum TimescaleUnit {
    FemtoSeconds,
    PicoSeconds,
    NanoSeconds,
    MicroSeconds,
    MilliSeconds,
    Seconds,
    /// `$timescale 1 $end` without a unit. Acts like a factor of one.
    Unitless,
}

impl TimescaleUnit {
    pub fn to_exponent(&self) -> i16 {
        match &self {
            TimescaleUnit::FemtoSeconds => -15,
            TimescaleUnit::PicoSeconds => -12,
            TimescaleUnit::NanoSeconds => -9,
            TimescaleUnit::MicroSeconds => -6,
            TimescaleUnit::MilliSeconds => -3,
            TimescaleUnit::Seconds | TimescaleUnit::Unitless => 0,
        }
    }

    /// Unit as written in a VCD header.
    pub fn as_str(&self) -> &'static str {
        match &self {
            TimescaleUnit::FemtoSeconds => "fs",
            TimescaleUnit::PicoSeconds => "ps",
            TimescaleUnit::NanoSeconds => "ns",
            TimescaleUnit::MicroSeconds => "us",
            TimescaleUnit::MilliSeconds => "ms",
            TimescaleUnit::Seconds => "s",
            TimescaleUnit::Unitless => "",
        }
    }

    fn from_bytes(name: &[u8]) -> Option<Self> {
        match name {
            b"fs" => Some(TimescaleUnit::FemtoSeconds),
            b"ps" => Some(TimescaleUnit::PicoSeconds),
            b"ns" => Some(TimescaleUnit::NanoSeconds),
            b"us" => Some(TimescaleUnit::MicroSeconds),
            b"ms" => Some(TimescaleUnit::MilliSeconds),
            b"s" => Some(TimescaleUnit::Seconds),
            b"" => Some(TimescaleUnit::Unitless),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Timescale {
    pub magnitude: u32,
    pub unit: TimescaleUnit,
}

impl Timescale {
    pub fn new(magnitude: u32, unit: TimescaleUnit) -> Self {
        Timescale { magnitude, unit }
    }

    /// The scale factor of the unit, e.g. `1e-12` for `ps`.
    pub fn factor(&self) -> Decimal {
        Decimal::new(1, self.unit.to_exponent())
    }

    /// Length of one tick in seconds: `magnitude * factor`.
    pub fn seconds_per_tick(&self) -> Decimal {
        Decimal::new(self.magnitude as u128, self.unit.to_exponent())
    }

    /// Exact duration of `ticks` in seconds.
    pub fn duration(&self, ticks: u64) -> Option<Decimal> {
        self.seconds_per_tick()
            .checked_mul(Decimal::new(ticks as u128, 0))
    }
}

impl Display for Timescale {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.as_str())
    }
}

/// Parses the body of a `$timescale` command, i.e., everything between `$timescale` and `$end`,
/// possibly collected from several lines. Accepts `1ps`, `1 ps` and `10 ns` style bodies.
pub fn parse_timescale(body: &[u8]) -> Result<Timescale, MalformedTimescale> {
    let malformed = || MalformedTimescale(String::from_utf8_lossy(body).trim().to_string());
    let tokens: Vec<&[u8]> = body
        .split(|c| c.is_ascii_whitespace())
        .filter(|t| !t.is_empty())
        .collect();
    let (magnitude, unit) = match tokens.as_slice() {
        [token] => {
            // split at the first non-numeric character
            match token.iter().position(|c| !c.is_ascii_digit()) {
                None => (*token, &[] as &[u8]),
                Some(pos) => (&token[..pos], &token[pos..]),
            }
        }
        [magnitude, unit] => (*magnitude, *unit),
        _ => return Err(malformed()),
    };
    let magnitude = std::str::from_utf8(magnitude)
        .ok()
        .and_then(|m| m.parse::<u32>().ok())
        .ok_or_else(malformed)?;
    let unit = TimescaleUnit::from_bytes(unit).ok_or_else(malformed)?;
    Ok(Timescale::new(magnitude, unit))
}
