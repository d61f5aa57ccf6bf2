//! SCPI vocabulary for the Keithley 2400.
//!
//! Protocol Overview:
//! - Format: ASCII SCPI command/response over GPIB
//! - Source functions: VOLTAGE, CURRENT (fixed level or hardware sweep)
//! - Sense functions: 'VOLT:DC', 'CURR:DC', 'RES'
//! - Completion signalling: SRQ on the measurement status summary bit
//!
//! The command strings themselves live where they are sent (in
//! [`crate::session`]); this module holds the typed kinds, the fixed
//! power-on sequence, and the response parsing helpers.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Commands issued once when a session is opened.
///
/// They reset the instrument, clear status, route the measurement summary
/// bit to SRQ, arm the bus trigger, and point the trace buffer at SENSE1.
pub const INIT_SEQUENCE: [&str; 8] = [
    "*RST",
    "*CLS",
    "STATUS:MEASUREMENT:ENABLE 512",
    "*SRE 1",
    "ARM:COUNT 1",
    "ARM:SOURCE BUS",
    "TRACE:FEED SENSE1",
    "SYSTEM:TIME:RESET:AUTO 0",
];

/// What the instrument sources: a voltage or a current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Voltage,
    Current,
}

impl SourceKind {
    /// The SCPI node name for this function ("VOLTAGE" / "CURRENT").
    pub fn scpi(&self) -> &'static str {
        match self {
            SourceKind::Voltage => "VOLTAGE",
            SourceKind::Current => "CURRENT",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Voltage => write!(f, "voltage"),
            SourceKind::Current => write!(f, "current"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "voltage" => Ok(SourceKind::Voltage),
            "current" => Ok(SourceKind::Current),
            other => Err(Error::UnsupportedMode(other.to_string())),
        }
    }
}

/// What the instrument measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureKind {
    Voltage,
    Current,
    Resistance,
}

impl fmt::Display for MeasureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureKind::Voltage => write!(f, "voltage"),
            MeasureKind::Current => write!(f, "current"),
            MeasureKind::Resistance => write!(f, "resistance"),
        }
    }
}

impl FromStr for MeasureKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "voltage" => Ok(MeasureKind::Voltage),
            "current" => Ok(MeasureKind::Current),
            "resistance" => Ok(MeasureKind::Resistance),
            other => Err(Error::UnsupportedMode(other.to_string())),
        }
    }
}

/// Resistance sense wiring: two-wire (local) or four-wire (remote sense).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenseWiring {
    #[default]
    TwoWire,
    FourWire,
}

/// Parse a single floating-point SCPI response.
pub fn parse_f64(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| Error::MalformedResponse(format!("expected a number, got '{}'", raw.trim())))
}

/// Parse a comma-separated list of floats, as returned by `TRACE:DATA?`.
///
/// An empty (or whitespace-only) response parses to an empty list; the
/// instrument returns nothing when its buffer holds no new points.
pub fn parse_values(raw: &str) -> Result<Vec<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed.split(',').map(parse_f64).collect()
}

/// Decode a `SENSE:FUNCTION?` reply into a [`MeasureKind`].
///
/// The instrument answers with a quoted list such as `"CURR:DC","RES"`;
/// the last entry names the primary reading.
pub fn parse_sense_function(raw: &str) -> Result<MeasureKind> {
    let last = raw
        .trim()
        .split(',')
        .next_back()
        .unwrap_or("")
        .trim()
        .trim_matches('"');
    match last {
        "VOLT:DC" => Ok(MeasureKind::Voltage),
        "CURR:DC" => Ok(MeasureKind::Current),
        "RES" => Ok(MeasureKind::Resistance),
        other => Err(Error::MalformedResponse(format!(
            "unrecognized sense function '{other}'"
        ))),
    }
}

/// Decode a `SOURCE:FUNCTION:MODE?` reply into a [`SourceKind`].
pub fn parse_source_mode(raw: &str) -> Result<SourceKind> {
    match raw.trim() {
        "VOLT" => Ok(SourceKind::Voltage),
        "CURR" => Ok(SourceKind::Current),
        other => Err(Error::MalformedResponse(format!(
            "unrecognized source mode '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_value_list() {
        let values = parse_values("1.0,2.5,-3.25e-4").unwrap();
        assert_eq!(values, vec![1.0, 2.5, -3.25e-4]);
    }

    #[test]
    fn empty_response_is_empty_list() {
        assert!(parse_values("").unwrap().is_empty());
        assert!(parse_values("  \r\n").unwrap().is_empty());
    }

    #[test]
    fn garbage_in_list_is_an_error() {
        assert!(matches!(
            parse_values("1.0,spam"),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!("Voltage".parse::<SourceKind>().unwrap(), SourceKind::Voltage);
        assert_eq!(
            "RESISTANCE".parse::<MeasureKind>().unwrap(),
            MeasureKind::Resistance
        );
        assert!(matches!(
            "power".parse::<SourceKind>(),
            Err(Error::UnsupportedMode(_))
        ));
    }

    #[test]
    fn sense_function_takes_last_entry() {
        assert_eq!(
            parse_sense_function("\"CURR:DC\",\"RES\"").unwrap(),
            MeasureKind::Resistance
        );
        assert_eq!(
            parse_sense_function("\"VOLT:DC\"").unwrap(),
            MeasureKind::Voltage
        );
    }

    #[test]
    fn source_mode_decodes() {
        assert_eq!(parse_source_mode("VOLT\n").unwrap(), SourceKind::Voltage);
        assert!(parse_source_mode("WATT").is_err());
    }
}
