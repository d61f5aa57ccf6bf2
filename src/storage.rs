//! Fixed-width text persistence for measurement records.
//!
//! Files carry a blank leading line, a label row, a units row, and one row
//! per data point. Columns are space-padded to fixed widths so the files
//! import cleanly into Origin and read well in a pager.
//!
//! Two write modes:
//! - **Append** extends (or creates) one fixed file, adding a complete
//!   block each time.
//! - **Increment** never touches an existing file: `run.txt` becomes
//!   `run0001.txt`, `run0002.txt`, ... at the first unused suffix.

use crate::error::{Error, Result};
use crate::gate::GateRecord;
use crate::trace::Trace;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// How [`save_trace`] and [`save_gate_record`] pick the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Extend the named file, creating it if absent.
    Append,
    /// Write a fresh file with the first unused four-digit suffix.
    Increment,
}

const SUFFIX_LIMIT: u32 = 9999;

/// Numbers formatted with a leading space standing in for a plus sign, so
/// columns of mixed-sign values stay aligned.
fn signed_sci(value: f64, width: usize) -> String {
    let raw = format!("{value:.7e}");
    // `{:e}` writes a bare exponent ("1.2e-3"); pad it to two digits.
    let (mantissa, exponent) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exp: i32 = exponent.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let mut s = format!("{mantissa}e{sign}{:02}", exp.abs());
    if !s.starts_with('-') {
        s.insert(0, ' ');
    }
    format!("{s:<width$}")
}

fn signed_fixed(value: f64, precision: usize, width: usize, right_align: bool) -> String {
    let mut s = format!("{value:.precision$}");
    if !s.starts_with('-') {
        s.insert(0, ' ');
    }
    if right_align {
        format!("{s:>width$}")
    } else {
        format!("{s:<width$}")
    }
}

fn open_for(dir: &Path, file_name: &str, mode: SaveMode) -> Result<(std::fs::File, PathBuf)> {
    let path = match mode {
        SaveMode::Append => dir.join(file_name),
        SaveMode::Increment => incremented_path(dir, file_name)?,
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    Ok((file, path))
}

/// First `stem0001.ext`-style path in `dir` that does not exist yet.
fn incremented_path(dir: &Path, file_name: &str) -> Result<PathBuf> {
    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let extension = name.extension().and_then(|s| s.to_str()).unwrap_or("txt");
    for counter in 1..=SUFFIX_LIMIT {
        let candidate = dir.join(format!("{stem}{counter:04}.{extension}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(Error::FileIo(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no unused suffix left for '{file_name}' in {}", dir.display()),
    )))
}

/// Write an IV record as columns `V, I, I/V, t`.
///
/// Returns the path actually written, which in increment mode differs from
/// `file_name`.
pub fn save_trace(trace: &Trace, dir: &Path, file_name: &str, mode: SaveMode) -> Result<PathBuf> {
    let mut block = String::new();
    let _ = writeln!(block);
    let _ = writeln!(block, "{:^18}{:^18}{:^18}{:^10}", "V", "I", "I/V", "t");
    let _ = writeln!(
        block,
        "{:^18}{:^18}{:^18}{:^10}",
        "volts", "amps", "ohms", "seconds"
    );
    for i in 0..trace.len() {
        let _ = writeln!(
            block,
            "{}{}{}{}",
            signed_sci(trace.volts()[i], 18),
            signed_sci(trace.amps()[i], 18),
            signed_sci(trace.ohms()[i], 18),
            signed_fixed(trace.seconds()[i], 6, 10, false),
        );
    }

    let (mut file, path) = open_for(dir, file_name, mode)?;
    file.write_all(block.as_bytes())?;
    log::info!("saved {} points to {}", trace.len(), path.display());
    Ok(path)
}

/// Write a gate-sweep record as columns `t, V_gate, I_sd, I_gate`.
pub fn save_gate_record(
    record: &GateRecord,
    dir: &Path,
    file_name: &str,
    mode: SaveMode,
) -> Result<PathBuf> {
    let mut block = String::new();
    let _ = writeln!(block);
    let _ = writeln!(
        block,
        "{:^10}{:^10}{:^18}{:^18}",
        "t", "V_gate", "I_sd", "I_gate"
    );
    let _ = writeln!(
        block,
        "{:^10}{:^10}{:^18}{:^18}",
        "seconds", "volts", "amps", "amps"
    );
    for i in 0..record.len() {
        let _ = writeln!(
            block,
            "{}{}{}{}",
            signed_fixed(record.seconds()[i], 6, 10, false),
            signed_fixed(record.gate_volts()[i], 3, 10, true),
            signed_sci(record.sd_amps()[i], 18),
            signed_sci(record.gate_amps()[i], 18),
        );
    }

    let (mut file, path) = open_for(dir, file_name, mode)?;
    file.write_all(block.as_bytes())?;
    log::info!("saved {} points to {}", record.len(), path.display());
    Ok(path)
}
