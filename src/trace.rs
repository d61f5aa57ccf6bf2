//! Accumulated measurement series.
//!
//! The instrument's trace buffer returns readings as a flat list of
//! 5-tuples `(V, I, I/V, t, status)`. A [`Trace`] de-interleaves those into
//! four parallel, append-only series so multi-leg sweeps accumulate into one
//! continuous record. The status column is a bit code with no numeric
//! meaning and is dropped on ingest.

use crate::error::{Error, Result};

/// Width of one instrument reading in the flat trace response.
const READING_WIDTH: usize = 5;

/// Four parallel series of readings: volts, amps, ohms, seconds.
///
/// Invariant: all four series have equal length after every append.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    volts: Vec<f64>,
    amps: Vec<f64>,
    ohms: Vec<f64>,
    seconds: Vec<f64>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accumulated points.
    pub fn len(&self) -> usize {
        self.volts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volts.is_empty()
    }

    /// Discard all accumulated points.
    pub fn clear(&mut self) {
        self.volts.clear();
        self.amps.clear();
        self.ohms.clear();
        self.seconds.clear();
    }

    pub fn volts(&self) -> &[f64] {
        &self.volts
    }

    pub fn amps(&self) -> &[f64] {
        &self.amps
    }

    /// The I/V column. Only meaningful when the instrument was configured
    /// to measure resistance.
    pub fn ohms(&self) -> &[f64] {
        &self.ohms
    }

    pub fn seconds(&self) -> &[f64] {
        &self.seconds
    }

    /// De-interleave a flat `TRACE:DATA?` response and append it.
    ///
    /// Returns the number of points appended. An empty slice appends
    /// nothing, so pulling with no new readings leaves the record
    /// unchanged. A length that is not a multiple of five is a malformed
    /// response and leaves the series untouched.
    pub fn extend_from_flat(&mut self, values: &[f64]) -> Result<usize> {
        if values.len() % READING_WIDTH != 0 {
            return Err(Error::MalformedResponse(format!(
                "trace data length {} is not a multiple of {}",
                values.len(),
                READING_WIDTH
            )));
        }
        let points = values.len() / READING_WIDTH;
        for reading in values.chunks_exact(READING_WIDTH) {
            self.volts.push(reading[0]);
            self.amps.push(reading[1]);
            self.ohms.push(reading[2]);
            self.seconds.push(reading[3]);
        }
        debug_assert_eq!(self.volts.len(), self.amps.len());
        debug_assert_eq!(self.volts.len(), self.ohms.len());
        debug_assert_eq!(self.volts.len(), self.seconds.len());
        Ok(points)
    }

    /// Mean of the last `count` entries in the amps series.
    ///
    /// Used by dual-instrument sweeps that average a few readings per
    /// step. Returns `None` when the series is empty.
    pub fn mean_recent_amps(&self, count: usize) -> Option<f64> {
        if self.amps.is_empty() || count == 0 {
            return None;
        }
        let tail = &self.amps[self.amps.len().saturating_sub(count)..];
        Some(tail.iter().sum::<f64>() / tail.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(points: usize) -> Vec<f64> {
        // reading i is (i, 10i, 100i, 1000i, 0)
        (0..points)
            .flat_map(|i| {
                let i = i as f64;
                [i, 10.0 * i, 100.0 * i, 1000.0 * i, 0.0]
            })
            .collect()
    }

    #[test]
    fn deinterleaves_five_wide_readings() {
        let mut trace = Trace::new();
        let appended = trace.extend_from_flat(&flat(3)).unwrap();
        assert_eq!(appended, 3);
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.volts(), &[0.0, 1.0, 2.0]);
        assert_eq!(trace.amps(), &[0.0, 10.0, 20.0]);
        assert_eq!(trace.ohms(), &[0.0, 100.0, 200.0]);
        assert_eq!(trace.seconds(), &[0.0, 1000.0, 2000.0]);
    }

    #[test]
    fn reconstructs_original_tuples_by_index() {
        let mut trace = Trace::new();
        let values = flat(4);
        trace.extend_from_flat(&values).unwrap();
        for i in 0..trace.len() {
            assert_eq!(trace.volts()[i], values[5 * i]);
            assert_eq!(trace.amps()[i], values[5 * i + 1]);
            assert_eq!(trace.ohms()[i], values[5 * i + 2]);
            assert_eq!(trace.seconds()[i], values[5 * i + 3]);
        }
    }

    #[test]
    fn appends_across_multiple_pulls() {
        let mut trace = Trace::new();
        trace.extend_from_flat(&flat(2)).unwrap();
        trace.extend_from_flat(&flat(2)).unwrap();
        assert_eq!(trace.len(), 4);
    }

    #[test]
    fn empty_pull_appends_nothing() {
        let mut trace = Trace::new();
        trace.extend_from_flat(&flat(2)).unwrap();
        let appended = trace.extend_from_flat(&[]).unwrap();
        assert_eq!(appended, 0);
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn ragged_data_is_rejected_without_partial_append() {
        let mut trace = Trace::new();
        let mut values = flat(2);
        values.pop();
        assert!(trace.extend_from_flat(&values).is_err());
        assert!(trace.is_empty());
    }

    #[test]
    fn clear_resets_all_series() {
        let mut trace = Trace::new();
        trace.extend_from_flat(&flat(2)).unwrap();
        trace.clear();
        assert!(trace.is_empty());
        assert!(trace.seconds().is_empty());
    }

    #[test]
    fn mean_recent_amps_averages_the_tail() {
        let mut trace = Trace::new();
        trace.extend_from_flat(&flat(4)).unwrap(); // amps: 0, 10, 20, 30
        assert_eq!(trace.mean_recent_amps(2), Some(25.0));
        assert_eq!(trace.mean_recent_amps(10), Some(15.0));
        assert_eq!(Trace::new().mean_recent_amps(3), None);
    }
}
