//! Sweep and ramp parameter computation.
//!
//! A [`SweepSpec`] describes a hardware-stepped source sweep the instrument
//! executes on its own; [`ramp_levels`] computes the stops of a
//! software-paced ramp the session drives one fixed level at a time. Both
//! are validated here, before anything is written to the bus, so a bad
//! spec never leaves local state.

use crate::error::{Error, Result};
use crate::scpi::SourceKind;

/// Parameters for a hardware source sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepSpec {
    /// Whether the swept output is a voltage or a current.
    pub kind: SourceKind,
    /// Output level at the first point, in volts or amps.
    pub start: f64,
    /// Output level at the last point.
    pub stop: f64,
    /// Signed step between points. Must be negative for a decreasing sweep.
    pub step: f64,
    /// Settling delay between points, in seconds.
    pub delay: f64,
}

impl SweepSpec {
    /// Number of points the instrument will record:
    /// `ceil(|stop - start| / |step|) + 1`.
    pub fn point_count(&self) -> u32 {
        ((self.stop - self.start).abs() / self.step.abs()).ceil() as u32 + 1
    }

    /// A sweep over the same range in the opposite direction.
    pub fn reversed(&self) -> SweepSpec {
        SweepSpec {
            start: self.stop,
            stop: self.start,
            step: -self.step,
            ..*self
        }
    }

    /// Check the spec before programming the instrument.
    ///
    /// The step must be finite and nonzero, and its sign must match the
    /// sweep direction. Mismatched sign is rejected here as a hard error
    /// rather than left for the instrument to refuse.
    pub fn validate(&self) -> Result<()> {
        if !self.step.is_finite() || self.step == 0.0 {
            return Err(Error::InvalidSweepSpec(format!(
                "step must be finite and nonzero, got {}",
                self.step
            )));
        }
        if !self.start.is_finite() || !self.stop.is_finite() {
            return Err(Error::InvalidSweepSpec(
                "start and stop must be finite".to_string(),
            ));
        }
        if self.stop != self.start && (self.stop - self.start) * self.step < 0.0 {
            return Err(Error::InvalidSweepSpec(format!(
                "step {} has the wrong sign for a sweep from {} to {}",
                self.step, self.start, self.stop
            )));
        }
        if self.delay < 0.0 || !self.delay.is_finite() {
            return Err(Error::InvalidSweepSpec(format!(
                "delay must be a non-negative number of seconds, got {}",
                self.delay
            )));
        }
        Ok(())
    }
}

/// Levels a ramp passes through, excluding the starting level.
///
/// Steps by `|step|` from `start` toward `target`. A step is taken while
/// it is not farther from the target than the current level is, so the
/// ramp may overshoot by at most one step and never undershoots. The
/// last yielded value is what remains programmed on the source.
pub fn ramp_levels(start: f64, target: f64, step: f64) -> Result<Vec<f64>> {
    let step = step.abs();
    if !step.is_finite() || step == 0.0 {
        return Err(Error::InvalidSweepSpec(format!(
            "ramp step must be finite and nonzero, got {step}"
        )));
    }
    let direction = if target >= start { step } else { -step };
    let mut levels = Vec::new();
    let mut level = start;
    loop {
        let next = level + direction;
        if (target - next).abs() > (target - level).abs() {
            break;
        }
        levels.push(next);
        level = next;
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volts(start: f64, stop: f64, step: f64) -> SweepSpec {
        SweepSpec {
            kind: SourceKind::Voltage,
            start,
            stop,
            step,
            delay: 0.1,
        }
    }

    #[test]
    fn point_count_matches_formula() {
        // -5 mV to +5 mV in 0.1 mV steps, both directions
        assert_eq!(volts(-0.005, 0.005, 0.0001).point_count(), 101);
        assert_eq!(volts(0.005, -0.005, -0.0001).point_count(), 101);
    }

    #[test]
    fn point_count_rounds_partial_steps_up() {
        // 0 to 1 in steps of 0.3: points at 0, .3, .6, .9, 1.0
        assert_eq!(volts(0.0, 1.0, 0.3).point_count(), 5);
    }

    #[test]
    fn degenerate_sweep_is_one_point() {
        assert_eq!(volts(2.0, 2.0, 0.5).point_count(), 1);
        assert!(volts(2.0, 2.0, 0.5).validate().is_ok());
    }

    #[test]
    fn wrong_step_sign_is_rejected() {
        assert!(matches!(
            volts(0.0, 1.0, -0.1).validate(),
            Err(Error::InvalidSweepSpec(_))
        ));
        assert!(matches!(
            volts(1.0, 0.0, 0.1).validate(),
            Err(Error::InvalidSweepSpec(_))
        ));
    }

    #[test]
    fn zero_step_is_rejected() {
        assert!(volts(0.0, 1.0, 0.0).validate().is_err());
    }

    #[test]
    fn negative_delay_is_rejected() {
        let mut spec = volts(0.0, 1.0, 0.1);
        spec.delay = -1.0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn reversed_retraces_the_range() {
        let spec = volts(-0.005, 0.005, 0.0001);
        let back = spec.reversed();
        assert_eq!(back.start, 0.005);
        assert_eq!(back.stop, -0.005);
        assert_eq!(back.step, -0.0001);
        assert!(back.validate().is_ok());
        assert_eq!(back.point_count(), spec.point_count());
    }

    #[test]
    fn ramp_exact_multiple_lands_on_target() {
        let levels = ramp_levels(0.0, 0.01, 0.0001).unwrap();
        assert_eq!(levels.len(), 100);
        assert!((levels.last().unwrap() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn ramp_overshoots_by_at_most_one_step() {
        let levels = ramp_levels(0.0, 0.00025, 0.0001).unwrap();
        let last = *levels.last().unwrap();
        assert!((last - 0.00025).abs() <= 0.0001 + 1e-12);
        // bounded step count
        assert!(levels.len() as u32 <= (0.00025f64 / 0.0001).ceil() as u32 + 1);
    }

    #[test]
    fn ramp_handles_descending_targets() {
        let levels = ramp_levels(1.0, 0.0, 0.25).unwrap();
        assert_eq!(levels, vec![0.75, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn ramp_with_equal_start_and_target_is_empty() {
        assert!(ramp_levels(0.5, 0.5, 0.1).unwrap().is_empty());
    }

    #[test]
    fn ramp_rejects_zero_step() {
        assert!(ramp_levels(0.0, 1.0, 0.0).is_err());
    }
}
