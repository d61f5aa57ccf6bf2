//! Dual-instrument gate sweeps.
//!
//! A field-effect measurement with two sourcemeters: one sweeps the gate
//! voltage while measuring gate leakage, the other holds a fixed
//! source-drain bias while measuring channel current. The gate is swept up
//! from start to stop and back down, producing one continuous record.
//!
//! Two pacing strategies:
//! - [`GateSweep::run_software_paced`]: the computer steps the gate and
//!   triggers both instruments at each point. Simple, but bus round-trips
//!   bound the sweep rate.
//! - [`GateSweep::run_tlink`]: both instruments run hardware sweeps paced
//!   over the TLINK trigger interconnect, with the computer only waiting
//!   for each leg to finish. Much faster, needs the trigger cable.

use crate::error::{Error, Result};
use crate::scpi::{MeasureKind, SourceKind};
use crate::storage::{self, SaveMode};
use crate::sweep::SweepSpec;
use crate::transport::Transport;
use crate::Session;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Gate-sweep record: one row per gate step.
#[derive(Debug, Clone, Default)]
pub struct GateRecord {
    seconds: Vec<f64>,
    gate_volts: Vec<f64>,
    sd_amps: Vec<f64>,
    gate_amps: Vec<f64>,
}

impl GateRecord {
    pub fn len(&self) -> usize {
        self.seconds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seconds.is_empty()
    }

    pub fn push(&mut self, t: f64, v_gate: f64, i_sd: f64, i_gate: f64) {
        self.seconds.push(t);
        self.gate_volts.push(v_gate);
        self.sd_amps.push(i_sd);
        self.gate_amps.push(i_gate);
    }

    pub fn seconds(&self) -> &[f64] {
        &self.seconds
    }

    pub fn gate_volts(&self) -> &[f64] {
        &self.gate_volts
    }

    /// Source-drain (channel) current.
    pub fn sd_amps(&self) -> &[f64] {
        &self.sd_amps
    }

    /// Gate leakage current.
    pub fn gate_amps(&self) -> &[f64] {
        &self.gate_amps
    }

    /// Achieved gate sweep rate in V/s: the least-squares slope of gate
    /// voltage against time over the first (upward) half of the record.
    ///
    /// `None` when fewer than two points exist.
    pub fn sweep_rate(&self) -> Option<f64> {
        let half = self.len() / 2;
        let n = if half >= 2 { half } else { self.len() };
        if n < 2 {
            return None;
        }
        let t = &self.seconds[..n];
        let v = &self.gate_volts[..n];
        let t_mean = t.iter().sum::<f64>() / n as f64;
        let v_mean = v.iter().sum::<f64>() / n as f64;
        let mut cov = 0.0;
        let mut var = 0.0;
        for i in 0..n {
            cov += (t[i] - t_mean) * (v[i] - v_mean);
            var += (t[i] - t_mean) * (t[i] - t_mean);
        }
        if var == 0.0 {
            return None;
        }
        Some(cov / var)
    }
}

/// Parameters for a dual-instrument gate sweep.
#[derive(Debug, Clone)]
pub struct GateSweepConfig {
    /// Gate voltage at the start (and end) of the sweep.
    pub gate_start: f64,
    /// Gate voltage at the turnaround point.
    pub gate_stop: f64,
    /// Gate step; sign must match the sweep direction.
    pub gate_step: f64,
    /// Settling delay per gate step, in seconds.
    pub gate_delay: f64,
    /// Gate leakage current limit, in amps.
    pub gate_compliance: f64,
    /// Fixed source-drain bias, in volts.
    pub sd_bias: f64,
    /// Channel current limit, in amps.
    pub sd_compliance: f64,
    /// Settling delay per source-drain reading, in seconds.
    pub sd_delay: f64,
    /// Channel readings taken and averaged per gate step.
    pub sd_average: u32,
    /// Step size when ramping the gate to its starting voltage.
    pub gate_ramp_step: f64,
    /// Step size when ramping the source-drain bias on.
    pub sd_ramp_step: f64,
    /// Pause between ramp steps.
    pub ramp_delay: Duration,
}

impl Default for GateSweepConfig {
    fn default() -> Self {
        Self {
            gate_start: -1.0,
            gate_stop: 1.5,
            gate_step: 0.02,
            gate_delay: 0.0,
            gate_compliance: 1e-6,
            sd_bias: 4e-3,
            sd_compliance: 10e-6,
            sd_delay: 0.0,
            sd_average: 1,
            gate_ramp_step: 100e-3,
            sd_ramp_step: 1e-4,
            ramp_delay: Duration::from_millis(50),
        }
    }
}

impl GateSweepConfig {
    /// The upward gate-sweep leg as a hardware sweep spec.
    fn up_leg(&self) -> SweepSpec {
        SweepSpec {
            kind: SourceKind::Voltage,
            start: self.gate_start,
            stop: self.gate_stop,
            step: self.gate_step,
            delay: self.gate_delay,
        }
    }

    /// Reject a step whose sign fights the sweep direction, before any
    /// instrument state changes.
    pub fn validate(&self) -> Result<()> {
        self.up_leg().validate()?;
        if self.sd_average == 0 {
            return Err(Error::InvalidSweepSpec(
                "source-drain average count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Two sessions coordinated into one gate-sweep measurement.
pub struct GateSweep<G, S> {
    gate: Session<G>,
    sd: Session<S>,
    config: GateSweepConfig,
    record: GateRecord,
}

impl<G: Transport, S: Transport> GateSweep<G, S> {
    pub fn new(gate: Session<G>, sd: Session<S>, config: GateSweepConfig) -> Self {
        Self {
            gate,
            sd,
            config,
            record: GateRecord::default(),
        }
    }

    /// The record accumulated by the last run.
    pub fn record(&self) -> &GateRecord {
        &self.record
    }

    pub fn config(&self) -> &GateSweepConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut GateSweepConfig {
        &mut self.config
    }

    /// Access the gate-side session (used by tests to inspect traffic).
    pub fn gate_session_mut(&mut self) -> &mut Session<G> {
        &mut self.gate
    }

    /// Access the source-drain session.
    pub fn sd_session_mut(&mut self) -> &mut Session<S> {
        &mut self.sd
    }

    /// Program both instruments for the sweep: current measurement on
    /// each, fixed voltage sources at zero, compliance limits, per-point
    /// counts, and settling delays.
    pub async fn configure(&mut self) -> Result<()> {
        self.config.validate()?;

        self.gate.configure_measure(MeasureKind::Current).await?;
        self.gate
            .configure_source_fixed(SourceKind::Voltage, 0.0)
            .await?;
        self.gate
            .set_source_range(SourceKind::Voltage, self.config.gate_stop)
            .await?;
        self.gate
            .set_compliance(SourceKind::Current, self.config.gate_compliance)
            .await?;
        self.gate.set_trigger_count(1).await?;
        self.gate.set_source_delay(self.config.gate_delay).await?;

        self.sd.configure_measure(MeasureKind::Current).await?;
        self.sd
            .configure_source_fixed(SourceKind::Voltage, 0.0)
            .await?;
        self.sd
            .set_source_range(SourceKind::Voltage, self.config.sd_bias)
            .await?;
        self.sd
            .set_compliance(SourceKind::Current, self.config.sd_compliance)
            .await?;
        self.sd.set_trigger_count(self.config.sd_average).await?;
        self.sd.set_source_delay(self.config.sd_delay).await?;
        Ok(())
    }

    async fn ramp_both_on(&mut self) -> Result<f64> {
        let v_gate = self
            .gate
            .ramp_on(
                self.config.gate_start,
                self.config.gate_ramp_step,
                self.config.ramp_delay,
            )
            .await?;
        self.sd
            .ramp_on(
                self.config.sd_bias,
                self.config.sd_ramp_step,
                self.config.ramp_delay,
            )
            .await?;
        Ok(v_gate)
    }

    async fn ramp_both_off(&mut self, v_gate: f64) -> Result<()> {
        self.sd
            .ramp_off(
                self.config.sd_bias,
                self.config.sd_ramp_step,
                self.config.ramp_delay,
            )
            .await?;
        self.gate
            .ramp_off(v_gate, self.config.gate_ramp_step, self.config.ramp_delay)
            .await?;
        self.sd.stop().await?;
        self.gate.stop().await?;
        Ok(())
    }

    /// Take one reading on both instruments and append a record row.
    async fn measure_point(&mut self, started: Instant, v_gate: f64) -> Result<()> {
        let t = started.elapsed().as_secs_f64();

        self.sd.trigger_and_wait().await?;
        self.sd.pull_data().await?;
        self.sd.clear_instrument_buffer().await?;
        self.gate.trigger_and_wait().await?;
        self.gate.pull_data().await?;
        self.gate.clear_instrument_buffer().await?;

        let i_sd = self
            .sd
            .trace()
            .mean_recent_amps(self.config.sd_average as usize)
            .ok_or_else(|| {
                Error::MalformedResponse("no source-drain readings returned".to_string())
            })?;
        let i_gate = self.gate.trace().mean_recent_amps(1).ok_or_else(|| {
            Error::MalformedResponse("no gate readings returned".to_string())
        })?;
        self.record.push(t, v_gate, i_sd, i_gate);
        Ok(())
    }

    /// Sweep the gate up and back down, stepping and triggering from the
    /// computer. Each step records the averaged channel current and the
    /// latest gate leakage reading.
    pub async fn run_software_paced(&mut self) -> Result<()> {
        self.record = GateRecord::default();
        self.gate.clear_trace().await?;
        self.sd.clear_trace().await?;

        let mut v_gate = self.ramp_both_on().await?;
        let started = Instant::now();

        while v_gate < self.config.gate_stop {
            self.measure_point(started, v_gate).await?;
            v_gate += self.config.gate_step;
            self.gate
                .configure_source_fixed(SourceKind::Voltage, v_gate)
                .await?;
        }
        while v_gate > self.config.gate_start {
            self.measure_point(started, v_gate).await?;
            v_gate -= self.config.gate_step;
            self.gate
                .configure_source_fixed(SourceKind::Voltage, v_gate)
                .await?;
        }

        self.ramp_both_off(v_gate).await?;
        if let Some(rate) = self.record.sweep_rate() {
            log::info!("gate sweep rate: {rate:.3} V/s");
        }
        Ok(())
    }

    /// Run one hardware leg: program the gate sweep, match the
    /// source-drain count, start both back to back, then wait and pull.
    async fn run_tlink_leg(&mut self, leg: &SweepSpec) -> Result<()> {
        let points = self.gate.configure_source_sweep(leg).await?;
        self.sd.set_trigger_count(points).await?;

        self.gate.start_no_wait().await?;
        self.sd.start_no_wait().await?;
        self.gate.wait_for_completion().await?;
        self.sd.wait_for_completion().await?;
        self.gate.pull_data().await?;
        self.sd.pull_data().await?;
        Ok(())
    }

    /// Sweep the gate up and back down as two hardware sweeps paced over
    /// TLINK. The source-drain instrument takes exactly one reading per
    /// gate step, so per-step averaging does not apply here.
    pub async fn run_tlink(&mut self) -> Result<()> {
        self.config.validate()?;
        self.record = GateRecord::default();
        self.gate.clear_trace().await?;
        self.sd.clear_trace().await?;

        let v_gate = self.ramp_both_on().await?;

        // Trigger rewiring has to happen after the outputs are on.
        self.sd.use_tlink("SOURCE", "SENSE").await?;
        self.gate.use_tlink("SOURCE", "SENSE").await?;

        let up = self.config.up_leg();
        self.run_tlink_leg(&up).await?;
        self.run_tlink_leg(&up.reversed()).await?;

        self.ramp_both_off(v_gate).await?;

        let gate_trace = self.gate.trace();
        let sd_trace = self.sd.trace();
        if gate_trace.len() != sd_trace.len() {
            return Err(Error::MalformedResponse(format!(
                "gate returned {} points but source-drain returned {}",
                gate_trace.len(),
                sd_trace.len()
            )));
        }
        for i in 0..gate_trace.len() {
            self.record.push(
                gate_trace.seconds()[i],
                gate_trace.volts()[i],
                sd_trace.amps()[i],
                gate_trace.amps()[i],
            );
        }

        self.sd.use_immediate_trigger().await?;
        self.gate.use_immediate_trigger().await?;

        if let Some(rate) = self.record.sweep_rate() {
            log::info!("gate sweep rate: {rate:.3} V/s");
        }
        Ok(())
    }

    /// Write the record to disk in the gate-sweep column layout.
    pub fn save(&self, dir: &Path, file_name: &str, mode: SaveMode) -> Result<PathBuf> {
        storage::save_gate_record(&self.record, dir, file_name, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_rate_fits_the_first_half() {
        let mut record = GateRecord::default();
        // Up leg at 2 V/s, down leg at -2 V/s.
        for i in 0..10 {
            record.push(i as f64 * 0.5, i as f64, 0.0, 0.0);
        }
        for i in 0..10 {
            record.push((10 + i) as f64 * 0.5, (10 - i) as f64, 0.0, 0.0);
        }
        let rate = record.sweep_rate().unwrap();
        assert!((rate - 2.0).abs() < 1e-9);
    }

    #[test]
    fn sweep_rate_needs_two_points() {
        let mut record = GateRecord::default();
        assert!(record.sweep_rate().is_none());
        record.push(0.0, 0.0, 0.0, 0.0);
        assert!(record.sweep_rate().is_none());
    }

    #[test]
    fn default_config_validates() {
        assert!(GateSweepConfig::default().validate().is_ok());
    }

    #[test]
    fn step_fighting_direction_is_rejected() {
        let config = GateSweepConfig {
            gate_step: -0.02,
            ..GateSweepConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidSweepSpec(_))
        ));
    }

    #[test]
    fn zero_average_count_is_rejected() {
        let config = GateSweepConfig {
            sd_average: 0,
            ..GateSweepConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
