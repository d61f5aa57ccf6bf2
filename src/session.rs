//! Instrument session for the Keithley 2400.
//!
//! A [`Session`] translates high-level sweep/measurement intents into SCPI
//! command strings sent over a [`Transport`], and accumulates returned
//! readings in a [`Trace`]. All operations are strictly sequential; the one
//! genuine suspension point is [`Session::wait_for_completion`], which
//! blocks indefinitely on the instrument's service request.
//!
//! # Example
//!
//! ```no_run
//! use keithley2400::{Session, SweepSpec, SourceKind, MeasureKind};
//! use keithley2400::transport::MockTransport;
//!
//! # async fn example() -> keithley2400::Result<()> {
//! let mut smu = Session::open(MockTransport::new()).await?;
//! smu.configure_measure(MeasureKind::Current).await?;
//! let points = smu
//!     .configure_source_sweep(&SweepSpec {
//!         kind: SourceKind::Voltage,
//!         start: -0.005,
//!         stop: 0.005,
//!         step: 0.0001,
//!         delay: 0.1,
//!     })
//!     .await?;
//! assert_eq!(points, 101);
//! smu.trigger_and_wait().await?;
//! smu.pull_data().await?;
//! smu.stop().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::scpi::{self, MeasureKind, SenseWiring, SourceKind};
use crate::storage::{self, SaveMode};
use crate::sweep::{ramp_levels, SweepSpec};
use crate::trace::Trace;
use crate::transport::Transport;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One sourcemeter bound to one bus address.
///
/// The session owns its transport (composition, not inheritance over the
/// bus handle) and its accumulated [`Trace`]. The trace persists across
/// pulls until explicitly cleared or saved, so back-and-forth sweep legs
/// build one continuous record.
pub struct Session<T> {
    transport: T,
    trace: Trace,
    measure: Option<MeasureKind>,
}

impl<T: Transport> Session<T> {
    /// Open a session: reset the instrument to the driver's baseline
    /// configuration and clear its trace buffer.
    pub async fn open(transport: T) -> Result<Self> {
        let mut session = Self {
            transport,
            trace: Trace::new(),
            measure: None,
        };
        for cmd in scpi::INIT_SEQUENCE {
            session.transport.write(cmd).await?;
        }
        session.transport.write("TRACE:CLEAR").await?;
        log::info!("sourcemeter session initialized");
        Ok(session)
    }

    /// The accumulated measurement record.
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Access the underlying transport (used by tests to inspect traffic).
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Query the instrument's identity string.
    pub async fn identify(&mut self) -> Result<String> {
        self.transport.query("*IDN?").await
    }

    // --- configuration -------------------------------------------------

    /// Enable the sense function for `kind`, disabling the others.
    ///
    /// Measuring resistance also enables the current sense function and
    /// selects two-wire sensing; use [`Session::set_sense_wiring`] for
    /// four-wire measurements.
    pub async fn configure_measure(&mut self, kind: MeasureKind) -> Result<()> {
        self.transport
            .write("SENSE:FUNCTION:OFF 'CURR:DC', 'VOLT:DC', 'RES'")
            .await?;
        match kind {
            MeasureKind::Voltage => {
                self.transport
                    .write("SENSE:FUNCTION:ON 'VOLTAGE:DC'")
                    .await?;
            }
            MeasureKind::Current => {
                self.transport
                    .write("SENSE:FUNCTION:ON 'CURRENT:DC'")
                    .await?;
            }
            MeasureKind::Resistance => {
                self.transport
                    .write("SENSE:FUNCTION:ON 'CURRENT:DC'")
                    .await?;
                self.transport
                    .write("SENSE:FUNCTION:ON 'RESISTANCE'")
                    .await?;
                self.set_sense_wiring(SenseWiring::TwoWire).await?;
            }
        }
        self.measure = Some(kind);
        Ok(())
    }

    /// Select two-wire or four-wire (remote) resistance sensing.
    pub async fn set_sense_wiring(&mut self, wiring: SenseWiring) -> Result<()> {
        let cmd = match wiring {
            SenseWiring::TwoWire => "SYSTEM:RSENSE OFF",
            SenseWiring::FourWire => "SYSTEM:RSENSE ON",
        };
        self.transport.write(cmd).await
    }

    /// When resistance sensing is on, its auto source configuration fights
    /// explicit source programming, so force manual mode first.
    async fn prepare_source(&mut self, kind: SourceKind) -> Result<()> {
        if self.measure == Some(MeasureKind::Resistance) {
            self.transport.write("SENSE:RESISTANCE:MODE MANUAL").await?;
        }
        self.transport
            .write(&format!("SOURCE:FUNCTION:MODE {}", kind.scpi()))
            .await
    }

    /// Program a constant output level, in volts or amps.
    pub async fn configure_source_fixed(&mut self, kind: SourceKind, value: f64) -> Result<()> {
        self.prepare_source(kind).await?;
        let k = kind.scpi();
        self.transport.write(&format!("SOURCE:{k}:MODE FIXED")).await?;
        self.transport
            .write(&format!("SOURCE:{k}:RANGE {value}"))
            .await?;
        self.transport
            .write(&format!("SOURCE:{k}:LEVEL {value}"))
            .await
    }

    /// Program a hardware source sweep and size the trigger/trace counts
    /// to match.
    ///
    /// The spec is validated locally first: a step whose sign fights the
    /// sweep direction is rejected before anything reaches the bus.
    /// Returns the point count so a coordinated second instrument can be
    /// given the same trigger count.
    pub async fn configure_source_sweep(&mut self, spec: &SweepSpec) -> Result<u32> {
        spec.validate()?;
        let points = spec.point_count();
        self.set_trigger_count(points).await?;
        self.prepare_source(spec.kind).await?;
        let k = spec.kind.scpi();
        self.transport.write(&format!("SOURCE:{k}:MODE SWEEP")).await?;
        self.transport
            .write(&format!("SOURCE:{k}:RANGE {}", spec.stop))
            .await?;
        self.transport
            .write(&format!("SOURCE:{k}:START {}", spec.start))
            .await?;
        self.transport
            .write(&format!("SOURCE:{k}:STOP {}", spec.stop))
            .await?;
        self.transport
            .write(&format!("SOURCE:{k}:STEP {}", spec.step))
            .await?;
        self.set_source_delay(spec.delay).await?;
        log::debug!(
            "sweep programmed: {} {} -> {} step {} ({} points)",
            spec.kind,
            spec.start,
            spec.stop,
            spec.step,
            points
        );
        Ok(points)
    }

    /// Pin the source range, e.g. to the largest level an upcoming
    /// stepped measurement will reach, so autoranging never interrupts it.
    pub async fn set_source_range(&mut self, kind: SourceKind, value: f64) -> Result<()> {
        self.transport
            .write(&format!("SOURCE:{}:RANGE {value}", kind.scpi()))
            .await
    }

    /// Set the protection (compliance) limit for the sourced quantity.
    pub async fn set_compliance(&mut self, kind: SourceKind, limit: f64) -> Result<()> {
        self.transport
            .write(&format!("SENSE:{}:PROTECTION {limit}", kind.scpi()))
            .await
    }

    /// Set how many readings the next acquisition records.
    pub async fn set_trigger_count(&mut self, points: u32) -> Result<()> {
        self.transport
            .write(&format!("TRIGGER:COUNT {points}"))
            .await?;
        self.transport
            .write(&format!("TRACE:POINTS {points}"))
            .await
    }

    /// Set the settling delay applied after each source step, in seconds.
    pub async fn set_source_delay(&mut self, seconds: f64) -> Result<()> {
        self.transport
            .write(&format!("SOURCE:DELAY {seconds}"))
            .await
    }

    // --- trigger wiring ------------------------------------------------

    /// Route triggering over the TLINK lines so two instruments pace each
    /// other without computer mediation. Both ends must agree on point
    /// count before arming.
    pub async fn use_tlink(&mut self, input_line: &str, output_line: &str) -> Result<()> {
        self.transport.write("TRIGGER:SOURCE TLINK").await?;
        self.transport
            .write(&format!("TRIGGER:INPUT {input_line}"))
            .await?;
        self.transport
            .write(&format!("TRIGGER:OUTPUT {output_line}"))
            .await
    }

    /// Restore immediate (internal) triggering after a TLINK run.
    pub async fn use_immediate_trigger(&mut self) -> Result<()> {
        self.transport.write("TRIGGER:SOURCE IMMEDIATE").await?;
        self.transport.write("TRIGGER:INPUT NONE").await?;
        self.transport.write("TRIGGER:OUTPUT NONE").await
    }

    // --- acquisition ---------------------------------------------------

    pub async fn output_on(&mut self) -> Result<()> {
        self.transport.write("OUTPUT ON").await
    }

    pub async fn output_off(&mut self) -> Result<()> {
        self.transport.write("OUTPUT OFF").await
    }

    /// Turn the output on, arm the trace feed, and fire the bus trigger
    /// without waiting for completion. Used when two instruments must be
    /// started back to back before either is waited on.
    pub async fn start_no_wait(&mut self) -> Result<()> {
        self.output_on().await?;
        self.transport.write("TRACE:FEED:CONTROL NEXT").await?;
        self.transport.write("INIT").await?;
        self.transport.write("*TRG").await
    }

    /// Block until the instrument raises its measurement-done SRQ, then
    /// drain the status register so the next acquisition starts clean.
    ///
    /// There is no timeout and no cancellation path here.
    pub async fn wait_for_completion(&mut self) -> Result<()> {
        self.transport.wait_for_event().await?;
        self.transport.query("STATUS:MEASUREMENT?").await?;
        Ok(())
    }

    /// Start an acquisition and block until it completes.
    pub async fn trigger_and_wait(&mut self) -> Result<()> {
        self.start_no_wait().await?;
        self.wait_for_completion().await
    }

    /// Take a single reading with the current configuration and append it
    /// to the trace. Assumes the output is already on.
    pub async fn read_point(&mut self) -> Result<()> {
        self.transport.write("TRACE:FEED:CONTROL NEXT").await?;
        self.transport.write("INIT").await?;
        self.transport.write("*TRG").await?;
        self.wait_for_completion().await?;
        self.pull_data().await?;
        Ok(())
    }

    /// Fetch the instrument's trace buffer and append it to the session
    /// record. Returns how many points were appended; an empty buffer
    /// appends nothing.
    pub async fn pull_data(&mut self) -> Result<usize> {
        let values = self.transport.query_values("TRACE:DATA?").await?;
        let appended = self.trace.extend_from_flat(&values)?;
        log::debug!("pulled {appended} points ({} total)", self.trace.len());
        Ok(appended)
    }

    /// One-shot sweep: clear the record, acquire, pull, and stop.
    pub async fn sweep_trace(&mut self) -> Result<()> {
        self.clear_trace().await?;
        self.trigger_and_wait().await?;
        self.pull_data().await?;
        self.stop().await
    }

    /// Full back-and-forth IV acquisition: ramp the output up to the
    /// starting bias, sweep to the stop value and back, then ramp down and
    /// stop. Readings from both legs accumulate into one record.
    pub async fn run_iv_sweep(&mut self, spec: &SweepSpec, ramp_delay: Duration) -> Result<()> {
        spec.validate()?;
        self.clear_trace().await?;
        self.ramp_on(spec.start, spec.step, ramp_delay).await?;

        self.configure_source_sweep(spec).await?;
        self.trigger_and_wait().await?;
        self.pull_data().await?;

        let back = spec.reversed();
        self.configure_source_sweep(&back).await?;
        self.trigger_and_wait().await?;
        self.pull_data().await?;

        self.ramp_off(spec.start, spec.step, ramp_delay).await?;
        self.stop().await
    }

    /// Turn the output off, clear the instrument buffer, and drain any
    /// pending status event.
    pub async fn stop(&mut self) -> Result<()> {
        self.output_off().await?;
        self.transport.write("TRACE:CLEAR").await?;
        self.transport.query("STATUS:MEASUREMENT?").await?;
        Ok(())
    }

    /// Clear both the instrument's buffer and the accumulated record.
    pub async fn clear_trace(&mut self) -> Result<()> {
        self.transport.write("TRACE:CLEAR").await?;
        self.trace.clear();
        Ok(())
    }

    /// Clear the instrument's buffer while keeping the accumulated record.
    /// Single-point loops pull each reading and then make room for the next.
    pub async fn clear_instrument_buffer(&mut self) -> Result<()> {
        self.transport.write("TRACE:CLEAR").await
    }

    // --- introspection -------------------------------------------------

    /// Ask the instrument what it is measuring.
    pub async fn measure_kind(&mut self) -> Result<MeasureKind> {
        let raw = self.transport.query("SENSE:FUNCTION?").await?;
        scpi::parse_sense_function(&raw)
    }

    /// Ask the instrument what it is sourcing.
    pub async fn source_kind(&mut self) -> Result<SourceKind> {
        let raw = self.transport.query("SOURCE:FUNCTION:MODE?").await?;
        scpi::parse_source_mode(&raw)
    }

    /// The currently programmed output level for `kind`.
    pub async fn source_level(&mut self, kind: SourceKind) -> Result<f64> {
        let values = self
            .transport
            .query_values(&format!("SOURCE:{}:LEVEL?", kind.scpi()))
            .await?;
        values.first().copied().ok_or_else(|| {
            Error::MalformedResponse("empty response to source level query".to_string())
        })
    }

    // --- ramping -------------------------------------------------------

    /// Step the fixed source level from `start` toward `target` in
    /// increments of `|step|`, pausing `delay` between steps.
    ///
    /// Direction is inferred from the sign of `target - start`. A step is
    /// taken while it is not farther from the target than the current
    /// level, so the ramp may overshoot by at most one step and never
    /// undershoots. Returns the last programmed level, which can differ
    /// from `target` when the span is not an integer multiple of the step.
    pub async fn ramp(
        &mut self,
        start: f64,
        target: f64,
        step: f64,
        delay: Duration,
    ) -> Result<f64> {
        let kind = self.source_kind().await?;
        let mut level = start;
        for next in ramp_levels(start, target, step)? {
            self.configure_source_fixed(kind, next).await?;
            tokio::time::sleep(delay).await;
            level = next;
        }
        log::debug!("ramped {kind} output from {start} to {level}");
        Ok(level)
    }

    /// Turn the output on at zero and ramp up to `target`.
    pub async fn ramp_on(&mut self, target: f64, step: f64, delay: Duration) -> Result<f64> {
        let kind = self.source_kind().await?;
        self.configure_source_fixed(kind, 0.0).await?;
        self.output_on().await?;
        self.ramp(0.0, target, step, delay).await
    }

    /// Ramp down from `start` to zero, then turn the output off.
    pub async fn ramp_off(&mut self, start: f64, step: f64, delay: Duration) -> Result<f64> {
        let level = self.ramp(start, 0.0, step, delay).await?;
        self.output_off().await?;
        Ok(level)
    }

    // --- persistence ---------------------------------------------------

    /// Write the accumulated record to disk in the fixed-width IV layout.
    ///
    /// See [`storage::save_trace`] for the append/increment semantics.
    /// Returns the path actually written.
    pub fn save(&self, dir: &Path, file_name: &str, mode: SaveMode) -> Result<PathBuf> {
        storage::save_trace(&self.trace, dir, file_name, mode)
    }
}
