//! GPIB automation for the Keithley 2400 sourcemeter.
//!
//! The crate drives one or two 2400-series sourcemeters over SCPI for IV
//! characterization: single-instrument bias sweeps, smooth output ramps,
//! and dual-instrument gate sweeps (software-paced or hardware-linked over
//! TLINK). Acquired data accumulates in-memory and is persisted as
//! fixed-width text tables.
//!
//! The entry point is [`Session`], which owns a [`transport::Transport`]
//! capability object rather than a concrete bus handle. Hardware access
//! goes through the `instrument_visa` feature and a VISA runtime; without
//! it, the [`transport::MockTransport`] still exercises every code path.

pub mod config;
pub mod error;
pub mod gate;
pub mod scpi;
pub mod session;
pub mod storage;
pub mod sweep;
pub mod trace;
pub mod transport;

pub use config::Settings;
pub use error::{Error, Result};
pub use gate::{GateRecord, GateSweep, GateSweepConfig};
pub use scpi::{MeasureKind, SenseWiring, SourceKind};
pub use session::Session;
pub use storage::SaveMode;
pub use sweep::SweepSpec;
pub use trace::Trace;
