//! Configuration management.
//!
//! Settings live in `config/<name>.toml` and replace the scattering of
//! per-script constants: bus addresses, save location, and the default
//! sweep parameters for both measurement modes. Every field has a default
//! matching a small-signal field-effect measurement, so a missing section
//! only means "use the defaults".

use crate::error::Error;
use crate::gate::GateSweepConfig;
use crate::sweep::SweepSpec;
use crate::scpi::SourceKind;
use config::Config;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub log_level: Option<String>,
    pub instruments: InstrumentSettings,
    pub storage: StorageSettings,
    pub iv: IvSettings,
    pub gate: GateSettings,
}

/// GPIB primary addresses on the default board.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InstrumentSettings {
    pub source_drain_gpib: u8,
    pub gate_gpib: u8,
}

impl Default for InstrumentSettings {
    fn default() -> Self {
        Self {
            source_drain_gpib: 23,
            gate_gpib: 22,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub path: String,
    pub iv_file: String,
    pub gate_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: "data".to_string(),
            iv_file: "ivSweep.txt".to_string(),
            gate_file: "gateSweep.txt".to_string(),
        }
    }
}

/// Default single-instrument IV sweep: ±5 mV bias at 0.1 mV steps.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IvSettings {
    pub start_volts: f64,
    pub stop_volts: f64,
    pub step_volts: f64,
    pub delay_seconds: f64,
    pub compliance_amps: f64,
}

impl Default for IvSettings {
    fn default() -> Self {
        Self {
            start_volts: -5e-3,
            stop_volts: 5e-3,
            step_volts: 1e-4,
            delay_seconds: 0.1,
            compliance_amps: 10e-6,
        }
    }
}

impl IvSettings {
    pub fn sweep_spec(&self) -> SweepSpec {
        SweepSpec {
            kind: SourceKind::Voltage,
            start: self.start_volts,
            stop: self.stop_volts,
            step: self.step_volts,
            delay: self.delay_seconds,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GateSettings {
    pub start_volts: f64,
    pub stop_volts: f64,
    pub step_volts: f64,
    pub delay_seconds: f64,
    pub compliance_amps: f64,
    pub sd_bias_volts: f64,
    pub sd_compliance_amps: f64,
    pub sd_delay_seconds: f64,
    pub sd_average: u32,
    pub gate_ramp_step_volts: f64,
    pub sd_ramp_step_volts: f64,
    pub ramp_delay_ms: u64,
}

impl Default for GateSettings {
    fn default() -> Self {
        let defaults = GateSweepConfig::default();
        Self {
            start_volts: defaults.gate_start,
            stop_volts: defaults.gate_stop,
            step_volts: defaults.gate_step,
            delay_seconds: defaults.gate_delay,
            compliance_amps: defaults.gate_compliance,
            sd_bias_volts: defaults.sd_bias,
            sd_compliance_amps: defaults.sd_compliance,
            sd_delay_seconds: defaults.sd_delay,
            sd_average: defaults.sd_average,
            gate_ramp_step_volts: defaults.gate_ramp_step,
            sd_ramp_step_volts: defaults.sd_ramp_step,
            ramp_delay_ms: defaults.ramp_delay.as_millis() as u64,
        }
    }
}

impl GateSettings {
    pub fn sweep_config(&self) -> GateSweepConfig {
        GateSweepConfig {
            gate_start: self.start_volts,
            gate_stop: self.stop_volts,
            gate_step: self.step_volts,
            gate_delay: self.delay_seconds,
            gate_compliance: self.compliance_amps,
            sd_bias: self.sd_bias_volts,
            sd_compliance: self.sd_compliance_amps,
            sd_delay: self.sd_delay_seconds,
            sd_average: self.sd_average,
            gate_ramp_step: self.gate_ramp_step_volts,
            sd_ramp_step: self.sd_ramp_step_volts,
            ramp_delay: Duration::from_millis(self.ramp_delay_ms),
        }
    }
}

impl Settings {
    /// Load `config/<name>.toml`, falling back to built-in defaults when
    /// the file is absent.
    pub fn new(config_name: Option<&str>) -> Result<Self, Error> {
        let config_path = format!("config/{}", config_name.unwrap_or("default"));
        let s = Config::builder()
            .add_source(config::File::with_name(&config_path).required(false))
            .build()
            .map_err(Error::Config)?;

        s.try_deserialize().map_err(Error::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_the_gate_sweep_config() {
        let settings = Settings::default();
        let config = settings.gate.sweep_config();
        let expected = GateSweepConfig::default();
        assert_eq!(config.gate_start, expected.gate_start);
        assert_eq!(config.gate_stop, expected.gate_stop);
        assert_eq!(config.sd_average, expected.sd_average);
        assert_eq!(config.ramp_delay, expected.ramp_delay);
    }

    #[test]
    fn default_iv_spec_is_valid() {
        let settings = Settings::default();
        let spec = settings.iv.sweep_spec();
        assert!(spec.validate().is_ok());
        assert_eq!(spec.point_count(), 101);
    }

    #[test]
    fn default_addresses() {
        let settings = Settings::default();
        assert_eq!(settings.instruments.source_drain_gpib, 23);
        assert_eq!(settings.instruments.gate_gpib, 22);
    }
}
