//! CLI entry point.
//!
//! Interactive front end for the two measurement modes:
//! - `iv`: single-instrument bias sweep (up and back down)
//! - `gate`: dual-instrument gate sweep, software-paced or TLINK-linked
//!
//! Each mode drops into a numbered-menu loop (configure / run / save /
//! quit). Errors from a menu action are printed and the loop continues, so
//! one failed acquisition never ends the session.
//!
//! Talking to hardware requires the `instrument_visa` feature and a VISA
//! runtime; without it both modes report the missing feature and exit.

use anyhow::Result;
use clap::{Parser, Subcommand};
use keithley2400::Settings;
#[cfg(feature = "instrument_visa")]
use std::io::Write as _;

#[derive(Parser)]
#[command(name = "keithley2400")]
#[command(about = "GPIB sweep measurements with Keithley 2400 sourcemeters", long_about = None)]
struct Cli {
    /// Settings file name under config/ (without extension)
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Single-instrument IV sweep
    Iv,
    /// Dual-instrument gate sweep
    Gate {
        /// Pace the sweep over the TLINK trigger cable instead of the bus
        #[arg(long)]
        tlink: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref())?;
    // RUST_LOG wins over the settings file
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(settings.log_level.as_deref().unwrap_or("info")),
    )
    .init();

    match cli.command {
        Commands::Iv => run_iv(settings).await,
        Commands::Gate { tlink } => run_gate(settings, tlink).await,
    }
}

/// Prompt for a value, keeping `current` when the user just hits enter.
#[cfg(feature = "instrument_visa")]
fn prompt_update<T: std::fmt::Display + std::str::FromStr + Clone>(
    current: &T,
    message: &str,
) -> T {
    print!("{message} ({current}): ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return current.clone();
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return current.clone();
    }
    match trimmed.parse() {
        Ok(value) => value,
        Err(_) => {
            println!("could not parse '{trimmed}', keeping {current}");
            current.clone()
        }
    }
}

/// Show a numbered menu and read the chosen index (1-based).
#[cfg(feature = "instrument_visa")]
fn prompt_menu(options: &[&str]) -> Option<usize> {
    println!("********************");
    for (i, option) in options.iter().enumerate() {
        println!("{}: {}", i + 1, option);
    }
    print!("Enter an option [1-{}]: ", options.len());
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).ok()?;
    let choice: usize = line.trim().parse().ok()?;
    (1..=options.len()).contains(&choice).then_some(choice)
}

#[cfg(feature = "instrument_visa")]
async fn run_iv(mut settings: Settings) -> Result<()> {
    use keithley2400::transport::VisaTransport;
    use keithley2400::{MeasureKind, SaveMode, Session, SourceKind};
    use std::path::Path;
    use std::time::Duration;

    let transport = VisaTransport::open_gpib(settings.instruments.source_drain_gpib)?;
    let mut session = Session::open(transport).await?;
    println!("connected: {}", session.identify().await?);

    session.configure_measure(MeasureKind::Current).await?;
    session
        .set_compliance(SourceKind::Current, settings.iv.compliance_amps)
        .await?;

    loop {
        let Some(choice) = prompt_menu(&["configure sweep", "do sweep", "save data", "quit"])
        else {
            continue;
        };
        let result = match choice {
            1 => {
                let iv = &mut settings.iv;
                iv.start_volts = prompt_update(&iv.start_volts, "Minimum bias");
                iv.stop_volts = prompt_update(&iv.stop_volts, "Maximum bias");
                iv.step_volts = prompt_update(&iv.step_volts, "Bias step");
                iv.delay_seconds = prompt_update(&iv.delay_seconds, "Time step");
                settings.storage.path = prompt_update(&settings.storage.path, "Save path");
                settings.storage.iv_file =
                    prompt_update(&settings.storage.iv_file, "Save filename");
                Ok(())
            }
            2 => {
                session
                    .run_iv_sweep(&settings.iv.sweep_spec(), Duration::from_millis(50))
                    .await
            }
            3 => session
                .save(
                    Path::new(&settings.storage.path),
                    &settings.storage.iv_file,
                    SaveMode::Increment,
                )
                .map(|path| println!("saved to {}", path.display())),
            _ => break,
        };
        if let Err(e) = result {
            println!("{e}");
        }
    }
    Ok(())
}

#[cfg(feature = "instrument_visa")]
async fn run_gate(mut settings: Settings, tlink: bool) -> Result<()> {
    use keithley2400::transport::VisaTransport;
    use keithley2400::{GateSweep, SaveMode, Session};
    use std::path::Path;

    let gate = Session::open(VisaTransport::open_gpib(settings.instruments.gate_gpib)?).await?;
    let sd =
        Session::open(VisaTransport::open_gpib(settings.instruments.source_drain_gpib)?).await?;
    let mut sweep = GateSweep::new(gate, sd, settings.gate.sweep_config());
    sweep.configure().await?;

    loop {
        let Some(choice) = prompt_menu(&["configure sweep", "do sweep", "save data", "quit"])
        else {
            continue;
        };
        let result = match choice {
            1 => {
                let g = &mut settings.gate;
                g.start_volts = prompt_update(&g.start_volts, "Gate sweep starting point");
                g.stop_volts = prompt_update(&g.stop_volts, "Gate sweep stopping point");
                g.step_volts = prompt_update(&g.step_volts, "Gate sweep step");
                g.delay_seconds = prompt_update(&g.delay_seconds, "Gate sweep delay");
                g.compliance_amps = prompt_update(&g.compliance_amps, "Limit for I_gate");
                g.sd_bias_volts = prompt_update(&g.sd_bias_volts, "Source-drain voltage");
                g.sd_compliance_amps = prompt_update(&g.sd_compliance_amps, "Limit for I_sd");
                g.sd_average = prompt_update(&g.sd_average, "Source-drain points to avg over");
                settings.storage.path = prompt_update(&settings.storage.path, "Save path");
                settings.storage.gate_file =
                    prompt_update(&settings.storage.gate_file, "Save filename");
                *sweep.config_mut() = g.sweep_config();
                sweep.configure().await
            }
            2 => {
                let run = if tlink {
                    sweep.run_tlink().await
                } else {
                    sweep.run_software_paced().await
                };
                if run.is_ok() {
                    if let Some(rate) = sweep.record().sweep_rate() {
                        println!("V_gate sweep rate (V/s): {rate:.4}");
                    }
                }
                run
            }
            3 => sweep
                .save(
                    Path::new(&settings.storage.path),
                    &settings.storage.gate_file,
                    SaveMode::Increment,
                )
                .map(|path| println!("saved to {}", path.display())),
            _ => break,
        };
        if let Err(e) = result {
            println!("{e}");
        }
    }
    Ok(())
}

#[cfg(not(feature = "instrument_visa"))]
async fn run_iv(_settings: Settings) -> Result<()> {
    Err(keithley2400::Error::FeatureDisabled("instrument_visa").into())
}

#[cfg(not(feature = "instrument_visa"))]
async fn run_gate(_settings: Settings, _tlink: bool) -> Result<()> {
    Err(keithley2400::Error::FeatureDisabled("instrument_visa").into())
}
