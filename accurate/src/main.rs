/*!
# ACCURATE2 Evaluation Board Tool

Command line interface for the ACCURATE2 charge-integrating front end. It reads
the frames the FPGA streams over a serial link, converts them to currents and
shows them live, and it programs the board's DAC and a Keithley source meter.

## Features

- Serial port listing and a raw hex byte monitor
- Live current display with running average, temperature and humidity
- CSV logging, newline-delimited JSON output and a terminal plot
- DAC7578 channel programming
- Keithley current source control over SCPI

## Usage

```bash
accurate list-ports
SERIAL_PORT=/dev/ttyUSB1 accurate get-current --lsb 39.339 -l output.log
accurate set-dac /dev/ttyUSB1 C 1.5
accurate set-keithley TCPIP::192.168.1.20::SOCKET 0.001
```
*/

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shared::{format_current, DacChannel, DacCommand, LayoutPreset, SharedError};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod capture;
mod config;
mod keithley;
mod serial;
mod sinks;

use capture::CurrentMonitor;
use config::{AppConfig, LayoutConfig};
use keithley::{KeithleyAddress, ScpiSession};
use sinks::{ConsoleSink, CsvLogSink, JsonSink, MeasurementSink, PlotSink};

#[derive(Parser)]
#[command(name = "accurate")]
#[command(about = "ACCURATE2 evaluation board tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "accurate.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List the serial ports available on this host
    ListPorts,

    /// Open a serial connection with the FPGA and print every byte received
    OpenSerial {
        /// Serial port where the FPGA is connected
        #[arg(env = "SERIAL_PORT")]
        port: String,

        /// Baudrate for the serial communication
        #[arg(short, long)]
        baudrate: Option<u32>,
    },

    /// Read and display the current measured by ACCURATE2
    GetCurrent {
        /// Serial port where the FPGA is connected
        #[arg(env = "SERIAL_PORT")]
        port: String,

        /// Baudrate for the serial communication
        #[arg(short, long)]
        baudrate: Option<u32>,

        /// Sampling period in ms
        #[arg(long)]
        period: Option<f64>,

        /// Least significant bit value in aC
        #[arg(long)]
        lsb: Option<f64>,

        /// Frame layout sent by the FPGA (basic or extended)
        #[arg(long)]
        layout: Option<LayoutPreset>,

        /// Log the values to the specified file
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Plot the current in the terminal
        #[arg(short, long)]
        plot: bool,

        /// Print one JSON object per measurement instead of the live display
        #[arg(long, conflicts_with = "plot")]
        json: bool,
    },

    /// Set the voltage of a DAC channel
    SetDac {
        /// Serial port where the FPGA is connected
        #[arg(env = "SERIAL_PORT")]
        port: String,

        /// DAC channel (A-H)
        channel: String,

        /// Voltage to set in V
        voltage: f64,

        /// Baudrate for the serial communication
        #[arg(short, long)]
        baudrate: Option<u32>,
    },

    /// Set the Keithley's source current
    SetKeithley {
        /// Instrument address, TCPIP::<host>[::<port>]::SOCKET or ASRL<device>[::INSTR]
        address: String,

        /// Current to set in uA
        #[arg(allow_negative_numbers = true)]
        current: f64,

        /// Print the instrument reading
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate configuration file
    Config {
        /// Output path for configuration file
        #[arg(short, long, default_value = "accurate.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(default_log_level(&cli.command));

    match cli.command {
        Commands::ListPorts => run_list_ports(),

        Commands::OpenSerial { port, baudrate } => {
            let config = AppConfig::load_or_default(&cli.config)?;
            run_open_serial(&config, &port, baudrate)
        }

        Commands::GetCurrent {
            port,
            baudrate,
            period,
            lsb,
            layout,
            log,
            verbose,
            plot,
            json,
        } => {
            let mut config = AppConfig::load_or_default(&cli.config)?;
            if let Some(baudrate) = baudrate {
                config.serial.baudrate = baudrate;
            }
            if let Some(period) = period {
                config.acquisition.sampling_period_ms = period;
            }
            if let Some(lsb) = lsb {
                config.acquisition.lsb_charge_ac = lsb;
            }
            if let Some(layout) = layout {
                config.acquisition.layout = LayoutConfig::Preset(layout);
            }

            let output = if plot {
                OutputMode::Plot
            } else if json {
                OutputMode::Json
            } else {
                OutputMode::Console
            };
            run_get_current(&config, &port, log, verbose, output)
        }

        Commands::SetDac {
            port,
            channel,
            voltage,
            baudrate,
        } => {
            let config = AppConfig::load_or_default(&cli.config)?;
            run_set_dac(&config, &port, &channel, voltage, baudrate)
        }

        Commands::SetKeithley {
            address,
            current,
            verbose,
        } => {
            let config = AppConfig::load_or_default(&cli.config)?;
            run_set_keithley(&config, &address, current, verbose)
        }

        Commands::Config { output } => generate_config_file(output),
    }
}

/// Level used when `RUST_LOG` is unset. The console and plot displays
/// redraw in place, so logging is kept quiet while they run.
fn default_log_level(command: &Commands) -> &'static str {
    match command {
        Commands::GetCurrent { plot: true, .. } => "error",
        Commands::GetCurrent {
            json: true,
            verbose: true,
            ..
        } => "debug",
        _ => "info",
    }
}

/// Log to stderr, `RUST_LOG` overriding `default_level`
fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Clear `running` on Ctrl+C
fn install_ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")
}

fn run_list_ports() -> Result<()> {
    let ports = serial::list_ports()?;
    if ports.is_empty() {
        warn!("No serial ports found");
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}

fn run_open_serial(config: &AppConfig, port: &str, baudrate: Option<u32>) -> Result<()> {
    let baudrate = baudrate.unwrap_or(config.serial.baudrate);
    let mut serial_port = serial::open_port(port, baudrate, config.serial.timeout())?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    println!("Serial port {} opened at {} baudrate.", port, baudrate);
    let stdout = io::stdout();
    let count = serial::dump_bytes(&mut serial_port, &mut stdout.lock(), &running)?;
    println!("\nSerial port {} closed.", port);

    info!("Received {} bytes", count);
    Ok(())
}

enum OutputMode {
    Console,
    Json,
    Plot,
}

fn run_get_current(
    config: &AppConfig,
    port: &str,
    log: Option<PathBuf>,
    verbose: bool,
    output: OutputMode,
) -> Result<()> {
    let acquisition = &config.acquisition;
    for (name, value) in [
        ("sampling period", acquisition.sampling_period_ms),
        ("LSB charge", acquisition.lsb_charge_ac),
    ] {
        if !value.is_finite() || value <= 0.0 {
            bail!(SharedError::config(format!("{} must be positive, got {}", name, value)));
        }
    }
    let layout = acquisition.frame_layout()?;
    let calibration = acquisition.calibration();

    info!(
        "Sampling period {} ms, LSB {} aC",
        calibration.sampling_period_ms, calibration.lsb_charge_ac
    );

    let serial_port = serial::open_port(port, config.serial.baudrate, config.serial.timeout())?;
    let mut monitor = CurrentMonitor::new(serial_port, layout, calibration);
    let running = monitor.get_running_flag();
    install_ctrlc_handler(Arc::clone(&running))?;

    let mut sinks: Vec<Box<dyn MeasurementSink>> = Vec::new();
    if let Some(path) = log {
        sinks.push(Box::new(CsvLogSink::create(path, verbose)?));
    }
    match output {
        OutputMode::Console => sinks.push(Box::new(ConsoleSink::new(io::stdout(), verbose))),
        OutputMode::Json => sinks.push(Box::new(JsonSink::new(io::stdout(), verbose))),
        OutputMode::Plot => sinks.push(Box::new(PlotSink::new(Arc::clone(&running), verbose)?)),
    }

    let stats = monitor.run(&mut sinks)?;
    drop(sinks);

    if let Some(average) = stats.average_fa {
        eprintln!(
            "Average current: {} over {} frames",
            format_current(average),
            stats.frames
        );
    }
    Ok(())
}

fn run_set_dac(
    config: &AppConfig,
    port: &str,
    channel: &str,
    voltage: f64,
    baudrate: Option<u32>,
) -> Result<()> {
    // Reject bad input before touching the port
    let channel: DacChannel = channel.parse()?;
    let command = DacCommand::from_voltage(channel, voltage, config.dac.reference_voltage)?;

    let baudrate = baudrate.unwrap_or(config.serial.baudrate);
    let mut serial_port = serial::open_port(port, baudrate, config.serial.timeout())?;
    serial::send_dac_command(&mut serial_port, &command)?;

    println!(
        "Channel {} set to {}V - ({})",
        command.channel,
        voltage,
        command.binary_string()
    );
    Ok(())
}

fn run_set_keithley(config: &AppConfig, address: &str, current: f64, verbose: bool) -> Result<()> {
    let address: KeithleyAddress = address.parse()?;
    let timeout = config.keithley.timeout();

    let transport = keithley::open_transport(&address, timeout, config.keithley.baudrate)?;
    let mut session = ScpiSession::new(transport, timeout);
    let reading = keithley::set_source_current(&mut session, current)
        .with_context(|| format!("Failed to set the source current on {}", address))?;

    if verbose {
        println!("Keithley reading: {}", reading);
    }
    info!("Keithley at {} sourcing {} uA", address, current);
    Ok(())
}

/// Generate a default configuration file
fn generate_config_file(output_path: PathBuf) -> Result<()> {
    let config = AppConfig::new();
    config.save_to_file(&output_path)?;

    println!("Generated configuration file: {}", output_path.display());
    println!("Edit the file to customize settings, then run:");
    println!("   accurate --config {} get-current <port>", output_path.display());

    Ok(())
}
