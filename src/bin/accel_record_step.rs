//! Record acceleration for one run while sending G-code to the printer.

use std::process::exit;

use anyhow::Context;
use clap::Parser;

use accel_host_utils::cancel::CancelToken;
use accel_host_utils::device::constants::OutputDataRate;
use accel_host_utils::gcode::{Axis, TrajectoryOptions};
use accel_host_utils::printer::{DryRunPrinter, OctoRemote, PrinterCommand};
use accel_host_utils::storage::filename::default_stream_filename;
use accel_host_utils::tasks::step::{StepConfig, StepOutcome, run_step};

/// Parse a "x,y,z" millimeter position.
fn parse_xyz(pos: &str) -> Result<(i32, i32, i32), String> {
    let mut parts = pos.trim_matches('"').split(',');
    let mut next = || -> Result<i32, String> {
        parts
            .next()
            .ok_or_else(|| format!("expected x,y,z position, got {pos:?}"))?
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("bad coordinate in {pos:?}: {e}"))
    };
    let xyz = (next()?, next()?, next()?);
    if parts.next().is_some() {
        return Err(format!("expected exactly three coordinates in {pos:?}"));
    }
    Ok(xyz)
}

/// Records acceleration while sending G-code to the printer.
#[derive(Parser)]
#[command(name = "accel-record-step", version)]
struct Cli {
    /// OctoPrint address.
    #[arg(long, help_heading = "REST API")]
    address: String,

    /// OctoPrint port.
    #[arg(long, default_value_t = 80, help_heading = "REST API")]
    port: u16,

    /// OctoPrint API key.
    #[arg(long, default_value = "", help_heading = "REST API")]
    key: String,

    /// Axis to move.
    #[arg(long, value_enum, default_value_t = Axis::X, help_heading = "Trajectory")]
    axis: Axis,

    /// Start point in mm to begin the trajectory at, e.g. "200,140,20".
    #[arg(long, value_parser = parse_xyz, default_value = "200,140,20", help_heading = "Trajectory")]
    start: (i32, i32, i32),

    /// Extra G-code to send before the trajectory (e.g. input shaping:
    /// "M593 X F30 D0.15").
    #[arg(long, default_value = "", help_heading = "Trajectory")]
    extragcode: String,

    /// Distance in mm to travel back and forth.
    #[arg(long, default_value_t = 20, help_heading = "Trajectory")]
    distance: i32,

    /// Repeat the travel pattern stepcount times.
    #[arg(long, default_value_t = 4, help_heading = "Trajectory")]
    stepcount: u32,

    /// Go to the start position first, then start repetitions.
    #[arg(long, help_heading = "Trajectory")]
    gostart: bool,

    /// Return to the start point after the last repetition.
    #[arg(long, help_heading = "Trajectory")]
    returnstart: bool,

    /// Perform auto homing before the trajectory.
    #[arg(long, help_heading = "Trajectory")]
    autohome: bool,

    /// Controller serial device node to communicate with.
    #[arg(long, default_value = "/dev/ttyACM0", help_heading = "Controller")]
    device: String,

    /// Sampling rate to configure before sending G-code.
    #[arg(long, value_enum, default_value_t = OutputDataRate::Odr3200, help_heading = "Controller")]
    outputdatarate: OutputDataRate,

    /// Timespan to record captured samples, in seconds.
    #[arg(long, default_value_t = 1.0, help_heading = "Controller")]
    timelapse: f64,

    /// How long to wait for stream data before failing; 0 waits forever.
    #[arg(long, default_value_t = 0.0, help_heading = "Output")]
    timeout: f64,

    /// Pretend to run but invoke neither OctoPrint nor the controller.
    #[arg(long, help_heading = "Output")]
    dryrun: bool,

    /// Log decoded records instead of writing a file.
    #[arg(long, group = "out", help_heading = "Output")]
    stdout: bool,

    /// Output file (*.tsv); leave the value empty for a generated name.
    #[arg(long, group = "out", num_args = 0..=1, default_missing_value = "", help_heading = "Output")]
    file: Option<String>,
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let out_path = if cli.stdout {
        None
    } else {
        cli.file.map(|file| {
            if file.is_empty() {
                default_stream_filename("op-capture").into()
            } else {
                file.into()
            }
        })
    };

    let cancel = CancelToken::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || handler.set()).context("installing the ctrl-c handler")?;

    let printer: Box<dyn PrinterCommand> = if cli.dryrun {
        Box::new(DryRunPrinter)
    } else {
        Box::new(OctoRemote::new(&cli.address, cli.port, &cli.key))
    };

    let cfg = StepConfig {
        device: cli.device,
        odr: cli.outputdatarate,
        timelapse_s: cli.timelapse,
        timeout_s: cli.timeout,
        out_path,
        extra_gcode: (!cli.extragcode.is_empty()).then_some(cli.extragcode),
        trajectory: TrajectoryOptions {
            axis: cli.axis,
            start_mm: cli.start,
            distance_mm: cli.distance,
            step_repeat_count: cli.stepcount,
            go_to_start: cli.gostart,
            return_to_start: cli.returnstart,
            auto_home: cli.autohome,
        },
        dry_run: cli.dryrun,
    };

    match run_step(&cfg, printer.as_ref(), &cancel)? {
        StepOutcome::Completed => Ok(0),
        StepOutcome::Aborted => Ok(1),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => exit(code),
        Err(e) => {
            log::error!("{e:#}");
            exit(1);
        }
    }
}
