//! Record a series of capture runs while sweeping input-shaping parameters.

use std::path::PathBuf;
use std::process::exit;

use anyhow::Context;
use clap::Parser;
use log::info;

use accel_host_utils::cancel::CancelToken;
use accel_host_utils::device::constants::OutputDataRate;
use accel_host_utils::gcode::{Axis, parse_axis_set};
use accel_host_utils::printer::{DryRunPrinter, OctoRemote, PrinterCommand};
use accel_host_utils::tasks::planner::RunPlanner;
use accel_host_utils::tasks::series::{SeriesConfig, run_series};
use accel_host_utils::tasks::step::StepOutcome;

fn parse_xyz(pos: &str) -> Result<(i32, i32, i32), String> {
    let coords: Vec<i32> = pos
        .trim_matches('"')
        .split(',')
        .map(|c| c.trim().parse::<i32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("bad coordinate in {pos:?}: {e}"))?;
    match coords.as_slice() {
        [x, y, z] => Ok((*x, *y, *z)),
        _ => Err(format!("expected x,y,z position, got {pos:?}")),
    }
}

/// Axis combination as a single CLI value (a bare `Vec` would make clap
/// expect one axis per occurrence).
#[derive(Clone, Debug, PartialEq, Eq)]
struct AxisSet(Vec<Axis>);

fn parse_axes(names: &str) -> Result<AxisSet, String> {
    parse_axis_set(names).map(AxisSet)
}

fn existing_dir(path: &str) -> Result<PathBuf, String> {
    let dir = PathBuf::from(path);
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(format!("directory {path} does not exist"))
    }
}

/// Records a series of recording-step samples while sending G-code to the
/// printer: one run per (axis, frequency, zeta, sequence) combination.
#[derive(Parser)]
#[command(name = "accel-record-series", version)]
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

    /// Axes to move, e.g. "x", "xy" or "xyz".
    #[arg(long, value_parser = parse_axes, default_value = "x", help_heading = "Trajectory")]
    axis: AxisSet,

    /// Start point in mm to begin the trajectory at, e.g. "200,140,20".
    #[arg(long, value_parser = parse_xyz, default_value = "200,140,20", help_heading = "Trajectory")]
    start: (i32, i32, i32),

    /// Distance in mm to travel back and forth.
    #[arg(long, default_value_t = 20, help_heading = "Trajectory")]
    distance: i32,

    /// Travel back and forth N times per run.
    #[arg(long, default_value_t = 4, help_heading = "Trajectory")]
    repetitions: u32,

    /// Repeat each parameter combination R times.
    #[arg(long, default_value_t = 1, help_heading = "Task")]
    runs: u16,

    /// Start frequency in Hz (see Marlin M593).
    #[arg(long, default_value_t = 10, help_heading = "Task")]
    fxstart: u16,

    /// Stop frequency in Hz.
    #[arg(long, default_value_t = 80, help_heading = "Task")]
    fxstop: u16,

    /// Frequency increment in Hz.
    #[arg(long, default_value_t = 10, help_heading = "Task")]
    fxstep: u16,

    /// Zeta damping factor (times 100).
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100), help_heading = "Task")]
    zetastart: u8,

    /// Zeta damping factor (times 100).
    #[arg(long, default_value_t = 25, value_parser = clap::value_parser!(u8).range(0..=100), help_heading = "Task")]
    zetastop: u8,

    /// Zeta damping factor increment (times 100).
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=100), help_heading = "Task")]
    zetastep: u8,

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

    /// Prefix of the output file names.
    #[arg(long, default_value = "octo-capture", help_heading = "Output")]
    fileprefix: String,

    /// Output directory; must exist.
    #[arg(long, value_parser = existing_dir, default_value = "./data/", help_heading = "Output")]
    directory: PathBuf,
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let cancel = CancelToken::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || handler.set()).context("installing the ctrl-c handler")?;

    let printer: Box<dyn PrinterCommand> = if cli.dryrun {
        Box::new(DryRunPrinter)
    } else {
        Box::new(OctoRemote::new(&cli.address, cli.port, &cli.key))
    };

    let planner = RunPlanner {
        axes: cli.axis.0,
        fx_start_hz: cli.fxstart,
        fx_stop_hz: cli.fxstop,
        fx_step_hz: cli.fxstep,
        zeta_start_em2: cli.zetastart,
        zeta_stop_em2: cli.zetastop,
        zeta_step_em2: cli.zetastep,
        sequence_repeat_count: cli.runs,
        prefix: cli.fileprefix,
    };

    let cfg = SeriesConfig {
        device: cli.device,
        odr: cli.outputdatarate,
        timelapse_s: cli.timelapse,
        timeout_s: cli.timeout,
        start_mm: cli.start,
        distance_mm: cli.distance,
        step_repeat_count: cli.repetitions,
        output_dir: cli.directory,
        dry_run: cli.dryrun,
    };

    match run_series(&planner, &cfg, printer.as_ref(), &cancel)? {
        StepOutcome::Completed => {
            info!("series done");
            Ok(0)
        }
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
