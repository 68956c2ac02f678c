//! Drive a planned series of capture runs.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::cancel::CancelToken;
use crate::device::constants::OutputDataRate;
use crate::gcode::{TrajectoryOptions, input_shaping_command};
use crate::printer::PrinterCommand;

use super::planner::RunPlanner;
use super::step::{StepConfig, StepOutcome, TaskError, run_step};

/// Pause between two runs of a series.
const INTER_RUN_GAP: Duration = Duration::from_millis(200);

/// Shared per-run parameters of a series; the planner contributes the
/// varying axis/frequency/zeta/sequence tuple.
#[derive(Clone, Debug)]
pub struct SeriesConfig {
    pub device: String,
    pub odr: OutputDataRate,
    pub timelapse_s: f64,
    pub timeout_s: f64,
    pub start_mm: (i32, i32, i32),
    pub distance_mm: i32,
    pub step_repeat_count: u32,
    pub output_dir: PathBuf,
    pub dry_run: bool,
}

/// Execute every planned run in order.
///
/// Auto-home and go-to-start are sent on the first run only; each run
/// returns to its start position. The first failing run stops the series;
/// a set cancel token ends it early with [`StepOutcome::Aborted`].
pub fn run_series(
    planner: &RunPlanner,
    cfg: &SeriesConfig,
    printer: &dyn PrinterCommand,
    cancel: &CancelToken,
) -> Result<StepOutcome, TaskError> {
    let runs = planner.plan();
    info!("planned runs={}", runs.len());
    if runs.is_empty() {
        return Ok(StepOutcome::Completed);
    }

    let total = runs.len();
    for (nr, run) in runs.iter().enumerate() {
        let run_nr = nr + 1;
        let percent = (run_nr as f64 / total as f64 * 100.0 + 0.5) as u32;
        info!("{percent}% run {run_nr}/{total}");

        let first = run_nr == 1;
        let step = StepConfig {
            device: cfg.device.clone(),
            odr: cfg.odr,
            timelapse_s: cfg.timelapse_s,
            timeout_s: cfg.timeout_s,
            out_path: Some(cfg.output_dir.join(run.filename())),
            extra_gcode: Some(input_shaping_command(
                run.axis,
                run.frequency_hz,
                run.zeta_em2,
            )),
            trajectory: TrajectoryOptions {
                axis: run.axis,
                start_mm: cfg.start_mm,
                distance_mm: cfg.distance_mm,
                step_repeat_count: cfg.step_repeat_count,
                go_to_start: first,
                return_to_start: true,
                auto_home: first,
            },
            dry_run: cfg.dry_run,
        };

        let started = Instant::now();
        let outcome = run_step(&step, printer, cancel)?;

        if outcome == StepOutcome::Aborted || cancel.is_set() {
            warn!("series stopped ahead of time after {run_nr} runs (stop flag set)");
            return Ok(StepOutcome::Aborted);
        }

        info!("sampling job done in {:.3}s", started.elapsed().as_secs_f64());
        thread::sleep(INTER_RUN_GAP);
    }

    Ok(StepOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcode::Axis;
    use crate::printer::{PrinterCommand, PrinterError};
    use std::sync::Mutex;

    /// Records every batch it is asked to send.
    struct RecordingPrinter {
        batches: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingPrinter {
        fn new() -> Self {
            RecordingPrinter {
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    impl PrinterCommand for RecordingPrinter {
        fn send_commands(&self, commands: &[String]) -> Result<(), PrinterError> {
            self.batches.lock().unwrap().push(commands.to_vec());
            Ok(())
        }
    }

    fn dry_series() -> (RunPlanner, SeriesConfig) {
        let planner = RunPlanner {
            axes: vec![Axis::X],
            fx_start_hz: 10,
            fx_stop_hz: 20,
            fx_step_hz: 10,
            zeta_start_em2: 0,
            zeta_stop_em2: 0,
            zeta_step_em2: 5,
            sequence_repeat_count: 1,
            prefix: "cap".to_string(),
        };
        let cfg = SeriesConfig {
            device: "/dev/null".to_string(),
            odr: OutputDataRate::Odr3200,
            timelapse_s: 0.0,
            timeout_s: 0.0,
            start_mm: (200, 140, 20),
            distance_mm: 20,
            step_repeat_count: 1,
            output_dir: PathBuf::from("."),
            dry_run: true,
        };
        (planner, cfg)
    }

    #[test]
    fn first_run_homes_and_later_runs_do_not() {
        let (planner, cfg) = dry_series();
        let printer = RecordingPrinter::new();
        let outcome = run_series(&planner, &cfg, &printer, &CancelToken::new()).unwrap();
        assert_eq!(outcome, StepOutcome::Completed);

        let batches = printer.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0][0], "M593 X F10 D0.0");
        assert!(batches[0].contains(&"G28 O X Y Z".to_string()));
        assert!(batches[0].contains(&"G1 X200 Y140 Z20".to_string()));
        assert_eq!(batches[1][0], "M593 X F20 D0.0");
        assert!(!batches[1].contains(&"G28 O X Y Z".to_string()));
    }

    #[test]
    fn preset_cancel_aborts_after_the_first_run() {
        let (planner, cfg) = dry_series();
        let printer = RecordingPrinter::new();
        let cancel = CancelToken::new();
        cancel.set();
        let outcome = run_series(&planner, &cfg, &printer, &cancel).unwrap();
        assert_eq!(outcome, StepOutcome::Aborted);
        assert_eq!(printer.batches.lock().unwrap().len(), 1);
    }

    #[test]
    fn empty_plan_completes_immediately() {
        let (mut planner, cfg) = dry_series();
        planner.axes.clear();
        let printer = RecordingPrinter::new();
        let outcome = run_series(&planner, &cfg, &printer, &CancelToken::new()).unwrap();
        assert_eq!(outcome, StepOutcome::Completed);
        assert!(printer.batches.lock().unwrap().is_empty());
    }
}
