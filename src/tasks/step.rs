//! Execute one capture run: decoder thread, sampling start, G-code, join.

use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::device::client::{Controller, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT};
use crate::device::constants::OutputDataRate;
use crate::device::decoder::{DecodeConfig, DecodeOutcome, StreamDecoder};
use crate::device::error::DeviceError;
use crate::device::serial::CdcSerial;
use crate::gcode::{TrajectoryOptions, coplanar_trajectory};
use crate::printer::{PrinterCommand, PrinterError};
use crate::samples::store::SampleWriter;

/// Pause between spawning the decoder thread and commanding the sampling
/// start, so the decoder is reading before the device emits bytes.
const SETTLE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Printer(#[from] PrinterError),

    #[error("i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("decoder thread panicked")]
    DecoderPanic,
}

/// Whether a run (or series) ran to completion or quit on the cancel token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Aborted,
}

/// Everything one run needs besides the printer connection.
#[derive(Clone, Debug)]
pub struct StepConfig {
    /// Serial device node, e.g. `/dev/ttyACM0`.
    pub device: String,
    pub odr: OutputDataRate,
    /// How long to record, in seconds.
    pub timelapse_s: f64,
    /// Decoder message timeout in seconds; 0 waits forever.
    pub timeout_s: f64,
    /// Decoded stream destination; `None` logs records instead.
    pub out_path: Option<PathBuf>,
    /// Preamble line sent before the trajectory, e.g. input shaping.
    pub extra_gcode: Option<String>,
    pub trajectory: TrajectoryOptions,
    /// Pretend to run with identical timing, touching neither the
    /// controller nor the output file.
    pub dry_run: bool,
}

/// Sample budget for a run: full rate over the timelapse, rounded up to an
/// even count so FFT consumers get an even-length series.
fn sample_budget(odr: OutputDataRate, timelapse_s: f64) -> Result<u16, DeviceError> {
    let samples = (odr.hz() * timelapse_s) as u32;
    let samples = samples + samples % 2;
    u16::try_from(samples).map_err(|_| DeviceError::SampleBudgetTooLarge(samples))
}

fn gcode_commands(cfg: &StepConfig) -> Vec<String> {
    let mut commands = Vec::new();
    if let Some(extra) = cfg.extra_gcode.as_deref() {
        if !extra.is_empty() {
            commands.push(extra.to_string());
        }
    }
    commands.extend(coplanar_trajectory(&cfg.trajectory));
    commands
}

/// Run one capture step.
///
/// The decoder runs on its own thread and owns the reading half of the
/// serial port; the calling thread keeps a cloned handle for the single
/// sampling-start write, submits the G-code and joins. The join result
/// carries the first decoder error.
pub fn run_step(
    cfg: &StepConfig,
    printer: &dyn PrinterCommand,
    cancel: &CancelToken,
) -> Result<StepOutcome, TaskError> {
    let commands = gcode_commands(cfg);

    if cfg.dry_run {
        info!("dry run: {} gcode lines, no controller involved", commands.len());
        printer.send_commands(&commands)?;
        thread::sleep(Duration::from_secs_f64(cfg.timelapse_s));
        return Ok(if cancel.is_set() {
            StepOutcome::Aborted
        } else {
            StepOutcome::Completed
        });
    }

    let link = CdcSerial::open(&cfg.device, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT)
        .map_err(DeviceError::Io)?;
    let mut ctrl = Controller::new(link.try_clone().map_err(DeviceError::Io)?);
    ctrl.set_output_data_rate(cfg.odr)?;
    let effective_odr = ctrl.get_output_data_rate()?;
    let samples_total = sample_budget(effective_odr, cfg.timelapse_s)?;
    info!(
        "device {} requested_odr={} effective_odr={} timelapse_s={} num_samples={}",
        cfg.device, cfg.odr, effective_odr, cfg.timelapse_s, samples_total
    );

    let mut sink = cfg
        .out_path
        .as_ref()
        .map(|path| SampleWriter::create(path))
        .transpose()?;
    let decode_cfg = DecodeConfig::new(true, cfg.timeout_s);
    let decoder_cancel = cancel.clone();
    let handle = thread::Builder::new()
        .name("stream-decoder".to_string())
        .spawn(move || {
            let mut decoder = StreamDecoder::new(link);
            decoder.decode(decode_cfg, sink.as_mut(), &decoder_cancel)
        })?;

    thread::sleep(SETTLE);
    info!("send command: start sampling n={samples_total}");
    if let Err(e) = ctrl.start_sampling(samples_total) {
        warn!("start sampling failed, stopping decoder");
        cancel.set();
        let _ = handle.join();
        return Err(e.into());
    }

    if let Err(e) = printer.send_commands(&commands) {
        warn!("printer submission failed, stopping decoder");
        cancel.set();
        let _ = handle.join();
        return Err(e.into());
    }

    debug!("waiting for the decoding thread...");
    match handle.join() {
        Ok(Ok(DecodeOutcome::Finished)) => Ok(StepOutcome::Completed),
        Ok(Ok(DecodeOutcome::Cancelled)) => Ok(StepOutcome::Aborted),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(TaskError::DecoderPanic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcode::Axis;
    use crate::printer::DryRunPrinter;

    #[test]
    fn budget_rounds_up_to_even() {
        assert_eq!(sample_budget(OutputDataRate::Odr3200, 1.0).unwrap(), 3200);
        // 25 Hz over 0.1 s truncates to 2 samples.
        assert_eq!(sample_budget(OutputDataRate::Odr25, 0.1).unwrap(), 2);
        // 3.13 Hz over 1 s truncates to 3, snapped to 4.
        assert_eq!(sample_budget(OutputDataRate::Odr3_13, 1.0).unwrap(), 4);
        assert_eq!(sample_budget(OutputDataRate::Odr0_10, 5.0).unwrap(), 0);
    }

    #[test]
    fn budget_beyond_u16_is_rejected() {
        match sample_budget(OutputDataRate::Odr3200, 60.0) {
            Err(DeviceError::SampleBudgetTooLarge(n)) => assert_eq!(n, 192_000),
            other => panic!("expected budget error, got {other:?}"),
        }
    }

    fn dry_config() -> StepConfig {
        StepConfig {
            device: "/dev/null".to_string(),
            odr: OutputDataRate::Odr3200,
            timelapse_s: 0.01,
            timeout_s: 0.0,
            out_path: None,
            extra_gcode: Some("M593 X F30 D0.15".to_string()),
            trajectory: TrajectoryOptions {
                axis: Axis::X,
                start_mm: (200, 140, 20),
                distance_mm: 20,
                step_repeat_count: 2,
                go_to_start: true,
                return_to_start: true,
                auto_home: true,
            },
            dry_run: true,
        }
    }

    #[test]
    fn dry_run_completes_without_a_device() {
        let outcome = run_step(&dry_config(), &DryRunPrinter, &CancelToken::new()).unwrap();
        assert_eq!(outcome, StepOutcome::Completed);
    }

    #[test]
    fn dry_run_reports_a_preset_cancel() {
        let cancel = CancelToken::new();
        cancel.set();
        let outcome = run_step(&dry_config(), &DryRunPrinter, &cancel).unwrap();
        assert_eq!(outcome, StepOutcome::Aborted);
    }

    #[test]
    fn extra_gcode_precedes_the_trajectory() {
        let commands = gcode_commands(&dry_config());
        assert_eq!(commands[0], "M593 X F30 D0.15");
        assert_eq!(commands[1], "G28 O X Y Z");
    }

    #[test]
    fn empty_extra_gcode_is_dropped() {
        let mut cfg = dry_config();
        cfg.extra_gcode = Some(String::new());
        assert_eq!(gcode_commands(&cfg)[0], "G28 O X Y Z");
    }
}
