//! Long-running decoder for the controller's sample stream.
//!
//! Consumes bytes from a [`ByteLink`], parses frames, enforces the sampling
//! session lifecycle and writes tabular records. Designed to run on its own
//! thread; the owning thread cancels it through a [`CancelToken`].

use std::io;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::samples::store::{FirmwareMeta, SampleCounts, SampleWriter, StreamMeta};

use super::constants::OutputDataRate;
use super::error::DeviceError;
use super::frames::{
    BufferStatus, DeviceSetup, FirmwareVersion, Parsed, RxFrame, parse_rx,
};
use super::serial::ByteLink;

/// How long one read waits before the loop re-checks cancellation and the
/// message timeout.
const READ_SLICE: Duration = Duration::from_millis(100);
/// Upper bound on bytes requested per read.
const READ_CHUNK: usize = 512;
/// Bits on the wire per acceleration frame, for the throughput log line.
const ACCELERATION_FRAME_BITS: f64 = 9.0 * 8.0;

/// Decoder parameters for one invocation.
#[derive(Clone, Copy, Debug)]
pub struct DecodeConfig {
    /// Return after the first stopped session even without a sink.
    pub return_on_stop: bool,
    /// Fail with [`DeviceError::ReadTimeout`] when no byte arrives within
    /// this window; `None` waits forever.
    pub message_timeout: Option<Duration>,
}

impl DecodeConfig {
    /// Seconds-based constructor matching the CLI surface; 0 disables the
    /// timeout.
    pub fn new(return_on_stop: bool, message_timeout_s: f64) -> Self {
        let message_timeout =
            (message_timeout_s > 0.0).then(|| Duration::from_secs_f64(message_timeout_s));
        DecodeConfig {
            return_on_stop,
            message_timeout,
        }
    }
}

/// How a decode invocation ended (errors travel separately).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A session ran to its stopped frame.
    Finished,
    /// The cancel token was set; the decoder quit between reads.
    Cancelled,
}

/// Per-session bookkeeping, reset by each started frame.
#[derive(Debug, Default)]
struct Session {
    running: bool,
    requested: u16,
    /// Total records this session; the low 16 bits are the expected index.
    received: u32,
    started_at: Option<Instant>,
    setup: Option<DeviceSetup>,
    firmware: Option<FirmwareVersion>,
    buffer_status: Option<BufferStatus>,
}

impl Session {
    fn expected_index(&self) -> u16 {
        (self.received % 65_536) as u16
    }
}

/// Streaming decoder over a byte link.
///
/// The per-process sequence counter increments at every stopped session and
/// prefixes each record, so multiple sessions decoded into one sink stay
/// distinguishable.
pub struct StreamDecoder<L> {
    link: L,
    buffer: Vec<u8>,
    sequence: u32,
}

impl<L: ByteLink> StreamDecoder<L> {
    pub fn new(link: L) -> Self {
        StreamDecoder {
            link,
            buffer: Vec::with_capacity(4096),
            sequence: 0,
        }
    }

    /// Decode until a session completes, the cancel token is set, or a
    /// session-fatal condition surfaces.
    ///
    /// With a sink (or `return_on_stop`) a stopped frame moves the decoder
    /// into a drain phase: trailing configuration frames are still consumed
    /// so the metadata comment carries them, and the first quiescent read
    /// completes the invocation.
    pub fn decode(
        &mut self,
        cfg: DecodeConfig,
        mut sink: Option<&mut SampleWriter>,
        cancel: &CancelToken,
    ) -> Result<DecodeOutcome, DeviceError> {
        let mut session = Session::default();
        let mut draining = false;
        let mut last_byte = Instant::now();

        loop {
            if cancel.is_set() {
                info!("decoder stopped ahead of time (cancel requested)");
                return Ok(DecodeOutcome::Cancelled);
            }

            let chunk = self.link.read_bytes(READ_CHUNK, Some(READ_SLICE))?;
            if chunk.is_empty() {
                if draining {
                    self.finish(&session, sink.as_deref_mut())?;
                    return Ok(DecodeOutcome::Finished);
                }
                if let Some(limit) = cfg.message_timeout {
                    let observed = last_byte.elapsed();
                    if observed > limit {
                        return Err(DeviceError::ReadTimeout { limit, observed });
                    }
                }
                continue;
            }
            last_byte = Instant::now();
            self.buffer.extend_from_slice(&chunk);

            loop {
                match parse_rx(&self.buffer) {
                    Parsed::NeedMore => break,
                    Parsed::Unknown(id) => return Err(DeviceError::UnknownResponse(id)),
                    Parsed::Frame(frame, consumed) => {
                        self.buffer.drain(..consumed);
                        if self.dispatch(frame, &mut session, sink.as_deref_mut(), &cfg)? {
                            if sink.is_some() {
                                // Trailing configuration frames still belong
                                // to this session's metadata.
                                draining = true;
                            } else {
                                return Ok(DecodeOutcome::Finished);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Handle one frame; returns whether the stream is complete and the
    /// decoder should drain.
    fn dispatch(
        &mut self,
        frame: RxFrame,
        session: &mut Session,
        sink: Option<&mut SampleWriter>,
        cfg: &DecodeConfig,
    ) -> Result<bool, DeviceError> {
        match frame {
            RxFrame::FifoOverflow => return Err(DeviceError::FifoOverflow),
            RxFrame::BufferOverflow => return Err(DeviceError::BufferOverflow),
            RxFrame::TransmissionError => return Err(DeviceError::TransmissionError),
            RxFrame::Fault(code) => return Err(DeviceError::ControllerFault(code)),

            RxFrame::SamplingStarted { max_samples } => {
                info!("sampling started, max_samples={max_samples}");
                session.running = true;
                session.requested = max_samples;
                session.received = 0;
                session.started_at = Some(Instant::now());
                match sink {
                    Some(writer) => writer.write_header()?,
                    None => info!("#seq #sample x[mg] y[mg] z[mg]"),
                }
            }

            RxFrame::Acceleration(accel) => {
                if !session.running {
                    warn!("acceleration record outside a session, index={}", accel.index);
                }
                let expected = session.expected_index();
                if accel.index != expected {
                    return Err(DeviceError::Sequence {
                        expected,
                        got: accel.index,
                    });
                }
                session.received += 1;
                match sink {
                    Some(writer) => writer.write_record(self.sequence, &accel)?,
                    None => info!("{:02} {accel}", self.sequence),
                }
            }

            RxFrame::DeviceSetup(setup) => {
                debug!(
                    "device setup: rate={} range={} scale={}",
                    setup.odr, setup.range, setup.scale
                );
                session.setup = Some(setup);
                if sink.is_none() {
                    let json =
                        serde_json::to_string(&metadata(session)).map_err(io::Error::from)?;
                    info!("# {json}");
                }
            }

            RxFrame::FirmwareVersion(version) => {
                debug!("firmware version {version}");
                session.firmware = Some(version);
            }

            RxFrame::BufferStatus(status) => {
                info!("buffer status: {status}");
                session.buffer_status = Some(status);
            }

            RxFrame::SamplingFinished => {
                info!("sampling finished at sample {}", session.received);
            }

            RxFrame::SamplingAborted => {
                warn!("sampling aborted by request");
            }

            RxFrame::SamplingStopped => {
                let elapsed = session
                    .started_at
                    .map(|t| t.elapsed().as_secs_f64())
                    .unwrap_or_default();
                if elapsed > 0.0 {
                    let samples = session.received as f64;
                    info!(
                        "run {:02}: processed {} samples in {:.6} s ({:.1} samples/s; {:.1} baud)",
                        self.sequence,
                        session.received,
                        elapsed,
                        samples / elapsed,
                        samples * ACCELERATION_FRAME_BITS / elapsed,
                    );
                } else {
                    info!("run {:02}: sampling stopped", self.sequence);
                }
                session.running = false;
                self.sequence += 1;
                return Ok(cfg.return_on_stop || sink.is_some());
            }

            // Replies to configuration queries issued concurrently by
            // another process; they carry no session state.
            RxFrame::OutputDataRate(odr) => debug!("output data rate: {odr}"),
            RxFrame::Range(range) => debug!("range: {range}"),
            RxFrame::Scale(scale) => debug!("scale: {scale}"),
            RxFrame::Uptime(ms) => debug!("uptime: {ms} ms"),
        }
        Ok(false)
    }

    fn finish(
        &mut self,
        session: &Session,
        sink: Option<&mut SampleWriter>,
    ) -> Result<(), DeviceError> {
        if let Some(status) = &session.buffer_status {
            debug!("final buffer status: {status}");
        }
        if let Some(writer) = sink {
            writer.write_metadata(&metadata(session))?;
            writer.flush()?;
            info!("data saved to {}", writer.path().display());
        }
        Ok(())
    }
}

fn metadata(session: &Session) -> StreamMeta {
    let setup = session.setup;
    StreamMeta {
        rate: setup
            .map(|s| s.odr.name().to_string())
            .unwrap_or_else(|| OutputDataRate::Odr3200.name().to_string()),
        range: setup.map(|s| s.range.name()).unwrap_or("G2").to_string(),
        scale: setup
            .map(|s| s.scale.name())
            .unwrap_or("FULL_RES_4MG_LSB")
            .to_string(),
        firmware: FirmwareMeta {
            version: session
                .firmware
                .map(|v| v.to_string())
                .unwrap_or_else(|| "0.0.0".to_string()),
        },
        samples: SampleCounts {
            requested: session.requested.to_string(),
            received: session.received.to_string(),
        },
    }
}
