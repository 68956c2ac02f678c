use std::io;
use std::time::Duration;

use thiserror::Error;

use super::constants::FaultCode;
use super::frames::RxFrame;

/// Everything that can go wrong between the host and the controller.
///
/// None of these are retried; a failed session is over.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("serial i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("no data for {observed:?} (limit {limit:?})")]
    ReadTimeout { limit: Duration, observed: Duration },

    #[error("unknown response header id {0}")]
    UnknownResponse(u8),

    #[error("reply does not match the request: {0:?}")]
    UnexpectedReply(RxFrame),

    #[error("sensor fifo overflow")]
    FifoOverflow,

    #[error("controller buffer overflow")]
    BufferOverflow,

    #[error("controller reported a transmission error")]
    TransmissionError,

    #[error("controller fault {0}, reboot recommended")]
    ControllerFault(FaultCode),

    #[error("acceleration index out of order: expected {expected}, got {got}")]
    Sequence { expected: u16, got: u16 },

    #[error("sample count {0} exceeds the 16-bit request limit")]
    SampleBudgetTooLarge(u32),
}
