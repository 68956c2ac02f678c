/// Talking to the accelerometer controller over its USB-CDC serial port.
pub mod client;
pub mod constants;
pub mod decoder;
pub mod error;
pub mod frames;
pub mod serial;

pub use client::{Controller, DeviceInfo, list_devices};
pub use constants::{FaultCode, HeaderId, OutputDataRate, Range, Scale};
pub use decoder::{DecodeConfig, DecodeOutcome, StreamDecoder};
pub use error::DeviceError;
pub use frames::{Acceleration, BufferStatus, DeviceSetup, FirmwareVersion, RxFrame, TxFrame};
pub use serial::{ByteLink, CdcSerial};
