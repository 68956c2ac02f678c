/// Shared cancellation token (one setter, many observers).
pub mod cancel;
/// Wire protocol, serial transport, request/response client and stream decoder.
pub mod device;
/// Coplanar back-and-forth trajectory synthesis.
pub mod gcode;
/// Printer control plane (G-code submission over HTTP).
pub mod printer;
/// Decoded sample records: writer, loader and in-memory columns.
pub mod samples;
/// Filename schema and batch file selection.
pub mod storage;
/// Run planning and campaign execution.
pub mod tasks;

pub use cancel::CancelToken;
pub use device::client::Controller;
pub use device::decoder::StreamDecoder;
pub use device::serial::CdcSerial;
