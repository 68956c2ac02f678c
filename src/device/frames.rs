//! Frame codec: request encoding and response parsing.
//!
//! Responses are parsed from the front of a growing byte buffer that never
//! aligns on frame boundaries. The parser either produces one typed frame
//! plus the number of bytes it consumed, asks for more bytes, or reports an
//! unrecognized leading byte so the caller can drop it and re-synchronize.

use std::fmt;

use super::constants::{FaultCode, HeaderId, OutputDataRate, Range, Scale};

/// ADXL345 sensitivity at full resolution, mg per LSB.
pub const FULL_RESOLUTION_LSB_SCALE: f64 = 3.9;

/// Request to the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxFrame {
    SetOutputDataRate(OutputDataRate),
    GetOutputDataRate,
    SetRange(Range),
    GetRange,
    SetScale(Scale),
    GetScale,
    GetDeviceSetup,
    GetFirmwareVersion,
    GetUptime,
    GetBufferStatus,
    Reboot,
    /// n = 0 streams until an explicit stop.
    SamplingStart(u16),
    SamplingStop,
}

impl TxFrame {
    pub fn header_id(&self) -> HeaderId {
        match self {
            TxFrame::SetOutputDataRate(_) => HeaderId::TxSetOutputDataRate,
            TxFrame::GetOutputDataRate => HeaderId::TxGetOutputDataRate,
            TxFrame::SetRange(_) => HeaderId::TxSetRange,
            TxFrame::GetRange => HeaderId::TxGetRange,
            TxFrame::SetScale(_) => HeaderId::TxSetScale,
            TxFrame::GetScale => HeaderId::TxGetScale,
            TxFrame::GetDeviceSetup => HeaderId::TxGetDeviceSetup,
            TxFrame::GetFirmwareVersion => HeaderId::TxGetFirmwareVersion,
            TxFrame::GetUptime => HeaderId::TxGetUptime,
            TxFrame::GetBufferStatus => HeaderId::TxGetBufferStatus,
            TxFrame::Reboot => HeaderId::TxReboot,
            TxFrame::SamplingStart(_) => HeaderId::TxSamplingStart,
            TxFrame::SamplingStop => HeaderId::TxSamplingStop,
        }
    }

    /// Header byte followed by the payload bytes.
    pub fn pack(&self) -> Vec<u8> {
        let mut bytes = vec![self.header_id().value()];
        match self {
            TxFrame::SetOutputDataRate(odr) => bytes.push(odr.value()),
            TxFrame::SetRange(range) => bytes.push(range.value()),
            TxFrame::SetScale(scale) => bytes.push(scale.value()),
            TxFrame::SamplingStart(n) => bytes.extend_from_slice(&n.to_le_bytes()),
            _ => {}
        }
        bytes
    }
}

/// Firmware version reported by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Ring buffer statistics since the last sampling start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferStatus {
    pub size_bytes: u16,
    pub capacity_total: u16,
    pub capacity_used_max: u16,
    pub put_count: u16,
    pub take_count: u16,
    pub largest_tx_chunk_bytes: u16,
}

impl fmt::Display for BufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size_bytes={} capacity_total={} capacity_used_max={} put_count={} take_count={} largest_tx_chunk_bytes={}",
            self.size_bytes,
            self.capacity_total,
            self.capacity_used_max,
            self.put_count,
            self.take_count,
            self.largest_tx_chunk_bytes
        )
    }
}

/// Active configuration, packed into one byte on the wire: odr in bits 0..3,
/// range in bit 4, scale in bit 5.
///
/// The 1-bit range field only distinguishes G2 from G4; the layout is a
/// firmware compatibility contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceSetup {
    pub odr: OutputDataRate,
    pub range: Range,
    pub scale: Scale,
}

impl DeviceSetup {
    pub fn from_packed(byte: u8) -> Self {
        let odr = OutputDataRate::from_value(byte & 0b0000_1111)
            .unwrap_or(OutputDataRate::Odr0_10);
        let range = if byte & 0b0001_0000 != 0 { Range::G4 } else { Range::G2 };
        let scale = if byte & 0b0010_0000 != 0 {
            Scale::FullRes4MgLsb
        } else {
            Scale::Scaled10Bit
        };
        DeviceSetup { odr, range, scale }
    }

    pub fn to_packed(self) -> u8 {
        let range_bit = match self.range {
            Range::G2 => 0,
            _ => 1,
        };
        self.odr.value() | (range_bit << 4) | (self.scale.value() << 5)
    }
}

/// One acceleration record, already scaled to mg.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Acceleration {
    pub index: u16,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl fmt::Display for Acceleration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:05} {:+09.3} {:+09.3} {:+09.3}",
            self.index, self.x, self.y, self.z
        )
    }
}

/// Response from the controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RxFrame {
    OutputDataRate(OutputDataRate),
    Range(Range),
    Scale(Scale),
    DeviceSetup(DeviceSetup),
    FirmwareVersion(FirmwareVersion),
    /// Milliseconds since boot.
    Uptime(u32),
    BufferStatus(BufferStatus),
    FifoOverflow,
    SamplingStarted { max_samples: u16 },
    SamplingFinished,
    SamplingStopped,
    SamplingAborted,
    Acceleration(Acceleration),
    Fault(FaultCode),
    BufferOverflow,
    TransmissionError,
}

/// Outcome of one parse attempt at the front of the buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Parsed {
    /// The buffer holds no complete frame yet.
    NeedMore,
    /// The leading byte is not a known response id, or a known id carries a
    /// field value outside its domain. The caller drops one byte to resync.
    Unknown(u8),
    /// A complete frame and the number of bytes it occupied.
    Frame(RxFrame, usize),
}

fn le_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn le_i16(bytes: &[u8]) -> i16 {
    i16::from_le_bytes([bytes[0], bytes[1]])
}

/// Try to parse one response frame from the front of `buf`.
pub fn parse_rx(buf: &[u8]) -> Parsed {
    let Some(&first) = buf.first() else {
        return Parsed::NeedMore;
    };

    let Some(header) = HeaderId::from_value(first) else {
        return Parsed::Unknown(first);
    };
    let Some(len) = header.response_len() else {
        // A request id echoed back is just as unknown to the host.
        return Parsed::Unknown(first);
    };
    if buf.len() < len {
        return Parsed::NeedMore;
    }

    let payload = &buf[1..len];
    let frame = match header {
        HeaderId::RxOutputDataRate => match OutputDataRate::from_value(payload[0]) {
            Some(odr) => RxFrame::OutputDataRate(odr),
            None => return Parsed::Unknown(first),
        },
        HeaderId::RxRange => match Range::from_value(payload[0]) {
            Some(range) => RxFrame::Range(range),
            None => return Parsed::Unknown(first),
        },
        HeaderId::RxScale => match Scale::from_value(payload[0]) {
            Some(scale) => RxFrame::Scale(scale),
            None => return Parsed::Unknown(first),
        },
        HeaderId::RxDeviceSetup => RxFrame::DeviceSetup(DeviceSetup::from_packed(payload[0])),
        HeaderId::RxFirmwareVersion => RxFrame::FirmwareVersion(FirmwareVersion {
            major: payload[0],
            minor: payload[1],
            patch: payload[2],
        }),
        HeaderId::RxUptime => {
            RxFrame::Uptime(u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]))
        }
        HeaderId::RxBufferStatus => RxFrame::BufferStatus(BufferStatus {
            size_bytes: le_u16(&payload[0..2]),
            capacity_total: le_u16(&payload[2..4]),
            capacity_used_max: le_u16(&payload[4..6]),
            put_count: le_u16(&payload[6..8]),
            take_count: le_u16(&payload[8..10]),
            largest_tx_chunk_bytes: le_u16(&payload[10..12]),
        }),
        HeaderId::RxFifoOverflow => RxFrame::FifoOverflow,
        HeaderId::RxSamplingStarted => RxFrame::SamplingStarted {
            max_samples: le_u16(&payload[0..2]),
        },
        HeaderId::RxSamplingFinished => RxFrame::SamplingFinished,
        HeaderId::RxSamplingStopped => RxFrame::SamplingStopped,
        HeaderId::RxSamplingAborted => RxFrame::SamplingAborted,
        HeaderId::RxAcceleration => RxFrame::Acceleration(Acceleration {
            index: le_u16(&payload[0..2]),
            x: FULL_RESOLUTION_LSB_SCALE * f64::from(le_i16(&payload[2..4])),
            y: FULL_RESOLUTION_LSB_SCALE * f64::from(le_i16(&payload[4..6])),
            z: FULL_RESOLUTION_LSB_SCALE * f64::from(le_i16(&payload[6..8])),
        }),
        HeaderId::RxFault => match FaultCode::from_value(payload[0]) {
            Some(code) => RxFrame::Fault(code),
            None => return Parsed::Unknown(first),
        },
        HeaderId::RxBufferOverflow => RxFrame::BufferOverflow,
        HeaderId::RxTransmissionError => RxFrame::TransmissionError,
        _ => unreachable!("response_len() filtered request ids"),
    };

    Parsed::Frame(frame, len)
}
