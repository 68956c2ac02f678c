//! Synchronous request/response client for the controller.

use std::io;
use std::time::Duration;

use serde::Serialize;
use serialport::SerialPortType;

use super::constants::{HeaderId, OutputDataRate, Range, Scale};
use super::error::DeviceError;
use super::frames::{
    BufferStatus, DeviceSetup, FirmwareVersion, Parsed, RxFrame, TxFrame, parse_rx,
};
use super::serial::{ByteLink, CdcSerial};

/// USB vendor id of the controller, see https://pid.codes/pids/
pub const DEVICE_VID: u16 = 0x1209;
/// USB product id of the controller.
pub const DEVICE_PID: u16 = 0xE11A;

/// Default read timeout for request/response exchanges.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);
/// Default write timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// One attached controller as reported by the serial enumerator.
#[derive(Clone, Debug, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial: Option<String>,
}

/// All attached controllers, filtered by the controller's VID/PID pair.
pub fn list_devices() -> io::Result<Vec<DeviceInfo>> {
    let ports = serialport::available_ports().map_err(io::Error::from)?;
    let mut devices = Vec::new();
    for port in ports {
        if let SerialPortType::UsbPort(usb) = port.port_type {
            if usb.vid == DEVICE_VID && usb.pid == DEVICE_PID {
                devices.push(DeviceInfo {
                    name: port.port_name,
                    manufacturer: usb.manufacturer,
                    product: usb.product,
                    vendor_id: usb.vid,
                    product_id: usb.pid,
                    serial: usb.serial_number,
                });
            }
        }
    }
    Ok(devices)
}

/// Request/response helpers over a [`ByteLink`].
///
/// Every operation is a single request. Operations with a reply block until
/// the reply's fixed length has been read; nothing is retried.
pub struct Controller<L> {
    link: L,
}

impl Controller<CdcSerial> {
    /// Open the named serial endpoint with the default timeouts.
    pub fn open(device: &str) -> Result<Self, DeviceError> {
        let link = CdcSerial::open(device, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT)?;
        Ok(Controller::new(link))
    }
}

impl<L: ByteLink> Controller<L> {
    pub fn new(link: L) -> Self {
        Controller { link }
    }

    /// Give the transport back, e.g. to hand it to a stream decoder.
    pub fn into_link(self) -> L {
        self.link
    }

    fn send(&mut self, frame: TxFrame) -> Result<(), DeviceError> {
        log::debug!("tx {:?}", frame);
        self.link.write_bytes(&frame.pack(), None)?;
        Ok(())
    }

    fn send_then_receive(&mut self, frame: TxFrame, reply: HeaderId) -> Result<RxFrame, DeviceError> {
        let len = reply
            .response_len()
            .unwrap_or_else(|| unreachable!("{reply:?} tags a response"));
        self.send(frame)?;
        let bytes = self.link.read_bytes(len, None)?;
        if bytes.len() < len {
            return Err(DeviceError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("reply truncated: got {} of {} bytes", bytes.len(), len),
            )));
        }
        match parse_rx(&bytes) {
            Parsed::Frame(rx, _) => Ok(rx),
            Parsed::Unknown(id) => Err(DeviceError::UnknownResponse(id)),
            Parsed::NeedMore => Err(DeviceError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "reply shorter than its declared length",
            ))),
        }
    }

    pub fn get_output_data_rate(&mut self) -> Result<OutputDataRate, DeviceError> {
        match self.send_then_receive(TxFrame::GetOutputDataRate, HeaderId::RxOutputDataRate)? {
            RxFrame::OutputDataRate(odr) => Ok(odr),
            other => Err(DeviceError::UnexpectedReply(other)),
        }
    }

    pub fn set_output_data_rate(&mut self, odr: OutputDataRate) -> Result<(), DeviceError> {
        self.send(TxFrame::SetOutputDataRate(odr))
    }

    pub fn get_range(&mut self) -> Result<Range, DeviceError> {
        match self.send_then_receive(TxFrame::GetRange, HeaderId::RxRange)? {
            RxFrame::Range(range) => Ok(range),
            other => Err(DeviceError::UnexpectedReply(other)),
        }
    }

    pub fn set_range(&mut self, range: Range) -> Result<(), DeviceError> {
        self.send(TxFrame::SetRange(range))
    }

    pub fn get_scale(&mut self) -> Result<Scale, DeviceError> {
        match self.send_then_receive(TxFrame::GetScale, HeaderId::RxScale)? {
            RxFrame::Scale(scale) => Ok(scale),
            other => Err(DeviceError::UnexpectedReply(other)),
        }
    }

    pub fn set_scale(&mut self, scale: Scale) -> Result<(), DeviceError> {
        self.send(TxFrame::SetScale(scale))
    }

    pub fn get_device_setup(&mut self) -> Result<DeviceSetup, DeviceError> {
        match self.send_then_receive(TxFrame::GetDeviceSetup, HeaderId::RxDeviceSetup)? {
            RxFrame::DeviceSetup(setup) => Ok(setup),
            other => Err(DeviceError::UnexpectedReply(other)),
        }
    }

    pub fn get_firmware_version(&mut self) -> Result<FirmwareVersion, DeviceError> {
        match self.send_then_receive(TxFrame::GetFirmwareVersion, HeaderId::RxFirmwareVersion)? {
            RxFrame::FirmwareVersion(version) => Ok(version),
            other => Err(DeviceError::UnexpectedReply(other)),
        }
    }

    /// Milliseconds since the controller booted.
    pub fn get_uptime_ms(&mut self) -> Result<u32, DeviceError> {
        match self.send_then_receive(TxFrame::GetUptime, HeaderId::RxUptime)? {
            RxFrame::Uptime(ms) => Ok(ms),
            other => Err(DeviceError::UnexpectedReply(other)),
        }
    }

    pub fn get_buffer_status(&mut self) -> Result<BufferStatus, DeviceError> {
        match self.send_then_receive(TxFrame::GetBufferStatus, HeaderId::RxBufferStatus)? {
            RxFrame::BufferStatus(status) => Ok(status),
            other => Err(DeviceError::UnexpectedReply(other)),
        }
    }

    pub fn reboot(&mut self) -> Result<(), DeviceError> {
        self.send(TxFrame::Reboot)
    }

    /// Ask the controller to stream `num_samples` acceleration records;
    /// 0 streams until [`Controller::stop_sampling`]. The stream itself is
    /// consumed by a stream decoder, not by this client.
    pub fn start_sampling(&mut self, num_samples: u16) -> Result<(), DeviceError> {
        self.send(TxFrame::SamplingStart(num_samples))
    }

    pub fn stop_sampling(&mut self) -> Result<(), DeviceError> {
        self.send(TxFrame::SamplingStop)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Byte link fed from a script; records everything written to it.
    pub(crate) struct ScriptedLink {
        pub rx: VecDeque<u8>,
        pub tx: Vec<u8>,
    }

    impl ScriptedLink {
        pub fn new(rx: &[u8]) -> Self {
            ScriptedLink {
                rx: rx.iter().copied().collect(),
                tx: Vec::new(),
            }
        }
    }

    impl ByteLink for ScriptedLink {
        fn write_bytes(&mut self, bytes: &[u8], _timeout: Option<Duration>) -> io::Result<usize> {
            self.tx.extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn read_bytes(&mut self, n: usize, _timeout: Option<Duration>) -> io::Result<Vec<u8>> {
            let take = n.min(self.rx.len());
            Ok(self.rx.drain(..take).collect())
        }
    }

    #[test]
    fn get_exchanges_read_exactly_the_reply_length() {
        let mut ctrl = Controller::new(ScriptedLink::new(&[25, 0b1010]));
        assert_eq!(ctrl.get_output_data_rate().unwrap(), OutputDataRate::Odr100);
        assert_eq!(ctrl.into_link().tx, vec![2]);
    }

    #[test]
    fn set_operations_have_no_reply() {
        let mut ctrl = Controller::new(ScriptedLink::new(&[]));
        ctrl.set_range(Range::G16).unwrap();
        ctrl.set_scale(Scale::FullRes4MgLsb).unwrap();
        ctrl.start_sampling(512).unwrap();
        ctrl.stop_sampling().unwrap();
        ctrl.reboot().unwrap();
        assert_eq!(ctrl.into_link().tx, vec![3, 3, 5, 1, 18, 0, 2, 19, 17]);
    }

    #[test]
    fn truncated_reply_is_a_timeout() {
        let mut ctrl = Controller::new(ScriptedLink::new(&[29, 1]));
        match ctrl.get_firmware_version() {
            Err(DeviceError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected io timeout, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_reply_is_rejected() {
        // Device answers a scale query with a range frame.
        let mut ctrl = Controller::new(ScriptedLink::new(&[26, 1]));
        match ctrl.get_scale() {
            Err(DeviceError::UnexpectedReply(RxFrame::Range(Range::G4))) => {}
            other => panic!("expected unexpected-reply, got {other:?}"),
        }
    }

    #[test]
    fn unknown_reply_header_is_reported() {
        let mut ctrl = Controller::new(ScriptedLink::new(&[0, 0]));
        match ctrl.get_range() {
            Err(DeviceError::UnknownResponse(0)) => {}
            other => panic!("expected unknown-response, got {other:?}"),
        }
    }

    #[test]
    fn device_setup_reply_is_unpacked() {
        let mut ctrl = Controller::new(ScriptedLink::new(&[28, 0b0011_1101]));
        let setup = ctrl.get_device_setup().unwrap();
        assert_eq!(setup.odr, OutputDataRate::Odr800);
        assert_eq!(setup.range, Range::G4);
        assert_eq!(setup.scale, Scale::FullRes4MgLsb);
    }

    #[test]
    fn buffer_status_reply_is_decoded() {
        let mut ctrl =
            Controller::new(ScriptedLink::new(&[31, 9, 0, 100, 0, 50, 0, 7, 0, 7, 0, 64, 0]));
        let status = ctrl.get_buffer_status().unwrap();
        assert_eq!(status.capacity_total, 100);
        assert_eq!(status.largest_tx_chunk_bytes, 64);
        assert_eq!(ctrl.into_link().tx, vec![10]);
    }

    #[test]
    fn uptime_is_little_endian_u32() {
        let mut ctrl = Controller::new(ScriptedLink::new(&[30, 0xd2, 0x02, 0x96, 0x49]));
        assert_eq!(ctrl.get_uptime_ms().unwrap(), 0x4996_02d2);
    }
}
