//! Wire-level enumerations of the controller protocol.
//!
//! All values are single bytes on the wire; multi-byte integers elsewhere in
//! the protocol are little-endian.

use clap::builder::PossibleValue;
use std::fmt;
use std::str::FromStr;

/// Sampling rate of the accelerometer, encoded in the low nibble.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputDataRate {
    Odr0_10 = 0b0000,
    Odr0_20 = 0b0001,
    Odr0_39 = 0b0010,
    Odr0_78 = 0b0011,
    Odr1_56 = 0b0100,
    Odr3_13 = 0b0101,
    Odr6_25 = 0b0110,
    Odr12_5 = 0b0111,
    Odr25 = 0b1000,
    Odr50 = 0b1001,
    Odr100 = 0b1010,
    Odr200 = 0b1011,
    Odr400 = 0b1100,
    Odr800 = 0b1101,
    Odr1600 = 0b1110,
    Odr3200 = 0b1111,
}

impl OutputDataRate {
    pub const ALL: [OutputDataRate; 16] = [
        OutputDataRate::Odr0_10,
        OutputDataRate::Odr0_20,
        OutputDataRate::Odr0_39,
        OutputDataRate::Odr0_78,
        OutputDataRate::Odr1_56,
        OutputDataRate::Odr3_13,
        OutputDataRate::Odr6_25,
        OutputDataRate::Odr12_5,
        OutputDataRate::Odr25,
        OutputDataRate::Odr50,
        OutputDataRate::Odr100,
        OutputDataRate::Odr200,
        OutputDataRate::Odr400,
        OutputDataRate::Odr800,
        OutputDataRate::Odr1600,
        OutputDataRate::Odr3200,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Nominal rate in Hz.
    pub fn hz(self) -> f64 {
        match self {
            OutputDataRate::Odr0_10 => 0.10,
            OutputDataRate::Odr0_20 => 0.20,
            OutputDataRate::Odr0_39 => 0.39,
            OutputDataRate::Odr0_78 => 0.78,
            OutputDataRate::Odr1_56 => 1.56,
            OutputDataRate::Odr3_13 => 3.13,
            OutputDataRate::Odr6_25 => 6.25,
            OutputDataRate::Odr12_5 => 12.5,
            OutputDataRate::Odr25 => 25.0,
            OutputDataRate::Odr50 => 50.0,
            OutputDataRate::Odr100 => 100.0,
            OutputDataRate::Odr200 => 200.0,
            OutputDataRate::Odr400 => 400.0,
            OutputDataRate::Odr800 => 800.0,
            OutputDataRate::Odr1600 => 1600.0,
            OutputDataRate::Odr3200 => 3200.0,
        }
    }

    /// Separation between two consecutive samples in seconds.
    pub fn period_s(self) -> f64 {
        1.0 / self.hz()
    }

    /// Canonical token used in CLI arguments and stored metadata.
    pub fn name(self) -> &'static str {
        match self {
            OutputDataRate::Odr0_10 => "ODR0_10",
            OutputDataRate::Odr0_20 => "ODR0_20",
            OutputDataRate::Odr0_39 => "ODR0_39",
            OutputDataRate::Odr0_78 => "ODR0_78",
            OutputDataRate::Odr1_56 => "ODR1_56",
            OutputDataRate::Odr3_13 => "ODR3_13",
            OutputDataRate::Odr6_25 => "ODR6_25",
            OutputDataRate::Odr12_5 => "ODR12_5",
            OutputDataRate::Odr25 => "ODR25",
            OutputDataRate::Odr50 => "ODR50",
            OutputDataRate::Odr100 => "ODR100",
            OutputDataRate::Odr200 => "ODR200",
            OutputDataRate::Odr400 => "ODR400",
            OutputDataRate::Odr800 => "ODR800",
            OutputDataRate::Odr1600 => "ODR1600",
            OutputDataRate::Odr3200 => "ODR3200",
        }
    }
}

impl fmt::Display for OutputDataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputDataRate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|odr| odr.name() == s)
            .ok_or_else(|| format!("unknown output data rate: {s}"))
    }
}

impl clap::ValueEnum for OutputDataRate {
    fn value_variants<'a>() -> &'a [Self] {
        &Self::ALL
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(PossibleValue::new(self.name()))
    }
}

/// Full-scale measurement range in g.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Range {
    G2 = 0b00,
    G4 = 0b01,
    G8 = 0b10,
    G16 = 0b11,
}

impl Range {
    pub const ALL: [Range; 4] = [Range::G2, Range::G4, Range::G8, Range::G16];

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Range::G2 => "G2",
            Range::G4 => "G4",
            Range::G8 => "G8",
            Range::G16 => "G16",
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Range {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name() == s)
            .ok_or_else(|| format!("unknown range: {s}"))
    }
}

impl clap::ValueEnum for Range {
    fn value_variants<'a>() -> &'a [Self] {
        &Self::ALL
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(PossibleValue::new(self.name()))
    }
}

/// Sensitivity mode. At full resolution one LSB is about 3.9 mg.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scale {
    Scaled10Bit = 0,
    FullRes4MgLsb = 1,
}

impl Scale {
    pub const ALL: [Scale; 2] = [Scale::Scaled10Bit, Scale::FullRes4MgLsb];

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Scale::Scaled10Bit),
            1 => Some(Scale::FullRes4MgLsb),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Scale::Scaled10Bit => "SCALED_10BIT",
            Scale::FullRes4MgLsb => "FULL_RES_4MG_LSB",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|sc| sc.name() == s)
            .ok_or_else(|| format!("unknown scale: {s}"))
    }
}

impl clap::ValueEnum for Scale {
    fn value_variants<'a>() -> &'a [Self] {
        &Self::ALL
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(PossibleValue::new(self.name()))
    }
}

/// Fault handler that fired on the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultCode {
    Undefined = 0,
    UsbError = 1,
    UsageFaultHandler = 2,
    BusFaultHandler = 3,
    HardFaultHandler = 4,
    ErrorHandler = 5,
}

impl FaultCode {
    pub const ALL: [FaultCode; 6] = [
        FaultCode::Undefined,
        FaultCode::UsbError,
        FaultCode::UsageFaultHandler,
        FaultCode::BusFaultHandler,
        FaultCode::HardFaultHandler,
        FaultCode::ErrorHandler,
    ];

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            FaultCode::Undefined => "UNDEFINED",
            FaultCode::UsbError => "USB_ERROR",
            FaultCode::UsageFaultHandler => "USAGE_FAULT_HANDLER",
            FaultCode::BusFaultHandler => "BUS_FAULT_HANDLER",
            FaultCode::HardFaultHandler => "HARD_FAULT_HANDLER",
            FaultCode::ErrorHandler => "ERROR_HANDLER",
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Message type tag, first byte of every frame.
///
/// Requests live in 1..=19, responses in 25..=41. Id 0 is unassigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum HeaderId {
    TxSetOutputDataRate = 1,
    TxGetOutputDataRate = 2,
    TxSetRange = 3,
    TxGetRange = 4,
    TxSetScale = 5,
    TxGetScale = 6,
    TxGetDeviceSetup = 7,
    TxGetFirmwareVersion = 8,
    TxGetUptime = 9,
    TxGetBufferStatus = 10,
    TxReboot = 17,
    TxSamplingStart = 18,
    TxSamplingStop = 19,
    RxOutputDataRate = 25,
    RxRange = 26,
    RxScale = 27,
    RxDeviceSetup = 28,
    RxFirmwareVersion = 29,
    RxUptime = 30,
    RxBufferStatus = 31,
    RxFifoOverflow = 33,
    RxSamplingStarted = 34,
    RxSamplingFinished = 35,
    RxSamplingStopped = 36,
    RxSamplingAborted = 37,
    RxAcceleration = 38,
    RxFault = 39,
    RxBufferOverflow = 40,
    RxTransmissionError = 41,
}

impl HeaderId {
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: u8) -> Option<Self> {
        use HeaderId::*;
        Some(match value {
            1 => TxSetOutputDataRate,
            2 => TxGetOutputDataRate,
            3 => TxSetRange,
            4 => TxGetRange,
            5 => TxSetScale,
            6 => TxGetScale,
            7 => TxGetDeviceSetup,
            8 => TxGetFirmwareVersion,
            9 => TxGetUptime,
            10 => TxGetBufferStatus,
            17 => TxReboot,
            18 => TxSamplingStart,
            19 => TxSamplingStop,
            25 => RxOutputDataRate,
            26 => RxRange,
            27 => RxScale,
            28 => RxDeviceSetup,
            29 => RxFirmwareVersion,
            30 => RxUptime,
            31 => RxBufferStatus,
            33 => RxFifoOverflow,
            34 => RxSamplingStarted,
            35 => RxSamplingFinished,
            36 => RxSamplingStopped,
            37 => RxSamplingAborted,
            38 => RxAcceleration,
            39 => RxFault,
            40 => RxBufferOverflow,
            41 => RxTransmissionError,
            _ => return None,
        })
    }

    /// Total frame length (header byte included) of a response, if this id
    /// tags one.
    pub fn response_len(self) -> Option<usize> {
        use HeaderId::*;
        Some(match self {
            RxOutputDataRate | RxRange | RxScale | RxDeviceSetup | RxFault => 2,
            RxFirmwareVersion => 4,
            RxUptime => 5,
            RxBufferStatus => 13,
            RxFifoOverflow | RxSamplingFinished | RxSamplingStopped | RxSamplingAborted
            | RxBufferOverflow | RxTransmissionError => 1,
            RxSamplingStarted => 3,
            RxAcceleration => 9,
            _ => return None,
        })
    }
}
