use crate::device::Mode;
use thiserror::Error;

/// Errors that can occur when using FT260 devices.
///
/// This enum covers all possible error conditions that may arise during
/// device discovery, report exchange, I2C/SMBus transactions and UART
/// streaming.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the underlying HID API layer.
    #[error("HID API error: {0}")]
    Hid(#[from] hidapi::HidError),
    /// General I/O error during device communication.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Failure reported by a non-HID report transport.
    #[error("Transport error: {0}")]
    Transport(String),
    /// No FT260 device was found with the specified vendor/product ID.
    #[error("Device not found with specified VID/PID")]
    DeviceNotFound,
    /// No FT260 device was found at the specified path.
    #[error("Device not found at path '{path}': {message}")]
    DeviceNotFoundByPath {
        /// The device path that was searched for.
        path: String,
        /// Additional error details.
        message: String,
    },
    /// No FT260 device was found at the specified index.
    #[error("Device not found at index {index}: {message}")]
    DeviceNotFoundByIndex {
        /// The index that was requested.
        index: usize,
        /// Additional error details.
        message: String,
    },
    /// A blocking wait for read data exceeded its deadline.
    #[error("Timeout waiting for I2C read data from address 0x{address:02X}")]
    Timeout {
        /// The I2C address being read.
        address: u8,
    },
    /// The device reported a bus error, or gave no usable status after retries.
    #[error("I2C transfer to address 0x{address:02X} failed (bus status 0x{status:02X})")]
    I2cIo {
        /// The I2C address being accessed.
        address: u8,
        /// Last bus status byte reported by the chip.
        status: u8,
    },
    /// The bus is held by another master.
    #[error("I2C bus busy")]
    BusBusy,
    /// Caller violated a length or range constraint.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Requested operation is not supported by the bridge.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    /// A report failed to decode.
    #[error("Malformed report 0x{report_id:02X}: {message}")]
    MalformedReport {
        /// Report id found in the first byte.
        report_id: u8,
        /// What was wrong with it.
        message: String,
    },
    /// An input report violated the length contract.
    #[error("Bad report 0x{report_id:02X}: payload length {length} exceeds the maximum")]
    BadReport {
        /// Report id of the offending report.
        report_id: u8,
        /// Announced payload length.
        length: usize,
    },
    /// No space left in a fixed-size buffer.
    #[error("Buffer exhausted (needed {needed}, available {available})")]
    ResourceExhausted {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },
    /// HID feature report exchange failed or returned an unexpected length.
    #[error("Feature report error (e.g., incorrect length, device error) on report 0x{report_id:02X}")]
    FeatureReportError {
        /// The report id that was being accessed.
        report_id: u8,
    },
    /// The operation belongs to the interface mode the device was not bound as.
    #[error("Operation requires {expected:?} mode but the device is bound as {actual:?}")]
    WrongMode {
        /// Mode the operation needs.
        expected: Mode,
        /// Mode the device was bound in.
        actual: Mode,
    },
    /// The UART port has not been opened, or was hung up.
    #[error("UART port is not open")]
    PortNotOpen,
    /// Every UART port slot is in use.
    #[error("No free UART port slot (capacity {capacity})")]
    NoFreePortSlot {
        /// Number of slots in the registry.
        capacity: usize,
    },
    /// The chip reported a mode this driver cannot bind to.
    #[error("Cannot determine interface type (chip mode 0x{chip_mode:02X})")]
    UnknownInterface {
        /// Raw chip mode from the system status report.
        chip_mode: u8,
    },
}

/// Result type alias for FT260 operations.
///
/// This is a convenience alias for `std::result::Result<T, Error>` used
/// throughout the crate to reduce boilerplate.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn payload_too_large(max: usize, actual: usize) -> Error {
    Error::InvalidArgument(format!(
        "payload of {} bytes exceeds the {} byte report limit",
        actual, max
    ))
}
