//! Encoding and decoding of the FT260 report layouts.
//!
//! Every report is a fixed-offset byte structure starting with its report id.
//! Encoders write into a caller-provided buffer and return the number of bytes
//! used; decoders validate the report id and length fields before handing out
//! a typed view. Multi-byte fields are little-endian.

use crate::consts::{self, request, uart_cfg};
use crate::error::{payload_too_large, Error, Result};
use std::fmt;

/// I2C bus framing applied by the chip around a single report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransactionCondition {
    /// No START or STOP; continue the current transaction.
    None = 0x00,
    /// Issue a START before the transfer.
    Start = 0x02,
    /// Issue a repeated START before the transfer.
    StartRepeated = 0x03,
    /// Issue a STOP after the transfer.
    Stop = 0x04,
    /// START before and STOP after.
    StartStop = 0x06,
    /// Repeated START before and STOP after.
    StartStopRepeated = 0x07,
}

impl TransactionCondition {
    /// Wire value of the condition flag.
    #[inline]
    pub fn bits(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for TransactionCondition {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::None),
            0x02 => Ok(Self::Start),
            0x03 => Ok(Self::StartRepeated),
            0x04 => Ok(Self::Stop),
            0x06 => Ok(Self::StartStop),
            0x07 => Ok(Self::StartStopRepeated),
            other => Err(Error::InvalidArgument(format!(
                "unknown I2C condition flag 0x{:02X}",
                other
            ))),
        }
    }
}

/// Report id of an I2C data report carrying `len` bytes.
pub fn i2c_data_report_id(len: usize) -> u8 {
    data_report_id(consts::REPORT_ID_I2C_DATA_MIN, consts::REPORT_ID_I2C_DATA_MAX, len)
}

/// Report id of a UART data report carrying `len` bytes.
pub fn uart_data_report_id(len: usize) -> u8 {
    data_report_id(consts::REPORT_ID_UART_DATA_MIN, consts::REPORT_ID_UART_DATA_MAX, len)
}

fn data_report_id(base: u8, max: u8, len: usize) -> u8 {
    let step = len.saturating_sub(1) / 4;
    base.saturating_add(step.min(u8::MAX as usize) as u8).min(max)
}

/// Returns true if `id` is in the I2C data report range.
#[inline]
pub fn is_i2c_data_report(id: u8) -> bool {
    (consts::REPORT_ID_I2C_DATA_MIN..=consts::REPORT_ID_I2C_DATA_MAX).contains(&id)
}

/// Returns true if `id` is in the UART data report range.
#[inline]
pub fn is_uart_data_report(id: u8) -> bool {
    (consts::REPORT_ID_UART_DATA_MIN..=consts::REPORT_ID_UART_DATA_MAX).contains(&id)
}

fn ensure_capacity(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(Error::ResourceExhausted {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

fn expect_header(buf: &[u8], report_id: u8, min_len: usize) -> Result<()> {
    let Some(&found) = buf.first() else {
        return Err(Error::MalformedReport {
            report_id,
            message: "empty report".to_string(),
        });
    };
    if found != report_id {
        return Err(Error::MalformedReport {
            report_id: found,
            message: format!("expected report id 0x{:02X}", report_id),
        });
    }
    if buf.len() < min_len {
        return Err(Error::MalformedReport {
            report_id,
            message: format!("need {} bytes, got {}", min_len, buf.len()),
        });
    }
    Ok(())
}

/// Chip identification, read from feature report `0xA0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipVersion {
    /// FTDI chip code, `[0x02, 0x60, ...]` on an FT260.
    pub chip_code: [u8; 4],
}

impl ChipVersion {
    pub fn decode(buf: &[u8]) -> Result<Self> {
        expect_header(buf, consts::REPORT_ID_CHIP_VERSION, consts::CHIP_VERSION_REPORT_LEN)?;
        Ok(Self {
            chip_code: [buf[1], buf[2], buf[3], buf[4]],
        })
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        ensure_capacity(buf, consts::CHIP_VERSION_REPORT_LEN)?;
        buf[..consts::CHIP_VERSION_REPORT_LEN].fill(0);
        buf[0] = consts::REPORT_ID_CHIP_VERSION;
        buf[1..5].copy_from_slice(&self.chip_code);
        Ok(consts::CHIP_VERSION_REPORT_LEN)
    }
}

impl fmt::Display for ChipVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.chip_code;
        write!(f, "{:02x}{:02x} {:02x}{:02x}", c[0], c[1], c[2], c[3])
    }
}

/// System status, read from feature report `0xA1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemStatus {
    /// DCNF0/DCNF1 strapping, bits 0-1.
    pub chip_mode: u8,
    /// 0 - 12MHz, 1 - 24MHz, 2 - 48MHz.
    pub clock_ctl: u8,
    pub suspend_status: u8,
    pub pwren_status: u8,
    pub i2c_enable: u8,
    /// 0 - off, 1 - RTS/CTS, 2 - DTR/DSR, 3 - XON/XOFF, 4 - no flow control.
    pub uart_mode: u8,
    pub hid_over_i2c_en: u8,
    pub gpio2_function: u8,
    pub gpioa_function: u8,
    pub gpiog_function: u8,
    pub suspend_out_pol: u8,
    pub enable_wakeup_int: u8,
    pub intr_cond: u8,
    pub power_saving_en: u8,
}

impl SystemStatus {
    pub fn decode(buf: &[u8]) -> Result<Self> {
        expect_header(buf, consts::REPORT_ID_SYSTEM_SETTINGS, consts::SYSTEM_STATUS_REPORT_LEN)?;
        Ok(Self {
            chip_mode: buf[1],
            clock_ctl: buf[2],
            suspend_status: buf[3],
            pwren_status: buf[4],
            i2c_enable: buf[5],
            uart_mode: buf[6],
            hid_over_i2c_en: buf[7],
            gpio2_function: buf[8],
            gpioa_function: buf[9],
            gpiog_function: buf[10],
            suspend_out_pol: buf[11],
            enable_wakeup_int: buf[12],
            intr_cond: buf[13],
            power_saving_en: buf[14],
        })
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        ensure_capacity(buf, consts::SYSTEM_STATUS_REPORT_LEN)?;
        buf[..consts::SYSTEM_STATUS_REPORT_LEN].fill(0);
        buf[0] = consts::REPORT_ID_SYSTEM_SETTINGS;
        buf[1..15].copy_from_slice(&[
            self.chip_mode,
            self.clock_ctl,
            self.suspend_status,
            self.pwren_status,
            self.i2c_enable,
            self.uart_mode,
            self.hid_over_i2c_en,
            self.gpio2_function,
            self.gpioa_function,
            self.gpiog_function,
            self.suspend_out_pol,
            self.enable_wakeup_int,
            self.intr_cond,
            self.power_saving_en,
        ]);
        Ok(consts::SYSTEM_STATUS_REPORT_LEN)
    }
}

/// I2C controller status, read from feature report `0xC0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cStatus {
    /// Raw bus status bits, see [`crate::consts::i2c_status`].
    pub bus_status: u8,
    /// Bus clock in kHz (60-3400).
    pub clock_khz: u16,
}

impl I2cStatus {
    pub fn decode(buf: &[u8]) -> Result<Self> {
        expect_header(buf, consts::REPORT_ID_I2C_STATUS, consts::I2C_STATUS_REPORT_LEN)?;
        Ok(Self {
            bus_status: buf[1],
            clock_khz: u16::from_le_bytes([buf[2], buf[3]]),
        })
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        ensure_capacity(buf, consts::I2C_STATUS_REPORT_LEN)?;
        buf[0] = consts::REPORT_ID_I2C_STATUS;
        buf[1] = self.bus_status;
        buf[2..4].copy_from_slice(&self.clock_khz.to_le_bytes());
        buf[4] = 0;
        Ok(consts::I2C_STATUS_REPORT_LEN)
    }
}

/// I2C write request (output report `0xD0..=0xDE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cWriteRequest<'a> {
    pub report_id: u8,
    /// 7-bit slave address.
    pub address: u8,
    pub condition: TransactionCondition,
    pub data: &'a [u8],
}

impl<'a> I2cWriteRequest<'a> {
    /// Builds a request whose report id encodes the payload length.
    pub fn new(address: u8, condition: TransactionCondition, data: &'a [u8]) -> Self {
        Self {
            report_id: i2c_data_report_id(data.len()),
            address,
            condition,
            data,
        }
    }

    pub fn encoded_len(&self) -> usize {
        consts::I2C_WRITE_HEADER_LEN + self.data.len()
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if self.data.len() > consts::WR_DATA_MAX {
            return Err(payload_too_large(consts::WR_DATA_MAX, self.data.len()));
        }
        let len = self.encoded_len();
        ensure_capacity(buf, len)?;
        buf[0] = self.report_id;
        buf[1] = self.address;
        buf[2] = self.condition.bits();
        buf[3] = self.data.len() as u8;
        buf[consts::I2C_WRITE_HEADER_LEN..len].copy_from_slice(self.data);
        Ok(len)
    }

    pub fn decode(buf: &'a [u8]) -> Result<Self> {
        let report_id = *buf.first().ok_or_else(|| Error::MalformedReport {
            report_id: 0,
            message: "empty report".to_string(),
        })?;
        if !is_i2c_data_report(report_id) {
            return Err(Error::MalformedReport {
                report_id,
                message: "not an I2C data report".to_string(),
            });
        }
        expect_header(buf, report_id, consts::I2C_WRITE_HEADER_LEN)?;
        let length = buf[3] as usize;
        if length > consts::WR_DATA_MAX || buf.len() < consts::I2C_WRITE_HEADER_LEN + length {
            return Err(Error::MalformedReport {
                report_id,
                message: format!("invalid payload length {}", length),
            });
        }
        Ok(Self {
            report_id,
            address: buf[1],
            condition: TransactionCondition::try_from(buf[2]).map_err(|_| {
                Error::MalformedReport {
                    report_id,
                    message: format!("unknown condition flag 0x{:02X}", buf[2]),
                }
            })?,
            data: &buf[consts::I2C_WRITE_HEADER_LEN..consts::I2C_WRITE_HEADER_LEN + length],
        })
    }
}

/// I2C read request (output report `0xC2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cReadRequest {
    pub address: u8,
    pub condition: TransactionCondition,
    pub length: u16,
}

impl I2cReadRequest {
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if self.length as usize > consts::RD_DATA_MAX {
            return Err(payload_too_large(consts::RD_DATA_MAX, self.length as usize));
        }
        ensure_capacity(buf, consts::I2C_READ_REQUEST_LEN)?;
        buf[0] = consts::REPORT_ID_I2C_READ_REQ;
        buf[1] = self.address;
        buf[2] = self.condition.bits();
        buf[3..5].copy_from_slice(&self.length.to_le_bytes());
        Ok(consts::I2C_READ_REQUEST_LEN)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        expect_header(buf, consts::REPORT_ID_I2C_READ_REQ, consts::I2C_READ_REQUEST_LEN)?;
        let length = u16::from_le_bytes([buf[3], buf[4]]);
        if length as usize > consts::RD_DATA_MAX {
            return Err(Error::MalformedReport {
                report_id: buf[0],
                message: format!("read length {} too large", length),
            });
        }
        let condition =
            TransactionCondition::try_from(buf[2]).map_err(|_| Error::MalformedReport {
                report_id: buf[0],
                message: format!("unknown condition flag 0x{:02X}", buf[2]),
            })?;
        Ok(Self {
            address: buf[1],
            condition,
            length,
        })
    }
}

/// UART write request (output report `0xF0..=0xFE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartWriteRequest<'a> {
    pub report_id: u8,
    pub data: &'a [u8],
}

impl<'a> UartWriteRequest<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            report_id: uart_data_report_id(data.len()),
            data,
        }
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if self.data.len() > consts::WR_DATA_MAX {
            return Err(payload_too_large(consts::WR_DATA_MAX, self.data.len()));
        }
        let len = consts::UART_WRITE_HEADER_LEN + self.data.len();
        ensure_capacity(buf, len)?;
        buf[0] = self.report_id;
        buf[1] = self.data.len() as u8;
        buf[consts::UART_WRITE_HEADER_LEN..len].copy_from_slice(self.data);
        Ok(len)
    }

    pub fn decode(buf: &'a [u8]) -> Result<Self> {
        let report_id = *buf.first().ok_or_else(|| Error::MalformedReport {
            report_id: 0,
            message: "empty report".to_string(),
        })?;
        if !is_uart_data_report(report_id) {
            return Err(Error::MalformedReport {
                report_id,
                message: "not a UART data report".to_string(),
            });
        }
        expect_header(buf, report_id, consts::UART_WRITE_HEADER_LEN)?;
        let length = buf[1] as usize;
        if length > consts::WR_DATA_MAX || buf.len() < consts::UART_WRITE_HEADER_LEN + length {
            return Err(Error::MalformedReport {
                report_id,
                message: format!("invalid payload length {}", length),
            });
        }
        Ok(Self {
            report_id,
            data: &buf[consts::UART_WRITE_HEADER_LEN..consts::UART_WRITE_HEADER_LEN + length],
        })
    }
}

/// UART line configuration (feature report `0xA1`, request `0x41`).
///
/// The fields hold raw wire values, see [`crate::consts::uart_cfg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfigRequest {
    pub flow_control: u8,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: u8,
    pub stop_bits: u8,
    pub breaking: u8,
}

impl Default for UartConfigRequest {
    /// 9600-8-N-1, no flow control, no break.
    fn default() -> Self {
        Self {
            flow_control: uart_cfg::FLOW_CTRL_NONE,
            baud_rate: uart_cfg::BAUD_DEFAULT,
            data_bits: uart_cfg::DATA_BITS_8,
            parity: uart_cfg::PARITY_NONE,
            stop_bits: uart_cfg::STOP_ONE_BIT,
            breaking: uart_cfg::BREAK_OFF,
        }
    }
}

impl UartConfigRequest {
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        ensure_capacity(buf, consts::UART_CONFIG_REQUEST_LEN)?;
        buf[0] = consts::REPORT_ID_SYSTEM_SETTINGS;
        buf[1] = request::SET_UART_CONFIG;
        buf[2] = self.flow_control;
        // Unaligned: the baud rate starts at offset 3.
        buf[3..7].copy_from_slice(&self.baud_rate.to_le_bytes());
        buf[7] = self.data_bits;
        buf[8] = self.parity;
        buf[9] = self.stop_bits;
        buf[10] = self.breaking;
        Ok(consts::UART_CONFIG_REQUEST_LEN)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        expect_header(buf, consts::REPORT_ID_SYSTEM_SETTINGS, consts::UART_CONFIG_REQUEST_LEN)?;
        if buf[1] != request::SET_UART_CONFIG {
            return Err(Error::MalformedReport {
                report_id: buf[0],
                message: format!("expected UART config request, got 0x{:02X}", buf[1]),
            });
        }
        Ok(Self {
            flow_control: buf[2],
            baud_rate: u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]),
            data_bits: buf[7],
            parity: buf[8],
            stop_bits: buf[9],
            breaking: buf[10],
        })
    }
}

/// Single-field system setting requests sent as feature report `0xA1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemSetting {
    /// System clock: 0 - 12MHz, 1 - 24MHz, 2 - 48MHz.
    SetClock(u8),
    /// Enable (1) or disable (0) the I2C controller.
    SetI2cMode(u8),
    /// UART flow control mode.
    SetUartMode(u8),
    /// Reset the I2C controller.
    I2cReset,
    /// I2C bus clock in kHz.
    SetI2cClockSpeed(u16),
}

impl SystemSetting {
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = match self {
            SystemSetting::I2cReset => 2,
            SystemSetting::SetI2cClockSpeed(_) => 4,
            _ => 3,
        };
        ensure_capacity(buf, len)?;
        buf[0] = consts::REPORT_ID_SYSTEM_SETTINGS;
        match *self {
            SystemSetting::SetClock(v) => {
                buf[1] = request::SET_CLOCK;
                buf[2] = v;
            }
            SystemSetting::SetI2cMode(v) => {
                buf[1] = request::SET_I2C_MODE;
                buf[2] = v;
            }
            SystemSetting::SetUartMode(v) => {
                buf[1] = request::SET_UART_MODE;
                buf[2] = v;
            }
            SystemSetting::I2cReset => buf[1] = request::SET_I2C_RESET,
            SystemSetting::SetI2cClockSpeed(khz) => {
                buf[1] = request::SET_I2C_CLOCK_SPEED;
                buf[2..4].copy_from_slice(&khz.to_le_bytes());
            }
        }
        Ok(len)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        expect_header(buf, consts::REPORT_ID_SYSTEM_SETTINGS, 2)?;
        let short = || Error::MalformedReport {
            report_id: buf[0],
            message: format!("request 0x{:02X} truncated", buf[1]),
        };
        match buf[1] {
            request::SET_I2C_RESET => Ok(SystemSetting::I2cReset),
            request::SET_I2C_CLOCK_SPEED => {
                let bytes = buf.get(2..4).ok_or_else(short)?;
                Ok(SystemSetting::SetI2cClockSpeed(u16::from_le_bytes([
                    bytes[0], bytes[1],
                ])))
            }
            req @ (request::SET_CLOCK | request::SET_I2C_MODE | request::SET_UART_MODE) => {
                let v = *buf.get(2).ok_or_else(short)?;
                Ok(match req {
                    request::SET_CLOCK => SystemSetting::SetClock(v),
                    request::SET_I2C_MODE => SystemSetting::SetI2cMode(v),
                    _ => SystemSetting::SetUartMode(v),
                })
            }
            other => Err(Error::MalformedReport {
                report_id: buf[0],
                message: format!("unknown system setting request 0x{:02X}", other),
            }),
        }
    }
}

/// An input report delivered by the device: `[report id, length, data...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputReport<'a> {
    pub report_id: u8,
    pub payload: &'a [u8],
}

impl<'a> InputReport<'a> {
    /// Splits a raw input report into id and payload.
    ///
    /// The length byte is not checked against [`consts::RD_DATA_MAX`] here;
    /// that rule belongs to the dispatcher.
    pub fn decode(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < consts::INPUT_HEADER_LEN {
            return Err(Error::MalformedReport {
                report_id: buf.first().copied().unwrap_or(0),
                message: format!("input report of {} bytes has no header", buf.len()),
            });
        }
        let length = buf[1] as usize;
        let available = buf.len() - consts::INPUT_HEADER_LEN;
        if length > available {
            return Err(Error::MalformedReport {
                report_id: buf[0],
                message: format!("length field {} exceeds the {} bytes received", length, available),
            });
        }
        Ok(Self {
            report_id: buf[0],
            payload: &buf[consts::INPUT_HEADER_LEN..consts::INPUT_HEADER_LEN + length],
        })
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if self.payload.len() > u8::MAX as usize {
            return Err(payload_too_large(u8::MAX as usize, self.payload.len()));
        }
        let len = consts::INPUT_HEADER_LEN + self.payload.len();
        ensure_capacity(buf, len)?;
        buf[0] = self.report_id;
        buf[1] = self.payload.len() as u8;
        buf[consts::INPUT_HEADER_LEN..len].copy_from_slice(self.payload);
        Ok(len)
    }
}
