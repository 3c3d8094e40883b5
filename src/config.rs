//! Chip configuration attributes.
//!
//! A declarative table maps each attribute name to the status report and
//! field it is read from and, for writable ones, the system setting request
//! that changes it.

use crate::consts;
use crate::device::{read_feature, Ft260};
use crate::error::{Error, Result};
use crate::report::SystemSetting;
use crate::transport::ReportTransport;
use log::debug;

/// Report an attribute value is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeSource {
    /// System status, feature report `0xA1`.
    SystemStatus,
    /// I2C status, feature report `0xC0`.
    I2cStatus,
    /// Not readable.
    None,
}

/// How a value is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeStore {
    ReadOnly,
    SetClock,
    SetI2cMode,
    SetUartMode,
    SetI2cClockSpeed,
    /// Any value triggers an I2C controller reset.
    I2cReset,
}

/// Width of an attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    Byte,
    /// Little-endian 16-bit word.
    Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    pub name: &'static str,
    pub source: AttributeSource,
    /// Byte offset in the source report, report id included.
    pub offset: usize,
    pub width: FieldWidth,
    pub store: AttributeStore,
}

const fn attr(
    name: &'static str,
    source: AttributeSource,
    offset: usize,
    width: FieldWidth,
    store: AttributeStore,
) -> Attribute {
    Attribute {
        name,
        source,
        offset,
        width,
        store,
    }
}

/// All attributes exposed by a device.
pub const ATTRIBUTES: &[Attribute] = &[
    attr("chip_mode", AttributeSource::SystemStatus, 1, FieldWidth::Byte, AttributeStore::ReadOnly),
    attr("clock_ctl", AttributeSource::SystemStatus, 2, FieldWidth::Byte, AttributeStore::SetClock),
    attr("suspend_status", AttributeSource::SystemStatus, 3, FieldWidth::Byte, AttributeStore::ReadOnly),
    attr("pwren_status", AttributeSource::SystemStatus, 4, FieldWidth::Byte, AttributeStore::ReadOnly),
    attr("i2c_enable", AttributeSource::SystemStatus, 5, FieldWidth::Byte, AttributeStore::SetI2cMode),
    attr("uart_mode", AttributeSource::SystemStatus, 6, FieldWidth::Byte, AttributeStore::SetUartMode),
    attr("hid_over_i2c_en", AttributeSource::SystemStatus, 7, FieldWidth::Byte, AttributeStore::ReadOnly),
    attr("power_saving_en", AttributeSource::SystemStatus, 14, FieldWidth::Byte, AttributeStore::ReadOnly),
    attr("clock", AttributeSource::I2cStatus, 2, FieldWidth::Word, AttributeStore::SetI2cClockSpeed),
    attr("i2c_reset", AttributeSource::None, 0, FieldWidth::Byte, AttributeStore::I2cReset),
];

/// Looks up an attribute by name.
pub fn find_attribute(name: &str) -> Result<&'static Attribute> {
    ATTRIBUTES
        .iter()
        .find(|a| a.name == name)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown attribute '{}'", name)))
}

impl Attribute {
    pub fn is_readable(&self) -> bool {
        self.source != AttributeSource::None
    }

    pub fn is_writable(&self) -> bool {
        self.store != AttributeStore::ReadOnly
    }

    /// Extracts the field from a raw source report.
    pub fn extract(&self, report: &[u8]) -> Result<u16> {
        let end = self.offset
            + match self.width {
                FieldWidth::Byte => 1,
                FieldWidth::Word => 2,
            };
        let field = report.get(self.offset..end).ok_or(Error::ResourceExhausted {
            needed: end,
            available: report.len(),
        })?;
        Ok(match self.width {
            FieldWidth::Byte => u16::from(field[0]),
            FieldWidth::Word => u16::from_le_bytes([field[0], field[1]]),
        })
    }

    /// Builds the request that stores `value`.
    pub fn store_request(&self, value: u16) -> Result<SystemSetting> {
        let byte = || {
            u8::try_from(value).map_err(|_| {
                Error::InvalidArgument(format!("{} does not fit attribute '{}'", value, self.name))
            })
        };
        match self.store {
            AttributeStore::ReadOnly => Err(Error::Unsupported(format!(
                "attribute '{}' is read-only",
                self.name
            ))),
            AttributeStore::SetClock => Ok(SystemSetting::SetClock(byte()?)),
            AttributeStore::SetI2cMode => Ok(SystemSetting::SetI2cMode(byte()?)),
            AttributeStore::SetUartMode => Ok(SystemSetting::SetUartMode(byte()?)),
            AttributeStore::I2cReset => Ok(SystemSetting::I2cReset),
            AttributeStore::SetI2cClockSpeed => {
                if !(consts::I2C_CLOCK_MIN_KHZ..=consts::I2C_CLOCK_MAX_KHZ).contains(&value) {
                    return Err(Error::InvalidArgument(format!(
                        "I2C clock {} kHz out of range ({}-{})",
                        value,
                        consts::I2C_CLOCK_MIN_KHZ,
                        consts::I2C_CLOCK_MAX_KHZ
                    )));
                }
                Ok(SystemSetting::SetI2cClockSpeed(value))
            }
        }
    }
}

impl<T: ReportTransport> Ft260<T> {
    /// Reads an attribute by name.
    pub fn attribute_show(&self, name: &str) -> Result<u16> {
        let attribute = find_attribute(name)?;
        let value = match attribute.source {
            AttributeSource::SystemStatus => {
                let mut buf = [0u8; consts::SYSTEM_STATUS_REPORT_LEN];
                read_feature(&*self.transport, consts::REPORT_ID_SYSTEM_SETTINGS, &mut buf)?;
                attribute.extract(&buf)?
            }
            AttributeSource::I2cStatus => {
                let mut buf = [0u8; consts::I2C_STATUS_REPORT_LEN];
                read_feature(&*self.transport, consts::REPORT_ID_I2C_STATUS, &mut buf)?;
                attribute.extract(&buf)?
            }
            AttributeSource::None => {
                return Err(Error::Unsupported(format!(
                    "attribute '{}' is write-only",
                    name
                )))
            }
        };
        debug!("{} = {}", name, value);
        Ok(value)
    }

    /// Writes an attribute by name.
    pub fn attribute_store(&self, name: &str, value: u16) -> Result<()> {
        let request = find_attribute(name)?.store_request(value)?;
        debug!("{} <- {} ({:?})", name, value, request);
        self.send_setting(request)
    }

    /// Sets the I2C bus clock in kHz (60-3400).
    pub fn i2c_set_clock_speed(&self, khz: u16) -> Result<()> {
        self.attribute_store("clock", khz)?;
        self.i2c_status().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lookup() {
        assert!(find_attribute("chip_mode").is_ok());
        assert!(matches!(
            find_attribute("gpio2_function"),
            Err(Error::InvalidArgument(_))
        ));
        let reset = find_attribute("i2c_reset").unwrap();
        assert!(!reset.is_readable());
        assert!(reset.is_writable());
        let mode = find_attribute("chip_mode").unwrap();
        assert!(mode.is_readable());
        assert!(!mode.is_writable());
        for a in ATTRIBUTES {
            assert_eq!(find_attribute(a.name).unwrap(), a);
        }
    }

    #[test]
    fn test_extract_fields() {
        let mut sys = [0u8; consts::SYSTEM_STATUS_REPORT_LEN];
        sys[0] = consts::REPORT_ID_SYSTEM_SETTINGS;
        sys[1] = 3;
        sys[14] = 1;
        assert_eq!(find_attribute("chip_mode").unwrap().extract(&sys).unwrap(), 3);
        assert_eq!(
            find_attribute("power_saving_en").unwrap().extract(&sys).unwrap(),
            1
        );
        let i2c = [consts::REPORT_ID_I2C_STATUS, 0x20, 0x90, 0x01, 0];
        assert_eq!(find_attribute("clock").unwrap().extract(&i2c).unwrap(), 400);
        assert!(find_attribute("clock").unwrap().extract(&i2c[..3]).is_err());
    }

    #[test]
    fn test_store_requests() {
        assert_eq!(
            find_attribute("clock_ctl").unwrap().store_request(2).unwrap(),
            SystemSetting::SetClock(2)
        );
        assert_eq!(
            find_attribute("clock").unwrap().store_request(400).unwrap(),
            SystemSetting::SetI2cClockSpeed(400)
        );
        assert!(matches!(
            find_attribute("clock").unwrap().store_request(59),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            find_attribute("uart_mode").unwrap().store_request(256),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            find_attribute("pwren_status").unwrap().store_request(1),
            Err(Error::Unsupported(_))
        ));
        assert_eq!(
            find_attribute("i2c_reset").unwrap().store_request(1).unwrap(),
            SystemSetting::I2cReset
        );
    }
}
