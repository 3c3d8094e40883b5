//! Internal constants, report ids and bit definitions.

// Default Vendor/Product IDs
/// FTDI vendor ID.
pub const FTDI_VID: u16 = 0x0403;
/// Product ID of the FT260 (both HID interfaces share it).
pub const FT260_PID: u16 = 0x6030;

/// Largest report the chip accepts or emits, report id included.
pub const REPORT_MAX_LENGTH: usize = 64;

/// Maximum data payload of a single write report.
pub const WR_DATA_MAX: usize = 60;
/// Maximum data payload requested per read. The input report layout has room
/// for 62 bytes, but the chip returns them as 60 + 2 in two transactions.
pub const RD_DATA_MAX: usize = 60;

// --- Feature In report ids ---
pub const REPORT_ID_CHIP_VERSION: u8 = 0xA0;
pub const REPORT_ID_SYSTEM_SETTINGS: u8 = 0xA1;
pub const REPORT_ID_I2C_STATUS: u8 = 0xC0;
pub const REPORT_ID_I2C_READ_REQ: u8 = 0xC2;
pub const REPORT_ID_I2C_DATA_MIN: u8 = 0xD0;
pub const REPORT_ID_I2C_DATA_MAX: u8 = 0xDE;
pub const REPORT_ID_UART_DATA_MIN: u8 = 0xF0;
pub const REPORT_ID_UART_DATA_MAX: u8 = 0xFE;

/// Requests carried in the second byte of a `SYSTEM_SETTINGS` feature out report.
pub mod request {
    pub const SET_CLOCK: u8 = 0x01;
    pub const SET_I2C_MODE: u8 = 0x02;
    pub const SET_UART_MODE: u8 = 0x03;
    pub const SET_I2C_RESET: u8 = 0x20;
    pub const SET_I2C_CLOCK_SPEED: u8 = 0x22;
    pub const SET_UART_CONFIG: u8 = 0x41;
}

/// Chip mode as strapped by the DCNF0/DCNF1 pins.
pub mod chip_mode {
    pub const ALL: u8 = 0x00;
    pub const I2C: u8 = 0x01;
    pub const UART: u8 = 0x02;
    pub const BOTH: u8 = 0x03;
}

/// Bits of the `bus_status` byte in the I2C status report.
pub mod i2c_status {
    pub const CTRL_BUSY: u8 = 0x01;
    pub const ERROR: u8 = 0x02;
    pub const ADDR_NO_ACK: u8 = 0x04;
    pub const DATA_NO_ACK: u8 = 0x08;
    pub const ARBITRATION_LOST: u8 = 0x10;
    pub const CTRL_IDLE: u8 = 0x20;
    pub const BUS_BUSY: u8 = 0x40;
}

/// Values of the UART configuration request fields.
pub mod uart_cfg {
    pub const FLOW_CTRL_OFF: u8 = 0x00;
    pub const FLOW_CTRL_RTS_CTS: u8 = 0x01;
    pub const FLOW_CTRL_DTR_DSR: u8 = 0x02;
    pub const FLOW_CTRL_XON_XOFF: u8 = 0x03;
    pub const FLOW_CTRL_NONE: u8 = 0x04;

    pub const DATA_BITS_7: u8 = 0x07;
    pub const DATA_BITS_8: u8 = 0x08;

    pub const PARITY_NONE: u8 = 0x00;
    pub const PARITY_ODD: u8 = 0x01;
    pub const PARITY_EVEN: u8 = 0x02;
    pub const PARITY_HIGH: u8 = 0x03;
    pub const PARITY_LOW: u8 = 0x04;

    pub const STOP_ONE_BIT: u8 = 0x00;
    pub const STOP_TWO_BITS: u8 = 0x02;

    pub const BREAK_OFF: u8 = 0x00;
    pub const BREAK_ON: u8 = 0x01;

    pub const BAUD_MIN: u32 = 1200;
    pub const BAUD_MAX: u32 = 12_000_000;
    pub const BAUD_DEFAULT: u32 = 9600;
}

// Report sizes (report id included)
pub const CHIP_VERSION_REPORT_LEN: usize = 13;
pub const SYSTEM_STATUS_REPORT_LEN: usize = 25;
pub const I2C_STATUS_REPORT_LEN: usize = 5;
pub const I2C_WRITE_HEADER_LEN: usize = 4;
pub const I2C_READ_REQUEST_LEN: usize = 5;
pub const UART_WRITE_HEADER_LEN: usize = 2;
pub const UART_CONFIG_REQUEST_LEN: usize = 11;
pub const INPUT_HEADER_LEN: usize = 2;

/// Bus clock assumed when the status report has never been read.
pub const DEFAULT_I2C_CLOCK_KHZ: u16 = 100;
/// Supported I2C bus clock range.
pub const I2C_CLOCK_MIN_KHZ: u16 = 60;
pub const I2C_CLOCK_MAX_KHZ: u16 = 3400;

/// Largest SMBus block transfer.
pub const SMBUS_BLOCK_MAX: usize = 32;

/// Number of UART ports a registry hands out by default.
pub const UART_PORTS_MAX: usize = 4;
/// Default transmit FIFO capacity.
pub const FIFO_SIZE: usize = 256;
