//! # ft260-hid
//!
//! A Rust crate for driving the I²C/SMBus master and the UART of the FTDI
//! FT260 USB bridge chip through its USB HID interfaces.
//!
//! This crate uses the `hidapi` crate for cross-platform USB HID communication.
//! Everything the chip does is a sequence of reports of at most 64 bytes:
//! transfers are split into report-sized fragments, the bus status is polled
//! after each write, and read data arrives asynchronously as input reports.
//!
//! ## Features
//!
//! *   Device discovery (`find_all`, `find_first`).
//! *   Flexible device opening (`Ft260::open`, `open_first`, `open_by_path`, `open_by_index`).
//! *   Interface detection from the strapped chip mode (I²C, UART or both).
//! *   I²C communication:
//!     *   Message transfers (`i2c_transfer`), including combined write-then-read
//!         with a 1 or 2 byte offset.
//!     *   Convenience transfers (`i2c_write`, `i2c_read`, `i2c_write_read`) and bus scan (`i2c_scan`).
//!     *   SMBus transactions (`smbus_transfer`): quick, byte, byte data, word data,
//!         block data and I²C block data.
//!     *   Bus clock setting (`i2c_set_clock_speed`, 60-3400 kHz) and controller reset.
//! *   UART communication:
//!     *   Reference-counted port open/close/hangup.
//!     *   Buffered writes through a bounded transmit FIFO (`uart_write`, `uart_write_room`).
//!     *   Receive through a bounded buffer (`uart_read`) or a custom `PortListener`.
//!     *   Line settings (`uart_set_line_config`): baud 1200-12M, 7/8 data bits, parity, stop bits.
//! *   Chip configuration attributes (`attribute_show`, `attribute_store`).
//! *   A `ReportTransport` trait, so the engines can run over any report link.
//!
//! ## Chip Support & Limitations
//!
//! *   **Interfaces:** The FT260 exposes one HID interface per function. In the
//!     dual modes (DCNF pins `00` or `11`) interface 0 is I²C and interface 1 is
//!     UART. A bound `Ft260` serves exactly one of the two; calling the other
//!     function's methods returns `Error::WrongMode`.
//! *   **I²C:** 7-bit addressing only. Reads are limited to 60 bytes per
//!     message; combined transfers accept at most 2 offset bytes.
//! *   **UART:** Hardware flow control is not enabled: the chip is always
//!     configured without flow control, whatever was requested.
//!
//! ## Installation
//!
//! Add the following to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! ft260-hid = "0.1.0" # Replace with the latest version
//! hidapi = "2.0"     # Or latest compatible version
//! log = "0.4"        # Optional, for logging
//!
//! [dev-dependencies]   # For demos/tests
//! env_logger = "0.11"
//! ```
//!
//! You also need the `hidapi` library installed on your system. See the [`hidapi` crate documentation](https://docs.rs/hidapi/) for details.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use ft260_hid::{Ft260, I2cMessage, LineConfig, Mode, Result};
//! use hidapi::HidApi;
//! use std::time::Duration;
//!
//! fn main() -> Result<()> {
//!     // Optional: Initialize logging
//!     // env_logger::init();
//!
//!     let hid_api = HidApi::new()?;
//!
//!     for info in ft260_hid::find_all(&hid_api)? {
//!         let device = Ft260::open(&hid_api, &info)?;
//!         println!("Chip {} interface {} bound as {:?}", device.chip_version(), info.interface_number, device.mode());
//!
//!         match device.mode() {
//!             Mode::I2c => {
//!                 // Read 4 bytes from offset 0x0010 of an EEPROM at 0x50
//!                 let mut data = [0u8; 4];
//!                 device.i2c_transfer(&mut [
//!                     I2cMessage::Write { address: 0x50, data: &[0x00, 0x10] },
//!                     I2cMessage::Read { address: 0x50, buffer: &mut data },
//!                 ])?;
//!                 println!("EEPROM: {:02X?}", data);
//!             }
//!             Mode::Uart => {
//!                 device.uart_open()?;
//!                 device.uart_set_line_config(LineConfig::new(115_200))?;
//!                 device.uart_write(b"hello\r\n")?;
//!                 let mut buf = [0u8; 64];
//!                 let n = device.uart_read(&mut buf, Duration::from_millis(500))?;
//!                 println!("UART: {:?}", String::from_utf8_lossy(&buf[..n]));
//!                 device.uart_close()?;
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Working with Multiple Devices
//!
//! `find_all` returns every FT260 interface, sorted by serial number and then
//! interface number. Pick one by `serial_number`, `path` or
//! `interface_number` and open it with `Ft260::open`. Each UART interface
//! takes a port slot from the process-wide `PortRegistry` (4 by default);
//! use `Ft260::bind_with_options` with your own registry to change that.
//!
//! ## Hardware Setup Notes
//!
//! *   **I²C Pull-up Resistors:** Required externally (e.g., 4.7kΩ to 3.3V).
//! *   **Linux udev Rules:** Grant user permission to the HID devices. Create `/etc/udev/rules.d/99-ft260.rules`:
//!     ```udev
//!     # Rule for FTDI FT260 HID interfaces
//!     SUBSYSTEM=="hidraw", ATTRS{idVendor}=="0403", ATTRS{idProduct}=="6030", MODE="0666", GROUP="plugdev"
//!     ```
//!     *(Adjust `GROUP` if needed)*. Reload: `sudo udevadm control --reload-rules && sudo udevadm trigger`
//! *   **Kernel driver:** If the in-kernel `hid-ft260` driver is loaded it
//!     claims the interfaces; unbind it or blacklist the module first.
//!
//! ## License
//!
//! This project is licensed under the WTFPL - see the [LICENSE](LICENSE) file for details.

pub mod config;
pub mod consts;
mod device;
mod dispatch;
mod error;
pub mod fifo;
pub mod i2c;
pub mod registry;
pub mod report;
pub mod transport;
pub mod uart;

pub use device::{
    detect_interface, find_all, find_first, BridgeOptions, Ft260, Ft260DeviceInfo, Mode,
};
pub use error::{Error, Result};
pub use i2c::{AdapterQuirks, BusState, I2cMessage, SmbusData, SmbusDirection, SmbusSize};
pub use registry::{PortRegistry, PortSlot};
pub use report::{ChipVersion, I2cStatus, SystemSetting, SystemStatus, TransactionCondition};
pub use transport::{HidTransport, InputHandler, PowerHint, ReportTransport};
pub use uart::{DataBits, FlowControl, LineConfig, Parity, PortListener, RxBuffer, StopBits, UartStats};
// Re-export only essential public constants
pub use consts::{FT260_PID, FTDI_VID};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_device_is_shareable() {
        assert_send_sync::<Ft260<HidTransport>>();
        assert_send_sync::<std::sync::Arc<Ft260>>();
    }

    #[test]
    fn test_usb_ids() {
        assert_eq!(FTDI_VID, 0x0403);
        assert_eq!(FT260_PID, 0x6030);
    }

    #[test]
    fn test_error_messages() {
        let e = Error::I2cIo {
            address: 0x50,
            status: 0x26,
        };
        assert_eq!(
            e.to_string(),
            "I2C transfer to address 0x50 failed (bus status 0x26)"
        );
        let e = Error::WrongMode {
            expected: Mode::Uart,
            actual: Mode::I2c,
        };
        assert!(e.to_string().contains("Uart"));
    }
}
