//! Device discovery, binding and the per-device context shared by the engines.

use crate::consts;
use crate::error::{Error, Result};
use crate::i2c::{BusState, I2cEngine};
use crate::registry::PortRegistry;
use crate::report::{ChipVersion, I2cStatus, SystemSetting, SystemStatus};
use crate::transport::{HidTransport, ReportTransport};
use crate::uart::{LineConfig, UartEngine};
use hidapi::HidApi;
use log::{debug, error, info, trace};
use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Interface function a device is bound to. Fixed for the device's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// USB HID to I2C/SMBus master.
    I2c,
    /// USB HID to UART.
    Uart,
}

/// Maps the strapped chip mode and the USB interface number to the function
/// the interface provides. Returns `None` for chip modes with no I2C or UART.
pub fn detect_interface(chip_mode: u8, interface_number: i32) -> Option<Mode> {
    match chip_mode {
        consts::chip_mode::ALL | consts::chip_mode::BOTH => {
            if interface_number == 1 {
                Some(Mode::Uart)
            } else {
                Some(Mode::I2c)
            }
        }
        consts::chip_mode::I2C => Some(Mode::I2c),
        consts::chip_mode::UART => Some(Mode::Uart),
        _ => None,
    }
}

/// Runtime knobs of the bridge engines.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// How long an I2C read waits for its data before resetting the bus.
    pub read_timeout: Duration,
    /// Status polls after each I2C output report while the controller is busy.
    pub status_retries: u8,
    /// UART transmit FIFO capacity in bytes.
    pub fifo_capacity: usize,
    /// Capacity of the default UART receive buffer.
    pub rx_capacity: usize,
    /// Line configuration sent when a UART interface is bound.
    pub initial_line_config: LineConfig,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            status_retries: 3,
            fifo_capacity: consts::FIFO_SIZE,
            rx_capacity: 4096,
            initial_line_config: LineConfig::default(),
        }
    }
}

impl BridgeOptions {
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_status_retries(mut self, retries: u8) -> Self {
        self.status_retries = retries.max(1);
        self
    }

    pub fn with_fifo_capacity(mut self, capacity: usize) -> Self {
        self.fifo_capacity = capacity;
        self
    }

    pub fn with_rx_capacity(mut self, capacity: usize) -> Self {
        self.rx_capacity = capacity;
        self
    }

    pub fn with_initial_line_config(mut self, config: LineConfig) -> Self {
        self.initial_line_config = config;
        self
    }
}

/// Information about one discovered FT260 HID interface.
#[derive(Debug, Clone)]
pub struct Ft260DeviceInfo {
    pub vid: u16,
    pub pid: u16,
    pub path: CString,
    pub serial_number: Option<String>,
    pub product_string: Option<String>,
    /// 0 is the I2C interface, 1 the UART interface (in dual-interface modes).
    pub interface_number: i32,
}

/// Finds all FT260 HID interfaces, ordered by serial number then interface.
pub fn find_all(hid_api: &HidApi) -> Result<Vec<Ft260DeviceInfo>> {
    let mut found: Vec<Ft260DeviceInfo> = hid_api
        .device_list()
        .filter(|info| {
            info.vendor_id() == consts::FTDI_VID && info.product_id() == consts::FT260_PID
        })
        .map(|info| {
            debug!(
                "Found FT260 interface: VID={:04X}, PID={:04X}, Interface={}, Path={:?}, SN={:?}",
                info.vendor_id(),
                info.product_id(),
                info.interface_number(),
                info.path(),
                info.serial_number()
            );
            Ft260DeviceInfo {
                vid: info.vendor_id(),
                pid: info.product_id(),
                path: info.path().to_owned(),
                serial_number: info.serial_number().map(|s| s.to_string()),
                product_string: info.product_string().map(|s| s.to_string()),
                interface_number: info.interface_number(),
            }
        })
        .collect();
    found.sort_by(|a, b| {
        a.serial_number
            .cmp(&b.serial_number)
            .then(a.interface_number.cmp(&b.interface_number))
    });
    Ok(found)
}

/// Finds the first FT260 interface.
/// **Warning:** Ambiguous if multiple devices exist.
pub fn find_first(hid_api: &HidApi) -> Result<Ft260DeviceInfo> {
    find_all(hid_api)?
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound)
}

/// Mode-specific state. A device is bound as exactly one of these.
pub(crate) enum Engine {
    I2c(I2cEngine),
    Uart(UartEngine),
}

/// A bound FT260 interface: the context shared by the I2C and UART engines
/// and the dispatcher.
///
/// Instances are created by [`Ft260::bind`] (or the `open_*` helpers) and are
/// always handed out as `Arc<Ft260<T>>`, since the transport's input handler
/// refers back to the device. Dropping the last `Arc` unbinds the device.
pub struct Ft260<T: ReportTransport = HidTransport> {
    pub(crate) transport: Arc<T>,
    pub(crate) mode: Mode,
    pub(crate) chip_version: ChipVersion,
    pub(crate) clock_khz: AtomicU16,
    pub(crate) options: BridgeOptions,
    pub(crate) engine: Engine,
}

impl<T: ReportTransport> std::fmt::Debug for Ft260<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ft260")
            .field("mode", &self.mode)
            .field("chip_version", &self.chip_version)
            .field("clock_khz", &self.clock_khz.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Ft260<HidTransport> {
    /// Opens a discovered interface. Recommended method.
    pub fn open(hid_api: &HidApi, info: &Ft260DeviceInfo) -> Result<Arc<Self>> {
        let transport = HidTransport::open_path(hid_api, &info.path, info.interface_number)?;
        Self::bind(Arc::new(transport), info.interface_number)
    }

    /// Opens the first interface found. Convenient but ambiguous if multiple devices exist.
    pub fn open_first(hid_api: &HidApi) -> Result<Arc<Self>> {
        let info = find_first(hid_api)?;
        Self::open(hid_api, &info)
    }

    /// Opens an interface by its platform-specific path.
    pub fn open_by_path(hid_api: &HidApi, path: &CStr) -> Result<Arc<Self>> {
        let info = find_all(hid_api)?
            .into_iter()
            .find(|info| info.path.as_c_str() == path)
            .ok_or_else(|| Error::DeviceNotFoundByPath {
                path: format!("{:?}", path),
                message: "No FT260 interface at this path".to_string(),
            })?;
        Self::open(hid_api, &info)
    }

    /// Opens an interface by its index in the [`find_all`] order.
    pub fn open_by_index(hid_api: &HidApi, index: usize) -> Result<Arc<Self>> {
        let devices = find_all(hid_api)?;
        let info = devices.get(index).ok_or_else(|| Error::DeviceNotFoundByIndex {
            index,
            message: format!("Index out of range (found {} interfaces)", devices.len()),
        })?;
        Self::open(hid_api, info)
    }
}

impl<T: ReportTransport> Ft260<T> {
    /// Binds to an interface with default options and the shared port registry.
    pub fn bind(transport: Arc<T>, interface_number: i32) -> Result<Arc<Self>> {
        Self::bind_with_options(
            transport,
            interface_number,
            &PortRegistry::shared(),
            BridgeOptions::default(),
        )
    }

    /// Identifies the chip, detects the interface function and brings up the
    /// matching engine.
    pub fn bind_with_options(
        transport: Arc<T>,
        interface_number: i32,
        registry: &Arc<PortRegistry>,
        options: BridgeOptions,
    ) -> Result<Arc<Self>> {
        let mut buf = [0u8; consts::CHIP_VERSION_REPORT_LEN];
        read_feature(&*transport, consts::REPORT_ID_CHIP_VERSION, &mut buf).map_err(|e| {
            error!("failed to retrieve chip version: {}", e);
            e
        })?;
        let chip_version = ChipVersion::decode(&buf)?;
        info!("chip code: {}", chip_version);

        let mut buf = [0u8; consts::SYSTEM_STATUS_REPORT_LEN];
        read_feature(&*transport, consts::REPORT_ID_SYSTEM_SETTINGS, &mut buf)?;
        let status = SystemStatus::decode(&buf)?;
        debug!("interface:  0x{:02x}", interface_number);
        debug!("chip mode:  0x{:02x}", status.chip_mode);
        debug!("clock_ctl:  0x{:02x}", status.clock_ctl);
        debug!("i2c_enable: 0x{:02x}", status.i2c_enable);
        debug!("uart_mode:  0x{:02x}", status.uart_mode);

        let mode = detect_interface(status.chip_mode, interface_number).ok_or(
            Error::UnknownInterface {
                chip_mode: status.chip_mode,
            },
        )?;
        let engine = match mode {
            Mode::I2c => Engine::I2c(I2cEngine::new()),
            Mode::Uart => Engine::Uart(UartEngine::new(registry.acquire()?, &options)),
        };

        let device = Arc::new(Self {
            transport,
            mode,
            chip_version,
            clock_khz: AtomicU16::new(0),
            options,
            engine,
        });

        let weak: Weak<Self> = Arc::downgrade(&device);
        device.transport.on_input_report(Box::new(move |raw: &[u8]| {
            if let Some(device) = weak.upgrade() {
                if let Err(e) = device.handle_input_report(raw) {
                    trace!("Input report dropped: {}", e);
                }
            }
        }))?;

        match mode {
            Mode::I2c => {
                let idle = device
                    .i2c_status()
                    .map(|s| BusState::classify(s.bus_status) == BusState::Idle)
                    .unwrap_or(false);
                if !idle {
                    device.reset_bus();
                }
            }
            Mode::Uart => {
                let config = device.options.initial_line_config;
                device.uart_apply_line_config(config)?;
            }
        }
        info!("FT260 interface {} bound as {:?}", interface_number, mode);
        Ok(device)
    }

    /// Function this interface was bound as.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Chip identification read at bind time.
    pub fn chip_version(&self) -> ChipVersion {
        self.chip_version
    }

    /// Bus clock in kHz as of the last status read (0 if never read).
    pub fn cached_clock_khz(&self) -> u16 {
        self.clock_khz.load(Ordering::Relaxed)
    }

    /// Options the device was bound with.
    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Reads the system status report.
    pub fn system_status(&self) -> Result<SystemStatus> {
        let mut buf = [0u8; consts::SYSTEM_STATUS_REPORT_LEN];
        read_feature(&*self.transport, consts::REPORT_ID_SYSTEM_SETTINGS, &mut buf).map_err(
            |e| {
                error!("failed to retrieve system status: {}", e);
                e
            },
        )?;
        SystemStatus::decode(&buf)
    }

    /// Reads the I2C status report and caches the bus clock it carries.
    pub fn i2c_status(&self) -> Result<I2cStatus> {
        let mut buf = [0u8; consts::I2C_STATUS_REPORT_LEN];
        read_feature(&*self.transport, consts::REPORT_ID_I2C_STATUS, &mut buf).map_err(|e| {
            error!("failed to retrieve status: {}", e);
            e
        })?;
        let status = I2cStatus::decode(&buf)?;
        self.clock_khz.store(status.clock_khz, Ordering::Relaxed);
        debug!(
            "bus_status 0x{:02x}, clock {}",
            status.bus_status, status.clock_khz
        );
        Ok(status)
    }

    /// Resets the I2C controller.
    pub fn i2c_reset(&self) -> Result<()> {
        self.send_setting(SystemSetting::I2cReset).map_err(|e| {
            error!("failed to reset I2C controller: {}", e);
            e
        })?;
        debug!("I2C controller reset done");
        Ok(())
    }

    /// Best-effort reset on an error path; its own failure is only logged.
    pub(crate) fn reset_bus(&self) {
        let _ = self.i2c_reset();
    }

    pub(crate) fn send_setting(&self, setting: SystemSetting) -> Result<()> {
        let mut buf = [0u8; 8];
        let len = setting.encode(&mut buf)?;
        self.transport.set_feature(&buf[..len])
    }

    pub(crate) fn i2c_engine(&self) -> Result<&I2cEngine> {
        match &self.engine {
            Engine::I2c(engine) => Ok(engine),
            Engine::Uart(_) => Err(Error::WrongMode {
                expected: Mode::I2c,
                actual: self.mode,
            }),
        }
    }

    pub(crate) fn uart_engine(&self) -> Result<&UartEngine> {
        match &self.engine {
            Engine::Uart(engine) => Ok(engine),
            Engine::I2c(_) => Err(Error::WrongMode {
                expected: Mode::Uart,
                actual: self.mode,
            }),
        }
    }
}

/// Reads a feature report and checks that the full report arrived.
pub(crate) fn read_feature<T: ReportTransport + ?Sized>(
    transport: &T,
    report_id: u8,
    buf: &mut [u8],
) -> Result<()> {
    let len = transport.get_feature(report_id, buf)?;
    if len != buf.len() {
        return Err(Error::FeatureReportError { report_id });
    }
    Ok(())
}
