//! The report link underneath the bridge engines.
//!
//! [`ReportTransport`] is everything the engines need from the USB side:
//! blocking feature-report get/set, output reports, and asynchronous delivery
//! of input reports to a registered handler. [`HidTransport`] implements it
//! on top of `hidapi`.

use crate::consts;
use crate::error::{Error, Result};
use hidapi::{HidApi, HidDevice};
use log::{debug, error, trace, warn};
use std::ffi::CStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Poll interval of the input reader thread, in milliseconds.
const READER_POLL_MS: i32 = 20;

/// Callback receiving every unsolicited input report, report id included.
pub type InputHandler = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Power-state hint bracketing an I2C transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerHint {
    /// Keep the link fully powered for the duration of a transaction.
    FullOn,
    /// Transaction finished; the link may return to its normal policy.
    Normal,
}

/// Opaque send/receive of FT260 reports.
pub trait ReportTransport: Send + Sync + 'static {
    /// Reads feature report `report_id` into `buf` (report id in `buf[0]`).
    /// Returns the number of bytes received.
    fn get_feature(&self, report_id: u8, buf: &mut [u8]) -> Result<usize>;

    /// Sends `buf` as a feature report; `buf[0]` is the report id.
    fn set_feature(&self, buf: &[u8]) -> Result<()>;

    /// Sends `buf` as an output report; `buf[0]` is the report id.
    fn send_output(&self, buf: &[u8]) -> Result<()>;

    /// Registers the handler for unsolicited input reports. Deliveries are
    /// serialized: the handler is never entered concurrently.
    fn on_input_report(&self, handler: InputHandler) -> Result<()>;

    /// Power-state hint; transports without power management ignore it.
    fn power_hint(&self, _hint: PowerHint) -> Result<()> {
        Ok(())
    }
}

impl<T: ReportTransport> ReportTransport for Arc<T> {
    fn get_feature(&self, report_id: u8, buf: &mut [u8]) -> Result<usize> {
        (**self).get_feature(report_id, buf)
    }
    fn set_feature(&self, buf: &[u8]) -> Result<()> {
        (**self).set_feature(buf)
    }
    fn send_output(&self, buf: &[u8]) -> Result<()> {
        (**self).send_output(buf)
    }
    fn on_input_report(&self, handler: InputHandler) -> Result<()> {
        (**self).on_input_report(handler)
    }
    fn power_hint(&self, hint: PowerHint) -> Result<()> {
        (**self).power_hint(hint)
    }
}

/// `hidapi`-backed transport for one FT260 HID interface.
///
/// Two handles are opened on the same path: one for control and output
/// reports, and one owned by the reader thread that feeds input reports to
/// the registered handler.
pub struct HidTransport {
    device: Mutex<HidDevice>,
    reader_device: Mutex<Option<HidDevice>>,
    interface_number: i32,
    stop: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for HidTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HidTransport")
            .field("interface_number", &self.interface_number)
            .finish_non_exhaustive()
    }
}

impl HidTransport {
    /// Opens the HID interface at `path`.
    ///
    /// The path is opened twice: one handle for feature and output reports,
    /// one owned by the input reader thread. The hidraw backend on Linux
    /// allows this. The libusb and macOS backends may refuse the second open,
    /// which surfaces here as `DeviceNotFoundByPath`, or may deliver input
    /// reports to only one of the handles.
    pub fn open_path(hid_api: &HidApi, path: &CStr, interface_number: i32) -> Result<Self> {
        let open = |what: &str| {
            hid_api
                .open_path(path)
                .map_err(|e| Error::DeviceNotFoundByPath {
                    path: format!("{:?}", path),
                    message: format!("Failed to open {} handle: {}", what, e),
                })
        };
        let device = open("control")?;
        let reader_device = open("input")?;
        debug!(
            "Opened FT260 interface {} at {:?}",
            interface_number, path
        );
        Ok(Self {
            device: Mutex::new(device),
            reader_device: Mutex::new(Some(reader_device)),
            interface_number,
            stop: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
        })
    }

    /// USB interface number this transport is bound to.
    pub fn interface_number(&self) -> i32 {
        self.interface_number
    }

    fn with_device<R>(&self, f: impl FnOnce(&HidDevice) -> Result<R>) -> Result<R> {
        let device = self
            .device
            .lock()
            .map_err(|_| Error::Transport("HID device lock poisoned".to_string()))?;
        f(&device)
    }
}

impl ReportTransport for HidTransport {
    fn get_feature(&self, report_id: u8, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(Error::ResourceExhausted {
                needed: 1,
                available: 0,
            });
        }
        buf[0] = report_id;
        self.with_device(|device| match device.get_feature_report(buf) {
            Ok(len) if len == buf.len() => {
                trace!("Feature report 0x{:02X} in: {:02X?}", report_id, &buf[..len]);
                Ok(len)
            }
            Ok(len) => {
                warn!(
                    "get_feature_report 0x{:02X} returned unexpected length: {} (expected {})",
                    report_id,
                    len,
                    buf.len()
                );
                Err(Error::FeatureReportError { report_id })
            }
            Err(e) => {
                trace!("get_feature_report error: {}", e);
                Err(Error::FeatureReportError { report_id })
            }
        })
    }

    fn set_feature(&self, buf: &[u8]) -> Result<()> {
        let report_id = buf.first().copied().unwrap_or(0);
        trace!("Feature report 0x{:02X} out: {:02X?}", report_id, buf);
        self.with_device(|device| {
            device.send_feature_report(buf).map_err(|e| {
                trace!("send_feature_report error: {}", e);
                Error::FeatureReportError { report_id }
            })
        })
    }

    fn send_output(&self, buf: &[u8]) -> Result<()> {
        trace!("Output report: {:02X?}", buf);
        self.with_device(|device| match device.write(buf) {
            Ok(written) if written == buf.len() => Ok(()),
            Ok(written) => {
                warn!("Partial write: sent {} of {} bytes", written, buf.len());
                Err(Error::Io(std::io::Error::other("Partial HID write")))
            }
            Err(e) => Err(Error::Hid(e)),
        })
    }

    fn on_input_report(&self, mut handler: InputHandler) -> Result<()> {
        let device = self
            .reader_device
            .lock()
            .map_err(|_| Error::Transport("reader lock poisoned".to_string()))?
            .take()
            .ok_or_else(|| Error::Transport("input handler already registered".to_string()))?;
        let stop = Arc::clone(&self.stop);
        let handle = thread::Builder::new()
            .name("ft260-input".to_string())
            .spawn(move || {
                let mut buf = [0u8; consts::REPORT_MAX_LENGTH];
                while !stop.load(Ordering::Relaxed) {
                    match device.read_timeout(&mut buf, READER_POLL_MS) {
                        Ok(0) => continue,
                        Ok(len) => {
                            trace!("Input report: {:02X?}", &buf[..len]);
                            handler(&buf[..len]);
                        }
                        Err(e) => {
                            error!("Input report reader stopped: {}", e);
                            break;
                        }
                    }
                }
                debug!("Input report reader exiting");
            })?;
        *self
            .reader
            .lock()
            .map_err(|_| Error::Transport("reader lock poisoned".to_string()))? = Some(handle);
        Ok(())
    }
}

impl Drop for HidTransport {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Ok(mut reader) = self.reader.lock() {
            if let Some(handle) = reader.take() {
                // The last device reference may be released by the reader itself.
                if handle.thread().id() == thread::current().id() {
                    return;
                }
                if handle.join().is_err() {
                    warn!("Input report reader panicked");
                }
            }
        }
    }
}
