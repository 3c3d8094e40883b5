//! Routing of asynchronously delivered input reports.

use crate::consts;
use crate::device::{Engine, Ft260};
use crate::error::{Error, Result};
use crate::report::{is_i2c_data_report, is_uart_data_report, InputReport};
use crate::transport::ReportTransport;
use log::{error, trace, warn};

impl<T: ReportTransport> Ft260<T> {
    /// Handles one input report, `[report id, length, data...]`.
    ///
    /// I2C data goes to the outstanding read, UART data to the receive path.
    /// Returns the number of payload bytes consumed; unknown or unexpected
    /// reports are logged and dropped with `Ok(0)`.
    ///
    /// The transport's input handler calls this; it is public so that other
    /// report sources can feed a device.
    pub fn handle_input_report(&self, raw: &[u8]) -> Result<usize> {
        let report = InputReport::decode(raw).map_err(|e| {
            error!("{}", e);
            e
        })?;
        trace!(
            "input report 0x{:02x}, {} bytes",
            report.report_id,
            report.payload.len()
        );

        if is_i2c_data_report(report.report_id) {
            return match &self.engine {
                Engine::I2c(engine) => engine.deliver(report.payload),
                Engine::Uart(_) => {
                    warn!(
                        "I2C data report 0x{:02x} on a UART interface, dropped",
                        report.report_id
                    );
                    Ok(0)
                }
            };
        }

        if report.payload.len() > consts::RD_DATA_MAX {
            error!(
                "report 0x{:02x}: payload of {} bytes too long",
                report.report_id,
                report.payload.len()
            );
            return Err(Error::BadReport {
                report_id: report.report_id,
                length: report.payload.len(),
            });
        }

        if is_uart_data_report(report.report_id) {
            return match &self.engine {
                Engine::Uart(_) => self.uart_receive(report.report_id, report.payload),
                Engine::I2c(_) => {
                    warn!(
                        "UART data report 0x{:02x} on an I2C interface, dropped",
                        report.report_id
                    );
                    Ok(0)
                }
            };
        }

        warn!("unhandled report 0x{:02x}", report.report_id);
        Ok(0)
    }
}
