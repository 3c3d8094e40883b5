//! UART byte-stream bridge for FT260 devices.
//!
//! Writes are queued in a bounded transmit FIFO and drained immediately in
//! UART data reports of up to 60 bytes. Received data arrives through
//! [`Ft260::handle_input_report`] and is handed to a [`PortListener`]; by
//! default an internal [`RxBuffer`] read with [`Ft260::uart_read`].

use crate::consts::{self, uart_cfg};
use crate::device::{BridgeOptions, Ft260};
use crate::error::{Error, Result};
use crate::fifo::TxFifo;
use crate::registry::PortSlot;
use crate::report::{UartConfigRequest, UartWriteRequest};
use crate::transport::ReportTransport;
use log::{debug, error, trace};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

/// Character size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parity {
    None,
    Odd,
    Even,
    /// Parity bit always 1.
    Mark,
    /// Parity bit always 0.
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowControl {
    None,
    RtsCts,
}

/// Serial line settings, as requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl Default for LineConfig {
    /// 9600-8-N-1, no flow control.
    fn default() -> Self {
        Self {
            baud_rate: uart_cfg::BAUD_DEFAULT,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl LineConfig {
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Self::default()
        }
    }

    /// Corrects settings the chip cannot do and builds the configuration
    /// report. Returns the corrected settings along with the request.
    ///
    /// Flow control and break are always sent as "none" and "off", whatever
    /// was requested.
    pub fn to_request(self) -> (LineConfig, UartConfigRequest) {
        let mut config = self;
        let data_bits = match config.data_bits {
            DataBits::Seven => uart_cfg::DATA_BITS_7,
            DataBits::Eight => uart_cfg::DATA_BITS_8,
            DataBits::Five | DataBits::Six => {
                error!("Invalid data bit size, setting to default (8 bit)");
                config.data_bits = DataBits::Eight;
                uart_cfg::DATA_BITS_8
            }
        };
        let stop_bits = match config.stop_bits {
            StopBits::One => uart_cfg::STOP_ONE_BIT,
            StopBits::Two => uart_cfg::STOP_TWO_BITS,
        };
        let parity = match config.parity {
            Parity::None => uart_cfg::PARITY_NONE,
            Parity::Odd => uart_cfg::PARITY_ODD,
            Parity::Even => uart_cfg::PARITY_EVEN,
            Parity::Mark => uart_cfg::PARITY_HIGH,
            Parity::Space => uart_cfg::PARITY_LOW,
        };
        if !(uart_cfg::BAUD_MIN..=uart_cfg::BAUD_MAX).contains(&config.baud_rate) {
            error!("Invalid baud rate {}", config.baud_rate);
            config.baud_rate = uart_cfg::BAUD_DEFAULT;
        }
        let flow_control = match config.flow_control {
            FlowControl::RtsCts => uart_cfg::FLOW_CTRL_RTS_CTS,
            FlowControl::None => uart_cfg::FLOW_CTRL_OFF,
        };
        debug!(
            "Configured line: flow control: {}, baudrate: {}, data_bit: {}, parity: {}, stop_bit: {}",
            flow_control, config.baud_rate, data_bits, parity, stop_bits
        );

        let request = UartConfigRequest {
            flow_control: uart_cfg::FLOW_CTRL_NONE,
            baud_rate: config.baud_rate,
            data_bits,
            parity,
            stop_bits,
            breaking: uart_cfg::BREAK_OFF,
        };
        (config, request)
    }
}

/// Consumer of the UART byte stream.
///
/// Callbacks run on the transport's reader thread or inside
/// [`Ft260::uart_write`]; they must not write to the port themselves.
pub trait PortListener: Send + Sync {
    /// Takes received bytes; returns how many were accepted.
    fn on_receive(&self, data: &[u8]) -> usize;

    /// The transmit FIFO drained below half full.
    fn on_write_room(&self) {}
}

/// Bounded receive buffer, the default [`PortListener`].
#[derive(Debug)]
pub struct RxBuffer {
    queue: Mutex<VecDeque<u8>>,
    ready: Condvar,
    capacity: usize,
}

impl RxBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<u8>>> {
        self.queue
            .lock()
            .map_err(|_| Error::Transport("receive buffer lock poisoned".to_string()))
    }

    /// Bytes waiting to be read.
    pub fn len(&self) -> usize {
        self.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads available bytes, waiting up to `timeout` for the first one.
    /// Returns 0 on timeout.
    pub fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let deadline = Instant::now() + timeout;
        let mut queue = self.lock()?;
        while queue.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return Ok(0);
            }
            queue = self
                .ready
                .wait_timeout(queue, deadline - now)
                .map_err(|_| Error::Transport("receive buffer lock poisoned".to_string()))?
                .0;
        }
        let n = buf.len().min(queue.len());
        for (dst, src) in buf.iter_mut().zip(queue.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn clear(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear();
        }
    }
}

impl PortListener for RxBuffer {
    fn on_receive(&self, data: &[u8]) -> usize {
        let Ok(mut queue) = self.queue.lock() else {
            return 0;
        };
        let n = data.len().min(self.capacity - queue.len());
        queue.extend(&data[..n]);
        if n > 0 {
            self.ready.notify_all();
        }
        n
    }
}

/// Byte counters of a UART port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UartStats {
    /// Bytes handed to the transport.
    pub tx: u64,
    /// Bytes accepted by the listener.
    pub rx: u64,
    /// Write-room notifications issued.
    pub write_wakeups: u64,
    /// Drains cut short by a transport failure.
    pub tx_errors: u64,
}

#[derive(Debug)]
struct PortState {
    open_count: usize,
    line: LineConfig,
}

/// Per-device UART state.
pub(crate) struct UartEngine {
    slot: PortSlot,
    fifo: Mutex<TxFifo>,
    /// Serializes drains; owns the transmit staging buffer.
    tx: Mutex<[u8; consts::REPORT_MAX_LENGTH]>,
    port: Mutex<PortState>,
    rx: Arc<RxBuffer>,
    listener: RwLock<Arc<dyn PortListener>>,
    tx_count: AtomicU64,
    rx_count: AtomicU64,
    wakeups: AtomicU64,
    tx_errors: AtomicU64,
}

impl UartEngine {
    pub(crate) fn new(slot: PortSlot, options: &BridgeOptions) -> Self {
        let rx = Arc::new(RxBuffer::new(options.rx_capacity));
        let listener: Arc<dyn PortListener> = rx.clone();
        Self {
            slot,
            fifo: Mutex::new(TxFifo::new(options.fifo_capacity)),
            tx: Mutex::new([0; consts::REPORT_MAX_LENGTH]),
            port: Mutex::new(PortState {
                open_count: 0,
                line: options.initial_line_config,
            }),
            rx,
            listener: RwLock::new(listener),
            tx_count: AtomicU64::new(0),
            rx_count: AtomicU64::new(0),
            wakeups: AtomicU64::new(0),
            tx_errors: AtomicU64::new(0),
        }
    }

    fn lock_fifo(&self) -> Result<MutexGuard<'_, TxFifo>> {
        self.fifo
            .lock()
            .map_err(|_| Error::Transport("transmit FIFO lock poisoned".to_string()))
    }

    fn lock_port(&self) -> Result<MutexGuard<'_, PortState>> {
        self.port
            .lock()
            .map_err(|_| Error::Transport("port state lock poisoned".to_string()))
    }

    fn listener(&self) -> Result<Arc<dyn PortListener>> {
        self.listener
            .read()
            .map(|l| Arc::clone(&*l))
            .map_err(|_| Error::Transport("listener lock poisoned".to_string()))
    }
}

impl<T: ReportTransport> Ft260<T> {
    /// Sends a line configuration without touching the port state.
    pub(crate) fn uart_apply_line_config(&self, config: LineConfig) -> Result<LineConfig> {
        let (config, request) = config.to_request();
        let mut buf = [0u8; consts::UART_CONFIG_REQUEST_LEN];
        let len = request.encode(&mut buf)?;
        self.transport.set_feature(&buf[..len]).map_err(|e| {
            error!("failed to set UART configuration: {}", e);
            e
        })?;
        Ok(config)
    }

    /// Opens the port. The first open resets the transmit FIFO and applies
    /// the stored line configuration.
    pub fn uart_open(&self) -> Result<()> {
        let engine = self.uart_engine()?;
        let mut port = engine.lock_port()?;
        if port.open_count == 0 {
            engine.lock_fifo()?.reset();
            port.line = self.uart_apply_line_config(port.line)?;
            debug!("UART port {} activated", engine.slot.index());
        }
        port.open_count += 1;
        Ok(())
    }

    /// Drops one open reference.
    pub fn uart_close(&self) -> Result<()> {
        let engine = self.uart_engine()?;
        let mut port = engine.lock_port()?;
        if port.open_count == 0 {
            return Err(Error::PortNotOpen);
        }
        port.open_count -= 1;
        if port.open_count == 0 {
            debug!("UART port {} shut down", engine.slot.index());
        }
        Ok(())
    }

    /// Forces the port closed regardless of how many opens are outstanding.
    pub fn uart_hangup(&self) -> Result<()> {
        let engine = self.uart_engine()?;
        let mut port = engine.lock_port()?;
        if port.open_count > 0 {
            debug!(
                "UART port {} hung up ({} opens dropped)",
                engine.slot.index(),
                port.open_count
            );
        }
        port.open_count = 0;
        Ok(())
    }

    pub fn uart_is_open(&self) -> Result<bool> {
        Ok(self.uart_engine()?.lock_port()?.open_count > 0)
    }

    /// Index of the port slot held by this device.
    pub fn uart_port_index(&self) -> Result<usize> {
        Ok(self.uart_engine()?.slot.index())
    }

    /// Queues as much of `data` as fits and transmits the FIFO contents.
    /// Returns the number of bytes accepted, which may be less than
    /// `data.len()`; see [`Ft260::uart_write_room`].
    ///
    /// Accepted bytes stay committed when the transport refuses a report.
    /// The failure is logged and the unsent bytes go out with the next write.
    pub fn uart_write(&self, data: &[u8]) -> Result<usize> {
        let engine = self.uart_engine()?;
        if engine.lock_port()?.open_count == 0 {
            return Err(Error::PortNotOpen);
        }
        let accepted = engine.lock_fifo()?.push(data);
        trace!("UART write: {} of {} bytes queued", accepted, data.len());
        if let Err(e) = self.uart_transmit(engine) {
            engine.tx_errors.fetch_add(1, Ordering::Relaxed);
            error!(
                "Failed sending all FIFO data bytes ({} left queued): {}",
                engine.lock_fifo()?.len(),
                e
            );
        }
        Ok(accepted)
    }

    /// Drains the FIFO in report-sized chunks. A chunk leaves the FIFO only
    /// once its report has been sent.
    fn uart_transmit(&self, engine: &UartEngine) -> Result<()> {
        let mut tx_buf = engine
            .tx
            .lock()
            .map_err(|_| Error::Transport("transmit lock poisoned".to_string()))?;

        let mut data_len = engine.lock_fifo()?.len();
        let mut chunk = [0u8; consts::WR_DATA_MAX];
        while data_len > 0 {
            let want = data_len.min(consts::WR_DATA_MAX);
            let len = engine.lock_fifo()?.peek_into(&mut chunk[..want]);
            if len == 0 {
                break;
            }
            let request = UartWriteRequest::new(&chunk[..len]);
            let report_len = request.encode(&mut tx_buf[..])?;
            self.transport.send_output(&tx_buf[..report_len]).map_err(|e| {
                error!("Failed to start transfer: {}", e);
                e
            })?;
            engine.lock_fifo()?.consume(len);
            data_len -= len;
            engine.tx_count.fetch_add(len as u64, Ordering::Relaxed);
        }

        let (free, capacity) = {
            let fifo = engine.lock_fifo()?;
            (fifo.free(), fifo.capacity())
        };
        if free > capacity / 2 {
            engine.wakeups.fetch_add(1, Ordering::Relaxed);
            engine.listener()?.on_write_room();
        }
        Ok(())
    }

    /// Free space in the transmit FIFO.
    pub fn uart_write_room(&self) -> Result<usize> {
        Ok(self.uart_engine()?.lock_fifo()?.free())
    }

    /// Bytes queued in the transmit FIFO.
    pub fn uart_chars_in_buffer(&self) -> Result<usize> {
        Ok(self.uart_engine()?.lock_fifo()?.len())
    }

    /// Applies new line settings. Returns the settings after correction.
    pub fn uart_set_line_config(&self, config: LineConfig) -> Result<LineConfig> {
        let engine = self.uart_engine()?;
        let mut port = engine.lock_port()?;
        let applied = self.uart_apply_line_config(config)?;
        port.line = applied;
        Ok(applied)
    }

    /// Settings last applied.
    pub fn uart_line_config(&self) -> Result<LineConfig> {
        Ok(self.uart_engine()?.lock_port()?.line)
    }

    /// Reads received bytes from the default receive buffer, waiting up to
    /// `timeout` for data. Returns 0 on timeout.
    ///
    /// Data delivered to a listener installed with
    /// [`Ft260::uart_set_listener`] does not show up here.
    pub fn uart_read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.uart_engine()?.rx.read(buf, timeout)
    }

    /// Routes received data to `listener` instead of the default buffer.
    pub fn uart_set_listener(&self, listener: Arc<dyn PortListener>) -> Result<()> {
        let engine = self.uart_engine()?;
        *engine
            .listener
            .write()
            .map_err(|_| Error::Transport("listener lock poisoned".to_string()))? = listener;
        engine.rx.clear();
        Ok(())
    }

    pub fn uart_stats(&self) -> Result<UartStats> {
        let engine = self.uart_engine()?;
        Ok(UartStats {
            tx: engine.tx_count.load(Ordering::Relaxed),
            rx: engine.rx_count.load(Ordering::Relaxed),
            write_wakeups: engine.wakeups.load(Ordering::Relaxed),
            tx_errors: engine.tx_errors.load(Ordering::Relaxed),
        })
    }

    /// Hands the payload of a UART data report to the listener.
    pub(crate) fn uart_receive(&self, report_id: u8, data: &[u8]) -> Result<usize> {
        let engine = self.uart_engine()?;
        if data.len() > consts::RD_DATA_MAX {
            error!("Received too much data ({})", data.len());
            return Err(Error::BadReport {
                report_id,
                length: data.len(),
            });
        }
        let accepted = engine.listener()?.on_receive(data);
        if accepted != data.len() {
            error!("{} char not inserted to receive buffer", data.len() - accepted);
        }
        engine.rx_count.fetch_add(accepted as u64, Ordering::Relaxed);
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_config_passes_valid_settings() {
        let config = LineConfig {
            baud_rate: 115_200,
            data_bits: DataBits::Seven,
            parity: Parity::Even,
            stop_bits: StopBits::Two,
            flow_control: FlowControl::None,
        };
        let (applied, req) = config.to_request();
        assert_eq!(applied, config);
        assert_eq!(req.baud_rate, 115_200);
        assert_eq!(req.data_bits, uart_cfg::DATA_BITS_7);
        assert_eq!(req.parity, uart_cfg::PARITY_EVEN);
        assert_eq!(req.stop_bits, uart_cfg::STOP_TWO_BITS);
    }

    #[test]
    fn test_line_config_corrections() {
        let config = LineConfig {
            baud_rate: 600,
            data_bits: DataBits::Five,
            ..LineConfig::default()
        };
        let (applied, req) = config.to_request();
        assert_eq!(applied.baud_rate, 9600);
        assert_eq!(applied.data_bits, DataBits::Eight);
        assert_eq!(req.baud_rate, 9600);
        assert_eq!(req.data_bits, uart_cfg::DATA_BITS_8);

        let (applied, _) = LineConfig::new(12_000_001).to_request();
        assert_eq!(applied.baud_rate, 9600);
        let (applied, _) = LineConfig::new(12_000_000).to_request();
        assert_eq!(applied.baud_rate, 12_000_000);
        let (applied, _) = LineConfig::new(1200).to_request();
        assert_eq!(applied.baud_rate, 1200);
    }

    #[test]
    fn test_flow_control_is_always_sent_as_none() {
        // Current behaviour: the RTS/CTS request is kept in the settings but
        // the chip is configured without flow control and with break off.
        let config = LineConfig {
            flow_control: FlowControl::RtsCts,
            ..LineConfig::default()
        };
        let (applied, req) = config.to_request();
        assert_eq!(applied.flow_control, FlowControl::RtsCts);
        assert_eq!(req.flow_control, uart_cfg::FLOW_CTRL_NONE);
        assert_eq!(req.breaking, uart_cfg::BREAK_OFF);
    }

    #[test]
    fn test_mark_space_parity() {
        let (_, req) = LineConfig {
            parity: Parity::Mark,
            ..LineConfig::default()
        }
        .to_request();
        assert_eq!(req.parity, uart_cfg::PARITY_HIGH);
        let (_, req) = LineConfig {
            parity: Parity::Space,
            ..LineConfig::default()
        }
        .to_request();
        assert_eq!(req.parity, uart_cfg::PARITY_LOW);
    }

    #[test]
    fn test_rx_buffer_bounded_and_timed() {
        let rx = RxBuffer::new(4);
        assert_eq!(rx.on_receive(&[1, 2, 3, 4, 5, 6]), 4);
        assert_eq!(rx.len(), 4);
        let mut buf = [0u8; 8];
        assert_eq!(rx.read(&mut buf, Duration::from_millis(1)).unwrap(), 4);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
        assert_eq!(rx.read(&mut buf, Duration::from_millis(5)).unwrap(), 0);
    }
}
