//! I2C master and SMBus engine for FT260 devices.
//!
//! Every bus transaction is a sequence of reports: data goes out in write
//! reports of at most 60 bytes, each followed by a status poll, and reads are
//! requested with a read-request report whose data comes back asynchronously
//! through [`Ft260::handle_input_report`]. One transaction runs at a time per
//! device.

use crate::consts::{self, i2c_status};
use crate::device::Ft260;
use crate::error::{Error, Result};
use crate::report::{i2c_data_report_id, I2cReadRequest, I2cWriteRequest, TransactionCondition};
use crate::transport::{PowerHint, ReportTransport};
use log::{debug, error, trace, warn};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Capability bits reported by [`Ft260::functionality`], using the Linux
/// `I2C_FUNC_*` values.
pub mod functionality {
    pub const I2C: u32 = 0x0000_0001;
    pub const SMBUS_QUICK: u32 = 0x0001_0000;
    pub const SMBUS_READ_BYTE: u32 = 0x0002_0000;
    pub const SMBUS_WRITE_BYTE: u32 = 0x0004_0000;
    pub const SMBUS_READ_BYTE_DATA: u32 = 0x0008_0000;
    pub const SMBUS_WRITE_BYTE_DATA: u32 = 0x0010_0000;
    pub const SMBUS_READ_WORD_DATA: u32 = 0x0020_0000;
    pub const SMBUS_WRITE_WORD_DATA: u32 = 0x0040_0000;
    pub const SMBUS_READ_BLOCK_DATA: u32 = 0x0100_0000;
    pub const SMBUS_WRITE_BLOCK_DATA: u32 = 0x0200_0000;
    pub const SMBUS_READ_I2C_BLOCK: u32 = 0x0400_0000;
    pub const SMBUS_WRITE_I2C_BLOCK: u32 = 0x0800_0000;

    pub const SMBUS_BYTE: u32 = SMBUS_READ_BYTE | SMBUS_WRITE_BYTE;
    pub const SMBUS_BYTE_DATA: u32 = SMBUS_READ_BYTE_DATA | SMBUS_WRITE_BYTE_DATA;
    pub const SMBUS_WORD_DATA: u32 = SMBUS_READ_WORD_DATA | SMBUS_WRITE_WORD_DATA;
    pub const SMBUS_BLOCK_DATA: u32 = SMBUS_READ_BLOCK_DATA | SMBUS_WRITE_BLOCK_DATA;
    pub const SMBUS_I2C_BLOCK: u32 = SMBUS_READ_I2C_BLOCK | SMBUS_WRITE_I2C_BLOCK;
}

/// Limits of the combined transfers the adapter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterQuirks {
    /// Two-message transfers must be a write followed by a read.
    pub combined_write_then_read: bool,
    /// Longest first (offset) message of a combined transfer.
    pub max_comb_first_msg_len: usize,
}

/// Interpretation of the controller's `bus_status` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    /// Controller still working; poll again.
    ControllerBusy,
    /// Another master holds the bus.
    BusBusy,
    /// Error, NACK or arbitration loss.
    Failed,
    /// Controller idle, last transfer done.
    Idle,
}

impl BusState {
    pub fn classify(bus_status: u8) -> Self {
        if bus_status & i2c_status::CTRL_BUSY != 0 {
            return BusState::ControllerBusy;
        }
        if bus_status & i2c_status::BUS_BUSY != 0 {
            return BusState::BusBusy;
        }
        if bus_status & i2c_status::ADDR_NO_ACK != 0 {
            debug!("unacknowledged address");
        }
        if bus_status & i2c_status::DATA_NO_ACK != 0 {
            debug!("unacknowledged data");
        }
        if bus_status & i2c_status::ARBITRATION_LOST != 0 {
            debug!("arbitration loss");
        }
        let failure = i2c_status::ERROR
            | i2c_status::ADDR_NO_ACK
            | i2c_status::DATA_NO_ACK
            | i2c_status::ARBITRATION_LOST;
        if bus_status & failure == 0 && bus_status & i2c_status::CTRL_IDLE != 0 {
            BusState::Idle
        } else {
            BusState::Failed
        }
    }
}

/// One message of an [`Ft260::i2c_transfer`].
#[derive(Debug)]
pub enum I2cMessage<'a> {
    Write { address: u8, data: &'a [u8] },
    Read { address: u8, buffer: &'a mut [u8] },
}

impl I2cMessage<'_> {
    pub fn address(&self) -> u8 {
        match self {
            I2cMessage::Write { address, .. } | I2cMessage::Read { address, .. } => *address,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmbusDirection {
    Read,
    Write,
}

/// SMBus transaction shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmbusSize {
    Quick,
    Byte,
    ByteData,
    WordData,
    ProcCall,
    BlockData,
    I2cBlockData,
    BlockProcCall,
}

/// Data exchanged by an SMBus transaction.
///
/// `block[0]` holds the byte count for the block sizes, followed by the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmbusData {
    pub byte: u8,
    pub word: u16,
    pub block: [u8; consts::SMBUS_BLOCK_MAX + 2],
}

impl Default for SmbusData {
    fn default() -> Self {
        Self {
            byte: 0,
            word: 0,
            block: [0; consts::SMBUS_BLOCK_MAX + 2],
        }
    }
}

impl SmbusData {
    /// Block with the count in `block[0]` and `data` after it.
    pub fn with_block(data: &[u8]) -> Result<Self> {
        let count = block_count(data.len())?;
        let mut smbus = Self::default();
        smbus.block[0] = count as u8;
        smbus.block[1..=count].copy_from_slice(data);
        Ok(smbus)
    }

    /// Data bytes of a block transfer, as counted by `block[0]`.
    pub fn block_data(&self) -> &[u8] {
        let count = (self.block[0] as usize).min(consts::SMBUS_BLOCK_MAX);
        &self.block[1..=count]
    }
}

fn block_count(count: usize) -> Result<usize> {
    if count > consts::SMBUS_BLOCK_MAX {
        return Err(Error::InvalidArgument(format!(
            "SMBus block of {} bytes exceeds the {} byte maximum",
            count,
            consts::SMBUS_BLOCK_MAX
        )));
    }
    Ok(count)
}

/// Condition for one fragment of a multi-report write: the START part goes on
/// the first fragment and the STOP part on the last.
fn fragment_condition(condition: TransactionCondition, first: bool, last: bool) -> TransactionCondition {
    use TransactionCondition::*;
    match (first, last) {
        (true, true) => condition,
        (true, false) => match condition {
            Start | StartStop => Start,
            StartRepeated | StartStopRepeated => StartRepeated,
            None | Stop => None,
        },
        (false, true) => match condition {
            Stop | StartStop | StartStopRepeated => Stop,
            _ => None,
        },
        (false, false) => None,
    }
}

/// An outstanding read, filled by the dispatcher.
#[derive(Debug)]
struct PendingRead {
    generation: u64,
    armed: bool,
    completed: bool,
    requested: usize,
    received: usize,
    buf: [u8; consts::RD_DATA_MAX + 2],
}

/// Per-device I2C state.
pub(crate) struct I2cEngine {
    /// Transaction lock; owns the write-staging buffer.
    xfer: Mutex<[u8; consts::REPORT_MAX_LENGTH]>,
    pending: Mutex<PendingRead>,
    done: Condvar,
}

impl I2cEngine {
    pub(crate) fn new() -> Self {
        Self {
            xfer: Mutex::new([0; consts::REPORT_MAX_LENGTH]),
            pending: Mutex::new(PendingRead {
                generation: 0,
                armed: false,
                completed: false,
                requested: 0,
                received: 0,
                buf: [0; consts::RD_DATA_MAX + 2],
            }),
            done: Condvar::new(),
        }
    }

    fn lock_pending(&self) -> Result<MutexGuard<'_, PendingRead>> {
        self.pending
            .lock()
            .map_err(|_| Error::Transport("pending read lock poisoned".to_string()))
    }

    /// Starts a new read of `len` bytes and returns its generation.
    fn arm(&self, len: usize) -> Result<u64> {
        let mut pending = self.lock_pending()?;
        pending.generation = pending.generation.wrapping_add(1);
        pending.armed = true;
        pending.completed = false;
        pending.requested = len;
        pending.received = 0;
        Ok(pending.generation)
    }

    fn disarm(&self, generation: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            if pending.generation == generation {
                pending.armed = false;
            }
        }
    }

    /// Appends read data from an input report to the outstanding read.
    /// Returns the number of bytes taken.
    pub(crate) fn deliver(&self, data: &[u8]) -> Result<usize> {
        let mut pending = self.lock_pending()?;
        if !pending.armed {
            warn!(
                "I2C data report of {} bytes with no read pending, dropped",
                data.len()
            );
            return Ok(0);
        }
        let start = pending.received;
        let n = data.len().min(pending.buf.len() - start);
        if n < data.len() {
            warn!("I2C read overrun: dropped {} bytes", data.len() - n);
        }
        pending.buf[start..start + n].copy_from_slice(&data[..n]);
        pending.received += n;
        trace!(
            "I2C read data: {} of {} bytes",
            pending.received,
            pending.requested
        );
        if pending.received >= pending.requested {
            if pending.received > pending.requested {
                warn!(
                    "I2C read got {} bytes, {} requested",
                    pending.received, pending.requested
                );
            }
            pending.armed = false;
            pending.completed = true;
            self.done.notify_all();
        }
        Ok(n)
    }

    /// Waits for read `generation` to complete and copies its data into
    /// `dest`. Returns false on timeout, leaving the read disarmed.
    fn wait(&self, generation: u64, timeout: Duration, dest: &mut [u8]) -> Result<bool> {
        let pending = self.lock_pending()?;
        let (mut pending, _) = self
            .done
            .wait_timeout_while(pending, timeout, |p| {
                !(p.generation == generation && p.completed)
            })
            .map_err(|_| Error::Transport("pending read lock poisoned".to_string()))?;
        if pending.generation == generation && pending.completed {
            let n = pending.requested.min(dest.len());
            dest[..n].copy_from_slice(&pending.buf[..n]);
            Ok(true)
        } else {
            pending.armed = false;
            Ok(false)
        }
    }
}

/// A running I2C transaction: holds the device's transaction lock.
struct Transaction<'a, T: ReportTransport> {
    dev: &'a Ft260<T>,
    engine: &'a I2cEngine,
    buf: MutexGuard<'a, [u8; consts::REPORT_MAX_LENGTH]>,
}

impl<T: ReportTransport> Transaction<'_, T> {
    /// Sends the first `len` staged bytes, waits for the bus and polls status.
    fn send_checked(&mut self, address: u8, len: usize) -> Result<()> {
        let dev = self.dev;
        if let Err(e) = dev.transport.send_output(&self.buf[..len]) {
            error!("failed to start transfer: {}", e);
            dev.reset_bus();
            return Err(e);
        }

        // transfer time = 1 / clock(kHz) * 10 bits * bytes
        let clock = match dev.cached_clock_khz() {
            0 => consts::DEFAULT_I2C_CLOCK_KHZ,
            khz => khz,
        };
        let usec = 10_000 / u64::from(clock) * len as u64;
        thread::sleep(Duration::from_micros(usec));
        debug!("wait {} usec, len {}", usec, len);

        let mut last = None;
        for _ in 0..dev.options.status_retries {
            match dev.i2c_status() {
                Ok(status) => {
                    let state = BusState::classify(status.bus_status);
                    last = Some((state, status.bus_status));
                    if state != BusState::ControllerBusy {
                        break;
                    }
                }
                Err(_) => {
                    last = None;
                    break;
                }
            }
        }

        match last {
            Some((BusState::Idle, _)) | Some((BusState::BusBusy, _)) => Ok(()),
            other => {
                let status = other.map(|(_, bits)| bits).unwrap_or(0);
                dev.reset_bus();
                Err(Error::I2cIo { address, status })
            }
        }
    }

    fn write(&mut self, address: u8, data: &[u8], condition: TransactionCondition) -> Result<()> {
        let total = data.len();
        let mut offset = 0;
        loop {
            let len = (total - offset).min(consts::WR_DATA_MAX);
            let first = offset == 0;
            let last = offset + len == total;
            let request = I2cWriteRequest::new(
                address,
                fragment_condition(condition, first, last),
                &data[offset..offset + len],
            );
            let report_len = request.encode(&mut self.buf[..])?;
            debug!(
                "rep 0x{:02x} addr 0x{:02x} off {} len {}",
                request.report_id, address, offset, len
            );
            self.send_checked(address, report_len).map_err(|e| {
                error!("failed to write to 0x{:02x}: {}", address, e);
                e
            })?;
            offset += len;
            if offset >= total {
                break;
            }
        }
        Ok(())
    }

    /// Single-report `[command, data...]` write. The report id follows the
    /// total report length.
    fn smbus_write(
        &mut self,
        address: u8,
        command: u8,
        data: &[u8],
        condition: TransactionCondition,
    ) -> Result<()> {
        if data.len() >= consts::WR_DATA_MAX {
            return Err(Error::InvalidArgument(format!(
                "SMBus write of {} data bytes exceeds {}",
                data.len(),
                consts::WR_DATA_MAX - 1
            )));
        }
        let mut payload = [0u8; consts::WR_DATA_MAX];
        payload[0] = command;
        payload[1..=data.len()].copy_from_slice(data);
        let length = data.len() + 1;
        let request = I2cWriteRequest {
            report_id: i2c_data_report_id(consts::I2C_WRITE_HEADER_LEN + length),
            address,
            condition,
            data: &payload[..length],
        };
        let report_len = request.encode(&mut self.buf[..])?;
        debug!(
            "rep 0x{:02x} addr 0x{:02x} cmd 0x{:02x} datlen {} replen {}",
            request.report_id,
            address,
            command,
            length,
            report_len
        );
        self.send_checked(address, report_len)
    }

    fn read(&mut self, address: u8, dest: &mut [u8], condition: TransactionCondition) -> Result<()> {
        let len = dest.len();
        if len > consts::RD_DATA_MAX {
            error!("unsupported rd len: {}", len);
            return Err(Error::InvalidArgument(format!(
                "read of {} bytes exceeds {}",
                len,
                consts::RD_DATA_MAX
            )));
        }
        let request = I2cReadRequest {
            address,
            condition,
            length: len as u16,
        };
        let report_len = request.encode(&mut self.buf[..])?;
        debug!("rep 0x{:02x} addr 0x{:02x} len {}", consts::REPORT_ID_I2C_READ_REQ, address, len);

        let generation = self.engine.arm(len)?;
        if let Err(e) = self.dev.transport.send_output(&self.buf[..report_len]) {
            error!("failed to start transaction: {}", e);
            self.engine.disarm(generation);
            return Err(e);
        }

        if !self
            .engine
            .wait(generation, self.dev.options.read_timeout, dest)?
        {
            error!("timeout reading {} bytes from 0x{:02x}", len, address);
            self.dev.reset_bus();
            return Err(Error::Timeout { address });
        }

        match self.dev.i2c_status() {
            Ok(status) => match BusState::classify(status.bus_status) {
                BusState::Idle => Ok(()),
                BusState::BusBusy => {
                    error!("bus busy after reading from 0x{:02x}", address);
                    self.dev.reset_bus();
                    Err(Error::BusBusy)
                }
                _ => {
                    self.dev.reset_bus();
                    Err(Error::I2cIo {
                        address,
                        status: status.bus_status,
                    })
                }
            },
            Err(_) => {
                self.dev.reset_bus();
                Err(Error::I2cIo { address, status: 0 })
            }
        }
    }

    /// Random read: a dummy write of the target offset followed by a current
    /// address read, repeated per 60-byte chunk with the offset advanced.
    fn write_read(&mut self, address: u8, offset: &[u8], dest: &mut [u8]) -> Result<()> {
        let width = offset.len();
        if width > 2 {
            error!("unsupported wr len: {}", width);
            return Err(Error::Unsupported(format!(
                "combined transfer offset of {} bytes (max 2)",
                width
            )));
        }
        let mut read_off = offset
            .iter()
            .fold(0u16, |acc, &b| (acc << 8) | u16::from(b));
        let total = dest.len();
        let mut done = 0;
        loop {
            let len = (total - done).min(consts::RD_DATA_MAX);
            debug!("read_off 0x{:x} left_len {} len {}", read_off, total - done, len);
            let off_bytes = read_off.to_be_bytes();
            self.write(address, &off_bytes[2 - width..], TransactionCondition::Start)?;
            self.read(
                address,
                &mut dest[done..done + len],
                TransactionCondition::StartStop,
            )?;
            done += len;
            read_off = read_off.wrapping_add(len as u16);
            if done >= total {
                break;
            }
        }
        Ok(())
    }

    fn transfer(&mut self, messages: &mut [I2cMessage<'_>]) -> Result<usize> {
        let count = messages.len();
        match messages {
            [] => {}
            [I2cMessage::Write { address, data }] => {
                self.write(*address, data, TransactionCondition::StartStop)?
            }
            [I2cMessage::Read { address, buffer }] => {
                self.read(*address, buffer, TransactionCondition::StartStop)?
            }
            [I2cMessage::Write { address, data }, I2cMessage::Read { buffer, .. }] => {
                self.write_read(*address, data, buffer)?
            }
            _ => {
                return Err(Error::Unsupported(format!(
                    "transfer of {} messages (only a single message or a write followed by a read)",
                    count
                )))
            }
        }
        Ok(count)
    }

    fn smbus(
        &mut self,
        address: u8,
        direction: SmbusDirection,
        command: u8,
        size: SmbusSize,
        data: &mut SmbusData,
    ) -> Result<()> {
        use SmbusDirection::{Read, Write};
        use TransactionCondition::{Start, StartStop, StartStopRepeated};
        match (size, direction) {
            (SmbusSize::Quick, Read) => self.read(address, &mut [], StartStop),
            (SmbusSize::Quick, Write) | (SmbusSize::Byte, Write) => {
                self.smbus_write(address, command, &[], StartStop)
            }
            (SmbusSize::Byte, Read) => {
                self.read(address, std::slice::from_mut(&mut data.byte), StartStop)
            }
            (SmbusSize::ByteData, Read) => {
                self.smbus_write(address, command, &[], Start)?;
                self.read(
                    address,
                    std::slice::from_mut(&mut data.byte),
                    StartStopRepeated,
                )
            }
            (SmbusSize::ByteData, Write) => {
                self.smbus_write(address, command, &[data.byte], StartStop)
            }
            (SmbusSize::WordData, Read) => {
                self.smbus_write(address, command, &[], Start)?;
                let mut word = [0u8; 2];
                self.read(address, &mut word, StartStopRepeated)?;
                data.word = u16::from_le_bytes(word);
                Ok(())
            }
            (SmbusSize::WordData, Write) => {
                self.smbus_write(address, command, &data.word.to_le_bytes(), StartStop)
            }
            (SmbusSize::BlockData, Read) => {
                let count = block_count(data.block[0] as usize)?;
                self.smbus_write(address, command, &[], Start)?;
                self.read(address, &mut data.block[..=count], StartStopRepeated)
            }
            (SmbusSize::BlockData, Write) => {
                let count = block_count(data.block[0] as usize)?;
                self.smbus_write(address, command, &data.block[..=count], StartStop)
            }
            (SmbusSize::I2cBlockData, Read) => {
                let count = block_count(data.block[0] as usize)?;
                self.smbus_write(address, command, &[], Start)?;
                self.read(address, &mut data.block[1..=count], StartStopRepeated)
            }
            (SmbusSize::I2cBlockData, Write) => {
                let count = block_count(data.block[0] as usize)?;
                self.smbus_write(address, command, &data.block[1..=count], StartStop)
            }
            (size, _) => {
                error!("unsupported smbus transaction size {:?}", size);
                Err(Error::Unsupported(format!(
                    "SMBus transaction size {:?}",
                    size
                )))
            }
        }
    }
}

impl<T: ReportTransport> Ft260<T> {
    /// Runs `f` under the transaction lock, bracketed by power hints.
    fn with_transaction<R>(
        &self,
        f: impl FnOnce(&mut Transaction<'_, T>) -> Result<R>,
    ) -> Result<R> {
        let engine = self.i2c_engine()?;
        let buf = engine
            .xfer
            .lock()
            .map_err(|_| Error::Transport("I2C transaction lock poisoned".to_string()))?;
        let mut transaction = Transaction {
            dev: self,
            engine,
            buf,
        };

        self.transport.power_hint(PowerHint::FullOn).map_err(|e| {
            error!("failed to enter FULLON power mode: {}", e);
            e
        })?;
        let result = f(&mut transaction);
        if let Err(e) = self.transport.power_hint(PowerHint::Normal) {
            debug!("failed to restore NORMAL power mode: {}", e);
        }
        result
    }

    /// Executes one message, or a write followed by a read with a repeated
    /// start. Returns the number of messages processed.
    ///
    /// The first message of a combined transfer is the target offset and may
    /// be at most 2 bytes; see [`Ft260::quirks`].
    pub fn i2c_transfer(&self, messages: &mut [I2cMessage<'_>]) -> Result<usize> {
        self.with_transaction(|t| t.transfer(messages))
    }

    /// Executes an SMBus transaction of the given size class.
    pub fn smbus_transfer(
        &self,
        address: u8,
        flags: u16,
        direction: SmbusDirection,
        command: u8,
        size: SmbusSize,
        data: &mut SmbusData,
    ) -> Result<()> {
        debug!(
            "smbus size {:?} {:?} addr 0x{:02x} cmd 0x{:02x} flags 0x{:04x}",
            size, direction, address, command, flags
        );
        self.with_transaction(|t| t.smbus(address, direction, command, size, data))
    }

    /// Supported I2C/SMBus capabilities, see [`functionality`].
    pub fn functionality(&self) -> u32 {
        functionality::I2C
            | functionality::SMBUS_BYTE
            | functionality::SMBUS_QUICK
            | functionality::SMBUS_BYTE_DATA
            | functionality::SMBUS_WORD_DATA
            | functionality::SMBUS_BLOCK_DATA
            | functionality::SMBUS_I2C_BLOCK
    }

    pub fn quirks(&self) -> AdapterQuirks {
        AdapterQuirks {
            combined_write_then_read: true,
            max_comb_first_msg_len: 2,
        }
    }

    /// Writes `data` to the device at `address` (START, data, STOP).
    pub fn i2c_write(&self, address: u8, data: &[u8]) -> Result<()> {
        self.i2c_transfer(&mut [I2cMessage::Write { address, data }])
            .map(|_| ())
    }

    /// Reads `buffer.len()` (at most 60) bytes from the device at `address`.
    pub fn i2c_read(&self, address: u8, buffer: &mut [u8]) -> Result<()> {
        self.i2c_transfer(&mut [I2cMessage::Read { address, buffer }])
            .map(|_| ())
    }

    /// Writes a 1 or 2 byte register offset, then reads `buffer.len()` bytes.
    pub fn i2c_write_read(&self, address: u8, offset: &[u8], buffer: &mut [u8]) -> Result<()> {
        self.i2c_transfer(&mut [
            I2cMessage::Write {
                address,
                data: offset,
            },
            I2cMessage::Read { address, buffer },
        ])
        .map(|_| ())
    }

    /// Scans a range of 7-bit addresses with empty writes.
    ///
    /// # Example
    /// ```no_run
    /// # use ft260_hid::*;
    /// # use hidapi::HidApi;
    /// # fn main() -> Result<()> {
    /// # let hid_api = HidApi::new()?;
    /// # let device = Ft260::open_first(&hid_api)?;
    /// for addr in device.i2c_scan(0x08, 0x77)? {
    ///     println!("Found device at 0x{:02X}", addr);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn i2c_scan(&self, start_addr: u8, end_addr: u8) -> Result<Vec<u8>> {
        self.i2c_scan_with_progress(start_addr, end_addr, |_, _, _, _| {})
    }

    /// Like [`Ft260::i2c_scan`], calling `progress(addr, found, idx, total)`
    /// for every address probed.
    pub fn i2c_scan_with_progress<F>(
        &self,
        start_addr: u8,
        end_addr: u8,
        mut progress: F,
    ) -> Result<Vec<u8>>
    where
        F: FnMut(u8, bool, usize, usize),
    {
        if start_addr > end_addr || end_addr > 0x7F {
            return Err(Error::InvalidArgument(format!(
                "scan range 0x{:02X}-0x{:02X}",
                start_addr, end_addr
            )));
        }
        let mut found_devices = Vec::new();
        let total = (end_addr - start_addr) as usize + 1;
        for (idx, addr) in (start_addr..=end_addr).enumerate() {
            let found = match self.i2c_write(addr, &[]) {
                Ok(()) => {
                    found_devices.push(addr);
                    true
                }
                Err(Error::I2cIo { .. }) | Err(Error::Timeout { .. }) => false,
                Err(e) => return Err(e),
            };
            progress(addr, found, idx, total);
        }
        Ok(found_devices)
    }
}
