// tests/common/mod.rs
//! Scripted in-memory report transport shared by the integration tests.
#![allow(dead_code)]

use ft260_hid::report::{i2c_data_report_id, ChipVersion, I2cStatus, SystemStatus};
use ft260_hid::{
    consts, BridgeOptions, Error, Ft260, InputHandler, PortRegistry, PowerHint, ReportTransport,
    Result,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Everything the device did to the transport, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    GetFeature(u8),
    SetFeature(Vec<u8>),
    Output(Vec<u8>),
    Power(PowerHint),
}

#[derive(Debug)]
struct MockState {
    chip_mode: u8,
    chip_code: [u8; 4],
    clock_ctl: u8,
    clock_khz: u16,
    idle_status: u8,
    status_script: VecDeque<u8>,
    respond_to_reads: bool,
    read_data: VecDeque<u8>,
    read_chunk: usize,
    fail_outputs: usize,
    events: Vec<Event>,
}

pub struct MockTransport {
    state: Mutex<MockState>,
    handler: Mutex<Option<InputHandler>>,
}

impl MockTransport {
    pub fn new(chip_mode: u8) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                chip_mode,
                chip_code: [0x02, 0x60, 0x01, 0x00],
                clock_ctl: 2,
                clock_khz: 400,
                idle_status: consts::i2c_status::CTRL_IDLE,
                status_script: VecDeque::new(),
                respond_to_reads: true,
                read_data: VecDeque::new(),
                read_chunk: consts::RD_DATA_MAX,
                fail_outputs: 0,
                events: Vec::new(),
            }),
            handler: Mutex::new(None),
        })
    }

    /// Bus status bytes returned by the next I2C status reads, before falling
    /// back to the idle status.
    pub fn script_status(&self, statuses: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .status_script
            .extend(statuses.iter().copied());
    }

    pub fn set_idle_status(&self, status: u8) {
        self.state.lock().unwrap().idle_status = status;
    }

    /// Bytes returned by read requests, consumed in order. Missing bytes are
    /// filled with their index in the read.
    pub fn queue_read_data(&self, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .read_data
            .extend(data.iter().copied());
    }

    /// Split read responses into input reports of at most `chunk` bytes.
    pub fn set_read_chunk(&self, chunk: usize) {
        self.state.lock().unwrap().read_chunk = chunk.max(1);
    }

    pub fn set_respond_to_reads(&self, respond: bool) {
        self.state.lock().unwrap().respond_to_reads = respond;
    }

    /// Make the next `count` output reports fail.
    pub fn fail_next_outputs(&self, count: usize) {
        self.state.lock().unwrap().fail_outputs = count;
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().unwrap().events.clear();
    }

    pub fn outputs(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Output(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    pub fn set_features(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::SetFeature(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    /// Number of I2C controller resets sent.
    pub fn resets(&self) -> usize {
        self.set_features()
            .iter()
            .filter(|r| **r == [consts::REPORT_ID_SYSTEM_SETTINGS, consts::request::SET_I2C_RESET])
            .count()
    }

    pub fn status_reads(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == Event::GetFeature(consts::REPORT_ID_I2C_STATUS))
            .count()
    }

    /// Delivers a raw input report as if it came from the device.
    pub fn inject(&self, raw: &[u8]) {
        if let Some(handler) = self.handler.lock().unwrap().as_mut() {
            handler(raw);
        }
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }

    fn read_response(state: &mut MockState, len: usize) -> Vec<Vec<u8>> {
        let data: Vec<u8> = (0..len)
            .map(|i| state.read_data.pop_front().unwrap_or(i as u8))
            .collect();
        // Stand-in for a 0-byte read: this double answers with an empty data
        // report so the read completes. Disable replies to get a timeout.
        if data.is_empty() {
            return vec![vec![consts::REPORT_ID_I2C_DATA_MIN, 0]];
        }
        data.chunks(state.read_chunk)
            .map(|chunk| {
                let mut report = vec![i2c_data_report_id(chunk.len()), chunk.len() as u8];
                report.extend_from_slice(chunk);
                report
            })
            .collect()
    }
}

impl ReportTransport for MockTransport {
    fn get_feature(&self, report_id: u8, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::GetFeature(report_id));
        match report_id {
            consts::REPORT_ID_CHIP_VERSION => ChipVersion {
                chip_code: state.chip_code,
            }
            .encode(buf),
            consts::REPORT_ID_SYSTEM_SETTINGS => SystemStatus {
                chip_mode: state.chip_mode,
                clock_ctl: state.clock_ctl,
                i2c_enable: 1,
                uart_mode: consts::uart_cfg::FLOW_CTRL_NONE,
                power_saving_en: 1,
                ..Default::default()
            }
            .encode(buf),
            consts::REPORT_ID_I2C_STATUS => {
                let bus_status = state
                    .status_script
                    .pop_front()
                    .unwrap_or(state.idle_status);
                I2cStatus {
                    bus_status,
                    clock_khz: state.clock_khz,
                }
                .encode(buf)
            }
            _ => Err(Error::FeatureReportError { report_id }),
        }
    }

    fn set_feature(&self, buf: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::SetFeature(buf.to_vec()));
        if buf.len() >= 4 && buf[1] == consts::request::SET_I2C_CLOCK_SPEED {
            state.clock_khz = u16::from_le_bytes([buf[2], buf[3]]);
        }
        if buf.len() >= 3 && buf[1] == consts::request::SET_CLOCK {
            state.clock_ctl = buf[2];
        }
        Ok(())
    }

    fn send_output(&self, buf: &[u8]) -> Result<()> {
        let responses = {
            let mut state = self.state.lock().unwrap();
            state.events.push(Event::Output(buf.to_vec()));
            if state.fail_outputs > 0 {
                state.fail_outputs -= 1;
                return Err(Error::Transport("injected output failure".to_string()));
            }
            if buf[0] == consts::REPORT_ID_I2C_READ_REQ && state.respond_to_reads {
                let len = u16::from_le_bytes([buf[3], buf[4]]) as usize;
                Self::read_response(&mut state, len)
            } else {
                Vec::new()
            }
        };
        for report in responses {
            self.inject(&report);
        }
        Ok(())
    }

    fn on_input_report(&self, handler: InputHandler) -> Result<()> {
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    fn power_hint(&self, hint: PowerHint) -> Result<()> {
        self.state.lock().unwrap().events.push(Event::Power(hint));
        Ok(())
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Binds interface 0 of a dual-mode chip (I2C) and clears the bind traffic.
pub fn bind_i2c(options: BridgeOptions) -> (Arc<MockTransport>, Arc<Ft260<MockTransport>>) {
    init_logging();
    let mock = MockTransport::new(consts::chip_mode::BOTH);
    let device = Ft260::bind_with_options(Arc::clone(&mock), 0, &PortRegistry::new(4), options)
        .expect("I2C bind failed");
    mock.clear_events();
    (mock, device)
}

/// Binds interface 1 of a dual-mode chip (UART) and clears the bind traffic.
pub fn bind_uart(options: BridgeOptions) -> (Arc<MockTransport>, Arc<Ft260<MockTransport>>) {
    init_logging();
    let mock = MockTransport::new(consts::chip_mode::BOTH);
    let device = Ft260::bind_with_options(Arc::clone(&mock), 1, &PortRegistry::new(4), options)
        .expect("UART bind failed");
    mock.clear_events();
    (mock, device)
}
