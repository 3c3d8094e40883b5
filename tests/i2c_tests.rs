// tests/i2c_tests.rs
//! I2C engine behaviour against the scripted transport: fragmentation, status
//! polling, read completion, timeouts and transaction serialization.

mod common;

use common::{bind_i2c, Event};
use ft260_hid::consts::i2c_status::{
    ADDR_NO_ACK, BUS_BUSY, CTRL_BUSY, CTRL_IDLE, DATA_NO_ACK, ERROR,
};
use ft260_hid::{BridgeOptions, Error, I2cMessage, PowerHint};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn short_timeout() -> BridgeOptions {
    BridgeOptions::default().with_read_timeout(Duration::from_millis(50))
}

#[test]
fn test_write_of_60_bytes_is_one_report() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    let data: Vec<u8> = (0..60).collect();
    device.i2c_write(0x50, &data).unwrap();

    let outputs = mock.outputs();
    assert_eq!(outputs.len(), 1);
    assert_eq!(&outputs[0][..4], &[0xDE, 0x50, 0x06, 60]);
    assert_eq!(&outputs[0][4..], data.as_slice());
    assert_eq!(mock.status_reads(), 1);
    assert_eq!(mock.resets(), 0);
}

#[test]
fn test_write_of_61_bytes_is_two_reports() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    let data: Vec<u8> = (0..61).collect();
    device.i2c_write(0x50, &data).unwrap();

    let outputs = mock.outputs();
    assert_eq!(outputs.len(), 2);
    // START on the first fragment, STOP on the last
    assert_eq!(&outputs[0][..4], &[0xDE, 0x50, 0x02, 60]);
    assert_eq!(outputs[0].len(), 64);
    assert_eq!(outputs[1], vec![0xD0, 0x50, 0x04, 1, 60]);
    assert_eq!(mock.status_reads(), 2);
}

#[test]
fn test_write_fragments_reconstruct_payload() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    for len in [0usize, 1, 4, 5, 59, 119, 120, 150, 181] {
        mock.clear_events();
        let data: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
        device.i2c_write(0x3C, &data).unwrap();

        let outputs = mock.outputs();
        assert_eq!(outputs.len(), len.div_ceil(60).max(1), "len {}", len);
        let mut rebuilt = Vec::new();
        for report in &outputs {
            let chunk_len = report[3] as usize;
            assert_eq!(report[0], 0xD0 + (chunk_len.max(1) as u8 - 1) / 4);
            assert_eq!(report[1], 0x3C);
            assert_eq!(report.len(), 4 + chunk_len);
            rebuilt.extend_from_slice(&report[4..]);
        }
        assert_eq!(rebuilt, data, "len {}", len);
    }
}

#[test]
fn test_transfer_is_bracketed_by_power_hints() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    device.i2c_write(0x50, &[1, 2]).unwrap();
    let events = mock.events();
    assert_eq!(events.first(), Some(&Event::Power(PowerHint::FullOn)));
    assert_eq!(events.last(), Some(&Event::Power(PowerHint::Normal)));

    // Also on failure
    mock.clear_events();
    mock.script_status(&[ERROR | CTRL_IDLE]);
    assert!(device.i2c_write(0x50, &[1, 2]).is_err());
    assert_eq!(mock.events().last(), Some(&Event::Power(PowerHint::Normal)));
}

#[test]
fn test_controller_busy_is_polled_again() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    mock.script_status(&[CTRL_BUSY, CTRL_BUSY, CTRL_IDLE]);
    device.i2c_write(0x50, &[0xAA]).unwrap();
    assert_eq!(mock.status_reads(), 3);
    assert_eq!(mock.resets(), 0);
}

#[test]
fn test_controller_busy_exhausts_retries() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    mock.script_status(&[CTRL_BUSY, CTRL_BUSY, CTRL_BUSY]);
    let err = device.i2c_write(0x50, &[0xAA]).unwrap_err();
    assert!(matches!(
        err,
        Error::I2cIo {
            address: 0x50,
            status: CTRL_BUSY
        }
    ));
    assert_eq!(mock.status_reads(), 3);
    assert_eq!(mock.resets(), 1);
}

#[test]
fn test_bus_busy_after_write_counts_as_success() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    mock.script_status(&[BUS_BUSY]);
    device.i2c_write(0x50, &[0xAA]).unwrap();
    assert_eq!(mock.resets(), 0);
}

#[test]
fn test_nack_fails_and_resets() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    mock.script_status(&[ERROR | ADDR_NO_ACK | CTRL_IDLE]);
    let err = device.i2c_write(0x21, &[0x00]).unwrap_err();
    assert!(matches!(
        err,
        Error::I2cIo {
            address: 0x21,
            status: 0x26
        }
    ));
    assert_eq!(mock.resets(), 1);

    mock.clear_events();
    mock.script_status(&[DATA_NO_ACK | CTRL_IDLE]);
    assert!(device.i2c_write(0x21, &[0x00]).is_err());
    assert_eq!(mock.resets(), 1);
}

#[test]
fn test_failed_fragment_aborts_remaining_fragments() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    // First fragment fine, second fails
    mock.script_status(&[CTRL_IDLE, ERROR | CTRL_IDLE]);
    let data = [0x55u8; 150];
    assert!(device.i2c_write(0x50, &data).is_err());
    assert_eq!(mock.outputs().len(), 2);
    assert_eq!(mock.resets(), 1);
}

#[test]
fn test_output_failure_resets_and_propagates() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    mock.fail_next_outputs(1);
    let err = device.i2c_write(0x50, &[1]).unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(mock.resets(), 1);
    assert_eq!(mock.status_reads(), 0);
}

#[test]
fn test_read_completes_with_delivered_data() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    mock.queue_read_data(&[10, 11, 12, 13, 14, 15, 16, 17, 18, 19]);
    let mut buf = [0u8; 10];
    device.i2c_read(0x50, &mut buf).unwrap();
    assert_eq!(buf, [10, 11, 12, 13, 14, 15, 16, 17, 18, 19]);
    assert_eq!(mock.outputs(), vec![vec![0xC2, 0x50, 0x06, 10, 0]]);
    assert_eq!(mock.status_reads(), 1);
}

#[test]
fn test_read_accumulates_split_input_reports() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    mock.set_read_chunk(7);
    let expected: Vec<u8> = (100..160).collect();
    mock.queue_read_data(&expected);
    let mut buf = [0u8; 60];
    device.i2c_read(0x68, &mut buf).unwrap();
    assert_eq!(buf.to_vec(), expected);
}

#[test]
fn test_read_over_60_bytes_is_rejected_before_wire_activity() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    let mut buf = [0u8; 61];
    let err = device.i2c_read(0x50, &mut buf).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(mock.outputs().is_empty());
    assert_eq!(mock.resets(), 0);
}

#[test]
fn test_read_timeout_resets_once() {
    let (mock, device) = bind_i2c(short_timeout());
    mock.set_respond_to_reads(false);
    let mut buf = [0u8; 4];
    let err = device.i2c_read(0x50, &mut buf).unwrap_err();
    assert!(matches!(err, Error::Timeout { address: 0x50 }));
    assert_eq!(mock.resets(), 1);
    assert_eq!(mock.status_reads(), 0);

    // Late data for the abandoned read is dropped
    mock.inject(&[0xD0, 4, 0xEE, 0xEE, 0xEE, 0xEE]);

    // The next read sees only its own data
    mock.set_respond_to_reads(true);
    mock.queue_read_data(&[1, 2, 3, 4]);
    device.i2c_read(0x50, &mut buf).unwrap();
    assert_eq!(buf, [1, 2, 3, 4]);
    assert_eq!(mock.resets(), 1);
}

#[test]
fn test_read_status_other_than_idle_fails() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    let mut buf = [0u8; 2];

    mock.script_status(&[ERROR | CTRL_IDLE]);
    assert!(matches!(
        device.i2c_read(0x50, &mut buf),
        Err(Error::I2cIo { address: 0x50, .. })
    ));
    assert_eq!(mock.resets(), 1);

    // Unlike the write path, a busy bus after a read is a failure
    mock.clear_events();
    mock.script_status(&[BUS_BUSY]);
    assert!(matches!(
        device.i2c_read(0x50, &mut buf),
        Err(Error::BusBusy)
    ));
    assert_eq!(mock.resets(), 1);
}

#[test]
fn test_combined_write_read() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    mock.queue_read_data(&[0xDE, 0xAD, 0xBE, 0xEF]);
    let mut buf = [0u8; 4];
    let count = device
        .i2c_transfer(&mut [
            I2cMessage::Write {
                address: 0x50,
                data: &[0x00, 0x10],
            },
            I2cMessage::Read {
                address: 0x50,
                buffer: &mut buf,
            },
        ])
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(buf, [0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(
        mock.outputs(),
        vec![
            vec![0xD0, 0x50, 0x02, 2, 0x00, 0x10],
            vec![0xC2, 0x50, 0x06, 4, 0],
        ]
    );
}

#[test]
fn test_combined_read_is_chunked_with_advancing_offset() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    let expected: Vec<u8> = (0..100).map(|i| i as u8 ^ 0x5A).collect();
    mock.queue_read_data(&expected);
    let mut buf = [0u8; 100];
    device.i2c_write_read(0x50, &[0x20], &mut buf).unwrap();
    assert_eq!(buf.to_vec(), expected);
    assert_eq!(
        mock.outputs(),
        vec![
            vec![0xD0, 0x50, 0x02, 1, 0x20],
            vec![0xC2, 0x50, 0x06, 60, 0],
            vec![0xD0, 0x50, 0x02, 1, 0x5C],
            vec![0xC2, 0x50, 0x06, 40, 0],
        ]
    );

    // Two-byte offsets carry into the high byte
    mock.clear_events();
    let mut buf = [0u8; 70];
    device.i2c_write_read(0x50, &[0x01, 0xF0], &mut buf).unwrap();
    let outputs = mock.outputs();
    assert_eq!(outputs[0], vec![0xD0, 0x50, 0x02, 2, 0x01, 0xF0]);
    assert_eq!(outputs[2], vec![0xD0, 0x50, 0x02, 2, 0x02, 0x2C]);
}

#[test]
fn test_unsupported_message_shapes() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    let mut buf = [0u8; 2];
    let err = device
        .i2c_write_read(0x50, &[0, 0, 0], &mut buf)
        .unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));

    let mut a = [0u8; 1];
    let mut b = [0u8; 1];
    let err = device
        .i2c_transfer(&mut [
            I2cMessage::Read {
                address: 0x50,
                buffer: &mut a,
            },
            I2cMessage::Read {
                address: 0x50,
                buffer: &mut b,
            },
        ])
        .unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));

    let err = device
        .i2c_transfer(&mut [
            I2cMessage::Write {
                address: 0x50,
                data: &[1],
            },
            I2cMessage::Write {
                address: 0x50,
                data: &[2],
            },
            I2cMessage::Write {
                address: 0x50,
                data: &[3],
            },
        ])
        .unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
    assert!(mock.outputs().is_empty());
}

#[test]
fn test_transfer_wait_uses_cached_clock() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    // Bind read the status report, caching the 400 kHz clock
    assert_eq!(device.cached_clock_khz(), 400);
    device.i2c_write(0x50, &[0; 10]).unwrap();
    assert_eq!(mock.status_reads(), 1);
}

#[test]
fn test_concurrent_transfers_do_not_interleave() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [0x50u8, 0x51]
        .into_iter()
        .map(|address| {
            let device = Arc::clone(&device);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                device.i2c_write(address, &[address; 150])
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let addresses: Vec<u8> = mock.outputs().iter().map(|r| r[1]).collect();
    assert_eq!(addresses.len(), 6);
    assert!(addresses[..3].iter().all(|&a| a == addresses[0]));
    assert!(addresses[3..].iter().all(|&a| a == addresses[3]));
    assert_ne!(addresses[0], addresses[3]);
}

#[test]
fn test_second_caller_blocks_until_first_finishes() {
    let (mock, device) = bind_i2c(
        BridgeOptions::default().with_read_timeout(Duration::from_millis(200)),
    );
    mock.set_respond_to_reads(false);
    let reader = {
        let device = Arc::clone(&device);
        thread::spawn(move || {
            let mut buf = [0u8; 4];
            device.i2c_read(0x50, &mut buf)
        })
    };
    thread::sleep(Duration::from_millis(50));

    let start = Instant::now();
    device.i2c_write(0x51, &[1]).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(matches!(
        reader.join().unwrap(),
        Err(Error::Timeout { address: 0x50 })
    ));

    // The write went out only after the timed-out read reset the bus
    let events = mock.events();
    let reset_at = events
        .iter()
        .position(|e| matches!(e, Event::SetFeature(r) if r[1] == 0x20))
        .unwrap();
    let write_at = events
        .iter()
        .position(|e| matches!(e, Event::Output(r) if r[1] == 0x51))
        .unwrap();
    assert!(reset_at < write_at);
}

#[test]
fn test_scan_reports_acknowledging_addresses() {
    let (mock, device) = bind_i2c(BridgeOptions::default());
    // 0x48 NACKs, 0x49 ACKs, 0x4A NACKs
    mock.script_status(&[ERROR | ADDR_NO_ACK | CTRL_IDLE, CTRL_IDLE, ERROR | ADDR_NO_ACK]);
    let mut probed = Vec::new();
    let found = device
        .i2c_scan_with_progress(0x48, 0x4A, |addr, found, idx, total| {
            probed.push((addr, found, idx, total))
        })
        .unwrap();
    assert_eq!(found, vec![0x49]);
    assert_eq!(
        probed,
        vec![(0x48, false, 0, 3), (0x49, true, 1, 3), (0x4A, false, 2, 3)]
    );
    // Empty writes with START and STOP
    assert_eq!(mock.outputs()[0], vec![0xD0, 0x48, 0x06, 0]);

    assert!(matches!(
        device.i2c_scan(0x50, 0x40),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_adapter_capabilities() {
    use ft260_hid::i2c::functionality;
    let (_mock, device) = bind_i2c(BridgeOptions::default());
    let func = device.functionality();
    for bit in [
        functionality::I2C,
        functionality::SMBUS_QUICK,
        functionality::SMBUS_BYTE,
        functionality::SMBUS_BYTE_DATA,
        functionality::SMBUS_WORD_DATA,
        functionality::SMBUS_BLOCK_DATA,
        functionality::SMBUS_I2C_BLOCK,
    ] {
        assert_eq!(func & bit, bit);
    }
    let quirks = device.quirks();
    assert!(quirks.combined_write_then_read);
    assert_eq!(quirks.max_comb_first_msg_len, 2);
}
