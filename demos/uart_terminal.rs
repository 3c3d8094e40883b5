use ft260_hid::{self, Ft260, LineConfig, Mode, PortListener, Result};
use hidapi::HidApi;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// Prints received bytes as they arrive.
struct Echo;

impl PortListener for Echo {
    fn on_receive(&self, data: &[u8]) -> usize {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(data);
        let _ = stdout.flush();
        data.len()
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let baud_rate = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(115_200);

    let hid_api = HidApi::new()?;
    let info = ft260_hid::find_all(&hid_api)?
        .into_iter()
        .find(|info| info.interface_number == 1)
        .ok_or(ft260_hid::Error::DeviceNotFound)?;
    let device = Ft260::open(&hid_api, &info)?;
    if device.mode() != Mode::Uart {
        eprintln!("Interface 1 is bound as {:?}; check the DCNF strapping.", device.mode());
        return Ok(());
    }

    device.uart_set_listener(Arc::new(Echo))?;
    device.uart_open()?;
    let applied = device.uart_set_line_config(LineConfig::new(baud_rate))?;
    println!(
        "ttyFT{} open at {} baud. Type lines to send, Ctrl-D to quit.",
        device.uart_port_index()?,
        applied.baud_rate
    );

    for line in io::stdin().lock().lines() {
        let mut data = line?.into_bytes();
        data.extend_from_slice(b"\r\n");
        let mut sent = 0;
        while sent < data.len() {
            sent += device.uart_write(&data[sent..])?;
        }
    }

    device.uart_close()?;
    Ok(())
}
