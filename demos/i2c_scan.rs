use ft260_hid::{self, Ft260, Mode, Result};
use hidapi::HidApi;
use std::time::Instant;

fn main() -> Result<()> {
    env_logger::init();
    let hid_api = HidApi::new()?;

    println!("FT260 I2C Bus Scanner");
    println!("=====================");

    let info = match ft260_hid::find_all(&hid_api)?
        .into_iter()
        .find(|info| info.interface_number == 0)
    {
        Some(info) => info,
        None => {
            eprintln!("No FT260 I2C interface found.");
            eprintln!(
                "Ensure device is connected and permissions are set (e.g., udev rules on Linux)."
            );
            return Err(ft260_hid::Error::DeviceNotFound);
        }
    };
    println!(
        "  Product: {}",
        info.product_string.as_deref().unwrap_or("Unknown")
    );
    println!(
        "  Serial:  {}",
        info.serial_number.as_deref().unwrap_or("Unknown")
    );

    let device = Ft260::open(&hid_api, &info)?;
    if device.mode() != Mode::I2c {
        eprintln!("Interface 0 is bound as {:?}; check the DCNF strapping.", device.mode());
        return Ok(());
    }
    println!("  Chip:    {}", device.chip_version());
    println!();

    println!("Setting I2C speed to 100kHz...");
    device.i2c_set_clock_speed(100)?;

    println!("Scanning I2C bus (7-bit addresses 0x08 to 0x77)...");
    println!("     0  1  2  3  4  5  6  7  8  9  A  B  C  D  E  F");
    print!("00: {}", "   ".repeat(8));

    let start_time = Instant::now();
    let found_devices = device.i2c_scan_with_progress(0x08, 0x77, |addr, found, _, _| {
        if addr % 16 == 0 {
            print!("{:02X}: ", addr & 0xF0);
        }
        if found {
            print!("{:02X} ", addr);
        } else {
            print!("-- ");
        }
        if addr % 16 == 15 {
            println!();
        }
    })?;
    println!();

    println!(
        "Scan took {:.2}s, found {} device(s): {:?}",
        start_time.elapsed().as_secs_f32(),
        found_devices.len(),
        found_devices
            .iter()
            .map(|a| format!("0x{:02X}", a))
            .collect::<Vec<_>>()
    );
    Ok(())
}
