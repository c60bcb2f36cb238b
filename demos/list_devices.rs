use quantis::{Device, DeviceType, Result};

fn print_device(device_type: DeviceType, index: u32) -> Result<()> {
    let mut device = Device::open(device_type, index)?;
    let mask = device.modules_mask()?;
    println!("  #{}:", index);
    println!("    Board version : 0x{:X}", device.board_version()?);
    println!("    Manufacturer  : {}", device.manufacturer()?);
    println!("    Serial number : {}", device.serial_number()?);
    println!("    Bus/device id : {}", device.bus_device_id()?);
    println!("    Modules       : {} ({} present)", mask, mask.count());
    println!("    Status        : {}", device.modules_status()?);
    println!("    Powered       : {}", device.modules_power()?);
    println!("    Data rate     : {} bytes/s", device.modules_data_rate()?);
    println!(
        "    AIS 31 startup tests requested: {}",
        device.startup_tests_requested()?
    );
    Ok(())
}

fn main() {
    env_logger::init();
    println!("Quantis library {}", quantis::LIBRARY_VERSION);

    for device_type in [DeviceType::Pci, DeviceType::Usb] {
        let count = quantis::count(device_type);
        match quantis::driver_version(device_type) {
            Ok(version) => println!(
                "\n{}: driver version {:.1}, {} device(s) found",
                device_type, version, count
            ),
            Err(e) => {
                println!("\n{}: {}", device_type, e);
                continue;
            }
        }
        for index in 0..count {
            if let Err(e) = print_device(device_type, index) {
                let message =
                    quantis::full_str_error(device_type, e.code()).unwrap_or("unknown error");
                eprintln!("  #{}: {} ({})", index, e, message);
            }
        }
    }
}
