// tests/hardware_tests.rs
//
// Run with a device attached: cargo test -- --ignored
use quantis::{Device, DeviceType, ModuleMask, Quantis, RandomSource, Result};

// Helper to open the first device of a kind, panics on failure for test simplicity
fn open_test_device(device_type: DeviceType) -> Device {
    let _ = env_logger::builder().is_test(true).try_init();
    Device::open(device_type, 0).unwrap_or_else(|e| {
        panic!(
            "Failed to open {} device 0 ({}). Is it connected and permissions set?",
            device_type, e
        )
    })
}

fn exercise_device(device_type: DeviceType) -> Result<()> {
    assert!(quantis::count(device_type) >= 1);
    let mut device = open_test_device(device_type);

    let mask = device.modules_mask()?;
    println!(
        "{} #0: serial {}, board 0x{:X}, modules {}, {} B/s",
        device_type,
        device.serial_number()?,
        device.board_version()?,
        mask,
        device.modules_data_rate()?
    );
    assert!(!mask.is_empty());
    assert!(device.modules_power()?);

    let data = device.read(4096)?;
    assert_eq!(data.len(), 4096);
    // All-zero output would mean a dead module
    assert!(data.iter().any(|&b| b != 0));

    device.modules_reset(mask)?;
    assert_eq!(device.modules_status()? & mask, mask);

    let value = device.read_scaled_int(1, 6)?;
    assert!((1..=6).contains(&value));
    Ok(())
}

#[test]
#[ignore] // Ignore by default, requires hardware
fn test_pci_device() -> Result<()> {
    println!("PCI driver version: {}", quantis::driver_version(DeviceType::Pci)?);
    exercise_device(DeviceType::Pci)
}

#[test]
#[ignore] // Ignore by default, requires hardware
fn test_usb_device() -> Result<()> {
    exercise_device(DeviceType::Usb)
}

#[test]
#[ignore] // Ignore by default, requires hardware
fn test_usb_rejects_foreign_module_mask() {
    let mut device = open_test_device(DeviceType::Usb);
    assert!(device.modules_enable(ModuleMask(0b10)).is_err());
}

#[test]
#[ignore] // Ignore by default, requires hardware
fn test_usb_board_reset_and_one_shot_read() -> Result<()> {
    let mut device = open_test_device(DeviceType::Usb);
    device.board_reset()?;
    device.close();

    let mut qrng = Quantis::new(DeviceType::Usb, 0)?;
    let value = qrng.read_double_01()?;
    assert!((0.0..1.0).contains(&value));
    Ok(())
}
