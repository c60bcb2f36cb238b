//! # quantis
//!
//! A Rust crate for reading random numbers from ID Quantique Quantis quantum
//! random number generators attached through PCI / PCI Express or USB.
//!
//! PCI cards are serviced by the `quantis` kernel driver (`/dev/qrandomN`,
//! accessed with `nix` ioctls). USB devices are driven directly from
//! userspace with the `nusb` crate; no kernel driver is needed.
//!
//! ## Features
//!
//! *   Device discovery (`count`, `driver_version`).
//! *   Persistent handles (`Device::open`) and one-shot access (`Quantis`),
//!     where every call opens, operates and closes.
//! *   Board information (`board_version`, `serial_number`, `manufacturer`,
//!     `bus_device_id`) and `board_reset`.
//! *   Module control through `ModuleMask`:
//!     *   Present and enabled modules (`modules_mask`, `modules_status`).
//!     *   Enabling, disabling and resetting modules.
//!     *   Data rate and power state.
//! *   AIS 31 startup-test request flag (query and clear).
//! *   Raw reads up to [`MAX_READ_SIZE`] bytes per request.
//! *   Typed and scaled reads through the [`RandomSource`] trait:
//!     *   `read_int`, `read_short`, `read_double_01`, `read_float_01`.
//!     *   `read_scaled_int` / `read_scaled_short` over inclusive ranges,
//!         free of modulo bias (rejection sampling).
//!     *   `read_scaled_double` / `read_scaled_float` over `[min, max)`.
//! *   Hex conversion helpers in [`convert`].
//! *   A simulated backend ([`sim`]) for running without hardware.
//!
//! ## Cargo Features
//!
//! *   `pci` (default): Quantis PCI / PCIe backend. Linux only.
//! *   `usb` (default): Quantis USB backend.
//!
//! A transport that is not compiled in reports zero devices, and opening it
//! fails with [`Error::NoDevice`].
//!
//! ## Basic Usage
//!
//! ```no_run
//! use quantis::{Device, DeviceType, ModuleMask, RandomSource, Result};
//!
//! fn main() -> Result<()> {
//!     // Optional: Initialize logging
//!     // env_logger::init();
//!
//!     let found = quantis::count(DeviceType::Usb);
//!     println!("Found {} Quantis USB device(s)", found);
//!     if found == 0 {
//!         return Ok(());
//!     }
//!
//!     let mut device = Device::open(DeviceType::Usb, 0)?;
//!     println!("Serial: {}", device.serial_number()?);
//!     println!("Modules: {}", device.modules_mask()?);
//!
//!     let bytes = device.read(16)?;
//!     println!("Random bytes: {}", quantis::convert::encode_hex(&bytes));
//!
//!     println!("Dice roll: {}", device.read_scaled_int(1, 6)?);
//!     println!("Uniform: {}", device.read_double_01()?);
//!
//!     device.modules_reset(ModuleMask::ALL)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Hardware Setup Notes
//!
//! *   **Linux udev Rules:** Grant user permission to the USB device. Create
//!     `/etc/udev/rules.d/99-quantis.rules`:
//!     ```udev
//!     # Quantis USB (Ellisys VID 0aba, PID 0102)
//!     SUBSYSTEM=="usb", ATTRS{idVendor}=="0aba", ATTRS{idProduct}=="0102", MODE="0666", GROUP="plugdev"
//!     # Quantis PCI character devices
//!     KERNEL=="qrandom[0-9]*", MODE="0444"
//!     ```
//!     Reload: `sudo udevadm control --reload-rules && sudo udevadm trigger`
//! *   **Thread Safety:** A [`Device`] must not be shared between threads.
//!     Open one handle per thread.
//!
//! ## License
//!
//! This project is licensed under the WTFPL.

mod consts;
mod error;

pub mod backend;
pub mod convert;
pub mod device;
pub mod mask;
#[cfg(all(feature = "pci", target_os = "linux"))]
pub mod pci;
pub mod quantis;
pub mod read;
pub mod sim;
#[cfg(feature = "usb")]
pub mod usb;

pub use backend::{Backend, Session};
pub use consts::{MAX_DEVICES, MAX_READ_SIZE, MODULE_DATA_RATE, NOT_AVAILABLE, NO_SERIAL};
pub use device::{Device, DeviceType};
pub use error::{code, str_error, Error, Result};
pub use mask::{count_set_bits, ModuleMask};
pub use quantis::Quantis;
pub use read::RandomSource;

/// Version of this library.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of devices of the given kind currently present.
///
/// Returns 0 if detection fails or the transport is not compiled in.
pub fn count(device_type: DeviceType) -> u32 {
    match device_type.backend() {
        Ok(backend) => backend.count(),
        Err(_) => 0,
    }
}

/// Version of the driver servicing the given transport.
///
/// For PCI this asks the kernel driver through card 0 and yields 0.0 when no
/// card is installed.
pub fn driver_version(device_type: DeviceType) -> Result<f32> {
    let backend = device_type.backend().map_err(|_| Error::NoDriver)?;
    Ok(backend.driver_version())
}

/// Message for an error code, including codes specific to one transport.
///
/// Common codes are looked up first; anything else is passed to the
/// transport's own table (libusb error names for USB).
pub fn full_str_error(device_type: DeviceType, error_code: i32) -> Option<&'static str> {
    str_error(error_code).or_else(|| {
        device_type
            .backend()
            .ok()
            .and_then(|backend| backend.type_str_error(error_code))
    })
}
