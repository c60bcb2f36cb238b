//! Limits, sentinel strings, and transport identifiers.

/// Maximum number of devices of one kind that can be addressed by index.
pub const MAX_DEVICES: u32 = 127;

/// Largest number of bytes a single read request may ask for (16 MiB).
///
/// Larger requests reduce system call overhead, but callers that do not need
/// throughput should prefer small requests (4 KiB to 128 KiB) in a loop.
pub const MAX_READ_SIZE: usize = 16 * 1024 * 1024;

/// Data rate of a single PCI module, in bytes per second.
pub const MODULE_DATA_RATE: u32 = 500_000;

/// Returned for string properties a transport cannot report.
pub const NOT_AVAILABLE: &str = "Not available";

/// Returned when a device serial number cannot be read.
pub const NO_SERIAL: &str = "S/N not available";

// --- USB Related Constants ---
#[cfg(feature = "usb")]
pub mod usb {
    use std::time::Duration;

    /// Ellisys vendor ID used by Quantis USB devices.
    pub const VENDOR_ID: u16 = 0x0ABA;
    /// Product ID of the Quantis USB device.
    pub const PRODUCT_ID: u16 = 0x0102;

    /// Version reported for the userspace USB transport.
    pub const DRIVER_VERSION: f32 = 1.0;

    /// Timeout applied to every vendor control request.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(1000);

    /// Bulk IN endpoint carrying random data. Fixed by the firmware.
    pub const ENDPOINT_BULK_IN: u8 = 0x86;

    /// Configuration value selected on open.
    pub const CONFIGURATION: u8 = 1;
    /// The only interface exposed by the device.
    pub const INTERFACE: u8 = 0;

    /// Bytes discarded after a board reset.
    pub const RESET_DRAIN_SIZE: usize = 4096;

    // Vendor requests (bRequest)
    pub mod cmd {
        pub const GET_BOARD_VERSION: u8 = 0x10;
        pub const MODULE_DISABLE: u8 = 0x11;
        pub const MODULE_ENABLE: u8 = 0x12;
        pub const GET_MODULES_STATUS: u8 = 0x13;
        pub const GET_MODULES_POWER: u8 = 0x14;
        pub const GET_MODULES_MASK: u8 = 0x15;
        pub const GET_MODULES_RATE: u8 = 0x16;
        pub const GET_AIS31_STARTUP_TESTS_REQUEST_FLAG: u8 = 0x17;
        pub const CLEAR_AIS31_STARTUP_TESTS_REQUEST_FLAG: u8 = 0x18;
    }
}

// --- PCI Related Constants ---
#[cfg(all(feature = "pci", target_os = "linux"))]
pub mod pci {
    /// Directory holding the driver's character device nodes.
    pub const DEVICE_DIR: &str = "/dev";
    /// Node name prefix; device N is `/dev/qrandomN`.
    pub const DEVICE_NAME: &str = "qrandom";

    /// ioctl type byte used by the kernel driver.
    pub const IOC_MAGIC: u8 = b'q';
    /// Size of the buffer filled by the serial number ioctl.
    pub const SERIAL_MAX_LENGTH: usize = 256;
}
