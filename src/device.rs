//! Transport selection and the open device handle.

use crate::backend::{Backend, Session};
use crate::consts::MAX_DEVICES;
use crate::error::{Error, Result};
use crate::mask::ModuleMask;
use crate::read::{self, RandomSource};
use log::{debug, trace};
use std::fmt;

/// Transport a Quantis device is attached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Quantis PCI or PCI Express card, serviced by a kernel driver.
    Pci,
    /// Quantis USB device.
    Usb,
}

impl DeviceType {
    /// Numeric code used by C callers (PCI = 1, USB = 2).
    pub fn code(self) -> i32 {
        match self {
            DeviceType::Pci => 1,
            DeviceType::Usb => 2,
        }
    }

    /// Parses a numeric device type code.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            1 => Ok(DeviceType::Pci),
            2 => Ok(DeviceType::Usb),
            other => Err(Error::NoDevice(format!("unknown device type {}", other))),
        }
    }

    /// Returns the backend servicing this transport.
    ///
    /// Fails with [`Error::NoDevice`] if support for it was not compiled in.
    pub fn backend(self) -> Result<&'static dyn Backend> {
        match self {
            #[cfg(all(feature = "pci", target_os = "linux"))]
            DeviceType::Pci => Ok(&crate::pci::PciBackend),
            #[cfg(feature = "usb")]
            DeviceType::Usb => Ok(&crate::usb::UsbBackend),
            #[allow(unreachable_patterns)]
            _ => Err(Error::NoDevice(format!(
                "{} support is not compiled in",
                self
            ))),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Pci => write!(f, "PCI"),
            DeviceType::Usb => write!(f, "USB"),
        }
    }
}

/// A handle to an opened Quantis device.
///
/// Holds the backend that services the device together with the backend's
/// private session state; both exist for the whole lifetime of the handle
/// and are released together when it is closed or dropped.
/// **Note:** A handle must not be used from several threads at once; open
/// one handle per thread instead.
pub struct Device {
    backend: &'static dyn Backend,
    index: u32,
    session: Option<Box<dyn Session>>,
}

impl Device {
    // --- Constructors ---

    /// Opens device number `index` of the given transport.
    pub fn open(device_type: DeviceType, index: u32) -> Result<Self> {
        Self::open_with(device_type.backend()?, index)
    }

    /// Opens device number `index` serviced by `backend`.
    ///
    /// On failure nothing is left open and the backend's error is returned
    /// unchanged.
    pub fn open_with(backend: &'static dyn Backend, index: u32) -> Result<Self> {
        if index >= MAX_DEVICES {
            return Err(Error::InvalidDeviceNumber {
                index,
                max: MAX_DEVICES,
            });
        }
        debug!("Opening {} device #{}", backend.name(), index);
        let session = backend.open(index)?;
        Ok(Device {
            backend,
            index,
            session: Some(session),
        })
    }

    /// Closes the device, releasing all transport resources.
    pub fn close(self) {}

    // --- Info ---

    /// Index of this device among devices of its transport.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The backend servicing this device.
    pub fn backend(&self) -> &'static dyn Backend {
        self.backend
    }

    fn session(&mut self) -> Result<&mut (dyn Session + 'static)> {
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(Error::Io("device handle is closed".to_string())),
        }
    }

    // --- Operations ---

    pub fn board_reset(&mut self) -> Result<()> {
        self.session()?.board_reset()
    }

    pub fn board_version(&mut self) -> Result<u32> {
        self.session()?.board_version()
    }

    /// Manufacturer name, or [`NOT_AVAILABLE`](crate::NOT_AVAILABLE) if the
    /// transport cannot report it.
    pub fn manufacturer(&mut self) -> Result<String> {
        Ok(self.session()?.manufacturer())
    }

    /// Serial number, or [`NO_SERIAL`](crate::NO_SERIAL).
    pub fn serial_number(&mut self) -> Result<String> {
        Ok(self.session()?.serial_number())
    }

    /// Modules physically present on the device.
    pub fn modules_mask(&mut self) -> Result<ModuleMask> {
        self.session()?.modules_mask()
    }

    /// Number of modules present on the device.
    pub fn modules_count(&mut self) -> Result<u32> {
        Ok(self.modules_mask()?.count())
    }

    /// Combined data rate of the present modules, in bytes per second.
    pub fn modules_data_rate(&mut self) -> Result<u32> {
        self.session()?.modules_data_rate()
    }

    pub fn modules_power(&mut self) -> Result<bool> {
        self.session()?.modules_power()
    }

    /// Modules currently enabled and functional.
    pub fn modules_status(&mut self) -> Result<ModuleMask> {
        self.session()?.modules_status()
    }

    pub fn modules_enable(&mut self, mask: ModuleMask) -> Result<()> {
        self.session()?.modules_enable(mask)
    }

    pub fn modules_disable(&mut self, mask: ModuleMask) -> Result<()> {
        self.session()?.modules_disable(mask)
    }

    /// Disables then re-enables the modules in `mask`.
    ///
    /// If disabling fails, enabling is not attempted.
    pub fn modules_reset(&mut self, mask: ModuleMask) -> Result<()> {
        let session = self.session()?;
        session.modules_disable(mask)?;
        session.modules_enable(mask)
    }

    /// PCI bus/device identifier; 0 on transports without one.
    pub fn bus_device_id(&mut self) -> Result<u32> {
        self.session()?.bus_device_id()
    }

    /// Whether the AIS 31 startup self-test is still pending since power-up.
    pub fn startup_tests_requested(&mut self) -> Result<bool> {
        self.session()?.startup_tests_requested()
    }

    /// Clears the AIS 31 startup-test request flag.
    pub fn clear_startup_tests_request(&mut self) -> Result<()> {
        self.session()?.clear_startup_tests_request()
    }

    /// Reads `size` random bytes into a new buffer.
    pub fn read(&mut self, size: usize) -> Result<Vec<u8>> {
        if !read::check_read_size(size)? {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; size];
        let read = self.read_bytes(&mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }
}

impl RandomSource for Device {
    /// Fills `buf` with random bytes.
    ///
    /// An empty buffer reads nothing and succeeds; buffers larger than
    /// [`MAX_READ_SIZE`](crate::MAX_READ_SIZE) are rejected before any I/O.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !read::check_read_size(buf.len())? {
            return Ok(0);
        }
        trace!(
            "Reading {} bytes from {} device #{}",
            buf.len(),
            self.backend.name(),
            self.index
        );
        self.session()?.read(buf)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Closing {} device #{}", self.backend.name(), self.index);
            session.close();
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("backend", &self.backend.name())
            .field("index", &self.index)
            .field("open", &self.session.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedBackend;

    #[test]
    fn test_device_type_codes() {
        assert_eq!(DeviceType::Pci.code(), 1);
        assert_eq!(DeviceType::Usb.code(), 2);
        assert_eq!(DeviceType::from_code(2).unwrap(), DeviceType::Usb);
        assert!(matches!(DeviceType::from_code(4), Err(Error::NoDevice(_))));
    }

    #[test]
    fn test_index_validated_before_backend() {
        let sim = SimulatedBackend::new(ModuleMask(0b1111)).leak();
        let err = Device::open_with(sim, MAX_DEVICES).unwrap_err();
        assert!(matches!(err, Error::InvalidDeviceNumber { index: 127, max: 127 }));
        assert_eq!(sim.open_sessions(), 0);
        assert_eq!(sim.open_attempts(), 0);
    }

    #[test]
    fn test_drop_releases_session() {
        let sim = SimulatedBackend::new(ModuleMask(0b1)).leak();
        {
            let device = Device::open_with(sim, 0).unwrap();
            assert_eq!(sim.open_sessions(), 1);
            assert_eq!(device.index(), 0);
        }
        assert_eq!(sim.open_sessions(), 0);
    }

    #[test]
    fn test_oversized_read_fails_without_allocating() {
        let sim = SimulatedBackend::new(ModuleMask(0b1)).leak();
        let mut device = Device::open_with(sim, 0).unwrap();
        assert!(matches!(
            device.read(usize::MAX),
            Err(Error::InvalidReadSize { size: usize::MAX, .. })
        ));
        assert!(device.read(0).unwrap().is_empty());
        assert_eq!(device.read(3).unwrap().len(), 3);
    }

    #[test]
    fn test_modules_reset_stops_after_failed_disable() {
        let sim = SimulatedBackend::new(ModuleMask(0b0011)).leak();
        let mut device = Device::open_with(sim, 0).unwrap();
        // No present module selected: disable fails, status untouched
        assert!(matches!(
            device.modules_reset(ModuleMask(0b1100)),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(device.modules_status().unwrap(), ModuleMask(0b0011));
        device.modules_reset(ModuleMask(0b0001)).unwrap();
        assert_eq!(device.modules_status().unwrap(), ModuleMask(0b0011));
    }
}
