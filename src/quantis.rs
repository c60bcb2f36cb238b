//! One-shot access: every call opens the device, performs one operation and
//! closes it again.
//!
//! Use [`Device`] instead when issuing many requests; opening a device costs
//! an enumeration and, on USB, claiming the interface.

use crate::backend::Backend;
use crate::device::{Device, DeviceType};
use crate::error::Result;
use crate::mask::ModuleMask;
use crate::read::{self, RandomSource};
use log::trace;

/// Selects one device by transport and index without keeping it open.
///
/// ```no_run
/// use quantis::{DeviceType, Quantis, RandomSource};
///
/// # fn main() -> quantis::Result<()> {
/// let mut qrng = Quantis::new(DeviceType::Usb, 0)?;
/// println!("Serial: {}", qrng.serial_number()?);
/// let roll = qrng.read_scaled_int(1, 6)?;
/// println!("Rolled {}", roll);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy)]
pub struct Quantis {
    backend: &'static dyn Backend,
    index: u32,
}

impl Quantis {
    /// Selects device `index` of the given transport.
    ///
    /// Fails only if support for the transport is not compiled in; the device
    /// itself is not touched until the first operation.
    pub fn new(device_type: DeviceType, index: u32) -> Result<Self> {
        Ok(Self::with_backend(device_type.backend()?, index))
    }

    /// Selects device `index` serviced by `backend`.
    pub fn with_backend(backend: &'static dyn Backend, index: u32) -> Self {
        Quantis { backend, index }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Opens the selected device for a sequence of operations.
    pub fn open(&self) -> Result<Device> {
        Device::open_with(self.backend, self.index)
    }

    fn with_device<T>(&self, f: impl FnOnce(&mut Device) -> Result<T>) -> Result<T> {
        let mut device = self.open()?;
        let result = f(&mut device);
        device.close();
        result
    }

    // --- Board ---

    pub fn board_reset(&self) -> Result<()> {
        self.with_device(|d| d.board_reset())
    }

    pub fn board_version(&self) -> Result<u32> {
        self.with_device(|d| d.board_version())
    }

    pub fn manufacturer(&self) -> Result<String> {
        self.with_device(|d| d.manufacturer())
    }

    pub fn serial_number(&self) -> Result<String> {
        self.with_device(|d| d.serial_number())
    }

    pub fn bus_device_id(&self) -> Result<u32> {
        self.with_device(|d| d.bus_device_id())
    }

    // --- Modules ---

    pub fn modules_mask(&self) -> Result<ModuleMask> {
        self.with_device(|d| d.modules_mask())
    }

    pub fn modules_count(&self) -> Result<u32> {
        self.with_device(|d| d.modules_count())
    }

    pub fn modules_data_rate(&self) -> Result<u32> {
        self.with_device(|d| d.modules_data_rate())
    }

    pub fn modules_power(&self) -> Result<bool> {
        self.with_device(|d| d.modules_power())
    }

    pub fn modules_status(&self) -> Result<ModuleMask> {
        self.with_device(|d| d.modules_status())
    }

    pub fn modules_enable(&self, mask: ModuleMask) -> Result<()> {
        self.with_device(|d| d.modules_enable(mask))
    }

    pub fn modules_disable(&self, mask: ModuleMask) -> Result<()> {
        self.with_device(|d| d.modules_disable(mask))
    }

    /// Disables then re-enables the modules in `mask` within one session.
    pub fn modules_reset(&self, mask: ModuleMask) -> Result<()> {
        self.with_device(|d| d.modules_reset(mask))
    }

    // --- AIS 31 ---

    pub fn startup_tests_requested(&self) -> Result<bool> {
        self.with_device(|d| d.startup_tests_requested())
    }

    pub fn clear_startup_tests_request(&self) -> Result<()> {
        self.with_device(|d| d.clear_startup_tests_request())
    }

    // --- Data ---

    /// Reads `size` random bytes into a new buffer.
    pub fn read(&self, size: usize) -> Result<Vec<u8>> {
        if !read::check_read_size(size)? {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; size];
        let mut source = *self;
        let read = source.read_bytes(&mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }
}

impl RandomSource for Quantis {
    /// Opens the device, fills `buf` and closes it again.
    ///
    /// The size is validated before the device is opened; an empty buffer
    /// succeeds without touching the device.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !read::check_read_size(buf.len())? {
            return Ok(0);
        }
        trace!(
            "One-shot read of {} bytes from {} device #{}",
            buf.len(),
            self.backend.name(),
            self.index
        );
        self.with_device(|d| d.read_bytes(buf))
    }
}

impl std::fmt::Debug for Quantis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quantis")
            .field("backend", &self.backend.name())
            .field("index", &self.index)
            .finish()
    }
}
