//! The operation set every transport backend implements.
//!
//! A [`Backend`] is the per-transport operation table: one `'static`
//! instance per transport kind, shared by every open device of that kind.
//! Opening a device through it yields a [`Session`], the backend-private
//! state of that one device. The device layer only forwards calls; it never
//! inspects which transport is behind them.

use crate::error::Result;
use crate::mask::ModuleMask;

/// Operations that do not need an open device, plus `open` itself.
pub trait Backend: Send + Sync {
    /// Short transport name used in log messages.
    fn name(&self) -> &'static str;

    /// Number of devices of this kind currently present.
    ///
    /// Returns 0 when detection itself is inconclusive.
    fn count(&self) -> u32;

    /// Version of the driver servicing this transport.
    fn driver_version(&self) -> f32;

    /// Binds the `index`-th device of this kind.
    ///
    /// Fails with [`Error::NoDevice`](crate::Error::NoDevice) when fewer than
    /// `index + 1` devices exist.
    fn open(&self, index: u32) -> Result<Box<dyn Session>>;

    /// Message for an error code specific to this transport.
    fn type_str_error(&self, _code: i32) -> Option<&'static str> {
        None
    }
}

/// Backend-private state of one open device.
///
/// Dropping a session releases its transport resources.
pub trait Session: Send {
    fn board_reset(&mut self) -> Result<()>;

    fn board_version(&mut self) -> Result<u32>;

    /// Manufacturer name, or [`NOT_AVAILABLE`](crate::NOT_AVAILABLE).
    fn manufacturer(&mut self) -> String;

    /// Serial number, or [`NO_SERIAL`](crate::NO_SERIAL).
    fn serial_number(&mut self) -> String;

    /// Modules physically present.
    fn modules_mask(&mut self) -> Result<ModuleMask>;

    /// Combined data rate of the present modules, in bytes per second.
    fn modules_data_rate(&mut self) -> Result<u32>;

    fn modules_power(&mut self) -> Result<bool>;

    /// Modules currently enabled and functional.
    fn modules_status(&mut self) -> Result<ModuleMask>;

    fn modules_enable(&mut self, mask: ModuleMask) -> Result<()>;

    fn modules_disable(&mut self, mask: ModuleMask) -> Result<()>;

    /// Fills `buf` completely or fails.
    ///
    /// Interrupted system calls are retried. Fails with
    /// [`Error::InvalidStatus`](crate::Error::InvalidStatus) when no module
    /// is able to deliver data.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn bus_device_id(&mut self) -> Result<u32>;

    /// Whether the mandated startup self-test is still pending since power-up.
    fn startup_tests_requested(&mut self) -> Result<bool>;

    fn clear_startup_tests_request(&mut self) -> Result<()>;

    /// Releases the session. The default drops it.
    fn close(self: Box<Self>) {}
}
