//! Simulated backend for running without hardware.
//!
//! Behaves like a device with a configurable set of modules. Module
//! enable/disable changes the simulated status, reads fail when every module
//! is disabled, and the number of open sessions is tracked so leaked handles
//! are observable.

use crate::backend::{Backend, Session};
use crate::consts::{MODULE_DATA_RATE, NOT_AVAILABLE, NO_SERIAL};
use crate::error::{Error, Result};
use crate::mask::ModuleMask;
use log::{debug, trace};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Where simulated random bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteSource {
    /// Repeats the given bytes forever. An empty pattern yields zeros.
    Pattern(Vec<u8>),
    /// Linear congruential generator (`next = next * 1103515245 + 12345`),
    /// emitting the low byte of `(next / 65536) % 32768`.
    Lcg { seed: u32 },
}

impl ByteSource {
    /// The bytes `0x00, 0x01, ..., 0xFF`, repeating.
    pub fn counter() -> Self {
        ByteSource::Pattern((0..=255).collect())
    }
}

#[derive(Debug)]
struct SimState {
    status: ModuleMask,
    startup_tests_requested: bool,
    source: ByteSource,
    cursor: usize,
}

impl SimState {
    fn next_byte(&mut self) -> u8 {
        match &mut self.source {
            ByteSource::Pattern(bytes) if bytes.is_empty() => 0,
            ByteSource::Pattern(bytes) => {
                let byte = bytes[self.cursor % bytes.len()];
                self.cursor = (self.cursor + 1) % bytes.len();
                byte
            }
            ByteSource::Lcg { seed } => {
                *seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                ((*seed / 65_536) % 32_768) as u8
            }
        }
    }
}

#[derive(Debug)]
struct Shared {
    present: ModuleMask,
    state: Mutex<SimState>,
    open_sessions: AtomicUsize,
    open_attempts: AtomicUsize,
}

impl Shared {
    fn state(&self) -> Result<MutexGuard<'_, SimState>> {
        self.state
            .lock()
            .map_err(|_| Error::Other("simulated device state poisoned".to_string()))
    }
}

/// A backend serving simulated devices.
///
/// All devices of one backend share the module status, startup-test flag and
/// byte stream.
#[derive(Debug)]
pub struct SimulatedBackend {
    device_count: u32,
    shared: Arc<Shared>,
}

impl SimulatedBackend {
    /// One device with the modules in `present`, all enabled, producing the
    /// [`ByteSource::counter`] stream and requesting startup tests.
    pub fn new(present: ModuleMask) -> Self {
        SimulatedBackend {
            device_count: 1,
            shared: Arc::new(Shared {
                present,
                state: Mutex::new(SimState {
                    status: present,
                    startup_tests_requested: true,
                    source: ByteSource::counter(),
                    cursor: 0,
                }),
                open_sessions: AtomicUsize::new(0),
                open_attempts: AtomicUsize::new(0),
            }),
        }
    }

    fn configure(self, f: impl FnOnce(&mut SimState)) -> Self {
        if let Ok(mut state) = self.shared.state() {
            f(&mut state);
        }
        self
    }

    /// Sets how many devices the backend reports and accepts.
    pub fn with_device_count(mut self, count: u32) -> Self {
        self.device_count = count;
        self
    }

    /// Sets the byte stream served by reads.
    pub fn with_byte_source(self, source: ByteSource) -> Self {
        self.configure(|s| {
            s.source = source;
            s.cursor = 0;
        })
    }

    /// Sets the initial value of the startup-test request flag.
    pub fn with_startup_tests_requested(self, requested: bool) -> Self {
        self.configure(|s| s.startup_tests_requested = requested)
    }

    /// Sets the modules enabled initially.
    pub fn with_status(self, status: ModuleMask) -> Self {
        self.configure(|s| s.status = status)
    }

    /// Moves the backend to the heap for the rest of the process, as
    /// [`Device::open_with`](crate::Device::open_with) expects.
    pub fn leak(self) -> &'static Self {
        Box::leak(Box::new(self))
    }

    /// Sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.shared.open_sessions.load(Ordering::SeqCst)
    }

    /// Calls made to `open`, successful or not.
    pub fn open_attempts(&self) -> usize {
        self.shared.open_attempts.load(Ordering::SeqCst)
    }
}

impl Backend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn count(&self) -> u32 {
        self.device_count
    }

    fn driver_version(&self) -> f32 {
        0.1
    }

    fn open(&self, index: u32) -> Result<Box<dyn Session>> {
        self.shared.open_attempts.fetch_add(1, Ordering::SeqCst);
        if index >= self.device_count {
            return Err(Error::NoDevice(format!(
                "simulated device #{} requested, {} present",
                index, self.device_count
            )));
        }
        self.shared.open_sessions.fetch_add(1, Ordering::SeqCst);
        debug!("Opened simulated device #{}", index);
        Ok(Box::new(SimSession {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct SimSession {
    shared: Arc<Shared>,
}

impl SimSession {
    fn check_mask(&self, mask: ModuleMask) -> Result<ModuleMask> {
        let selected = mask & self.shared.present;
        if selected.is_empty() {
            return Err(Error::InvalidParameter(format!(
                "mask {} selects none of the present modules {}",
                mask, self.shared.present
            )));
        }
        Ok(selected)
    }
}

impl Session for SimSession {
    fn board_reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn board_version(&mut self) -> Result<u32> {
        Ok(0)
    }

    fn manufacturer(&mut self) -> String {
        NOT_AVAILABLE.to_string()
    }

    fn serial_number(&mut self) -> String {
        NO_SERIAL.to_string()
    }

    fn modules_mask(&mut self) -> Result<ModuleMask> {
        Ok(self.shared.present)
    }

    fn modules_data_rate(&mut self) -> Result<u32> {
        Ok(MODULE_DATA_RATE * self.shared.present.count())
    }

    fn modules_power(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn modules_status(&mut self) -> Result<ModuleMask> {
        Ok(self.shared.state()?.status)
    }

    fn modules_enable(&mut self, mask: ModuleMask) -> Result<()> {
        let selected = self.check_mask(mask)?;
        let mut state = self.shared.state()?;
        state.status = state.status | selected;
        Ok(())
    }

    fn modules_disable(&mut self, mask: ModuleMask) -> Result<()> {
        let selected = self.check_mask(mask)?;
        let mut state = self.shared.state()?;
        state.status = state.status & !selected;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.shared.state()?;
        if state.status.is_empty() {
            return Err(Error::InvalidStatus);
        }
        for byte in buf.iter_mut() {
            *byte = state.next_byte();
        }
        trace!("Simulated read of {} bytes", buf.len());
        Ok(buf.len())
    }

    fn bus_device_id(&mut self) -> Result<u32> {
        Ok(0)
    }

    fn startup_tests_requested(&mut self) -> Result<bool> {
        Ok(self.shared.state()?.startup_tests_requested)
    }

    fn clear_startup_tests_request(&mut self) -> Result<()> {
        self.shared.state()?.startup_tests_requested = false;
        Ok(())
    }
}

impl Drop for SimSession {
    fn drop(&mut self) {
        self.shared.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}
