//! Quantis PCI / PCI Express backend.
//!
//! The kernel driver exposes each card as a character device
//! `/dev/qrandomN`. Random data is read from it directly; everything else
//! goes through ioctls.

use crate::backend::{Backend, Session};
use crate::consts::{pci, MODULE_DATA_RATE, NOT_AVAILABLE, NO_SERIAL};
use crate::error::{Error, Result};
use crate::mask::ModuleMask;
use log::{debug, trace, warn};
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

// --- Driver ioctls ---

mod ioctl {
    use crate::consts::pci::{IOC_MAGIC, SERIAL_MAX_LENGTH};

    nix::ioctl_read!(driver_version, IOC_MAGIC, 0, u32);
    nix::ioctl_read!(modules_mask, IOC_MAGIC, 2, u32);
    nix::ioctl_read!(board_version, IOC_MAGIC, 3, u32);
    nix::ioctl_none!(reset_board, IOC_MAGIC, 4);
    nix::ioctl_write_ptr!(enable_modules, IOC_MAGIC, 5, u32);
    nix::ioctl_write_ptr!(disable_modules, IOC_MAGIC, 6, u32);
    nix::ioctl_read!(modules_status, IOC_MAGIC, 8, u32);
    nix::ioctl_read!(bus_device_id, IOC_MAGIC, 9, u32);
    nix::ioctl_read!(startup_tests_flag, IOC_MAGIC, 10, u32);
    nix::ioctl_write_ptr!(clear_startup_tests_flag, IOC_MAGIC, 11, u32);
    nix::ioctl_read!(serial_number, IOC_MAGIC, 12, [u8; SERIAL_MAX_LENGTH]);
}

fn ioctl_error(request: &str, err: nix::errno::Errno) -> Error {
    warn!("PCI ioctl {} failed: {}", request, err);
    Error::Io(format!("ioctl {} failed: {}", request, err))
}

fn device_path(index: u32) -> PathBuf {
    Path::new(pci::DEVICE_DIR).join(format!("{}{}", pci::DEVICE_NAME, index))
}

/// Counts entries of `dir` whose name starts with the PCI device node prefix.
///
/// An unreadable directory counts as no devices.
pub(crate) fn count_device_nodes(dir: &Path) -> u32 {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list {}: {}", dir.display(), e);
            return 0;
        }
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with(pci::DEVICE_NAME)
        })
        .count() as u32
}

/// Text of a NUL-terminated serial number buffer.
fn serial_from_buffer(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Backend for cards serviced by the `quantis` kernel driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct PciBackend;

impl Backend for PciBackend {
    fn name(&self) -> &'static str {
        "PCI"
    }

    fn count(&self) -> u32 {
        count_device_nodes(Path::new(pci::DEVICE_DIR))
    }

    /// Asks the driver through card 0; 0.0 when no card is usable.
    fn driver_version(&self) -> f32 {
        let session = match PciSession::open(0) {
            Ok(session) => session,
            Err(e) => {
                debug!("No PCI card to query the driver version: {}", e);
                return 0.0;
            }
        };
        let mut version = 0u32;
        // SAFETY: the driver writes one u32 through the pointer.
        match unsafe { ioctl::driver_version(session.fd(), &mut version) } {
            Ok(_) => version as f32 / 10.0,
            Err(e) => {
                ioctl_error("driver_version", e);
                0.0
            }
        }
    }

    fn open(&self, index: u32) -> Result<Box<dyn Session>> {
        Ok(Box::new(PciSession::open(index)?))
    }
}

/// An open `/dev/qrandomN` node.
#[derive(Debug)]
pub struct PciSession {
    file: File,
    serial: Option<String>,
}

impl PciSession {
    fn open(index: u32) -> Result<Self> {
        let path = device_path(index);
        let file = File::open(&path)
            .map_err(|e| Error::NoDevice(format!("{}: {}", path.display(), e)))?;
        debug!("Opened {}", path.display());
        Ok(PciSession { file, serial: None })
    }

    fn fd(&self) -> i32 {
        self.file.as_raw_fd()
    }

    fn read_u32(
        &self,
        request: &str,
        f: unsafe fn(i32, *mut u32) -> nix::Result<i32>,
    ) -> Result<u32> {
        let mut value = 0u32;
        // SAFETY: every read request used here transfers exactly one u32.
        unsafe { f(self.fd(), &mut value) }.map_err(|e| ioctl_error(request, e))?;
        trace!("PCI ioctl {} -> {:#x}", request, value);
        Ok(value)
    }

    fn write_u32(
        &self,
        request: &str,
        f: unsafe fn(i32, *const u32) -> nix::Result<i32>,
        value: u32,
    ) -> Result<()> {
        trace!("PCI ioctl {} <- {:#x}", request, value);
        // SAFETY: the driver reads one u32 through the pointer.
        unsafe { f(self.fd(), &value) }.map_err(|e| ioctl_error(request, e))?;
        Ok(())
    }
}

impl Session for PciSession {
    fn board_reset(&mut self) -> Result<()> {
        // SAFETY: no argument is passed.
        unsafe { ioctl::reset_board(self.fd()) }.map_err(|e| ioctl_error("reset_board", e))?;
        Ok(())
    }

    fn board_version(&mut self) -> Result<u32> {
        self.read_u32("board_version", ioctl::board_version)
    }

    fn manufacturer(&mut self) -> String {
        NOT_AVAILABLE.to_string()
    }

    fn serial_number(&mut self) -> String {
        if let Some(serial) = &self.serial {
            return serial.clone();
        }
        let mut buf = [0u8; pci::SERIAL_MAX_LENGTH];
        // SAFETY: the driver writes at most SERIAL_MAX_LENGTH bytes.
        let serial = match unsafe { ioctl::serial_number(self.fd(), &mut buf) } {
            Ok(_) => serial_from_buffer(&buf),
            Err(e) => {
                ioctl_error("serial_number", e);
                NO_SERIAL.to_string()
            }
        };
        self.serial = Some(serial.clone());
        serial
    }

    fn modules_mask(&mut self) -> Result<ModuleMask> {
        self.read_u32("modules_mask", ioctl::modules_mask)
            .map(ModuleMask)
    }

    fn modules_data_rate(&mut self) -> Result<u32> {
        Ok(MODULE_DATA_RATE * self.modules_mask()?.count())
    }

    /// PCI modules are always powered.
    fn modules_power(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn modules_status(&mut self) -> Result<ModuleMask> {
        self.read_u32("modules_status", ioctl::modules_status)
            .map(ModuleMask)
    }

    fn modules_enable(&mut self, mask: ModuleMask) -> Result<()> {
        self.write_u32("enable_modules", ioctl::enable_modules, mask.bits())
    }

    fn modules_disable(&mut self, mask: ModuleMask) -> Result<()> {
        self.write_u32("disable_modules", ioctl::disable_modules, mask.bits())
    }

    /// The driver returns at most what its buffer holds, so reads loop
    /// until `buf` is full.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.modules_status()?.is_empty() {
            return Err(Error::InvalidStatus);
        }
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(Error::Io(format!(
                        "device returned no data after {} of {} bytes",
                        filled,
                        buf.len()
                    )))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    fn bus_device_id(&mut self) -> Result<u32> {
        self.read_u32("bus_device_id", ioctl::bus_device_id)
    }

    fn startup_tests_requested(&mut self) -> Result<bool> {
        Ok(self.read_u32("startup_tests_flag", ioctl::startup_tests_flag)? != 0)
    }

    fn clear_startup_tests_request(&mut self) -> Result<()> {
        self.write_u32(
            "clear_startup_tests_flag",
            ioctl::clear_startup_tests_flag,
            0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_path() {
        assert_eq!(device_path(3), PathBuf::from("/dev/qrandom3"));
    }

    #[test]
    fn test_count_device_nodes() {
        let dir = std::env::temp_dir().join(format!("quantis-pci-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for name in ["qrandom0", "qrandom1", "random", "urandom"] {
            File::create(dir.join(name)).unwrap();
        }
        assert_eq!(count_device_nodes(&dir), 2);
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(count_device_nodes(&dir), 0);
    }

    #[test]
    fn test_serial_from_buffer() {
        let mut buf = [0u8; 16];
        buf[..6].copy_from_slice(b"123456");
        assert_eq!(serial_from_buffer(&buf), "123456");
        assert_eq!(serial_from_buffer(b"ABCD"), "ABCD");
        assert_eq!(serial_from_buffer(&[0u8; 4]), "");
    }

    #[test]
    fn test_open_missing_node() {
        // Far beyond any installed card count
        assert!(matches!(
            PciSession::open(126),
            Err(Error::NoDevice(_))
        ));
    }
}
