//! Quantis USB backend.
//!
//! Talks to the device directly through `nusb`: vendor control requests on
//! interface 0 for status and configuration, and a bulk IN endpoint for
//! random data. The device exposes exactly one module (module 0).
//!
//! **Note:** The bulk endpoint only answers requests of exactly
//! `wMaxPacketSize` bytes, so reads are always issued in whole packets and
//! surplus bytes of the last packet are discarded.

use crate::backend::{Backend, Session};
use crate::consts::{usb, NOT_AVAILABLE, NO_SERIAL};
use crate::error::{single_module_mask, Error, Result};
use crate::mask::ModuleMask;
use futures::executor::block_on;
use log::{debug, trace, warn};
use nusb::transfer::{Control, ControlType, Recipient, RequestBuffer, TransferError};
use std::thread;
use std::time::Duration;

/// libusb error codes, used for transport failures so callers can resolve
/// them with [`UsbBackend::type_str_error`].
mod libusb {
    pub const ERROR_IO: i32 = -1;
    pub const ERROR_NO_DEVICE: i32 = -4;
    pub const ERROR_PIPE: i32 = -9;
    pub const ERROR_INTERRUPTED: i32 = -10;
    pub const ERROR_OTHER: i32 = -99;
}

fn is_quantis(info: &nusb::DeviceInfo) -> bool {
    info.vendor_id() == usb::VENDOR_ID && info.product_id() == usb::PRODUCT_ID
}

fn find_devices() -> Result<Vec<nusb::DeviceInfo>> {
    let devices = nusb::list_devices()
        .map_err(|e| Error::Io(format!("USB enumeration: {}", e)))?
        .filter(is_quantis)
        .collect();
    Ok(devices)
}

/// Maps a failed bulk transfer onto the matching libusb error code.
fn transfer_error(err: TransferError) -> Error {
    let code = match err {
        TransferError::Disconnected => libusb::ERROR_NO_DEVICE,
        TransferError::Stall => libusb::ERROR_PIPE,
        TransferError::Cancelled => libusb::ERROR_INTERRUPTED,
        TransferError::Fault => libusb::ERROR_IO,
        _ => libusb::ERROR_OTHER,
    };
    Error::Transport {
        code,
        message: err.to_string(),
    }
}

/// The device has a single module; `mask` must select it.
fn check_module_mask(mask: ModuleMask) -> Result<()> {
    if mask.contains(0) {
        Ok(())
    } else {
        Err(single_module_mask(mask.bits()))
    }
}

/// Data rate in bytes per second from the device's per-module rate in kbit/s.
///
/// A rate too large to express in bytes per second is an I/O error.
fn bytes_per_second(rate_kbits: u32, mask: ModuleMask) -> Result<u32> {
    u64::from(rate_kbits)
        .checked_mul(1000 / 8)
        .and_then(|per_module| per_module.checked_mul(u64::from(mask.count())))
        .and_then(|total| u32::try_from(total).ok())
        .ok_or_else(|| {
            Error::Io(format!(
                "module data rate {} kbit/s out of range for {} modules",
                rate_kbits,
                mask.count()
            ))
        })
}

/// Backend for Quantis USB devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsbBackend;

impl Backend for UsbBackend {
    fn name(&self) -> &'static str {
        "USB"
    }

    fn count(&self) -> u32 {
        match find_devices() {
            Ok(devices) => devices.len() as u32,
            Err(e) => {
                warn!("USB device count unavailable: {}", e);
                0
            }
        }
    }

    fn driver_version(&self) -> f32 {
        usb::DRIVER_VERSION
    }

    fn open(&self, index: u32) -> Result<Box<dyn Session>> {
        Ok(Box::new(UsbSession::open(index)?))
    }

    /// Name of a libusb error code.
    fn type_str_error(&self, code: i32) -> Option<&'static str> {
        let name = match code {
            0 => "LIBUSB_SUCCESS",
            -1 => "LIBUSB_ERROR_IO",
            -2 => "LIBUSB_ERROR_INVALID_PARAM",
            -3 => "LIBUSB_ERROR_ACCESS",
            -4 => "LIBUSB_ERROR_NO_DEVICE",
            -5 => "LIBUSB_ERROR_NOT_FOUND",
            -6 => "LIBUSB_ERROR_BUSY",
            -7 => "LIBUSB_ERROR_TIMEOUT",
            -8 => "LIBUSB_ERROR_OVERFLOW",
            -9 => "LIBUSB_ERROR_PIPE",
            -10 => "LIBUSB_ERROR_INTERRUPTED",
            -11 => "LIBUSB_ERROR_NO_MEM",
            -12 => "LIBUSB_ERROR_NOT_SUPPORTED",
            -99 => "LIBUSB_ERROR_OTHER",
            _ => return None,
        };
        Some(name)
    }
}

/// An open Quantis USB device with its interface claimed.
pub struct UsbSession {
    interface: nusb::Interface,
    max_packet_size: usize,
    serial: String,
    manufacturer: String,
}

impl UsbSession {
    fn open(index: u32) -> Result<Self> {
        let devices = find_devices()?;
        let info = devices.get(index as usize).ok_or_else(|| {
            Error::NoDevice(format!(
                "USB device #{} requested, {} present",
                index,
                devices.len()
            ))
        })?;
        debug!(
            "Opening Quantis USB at bus {} address {}",
            info.bus_number(),
            info.device_address()
        );

        let device = info.open()?;
        device.set_configuration(usb::CONFIGURATION)?;
        if device.configurations().count() != 1 {
            return Err(Error::Io("unexpected number of USB configurations".to_string()));
        }
        let config = device
            .active_configuration()
            .map_err(|e| Error::Io(format!("active configuration: {}", e)))?;
        if config.interfaces().count() != 1 {
            return Err(Error::Io("unexpected number of USB interfaces".to_string()));
        }
        let max_packet_size = config
            .interfaces()
            .next()
            .and_then(|group| {
                group
                    .alt_settings()
                    .next()
                    .and_then(|alt| alt.endpoints().next().map(|ep| ep.max_packet_size()))
            })
            .filter(|&size| size > 0)
            .ok_or_else(|| Error::Io("USB interface exposes no endpoint".to_string()))?;

        let interface = device.claim_interface(usb::INTERFACE)?;
        debug!("Claimed interface {}, max packet size {}", usb::INTERFACE, max_packet_size);

        Ok(UsbSession {
            interface,
            max_packet_size,
            serial: info.serial_number().unwrap_or(NO_SERIAL).to_string(),
            manufacturer: info
                .manufacturer_string()
                .unwrap_or(NOT_AVAILABLE)
                .to_string(),
        })
    }

    fn control(request: u8) -> Control {
        Control {
            control_type: ControlType::Vendor,
            recipient: Recipient::Interface,
            request,
            value: 0,
            index: 0,
        }
    }

    fn get_value<const N: usize>(&self, request: u8) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        let len = self
            .interface
            .control_in_blocking(Self::control(request), &mut buf, usb::REQUEST_TIMEOUT)
            .map_err(|e| Error::Io(format!("control request 0x{:02X}: {}", request, e)))?;
        trace!("USB request 0x{:02X} -> {:02X?} ({} bytes)", request, buf, len);
        Ok(buf)
    }

    fn get_int(&self, request: u8) -> Result<u32> {
        self.get_value::<4>(request).map(u32::from_le_bytes)
    }

    fn get_uchar(&self, request: u8) -> Result<u8> {
        self.get_value::<1>(request).map(|[value]| value)
    }

    fn send_request(&self, request: u8) -> Result<()> {
        trace!("USB request 0x{:02X}", request);
        self.interface
            .control_out_blocking(Self::control(request), &[], usb::REQUEST_TIMEOUT)
            .map_err(|e| Error::Io(format!("control request 0x{:02X}: {}", request, e)))?;
        Ok(())
    }
}

impl Session for UsbSession {
    /// Cycles the module off and on, then discards the first bytes it
    /// produces. The cycle is skipped only when the module reports running
    /// and the presence mask reads back empty.
    fn board_reset(&mut self) -> Result<()> {
        let running = self.modules_status()? == ModuleMask(1);
        if !running || !self.modules_mask()?.is_empty() {
            if let Err(e) = self.modules_disable(ModuleMask::ALL) {
                warn!("Board reset: disabling module failed: {}", e);
            }
            if let Err(e) = self.modules_enable(ModuleMask::ALL) {
                warn!("Board reset: enabling module failed: {}", e);
            }
            thread::sleep(Duration::from_secs(1));
        }
        let mut drain = vec![0u8; usb::RESET_DRAIN_SIZE];
        self.read(&mut drain)?;
        Ok(())
    }

    fn board_version(&mut self) -> Result<u32> {
        self.get_int(usb::cmd::GET_BOARD_VERSION)
    }

    fn manufacturer(&mut self) -> String {
        self.manufacturer.clone()
    }

    fn serial_number(&mut self) -> String {
        self.serial.clone()
    }

    fn modules_mask(&mut self) -> Result<ModuleMask> {
        Ok(ModuleMask(self.get_uchar(usb::cmd::GET_MODULES_MASK)? as u32))
    }

    fn modules_data_rate(&mut self) -> Result<u32> {
        let rate = self.get_int(usb::cmd::GET_MODULES_RATE)?;
        bytes_per_second(rate, self.modules_mask()?)
    }

    fn modules_power(&mut self) -> Result<bool> {
        Ok(self.get_uchar(usb::cmd::GET_MODULES_POWER)? != 0)
    }

    fn modules_status(&mut self) -> Result<ModuleMask> {
        Ok(ModuleMask(self.get_uchar(usb::cmd::GET_MODULES_STATUS)? as u32))
    }

    fn modules_enable(&mut self, mask: ModuleMask) -> Result<()> {
        check_module_mask(mask)?;
        self.send_request(usb::cmd::MODULE_ENABLE)
    }

    fn modules_disable(&mut self, mask: ModuleMask) -> Result<()> {
        check_module_mask(mask)?;
        self.send_request(usb::cmd::MODULE_DISABLE)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        for chunk in buf.chunks_mut(self.max_packet_size) {
            if self.modules_status()?.is_empty() {
                return Err(Error::InvalidStatus);
            }
            // TODO: nusb 0.1 bulk transfers have no timeout; cancel after
            // REQUEST_TIMEOUT once the transfer API allows it.
            let packet = block_on(
                self.interface
                    .bulk_in(usb::ENDPOINT_BULK_IN, RequestBuffer::new(self.max_packet_size)),
            )
            .into_result()
            .map_err(transfer_error)?;
            if packet.len() != self.max_packet_size {
                return Err(Error::Io(format!(
                    "short bulk transfer: {} of {} bytes",
                    packet.len(),
                    self.max_packet_size
                )));
            }
            chunk.copy_from_slice(&packet[..chunk.len()]);
        }
        Ok(buf.len())
    }

    /// Only PCI cards have a bus identifier.
    fn bus_device_id(&mut self) -> Result<u32> {
        Ok(0)
    }

    fn startup_tests_requested(&mut self) -> Result<bool> {
        Ok(self.get_uchar(usb::cmd::GET_AIS31_STARTUP_TESTS_REQUEST_FLAG)? != 0)
    }

    fn clear_startup_tests_request(&mut self) -> Result<()> {
        self.send_request(usb::cmd::CLEAR_AIS31_STARTUP_TESTS_REQUEST_FLAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_mask_must_select_module_0() {
        assert!(check_module_mask(ModuleMask(0b1)).is_ok());
        assert!(check_module_mask(ModuleMask::ALL).is_ok());
        assert!(matches!(
            check_module_mask(ModuleMask(0b10)),
            Err(Error::InvalidParameter(_))
        ));
        assert!(check_module_mask(ModuleMask::NONE).is_err());
    }

    #[test]
    fn test_transfer_error_codes() {
        assert_eq!(transfer_error(TransferError::Stall).code(), -9);
        assert_eq!(transfer_error(TransferError::Disconnected).code(), -4);
        assert_eq!(transfer_error(TransferError::Fault).code(), -1);
    }

    #[test]
    fn test_libusb_error_names() {
        let backend = UsbBackend;
        assert_eq!(backend.type_str_error(-4), Some("LIBUSB_ERROR_NO_DEVICE"));
        assert_eq!(backend.type_str_error(-99), Some("LIBUSB_ERROR_OTHER"));
        assert_eq!(backend.type_str_error(-50), None);
        assert_eq!(
            backend.type_str_error(transfer_error(TransferError::Cancelled).code()),
            Some("LIBUSB_ERROR_INTERRUPTED")
        );
    }

    #[test]
    fn test_data_rate_conversion() {
        // 4 Mbit/s module
        assert_eq!(bytes_per_second(4000, ModuleMask(1)).unwrap(), 500_000);
        assert_eq!(bytes_per_second(4000, ModuleMask::NONE).unwrap(), 0);
        assert_eq!(bytes_per_second(4000, ModuleMask(0b11)).unwrap(), 1_000_000);
    }

    #[test]
    fn test_data_rate_overflow_is_io_error() {
        assert!(matches!(
            bytes_per_second(u32::MAX, ModuleMask(1)),
            Err(Error::Io(_))
        ));
        assert!(matches!(
            bytes_per_second(40_000_000, ModuleMask::ALL),
            Err(Error::Io(_))
        ));
    }
}
