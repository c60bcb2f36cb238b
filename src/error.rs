use thiserror::Error;

/// Numeric error codes shared with C callers.
///
/// Every [`Error`] maps onto one of these through [`Error::code`].
pub mod code {
    pub const SUCCESS: i32 = 0;
    pub const NO_DRIVER: i32 = -101;
    pub const INVALID_DEVICE_NUMBER: i32 = -102;
    pub const INVALID_READ_SIZE: i32 = -103;
    pub const INVALID_PARAMETER: i32 = -104;
    pub const NO_MEMORY: i32 = -105;
    pub const NO_MODULE: i32 = -106;
    pub const IO: i32 = -107;
    pub const NO_DEVICE: i32 = -108;
    pub const OPERATION_NOT_SUPPORTED: i32 = -109;
    pub const INVALID_STATUS: i32 = -110;
    pub const OTHER: i32 = -199;
}

/// Errors that can occur when using Quantis devices.
///
/// This enum covers parameter validation, device selection and the
/// transport failures reported by the PCI and USB backends.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested transport has no driver.
    #[error("Invalid driver type")]
    NoDriver,
    /// Device index is not below [`MAX_DEVICES`](crate::MAX_DEVICES).
    #[error("Invalid device number {index} (must be below {max})")]
    InvalidDeviceNumber {
        /// The index that was requested.
        index: u32,
        /// Exclusive upper bound for device indices.
        max: u32,
    },
    /// Read request larger than [`MAX_READ_SIZE`](crate::MAX_READ_SIZE).
    #[error("Invalid read size (max {max}, got {size})")]
    InvalidReadSize {
        /// Number of bytes requested.
        size: usize,
        /// Maximum allowed size for one request.
        max: usize,
    },
    /// Function argument rejected before any I/O took place.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Provided buffer is smaller than required for the operation.
    #[error("Provided buffer is too small (expected at least {expected}, got {actual})")]
    BufferTooSmall {
        /// Minimum required buffer size.
        expected: usize,
        /// Actual buffer size provided.
        actual: usize,
    },
    /// Memory allocation failure.
    #[error("Memory allocation failure")]
    NoMemory,
    /// No module found or no module enabled.
    #[error("No module found or no module enabled")]
    NoModule,
    /// Input/output error during device communication.
    #[error("Input/output error: {0}")]
    Io(String),
    /// No such device (it may have been disconnected).
    #[error("No such device: {0}")]
    NoDevice(String),
    /// The transport does not implement this operation.
    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),
    /// The modules report a status that does not allow reading.
    #[error("The module returns an invalid status")]
    InvalidStatus,
    /// Transport failure carrying a backend-specific code.
    ///
    /// Use [`full_str_error`](crate::full_str_error) to resolve `code`.
    #[error("Transport error {code}: {message}")]
    Transport {
        /// Backend-specific error code.
        code: i32,
        /// Details reported by the transport.
        message: String,
    },
    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns the numeric code of this error.
    pub fn code(&self) -> i32 {
        match self {
            Error::NoDriver => code::NO_DRIVER,
            Error::InvalidDeviceNumber { .. } => code::INVALID_DEVICE_NUMBER,
            Error::InvalidReadSize { .. } => code::INVALID_READ_SIZE,
            Error::InvalidParameter(_) | Error::BufferTooSmall { .. } => code::INVALID_PARAMETER,
            Error::NoMemory => code::NO_MEMORY,
            Error::NoModule => code::NO_MODULE,
            Error::Io(_) => code::IO,
            Error::NoDevice(_) => code::NO_DEVICE,
            Error::OperationNotSupported(_) => code::OPERATION_NOT_SUPPORTED,
            Error::InvalidStatus => code::INVALID_STATUS,
            Error::Transport { code, .. } => *code,
            Error::Other(_) => code::OTHER,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// Result type alias for Quantis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the message for one of the common error codes.
///
/// Codes outside the common table (including [`code::OTHER`]) give `None`;
/// see [`full_str_error`](crate::full_str_error) for backend-specific codes.
pub fn str_error(error_code: i32) -> Option<&'static str> {
    let msg = match error_code {
        code::INVALID_DEVICE_NUMBER => "Invalid device number (out of bounds)",
        code::NO_DRIVER => "Invalid driver type",
        code::INVALID_PARAMETER => "Invalid parameter",
        code::INVALID_READ_SIZE => "Invalid size (size is negative or too large)",
        code::IO => "Input/output error",
        code::NO_DEVICE => "No such device (it may have been disconnected)",
        code::NO_MEMORY => "Memory allocation failure (insufficient memory?)",
        code::NO_MODULE => "No module found or no module enabled",
        code::OPERATION_NOT_SUPPORTED => "Operation is not supported or unimplemented",
        code::INVALID_STATUS => "the module returns an invalid status",
        code::SUCCESS => "Success",
        _ => return None,
    };
    Some(msg)
}

// Helper for the single-module USB transport
#[cfg_attr(not(feature = "usb"), allow(dead_code))]
pub(crate) fn single_module_mask(mask: u32) -> Error {
    Error::InvalidParameter(format!(
        "mask 0x{:08X} does not select module 0 (this transport has a single module)",
        mask
    ))
}
