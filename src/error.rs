//! Unified error types for the beacon firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! main loop's error handling uniform.  All variants are `Copy` so they can
//! travel through the service and the GATT bridge without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An attribute read or write was refused.
    Att(AttError),
    /// The persistence backend failed.
    Storage(StorageError),
    /// The persisted record slot could not be decoded or encoded.
    Record(RecordError),
    /// The radio layer refused a fragment or the stream was malformed.
    Radio(RadioError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Att(e) => write!(f, "att: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Record(e) => write!(f, "record: {e}"),
            Self::Radio(e) => write!(f, "radio: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute access errors
// ---------------------------------------------------------------------------

/// Status returned to the remote peer for a refused attribute access.
///
/// Every variant leaves the configuration store untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttError {
    /// Wrong size for a fixed attribute, or too long for a variable one.
    InvalidLength,
    /// The beacon is locked, or the unlock code did not match.
    InsufficientAuthorization,
    /// Unknown attribute, read-only attribute, or out-of-range value.
    WriteNotPermitted,
    /// Unknown or write-only attribute.
    ReadNotPermitted,
    /// Well-formed request that makes no sense in the current state.
    WriteNotAllowed,
}

impl AttError {
    /// Bluetooth ATT error code carried in the access response.
    pub const fn att_status(self) -> u8 {
        match self {
            Self::ReadNotPermitted => 0x02,
            Self::WriteNotPermitted => 0x03,
            Self::InsufficientAuthorization => 0x08,
            Self::InvalidLength => 0x0D,
            // First code of the application error range.
            Self::WriteNotAllowed => 0x80,
        }
    }
}

impl fmt::Display for AttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength => write!(f, "invalid attribute value length"),
            Self::InsufficientAuthorization => write!(f, "insufficient authorization"),
            Self::WriteNotPermitted => write!(f, "write not permitted"),
            Self::ReadNotPermitted => write!(f, "read not permitted"),
            Self::WriteNotAllowed => write!(f, "write not allowed in current state"),
        }
    }
}

impl From<AttError> for Error {
    fn from(e: AttError) -> Self {
        Self::Att(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors from [`PersistencePort`](crate::app::ports::PersistencePort) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// `offset + len` falls outside the persistent region.
    OutOfRange,
    /// Nothing has ever been written to the backing store.
    NotFound,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "offset out of range"),
            Self::NotFound => write!(f, "no stored image"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Record slot errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// The slot header is missing (blank flash or foreign data).
    BadMagic,
    /// Header present but the body failed to decode or validate.
    Corrupted,
    /// The record did not fit in its slot.
    Encode,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "no beacon record in slot"),
            Self::Corrupted => write!(f, "beacon record corrupted"),
            Self::Encode => write!(f, "beacon record exceeds slot size"),
        }
    }
}

impl From<RecordError> for Error {
    fn from(e: RecordError) -> Self {
        Self::Record(e)
    }
}

// ---------------------------------------------------------------------------
// Radio errors
// ---------------------------------------------------------------------------

/// Errors raised while fragmenting or submitting advertising data, or
/// while scheduling the next refresh.
///
/// `FragmentOverBudget` and `MalformedStream` indicate an encoder bug;
/// `TimerUnavailable` means no refresh would ever run again.  All three are
/// treated as fatal by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// A single AD structure is larger than the fragment budget.
    FragmentOverBudget,
    /// An AD length byte is zero or runs past the end of the stream.
    MalformedStream,
    /// The radio stack refused the request.
    Rejected,
    /// The refresh timer could not be started.
    TimerUnavailable,
}

impl RadioError {
    /// Whether the broadcast cannot continue, as opposed to a transient
    /// radio condition.
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::FragmentOverBudget | Self::MalformedStream | Self::TimerUnavailable
        )
    }
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FragmentOverBudget => write!(f, "AD structure exceeds fragment budget"),
            Self::MalformedStream => write!(f, "malformed AD stream"),
            Self::Rejected => write!(f, "radio rejected request"),
            Self::TimerUnavailable => write!(f, "refresh timer could not be started"),
        }
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
