//! Attribute surface of the beacon configuration service.
//!
//! Each attribute carries a static [`Descriptor`] describing its size and
//! access rules.  The GATT adapter maps value handles onto these ids; the
//! [`ConfigStore`](super::store::ConfigStore) enforces the rules.
//!
//! ## Handle layout
//!
//! The service is registered as one attribute table: the service
//! declaration sits at `service_start`, followed by a declaration/value
//! pair per characteristic in [`AttributeId::ALL`] order.
//!
//! | Attribute            | Size      | Read | Write | Lock-gated |
//! |----------------------|-----------|------|-------|------------|
//! | Lock State           | 1         | yes  | no    | -          |
//! | Lock                 | 16        | no   | yes   | yes        |
//! | Unlock               | 16        | no   | yes   | -          |
//! | Name                 | 0..=18    | yes  | yes   | yes        |
//! | URI                  | 0..=11    | yes  | yes   | yes        |
//! | Flags                | 1         | yes  | yes   | yes        |
//! | TX Power Mode        | 1         | yes  | yes   | yes        |
//! | ADV TX Power Table   | 4         | yes  | yes   | yes        |
//! | Radio TX Power Table | 4         | yes  | yes   | yes        |
//! | Period (LE)          | 2         | yes  | yes   | yes        |
//! | Reset                | 1         | no   | yes   | yes        |

use crate::config::{BEACON_DATA_MAX, LOCK_CODE_SIZE, TX_POWER_LEVELS, URI_MAX};

/// Addressable attributes of the configuration service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeId {
    LockState,
    Lock,
    Unlock,
    Name,
    Uri,
    Flags,
    TxPowerMode,
    AdvTxPowerLevels,
    RadioTxPowerLevels,
    Period,
    Reset,
}

/// Value size accepted by an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    /// Writes must be exactly this long.
    Fixed(usize),
    /// Writes may be any length up to and including `max`.
    Variable { max: usize },
}

impl Size {
    pub const fn accepts(self, len: usize) -> bool {
        match self {
            Self::Fixed(n) => len == n,
            Self::Variable { max } => len <= max,
        }
    }

    pub const fn max(self) -> usize {
        match self {
            Self::Fixed(n) | Self::Variable { max: n } => n,
        }
    }
}

/// Static access rules for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub size: Size,
    pub readable: bool,
    pub writable: bool,
    /// Writes are refused while the beacon is locked.
    pub lock_gated: bool,
}

impl AttributeId {
    /// Every attribute, in attribute-table order.
    pub const ALL: [AttributeId; 11] = [
        Self::LockState,
        Self::Lock,
        Self::Unlock,
        Self::Name,
        Self::Uri,
        Self::Flags,
        Self::TxPowerMode,
        Self::AdvTxPowerLevels,
        Self::RadioTxPowerLevels,
        Self::Period,
        Self::Reset,
    ];

    pub const fn descriptor(self) -> Descriptor {
        const fn d(size: Size, readable: bool, writable: bool, lock_gated: bool) -> Descriptor {
            Descriptor {
                size,
                readable,
                writable,
                lock_gated,
            }
        }
        match self {
            Self::LockState => d(Size::Fixed(1), true, false, false),
            Self::Lock => d(Size::Fixed(LOCK_CODE_SIZE), false, true, true),
            Self::Unlock => d(Size::Fixed(LOCK_CODE_SIZE), false, true, false),
            Self::Name => d(Size::Variable { max: BEACON_DATA_MAX }, true, true, true),
            Self::Uri => d(Size::Variable { max: URI_MAX }, true, true, true),
            Self::Flags | Self::TxPowerMode => d(Size::Fixed(1), true, true, true),
            Self::AdvTxPowerLevels | Self::RadioTxPowerLevels => {
                d(Size::Fixed(TX_POWER_LEVELS), true, true, true)
            }
            Self::Period => d(Size::Fixed(2), true, true, true),
            Self::Reset => d(Size::Fixed(1), false, true, true),
        }
    }

    fn index(self) -> u16 {
        Self::ALL.iter().position(|&a| a == self).unwrap_or(0) as u16
    }

    /// Value handle of this attribute given the service declaration handle.
    pub fn handle(self, service_start: u16) -> u16 {
        service_start + 2 + 2 * self.index()
    }

    /// Map a value handle back to an attribute.  Declaration handles and
    /// handles outside the service yield `None`.
    pub fn from_handle(service_start: u16, handle: u16) -> Option<Self> {
        let offset = handle.checked_sub(service_start)?;
        if offset < 2 || offset % 2 != 0 {
            return None;
        }
        Self::ALL.get(usize::from((offset - 2) / 2)).copied()
    }

    /// Number of attribute-table entries the service occupies, including
    /// the service declaration.
    pub const fn table_len() -> usize {
        1 + 2 * Self::ALL.len()
    }
}
