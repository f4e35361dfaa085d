//! Inbound commands to the beacon service.
//!
//! These represent requests from the outside world (the GATT server and
//! the BLE link layer) that the
//! [`BeaconService`](super::service::BeaconService) interprets and acts upon.

use crate::beacon::AttributeId;

/// Largest attribute value a command can carry.  Longer writes are refused
/// by the transport with `InvalidLength` before they become commands.
pub const ATT_VALUE_MAX: usize = 32;

/// Attribute value as delivered by the transport.
pub type WriteValue = heapless::Vec<u8, ATT_VALUE_MAX>;

/// Commands that adapters can send into the beacon core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeaconCommand {
    /// Remote read of one attribute.
    Read(AttributeId),

    /// Remote write of one attribute.
    Write { attr: AttributeId, value: WriteValue },

    /// The configuring peer went away: apply the TX power mode, persist and
    /// resume broadcasting.
    Disconnected,

    /// Pairing information changed: persist.
    BondingChanged,
}
