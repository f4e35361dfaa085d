//! Beacon domain core: configuration store, payload encoder, chunker.
//!
//! Nothing in here touches hardware.  Radio and storage access goes through
//! the [`ports`](crate::app::ports) traits so every rule can be exercised on
//! the host.

pub mod attributes;
pub mod chunker;
pub mod encoder;
pub mod record;
pub mod store;

pub use attributes::AttributeId;
pub use record::BeaconRecord;
pub use store::ConfigStore;
