//! Advertising payload encoder.
//!
//! Renders the two records the beacon broadcasts:
//!
//! ```text
//! name record:  [03 03 AA FE] [1+n] [08] name[n]
//! data record:  [03 03 AA FE] [3+u+7] [16] [AA FE] uri[u] batt temp_be[2] counter_be[4]
//! ```
//!
//! Both records start with the complete 16-bit service list so either one
//! identifies the beacon on its own.

use crate::error::RadioError;

/// Largest payload the radio accepts in one advertising data store.
pub const AD_PAYLOAD_MAX: usize = 31;

pub const AD_TYPE_SERVICE_LIST: u8 = 0x03;
pub const AD_TYPE_SHORT_NAME: u8 = 0x08;
pub const AD_TYPE_SERVICE_DATA: u8 = 0x16;
/// 16-bit service UUID 0xFEAA, little-endian on air.
pub const SERVICE_UUID: [u8; 2] = [0xAA, 0xFE];

/// One rendered record.
pub type AdRecord = heapless::Vec<u8, AD_PAYLOAD_MAX>;

/// Append-only writer over an [`AdRecord`] that keeps each structure's
/// length byte consistent with its body.
pub struct AdWriter {
    buf: AdRecord,
    /// Position of the length byte of the open structure.
    open: Option<usize>,
}

impl AdWriter {
    pub fn new() -> Self {
        Self {
            buf: AdRecord::new(),
            open: None,
        }
    }

    /// Start a structure of `ad_type`, closing any open one.
    pub fn begin(&mut self, ad_type: u8) -> Result<&mut Self, RadioError> {
        self.end();
        let at = self.buf.len();
        self.push(0)?;
        self.push(ad_type)?;
        self.open = Some(at);
        Ok(self)
    }

    pub fn push(&mut self, byte: u8) -> Result<&mut Self, RadioError> {
        self.buf
            .push(byte)
            .map_err(|_| RadioError::FragmentOverBudget)?;
        self.sync_len();
        Ok(self)
    }

    pub fn extend(&mut self, bytes: &[u8]) -> Result<&mut Self, RadioError> {
        self.buf
            .extend_from_slice(bytes)
            .map_err(|_| RadioError::FragmentOverBudget)?;
        self.sync_len();
        Ok(self)
    }

    fn sync_len(&mut self) {
        if let Some(at) = self.open {
            // type byte + body; bounded by AD_PAYLOAD_MAX
            self.buf[at] = (self.buf.len() - at - 1) as u8;
        }
    }

    fn end(&mut self) {
        self.sync_len();
        self.open = None;
    }

    pub fn finish(mut self) -> AdRecord {
        self.end();
        self.buf
    }
}

impl Default for AdWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Live values appended to the data record on every refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicFields {
    pub battery_percent: u8,
    /// Signed 8.8 fixed-point °C.
    pub temperature: i16,
    pub packet_counter: u32,
}

fn service_list(w: &mut AdWriter) -> Result<(), RadioError> {
    w.begin(AD_TYPE_SERVICE_LIST)?.extend(&SERVICE_UUID)?;
    Ok(())
}

/// Name record, or an empty record when the name is empty.
pub fn encode_name(name: &[u8]) -> Result<AdRecord, RadioError> {
    if name.is_empty() {
        return Ok(AdRecord::new());
    }
    let mut w = AdWriter::new();
    service_list(&mut w)?;
    w.begin(AD_TYPE_SHORT_NAME)?.extend(name)?;
    Ok(w.finish())
}

/// Data record: URI followed by the dynamic fields, most significant
/// byte first.
pub fn encode_data(uri: &[u8], fields: DynamicFields) -> Result<AdRecord, RadioError> {
    let mut w = AdWriter::new();
    service_list(&mut w)?;
    w.begin(AD_TYPE_SERVICE_DATA)?
        .extend(&SERVICE_UUID)?
        .extend(uri)?
        .push(fields.battery_percent)?
        .extend(&fields.temperature.to_be_bytes())?
        .extend(&fields.packet_counter.to_be_bytes())?;
    Ok(w.finish())
}
