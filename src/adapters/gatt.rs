//! GATT attribute transport for the beacon configuration service.
//!
//! The Bluedroid GATTS callback runs in the BT task.  It never touches the
//! beacon state: every read or write is packed into a [`GattRequest`],
//! queued on a bounded channel and announced with
//! [`Event::AttRequest`].  The main loop drains the channel through
//! [`GattServer::serve_pending`], turns each request into a
//! [`BeaconCommand`] and answers with the ATT status the service returned.
//!
//! ```text
//!  GATTS cb ──▶ REQUESTS (Channel) ──▶ GattServer::serve ──▶ BeaconService
//!      ▲                                      │
//!      └──────── esp_ble_gatts_send_response ◀┘
//! ```
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: attribute table via
//!   `esp_ble_gatts_create_attr_tab`, responses by the application.
//! - **all other targets**: responses are recorded for inspection.
//!
//! ## GATT Service Layout
//!
//! | Characteristic       | UUID                        | Perms       |
//! |----------------------|-----------------------------|-------------|
//! | Service              | `ee0c2080-…-99b91ac981d8`   | -           |
//! | attribute *n*        | `ee0c2080 + 1 + n`          | per [`Descriptor`](crate::beacon::attributes::Descriptor) |

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use crate::app::commands::{BeaconCommand, WriteValue};
use crate::app::events::BeaconEvent;
use crate::app::ports::{EventSink, PersistencePort, RadioPort, SensorPort, TimerPort};
use crate::app::service::BeaconService;
use crate::beacon::store::AttrValue;
use crate::beacon::AttributeId;
use crate::error::AttError;
use crate::events::{push_event, Event};

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0xee0c2080_8786_40ba_ab96_99b91ac981d8;

/// Requests the BT task may queue before the main loop catches up.
pub const REQUEST_QUEUE_DEPTH: usize = 4;

/// UUID of the characteristic carrying `attr`.
pub fn characteristic_uuid(attr: AttributeId) -> u128 {
    let index = AttributeId::ALL.iter().position(|&a| a == attr).unwrap_or(0) as u128;
    SERVICE_UUID + ((index + 1) << 96)
}

// ───────────────────────────────────────────────────────────────
// Requests
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattOp {
    Read,
    Write,
}

/// One attribute access as captured in the BT task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattRequest {
    pub conn_id: u16,
    pub trans_id: u32,
    pub handle: u16,
    pub op: GattOp,
    pub value: WriteValue,
    /// The peer sent more than [`ATT_VALUE_MAX`](crate::app::commands::ATT_VALUE_MAX) bytes or used a prepared
    /// (long) write.  Answered with `InvalidLength`.
    pub oversized: bool,
    pub need_rsp: bool,
}

impl GattRequest {
    pub fn read(conn_id: u16, trans_id: u32, handle: u16) -> Self {
        Self {
            conn_id,
            trans_id,
            handle,
            op: GattOp::Read,
            value: WriteValue::new(),
            oversized: false,
            need_rsp: true,
        }
    }

    pub fn write(conn_id: u16, trans_id: u32, handle: u16, data: &[u8]) -> Self {
        let mut value = WriteValue::new();
        let oversized = value.extend_from_slice(data).is_err();
        if oversized {
            value.clear();
        }
        Self {
            conn_id,
            trans_id,
            handle,
            op: GattOp::Write,
            value,
            oversized,
            need_rsp: true,
        }
    }
}

static REQUESTS: Channel<CriticalSectionRawMutex, GattRequest, REQUEST_QUEUE_DEPTH> =
    Channel::new();

/// Queue a request from the BT task and wake the main loop.
/// Returns `false` if the channel is full; the request is dropped and the
/// peer's ATT transaction times out.
pub fn submit(request: GattRequest) -> bool {
    if REQUESTS.try_send(request).is_err() {
        warn!("GATT: request queue full, dropping");
        return false;
    }
    push_event(Event::AttRequest);
    true
}

/// Take the oldest queued request.
pub fn take_request() -> Option<GattRequest> {
    REQUESTS.try_receive().ok()
}

// ───────────────────────────────────────────────────────────────
// Server (main-loop side)
// ───────────────────────────────────────────────────────────────

/// A response as the sim backend recorded it.
#[cfg(not(target_os = "espidf"))]
pub type RecordedResponse = (GattRequest, Result<AttrValue, AttError>);

pub struct GattServer {
    #[cfg(not(target_os = "espidf"))]
    service_start: u16,
    #[cfg(not(target_os = "espidf"))]
    responses: Vec<RecordedResponse>,
}

impl GattServer {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        Self {}
    }

    /// Simulation server whose attribute table starts at `service_start`.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(service_start: u16) -> Self {
        Self {
            service_start,
            responses: Vec::new(),
        }
    }

    /// Handle of the service declaration, once the table is registered.
    #[cfg(target_os = "espidf")]
    pub fn service_start(&self) -> Option<u16> {
        match esp::SERVICE_START.load(core::sync::atomic::Ordering::Acquire) {
            0 => None,
            h => Some(h),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn service_start(&self) -> Option<u16> {
        Some(self.service_start)
    }

    /// Responses sent so far, oldest first.
    #[cfg(not(target_os = "espidf"))]
    pub fn responses(&self) -> &[RecordedResponse] {
        &self.responses
    }

    /// Map a request onto a command.  Handles outside the service are
    /// refused with the read/write "not permitted" status.
    pub fn decode(&self, request: &GattRequest) -> Result<BeaconCommand, AttError> {
        let not_permitted = match request.op {
            GattOp::Read => AttError::ReadNotPermitted,
            GattOp::Write => AttError::WriteNotPermitted,
        };
        let start = self.service_start().ok_or(not_permitted)?;
        let attr = AttributeId::from_handle(start, request.handle).ok_or(not_permitted)?;
        match request.op {
            GattOp::Read => Ok(BeaconCommand::Read(attr)),
            GattOp::Write if request.oversized => Err(AttError::InvalidLength),
            GattOp::Write => Ok(BeaconCommand::Write {
                attr,
                value: request.value.clone(),
            }),
        }
    }

    /// Serve one request against the service and answer the peer.
    pub fn serve(
        &mut self,
        request: GattRequest,
        service: &mut BeaconService,
        hw: &mut (impl RadioPort + TimerPort + SensorPort),
        nvm: &mut impl PersistencePort,
        sink: &mut impl EventSink,
    ) {
        let result = match self.decode(&request) {
            Ok(cmd) => service.handle_command(cmd, hw, nvm, sink),
            Err(error) => {
                if let Some(attr) = self.attribute_of(&request) {
                    sink.emit(&BeaconEvent::AccessRejected { attr, error });
                }
                Err(error)
            }
        };
        debug!(
            "GATT: {:?} handle {} -> {:?}",
            request.op, request.handle, result
        );
        self.respond(request, result);
    }

    /// Drain every queued request.  Returns how many were served.
    pub fn serve_pending(
        &mut self,
        service: &mut BeaconService,
        hw: &mut (impl RadioPort + TimerPort + SensorPort),
        nvm: &mut impl PersistencePort,
        sink: &mut impl EventSink,
    ) -> usize {
        let mut served = 0;
        while let Some(request) = take_request() {
            self.serve(request, service, hw, nvm, sink);
            served += 1;
        }
        served
    }

    fn attribute_of(&self, request: &GattRequest) -> Option<AttributeId> {
        AttributeId::from_handle(self.service_start()?, request.handle)
    }

    #[cfg(target_os = "espidf")]
    fn respond(&mut self, request: GattRequest, result: Result<AttrValue, AttError>) {
        if request.need_rsp {
            esp::send_response(&request, &result);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn respond(&mut self, request: GattRequest, result: Result<AttrValue, AttError>) {
        if request.need_rsp {
            self.responses.push((request, result));
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Bluedroid GATTS glue
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use core::sync::atomic::{AtomicU16, Ordering};

    use esp_idf_svc::sys::*;
    use log::{error, info, warn};

    use super::{characteristic_uuid, submit, GattRequest, SERVICE_UUID};
    use crate::beacon::store::AttrValue;
    use crate::beacon::AttributeId;
    use crate::error::AttError;
    use crate::events::{push_event, Event};

    pub(super) static SERVICE_START: AtomicU16 = AtomicU16::new(0);
    static GATTS_IF: AtomicU16 = AtomicU16::new(ESP_GATT_IF_NONE as u16);

    static UUID_PRIMARY_SERVICE: u16 = ESP_GATT_UUID_PRI_SERVICE as u16;
    static UUID_CHAR_DECLARE: u16 = ESP_GATT_UUID_CHAR_DECLARE as u16;
    static PROP_READ: u8 = ESP_GATT_CHAR_PROP_BIT_READ as u8;
    static PROP_WRITE: u8 = ESP_GATT_CHAR_PROP_BIT_WRITE as u8;
    static PROP_READ_WRITE: u8 = (ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_WRITE) as u8;

    /// Register GAP/GATTS callbacks and the application.  The attribute
    /// table is created once the application registration completes.
    pub fn register() -> Result<(), AttError> {
        // SAFETY: called once from main() after the Bluedroid stack is up.
        unsafe {
            if esp_ble_gap_register_callback(Some(gap_event_handler)) != ESP_OK
                || esp_ble_gatts_register_callback(Some(gatts_event_handler)) != ESP_OK
                || esp_ble_gatts_app_register(0) != ESP_OK
            {
                error!("GATT: callback registration failed");
                return Err(AttError::WriteNotAllowed);
            }
        }
        info!("GATT: callbacks registered");
        Ok(())
    }

    fn entry(
        uuid_len: u16,
        uuid: *const u8,
        perm: u32,
        max: usize,
        len: usize,
        value: *const u8,
        auto_rsp: bool,
    ) -> esp_gatts_attr_db_t {
        let auto_rsp = if auto_rsp {
            ESP_GATT_AUTO_RSP
        } else {
            ESP_GATT_RSP_BY_APP
        };
        esp_gatts_attr_db_t {
            attr_control: esp_attr_control_t {
                auto_rsp: auto_rsp as u8,
            },
            att_desc: esp_attr_desc_t {
                uuid_length: uuid_len,
                uuid_p: uuid as *mut u8,
                perm: perm as u16,
                max_length: max as u16,
                length: len as u16,
                value: value as *mut u8,
            },
        }
    }

    /// Build the attribute table.  Leaked: it must outlive the stack.
    fn attribute_table() -> &'static [esp_gatts_attr_db_t] {
        let uuids: &'static mut [[u8; 16]] = Vec::leak(
            core::iter::once(SERVICE_UUID)
                .chain(AttributeId::ALL.iter().map(|&a| characteristic_uuid(a)))
                .map(u128::to_le_bytes)
                .collect(),
        );
        let mut table = Vec::with_capacity(AttributeId::table_len());
        table.push(entry(
            ESP_UUID_LEN_16 as u16,
            &UUID_PRIMARY_SERVICE as *const u16 as *const u8,
            ESP_GATT_PERM_READ,
            16,
            16,
            uuids[0].as_ptr(),
            true,
        ));
        for (i, attr) in AttributeId::ALL.iter().enumerate() {
            let d = attr.descriptor();
            let (prop, perm): (&'static u8, u32) = match (d.readable, d.writable) {
                (true, true) => (&PROP_READ_WRITE, ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE),
                (true, false) => (&PROP_READ, ESP_GATT_PERM_READ),
                _ => (&PROP_WRITE, ESP_GATT_PERM_WRITE),
            };
            table.push(entry(
                ESP_UUID_LEN_16 as u16,
                &UUID_CHAR_DECLARE as *const u16 as *const u8,
                ESP_GATT_PERM_READ,
                1,
                1,
                prop,
                true,
            ));
            table.push(entry(
                ESP_UUID_LEN_128 as u16,
                uuids[i + 1].as_ptr(),
                perm,
                d.size.max(),
                0,
                core::ptr::null(),
                false,
            ));
        }
        Vec::leak(table)
    }

    unsafe extern "C" fn gap_event_handler(
        event: esp_gap_ble_cb_event_t,
        param: *mut esp_ble_gap_cb_param_t,
    ) {
        match event {
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_SEC_REQ_EVT => unsafe {
                esp_ble_gap_security_rsp((*param).ble_security.ble_req.bd_addr.as_mut_ptr(), true);
            },
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_AUTH_CMPL_EVT => {
                let p = unsafe { &(*param).ble_security.auth_cmpl };
                if p.success {
                    info!("GATT: bonding complete");
                    push_event(Event::BondingChanged);
                } else {
                    warn!("GATT: authentication failed (reason={})", p.fail_reason);
                }
            }
            _ => {}
        }
    }

    unsafe extern "C" fn gatts_event_handler(
        event: esp_gatts_cb_event_t,
        gatts_if: esp_gatt_if_t,
        param: *mut esp_ble_gatts_cb_param_t,
    ) {
        match event {
            esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
                GATTS_IF.store(u16::from(gatts_if), Ordering::Release);
                let table = attribute_table();
                // SAFETY: the table is 'static; Bluedroid copies descriptors.
                let ret = unsafe {
                    esp_ble_gatts_create_attr_tab(table.as_ptr(), gatts_if, table.len() as u8, 0)
                };
                if ret != ESP_OK {
                    error!("GATT: create_attr_tab failed ({})", ret);
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_CREAT_ATTR_TAB_EVT => {
                let p = unsafe { &(*param).add_attr_tab };
                if p.status != esp_gatt_status_t_ESP_GATT_OK || p.num_handle == 0 {
                    error!("GATT: attribute table rejected (status={})", p.status);
                    return;
                }
                let start = unsafe { *p.handles };
                SERVICE_START.store(start, Ordering::Release);
                unsafe {
                    esp_ble_gatts_start_service(start);
                }
                info!("GATT: service started (handles {}..{})", start, start + p.num_handle - 1);
            }
            esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
                let p = unsafe { &(*param).connect };
                info!("GATT: peer connected (conn_id={})", p.conn_id);
            }
            esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
                info!("GATT: peer disconnected");
                push_event(Event::PeerDisconnected);
            }
            esp_gatts_cb_event_t_ESP_GATTS_READ_EVT => {
                let p = unsafe { &(*param).read };
                let mut req = GattRequest::read(p.conn_id, p.trans_id, p.handle);
                req.need_rsp = p.need_rsp;
                submit(req);
            }
            esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
                let p = unsafe { &(*param).write };
                let data = unsafe { core::slice::from_raw_parts(p.value, usize::from(p.len)) };
                let mut req = GattRequest::write(p.conn_id, p.trans_id, p.handle, data);
                req.oversized |= p.is_prep;
                req.need_rsp = p.need_rsp;
                submit(req);
            }
            _ => {}
        }
    }

    pub(super) fn send_response(request: &GattRequest, result: &Result<AttrValue, AttError>) {
        let gatts_if = GATTS_IF.load(Ordering::Acquire) as esp_gatt_if_t;
        // SAFETY: `rsp` is a plain C union, zero is a valid bit pattern and
        // Bluedroid copies it before returning.
        unsafe {
            let mut rsp: esp_gatt_rsp_t = core::mem::zeroed();
            let status = match result {
                Ok(value) => {
                    rsp.attr_value.handle = request.handle;
                    rsp.attr_value.len = value.len() as u16;
                    rsp.attr_value.value[..value.len()].copy_from_slice(value);
                    esp_gatt_status_t_ESP_GATT_OK
                }
                Err(e) => esp_gatt_status_t::from(e.att_status()),
            };
            let ret = esp_ble_gatts_send_response(
                gatts_if,
                request.conn_id,
                request.trans_id,
                status,
                &mut rsp,
            );
            if ret != ESP_OK {
                warn!("GATT: send_response failed ({})", ret);
            }
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::register;
