//! BLE OTA transport adapter.
//!
//! Serves one primary service with a single READ | WRITE characteristic.
//! Every complete write is copied into the receiver [`Inbox`] and handled
//! later by the main loop; GATT callbacks never touch the session.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid BLE GATT server via `esp_idf_svc::sys`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## GATT Service Layout
//!
//! | Attribute       | UUID (default) | Perms      | Behaviour                      |
//! |-----------------|----------------|------------|--------------------------------|
//! | OTA service     | `0xFFF0`       | —          | primary                        |
//! | OTA data        | `0xFFF1`       | Read+Write | write: INIT/CHUNK/END message  |
//! |                 |                |            | read: static diagnostic string |
//!
//! Long writes (prepare + execute) are reassembled into one message
//! before they are queued.

use core::fmt;
use log::{info, warn};

use crate::config::{MAX_DEVICE_NAME_LEN, MAX_DIAGNOSTIC_LEN, ReceiverConfig};
use crate::protocol::channels::{INBOUND_DEPTH, Inbox, SubmitError};
use crate::protocol::codec::MAX_MESSAGE_LEN;

use crate::app::commands::ConnId;
use crate::error::Error;

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Why a characteristic access was refused. Maps onto ATT error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// Zero-length or oversized write.
    InvalidLength,
    /// Prepared-write or read offset out of sequence.
    InvalidOffset,
    /// Receiver inbox is full.
    Busy,
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength => write!(f, "invalid attribute length"),
            Self::InvalidOffset => write!(f, "invalid offset"),
            Self::Busy => write!(f, "receiver busy"),
        }
    }
}

impl From<SubmitError> for AccessError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Empty | SubmitError::TooLong(_) => Self::InvalidLength,
            SubmitError::QueueFull => Self::Busy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleState {
    Idle,
    Advertising,
    Connected,
    Failed,
}

// ───────────────────────────────────────────────────────────────
// GATT endpoint (platform-independent access handling)
// ───────────────────────────────────────────────────────────────

/// Long writes kept apart at once, one per connection.
const MAX_LONG_WRITES: usize = 3;

type LongWrite = (ConnId, heapless::Vec<u8, MAX_MESSAGE_LEN>);

/// Handles characteristic accesses for the OTA characteristic.
pub struct GattEndpoint {
    inbox: &'static Inbox<INBOUND_DEPTH>,
    max_message_len: usize,
    diagnostic: heapless::Vec<u8, MAX_DIAGNOSTIC_LEN>,
    /// In-progress long writes, oldest first.
    long_writes: heapless::Vec<LongWrite, MAX_LONG_WRITES>,
}

impl GattEndpoint {
    pub fn new(config: &ReceiverConfig, inbox: &'static Inbox<INBOUND_DEPTH>) -> Self {
        let mut diagnostic = heapless::Vec::new();
        let _ = diagnostic.extend_from_slice(config.diagnostic_payload.as_bytes());
        Self {
            inbox,
            max_message_len: config.max_message_len().min(MAX_MESSAGE_LEN),
            diagnostic,
            long_writes: heapless::Vec::new(),
        }
    }

    /// A single write carrying one complete message.
    pub fn write(&mut self, conn_id: ConnId, data: &[u8]) -> Result<(), AccessError> {
        if data.is_empty() || data.len() > self.max_message_len {
            warn!(
                "BLE: conn={} write of {} bytes refused (limit {})",
                conn_id,
                data.len(),
                self.max_message_len
            );
            return Err(AccessError::InvalidLength);
        }
        self.inbox.submit_write(conn_id, data).map_err(|e| {
            warn!("BLE: conn={} write dropped: {}", conn_id, e);
            AccessError::from(e)
        })
    }

    /// One fragment of a long write. Fragments must arrive contiguously.
    ///
    /// Each connection reassembles into its own buffer. When every buffer
    /// is taken, the oldest long write is dropped to make room.
    pub fn prepare_write(
        &mut self,
        conn_id: ConnId,
        offset: u16,
        data: &[u8],
    ) -> Result<(), AccessError> {
        let idx = match self.long_write_slot(conn_id) {
            Some(idx) => {
                if offset == 0 {
                    self.long_writes[idx].1.clear();
                }
                idx
            }
            None if offset != 0 => {
                warn!(
                    "BLE: conn={} prepared write at offset {} with nothing pending",
                    conn_id, offset
                );
                return Err(AccessError::InvalidOffset);
            }
            None => {
                if self.long_writes.is_full() {
                    let (evicted, buf) = self.long_writes.remove(0);
                    warn!(
                        "BLE: conn={} long write dropped after {} bytes (buffer taken by conn={})",
                        evicted,
                        buf.len(),
                        conn_id
                    );
                }
                if self.long_writes.push((conn_id, heapless::Vec::new())).is_err() {
                    return Err(AccessError::Busy);
                }
                self.long_writes.len() - 1
            }
        };

        let max_len = self.max_message_len;
        let buf = &mut self.long_writes[idx].1;
        if usize::from(offset) != buf.len() {
            warn!(
                "BLE: conn={} prepared write at offset {} (expected {})",
                conn_id,
                offset,
                buf.len()
            );
            return Err(AccessError::InvalidOffset);
        }
        if buf.len() + data.len() > max_len || buf.extend_from_slice(data).is_err() {
            return Err(AccessError::InvalidLength);
        }
        Ok(())
    }

    /// Execute (`commit == true`) or cancel the pending long write of `conn_id`.
    pub fn execute_write(&mut self, conn_id: ConnId, commit: bool) -> Result<(), AccessError> {
        let Some(idx) = self.long_write_slot(conn_id) else {
            return if commit {
                Err(AccessError::InvalidLength)
            } else {
                Ok(())
            };
        };
        let (_, pending) = self.long_writes.remove(idx);
        if commit {
            self.write(conn_id, &pending)
        } else {
            Ok(())
        }
    }

    /// Read access: the diagnostic payload from `offset`.
    pub fn read(&self, offset: u16) -> Result<&[u8], AccessError> {
        self.diagnostic
            .get(usize::from(offset)..)
            .ok_or(AccessError::InvalidOffset)
    }

    /// Drop any long write from `conn_id` and tell the receiver.
    pub fn disconnect(&mut self, conn_id: ConnId) {
        self.long_writes.retain(|(owner, _)| *owner != conn_id);
        if !self.inbox.submit_disconnect(conn_id) {
            warn!("BLE: conn={} disconnect lost (inbox and parking full)", conn_id);
        }
    }

    fn long_write_slot(&self, conn_id: ConnId) -> Option<usize> {
        self.long_writes.iter().position(|(owner, _)| *owner == conn_id)
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF Bluedroid glue
// ───────────────────────────────────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures. These statics bridge the callback context to the endpoint.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
static BLE_SERVICE_UUID: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_UUID: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_OTA_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);

// GATTS callbacks run in the Bluedroid task (not ISR), so std Mutex is safe.
#[cfg(target_os = "espidf")]
static BLE_ENDPOINT: std::sync::Mutex<Option<GattEndpoint>> = std::sync::Mutex::new(None);

#[cfg(target_os = "espidf")]
fn with_endpoint<T>(f: impl FnOnce(&mut GattEndpoint) -> T) -> Option<T> {
    BLE_ENDPOINT
        .lock()
        .ok()
        .and_then(|mut ep| ep.as_mut().map(f))
}

#[cfg(target_os = "espidf")]
fn uuid16_to_esp(uuid: u16) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = esp_idf_svc::sys::ESP_UUID_LEN_16 as u16;
    t.uuid.uuid16 = uuid;
    t
}

#[cfg(target_os = "espidf")]
fn gatt_status(result: Result<(), AccessError>) -> esp_idf_svc::sys::esp_gatt_status_t {
    use esp_idf_svc::sys::*;
    match result {
        Ok(()) => esp_gatt_status_t_ESP_GATT_OK,
        Err(AccessError::InvalidLength) => esp_gatt_status_t_ESP_GATT_INVALID_ATTR_LEN,
        Err(AccessError::InvalidOffset) => esp_gatt_status_t_ESP_GATT_INVALID_OFFSET,
        Err(AccessError::Busy) => esp_gatt_status_t_ESP_GATT_BUSY,
    }
}

#[cfg(target_os = "espidf")]
fn adv_params() -> esp_idf_svc::sys::esp_ble_adv_params_t {
    use esp_idf_svc::sys::*;
    esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..unsafe { core::mem::zeroed() }
    }
}

/// Answer a GATT request, optionally carrying an attribute value.
#[cfg(target_os = "espidf")]
unsafe fn send_response(
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    conn_id: u16,
    trans_id: u32,
    status: esp_idf_svc::sys::esp_gatt_status_t,
    value: Option<(u16, u16, &[u8])>,
) {
    use esp_idf_svc::sys::*;
    let mut rsp: esp_gatt_rsp_t = unsafe { core::mem::zeroed() };
    if let Some((handle, offset, data)) = value {
        let attr = unsafe { &mut rsp.attr_value };
        let len = data.len().min(attr.value.len());
        attr.handle = handle;
        attr.offset = offset;
        attr.len = len as u16;
        attr.value[..len].copy_from_slice(&data[..len]);
    }
    unsafe {
        esp_ble_gatts_send_response(gatts_if, conn_id, trans_id, status, &mut rsp);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_DATA_SET_COMPLETE_EVT => {
            let mut params = adv_params();
            unsafe {
                esp_ble_gap_start_advertising(&mut params);
            }
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            let status = unsafe { (*param).adv_start_cmpl.status };
            if status == esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
                log::info!("BLE GAP: advertising started");
            } else {
                log::warn!("BLE GAP: advertising start failed ({})", status);
            }
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let uuid = BLE_SERVICE_UUID.load(AtomicOrdering::Relaxed) as u16;
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: uuid16_to_esp(uuid),
                    inst_id: 0,
                },
                is_primary: true,
            };
            // Service declaration + characteristic declaration + value.
            unsafe {
                esp_ble_gatts_create_service(gatts_if, &mut svc_id, 4);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let svc_handle = unsafe { (*param).create.service_handle };
            BLE_SVC_HANDLE.store(u32::from(svc_handle), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: service created (handle={})", svc_handle);
            let mut char_uuid = uuid16_to_esp(BLE_CHAR_UUID.load(AtomicOrdering::Relaxed) as u16);
            unsafe {
                esp_ble_gatts_start_service(svc_handle);
                esp_ble_gatts_add_char(
                    svc_handle,
                    &mut char_uuid,
                    (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                    (ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_WRITE)
                        as esp_gatt_char_prop_t,
                    core::ptr::null_mut(),
                    core::ptr::null_mut(),
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let handle = unsafe { (*param).add_char.attr_handle };
            BLE_OTA_CHAR_HANDLE.store(u32::from(handle), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: OTA char registered (handle={})", handle);
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let conn_id = unsafe { (*param).connect.conn_id };
            log::info!("BLE GATTS: client connected (conn_id={})", conn_id);
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            let conn_id = unsafe { (*param).disconnect.conn_id };
            log::info!("BLE GATTS: client disconnected (conn_id={})", conn_id);
            with_endpoint(|ep| ep.disconnect(conn_id));
            // Restart advertising after disconnect.
            let mut params = adv_params();
            unsafe {
                esp_ble_gap_start_advertising(&mut params);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            if u32::from(p.handle) != BLE_OTA_CHAR_HANDLE.load(AtomicOrdering::Relaxed) {
                if p.need_rsp {
                    unsafe {
                        send_response(gatts_if, p.conn_id, p.trans_id, esp_gatt_status_t_ESP_GATT_OK, None);
                    }
                }
                return;
            }
            let data: &[u8] = if p.value.is_null() || p.len == 0 {
                &[]
            } else {
                unsafe { core::slice::from_raw_parts(p.value, usize::from(p.len)) }
            };

            if p.is_prep {
                let result = with_endpoint(|ep| ep.prepare_write(p.conn_id, p.offset, data))
                    .unwrap_or(Err(AccessError::Busy));
                // Prepare-write responses echo the fragment back.
                let echo = result.is_ok().then_some((p.handle, p.offset, data));
                unsafe {
                    send_response(gatts_if, p.conn_id, p.trans_id, gatt_status(result), echo);
                }
            } else {
                let result = with_endpoint(|ep| ep.write(p.conn_id, data))
                    .unwrap_or(Err(AccessError::Busy));
                if p.need_rsp {
                    unsafe {
                        send_response(gatts_if, p.conn_id, p.trans_id, gatt_status(result), None);
                    }
                }
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_EXEC_WRITE_EVT => {
            let p = unsafe { &(*param).exec_write };
            let commit = i32::from(p.exec_write_flag) == ESP_GATT_PREP_WRITE_EXEC as i32;
            let result = with_endpoint(|ep| ep.execute_write(p.conn_id, commit))
                .unwrap_or(Err(AccessError::Busy));
            unsafe {
                send_response(gatts_if, p.conn_id, p.trans_id, gatt_status(result), None);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_READ_EVT => {
            let p = unsafe { &(*param).read };
            if !p.need_rsp {
                return;
            }
            let mut value: heapless::Vec<u8, MAX_DIAGNOSTIC_LEN> = heapless::Vec::new();
            let result = with_endpoint(|ep| {
                ep.read(p.offset).map(|bytes| {
                    let _ = value.extend_from_slice(bytes);
                })
            })
            .unwrap_or(Err(AccessError::Busy));
            let status = gatt_status(result);
            unsafe {
                send_response(
                    gatts_if,
                    p.conn_id,
                    p.trans_id,
                    status,
                    Some((p.handle, p.offset, &value)),
                );
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

pub struct BleOtaAdapter {
    state: BleState,
    device_name: heapless::String<MAX_DEVICE_NAME_LEN>,
    service_uuid: u16,
    characteristic_uuid: u16,
    /// Host builds keep the endpoint here; on ESP-IDF it moves into
    /// the callback bridge on start.
    endpoint: Option<GattEndpoint>,
}

impl BleOtaAdapter {
    pub fn new(config: &ReceiverConfig, inbox: &'static Inbox<INBOUND_DEPTH>) -> Self {
        Self {
            state: BleState::Idle,
            device_name: config.device_name.clone(),
            service_uuid: config.service_uuid,
            characteristic_uuid: config.characteristic_uuid,
            endpoint: Some(GattEndpoint::new(config, inbox)),
        }
    }

    pub fn state(&self) -> BleState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, BleState::Advertising | BleState::Connected)
    }

    /// Bring up the stack and start advertising.
    pub fn start(&mut self) -> Result<(), Error> {
        info!(
            "BLE: starting OTA service {:04X}/{:04X} as '{}'",
            self.service_uuid, self.characteristic_uuid, self.device_name
        );
        if self.platform_start() {
            self.state = BleState::Advertising;
            Ok(())
        } else {
            self.state = BleState::Failed;
            Err(Error::Init("BLE stack bring-up failed"))
        }
    }

    pub fn stop(&mut self) {
        self.platform_stop();
        self.state = BleState::Idle;
        info!("BLE: stopped");
    }

    // ── Simulation entry points ───────────────────────────────

    pub fn on_central_connected(&mut self, conn_id: ConnId) {
        info!("BLE: central connected (conn_id={})", conn_id);
        self.state = BleState::Connected;
    }

    pub fn on_central_disconnected(&mut self, conn_id: ConnId) {
        info!("BLE: central disconnected (conn_id={})", conn_id);
        if let Some(ep) = self.endpoint.as_mut() {
            ep.disconnect(conn_id);
        }
        if self.state != BleState::Idle {
            self.state = BleState::Advertising;
        }
    }

    pub fn on_characteristic_write(
        &mut self,
        conn_id: ConnId,
        data: &[u8],
    ) -> Result<(), AccessError> {
        self.endpoint
            .as_mut()
            .map_or(Err(AccessError::Busy), |ep| ep.write(conn_id, data))
    }

    pub fn on_prepare_write(
        &mut self,
        conn_id: ConnId,
        offset: u16,
        data: &[u8],
    ) -> Result<(), AccessError> {
        self.endpoint
            .as_mut()
            .map_or(Err(AccessError::Busy), |ep| {
                ep.prepare_write(conn_id, offset, data)
            })
    }

    pub fn on_execute_write(&mut self, conn_id: ConnId, commit: bool) -> Result<(), AccessError> {
        self.endpoint
            .as_mut()
            .map_or(Err(AccessError::Busy), |ep| ep.execute_write(conn_id, commit))
    }

    pub fn on_characteristic_read(&self, offset: u16) -> Result<&[u8], AccessError> {
        self.endpoint
            .as_ref()
            .map_or(Err(AccessError::Busy), |ep| ep.read(offset))
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> bool {
        use esp_idf_svc::sys::*;

        BLE_SERVICE_UUID.store(u32::from(self.service_uuid), AtomicOrdering::Relaxed);
        BLE_CHAR_UUID.store(u32::from(self.characteristic_uuid), AtomicOrdering::Relaxed);
        if let (Some(ep), Ok(mut slot)) = (self.endpoint.take(), BLE_ENDPOINT.lock()) {
            *slot = Some(ep);
        }

        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            let ret = esp_bt_controller_init(&mut bt_cfg);
            if ret != ESP_OK {
                log::error!("BLE: bt_controller_init failed ({})", ret);
                return false;
            }

            let ret = esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE);
            if ret != ESP_OK {
                log::error!("BLE: bt_controller_enable failed ({})", ret);
                return false;
            }

            let ret = esp_bluedroid_init();
            if ret != ESP_OK {
                log::error!("BLE: bluedroid_init failed ({})", ret);
                return false;
            }

            let ret = esp_bluedroid_enable();
            if ret != ESP_OK {
                log::error!("BLE: bluedroid_enable failed ({})", ret);
                return false;
            }

            esp_ble_gap_register_callback(Some(ble_gap_event_handler));
            esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));
            esp_ble_gatts_app_register(0);

            // Set device name for advertising (NUL-terminated copy).
            let mut name: heapless::Vec<u8, { MAX_DEVICE_NAME_LEN + 1 }> = heapless::Vec::new();
            let _ = name.extend_from_slice(self.device_name.as_bytes());
            let _ = name.push(0);
            esp_ble_gap_set_device_name(name.as_ptr() as *const _);

            // 16-bit UUID in its 128-bit Bluetooth base form, little-endian.
            let mut service_uuid128: [u8; 16] = [
                0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00,
            ];
            service_uuid128[12..14].copy_from_slice(&self.service_uuid.to_le_bytes());

            let mut adv_data: esp_ble_adv_data_t = core::mem::zeroed();
            adv_data.set_scan_rsp = false;
            adv_data.include_name = true;
            adv_data.include_txpower = true;
            adv_data.service_uuid_len = service_uuid128.len() as u16;
            adv_data.p_service_uuid = service_uuid128.as_mut_ptr();
            adv_data.flag = (ESP_BLE_ADV_FLAG_GEN_DISC | ESP_BLE_ADV_FLAG_BREDR_NOT_SPT) as u8;
            // Advertising starts from the GAP handler once the data is set.
            let ret = esp_ble_gap_config_adv_data(&mut adv_data);
            if ret != ESP_OK {
                log::error!("BLE: config_adv_data failed ({})", ret);
                return false;
            }
        }

        info!(
            "BLE(espidf): Bluedroid stack initialized, advertising as '{}'",
            self.device_name
        );
        true
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> bool {
        info!(
            "BLE(sim): advertising '{}' (service {:04X})",
            self.device_name, self.service_uuid
        );
        true
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) {
        use esp_idf_svc::sys::*;
        unsafe {
            esp_ble_gap_stop_advertising();
            esp_bluedroid_disable();
            esp_bluedroid_deinit();
            esp_bt_controller_disable();
            esp_bt_controller_deinit();
        }
        if let Ok(mut slot) = BLE_ENDPOINT.lock() {
            self.endpoint = slot.take();
        }
        info!("BLE(espidf): stack shut down");
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) {
        info!("BLE(sim): stopped");
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
