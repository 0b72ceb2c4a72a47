//! bleota Firmware — Main Entry Point
//!
//! Hexagonal architecture with a single-consumer command inbox.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BleOtaAdapter     LogEventSink   NvsAdapter   EspOtaSink      │
//! │  (GATT callbacks)  (EventSink)    (Config)     (UpdateSink)    │
//! │        │                                       EspSystem       │
//! │        ▼                                       (SystemControl) │
//! │     INBOUND ──────────────┐                                    │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                           ▼                                    │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │         ReceiverService (pure logic)                   │    │
//! │  │  decode · admission · UpdateSession                    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use bleota::adapters::ble::BleOtaAdapter;
use bleota::adapters::log_sink::LogEventSink;
use bleota::adapters::nvs::NvsAdapter;
use bleota::adapters::ota_sink::PlatformSink;
use bleota::adapters::system::{PlatformSystem, mark_running_firmware_valid};
use bleota::app::service::ReceiverService;
use bleota::error::Error;
use bleota::protocol::channels::INBOUND;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  bleota v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1b. Keep the running image (cancels pending rollback) ─
    mark_running_firmware_valid();

    // ── 2. NVS bring-up + config ──────────────────────────────
    let nvs = NvsAdapter::new().map_err(Error::from)?;
    let config = nvs.load_or_default();
    match serde_json::to_string(&config) {
        Ok(json) => info!("Config: {}", json),
        Err(e) => warn!("Config: could not render as JSON ({})", e),
    }

    // ── 3. Construct adapters ─────────────────────────────────
    let mut sink = PlatformSink::default();
    let mut system = PlatformSystem::default();
    let mut log_sink = LogEventSink::new();

    let mut ble = BleOtaAdapter::new(&config, &INBOUND);
    ble.start()?;

    // ── 4. Receiver service ───────────────────────────────────
    let poll = Duration::from_millis(u64::from(config.poll_interval_ms));
    let mut service = ReceiverService::new(config);

    info!("System ready. Waiting for firmware on '{}'.", service.config().device_name);

    // ── 5. Event loop ─────────────────────────────────────────
    loop {
        // Rejections are already reported through the log sink.
        INBOUND.drain(|cmd| {
            let _ = service.handle_command(cmd, &mut sink, &mut system, &mut log_sink);
        });
        std::thread::sleep(poll);
    }
}
