//! System control adapters: restart and boot-time image validation.

use log::{info, warn};

use crate::app::ports::SystemControl;

#[cfg(target_os = "espidf")]
pub type PlatformSystem = EspSystem;
#[cfg(not(target_os = "espidf"))]
pub type PlatformSystem = SimSystem;

/// Restarts the SoC through `esp-ota`.
#[cfg(target_os = "espidf")]
#[derive(Default)]
pub struct EspSystem;

#[cfg(target_os = "espidf")]
impl SystemControl for EspSystem {
    fn restart(&mut self) {
        info!("System: restarting");
        esp_ota::restart();
    }
}

/// Records restart requests instead of resetting.
#[derive(Debug, Default)]
pub struct SimSystem {
    restarts: u32,
}

impl SimSystem {
    pub fn restarts(&self) -> u32 {
        self.restarts
    }
}

impl SystemControl for SimSystem {
    fn restart(&mut self) {
        self.restarts += 1;
        warn!("System: restart requested (simulation — no reset)");
    }
}

// ── Boot validation ───────────────────────────────────────────

/// Mark the running firmware as valid.
///
/// Without this, a freshly committed image that booted under rollback
/// protection is reverted by the bootloader on the next reset.
#[cfg(target_os = "espidf")]
pub fn mark_running_firmware_valid() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn mark_running_firmware_valid() {
    info!("OTA rollback check (simulation): skipped");
}
