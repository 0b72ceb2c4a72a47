//! Update sink adapters.
//!
//! | Sink              | Target      | Backing store                      |
//! |-------------------|-------------|------------------------------------|
//! | `EspOtaSink`      | ESP-IDF     | `esp-ota` partition API            |
//! | `MemoryFlashSink` | host / sim  | two in-memory OTA slots            |
//!
//! [`PlatformSink`] names the one `main` uses on the current target.

use log::{info, warn};

use crate::app::ports::UpdateSink;
use crate::error::SinkError;

#[cfg(target_os = "espidf")]
pub type PlatformSink = EspOtaSink;
#[cfg(not(target_os = "espidf"))]
pub type PlatformSink = MemoryFlashSink;

// ── ESP-IDF (esp-ota) ─────────────────────────────────────────

/// Writes the image into the next OTA partition via the `esp-ota` crate.
///
/// `esp-ota` selects the partition on begin and erases as it writes, so
/// the size hint is only logged.
#[cfg(target_os = "espidf")]
pub struct EspOtaSink;

#[cfg(target_os = "espidf")]
impl EspOtaSink {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "espidf")]
impl Default for EspOtaSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl UpdateSink for EspOtaSink {
    type Transaction = esp_ota::OtaUpdate;
    type Image = esp_ota::CompletedOtaUpdate;

    fn begin(&mut self, size_hint: u32) -> Result<Self::Transaction, SinkError> {
        let update = esp_ota::OtaUpdate::begin().map_err(|e| {
            warn!("esp-ota begin failed: {:?}", e);
            SinkError::NoPartition
        })?;
        info!("EspOtaSink: partition opened (hint {} bytes)", size_hint);
        Ok(update)
    }

    fn write(&mut self, tx: &mut Self::Transaction, data: &[u8]) -> Result<(), SinkError> {
        tx.write(data).map_err(|e| {
            warn!("esp-ota write failed: {:?}", e);
            SinkError::WriteFailed
        })
    }

    fn finalize(&mut self, tx: Self::Transaction) -> Result<Self::Image, SinkError> {
        tx.finalize().map_err(|e| {
            warn!("esp-ota finalize failed: {:?}", e);
            SinkError::ImageInvalid
        })
    }

    fn commit(&mut self, image: &mut Self::Image) -> Result<(), SinkError> {
        image.set_as_boot_partition().map_err(|e| {
            warn!("esp-ota set_as_boot_partition failed: {:?}", e);
            SinkError::BootSetFailed
        })
    }

    fn abort(&mut self, tx: Self::Transaction) {
        // esp-ota aborts automatically when OtaUpdate is dropped
        drop(tx);
        warn!("EspOtaSink: transaction aborted");
    }
}

// ── In-memory flash (host / simulation) ───────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    begin: Option<SinkError>,
    write: Option<SinkError>,
    finalize: Option<SinkError>,
    commit: Option<SinkError>,
}

/// Open transaction against the inactive slot.
#[derive(Debug)]
pub struct MemoryTransaction {
    id: u32,
    slot: usize,
}

impl MemoryTransaction {
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// Finalized image waiting for commit.
#[derive(Debug)]
pub struct MemoryImage {
    slot: usize,
    len: usize,
}

impl MemoryImage {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Two-slot OTA flash model with one-shot fault injection.
///
/// Slot 0 holds the running image at start. `begin` always targets the
/// slot that is not the current boot slot, erasing it.
pub struct MemoryFlashSink {
    slots: [Vec<u8>; 2],
    capacity: usize,
    boot_slot: usize,
    committed: bool,
    open_tx: Option<u32>,
    next_tx: u32,
    faults: Faults,
    begins: u32,
    aborts: u32,
    commits: u32,
}

impl MemoryFlashSink {
    /// Each slot holds at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: [Vec::new(), Vec::new()],
            capacity,
            boot_slot: 0,
            committed: false,
            open_tx: None,
            next_tx: 0,
            faults: Faults::default(),
            begins: 0,
            aborts: 0,
            commits: 0,
        }
    }

    // ── Fault injection ───────────────────────────────────────

    pub fn fail_next_begin(&mut self) {
        self.faults.begin = Some(SinkError::NoPartition);
    }

    pub fn fail_next_write(&mut self) {
        self.faults.write = Some(SinkError::WriteFailed);
    }

    pub fn fail_next_finalize(&mut self) {
        self.faults.finalize = Some(SinkError::ImageInvalid);
    }

    pub fn fail_next_commit(&mut self) {
        self.faults.commit = Some(SinkError::BootSetFailed);
    }

    // ── Inspection ────────────────────────────────────────────

    /// Image that will run after the next restart, once something was committed.
    pub fn boot_image(&self) -> Option<&[u8]> {
        self.committed.then(|| self.slots[self.boot_slot].as_slice())
    }

    /// Bytes currently staged in the update slot.
    pub fn staged(&self) -> &[u8] {
        &self.slots[self.update_slot()]
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn begins(&self) -> u32 {
        self.begins
    }

    pub fn aborts(&self) -> u32 {
        self.aborts
    }

    pub fn commits(&self) -> u32 {
        self.commits
    }

    /// Whether a transaction is currently open.
    pub fn is_open(&self) -> bool {
        self.open_tx.is_some()
    }

    fn update_slot(&self) -> usize {
        1 - self.boot_slot
    }
}

impl UpdateSink for MemoryFlashSink {
    type Transaction = MemoryTransaction;
    type Image = MemoryImage;

    fn begin(&mut self, size_hint: u32) -> Result<MemoryTransaction, SinkError> {
        if let Some(e) = self.faults.begin.take() {
            return Err(e);
        }
        if size_hint as usize > self.capacity {
            warn!(
                "MemoryFlashSink: image of {} bytes exceeds slot capacity {}",
                size_hint, self.capacity
            );
            return Err(SinkError::OutOfSpace);
        }
        let slot = self.update_slot();
        self.slots[slot].clear();
        self.next_tx = self.next_tx.wrapping_add(1);
        self.open_tx = Some(self.next_tx);
        self.begins += 1;
        Ok(MemoryTransaction {
            id: self.next_tx,
            slot,
        })
    }

    fn write(&mut self, tx: &mut MemoryTransaction, data: &[u8]) -> Result<(), SinkError> {
        if self.open_tx != Some(tx.id) {
            return Err(SinkError::OpenFailed);
        }
        if let Some(e) = self.faults.write.take() {
            return Err(e);
        }
        let slot = &mut self.slots[tx.slot];
        if slot.len() + data.len() > self.capacity {
            return Err(SinkError::OutOfSpace);
        }
        slot.extend_from_slice(data);
        Ok(())
    }

    fn finalize(&mut self, tx: MemoryTransaction) -> Result<MemoryImage, SinkError> {
        if self.open_tx != Some(tx.id) {
            return Err(SinkError::OpenFailed);
        }
        self.open_tx = None;
        if let Some(e) = self.faults.finalize.take() {
            return Err(e);
        }
        Ok(MemoryImage {
            slot: tx.slot,
            len: self.slots[tx.slot].len(),
        })
    }

    fn commit(&mut self, image: &mut MemoryImage) -> Result<(), SinkError> {
        if let Some(e) = self.faults.commit.take() {
            return Err(e);
        }
        self.boot_slot = image.slot;
        self.committed = true;
        self.commits += 1;
        info!(
            "MemoryFlashSink: slot {} set as boot ({} bytes)",
            image.slot, image.len
        );
        Ok(())
    }

    fn abort(&mut self, tx: MemoryTransaction) {
        if self.open_tx == Some(tx.id) {
            self.open_tx = None;
        }
        self.slots[tx.slot].clear();
        self.aborts += 1;
    }
}
