//! Slot Conversions
//!
//! Hardware and backup containers store 2048 byte slots instead of full
//! 22352 byte software records. Reading a slot back always yields a record
//! with the default ZEN header and the reserved tail zeroed.

use crate::dialect::Dialect;
use crate::errors::{JdError, JdResult};
use crate::patch::{PatchRecord, DEFAULT_ZEN_HEADER, VST_BODY_END, ZEN_HEADER_SIZE};

/// Size of one patch slot in the hardware and backup containers
pub const SLOT_SIZE: usize = 2048;

/// Name to unison span shared by records and slots
const BODY_SIZE: usize = VST_BODY_END - ZEN_HEADER_SIZE;

/// Offset of the model byte in a hardware slot
pub const HARDWARE_MODEL_OFFSET: usize = 2045;

/// Model byte of JD-800 patches on the ZC1
pub const HARDWARE_MODEL_JD800: u8 = 0x01;

/// Fixed trailer bytes of a hardware slot
const HARDWARE_TRAILER: [(usize, u8); 3] = [(2042, 0x44), (HARDWARE_MODEL_OFFSET, HARDWARE_MODEL_JD800), (2046, 0x09)];

/// Fixed header bytes of a backup slot
const BACKUP_SLOT_HEADER: [(usize, u8); 5] = [(4, 1), (5, 1), (6, 5), (8, 15), (2044, 8)];

/// Software record bytes, rejecting hardware dialects
pub fn vst_bytes(record: &PatchRecord) -> JdResult<&[u8]> {
    if record.dialect() != Dialect::Vst {
        return Err(JdError::InvalidRecordLength {
            dialect: Dialect::Vst.to_string(),
            expected: Dialect::Vst.record_size(),
            actual: record.as_bytes().len(),
        });
    }
    Ok(record.as_bytes())
}

fn record_from_body(body: &[u8]) -> JdResult<PatchRecord> {
    let mut bytes = vec![0u8; Dialect::Vst.record_size()];
    bytes[..ZEN_HEADER_SIZE].copy_from_slice(&DEFAULT_ZEN_HEADER);
    bytes[ZEN_HEADER_SIZE..VST_BODY_END].copy_from_slice(body);
    PatchRecord::new(Dialect::Vst, bytes)
}

/// Hardware slots start at the patch name
pub fn record_from_hardware_slot(slot: &[u8]) -> JdResult<PatchRecord> {
    record_from_body(&slot[..BODY_SIZE])
}

pub fn hardware_slot(record: &PatchRecord) -> JdResult<Vec<u8>> {
    let bytes = vst_bytes(record)?;
    let mut slot = bytes[ZEN_HEADER_SIZE..ZEN_HEADER_SIZE + SLOT_SIZE].to_vec();
    for (offset, value) in HARDWARE_TRAILER {
        slot[offset] = value;
    }
    Ok(slot)
}

/// Backup slots start with their own 16 byte header
pub fn record_from_backup_slot(slot: &[u8]) -> JdResult<PatchRecord> {
    record_from_body(&slot[ZEN_HEADER_SIZE..VST_BODY_END])
}

pub fn backup_slot(record: &PatchRecord) -> JdResult<Vec<u8>> {
    let bytes = vst_bytes(record)?;
    let mut slot = vec![0u8; SLOT_SIZE];
    for (offset, value) in BACKUP_SLOT_HEADER {
        slot[offset] = value;
    }
    slot[ZEN_HEADER_SIZE..VST_BODY_END].copy_from_slice(&bytes[ZEN_HEADER_SIZE..VST_BODY_END]);
    Ok(slot)
}
