//! Patch Banks
//!
//! Banks hold 64 patches addressed as `I11`..`I88` on the hardware. Plugin
//! banks use the same size; JD-08 backups hold four banks `A`..`D`.

use std::fmt;
use std::str::FromStr;

use bytes::BytesMut;
use tracing::info;

use crate::dialect::{Dialect, PATCHES_PER_BANK};
use crate::errors::{JdError, JdResult};
use crate::memory::{emit_for_device, DeviceMemoryImage};
use crate::parser_config::ParserConfig;
use crate::patch::PatchRecord;

/// Patches held by a JD-08 backup
pub const BACKUP_CAPACITY: usize = 4 * PATCHES_PER_BANK;

/// Slot offset into a 256 patch backup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct PatchPosition(usize);

impl PatchPosition {
    pub fn new(offset: usize) -> Option<Self> {
        (offset < BACKUP_CAPACITY).then_some(Self(offset))
    }

    pub fn offset(self) -> usize {
        self.0
    }
}

impl FromStr for PatchPosition {
    type Err = JdError;

    /// `B` selects the start of bank B, `B42` patch 4-2 of bank B
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || JdError::InvalidPosition { input: s.to_string() };
        let bytes = s.as_bytes();

        let bank = match bytes.first().map(u8::to_ascii_uppercase) {
            Some(letter @ b'A'..=b'D') => (letter - b'A') as usize,
            _ => return Err(invalid()),
        };

        match bytes[1..] {
            [] => Ok(Self(bank * PATCHES_PER_BANK)),
            [group @ b'1'..=b'8', number @ b'1'..=b'8'] => {
                Ok(Self(bank * PATCHES_PER_BANK + (group - b'1') as usize * 8 + (number - b'1') as usize))
            },
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for PatchPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&patch_label(self.0, BACKUP_CAPACITY, false))
    }
}

/// Front panel label of patch `index` out of `count`
///
/// Single banks are labelled `I11`..`I88`, larger sets `A11`..`D88`, card
/// patches `C11`..`C88`.
pub fn patch_label(index: usize, count: usize, card: bool) -> String {
    let bank = if card {
        'C'
    } else if count <= PATCHES_PER_BANK {
        'I'
    } else {
        char::from(b'A' + ((index / PATCHES_PER_BANK) % 26) as u8)
    };
    let group = char::from(b'1' + ((index / 8) % 8) as u8);
    let number = char::from(b'1' + (index % 8) as u8);
    format!("{}{}{}", bank, group, number)
}

/// Place `records` at `offset` into an existing backup bank
///
/// Slots before `offset` and after the new records keep their existing
/// content; the result never exceeds [`BACKUP_CAPACITY`].
pub fn merge_into_bank(records: Vec<PatchRecord>, existing: &[PatchRecord], offset: usize) -> Vec<PatchRecord> {
    let head = offset.min(existing.len());
    let mut merged = Vec::with_capacity(existing.len().max(head + records.len()));
    merged.extend_from_slice(&existing[..head]);
    merged.extend(records);

    if merged.len() < existing.len() {
        let tail = merged.len();
        merged.extend_from_slice(&existing[tail..]);
    } else {
        merged.truncate(BACKUP_CAPACITY);
    }
    merged
}

/// Split `records` into banks of `bank_size`
///
/// The last bank is padded with blank records so every bank is complete.
pub fn split_banks(records: &[PatchRecord], bank_size: usize) -> Vec<Vec<PatchRecord>> {
    let bank_size = bank_size.max(1);
    records
        .chunks(bank_size)
        .map(|chunk| {
            let mut bank = chunk.to_vec();
            let dialect = chunk[0].dialect();
            bank.resize_with(bank_size, || PatchRecord::blank(dialect));
            bank
        })
        .collect()
}

/// Emit `records` into internal patch slots `I11` onwards
///
/// Nothing is appended to `sink` unless every record is emitted.
pub fn emit_patch_bank(
    sink: &mut BytesMut,
    dialect: Dialect,
    records: &[PatchRecord],
    config: &ParserConfig,
) -> JdResult<usize> {
    if records.len() > PATCHES_PER_BANK {
        return Err(JdError::DataSizeExceedsLimit {
            field: "bank_size".to_string(),
            size: records.len(),
            limit: PATCHES_PER_BANK,
        });
    }

    let mut staged = BytesMut::new();
    let mut messages = 0;
    for (slot, record) in records.iter().enumerate() {
        if record.dialect() != dialect {
            return Err(JdError::DialectMismatch {
                established: dialect.to_string(),
                found: record.dialect().to_string(),
            });
        }
        info!("Adding {}: {}", patch_label(slot, PATCHES_PER_BANK, false), record.name());
        let address = dialect.internal_patch_address(slot);
        messages += emit_for_device(&mut staged, config.device_id, address, dialect, record.as_bytes())?;
    }
    sink.extend_from_slice(&staged);
    Ok(messages)
}

/// Temporary patch snapshots as one SysEx bank per 64 patches
pub fn emit_temporary_banks(image: &DeviceMemoryImage, config: &ParserConfig) -> JdResult<Vec<Vec<u8>>> {
    let Some(dialect) = image.dialect() else {
        return Ok(Vec::new());
    };

    let snapshots = image.temporary_patches();
    info!("Merging {} {} patches...", snapshots.len(), dialect);
    snapshots
        .chunks(PATCHES_PER_BANK)
        .map(|bank| -> JdResult<Vec<u8>> {
            let mut sink = BytesMut::new();
            emit_patch_bank(&mut sink, dialect, bank, config)?;
            Ok(sink.to_vec())
        })
        .collect()
}
