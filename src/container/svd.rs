//! SVD Backup Containers
//!
//! JD-08 backups hold several chunks (`PRFa`, `SYSa`, `DIFa`, `PATa`, ...).
//! The device rejects backups missing any of them, so writing always starts
//! from an existing backup and only the `PATa` chunk is rebuilt.

use byteorder::{ByteOrder, LittleEndian};
use bytes::{Buf, Bytes};
use tracing::{debug, warn};

use super::slots::{backup_slot, record_from_backup_slot, SLOT_SIZE};
use super::{ChunkKind, ContainerEntry, ENTRY_SIZE, SVD_MAGIC, SVD_MARKER};
use crate::errors::{JdError, JdResult};
use crate::parser_config::ParserConfig;
use crate::patch::PatchRecord;
use crate::traits::ArchiveParser;
use crate::utils::tag_to_string;

pub const PATA_TAG: [u8; 4] = *b"PATa";

/// Smallest header size declaring at least one entry
pub const MIN_HEADER_SIZE: usize = 30;

/// Offset of the first table entry
const TABLE_OFFSET: usize = 16;

/// `PATa` sub-header size; also its third word
const PATA_HEADER_SIZE: usize = 16;

/// Magic following the 16-bit header size: `SVD5` and ten zero bytes
fn magic_matches(data: &[u8]) -> bool {
    data.len() >= TABLE_OFFSET && data[2..6] == SVD_MAGIC && data[6..TABLE_OFFSET].iter().all(|&b| b == 0)
}

/// Table entries while `14 + 16 * i < header_size`
fn entry_count(header_size: usize) -> usize {
    header_size.saturating_sub(TABLE_OFFSET - 2).div_ceil(ENTRY_SIZE)
}

fn read_entries(data: &[u8], header_size: usize) -> JdResult<Vec<ContainerEntry>> {
    let count = entry_count(header_size);
    let table_end = TABLE_OFFSET + count * ENTRY_SIZE;
    if data.len() < table_end {
        return Err(JdError::TruncatedFile {
            structure: "SVD chunk table".to_string(),
            expected: table_end,
            actual: data.len(),
        });
    }

    let mut cursor = Bytes::copy_from_slice(&data[TABLE_OFFSET..table_end]);
    (0..count).map(|_| ContainerEntry::from_bytes(&mut cursor)).collect()
}

/// JD-08 backup (`.svd`)
pub fn read_backup_container(data: &[u8], config: &ParserConfig) -> JdResult<Vec<PatchRecord>> {
    if !magic_matches(data) {
        return Err(JdError::InvalidMagicBytes {
            expected: tag_to_string(&SVD_MAGIC),
            found: tag_to_string(data.get(2..6).unwrap_or(data)),
            offset: 2,
        });
    }

    let header_size = LittleEndian::read_u16(&data[0..2]) as usize;
    if header_size < MIN_HEADER_SIZE {
        return Err(JdError::CorruptedHeader {
            structure: "SVD".to_string(),
            reason: format!("header size {} below {}", header_size, MIN_HEADER_SIZE),
        });
    }

    let entries = read_entries(data, header_size)?;
    let entry = entries
        .iter()
        .find(|entry| entry.is(ChunkKind::Patches) && entry.marker == SVD_MARKER)
        .filter(|entry| entry.offset != 0 && entry.size as usize >= PATA_HEADER_SIZE)
        .ok_or_else(|| JdError::InvalidChunk {
            tag: "PATa".to_string(),
            reason: "backup does not contain any patches".to_string(),
        })?;

    let chunk = entry.slice(data)?;
    let mut cursor = Bytes::copy_from_slice(chunk);
    let count = cursor.get_u32_le() as usize;
    let slot_size = cursor.get_u32_le() as usize;
    let header_word = cursor.get_u32_le() as usize;
    let reserved = cursor.get_u32_le();

    if slot_size != SLOT_SIZE {
        return Err(JdError::InvalidChunk {
            tag: "PATa".to_string(),
            reason: format!("unexpected patch size {}", slot_size),
        });
    }
    if header_word != PATA_HEADER_SIZE || reserved != 0 {
        return Err(JdError::CorruptedHeader {
            structure: "PATa".to_string(),
            reason: format!("fields {} / {}", header_word, reserved),
        });
    }

    config.check_patch_count(count)?;
    if cursor.remaining() < count * SLOT_SIZE {
        return Err(JdError::TruncatedFile {
            structure: "PATa chunk".to_string(),
            expected: PATA_HEADER_SIZE + count * SLOT_SIZE,
            actual: chunk.len(),
        });
    }

    (0..count)
        .map(|_| record_from_backup_slot(&cursor.split_to(SLOT_SIZE)))
        .collect()
}

/// Rewrite `template` with `records` as its patch chunk
///
/// Every other chunk is copied byte for byte; offsets are recomputed and the
/// chunk table is patched in place once all sizes are known.
pub fn write_backup_container(template: &[u8], records: &[PatchRecord], config: &ParserConfig) -> JdResult<Vec<u8>> {
    if template.len() < 32 {
        return Err(JdError::MissingTemplate {
            reason: format!("template is only {} bytes", template.len()),
        });
    }
    if !magic_matches(template) {
        return Err(JdError::MissingTemplate {
            reason: "template has no SVD5 signature".to_string(),
        });
    }

    let mut header_size = LittleEndian::read_u16(&template[0..2]) as usize;
    if header_size < MIN_HEADER_SIZE || header_size > template.len() - 2 {
        return Err(JdError::MissingTemplate {
            reason: format!("header size {} out of range for {} bytes", header_size, template.len()),
        });
    }

    let mut entries = read_entries(template, header_size).map_err(|e| JdError::MissingTemplate {
        reason: e.to_string(),
    })?;
    if !entries.iter().any(|entry| entry.is(ChunkKind::Patches)) {
        debug!("Template has no PATa chunk, appending one");
        entries.push(ContainerEntry::new(PATA_TAG, SVD_MARKER, 0, 0));
        header_size += ENTRY_SIZE;
    }

    let header_size = u16::try_from(header_size).map_err(|_| JdError::IntegerOverflow {
        operation: "SVD header size".to_string(),
        details: format!("{} entries need a {} byte header", entries.len(), header_size),
    })?;

    let slots = records.iter().map(backup_slot).collect::<JdResult<Vec<_>>>()?;

    let mut out = Vec::with_capacity(template.len() + slots.len() * SLOT_SIZE);
    out.extend_from_slice(&header_size.to_le_bytes());
    out.extend_from_slice(&template[2..TABLE_OFFSET]);
    // Table contents are patched once offsets are known
    out.resize(TABLE_OFFSET + entries.len() * ENTRY_SIZE, 0);

    for entry in entries.iter_mut() {
        let offset = out.len() as u32;
        if entry.is(ChunkKind::Patches) {
            entry.size = (PATA_HEADER_SIZE + SLOT_SIZE * slots.len()) as u32;
            let mut sub_header = [0u8; PATA_HEADER_SIZE];
            LittleEndian::write_u32_into(
                &[slots.len() as u32, SLOT_SIZE as u32, PATA_HEADER_SIZE as u32, 0],
                &mut sub_header,
            );
            out.extend_from_slice(&sub_header);
            for slot in &slots {
                out.extend_from_slice(slot);
            }
        } else {
            let start = entry.offset as usize;
            let fits = start < template.len() && entry.size as usize <= template.len() - start;
            if fits {
                out.extend_from_slice(&template[start..start + entry.size as usize]);
            } else {
                let finding = JdError::TruncatedChunk {
                    tag: entry.tag_name(),
                    offset: entry.offset,
                    size: entry.size,
                    file_size: template.len(),
                };
                if config.strict_integrity {
                    return Err(finding);
                }
                warn!("{}", finding);
                entry.size = 0;
            }
        }
        entry.offset = offset;
    }

    for (index, entry) in entries.iter().enumerate() {
        let at = TABLE_OFFSET + index * ENTRY_SIZE;
        out[at..at + 4].copy_from_slice(&entry.tag);
        out[at + 4..at + 8].copy_from_slice(&entry.marker);
        LittleEndian::write_u32(&mut out[at + 8..at + 12], entry.offset);
        LittleEndian::write_u32(&mut out[at + 12..at + 16], entry.size);
    }

    Ok(out)
}
