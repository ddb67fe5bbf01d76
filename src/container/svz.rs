//! SVZ Containers
//!
//! Plugin banks keep all records zlib-compressed in a single `EXTa` chunk.
//! Hardware banks store one `DIFa` device block and an `MDLa` chunk of
//! CRC-protected 2048 byte slots.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use super::slots::{hardware_slot, record_from_hardware_slot, vst_bytes, HARDWARE_MODEL_JD800, HARDWARE_MODEL_OFFSET, SLOT_SIZE};
use super::{ChunkKind, ContainerEntry, ContainerKind, SvzHeader, ENTRY_SIZE, SVZ_MARKER};
use crate::dialect::Dialect;
use crate::errors::{JdError, JdResult};
use crate::parser_config::ParserConfig;
use crate::patch::PatchRecord;
use crate::traits::{ArchiveParser, ArchiveWriter};
use crate::utils::{crc32, deflate, inflate_exact, tag_to_string};

pub const EXTA_TAG: [u8; 4] = *b"EXTa";
pub const DIFA_TAG: [u8; 4] = *b"DIFa";
pub const MDLA_TAG: [u8; 4] = *b"MDLa";

/// Size of the `EXTa` sub-header preceding the compressed bytes
pub const EXTA_HEADER_SIZE: usize = 64;

const EXTA_LEADING_WORDS: [u32; 6] = [1, 0, 32, 0, 1, 32];
const EXTA_FORMAT_ID: [u8; 8] = *b"RC001\x01\x00\x00";

/// Header of the inflated plugin payload
pub const SVDX_MAGIC: [u8; 4] = *b"SVDx";
pub const SVDX_HEADER_SIZE: usize = 32;
const SVDX_TRAILING_WORDS: [u32; 4] = [2, 0, 0, 0];

/// `MDLa` sub-header size and the constant following the patch count
pub const MDLA_HEADER_SIZE: usize = 16;
const MDLA_SLOT_MARKER: u32 = 0x800;

/// Opaque device block every hardware bank carries
pub const DIFA_BLOCK: [u8; 52] = [
    0x01, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x42, 0x09, 0x5C, 0xA1, 0x03, 0x00, 0x86, 0xC8, 0xE5, 0x4C, 0xA5, 0x48, 0x08, 0x0C, 0x00, 0x48, //
    0x00, 0x48, 0x00, 0x48, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00,
];

/// Root header and chunk table of an SVZ file
fn read_table(data: &[u8]) -> JdResult<(SvzHeader, Vec<ContainerEntry>)> {
    let mut cursor = Bytes::copy_from_slice(data);
    let header = SvzHeader::from_bytes(&mut cursor)?;

    let mut entries = Vec::with_capacity(header.num_chunks as usize);
    for _ in 0..header.num_chunks {
        let entry = ContainerEntry::from_bytes(&mut cursor)?;
        if entry.marker != SVZ_MARKER {
            return Err(JdError::InvalidChunk {
                tag: entry.tag_name(),
                reason: format!("entry marker '{}' is not ZCOR", tag_to_string(&entry.marker)),
            });
        }
        entries.push(entry);
    }
    Ok((header, entries))
}

fn find_chunk(entries: &[ContainerEntry], kind: ChunkKind) -> JdResult<ContainerEntry> {
    entries
        .iter()
        .find(|entry| entry.is(kind))
        .copied()
        .ok_or_else(|| JdError::InvalidChunk {
            tag: kind.tag().to_string(),
            reason: "chunk missing from container".to_string(),
        })
}

/// Plugin bank (`.bin`)
pub fn read_plugin_container(data: &[u8], config: &ParserConfig) -> JdResult<Vec<PatchRecord>> {
    let (header, entries) = read_table(data)?;
    if header.kind() != ContainerKind::Plugin {
        debug!("Reading plugin chunk from a hardware style header");
    }

    let entry = find_chunk(&entries, ChunkKind::Compressed)?;
    let chunk = entry.slice(data)?;
    if chunk.len() < EXTA_HEADER_SIZE {
        return Err(JdError::TruncatedFile {
            structure: "EXTa header".to_string(),
            expected: EXTA_HEADER_SIZE,
            actual: chunk.len(),
        });
    }

    let mut sub_header = Bytes::copy_from_slice(&chunk[..EXTA_HEADER_SIZE]);
    let leading: Vec<u32> = (0..6).map(|_| sub_header.get_u32_le()).collect();
    let compressed_size = sub_header.get_u32_le() as usize;
    let stored_crc = sub_header.get_u32_le();
    sub_header.advance(EXTA_FORMAT_ID.len());
    let uncompressed_size = sub_header.get_u32_le() as usize;
    let trailing: Vec<u32> = (0..5).map(|_| sub_header.get_u32_le()).collect();

    if leading != EXTA_LEADING_WORDS || trailing.iter().any(|&word| word != 0) {
        return Err(JdError::CorruptedHeader {
            structure: "EXTa".to_string(),
            reason: format!("unexpected constants {:?} / {:?}", leading, trailing),
        });
    }

    if chunk.len() - 0x20 != compressed_size {
        return Err(JdError::InvalidChunk {
            tag: "EXTa".to_string(),
            reason: format!(
                "compressed data has unexpected length {} (chunk holds {})",
                compressed_size,
                chunk.len() - 0x20
            ),
        });
    }

    let compressed = &chunk[EXTA_HEADER_SIZE..];
    let computed_crc = crc32(compressed);
    if computed_crc != stored_crc {
        return Err(JdError::ContainerCrcMismatch {
            stored: stored_crc,
            computed: computed_crc,
        });
    }

    config.check_decompressed_size(uncompressed_size)?;
    let inflated = inflate_exact(compressed, uncompressed_size)?;
    parse_svdx(&inflated, config)
}

fn parse_svdx(inflated: &[u8], config: &ParserConfig) -> JdResult<Vec<PatchRecord>> {
    if inflated.len() < SVDX_HEADER_SIZE {
        return Err(JdError::TruncatedFile {
            structure: "SVDx header".to_string(),
            expected: SVDX_HEADER_SIZE,
            actual: inflated.len(),
        });
    }

    let mut header = Bytes::copy_from_slice(&inflated[..SVDX_HEADER_SIZE]);
    let magic = header.split_to(4);
    let header_size = header.get_u32_le() as usize;
    let record_size = header.get_u32_le() as usize;
    let count = header.get_u32_le() as usize;
    let trailing: Vec<u32> = (0..4).map(|_| header.get_u32_le()).collect();

    if magic[..] != SVDX_MAGIC
        || header_size != SVDX_HEADER_SIZE
        || record_size != Dialect::Vst.record_size()
        || count == 0
        || trailing != SVDX_TRAILING_WORDS
    {
        return Err(JdError::CorruptedHeader {
            structure: "SVDx".to_string(),
            reason: "unexpected header after decompression".to_string(),
        });
    }

    config.check_patch_count(count)?;
    let needed = SVDX_HEADER_SIZE + count * record_size;
    if inflated.len() < needed {
        return Err(JdError::TruncatedFile {
            structure: "SVDx payload".to_string(),
            expected: needed,
            actual: inflated.len(),
        });
    }

    inflated[SVDX_HEADER_SIZE..needed]
        .chunks_exact(record_size)
        .map(|bytes| PatchRecord::from_slice(Dialect::Vst, bytes))
        .collect()
}

/// Hardware bank (`.svz`)
pub fn read_hardware_container(data: &[u8], config: &ParserConfig) -> JdResult<Vec<PatchRecord>> {
    let (_, entries) = read_table(data)?;
    let entry = find_chunk(&entries, ChunkKind::Models)?;
    let chunk = entry.slice(data)?;
    if chunk.len() < MDLA_HEADER_SIZE {
        return Err(JdError::TruncatedFile {
            structure: "MDLa header".to_string(),
            expected: MDLA_HEADER_SIZE,
            actual: chunk.len(),
        });
    }

    let mut cursor = Bytes::copy_from_slice(chunk);
    let count = cursor.get_u32_le() as usize;
    let slot_marker = cursor.get_u32_le();
    let size_truncated = cursor.get_u32_le();
    let reserved = cursor.get_u32_le();

    if slot_marker != MDLA_SLOT_MARKER || size_truncated != (entry.size & 0x1FF) || reserved != 0 {
        return Err(JdError::CorruptedHeader {
            structure: "MDLa".to_string(),
            reason: format!(
                "fields 0x{:X} / 0x{:X} / 0x{:X} for chunk size {}",
                slot_marker, size_truncated, reserved, entry.size
            ),
        });
    }

    config.check_patch_count(count)?;
    let expected = MDLA_HEADER_SIZE + (4 + SLOT_SIZE) * count;
    if chunk.len() != expected {
        return Err(JdError::InvalidChunk {
            tag: "MDLa".to_string(),
            reason: format!("unexpected length {}, {} patches need {}", chunk.len(), count, expected),
        });
    }

    let stored_crcs: Vec<u32> = (0..count).map(|_| cursor.get_u32_le()).collect();
    let mut records = Vec::with_capacity(count);
    for (index, stored) in stored_crcs.into_iter().enumerate() {
        let slot = cursor.split_to(SLOT_SIZE);

        let computed = crc32(&slot);
        if computed != stored {
            let finding = JdError::RecordCrcMismatch {
                index,
                stored,
                computed,
            };
            if config.strict_integrity {
                return Err(finding);
            }
            warn!("{}", finding);
        }

        if slot[HARDWARE_MODEL_OFFSET] != HARDWARE_MODEL_JD800 {
            return Err(JdError::WrongModel { index });
        }
        records.push(record_from_hardware_slot(&slot)?);
    }
    Ok(records)
}

/// Write a plugin bank
pub fn write_plugin_container(records: &[PatchRecord], config: &ParserConfig) -> JdResult<Vec<u8>> {
    if records.is_empty() {
        return Err(JdError::NoPatchData);
    }

    let record_size = Dialect::Vst.record_size();
    let mut uncompressed = BytesMut::with_capacity(SVDX_HEADER_SIZE + records.len() * record_size);
    uncompressed.put_slice(&SVDX_MAGIC);
    uncompressed.put_u32_le(SVDX_HEADER_SIZE as u32);
    uncompressed.put_u32_le(record_size as u32);
    uncompressed.put_u32_le(records.len() as u32);
    for word in SVDX_TRAILING_WORDS {
        uncompressed.put_u32_le(word);
    }
    for record in records {
        uncompressed.put_slice(vst_bytes(record)?);
    }

    let compressed = deflate(&uncompressed, config.compression_level)?;
    let compressed_crc = crc32(&compressed);
    debug!(
        "Compressed {} plugin records: {} -> {} bytes",
        records.len(),
        uncompressed.len(),
        compressed.len()
    );

    let mut buffer = BytesMut::with_capacity(2 * ENTRY_SIZE + EXTA_HEADER_SIZE + compressed.len());
    SvzHeader {
        num_chunks: 1,
        num_chunks_repeated: 0,
    }
    .to_bytes(&mut buffer)?;
    ContainerEntry::new(EXTA_TAG, SVZ_MARKER, 0x20, (compressed.len() + 0x40) as u32).to_bytes(&mut buffer)?;

    for word in EXTA_LEADING_WORDS {
        buffer.put_u32_le(word);
    }
    buffer.put_u32_le((compressed.len() + 0x20) as u32);
    buffer.put_u32_le(compressed_crc);
    buffer.put_slice(&EXTA_FORMAT_ID);
    buffer.put_u32_le(uncompressed.len() as u32);
    buffer.put_bytes(0, 5 * 4);
    buffer.put_slice(&compressed);

    Ok(buffer.to_vec())
}

/// Write a hardware bank
pub fn write_hardware_container(records: &[PatchRecord]) -> JdResult<Vec<u8>> {
    let count = records.len();
    let difa_offset = 3 * ENTRY_SIZE;
    let mdla_offset = difa_offset + DIFA_BLOCK.len();
    let mdla_size = MDLA_HEADER_SIZE + (4 + SLOT_SIZE) * count;

    let slots = records.iter().map(hardware_slot).collect::<JdResult<Vec<_>>>()?;

    let mut buffer = BytesMut::with_capacity(mdla_offset + mdla_size);
    SvzHeader {
        num_chunks: 2,
        num_chunks_repeated: 2,
    }
    .to_bytes(&mut buffer)?;
    ContainerEntry::new(DIFA_TAG, SVZ_MARKER, difa_offset as u32, DIFA_BLOCK.len() as u32).to_bytes(&mut buffer)?;
    ContainerEntry::new(MDLA_TAG, SVZ_MARKER, mdla_offset as u32, mdla_size as u32).to_bytes(&mut buffer)?;
    buffer.put_slice(&DIFA_BLOCK);

    buffer.put_u32_le(count as u32);
    buffer.put_u32_le(MDLA_SLOT_MARKER);
    buffer.put_u32_le((mdla_size & 0x1FF) as u32);
    buffer.put_u32_le(0);
    for slot in &slots {
        buffer.put_u32_le(crc32(slot));
    }
    for slot in &slots {
        buffer.put_slice(slot);
    }

    Ok(buffer.to_vec())
}
