//! Container Module
//!
//! Chunked patch containers: the SVZ format written by the JD-800 plugin
//! (`.bin`) and the ZC1 hardware (`.svz`), and the SVD5 backup format of the
//! JD-08 (`.svd`). All chunk tables are little endian.

pub mod slots;
pub mod svd;
pub mod svz;


use bytes::{Buf, BufMut, Bytes, BytesMut};
use phf::phf_map;
use serde::{Deserialize, Serialize};

use crate::errors::{JdError, JdResult};
use crate::parser_config::ParserConfig;
use crate::patch::PatchRecord;
use crate::traits::{ArchiveParser, ArchiveWriter};
use crate::utils::tag_to_string;

pub use svd::{read_backup_container, write_backup_container};
pub use svz::{read_hardware_container, read_plugin_container, write_hardware_container, write_plugin_container};

/// SVZ root magic
pub const SVZ_MAGIC: [u8; 4] = *b"SVZa";
/// SVZ format id following the chunk counts
pub const SVZ_FORMAT_ID: [u8; 6] = *b"RC001\x01";
/// SVZ chunk entry marker
pub const SVZ_MARKER: [u8; 4] = *b"ZCOR";

/// SVD root magic, follows the 16-bit header size
pub const SVD_MAGIC: [u8; 4] = *b"SVD5";
/// SVD chunk entry marker
pub const SVD_MARKER: [u8; 4] = *b"DD07";

/// Size of a root header and of one chunk entry
pub const ENTRY_SIZE: usize = 16;

/// Container flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    /// JD-800 plugin bank (`.bin`): one compressed `EXTa` chunk
    Plugin,
    /// ZC1 hardware bank (`.svz`): `DIFa` + `MDLa`
    Hardware,
    /// JD-08 backup (`.svd`)
    Backup,
}

/// Known chunk types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Compressed,
    DeviceInfo,
    Models,
    Patches,
    Performances,
    System,
}

impl ChunkKind {
    /// Tag of the chunk in container tables
    pub fn tag(self) -> &'static str {
        match self {
            ChunkKind::Compressed => "EXTa",
            ChunkKind::DeviceInfo => "DIFa",
            ChunkKind::Models => "MDLa",
            ChunkKind::Patches => "PATa",
            ChunkKind::Performances => "PRFa",
            ChunkKind::System => "SYSa",
        }
    }
}

static CHUNK_KINDS: phf::Map<&'static str, ChunkKind> = phf_map! {
    "EXTa" => ChunkKind::Compressed,
    "DIFa" => ChunkKind::DeviceInfo,
    "MDLa" => ChunkKind::Models,
    "PATa" => ChunkKind::Patches,
    "PRFa" => ChunkKind::Performances,
    "SYSa" => ChunkKind::System,
};

/// Root header of an SVZ container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvzHeader {
    pub num_chunks: u8,
    /// 0 in plugin files, a copy of `num_chunks` in hardware files
    pub num_chunks_repeated: u8,
}

impl SvzHeader {
    pub fn kind(&self) -> ContainerKind {
        if self.num_chunks_repeated == 0 {
            ContainerKind::Plugin
        } else {
            ContainerKind::Hardware
        }
    }
}

impl ArchiveParser for SvzHeader {
    fn from_bytes(data: &mut Bytes) -> JdResult<Self> {
        if data.remaining() < ENTRY_SIZE {
            return Err(JdError::TruncatedFile {
                structure: "SVZ header".to_string(),
                expected: ENTRY_SIZE,
                actual: data.remaining(),
            });
        }

        let magic = data.split_to(4);
        if magic[..] != SVZ_MAGIC {
            return Err(JdError::InvalidMagicBytes {
                expected: tag_to_string(&SVZ_MAGIC),
                found: tag_to_string(&magic),
                offset: 0,
            });
        }

        let num_chunks = data.get_u8();
        let num_chunks_repeated = data.get_u8();
        data.advance(SVZ_FORMAT_ID.len());
        let null = data.get_u32_le();

        if (num_chunks_repeated != 0 && num_chunks_repeated != num_chunks) || null != 0 {
            return Err(JdError::CorruptedHeader {
                structure: "SVZ header".to_string(),
                reason: format!(
                    "chunk counts {} / {}, reserved word 0x{:08X}",
                    num_chunks, num_chunks_repeated, null
                ),
            });
        }

        Ok(Self {
            num_chunks,
            num_chunks_repeated,
        })
    }
}

impl ArchiveWriter for SvzHeader {
    fn to_bytes(&self, buffer: &mut BytesMut) -> JdResult<()> {
        buffer.put_slice(&SVZ_MAGIC);
        buffer.put_u8(self.num_chunks);
        buffer.put_u8(self.num_chunks_repeated);
        buffer.put_slice(&SVZ_FORMAT_ID);
        buffer.put_u32_le(0);
        Ok(())
    }
}

/// One 16 byte chunk table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEntry {
    pub tag: [u8; 4],
    pub marker: [u8; 4],
    pub offset: u32,
    pub size: u32,
}

impl ContainerEntry {
    pub fn new(tag: [u8; 4], marker: [u8; 4], offset: u32, size: u32) -> Self {
        Self {
            tag,
            marker,
            offset,
            size,
        }
    }

    pub fn tag_name(&self) -> String {
        tag_to_string(&self.tag)
    }

    pub fn is(&self, kind: ChunkKind) -> bool {
        self.kind() == Some(kind)
    }

    pub fn kind(&self) -> Option<ChunkKind> {
        std::str::from_utf8(&self.tag)
            .ok()
            .and_then(|tag| CHUNK_KINDS.get(tag).copied())
    }

    /// Byte range of the chunk if it lies within `file_size`
    pub fn range(&self, file_size: usize) -> Option<std::ops::Range<usize>> {
        let start = self.offset as usize;
        let end = start.checked_add(self.size as usize)?;
        (start <= file_size && end <= file_size).then_some(start..end)
    }

    /// Chunk bytes, or an error naming the chunk if it runs past the end
    pub fn slice<'a>(&self, data: &'a [u8]) -> JdResult<&'a [u8]> {
        let range = self.range(data.len()).ok_or_else(|| JdError::TruncatedFile {
            structure: format!("{} chunk", self.tag_name()),
            expected: self.offset as usize + self.size as usize,
            actual: data.len(),
        })?;
        Ok(&data[range])
    }
}

impl ArchiveParser for ContainerEntry {
    fn from_bytes(data: &mut Bytes) -> JdResult<Self> {
        if data.remaining() < ENTRY_SIZE {
            return Err(JdError::TruncatedFile {
                structure: "chunk entry".to_string(),
                expected: ENTRY_SIZE,
                actual: data.remaining(),
            });
        }

        let mut tag = [0u8; 4];
        data.copy_to_slice(&mut tag);
        let mut marker = [0u8; 4];
        data.copy_to_slice(&mut marker);

        Ok(Self {
            tag,
            marker,
            offset: data.get_u32_le(),
            size: data.get_u32_le(),
        })
    }
}

impl ArchiveWriter for ContainerEntry {
    fn to_bytes(&self, buffer: &mut BytesMut) -> JdResult<()> {
        buffer.put_slice(&self.tag);
        buffer.put_slice(&self.marker);
        buffer.put_u32_le(self.offset);
        buffer.put_u32_le(self.size);
        Ok(())
    }
}

/// Identify a container from its leading bytes
pub fn detect_container_kind(data: &[u8]) -> JdResult<ContainerKind> {
    if data.len() >= 4 && data[0..4] == SVZ_MAGIC {
        let mut header = Bytes::copy_from_slice(&data[..data.len().min(ENTRY_SIZE)]);
        return Ok(SvzHeader::from_bytes(&mut header)?.kind());
    }

    if data.len() >= ENTRY_SIZE && data[2..6] == SVD_MAGIC {
        return Ok(ContainerKind::Backup);
    }

    Err(JdError::UnknownFormat {
        details: "no SVZa or SVD5 signature".to_string(),
    })
}

/// Detect the container kind and read its records
pub fn read_container(data: &[u8], config: &ParserConfig) -> JdResult<(ContainerKind, Vec<PatchRecord>)> {
    config.check_input_size(data.len())?;
    let kind = detect_container_kind(data)?;
    let records = match kind {
        ContainerKind::Plugin => read_plugin_container(data, config)?,
        ContainerKind::Hardware => read_hardware_container(data, config)?,
        ContainerKind::Backup => read_backup_container(data, config)?,
    };
    Ok((kind, records))
}
