use bytes::Buf;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::{Compression, Crc};
use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::container::{detect_container_kind, ContainerKind};
use crate::errors::{JdError, JdResult};

/// Standard MIDI File header magic
pub const SMF_MAGIC: [u8; 4] = *b"MThd";

/// Standard MIDI File track magic
pub const TRACK_MAGIC: [u8; 4] = *b"MTrk";

/// SysEx start marker
pub const SYSEX_START: u8 = 0xF0;

/// SysEx end marker (EOX)
pub const SYSEX_END: u8 = 0xF7;

/// How an input has to be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    /// Flat stream of SysEx messages (.syx)
    SysEx,
    /// Standard MIDI File carrying SysEx events (.mid)
    MidiFile,
    /// One of the chunked containers
    Container(ContainerKind),
}

/// Detect if data is a Standard MIDI File by checking magic bytes
pub fn is_smf(data: &[u8]) -> bool {
    data.len() >= 4 && data[0..4] == SMF_MAGIC
}

/// Route an input by sniffing its leading bytes
pub fn detect_stream_kind(data: &[u8]) -> JdResult<StreamKind> {
    if is_smf(data) {
        return Ok(StreamKind::MidiFile);
    }

    match detect_container_kind(data) {
        Ok(kind) => return Ok(StreamKind::Container(kind)),
        Err(JdError::UnknownFormat { .. }) => {},
        // Container signature with a broken header
        Err(e) => return Err(e),
    }

    // Raw dumps may carry leading garbage; the demuxer scans for the start marker
    if data.contains(&SYSEX_START) {
        return Ok(StreamKind::SysEx);
    }

    Err(JdError::UnknownFormat {
        details: "input is neither SysEx, a MIDI file, nor a known container".to_string(),
    })
}

/// Maximum length of a MIDI variable-length quantity
pub const MAX_VAR_LEN_BYTES: usize = 4;

/// Read a MIDI variable-length quantity
///
/// Returns the value and the number of bytes consumed, or `None` if the
/// buffer ends before a byte with a clear high bit.
pub fn read_var_len<B: Buf>(buf: &mut B) -> Option<(u32, usize)> {
    let mut value = 0u32;
    for consumed in 1..=MAX_VAR_LEN_BYTES {
        if !buf.has_remaining() {
            return None;
        }
        let byte = buf.get_u8();
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Some((value, consumed));
        }
    }
    // Longer quantities are malformed, stop at the fourth byte
    Some((value, MAX_VAR_LEN_BYTES))
}

/// Encode a variable-length quantity
pub fn encode_var_len(mut value: u32) -> Vec<u8> {
    let mut out = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        out.push(((value & 0x7F) as u8) | 0x80);
        value >>= 7;
    }
    out.reverse();
    out
}

/// Split an address into big-endian base-128 digits
pub fn encode_address(address: u32, digits: usize) -> JdResult<Vec<u8>> {
    if digits == 0 || digits > 4 || address >> (7 * digits) != 0 {
        return Err(JdError::InvalidAddress { address, digits });
    }
    Ok((0..digits)
        .rev()
        .map(|digit| ((address >> (7 * digit)) & 0x7F) as u8)
        .collect())
}

/// Join big-endian base-128 digits into an address
pub fn decode_address(digits: &[u8]) -> u32 {
    digits
        .iter()
        .fold(0u32, |address, &digit| (address << 7) | (digit & 0x7F) as u32)
}

/// Two's complement (mod 128) of the sum of `bytes`
///
/// Appending this value makes the 7-bit sum of the whole range zero.
pub fn roland_checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    (!sum).wrapping_add(1) & 0x7F
}

/// Residue of a range that already includes its checksum byte, zero when valid
pub fn checksum_residue(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) & 0x7F
}

/// CRC32 (IEEE) as used by zlib
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

/// Inflate a zlib stream that must produce exactly `expected_size` bytes
pub fn inflate_exact(compressed: &[u8], expected_size: usize) -> JdResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut decompressed = Vec::with_capacity(expected_size);

    decoder
        .by_ref()
        .take(expected_size as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| JdError::DecompressionFailed {
            stage: "inflate".to_string(),
            details: e.to_string(),
        })?;

    if decompressed.len() != expected_size {
        return Err(JdError::DecompressionFailed {
            stage: "inflate".to_string(),
            details: format!(
                "expected {} bytes, stream produced {}{}",
                expected_size,
                decompressed.len().min(expected_size),
                if decompressed.len() > expected_size { "+" } else { "" }
            ),
        });
    }

    Ok(decompressed)
}

/// Deflate into a zlib stream
pub fn deflate(data: &[u8], level: u32) -> JdResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(data, Compression::new(level.min(9)));
    let mut compressed = Vec::new();
    encoder
        .read_to_end(&mut compressed)
        .map_err(|e| JdError::DecompressionFailed {
            stage: "deflate".to_string(),
            details: e.to_string(),
        })?;
    Ok(compressed)
}

/// Render a 4 byte tag for messages
pub fn tag_to_string(tag: &[u8]) -> String {
    String::from_utf8_lossy(tag).to_string()
}
