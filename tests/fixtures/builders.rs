//! Archive Test Data Builders
//!
//! Builder pattern implementations for SysEx dumps, Standard MIDI Files and
//! JD-08 backup templates.

use bytes::BytesMut;
use jd_archive::container::slots::backup_slot;
use jd_archive::utils::{encode_address, encode_var_len, roland_checksum};
use jd_archive::{Dialect, JdResult, PatchRecord, DEFAULT_ZEN_HEADER};

/// Builder for flat `.syx` dumps
#[derive(Debug)]
pub struct SysExBuilder {
    dialect: Dialect,
    device_id: u8,
    data: Vec<u8>,
}

impl Default for SysExBuilder {
    fn default() -> Self {
        Self::new(Dialect::Jd800)
    }
}

impl SysExBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            device_id: 0x10,
            data: Vec::new(),
        }
    }

    pub fn device_id(mut self, device_id: u8) -> Self {
        self.device_id = device_id;
        self
    }

    /// One Data Set message, without splitting
    pub fn data_set(self, address: u32, payload: &[u8]) -> Self {
        self.data_set_with_checksum_offset(address, payload, 0)
    }

    /// Data Set message whose checksum is off by `offset`
    pub fn data_set_with_checksum_offset(mut self, address: u32, payload: &[u8], offset: u8) -> Self {
        let model_id = self.dialect.model_id().unwrap_or(0x3D);
        let address = encode_address(address, self.dialect.address_digits()).unwrap();

        let mut summed = address.clone();
        summed.extend_from_slice(payload);
        let checksum = roland_checksum(&summed).wrapping_add(offset) & 0x7F;

        self.data.extend_from_slice(&[0xF0, 0x41, self.device_id, model_id, 0x12]);
        self.data.extend_from_slice(&address);
        self.data.extend_from_slice(payload);
        self.data.extend_from_slice(&[checksum, 0xF7]);
        self
    }

    /// A record cut into 256 byte messages like a device dump
    pub fn record(mut self, address: u32, bytes: &[u8]) -> Self {
        for (index, chunk) in bytes.chunks(256).enumerate() {
            self = self.data_set(address + (index * 256) as u32, chunk);
        }
        self
    }

    /// Arbitrary bytes, e.g. messages from other manufacturers
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

/// Builder for one `MTrk` chunk
#[derive(Debug, Default)]
pub struct TrackBuilder {
    events: Vec<u8>,
}

impl TrackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event bytes following a delta time
    pub fn event(mut self, delta: u32, bytes: &[u8]) -> Self {
        self.events.extend(encode_var_len(delta));
        self.events.extend_from_slice(bytes);
        self
    }

    pub fn meta(self, delta: u32, meta_type: u8, data: &[u8]) -> Self {
        let mut bytes = vec![0xFF, meta_type];
        bytes.extend(encode_var_len(data.len() as u32));
        bytes.extend_from_slice(data);
        self.event(delta, &bytes)
    }

    /// Wrap a complete `F0 .. F7` message as a SysEx event
    pub fn sysex(self, delta: u32, message: &[u8]) -> Self {
        let body = &message[1..];
        let mut bytes = vec![0xF0];
        bytes.extend(encode_var_len(body.len() as u32));
        bytes.extend_from_slice(body);
        self.event(delta, &bytes)
    }

    /// Every message of a flat dump as its own event
    pub fn sysex_dump(mut self, dump: &[u8]) -> Self {
        for message in split_messages(dump) {
            self = self.sysex(0, &message);
        }
        self
    }

    pub fn end_of_track(self) -> Self {
        self.meta(0, 0x2F, &[])
    }

    pub fn build(self) -> Vec<u8> {
        let mut chunk = b"MTrk".to_vec();
        chunk.extend_from_slice(&(self.events.len() as u32).to_be_bytes());
        chunk.extend(self.events);
        chunk
    }
}

/// Builder for Standard MIDI Files
#[derive(Debug, Default)]
pub struct SmfBuilder {
    tracks: Vec<TrackBuilder>,
}

impl SmfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track<F>(mut self, f: F) -> Self
    where
        F: FnOnce(TrackBuilder) -> TrackBuilder,
    {
        self.tracks.push(f(TrackBuilder::new()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut data = b"MThd".to_vec();
        data.extend_from_slice(&6u32.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&(self.tracks.len() as u16).to_be_bytes());
        data.extend_from_slice(&480u16.to_be_bytes());
        for track in self.tracks {
            data.extend(track.build());
        }
        data
    }
}

/// Split a flat dump into its `F0 .. F7` messages
pub fn split_messages(dump: &[u8]) -> Vec<Vec<u8>> {
    let mut messages = Vec::new();
    let mut current: Option<Vec<u8>> = None;
    for &byte in dump {
        if byte == 0xF0 {
            current = Some(Vec::new());
        }
        if let Some(message) = current.as_mut() {
            message.push(byte);
            if byte == 0xF7 {
                messages.extend(current.take());
            }
        }
    }
    messages
}

/// Builder for JD-08 backup files used as write templates
#[derive(Debug, Default)]
pub struct BackupTemplateBuilder {
    chunks: Vec<([u8; 4], Vec<u8>)>,
}

impl BackupTemplateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk(mut self, tag: &[u8; 4], body: &[u8]) -> Self {
        self.chunks.push((*tag, body.to_vec()));
        self
    }

    /// `PATa` chunk holding `records`
    pub fn patches(self, records: &[PatchRecord]) -> JdResult<Self> {
        let mut body = BytesMut::new();
        for word in [records.len() as u32, 2048, 16, 0] {
            body.extend_from_slice(&word.to_le_bytes());
        }
        for record in records {
            body.extend_from_slice(&backup_slot(record)?);
        }
        Ok(self.chunk(b"PATa", &body))
    }

    /// Template resembling a device backup
    pub fn typical() -> JdResult<Self> {
        Self::new()
            .chunk(b"PRFa", &[0x50; 400])
            .chunk(b"SYSa", &(0..=255u8).collect::<Vec<_>>())
            .patches(&vst_bank(4))
            .map(|builder| builder.chunk(b"DIFa", &[1, 0, 0, 0]))
    }

    pub fn build(self) -> Vec<u8> {
        let header_size = 14 + 16 * self.chunks.len();
        let mut data = (header_size as u16).to_le_bytes().to_vec();
        data.extend_from_slice(b"SVD5");
        data.extend_from_slice(&[0; 10]);

        let mut offset = 16 + 16 * self.chunks.len();
        for (tag, body) in &self.chunks {
            data.extend_from_slice(tag);
            data.extend_from_slice(b"DD07");
            data.extend_from_slice(&(offset as u32).to_le_bytes());
            data.extend_from_slice(&(body.len() as u32).to_le_bytes());
            offset += body.len();
        }
        for (_, body) in self.chunks {
            data.extend(body);
        }
        data
    }
}

/// Hardware record named `name` with a recognisable body
pub fn hardware_record(dialect: Dialect, name: &str, seed: u8) -> PatchRecord {
    let mut bytes = PatchRecord::blank(dialect).into_bytes();
    for (index, byte) in bytes.iter_mut().enumerate().skip(16) {
        *byte = (index as u8).wrapping_add(seed) & 0x7F;
    }
    bytes[..name.len()].copy_from_slice(name.as_bytes());
    PatchRecord::new(dialect, bytes).unwrap()
}

/// Software record that passes through slot conversions unchanged
pub fn vst_record(name: &str, seed: u8) -> PatchRecord {
    let mut bytes = vec![0u8; Dialect::Vst.record_size()];
    bytes[..16].copy_from_slice(&DEFAULT_ZEN_HEADER);
    bytes[16..32].fill(b' ');
    bytes[16..16 + name.len()].copy_from_slice(name.as_bytes());
    for (index, byte) in bytes[32..2032].iter_mut().enumerate() {
        *byte = (index as u8).wrapping_mul(seed | 1) & 0x7F;
    }
    PatchRecord::new(Dialect::Vst, bytes).unwrap()
}

pub fn vst_bank(count: usize) -> Vec<PatchRecord> {
    (0..count).map(|i| vst_record(&format!("Patch {}", i + 1), i as u8)).collect()
}
