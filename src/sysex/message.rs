//! Data Set Messages
//!
//! Decoding of raw SysEx bodies into address-tagged Data Set messages and
//! the inverse framing used on the encode path.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::dialect::Dialect;
use crate::errors::{JdError, JdResult};
use crate::traits::{ArchiveParser, ArchiveWriter};
use crate::utils::{checksum_residue, decode_address, encode_address, roland_checksum, SYSEX_END, SYSEX_START};

/// Roland manufacturer id
pub const ROLAND_ID: u8 = 0x41;

/// Data Set (DT1) command id
pub const CMD_DATA_SET: u8 = 0x12;

/// Largest payload the devices accept in one message
pub const MAX_PAYLOAD_SIZE: usize = 256;

/// Unvalidated SysEx body: everything after `F0`, up to and including `F7`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawMessage {
    pub bytes: Vec<u8>,
}

impl RawMessage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn is_terminated(&self) -> bool {
        self.bytes.last() == Some(&SYSEX_END)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A Roland Data Set message addressed at device memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSetMessage {
    pub manufacturer: u8,
    pub device_id: u8,
    pub dialect: Dialect,
    pub address: u32,
    pub payload: Vec<u8>,
    pub checksum: u8,
}

impl DataSetMessage {
    /// Build a message with a freshly computed checksum
    pub fn new(dialect: Dialect, device_id: u8, address: u32, payload: Vec<u8>) -> JdResult<Self> {
        if !dialect.has_sysex() {
            return Err(JdError::UnsupportedDialect {
                dialect: dialect.to_string(),
            });
        }

        let mut summed = encode_address(address, dialect.address_digits())?;
        summed.extend_from_slice(&payload);
        let checksum = roland_checksum(&summed);

        Ok(Self {
            manufacturer: ROLAND_ID,
            device_id,
            dialect,
            address,
            payload,
            checksum,
        })
    }

    /// Decode a demultiplexed SysEx body
    pub fn from_raw(raw: &RawMessage) -> JdResult<Self> {
        let mut data = Bytes::copy_from_slice(&raw.bytes);
        Self::from_bytes(&mut data)
    }

    fn address_bytes(&self) -> Vec<u8> {
        (0..self.dialect.address_digits())
            .rev()
            .map(|digit| ((self.address >> (7 * digit)) & 0x7F) as u8)
            .collect()
    }

    /// 7-bit sum of address, payload and checksum; zero for an intact message
    pub fn checksum_residue(&self) -> u8 {
        let mut summed = self.address_bytes();
        summed.extend_from_slice(&self.payload);
        summed.push(self.checksum);
        checksum_residue(&summed)
    }

    pub fn verify_checksum(&self) -> JdResult<()> {
        match self.checksum_residue() {
            0 => Ok(()),
            residue => Err(JdError::ChecksumMismatch {
                address: self.address,
                residue,
            }),
        }
    }

    /// First address past the payload
    pub fn end_address(&self) -> usize {
        self.address as usize + self.payload.len()
    }
}

impl ArchiveParser for DataSetMessage {
    fn from_bytes(data: &mut Bytes) -> JdResult<Self> {
        let length = data.len();
        if length < 6 {
            return Err(JdError::MessageTooShort { length, minimum: 6 });
        }
        if data.last() == Some(&SYSEX_END) {
            data.truncate(length - 1);
        }

        let manufacturer = data.get_u8();
        if manufacturer != ROLAND_ID {
            return Err(JdError::ForeignMessage {
                reason: format!("not a Roland device (manufacturer 0x{:02X})", manufacturer),
            });
        }

        let device_id = data.get_u8();
        let model_id = data.get_u8();
        let dialect = Dialect::from_model_id(model_id).ok_or_else(|| JdError::ForeignMessage {
            reason: format!("not a JD-800 or JD-990 message (model 0x{:02X})", model_id),
        })?;

        let command = data.get_u8();
        if command != CMD_DATA_SET {
            return Err(JdError::ForeignMessage {
                reason: format!("not a Data Set message (command 0x{:02X})", command),
            });
        }

        let digits = dialect.address_digits();
        if data.remaining() < digits + 1 {
            return Err(JdError::MessageTooShort {
                length,
                minimum: 4 + digits + 2,
            });
        }

        let address = decode_address(&data.split_to(digits));
        let payload = data.split_to(data.remaining() - 1).to_vec();
        let checksum = data.get_u8();

        Ok(Self {
            manufacturer,
            device_id,
            dialect,
            address,
            payload,
            checksum,
        })
    }
}

impl ArchiveWriter for DataSetMessage {
    fn to_bytes(&self, buffer: &mut BytesMut) -> JdResult<()> {
        let model_id = self.dialect.model_id().ok_or_else(|| JdError::UnsupportedDialect {
            dialect: self.dialect.to_string(),
        })?;

        buffer.put_u8(SYSEX_START);
        buffer.put_u8(self.manufacturer);
        buffer.put_u8(self.device_id);
        buffer.put_u8(model_id);
        buffer.put_u8(CMD_DATA_SET);
        buffer.put(&encode_address(self.address, self.dialect.address_digits())?[..]);
        buffer.put(&self.payload[..]);
        buffer.put_u8(self.checksum);
        buffer.put_u8(SYSEX_END);
        Ok(())
    }
}
