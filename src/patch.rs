//! Patch Records
//!
//! Fixed-length patch blobs as handed to and received from the external
//! patch store. The core never looks inside a record beyond its name and,
//! for software records, the 16 byte ZEN header.

use byteorder::{ByteOrder, LittleEndian};
use tracing::warn;

use crate::bank::patch_label;
use crate::dialect::Dialect;
use crate::errors::{JdError, JdResult};

/// Length of a patch name
pub const NAME_LENGTH: usize = 16;

/// Length of the ZEN header leading every software record
pub const ZEN_HEADER_SIZE: usize = 16;

/// ZEN header written into every record read from a container:
/// model ids 3 and 5, rating 0, then 100
pub const DEFAULT_ZEN_HEADER: [u8; ZEN_HEADER_SIZE] = [3, 0, 5, 0, 0, 0, 100, 0, 0, 0, 0, 0, 0, 0, 0, 0];

/// Model ids identifying a JD-800 software record
pub const JD800_ZEN_MODEL: (u16, u16) = (3, 5);

/// End of the name to unison range; everything after is reserved
pub const VST_BODY_END: usize = 2032;

/// A patch blob whose length matches its dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRecord {
    dialect: Dialect,
    bytes: Vec<u8>,
}

impl PatchRecord {
    pub fn new(dialect: Dialect, bytes: Vec<u8>) -> JdResult<Self> {
        if bytes.len() != dialect.record_size() {
            return Err(JdError::InvalidRecordLength {
                dialect: dialect.to_string(),
                expected: dialect.record_size(),
                actual: bytes.len(),
            });
        }
        Ok(Self { dialect, bytes })
    }

    pub fn from_slice(dialect: Dialect, bytes: &[u8]) -> JdResult<Self> {
        Self::new(dialect, bytes.to_vec())
    }

    /// Empty record whose name is all spaces
    pub fn blank(dialect: Dialect) -> Self {
        let mut bytes = vec![0u8; dialect.record_size()];
        if dialect == Dialect::Vst {
            bytes[..ZEN_HEADER_SIZE].copy_from_slice(&DEFAULT_ZEN_HEADER);
        }
        let offset = dialect.name_offset();
        bytes[offset..offset + NAME_LENGTH].fill(b' ');
        Self { dialect, bytes }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn raw_name(&self) -> &[u8] {
        let offset = self.dialect.name_offset();
        &self.bytes[offset..offset + NAME_LENGTH]
    }

    /// Patch name with trailing padding removed
    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.raw_name()).trim_end().to_string()
    }

    /// ZEN header model ids, software records only
    pub fn zen_model_ids(&self) -> Option<(u16, u16)> {
        match self.dialect {
            Dialect::Vst => Some((
                LittleEndian::read_u16(&self.bytes[0..2]),
                LittleEndian::read_u16(&self.bytes[2..4]),
            )),
            _ => None,
        }
    }

    /// True for software records written by another ZEN-Core model
    pub fn is_foreign_model(&self) -> bool {
        self.zen_model_ids()
            .is_some_and(|ids| ids != JD800_ZEN_MODEL)
    }
}

/// Replace records of other synth models with blank ones
///
/// Returns the number of records replaced.
pub fn filter_foreign_models(records: &mut [PatchRecord]) -> usize {
    let count = records.len();
    let mut replaced = 0;
    for (index, record) in records.iter_mut().enumerate() {
        if record.is_foreign_model() {
            warn!(
                "Ignoring patch {}, appears to be for another synth model!",
                patch_label(index, count, false)
            );
            *record = PatchRecord::blank(Dialect::Vst);
            replaced += 1;
        }
    }
    replaced
}
