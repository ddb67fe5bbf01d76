//! Device Memory Image
//!
//! A sentinel-filled model of the synthesizer's address space. Incoming Data
//! Set messages are written at their addresses (decode path); byte ranges are
//! cut back into checksummed messages on the encode path.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dialect::{Dialect, PATCHES_PER_BANK};
use crate::errors::{JdError, JdResult};
use crate::parser_config::{ParserConfig, ResourceTracker, DEFAULT_DEVICE_ID};
use crate::patch::PatchRecord;
use crate::sysex::{DataSetMessage, RawMessage, SysExDemuxer, MAX_PAYLOAD_SIZE};
use crate::traits::ArchiveWriter;

/// Value of every byte no message has written; above the 7-bit data range
pub const SENTINEL: u8 = 0xFE;

/// Length of one line of the JD-800 display dump
pub const DISPLAY_LINE_LENGTH: usize = 22;

/// Effect of one successfully ingested message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored,
    /// The message completed a temporary patch and a snapshot was taken
    Snapshot,
}

/// Per-stream ingest counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub messages: usize,
    pub stored: usize,
    pub snapshots: usize,
    pub ignored: usize,
    pub out_of_bounds: usize,
    pub dialect_mismatches: usize,
}

impl IngestStats {
    fn absorb(&mut self, other: &IngestStats) {
        self.messages += other.messages;
        self.stored += other.stored;
        self.snapshots += other.snapshots;
        self.ignored += other.ignored;
        self.out_of_bounds += other.out_of_bounds;
        self.dialect_mismatches += other.dialect_mismatches;
    }
}

/// Presence of one named region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionStatus {
    pub name: String,
    pub address: u32,
    pub present: bool,
}

/// Where a special setup was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupLocation {
    Internal,
    Temporary,
    Card,
}

/// Borrowed special (rhythm) setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialSetup<'a> {
    pub dialect: Dialect,
    pub location: SetupLocation,
    pub bytes: &'a [u8],
}

impl SpecialSetup<'_> {
    /// JD-990 setups carry a name; the JD-800 has a single drum set
    pub fn name(&self) -> String {
        match self.dialect {
            Dialect::Jd990 => String::from_utf8_lossy(&self.bytes[..16]).trim_end().to_string(),
            _ => "JD-800 Drum Set".to_string(),
        }
    }
}

/// Sparse image of one device's memory
///
/// The dialect is fixed by the first message ingested; the buffer is only
/// allocated then.
#[derive(Debug, Default)]
pub struct DeviceMemoryImage {
    dialect: Option<Dialect>,
    memory: Vec<u8>,
    temporary_patches: Vec<PatchRecord>,
    stats: IngestStats,
}

impl DeviceMemoryImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image with the dialect fixed up front
    pub fn with_dialect(dialect: Dialect) -> JdResult<Self> {
        if !dialect.has_sysex() {
            return Err(JdError::UnsupportedDialect {
                dialect: dialect.to_string(),
            });
        }
        let mut image = Self::new();
        image.establish(dialect);
        Ok(image)
    }

    fn establish(&mut self, dialect: Dialect) {
        debug!("Allocating {} byte {} memory image", dialect.capacity(), dialect);
        self.dialect = Some(dialect);
        self.memory = vec![SENTINEL; dialect.capacity()];
    }

    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    /// True until a message has fixed the dialect
    pub fn is_empty(&self) -> bool {
        self.dialect.is_none()
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Write one Data Set message into the image
    pub fn ingest(&mut self, message: &DataSetMessage) -> JdResult<IngestOutcome> {
        message.verify_checksum()?;

        let dialect = match self.dialect {
            Some(established) if established != message.dialect => {
                return Err(JdError::DialectMismatch {
                    established: established.to_string(),
                    found: message.dialect.to_string(),
                });
            },
            Some(established) => established,
            None => {
                self.establish(message.dialect);
                message.dialect
            },
        };

        let start = message.address as usize;
        let end = message.end_address();
        if end > self.memory.len() {
            return Err(JdError::AddressOutOfBounds {
                address: message.address,
                length: message.payload.len(),
                capacity: self.memory.len(),
            });
        }
        self.memory[start..end].copy_from_slice(&message.payload);

        if message.address == dialect.snapshot_trigger_address() {
            let base = dialect.temporary_patch_address() as usize;
            let record = PatchRecord::from_slice(dialect, &self.memory[base..base + dialect.record_size()])?;
            debug!("Temporary patch snapshot: {}", record.name());
            self.temporary_patches.push(record);
            return Ok(IngestOutcome::Snapshot);
        }

        Ok(IngestOutcome::Stored)
    }

    /// Decode and ingest one demultiplexed message
    pub fn ingest_raw(&mut self, raw: &RawMessage) -> JdResult<IngestOutcome> {
        let message = DataSetMessage::from_raw(raw)?;
        self.ingest(&message)
    }

    /// Demultiplex a `.syx` / `.mid` stream and ingest every message
    ///
    /// Recoverable errors are logged and counted; a fatal error aborts the
    /// stream.
    pub fn ingest_stream(&mut self, data: &[u8], config: &ParserConfig) -> JdResult<IngestStats> {
        config.check_input_size(data.len())?;

        let mut stats = IngestStats::default();
        let mut tracker = ResourceTracker::new();

        for raw in SysExDemuxer::from_slice(data) {
            tracker.track_message(config, raw.len())?;
            stats.messages += 1;

            match self.ingest_raw(&raw) {
                Ok(IngestOutcome::Stored) => stats.stored += 1,
                Ok(IngestOutcome::Snapshot) => {
                    stats.stored += 1;
                    stats.snapshots += 1;
                },
                Err(e) if e.is_recoverable() => {
                    match e {
                        JdError::AddressOutOfBounds { .. } => stats.out_of_bounds += 1,
                        JdError::DialectMismatch { .. } => stats.dialect_mismatches += 1,
                        _ => stats.ignored += 1,
                    }
                    warn!("Ignoring SysEx message: {}", e);
                },
                Err(e) => return Err(e),
            }
        }

        info!(
            "Ingested {} of {} SysEx messages ({} temporary patches)",
            stats.stored, stats.messages, stats.snapshots
        );
        self.stats.absorb(&stats);
        Ok(stats)
    }

    /// Bytes at `address`, `None` if out of range or never written
    pub fn read_region(&self, address: u32, length: usize) -> Option<&[u8]> {
        let start = address as usize;
        let end = start.checked_add(length)?;
        let region = self.memory.get(start..end)?;
        match region.first() {
            Some(&SENTINEL) => None,
            _ => Some(region),
        }
    }

    /// True if the first byte at `address` has been written
    pub fn is_present(&self, address: u32) -> bool {
        self.memory
            .get(address as usize)
            .is_some_and(|&byte| byte != SENTINEL)
    }

    fn record_at(&self, address: u32) -> Option<PatchRecord> {
        let dialect = self.dialect?;
        let bytes = self.read_region(address, dialect.record_size())?;
        PatchRecord::from_slice(dialect, bytes).ok()
    }

    /// Internal patch slot `index`
    pub fn patch(&self, index: usize) -> Option<PatchRecord> {
        if index >= PATCHES_PER_BANK {
            return None;
        }
        self.record_at(self.dialect?.internal_patch_address(index))
    }

    /// Card patch slot `index`, JD-990 only
    pub fn card_patch(&self, index: usize) -> Option<PatchRecord> {
        if index >= PATCHES_PER_BANK {
            return None;
        }
        self.record_at(self.dialect?.card_patch_address(index)?)
    }

    /// Present internal patches with their slot index
    pub fn internal_patches(&self) -> Vec<(usize, PatchRecord)> {
        (0..PATCHES_PER_BANK)
            .filter_map(|index| self.patch(index).map(|record| (index, record)))
            .collect()
    }

    /// Present card patches with their slot index
    pub fn card_patches(&self) -> Vec<(usize, PatchRecord)> {
        (0..PATCHES_PER_BANK)
            .filter_map(|index| self.card_patch(index).map(|record| (index, record)))
            .collect()
    }

    /// Snapshots of the temporary patch, in arrival order
    pub fn temporary_patches(&self) -> &[PatchRecord] {
        &self.temporary_patches
    }

    pub fn setup_at(&self, location: SetupLocation) -> Option<SpecialSetup<'_>> {
        let dialect = self.dialect?;
        let address = match location {
            SetupLocation::Internal => dialect.internal_setup_address(),
            SetupLocation::Temporary => dialect.temporary_setup_address(),
            SetupLocation::Card => dialect.card_setup_address()?,
        };
        let bytes = self.read_region(address, dialect.setup_size())?;
        Some(SpecialSetup {
            dialect,
            location,
            bytes,
        })
    }

    /// Internal special setup, falling back to the temporary one
    pub fn special_setup(&self) -> Option<SpecialSetup<'_>> {
        self.setup_at(SetupLocation::Internal)
            .or_else(|| self.setup_at(SetupLocation::Temporary))
    }

    /// The two lines of a JD-800 display dump
    pub fn display_text(&self) -> Option<(String, String)> {
        if self.dialect? != Dialect::Jd800 {
            return None;
        }
        let address = Dialect::Jd800.regions().iter().find(|r| r.name == "display")?.address;
        let text = self.read_region(address, 2 * DISPLAY_LINE_LENGTH)?;
        let (first, second) = text.split_at(DISPLAY_LINE_LENGTH);
        Some((
            String::from_utf8_lossy(first).to_string(),
            String::from_utf8_lossy(second).to_string(),
        ))
    }

    /// Presence of every named region of the dialect
    pub fn inventory(&self) -> Vec<RegionStatus> {
        let Some(dialect) = self.dialect else {
            return Vec::new();
        };
        dialect
            .regions()
            .iter()
            .map(|region| RegionStatus {
                name: region.name.to_string(),
                address: region.address,
                present: self.is_present(region.address),
            })
            .collect()
    }
}

/// Cut `bytes` into Data Set messages starting at `address`
///
/// Returns the number of messages appended to `sink`.
pub fn emit(sink: &mut BytesMut, address: u32, dialect: Dialect, bytes: &[u8]) -> JdResult<usize> {
    emit_for_device(sink, DEFAULT_DEVICE_ID, address, dialect, bytes)
}

/// Like [`emit`], with an explicit device id byte
pub fn emit_for_device(
    sink: &mut BytesMut,
    device_id: u8,
    address: u32,
    dialect: Dialect,
    bytes: &[u8],
) -> JdResult<usize> {
    // Diagnostic only, the bytes are sent as they are
    for (index, &byte) in bytes.iter().enumerate() {
        if byte >= 0x80 {
            warn!(
                "invalid byte in SysEx data block at {} - either broken parameter conversion or broken SysEx source!",
                index
            );
        }
    }

    // Messages are staged so a failing chunk leaves `sink` untouched
    let mut staged = BytesMut::new();
    let mut address = address;
    let mut count = 0;
    for chunk in bytes.chunks(MAX_PAYLOAD_SIZE) {
        let message = DataSetMessage::new(dialect, device_id, address, chunk.to_vec())?;
        message.to_bytes(&mut staged)?;
        address = address
            .checked_add(chunk.len() as u32)
            .ok_or_else(|| JdError::IntegerOverflow {
                operation: "emit address".to_string(),
                details: format!("0x{:X} + {}", address, chunk.len()),
            })?;
        count += 1;
    }
    sink.extend_from_slice(&staged);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn emitted(address: u32, dialect: Dialect, bytes: &[u8]) -> Vec<u8> {
        let mut sink = BytesMut::new();
        emit(&mut sink, address, dialect, bytes).unwrap();
        sink.to_vec()
    }

    fn message(dialect: Dialect, address: u32, payload: &[u8]) -> DataSetMessage {
        DataSetMessage::new(dialect, 0x10, address, payload.to_vec()).unwrap()
    }

    #[test]
    fn test_two_messages_rebuild_patch_slot() {
        let address = Dialect::Jd800.internal_patch_address(0);
        let first: Vec<u8> = (0..256).map(|i| (i % 128) as u8).collect();
        let second: Vec<u8> = (0..128u8).rev().collect();

        let mut image = DeviceMemoryImage::new();
        assert!(image.is_empty());
        image.ingest(&message(Dialect::Jd800, address, &first)).unwrap();
        assert_eq!(image.patch(0), None);
        image.ingest(&message(Dialect::Jd800, address + 256, &second)).unwrap();

        assert_eq!(image.dialect(), Some(Dialect::Jd800));
        let record = image.patch(0).unwrap();
        assert_eq!(record.as_bytes().len(), 384);
        assert_eq!(&record.as_bytes()[..256], &first[..]);
        assert_eq!(&record.as_bytes()[256..], &second[..]);
        assert_eq!(image.read_region(address, 384), Some(record.as_bytes()));
        assert_eq!(image.read_region(address + 384, 1), None);
    }

    #[test]
    fn test_checksum_mismatch_is_fatal() {
        let mut bad = message(Dialect::Jd800, 0x100, &[1, 2, 3]);
        bad.checksum = (bad.checksum + 1) & 0x7F;

        let mut image = DeviceMemoryImage::new();
        let err = image.ingest(&bad).unwrap_err();
        assert!(matches!(err, JdError::ChecksumMismatch { address: 0x100, .. }));
        assert!(!err.is_recoverable());
        assert_eq!(err.exit_code(), 3);
        assert!(image.is_empty());
    }

    #[test]
    fn test_dialect_mismatch_is_dropped() {
        let mut image = DeviceMemoryImage::new();
        image.ingest(&message(Dialect::Jd990, 0x06 << 21, &[0x20])).unwrap();

        let err = image.ingest(&message(Dialect::Jd800, 0, &[0x21])).unwrap_err();
        assert!(matches!(err, JdError::DialectMismatch { .. }));
        assert!(err.is_recoverable());
        assert_eq!(image.read_region(0, 1), None);
        assert_eq!(image.dialect(), Some(Dialect::Jd990));
    }

    #[test]
    fn test_out_of_bounds_is_dropped() {
        let mut image = DeviceMemoryImage::with_dialect(Dialect::Jd800).unwrap();
        let last = (1u32 << 21) - 2;

        let err = image.ingest(&message(Dialect::Jd800, last, &[1, 2, 3])).unwrap_err();
        assert!(matches!(err, JdError::AddressOutOfBounds { capacity, .. } if capacity == 1 << 21));
        assert_eq!(image.read_region(last, 2), None);

        // Exactly reaching the end is fine
        image.ingest(&message(Dialect::Jd800, last, &[1, 2])).unwrap();
        assert_eq!(image.read_region(last, 2), Some(&[1u8, 2][..]));
        assert_eq!(image.read_region(last, 3), None);
    }

    #[test]
    fn test_temporary_patch_snapshots() {
        let record: Vec<u8> = (0..384).map(|i| (i % 100) as u8).collect();
        let mut sink = BytesMut::new();
        emit(&mut sink, 0, Dialect::Jd800, &record).unwrap();
        emit(&mut sink, 0, Dialect::Jd800, &[0x41; 384]).unwrap();

        let mut image = DeviceMemoryImage::new();
        let stats = image.ingest_stream(&sink, &ParserConfig::default()).unwrap();
        assert_eq!(stats.messages, 4);
        assert_eq!(stats.snapshots, 2);

        let snapshots = image.temporary_patches();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].as_bytes(), &record[..]);
        assert_eq!(snapshots[1].name(), "AAAAAAAAAAAAAAAA");
    }

    #[test]
    fn test_ingest_stream_skips_recoverable() {
        let mut data = emitted(0x06 << 21, Dialect::Jd990, &[0x10; 8]);
        // Foreign manufacturer
        data.extend_from_slice(&[0xF0, 0x43, 0x10, 0x00, 0x00, 0x00, 0xF7]);
        // Other dialect
        data.extend(emitted(0, Dialect::Jd800, &[0x10]));
        // Past the end of the address space
        let mut far = BytesMut::new();
        message(Dialect::Jd990, 0x0FFF_FFFF, &[0x10, 0x11]).to_bytes(&mut far).unwrap();
        data.extend_from_slice(&far);

        let mut image = DeviceMemoryImage::new();
        let stats = image.ingest_stream(&data, &ParserConfig::default()).unwrap();
        assert_eq!(stats.messages, 4);
        assert_eq!(stats.stored, 1);
        assert_eq!(stats.ignored, 1);
        assert_eq!(stats.dialect_mismatches, 1);
        assert_eq!(stats.out_of_bounds, 1);
        assert_eq!(image.stats(), &stats);
    }

    #[test]
    fn test_ingest_stream_aborts_on_bad_checksum() {
        let mut data = emitted(0x06 << 21, Dialect::Jd990, &[0x10; 8]);
        let cks_index = data.len() - 2;
        data[cks_index] ^= 0x01;

        let mut image = DeviceMemoryImage::new();
        assert!(matches!(
            image.ingest_stream(&data, &ParserConfig::default()),
            Err(JdError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_ingest_stream_message_limit() {
        let data = emitted(0x06 << 21, Dialect::Jd990, &[0x10; 1024]);
        let config = ParserConfig {
            max_messages: 2,
            ..ParserConfig::default()
        };
        assert!(matches!(
            DeviceMemoryImage::new().ingest_stream(&data, &config),
            Err(JdError::DataSizeExceedsLimit { .. })
        ));
    }

    #[test]
    fn test_emit_chunking() {
        let bytes = vec![0x01u8; 600];
        let mut sink = BytesMut::new();
        assert_eq!(emit(&mut sink, 0x05 << 14, Dialect::Jd800, &bytes).unwrap(), 3);

        // 3 headers of 8 bytes, 2 trailer bytes each
        assert_eq!(sink.len(), 600 + 3 * 10);
        assert_eq!(&sink[..8], &[0xF0, 0x41, 0x10, 0x3D, 0x12, 0x05, 0x00, 0x00]);
        let second = 8 + 256 + 2;
        assert_eq!(&sink[second..second + 8], &[0xF0, 0x41, 0x10, 0x3D, 0x12, 0x05, 0x02, 0x00]);

        assert_eq!(emit(&mut BytesMut::new(), 0, Dialect::Jd800, &[]).unwrap(), 0);
        assert!(matches!(
            emit(&mut BytesMut::new(), 0, Dialect::Vst, &[1]),
            Err(JdError::UnsupportedDialect { .. })
        ));
        assert!(matches!(
            emit(&mut BytesMut::new(), (1 << 21) - 1, Dialect::Jd800, &[0; 300]),
            Err(JdError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_failed_emit_leaves_sink_untouched() {
        let mut sink = BytesMut::from(&b"kept"[..]);
        let result = emit(&mut sink, (1 << 21) - 256, Dialect::Jd800, &[0u8; 300]);

        assert!(matches!(result, Err(JdError::InvalidAddress { .. })));
        assert_eq!(&sink[..], b"kept");
    }

    #[test]
    fn test_emit_device_id() {
        let mut sink = BytesMut::new();
        emit_for_device(&mut sink, 0x11, 0, Dialect::Jd990, &[0x00]).unwrap();
        assert_eq!(sink[2], 0x11);
        assert_eq!(sink[3], 0x57);
    }

    #[test]
    fn test_patch_bank_and_setup_access() {
        let mut image = DeviceMemoryImage::with_dialect(Dialect::Jd990).unwrap();
        assert!(image.patch(0).is_none());
        assert!(image.special_setup().is_none());

        let mut record = vec![0u8; 486];
        record[..16].copy_from_slice(b"Second Slot     ");
        let mut sink = BytesMut::new();
        emit(&mut sink, Dialect::Jd990.internal_patch_address(1), Dialect::Jd990, &record).unwrap();
        let mut setup = vec![0u8; 6524];
        setup[..16].copy_from_slice(b"Drum Kit        ");
        emit(&mut sink, Dialect::Jd990.temporary_setup_address(), Dialect::Jd990, &setup).unwrap();
        image.ingest_stream(&sink, &ParserConfig::default()).unwrap();

        assert!(image.patch(0).is_none());
        assert_eq!(image.patch(1).unwrap().name(), "Second Slot");
        assert!(image.patch(PATCHES_PER_BANK).is_none());
        assert_eq!(image.internal_patches().len(), 1);
        assert!(image.card_patch(1).is_none());
        assert!(image.card_patches().is_empty());

        let special = image.special_setup().unwrap();
        assert_eq!(special.location, SetupLocation::Temporary);
        assert_eq!(special.name(), "Drum Kit");
        assert!(image.setup_at(SetupLocation::Internal).is_none());
    }

    #[test]
    fn test_card_setup_and_patches() {
        let dialect = Dialect::Jd990;
        let mut setup = vec![0x20u8; dialect.setup_size()];
        setup[..8].copy_from_slice(b"Card Kit");
        let mut record = vec![0x20u8; dialect.record_size()];
        record[..9].copy_from_slice(b"Card Lead");

        let mut sink = BytesMut::new();
        emit(&mut sink, dialect.card_setup_address().unwrap(), dialect, &setup).unwrap();
        emit(&mut sink, dialect.card_patch_address(7).unwrap(), dialect, &record).unwrap();
        let mut image = DeviceMemoryImage::new();
        image.ingest_stream(&sink, &ParserConfig::default()).unwrap();

        let card = image.setup_at(SetupLocation::Card).unwrap();
        assert_eq!(card.name(), "Card Kit");
        assert!(image.special_setup().is_none());

        let cards = image.card_patches();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].0, 7);
        assert_eq!(cards[0].1.name(), "Card Lead");

        let jd800 = DeviceMemoryImage::with_dialect(Dialect::Jd800).unwrap();
        assert!(jd800.setup_at(SetupLocation::Card).is_none());
    }

    #[test]
    fn test_inventory_and_display() {
        let mut image = DeviceMemoryImage::new();
        assert!(image.inventory().is_empty());

        let mut sink = BytesMut::new();
        emit(&mut sink, 0x07 << 14, Dialect::Jd800, b"  JD-800 Programmable      Synthesizer      ").unwrap();
        emit(&mut sink, 0x02 << 14, Dialect::Jd800, &[0x00; 8]).unwrap();
        image.ingest_stream(&sink, &ParserConfig::default()).unwrap();

        let inventory = image.inventory();
        assert_eq!(inventory.len(), Dialect::Jd800.regions().len());
        let present: Vec<&str> = inventory.iter().filter(|r| r.present).map(|r| r.name.as_str()).collect();
        assert_eq!(present, vec!["system", "display"]);

        let (first, second) = image.display_text().unwrap();
        assert_eq!(first, "  JD-800 Programmable ");
        assert_eq!(second, "     Synthesizer      ");
        assert!(image.temporary_patches().is_empty());
    }

    #[test]
    fn test_with_dialect_rejects_vst() {
        assert!(matches!(
            DeviceMemoryImage::with_dialect(Dialect::Vst),
            Err(JdError::UnsupportedDialect { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_emit_ingest_round_trip(
            payload in prop::collection::vec(0u8..0x80, 1..10_000),
            jd990 in any::<bool>(),
        ) {
            let dialect = if jd990 { Dialect::Jd990 } else { Dialect::Jd800 };
            let address = dialect.internal_patch_address(0);

            let mut image = DeviceMemoryImage::new();
            image.ingest_stream(&emitted(address, dialect, &payload), &ParserConfig::default()).unwrap();
            prop_assert_eq!(image.read_region(address, payload.len()), Some(&payload[..]));
        }

        #[test]
        fn prop_emitted_messages_satisfy_checksum_law(
            payload in prop::collection::vec(0u8..0x80, 1..1_000),
            offset in 0u32..0x1000,
        ) {
            let address = Dialect::Jd990.internal_patch_address(0) + offset;
            for raw in SysExDemuxer::from_slice(&emitted(address, Dialect::Jd990, &payload)) {
                let message = DataSetMessage::from_raw(&raw).unwrap();
                prop_assert!(message.payload.len() <= MAX_PAYLOAD_SIZE);
                prop_assert_eq!(message.checksum_residue(), 0);
            }
        }

        #[test]
        fn prop_ingest_is_idempotent(
            payload in prop::collection::vec(0u8..0x80, 1..600),
        ) {
            let address = Dialect::Jd800.internal_patch_address(3);
            let data = emitted(address, Dialect::Jd800, &payload);

            let mut once = DeviceMemoryImage::new();
            once.ingest_stream(&data, &ParserConfig::default()).unwrap();
            let mut twice = DeviceMemoryImage::new();
            twice.ingest_stream(&data, &ParserConfig::default()).unwrap();
            twice.ingest_stream(&data, &ParserConfig::default()).unwrap();

            prop_assert_eq!(once.read_region(address, payload.len()), twice.read_region(address, payload.len()));
        }

        #[test]
        fn prop_out_of_range_never_panics(address in 0u32..(1 << 21), length in 1usize..512) {
            let mut image = DeviceMemoryImage::with_dialect(Dialect::Jd800).unwrap();
            let result = image.ingest(&message(Dialect::Jd800, address, &vec![0x11; length]));
            if address as usize + length > Dialect::Jd800.capacity() {
                prop_assert!(
                    matches!(result, Err(JdError::AddressOutOfBounds { .. })),
                    "expected AddressOutOfBounds"
                );
            } else {
                prop_assert!(result.is_ok());
            }
        }
    }
}
