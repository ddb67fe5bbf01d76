pub mod bank;
pub mod container;
pub mod dialect;
pub mod errors;
pub mod memory;
pub mod parser_config;
pub mod patch;
pub mod sysex;
pub mod traits;
pub mod utils;

pub use bank::*;
pub use container::{read_container, ContainerEntry, ContainerKind};
pub use dialect::*;
pub use errors::*;
pub use memory::*;
pub use parser_config::*;
pub use patch::*;
pub use sysex::{DataSetMessage, RawMessage, SysExDemuxer};
pub use traits::*;
pub use utils::{detect_stream_kind, StreamKind};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Everything loaded from one or more input files
///
/// SysEx and MIDI inputs are ingested into a single memory image, later
/// inputs overwriting earlier ones. Container inputs replace the record list.
#[derive(Debug, Default)]
pub struct PatchArchive {
    pub image: DeviceMemoryImage,
    pub records: Vec<PatchRecord>,
    pub container: Option<ContainerKind>,
    pub inputs: Vec<StreamKind>,
}

impl PatchArchive {
    /// Load an archive from path with default limits
    pub fn from_path(path: &str) -> JdResult<Self> {
        Self::from_paths_with_config(&[path], &ParserConfig::default())
    }

    /// Load and merge several inputs in order
    pub fn from_paths(paths: &[&str]) -> JdResult<Self> {
        Self::from_paths_with_config(paths, &ParserConfig::default())
    }

    pub fn from_paths_with_config(paths: &[&str], config: &ParserConfig) -> JdResult<Self> {
        let mut archive = Self::default();
        for path in paths {
            let data = std::fs::read(path).map_err(|e| io_error(path, e))?;
            debug!("Loading {} ({} bytes)", path, data.len());
            archive.add_bytes(&data, config)?;
        }
        archive.finish()
    }

    pub fn from_bytes(data: &[u8]) -> JdResult<Self> {
        Self::from_bytes_with_config(data, &ParserConfig::default())
    }

    pub fn from_bytes_with_config(data: &[u8], config: &ParserConfig) -> JdResult<Self> {
        let mut archive = Self::default();
        archive.add_bytes(data, config)?;
        archive.finish()
    }

    /// Merge one more input into the archive
    pub fn add_bytes(&mut self, data: &[u8], config: &ParserConfig) -> JdResult<StreamKind> {
        config.check_input_size(data.len())?;
        let kind = detect_stream_kind(data)?;

        match kind {
            StreamKind::SysEx | StreamKind::MidiFile => {
                self.image.ingest_stream(data, config)?;
            },
            StreamKind::Container(_) => {
                let (container, records) = read_container(data, config)?;
                info!("Read {} patches from {:?} container", records.len(), container);
                self.container = Some(container);
                self.records = records;
            },
        }

        self.inputs.push(kind);
        Ok(kind)
    }

    fn finish(self) -> JdResult<Self> {
        if self.is_empty() {
            return Err(JdError::NoPatchData);
        }
        Ok(self)
    }

    /// True when neither SysEx data nor container records were found
    pub fn is_empty(&self) -> bool {
        self.image.is_empty() && self.records.is_empty()
    }

    /// Dialect of the SysEx image, or the software dialect for container records
    pub fn dialect(&self) -> Option<Dialect> {
        self.image
            .dialect()
            .or_else(|| (!self.records.is_empty()).then_some(Dialect::Vst))
    }

    pub fn summary(&self) -> ArchiveSummary {
        let labelled = |records: &[PatchRecord]| -> Vec<PatchEntry> {
            records
                .iter()
                .enumerate()
                .map(|(index, record)| PatchEntry {
                    label: patch_label(index, records.len(), false),
                    name: record.name(),
                })
                .collect()
        };

        let slotted = |slots: Vec<(usize, PatchRecord)>, card: bool| -> Vec<PatchEntry> {
            slots
                .into_iter()
                .map(|(index, record)| PatchEntry {
                    label: patch_label(index, PATCHES_PER_BANK, card),
                    name: record.name(),
                })
                .collect()
        };

        ArchiveSummary {
            dialect: self.dialect(),
            inputs: self.inputs.clone(),
            container: self.container,
            stats: self.image.stats().clone(),
            regions: self.image.inventory(),
            display: self.image.display_text(),
            special_setup: self.image.special_setup().map(|setup| setup.name()),
            internal_patches: slotted(self.image.internal_patches(), false),
            card_patches: slotted(self.image.card_patches(), true),
            temporary_patches: labelled(self.image.temporary_patches()),
            records: labelled(&self.records),
        }
    }
}

/// Label and name of one listed patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub label: String,
    pub name: String,
}

/// Listing of an archive's contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub dialect: Option<Dialect>,
    pub inputs: Vec<StreamKind>,
    pub container: Option<ContainerKind>,
    pub stats: IngestStats,
    pub regions: Vec<RegionStatus>,
    pub display: Option<(String, String)>,
    pub special_setup: Option<String>,
    pub internal_patches: Vec<PatchEntry>,
    pub card_patches: Vec<PatchEntry>,
    pub temporary_patches: Vec<PatchEntry>,
    pub records: Vec<PatchEntry>,
}

impl ArchiveSummary {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
