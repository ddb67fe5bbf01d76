use crate::errors::{JdError, JdResult};

/// Roland device id used for outgoing Data Set messages
pub const DEFAULT_DEVICE_ID: u8 = 0x10;

/// Configuration for resource limits and codec options
///
/// Limits protect against hostile or corrupted inputs that declare huge
/// lengths; codec options control what the writers emit.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Maximum size of a single input file (bytes)
    pub max_input_size: usize,

    /// Maximum number of SysEx messages demultiplexed from one input
    pub max_messages: usize,

    /// Maximum length of a single SysEx message body (bytes)
    pub max_sysex_size: usize,

    /// Maximum number of patch records a container may declare
    pub max_patches: usize,

    /// Maximum size of an inflated plugin payload (bytes)
    pub max_decompressed_size: usize,

    /// Device id byte written into outgoing messages
    pub device_id: u8,

    /// zlib level used by the plugin container writer (0-9)
    pub compression_level: u32,

    /// Fail on advisory findings (per-record CRC mismatches, truncated
    /// template chunks) instead of logging them
    pub strict_integrity: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_input_size: 64 * 1024 * 1024,       // 64MB
            max_messages: 200_000,
            max_sysex_size: 64 * 1024,              // far above the 256 byte chunks devices send
            max_patches: 1024,
            max_decompressed_size: 64 * 1024 * 1024, // 64MB
            device_id: DEFAULT_DEVICE_ID,
            compression_level: 9,
            strict_integrity: false,
        }
    }
}

impl ParserConfig {
    /// Create a configuration with strict limits for untrusted inputs
    pub fn security_focused() -> Self {
        Self {
            max_input_size: 8 * 1024 * 1024,
            max_messages: 20_000,
            max_sysex_size: 4 * 1024,
            max_patches: 256,
            max_decompressed_size: 8 * 1024 * 1024,
            strict_integrity: true,
            ..Self::default()
        }
    }

    /// Create a permissive configuration for large multi-bank archives
    pub fn permissive() -> Self {
        Self {
            max_input_size: 512 * 1024 * 1024,
            max_messages: 2_000_000,
            max_sysex_size: 1024 * 1024,
            max_patches: 65_536,
            max_decompressed_size: 512 * 1024 * 1024,
            ..Self::default()
        }
    }

    /// Check if an input file size is acceptable
    pub fn check_input_size(&self, size: usize) -> JdResult<()> {
        if size > self.max_input_size {
            return Err(JdError::DataSizeExceedsLimit {
                field: "input_size".to_string(),
                size,
                limit: self.max_input_size,
            });
        }
        Ok(())
    }

    /// Check if a declared patch count is acceptable
    pub fn check_patch_count(&self, count: usize) -> JdResult<()> {
        if count > self.max_patches {
            return Err(JdError::DataSizeExceedsLimit {
                field: "patch_count".to_string(),
                size: count,
                limit: self.max_patches,
            });
        }
        Ok(())
    }

    /// Check if a declared uncompressed size is acceptable
    pub fn check_decompressed_size(&self, size: usize) -> JdResult<()> {
        if size > self.max_decompressed_size {
            return Err(JdError::DataSizeExceedsLimit {
                field: "uncompressed_size".to_string(),
                size,
                limit: self.max_decompressed_size,
            });
        }
        Ok(())
    }
}

/// Resource tracker for monitoring usage while demultiplexing one input
#[derive(Debug, Default)]
pub struct ResourceTracker {
    /// Number of SysEx messages seen so far
    pub message_count: usize,

    /// Total SysEx body bytes seen so far
    pub sysex_bytes: usize,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new SysEx message body
    pub fn track_message(&mut self, config: &ParserConfig, length: usize) -> JdResult<()> {
        self.message_count += 1;
        if self.message_count > config.max_messages {
            return Err(JdError::DataSizeExceedsLimit {
                field: "message_count".to_string(),
                size: self.message_count,
                limit: config.max_messages,
            });
        }

        if length > config.max_sysex_size {
            return Err(JdError::DataSizeExceedsLimit {
                field: "sysex_size".to_string(),
                size: length,
                limit: config.max_sysex_size,
            });
        }

        self.sysex_bytes += length;
        Ok(())
    }
}
