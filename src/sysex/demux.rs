//! SysEx Demultiplexer
//!
//! Pulls successive SysEx bodies out of a flat `.syx` stream or out of the
//! track events of a Standard MIDI File.

use bytes::{Buf, Bytes};
use tracing::{debug, warn};

use super::message::RawMessage;
use crate::utils::{is_smf, read_var_len, SYSEX_END, SYSEX_START, TRACK_MAGIC};

/// Operating mode, chosen once from the leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxMode {
    Raw,
    MidiFile,
}

/// Extracts raw SysEx messages from a byte stream
#[derive(Debug)]
pub struct SysExDemuxer {
    data: Bytes,
    mode: DemuxMode,
    running_status: u8,
    track_remaining: u32,
    finished: bool,
}

impl SysExDemuxer {
    pub fn new(data: Bytes) -> Self {
        let mode = if is_smf(&data) {
            DemuxMode::MidiFile
        } else {
            DemuxMode::Raw
        };

        let mut demuxer = Self {
            data,
            mode,
            running_status: 0,
            track_remaining: 0,
            finished: false,
        };
        if mode == DemuxMode::MidiFile {
            demuxer.skip_file_header();
        }
        demuxer
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    pub fn mode(&self) -> DemuxMode {
        self.mode
    }

    /// Next SysEx body, `None` once the stream is exhausted
    pub fn next_message(&mut self) -> Option<RawMessage> {
        if self.finished {
            return None;
        }
        match self.mode {
            DemuxMode::Raw => self.next_raw(),
            DemuxMode::MidiFile => self.next_track_event(),
        }
    }

    fn finish(&mut self) -> Option<RawMessage> {
        self.finished = true;
        None
    }

    fn skip_file_header(&mut self) {
        // MThd + length
        if self.data.remaining() < 8 {
            warn!("Malformed MIDI file: truncated header chunk");
            self.finished = true;
            return;
        }
        self.data.advance(4);
        let header_length = self.data.get_u32() as usize;
        if self.data.remaining() < header_length {
            warn!("Malformed MIDI file: header chunk declares {} bytes", header_length);
            self.finished = true;
            return;
        }
        self.data.advance(header_length);
    }

    fn next_raw(&mut self) -> Option<RawMessage> {
        while self.data.has_remaining() {
            if self.data.get_u8() == SYSEX_START {
                break;
            }
        }

        let mut message = Vec::new();
        while self.data.has_remaining() {
            let byte = self.data.get_u8();
            message.push(byte);
            if byte == SYSEX_END {
                return Some(RawMessage::new(message));
            }
        }

        self.finished = true;
        if message.is_empty() {
            return None;
        }
        warn!("SysEx message of {} bytes is not terminated", message.len());
        Some(RawMessage::new(message))
    }

    fn read_u8(&mut self) -> Option<u8> {
        if !self.data.has_remaining() {
            return None;
        }
        self.track_remaining = self.track_remaining.saturating_sub(1);
        Some(self.data.get_u8())
    }

    fn read_var_len(&mut self) -> Option<u32> {
        let (value, consumed) = read_var_len(&mut self.data)?;
        self.track_remaining = self.track_remaining.saturating_sub(consumed as u32);
        Some(value)
    }

    /// Skip `count` bytes, false if the stream ended first
    fn skip(&mut self, count: usize) -> bool {
        let available = count.min(self.data.remaining());
        self.data.advance(available);
        self.track_remaining = self.track_remaining.saturating_sub(available as u32);
        available == count
    }

    fn open_track(&mut self) -> bool {
        if self.data.remaining() < 8 {
            if self.data.has_remaining() {
                warn!("Malformed MIDI file? Truncated track header");
            }
            return false;
        }
        if self.data[0..4] != TRACK_MAGIC {
            warn!(
                "Malformed MIDI file? Unexpected track header value {:02X?}",
                &self.data[0..4]
            );
            return false;
        }
        self.data.advance(4);
        self.track_remaining = self.data.get_u32();
        self.running_status = 0;
        debug!("Opened MIDI track of {} bytes", self.track_remaining);
        true
    }

    fn next_track_event(&mut self) -> Option<RawMessage> {
        loop {
            if self.track_remaining == 0 {
                if !self.open_track() {
                    return self.finish();
                }
                continue;
            }

            // Delta time is irrelevant for dumps
            if self.read_var_len().is_none() {
                return self.finish();
            }

            let Some(first) = self.read_u8() else {
                return self.finish();
            };

            if first == 0xFF {
                // Meta event: type byte + length-prefixed payload
                if !self.skip(1) {
                    return self.finish();
                }
                let Some(length) = self.read_var_len() else {
                    return self.finish();
                };
                if !self.skip(length as usize) {
                    return self.finish();
                }
                continue;
            }

            let mut status = self.running_status;
            if first & 0x80 != 0 {
                status = first;
                if first < 0xF0 {
                    // Channel status byte, the first data byte follows
                    self.running_status = first;
                    if self.read_u8().is_none() {
                        return self.finish();
                    }
                }
            }

            let complete = match status & 0xF0 {
                0x80 | 0x90 | 0xA0 | 0xB0 | 0xE0 => self.skip(1),
                0xC0 | 0xD0 => true,
                0xF0 => match status & 0x0F {
                    0x00 | 0x07 => return self.read_sysex_event(),
                    0x01 | 0x03 => self.skip(1),
                    0x02 => self.skip(2),
                    _ => true,
                },
                // Data byte without any running status
                _ => true,
            };
            if !complete {
                return self.finish();
            }
        }
    }

    fn read_sysex_event(&mut self) -> Option<RawMessage> {
        let Some(length) = self.read_var_len() else {
            return self.finish();
        };
        let length = length as usize;
        let available = length.min(self.data.remaining());
        let message = self.data.split_to(available).to_vec();
        self.track_remaining = self.track_remaining.saturating_sub(available as u32);

        if available < length {
            warn!("SysEx event declares {} bytes, only {} available", length, available);
            self.finished = true;
        }
        if !message.is_empty() && message.last() != Some(&SYSEX_END) {
            warn!("NOT IMPLEMENTED: Continued SysEx message");
        }
        Some(RawMessage::new(message))
    }
}

impl Iterator for SysExDemuxer {
    type Item = RawMessage;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_message()
    }
}
