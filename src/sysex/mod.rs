//! SysEx Module
//!
//! Demultiplexing of SysEx bodies from raw dumps and MIDI files, plus the
//! Roland Data Set message codec layered on top.

pub mod demux;
pub mod message;


pub use demux::{DemuxMode, SysExDemuxer};
pub use message::{DataSetMessage, RawMessage, CMD_DATA_SET, MAX_PAYLOAD_SIZE, ROLAND_ID};
