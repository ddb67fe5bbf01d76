//! Test fixtures and data generators
//!
//! This module contains builders for SysEx, MIDI file and backup test data.

#![allow(dead_code)]

pub mod builders;

pub use builders::*;
