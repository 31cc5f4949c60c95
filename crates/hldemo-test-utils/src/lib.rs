//! Test fixtures for hldemo development.
//!
//! Everything here assembles demo bytes by hand, field by field, without
//! going through the `hldemo` writer. Tests can therefore check the reader
//! against an independent rendition of the format, and build the malformed
//! inputs the writer refuses to produce.
//!
//! - [`DemoBytes`] builds a whole file: header, sections, directory.
//! - [`frames`] builds single frame records.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod frames;

use byteorder::{LittleEndian, WriteBytesExt};

/// Size of the fixed header block.
pub const HEADER_SIZE: usize = 540;
/// Size of a header name field.
pub const NAME_FIELD_SIZE: usize = 260;

/// Install an `env_logger` for the current test binary.
///
/// Safe to call from every test; only the first call has any effect.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One section of a [`DemoBytes`] file.
#[derive(Clone, Debug)]
pub struct Section {
    pub entry_type: i32,
    pub playback_time: f32,
    pub frame_count: i32,
    /// Directory offset to record instead of the real one.
    pub offset_override: Option<i32>,
    /// Raw frame stream.
    pub body: Vec<u8>,
}

impl Section {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            entry_type: 1,
            playback_time: 0.0,
            frame_count: 0,
            offset_override: None,
            body,
        }
    }

    pub fn entry_type(mut self, entry_type: i32) -> Self {
        self.entry_type = entry_type;
        self
    }

    pub fn playback_time(mut self, playback_time: f32) -> Self {
        self.playback_time = playback_time;
        self
    }

    pub fn frame_count(mut self, frame_count: i32) -> Self {
        self.frame_count = frame_count;
        self
    }

    pub fn offset(mut self, offset: i32) -> Self {
        self.offset_override = Some(offset);
        self
    }
}

/// Byte-level builder for a complete demo file.
///
/// Layout: 540-byte header, section bodies back to back, then the
/// directory. Overrides let tests corrupt individual fields.
#[derive(Clone, Debug)]
pub struct DemoBytes {
    signature: [u8; 8],
    demo_protocol: i32,
    net_protocol: i32,
    map_name: Vec<u8>,
    game_dir: Vec<u8>,
    sections: Vec<Section>,
    directory_offset: Option<i32>,
    entry_count: Option<i32>,
}

impl Default for DemoBytes {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoBytes {
    pub fn new() -> Self {
        Self {
            signature: *b"HLDEMO\0\0",
            demo_protocol: 2,
            net_protocol: 48,
            map_name: b"c1a0".to_vec(),
            game_dir: b"valve".to_vec(),
            sections: Vec::new(),
            directory_offset: None,
            entry_count: None,
        }
    }

    /// A valid file with one section holding only a terminator.
    pub fn minimal() -> Self {
        Self::new().section(Section::new(frames::next_section(0.0, 0)))
    }

    pub fn signature(mut self, signature: [u8; 8]) -> Self {
        self.signature = signature;
        self
    }

    pub fn demo_protocol(mut self, demo_protocol: i32) -> Self {
        self.demo_protocol = demo_protocol;
        self
    }

    pub fn net_protocol(mut self, net_protocol: i32) -> Self {
        self.net_protocol = net_protocol;
        self
    }

    pub fn map_name(mut self, map_name: &[u8]) -> Self {
        self.map_name = map_name.to_vec();
        self
    }

    pub fn game_dir(mut self, game_dir: &[u8]) -> Self {
        self.game_dir = game_dir.to_vec();
        self
    }

    pub fn section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    /// Record this directory offset in the header instead of the real one.
    pub fn directory_offset(mut self, offset: i32) -> Self {
        self.directory_offset = Some(offset);
        self
    }

    /// Record this entry count in the directory instead of the real one.
    pub fn entry_count(mut self, count: i32) -> Self {
        self.entry_count = Some(count);
        self
    }

    /// Offset at which the directory will start in the built file.
    pub fn real_directory_offset(&self) -> usize {
        HEADER_SIZE + self.sections.iter().map(|s| s.body.len()).sum::<usize>()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.signature);
        push_i32(&mut out, self.demo_protocol);
        push_i32(&mut out, self.net_protocol);
        push_name(&mut out, &self.map_name);
        push_name(&mut out, &self.game_dir);
        let dir_offset = self
            .directory_offset
            .unwrap_or(self.real_directory_offset() as i32);
        push_i32(&mut out, dir_offset);
        assert_eq!(out.len(), HEADER_SIZE);

        let mut offsets = Vec::with_capacity(self.sections.len());
        for section in &self.sections {
            offsets.push(out.len() as i32);
            out.extend_from_slice(&section.body);
        }

        push_i32(
            &mut out,
            self.entry_count.unwrap_or(self.sections.len() as i32),
        );
        for (section, real_offset) in self.sections.iter().zip(offsets) {
            push_i32(&mut out, section.entry_type);
            out.write_f32::<LittleEndian>(section.playback_time)
                .expect("write to Vec");
            push_i32(&mut out, section.frame_count);
            push_i32(&mut out, section.offset_override.unwrap_or(real_offset));
            push_i32(&mut out, section.body.len() as i32);
        }
        out
    }
}

fn push_i32(out: &mut Vec<u8>, v: i32) {
    out.write_i32::<LittleEndian>(v).expect("write to Vec");
}

fn push_name(out: &mut Vec<u8>, name: &[u8]) {
    let mut field = name.to_vec();
    field.resize(NAME_FIELD_SIZE, 0);
    out.extend_from_slice(&field);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_layout() {
        let bytes = DemoBytes::minimal().build();
        // header + one 9-byte terminator + count + one record
        assert_eq!(bytes.len(), HEADER_SIZE + 9 + 4 + 20);
        assert_eq!(&bytes[..6], b"HLDEMO");
        assert_eq!(&bytes[536..540], &549i32.to_le_bytes());
        assert_eq!(&bytes[549..553], &1i32.to_le_bytes());
        // section offset in the first record
        assert_eq!(&bytes[565..569], &540i32.to_le_bytes());
    }
}
