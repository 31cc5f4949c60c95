//! Demo decoding from an in-memory file image.
//!
//! [`DemoReader`] works in two phases. The header and directory are cheap
//! and validated strictly: any problem is fatal. Frame streams are decoded
//! on request, one section at a time, and a corrupt section only cuts that
//! section short.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::codec::{
    decode_section, DIR_ENTRY_SIZE, HEADER_SIZE, MAX_DIR_ENTRY_COUNT, MIN_DIR_ENTRY_COUNT,
    SIGNATURE_FIELD_SIZE,
};
use crate::error::{DemoError, FormatIssue, Truncation};
use crate::types::{BoundedName, DemoHeader, DirectoryEntry, NAME_FIELD_SIZE};
use crate::{DEMO_PROTOCOL, SIGNATURE};

/// Outcome of decoding every section's frames.
#[derive(Debug, Default)]
pub struct FrameReport {
    /// Frames decoded across all sections.
    pub frames: usize,
    /// One [`DemoError::TruncatedSection`] per section that stopped early
    /// or was skipped.
    pub truncated: Vec<DemoError>,
}

impl FrameReport {
    /// True when every section ended with its terminator.
    pub fn is_clean(&self) -> bool {
        self.truncated.is_empty()
    }
}

/// Reads a demo from a complete file image.
///
/// Borrowing a slice keeps every bounds check a plain comparison against
/// `data.len()`; callers load the file first (see [`crate::DemoFile`]).
///
/// # Examples
///
/// ```
/// use hldemo::DemoReader;
///
/// let data = vec![0u8; 16];
/// assert!(!DemoReader::has_signature(&data));
/// assert!(DemoReader::new(&data).is_err());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct DemoReader<'a> {
    data: &'a [u8],
}

impl<'a> DemoReader<'a> {
    /// Check size and signature, then wrap `data`.
    pub fn new(data: &'a [u8]) -> Result<Self, DemoError> {
        if data.len() < HEADER_SIZE {
            return Err(FormatIssue::TooSmall {
                size: data.len(),
                min: HEADER_SIZE,
            }
            .into());
        }
        if data[..SIGNATURE.len()] != SIGNATURE {
            return Err(FormatIssue::SignatureMismatch.into());
        }
        Ok(Self { data })
    }

    /// True if `data` is at least a header long and starts with the signature.
    pub fn has_signature(data: &[u8]) -> bool {
        DemoReader::new(data).is_ok()
    }

    /// Size of the file image in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: a reader holds at least a header.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read the fixed header fields. The signature bytes are skipped.
    pub fn read_header(&self) -> Result<DemoHeader, DemoError> {
        let mut r = Cursor::new(self.data);
        r.set_position(SIGNATURE_FIELD_SIZE as u64);

        let demo_protocol = r.read_i32::<LittleEndian>()?;
        let net_protocol = r.read_i32::<LittleEndian>()?;
        let mut field = [0u8; NAME_FIELD_SIZE];
        r.read_exact(&mut field)?;
        let map_name = BoundedName::from_field(&field);
        r.read_exact(&mut field)?;
        let game_dir = BoundedName::from_field(&field);
        let directory_offset = r.read_i32::<LittleEndian>()?;

        log::debug!(
            "demo header: protocol {demo_protocol}/{net_protocol}, map {map_name}, game {game_dir}"
        );
        Ok(DemoHeader {
            demo_protocol,
            net_protocol,
            map_name,
            game_dir,
            directory_offset,
        })
    }

    /// Read the directory at `header.directory_offset`.
    ///
    /// Entries come back with empty frame lists.
    pub fn read_directory(&self, header: &DemoHeader) -> Result<Vec<DirectoryEntry>, DemoError> {
        let offset = header.directory_offset;
        // The reader guarantees len >= HEADER_SIZE, so len - 4 cannot underflow.
        if offset < 0 || offset as usize > self.data.len() - 4 {
            return Err(FormatIssue::DirectoryOffset { offset }.into());
        }

        let mut r = Cursor::new(self.data);
        r.set_position(offset as u64);
        let count = r.read_i32::<LittleEndian>()?;
        if !(MIN_DIR_ENTRY_COUNT..=MAX_DIR_ENTRY_COUNT).contains(&count) {
            return Err(FormatIssue::EntryCount { count }.into());
        }
        let available = self.data.len() - (offset as usize + 4);
        let needed = count as usize * DIR_ENTRY_SIZE;
        if available < needed {
            return Err(FormatIssue::DirectoryTruncated {
                count,
                needed,
                available,
            }
            .into());
        }

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(DirectoryEntry {
                entry_type: r.read_i32::<LittleEndian>()?,
                playback_time: r.read_f32::<LittleEndian>()?,
                frame_count: r.read_i32::<LittleEndian>()?,
                offset: r.read_i32::<LittleEndian>()?,
                file_length: r.read_i32::<LittleEndian>()?,
                frames: Vec::new(),
            });
        }
        log::debug!("demo directory: {count} entries at {offset}");
        Ok(entries)
    }

    /// Decode the frame stream of every entry, replacing its frames.
    ///
    /// Fails only when the header's protocol is unsupported, in which case
    /// no entry is touched. Per-section problems are collected in the
    /// returned report and logged; the frames decoded before the problem
    /// are kept.
    pub fn read_frames(
        &self,
        header: &DemoHeader,
        entries: &mut [DirectoryEntry],
    ) -> Result<FrameReport, DemoError> {
        if header.demo_protocol != DEMO_PROTOCOL {
            return Err(DemoError::UnsupportedVersion {
                found: header.demo_protocol,
                expected: DEMO_PROTOCOL,
            });
        }

        let mut report = FrameReport::default();
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.frames.clear();

            if entry.offset < 0 || entry.offset as usize > self.data.len() {
                let reason = Truncation::OffsetOutOfBounds {
                    offset: entry.offset,
                };
                log::warn!("skipping demo section {index}: {reason}");
                report.truncated.push(DemoError::TruncatedSection {
                    entry: index,
                    reason,
                });
                continue;
            }

            let section = decode_section(self.data, entry.offset as usize);
            entry.frames = section.frames;
            report.frames += entry.frames.len();
            if let Some(reason) = section.truncation {
                log::warn!(
                    "demo section {index} truncated after {} frames: {reason}",
                    entry.frames.len()
                );
                report.truncated.push(DemoError::TruncatedSection {
                    entry: index,
                    reason,
                });
            } else {
                log::debug!(
                    "demo section {index}: {} frames (directory says {})",
                    entry.frames.len(),
                    entry.frame_count
                );
            }
        }
        Ok(report)
    }
}
