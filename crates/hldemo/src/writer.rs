//! Demo encoding.
//!
//! The whole file is assembled in memory before anything reaches the sink.
//! Section offsets are taken from the buffer as frames are appended, and
//! the header's directory offset is a placeholder patched once the
//! directory position is known. In-memory entry offsets are never updated.

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::codec::{
    encode_frame, validate_frame, FrameViolation, HEADER_SIZE, MAX_DIR_ENTRY_COUNT,
    MIN_DIR_ENTRY_COUNT, SIGNATURE_FIELD_SIZE,
};
use crate::error::{DemoError, EncodeIssue};
use crate::types::{DemoHeader, DirectoryEntry, Frame, NAME_FIELD_SIZE};
use crate::SIGNATURE;

/// Encode a demo into a fresh buffer.
///
/// Every section is written up to and including its first terminator
/// frame; a section without one gets a synthetic terminator (time 0,
/// index 0). Each emitted section therefore ends with exactly one
/// terminator.
pub fn encode_demo(header: &DemoHeader, entries: &[DirectoryEntry]) -> Result<Vec<u8>, DemoError> {
    let count = entries.len();
    if count < MIN_DIR_ENTRY_COUNT as usize || count > MAX_DIR_ENTRY_COUNT as usize {
        return Err(EncodeIssue::EntryCount { count }.into());
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE);
    buf.extend_from_slice(&SIGNATURE);
    buf.resize(SIGNATURE_FIELD_SIZE, 0);
    buf.write_i32::<LittleEndian>(header.demo_protocol)?;
    buf.write_i32::<LittleEndian>(header.net_protocol)?;
    write_name(&mut buf, header.map_name.as_bytes());
    write_name(&mut buf, header.game_dir.as_bytes());
    // Directory offset, patched below.
    let dir_offset_pos = buf.len();
    buf.write_i32::<LittleEndian>(0)?;
    debug_assert_eq!(buf.len(), HEADER_SIZE);

    let mut offsets = Vec::with_capacity(count);
    for (entry_index, entry) in entries.iter().enumerate() {
        offsets.push(offset_at(&buf)?);
        write_section(&mut buf, entry_index, &entry.frames)?;
    }

    let dir_offset = offset_at(&buf)?;
    buf.write_i32::<LittleEndian>(count as i32)?;
    for (entry, offset) in entries.iter().zip(offsets) {
        buf.write_i32::<LittleEndian>(entry.entry_type)?;
        buf.write_f32::<LittleEndian>(entry.playback_time)?;
        buf.write_i32::<LittleEndian>(entry.frame_count)?;
        buf.write_i32::<LittleEndian>(offset)?;
        buf.write_i32::<LittleEndian>(entry.file_length)?;
    }

    LittleEndian::write_i32(&mut buf[dir_offset_pos..dir_offset_pos + 4], dir_offset);
    log::debug!(
        "encoded demo: {count} sections, directory at {dir_offset}, {} bytes",
        buf.len()
    );
    Ok(buf)
}

fn write_section(buf: &mut Vec<u8>, entry_index: usize, frames: &[Frame]) -> Result<(), DemoError> {
    for (index, frame) in frames.iter().enumerate() {
        validate_frame(frame).map_err(|violation| match violation {
            FrameViolation::TooLarge { len, max } => EncodeIssue::PayloadTooLarge {
                entry: entry_index,
                index,
                tag: frame.tag(),
                len,
                max,
            },
            FrameViolation::ReservedTag => EncodeIssue::NetMsgTag {
                entry: entry_index,
                index,
                tag: frame.tag(),
            },
            FrameViolation::InteriorNul { position } => EncodeIssue::CommandNul {
                entry: entry_index,
                index,
                position,
            },
        })?;
        encode_frame(buf, frame)?;

        if frame.is_terminator() {
            let dropped = frames.len() - index - 1;
            if dropped > 0 {
                log::debug!(
                    "section {entry_index}: dropping {dropped} frames after the terminator"
                );
            }
            return Ok(());
        }
    }

    encode_frame(buf, &Frame::next_section(0.0, 0))?;
    Ok(())
}

fn write_name(buf: &mut Vec<u8>, name: &[u8]) {
    let start = buf.len();
    buf.extend_from_slice(name);
    buf.resize(start + NAME_FIELD_SIZE, 0);
}

fn offset_at(buf: &[u8]) -> Result<i32, EncodeIssue> {
    i32::try_from(buf.len()).map_err(|_| EncodeIssue::OffsetOverflow {
        position: buf.len(),
    })
}

/// Writes encoded demos to a byte sink.
///
/// Generic over `W: Write` so tests can use `Vec<u8>` and production code
/// a `File`. Each demo reaches the sink with a single `write_all`, so a
/// refused encode leaves the sink untouched.
pub struct DemoWriter<W: Write> {
    writer: W,
    bytes_written: u64,
}

impl<W: Write> DemoWriter<W> {
    /// Wrap a sink.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bytes_written: 0,
        }
    }

    /// Encode and write one demo, returning its size in bytes.
    pub fn write_demo(
        &mut self,
        header: &DemoHeader,
        entries: &[DirectoryEntry],
    ) -> Result<usize, DemoError> {
        let bytes = encode_demo(header, entries)?;
        self.writer.write_all(&bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(bytes.len())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<(), DemoError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Total bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Consume the writer and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FRAME_PREFIX_SIZE;
    use crate::reader::DemoReader;
    use crate::types::*;

    fn header() -> DemoHeader {
        DemoHeader {
            demo_protocol: 2,
            net_protocol: 48,
            map_name: BoundedName::new("c2a5").unwrap(),
            game_dir: BoundedName::new("valve").unwrap(),
            directory_offset: 12345,
        }
    }

    fn entry(frames: Vec<Frame>) -> DirectoryEntry {
        DirectoryEntry {
            entry_type: 1,
            playback_time: 3.5,
            frame_count: 99,
            offset: -7,
            file_length: 0,
            frames,
        }
    }

    fn terminators(frames: &[Frame]) -> usize {
        frames.iter().filter(|f| f.is_terminator()).count()
    }

    #[test]
    fn header_layout() {
        let bytes = encode_demo(&header(), &[entry(vec![])]).unwrap();
        assert_eq!(&bytes[..8], b"HLDEMO\0\0");
        assert_eq!(&bytes[8..12], &2i32.to_le_bytes());
        assert_eq!(&bytes[12..16], &48i32.to_le_bytes());
        assert_eq!(&bytes[16..21], b"c2a5\0");
        assert!(bytes[21..276].iter().all(|&b| b == 0));
        assert_eq!(&bytes[276..282], b"valve\0");
        // Empty section still gets its terminator, so the directory follows it.
        let dir_offset = (HEADER_SIZE + FRAME_PREFIX_SIZE) as i32;
        assert_eq!(&bytes[536..540], &dir_offset.to_le_bytes());
        assert_eq!(bytes[540], FRAME_NEXT_SECTION);
    }

    #[test]
    fn full_length_name_has_no_terminator() {
        let mut h = header();
        h.map_name = BoundedName::new(vec![b'm'; NAME_FIELD_SIZE]).unwrap();
        let bytes = encode_demo(&h, &[entry(vec![])]).unwrap();
        assert!(bytes[16..276].iter().all(|&b| b == b'm'));
        assert_eq!(&bytes[276..281], b"valve");
    }

    #[test]
    fn directory_uses_fresh_offsets() {
        let first = entry(vec![Frame::new(0.0, 0, FramePayload::JumpTime)]);
        let second = entry(vec![]);
        let entries = vec![first, second];
        let bytes = encode_demo(&header(), &entries).unwrap();

        let reader = DemoReader::new(&bytes).unwrap();
        let h = reader.read_header().unwrap();
        let dir = reader.read_directory(&h).unwrap();
        assert_eq!(dir[0].offset, HEADER_SIZE as i32);
        // jump time + appended terminator
        assert_eq!(dir[1].offset, (HEADER_SIZE + 2 * FRAME_PREFIX_SIZE) as i32);
        assert_eq!(dir[0].frame_count, 99);
        assert_eq!(dir[0].playback_time, 3.5);
        // The model keeps its stale offsets.
        assert_eq!(entries[0].offset, -7);
    }

    #[test]
    fn exactly_one_terminator_per_section() {
        let cases = vec![
            vec![],
            vec![Frame::new(0.0, 1, FramePayload::JumpTime)],
            vec![Frame::next_section(2.0, 5)],
            vec![
                Frame::new(0.0, 1, FramePayload::JumpTime),
                Frame::next_section(1.0, 2),
                Frame::next_section(1.5, 3),
                Frame::new(2.0, 4, FramePayload::JumpTime),
            ],
        ];
        for frames in cases {
            let bytes = encode_demo(&header(), &[entry(frames.clone())]).unwrap();
            let reader = DemoReader::new(&bytes).unwrap();
            let h = reader.read_header().unwrap();
            let mut dir = reader.read_directory(&h).unwrap();
            let report = reader.read_frames(&h, &mut dir).unwrap();
            assert!(report.is_clean());
            let decoded = &dir[0].frames;
            assert_eq!(terminators(decoded), 1, "input {frames:?}");
            assert!(decoded.last().unwrap().is_terminator());
            // Section runs right up to the directory.
            let section_end = dir[0].offset as usize + decoded.len() * FRAME_PREFIX_SIZE;
            assert_eq!(section_end as i32, h.directory_offset);
        }
    }

    #[test]
    fn stored_terminator_keeps_its_fields() {
        let frames = vec![Frame::next_section(4.25, 77)];
        let bytes = encode_demo(&header(), &[entry(frames)]).unwrap();
        assert_eq!(&bytes[541..545], &4.25f32.to_le_bytes());
        assert_eq!(&bytes[545..549], &77i32.to_le_bytes());
    }

    #[test]
    fn refuses_unreadable_output() {
        assert!(matches!(
            encode_demo(&header(), &[]),
            Err(DemoError::Encode(EncodeIssue::EntryCount { count: 0 }))
        ));
        let many = vec![entry(vec![]); 1025];
        assert!(matches!(
            encode_demo(&header(), &many),
            Err(DemoError::Encode(EncodeIssue::EntryCount { count: 1025 }))
        ));

        let big = Frame::new(
            0.0,
            0,
            FramePayload::UserCmd(UserCmd {
                data: vec![0; 1025],
                ..UserCmd::default()
            }),
        );
        let entries = vec![
            entry(vec![]),
            entry(vec![Frame::new(0.0, 0, FramePayload::JumpTime), big]),
        ];
        assert!(matches!(
            encode_demo(&header(), &entries),
            Err(DemoError::Encode(EncodeIssue::PayloadTooLarge {
                entry: 1,
                index: 1,
                tag: FRAME_USERCMD,
                len: 1025,
                max: 1024
            }))
        ));
    }

    #[test]
    fn refuses_console_command_with_nul() {
        let cmd = Frame::new(
            0.0,
            3,
            FramePayload::ConsoleCommand(ConsoleCommand::new(&b"say a\0b"[..])),
        );
        let entries = vec![entry(vec![Frame::new(0.0, 0, FramePayload::JumpTime), cmd])];
        assert!(matches!(
            encode_demo(&header(), &entries),
            Err(DemoError::Encode(EncodeIssue::CommandNul {
                entry: 0,
                index: 1,
                position: 5
            }))
        ));

        // Without the NUL the command survives a round trip intact.
        let clean = Frame::new(
            0.0,
            3,
            FramePayload::ConsoleCommand(ConsoleCommand::new(&b"say ab"[..])),
        );
        let bytes = encode_demo(&header(), &[entry(vec![clean.clone()])]).unwrap();
        let reader = DemoReader::new(&bytes).unwrap();
        let h = reader.read_header().unwrap();
        let mut dir = reader.read_directory(&h).unwrap();
        reader.read_frames(&h, &mut dir).unwrap();
        assert_eq!(dir[0].frames[0], clean);
    }

    #[test]
    fn refused_encode_leaves_sink_empty() {
        let mut writer = DemoWriter::new(Vec::new());
        assert!(writer.write_demo(&header(), &[]).is_err());
        assert_eq!(writer.bytes_written(), 0);
        let n = writer.write_demo(&header(), &[entry(vec![])]).unwrap();
        assert_eq!(writer.bytes_written(), n as u64);
        writer.flush().unwrap();
        let sink = writer.into_inner();
        assert_eq!(sink.len(), n);
        assert!(DemoReader::has_signature(&sink));
    }
}
