//! Wire layout constants and per-frame encode/decode.
//!
//! All fields are little-endian and unaligned. Decoding works on the whole
//! file image and checks every length against the bytes that remain before
//! touching them, so a corrupt stream can stop a section but never panic or
//! over-read.

use std::io::{self, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::Truncation;
use crate::types::*;

// ── Layout constants ────────────────────────────────────────────

/// Size of the fixed header block, signature included.
pub const HEADER_SIZE: usize = 540;
/// Bytes reserved for the signature at the start of the file.
pub const SIGNATURE_FIELD_SIZE: usize = 8;
/// Size of one directory record.
pub const DIR_ENTRY_SIZE: usize = 20;
/// Fewest directory entries a valid file holds.
pub const MIN_DIR_ENTRY_COUNT: i32 = 1;
/// Most directory entries a valid file holds.
pub const MAX_DIR_ENTRY_COUNT: i32 = 1024;

/// Common frame prefix: tag (u8), time (f32), frame index (i32).
pub const FRAME_PREFIX_SIZE: usize = 9;
/// Console command fixed fields: length (i32).
pub const CONSOLE_COMMAND_FIELDS_SIZE: usize = 4;
/// Longest console command payload, terminator included.
pub const CONSOLE_COMMAND_MAX_LEN: usize = 2048;
/// User command fixed fields: outgoing sequence, slot, length (u16).
pub const USERCMD_FIELDS_SIZE: usize = 10;
/// Longest user command payload.
pub const USERCMD_MAX_LEN: usize = 1024;
/// String tables fixed fields: length (i32).
pub const STRING_TABLES_FIELDS_SIZE: usize = 4;
/// Net message fixed fields: demo info, seven sequences, length (i32).
pub const NET_MSG_FIELDS_SIZE: usize = 108;
/// Longest net message payload.
pub const NET_MSG_MAX_LEN: usize = 80032;

// ── Decoding ────────────────────────────────────────────────────

/// Bounds-checked read position over a complete file image.
pub(crate) struct FrameCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FrameCursor<'a> {
    /// Position the cursor at `pos`, which must be `<= data.len()`.
    pub(crate) fn new(data: &'a [u8], pos: usize) -> Self {
        debug_assert!(pos <= data.len());
        Self { data, pos }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    // Callers check `remaining()` before every take.
    fn take(&mut self, n: usize) -> &'a [u8] {
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        bytes
    }

    fn u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    fn u16(&mut self) -> u16 {
        LittleEndian::read_u16(self.take(2))
    }

    fn i32(&mut self) -> i32 {
        LittleEndian::read_i32(self.take(4))
    }

    fn f32(&mut self) -> f32 {
        LittleEndian::read_f32(self.take(4))
    }

    fn vec3(&mut self) -> [f32; 3] {
        [self.f32(), self.f32(), self.f32()]
    }

    fn require_fields(&self, tag: u8, needed: usize) -> Result<(), Truncation> {
        if self.remaining() < needed {
            return Err(Truncation::MissingFields {
                tag,
                position: self.pos,
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    /// Validate a declared payload length against `max` and the remaining
    /// bytes, then take it.
    fn payload(&mut self, tag: u8, length: i64, max: usize) -> Result<&'a [u8], Truncation> {
        let max = max as i64;
        if length < 0 || length > max {
            return Err(Truncation::LengthOutOfRange { tag, length, max });
        }
        let length = length as usize;
        if self.remaining() < length {
            return Err(Truncation::PayloadPastEnd {
                tag,
                length,
                remaining: self.remaining(),
            });
        }
        Ok(self.take(length))
    }
}

/// Decode one frame at the cursor.
///
/// On error the cursor position is unspecified; the caller abandons the
/// section.
pub(crate) fn decode_frame(cur: &mut FrameCursor<'_>) -> Result<Frame, Truncation> {
    if cur.remaining() < FRAME_PREFIX_SIZE {
        return Err(Truncation::MissingPrefix {
            position: cur.position(),
            remaining: cur.remaining(),
        });
    }
    let tag = cur.u8();
    let time = cur.f32();
    let frame = cur.i32();

    let payload = match tag {
        FRAME_JUMP_TIME => FramePayload::JumpTime,
        FRAME_NEXT_SECTION => FramePayload::NextSection,
        FRAME_CONSOLE_COMMAND => {
            cur.require_fields(tag, CONSOLE_COMMAND_FIELDS_SIZE)?;
            let length = cur.i32();
            let text = cur.payload(tag, i64::from(length), CONSOLE_COMMAND_MAX_LEN)?;
            let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
            FramePayload::ConsoleCommand(ConsoleCommand::new(&text[..end]))
        }
        FRAME_USERCMD => {
            cur.require_fields(tag, USERCMD_FIELDS_SIZE)?;
            let outgoing_sequence = cur.i32();
            let slot = cur.i32();
            let length = cur.u16();
            let data = cur.payload(tag, i64::from(length), USERCMD_MAX_LEN)?;
            FramePayload::UserCmd(UserCmd {
                outgoing_sequence,
                slot,
                data: data.to_vec(),
            })
        }
        FRAME_STRING_TABLES => {
            cur.require_fields(tag, STRING_TABLES_FIELDS_SIZE)?;
            let length = cur.i32();
            let data = cur.payload(tag, i64::from(length), i32::MAX as usize)?;
            FramePayload::StringTables(StringTables {
                data: data.to_vec(),
            })
        }
        _ => {
            cur.require_fields(tag, NET_MSG_FIELDS_SIZE)?;
            let info = DemoInfo {
                flags: cur.i32(),
                primary: read_ref_params(cur),
                secondary: read_ref_params(cur),
            };
            let sequences = NetSequences {
                incoming_sequence: cur.i32(),
                incoming_acknowledged: cur.i32(),
                incoming_reliable_acknowledged: cur.i32(),
                incoming_reliable_sequence: cur.i32(),
                outgoing_sequence: cur.i32(),
                reliable_sequence: cur.i32(),
                last_reliable_sequence: cur.i32(),
            };
            let length = cur.i32();
            let msg = cur.payload(tag, i64::from(length), NET_MSG_MAX_LEN)?;
            FramePayload::NetMsg(NetMsg {
                tag,
                info,
                sequences,
                msg: msg.to_vec(),
            })
        }
    };

    Ok(Frame {
        time,
        frame,
        payload,
    })
}

fn read_ref_params(cur: &mut FrameCursor<'_>) -> RefParams {
    RefParams {
        view_origin: cur.vec3(),
        view_angles: cur.vec3(),
        local_view_angles: cur.vec3(),
    }
}

/// Frames of one section, decoded up to a terminator or the first problem.
#[derive(Debug)]
pub(crate) struct DecodedSection {
    pub(crate) frames: Vec<Frame>,
    /// `None` when the stream ended with a terminator frame.
    pub(crate) truncation: Option<Truncation>,
}

/// Decode frames from `offset` until a terminator or a truncation.
pub(crate) fn decode_section(data: &[u8], offset: usize) -> DecodedSection {
    let mut cur = FrameCursor::new(data, offset);
    let mut frames = Vec::new();
    loop {
        match decode_frame(&mut cur) {
            Ok(frame) => {
                log::trace!(
                    "frame tag={} time={} index={} at {}",
                    frame.tag(),
                    frame.time,
                    frame.frame,
                    cur.position()
                );
                let done = frame.is_terminator();
                frames.push(frame);
                if done {
                    return DecodedSection {
                        frames,
                        truncation: None,
                    };
                }
            }
            Err(truncation) => {
                return DecodedSection {
                    frames,
                    truncation: Some(truncation),
                }
            }
        }
    }
}

// ── Encoding ────────────────────────────────────────────────────

/// Why a frame cannot be encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FrameViolation {
    /// Payload longer than the reader accepts.
    TooLarge { len: usize, max: usize },
    /// Net message using a named frame kind's tag.
    ReservedTag,
    /// Console command with a NUL before its end; decoding stops there.
    InteriorNul { position: usize },
}

/// Check that `frame` encodes to bytes the decoder accepts.
pub(crate) fn validate_frame(frame: &Frame) -> Result<(), FrameViolation> {
    let (len, max) = match &frame.payload {
        FramePayload::JumpTime | FramePayload::NextSection => return Ok(()),
        FramePayload::ConsoleCommand(cmd) => {
            if let Some(position) = cmd.command.iter().position(|&b| b == 0) {
                return Err(FrameViolation::InteriorNul { position });
            }
            // Written with a trailing NUL.
            (cmd.command.len() + 1, CONSOLE_COMMAND_MAX_LEN)
        }
        FramePayload::UserCmd(cmd) => (cmd.data.len(), USERCMD_MAX_LEN),
        FramePayload::StringTables(tables) => (tables.data.len(), i32::MAX as usize),
        FramePayload::NetMsg(msg) => {
            if !is_net_msg_tag(msg.tag) {
                return Err(FrameViolation::ReservedTag);
            }
            (msg.msg.len(), NET_MSG_MAX_LEN)
        }
    };
    if len > max {
        return Err(FrameViolation::TooLarge { len, max });
    }
    Ok(())
}

/// Encode a frame: prefix, then the kind's fields in decoder order.
///
/// Length fields are narrowed without checks; run [`validate_frame`] first.
pub(crate) fn encode_frame(w: &mut dyn Write, frame: &Frame) -> io::Result<()> {
    w.write_u8(frame.tag())?;
    w.write_f32::<LittleEndian>(frame.time)?;
    w.write_i32::<LittleEndian>(frame.frame)?;

    match &frame.payload {
        FramePayload::JumpTime | FramePayload::NextSection => {}
        FramePayload::ConsoleCommand(cmd) => {
            w.write_i32::<LittleEndian>((cmd.command.len() + 1) as i32)?;
            w.write_all(&cmd.command)?;
            w.write_u8(0)?;
        }
        FramePayload::UserCmd(cmd) => {
            w.write_i32::<LittleEndian>(cmd.outgoing_sequence)?;
            w.write_i32::<LittleEndian>(cmd.slot)?;
            w.write_u16::<LittleEndian>(cmd.data.len() as u16)?;
            w.write_all(&cmd.data)?;
        }
        FramePayload::StringTables(tables) => {
            w.write_i32::<LittleEndian>(tables.data.len() as i32)?;
            w.write_all(&tables.data)?;
        }
        FramePayload::NetMsg(msg) => {
            w.write_i32::<LittleEndian>(msg.info.flags)?;
            write_ref_params(w, &msg.info.primary)?;
            write_ref_params(w, &msg.info.secondary)?;
            let seq = &msg.sequences;
            for v in [
                seq.incoming_sequence,
                seq.incoming_acknowledged,
                seq.incoming_reliable_acknowledged,
                seq.incoming_reliable_sequence,
                seq.outgoing_sequence,
                seq.reliable_sequence,
                seq.last_reliable_sequence,
            ] {
                w.write_i32::<LittleEndian>(v)?;
            }
            w.write_i32::<LittleEndian>(msg.msg.len() as i32)?;
            w.write_all(&msg.msg)?;
        }
    }
    Ok(())
}

fn write_ref_params(w: &mut dyn Write, params: &RefParams) -> io::Result<()> {
    for v in params
        .view_origin
        .iter()
        .chain(&params.view_angles)
        .chain(&params.local_view_angles)
    {
        w.write_f32::<LittleEndian>(*v)?;
    }
    Ok(())
}
