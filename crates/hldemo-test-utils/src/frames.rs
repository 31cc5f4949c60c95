//! Raw frame records.
//!
//! Each function returns the bytes of one frame: the 9-byte prefix (tag,
//! time, index) followed by the kind's fields. Length fields are written
//! exactly as given, so callers control terminators and can declare lengths
//! that disagree with the payload.

use byteorder::{LittleEndian, WriteBytesExt};

pub const FRAME_NETWORK_PACKET: u8 = 2;
pub const FRAME_JUMP_TIME: u8 = 3;
pub const FRAME_CONSOLE_COMMAND: u8 = 4;
pub const FRAME_USERCMD: u8 = 5;
pub const FRAME_STRING_TABLES: u8 = 6;
pub const FRAME_NEXT_SECTION: u8 = 7;

/// Demo info (76 bytes) plus seven sequence numbers (28 bytes).
pub const NET_MSG_INFO_SIZE: usize = 104;

pub fn prefix(tag: u8, time: f32, frame: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(9);
    out.push(tag);
    out.write_f32::<LittleEndian>(time).expect("write to Vec");
    out.write_i32::<LittleEndian>(frame).expect("write to Vec");
    out
}

pub fn jump_time(time: f32, frame: i32) -> Vec<u8> {
    prefix(FRAME_JUMP_TIME, time, frame)
}

pub fn next_section(time: f32, frame: i32) -> Vec<u8> {
    prefix(FRAME_NEXT_SECTION, time, frame)
}

/// Console command whose declared length is `text.len()`; no NUL is added.
pub fn console_command(time: f32, frame: i32, text: &[u8]) -> Vec<u8> {
    let mut out = prefix(FRAME_CONSOLE_COMMAND, time, frame);
    out.write_i32::<LittleEndian>(text.len() as i32)
        .expect("write to Vec");
    out.extend_from_slice(text);
    out
}

pub fn user_cmd(time: f32, frame: i32, outgoing_sequence: i32, slot: i32, data: &[u8]) -> Vec<u8> {
    let mut out = prefix(FRAME_USERCMD, time, frame);
    out.write_i32::<LittleEndian>(outgoing_sequence)
        .expect("write to Vec");
    out.write_i32::<LittleEndian>(slot).expect("write to Vec");
    out.write_u16::<LittleEndian>(data.len() as u16)
        .expect("write to Vec");
    out.extend_from_slice(data);
    out
}

pub fn string_tables(time: f32, frame: i32, data: &[u8]) -> Vec<u8> {
    let mut out = prefix(FRAME_STRING_TABLES, time, frame);
    out.write_i32::<LittleEndian>(data.len() as i32)
        .expect("write to Vec");
    out.extend_from_slice(data);
    out
}

/// Net message with zeroed view info and sequences.
pub fn net_msg(time: f32, frame: i32, tag: u8, msg: &[u8]) -> Vec<u8> {
    let mut out = prefix(tag, time, frame);
    out.extend_from_slice(&[0u8; NET_MSG_INFO_SIZE]);
    out.write_i32::<LittleEndian>(msg.len() as i32)
        .expect("write to Vec");
    out.extend_from_slice(msg);
    out
}

/// A frame of kind `tag` whose length field says `declared` while
/// `payload_len` zero bytes actually follow.
///
/// Fixed fields other than the length are zeroed. For user commands the
/// declared length is narrowed to the on-disk `u16`.
pub fn with_declared_length(tag: u8, declared: i32, payload_len: usize) -> Vec<u8> {
    let mut out = prefix(tag, 0.0, 0);
    match tag {
        FRAME_CONSOLE_COMMAND | FRAME_STRING_TABLES => {
            out.write_i32::<LittleEndian>(declared).expect("write to Vec");
        }
        FRAME_USERCMD => {
            out.extend_from_slice(&[0u8; 8]);
            out.write_u16::<LittleEndian>(declared as u16)
                .expect("write to Vec");
        }
        FRAME_JUMP_TIME | FRAME_NEXT_SECTION => {
            panic!("frame tag {tag} has no length field")
        }
        _ => {
            out.extend_from_slice(&[0u8; NET_MSG_INFO_SIZE]);
            out.write_i32::<LittleEndian>(declared).expect("write to Vec");
        }
    }
    out.resize(out.len() + payload_len, 0);
    out
}
