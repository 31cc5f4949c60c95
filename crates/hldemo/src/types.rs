//! In-memory model of a demo: header, directory entries and frames.

use std::borrow::Cow;
use std::fmt;

use crate::error::{DemoError, NameIssue};

// ── Frame tag constants ─────────────────────────────────────────

/// Tag of the network packet frame. Any unnamed tag decodes the same way.
pub const FRAME_NETWORK_PACKET: u8 = 2;
/// Tag of the jump-time marker frame.
pub const FRAME_JUMP_TIME: u8 = 3;
/// Tag of the console command frame.
pub const FRAME_CONSOLE_COMMAND: u8 = 4;
/// Tag of the user command frame.
pub const FRAME_USERCMD: u8 = 5;
/// Tag of the string tables frame.
pub const FRAME_STRING_TABLES: u8 = 6;
/// Tag of the section terminator frame.
pub const FRAME_NEXT_SECTION: u8 = 7;

/// Whether `tag` falls through to the net message layout.
pub fn is_net_msg_tag(tag: u8) -> bool {
    !(FRAME_JUMP_TIME..=FRAME_NEXT_SECTION).contains(&tag)
}

// ── Header ──────────────────────────────────────────────────────

/// Capacity of the fixed-size name fields in the header.
pub const NAME_FIELD_SIZE: usize = 260;

/// A header name stored in a fixed 260-byte, NUL-padded field.
///
/// Holds raw bytes without the terminator. Construction enforces that the
/// name fits the field and has no interior NUL, so writing it out and
/// reading it back always yields the same bytes.
///
/// # Examples
///
/// ```
/// use hldemo::BoundedName;
///
/// let name = BoundedName::new("de_dust2").unwrap();
/// assert_eq!(name.as_bytes(), b"de_dust2");
/// assert!(BoundedName::new(vec![b'a'; 261]).is_err());
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BoundedName(Vec<u8>);

impl BoundedName {
    /// Validate and wrap a name.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, DemoError> {
        let bytes = bytes.into();
        if bytes.len() > NAME_FIELD_SIZE {
            return Err(NameIssue::TooLong {
                len: bytes.len(),
                max: NAME_FIELD_SIZE,
            }
            .into());
        }
        if let Some(position) = bytes.iter().position(|&b| b == 0) {
            return Err(NameIssue::InteriorNul { position }.into());
        }
        Ok(Self(bytes))
    }

    /// Take the bytes of a raw field up to the first NUL.
    pub(crate) fn from_field(field: &[u8]) -> Self {
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Self(field[..end.min(NAME_FIELD_SIZE)].to_vec())
    }

    /// Raw name bytes, without the terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The name decoded as UTF-8, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// True if the name is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for BoundedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl fmt::Display for BoundedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

/// The fixed 540-byte file header, minus the signature.
#[derive(Clone, Debug, PartialEq)]
pub struct DemoHeader {
    /// Demo format revision. Frames are only decoded for protocol 2.
    pub demo_protocol: i32,
    /// Network protocol of the recording client.
    pub net_protocol: i32,
    /// Map the session was recorded on.
    pub map_name: BoundedName,
    /// Game directory (mod) name.
    pub game_dir: BoundedName,
    /// Byte offset of the directory, as read. The writer recomputes it.
    pub directory_offset: i32,
}

// ── Directory ───────────────────────────────────────────────────

/// One section of the recording and the frames it owns.
///
/// `frame_count` and `file_length` are carried through as recorded; they
/// are advisory and never checked against the decoded frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DirectoryEntry {
    /// Section type (0 = loading segment, 1 = playback segment by convention).
    pub entry_type: i32,
    /// Playback duration of the section in seconds.
    pub playback_time: f32,
    /// Recorded frame count.
    pub frame_count: i32,
    /// Byte offset of the section's frame stream, as read.
    pub offset: i32,
    /// Recorded byte length of the frame stream.
    pub file_length: i32,
    /// Decoded frames. Empty until frames are loaded.
    pub frames: Vec<Frame>,
}

// ── Frames ──────────────────────────────────────────────────────

/// A single tagged record in a section's frame stream.
///
/// # Examples
///
/// ```
/// use hldemo::{Frame, FramePayload, FRAME_NEXT_SECTION};
///
/// let end = Frame::next_section(1.5, 90);
/// assert_eq!(end.tag(), FRAME_NEXT_SECTION);
/// assert!(end.is_terminator());
/// assert!(matches!(end.payload, FramePayload::NextSection));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Timestamp in seconds.
    pub time: f32,
    /// Frame index.
    pub frame: i32,
    /// Kind-specific payload; determines the tag.
    pub payload: FramePayload,
}

impl Frame {
    /// Build a frame from its parts.
    pub fn new(time: f32, frame: i32, payload: FramePayload) -> Self {
        Self {
            time,
            frame,
            payload,
        }
    }

    /// A section terminator frame.
    pub fn next_section(time: f32, frame: i32) -> Self {
        Self::new(time, frame, FramePayload::NextSection)
    }

    /// The on-disk tag of this frame.
    pub fn tag(&self) -> u8 {
        self.payload.tag()
    }

    /// True for the section terminator.
    pub fn is_terminator(&self) -> bool {
        matches!(self.payload, FramePayload::NextSection)
    }
}

/// Per-kind frame contents.
#[derive(Clone, Debug, PartialEq)]
pub enum FramePayload {
    /// Timeline jump marker.
    JumpTime,
    /// A console command typed or issued during recording.
    ConsoleCommand(ConsoleCommand),
    /// A client user command.
    UserCmd(UserCmd),
    /// Opaque string table snapshot.
    StringTables(StringTables),
    /// End of the section's stream.
    NextSection,
    /// Network message with client view state. Covers every unnamed tag.
    NetMsg(NetMsg),
}

impl FramePayload {
    /// The on-disk tag for this payload.
    pub fn tag(&self) -> u8 {
        match self {
            Self::JumpTime => FRAME_JUMP_TIME,
            Self::ConsoleCommand(_) => FRAME_CONSOLE_COMMAND,
            Self::UserCmd(_) => FRAME_USERCMD,
            Self::StringTables(_) => FRAME_STRING_TABLES,
            Self::NextSection => FRAME_NEXT_SECTION,
            Self::NetMsg(msg) => msg.tag,
        }
    }
}

/// Console command text, stored without its NUL terminator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsoleCommand {
    /// Raw command bytes.
    pub command: Vec<u8>,
}

impl ConsoleCommand {
    /// Wrap command text.
    pub fn new(command: impl Into<Vec<u8>>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// The command decoded as UTF-8, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.command)
    }
}

/// A recorded client user command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserCmd {
    /// Client outgoing sequence number.
    pub outgoing_sequence: i32,
    /// Command slot.
    pub slot: i32,
    /// Opaque command bytes (at most 1024).
    pub data: Vec<u8>,
}

/// Opaque string table data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StringTables {
    /// Raw table bytes.
    pub data: Vec<u8>,
}

/// Client view parameters for one view.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RefParams {
    /// Eye position.
    pub view_origin: [f32; 3],
    /// View angles.
    pub view_angles: [f32; 3],
    /// Local view angles.
    pub local_view_angles: [f32; 3],
}

/// View telemetry attached to every net message frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DemoInfo {
    /// Info flags.
    pub flags: i32,
    /// First view.
    pub primary: RefParams,
    /// Second view.
    pub secondary: RefParams,
}

/// Netchan sequence counters at the time of the message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetSequences {
    /// Last incoming sequence number.
    pub incoming_sequence: i32,
    /// Last acknowledged incoming sequence.
    pub incoming_acknowledged: i32,
    /// Reliable bit of the last acknowledged message.
    pub incoming_reliable_acknowledged: i32,
    /// Reliable bit of the last incoming message.
    pub incoming_reliable_sequence: i32,
    /// Next outgoing sequence number.
    pub outgoing_sequence: i32,
    /// Current outgoing reliable bit.
    pub reliable_sequence: i32,
    /// Outgoing sequence of the last reliable send.
    pub last_reliable_sequence: i32,
}

/// A network message frame.
///
/// Keeps its raw tag so unnamed tags survive a round trip unchanged. The
/// tag must not be one of the named frame kinds (3 through 7).
#[derive(Clone, Debug, PartialEq)]
pub struct NetMsg {
    /// On-disk tag.
    pub tag: u8,
    /// View telemetry.
    pub info: DemoInfo,
    /// Netchan counters.
    pub sequences: NetSequences,
    /// Opaque message bytes (at most 80032).
    pub msg: Vec<u8>,
}

impl Default for NetMsg {
    fn default() -> Self {
        Self {
            tag: FRAME_NETWORK_PACKET,
            info: DemoInfo::default(),
            sequences: NetSequences::default(),
            msg: Vec::new(),
        }
    }
}
