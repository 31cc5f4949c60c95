//! Error types for demo loading, frame decoding and saving.

use std::io;

use thiserror::Error;

/// Errors that can occur while reading, decoding or writing a demo.
#[derive(Debug, Error)]
pub enum DemoError {
    /// An I/O error occurred while opening, reading or writing a stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The header or directory failed validation. No partial result exists.
    #[error("invalid demo file: {0}")]
    InvalidFormat(FormatIssue),
    /// The header's demo protocol cannot be frame-decoded by this build.
    ///
    /// Header and directory remain usable; only frame decoding is refused.
    #[error("unsupported demo protocol {found} (only protocol {expected} is supported)")]
    UnsupportedVersion {
        /// Protocol found in the header.
        found: i32,
        /// The one protocol this codec decodes.
        expected: i32,
    },
    /// A section's frame stream ended early or carried an out-of-range length.
    ///
    /// Never returned from a load: decoding reports it as a diagnostic,
    /// keeps the frames decoded so far and moves on to the next entry.
    #[error("section {entry} truncated: {reason}")]
    TruncatedSection {
        /// Index of the directory entry.
        entry: usize,
        /// Where decoding stopped.
        reason: Truncation,
    },
    /// The in-memory demo cannot be encoded into a file a reader would accept.
    #[error("cannot encode demo: {0}")]
    Encode(EncodeIssue),
    /// A header name does not fit its fixed on-disk field.
    #[error("invalid name: {0}")]
    InvalidName(NameIssue),
    /// The demo was built from memory and has no path to reload from or save to.
    #[error("demo has no source path")]
    NoSourcePath,
}

/// Which header/directory check failed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FormatIssue {
    /// The file is shorter than the fixed header.
    #[error("file is {size} bytes, smaller than the {min}-byte header")]
    TooSmall {
        /// Actual file size.
        size: usize,
        /// Required minimum.
        min: usize,
    },
    /// The leading signature bytes do not match `HLDEMO`.
    #[error("signature does not match")]
    SignatureMismatch,
    /// The directory offset is negative or points past the end of the file.
    #[error("directory offset {offset} is out of bounds")]
    DirectoryOffset {
        /// Offset from the header.
        offset: i32,
    },
    /// The directory entry count is outside `[1, 1024]`.
    #[error("directory entry count {count} is out of range")]
    EntryCount {
        /// Count read from the directory.
        count: i32,
    },
    /// Fewer bytes remain than the directory entries require.
    #[error("directory needs {needed} bytes for {count} entries, {available} available")]
    DirectoryTruncated {
        /// Entry count read from the directory.
        count: i32,
        /// Bytes required by `count` entries.
        needed: usize,
        /// Bytes remaining after the count field.
        available: usize,
    },
}

/// Where a section's frame stream stopped.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Truncation {
    /// The entry's offset is negative or beyond the file; nothing was read.
    #[error("offset {offset} is outside the file")]
    OffsetOutOfBounds {
        /// Offset from the directory entry.
        offset: i32,
    },
    /// Not enough bytes for the next frame's 9-byte prefix.
    #[error("{remaining} bytes left at {position}, not enough for a frame prefix")]
    MissingPrefix {
        /// Absolute file position.
        position: usize,
        /// Bytes left in the file.
        remaining: usize,
    },
    /// Not enough bytes for the fixed fields of a frame.
    #[error("frame tag {tag} at {position} needs {needed} bytes of fields, {remaining} left")]
    MissingFields {
        /// Frame tag.
        tag: u8,
        /// Absolute file position of the fields.
        position: usize,
        /// Fixed field size of this frame kind.
        needed: usize,
        /// Bytes left in the file.
        remaining: usize,
    },
    /// The declared payload length is negative or above the frame kind's limit.
    #[error("frame tag {tag} declares length {length}, allowed range is [0, {max}]")]
    LengthOutOfRange {
        /// Frame tag.
        tag: u8,
        /// Declared length.
        length: i64,
        /// Largest length accepted for this frame kind.
        max: i64,
    },
    /// The declared payload runs past the end of the file.
    #[error("frame tag {tag} declares {length} payload bytes, {remaining} left")]
    PayloadPastEnd {
        /// Frame tag.
        tag: u8,
        /// Declared length.
        length: usize,
        /// Bytes left in the file.
        remaining: usize,
    },
}

/// Why the writer refused to encode.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EncodeIssue {
    /// A frame payload exceeds what the reader accepts for its kind.
    #[error("entry {entry} frame {index} (tag {tag}) has {len} payload bytes, limit is {max}")]
    PayloadTooLarge {
        /// Directory entry index.
        entry: usize,
        /// Frame index within the entry.
        index: usize,
        /// Frame tag.
        tag: u8,
        /// Payload length as it would be written.
        len: usize,
        /// Largest length the reader accepts.
        max: usize,
    },
    /// The directory would hold a count outside `[1, 1024]`.
    #[error("{count} directory entries, expected between 1 and 1024")]
    EntryCount {
        /// Number of in-memory entries.
        count: usize,
    },
    /// A net message frame carries a tag reserved for another frame kind.
    #[error("entry {entry} frame {index} is a net message with reserved tag {tag}")]
    NetMsgTag {
        /// Directory entry index.
        entry: usize,
        /// Frame index within the entry.
        index: usize,
        /// The reserved tag.
        tag: u8,
    },
    /// A console command holds a NUL byte, which would cut it short on disk.
    #[error("entry {entry} frame {index} console command has a NUL byte at {position}")]
    CommandNul {
        /// Directory entry index.
        entry: usize,
        /// Frame index within the entry.
        index: usize,
        /// Index of the first NUL in the command.
        position: usize,
    },
    /// A section or the directory would start past `i32::MAX`.
    #[error("position {position} does not fit a 32-bit offset")]
    OffsetOverflow {
        /// Byte position in the output.
        position: usize,
    },
}

/// Why a name was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NameIssue {
    /// Longer than the fixed on-disk field.
    #[error("{len} bytes, field holds at most {max}")]
    TooLong {
        /// Length of the rejected name.
        len: usize,
        /// Field capacity.
        max: usize,
    },
    /// Contains a NUL byte, which would cut the name short on disk.
    #[error("contains a NUL byte at {position}")]
    InteriorNul {
        /// Index of the first NUL.
        position: usize,
    },
}

impl From<FormatIssue> for DemoError {
    fn from(issue: FormatIssue) -> Self {
        Self::InvalidFormat(issue)
    }
}

impl From<EncodeIssue> for DemoError {
    fn from(issue: EncodeIssue) -> Self {
        Self::Encode(issue)
    }
}

impl From<NameIssue> for DemoError {
    fn from(issue: NameIssue) -> Self {
        Self::InvalidName(issue)
    }
}
