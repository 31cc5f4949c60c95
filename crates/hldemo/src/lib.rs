//! Reader and writer for the `HLDEMO` replay container.
//!
//! A demo records a play session as a fixed header, a directory of
//! sections, and per section a stream of tagged frames. This crate decodes
//! the container into plain values and encodes it back, recomputing every
//! offset the format stores.
//!
//! # Architecture
//!
//! - [`DemoFile`] is the entry point: open, validate, load frames, save
//! - [`DemoReader`] decodes the header and directory strictly, and frame
//!   streams leniently (a corrupt section is cut short, not fatal)
//! - [`encode_demo`] and [`DemoWriter`] produce the bytes
//! - [`FramePayload`] is a closed sum over the frame kinds; unrecognized tags
//!   decode as [`NetMsg`]
//!
//! # Format
//!
//! ```text
//! [SIGNATURE "HLDEMO\0\0"] [demo protocol i32] [net protocol i32]
//! [map name 260B] [game dir 260B] [directory offset i32]      = 540 bytes
//! [section 0 frames ... terminator] [section 1 frames ... terminator] ...
//! [entry count i32] [entry 0: 20B] [entry 1: 20B] ...
//! ```
//!
//! Each frame is a 9-byte prefix (tag u8, time f32, index i32) followed by
//! fields determined by the tag. All integers and floats are little-endian.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod config;
pub mod error;
pub mod file;
pub mod reader;
pub mod types;
pub mod writer;

pub use config::OpenOptions;
pub use error::{DemoError, EncodeIssue, FormatIssue, NameIssue, Truncation};
pub use file::DemoFile;
pub use reader::{DemoReader, FrameReport};
pub use types::*;
pub use writer::{encode_demo, DemoWriter};

/// Signature at the start of every demo file. Two reserved zero bytes follow.
pub const SIGNATURE: [u8; 6] = *b"HLDEMO";

/// The demo protocol whose frame streams this crate decodes.
pub const DEMO_PROTOCOL: i32 = 2;
