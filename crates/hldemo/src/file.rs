//! The demo file facade: open, validate, lazily load frames, save.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::codec::HEADER_SIZE;
use crate::config::OpenOptions;
use crate::error::DemoError;
use crate::reader::DemoReader;
use crate::types::{DemoHeader, DirectoryEntry};
use crate::writer::{encode_demo, DemoWriter};
use crate::SIGNATURE;

/// A demo held in memory.
///
/// Owns the header and the directory entries, each of which owns its
/// frames. Opening from a path reads only the header and directory;
/// [`load_frames`](Self::load_frames) decodes the frame streams later by
/// re-reading the file. Every call that touches the filesystem opens and
/// closes its own handle.
///
/// # Examples
///
/// ```no_run
/// use hldemo::DemoFile;
///
/// let mut demo = DemoFile::open("match.dem")?;
/// println!("{} on {}", demo.header.game_dir, demo.header.map_name);
///
/// demo.load_frames()?;
/// for entry in &demo.entries {
///     println!("section {}: {} frames", entry.entry_type, entry.frames.len());
/// }
/// demo.save("match-copy.dem")?;
/// # Ok::<(), hldemo::DemoError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DemoFile {
    /// File header.
    pub header: DemoHeader,
    /// Directory entries in file order.
    pub entries: Vec<DirectoryEntry>,
    path: Option<PathBuf>,
    frames_loaded: bool,
}

impl DemoFile {
    /// Assemble a demo from parts. Frames count as loaded.
    pub fn new(header: DemoHeader, entries: Vec<DirectoryEntry>) -> Self {
        Self {
            header,
            entries,
            path: None,
            frames_loaded: true,
        }
    }

    /// Open a demo, validating its header and directory. Frames are not read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DemoError> {
        OpenOptions::new().open(path)
    }

    pub(crate) fn open_with(
        path: impl AsRef<Path>,
        options: &OpenOptions,
    ) -> Result<Self, DemoError> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        log::debug!("opened demo {} ({} bytes)", path.display(), data.len());
        let mut demo = Self::parse(&data, options)?;
        demo.path = Some(path.to_path_buf());
        Ok(demo)
    }

    pub(crate) fn parse(data: &[u8], options: &OpenOptions) -> Result<Self, DemoError> {
        let reader = DemoReader::new(data)?;
        let header = reader.read_header()?;
        let mut entries = reader.read_directory(&header)?;
        if options.read_frames {
            reader.read_frames(&header, &mut entries)?;
        }
        Ok(Self {
            header,
            entries,
            path: None,
            frames_loaded: options.read_frames,
        })
    }

    /// Decode a complete in-memory demo, frames included.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DemoError> {
        OpenOptions::new().read_frames(true).parse(data)
    }

    /// Read a stream to its end and decode it, frames included.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, DemoError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Cheap check of size and signature.
    ///
    /// Returns `Ok(false)` for any readable file that is not a demo; fails
    /// only if the path cannot be opened or read.
    pub fn is_valid_file(path: impl AsRef<Path>) -> Result<bool, DemoError> {
        let mut file = File::open(path)?;
        if file.metadata()?.len() < HEADER_SIZE as u64 {
            return Ok(false);
        }
        let mut signature = [0u8; SIGNATURE.len()];
        file.read_exact(&mut signature)?;
        Ok(signature == SIGNATURE)
    }

    /// True once every section's frames have been decoded.
    pub fn frames_loaded(&self) -> bool {
        self.frames_loaded
    }

    /// The path this demo was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Decode frames if they are not loaded yet.
    ///
    /// Re-opens the source path with frame decoding enabled and replaces
    /// `self` wholesale, so in-memory edits to the header or directory are
    /// discarded. On error `self` is left as it was.
    pub fn load_frames(&mut self) -> Result<(), DemoError> {
        if self.frames_loaded {
            return Ok(());
        }
        let path = self.path.clone().ok_or(DemoError::NoSourcePath)?;
        *self = OpenOptions::new().read_frames(true).open(path)?;
        Ok(())
    }

    /// Encode to bytes. Entry offsets and the directory offset are recomputed.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DemoError> {
        self.warn_if_unloaded();
        encode_demo(&self.header, &self.entries)
    }

    /// Encode into a byte sink.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), DemoError> {
        self.warn_if_unloaded();
        let mut writer = DemoWriter::new(writer);
        writer.write_demo(&self.header, &self.entries)?;
        writer.flush()
    }

    /// Encode and write to `path`, replacing any existing file.
    ///
    /// Nothing is created if encoding fails. Writing is not atomic; callers
    /// that need that should save to a temporary path and rename.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DemoError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        fs::write(path, &bytes)?;
        log::debug!("saved demo {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Save back to the path the demo was opened from.
    pub fn save_in_place(&self) -> Result<(), DemoError> {
        let path = self.path.as_ref().ok_or(DemoError::NoSourcePath)?;
        self.save(path)
    }

    fn warn_if_unloaded(&self) {
        if !self.frames_loaded {
            log::warn!("encoding a demo with unloaded frames; every section will be empty");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundedName, Frame, FramePayload};
    use hldemo_test_utils::{frames, init_logging, DemoBytes, Section};
    use tempfile::tempdir;

    #[test]
    fn open_is_lazy_and_load_frames_is_idempotent() {
        init_logging();
        let dir = tempdir().unwrap();
        let path = dir.path().join("lazy.dem");
        let mut body = frames::jump_time(0.0, 1);
        body.extend(frames::next_section(0.5, 2));
        fs::write(&path, DemoBytes::new().section(Section::new(body)).build()).unwrap();

        let mut demo = DemoFile::open(&path).unwrap();
        assert!(!demo.frames_loaded());
        assert_eq!(demo.path(), Some(path.as_path()));
        assert!(demo.entries[0].frames.is_empty());

        demo.load_frames().unwrap();
        assert!(demo.frames_loaded());
        assert_eq!(demo.entries[0].frames.len(), 2);

        // A second call must not re-read: deleting the file proves it.
        fs::remove_file(&path).unwrap();
        demo.load_frames().unwrap();
        assert_eq!(demo.entries[0].frames.len(), 2);
    }

    #[test]
    fn failed_load_leaves_demo_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v3.dem");
        fs::write(&path, DemoBytes::minimal().demo_protocol(3).build()).unwrap();

        let mut demo = DemoFile::open(&path).unwrap();
        let before = demo.clone();
        assert!(matches!(
            demo.load_frames(),
            Err(DemoError::UnsupportedVersion { found: 3, .. })
        ));
        assert_eq!(demo, before);
        assert_eq!(demo.header.demo_protocol, 3);
    }

    #[test]
    fn memory_demo_has_no_source() {
        let mut demo = DemoFile::from_bytes(&DemoBytes::minimal().build()).unwrap();
        assert!(demo.frames_loaded());
        assert!(demo.load_frames().is_ok());
        assert!(matches!(demo.save_in_place(), Err(DemoError::NoSourcePath)));

        let mut lazy = OpenOptions::new().parse(&DemoBytes::minimal().build()).unwrap();
        assert!(matches!(lazy.load_frames(), Err(DemoError::NoSourcePath)));
    }

    #[test]
    fn is_valid_file_checks() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.dem");
        fs::write(&good, DemoBytes::minimal().build()).unwrap();
        assert!(DemoFile::is_valid_file(&good).unwrap());

        let short = dir.path().join("short.dem");
        fs::write(&short, vec![0u8; 539]).unwrap();
        assert!(!DemoFile::is_valid_file(&short).unwrap());

        let wrong = dir.path().join("wrong.dem");
        fs::write(&wrong, DemoBytes::minimal().signature(*b"HLDEMX\0\0").build()).unwrap();
        assert!(!DemoFile::is_valid_file(&wrong).unwrap());

        // Directory problems are not part of the cheap check.
        let bad_dir = dir.path().join("bad_dir.dem");
        fs::write(&bad_dir, DemoBytes::minimal().entry_count(0).build()).unwrap();
        assert!(DemoFile::is_valid_file(&bad_dir).unwrap());
        assert!(DemoFile::open(&bad_dir).is_err());

        let missing = dir.path().join("missing.dem");
        assert!(matches!(
            DemoFile::is_valid_file(&missing),
            Err(DemoError::Io(_))
        ));
    }

    #[test]
    fn save_does_not_touch_offsets() {
        let dir = tempdir().unwrap();
        let mut body = frames::string_tables(0.0, 0, &[9; 16]);
        body.extend(frames::next_section(0.0, 1));
        let mut demo = DemoFile::from_bytes(
            &DemoBytes::new()
                .section(Section::new(frames::next_section(0.0, 0)))
                .section(Section::new(body))
                .build(),
        )
        .unwrap();
        demo.header.map_name = BoundedName::new("datacore").unwrap();
        demo.entries[0]
            .frames
            .insert(0, Frame::new(0.0, 0, FramePayload::JumpTime));
        let before = demo.clone();

        let out = dir.path().join("out.dem");
        demo.save(&out).unwrap();
        assert_eq!(demo, before);

        let first = fs::read(&out).unwrap();
        demo.save(&out).unwrap();
        assert_eq!(fs::read(&out).unwrap(), first);

        let reopened = OpenOptions::new().read_frames(true).open(&out).unwrap();
        assert_eq!(reopened.header.map_name.as_bytes(), b"datacore");
        assert_eq!(reopened.entries[0].frames, demo.entries[0].frames);
        assert_eq!(reopened.entries[1].frames, demo.entries[1].frames);
        assert_ne!(reopened.entries[1].offset, demo.entries[1].offset);
    }

    #[test]
    fn save_failure_creates_nothing() {
        let dir = tempdir().unwrap();
        let mut demo = DemoFile::from_bytes(&DemoBytes::minimal().build()).unwrap();
        demo.entries.clear();
        let out = dir.path().join("never.dem");
        assert!(matches!(demo.save(&out), Err(DemoError::Encode(_))));
        assert!(!out.exists());
    }

    #[test]
    fn write_to_matches_to_bytes() {
        let demo = DemoFile::from_bytes(&DemoBytes::minimal().build()).unwrap();
        let mut sink = Vec::new();
        demo.write_to(&mut sink).unwrap();
        assert_eq!(sink, demo.to_bytes().unwrap());
        assert_eq!(DemoFile::from_reader(sink.as_slice()).unwrap(), demo);
    }
}
