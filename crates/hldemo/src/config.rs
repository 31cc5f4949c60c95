//! Options controlling how a demo is opened.

use std::path::Path;

use crate::error::DemoError;
use crate::file::DemoFile;

/// Options for opening a demo, in the style of [`std::fs::OpenOptions`].
///
/// By default only the header and directory are read; frames are decoded
/// later by [`DemoFile::load_frames`].
///
/// # Examples
///
/// ```no_run
/// use hldemo::OpenOptions;
///
/// let demo = OpenOptions::new().read_frames(true).open("match.dem")?;
/// assert!(demo.frames_loaded());
/// # Ok::<(), hldemo::DemoError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Decode every section's frames while opening. Default: `false`.
    pub read_frames: bool,
}

impl OpenOptions {
    /// Options with every setting at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode frames eagerly when opening.
    pub fn read_frames(&mut self, read_frames: bool) -> &mut Self {
        self.read_frames = read_frames;
        self
    }

    /// Open the demo at `path` with these options.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<DemoFile, DemoError> {
        DemoFile::open_with(path, self)
    }

    /// Parse an in-memory demo image with these options.
    pub fn parse(&self, data: &[u8]) -> Result<DemoFile, DemoError> {
        DemoFile::parse(data, self)
    }
}
