//! JSON persistence for the clip collection.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::clip::Clip;
use crate::collection::ClipCollection;
use crate::stream::HighlightedStream;
use crate::ClipResult;

/// Current on-disk format version.
pub const LIBRARY_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct LibraryFile {
    version: u32,
    clips: Vec<Clip>,
    streams: Vec<HighlightedStream>,
}

/// A clip collection stored as a JSON file.
#[derive(Debug, Clone)]
pub struct ClipLibrary {
    path: PathBuf,
}

impl ClipLibrary {
    /// Library backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the collection; a missing file yields an empty collection.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> ClipResult<ClipCollection> {
        if !self.path.exists() {
            debug!("Library file missing, starting empty");
            return Ok(ClipCollection::new());
        }

        let text = fs::read_to_string(&self.path)?;
        let file: LibraryFile = serde_json::from_str(&text)?;
        info!(
            clips = file.clips.len(),
            streams = file.streams.len(),
            "Library loaded"
        );
        Ok(ClipCollection::from_parts(file.clips, file.streams))
    }

    /// Save the collection, replacing the file atomically.
    #[instrument(skip(self, collection), fields(path = %self.path.display()))]
    pub fn save(&self, collection: &ClipCollection) -> ClipResult<()> {
        let (clips, streams) = collection.to_parts();
        let file = LibraryFile {
            version: LIBRARY_VERSION,
            clips,
            streams,
        };
        let json = serde_json::to_vec_pretty(&file)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut out = fs::File::create(&tmp)?;
            out.write_all(&json)?;
            out.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(bytes = json.len(), "Library saved");
        Ok(())
    }
}
