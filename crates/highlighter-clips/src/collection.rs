//! In-memory clip dictionary keyed by path.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use highlighter_ipc::ClipSource;

use crate::clip::{trims_valid, Clip, StreamClipInfo};
use crate::error::ClipError;
use crate::stream::{HighlightedStream, StreamState};
use crate::ClipResult;

/// Clips keyed by path plus the stream collections they belong to.
///
/// A clip has one global order position and one order position per stream
/// it belongs to. Positions are kept dense (`0..n`) after every mutation.
#[derive(Debug, Default, Clone)]
pub struct ClipCollection {
    clips: HashMap<PathBuf, Clip>,
    streams: HashMap<String, HighlightedStream>,
}

impl ClipCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored clips and streams, re-densifying positions.
    pub fn from_parts(clips: Vec<Clip>, streams: Vec<HighlightedStream>) -> Self {
        let mut collection = Self {
            clips: clips.into_iter().map(|c| (c.path.clone(), c)).collect(),
            streams: streams.into_iter().map(|s| (s.id.clone(), s)).collect(),
        };
        collection.compact(None);
        let ids: Vec<String> = collection.streams.keys().cloned().collect();
        for id in ids {
            collection.compact(Some(id.as_str()));
        }
        collection
    }

    /// Number of clips.
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// Whether there are no clips.
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Look up a clip.
    pub fn get(&self, path: &Path) -> Option<&Clip> {
        self.clips.get(path)
    }

    /// Add a stream collection, replacing one with the same id.
    pub fn add_stream(&mut self, stream: HighlightedStream) {
        debug!(id = %stream.id, "Adding stream");
        self.streams.insert(stream.id.clone(), stream);
    }

    /// Look up a stream collection.
    pub fn stream(&self, id: &str) -> Option<&HighlightedStream> {
        self.streams.get(id)
    }

    /// All stream collections, ordered by id.
    pub fn streams(&self) -> Vec<&HighlightedStream> {
        let mut streams: Vec<&HighlightedStream> = self.streams.values().collect();
        streams.sort_by(|a, b| a.id.cmp(&b.id));
        streams
    }

    /// Update the processing state of a stream.
    pub fn set_stream_state(&mut self, id: &str, state: StreamState) -> ClipResult<()> {
        let stream = self
            .streams
            .get_mut(id)
            .ok_or_else(|| ClipError::StreamNotFound(id.to_string()))?;
        stream.state = state;
        Ok(())
    }

    /// Add clip files, appending them to the global list and to `stream_id`.
    ///
    /// Paths already present are not duplicated; they are only attached to
    /// the stream. Returns the paths that were newly created.
    #[instrument(skip(self, paths), fields(count = paths.len()))]
    pub fn add_clips(
        &mut self,
        paths: &[PathBuf],
        stream_id: Option<&str>,
        source: ClipSource,
    ) -> Vec<PathBuf> {
        if let Some(id) = stream_id {
            if !self.streams.contains_key(id) {
                debug!(id, "Creating stream collection for new clips");
                self.streams
                    .insert(id.to_string(), HighlightedStream::new(id));
            }
        }

        let mut added = Vec::new();
        for path in paths {
            if self.clips.contains_key(path) {
                self.attach(path, stream_id, None, None);
                if let Some(clip) = self.clips.get_mut(path) {
                    clip.deleted = false;
                }
                continue;
            }

            let mut clip = Clip::new(path.clone(), source);
            clip.global_order_position = self.clips.len();
            self.clips.insert(path.clone(), clip);
            self.attach(path, stream_id, None, None);
            added.push(path.clone());
        }

        info!(added = added.len(), "Clips added");
        added
    }

    /// Insert a fully formed clip (e.g. one created from the replay buffer).
    ///
    /// Order positions are assigned here; any positions on `clip` are ignored.
    pub fn add_clip(&mut self, mut clip: Clip, stream_id: Option<&str>) -> ClipResult<()> {
        if self.clips.contains_key(&clip.path) {
            return Err(ClipError::DuplicateClip(clip.path));
        }
        if !trims_valid(clip.start_trim, clip.end_trim, clip.duration) {
            return Err(ClipError::InvalidTrim {
                path: clip.path,
                start: clip.start_trim,
                end: clip.end_trim,
            });
        }
        if let Some(id) = stream_id {
            if !self.streams.contains_key(id) {
                self.streams
                    .insert(id.to_string(), HighlightedStream::new(id));
            }
        }

        let path = clip.path.clone();
        let (start, end) = clip
            .stream_info
            .values()
            .next()
            .map(|info| (info.initial_start_time, info.initial_end_time))
            .unwrap_or((None, None));
        clip.stream_info.clear();
        clip.global_order_position = self.clips.len();
        self.clips.insert(path.clone(), clip);
        self.attach(&path, stream_id, start, end);
        Ok(())
    }

    fn attach(
        &mut self,
        path: &Path,
        stream_id: Option<&str>,
        initial_start_time: Option<f64>,
        initial_end_time: Option<f64>,
    ) {
        let Some(id) = stream_id else {
            return;
        };
        let next = self
            .clips
            .values()
            .filter(|c| c.stream_info.contains_key(id))
            .count();
        if let Some(clip) = self.clips.get_mut(path) {
            clip.stream_info
                .entry(id.to_string())
                .or_insert(StreamClipInfo {
                    order_position: next,
                    initial_start_time,
                    initial_end_time,
                });
        }
    }

    /// Remove a clip and close the gaps it leaves in every ordering.
    pub fn remove_clip(&mut self, path: &Path) -> ClipResult<Clip> {
        let clip = self
            .clips
            .remove(path)
            .ok_or_else(|| ClipError::ClipNotFound(path.to_path_buf()))?;

        self.compact(None);
        for id in clip.stream_info.keys() {
            self.compact(Some(id.as_str()));
        }

        debug!(path = %path.display(), "Clip removed");
        Ok(clip)
    }

    /// Remove a stream collection and every clip that only belonged to it.
    pub fn remove_stream(&mut self, id: &str) -> ClipResult<Vec<PathBuf>> {
        if self.streams.remove(id).is_none() {
            return Err(ClipError::StreamNotFound(id.to_string()));
        }

        let mut removed = Vec::new();
        self.clips.retain(|path, clip| {
            if clip.stream_info.remove(id).is_some() && clip.stream_info.is_empty() {
                removed.push(path.clone());
                false
            } else {
                true
            }
        });

        self.compact(None);
        info!(id, removed = removed.len(), "Stream removed");
        Ok(removed)
    }

    /// Include or exclude a clip from exports.
    pub fn set_enabled(&mut self, path: &Path, enabled: bool) -> ClipResult<()> {
        self.clip_mut(path)?.enabled = enabled;
        Ok(())
    }

    /// Record a probed duration and mark the clip loaded.
    ///
    /// Trims that no longer fit the duration are reset.
    pub fn set_duration(&mut self, path: &Path, duration: f64) -> ClipResult<()> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ClipError::InvalidDuration {
                path: path.to_path_buf(),
                duration,
            });
        }

        let clip = self.clip_mut(path)?;
        clip.duration = Some(duration);
        clip.loaded = true;
        if !trims_valid(clip.start_trim, clip.end_trim, clip.duration) {
            warn!(
                path = %path.display(),
                start = clip.start_trim,
                end = clip.end_trim,
                duration,
                "Trims do not fit the probed duration, resetting"
            );
            clip.start_trim = 0.0;
            clip.end_trim = 0.0;
        }
        Ok(())
    }

    /// Set start and end trims.
    pub fn set_trim(&mut self, path: &Path, start: f64, end: f64) -> ClipResult<()> {
        let clip = self.clip_mut(path)?;
        if !trims_valid(start, end, clip.duration) {
            return Err(ClipError::InvalidTrim {
                path: path.to_path_buf(),
                start,
                end,
            });
        }
        clip.start_trim = start;
        clip.end_trim = end;
        Ok(())
    }

    /// Flag clips whose file no longer exists.
    pub fn refresh_missing(&mut self, exists: impl Fn(&Path) -> bool) -> usize {
        let mut missing = 0;
        for clip in self.clips.values_mut() {
            clip.deleted = !exists(&clip.path);
            if clip.deleted {
                missing += 1;
            }
        }
        if missing > 0 {
            warn!(missing, "Clip files missing on disk");
        }
        missing
    }

    /// Reorder a collection. `ordered` lists paths in their new order;
    /// clips not listed keep their relative order after the listed ones.
    pub fn reorder(&mut self, stream_id: Option<&str>, ordered: &[PathBuf]) -> ClipResult<()> {
        if let Some(id) = stream_id {
            if !self.streams.contains_key(id) {
                return Err(ClipError::StreamNotFound(id.to_string()));
            }
        }

        let mut seen = HashSet::new();
        for path in ordered {
            let member = self
                .clips
                .get(path)
                .is_some_and(|c| c.order_position(stream_id).is_some());
            if !member {
                return Err(ClipError::InvalidOrder(format!(
                    "{} is not in this collection",
                    path.display()
                )));
            }
            if !seen.insert(path) {
                return Err(ClipError::InvalidOrder(format!(
                    "{} listed twice",
                    path.display()
                )));
            }
        }

        let rest: Vec<PathBuf> = self
            .sorted_paths(stream_id)
            .into_iter()
            .filter(|p| !seen.contains(p))
            .collect();

        for (position, path) in ordered.iter().chain(rest.iter()).enumerate() {
            if let Some(clip) = self.clips.get_mut(path) {
                set_position(clip, stream_id, position);
            }
        }
        Ok(())
    }

    /// Clips of a collection (or all clips) in order.
    pub fn clips(&self, stream_id: Option<&str>) -> Vec<&Clip> {
        let mut clips: Vec<&Clip> = self
            .clips
            .values()
            .filter(|c| c.order_position(stream_id).is_some())
            .collect();
        clips.sort_by(|a, b| {
            a.order_position(stream_id)
                .cmp(&b.order_position(stream_id))
                .then_with(|| a.path.cmp(&b.path))
        });
        clips
    }

    /// Clips that will be exported, in order.
    pub fn enabled_clips(&self, stream_id: Option<&str>) -> Vec<&Clip> {
        self.clips(stream_id)
            .into_iter()
            .filter(|c| c.is_exportable())
            .collect()
    }

    /// Total trimmed duration of the exportable clips.
    pub fn total_duration(&self, stream_id: Option<&str>) -> f64 {
        self.enabled_clips(stream_id)
            .iter()
            .filter_map(|c| c.trimmed_duration())
            .sum()
    }

    /// Clips that still need a duration probe.
    pub fn unloaded(&self) -> Vec<PathBuf> {
        self.clips(None)
            .into_iter()
            .filter(|c| !c.loaded && !c.deleted)
            .map(|c| c.path.clone())
            .collect()
    }

    /// Stored form of the collection.
    pub fn to_parts(&self) -> (Vec<Clip>, Vec<HighlightedStream>) {
        let clips = self.clips(None).into_iter().cloned().collect();
        let streams = self.streams().into_iter().cloned().collect();
        (clips, streams)
    }

    fn clip_mut(&mut self, path: &Path) -> ClipResult<&mut Clip> {
        self.clips
            .get_mut(path)
            .ok_or_else(|| ClipError::ClipNotFound(path.to_path_buf()))
    }

    fn sorted_paths(&self, stream_id: Option<&str>) -> Vec<PathBuf> {
        self.clips(stream_id)
            .into_iter()
            .map(|c| c.path.clone())
            .collect()
    }

    fn compact(&mut self, stream_id: Option<&str>) {
        for (position, path) in self.sorted_paths(stream_id).iter().enumerate() {
            if let Some(clip) = self.clips.get_mut(path) {
                set_position(clip, stream_id, position);
            }
        }
    }
}

fn set_position(clip: &mut Clip, stream_id: Option<&str>, position: usize) {
    match stream_id {
        Some(id) => {
            if let Some(info) = clip.stream_info.get_mut(id) {
                info.order_position = position;
            }
        }
        None => clip.global_order_position = position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::MIN_CLIP_DURATION;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    fn order(collection: &ClipCollection, stream_id: Option<&str>) -> Vec<String> {
        collection
            .clips(stream_id)
            .iter()
            .map(|c| c.path.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_add_clips_dedupes_by_path() {
        let mut collection = ClipCollection::new();
        let added = collection.add_clips(&paths(&["a", "b"]), Some("s1"), ClipSource::Manual);
        assert_eq!(added.len(), 2);

        let added = collection.add_clips(&paths(&["b", "c"]), Some("s2"), ClipSource::Manual);
        assert_eq!(added, paths(&["c"]));
        assert_eq!(collection.len(), 3);
        assert_eq!(order(&collection, Some("s2")), vec!["b", "c"]);
        assert_eq!(order(&collection, None), vec!["a", "b", "c"]);
        assert!(collection.stream("s2").is_some());
    }

    #[test]
    fn test_remove_clip_compacts_positions() {
        let mut collection = ClipCollection::new();
        collection.add_clips(&paths(&["a", "b", "c"]), Some("s"), ClipSource::Manual);

        collection.remove_clip(Path::new("a")).unwrap();

        let positions: Vec<usize> = collection
            .clips(Some("s"))
            .iter()
            .map(|c| c.order_position(Some("s")).unwrap())
            .collect();
        assert_eq!(positions, vec![0, 1]);
        assert_eq!(collection.get(Path::new("c")).unwrap().global_order_position, 1);
        assert!(matches!(
            collection.remove_clip(Path::new("a")),
            Err(ClipError::ClipNotFound(_))
        ));
    }

    #[test]
    fn test_reorder_partial_list() {
        let mut collection = ClipCollection::new();
        collection.add_clips(&paths(&["a", "b", "c", "d"]), Some("s"), ClipSource::Manual);

        collection.reorder(Some("s"), &paths(&["c", "a"])).unwrap();

        assert_eq!(order(&collection, Some("s")), vec!["c", "a", "b", "d"]);
        assert_eq!(order(&collection, None), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_reorder_rejects_foreign_and_duplicate_paths() {
        let mut collection = ClipCollection::new();
        collection.add_clips(&paths(&["a", "b"]), Some("s"), ClipSource::Manual);
        collection.add_clips(&paths(&["x"]), None, ClipSource::Manual);

        assert!(matches!(
            collection.reorder(Some("s"), &paths(&["x"])),
            Err(ClipError::InvalidOrder(_))
        ));
        assert!(matches!(
            collection.reorder(Some("s"), &paths(&["a", "a"])),
            Err(ClipError::InvalidOrder(_))
        ));
        assert!(matches!(
            collection.reorder(Some("missing"), &[]),
            Err(ClipError::StreamNotFound(_))
        ));
    }

    #[test]
    fn test_trim_validation() {
        let mut collection = ClipCollection::new();
        collection.add_clips(&paths(&["a"]), None, ClipSource::Manual);
        let a = Path::new("a");
        collection.set_duration(a, 10.0).unwrap();

        collection.set_trim(a, 2.0, 3.0).unwrap();
        assert_eq!(collection.get(a).unwrap().trimmed_duration(), Some(5.0));

        let too_much = 10.0 - MIN_CLIP_DURATION + 0.5;
        assert!(matches!(
            collection.set_trim(a, too_much, 0.0),
            Err(ClipError::InvalidTrim { .. })
        ));
        assert!(collection.set_trim(a, -1.0, 0.0).is_err());
        assert_eq!(collection.get(a).unwrap().start_trim, 2.0);
    }

    #[test]
    fn test_set_duration_resets_trims_that_no_longer_fit() {
        let mut collection = ClipCollection::new();
        collection.add_clips(&paths(&["a"]), None, ClipSource::Manual);
        let a = Path::new("a");
        collection.set_trim(a, 8.0, 0.0).unwrap();

        collection.set_duration(a, 5.0).unwrap();

        let clip = collection.get(a).unwrap();
        assert!(clip.loaded);
        assert_eq!(clip.start_trim, 0.0);
        assert!(collection.set_duration(a, f64::NAN).is_err());
    }

    #[test]
    fn test_enabled_clips_and_total_duration() {
        let mut collection = ClipCollection::new();
        collection.add_clips(&paths(&["a", "b", "c"]), Some("s"), ClipSource::Manual);
        for name in ["a", "b"] {
            collection.set_duration(Path::new(name), 10.0).unwrap();
        }
        collection.set_trim(Path::new("a"), 1.0, 1.0).unwrap();
        collection.set_enabled(Path::new("b"), false).unwrap();

        assert_eq!(order_of(&collection.enabled_clips(Some("s"))), vec!["a"]);
        assert_eq!(collection.total_duration(Some("s")), 8.0);
        assert_eq!(collection.unloaded(), paths(&["c"]));
    }

    fn order_of(clips: &[&Clip]) -> Vec<String> {
        clips
            .iter()
            .map(|c| c.path.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_remove_stream_keeps_shared_clips() {
        let mut collection = ClipCollection::new();
        collection.add_clips(&paths(&["a", "b"]), Some("s1"), ClipSource::Manual);
        collection.add_clips(&paths(&["b"]), Some("s2"), ClipSource::Manual);

        let removed = collection.remove_stream("s1").unwrap();

        assert_eq!(removed, paths(&["a"]));
        assert_eq!(order(&collection, None), vec!["b"]);
        assert_eq!(collection.get(Path::new("b")).unwrap().global_order_position, 0);
        assert!(collection.remove_stream("s1").is_err());
    }

    #[test]
    fn test_add_clip_rejects_duplicates() {
        let mut collection = ClipCollection::new();
        let mut clip = Clip::new("replay.mp4", ClipSource::AiClip);
        clip.duration = Some(30.0);
        clip.loaded = true;
        clip.start_trim = 10.0;
        collection.add_clip(clip.clone(), Some("live")).unwrap();

        assert!(matches!(
            collection.add_clip(clip, Some("live")),
            Err(ClipError::DuplicateClip(_))
        ));
        assert_eq!(order(&collection, Some("live")), vec!["replay.mp4"]);
    }

    #[test]
    fn test_refresh_missing() {
        let mut collection = ClipCollection::new();
        collection.add_clips(&paths(&["a", "b"]), None, ClipSource::Manual);

        let missing = collection.refresh_missing(|p| p == Path::new("a"));

        assert_eq!(missing, 1);
        assert!(collection.get(Path::new("b")).unwrap().deleted);
        collection.add_clips(&paths(&["b"]), None, ClipSource::Manual);
        assert!(!collection.get(Path::new("b")).unwrap().deleted);
    }
}
