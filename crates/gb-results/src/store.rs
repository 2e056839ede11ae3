//! On-disk segment storage.
//!
//! Layout under the root directory:
//! - `<id>.jsonl`: sealed segment, one [`Sample`] per line
//! - `<id>.partial.jsonl`: open segment, one line appended per sample
//!
//! Sealed segments (and partial rewrites) go to a temporary file first and
//! are renamed into place. A partial file can end in a torn line if the
//! process died mid-append; that line is dropped on load.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::types::{Sample, SegmentId};
use crate::{ResultsError, ResultsResult};

const SEALED_EXT: &str = ".jsonl";
const PARTIAL_EXT: &str = ".partial.jsonl";

#[derive(Clone, Debug)]
pub struct SegmentStore {
    root_dir: PathBuf,
}

impl SegmentStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn sealed_path(&self, id: &SegmentId) -> PathBuf {
        self.root_dir.join(format!("{id}{SEALED_EXT}"))
    }

    fn partial_path(&self, id: &SegmentId) -> PathBuf {
        self.root_dir.join(format!("{id}{PARTIAL_EXT}"))
    }

    fn write_atomic(&self, path: &Path, samples: &[Sample]) -> ResultsResult<()> {
        let mut content = String::new();
        for sample in samples {
            content.push_str(&serde_json::to_string(sample)?);
            content.push('\n');
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_samples(path: &Path) -> ResultsResult<Vec<Sample>> {
        let content = fs::read_to_string(path)?;
        let mut samples = Vec::new();
        for line in content.lines() {
            if !line.trim().is_empty() {
                samples.push(serde_json::from_str(line)?);
            }
        }
        Ok(samples)
    }

    /// Like `read_samples`, but an unparseable final line is dropped.
    fn read_partial_samples(path: &Path) -> ResultsResult<Vec<Sample>> {
        let content = fs::read_to_string(path)?;
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let mut samples = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            match serde_json::from_str(line) {
                Ok(sample) => samples.push(sample),
                Err(e) if i + 1 == lines.len() => {
                    warn!(path = %path.display(), error = %e, "dropping torn last line");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(samples)
    }

    pub fn has_sealed(&self, id: &SegmentId) -> bool {
        self.sealed_path(id).exists()
    }

    /// Persist a sealed segment and drop its partial file, if any.
    pub fn write_sealed(&self, id: &SegmentId, samples: &[Sample]) -> ResultsResult<()> {
        self.write_atomic(&self.sealed_path(id), samples)?;
        self.remove_partial(id)?;
        debug!(%id, samples = samples.len(), "segment sealed");
        Ok(())
    }

    /// Rewrite the open segment's partial file in one piece.
    pub fn write_partial(&self, id: &SegmentId, samples: &[Sample]) -> ResultsResult<()> {
        self.write_atomic(&self.partial_path(id), samples)
    }

    /// Append one sample to the open segment's partial file.
    pub fn append_partial(&self, id: &SegmentId, sample: &Sample) -> ResultsResult<()> {
        let mut line = serde_json::to_string(sample)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.partial_path(id))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    pub fn remove_partial(&self, id: &SegmentId) -> ResultsResult<()> {
        let path = self.partial_path(id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Samples of a sealed segment, falling back to its partial file.
    pub fn load(&self, id: &SegmentId) -> ResultsResult<Vec<Sample>> {
        let sealed = self.sealed_path(id);
        if sealed.exists() {
            return Self::read_samples(&sealed);
        }
        let partial = self.partial_path(id);
        if partial.exists() {
            return Self::read_partial_samples(&partial);
        }
        Err(ResultsError::SegmentNotFound { id: id.to_string() })
    }

    fn list_with(&self, ext: &str) -> ResultsResult<Vec<SegmentId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(stem) = name.strip_suffix(ext) else {
                continue;
            };
            if let Some(id) = SegmentId::parse(stem) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Sealed segment ids, oldest first.
    pub fn list_sealed(&self) -> ResultsResult<Vec<SegmentId>> {
        // `seg-…Z.partial.jsonl` also ends in `.jsonl`; its stem fails to parse.
        self.list_with(SEALED_EXT)
    }

    /// Partial segment ids, oldest first.
    pub fn list_partial(&self) -> ResultsResult<Vec<SegmentId>> {
        self.list_with(PARTIAL_EXT)
    }

    /// Up to `n` ids, most recent first, without touching any file. With
    /// `include_partial`, partial segments lead the list. `n <= 0` yields
    /// nothing.
    pub fn recent(&self, n: i64, include_partial: bool) -> ResultsResult<Vec<SegmentId>> {
        let Ok(limit) = usize::try_from(n) else {
            return Ok(Vec::new());
        };
        let partial = if include_partial {
            self.list_partial()?
        } else {
            Vec::new()
        };
        let sealed = self.list_sealed()?;
        Ok(partial
            .into_iter()
            .rev()
            .chain(sealed.into_iter().rev())
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_core::{ControlCommand, SensorReport};

    fn temp_store(tag: &str) -> SegmentStore {
        let dir = std::env::temp_dir().join(format!("gb_results_store_{tag}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        SegmentStore::new(dir).unwrap()
    }

    fn sample(timestamp: f64) -> Sample {
        Sample {
            report: SensorReport {
                moisture: 30,
                temp_inner: 20,
                humd_inner: 50,
                temp_outer: 15,
                humd_outer: 60,
                illumination: None,
            },
            command: ControlCommand::off(),
            timestamp,
        }
    }

    #[test]
    fn sealing_replaces_partial() {
        let store = temp_store("seal");
        let id = SegmentId::for_window_start(1_800.0).unwrap();
        store.write_partial(&id, &[sample(1_800.5)]).unwrap();
        assert_eq!(store.list_partial().unwrap(), vec![id.clone()]);
        assert!(store.list_sealed().unwrap().is_empty());

        store.write_sealed(&id, &[sample(1_800.5), sample(1_801.5)]).unwrap();
        assert!(store.list_partial().unwrap().is_empty());
        assert_eq!(store.list_sealed().unwrap(), vec![id.clone()]);
        assert_eq!(store.load(&id).unwrap().len(), 2);
    }

    #[test]
    fn missing_segment_is_reported() {
        let store = temp_store("missing");
        let id = SegmentId::for_window_start(0.0).unwrap();
        assert!(matches!(
            store.load(&id),
            Err(ResultsError::SegmentNotFound { .. })
        ));
    }

    #[test]
    fn appended_partial_drops_torn_tail() {
        let store = temp_store("torn");
        let id = SegmentId::for_window_start(3_600.0).unwrap();
        store.append_partial(&id, &sample(3_600.5)).unwrap();
        store.append_partial(&id, &sample(3_601.5)).unwrap();
        let path = store.root_dir().join(format!("{id}{PARTIAL_EXT}"));
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(b"{\"report\":{\"moist").unwrap();

        let samples = store.load(&id).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].timestamp, 3_601.5);
    }

    #[test]
    fn recent_lists_partials_first() {
        let store = temp_store("recent");
        let old = SegmentId::for_window_start(0.0).unwrap();
        let new = SegmentId::for_window_start(1_800.0).unwrap();
        let open = SegmentId::for_window_start(3_600.0).unwrap();
        store.write_sealed(&old, &[sample(1.0)]).unwrap();
        store.write_sealed(&new, &[sample(1_801.0)]).unwrap();
        store.append_partial(&open, &sample(3_601.0)).unwrap();

        assert_eq!(store.recent(50, false).unwrap(), vec![new.clone(), old.clone()]);
        assert_eq!(store.recent(2, true).unwrap(), vec![open.clone(), new]);
        assert!(store.recent(0, true).unwrap().is_empty());
        assert!(store.recent(-1, true).unwrap().is_empty());
        // Listing leaves the partial alone
        assert_eq!(store.list_partial().unwrap(), vec![open]);
    }

    #[test]
    fn foreign_files_are_ignored() {
        let store = temp_store("foreign");
        fs::write(store.root_dir().join("notes.jsonl"), "").unwrap();
        fs::write(store.root_dir().join("seg-garbage.jsonl"), "").unwrap();
        assert!(store.list_sealed().unwrap().is_empty());
    }
}
