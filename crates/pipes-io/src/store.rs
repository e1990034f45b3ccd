use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use pipes_core::{DatasetStore, OpenMode, PipesError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The on-disk shape of a [`MemDatasetStore`]: a flat, insertion-ordered
/// key/value table (mirroring the dataset store's header) plus a map of
/// chunk name to its canonical `f64` contents. Every typed read/write goes
/// through this single canonical representation - the conversion between
/// it and the six element types happens in the store, exactly as spec.md
/// §2's "the dataset store performs any necessary data-type conversion"
/// describes.
#[derive(Debug, Default, Serialize, Deserialize)]
struct OnDisk {
    keys: Vec<(String, String)>,
    chunks: HashMap<String, Vec<f64>>,
}

/// A JSON-backed reference [`DatasetStore`] implementation. This is an
/// ambient test/demo fixture, not a reimplementation of the Pittsburgh MRI
/// dataset format - that format is out of scope per spec.md §1, and this
/// crate does not invent a competing one.
pub struct MemDatasetStore {
    path: PathBuf,
    mode: OpenMode,
    keys: Vec<(String, String)>,
    chunks: HashMap<String, Vec<f64>>,
}

impl MemDatasetStore {
    /// Mirrors `mri_open_dataset`: returns `None` (not an error) when the
    /// dataset can't be opened for reading, matching spec.md §7's
    /// "non-fatal diagnostic - returns null from the factory" row.
    pub fn open(path: impl Into<PathBuf>, mode: OpenMode) -> Option<Self> {
        let path = path.into();
        match mode {
            OpenMode::Read => {
                let text = fs::read_to_string(&path).ok()?;
                let on_disk: OnDisk = serde_json::from_str(&text).ok()?;
                debug!(path = %path.display(), n_chunks = on_disk.chunks.len(), "opened dataset store for reading");
                Some(MemDatasetStore {
                    path,
                    mode,
                    keys: on_disk.keys,
                    chunks: on_disk.chunks,
                })
            }
            OpenMode::Write => {
                debug!(path = %path.display(), "opened dataset store for writing");
                Some(MemDatasetStore {
                    path,
                    mode,
                    keys: Vec::new(),
                    chunks: HashMap::new(),
                })
            }
        }
    }

    fn key_index(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|(k, _)| k == key)
    }

    fn chunk_mut(&mut self, name: &str) -> &mut Vec<f64> {
        self.chunks.entry(name.to_string()).or_default()
    }
}

fn read_typed<T: Copy>(
    data: Option<&Vec<f64>>,
    n: i64,
    offset: i64,
    buf: &mut [T],
    conv: impl Fn(f64) -> T,
) -> i64 {
    let data = match data {
        Some(d) => d,
        None => return 0,
    };
    let avail = (data.len() as i64 - offset).max(0);
    let got = n.min(avail).max(0);
    for i in 0..got as usize {
        buf[i] = conv(data[offset as usize + i]);
    }
    got
}

fn write_typed<T: Copy>(store: &mut Vec<f64>, offset: i64, buf: &[T], conv: impl Fn(T) -> f64) {
    let need = offset as usize + buf.len();
    if store.len() < need {
        store.resize(need, 0.0);
    }
    for (i, v) in buf.iter().enumerate() {
        store[offset as usize + i] = conv(*v);
    }
}

impl DatasetStore for MemDatasetStore {
    fn close(&mut self) -> Result<()> {
        if self.mode == OpenMode::Write {
            let on_disk = OnDisk {
                keys: self.keys.clone(),
                chunks: self.chunks.clone(),
            };
            let text = serde_json::to_string_pretty(&on_disk)
                .map_err(|e| PipesError::Store(e.to_string()))?;
            fs::write(&self.path, text).map_err(|e| PipesError::Store(e.to_string()))?;
            debug!(path = %self.path.display(), "closed dataset store, flushed to disk");
        }
        Ok(())
    }

    fn create_chunk(&mut self, name: &str) -> Result<()> {
        self.chunks.entry(name.to_string()).or_default();
        self.set_string(name, "[chunk]");
        Ok(())
    }

    fn iterate_keys(&self) -> Vec<String> {
        self.keys.iter().map(|(k, _)| k.clone()).collect()
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.key_index(key).map(|i| self.keys[i].1.clone())
    }

    fn set_string(&mut self, key: &str, value: &str) {
        match self.key_index(key) {
            Some(i) => self.keys[i].1 = value.to_string(),
            None => self.keys.push((key.to_string(), value.to_string())),
        }
    }

    fn read_chunk_uint8(&self, chunk: &str, n: i64, offset: i64, buf: &mut [u8]) -> i64 {
        read_typed(self.chunks.get(chunk), n, offset, buf, |v| v as u8)
    }
    fn read_chunk_int16(&self, chunk: &str, n: i64, offset: i64, buf: &mut [i16]) -> i64 {
        read_typed(self.chunks.get(chunk), n, offset, buf, |v| v as i16)
    }
    fn read_chunk_int32(&self, chunk: &str, n: i64, offset: i64, buf: &mut [i32]) -> i64 {
        read_typed(self.chunks.get(chunk), n, offset, buf, |v| v as i32)
    }
    fn read_chunk_int64(&self, chunk: &str, n: i64, offset: i64, buf: &mut [i64]) -> i64 {
        read_typed(self.chunks.get(chunk), n, offset, buf, |v| v as i64)
    }
    fn read_chunk_float32(&self, chunk: &str, n: i64, offset: i64, buf: &mut [f32]) -> i64 {
        read_typed(self.chunks.get(chunk), n, offset, buf, |v| v as f32)
    }
    fn read_chunk_float64(&self, chunk: &str, n: i64, offset: i64, buf: &mut [f64]) -> i64 {
        read_typed(self.chunks.get(chunk), n, offset, buf, |v| v)
    }

    fn write_chunk_uint8(&mut self, chunk: &str, offset: i64, buf: &[u8]) {
        write_typed(self.chunk_mut(chunk), offset, buf, |v| v as f64)
    }
    fn write_chunk_int16(&mut self, chunk: &str, offset: i64, buf: &[i16]) {
        write_typed(self.chunk_mut(chunk), offset, buf, |v| v as f64)
    }
    fn write_chunk_int32(&mut self, chunk: &str, offset: i64, buf: &[i32]) {
        write_typed(self.chunk_mut(chunk), offset, buf, |v| v as f64)
    }
    fn write_chunk_int64(&mut self, chunk: &str, offset: i64, buf: &[i64]) {
        write_typed(self.chunk_mut(chunk), offset, buf, |v| v as f64)
    }
    fn write_chunk_float32(&mut self, chunk: &str, offset: i64, buf: &[f32]) {
        write_typed(self.chunk_mut(chunk), offset, buf, |v| v as f64)
    }
    fn write_chunk_float64(&mut self, chunk: &str, offset: i64, buf: &[f64]) {
        write_typed(self.chunk_mut(chunk), offset, buf, |v| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("pipes-io-test-{}.json", std::process::id()));

        {
            let mut store = MemDatasetStore::open(&path, OpenMode::Write).unwrap();
            store.create_chunk("images").unwrap();
            store.set_string("images.dimensions", "xy");
            store.set_string("images.extent.x", "2");
            store.set_string("images.extent.y", "3");
            store.write_chunk_float64("images", 0, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
            store.close().unwrap();
        }

        {
            let store = MemDatasetStore::open(&path, OpenMode::Read).unwrap();
            assert_eq!(store.get_string("images").as_deref(), Some("[chunk]"));
            assert_eq!(store.get_string("images.dimensions").as_deref(), Some("xy"));
            let mut buf = [0.0f64; 6];
            let n = store.read_chunk_float64("images", 6, 0, &mut buf);
            assert_eq!(n, 6);
            assert_eq!(buf, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        }

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn opening_missing_file_for_read_returns_none() {
        assert!(MemDatasetStore::open("/nonexistent/pipes-io-test.json", OpenMode::Read).is_none());
    }

    #[test]
    fn short_read_past_end_of_chunk() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("pipes-io-test-short-{}.json", std::process::id()));
        let mut store = MemDatasetStore::open(&path, OpenMode::Write).unwrap();
        store.create_chunk("images").unwrap();
        store.write_chunk_float64("images", 0, &[1.0, 2.0, 3.0]);
        let mut buf = [0.0f64; 10];
        let n = store.read_chunk_float64("images", 10, 1, &mut buf);
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], &[2.0, 3.0]);
    }
}
