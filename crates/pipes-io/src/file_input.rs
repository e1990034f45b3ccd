use pipes_core::{get_source_dim_extent, get_source_dims, Arena, DatasetStore, Result, Sink, Source, Tool};
use tracing::debug;

/// Keys maintained by the dataset store itself rather than by the chunk's
/// own metadata - excluded from the propagated attribute set, exactly as
/// `mri_file_input_tool.c`'s key-scan loop does.
const RESERVED_KEYS: [&str; 3] = ["size", "little_endian", "offset"];

/// Opens a dataset store and presents one source per chunk it finds, plus
/// an `orphans` source carrying every top-level key that isn't part of a
/// chunk's own namespace.
///
/// The key scan happens once, in the constructor, not in `init` - the
/// source list is fully known as soon as the dataset is opened, since it
/// comes entirely from the store's key table rather than from anything a
/// sink could influence.
pub struct FileInputTool {
    sources: Vec<Source>,
    store: Box<dyn DatasetStore>,
}

impl FileInputTool {
    pub fn new(store: Box<dyn DatasetStore>) -> Self {
        let mut orphans = Source::new("orphans");
        let mut chunk_sources: Vec<Source> = Vec::new();
        let mut current: Option<usize> = None;
        let mut current_prefix = String::new();

        for key in store.iterate_keys() {
            if key.starts_with('!') {
                // `!` denotes a comment in the Pittsburgh MRI format.
                continue;
            }
            let val = match store.get_string(&key) {
                Some(v) => v,
                None => continue,
            };
            if val == "[chunk]" {
                current_prefix = format!("{key}.");
                chunk_sources.push(Source::new(key));
                current = Some(chunk_sources.len() - 1);
                continue;
            }
            if let Some(idx) = current {
                if let Some(relative) = key.strip_prefix(current_prefix.as_str()) {
                    if !RESERVED_KEYS.contains(&relative) {
                        chunk_sources[idx].attrs.define(relative, val);
                    }
                    continue;
                }
            }
            if !RESERVED_KEYS.contains(&key.as_str()) {
                orphans.attrs.define(key, val);
            }
        }

        let mut sources = Vec::with_capacity(chunk_sources.len() + 1);
        sources.push(orphans);
        sources.extend(chunk_sources);

        debug!(n_chunks = sources.len() - 1, "file-input scanned dataset keys");
        FileInputTool { sources, store }
    }
}

impl Tool for FileInputTool {
    fn type_name(&self) -> &'static str {
        "MRIFileInput"
    }

    fn sinks(&self) -> &[Sink] {
        &[]
    }

    fn sinks_mut(&mut self) -> &mut Vec<Sink> {
        unreachable!("FileInputTool has no sinks")
    }

    fn sources(&self) -> &[Source] {
        &self.sources
    }

    fn sources_mut(&mut self) -> &mut Vec<Source> {
        &mut self.sources
    }

    fn init(&mut self, _arena: &Arena) -> Result<()> {
        // Every real chunk source must already carry a full dims/extent
        // set, written by whatever produced this dataset; the orphans
        // source carries no dims and is skipped. `get_source_dim_extent`
        // panics on a missing/malformed attribute, which is exactly the
        // "programmer error, abort with a diagnostic" contract spec.md §7
        // asks for here.
        for src in self.sources.iter().skip(1) {
            for c in get_source_dims(src).to_string().chars() {
                let _ = get_source_dim_extent(src, c);
            }
        }
        Ok(())
    }

    fn get_uint8_chunk(&mut self, _arena: &Arena, source_index: usize, size: i64, offset: i64, buf: &mut [u8]) -> i64 {
        if source_index == 0 {
            panic!("attempted to read from the orphans source");
        }
        self.store.read_chunk_uint8(&self.sources[source_index].name, size, offset, buf)
    }

    fn get_int16_chunk(&mut self, _arena: &Arena, source_index: usize, size: i64, offset: i64, buf: &mut [i16]) -> i64 {
        if source_index == 0 {
            panic!("attempted to read from the orphans source");
        }
        self.store.read_chunk_int16(&self.sources[source_index].name, size, offset, buf)
    }

    fn get_int32_chunk(&mut self, _arena: &Arena, source_index: usize, size: i64, offset: i64, buf: &mut [i32]) -> i64 {
        if source_index == 0 {
            panic!("attempted to read from the orphans source");
        }
        self.store.read_chunk_int32(&self.sources[source_index].name, size, offset, buf)
    }

    fn get_int64_chunk(&mut self, _arena: &Arena, source_index: usize, size: i64, offset: i64, buf: &mut [i64]) -> i64 {
        if source_index == 0 {
            panic!("attempted to read from the orphans source");
        }
        self.store.read_chunk_int64(&self.sources[source_index].name, size, offset, buf)
    }

    fn get_float32_chunk(&mut self, _arena: &Arena, source_index: usize, size: i64, offset: i64, buf: &mut [f32]) -> i64 {
        if source_index == 0 {
            panic!("attempted to read from the orphans source");
        }
        self.store.read_chunk_float32(&self.sources[source_index].name, size, offset, buf)
    }

    fn get_float64_chunk(&mut self, _arena: &Arena, source_index: usize, size: i64, offset: i64, buf: &mut [f64]) -> i64 {
        if source_index == 0 {
            panic!("attempted to read from the orphans source");
        }
        self.store.read_chunk_float64(&self.sources[source_index].name, size, offset, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemDatasetStore;
    use pipes_core::OpenMode;

    fn make_store(path: &std::path::Path) {
        let mut store = MemDatasetStore::open(path, OpenMode::Write).unwrap();
        store.create_chunk("images").unwrap();
        store.set_string("images.dimensions", "xy");
        store.set_string("images.extent.x", "2");
        store.set_string("images.extent.y", "3");
        store.set_string("images.datatype", "float64");
        store.write_chunk_float64("images", 0, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        store.set_string("history", "created by test");
        store.set_string("!comment", "ignored");
        store.close().unwrap();
    }

    #[test]
    fn scans_chunk_and_orphan_sources() {
        let path = std::env::temp_dir().join(format!("pipes-io-fit-{}.json", std::process::id()));
        make_store(&path);

        let store = MemDatasetStore::open(&path, OpenMode::Read).unwrap();
        let tool = FileInputTool::new(Box::new(store));
        assert_eq!(tool.sources().len(), 2);
        assert_eq!(tool.sources()[0].name, "orphans");
        assert_eq!(tool.sources()[0].attrs.get_string("history"), "created by test");
        assert!(!tool.sources()[0].attrs.contains("!comment"));
        assert_eq!(tool.sources()[1].name, "images");
        assert_eq!(tool.sources()[1].attrs.get_string("dimensions"), "xy");
        assert!(!tool.sources()[1].attrs.contains("size"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn reads_chunk_data_through_typed_accessor() {
        let path = std::env::temp_dir().join(format!("pipes-io-fit-read-{}.json", std::process::id()));
        make_store(&path);

        let store = MemDatasetStore::open(&path, OpenMode::Read).unwrap();
        let mut arena = Arena::new();
        let id = arena.insert(Box::new(FileInputTool::new(Box::new(store))));
        arena.init(id).unwrap();

        let handle = pipes_core::SourceHandle { tool: id, index: 1 };
        let mut buf = [0.0f64; 6];
        let n = arena.get_float64_chunk(handle, 6, 0, &mut buf);
        assert_eq!(n, 6);
        assert_eq!(buf, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    #[should_panic(expected = "orphans")]
    fn orphans_accessor_panics() {
        let path = std::env::temp_dir().join(format!("pipes-io-fit-panic-{}.json", std::process::id()));
        make_store(&path);
        let store = MemDatasetStore::open(&path, OpenMode::Read).unwrap();
        let mut arena = Arena::new();
        let id = arena.insert(Box::new(FileInputTool::new(Box::new(store))));
        arena.init(id).unwrap();
        let handle = pipes_core::SourceHandle { tool: id, index: 0 };
        let mut buf = [0.0f64; 1];
        arena.get_float64_chunk(handle, 1, 0, &mut buf);
    }
}
