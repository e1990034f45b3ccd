use pipes_core::{
    get_source_dim_extent, get_source_dims, get_source_datatype, Arena, AttrValue, DataType,
    DatasetStore, PipesError, Result, Sink, Source, SourceHandle, Tool,
};
use tracing::debug;

const BLOCKSIZE: i64 = 1024 * 1024;

/// Fan-in terminal tool: accepts an arbitrary number of sinks, each
/// backed by a chunk in the dataset store (or, for a sink named
/// `orphans`, top-level metadata with no chunk at all). The sink list
/// grows the same way `RpnMath`'s does - connecting the trailing sink
/// appends a fresh one - and `init` trims a still-unconnected tail,
/// mirroring `createMRIFileOutputTool`/`customInit`.
pub struct FileOutputTool {
    sinks: Vec<Sink>,
    store: Box<dyn DatasetStore>,
}

impl FileOutputTool {
    pub fn new(store: Box<dyn DatasetStore>) -> Self {
        FileOutputTool {
            sinks: vec![Sink::new()],
            store,
        }
    }
}

impl Tool for FileOutputTool {
    fn type_name(&self) -> &'static str {
        "MRIFileOutput"
    }

    fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    fn sinks_mut(&mut self) -> &mut Vec<Sink> {
        &mut self.sinks
    }

    fn sources(&self) -> &[Source] {
        &[]
    }

    fn sources_mut(&mut self) -> &mut Vec<Source> {
        unreachable!("FileOutputTool has no sources")
    }

    fn connect(&mut self, sink_index: usize, source: SourceHandle) -> Result<()> {
        let is_last = sink_index + 1 == self.sinks.len();
        let sink = self.sinks.get_mut(sink_index).ok_or(PipesError::Structure {
            tool: self.type_name(),
            reason: format!("no such sink {sink_index}"),
        })?;
        if sink.is_connected() {
            return Err(PipesError::AlreadyConnected {
                tool: self.type_name(),
                sink: sink_index,
            });
        }
        sink.upstream = Some(source);
        if is_last {
            self.sinks.push(Sink::new());
        }
        Ok(())
    }

    fn init(&mut self, _arena: &Arena) -> Result<()> {
        if self.sinks.len() > 1 && !self.sinks.last().unwrap().is_connected() {
            self.sinks.pop();
        }
        if self.sinks.is_empty() || !self.sinks[0].is_connected() {
            return Err(PipesError::Unconnected {
                tool: self.type_name(),
                sink: 0,
            });
        }
        Ok(())
    }

    fn execute(&mut self, arena: &Arena) -> Result<()> {
        struct Stream {
            upstream: SourceHandle,
            name: String,
            datatype: DataType,
            total: i64,
            offset: i64,
            live: bool,
        }

        let mut streams = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            let up = sink.upstream.expect("init validated connectivity");
            let (name, attrs) = arena.with_source(up, |s| (s.name.clone(), s.attrs.clone()));

            if name == "orphans" {
                for (k, v) in attrs.iter() {
                    if let AttrValue::Str(s) = v {
                        self.store.set_string(k, s);
                    }
                }
                continue;
            }

            let datatype = arena.with_source(up, |s| get_source_datatype(s));
            let total: i64 = arena.with_source(up, |s| {
                get_source_dims(s).chars().map(|c| get_source_dim_extent(s, c)).product()
            });

            self.store.create_chunk(&name)?;
            for (k, v) in attrs.iter() {
                if let AttrValue::Str(s) = v {
                    self.store.set_string(&format!("{name}.{k}"), s);
                }
            }

            streams.push(Stream {
                upstream: up,
                name,
                datatype,
                total,
                offset: 0,
                live: total != 0,
            });
        }

        let mut any_live = streams.iter().any(|s| s.live);
        while any_live {
            any_live = false;
            for s in streams.iter_mut() {
                if !s.live {
                    continue;
                }
                let want = (s.total - s.offset).min(BLOCKSIZE);
                let got = move_block(self.store.as_mut(), arena, s.upstream, &s.name, s.datatype, s.offset, want);
                debug!(chunk = %s.name, wrote = got, offset = s.offset, "file-output wrote block");
                s.offset += got;
                // A zero-progress read before reaching `total` would spin
                // this loop forever; treat it as an early end-of-stream
                // for this sink rather than replicating that hazard.
                if s.offset >= s.total || got == 0 {
                    s.live = false;
                } else {
                    any_live = true;
                }
            }
        }

        self.store.close()?;
        Ok(())
    }
}

fn move_block(
    store: &mut dyn DatasetStore,
    arena: &Arena,
    up: SourceHandle,
    name: &str,
    datatype: DataType,
    offset: i64,
    want: i64,
) -> i64 {
    match datatype {
        DataType::UInt8 => {
            let mut buf = vec![0u8; want as usize];
            let n = arena.get_uint8_chunk(up, want, offset, &mut buf);
            store.write_chunk_uint8(name, offset, &buf[..n as usize]);
            n
        }
        DataType::Int16 => {
            let mut buf = vec![0i16; want as usize];
            let n = arena.get_int16_chunk(up, want, offset, &mut buf);
            store.write_chunk_int16(name, offset, &buf[..n as usize]);
            n
        }
        DataType::Int32 => {
            let mut buf = vec![0i32; want as usize];
            let n = arena.get_int32_chunk(up, want, offset, &mut buf);
            store.write_chunk_int32(name, offset, &buf[..n as usize]);
            n
        }
        DataType::Int64 => {
            let mut buf = vec![0i64; want as usize];
            let n = arena.get_int64_chunk(up, want, offset, &mut buf);
            store.write_chunk_int64(name, offset, &buf[..n as usize]);
            n
        }
        DataType::Float32 => {
            let mut buf = vec![0f32; want as usize];
            let n = arena.get_float32_chunk(up, want, offset, &mut buf);
            store.write_chunk_float32(name, offset, &buf[..n as usize]);
            n
        }
        DataType::Float64 => {
            let mut buf = vec![0f64; want as usize];
            let n = arena.get_float64_chunk(up, want, offset, &mut buf);
            store.write_chunk_float64(name, offset, &buf[..n as usize]);
            n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemDatasetStore;
    use pipes_core::OpenMode;
    use pipes_tx::ZeroSource;

    #[test]
    fn writes_a_single_chunk_and_closes_the_store() {
        let path = std::env::temp_dir().join(format!("pipes-io-fot-{}.json", std::process::id()));

        let mut arena = Arena::new();
        let src = arena.insert(Box::new(ZeroSource::new("xyz", "2:3:4").unwrap()));
        let store = MemDatasetStore::open(&path, OpenMode::Write).unwrap();
        let fot = arena.insert(Box::new(FileOutputTool::new(Box::new(store))));
        arena.connect(fot, 0, SourceHandle { tool: src, index: 0 }).unwrap();
        arena.init(fot).unwrap();
        arena.execute(fot).unwrap();

        let readback = MemDatasetStore::open(&path, OpenMode::Read).unwrap();
        assert_eq!(readback.get_string("images").as_deref(), Some("[chunk]"));
        assert_eq!(readback.get_string("images.dimensions").as_deref(), Some("xyz"));
        let mut buf = [1.0f64; 24];
        let n = readback.read_chunk_float64("images", 24, 0, &mut buf);
        assert_eq!(n, 24);
        assert!(buf.iter().all(|&v| v == 0.0));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn trailing_unconnected_sink_is_dropped_at_init() {
        // Connecting sink 0 auto-appends a fresh, unconnected sink 1. If
        // `init` failed to trim it, `execute` would try to pull from an
        // unconnected sink and panic.
        let path = std::env::temp_dir().join(format!("pipes-io-fot-trim-{}.json", std::process::id()));
        let mut arena = Arena::new();
        let src = arena.insert(Box::new(ZeroSource::new("x", "4").unwrap()));
        let store = MemDatasetStore::open(&path, OpenMode::Write).unwrap();
        let fot_id = arena.insert(Box::new(FileOutputTool::new(Box::new(store))));
        arena.connect(fot_id, 0, SourceHandle { tool: src, index: 0 }).unwrap();
        arena.init(fot_id).unwrap();
        arena.execute(fot_id).unwrap();
        let _ = std::fs::remove_file(&path);
    }
}
