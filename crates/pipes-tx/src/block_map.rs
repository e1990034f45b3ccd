use pipes_core::{
    calc_source_block_sizes, get_source_dim_extent, get_source_dims, set_source_dim_extent,
    set_source_dims, Arena, PipesError, Result, Sink, Source, Tool,
};

/// Called once at `init`, after the output dimension string and extents
/// have already been published, so the callback can finish whatever
/// bookkeeping it needs using the final shape.
pub trait BlockMapInit {
    #[allow(clippy::too_many_arguments)]
    fn init(
        &mut self,
        dim: char,
        upstream_dims: &str,
        fast_blksize: i64,
        upstream_extent: i64,
        extent1: i64,
        extent2: i64,
        slow_blksize: i64,
    ) -> Result<()>;
}

impl<F> BlockMapInit for F
where
    F: FnMut(char, &str, i64, i64, i64, i64, i64) -> Result<()>,
{
    fn init(
        &mut self,
        dim: char,
        upstream_dims: &str,
        fast_blksize: i64,
        upstream_extent: i64,
        extent1: i64,
        extent2: i64,
        slow_blksize: i64,
    ) -> Result<()> {
        self(dim, upstream_dims, fast_blksize, upstream_extent, extent1, extent2, slow_blksize)
    }
}

/// Called on every chunk request before it is forwarded upstream, to
/// rewrite `(size, offset)` from the split dimension's coordinate space
/// back into the upstream's single-dimension coordinate space.
pub trait BlockMapRemap {
    fn remap(&mut self, size: &mut i64, offset: &mut i64) -> Result<()>;
}

impl<F> BlockMapRemap for F
where
    F: FnMut(&mut i64, &mut i64) -> Result<()>,
{
    fn remap(&mut self, size: &mut i64, offset: &mut i64) -> Result<()> {
        self(size, offset)
    }
}

/// Splits dimension `dim` into two: `dim` keeps extent `extent1` and a
/// freshly-inserted `newdim` carries extent `extent2`, immediately after
/// `dim` in the dimension string. The upstream is otherwise untouched -
/// the split is purely in how downstream requests are addressed, which
/// is exactly what `remap` exists to translate back.
pub struct BlockMap {
    sinks: Vec<Sink>,
    sources: Vec<Source>,
    dim: char,
    newdim: char,
    extent1: i64,
    extent2: i64,
    upstream_extent: i64,
    init_cb: Box<dyn BlockMapInit>,
    remap_cb: Box<dyn BlockMapRemap>,
}

impl BlockMap {
    pub fn new(
        dim: char,
        newdim: char,
        extent1: i64,
        extent2: i64,
        init_cb: impl BlockMapInit + 'static,
        remap_cb: impl BlockMapRemap + 'static,
    ) -> Self {
        if extent1 <= 0 {
            panic!("BlockMap::new: invalid extent1 {extent1}");
        }
        if extent2 <= 0 {
            panic!("BlockMap::new: invalid extent2 {extent2}");
        }
        BlockMap {
            sinks: vec![Sink::new()],
            sources: vec![Source::new("images")],
            dim,
            newdim,
            extent1,
            extent2,
            upstream_extent: 0,
            init_cb: Box::new(init_cb),
            remap_cb: Box::new(remap_cb),
        }
    }

    fn recalc(&mut self, size: &mut i64, offset: &mut i64) {
        self.remap_cb
            .remap(size, offset)
            .expect("block-map remap callback signaled an error");
    }
}

impl Tool for BlockMap {
    fn type_name(&self) -> &'static str {
        "block_map"
    }

    fn sinks(&self) -> &[Sink] {
        &self.sinks
    }
    fn sinks_mut(&mut self) -> &mut Vec<Sink> {
        &mut self.sinks
    }
    fn sources(&self) -> &[Source] {
        &self.sources
    }
    fn sources_mut(&mut self) -> &mut Vec<Source> {
        &mut self.sources
    }

    fn init(&mut self, arena: &Arena) -> Result<()> {
        let up = self.sinks[0].upstream.ok_or(PipesError::Unconnected {
            tool: self.type_name(),
            sink: 0,
        })?;
        let (name, attrs) = arena.with_source(up, |s| (s.name.clone(), s.attrs.clone()));
        self.sources[0].name = name;
        self.sources[0].attrs.copy_unique_except_hashes(&attrs);

        self.upstream_extent = get_source_dim_extent(&self.sources[0], self.dim);
        let dimstr = arena.with_source(up, |s| get_source_dims(s).to_string());

        if !dimstr.contains(self.dim) {
            return Err(PipesError::Structure {
                tool: self.type_name(),
                reason: format!("dimension {} not present in upstream dims {dimstr}", self.dim),
            });
        }
        if self.extent1 > self.upstream_extent {
            return Err(PipesError::Structure {
                tool: self.type_name(),
                reason: format!(
                    "upstream dim {} extent {} is smaller than output extent1 {}",
                    self.dim, self.upstream_extent, self.extent1
                ),
            });
        }

        let pos = dimstr.find(self.dim).expect("just checked membership");
        let mut new_dims = String::with_capacity(dimstr.len() + 1);
        new_dims.push_str(&dimstr[..=pos]);
        new_dims.push(self.newdim);
        new_dims.push_str(&dimstr[pos + 1..]);
        set_source_dims(&mut self.sources[0], &new_dims);
        set_source_dim_extent(&mut self.sources[0], self.dim, self.extent1);
        set_source_dim_extent(&mut self.sources[0], self.newdim, self.extent2);

        let (fast, slow) = arena.with_source(up, |s| calc_source_block_sizes(s, self.dim));

        self.init_cb.init(
            self.dim,
            &dimstr,
            fast,
            self.upstream_extent,
            self.extent1,
            self.extent2,
            slow,
        )?;
        Ok(())
    }

    fn get_uint8_chunk(&mut self, arena: &Arena, _i: usize, mut size: i64, mut offset: i64, buf: &mut [u8]) -> i64 {
        self.recalc(&mut size, &mut offset);
        let up = self.sinks[0].upstream.expect("connected");
        arena.get_uint8_chunk(up, size, offset, &mut buf[..size as usize])
    }
    fn get_int16_chunk(&mut self, arena: &Arena, _i: usize, mut size: i64, mut offset: i64, buf: &mut [i16]) -> i64 {
        self.recalc(&mut size, &mut offset);
        let up = self.sinks[0].upstream.expect("connected");
        arena.get_int16_chunk(up, size, offset, &mut buf[..size as usize])
    }
    fn get_int32_chunk(&mut self, arena: &Arena, _i: usize, mut size: i64, mut offset: i64, buf: &mut [i32]) -> i64 {
        self.recalc(&mut size, &mut offset);
        let up = self.sinks[0].upstream.expect("connected");
        arena.get_int32_chunk(up, size, offset, &mut buf[..size as usize])
    }
    fn get_int64_chunk(&mut self, arena: &Arena, _i: usize, mut size: i64, mut offset: i64, buf: &mut [i64]) -> i64 {
        self.recalc(&mut size, &mut offset);
        let up = self.sinks[0].upstream.expect("connected");
        arena.get_int64_chunk(up, size, offset, &mut buf[..size as usize])
    }
    fn get_float32_chunk(&mut self, arena: &Arena, _i: usize, mut size: i64, mut offset: i64, buf: &mut [f32]) -> i64 {
        self.recalc(&mut size, &mut offset);
        let up = self.sinks[0].upstream.expect("connected");
        arena.get_float32_chunk(up, size, offset, &mut buf[..size as usize])
    }
    fn get_float64_chunk(&mut self, arena: &Arena, _i: usize, mut size: i64, mut offset: i64, buf: &mut [f64]) -> i64 {
        self.recalc(&mut size, &mut offset);
        let up = self.sinks[0].upstream.expect("connected");
        arena.get_float64_chunk(up, size, offset, &mut buf[..size as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zero_source::ZeroSource;
    use pipes_core::{Arena, SourceHandle};

    #[test]
    fn identity_remap_passes_requests_through_unchanged() {
        let mut arena = Arena::new();
        let src = arena.insert(Box::new(ZeroSource::new("t", "24").unwrap()));
        let bm_id = arena.insert(Box::new(BlockMap::new(
            't',
            'u',
            24,
            1,
            |_dim: char, _dims: &str, _fast, _up, _e1, _e2, _slow| -> Result<()> { Ok(()) },
            |_size: &mut i64, _offset: &mut i64| -> Result<()> { Ok(()) },
        )));
        arena
            .connect(bm_id, 0, SourceHandle { tool: src, index: 0 })
            .unwrap();
        arena.init(bm_id).unwrap();

        let handle = SourceHandle { tool: bm_id, index: 0 };
        let mut buf = vec![1.0f64; 24];
        let n = arena.get_float64_chunk(handle, 24, 0, &mut buf);
        assert_eq!(n, 24);
        assert!(buf.iter().all(|&v| v == 0.0));
        let dims = arena.with_source(handle, |s| get_source_dims(s).to_string());
        assert_eq!(dims, "tu");
    }

    #[test]
    fn rejects_extent1_larger_than_upstream() {
        let mut arena = Arena::new();
        let src = arena.insert(Box::new(ZeroSource::new("t", "8").unwrap()));
        let bm_id = arena.insert(Box::new(BlockMap::new(
            't',
            'u',
            16,
            1,
            |_: char, _: &str, _: i64, _: i64, _: i64, _: i64, _: i64| -> Result<()> { Ok(()) },
            |_: &mut i64, _: &mut i64| -> Result<()> { Ok(()) },
        )));
        arena
            .connect(bm_id, 0, SourceHandle { tool: src, index: 0 })
            .unwrap();
        assert!(arena.init(bm_id).is_err());
    }
}
