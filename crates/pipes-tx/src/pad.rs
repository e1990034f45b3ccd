use pipes_core::{
    calc_source_block_sizes, get_source_dim_extent, get_source_dims, set_source_dim_extent,
    Arena, Elem, PipesError, Result, Sink, Source, SourceHandle, Tool,
};

/// Expands a single dimension's extent, synthesizing a leading and/or
/// trailing fill region around a `shift`-offset window of upstream data.
///
/// A request can straddle all three regions at once (leading fill,
/// upstream passthrough, trailing fill); `get_chunk` below walks through
/// them in order, shrinking `size` as it satisfies each one, and returns
/// early - short of the requested size - the moment the upstream read
/// itself falls short, exactly as the upstream's own accessor would.
pub struct Pad {
    sinks: Vec<Sink>,
    sources: Vec<Source>,
    dim: char,
    shift: i64,
    extent: i64,
    upstream_extent: i64,
    fast_blksize: i64,
    fill_value: f64,
}

impl Pad {
    pub fn new(dim: char, extent: i64, shift: i64, fill_value: f64) -> Self {
        if extent <= 0 {
            panic!("Pad::new: invalid extent {extent}");
        }
        if shift < 0 {
            panic!("Pad::new: invalid shift {shift}");
        }
        Pad {
            sinks: vec![Sink::new()],
            sources: vec![Source::new("images")],
            dim,
            shift,
            extent,
            upstream_extent: 0,
            fast_blksize: 0,
            fill_value,
        }
    }
}

impl Tool for Pad {
    fn type_name(&self) -> &'static str {
        "pad"
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

        let upstream_dims = arena.with_source(up, |s| get_source_dims(s).to_string());
        if !upstream_dims.contains(self.dim) {
            return Err(PipesError::Structure {
                tool: self.type_name(),
                reason: format!("dimension {} not present in upstream dims {upstream_dims}", self.dim),
            });
        }
        if self.upstream_extent + self.shift > self.extent {
            return Err(PipesError::Structure {
                tool: self.type_name(),
                reason: format!(
                    "upstream extent {} + shift {} exceeds target extent {}",
                    self.upstream_extent, self.shift, self.extent
                ),
            });
        }

        set_source_dim_extent(&mut self.sources[0], self.dim, self.extent);
        let (fast, _slow) = arena.with_source(up, |s| calc_source_block_sizes(s, self.dim));
        self.fast_blksize = fast;
        Ok(())
    }

    fn get_uint8_chunk(&mut self, arena: &Arena, _i: usize, size: i64, offset: i64, buf: &mut [u8]) -> i64 {
        get_chunk(self, arena, size, offset, buf, Arena::get_uint8_chunk)
    }
    fn get_int16_chunk(&mut self, arena: &Arena, _i: usize, size: i64, offset: i64, buf: &mut [i16]) -> i64 {
        get_chunk(self, arena, size, offset, buf, Arena::get_int16_chunk)
    }
    fn get_int32_chunk(&mut self, arena: &Arena, _i: usize, size: i64, offset: i64, buf: &mut [i32]) -> i64 {
        get_chunk(self, arena, size, offset, buf, Arena::get_int32_chunk)
    }
    fn get_int64_chunk(&mut self, arena: &Arena, _i: usize, size: i64, offset: i64, buf: &mut [i64]) -> i64 {
        get_chunk(self, arena, size, offset, buf, Arena::get_int64_chunk)
    }
    fn get_float32_chunk(&mut self, arena: &Arena, _i: usize, size: i64, offset: i64, buf: &mut [f32]) -> i64 {
        get_chunk(self, arena, size, offset, buf, Arena::get_float32_chunk)
    }
    fn get_float64_chunk(&mut self, arena: &Arena, _i: usize, size: i64, offset: i64, buf: &mut [f64]) -> i64 {
        get_chunk(self, arena, size, offset, buf, Arena::get_float64_chunk)
    }
}

fn get_chunk<T: Elem>(
    pad: &Pad,
    arena: &Arena,
    size: i64,
    offset: i64,
    buf: &mut [T],
    pull: fn(&Arena, SourceHandle, i64, i64, &mut [T]) -> i64,
) -> i64 {
    let upstream = pad.sinks[0].upstream.expect("Pad::init already validated this");

    let n_fast_blks = offset / pad.fast_blksize;
    let mut fast_blk_offset = offset - n_fast_blks * pad.fast_blksize;
    let n_full_extents = n_fast_blks / pad.extent;
    let mut extent_offset = n_fast_blks - n_full_extents * pad.extent;

    let base_offset = offset;
    let mut offset = offset;

    // The furthest we can go before hitting the next extent boundary.
    let max_size = (pad.extent - extent_offset) * pad.fast_blksize - fast_blk_offset;
    let mut size = if size > max_size { max_size } else { size };

    if extent_offset < pad.shift {
        // Leading fill region.
        let mut n = 0i64;
        if fast_blk_offset > 0 {
            n += pad.fast_blksize - fast_blk_offset;
            fast_blk_offset = 0;
            extent_offset += 1;
        }
        if extent_offset < pad.shift {
            n += (pad.shift - extent_offset) * pad.fast_blksize;
            extent_offset = pad.shift;
        }
        if n > size {
            n = size;
        }
        let start = (offset - base_offset) as usize;
        buf[start..start + n as usize].fill(T::from_f64(pad.fill_value));
        offset += n;
        size -= n;
    }

    if size > 0 && extent_offset - pad.shift < pad.upstream_extent {
        // Upstream passthrough region.
        let upstream_offset = ((n_full_extents * pad.upstream_extent + (extent_offset - pad.shift))
            * pad.fast_blksize)
            + fast_blk_offset;
        let mut n = 0i64;
        if fast_blk_offset > 0 {
            n += pad.fast_blksize - fast_blk_offset;
            fast_blk_offset = 0;
            extent_offset += 1;
        }
        if extent_offset - pad.shift < pad.upstream_extent {
            n += (pad.upstream_extent + pad.shift - extent_offset) * pad.fast_blksize;
            extent_offset = pad.shift + pad.upstream_extent;
        }
        if n > size {
            n = size;
        }
        let start = (offset - base_offset) as usize;
        let n_got = pull(arena, upstream, n, upstream_offset, &mut buf[start..start + n as usize]);
        offset += n_got;
        if n_got != n {
            // Upstream produced less than asked; stop here rather than
            // synthesizing trailing fill past real short data.
            return offset - base_offset;
        }
        size -= n;
    }

    if size > 0 && extent_offset < pad.extent {
        // Trailing fill region.
        let mut n = 0i64;
        if fast_blk_offset > 0 {
            n += pad.fast_blksize - fast_blk_offset;
            fast_blk_offset = 0;
            extent_offset += 1;
        }
        if extent_offset < pad.extent {
            n += (pad.extent - extent_offset) * pad.fast_blksize;
            extent_offset = pad.extent;
        }
        if n > size {
            n = size;
        }
        let start = (offset - base_offset) as usize;
        buf[start..start + n as usize].fill(T::from_f64(pad.fill_value));
        offset += n;
    }

    offset - base_offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zero_source::ZeroSource;
    use pipes_core::{Arena, SourceHandle};

    #[test]
    fn pads_leading_and_trailing_fill_around_upstream_data() {
        let mut arena = Arena::new();
        let src = arena.insert(Box::new(ZeroSource::new("x", "4").unwrap()));
        let pad_id = arena.insert(Box::new(Pad::new('x', 10, 3, -1.0)));
        arena
            .connect(pad_id, 0, SourceHandle { tool: src, index: 0 })
            .unwrap();
        arena.init(pad_id).unwrap();

        let handle = SourceHandle { tool: pad_id, index: 0 };
        let mut buf = vec![0.0f64; 10];
        let n = arena.get_float64_chunk(handle, 10, 0, &mut buf);
        assert_eq!(n, 10);
        assert_eq!(&buf[0..3], &[-1.0, -1.0, -1.0]);
        assert_eq!(&buf[3..7], &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(&buf[7..10], &[-1.0, -1.0, -1.0]);
    }

    #[test]
    fn rejects_extent_too_small_for_shift_plus_upstream() {
        let mut arena = Arena::new();
        let src = arena.insert(Box::new(ZeroSource::new("x", "8").unwrap()));
        let pad_id = arena.insert(Box::new(Pad::new('x', 10, 3, 0.0)));
        arena
            .connect(pad_id, 0, SourceHandle { tool: src, index: 0 })
            .unwrap();
        assert!(arena.init(pad_id).is_err());
    }
}
