use pipes_core::{set_source_dim_extent, set_source_dims, Arena, DataType, Result, Sink, Source, Tool};
use tracing::debug;

/// A pure source with no sinks: every typed accessor zero-fills `buf` and
/// reports full success. Used to manufacture test data and as a
/// structural placeholder when wiring up a graph.
pub struct ZeroSource {
    sources: Vec<Source>,
}

impl ZeroSource {
    /// `dims` is a dimension string (e.g. `"xyzt"`) and `extents` is a
    /// colon-separated list of extents in the same order (e.g.
    /// `"2:3:4:5"`). Returns `None` if the two strings don't describe the
    /// same number of dimensions or an extent fails to parse, mirroring
    /// `createZeroSrcTool`'s `return NULL` on malformed input.
    pub fn new(dims: &str, extents: &str) -> Option<Self> {
        let mut src = Source::new("images");
        src.attrs.define("datatype", DataType::Float64.as_str());
        set_source_dims(&mut src, dims);

        let mut ext_parts = extents.split(':');
        for dim in dims.chars() {
            let part = ext_parts.next()?;
            let ext: i64 = part.parse().ok()?;
            set_source_dim_extent(&mut src, dim, ext);
        }
        if ext_parts.next().is_some() {
            return None;
        }

        Some(ZeroSource { sources: vec![src] })
    }
}

impl Tool for ZeroSource {
    fn type_name(&self) -> &'static str {
        "ZeroSrc"
    }

    fn sinks(&self) -> &[Sink] {
        &[]
    }

    fn sinks_mut(&mut self) -> &mut Vec<Sink> {
        unreachable!("ZeroSource has no sinks")
    }

    fn sources(&self) -> &[Source] {
        &self.sources
    }

    fn sources_mut(&mut self) -> &mut Vec<Source> {
        &mut self.sources
    }

    fn init(&mut self, _arena: &Arena) -> Result<()> {
        debug!(tool = self.type_name(), "initialized");
        Ok(())
    }

    fn get_uint8_chunk(&mut self, _arena: &Arena, _i: usize, size: i64, _offset: i64, buf: &mut [u8]) -> i64 {
        buf[..size as usize].fill(0);
        size
    }

    fn get_int16_chunk(&mut self, _arena: &Arena, _i: usize, size: i64, _offset: i64, buf: &mut [i16]) -> i64 {
        buf[..size as usize].fill(0);
        size
    }

    fn get_int32_chunk(&mut self, _arena: &Arena, _i: usize, size: i64, _offset: i64, buf: &mut [i32]) -> i64 {
        buf[..size as usize].fill(0);
        size
    }

    fn get_int64_chunk(&mut self, _arena: &Arena, _i: usize, size: i64, _offset: i64, buf: &mut [i64]) -> i64 {
        buf[..size as usize].fill(0);
        size
    }

    fn get_float32_chunk(&mut self, _arena: &Arena, _i: usize, size: i64, _offset: i64, buf: &mut [f32]) -> i64 {
        buf[..size as usize].fill(0.0);
        size
    }

    fn get_float64_chunk(&mut self, _arena: &Arena, _i: usize, size: i64, _offset: i64, buf: &mut [f64]) -> i64 {
        buf[..size as usize].fill(0.0);
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipes_core::Arena;

    #[test]
    fn zero_source_fills_and_reports_size() {
        let mut arena = Arena::new();
        let id = arena.insert(Box::new(ZeroSource::new("xyzt", "2:3:4:5").unwrap()));
        arena.init(id).unwrap();
        let handle = pipes_core::SourceHandle { tool: id, index: 0 };
        let mut buf = vec![1.0f64; 120];
        let n = arena.get_float64_chunk(handle, 120, 0, &mut buf);
        assert_eq!(n, 120);
        assert!(buf.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn mismatched_dims_and_extents_rejected() {
        assert!(ZeroSource::new("xyz", "2:3").is_none());
        assert!(ZeroSource::new("xy", "2:3:4").is_none());
        assert!(ZeroSource::new("xy", "2:nope").is_none());
    }
}
