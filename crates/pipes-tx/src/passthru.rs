use pipes_core::{Arena, PipesError, Result, Sink, Source, Tool};

/// Forwards every chunk accessor straight through to its single upstream
/// source, and inherits that source's attributes (minus any sub-map
/// entries) and name. Useful on its own as an identity stage, and as the
/// template every other single-sink/single-source tool here follows.
pub struct Passthru {
    sinks: Vec<Sink>,
    sources: Vec<Source>,
}

impl Passthru {
    pub fn new() -> Self {
        Passthru {
            sinks: vec![Sink::new()],
            sources: vec![Source::new("images")],
        }
    }
}

impl Default for Passthru {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for Passthru {
    fn type_name(&self) -> &'static str {
        "Passthru"
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
        Ok(())
    }

    fn get_uint8_chunk(
        &mut self,
        arena: &Arena,
        _source_index: usize,
        size: i64,
        offset: i64,
        buf: &mut [u8],
    ) -> i64 {
        let up = self.sinks[0].upstream.expect("connected");
        arena.get_uint8_chunk(up, size, offset, buf)
    }

    fn get_int16_chunk(
        &mut self,
        arena: &Arena,
        _source_index: usize,
        size: i64,
        offset: i64,
        buf: &mut [i16],
    ) -> i64 {
        let up = self.sinks[0].upstream.expect("connected");
        arena.get_int16_chunk(up, size, offset, buf)
    }

    fn get_int32_chunk(
        &mut self,
        arena: &Arena,
        _source_index: usize,
        size: i64,
        offset: i64,
        buf: &mut [i32],
    ) -> i64 {
        let up = self.sinks[0].upstream.expect("connected");
        arena.get_int32_chunk(up, size, offset, buf)
    }

    fn get_int64_chunk(
        &mut self,
        arena: &Arena,
        _source_index: usize,
        size: i64,
        offset: i64,
        buf: &mut [i64],
    ) -> i64 {
        let up = self.sinks[0].upstream.expect("connected");
        arena.get_int64_chunk(up, size, offset, buf)
    }

    fn get_float32_chunk(
        &mut self,
        arena: &Arena,
        _source_index: usize,
        size: i64,
        offset: i64,
        buf: &mut [f32],
    ) -> i64 {
        let up = self.sinks[0].upstream.expect("connected");
        arena.get_float32_chunk(up, size, offset, buf)
    }

    fn get_float64_chunk(
        &mut self,
        arena: &Arena,
        _source_index: usize,
        size: i64,
        offset: i64,
        buf: &mut [f64],
    ) -> i64 {
        let up = self.sinks[0].upstream.expect("connected");
        arena.get_float64_chunk(up, size, offset, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zero_source::ZeroSource;
    use pipes_core::{Arena, SourceHandle};

    #[test]
    fn forwards_data_and_inherits_attributes() {
        let mut arena = Arena::new();
        let src = arena.insert(Box::new(ZeroSource::new("xy", "2:3").unwrap()));
        let pt = arena.insert(Box::new(Passthru::new()));
        arena
            .connect(pt, 0, SourceHandle { tool: src, index: 0 })
            .unwrap();
        arena.init(pt).unwrap();

        let handle = SourceHandle { tool: pt, index: 0 };
        let mut buf = vec![7.0f64; 6];
        let n = arena.get_float64_chunk(handle, 6, 0, &mut buf);
        assert_eq!(n, 6);
        assert!(buf.iter().all(|&v| v == 0.0));

        let dims = arena.with_source(handle, |s| pipes_core::get_source_dims(s).to_string());
        assert_eq!(dims, "xy");
    }

    #[test]
    fn init_fails_when_unconnected() {
        let mut arena = Arena::new();
        let pt = arena.insert(Box::new(Passthru::new()));
        assert!(arena.init(pt).is_err());
    }
}
