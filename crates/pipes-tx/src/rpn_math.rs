use pipes_core::{get_source_dim_extent, get_source_dims, Arena, ExprEngine, PipesError, Result, RpnHost, Sink, Source, Tool};

use crate::rpn::Engine;

struct SinkHost<'a> {
    arena: &'a Arena,
    sinks: &'a [Sink],
}

impl<'a> RpnHost for SinkHost<'a> {
    fn dims(&self, which: usize) -> String {
        let up = self.sinks[which].upstream.expect("sink connected before run");
        self.arena.with_source(up, |s| get_source_dims(s).to_string())
    }

    fn dim_extent(&self, which: usize, dim: char) -> i64 {
        let up = self.sinks[which].upstream.expect("sink connected before run");
        self.arena.with_source(up, |s| get_source_dim_extent(s, dim))
    }

    fn input(&self, which: usize, offset: i64, buf: &mut [f64]) {
        let up = self.sinks[which].upstream.expect("sink connected before run");
        pipes_core::force_get_all_float64(self.arena, up, buf.len() as i64, offset, buf);
    }

    fn input_complex(&self, which: usize, offset: i64, re: &mut [f64], im: &mut [f64]) {
        let up = self.sinks[which].upstream.expect("sink connected before run");
        let n = re.len();
        let mut interleaved = vec![0.0f64; 2 * n];
        pipes_core::force_get_all_float64(self.arena, up, 2 * n as i64, offset * 2, &mut interleaved);
        for i in 0..n {
            re[i] = interleaved[2 * i];
            im[i] = interleaved[2 * i + 1];
        }
    }
}

/// Evaluates an RPN script over one or more upstream sources, recomputing
/// its output window whenever a request falls outside the currently
/// cached range. Sinks grow dynamically, exactly like `FileOutputTool`:
/// connecting the last sink appends a fresh trailing one, and `init`
/// trims the final unconnected sink before validating the graph.
pub struct RpnMath {
    sinks: Vec<Sink>,
    sources: Vec<Source>,
    engine: Box<dyn ExprEngine>,
    complex: bool,
    script: String,
    obuf: Vec<f64>,
    obuf_offset: i64,
    obuf_valid_len: i64,
}

impl RpnMath {
    pub fn new(script: impl Into<String>, complex: bool) -> Self {
        RpnMath {
            sinks: vec![Sink::new()],
            sources: vec![Source::new("images")],
            engine: Box::new(Engine::new()),
            complex,
            script: script.into(),
            obuf: Vec::new(),
            obuf_offset: 0,
            obuf_valid_len: 0,
        }
    }

    /// `offset`/`size` here (and on `obuf_offset`/`obuf_valid_len`) are
    /// always in the outer accessor's units: raw `float64` elements, i.e.
    /// interleaved real/imag doubles in complex mode, exactly as a caller
    /// like `FileOutputTool` would address them. The `ExprEngine`
    /// collaborator instead works in complex-*pair* units (one script
    /// evaluation per pair), so the conversion happens right here at the
    /// engine boundary rather than leaking into `serve`/`ensure_window`.
    fn ensure_window(&mut self, arena: &Arena, offset: i64, size: i64) {
        if self.obuf_valid_len > 0
            && offset >= self.obuf_offset
            && offset + size <= self.obuf_offset + self.obuf_valid_len
        {
            return;
        }
        let cap = self.engine.capacity();
        let host = SinkHost {
            arena,
            sinks: &self.sinks,
        };

        if self.complex {
            let pair_offset = offset / 2;
            let pairs_wanted = (size + 1) / 2;
            let n_pairs = pairs_wanted.min(cap);
            let raw = self.engine.run(&host, n_pairs, pair_offset);
            self.obuf.clear();
            for i in 0..n_pairs as usize {
                self.obuf.push(raw[i]);
                self.obuf.push(raw[cap as usize + i]);
            }
            self.obuf_offset = pair_offset * 2;
            self.obuf_valid_len = n_pairs * 2;
        } else {
            // The C original clamps a window refill to `size`, never
            // reading past what downstream actually asked for - matching
            // that keeps a request at the tail of a bounded (non-zero)
            // source from over-reading past end-of-stream.
            let n = size.min(cap);
            let raw = self.engine.run(&host, n, offset);
            self.obuf.clear();
            self.obuf.extend_from_slice(&raw[..n as usize]);
            self.obuf_offset = offset;
            self.obuf_valid_len = n;
        }
    }

    fn serve(&mut self, arena: &Arena, offset: i64, size: i64, buf: &mut [f64]) -> i64 {
        self.ensure_window(arena, offset, size);
        let available = self.obuf_offset + self.obuf_valid_len - offset;
        let n = std::cmp::min(size, available);
        let start = (offset - self.obuf_offset) as usize;
        buf[..n as usize].copy_from_slice(&self.obuf[start..start + n as usize]);
        n
    }
}

impl Tool for RpnMath {
    fn type_name(&self) -> &'static str {
        "rpn_math"
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

    fn connect(&mut self, sink_index: usize, source: pipes_core::SourceHandle) -> Result<()> {
        let is_last = sink_index + 1 == self.sinks.len();
        let sink = self
            .sinks
            .get_mut(sink_index)
            .ok_or(PipesError::Structure {
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

    fn init(&mut self, arena: &Arena) -> Result<()> {
        if self.sinks.len() > 1 && !self.sinks.last().unwrap().is_connected() {
            self.sinks.pop();
        }
        if self.sinks.is_empty() || !self.sinks[0].is_connected() {
            return Err(PipesError::Unconnected {
                tool: self.type_name(),
                sink: 0,
            });
        }

        let up0 = self.sinks[0].upstream.unwrap();
        let (name, attrs) = arena.with_source(up0, |s| (s.name.clone(), s.attrs.clone()));
        self.sources[0].name = name;
        self.sources[0].attrs.copy_unique_except_hashes(&attrs);

        self.engine.init()?;
        self.engine.compile(&self.script)?;
        self.engine.set_complex(self.complex);
        self.engine.set_output_flag(true);
        Ok(())
    }

    fn get_float32_chunk(&mut self, arena: &Arena, _i: usize, size: i64, offset: i64, buf: &mut [f32]) -> i64 {
        let mut tmp = vec![0.0f64; size as usize];
        let n = self.serve(arena, offset, size, &mut tmp);
        for i in 0..n as usize {
            buf[i] = tmp[i] as f32;
        }
        n
    }

    fn get_float64_chunk(&mut self, arena: &Arena, _i: usize, size: i64, offset: i64, buf: &mut [f64]) -> i64 {
        self.serve(arena, offset, size, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zero_source::ZeroSource;
    use pipes_core::{set_source_dim_extent, set_source_dims, Arena, SourceHandle};

    #[test]
    fn dynamic_sinks_grow_on_connect() {
        let mut arena = Arena::new();
        let a = arena.insert(Box::new(ZeroSource::new("x", "16").unwrap()));
        let b = arena.insert(Box::new(ZeroSource::new("x", "16").unwrap()));
        let rpn_id = arena.insert(Box::new(RpnMath::new("$1,$2,+", false)));

        arena.connect(rpn_id, 0, SourceHandle { tool: a, index: 0 }).unwrap();
        arena.connect(rpn_id, 1, SourceHandle { tool: b, index: 0 }).unwrap();
        arena.init(rpn_id).unwrap();

        let handle = SourceHandle { tool: rpn_id, index: 0 };
        let mut buf = vec![9.0f64; 16];
        let n = arena.get_float64_chunk(handle, 16, 0, &mut buf);
        assert_eq!(n, 16);
        assert!(buf.iter().all(|&v| v == 0.0));
    }

    /// A source with a real, finite total (unlike `ZeroSource`, which
    /// always reports `size` elements regardless of how far past its
    /// nominal extent a request reaches) - exercises the window-refill
    /// clamp against an upstream that actually short-reads at its end.
    struct BoundedSource {
        sources: Vec<Source>,
        total: i64,
    }

    impl BoundedSource {
        fn new(total: i64) -> Self {
            let mut src = Source::new("x");
            set_source_dims(&mut src, "t");
            set_source_dim_extent(&mut src, 't', total);
            BoundedSource { sources: vec![src], total }
        }
    }

    impl Tool for BoundedSource {
        fn type_name(&self) -> &'static str {
            "bounded"
        }
        fn sinks(&self) -> &[Sink] {
            &[]
        }
        fn sinks_mut(&mut self) -> &mut Vec<Sink> {
            unreachable!()
        }
        fn sources(&self) -> &[Source] {
            &self.sources
        }
        fn sources_mut(&mut self) -> &mut Vec<Source> {
            &mut self.sources
        }
        fn init(&mut self, _arena: &Arena) -> Result<()> {
            Ok(())
        }
        fn get_float64_chunk(&mut self, _arena: &Arena, _i: usize, size: i64, offset: i64, buf: &mut [f64]) -> i64 {
            let n = size.min((self.total - offset).max(0));
            buf[..n as usize].fill(0.0);
            n
        }
    }

    #[test]
    fn real_window_refill_does_not_overread_past_bounded_total() {
        // Total is not a multiple of RPN_CHUNKSIZE, so the final request a
        // downstream caller makes asks for fewer elements than a full
        // window - ensure_window must clamp its upstream pull to that
        // request instead of always pulling a full RPN_CHUNKSIZE.
        let total = crate::rpn::RPN_CHUNKSIZE + 100;
        let mut arena = Arena::new();
        let src = arena.insert(Box::new(BoundedSource::new(total)));
        let rpn_id = arena.insert(Box::new(RpnMath::new("$1", false)));
        arena.connect(rpn_id, 0, SourceHandle { tool: src, index: 0 }).unwrap();
        arena.init(rpn_id).unwrap();

        let handle = SourceHandle { tool: rpn_id, index: 0 };
        let tail = total - crate::rpn::RPN_CHUNKSIZE;
        let mut buf = vec![9.0f64; tail as usize];
        let n = arena.get_float64_chunk(handle, tail, crate::rpn::RPN_CHUNKSIZE, &mut buf);
        assert_eq!(n, tail);
    }

    /// A source whose value at raw offset `o` is `o` itself, used to check
    /// that the complex path's pair/raw-offset conversion addresses the
    /// right upstream doubles rather than just happening to return zeros.
    struct RampSource {
        sources: Vec<Source>,
    }

    impl RampSource {
        fn new(total: i64) -> Self {
            let mut src = Source::new("x");
            set_source_dims(&mut src, "t");
            set_source_dim_extent(&mut src, 't', total);
            RampSource { sources: vec![src] }
        }
    }

    impl Tool for RampSource {
        fn type_name(&self) -> &'static str {
            "ramp"
        }
        fn sinks(&self) -> &[Sink] {
            &[]
        }
        fn sinks_mut(&mut self) -> &mut Vec<Sink> {
            unreachable!()
        }
        fn sources(&self) -> &[Source] {
            &self.sources
        }
        fn sources_mut(&mut self) -> &mut Vec<Source> {
            &mut self.sources
        }
        fn init(&mut self, _arena: &Arena) -> Result<()> {
            Ok(())
        }
        fn get_float64_chunk(&mut self, _arena: &Arena, _i: usize, size: i64, offset: i64, buf: &mut [f64]) -> i64 {
            for (i, slot) in buf[..size as usize].iter_mut().enumerate() {
                *slot = (offset + i as i64) as f64;
            }
            size
        }
    }

    #[test]
    fn complex_mode_addresses_interleaved_offsets_correctly() {
        let mut arena = Arena::new();
        let src = arena.insert(Box::new(RampSource::new(4096)));
        let rpn_id = arena.insert(Box::new(RpnMath::new("$1", true)));
        arena.connect(rpn_id, 0, SourceHandle { tool: src, index: 0 }).unwrap();
        arena.init(rpn_id).unwrap();

        let handle = SourceHandle { tool: rpn_id, index: 0 };
        // Raw interleaved doubles [10, 16) = complex pairs [5, 8).
        let mut buf = vec![0.0f64; 6];
        let n = arena.get_float64_chunk(handle, 6, 10, &mut buf);
        assert_eq!(n, 6);
        assert_eq!(buf, vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
    }
}
