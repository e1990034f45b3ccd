use pipes_core::{
    force_get_all_float64, get_source_dim_extent, get_source_dims, set_source_dim_extent, Arena,
    PipesError, Result, Sink, Source, Tool,
};

/// A row-at-a-time fusion of two same-shaped upstream sources into a
/// (possibly differently-sized) output row. Implementations receive one
/// full row from each side and must fill `out` completely.
pub trait Func2Fn {
    fn apply(&mut self, left: &[f64], right: &[f64], out: &mut [f64]) -> Result<()>;
}

impl<F> Func2Fn for F
where
    F: FnMut(&[f64], &[f64], &mut [f64]) -> Result<()>,
{
    fn apply(&mut self, left: &[f64], right: &[f64], out: &mut [f64]) -> Result<()> {
        self(left, right, out)
    }
}

/// Fuses two sinks ("left"/"right") one row at a time through a
/// user-supplied row function, caching the single most recently computed
/// output row so that a run of small sequential requests within the same
/// row don't re-invoke the function.
pub struct Func2Unblocked {
    sinks: Vec<Sink>,
    sources: Vec<Source>,
    n_outputs: i64,
    n_inputs: i64,
    left_buf: Vec<f64>,
    right_buf: Vec<f64>,
    obuf: Vec<f64>,
    obuf_offset: i64,
    obuf_valid_len: i64,
    func: Box<dyn Func2Fn>,
}

impl Func2Unblocked {
    pub fn new(n_outputs: i64, func: impl Func2Fn + 'static) -> Self {
        Func2Unblocked {
            sinks: vec![Sink::named("left"), Sink::named("right")],
            sources: vec![Source::new("images")],
            n_outputs,
            n_inputs: 0,
            left_buf: Vec::new(),
            right_buf: Vec::new(),
            obuf: Vec::new(),
            obuf_offset: 0,
            obuf_valid_len: 0,
            func,
        }
    }

    fn fill_buffer(&mut self, arena: &Arena, size: i64, offset: i64) {
        if self.obuf_valid_len != 0
            && offset >= self.obuf_offset
            && offset + size <= self.obuf_offset + self.obuf_valid_len
        {
            return;
        }
        let base_offset = offset - (offset.rem_euclid(self.n_outputs));
        let upstream_base_offset = (base_offset * self.n_inputs) / self.n_outputs;

        self.obuf_valid_len = 0;
        let left = self.sinks[0].upstream.expect("init validated this");
        let right = self.sinks[1].upstream.expect("init validated this");
        force_get_all_float64(arena, left, self.n_inputs, upstream_base_offset, &mut self.left_buf);
        force_get_all_float64(arena, right, self.n_inputs, upstream_base_offset, &mut self.right_buf);

        self.func
            .apply(&self.left_buf, &self.right_buf, &mut self.obuf)
            .expect("func2 row callback signaled an error");

        self.obuf_valid_len = self.n_outputs;
        self.obuf_offset = base_offset;
    }
}

impl Tool for Func2Unblocked {
    fn type_name(&self) -> &'static str {
        "func2unblk"
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
        let left = self.sinks[0].upstream.ok_or(PipesError::Unconnected {
            tool: self.type_name(),
            sink: 0,
        })?;
        let right = self.sinks[1].upstream.ok_or(PipesError::Unconnected {
            tool: self.type_name(),
            sink: 1,
        })?;

        let (left_dims, left_attrs, left_name) =
            arena.with_source(left, |s| (get_source_dims(s).to_string(), s.attrs.clone(), s.name.clone()));
        let right_dims = arena.with_source(right, |s| get_source_dims(s).to_string());

        if left_dims.len() != right_dims.len() || left_dims != right_dims {
            return Err(PipesError::Structure {
                tool: self.type_name(),
                reason: format!("mismatched dim strings <{left_dims}> and <{right_dims}>"),
            });
        }
        for c in left_dims.chars() {
            let le = arena.with_source(left, |s| get_source_dim_extent(s, c));
            let re = arena.with_source(right, |s| get_source_dim_extent(s, c));
            if le != re {
                return Err(PipesError::Structure {
                    tool: self.type_name(),
                    reason: format!("mismatched dim lengths {le} and {re} for dim {c}"),
                });
            }
        }

        let first_dim = left_dims.chars().next().ok_or(PipesError::Structure {
            tool: self.type_name(),
            reason: "upstream has no dimensions".into(),
        })?;
        self.n_inputs = arena.with_source(left, |s| get_source_dim_extent(s, first_dim));
        self.left_buf = vec![0.0; self.n_inputs as usize];
        self.right_buf = vec![0.0; self.n_inputs as usize];
        self.obuf = vec![0.0; self.n_outputs as usize];
        self.obuf_valid_len = 0;

        self.sources[0].attrs.copy_unique_except_hashes(&left_attrs);
        set_source_dim_extent(&mut self.sources[0], first_dim, self.n_outputs);
        self.sources[0].name = left_name;
        Ok(())
    }

    fn get_float32_chunk(&mut self, arena: &Arena, _i: usize, size: i64, offset: i64, buf: &mut [f32]) -> i64 {
        self.fill_buffer(arena, size, offset);
        let shift = offset - self.obuf_offset;
        let n = std::cmp::min(size, self.n_outputs - shift);
        for i in 0..n as usize {
            buf[i] = self.obuf[i + shift as usize] as f32;
        }
        n
    }

    fn get_float64_chunk(&mut self, arena: &Arena, _i: usize, size: i64, offset: i64, buf: &mut [f64]) -> i64 {
        self.fill_buffer(arena, size, offset);
        let shift = offset - self.obuf_offset;
        let n = std::cmp::min(size, self.n_outputs - shift);
        buf[..n as usize].copy_from_slice(&self.obuf[shift as usize..shift as usize + n as usize]);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zero_source::ZeroSource;
    use pipes_core::{Arena, SourceHandle};

    #[test]
    fn fuses_rows_via_callback() {
        let mut arena = Arena::new();
        let left = arena.insert(Box::new(ZeroSource::new("t", "10").unwrap()));
        let right = arena.insert(Box::new(ZeroSource::new("t", "10").unwrap()));
        let f2_id = arena.insert(Box::new(Func2Unblocked::new(
            2,
            |l: &[f64], r: &[f64], out: &mut [f64]| -> Result<()> {
                out[0] = l.iter().sum();
                out[1] = r.iter().sum();
                Ok(())
            },
        )));
        arena.connect(f2_id, 0, SourceHandle { tool: left, index: 0 }).unwrap();
        arena.connect(f2_id, 1, SourceHandle { tool: right, index: 0 }).unwrap();
        arena.init(f2_id).unwrap();

        let handle = SourceHandle { tool: f2_id, index: 0 };
        let mut buf = vec![9.0f64; 2];
        let n = arena.get_float64_chunk(handle, 2, 0, &mut buf);
        assert_eq!(n, 2);
        assert_eq!(buf, vec![0.0, 0.0]);
    }
}
