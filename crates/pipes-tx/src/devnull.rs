use pipes_core::{get_source_dim_extent, get_source_dims, Arena, PipesError, Result, Sink, Source, Tool};
use tracing::debug;

const BLOCKSIZE: i64 = 1024 * 1024;

/// A terminal tool with a single sink and no sources: it drains its
/// upstream entirely and discards the data. Always drains through the
/// float32 accessor regardless of the upstream's declared `datatype`,
/// matching the original tool - the dataset store/upstream accessor is
/// responsible for any type conversion.
pub struct Devnull {
    sinks: Vec<Sink>,
}

impl Devnull {
    pub fn new() -> Self {
        Devnull {
            sinks: vec![Sink::new()],
        }
    }
}

impl Default for Devnull {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for Devnull {
    fn type_name(&self) -> &'static str {
        "Devnull"
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
        unreachable!("Devnull has no sources")
    }

    fn init(&mut self, _arena: &Arena) -> Result<()> {
        if self.sinks[0].upstream.is_none() {
            return Err(PipesError::Unconnected {
                tool: self.type_name(),
                sink: 0,
            });
        }
        Ok(())
    }

    fn execute(&mut self, arena: &Arena) -> Result<()> {
        let up = self.sinks[0].upstream.expect("init checked this");
        let total: i64 = arena.with_source(up, |s| {
            get_source_dims(s)
                .chars()
                .map(|d| get_source_dim_extent(s, d))
                .product()
        });

        let mut buf = vec![0f32; BLOCKSIZE as usize];
        let mut offset = 0i64;
        while offset < total {
            let want = std::cmp::min(BLOCKSIZE, total - offset);
            let n = arena.get_float32_chunk(up, want, offset, &mut buf[..want as usize]);
            if n <= 0 {
                break;
            }
            offset += n;
        }
        debug!(tool = self.type_name(), consumed = offset, "drained upstream");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zero_source::ZeroSource;
    use pipes_core::{Arena, SourceHandle};

    #[test]
    fn drains_upstream_without_error() {
        let mut arena = Arena::new();
        let src = arena.insert(Box::new(ZeroSource::new("xyzt", "2:3:4:5").unwrap()));
        let dn = arena.insert(Box::new(Devnull::new()));
        arena
            .connect(dn, 0, SourceHandle { tool: src, index: 0 })
            .unwrap();
        arena.init(dn).unwrap();
        arena.execute(dn).unwrap();
    }
}
