use std::cell::{Cell, RefCell};

use crate::error::{PipesError, Result};
use crate::tool::Tool;

pub type ToolId = usize;

/// A reference to one of a tool's output sources. Graph edges are stored
/// as `SourceHandle`s rather than shared pointers, so a `Sink` can name
/// its upstream without borrowing it - the arena resolves the reference
/// at call time, once, right before it needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceHandle {
    pub tool: ToolId,
    pub index: usize,
}

/// Owns every tool in a pipeline graph and is the sole place recursion
/// over the graph happens. Tools are stored behind a `RefCell` so that a
/// tool's pull accessor can call back into the arena to fetch from its
/// own upstream while the arena itself is only ever borrowed immutably -
/// this is sound because the graph is acyclic: a tool is never re-entered
/// while its own borrow is still live.
#[derive(Default)]
pub struct Arena {
    tools: Vec<RefCell<Box<dyn Tool>>>,
    initialized: Vec<Cell<bool>>,
}

impl Arena {
    pub fn new() -> Self {
        Arena::default()
    }

    pub fn insert(&mut self, tool: Box<dyn Tool>) -> ToolId {
        self.tools.push(RefCell::new(tool));
        self.initialized.push(Cell::new(false));
        self.tools.len() - 1
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Wires `sink_index` of `tool` to `source`. Exists as a free
    /// function (rather than requiring callers to borrow the tool
    /// themselves) so graph-construction code never has to think about
    /// the `RefCell` underneath.
    pub fn connect(&self, tool: ToolId, sink_index: usize, source: SourceHandle) -> Result<()> {
        self.tools[tool].borrow_mut().connect(sink_index, source)
    }

    fn upstream_of(&self, id: ToolId) -> Vec<ToolId> {
        self.tools[id]
            .borrow()
            .sinks()
            .iter()
            .filter_map(|s| s.upstream.map(|h| h.tool))
            .collect()
    }

    /// Recursively initializes `id`'s upstream tools, then `id` itself.
    /// Idempotent: a tool reachable through more than one path (a
    /// fan-out/fan-in diamond) is only ever initialized once. This
    /// replaces the base-class recursion every tool's `pInit` used to
    /// perform by hand.
    pub fn init(&self, id: ToolId) -> Result<()> {
        if self.initialized[id].get() {
            return Ok(());
        }
        self.initialized[id].set(true);
        for up in self.upstream_of(id) {
            self.init(up)?;
        }
        self.tools[id].borrow_mut().init(self)
    }

    /// Recursively executes `id`'s upstream tools, then `id` itself.
    /// Only terminal tools (sinks) typically do anything in `execute`;
    /// everything else inherits the no-op default.
    pub fn execute(&self, id: ToolId) -> Result<()> {
        for up in self.upstream_of(id) {
            self.execute(up)?;
        }
        self.tools[id].borrow_mut().execute(self)
    }

    /// Resolves the upstream of `sink_index` on `tool` and returns its
    /// handle, failing with `PipesError::Unconnected` rather than
    /// panicking - unlike a missing typed accessor, an unconnected sink
    /// is something a caller can reasonably check for ahead of `execute`.
    pub fn upstream(&self, tool: ToolId, sink_index: usize) -> Result<SourceHandle> {
        let tool_ref = self.tools[tool].borrow();
        tool_ref
            .sinks()
            .get(sink_index)
            .and_then(|s| s.upstream)
            .ok_or(PipesError::Unconnected {
                tool: tool_ref.type_name(),
                sink: sink_index,
            })
    }

    pub fn get_uint8_chunk(&self, h: SourceHandle, size: i64, offset: i64, buf: &mut [u8]) -> i64 {
        self.tools[h.tool]
            .borrow_mut()
            .get_uint8_chunk(self, h.index, size, offset, buf)
    }

    pub fn get_int16_chunk(&self, h: SourceHandle, size: i64, offset: i64, buf: &mut [i16]) -> i64 {
        self.tools[h.tool]
            .borrow_mut()
            .get_int16_chunk(self, h.index, size, offset, buf)
    }

    pub fn get_int32_chunk(&self, h: SourceHandle, size: i64, offset: i64, buf: &mut [i32]) -> i64 {
        self.tools[h.tool]
            .borrow_mut()
            .get_int32_chunk(self, h.index, size, offset, buf)
    }

    pub fn get_int64_chunk(&self, h: SourceHandle, size: i64, offset: i64, buf: &mut [i64]) -> i64 {
        self.tools[h.tool]
            .borrow_mut()
            .get_int64_chunk(self, h.index, size, offset, buf)
    }

    pub fn get_float32_chunk(
        &self,
        h: SourceHandle,
        size: i64,
        offset: i64,
        buf: &mut [f32],
    ) -> i64 {
        self.tools[h.tool]
            .borrow_mut()
            .get_float32_chunk(self, h.index, size, offset, buf)
    }

    pub fn get_float64_chunk(
        &self,
        h: SourceHandle,
        size: i64,
        offset: i64,
        buf: &mut [f64],
    ) -> i64 {
        self.tools[h.tool]
            .borrow_mut()
            .get_float64_chunk(self, h.index, size, offset, buf)
    }

    /// Reads a source's `dimensions`/`extent.*` attributes without going
    /// through a typed accessor.
    pub fn with_source<R>(&self, h: SourceHandle, f: impl FnOnce(&crate::source::Source) -> R) -> R {
        let tool = self.tools[h.tool].borrow();
        f(&tool.sources()[h.index])
    }
}

/// Repeatedly pulls from `h` through `pull` until `n` elements have landed
/// in `buf`, or the upstream stops making progress. Mirrors
/// `forceGetAllFloat64`/`forceGetAllInt32`/etc: a single typed accessor
/// call is allowed to return short, so a caller that needs an exact count
/// loops until it has one, aborting (as spec.md §7 requires of a
/// premature end) rather than silently returning a partial buffer.
fn force_get_all<T>(
    arena: &Arena,
    h: SourceHandle,
    n: i64,
    offset: i64,
    buf: &mut [T],
    type_name: &str,
    pull: fn(&Arena, SourceHandle, i64, i64, &mut [T]) -> i64,
) {
    let mut got = 0i64;
    while got < n {
        let want = n - got;
        let n_read = pull(arena, h, want, offset + got, &mut buf[got as usize..n as usize]);
        if n_read <= 0 {
            panic!("upstream source made no progress while force-filling {type_name} buffer");
        }
        got += n_read;
    }
}

pub fn force_get_all_uint8(arena: &Arena, h: SourceHandle, n: i64, offset: i64, buf: &mut [u8]) {
    force_get_all(arena, h, n, offset, buf, "uint8", Arena::get_uint8_chunk)
}

pub fn force_get_all_int16(arena: &Arena, h: SourceHandle, n: i64, offset: i64, buf: &mut [i16]) {
    force_get_all(arena, h, n, offset, buf, "int16", Arena::get_int16_chunk)
}

pub fn force_get_all_int32(arena: &Arena, h: SourceHandle, n: i64, offset: i64, buf: &mut [i32]) {
    force_get_all(arena, h, n, offset, buf, "int32", Arena::get_int32_chunk)
}

pub fn force_get_all_int64(arena: &Arena, h: SourceHandle, n: i64, offset: i64, buf: &mut [i64]) {
    force_get_all(arena, h, n, offset, buf, "int64", Arena::get_int64_chunk)
}

pub fn force_get_all_float32(arena: &Arena, h: SourceHandle, n: i64, offset: i64, buf: &mut [f32]) {
    force_get_all(arena, h, n, offset, buf, "float32", Arena::get_float32_chunk)
}

pub fn force_get_all_float64(arena: &Arena, h: SourceHandle, n: i64, offset: i64, buf: &mut [f64]) {
    force_get_all(arena, h, n, offset, buf, "float64", Arena::get_float64_chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Sink;
    use crate::source::Source;

    /// A source that only ever returns up to 3 elements per call, forcing
    /// any caller that wants more to make several pulls - the condition
    /// `force_get_all_*` exists to paper over.
    struct StingySource {
        sources: Vec<Source>,
    }

    impl Tool for StingySource {
        fn type_name(&self) -> &'static str {
            "stingy"
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
        fn get_int32_chunk(&mut self, _arena: &Arena, _i: usize, size: i64, offset: i64, buf: &mut [i32]) -> i64 {
            let n = size.min(3);
            for (i, slot) in buf[..n as usize].iter_mut().enumerate() {
                *slot = (offset + i as i64) as i32;
            }
            n
        }
    }

    #[test]
    fn force_get_all_int32_iterates_past_short_reads() {
        let mut arena = Arena::new();
        let id = arena.insert(Box::new(StingySource {
            sources: vec![Source::new("x")],
        }));
        let handle = SourceHandle { tool: id, index: 0 };
        let mut buf = vec![0i32; 10];
        force_get_all_int32(&arena, handle, 10, 0, &mut buf);
        assert_eq!(buf, (0..10).collect::<Vec<i32>>());
    }
}
