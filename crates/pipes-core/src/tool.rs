use crate::arena::Arena;
use crate::error::Result;
use crate::sink::Sink;
use crate::source::Source;

/// A node in the pipeline graph: something with zero or more input
/// `Sink`s and zero or more output `Source`s.
///
/// Every pull accessor defaults to aborting: a tool only needs to
/// override the ones that make sense for its sources (a terminal tool
/// implements none of them; `ZeroSource` implements all six; `RpnMath`
/// implements only the floating types). This mirrors the original
/// per-source function-pointer table, where an unset pointer meant the
/// operation was never valid for that source, except here the
/// "unset pointer" case is a trait default rather than a null check.
pub trait Tool {
    /// A short name used only for diagnostics (`PipesError::Structure`
    /// messages, tracing spans) - never parsed, never user-overridable.
    fn type_name(&self) -> &'static str;

    fn sinks(&self) -> &[Sink];
    fn sinks_mut(&mut self) -> &mut Vec<Sink>;
    fn sources(&self) -> &[Source];
    fn sources_mut(&mut self) -> &mut Vec<Source>;

    /// Tool-specific structural setup: validate upstream sources, compute
    /// and publish this tool's own source attributes. Upstream tools have
    /// already been initialized by the time this runs - see
    /// `Arena::init`, which owns the recursion and the idempotency check.
    fn init(&mut self, arena: &Arena) -> Result<()>;

    /// Tool-specific side effect performed once the graph is wired and
    /// initialized (file-output's round-robin drain, devnull's drain).
    /// Most tools are pure pull sources/filters and never override this.
    fn execute(&mut self, _arena: &Arena) -> Result<()> {
        Ok(())
    }

    /// Connects `sink_index` to `source`. The default just wires the
    /// pointer and rejects a double connection; `FileOutputTool` and
    /// `RpnMathTool` override this to additionally grow a fresh trailing
    /// sink, mirroring their C counterparts' wrapped `connect`.
    fn connect(&mut self, sink_index: usize, source: crate::arena::SourceHandle) -> Result<()> {
        let tool_name = self.type_name();
        let sink = self
            .sinks_mut()
            .get_mut(sink_index)
            .unwrap_or_else(|| panic!("{tool_name}: no such sink {sink_index}"));
        if sink.is_connected() {
            return Err(crate::error::PipesError::AlreadyConnected {
                tool: tool_name,
                sink: sink_index,
            });
        }
        sink.upstream = Some(source);
        Ok(())
    }

    fn get_uint8_chunk(
        &mut self,
        _arena: &Arena,
        _source_index: usize,
        _size: i64,
        _offset: i64,
        _buf: &mut [u8],
    ) -> i64 {
        unsupported_accessor(self.type_name(), "uint8")
    }

    fn get_int16_chunk(
        &mut self,
        _arena: &Arena,
        _source_index: usize,
        _size: i64,
        _offset: i64,
        _buf: &mut [i16],
    ) -> i64 {
        unsupported_accessor(self.type_name(), "int16")
    }

    fn get_int32_chunk(
        &mut self,
        _arena: &Arena,
        _source_index: usize,
        _size: i64,
        _offset: i64,
        _buf: &mut [i32],
    ) -> i64 {
        unsupported_accessor(self.type_name(), "int32")
    }

    fn get_int64_chunk(
        &mut self,
        _arena: &Arena,
        _source_index: usize,
        _size: i64,
        _offset: i64,
        _buf: &mut [i64],
    ) -> i64 {
        unsupported_accessor(self.type_name(), "int64")
    }

    fn get_float32_chunk(
        &mut self,
        _arena: &Arena,
        _source_index: usize,
        _size: i64,
        _offset: i64,
        _buf: &mut [f32],
    ) -> i64 {
        unsupported_accessor(self.type_name(), "float32")
    }

    fn get_float64_chunk(
        &mut self,
        _arena: &Arena,
        _source_index: usize,
        _size: i64,
        _offset: i64,
        _buf: &mut [f64],
    ) -> i64 {
        unsupported_accessor(self.type_name(), "float64")
    }
}

/// Aborts with a diagnostic naming the tool and the type requested.
/// A source that doesn't implement a given typed accessor is a graph
/// authoring error (connecting the wrong kind of tool upstream of a
/// consumer that requires that type), not a recoverable runtime
/// condition, so this is a panic rather than a `PipesError` variant -
/// matching the original's unconditional `Abort()` in the same spot.
pub fn unsupported_accessor(tool: &'static str, ty: &'static str) -> ! {
    panic!("tool {tool} does not support the {ty} chunk accessor")
}
