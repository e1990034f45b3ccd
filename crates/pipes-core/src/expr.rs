use crate::error::Result;

/// What an expression engine needs from the tool hosting it, supplied
/// per-call rather than captured at construction time. Avoids the
/// self-referential tangle of an engine holding a callback that closes
/// over the tool that owns the engine: `RpnMathTool` builds a short-lived
/// `RpnHost` view of itself and its arena each time it calls `run`.
pub trait RpnHost {
    /// The upstream dimension string feeding sink `which` (0-based).
    fn dims(&self, which: usize) -> String;
    fn dim_extent(&self, which: usize, dim: char) -> i64;
    /// Fills `buf` with `buf.len()` real values starting at `offset`.
    fn input(&self, which: usize, offset: i64, buf: &mut [f64]);
    /// Fills `re`/`im` with `re.len()` complex values starting at
    /// `offset`, demultiplexed from the upstream's interleaved layout.
    fn input_complex(&self, which: usize, offset: i64, re: &mut [f64], im: &mut [f64]);
    /// Whether the sample at slice index `z`, timepoint `t` should be
    /// treated as missing data. Defaults to "never missing" for hosts
    /// that don't track a missing-data mask.
    fn missing(&self, _z: i64, _t: i64) -> bool {
        false
    }
}

/// A minimal expression evaluator collaborator, compiled from a script
/// string once and then run repeatedly over successive output windows.
/// Mirrors the RPN engine's `create`/`init`/`compile`/`run` lifecycle;
/// `destroy` is the engine's own `Drop` impl rather than a method here.
pub trait ExprEngine {
    fn init(&mut self) -> Result<()>;
    fn compile(&mut self, script: &str) -> Result<()>;
    fn set_complex(&mut self, complex: bool);
    fn set_output_flag(&mut self, flag: bool);

    /// Evaluates the script for `n` consecutive output elements starting
    /// at `offset`, pulling whatever inputs the script references from
    /// `host`. Returns a buffer at least `n` elements long (real mode),
    /// or at least `capacity()` + `n` long with the imaginary channel at
    /// offset `capacity()` (complex mode) - see `rpn::Engine` for the
    /// concrete layout this crate uses.
    fn run(&mut self, host: &dyn RpnHost, n: i64, offset: i64) -> &[f64];

    fn capacity(&self) -> i64;
}
