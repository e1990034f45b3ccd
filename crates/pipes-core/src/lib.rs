//! Core substrate for the `pipes` dataflow graph: the `Arena`/`Tool`
//! traits, the typed-chunk pull accessors, the attribute dictionary, and
//! the collaborator traits (`DatasetStore`, `ExprEngine`) that let the
//! graph reach outside itself without depending on a concrete storage or
//! scripting backend.

pub mod arena;
pub mod attrs;
pub mod elem;
pub mod error;
pub mod expr;
pub mod sink;
pub mod source;
pub mod store;
pub mod tool;

pub use arena::{
    force_get_all_float32, force_get_all_float64, force_get_all_int16, force_get_all_int32,
    force_get_all_int64, force_get_all_uint8, Arena, SourceHandle, ToolId,
};
pub use attrs::{AttrDict, AttrValue};
pub use elem::{DataType, Elem};
pub use error::{PipesError, Result};
pub use expr::{ExprEngine, RpnHost};
pub use sink::Sink;
pub use source::{
    calc_source_block_sizes, get_source_dim_extent, get_source_dims, get_source_datatype,
    set_source_dim_extent, set_source_dims, set_source_datatype, Source,
};
pub use store::{DatasetStore, OpenMode};
pub use tool::{unsupported_accessor, Tool};
