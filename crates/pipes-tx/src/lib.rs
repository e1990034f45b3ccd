//! In-graph transform tools: the tiny utility tools (`Passthru`,
//! `Devnull`, `ZeroSource`), the structural transforms (`Pad`,
//! `BlockMap`), and the expression/row-fusion tools (`RpnMath` + its
//! `rpn::Engine`, `Func2Unblocked`, `Special`).

pub mod block_map;
pub mod devnull;
pub mod func2_unblocked;
pub mod pad;
pub mod passthru;
pub mod rpn;
pub mod rpn_math;
pub mod special;
pub mod zero_source;

pub use block_map::{BlockMap, BlockMapInit, BlockMapRemap};
pub use devnull::Devnull;
pub use func2_unblocked::{Func2Fn, Func2Unblocked};
pub use pad::Pad;
pub use passthru::Passthru;
pub use rpn_math::RpnMath;
pub use special::create as special_tool;
pub use zero_source::ZeroSource;
