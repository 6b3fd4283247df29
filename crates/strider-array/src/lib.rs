//! N-D array core for the Strider analytics engine
//!
//! This crate implements the device-backed array abstraction everything
//! else composes over:
//!
//! - Typed dense storage for 13 element types with a single promotion path.
//! - Broadcasting elementwise arithmetic with deferred evaluation:
//!   elementwise chains queue as nodes and materialize at sinks
//!   (reductions, host copies, indexing, explicit `eval`).
//! - The indexing engine translating rich selectors into per-axis
//!   normalized indexers.
//! - Reduction, scan, sort and set kernels, NaN-aware where it matters.
//! - Shape manipulation (reshape, flip, reorder, shift, tile, join, pad,
//!   triangles, diagonals, sliding-window pack/unpack).
//!
//! Kernels consult the active device for their thread budget: buffers past
//! a size threshold take the rayon path, everything else stays scalar.

pub mod array;
pub mod construct;
pub mod elementwise;
pub mod index;
pub mod manip;
pub mod ops;
pub mod reduce;
pub mod scan;
pub mod shape;
pub mod sort;
pub mod storage;

pub use array::Array;
pub use construct::{
    arange, diag, empty, eye, full, geomspace, identity, iota, linspace, logspace, ones, range,
    zeros,
};
pub use elementwise::{cplx2, where_};
pub use index::{AxisIndex, NormalizedIndex, Selector};
pub use manip::{join, PadFill};
pub use scan::ScanOp;
pub use shape::Shape;
pub use sort::{set_intersect, set_union, set_unique};

// the dtype and device surface travels with the array type
pub use strider_core::{manager, BatchGuard, DType, Error, ParallelRange, Result};
