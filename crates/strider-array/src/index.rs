//! Indexing engine
//!
//! Rich selectors (integer, inclusive sequence, boolean mask, index array,
//! span, ellipsis, batched range) normalize into a per-axis indexer plus the
//! resulting shape. Sequences follow the device convention: `stop` is
//! inclusive, so a degenerate `start == stop` selects one element. The
//! translation from host half-open ranges is explicit via
//! `From<std::ops::Range<i64>>`.

use strider_core::{Error, ParallelRange, Result};

use crate::array::Array;
use crate::shape::Shape;
use crate::storage::Storage;

/// One slot of a selector tuple.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Single integer position; negatives count from the end.
    Index(i64),
    /// Inclusive arithmetic sequence. Negative step iterates high to low.
    Seq { start: i64, stop: i64, step: i64 },
    /// Every position of one axis.
    Span,
    /// Expands to span all remaining axes; at most one per tuple.
    Ellipsis,
    /// Boolean mask over one axis; selects the true positions.
    Mask(Array),
    /// Integer position array.
    Take(Array),
    /// Sequence with parallel-for semantics.
    Batched(ParallelRange),
}

impl Selector {
    pub fn idx(i: i64) -> Selector {
        Selector::Index(i)
    }

    pub fn seq(start: i64, stop: i64, step: i64) -> Selector {
        Selector::Seq { start, stop, step }
    }
}

impl From<i64> for Selector {
    fn from(i: i64) -> Selector {
        Selector::Index(i)
    }
}

/// Host half-open range, translated to the inclusive device form.
impl From<std::ops::Range<i64>> for Selector {
    fn from(r: std::ops::Range<i64>) -> Selector {
        Selector::Seq { start: r.start, stop: r.end - 1, step: 1 }
    }
}

impl From<ParallelRange> for Selector {
    fn from(r: ParallelRange) -> Selector {
        Selector::Batched(r)
    }
}

/// Normalized per-axis indexer, ready for the gather/scatter kernels.
#[derive(Debug, Clone)]
pub enum AxisIndex {
    /// Inclusive sequence.
    Seq { start: i64, stop: i64, step: i64 },
    /// Explicit positions (from masks and index arrays).
    Positions(Vec<u64>),
}

impl AxisIndex {
    fn full(n: usize) -> AxisIndex {
        AxisIndex::Seq { start: 0, stop: n as i64 - 1, step: 1 }
    }

    /// Number of positions the slot selects.
    pub fn len(&self) -> usize {
        match self {
            AxisIndex::Seq { start, stop, step } => {
                let span = (stop - start).abs() as usize + 1;
                let s = step.unsigned_abs() as usize;
                span.div_ceil(s)
            }
            AxisIndex::Positions(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn positions(&self) -> Vec<usize> {
        match self {
            AxisIndex::Seq { start, stop, step } => {
                let mut out = Vec::with_capacity(self.len());
                let mut v = *start;
                if *step > 0 {
                    while v <= *stop {
                        out.push(v as usize);
                        v += step;
                    }
                } else {
                    while v >= *stop {
                        out.push(v as usize);
                        v += step;
                    }
                }
                out
            }
            AxisIndex::Positions(p) => p.iter().map(|&v| v as usize).collect(),
        }
    }
}

/// Result of selector normalization: effective rank, result shape, and one
/// normalized slot per axis.
#[derive(Debug, Clone)]
pub struct NormalizedIndex {
    pub ndims: usize,
    pub shape: Shape,
    pub slots: [AxisIndex; 4],
    pub batched: [bool; 4],
}

impl NormalizedIndex {
    /// Normalize a selector tuple against an array shape.
    pub fn normalize(selectors: &[Selector], shape: Shape) -> Result<NormalizedIndex> {
        if selectors.len() > 4 {
            return Err(Error::Index(format!(
                "selector tuples support at most 4 entries, got {}",
                selectors.len()
            )));
        }
        let ellipses = selectors.iter().filter(|s| matches!(s, Selector::Ellipsis)).count();
        if ellipses > 1 {
            return Err(Error::Index("at most one ellipsis marker is allowed".into()));
        }

        // expand the ellipsis so every axis gets exactly one slot
        let mut expanded: Vec<Selector> = Vec::with_capacity(4);
        for sel in selectors {
            if matches!(sel, Selector::Ellipsis) {
                let remaining = 4 - (selectors.len() - 1);
                for _ in 0..remaining {
                    expanded.push(Selector::Span);
                }
            } else {
                expanded.push(sel.clone());
            }
        }
        while expanded.len() < 4 {
            expanded.push(Selector::Span);
        }

        let mut slots: Vec<AxisIndex> = Vec::with_capacity(4);
        let mut batched = [false; 4];
        for (axis, sel) in expanded.iter().enumerate() {
            let n = shape.dim(axis);
            let slot = match sel {
                Selector::Span | Selector::Ellipsis => AxisIndex::full(n),
                Selector::Index(i) => {
                    let v = normalize_position(*i, n, axis)?;
                    AxisIndex::Seq { start: v, stop: v, step: 1 }
                }
                Selector::Seq { start, stop, step } => normalize_seq(*start, *stop, *step, n, axis)?,
                Selector::Batched(range) => {
                    batched[axis] = true;
                    let stop = range.stop - range.step.signum();
                    normalize_seq(range.start, stop, range.step, n, axis)?
                }
                Selector::Mask(mask) => {
                    if !mask.dtype().is_bool() {
                        return Err(Error::Index("mask selectors must have dtype b8".into()));
                    }
                    if mask.elements() != n {
                        return Err(Error::Index(format!(
                            "mask of {} entries cannot index axis {axis} of size {n}",
                            mask.elements()
                        )));
                    }
                    let flags = mask.host_vec::<bool>()?;
                    let positions: Vec<u64> = flags
                        .iter()
                        .enumerate()
                        .filter(|(_, &f)| f)
                        .map(|(i, _)| i as u64)
                        .collect();
                    if positions.is_empty() {
                        return Err(Error::Index(format!(
                            "mask selects no positions on axis {axis}"
                        )));
                    }
                    AxisIndex::Positions(positions)
                }
                Selector::Take(idx) => {
                    if !idx.dtype().is_integer() {
                        return Err(Error::Index("index-array selectors must be integer typed".into()));
                    }
                    let raw = idx.host_vec::<i64>()?;
                    let mut positions = Vec::with_capacity(raw.len());
                    for v in raw {
                        positions.push(normalize_position(v, n, axis)? as u64);
                    }
                    AxisIndex::Positions(positions)
                }
            };
            slots.push(slot);
        }

        let slots: [AxisIndex; 4] = slots
            .try_into()
            .map_err(|_| Error::Index("selector expansion did not cover four axes".into()))?;
        let dims = [slots[0].len(), slots[1].len(), slots[2].len(), slots[3].len()];
        let shape = Shape::new(&dims)?;
        Ok(NormalizedIndex { ndims: shape.ndims(), shape, slots, batched })
    }
}

fn normalize_position(i: i64, n: usize, axis: usize) -> Result<i64> {
    let v = if i < 0 { i + n as i64 } else { i };
    if v < 0 || v >= n as i64 {
        return Err(Error::Index(format!(
            "index {i} out of bounds for axis {axis} of size {n}"
        )));
    }
    Ok(v)
}

fn normalize_seq(start: i64, stop: i64, step: i64, n: usize, axis: usize) -> Result<AxisIndex> {
    if step == 0 {
        return Err(Error::Index("sequence step cannot be zero".into()));
    }
    let start = normalize_position(start, n, axis)?;
    let stop = normalize_position(stop, n, axis)?;
    if (step > 0 && start > stop) || (step < 0 && start < stop) {
        return Err(Error::Index(format!(
            "sequence {start}:{stop}:{step} runs against its step on axis {axis}"
        )));
    }
    Ok(AxisIndex::Seq { start, stop, step })
}

impl Array {
    /// Gather the selection into a new array.
    pub fn get(&self, selectors: &[Selector]) -> Result<Array> {
        let norm = NormalizedIndex::normalize(selectors, self.shape())?;
        let src_shape = self.shape();
        let out_shape = norm.shape;
        let pos: Vec<Vec<usize>> = norm.slots.iter().map(|s| s.positions()).collect();
        let storage = self.with_storage(|s| {
            s.gather(out_shape.elements(), |i| {
                let c = out_shape.coords_of(i);
                Some(src_shape.index_of([pos[0][c[0]], pos[1][c[1]], pos[2][c[2]], pos[3][c[3]]]))
            })
        })?;
        Array::from_storage(storage, out_shape)
    }

    /// Write `value` into the selection, broadcasting it to the selection
    /// shape and casting to this array's dtype.
    pub fn set(&self, selectors: &[Selector], value: &Array) -> Result<()> {
        let norm = NormalizedIndex::normalize(selectors, self.shape())?;
        let sel_shape = norm.shape;
        // broadcast the value up to the selection shape
        let resolved = sel_shape.broadcast(&value.shape())?;
        if resolved != sel_shape {
            return Err(Error::Shape(format!(
                "value of shape {} cannot broadcast into selection {}",
                value.shape(),
                sel_shape
            )));
        }
        let val_shape = value.shape();
        let src = value.with_storage(|s| {
            s.gather(sel_shape.elements(), |i| {
                Some(val_shape.broadcast_index(sel_shape.coords_of(i)))
            })
        })?;
        let src = src.cast(self.dtype());

        let pos: Vec<Vec<usize>> = norm.slots.iter().map(|s| s.positions()).collect();
        let dst_shape = self.shape();
        self.eval()?;
        let mut storage = self.with_storage(|s| s.clone())?;
        storage.scatter(&src, |i| {
            let c = sel_shape.coords_of(i);
            dst_shape.index_of([pos[0][c[0]], pos[1][c[1]], pos[2][c[2]], pos[3][c[3]]])
        })?;
        self.replace_storage(storage)
    }

    /// Scalar write shorthand.
    pub fn set_scalar(&self, selectors: &[Selector], v: f64) -> Result<()> {
        self.set(selectors, &self.scalar_like(v)?)
    }

    /// First-axis slice `start..=stop`, a common fast path.
    pub fn slice(&self, start: i64, stop: i64) -> Result<Array> {
        self.get(&[Selector::seq(start, stop, 1)])
    }

    /// Select full columns (second axis) by position.
    pub fn col(&self, c: i64) -> Result<Array> {
        self.get(&[Selector::Span, Selector::Index(c)])
    }

    /// Positions of the true entries of a flat boolean array.
    pub fn where_true(&self) -> Result<Array> {
        if !self.dtype().is_bool() {
            return Err(Error::Type("where_true expects a boolean array".into()));
        }
        let flags = self.host_vec::<bool>()?;
        let positions: Vec<u32> = flags
            .iter()
            .enumerate()
            .filter(|(_, &f)| f)
            .map(|(i, _)| i as u32)
            .collect();
        if positions.is_empty() {
            return Err(Error::Index("no true entries to locate".into()));
        }
        let shape = Shape::vector(positions.len());
        Array::from_storage(Storage::U32(positions), shape)
    }
}
