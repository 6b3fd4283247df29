//! The array handle and its deferred-evaluation state machine
//!
//! An `Array` is a cheap clone-by-handle wrapper over a shared inner record:
//! shape and dtype are fixed at construction, the element buffer is either
//! materialized (`Ready`) or a pending elementwise node pointing at its
//! input arrays. Pending chains form a DAG (nodes only reference inputs, so
//! cycles cannot exist); sinks force materialization bottom-up. When the
//! device manager's manual-eval flag is set, every operation materializes
//! before returning.

use std::sync::{Arc, RwLock};

use strider_core::{manager, DType, Error, Result};

use crate::ops::{storage_truthy, BinaryOp, UnaryOp};
use crate::shape::Shape;
use crate::storage::{HostElem, Storage};

/// Deferred elementwise operation kinds.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PendingOp {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Select,
}

#[derive(Clone)]
pub(crate) struct Node {
    pub op: PendingOp,
    pub inputs: Vec<Array>,
}

pub(crate) enum State {
    Ready(Storage),
    Pending(Node),
}

struct Inner {
    shape: Shape,
    dtype: DType,
    state: RwLock<State>,
}

/// Owned, reference-counted N-D array handle.
///
/// Clones share the underlying buffer; `copy` detaches. Mutation happens
/// only through indexed assignment and the explicit in-place operations.
#[derive(Clone)]
pub struct Array {
    inner: Arc<Inner>,
}

impl Array {
    // ------------------------------------------------------------------
    // construction
    // ------------------------------------------------------------------

    /// Wrap a typed buffer in an array handle. The buffer length must fill
    /// the shape exactly.
    pub fn from_storage(storage: Storage, shape: Shape) -> Result<Array> {
        if storage.len() != shape.elements() {
            return Err(Error::Shape(format!(
                "buffer of {} elements cannot fill shape {shape}",
                storage.len()
            )));
        }
        Ok(Array {
            inner: Arc::new(Inner {
                shape,
                dtype: storage.dtype(),
                state: RwLock::new(State::Ready(storage)),
            }),
        })
    }

    pub(crate) fn pending(shape: Shape, dtype: DType, op: PendingOp, inputs: Vec<Array>) -> Array {
        Array {
            inner: Arc::new(Inner {
                shape,
                dtype,
                state: RwLock::new(State::Pending(Node { op, inputs })),
            }),
        }
    }

    /// Ingest a host buffer in column-major-leading layout. The buffer is
    /// copied; ownership stays with the caller.
    pub fn from_slice<T: HostElem>(data: &[T], dims: &[usize]) -> Result<Array> {
        let shape = Shape::new(dims)?;
        if data.len() != shape.elements() {
            return Err(Error::Shape(format!(
                "host buffer of {} elements cannot fill shape {shape}",
                data.len()
            )));
        }
        let requested = T::DTYPE;
        let storage = T::into_storage(data.to_vec());
        let effective = requested.supported();
        let storage = if effective == requested {
            storage
        } else {
            storage.cast(effective)
        };
        Array::from_storage(storage, shape)
    }

    /// Column-vector shorthand for a host slice.
    pub fn from_vector<T: HostElem>(data: &[T]) -> Result<Array> {
        Array::from_slice(data, &[data.len()])
    }

    /// Constant-filled array of the given dtype.
    pub fn constant(value: f64, dims: &[usize], dtype: DType) -> Result<Array> {
        let shape = Shape::new(dims)?;
        let dtype = dtype.supported();
        let storage = Storage::from_real_vec(dtype, vec![value; shape.elements()]);
        Array::from_storage(storage, shape)
    }

    pub fn zeros(dims: &[usize], dtype: DType) -> Result<Array> {
        Array::constant(0.0, dims, dtype)
    }

    pub fn ones(dims: &[usize], dtype: DType) -> Result<Array> {
        Array::constant(1.0, dims, dtype)
    }

    /// Uninitialized-by-contract array; the engine zero-fills.
    pub fn empty(dims: &[usize], dtype: DType) -> Result<Array> {
        Array::constant(0.0, dims, dtype)
    }

    /// A 1-element array of this array's dtype, used to lift scalars into
    /// broadcastable operands.
    pub fn scalar_like(&self, value: f64) -> Result<Array> {
        Array::constant(value, &[1], self.dtype())
    }

    /// Constant array matching this array's shape and dtype.
    pub fn full_like(&self, value: f64) -> Result<Array> {
        Array::constant(value, &self.dims(), self.dtype())
    }

    // ------------------------------------------------------------------
    // introspection
    // ------------------------------------------------------------------

    pub fn shape(&self) -> Shape {
        self.inner.shape
    }

    pub fn dims(&self) -> [usize; 4] {
        self.inner.shape.0
    }

    pub fn dim(&self, axis: usize) -> usize {
        self.inner.shape.0[axis]
    }

    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    pub fn ndims(&self) -> usize {
        self.inner.shape.ndims()
    }

    pub fn elements(&self) -> usize {
        self.inner.shape.elements()
    }

    pub fn is_scalar(&self) -> bool {
        self.elements() == 1
    }

    /// Whether this handle aliases the same buffer as `other`.
    pub fn same_buffer(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn is_ready(&self) -> bool {
        matches!(&*self.inner.state.read().unwrap(), State::Ready(_))
    }

    // ------------------------------------------------------------------
    // evaluation
    // ------------------------------------------------------------------

    /// Force every pending computation this array depends on.
    ///
    /// Iterative post-order walk; long op chains built in loops must not
    /// overflow the stack.
    pub fn eval(&self) -> Result<()> {
        let mut stack: Vec<Array> = vec![self.clone()];
        while let Some(top) = stack.last().cloned() {
            if top.is_ready() {
                stack.pop();
                continue;
            }
            let waiting: Vec<Array> = {
                let state = top.inner.state.read().unwrap();
                match &*state {
                    State::Ready(_) => Vec::new(),
                    State::Pending(node) => {
                        node.inputs.iter().filter(|a| !a.is_ready()).cloned().collect()
                    }
                }
            };
            if waiting.is_empty() {
                top.force_compute()?;
                stack.pop();
            } else {
                stack.extend(waiting);
            }
        }
        Ok(())
    }

    /// Force a batch of arrays in one pass.
    pub fn eval_multiple(arrays: &[&Array]) -> Result<()> {
        for a in arrays {
            a.eval()?;
        }
        Ok(())
    }

    fn force_compute(&self) -> Result<()> {
        let mut state = self.inner.state.write().unwrap();
        let node = match &*state {
            State::Ready(_) => return Ok(()),
            State::Pending(node) => node.clone(),
        };
        let operands: Vec<Storage> = node
            .inputs
            .iter()
            .map(|input| input.ready_storage_broadcast(self.shape()))
            .collect::<Result<_>>()?;
        let result = match node.op {
            PendingOp::Unary(op) => op.apply(&operands[0])?,
            PendingOp::Binary(op) => op.apply(&operands[0], &operands[1])?,
            PendingOp::Select => {
                let cond = storage_truthy(&operands[0]);
                let x = operands[1].cast(self.dtype());
                let y = operands[2].cast(self.dtype());
                Storage::select(&cond, &x, &y)?
            }
        };
        debug_assert_eq!(result.dtype(), self.dtype());
        debug_assert_eq!(result.len(), self.elements());
        *state = State::Ready(result);
        Ok(())
    }

    /// Materialized storage of an already-ready input, broadcast-expanded
    /// to the target shape.
    fn ready_storage_broadcast(&self, target: Shape) -> Result<Storage> {
        let state = self.inner.state.read().unwrap();
        let storage = match &*state {
            State::Ready(s) => s,
            State::Pending(_) => {
                return Err(Error::Device("pending input reached kernel dispatch".into()))
            }
        };
        if self.shape() == target {
            return Ok(storage.clone());
        }
        let src_shape = self.shape();
        Ok(storage.gather(target.elements(), |i| {
            Some(src_shape.broadcast_index(target.coords_of(i)))
        }))
    }

    /// Run `f` against the materialized buffer.
    pub(crate) fn with_storage<R>(&self, f: impl FnOnce(&Storage) -> R) -> Result<R> {
        self.eval()?;
        let state = self.inner.state.read().unwrap();
        match &*state {
            State::Ready(s) => Ok(f(s)),
            State::Pending(_) => Err(Error::Device("eval left a pending node".into())),
        }
    }

    /// Replace this array's buffer in place. The replacement must match
    /// shape and dtype; on error the array is left unchanged.
    pub(crate) fn replace_storage(&self, storage: Storage) -> Result<()> {
        if storage.len() != self.elements() {
            return Err(Error::Shape(format!(
                "in-place result of {} elements cannot fill shape {}",
                storage.len(),
                self.shape()
            )));
        }
        if storage.dtype() != self.dtype() {
            return Err(Error::Type(format!(
                "in-place result dtype {:?} differs from {:?}",
                storage.dtype(),
                self.dtype()
            )));
        }
        *self.inner.state.write().unwrap() = State::Ready(storage);
        Ok(())
    }

    /// Overwrite this array's contents with `other`, cast to this array's
    /// dtype. Shapes must match exactly; the buffer is untouched on error.
    pub fn assign(&self, other: &Array) -> Result<()> {
        if other.shape() != self.shape() {
            return Err(Error::Shape(format!(
                "cannot assign {} into {}",
                other.shape(),
                self.shape()
            )));
        }
        let storage = other.cast(self.dtype())?.with_storage(|s| s.clone())?;
        self.replace_storage(storage)
    }

    // ------------------------------------------------------------------
    // host transfer
    // ------------------------------------------------------------------

    /// Materialize into a host vector in column-major-leading layout,
    /// cast to the requested element type.
    pub fn host_vec<T: HostElem>(&self) -> Result<Vec<T>> {
        if self.dtype().is_complex() && !T::DTYPE.is_complex() {
            log::warn!("casting {:?} to {:?} discards the imaginary part", self.dtype(), T::DTYPE);
        }
        self.with_storage(|s| T::extract(s))
    }

    /// First element as a host scalar.
    pub fn scalar<T: HostElem>(&self) -> Result<T> {
        let v = self.host_vec::<T>()?;
        v.into_iter()
            .next()
            .ok_or_else(|| Error::Index("cannot take a scalar from an empty array".into()))
    }

    // ------------------------------------------------------------------
    // conversion and copies
    // ------------------------------------------------------------------

    /// Materializing dtype conversion. Integer casts truncate; complex to
    /// real keeps the real part and warns.
    pub fn cast(&self, dtype: DType) -> Result<Array> {
        let dtype = dtype.supported();
        if dtype == self.dtype() {
            return Ok(self.clone());
        }
        if self.dtype().is_complex() && !dtype.is_complex() {
            log::warn!("casting {:?} to {:?} discards the imaginary part", self.dtype(), dtype);
        }
        let storage = self.with_storage(|s| s.cast(dtype))?;
        Array::from_storage(storage, self.shape())
    }

    /// Deep copy with its own buffer.
    pub fn copy(&self) -> Result<Array> {
        let storage = self.with_storage(|s| s.clone())?;
        Array::from_storage(storage, self.shape())
    }

    // ------------------------------------------------------------------
    // deferred elementwise construction
    // ------------------------------------------------------------------

    pub(crate) fn unary_node(&self, op: UnaryOp) -> Result<Array> {
        let dtype = op.result_dtype(self.dtype())?;
        let out = Array::pending(self.shape(), dtype, PendingOp::Unary(op), vec![self.clone()]);
        if manager().manual_eval() {
            out.eval()?;
        }
        Ok(out)
    }

    pub(crate) fn binary_node(&self, other: &Array, op: BinaryOp) -> Result<Array> {
        let shape = self.shape().broadcast(&other.shape())?;
        let dtype = op.result_dtype(self.dtype(), other.dtype())?;
        let out = Array::pending(
            shape,
            dtype,
            PendingOp::Binary(op),
            vec![self.clone(), other.clone()],
        );
        if manager().manual_eval() {
            out.eval()?;
        }
        Ok(out)
    }

    pub(crate) fn select_node(cond: &Array, x: &Array, y: &Array) -> Result<Array> {
        let shape = cond.shape().broadcast(&x.shape())?.broadcast(&y.shape())?;
        let dtype = DType::promote(x.dtype(), y.dtype());
        let out = Array::pending(
            shape,
            dtype,
            PendingOp::Select,
            vec![cond.clone(), x.clone(), y.clone()],
        );
        if manager().manual_eval() {
            out.eval()?;
        }
        Ok(out)
    }
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Array")
            .field("shape", &self.inner.shape)
            .field("dtype", &self.inner.dtype)
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // tests that read or flip the process-wide manual-eval flag take this
    // lock so parallel test threads cannot observe each other's toggles
    static EVAL_FLAG: Mutex<()> = Mutex::new(());

    #[test]
    fn from_slice_round_trip() {
        let a = Array::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(a.dims(), [2, 2, 1, 1]);
        assert_eq!(a.dtype(), DType::F64);
        assert_eq!(a.host_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn shape_mismatch_rejected() {
        assert!(Array::from_slice(&[1.0f64, 2.0, 3.0], &[2, 2]).is_err());
    }

    #[test]
    fn lazy_chain_forces_at_host_copy() {
        let _guard = EVAL_FLAG.lock().unwrap();
        let a = Array::from_vector(&[1.0f64, 2.0, 3.0]).unwrap();
        let b = a.binary_node(&a, BinaryOp::Add).unwrap();
        let c = b.unary_node(UnaryOp::Sqrt).unwrap();
        assert!(!c.is_ready());
        let host = c.host_vec::<f64>().unwrap();
        assert!(c.is_ready());
        assert!((host[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn broadcast_shapes_resolve_at_construction() {
        let col = Array::from_slice(&[1.0f64, 2.0, 3.0], &[3, 1]).unwrap();
        let row = Array::from_slice(&[10.0f64, 20.0], &[1, 2]).unwrap();
        let sum = col.binary_node(&row, BinaryOp::Add).unwrap();
        assert_eq!(sum.dims(), [3, 2, 1, 1]);
        assert_eq!(
            sum.host_vec::<f64>().unwrap(),
            vec![11.0, 12.0, 13.0, 21.0, 22.0, 23.0]
        );
    }

    #[test]
    fn incompatible_broadcast_fails_at_construction() {
        let a = Array::from_slice(&[1.0f64; 6], &[3, 2]).unwrap();
        let b = Array::from_slice(&[1.0f64; 8], &[4, 2]).unwrap();
        assert!(a.binary_node(&b, BinaryOp::Add).is_err());
    }

    #[test]
    fn scalar_extraction() {
        let a = Array::constant(7.5, &[1], DType::F64).unwrap();
        assert_eq!(a.scalar::<f64>().unwrap(), 7.5);
        assert_eq!(a.scalar::<i32>().unwrap(), 7);
    }

    #[test]
    fn cast_preserves_shape() {
        let a = Array::from_slice(&[1.9f64, -2.9], &[2]).unwrap();
        let b = a.cast(DType::S32).unwrap();
        assert_eq!(b.host_vec::<i32>().unwrap(), vec![1, -2]);
        assert_eq!(b.shape(), a.shape());
    }

    #[test]
    fn complex_cast_drops_imaginary_with_warning() {
        let _ = env_logger::try_init();
        let a = Array::from_vector(&[num_complex::Complex64::new(1.5, 2.0)]).unwrap();
        let r = a.cast(DType::F64).unwrap();
        assert_eq!(r.host_vec::<f64>().unwrap(), vec![1.5]);
    }

    #[test]
    fn copies_detach_from_shared_buffer() {
        let a = Array::from_vector(&[1.0f64, 2.0]).unwrap();
        let b = a.copy().unwrap();
        assert!(!a.same_buffer(&b));
        assert!(a.same_buffer(&a.clone()));
    }

    #[test]
    fn manual_eval_forces_immediately() {
        let _guard = EVAL_FLAG.lock().unwrap();
        manager().set_manual_eval(true);
        let a = Array::from_vector(&[4.0f64]).unwrap();
        let b = a.unary_node(UnaryOp::Sqrt).unwrap();
        assert!(b.is_ready());
        manager().set_manual_eval(false);
    }
}
