//! Typed element storage
//!
//! One dense buffer per array, tagged by dtype. Kernels do not fan out over
//! every storage variant: compute widens each operand into one of five
//! kernel classes (bool, signed, unsigned, real, complex), applies the
//! operation there, and narrows the result back to the promoted output
//! dtype. The `f16` dtype never reaches storage on the CPU device; the
//! promotion policy widens it to `f32` at creation.

use num_complex::{Complex32, Complex64};
use strider_core::{DType, Error, Result};

/// Dense, dtype-tagged element buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    B8(Vec<bool>),
    U8(Vec<u8>),
    S16(Vec<i16>),
    U16(Vec<u16>),
    F32(Vec<f32>),
    S32(Vec<i32>),
    U32(Vec<u32>),
    S64(Vec<i64>),
    U64(Vec<u64>),
    F64(Vec<f64>),
    C32(Vec<Complex32>),
    C64(Vec<Complex64>),
}

/// Widened views used by the compute kernels.
#[derive(Debug, Clone, PartialEq)]
pub enum Kernel {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Real(Vec<f64>),
    Cplx(Vec<Complex64>),
}

macro_rules! for_each_variant {
    ($self:expr, $data:ident => $body:expr) => {
        match $self {
            Storage::B8($data) => $body,
            Storage::U8($data) => $body,
            Storage::S16($data) => $body,
            Storage::U16($data) => $body,
            Storage::F32($data) => $body,
            Storage::S32($data) => $body,
            Storage::U32($data) => $body,
            Storage::S64($data) => $body,
            Storage::U64($data) => $body,
            Storage::F64($data) => $body,
            Storage::C32($data) => $body,
            Storage::C64($data) => $body,
        }
    };
}

impl Storage {
    pub fn dtype(&self) -> DType {
        match self {
            Storage::B8(_) => DType::B8,
            Storage::U8(_) => DType::U8,
            Storage::S16(_) => DType::S16,
            Storage::U16(_) => DType::U16,
            Storage::F32(_) => DType::F32,
            Storage::S32(_) => DType::S32,
            Storage::U32(_) => DType::U32,
            Storage::S64(_) => DType::S64,
            Storage::U64(_) => DType::U64,
            Storage::F64(_) => DType::F64,
            Storage::C32(_) => DType::C32,
            Storage::C64(_) => DType::C64,
        }
    }

    pub fn len(&self) -> usize {
        for_each_variant!(self, d => d.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widen into the kernel class the dtype computes in.
    pub fn to_kernel(&self) -> Kernel {
        match self {
            Storage::B8(d) => Kernel::Bool(d.clone()),
            Storage::U8(d) => Kernel::Int(d.iter().map(|&v| v as i64).collect()),
            Storage::S16(d) => Kernel::Int(d.iter().map(|&v| v as i64).collect()),
            Storage::U16(d) => Kernel::Int(d.iter().map(|&v| v as i64).collect()),
            Storage::S32(d) => Kernel::Int(d.iter().map(|&v| v as i64).collect()),
            Storage::U32(d) => Kernel::Int(d.iter().map(|&v| v as i64).collect()),
            Storage::S64(d) => Kernel::Int(d.clone()),
            Storage::U64(d) => Kernel::UInt(d.clone()),
            Storage::F32(d) => Kernel::Real(d.iter().map(|&v| v as f64).collect()),
            Storage::F64(d) => Kernel::Real(d.clone()),
            Storage::C32(d) => {
                Kernel::Cplx(d.iter().map(|&v| Complex64::new(v.re as f64, v.im as f64)).collect())
            }
            Storage::C64(d) => Kernel::Cplx(d.clone()),
        }
    }

    /// Real-valued f64 view; complex storage is rejected.
    pub fn to_real_vec(&self) -> Result<Vec<f64>> {
        match self {
            Storage::C32(_) | Storage::C64(_) => Err(Error::Type(
                "operation requires real-valued input, got complex".into(),
            )),
            Storage::B8(d) => Ok(d.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect()),
            Storage::U8(d) => Ok(d.iter().map(|&v| v as f64).collect()),
            Storage::S16(d) => Ok(d.iter().map(|&v| v as f64).collect()),
            Storage::U16(d) => Ok(d.iter().map(|&v| v as f64).collect()),
            Storage::F32(d) => Ok(d.iter().map(|&v| v as f64).collect()),
            Storage::S32(d) => Ok(d.iter().map(|&v| v as f64).collect()),
            Storage::U32(d) => Ok(d.iter().map(|&v| v as f64).collect()),
            Storage::S64(d) => Ok(d.iter().map(|&v| v as f64).collect()),
            Storage::U64(d) => Ok(d.iter().map(|&v| v as f64).collect()),
            Storage::F64(d) => Ok(d.clone()),
        }
    }

    /// Complex view of any storage; reals get a zero imaginary part.
    pub fn to_complex_vec(&self) -> Vec<Complex64> {
        match self {
            Storage::C32(d) => d.iter().map(|&v| Complex64::new(v.re as f64, v.im as f64)).collect(),
            Storage::C64(d) => d.clone(),
            other => other
                .to_real_vec()
                .expect("real storage")
                .into_iter()
                .map(|v| Complex64::new(v, 0.0))
                .collect(),
        }
    }

    /// Narrow an f64 kernel result into `dtype` storage.
    pub fn from_real_vec(dtype: DType, data: Vec<f64>) -> Storage {
        match dtype {
            DType::B8 => Storage::B8(data.into_iter().map(|v| v != 0.0).collect()),
            DType::U8 => Storage::U8(data.into_iter().map(|v| v as u8).collect()),
            DType::S16 => Storage::S16(data.into_iter().map(|v| v as i16).collect()),
            DType::U16 => Storage::U16(data.into_iter().map(|v| v as u16).collect()),
            DType::F16 | DType::F32 => Storage::F32(data.into_iter().map(|v| v as f32).collect()),
            DType::S32 => Storage::S32(data.into_iter().map(|v| v as i32).collect()),
            DType::U32 => Storage::U32(data.into_iter().map(|v| v as u32).collect()),
            DType::S64 => Storage::S64(data.into_iter().map(|v| v as i64).collect()),
            DType::U64 => Storage::U64(data.into_iter().map(|v| v as u64).collect()),
            DType::F64 => Storage::F64(data),
            DType::C32 => Storage::C32(data.into_iter().map(|v| Complex32::new(v as f32, 0.0)).collect()),
            DType::C64 => Storage::C64(data.into_iter().map(|v| Complex64::new(v, 0.0)).collect()),
        }
    }

    /// Narrow an i64 kernel result into `dtype` storage.
    pub fn from_int_vec(dtype: DType, data: Vec<i64>) -> Storage {
        match dtype {
            DType::B8 => Storage::B8(data.into_iter().map(|v| v != 0).collect()),
            DType::U8 => Storage::U8(data.into_iter().map(|v| v as u8).collect()),
            DType::S16 => Storage::S16(data.into_iter().map(|v| v as i16).collect()),
            DType::U16 => Storage::U16(data.into_iter().map(|v| v as u16).collect()),
            DType::F16 | DType::F32 => Storage::F32(data.into_iter().map(|v| v as f32).collect()),
            DType::S32 => Storage::S32(data.into_iter().map(|v| v as i32).collect()),
            DType::U32 => Storage::U32(data.into_iter().map(|v| v as u32).collect()),
            DType::S64 => Storage::S64(data),
            DType::U64 => Storage::U64(data.into_iter().map(|v| v as u64).collect()),
            DType::F64 => Storage::F64(data.into_iter().map(|v| v as f64).collect()),
            DType::C32 => Storage::C32(data.into_iter().map(|v| Complex32::new(v as f32, 0.0)).collect()),
            DType::C64 => Storage::C64(data.into_iter().map(|v| Complex64::new(v as f64, 0.0)).collect()),
        }
    }

    /// Narrow a u64 kernel result into `dtype` storage.
    pub fn from_uint_vec(dtype: DType, data: Vec<u64>) -> Storage {
        match dtype {
            DType::U64 => Storage::U64(data),
            other => Storage::from_int_vec(other, data.into_iter().map(|v| v as i64).collect()),
        }
    }

    /// Narrow a complex kernel result into `dtype` storage. Narrowing to a
    /// real dtype keeps the real part; callers warn at the array level.
    pub fn from_complex_vec(dtype: DType, data: Vec<Complex64>) -> Storage {
        match dtype {
            DType::C64 => Storage::C64(data),
            DType::C32 => Storage::C32(
                data.into_iter().map(|v| Complex32::new(v.re as f32, v.im as f32)).collect(),
            ),
            real => Storage::from_real_vec(real, data.into_iter().map(|v| v.re).collect()),
        }
    }

    pub fn from_bool_vec(dtype: DType, data: Vec<bool>) -> Storage {
        match dtype {
            DType::B8 => Storage::B8(data),
            other => Storage::from_int_vec(other, data.into_iter().map(|v| v as i64).collect()),
        }
    }

    /// Cast to another dtype. Integer casts truncate; complex→real keeps the
    /// real part (the array layer emits the warning).
    pub fn cast(&self, dtype: DType) -> Storage {
        if self.dtype() == dtype {
            return self.clone();
        }
        match self.to_kernel() {
            Kernel::Bool(d) => Storage::from_bool_vec(dtype, d),
            Kernel::Int(d) => Storage::from_int_vec(dtype, d),
            Kernel::UInt(d) => Storage::from_uint_vec(dtype, d),
            Kernel::Real(d) => Storage::from_real_vec(dtype, d),
            Kernel::Cplx(d) => Storage::from_complex_vec(dtype, d),
        }
    }

    /// Build a gathered copy: `out[i] = self[map(i)]`, with `None` mapping
    /// to the zero element (used by zero-fill padding).
    pub fn gather(&self, out_len: usize, map: impl Fn(usize) -> Option<usize>) -> Storage {
        macro_rules! gather_impl {
            ($variant:ident, $data:expr, $zero:expr) => {{
                let data = $data;
                let mut out = Vec::with_capacity(out_len);
                for i in 0..out_len {
                    out.push(match map(i) {
                        Some(src) => data[src],
                        None => $zero,
                    });
                }
                Storage::$variant(out)
            }};
        }
        match self {
            Storage::B8(d) => gather_impl!(B8, d, false),
            Storage::U8(d) => gather_impl!(U8, d, 0),
            Storage::S16(d) => gather_impl!(S16, d, 0),
            Storage::U16(d) => gather_impl!(U16, d, 0),
            Storage::F32(d) => gather_impl!(F32, d, 0.0),
            Storage::S32(d) => gather_impl!(S32, d, 0),
            Storage::U32(d) => gather_impl!(U32, d, 0),
            Storage::S64(d) => gather_impl!(S64, d, 0),
            Storage::U64(d) => gather_impl!(U64, d, 0),
            Storage::F64(d) => gather_impl!(F64, d, 0.0),
            Storage::C32(d) => gather_impl!(C32, d, Complex32::new(0.0, 0.0)),
            Storage::C64(d) => gather_impl!(C64, d, Complex64::new(0.0, 0.0)),
        }
    }

    /// Masked blend: `out[i] = if cond[i] { a[i] } else { b[i] }`. Both
    /// sides must share a dtype; the caller casts beforehand.
    pub fn select(cond: &[bool], a: &Storage, b: &Storage) -> Result<Storage> {
        macro_rules! select_impl {
            ($variant:ident, $a:expr, $b:expr) => {{
                let out = cond
                    .iter()
                    .zip($a.iter().zip($b.iter()))
                    .map(|(&c, (&x, &y))| if c { x } else { y })
                    .collect();
                Ok(Storage::$variant(out))
            }};
        }
        match (a, b) {
            (Storage::B8(x), Storage::B8(y)) => select_impl!(B8, x, y),
            (Storage::U8(x), Storage::U8(y)) => select_impl!(U8, x, y),
            (Storage::S16(x), Storage::S16(y)) => select_impl!(S16, x, y),
            (Storage::U16(x), Storage::U16(y)) => select_impl!(U16, x, y),
            (Storage::F32(x), Storage::F32(y)) => select_impl!(F32, x, y),
            (Storage::S32(x), Storage::S32(y)) => select_impl!(S32, x, y),
            (Storage::U32(x), Storage::U32(y)) => select_impl!(U32, x, y),
            (Storage::S64(x), Storage::S64(y)) => select_impl!(S64, x, y),
            (Storage::U64(x), Storage::U64(y)) => select_impl!(U64, x, y),
            (Storage::F64(x), Storage::F64(y)) => select_impl!(F64, x, y),
            (Storage::C32(x), Storage::C32(y)) => select_impl!(C32, x, y),
            (Storage::C64(x), Storage::C64(y)) => select_impl!(C64, x, y),
            (a, b) => Err(Error::Type(format!(
                "select dtype mismatch: {:?} vs {:?}",
                a.dtype(),
                b.dtype()
            ))),
        }
    }

    /// Scatter `src` into `self`: `self[dst_of(i)] = src[i]`. Both sides
    /// must share a dtype; the caller casts beforehand.
    pub fn scatter(&mut self, src: &Storage, dst_of: impl Fn(usize) -> usize) -> Result<()> {
        macro_rules! scatter_impl {
            ($dst:expr, $src:expr) => {{
                for (i, &v) in $src.iter().enumerate() {
                    $dst[dst_of(i)] = v;
                }
                Ok(())
            }};
        }
        match (self, src) {
            (Storage::B8(d), Storage::B8(s)) => scatter_impl!(d, s),
            (Storage::U8(d), Storage::U8(s)) => scatter_impl!(d, s),
            (Storage::S16(d), Storage::S16(s)) => scatter_impl!(d, s),
            (Storage::U16(d), Storage::U16(s)) => scatter_impl!(d, s),
            (Storage::F32(d), Storage::F32(s)) => scatter_impl!(d, s),
            (Storage::S32(d), Storage::S32(s)) => scatter_impl!(d, s),
            (Storage::U32(d), Storage::U32(s)) => scatter_impl!(d, s),
            (Storage::S64(d), Storage::S64(s)) => scatter_impl!(d, s),
            (Storage::U64(d), Storage::U64(s)) => scatter_impl!(d, s),
            (Storage::F64(d), Storage::F64(s)) => scatter_impl!(d, s),
            (Storage::C32(d), Storage::C32(s)) => scatter_impl!(d, s),
            (Storage::C64(d), Storage::C64(s)) => scatter_impl!(d, s),
            (d, s) => Err(Error::Type(format!(
                "scatter dtype mismatch: {:?} vs {:?}",
                d.dtype(),
                s.dtype()
            ))),
        }
    }
}

/// Host element types that can cross the array boundary.
///
/// The conversion honors the engine's column-major-leading layout on both
/// directions; ownership of host buffers is never taken.
pub trait HostElem: Copy + 'static {
    const DTYPE: DType;
    fn into_storage(data: Vec<Self>) -> Storage;
    fn extract(storage: &Storage) -> Vec<Self>;
}

macro_rules! host_elem {
    ($ty:ty, $dtype:expr, $variant:ident) => {
        impl HostElem for $ty {
            const DTYPE: DType = $dtype;
            fn into_storage(data: Vec<Self>) -> Storage {
                Storage::$variant(data)
            }
            fn extract(storage: &Storage) -> Vec<Self> {
                if let Storage::$variant(d) = storage {
                    return d.clone();
                }
                match storage.cast($dtype) {
                    Storage::$variant(d) => d,
                    _ => unreachable!("cast produced wrong variant"),
                }
            }
        }
    };
}

host_elem!(bool, DType::B8, B8);
host_elem!(u8, DType::U8, U8);
host_elem!(i16, DType::S16, S16);
host_elem!(u16, DType::U16, U16);
host_elem!(f32, DType::F32, F32);
host_elem!(i32, DType::S32, S32);
host_elem!(u32, DType::U32, U32);
host_elem!(i64, DType::S64, S64);
host_elem!(u64, DType::U64, U64);
host_elem!(f64, DType::F64, F64);
host_elem!(Complex32, DType::C32, C32);
host_elem!(Complex64, DType::C64, C64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_widening_round_trip() {
        let s = Storage::U16(vec![1, 2, 3]);
        match s.to_kernel() {
            Kernel::Int(v) => assert_eq!(v, vec![1, 2, 3]),
            other => panic!("unexpected kernel {other:?}"),
        }
        let back = Storage::from_int_vec(DType::U16, vec![1, 2, 3]);
        assert_eq!(s, back);
    }

    #[test]
    fn cast_truncates_floats_to_integers() {
        let s = Storage::F64(vec![1.9, -2.7, 3.2]);
        match s.cast(DType::S32) {
            Storage::S32(v) => assert_eq!(v, vec![1, -2, 3]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cast_complex_to_real_keeps_re() {
        let s = Storage::C64(vec![Complex64::new(2.5, -1.0)]);
        match s.cast(DType::F64) {
            Storage::F64(v) => assert_eq!(v, vec![2.5]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn gather_with_zero_fill() {
        let s = Storage::F64(vec![10.0, 20.0]);
        let g = s.gather(3, |i| if i < 2 { Some(1 - i) } else { None });
        assert_eq!(g, Storage::F64(vec![20.0, 10.0, 0.0]));
    }

    #[test]
    fn scatter_requires_matching_dtype() {
        let mut dst = Storage::F64(vec![0.0; 4]);
        let src = Storage::F64(vec![1.0, 2.0]);
        dst.scatter(&src, |i| i * 2).unwrap();
        assert_eq!(dst, Storage::F64(vec![1.0, 0.0, 2.0, 0.0]));

        let bad = Storage::F32(vec![1.0]);
        assert!(dst.scatter(&bad, |i| i).is_err());
    }
}
