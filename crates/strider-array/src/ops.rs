//! Elementwise operation kernels
//!
//! Each operation is defined once per kernel class (bool, signed, unsigned,
//! real, complex); operands are widened into the class of the promoted
//! result dtype, the kernel applies, and the result narrows back. Every
//! kernel honors the device thread budget: large buffers take the rayon
//! path, small ones the scalar path.

use num_complex::Complex64;
use rayon::prelude::*;
use strider_core::{manager, DType, Error, Result};

use crate::storage::Storage;

/// Buffers below this size stay on the scalar path; kernel dispatch
/// overhead dominates any win from splitting them.
const PAR_THRESHOLD: usize = 4096;

pub(crate) fn par_map<T, U, F>(v: Vec<T>, f: F) -> Vec<U>
where
    T: Send,
    U: Send,
    F: Fn(T) -> U + Sync + Send,
{
    if manager().parallel_enabled() && v.len() >= PAR_THRESHOLD {
        v.into_par_iter().map(f).collect()
    } else {
        v.into_iter().map(f).collect()
    }
}

pub(crate) fn par_zip<T, U, F>(a: Vec<T>, b: Vec<T>, f: F) -> Vec<U>
where
    T: Send + Sync,
    U: Send,
    F: Fn(T, T) -> U + Sync + Send,
{
    if manager().parallel_enabled() && a.len() >= PAR_THRESHOLD {
        a.into_par_iter().zip(b.into_par_iter()).map(|(x, y)| f(x, y)).collect()
    } else {
        a.into_iter().zip(b).map(|(x, y)| f(x, y)).collect()
    }
}

// ============================================================================
// Unary operations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Abs,
    Sign,
    Round,
    Trunc,
    Floor,
    Ceil,
    Sqrt,
    Cbrt,
    Rsqrt,
    Exp,
    Expm1,
    Log,
    Log1p,
    Log2,
    Log10,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Erf,
    Erfc,
    Sigmoid,
    Not,
    BitNot,
    Real,
    Imag,
    Conj,
    Arg,
}

impl UnaryOp {
    fn is_transcendental(&self) -> bool {
        use UnaryOp::*;
        matches!(
            self,
            Sqrt | Cbrt | Rsqrt | Exp | Expm1 | Log | Log1p | Log2 | Log10 | Sin | Cos | Tan
                | Asin | Acos | Atan | Sinh | Cosh | Tanh | Asinh | Acosh | Atanh | Erf | Erfc
                | Sigmoid
        )
    }

    /// Result dtype for an input dtype, or a type error when the operation
    /// does not apply.
    pub fn result_dtype(&self, input: DType) -> Result<DType> {
        use UnaryOp::*;
        match self {
            Not => Ok(DType::B8),
            BitNot => {
                if input.is_integer() || input.is_bool() {
                    Ok(input)
                } else {
                    Err(Error::Type(format!("bitwise not requires an integer type, got {input:?}")))
                }
            }
            Real | Imag | Abs => Ok(input.to_real()),
            Arg => {
                let real = input.to_real();
                Ok(if real.is_floating() { real } else { DType::F32 })
            }
            Conj => Ok(input),
            op if op.is_transcendental() => {
                if input.is_complex() {
                    Ok(input)
                } else if input == DType::F64 {
                    Ok(DType::F64)
                } else {
                    // integer and bool inputs take the single-precision path
                    Ok(DType::F32)
                }
            }
            _ => Ok(input),
        }
    }

    fn apply_real(&self, v: f64) -> f64 {
        use UnaryOp::*;
        match self {
            Neg => -v,
            Abs => v.abs(),
            Sign => {
                if v > 0.0 {
                    1.0
                } else if v < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Round => v.round(),
            Trunc => v.trunc(),
            Floor => v.floor(),
            Ceil => v.ceil(),
            Sqrt => v.sqrt(),
            Cbrt => v.cbrt(),
            Rsqrt => 1.0 / v.sqrt(),
            Exp => v.exp(),
            Expm1 => v.exp_m1(),
            Log => v.ln(),
            Log1p => v.ln_1p(),
            Log2 => v.log2(),
            Log10 => v.log10(),
            Sin => v.sin(),
            Cos => v.cos(),
            Tan => v.tan(),
            Asin => v.asin(),
            Acos => v.acos(),
            Atan => v.atan(),
            Sinh => v.sinh(),
            Cosh => v.cosh(),
            Tanh => v.tanh(),
            Asinh => v.asinh(),
            Acosh => v.acosh(),
            Atanh => v.atanh(),
            Erf => erf(v),
            Erfc => 1.0 - erf(v),
            Sigmoid => 1.0 / (1.0 + (-v).exp()),
            Real | Conj => v,
            Imag => 0.0,
            Arg => {
                if v < 0.0 {
                    std::f64::consts::PI
                } else {
                    0.0
                }
            }
            Not | BitNot => unreachable!("handled in class dispatch"),
        }
    }

    fn apply_cplx(&self, v: Complex64) -> Result<Complex64> {
        use UnaryOp::*;
        Ok(match self {
            Neg => -v,
            Conj => v.conj(),
            Sqrt => v.sqrt(),
            Exp => v.exp(),
            Log => v.ln(),
            Log2 => v.ln() / std::f64::consts::LN_2,
            Log10 => v.ln() / std::f64::consts::LN_10,
            Sin => v.sin(),
            Cos => v.cos(),
            Tan => v.tan(),
            Sinh => v.sinh(),
            Cosh => v.cosh(),
            Tanh => v.tanh(),
            Asin => v.asin(),
            Acos => v.acos(),
            Atan => v.atan(),
            Asinh => v.asinh(),
            Acosh => v.acosh(),
            Atanh => v.atanh(),
            other => {
                return Err(Error::Type(format!(
                    "operation {other:?} is not defined for complex operands"
                )))
            }
        })
    }

    /// Apply over a storage buffer.
    pub fn apply(&self, input: &Storage) -> Result<Storage> {
        use UnaryOp::*;
        let out_dtype = self.result_dtype(input.dtype())?;
        match self {
            Not => {
                let truthy = storage_truthy(input);
                Ok(Storage::B8(par_map(truthy, |v| !v)))
            }
            BitNot => {
                if input.dtype() == DType::U64 {
                    let v = u64_vec(input);
                    Ok(Storage::from_uint_vec(out_dtype, par_map(v, |x| !x)))
                } else {
                    let v = i64_vec(input);
                    Ok(Storage::from_int_vec(out_dtype, par_map(v, |x| !x)))
                }
            }
            Real => Ok(Storage::from_real_vec(
                out_dtype,
                par_map(input.to_complex_vec(), |v| v.re),
            )),
            Imag => Ok(Storage::from_real_vec(
                out_dtype,
                par_map(input.to_complex_vec(), |v| v.im),
            )),
            Arg if input.dtype().is_complex() => Ok(Storage::from_real_vec(
                out_dtype,
                par_map(input.to_complex_vec(), |v| v.arg()),
            )),
            Abs if input.dtype().is_complex() => Ok(Storage::from_real_vec(
                out_dtype,
                par_map(input.to_complex_vec(), |v| v.norm()),
            )),
            op => {
                if input.dtype().is_complex() {
                    let data = input.to_complex_vec();
                    let mut out = Vec::with_capacity(data.len());
                    for v in data {
                        out.push(op.apply_cplx(v)?);
                    }
                    Ok(Storage::from_complex_vec(out_dtype, out))
                } else {
                    let data = input.to_real_vec()?;
                    Ok(Storage::from_real_vec(out_dtype, par_map(data, |v| op.apply_real(v))))
                }
            }
        }
    }
}

/// Abramowitz & Stegun 7.1.26 rational approximation, accurate to 1.5e-7.
/// The standard library exposes no error function.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let y = 1.0
        - (((((1.061405429 * t - 1.453152027) * t) + 1.421413741) * t - 0.284496736) * t
            + 0.254829592)
            * t
            * (-x * x).exp();
    sign * y
}

// ============================================================================
// Binary operations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Min2,
    Max2,
    Atan2,
    Hypot,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        use BinaryOp::*;
        matches!(self, Eq | Neq | Lt | Le | Gt | Ge | And | Or)
    }

    fn is_bitwise(&self) -> bool {
        use BinaryOp::*;
        matches!(self, Shl | Shr | BitAnd | BitOr | BitXor)
    }

    /// Result dtype for an operand pair.
    pub fn result_dtype(&self, a: DType, b: DType) -> Result<DType> {
        use BinaryOp::*;
        if self.is_comparison() {
            if matches!(self, Eq | Neq) || (!a.is_complex() && !b.is_complex()) {
                return Ok(DType::B8);
            }
            return Err(Error::Type("ordered comparison is not defined for complex operands".into()));
        }
        if self.is_bitwise() {
            if (a.is_integer() || a.is_bool()) && (b.is_integer() || b.is_bool()) {
                return Ok(DType::promote(a, b));
            }
            return Err(Error::Type(format!(
                "bitwise operation requires integer operands, got {a:?} and {b:?}"
            )));
        }
        if matches!(self, Atan2 | Hypot) && (a.is_complex() || b.is_complex()) {
            return Err(Error::Type("atan2/hypot are not defined for complex operands".into()));
        }
        let mut out = DType::promote(a, b);
        // arithmetic never stays boolean
        if out == DType::B8 {
            out = DType::S32;
        }
        // transcendental-style binaries widen integers to float
        if matches!(self, Atan2 | Hypot) && !out.is_floating() {
            out = DType::F32;
        }
        Ok(out)
    }

    fn apply_real(&self, a: f64, b: f64) -> f64 {
        use BinaryOp::*;
        match self {
            Add => a + b,
            Sub => a - b,
            Mul => a * b,
            Div => a / b,
            Rem => a % b,
            Pow => a.powf(b),
            Min2 => a.min(b),
            Max2 => a.max(b),
            Atan2 => a.atan2(b),
            Hypot => a.hypot(b),
            _ => unreachable!("handled in class dispatch"),
        }
    }

    fn apply_int(&self, a: i64, b: i64) -> i64 {
        use BinaryOp::*;
        match self {
            Add => a.wrapping_add(b),
            Sub => a.wrapping_sub(b),
            Mul => a.wrapping_mul(b),
            Div => {
                if b == 0 {
                    0
                } else {
                    a.wrapping_div(b)
                }
            }
            Rem => {
                if b == 0 {
                    0
                } else {
                    a.wrapping_rem(b)
                }
            }
            Pow => {
                if b < 0 {
                    0
                } else {
                    a.wrapping_pow(b.min(u32::MAX as i64) as u32)
                }
            }
            Min2 => a.min(b),
            Max2 => a.max(b),
            Shl => a.wrapping_shl(b as u32),
            Shr => a.wrapping_shr(b as u32),
            BitAnd => a & b,
            BitOr => a | b,
            BitXor => a ^ b,
            _ => unreachable!("handled in class dispatch"),
        }
    }

    fn apply_uint(&self, a: u64, b: u64) -> u64 {
        use BinaryOp::*;
        match self {
            Add => a.wrapping_add(b),
            Sub => a.wrapping_sub(b),
            Mul => a.wrapping_mul(b),
            Div => {
                if b == 0 {
                    0
                } else {
                    a / b
                }
            }
            Rem => {
                if b == 0 {
                    0
                } else {
                    a % b
                }
            }
            Pow => a.wrapping_pow(b.min(u32::MAX as u64) as u32),
            Min2 => a.min(b),
            Max2 => a.max(b),
            Shl => a.wrapping_shl(b as u32),
            Shr => a.wrapping_shr(b as u32),
            BitAnd => a & b,
            BitOr => a | b,
            BitXor => a ^ b,
            _ => unreachable!("handled in class dispatch"),
        }
    }

    fn apply_cplx(&self, a: Complex64, b: Complex64) -> Result<Complex64> {
        use BinaryOp::*;
        Ok(match self {
            Add => a + b,
            Sub => a - b,
            Mul => a * b,
            Div => a / b,
            Pow => a.powc(b),
            other => {
                return Err(Error::Type(format!(
                    "operation {other:?} is not defined for complex operands"
                )))
            }
        })
    }

    /// Apply over two buffers already broadcast to a common length.
    pub fn apply(&self, a: &Storage, b: &Storage) -> Result<Storage> {
        use BinaryOp::*;
        debug_assert_eq!(a.len(), b.len());
        let out_dtype = self.result_dtype(a.dtype(), b.dtype())?;
        match self {
            And => {
                let (ta, tb) = (storage_truthy(a), storage_truthy(b));
                Ok(Storage::B8(par_zip(ta, tb, |x, y| x && y)))
            }
            Or => {
                let (ta, tb) = (storage_truthy(a), storage_truthy(b));
                Ok(Storage::B8(par_zip(ta, tb, |x, y| x || y)))
            }
            Eq | Neq | Lt | Le | Gt | Ge => self.compare(a, b),
            op if op.is_bitwise() => {
                if out_dtype == DType::U64 {
                    let (va, vb) = (u64_vec(a), u64_vec(b));
                    Ok(Storage::from_uint_vec(out_dtype, par_zip(va, vb, |x, y| op.apply_uint(x, y))))
                } else {
                    let (va, vb) = (i64_vec(a), i64_vec(b));
                    Ok(Storage::from_int_vec(out_dtype, par_zip(va, vb, |x, y| op.apply_int(x, y))))
                }
            }
            op => {
                if out_dtype.is_complex() {
                    let (va, vb) = (a.to_complex_vec(), b.to_complex_vec());
                    let mut out = Vec::with_capacity(va.len());
                    for (x, y) in va.into_iter().zip(vb) {
                        out.push(op.apply_cplx(x, y)?);
                    }
                    Ok(Storage::from_complex_vec(out_dtype, out))
                } else if out_dtype.is_floating() {
                    let (va, vb) = (a.to_real_vec()?, b.to_real_vec()?);
                    Ok(Storage::from_real_vec(out_dtype, par_zip(va, vb, |x, y| op.apply_real(x, y))))
                } else if out_dtype == DType::U64 {
                    let (va, vb) = (u64_vec(a), u64_vec(b));
                    Ok(Storage::from_uint_vec(out_dtype, par_zip(va, vb, |x, y| op.apply_uint(x, y))))
                } else {
                    let (va, vb) = (i64_vec(a), i64_vec(b));
                    Ok(Storage::from_int_vec(out_dtype, par_zip(va, vb, |x, y| op.apply_int(x, y))))
                }
            }
        }
    }

    fn compare(&self, a: &Storage, b: &Storage) -> Result<Storage> {
        use BinaryOp::*;
        if a.dtype().is_complex() || b.dtype().is_complex() {
            let (va, vb) = (a.to_complex_vec(), b.to_complex_vec());
            let out = match self {
                Eq => par_zip(va, vb, |x, y| x == y),
                Neq => par_zip(va, vb, |x, y| x != y),
                _ => return Err(Error::Type("ordered comparison is not defined for complex operands".into())),
            };
            return Ok(Storage::B8(out));
        }
        let (va, vb) = (a.to_real_vec()?, b.to_real_vec()?);
        let out = match self {
            Eq => par_zip(va, vb, |x, y| x == y),
            Neq => par_zip(va, vb, |x, y| x != y),
            Lt => par_zip(va, vb, |x, y| x < y),
            Le => par_zip(va, vb, |x, y| x <= y),
            Gt => par_zip(va, vb, |x, y| x > y),
            Ge => par_zip(va, vb, |x, y| x >= y),
            _ => unreachable!(),
        };
        Ok(Storage::B8(out))
    }
}

/// Truthiness of every element: nonzero numbers and `true` booleans.
pub(crate) fn storage_truthy(s: &Storage) -> Vec<bool> {
    match s {
        Storage::B8(d) => d.clone(),
        Storage::C32(_) | Storage::C64(_) => {
            s.to_complex_vec().into_iter().map(|v| v.norm_sqr() != 0.0).collect()
        }
        other => other
            .to_real_vec()
            .expect("real storage")
            .into_iter()
            .map(|v| v != 0.0)
            .collect(),
    }
}

fn i64_vec(s: &Storage) -> Vec<i64> {
    match s.to_kernel() {
        crate::storage::Kernel::Bool(d) => d.into_iter().map(|v| v as i64).collect(),
        crate::storage::Kernel::Int(d) => d,
        crate::storage::Kernel::UInt(d) => d.into_iter().map(|v| v as i64).collect(),
        crate::storage::Kernel::Real(d) => d.into_iter().map(|v| v as i64).collect(),
        crate::storage::Kernel::Cplx(d) => d.into_iter().map(|v| v.re as i64).collect(),
    }
}

fn u64_vec(s: &Storage) -> Vec<u64> {
    match s.to_kernel() {
        crate::storage::Kernel::Bool(d) => d.into_iter().map(|v| v as u64).collect(),
        crate::storage::Kernel::Int(d) => d.into_iter().map(|v| v as u64).collect(),
        crate::storage::Kernel::UInt(d) => d,
        crate::storage::Kernel::Real(d) => d.into_iter().map(|v| v as u64).collect(),
        crate::storage::Kernel::Cplx(d) => d.into_iter().map(|v| v.re as u64).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unary_result_dtypes() {
        assert_eq!(UnaryOp::Sin.result_dtype(DType::S32).unwrap(), DType::F32);
        assert_eq!(UnaryOp::Sin.result_dtype(DType::F64).unwrap(), DType::F64);
        assert_eq!(UnaryOp::Real.result_dtype(DType::C64).unwrap(), DType::F64);
        assert_eq!(UnaryOp::Not.result_dtype(DType::F32).unwrap(), DType::B8);
        assert!(UnaryOp::BitNot.result_dtype(DType::F32).is_err());
    }

    #[test]
    fn binary_result_dtypes() {
        assert_eq!(BinaryOp::Add.result_dtype(DType::U8, DType::F32).unwrap(), DType::F32);
        assert_eq!(BinaryOp::Lt.result_dtype(DType::F64, DType::F64).unwrap(), DType::B8);
        assert_eq!(BinaryOp::Add.result_dtype(DType::B8, DType::B8).unwrap(), DType::S32);
        assert!(BinaryOp::BitAnd.result_dtype(DType::F32, DType::S32).is_err());
        assert!(BinaryOp::Lt.result_dtype(DType::C32, DType::F32).is_err());
    }

    #[test]
    fn unary_apply_real() {
        let s = Storage::F64(vec![0.0, 1.0, 4.0]);
        let r = UnaryOp::Sqrt.apply(&s).unwrap();
        assert_eq!(r, Storage::F64(vec![0.0, 1.0, 2.0]));
    }

    #[test]
    fn binary_apply_promotes() {
        let a = Storage::S32(vec![1, 2, 3]);
        let b = Storage::F64(vec![0.5, 0.5, 0.5]);
        let r = BinaryOp::Add.apply(&a, &b).unwrap();
        assert_eq!(r, Storage::F64(vec![1.5, 2.5, 3.5]));
    }

    #[test]
    fn comparison_yields_bool() {
        let a = Storage::F64(vec![1.0, 2.0]);
        let b = Storage::F64(vec![2.0, 2.0]);
        assert_eq!(BinaryOp::Lt.apply(&a, &b).unwrap(), Storage::B8(vec![true, false]));
    }

    #[test]
    fn erf_reference_values() {
        assert!((erf(0.0)).abs() < 1e-12);
        assert!((erf(1.0) - 0.8427007929).abs() < 1e-6);
        assert!((erf(-1.0) + 0.8427007929).abs() < 1e-6);
    }

    #[test]
    fn integer_division_by_zero_is_zero() {
        let a = Storage::S32(vec![4]);
        let b = Storage::S32(vec![0]);
        assert_eq!(BinaryOp::Div.apply(&a, &b).unwrap(), Storage::S32(vec![0]));
    }
}
