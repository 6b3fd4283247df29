//! Public elementwise surface
//!
//! Named methods rather than operator overloads: every operation can fail
//! (shape or dtype mismatch), and failures travel as results through the
//! whole engine. In-place variants write back into the receiver's buffer
//! after casting to its dtype, leaving it untouched on error.

use num_complex::Complex64;
use strider_core::{DType, Error, Result};

use crate::array::Array;
use crate::ops::{BinaryOp, UnaryOp};

macro_rules! unary_method {
    ($(#[$meta:meta])* $name:ident, $op:ident) => {
        $(#[$meta])*
        pub fn $name(&self) -> Result<Array> {
            self.unary_node(UnaryOp::$op)
        }
    };
}

macro_rules! binary_method {
    ($(#[$meta:meta])* $name:ident, $op:ident) => {
        $(#[$meta])*
        pub fn $name(&self, other: &Array) -> Result<Array> {
            self.binary_node(other, BinaryOp::$op)
        }
    };
}

macro_rules! inplace_method {
    ($name:ident, $op:ident) => {
        /// In-place variant; the receiver keeps its dtype.
        pub fn $name(&self, other: &Array) -> Result<()> {
            let result = self.binary_node(other, BinaryOp::$op)?;
            if result.shape() != self.shape() {
                return Err(Error::Shape(format!(
                    "in-place operand broadcasts {} to {}, which cannot write back",
                    self.shape(),
                    result.shape()
                )));
            }
            let storage = result.cast(self.dtype())?.with_storage(|s| s.clone())?;
            self.replace_storage(storage)
        }
    };
}

impl Array {
    // ------------------------------------------------------------------
    // arithmetic
    // ------------------------------------------------------------------

    binary_method!(add, Add);
    binary_method!(sub, Sub);
    binary_method!(mul, Mul);
    binary_method!(div, Div);
    binary_method!(rem, Rem);
    binary_method!(pow, Pow);
    binary_method!(
        /// Elementwise minimum of two operands.
        minof, Min2);
    binary_method!(
        /// Elementwise maximum of two operands.
        maxof, Max2);
    binary_method!(atan2, Atan2);
    binary_method!(hypot, Hypot);
    binary_method!(shift_left, Shl);
    binary_method!(shift_right, Shr);
    binary_method!(bitand, BitAnd);
    binary_method!(bitor, BitOr);
    binary_method!(bitxor, BitXor);

    inplace_method!(add_inplace, Add);
    inplace_method!(sub_inplace, Sub);
    inplace_method!(mul_inplace, Mul);
    inplace_method!(div_inplace, Div);
    inplace_method!(rem_inplace, Rem);
    inplace_method!(pow_inplace, Pow);

    // ------------------------------------------------------------------
    // comparison and logic
    // ------------------------------------------------------------------

    binary_method!(eq, Eq);
    binary_method!(neq, Neq);
    binary_method!(lt, Lt);
    binary_method!(le, Le);
    binary_method!(gt, Gt);
    binary_method!(ge, Ge);
    binary_method!(and, And);
    binary_method!(or, Or);
    unary_method!(not, Not);
    unary_method!(bitnot, BitNot);

    // ------------------------------------------------------------------
    // unary math
    // ------------------------------------------------------------------

    unary_method!(neg, Neg);
    unary_method!(abs, Abs);
    unary_method!(sign, Sign);
    unary_method!(round, Round);
    unary_method!(trunc, Trunc);
    unary_method!(floor, Floor);
    unary_method!(ceil, Ceil);
    unary_method!(sqrt, Sqrt);
    unary_method!(cbrt, Cbrt);
    unary_method!(rsqrt, Rsqrt);
    unary_method!(exp, Exp);
    unary_method!(expm1, Expm1);
    unary_method!(log, Log);
    unary_method!(log1p, Log1p);
    unary_method!(log2, Log2);
    unary_method!(log10, Log10);
    unary_method!(sin, Sin);
    unary_method!(cos, Cos);
    unary_method!(tan, Tan);
    unary_method!(asin, Asin);
    unary_method!(acos, Acos);
    unary_method!(atan, Atan);
    unary_method!(sinh, Sinh);
    unary_method!(cosh, Cosh);
    unary_method!(tanh, Tanh);
    unary_method!(asinh, Asinh);
    unary_method!(acosh, Acosh);
    unary_method!(atanh, Atanh);
    unary_method!(erf, Erf);
    unary_method!(erfc, Erfc);
    unary_method!(sigmoid, Sigmoid);

    // ------------------------------------------------------------------
    // complex accessors
    // ------------------------------------------------------------------

    unary_method!(
        /// Real part; identity on real arrays.
        real, Real);
    unary_method!(
        /// Imaginary part; zeros on real arrays.
        imag, Imag);
    unary_method!(conj, Conj);
    unary_method!(
        /// Phase angle in radians.
        arg, Arg);

    // ------------------------------------------------------------------
    // scalar conveniences
    // ------------------------------------------------------------------

    pub fn add_scalar(&self, v: f64) -> Result<Array> {
        self.add(&self.scalar_like(v)?)
    }

    pub fn sub_scalar(&self, v: f64) -> Result<Array> {
        self.sub(&self.scalar_like(v)?)
    }

    pub fn mul_scalar(&self, v: f64) -> Result<Array> {
        self.mul(&self.scalar_like(v)?)
    }

    pub fn div_scalar(&self, v: f64) -> Result<Array> {
        self.div(&self.scalar_like(v)?)
    }

    pub fn pow_scalar(&self, v: f64) -> Result<Array> {
        // integer receivers raise in the float domain
        if self.dtype().is_floating() || self.dtype().is_complex() {
            self.pow(&self.scalar_like(v)?)
        } else {
            self.cast(DType::F64)?.pow(&Array::constant(v, &[1], DType::F64)?)
        }
    }

    /// Clamp into `[lo, hi]`; with either bound absent this degrades to a
    /// plain minimum/maximum.
    pub fn clamp(&self, lo: Option<&Array>, hi: Option<&Array>) -> Result<Array> {
        match (lo, hi) {
            (Some(lo), Some(hi)) => self.maxof(lo)?.minof(hi),
            (Some(lo), None) => self.maxof(lo),
            (None, Some(hi)) => self.minof(hi),
            (None, None) => Ok(self.clone()),
        }
    }
}

/// Masked blend: wherever `cond` holds take `x`, otherwise `y`. All three
/// operands broadcast to a common shape and `x`/`y` promote to a common
/// dtype.
pub fn where_(cond: &Array, x: &Array, y: &Array) -> Result<Array> {
    Array::select_node(cond, x, y)
}

/// Build a complex array from real and imaginary parts.
pub fn cplx2(re: &Array, im: &Array) -> Result<Array> {
    let shape = re.shape().broadcast(&im.shape())?;
    if re.dtype().is_complex() || im.dtype().is_complex() {
        return Err(Error::Type("cplx2 expects real-valued parts".into()));
    }
    let out_dtype = DType::promote(re.dtype(), im.dtype()).to_complex();
    let rr = re.host_vec::<f64>()?;
    let ii = im.host_vec::<f64>()?;
    let re_shape = re.shape();
    let im_shape = im.shape();
    let data: Vec<Complex64> = (0..shape.elements())
        .map(|i| {
            let c = shape.coords_of(i);
            Complex64::new(rr[re_shape.broadcast_index(c)], ii[im_shape.broadcast_index(c)])
        })
        .collect();
    Array::from_storage(
        crate::storage::Storage::from_complex_vec(out_dtype, data),
        shape,
    )
}
