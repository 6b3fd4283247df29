//! Element type system
//!
//! Thirteen element types cover the boolean, integer, floating and complex
//! families. Binary kernels resolve mixed operand types through a single
//! promotion lattice so behavior cannot drift between call sites, and the
//! capability-downgrade policy lives here as well: when the active device
//! lacks a precision the requested type is substituted by the closest
//! supported one and a warning is emitted.

use crate::backend::manager;
use serde::{Deserialize, Serialize};

/// Element type of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// 8-bit boolean
    B8,
    /// unsigned 8-bit integer
    U8,
    /// signed 16-bit integer
    S16,
    /// unsigned 16-bit integer
    U16,
    /// 16-bit float (stored widened on devices without native support)
    F16,
    /// 32-bit float
    F32,
    /// signed 32-bit integer
    S32,
    /// unsigned 32-bit integer
    U32,
    /// signed 64-bit integer
    S64,
    /// unsigned 64-bit integer
    U64,
    /// 64-bit float
    F64,
    /// single-precision complex
    C32,
    /// double-precision complex
    C64,
}

impl DType {
    /// Item size in bytes.
    pub fn item_size(&self) -> usize {
        match self {
            DType::B8 | DType::U8 => 1,
            DType::S16 | DType::U16 | DType::F16 => 2,
            DType::F32 | DType::S32 | DType::U32 => 4,
            DType::S64 | DType::U64 | DType::F64 | DType::C32 => 8,
            DType::C64 => 16,
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DType::F16 | DType::F32 | DType::F64)
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, DType::C32 | DType::C64)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DType::U8 | DType::S16 | DType::U16 | DType::S32 | DType::U32 | DType::S64 | DType::U64
        )
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, DType::B8)
    }

    /// The real dtype carrying this type's magnitude: identity for real
    /// types, `f32`/`f64` for `c32`/`c64`.
    pub fn to_real(&self) -> DType {
        match self {
            DType::C32 => DType::F32,
            DType::C64 => DType::F64,
            other => *other,
        }
    }

    /// The complex dtype of matching precision.
    pub fn to_complex(&self) -> DType {
        match self {
            DType::F64 | DType::S64 | DType::U64 | DType::C64 => DType::C64,
            _ => DType::C32,
        }
    }

    fn family_rank(&self) -> u8 {
        match self {
            DType::B8 => 0,
            DType::U8 => 1,
            DType::S16 => 2,
            DType::U16 => 3,
            DType::S32 => 4,
            DType::U32 => 5,
            DType::S64 => 6,
            DType::U64 => 7,
            DType::F16 => 8,
            DType::F32 => 9,
            DType::F64 => 10,
            DType::C32 => 11,
            DType::C64 => 12,
        }
    }

    /// Resolve the result type of a binary operation over mixed operands.
    ///
    /// Complex dominates float dominates integer dominates bool; within a
    /// family the wider type wins, and a `c32` paired with an `f64` widens to
    /// `c64` so no magnitude is lost.
    pub fn promote(a: DType, b: DType) -> DType {
        if a == b {
            return a;
        }
        if a.is_complex() || b.is_complex() {
            let wide = a == DType::F64 || b == DType::F64 || a == DType::C64 || b == DType::C64;
            return if wide { DType::C64 } else { DType::C32 };
        }
        if a.is_floating() || b.is_floating() {
            let fa = if a.is_floating() { a } else { DType::F32 };
            let fb = if b.is_floating() { b } else { DType::F32 };
            return if fa.family_rank() >= fb.family_rank() { fa } else { fb };
        }
        if a.family_rank() >= b.family_rank() {
            a
        } else {
            b
        }
    }

    /// Apply the device capability policy: downgrade to the nearest supported
    /// precision and warn when a substitution happens. Every construction and
    /// upload site delegates here.
    pub fn supported(self) -> DType {
        let dev = manager().device();
        match self {
            DType::F64 if !dev.has_f64 => {
                log::warn!("device '{}' lacks f64 support, promoting to f32", dev.name);
                DType::F32
            }
            DType::C64 if !dev.has_f64 => {
                log::warn!("device '{}' lacks c64 support, promoting to c32", dev.name);
                DType::C32
            }
            DType::F16 if !dev.has_f16 => {
                log::warn!("device '{}' lacks f16 support, promoting to f32", dev.name);
                DType::F32
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_sizes() {
        assert_eq!(DType::B8.item_size(), 1);
        assert_eq!(DType::F16.item_size(), 2);
        assert_eq!(DType::C32.item_size(), 8);
        assert_eq!(DType::C64.item_size(), 16);
    }

    #[test]
    fn promotion_within_family() {
        assert_eq!(DType::promote(DType::U8, DType::S32), DType::S32);
        assert_eq!(DType::promote(DType::F32, DType::F64), DType::F64);
        assert_eq!(DType::promote(DType::S64, DType::U64), DType::U64);
    }

    #[test]
    fn promotion_across_families() {
        assert_eq!(DType::promote(DType::S32, DType::F32), DType::F32);
        assert_eq!(DType::promote(DType::B8, DType::U8), DType::U8);
        assert_eq!(DType::promote(DType::F64, DType::C32), DType::C64);
        assert_eq!(DType::promote(DType::U32, DType::C32), DType::C32);
    }

    #[test]
    fn device_policy_downgrades_f16() {
        let _ = env_logger::try_init();
        // the CPU device has no native half kernels, so f16 widens (with a
        // warning through the log sink); supported precisions pass through
        assert_eq!(DType::F16.supported(), DType::F32);
        assert_eq!(DType::F64.supported(), DType::F64);
        assert_eq!(DType::C64.supported(), DType::C64);
    }

    #[test]
    fn real_complex_mapping() {
        assert_eq!(DType::C64.to_real(), DType::F64);
        assert_eq!(DType::F32.to_complex(), DType::C32);
        assert_eq!(DType::S64.to_complex(), DType::C64);
    }
}
