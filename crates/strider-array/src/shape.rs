//! Shapes and broadcasting
//!
//! Arrays are dense rectangular tensors with up to four dimensions laid out
//! column-major-leading: `dims[0]` is the fastest-varying axis. Axes beyond
//! the effective rank carry dimension 1.

use strider_core::{Error, Result};

/// Shape of an array: four dimensions, each at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape(pub [usize; 4]);

impl Shape {
    /// Build a shape, padding missing axes with 1.
    pub fn new(dims: &[usize]) -> Result<Shape> {
        if dims.len() > 4 {
            return Err(Error::Shape(format!(
                "arrays support at most 4 dimensions, got {}",
                dims.len()
            )));
        }
        let mut out = [1usize; 4];
        for (slot, &d) in out.iter_mut().zip(dims) {
            if d == 0 {
                return Err(Error::Shape("zero-length dimensions are not allowed".into()));
            }
            *slot = d;
        }
        Ok(Shape(out))
    }

    /// Shape of a column vector.
    pub fn vector(n: usize) -> Shape {
        Shape([n.max(1), 1, 1, 1])
    }

    /// Shape of a matrix.
    pub fn matrix(rows: usize, cols: usize) -> Shape {
        Shape([rows.max(1), cols.max(1), 1, 1])
    }

    pub fn scalar() -> Shape {
        Shape([1, 1, 1, 1])
    }

    /// Number of effective dimensions: position of the last non-1 axis + 1,
    /// and at least 1.
    pub fn ndims(&self) -> usize {
        for axis in (0..4).rev() {
            if self.0[axis] > 1 {
                return axis + 1;
            }
        }
        1
    }

    /// Logical element count.
    pub fn elements(&self) -> usize {
        self.0.iter().product()
    }

    pub fn dim(&self, axis: usize) -> usize {
        self.0[axis]
    }

    /// Per-axis strides in elements for the dense column-major-leading
    /// layout.
    pub fn strides(&self) -> [usize; 4] {
        let d = self.0;
        [1, d[0], d[0] * d[1], d[0] * d[1] * d[2]]
    }

    /// Linear index of a coordinate tuple.
    #[inline]
    pub fn index_of(&self, coords: [usize; 4]) -> usize {
        let s = self.strides();
        coords[0] * s[0] + coords[1] * s[1] + coords[2] * s[2] + coords[3] * s[3]
    }

    /// Coordinate tuple of a linear index.
    #[inline]
    pub fn coords_of(&self, mut idx: usize) -> [usize; 4] {
        let d = self.0;
        let c0 = idx % d[0];
        idx /= d[0];
        let c1 = idx % d[1];
        idx /= d[1];
        let c2 = idx % d[2];
        idx /= d[2];
        [c0, c1, c2, idx]
    }

    /// Resolve the output shape of a binary operation. Pairwise dims must be
    /// equal or one of them 1; anything else is a shape error.
    pub fn broadcast(&self, other: &Shape) -> Result<Shape> {
        let mut out = [1usize; 4];
        for axis in 0..4 {
            let (a, b) = (self.0[axis], other.0[axis]);
            out[axis] = if a == b {
                a
            } else if a == 1 {
                b
            } else if b == 1 {
                a
            } else {
                return Err(Error::Shape(format!(
                    "cannot broadcast {:?} with {:?} (axis {axis}: {a} vs {b})",
                    self.0, other.0
                )));
            };
        }
        Ok(Shape(out))
    }

    /// Linear index into an operand of this shape for a coordinate in the
    /// broadcast output; singleton axes pin to 0.
    #[inline]
    pub fn broadcast_index(&self, coords: [usize; 4]) -> usize {
        let s = self.strides();
        let d = self.0;
        let mut idx = 0usize;
        for axis in 0..4 {
            let c = if d[axis] == 1 { 0 } else { coords[axis] };
            idx += c * s[axis];
        }
        idx
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {} {} {}]", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndims_tracks_last_non_unit_axis() {
        assert_eq!(Shape::new(&[5]).unwrap().ndims(), 1);
        assert_eq!(Shape::new(&[5, 1, 3]).unwrap().ndims(), 3);
        assert_eq!(Shape::new(&[1, 1, 1, 2]).unwrap().ndims(), 4);
        assert_eq!(Shape::scalar().ndims(), 1);
    }

    #[test]
    fn zero_dims_rejected() {
        assert!(Shape::new(&[0]).is_err());
        assert!(Shape::new(&[2, 0, 1]).is_err());
        assert!(Shape::new(&[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn index_round_trip() {
        let s = Shape::new(&[3, 4, 2]).unwrap();
        for i in 0..s.elements() {
            assert_eq!(s.index_of(s.coords_of(i)), i);
        }
    }

    #[test]
    fn broadcast_rules() {
        let a = Shape::new(&[3, 1]).unwrap();
        let b = Shape::new(&[1, 4]).unwrap();
        assert_eq!(a.broadcast(&b).unwrap(), Shape::new(&[3, 4]).unwrap());
        let c = Shape::new(&[2, 4]).unwrap();
        assert!(a.broadcast(&c).is_err());
        let d = Shape::new(&[3, 4]).unwrap();
        assert_eq!(d.broadcast(&b).unwrap(), d);
        let e = Shape::new(&[3, 3]).unwrap();
        assert!(e.broadcast(&Shape::new(&[3, 5]).unwrap()).is_err());
    }

    #[test]
    fn broadcast_index_pins_singletons() {
        let s = Shape::new(&[1, 4]).unwrap();
        assert_eq!(s.broadcast_index([2, 3, 0, 0]), 3);
    }
}
