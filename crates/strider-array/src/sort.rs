//! Sorting and set operations

use strider_core::{DType, Error, Result};

use crate::array::Array;
use crate::shape::Shape;
use crate::storage::Storage;

fn check_sortable(arr: &Array) -> Result<()> {
    if arr.dtype().is_complex() {
        return Err(Error::Type("sort is not defined for complex arrays".into()));
    }
    Ok(())
}

fn lane_permutation(data: &[f64], ascending: bool) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..data.len()).collect();
    // stable so equal keys keep their original order
    perm.sort_by(|&a, &b| {
        let ord = data[a].total_cmp(&data[b]);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
    perm
}

impl Array {
    /// Sort each lane along `axis`.
    pub fn sort(&self, axis: usize, ascending: bool) -> Result<Array> {
        Ok(self.sort_index(axis, ascending)?.0)
    }

    /// Sort each lane and return `(values, permutation)`; the permutation
    /// holds the original position of every sorted element.
    pub fn sort_index(&self, axis: usize, ascending: bool) -> Result<(Array, Array)> {
        check_sortable(self)?;
        if axis >= 4 {
            return Err(Error::Arg(format!("axis {axis} out of range")));
        }
        let shape = self.shape();
        let data = self.with_storage(|s| s.to_real_vec())??;
        let n = shape.dim(axis);

        let lane_shape = {
            let mut dims = shape.0;
            dims[axis] = 1;
            Shape(dims)
        };
        let mut perm_global = vec![0usize; shape.elements()];
        let mut indices = vec![0u32; shape.elements()];
        for lane in 0..lane_shape.elements() {
            let mut c = lane_shape.coords_of(lane);
            let lane_idx: Vec<usize> = (0..n)
                .map(|k| {
                    c[axis] = k;
                    shape.index_of(c)
                })
                .collect();
            let lane_vals: Vec<f64> = lane_idx.iter().map(|&i| data[i]).collect();
            let perm = lane_permutation(&lane_vals, ascending);
            for (k, &p) in perm.iter().enumerate() {
                perm_global[lane_idx[k]] = lane_idx[p];
                indices[lane_idx[k]] = p as u32;
            }
        }

        let sorted = self.with_storage(|s| s.gather(shape.elements(), |i| Some(perm_global[i])))?;
        Ok((
            Array::from_storage(sorted, shape)?,
            Array::from_storage(Storage::U32(indices), shape)?,
        ))
    }

    /// Sort keys and carry `values` through the same permutation.
    pub fn sort_by_key(&self, values: &Array, axis: usize, ascending: bool) -> Result<(Array, Array)> {
        if self.shape() != values.shape() {
            return Err(Error::Shape(format!(
                "keys {} and values {} must share a shape",
                self.shape(),
                values.shape()
            )));
        }
        let (sorted_keys, perm) = self.sort_index(axis, ascending)?;
        let shape = self.shape();
        let perm_vals = perm.host_vec::<u32>()?;
        let n = shape.dim(axis);
        let sorted_values = values.with_storage(|s| {
            s.gather(shape.elements(), |i| {
                let mut c = shape.coords_of(i);
                c[axis] = perm_vals[i] as usize % n;
                Some(shape.index_of(c))
            })
        })?;
        Ok((sorted_keys, Array::from_storage(sorted_values, shape)?))
    }
}

/// Distinct elements in ascending order. `is_sorted` promises the input is
/// already sorted and skips the sort pass.
pub fn set_unique(arr: &Array, is_sorted: bool) -> Result<Array> {
    check_sortable(arr)?;
    let mut data = arr.flat()?.host_vec::<f64>()?;
    if !is_sorted {
        data.sort_by(f64::total_cmp);
    }
    data.dedup();
    let len = data.len();
    Array::from_storage(Storage::from_real_vec(arr.dtype(), data), Shape::vector(len))
}

/// Ascending union of the distinct elements of both inputs.
pub fn set_union(a: &Array, b: &Array) -> Result<Array> {
    check_sortable(a)?;
    check_sortable(b)?;
    let dtype = DType::promote(a.dtype(), b.dtype());
    let mut data = a.flat()?.host_vec::<f64>()?;
    data.extend(b.flat()?.host_vec::<f64>()?);
    data.sort_by(f64::total_cmp);
    data.dedup();
    let len = data.len();
    Array::from_storage(Storage::from_real_vec(dtype, data), Shape::vector(len))
}

/// Ascending intersection of the distinct elements of both inputs.
pub fn set_intersect(a: &Array, b: &Array) -> Result<Array> {
    check_sortable(a)?;
    check_sortable(b)?;
    let dtype = DType::promote(a.dtype(), b.dtype());
    let mut va = a.flat()?.host_vec::<f64>()?;
    let mut vb = b.flat()?.host_vec::<f64>()?;
    va.sort_by(f64::total_cmp);
    va.dedup();
    vb.sort_by(f64::total_cmp);
    vb.dedup();
    let keep: Vec<f64> = va
        .into_iter()
        .filter(|v| vb.binary_search_by(|p| p.total_cmp(v)).is_ok())
        .collect();
    if keep.is_empty() {
        return Err(Error::Index("set intersection is empty".into()));
    }
    let len = keep.len();
    Array::from_storage(Storage::from_real_vec(dtype, keep), Shape::vector(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_ascending_descending() {
        let v = Array::from_vector(&[3.0, 1.0, 2.0]).unwrap();
        assert_eq!(
            v.sort(0, true).unwrap().host_vec::<f64>().unwrap(),
            vec![1.0, 2.0, 3.0]
        );
        assert_eq!(
            v.sort(0, false).unwrap().host_vec::<f64>().unwrap(),
            vec![3.0, 2.0, 1.0]
        );
    }

    #[test]
    fn sort_is_idempotent() {
        let v = Array::from_vector(&[5.0, -1.0, 5.0, 0.0]).unwrap();
        let once = v.sort(0, true).unwrap();
        let twice = once.sort(0, true).unwrap();
        assert_eq!(
            once.host_vec::<f64>().unwrap(),
            twice.host_vec::<f64>().unwrap()
        );
    }

    #[test]
    fn sort_index_permutation_reorders_input() {
        let v = Array::from_vector(&[3.0, 1.0, 2.0]).unwrap();
        let (sorted, perm) = v.sort_index(0, true).unwrap();
        let data = v.host_vec::<f64>().unwrap();
        let perm = perm.host_vec::<u32>().unwrap();
        let reordered: Vec<f64> = perm.iter().map(|&p| data[p as usize]).collect();
        assert_eq!(reordered, sorted.host_vec::<f64>().unwrap());
    }

    #[test]
    fn sort_by_key_moves_values_with_keys() {
        let keys = Array::from_vector(&[2.0, 0.0, 1.0]).unwrap();
        let vals = Array::from_vector(&[20.0, 0.0, 10.0]).unwrap();
        let (sk, sv) = keys.sort_by_key(&vals, 0, true).unwrap();
        assert_eq!(sk.host_vec::<f64>().unwrap(), vec![0.0, 1.0, 2.0]);
        assert_eq!(sv.host_vec::<f64>().unwrap(), vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn per_column_sort() {
        let m = Array::from_slice(&[2.0, 1.0, 0.0, 3.0], &[2, 2]).unwrap();
        let s = m.sort(0, true).unwrap();
        assert_eq!(s.host_vec::<f64>().unwrap(), vec![1.0, 2.0, 0.0, 3.0]);
    }

    #[test]
    fn unique_union_intersect() {
        let a = Array::from_vector(&[3.0, 1.0, 3.0, 2.0]).unwrap();
        let u = set_unique(&a, false).unwrap();
        assert_eq!(u.host_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0]);

        let b = Array::from_vector(&[2.0, 4.0]).unwrap();
        let un = set_union(&a, &b).unwrap();
        assert_eq!(un.host_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);

        let ix = set_intersect(&a, &b).unwrap();
        assert_eq!(ix.host_vec::<f64>().unwrap(), vec![2.0]);
    }
}
