//! Small helpers shared by the evaluation stages.
use crate::Real;
use itertools::izip;
use nalgebra::{Point3, Vector3};

/// Running sum of `counts`, starting at `x0`.
///
/// The returned sequence has the same length as `counts`, so CSR offsets are obtained by
/// chaining a trailing zero onto the counts.
pub fn prefix_sum(counts: impl IntoIterator<Item = usize>, x0: usize) -> impl Iterator<Item = usize> {
    counts.into_iter().scan(x0, |sum, x| {
        let current = *sum;
        *sum += x;
        Some(current)
    })
}

/// Gathers `values[indices[i]]` into `result[i]`.
///
/// # Panics
/// Panics if `result` and `indices` have different lengths, or if an index is out of bounds.
pub fn gather<T: Copy>(values: &[T], indices: &[usize], result: &mut [T]) {
    assert_eq!(indices.len(), result.len(), "gather target must match index count");
    for (r, &i) in izip!(result, indices) {
        *r = values[i];
    }
}

/// Accumulates `weights[i] * values[i]` into `target[indices[i]]`.
///
/// # Panics
/// Panics if the index, weight and value slices differ in length.
pub fn scatter_add_weighted<T: Real>(target: &mut [T], indices: &[usize], weights: &[T], values: &[T]) {
    assert_eq!(indices.len(), weights.len());
    assert_eq!(indices.len(), values.len());
    for (&i, &w, &v) in izip!(indices, weights, values) {
        target[i] += w * v;
    }
}

/// Index of the vertical axis, i.e. the axis gravity acts along: y in 2D, z in 3D.
pub fn vertical_axis(dim: usize) -> usize {
    assert!(dim == 2 || dim == 3, "only 2D and 3D meshes are supported");
    dim - 1
}

/// Elevation of a point, i.e. its coordinate along the vertical axis.
pub fn elevation<T: Real>(point: &Point3<T>, dim: usize) -> T {
    point[vertical_axis(dim)]
}

/// Unit vector along the vertical axis.
pub fn vertical_unit_vector<T: Real>(dim: usize) -> Vector3<T> {
    let mut e = Vector3::zeros();
    e[vertical_axis(dim)] = T::one();
    e
}
