//! Bidirectional flat/tensor index arithmetic for fixed per-axis extents.
//!
//! Flat indices are row-major: the last axis varies fastest, so that
//! `flat = sum_k i_k * w_k` with `w_k = prod_{j>k} n_j`.

use iga_core::{IgaError, Result};

/// A multi-index with one entry per axis.
pub type TensorIndex<const DIM: usize> = [usize; DIM];

/// Per-axis extents of a tensor-product container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorSize<const DIM: usize>(pub [usize; DIM]);

impl<const DIM: usize> TensorSize<DIM> {
    pub fn new(extents: [usize; DIM]) -> Self {
        Self(extents)
    }

    /// The same extent along every axis.
    pub fn splat(n: usize) -> Self {
        Self([n; DIM])
    }

    /// Number of entries, i.e. the product of the extents.
    pub fn flat_size(&self) -> usize {
        self.0.iter().product()
    }

    pub fn extent(&self, axis: usize) -> usize {
        self.0[axis]
    }

    pub fn as_array(&self) -> [usize; DIM] {
        self.0
    }
}

impl<const DIM: usize> std::ops::Index<usize> for TensorSize<DIM> {
    type Output = usize;

    fn index(&self, axis: usize) -> &usize {
        &self.0[axis]
    }
}

/// Row-major weights `w_k = prod_{j>k} n_j` for the given extents.
pub fn compute_weight<const DIM: usize>(size: &TensorSize<DIM>) -> [usize; DIM] {
    let mut weight = [1; DIM];
    for k in (0..DIM.saturating_sub(1)).rev() {
        weight[k] = weight[k + 1] * size.0[k + 1];
    }
    weight
}

/// Extents-aware flat/tensor index converter.
///
/// The weights are cached and recomputed only by [`reset_size`](Self::reset_size).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSizedContainer<const DIM: usize> {
    size: TensorSize<DIM>,
    weight: [usize; DIM],
}

impl<const DIM: usize> TensorSizedContainer<DIM> {
    pub fn new(size: TensorSize<DIM>) -> Self {
        Self {
            size,
            weight: compute_weight(&size),
        }
    }

    pub fn tensor_size(&self) -> TensorSize<DIM> {
        self.size
    }

    pub fn flat_size(&self) -> usize {
        self.size.flat_size()
    }

    pub fn weight(&self) -> [usize; DIM] {
        self.weight
    }

    /// Replace the extents and recompute the weights.
    pub fn reset_size(&mut self, size: TensorSize<DIM>) {
        self.size = size;
        self.weight = compute_weight(&size);
    }

    /// Flat index of `index`, failing if any component is outside its extent.
    pub fn tensor_to_flat(&self, index: &TensorIndex<DIM>) -> Result<usize> {
        let mut flat = 0;
        for k in 0..DIM {
            if index[k] >= self.size.0[k] {
                return Err(IgaError::out_of_range("tensor index component", index[k], self.size.0[k]));
            }
            flat += index[k] * self.weight[k];
        }
        Ok(flat)
    }

    /// Tensor index of `flat`, failing if `flat >= flat_size()`.
    pub fn flat_to_tensor(&self, flat: usize) -> Result<TensorIndex<DIM>> {
        let total = self.flat_size();
        if flat >= total {
            return Err(IgaError::out_of_range("flat index", flat, total));
        }
        let mut index = [0; DIM];
        let mut rest = flat;
        for k in 0..DIM {
            index[k] = rest / self.weight[k];
            rest %= self.weight[k];
        }
        Ok(index)
    }

    /// All tensor indices in flat order.
    pub fn indices(&self) -> TensorIndices<DIM> {
        TensorIndices::new(self.size)
    }
}

/// Iterator over the tensor indices of a [`TensorSize`], in flat order.
#[derive(Debug, Clone)]
pub struct TensorIndices<const DIM: usize> {
    size: TensorSize<DIM>,
    current: Option<[usize; DIM]>,
}

impl<const DIM: usize> TensorIndices<DIM> {
    pub fn new(size: TensorSize<DIM>) -> Self {
        let current = if size.flat_size() == 0 { None } else { Some([0; DIM]) };
        Self { size, current }
    }
}

impl<const DIM: usize> Iterator for TensorIndices<DIM> {
    type Item = [usize; DIM];

    fn next(&mut self) -> Option<[usize; DIM]> {
        let item = self.current?;
        let mut next = item;
        let mut axis = DIM;
        loop {
            if axis == 0 {
                self.current = None;
                break;
            }
            axis -= 1;
            next[axis] += 1;
            if next[axis] < self.size.0[axis] {
                self.current = Some(next);
                break;
            }
            next[axis] = 0;
        }
        Some(item)
    }
}

/// Dense multi-dimensional array stored in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicMultiArray<T, const DIM: usize> {
    layout: TensorSizedContainer<DIM>,
    data: Vec<T>,
}

impl<T: Clone, const DIM: usize> DynamicMultiArray<T, DIM> {
    pub fn filled(size: TensorSize<DIM>, value: T) -> Self {
        Self {
            layout: TensorSizedContainer::new(size),
            data: vec![value; size.flat_size()],
        }
    }
}

impl<T, const DIM: usize> DynamicMultiArray<T, DIM> {
    /// Wrap flat row-major data; the length must match the extents.
    pub fn from_vec(size: TensorSize<DIM>, data: Vec<T>) -> Result<Self> {
        if data.len() != size.flat_size() {
            return Err(IgaError::mismatch("multi-array data", size.flat_size(), data.len()));
        }
        Ok(Self {
            layout: TensorSizedContainer::new(size),
            data,
        })
    }

    pub fn tensor_size(&self) -> TensorSize<DIM> {
        self.layout.tensor_size()
    }

    pub fn layout(&self) -> &TensorSizedContainer<DIM> {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, index: &TensorIndex<DIM>) -> Result<&T> {
        let flat = self.layout.tensor_to_flat(index)?;
        Ok(&self.data[flat])
    }

    pub fn get_mut(&mut self, index: &TensorIndex<DIM>) -> Result<&mut T> {
        let flat = self.layout.tensor_to_flat(index)?;
        Ok(&mut self.data[flat])
    }
}

impl<T, const DIM: usize> std::ops::Index<usize> for DynamicMultiArray<T, DIM> {
    type Output = T;

    fn index(&self, flat: usize) -> &T {
        &self.data[flat]
    }
}

impl<T, const DIM: usize> std::ops::IndexMut<usize> for DynamicMultiArray<T, DIM> {
    fn index_mut(&mut self, flat: usize) -> &mut T {
        &mut self.data[flat]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_weights_last_axis_fastest() {
        let c = TensorSizedContainer::new(TensorSize([2, 3, 4]));
        assert_eq!(c.weight(), [12, 4, 1]);
        assert_eq!(c.tensor_to_flat(&[1, 2, 3]).unwrap(), 23);
        assert_eq!(c.flat_to_tensor(5).unwrap(), [0, 1, 1]);
    }

    #[test]
    fn test_out_of_range() {
        let c = TensorSizedContainer::new(TensorSize([2, 3]));
        assert!(matches!(
            c.tensor_to_flat(&[0, 3]),
            Err(IgaError::IndexOutOfRange { index: 3, bound: 3, .. })
        ));
        assert!(matches!(
            c.flat_to_tensor(6),
            Err(IgaError::IndexOutOfRange { index: 6, bound: 6, .. })
        ));
    }

    #[test]
    fn test_reset_size_recomputes_weights() {
        let mut c = TensorSizedContainer::new(TensorSize([2, 2]));
        c.reset_size(TensorSize([3, 5]));
        assert_eq!(c.weight(), [5, 1]);
        assert_eq!(c.flat_size(), 15);
    }

    #[test]
    fn test_exhaustive_bijection_small_extents() {
        for n0 in 1..=5 {
            for n1 in 1..=5 {
                for n2 in 1..=5 {
                    let c = TensorSizedContainer::new(TensorSize([n0, n1, n2]));
                    for (flat, idx) in c.indices().enumerate() {
                        assert_eq!(c.tensor_to_flat(&idx).unwrap(), flat);
                        assert_eq!(c.flat_to_tensor(flat).unwrap(), idx);
                    }
                    assert_eq!(c.indices().count(), n0 * n1 * n2);
                }
            }
        }
    }

    #[test]
    fn test_indices_empty_extent() {
        let c = TensorSizedContainer::new(TensorSize([3, 0]));
        assert_eq!(c.indices().count(), 0);
    }

    #[test]
    fn test_multi_array_access() {
        let mut a = DynamicMultiArray::filled(TensorSize([2, 3]), 0.0);
        *a.get_mut(&[1, 2]).unwrap() = 4.0;
        assert_eq!(a[5], 4.0);
        assert!(a.get(&[2, 0]).is_err());
        assert!(DynamicMultiArray::from_vec(TensorSize([2, 2]), vec![1.0; 3]).is_err());
    }

    proptest! {
        #[test]
        fn prop_flat_tensor_roundtrip(
            n0 in 1usize..7,
            n1 in 1usize..7,
            n2 in 1usize..7,
            n3 in 1usize..7,
            seed in 0usize..10_000,
        ) {
            let c = TensorSizedContainer::new(TensorSize([n0, n1, n2, n3]));
            let flat = seed % c.flat_size();
            let idx = c.flat_to_tensor(flat).unwrap();
            prop_assert_eq!(c.tensor_to_flat(&idx).unwrap(), flat);
        }
    }
}
