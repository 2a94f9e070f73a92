//! Compressed sparse row matrices of feature values.

use crate::error::{OptimizerError, Result};

/// A `f32` matrix in compressed sparse row layout.
///
/// Row `i` owns the entries `indptr[i]..indptr[i + 1]` of `indices` (column
/// ids, strictly increasing) and `data` (values, never zero).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CsrMatrix {
    n_rows: usize,
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f32>,
}

impl CsrMatrix {
    /// Build from dense rows. All rows must have `n_cols` values.
    pub fn from_dense(rows: &[Vec<f32>], n_cols: usize) -> Result<Self> {
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(OptimizerError::InvalidData(format!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    n_cols
                )));
            }
            for (j, &value) in row.iter().enumerate() {
                if value != 0.0 {
                    indices.push(j);
                    data.push(value);
                }
            }
            indptr.push(indices.len());
        }
        Ok(Self {
            n_rows: rows.len(),
            n_cols,
            indptr,
            indices,
            data,
        })
    }

    /// Build from `(row, col, value)` entries in any order. Duplicate
    /// positions are summed.
    pub fn from_triplets(
        n_rows: usize,
        n_cols: usize,
        triplets: &[(usize, usize, f32)],
    ) -> Result<Self> {
        let mut sorted = triplets.to_vec();
        for &(row, col, _) in &sorted {
            if row >= n_rows || col >= n_cols {
                return Err(OptimizerError::InvalidData(format!(
                    "entry ({}, {}) is outside of a {}x{} matrix",
                    row, col, n_rows, n_cols
                )));
            }
        }
        sorted.sort_by_key(|&(row, col, _)| (row, col));

        let mut merged: Vec<(usize, usize, f32)> = Vec::with_capacity(sorted.len());
        for (row, col, value) in sorted {
            match merged.last_mut() {
                Some(last) if last.0 == row && last.1 == col => last.2 += value,
                _ => merged.push((row, col, value)),
            }
        }

        let mut indptr = vec![0; n_rows + 1];
        let mut indices = Vec::with_capacity(merged.len());
        let mut data = Vec::with_capacity(merged.len());
        for (row, col, value) in merged {
            if value == 0.0 {
                continue;
            }
            indptr[row + 1] += 1;
            indices.push(col);
            data.push(value);
        }
        for i in 0..n_rows {
            indptr[i + 1] += indptr[i];
        }
        Ok(Self {
            n_rows,
            n_cols,
            indptr,
            indices,
            data,
        })
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    /// Number of stored (non-zero) values.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Column ids and values of the non-zero entries of a row.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not a row of the matrix.
    pub fn row(&self, i: usize) -> (&[usize], &[f32]) {
        let range = self.indptr[i]..self.indptr[i + 1];
        (&self.indices[range.clone()], &self.data[range])
    }

    /// The value at `(i, j)`; zero when absent or out of bounds.
    pub fn get(&self, i: usize, j: usize) -> f32 {
        if i >= self.n_rows {
            return 0.0;
        }
        let (cols, values) = self.row(i);
        cols.binary_search(&j).map(|k| values[k]).unwrap_or(0.0)
    }

    /// Sorted ids of the columns with a non-zero value in any of `rows`.
    pub fn active_columns(&self, rows: &[usize]) -> Vec<usize> {
        let mut seen = vec![false; self.n_cols];
        for &i in rows {
            for &j in self.row(i).0 {
                seen[j] = true;
            }
        }
        (0..self.n_cols).filter(|&j| seen[j]).collect()
    }

    /// Row-major dense values of the `rows` x `columns` sub-matrix.
    ///
    /// `columns` must be sorted; entries outside of it are dropped.
    pub fn dense_block(&self, rows: &[usize], columns: &[usize]) -> Vec<f32> {
        let width = columns.len();
        let mut block = vec![0.0; rows.len() * width];
        for (r, &i) in rows.iter().enumerate() {
            let (cols, values) = self.row(i);
            for (j, &value) in cols.iter().zip(values) {
                if let Ok(c) = columns.binary_search(j) {
                    block[r * width + c] = value;
                }
            }
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_dense() {
        let matrix =
            CsrMatrix::from_dense(&[vec![0.0, 1.5, 0.0], vec![2.0, 0.0, 3.0]], 3).unwrap();
        assert_eq!(matrix.shape(), (2, 3));
        assert_eq!(matrix.nnz(), 3);
        assert_eq!(matrix.row(1), (&[0usize, 2][..], &[2.0f32, 3.0][..]));
        assert_eq!(matrix.get(0, 1), 1.5);
        assert_eq!(matrix.get(0, 0), 0.0);
        assert_eq!(matrix.get(5, 0), 0.0);
    }

    #[test]
    fn test_from_dense_rejects_ragged_rows() {
        let result = CsrMatrix::from_dense(&[vec![1.0, 2.0], vec![1.0]], 2);
        assert!(matches!(result, Err(OptimizerError::InvalidData(_))));
    }

    #[test]
    fn test_from_triplets_sums_duplicates() {
        let matrix =
            CsrMatrix::from_triplets(3, 2, &[(2, 1, 1.0), (0, 0, 4.0), (2, 1, 2.0), (1, 0, 0.0)])
                .unwrap();
        assert_eq!(matrix.nnz(), 2);
        assert_eq!(matrix.get(2, 1), 3.0);
        assert_eq!(matrix.dense_block(&[0, 1, 2], &[0, 1]), vec![4.0, 0.0, 0.0, 0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_sub_matrix_of_active_columns() {
        let matrix = CsrMatrix::from_triplets(
            4,
            5,
            &[(0, 4, 1.0), (1, 1, 2.0), (2, 3, 3.0), (3, 1, 4.0), (3, 4, 5.0)],
        )
        .unwrap();
        assert_eq!(matrix.active_columns(&[1, 3]), vec![1, 4]);
        assert_eq!(matrix.active_columns(&[]), Vec::<usize>::new());
        // row 2 only has column 3, which is not selected
        assert_eq!(matrix.dense_block(&[3, 2], &[1, 4]), vec![4.0, 5.0, 0.0, 0.0]);
    }

    #[test]
    fn test_from_triplets_out_of_bounds() {
        assert!(CsrMatrix::from_triplets(2, 2, &[(2, 0, 1.0)]).is_err());
    }

    proptest! {
        #[test]
        fn test_dense_layout_is_preserved(
            rows in prop::collection::vec(prop::collection::vec(prop_oneof![Just(0.0f32), -5.0f32..5.0], 4), 0..12)
        ) {
            let matrix = CsrMatrix::from_dense(&rows, 4).unwrap();
            let all: Vec<usize> = (0..rows.len()).collect();
            let flat: Vec<f32> = rows.iter().flatten().copied().collect();
            prop_assert_eq!(matrix.dense_block(&all, &[0, 1, 2, 3]), flat);
            let nonzero = rows.iter().flatten().filter(|v| **v != 0.0).count();
            prop_assert_eq!(matrix.nnz(), nonzero);
        }
    }
}
