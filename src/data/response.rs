//! Dense response matrix (samples × outcomes) for perturbation experiments.

use crate::error::{DatasetError, Result};
use nalgebra::{DMatrix, RowDVector};
use sprs::CsMat;

/// A dense matrix of per-sample responses.
///
/// Rows represent samples, columns represent outcome variables (genes).
/// Values are stored as `f32`, the precision downstream models consume.
#[derive(Debug, Clone)]
pub struct ResponseMatrix {
    /// Dense matrix (samples × outcomes)
    data: DMatrix<f32>,
    /// Outcome identifiers (column names)
    var_names: Vec<String>,
}

impl ResponseMatrix {
    /// Create a new ResponseMatrix from a dense matrix and outcome names.
    pub fn new(data: DMatrix<f32>, var_names: Vec<String>) -> Result<Self> {
        if data.ncols() != var_names.len() {
            return Err(DatasetError::DimensionMismatch {
                expected: data.ncols(),
                actual: var_names.len(),
            });
        }
        Ok(Self { data, var_names })
    }

    /// Densify a sparse matrix (CSR or CSC, samples × outcomes).
    pub fn from_sparse(sparse: &CsMat<f32>, var_names: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = sparse.shape();
        let mut dense = DMatrix::zeros(nrows, ncols);
        let is_csr = sparse.is_csr();
        for (outer, vec) in sparse.outer_iterator().enumerate() {
            for (inner, &val) in vec.iter() {
                let (row, col) = if is_csr { (outer, inner) } else { (inner, outer) };
                dense[(row, col)] = val;
            }
        }
        Self::new(dense, var_names)
    }

    /// Number of samples (rows).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    /// Number of outcomes (columns).
    #[inline]
    pub fn n_outcomes(&self) -> usize {
        self.data.ncols()
    }

    /// Outcome identifiers.
    #[inline]
    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    /// Get the underlying dense matrix.
    #[inline]
    pub fn data(&self) -> &DMatrix<f32> {
        &self.data
    }

    /// Copy out the response row of one sample.
    pub fn row(&self, sample: usize) -> Result<RowDVector<f32>> {
        self.check_row(sample)?;
        Ok(self.data.row(sample).into_owned())
    }

    /// Gather the rows at `samples` into a new matrix, in the given order.
    pub fn gather_rows(&self, samples: &[usize]) -> Result<DMatrix<f32>> {
        for &sample in samples {
            self.check_row(sample)?;
        }
        Ok(self.data.select_rows(samples))
    }

    fn check_row(&self, sample: usize) -> Result<()> {
        if sample >= self.n_samples() {
            return Err(DatasetError::IndexOutOfBounds {
                index: sample,
                len: self.n_samples(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    fn create_test_matrix() -> ResponseMatrix {
        // 3 samples × 2 genes
        let data = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        ResponseMatrix::new(data, vec!["geneA".to_string(), "geneB".to_string()]).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let mat = create_test_matrix();
        assert_eq!(mat.n_samples(), 3);
        assert_eq!(mat.n_outcomes(), 2);
    }

    #[test]
    fn test_names_must_match_columns() {
        let data = DMatrix::zeros(2, 3);
        assert!(ResponseMatrix::new(data, vec!["g".to_string()]).is_err());
    }

    #[test]
    fn test_row_and_gather() {
        let mat = create_test_matrix();
        assert_eq!(mat.row(1).unwrap().as_slice(), &[3.0, 4.0]);

        let gathered = mat.gather_rows(&[2, 0]).unwrap();
        assert_eq!(gathered.nrows(), 2);
        assert_eq!(gathered[(0, 0)], 5.0);
        assert_eq!(gathered[(1, 1)], 2.0);
    }

    #[test]
    fn test_out_of_bounds() {
        let mat = create_test_matrix();
        assert!(matches!(
            mat.row(3),
            Err(DatasetError::IndexOutOfBounds { index: 3, len: 3 })
        ));
        assert!(mat.gather_rows(&[0, 7]).is_err());
    }

    #[test]
    fn test_from_sparse_csr_and_csc() {
        let mut tri_mat = TriMat::new((2, 3));
        tri_mat.add_triplet(0, 2, 7.0f32);
        tri_mat.add_triplet(1, 0, 1.5f32);
        let names: Vec<String> = (0..3).map(|i| format!("gene_{}", i)).collect();

        let from_csr = ResponseMatrix::from_sparse(&tri_mat.to_csr(), names.clone()).unwrap();
        let from_csc = ResponseMatrix::from_sparse(&tri_mat.to_csc(), names).unwrap();
        for mat in [from_csr, from_csc] {
            assert_eq!(mat.data()[(0, 2)], 7.0);
            assert_eq!(mat.data()[(1, 0)], 1.5);
            assert_eq!(mat.data()[(0, 0)], 0.0);
        }
    }
}
