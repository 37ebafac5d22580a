//! The group-to-group contact matrix.
//!
//! Entry `(i, j)` is the share of the contacts of an agent in group `i` that are made with agents
//! of group `j`, so every row is a probability vector. The matrix is stored flattened in
//! **column-major** order: entry `(i, j)` of an `n x n` matrix lives at index `j * n + i`.

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Accepted deviation of a row sum from one.
pub const ROW_SUM_TOLERANCE: f64 = 0.001;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactMatrix {
    values: Vec<f64>,
}

impl ContactMatrix {
    /// Wraps a flattened, column-major matrix. No checks are made until [`ContactMatrix::validate`].
    pub fn from_column_major(values: Vec<f64>) -> Self {
        ContactMatrix { values }
    }

    /// Builds the flattened form from a list of rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let n = rows.len();
        let mut values = vec![0.0; n * n];
        for (i, row) in rows.iter().enumerate() {
            for (j, &value) in row.iter().enumerate().take(n) {
                values[j * n + i] = value;
            }
        }
        // Ragged input is padded with zeros; the row sums will then fail validation.
        ContactMatrix { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Number of groups, if the flattened length is a perfect square.
    pub fn dim(&self) -> Option<usize> {
        let n = self.values.len().isqrt();
        (n * n == self.values.len()).then_some(n)
    }

    /// Entry `(row, col)` of an `n x n` matrix.
    #[inline]
    pub fn get(&self, row: usize, col: usize, n: usize) -> f64 {
        self.values[col * n + row]
    }

    /// Checks the matrix against the current number of groups.
    ///
    /// The matrix must be `n_groups x n_groups`, all entries must be non-negative, and every row
    /// must sum to one within [`ROW_SUM_TOLERANCE`]. Rows are never renormalised.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError::ConfigError`] naming the offending size, entry or row.
    pub fn validate(&self, n_groups: usize) -> Result<(), SimError> {
        let expected = n_groups * n_groups;
        if self.values.len() != expected {
            return Err(SimError::config(format!(
                "the contact matrix must be a square matrix of size n_groups x n_groups: {} != {expected} ({n_groups} groups)",
                self.values.len()
            )));
        }

        for row in 0..n_groups {
            let mut sum = 0.0;
            for col in 0..n_groups {
                let value = self.get(row, col, n_groups);
                if !value.is_finite() || value < 0.0 {
                    return Err(SimError::config(format!(
                        "the contact matrix must be non-negative: entry ({row}, {col}) is {value}"
                    )));
                }
                sum += value;
            }
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(SimError::config(format!(
                    "the contact matrix must have rows that add to one: row {row} sums to {sum}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_major_layout() {
        // Rows: [0.9, 0.1], [0.2, 0.8]
        let matrix = ContactMatrix::from_column_major(vec![0.9, 0.2, 0.1, 0.8]);
        assert_eq!(matrix.get(0, 1, 2), 0.1);
        assert_eq!(matrix.get(1, 0, 2), 0.2);
        assert_eq!(
            matrix,
            ContactMatrix::from_rows(&[vec![0.9, 0.1], vec![0.2, 0.8]])
        );
        assert!(matrix.validate(2).is_ok());
        assert_eq!(matrix.dim(), Some(2));
    }

    #[test]
    fn rejects_wrong_size() {
        let matrix = ContactMatrix::from_column_major(vec![1.0; 3]);
        assert_eq!(matrix.dim(), None);
        let error = matrix.validate(2).unwrap_err();
        assert!(error.to_string().contains("3 != 4"), "{error}");

        // A valid 2x2 matrix is wrong once a third group exists.
        let matrix = ContactMatrix::from_rows(&[vec![0.5, 0.5], vec![0.5, 0.5]]);
        assert!(matrix.validate(3).is_err());
    }

    #[test]
    fn rejects_negative_entries() {
        let matrix = ContactMatrix::from_rows(&[vec![1.5, -0.5], vec![0.5, 0.5]]);
        let error = matrix.validate(2).unwrap_err();
        assert!(error.to_string().contains("-0.5"), "{error}");
        assert!(error.to_string().contains("(0, 1)"), "{error}");
    }

    #[test]
    fn rejects_rows_not_summing_to_one() {
        let matrix = ContactMatrix::from_rows(&[vec![0.5, 0.5], vec![0.3, 0.3]]);
        let error = matrix.validate(2).unwrap_err();
        assert!(matches!(error, SimError::ConfigError(_)));
        assert!(error.to_string().contains("row 1"), "{error}");
    }

    #[test]
    fn row_sums_use_tolerance() {
        let matrix = ContactMatrix::from_rows(&[vec![0.4995, 0.5], vec![0.5, 0.5009]]);
        assert!(matrix.validate(2).is_ok());

        let matrix = ContactMatrix::from_rows(&[vec![0.498, 0.5], vec![0.5, 0.5]]);
        assert!(matrix.validate(2).is_err());
    }

    #[test]
    fn empty_matrix_for_no_groups() {
        assert!(ContactMatrix::from_column_major(Vec::new()).validate(0).is_ok());
    }
}
