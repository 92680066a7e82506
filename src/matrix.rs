//! Exact integer matrices.
//!
//! [`Matrix`] stores the basis and the accumulated transform row-major; a
//! row is one lattice vector. All arithmetic is exact: entries are either
//! checked `i64` or `rug::Integer` behind [`Coefficient`]. The two hot
//! operations are the elementary row update emitted by global
//! size-reduction and the strip composition that folds a block-local
//! transform into the basis and the global transform.

use crate::coefficient::Coefficient;
use crate::error::ReduceError;

use std::{
    fmt::{self, Debug},
    ops::{Index, IndexMut},
};

#[derive(Clone, PartialEq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Coefficient> Matrix<T> {
    pub fn zero(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![T::default(); rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zero(n, n);
        for i in 0..n {
            m[i][i] = T::from_i64(1);
        }
        m
    }

    /// Build a matrix from its rows. Rejects ragged and empty input.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, ReduceError> {
        let height = rows.len();
        if height == 0 {
            return Err(ReduceError::Empty);
        }
        let width = rows[0].len();
        if width == 0 {
            return Err(ReduceError::Empty);
        }
        if rows.iter().any(|r| r.len() != width) {
            return Err(ReduceError::RaggedRows);
        }
        let mut data = Vec::with_capacity(height * width);
        for row in rows {
            data.extend(row);
        }
        Ok(Self {
            rows: height,
            cols: width,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Exact inner product of two rows, rounded to f64 once at the end.
    pub(crate) fn dot_rows_f64(&self, i: usize, j: usize) -> f64 {
        T::dot_f64(self.row(i), self.row(j))
    }

    /// Elementary update `row[dst] += q * row[src]`, the operation global
    /// size-reduction emits. `dst` and `src` must differ.
    pub(crate) fn row_addmul(
        &mut self,
        dst: usize,
        src: usize,
        q: i64,
    ) -> Result<(), ReduceError> {
        debug_assert_ne!(dst, src);
        if q == 0 {
            return Ok(());
        }
        let q = T::from_i64(q);
        let cols = self.cols;
        for c in 0..cols {
            let add = self.data[src * cols + c]
                .checked_mul(&q)
                .ok_or(ReduceError::Overflow)?;
            let entry = &mut self.data[dst * cols + c];
            *entry = entry.checked_add(&add).ok_or(ReduceError::Overflow)?;
        }
        Ok(())
    }

    /// Fold a block-local unimodular transform into rows `lo..lo + m`.
    ///
    /// `uw` is row-major m×m with the kernel's column convention: the new
    /// vector at window position `j` is `Σ_i uw[i][j] · old vector i`.
    pub(crate) fn apply_window_transform(
        &mut self,
        lo: usize,
        uw: &[i128],
        m: usize,
    ) -> Result<(), ReduceError> {
        debug_assert_eq!(uw.len(), m * m);
        debug_assert!(lo + m <= self.rows);
        let cols = self.cols;
        let old: Vec<T> = self.data[lo * cols..(lo + m) * cols].to_vec();
        for j in 0..m {
            for c in 0..cols {
                let mut acc = T::default();
                for i in 0..m {
                    let coeff = uw[i * m + j];
                    if coeff == 0 {
                        continue;
                    }
                    let coeff = T::from_i128(coeff).ok_or(ReduceError::Overflow)?;
                    let add = old[i * cols + c]
                        .checked_mul(&coeff)
                        .ok_or(ReduceError::Overflow)?;
                    acc = acc.checked_add(&add).ok_or(ReduceError::Overflow)?;
                }
                self.data[(lo + j) * cols + c] = acc;
            }
        }
        Ok(())
    }

    /// Exact product `self · rhs`.
    pub fn gemm(&self, rhs: &Self) -> Result<Self, ReduceError> {
        if self.cols != rhs.rows {
            return Err(ReduceError::ShapeMismatch(
                self.rows, self.cols, rhs.rows, rhs.cols,
            ));
        }
        let mut out = Self::zero(self.rows, rhs.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = &self.data[i * self.cols + k];
                if a.is_zero() {
                    continue;
                }
                for j in 0..rhs.cols {
                    let add = a
                        .checked_mul(&rhs.data[k * rhs.cols + j])
                        .ok_or(ReduceError::Overflow)?;
                    let entry = &mut out.data[i * rhs.cols + j];
                    *entry = entry.checked_add(&add).ok_or(ReduceError::Overflow)?;
                }
            }
        }
        Ok(out)
    }
}

/// Direct access to a row.
impl<T> Index<usize> for Matrix<T> {
    type Output = [T];

    fn index(&self, index: usize) -> &[T] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }
}

/// Direct access to a row (mutable).
impl<T> IndexMut<usize> for Matrix<T> {
    fn index_mut(&mut self, index: usize) -> &mut [T] {
        &mut self.data[index * self.cols..(index + 1) * self.cols]
    }
}

impl<T: Debug> fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for i in 0..self.rows {
            writeln!(f, "{:?}", &self.data[i * self.cols..(i + 1) * self.cols])?;
        }
        Ok(())
    }
}
