use itertools::Itertools;
use rand::Rng;

use crate::error::{ensure_dimension, Result};
use crate::field::Modulus;

/// A rows x cols matrix stored row-major. Entries are residues for plain LWE
/// and polynomials for the module-lattice KEM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    entries: Vec<T>,
}

impl<T> Matrix<T> {
    pub fn new(rows: usize, cols: usize, entries: Vec<T>) -> Result<Self> {
        ensure_dimension(rows * cols, entries.len())?;
        Ok(Self {
            rows,
            cols,
            entries,
        })
    }

    pub fn from_fn<C: FnMut(usize, usize) -> T>(rows: usize, cols: usize, mut closure: C) -> Self {
        let entries = (0..rows)
            .cartesian_product(0..cols)
            .map(|(i, j)| closure(i, j))
            .collect_vec();
        Self {
            rows,
            cols,
            entries,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> &T {
        &self.entries[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.entries[row * self.cols..(row + 1) * self.cols]
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = &T> + '_ {
        self.entries.iter().skip(col).step_by(self.cols.max(1))
    }

    /// Entries in row-major index order.
    pub fn entries(&self) -> &[T] {
        &self.entries
    }
}

impl Matrix<u32> {
    /// Matrix with entries drawn uniformly from Z_q.
    pub fn uniform<R: Rng>(rows: usize, cols: usize, modulus: Modulus, rng: &mut R) -> Self {
        Self::from_fn(rows, cols, |_, _| rng.sample(modulus))
    }

    /// A·v over Z_q.
    pub fn mul_vector(&self, vector: &[u32], modulus: Modulus) -> Result<Vec<u32>> {
        ensure_dimension(self.cols, vector.len())?;
        Ok((0..self.rows)
            .map(|i| inner_product(self.row(i), vector, modulus))
            .collect_vec())
    }

    /// Aᵀ·v over Z_q.
    pub fn transpose_mul_vector(&self, vector: &[u32], modulus: Modulus) -> Result<Vec<u32>> {
        ensure_dimension(self.rows, vector.len())?;
        let mut result = vec![0u32; self.cols];
        for (i, &vi) in vector.iter().enumerate() {
            if vi == 0 {
                continue;
            }
            for (j, &aij) in self.row(i).iter().enumerate() {
                result[j] = modulus.add(result[j], modulus.mul(aij, vi));
            }
        }
        Ok(result)
    }
}

/// ⟨a, b⟩ over Z_q. Callers check that the lengths agree.
pub(crate) fn inner_product(a: &[u32], b: &[u32], modulus: Modulus) -> u32 {
    let sum = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| x as u128 * y as u128)
        .sum::<u128>();
    (sum % modulus.value() as u128) as u32
}
