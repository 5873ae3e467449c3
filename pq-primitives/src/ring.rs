use itertools::Itertools;
use rand::Rng;

use crate::error::{ensure_dimension, PqError, Result};
use crate::field::Modulus;
use crate::matrix::Matrix;
use crate::polynomial::{negacyclic_product, Polynomial};

/// The ring R_q = Z_q[X] / <X^n + 1>.
///
/// Every operation checks that its operands have exactly n coefficients and
/// live under the same q before touching them, so a malformed operand aborts
/// the call without producing a partial result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModularRing {
    modulus: Modulus,
    n: usize,
}

impl ModularRing {
    pub fn new(modulus: Modulus, n: usize) -> Result<Self> {
        if !n.is_power_of_two() {
            return Err(PqError::InvalidParameters(
                "ring degree must be a power of two",
            ));
        }
        Ok(Self { modulus, n })
    }

    pub(crate) const fn new_unchecked(modulus: Modulus, n: usize) -> Self {
        Self { modulus, n }
    }

    pub fn modulus(&self) -> Modulus {
        self.modulus
    }

    pub fn degree(&self) -> usize {
        self.n
    }

    pub fn zero(&self) -> Polynomial {
        Polynomial::zero(self.n, self.modulus)
    }

    pub fn from_coefficients(&self, coefficients: Vec<u32>) -> Result<Polynomial> {
        ensure_dimension(self.n, coefficients.len())?;
        Ok(Polynomial::new(coefficients, self.modulus))
    }

    pub fn from_signed(&self, coefficients: &[i64]) -> Result<Polynomial> {
        ensure_dimension(self.n, coefficients.len())?;
        Ok(Polynomial::from_signed(coefficients, self.modulus))
    }

    /// Polynomial with uniformly random coefficients.
    pub fn uniform<R: Rng>(&self, rng: &mut R) -> Polynomial {
        let modulus = self.modulus;
        Polynomial::new(
            (0..self.n).map(|_| rng.sample(modulus)).collect_vec(),
            modulus,
        )
    }

    fn check(&self, operand: &Polynomial) -> Result<()> {
        if operand.modulus() != self.modulus {
            return Err(PqError::ModulusMismatch {
                expected: self.modulus.value(),
                found: operand.modulus().value(),
            });
        }
        ensure_dimension(self.n, operand.len())
    }

    pub fn add(&self, a: &Polynomial, b: &Polynomial) -> Result<Polynomial> {
        self.check(a)?;
        self.check(b)?;
        let modulus = self.modulus;
        Ok(a.zip_coefficients(b, |x, y| modulus.add(x, y)))
    }

    pub fn sub(&self, a: &Polynomial, b: &Polynomial) -> Result<Polynomial> {
        self.check(a)?;
        self.check(b)?;
        let modulus = self.modulus;
        Ok(a.zip_coefficients(b, |x, y| modulus.sub(x, y)))
    }

    pub fn negate(&self, a: &Polynomial) -> Result<Polynomial> {
        self.check(a)?;
        let modulus = self.modulus;
        Ok(a.map_coefficients(|x| modulus.neg(x)))
    }

    pub fn scalar_mul(&self, a: &Polynomial, scalar: u32) -> Result<Polynomial> {
        self.check(a)?;
        let modulus = self.modulus;
        let scalar = modulus.reduce(scalar as u64);
        Ok(a.map_coefficients(|x| modulus.mul(x, scalar)))
    }

    /// Negacyclic product a·b mod (q, X^n + 1).
    pub fn mul(&self, a: &Polynomial, b: &Polynomial) -> Result<Polynomial> {
        self.check(a)?;
        self.check(b)?;
        Ok(Polynomial::new(
            negacyclic_product(a.coefficients(), b.coefficients(), self.modulus),
            self.modulus,
        ))
    }

    /// Σ aᵢ·bᵢ over two vectors of ring elements.
    pub fn inner_product(&self, a: &[Polynomial], b: &[Polynomial]) -> Result<Polynomial> {
        ensure_dimension(a.len(), b.len())?;
        a.iter()
            .zip(b.iter())
            .try_fold(self.zero(), |acc, (x, y)| self.add(&acc, &self.mul(x, y)?))
    }

    /// A·v for a matrix of ring elements.
    pub fn matrix_vector(&self, a: &Matrix<Polynomial>, v: &[Polynomial]) -> Result<Vec<Polynomial>> {
        ensure_dimension(a.cols(), v.len())?;
        (0..a.rows())
            .map(|i| self.inner_product(a.row(i), v))
            .collect()
    }

    /// Aᵀ·v for a matrix of ring elements.
    pub fn matrix_transpose_vector(
        &self,
        a: &Matrix<Polynomial>,
        v: &[Polynomial],
    ) -> Result<Vec<Polynomial>> {
        ensure_dimension(a.rows(), v.len())?;
        (0..a.cols())
            .map(|j| self.inner_product(&a.column(j).cloned().collect_vec(), v))
            .collect()
    }

    /// Componentwise sum of two vectors of ring elements.
    pub fn add_vectors(&self, a: &[Polynomial], b: &[Polynomial]) -> Result<Vec<Polynomial>> {
        ensure_dimension(a.len(), b.len())?;
        a.iter().zip(b.iter()).map(|(x, y)| self.add(x, y)).collect()
    }
}
