use std::ops::{AddAssign, Mul, Sub};

use itertools::Itertools;
use num::Zero;

use crate::field::Modulus;

/// An element of Z_q[X] / <X^n + 1>, stored as its n coefficients in
/// [0, q) together with q.
///
/// Arithmetic that must check shapes goes through [`crate::ring::ModularRing`];
/// this type only maintains the reduced-coefficient invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Polynomial {
    coefficients: Vec<u32>,
    modulus: Modulus,
}

impl Polynomial {
    /// Build a polynomial, reducing every coefficient into [0, q).
    pub fn new(coefficients: Vec<u32>, modulus: Modulus) -> Self {
        let coefficients = coefficients
            .into_iter()
            .map(|c| modulus.reduce(c as u64))
            .collect_vec();
        Self {
            coefficients,
            modulus,
        }
    }

    pub fn from_signed(coefficients: &[i64], modulus: Modulus) -> Self {
        Self {
            coefficients: coefficients
                .iter()
                .map(|&c| modulus.from_signed(c))
                .collect_vec(),
            modulus,
        }
    }

    pub fn zero(n: usize, modulus: Modulus) -> Self {
        Self {
            coefficients: vec![0; n],
            modulus,
        }
    }

    /// Constant polynomial c of length n.
    pub fn constant(c: u32, n: usize, modulus: Modulus) -> Self {
        let mut polynomial = Self::zero(n, modulus);
        if n > 0 {
            polynomial.coefficients[0] = modulus.reduce(c as u64);
        }
        polynomial
    }

    pub fn coefficients(&self) -> &[u32] {
        &self.coefficients
    }

    pub fn modulus(&self) -> Modulus {
        self.modulus
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients.iter().all(|c| *c == 0)
    }

    /// Coefficients lifted to their centered representatives.
    pub fn balanced_coefficients(&self) -> Vec<i64> {
        self.coefficients
            .iter()
            .map(|&c| self.modulus.balanced(c))
            .collect_vec()
    }

    /// Largest centered coefficient magnitude.
    pub fn infinity_norm(&self) -> u64 {
        self.coefficients
            .iter()
            .map(|&c| self.modulus.balanced(c).unsigned_abs())
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn map_coefficients<C: FnMut(u32) -> u32>(&self, mut closure: C) -> Self {
        Self {
            coefficients: self
                .coefficients
                .iter()
                .map(|&c| self.modulus.reduce(closure(c) as u64))
                .collect_vec(),
            modulus: self.modulus,
        }
    }

    pub(crate) fn zip_coefficients<C: FnMut(u32, u32) -> u32>(
        &self,
        other: &Self,
        mut closure: C,
    ) -> Self {
        Self {
            coefficients: self
                .coefficients
                .iter()
                .zip(other.coefficients.iter())
                .map(|(&a, &b)| closure(a, b))
                .collect_vec(),
            modulus: self.modulus,
        }
    }
}

fn vector_karatsuba<F: Zero + AddAssign + Mul<Output = F> + Sub<Output = F> + Clone>(
    left: &[F],
    right: &[F],
) -> Vec<F> {
    let n = left.len();
    if n <= 8 {
        let mut product = vec![F::zero(); left.len() + right.len() - 1];
        for (i, l) in left.iter().enumerate() {
            for (j, r) in right.iter().enumerate() {
                product[i + j] += l.clone() * r.clone();
            }
        }
        return product;
    }
    let n_over_2 = n / 2;
    let mut product = vec![F::zero(); 2 * n - 1];
    let left_lo = &left[0..n_over_2];
    let right_lo = &right[0..n_over_2];
    let left_hi = &left[n_over_2..];
    let right_hi = &right[n_over_2..];
    let left_sum = left_lo
        .iter()
        .zip(left_hi)
        .map(|(a, b)| a.clone() + b.clone())
        .collect_vec();
    let right_sum = right_lo
        .iter()
        .zip(right_hi)
        .map(|(a, b)| a.clone() + b.clone())
        .collect_vec();

    let prod_lo = vector_karatsuba(left_lo, right_lo);
    let prod_hi = vector_karatsuba(left_hi, right_hi);
    // cross terms are sums of non-negative products, so unsigned subtraction
    // cannot underflow
    let prod_mid = vector_karatsuba(&left_sum, &right_sum)
        .iter()
        .zip(prod_lo.iter().zip(prod_hi.iter()))
        .map(|(s, (l, h))| s.clone() - (l.clone() + h.clone()))
        .collect_vec();

    for (i, l) in prod_lo.into_iter().enumerate() {
        product[i] = l;
    }
    for (i, m) in prod_mid.into_iter().enumerate() {
        product[i + n_over_2] += m;
    }
    for (i, h) in prod_hi.into_iter().enumerate() {
        product[i + n] += h
    }
    product
}

/// Fold a full-length product back into n coefficients using X^n = -1.
pub(crate) fn reduce_by_cyclotomic(product: &[u128], n: usize, modulus: Modulus) -> Vec<u32> {
    let q = modulus.value() as u128;
    let mut coefficients = vec![0u32; n];
    for (i, c) in product.iter().enumerate() {
        let c = (c % q) as u32;
        let slot = &mut coefficients[i % n];
        *slot = if (i / n) % 2 == 0 {
            modulus.add(*slot, c)
        } else {
            modulus.sub(*slot, c)
        };
    }
    coefficients
}

/// Product of two equal-length coefficient vectors in Z_q[X] / <X^n + 1>.
///
/// Power-of-two lengths go through Karatsuba; anything else falls back to
/// the schoolbook product. Both are exact because the unreduced product is
/// accumulated in `u128`.
pub(crate) fn negacyclic_product(left: &[u32], right: &[u32], modulus: Modulus) -> Vec<u32> {
    let n = left.len();
    if n == 0 {
        return vec![];
    }
    let left = left.iter().map(|&c| c as u128).collect_vec();
    let right = right.iter().map(|&c| c as u128).collect_vec();
    let product = if n.is_power_of_two() {
        vector_karatsuba(&left, &right)
    } else {
        schoolbook(&left, &right)
    };
    reduce_by_cyclotomic(&product, n, modulus)
}

fn schoolbook(left: &[u128], right: &[u128]) -> Vec<u128> {
    let mut product = vec![0u128; left.len() + right.len() - 1];
    for (i, l) in left.iter().enumerate() {
        for (j, r) in right.iter().enumerate() {
            product[i + j] += l * r;
        }
    }
    product
}
