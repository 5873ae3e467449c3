//! Fixed-width packing of residues, most significant bit first, in index
//! order. Every serialized object in this crate is a packed coefficient
//! section padded to a whole byte followed by its byte-aligned scalar fields.

use bit_vec::BitVec;
use itertools::Itertools;

use crate::error::{DeserializationError, Result};
use crate::field::Modulus;
use crate::polynomial::Polynomial;

/// Number of bytes taken by `count` residues of `width` bits.
pub(crate) const fn packed_len(count: usize, width: usize) -> usize {
    (count * width + 7) / 8
}

pub(crate) fn pack_residues<'a, I: IntoIterator<Item = &'a u32>>(values: I, width: usize) -> Vec<u8> {
    let mut bits = BitVec::new();
    for value in values {
        for i in (0..width).rev() {
            bits.push((value >> i) & 1 == 1);
        }
    }
    bits.to_bytes()
}

/// Read `count` residues of `width` bits from the start of `bytes`, reducing
/// each one modulo q.
pub(crate) fn unpack_residues(bytes: &[u8], count: usize, modulus: Modulus) -> Vec<u32> {
    let width = modulus.bit_width();
    let bits = BitVec::from_bytes(bytes);
    let residues = bits
        .iter()
        .take(count * width)
        .chunks(width)
        .into_iter()
        .map(|chunk| {
            let mut int = 0u64;
            for bit in chunk {
                int = (int << 1) | (bit as u64);
            }
            modulus.reduce(int)
        })
        .collect_vec();
    residues
}

pub(crate) fn pack_polynomials(polynomials: &[Polynomial], modulus: Modulus) -> Vec<u8> {
    pack_residues(
        polynomials.iter().flat_map(|p| p.coefficients().iter()),
        modulus.bit_width(),
    )
}

pub(crate) fn unpack_polynomials(
    bytes: &[u8],
    count: usize,
    n: usize,
    modulus: Modulus,
) -> Vec<Polynomial> {
    unpack_residues(bytes, count * n, modulus)
        .chunks(n)
        .map(|chunk| Polynomial::new(chunk.to_vec(), modulus))
        .collect_vec()
}

/// Fail unless a buffer has exactly the expected length.
pub(crate) fn expect_length(bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() != expected {
        return Err(DeserializationError::BadEncodingLength {
            expected,
            found: bytes.len(),
        }
        .into());
    }
    Ok(())
}

/// Message bytes to one bit per coefficient, least significant bit first.
pub(crate) fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|byte| (0..8).map(move |i| (byte >> i) & 1 == 1))
        .collect_vec()
}

pub(crate) fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| acc | ((bit as u8) << i))
        })
        .collect_vec()
}
