//! Symmetric primitives consumed by the public-key schemes.
//!
//! The KEM needs a hash `H`, a seed expander `G`, a PRF and a KDF; the
//! signature scheme needs a fixed-length hash for chains and tree nodes. All
//! of them are derived from one [`SymmetricPrimitive`] implementation which
//! the schemes take as a type parameter, so tests and benchmarks can swap it.

use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Digest, Sha3_256, Shake256, Shake256Reader,
};

use crate::field::Modulus;
use crate::polynomial::Polynomial;

/// Length of every digest, seed and shared secret in this crate.
pub const HASH_BYTES: usize = 32;

pub trait SymmetricPrimitive {
    type Reader: XofReader;

    /// Fixed-length hash of the concatenated inputs.
    fn hash(inputs: &[&[u8]]) -> [u8; HASH_BYTES];

    /// Extendable-output stream over the concatenated inputs.
    fn xof(inputs: &[&[u8]]) -> Self::Reader;

    fn expand(inputs: &[&[u8]], output: &mut [u8]) {
        Self::xof(inputs).read(output);
    }
}

/// SHA3-256 for `hash`, SHAKE256 for `xof`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sha3;

impl SymmetricPrimitive for Sha3 {
    type Reader = Shake256Reader;

    fn hash(inputs: &[&[u8]]) -> [u8; HASH_BYTES] {
        let mut hasher = Sha3_256::new();
        for input in inputs {
            Digest::update(&mut hasher, input);
        }
        hasher.finalize().into()
    }

    fn xof(inputs: &[&[u8]]) -> Self::Reader {
        let mut hasher = Shake256::default();
        for input in inputs {
            hasher.update(input);
        }
        hasher.finalize_xof()
    }
}

// domain separators
pub(crate) const DOMAIN_MATRIX: &[u8] = b"matrix";
pub(crate) const DOMAIN_PRF: &[u8] = b"prf";
pub(crate) const DOMAIN_SEED_SPLIT: &[u8] = b"seed-split";
pub(crate) const DOMAIN_COINS: &[u8] = b"coins";
pub(crate) const DOMAIN_KDF: &[u8] = b"kdf";
pub(crate) const DOMAIN_CHAIN: &[u8] = b"chain";
pub(crate) const DOMAIN_CHAIN_SEED: &[u8] = b"chain-seed";
pub(crate) const DOMAIN_LEAF: &[u8] = b"leaf";
pub(crate) const DOMAIN_NODE: &[u8] = b"node";
pub(crate) const DOMAIN_MESSAGE: &[u8] = b"message";

/// 32 pseudorandom bytes keyed by `seed` and separated by `nonce`.
pub(crate) fn prf<H: SymmetricPrimitive>(seed: &[u8], nonce: &[u8]) -> [u8; HASH_BYTES] {
    let mut output = [0u8; HASH_BYTES];
    H::expand(&[DOMAIN_PRF, seed, nonce], &mut output);
    output
}

/// Split one seed into two independent 32-byte seeds.
pub(crate) fn split_seed<H: SymmetricPrimitive>(
    domain: &[u8],
    inputs: &[&[u8]],
) -> ([u8; HASH_BYTES], [u8; HASH_BYTES]) {
    let mut separated = vec![domain];
    separated.extend_from_slice(inputs);
    let mut reader = H::xof(&separated);
    let mut first = [0u8; HASH_BYTES];
    let mut second = [0u8; HASH_BYTES];
    reader.read(&mut first);
    reader.read(&mut second);
    (first, second)
}

/// Expand a seed into a uniformly random polynomial of length n in Z_q[X] by
/// rejection sampling on `bit_width(q)`-bit chunks of the XOF stream.
pub(crate) fn expand_polynomial<H: SymmetricPrimitive>(
    inputs: &[&[u8]],
    n: usize,
    modulus: Modulus,
) -> Polynomial {
    let mask = ((1u64 << modulus.bit_width()) - 1) as u32;
    let mut reader = H::xof(inputs);

    let mut coefficients: Vec<u32> = Vec::with_capacity(n);
    while coefficients.len() != n {
        let mut randomness = [0u8; 4];
        reader.read(&mut randomness);
        let t = u32::from_le_bytes(randomness) & mask;
        if t < modulus.value() {
            coefficients.push(t);
        }
    }

    Polynomial::new(coefficients, modulus)
}
