//! Winternitz one-time signatures over 32-byte digests.
//!
//! Every chain step is hashed together with its address (leaf, chain, step),
//! so no two positions in a key share a hash function.

use itertools::Itertools;

use crate::hash::{SymmetricPrimitive, DOMAIN_CHAIN, DOMAIN_CHAIN_SEED, DOMAIN_LEAF, HASH_BYTES};

pub type Digest = [u8; HASH_BYTES];

/// Chain geometry for a Winternitz parameter `w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChainLayout {
    pub(crate) w: u32,
    log_w: u32,
    message_digits: usize,
    checksum_digits: usize,
}

impl ChainLayout {
    /// `w` must be 4 or 16, so that digits never straddle a byte.
    pub(crate) const fn new(w: u32) -> Self {
        let log_w = w.trailing_zeros();
        let message_digits = 8 * HASH_BYTES / log_w as usize;
        let max_checksum = message_digits * (w as usize - 1);
        let checksum_bits = (usize::BITS - max_checksum.leading_zeros()) as usize;
        let checksum_digits = (checksum_bits + log_w as usize - 1) / log_w as usize;
        Self {
            w,
            log_w,
            message_digits,
            checksum_digits,
        }
    }

    pub(crate) const fn chain_count(&self) -> usize {
        self.message_digits + self.checksum_digits
    }

    /// Base-w digits of the digest, most significant first, followed by the
    /// digits of Σ (w - 1 - dᵢ).
    pub(crate) fn digits(&self, digest: &Digest) -> Vec<u32> {
        let per_byte = 8 / self.log_w;
        let mask = self.w - 1;
        let mut digits = digest
            .iter()
            .flat_map(|&byte| {
                (0..per_byte)
                    .rev()
                    .map(move |i| ((byte as u32) >> (i * self.log_w)) & mask)
            })
            .collect_vec();

        let checksum: u32 = digits.iter().map(|d| mask - d).sum();
        digits.extend(
            (0..self.checksum_digits as u32)
                .rev()
                .map(|i| (checksum >> (i * self.log_w)) & mask),
        );
        digits
    }
}

fn chain_step<H: SymmetricPrimitive>(value: &Digest, leaf: u32, chain: u32, step: u32) -> Digest {
    H::hash(&[
        DOMAIN_CHAIN,
        &leaf.to_le_bytes(),
        &chain.to_le_bytes(),
        &step.to_le_bytes(),
        value,
    ])
}

/// Advance `value` from position `start` by `steps` hash applications.
pub(crate) fn iterate_chain<H: SymmetricPrimitive>(
    mut value: Digest,
    leaf: u32,
    chain: u32,
    start: u32,
    steps: u32,
) -> Digest {
    for step in start..start + steps {
        value = chain_step::<H>(&value, leaf, chain, step);
    }
    value
}

fn chain_seed<H: SymmetricPrimitive>(secret_seed: &Digest, leaf: u32, chain: u32) -> Digest {
    H::hash(&[
        DOMAIN_CHAIN_SEED,
        secret_seed,
        &leaf.to_le_bytes(),
        &chain.to_le_bytes(),
    ])
}

/// Compress the chain tips of one key into its leaf.
pub(crate) fn compress_tips<H: SymmetricPrimitive>(tips: &[Digest]) -> Digest {
    let mut inputs: Vec<&[u8]> = vec![DOMAIN_LEAF];
    inputs.extend(tips.iter().map(|tip| tip.as_slice()));
    H::hash(&inputs)
}

/// Public leaf of the one-time key at index `leaf`.
pub(crate) fn leaf_public_key<H: SymmetricPrimitive>(
    layout: &ChainLayout,
    secret_seed: &Digest,
    leaf: u32,
) -> Digest {
    let tips = (0..layout.chain_count() as u32)
        .map(|chain| {
            iterate_chain::<H>(
                chain_seed::<H>(secret_seed, leaf, chain),
                leaf,
                chain,
                0,
                layout.w - 1,
            )
        })
        .collect_vec();
    compress_tips::<H>(&tips)
}

/// Reveal chain i at position dᵢ.
pub(crate) fn sign_digest<H: SymmetricPrimitive>(
    layout: &ChainLayout,
    secret_seed: &Digest,
    leaf: u32,
    digest: &Digest,
) -> Vec<Digest> {
    layout
        .digits(digest)
        .into_iter()
        .enumerate()
        .map(|(chain, digit)| {
            let chain = chain as u32;
            iterate_chain::<H>(chain_seed::<H>(secret_seed, leaf, chain), leaf, chain, 0, digit)
        })
        .collect_vec()
}

/// Finish every revealed chain and compress the tips. Equals the leaf public
/// key exactly when the reveals were made for this digest and leaf.
pub(crate) fn leaf_from_signature<H: SymmetricPrimitive>(
    layout: &ChainLayout,
    reveals: &[Digest],
    leaf: u32,
    digest: &Digest,
) -> Digest {
    let tips = layout
        .digits(digest)
        .into_iter()
        .zip(reveals.iter())
        .enumerate()
        .map(|(chain, (digit, reveal))| {
            iterate_chain::<H>(*reveal, leaf, chain as u32, digit, layout.w - 1 - digit)
        })
        .collect_vec();
    compress_tips::<H>(&tips)
}
