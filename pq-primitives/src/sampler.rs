use itertools::Itertools;
use rand::distributions::Distribution;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::{PqError, Result};
use crate::field::Modulus;
use crate::hash::{prf, SymmetricPrimitive};
use crate::polynomial::Polynomial;
use crate::ring::ModularRing;

/// Small symmetric noise distributions with support {-bound..bound}.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseDistribution {
    /// Σ (aᵢ - bᵢ) over eta pairs of fair bits.
    CenteredBinomial { eta: u32 },
    /// Uniform over {-bound..bound}.
    Uniform { bound: u32 },
}

impl NoiseDistribution {
    /// Widest admissible noise; keeps every bit pair of a binomial draw
    /// inside one 64-bit word.
    pub const MAX_BOUND: u32 = 32;

    pub fn centered_binomial(eta: u32) -> Result<Self> {
        let distribution = NoiseDistribution::CenteredBinomial { eta };
        distribution.validate()?;
        Ok(distribution)
    }

    pub fn uniform(bound: u32) -> Result<Self> {
        let distribution = NoiseDistribution::Uniform { bound };
        distribution.validate()?;
        Ok(distribution)
    }

    pub const fn bound(&self) -> u32 {
        match self {
            NoiseDistribution::CenteredBinomial { eta } => *eta,
            NoiseDistribution::Uniform { bound } => *bound,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bound() > Self::MAX_BOUND {
            return Err(PqError::InvalidParameters("noise bound must be at most 32"));
        }
        Ok(())
    }
}

impl Distribution<i64> for NoiseDistribution {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        match *self {
            NoiseDistribution::CenteredBinomial { eta } => {
                // a from the low half of each word, b from the high half
                let mut remaining = eta;
                let mut total = 0i64;
                while remaining > 0 {
                    let take = remaining.min(32);
                    let mask = (1u64 << take) - 1;
                    let bits = rng.next_u64();
                    total += (bits & mask).count_ones() as i64;
                    total -= ((bits >> 32) & mask).count_ones() as i64;
                    remaining -= take;
                }
                total
            }
            NoiseDistribution::Uniform { bound } => {
                let bound = bound as i64;
                rng.gen_range(-bound..=bound)
            }
        }
    }
}

/// Error sampler backed by a ChaCha20 stream.
///
/// Each sampler owns its stream, so two samplers never share bytes. Within
/// one key generation or encryption, every independent draw either advances
/// the same sampler or uses a sampler derived under a fresh nonce.
#[derive(Debug, Clone)]
pub struct NoiseSampler {
    distribution: NoiseDistribution,
    rng: ChaCha20Rng,
}

impl NoiseSampler {
    pub fn from_seed(distribution: NoiseDistribution, seed: [u8; 32]) -> Result<Self> {
        distribution.validate()?;
        Ok(Self::from_seed_unchecked(distribution, seed))
    }

    /// For distributions taken from validated scheme parameters.
    pub(crate) fn from_seed_unchecked(distribution: NoiseDistribution, seed: [u8; 32]) -> Self {
        Self {
            distribution,
            rng: ChaCha20Rng::from_seed(seed),
        }
    }

    /// Seed a sampler with 32 fresh bytes from `rng`.
    pub fn from_rng<R: RngCore>(distribution: NoiseDistribution, rng: &mut R) -> Result<Self> {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self::from_seed(distribution, seed)
    }

    /// Deterministic sampler keyed by `PRF(seed, nonce)`.
    pub fn derived<H: SymmetricPrimitive>(
        distribution: NoiseDistribution,
        seed: &[u8],
        nonce: u8,
    ) -> Result<Self> {
        Self::from_seed(distribution, prf::<H>(seed, &[nonce]))
    }

    pub fn reseed(&mut self, seed: [u8; 32]) {
        self.rng = ChaCha20Rng::from_seed(seed);
    }

    pub fn distribution(&self) -> NoiseDistribution {
        self.distribution
    }

    pub fn sample_small(&mut self, count: usize) -> Vec<i64> {
        let distribution = self.distribution;
        (0..count)
            .map(|_| distribution.sample(&mut self.rng))
            .collect_vec()
    }

    /// Noise vector over Z_q, for plain LWE.
    pub fn sample_residues(&mut self, count: usize, modulus: Modulus) -> Vec<u32> {
        self.sample_small(count)
            .into_iter()
            .map(|e| modulus.from_signed(e))
            .collect_vec()
    }

    /// Fresh noise polynomial in the given ring.
    pub fn sample(&mut self, ring: &ModularRing) -> Polynomial {
        Polynomial::from_signed(&self.sample_small(ring.degree()), ring.modulus())
    }

    pub fn sample_vector(&mut self, ring: &ModularRing, k: usize) -> Vec<Polynomial> {
        (0..k).map(|_| self.sample(ring)).collect_vec()
    }
}
